use team_calendar::startup;
use team_calendar::utils::time::MonthAndYear;
use tracing::info;

#[tokio::main]
async fn main() -> miette::Result<()> {
    // Initialize logging
    startup::init_logging()?;

    info!("Starting team calendar");

    // Optional `YYYY-MM` argument picks the month to show
    let month = std::env::args()
        .nth(1)
        .map(|arg| MonthAndYear::parse_key(&arg))
        .transpose()?;

    // Load configuration
    let config = startup::load_config()?;

    startup::run(config, month).await
}
