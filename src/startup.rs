use crate::components::capacity::{resolve_team_name, AzureDevOpsClient, CapacityService, Team, TeamContext};
use crate::components::models::EventCategory;
use crate::components::store::{get_json, keys, set_json, KeyValueStore, RedisStore, StoreScope};
use crate::components::summary::display_color;
use crate::components::{CalendarEvent, CalendarFeed, CapacityEventsHandle, FreeFormEventsHandle};
use crate::config::{component_names, Config};
use crate::error::{not_found_error, CalendarResult, Error};
use crate::utils::color::{load_color_overrides, ColorOverrides};
use crate::utils::time::{format_date_range, month_grid_range, today_in, MonthAndYear};
use rust_i18n::t;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Initialize logging with environment-based configuration
pub fn init_logging() -> miette::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,reqwest=warn,redis=warn")),
        )
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| Error::Other(format!("Failed to set up logging: {}", e)))?;

    Ok(())
}

/// Load the application config
pub fn load_config() -> miette::Result<Config> {
    match Config::load() {
        Ok(config) => Ok(config),
        Err(e) => {
            error!("Failed to load configuration: {:?}", e);
            Err(e.into())
        }
    }
}

/// Pick the team to show: the requested one, else the remembered one, else the first by name.
/// The choice is remembered for the next run.
pub async fn select_team(
    store: &dyn KeyValueStore,
    service: &dyn CapacityService,
    project_id: &str,
    requested: Option<&str>,
) -> CalendarResult<Team> {
    let mut teams = service.get_teams(project_id).await?;
    teams.sort_by_key(|team| team.name.to_uppercase());

    let selection_key = keys::selected_team(project_id);
    let wanted = match requested {
        Some(team_id) => Some(team_id.to_string()),
        None => match get_json::<String>(store, &selection_key, StoreScope::User).await {
            Ok(remembered) => remembered,
            Err(e) => {
                warn!("Failed to read the remembered team: {}", e);
                None
            }
        },
    };

    let team = match wanted {
        Some(team_id) => match teams.iter().find(|team| team.id == team_id) {
            Some(team) => team.clone(),
            None => {
                warn!("Team {} not found in project {}, using the first team", team_id, project_id);
                teams.first().cloned().ok_or_else(|| no_teams(project_id))?
            }
        },
        None => teams.first().cloned().ok_or_else(|| no_teams(project_id))?,
    };

    if let Err(e) = set_json(store, &selection_key, &team.id, StoreScope::User).await {
        warn!("Failed to remember team {}: {}", team.id, e);
    }

    Ok(team)
}

fn no_teams(project_id: &str) -> Error {
    not_found_error(&format!("Project {} has no teams", project_id))
}

/// Load the month around `month` (today's month when `None`) and print it
pub async fn run(config: Config, month: Option<MonthAndYear>) -> miette::Result<()> {
    // Initialize Redis store
    let (mut store_actor, store_handle) = RedisStore::new(&config)?;
    tokio::spawn(async move {
        store_actor.run().await;
    });
    let store: Arc<dyn KeyValueStore> = Arc::new(store_handle.clone());

    let service: Arc<dyn CapacityService> = Arc::new(AzureDevOpsClient::from_config(&config)?);

    rust_i18n::set_locale(&config.locale);

    let team = select_team(
        store.as_ref(),
        service.as_ref(),
        &config.project_id,
        config.team_id.as_deref(),
    )
    .await?;
    let team_name = resolve_team_name(service.as_ref(), &config.project_id, &team.id, &team.name).await;
    info!("Showing calendar of team {}", team_name);

    match service.get_team_members(&config.project_id, &team.id).await {
        Ok(members) => info!("Team {} has {} members", team_name, members.len()),
        Err(e) => warn!("Failed to list members of team {}: {}", team_name, e),
    }

    let month = match month {
        Some(month) => month,
        None => MonthAndYear::from_date(today_in(config.tz()?)),
    };
    let visible = month_grid_range(month, config.week_start()?);

    let free_form = config
        .is_component_enabled(component_names::FREE_FORM_EVENTS)
        .then(|| FreeFormEventsHandle::new(Arc::clone(&store)));
    if let Some(handle) = &free_form {
        handle.initialize(team.id.clone());
    }

    let capacity = config
        .is_component_enabled(component_names::CAPACITY_EVENTS)
        .then(|| CapacityEventsHandle::new(Arc::clone(&service), config.iteration_padding_days));
    if let Some(handle) = &capacity {
        handle.initialize(TeamContext {
            host_url: config.host_url.clone(),
            project_id: config.project_id.clone(),
            project_name: config.project_name.clone(),
            team_id: team.id.clone(),
            team_name: team_name.clone(),
        });
    }

    let (loaded, report, overrides) = tokio::join!(
        async {
            match &free_form {
                Some(handle) => handle.preload(visible).await,
                None => 0,
            }
        },
        async {
            match &capacity {
                Some(handle) => Some(handle.preload_iterations(visible).await),
                None => None,
            }
        },
        load_color_overrides(store.as_ref()),
    );
    info!("Loaded {} free-form buckets for {}", loaded, month);
    if let Some(report) = &report {
        info!(
            "Loaded {} iterations and capacity of {} iterations",
            report.iterations_fetched, report.capacity_fetched
        );
    }

    let mut feed = CalendarFeed::new();
    feed.set_color_overrides(overrides);
    if let Some(handle) = free_form.clone() {
        feed.register(handle);
    }
    if let Some(handle) = capacity.clone() {
        feed.register(handle);
    }

    println!(
        "{}",
        t!(
            "calendar_title",
            team = &team_name,
            month = month,
            previous = month.add_months(-1).key(),
            next = month.add_months(1).key()
        )
    );
    print_agenda(&feed.events(&visible));

    if let Some(handle) = &free_form {
        print_summary(&t!("summary_heading_events"), &handle.get_summary_data().borrow(), feed.color_overrides());
    }
    if let Some(handle) = &capacity {
        print_summary(&t!("summary_heading_iterations"), &handle.get_iteration_summary_data().borrow(), feed.color_overrides());
        print_summary(&t!("summary_heading_days_off"), &handle.get_capacity_summary_data().borrow(), feed.color_overrides());
    }

    feed.shutdown_all().await?;
    store_handle.shutdown().await?;

    info!("Team calendar finished");
    Ok(())
}

fn print_agenda(events: &[CalendarEvent]) {
    for event in events {
        println!(
            "{:<25} {:<12} {} {}",
            format_date_range(event.start_date, event.inclusive_end()),
            event.category,
            event.title,
            event.color.as_deref().unwrap_or_default()
        );
    }
}

fn print_summary(heading: &str, rows: &[EventCategory], overrides: &ColorOverrides) {
    if rows.is_empty() {
        return;
    }

    println!();
    println!("{}", heading);
    for row in rows {
        println!(
            "  {:<30} {:<25} {}",
            row.title,
            row.sub_title,
            display_color(row, overrides).unwrap_or_default()
        );
        if row.is_expandable() {
            for linked in &row.linked_events {
                println!("    {} {}", format_date_range(linked.start_date, linked.end_date), linked.title);
            }
        }
    }
}
