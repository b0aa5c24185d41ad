use crate::error::{config_error, env_error, CalendarResult};
use chrono::Weekday;
use chrono_tz::Tz;
use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;

/// Default Redis connection string
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";

/// Default namespace for store keys
pub const DEFAULT_KEY_PREFIX: &str = "team_calendar";

/// Default padding around an iteration preload window, in days
pub const DEFAULT_ITERATION_PADDING_DAYS: i64 = 14;

/// Component names understood by `config/components.toml`
pub mod component_names {
    pub const FREE_FORM_EVENTS: &str = "free_form_events";
    pub const CAPACITY_EVENTS: &str = "capacity_events";
}

const COMPONENTS_FILE: &str = "config/components.toml";

/// Main configuration structure for the calendar
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Azure DevOps organization URL, e.g. `https://dev.azure.com/contoso/`
    pub host_url: String,
    /// Personal access token used for the REST API
    pub access_token: String,
    /// Project the calendar belongs to
    pub project_id: String,
    /// Display name of the project
    pub project_name: String,
    /// Team requested explicitly, if any
    pub team_id: Option<String>,
    /// User id for user-scoped store keys
    pub user_id: String,
    /// Redis connection string
    pub redis_url: String,
    /// Namespace for store keys
    pub key_prefix: String,
    /// Timezone used to work out "today"
    pub timezone: String,
    /// Days added on both sides of an iteration preload
    pub iteration_padding_days: i64,
    /// First column of the month grid
    pub first_day_of_week: String,
    /// Locale of printed labels
    pub locale: String,
    /// Map of component names to their enabled status
    pub components: HashMap<String, bool>,
}

impl Config {
    /// Load configuration from environment and config file
    pub fn load() -> CalendarResult<Self> {
        // Load .env file if it exists
        dotenv().ok();

        // Required environment variables
        let host_url = env::var("AZURE_DEVOPS_URL").map_err(|_| env_error("AZURE_DEVOPS_URL"))?;
        let access_token = env::var("AZURE_DEVOPS_PAT").map_err(|_| env_error("AZURE_DEVOPS_PAT"))?;
        let project_id =
            env::var("AZURE_DEVOPS_PROJECT_ID").map_err(|_| env_error("AZURE_DEVOPS_PROJECT_ID"))?;

        let project_name = env::var("AZURE_DEVOPS_PROJECT_NAME").unwrap_or_else(|_| project_id.clone());
        let team_id = env::var("TEAM_CALENDAR_TEAM_ID").ok().filter(|id| !id.is_empty());
        let user_id = env::var("TEAM_CALENDAR_USER").unwrap_or_else(|_| String::from("default"));
        let redis_url = env::var("REDIS_URL").unwrap_or_else(|_| String::from(DEFAULT_REDIS_URL));
        let key_prefix = env::var("STORE_KEY_PREFIX").unwrap_or_else(|_| String::from(DEFAULT_KEY_PREFIX));
        let timezone = env::var("TIMEZONE").unwrap_or_else(|_| String::from("UTC"));
        let first_day_of_week = env::var("FIRST_DAY_OF_WEEK").unwrap_or_else(|_| String::from("Mon"));
        let locale = env::var("LOCALE").unwrap_or_else(|_| String::from("en"));

        let iteration_padding_days = match env::var("ITERATION_PADDING_DAYS") {
            Ok(value) => value
                .parse::<i64>()
                .map_err(|_| env_error("Invalid ITERATION_PADDING_DAYS format"))?,
            Err(_) => DEFAULT_ITERATION_PADDING_DAYS,
        };

        let config = Config {
            host_url,
            access_token,
            project_id,
            project_name,
            team_id,
            user_id,
            redis_url,
            key_prefix,
            timezone,
            iteration_padding_days,
            first_day_of_week,
            locale,
            components: load_components(Path::new(COMPONENTS_FILE)),
        };

        // Fail early on values that are only parsed later
        config.tz()?;
        config.week_start()?;

        Ok(config)
    }

    /// Check if a component is enabled
    pub fn is_component_enabled(&self, name: &str) -> bool {
        *self.components.get(name).unwrap_or(&false)
    }

    /// Parsed timezone
    pub fn tz(&self) -> CalendarResult<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| config_error(&format!("Unknown timezone: {}", self.timezone)))
    }

    /// Parsed first day of the week
    pub fn week_start(&self) -> CalendarResult<Weekday> {
        self.first_day_of_week
            .parse::<Weekday>()
            .map_err(|_| config_error(&format!("Unknown weekday: {}", self.first_day_of_week)))
    }
}

/// Default component toggles: every source enabled
pub fn default_components() -> HashMap<String, bool> {
    let mut components = HashMap::new();
    components.insert(component_names::FREE_FORM_EVENTS.to_string(), true);
    components.insert(component_names::CAPACITY_EVENTS.to_string(), true);
    components
}

/// Merge component toggles from a TOML file over the defaults
pub fn load_components(path: &Path) -> HashMap<String, bool> {
    let mut components = default_components();

    if let Ok(content) = fs::read_to_string(path) {
        match parse_components(&content) {
            Ok(file_components) => {
                for (key, value) in file_components {
                    components.insert(key, value);
                }
            }
            Err(e) => tracing::warn!("Ignoring {}: {}", path.display(), e),
        }
    }

    components
}

/// Parse a components file body
pub fn parse_components(content: &str) -> CalendarResult<HashMap<String, bool>> {
    Ok(toml::from_str::<HashMap<String, bool>>(content)?)
}
