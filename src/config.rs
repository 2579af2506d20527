use clap::Parser;
use tracing::warn;

use crate::analytics::costs::WORKSHOP_HOURLY_RATE;
use crate::analytics::schedule::{DAILY_CAPACITY_HOURS, DEFAULT_WINDOW_DAYS, MAX_WINDOW_DAYS};

#[derive(Clone, Debug, Parser)]
#[command(name = "workshop")]
pub struct Config {
    #[arg(long, env = "WORKSHOP_PORT", default_value_t = 7410)]
    pub port: u16,

    #[arg(long, env = "WORKSHOP_DB_URL", default_value = "sqlite://./workshop.db")]
    pub db_url: String,

    #[arg(long, env = "WORKSHOP_TOKEN")]
    pub token: Option<String>,

    #[arg(long, env = "WORKSHOP_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Labor rate applied to every logged hour in cost roll-ups.
    #[arg(long, env = "WORKSHOP_LABOR_RATE", default_value_t = WORKSHOP_HOURLY_RATE)]
    pub labor_rate: f64,

    #[arg(long, env = "WORKSHOP_SCHEDULE_DAYS", default_value_t = DEFAULT_WINDOW_DAYS)]
    pub schedule_days: u32,

    #[arg(
        long,
        env = "WORKSHOP_DAILY_CAPACITY_HOURS",
        default_value_t = DAILY_CAPACITY_HOURS
    )]
    pub daily_capacity_hours: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 7410,
            db_url: "sqlite://./workshop.db".to_string(),
            token: None,
            log_level: "info".to_string(),
            labor_rate: WORKSHOP_HOURLY_RATE,
            schedule_days: DEFAULT_WINDOW_DAYS,
            daily_capacity_hours: DAILY_CAPACITY_HOURS,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let config = <Self as Parser>::parse();
        config.validate();
        config
    }

    pub fn auth_enabled(&self) -> bool {
        self.token
            .as_ref()
            .is_some_and(|value| !value.trim().is_empty())
    }

    pub fn log_startup_warnings(&self) {
        if !self.auth_enabled() {
            warn!("WORKSHOP_TOKEN is unset, bearer auth is disabled");
        }
    }

    fn validate(&self) {
        assert_positive_f64("WORKSHOP_LABOR_RATE", self.labor_rate);
        assert_positive_f64(
            "WORKSHOP_DAILY_CAPACITY_HOURS",
            self.daily_capacity_hours,
        );
        assert!(
            (1..=MAX_WINDOW_DAYS).contains(&self.schedule_days),
            "WORKSHOP_SCHEDULE_DAYS must be between 1 and {MAX_WINDOW_DAYS}"
        );
    }
}

fn assert_positive_f64(key: &'static str, value: f64) {
    assert!(
        value.is_finite() && value > 0.0,
        "{key} must be a positive number"
    );
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use crate::config::Config;

    #[test]
    fn defaults_match_workshop_constants() {
        let config = Config::parse_from(["workshop"]);
        assert_eq!(config.port, 7410);
        assert_eq!(config.labor_rate, 450.0);
        assert_eq!(config.schedule_days, 31);
        assert_eq!(config.daily_capacity_hours, 8.0);
        assert!(!config.auth_enabled());
    }

    #[test]
    fn flags_override_defaults() {
        let config = Config::parse_from([
            "workshop",
            "--labor-rate",
            "500",
            "--schedule-days",
            "14",
            "--token",
            "secret",
        ]);
        assert_eq!(config.labor_rate, 500.0);
        assert_eq!(config.schedule_days, 14);
        assert!(config.auth_enabled());
    }

    #[test]
    #[should_panic(expected = "WORKSHOP_SCHEDULE_DAYS must be between 1 and 366")]
    fn schedule_days_beyond_the_window_limit_are_rejected() {
        let config = Config::parse_from(["workshop", "--schedule-days", "400"]);
        config.validate();
    }
}
