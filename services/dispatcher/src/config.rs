use std::time::Duration;

use anyhow::Result;

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub reconcile_interval: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let log_level = std::env::var("DEPFLEET_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let reconcile_interval = std::env::var("DEPFLEET_RECONCILE_INTERVAL_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse::<u64>()
            .map(Duration::from_secs)?;

        Ok(Self {
            log_level,
            reconcile_interval,
        })
    }
}
