//! Typed settings from environment variables.
//!
//! Everything has a usable default; values are read once at startup by
//! the binary. In local dev, call `dotenvy::dotenv().ok()` first.

use std::time::Duration;

use crate::error::{Error, Result};
use crate::worker::WorkerConfig;

#[derive(Debug)]
pub struct Config {
    pub worker_id: String,
    pub max_tries: u32,
    pub blocking_interval: Duration,
    pub sleep: Duration,
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            worker_id: std::env::var("RELAYQ_WORKER_ID")
                .unwrap_or_else(|_| "worker-1".to_string()),
            max_tries: parsed_var("RELAYQ_MAX_TRIES", 3)?,
            blocking_interval: Duration::from_secs(parsed_var(
                "RELAYQ_BLOCKING_INTERVAL_SECS",
                3,
            )?),
            sleep: Duration::from_secs(parsed_var("RELAYQ_SLEEP_SECS", 0)?),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            max_tries: self.max_tries,
            blocking_interval: self.blocking_interval,
            sleep: self.sleep,
        }
    }
}

fn parsed_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| Error::Config(format!("environment variable {name} is invalid: {raw}"))),
        Err(_) => Ok(default),
    }
}
