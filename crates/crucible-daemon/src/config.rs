// SPDX-License-Identifier: MIT

//! Environment-sourced configuration (SPEC_FULL.md's Configuration
//! module), grounded on
//! `fourthplaces-mntogether/packages/server/src/config.rs`'s
//! `Config::from_env` + `anyhow::Context` idiom.

use anyhow::{Context, Result};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub max_concurrent: usize,
    pub poll_interval: Duration,
    pub heartbeat_interval: Duration,
    pub reaper_interval: Duration,
    pub stale_threshold: Duration,
    pub scheduler_interval: Duration,
    pub shutdown_drain: Duration,
    pub container_name_prefix: String,
    /// Grace period for kill/reaper stops (spec.md §4.7 step 1, §4.9 kill).
    pub stop_grace: Duration,
    /// Grace period for timeout-triggered stops (spec.md §4.5 step 8).
    pub timeout_stop_grace: Duration,
}

impl Config {
    /// Load from the environment, optionally via a `.env` file
    /// (SPEC_FULL.md's Configuration module; defaults match spec.md §4.5,
    /// §4.6, §4.7, §4.8).
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();

        Ok(Self {
            database_url: env_var("DATABASE_URL").context("DATABASE_URL must be set")?,
            bind_addr: env_var_or("BIND_ADDR", "0.0.0.0:8080"),
            max_concurrent: env_parse_or("MAX_CONCURRENT", 5)?,
            poll_interval: Duration::from_millis(env_parse_or("POLL_INTERVAL_MS", 1000)?),
            heartbeat_interval: Duration::from_secs(env_parse_or("HEARTBEAT_INTERVAL_SECS", 10)?),
            reaper_interval: Duration::from_secs(env_parse_or("REAPER_INTERVAL_SECS", 30)?),
            stale_threshold: Duration::from_secs(env_parse_or("STALE_THRESHOLD_SECS", 60)?),
            scheduler_interval: Duration::from_secs(env_parse_or("SCHEDULER_INTERVAL_SECS", 60)?),
            shutdown_drain: Duration::from_secs(env_parse_or("SHUTDOWN_DRAIN_SECS", 30)?),
            container_name_prefix: env_var_or("CONTAINER_NAME_PREFIX", "crucible"),
            stop_grace: Duration::from_secs(10),
            timeout_stop_grace: Duration::from_secs(5),
        })
    }
}

fn env_var(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("{key} must be set"))
}

fn env_var_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw.parse::<T>().map_err(|e| anyhow::anyhow!("{key} is invalid: {e}")),
        Err(_) => Ok(default),
    }
}
