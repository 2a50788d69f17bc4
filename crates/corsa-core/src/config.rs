// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration loading from environment variables.

use std::time::Duration;

use crate::dispatch::DispatchConfig;
use crate::monitor::MonitorConfig;

/// Orchestrator configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum dispatch tasks in flight at once.
    pub dispatch_workers: usize,
    /// Retries of a transient execute failure before giving up.
    pub max_retries: u32,
    /// Base delay of the exponential retry backoff.
    pub backoff: Duration,
    /// Bound on every backend call.
    pub call_timeout: Duration,
    /// How often the monitor probes active runnables.
    pub poll_interval: Duration,
    /// Optional SQLite database path for durable runnable stores.
    pub database_path: Option<std::path::PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dispatch_workers: 16,
            max_retries: 3,
            backoff: Duration::from_millis(250),
            call_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_secs(10),
            database_path: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// All variables are optional:
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `CORSA_DISPATCH_WORKERS` | `16` | Max dispatch tasks in flight |
    /// | `CORSA_MAX_RETRIES` | `3` | Transient execute retries |
    /// | `CORSA_BACKOFF_MS` | `250` | Base retry backoff in milliseconds |
    /// | `CORSA_CALL_TIMEOUT_SECS` | `30` | Bound on backend calls |
    /// | `CORSA_POLL_INTERVAL_SECS` | `10` | Monitor poll cadence |
    /// | `CORSA_DATABASE_PATH` | - | SQLite path for durable stores |
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let dispatch_workers = parse_var(
            "CORSA_DISPATCH_WORKERS",
            defaults.dispatch_workers,
            "must be a positive integer",
        )?;
        let max_retries = parse_var(
            "CORSA_MAX_RETRIES",
            defaults.max_retries,
            "must be a non-negative integer",
        )?;
        let backoff_ms = parse_var(
            "CORSA_BACKOFF_MS",
            defaults.backoff.as_millis() as u64,
            "must be a non-negative integer",
        )?;
        let call_timeout_secs = parse_var(
            "CORSA_CALL_TIMEOUT_SECS",
            defaults.call_timeout.as_secs(),
            "must be a positive integer",
        )?;
        let poll_interval_secs = parse_var(
            "CORSA_POLL_INTERVAL_SECS",
            defaults.poll_interval.as_secs(),
            "must be a positive integer",
        )?;

        if dispatch_workers == 0 {
            return Err(ConfigError::Invalid(
                "CORSA_DISPATCH_WORKERS",
                "must be a positive integer",
            ));
        }

        let database_path = std::env::var("CORSA_DATABASE_PATH")
            .ok()
            .map(std::path::PathBuf::from);

        Ok(Self {
            dispatch_workers,
            max_retries,
            backoff: Duration::from_millis(backoff_ms),
            call_timeout: Duration::from_secs(call_timeout_secs),
            poll_interval: Duration::from_secs(poll_interval_secs),
            database_path,
        })
    }

    /// Dispatch loop tuning derived from this configuration.
    pub fn dispatch(&self) -> DispatchConfig {
        DispatchConfig {
            max_concurrency: self.dispatch_workers,
            max_retries: self.max_retries,
            backoff_base: self.backoff,
            call_timeout: self.call_timeout,
        }
    }

    /// Monitor tuning derived from this configuration.
    pub fn monitor(&self) -> MonitorConfig {
        MonitorConfig {
            poll_interval: self.poll_interval,
            call_timeout: self.call_timeout,
        }
    }
}

fn parse_var<T: std::str::FromStr>(
    name: &'static str,
    default: T,
    reason: &'static str,
) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw.parse().map_err(|_| ConfigError::Invalid(name, reason)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, &'static str),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Mutex to serialize tests that modify environment variables
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// Helper to set env vars for a test and restore them after
    struct EnvGuard {
        vars: Vec<(String, Option<String>)>,
    }

    impl EnvGuard {
        fn new() -> Self {
            Self { vars: Vec::new() }
        }

        fn set(&mut self, key: &str, value: &str) {
            let old = env::var(key).ok();
            self.vars.push((key.to_string(), old));
            // SAFETY: Tests are serialized via ENV_MUTEX, so no concurrent access
            unsafe { env::set_var(key, value) };
        }

        fn remove(&mut self, key: &str) {
            let old = env::var(key).ok();
            self.vars.push((key.to_string(), old));
            // SAFETY: Tests are serialized via ENV_MUTEX, so no concurrent access
            unsafe { env::remove_var(key) };
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (key, value) in self.vars.drain(..).rev() {
                // SAFETY: Tests are serialized via ENV_MUTEX, so no concurrent access
                unsafe {
                    match value {
                        Some(v) => env::set_var(&key, v),
                        None => env::remove_var(&key),
                    }
                }
            }
        }
    }

    fn clear_all(guard: &mut EnvGuard) {
        for key in [
            "CORSA_DISPATCH_WORKERS",
            "CORSA_MAX_RETRIES",
            "CORSA_BACKOFF_MS",
            "CORSA_CALL_TIMEOUT_SECS",
            "CORSA_POLL_INTERVAL_SECS",
            "CORSA_DATABASE_PATH",
        ] {
            guard.remove(key);
        }
    }

    #[test]
    fn defaults_without_environment() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::new();
        clear_all(&mut guard);

        let config = Config::from_env().unwrap();
        assert_eq!(config.dispatch_workers, 16);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.backoff, Duration::from_millis(250));
        assert_eq!(config.call_timeout, Duration::from_secs(30));
        assert_eq!(config.poll_interval, Duration::from_secs(10));
        assert!(config.database_path.is_none());
    }

    #[test]
    fn custom_values() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::new();
        clear_all(&mut guard);

        guard.set("CORSA_DISPATCH_WORKERS", "4");
        guard.set("CORSA_MAX_RETRIES", "7");
        guard.set("CORSA_BACKOFF_MS", "1000");
        guard.set("CORSA_POLL_INTERVAL_SECS", "2");
        guard.set("CORSA_DATABASE_PATH", "/var/lib/corsa/runnables.db");

        let config = Config::from_env().unwrap();
        assert_eq!(config.dispatch_workers, 4);
        assert_eq!(config.max_retries, 7);
        assert_eq!(config.backoff, Duration::from_millis(1000));
        assert_eq!(config.poll_interval, Duration::from_secs(2));
        assert_eq!(
            config.database_path.as_deref(),
            Some(std::path::Path::new("/var/lib/corsa/runnables.db"))
        );
    }

    #[test]
    fn invalid_values_are_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::new();
        clear_all(&mut guard);

        guard.set("CORSA_MAX_RETRIES", "many");
        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid("CORSA_MAX_RETRIES", _)));
    }

    #[test]
    fn zero_workers_is_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::new();
        clear_all(&mut guard);

        guard.set("CORSA_DISPATCH_WORKERS", "0");
        assert!(Config::from_env().is_err());
    }

    #[test]
    fn derived_tunings_match() {
        let config = Config::default();
        let dispatch = config.dispatch();
        assert_eq!(dispatch.max_concurrency, config.dispatch_workers);
        assert_eq!(dispatch.call_timeout, config.call_timeout);
        let monitor = config.monitor();
        assert_eq!(monitor.poll_interval, config.poll_interval);
    }
}
