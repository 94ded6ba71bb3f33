//! Runtime configuration from environment variables

use crate::state_machine::DialogContext;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_PAGE_SIZE: usize = 6;
const DEFAULT_HISTORY_LIMIT: usize = 10;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must be {expected}, got {value:?}")]
    Invalid {
        name: &'static str,
        value: String,
        expected: &'static str,
    },
}

#[derive(Debug, Clone)]
pub struct BotConfig {
    pub db_path: PathBuf,
    pub port: u16,
    pub page_size: NonZeroUsize,
    pub history_limit: usize,
    /// Passphrase for `/export`; export is disabled when unset
    pub export_secret: Option<String>,
    /// Idle sessions are evicted after this long; never when unset
    pub session_idle: Option<Duration>,
}

impl BotConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source; invalid values fall back to defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let db_path = lookup("WORKOUT_DB_PATH").map_or_else(
            || {
                let home = lookup("HOME").unwrap_or_else(|| "/tmp".to_string());
                PathBuf::from(format!("{home}/.workout-log/workout.db"))
            },
            PathBuf::from,
        );

        let port = or_default(parse_var(&lookup, "WORKOUT_PORT", "a port number"), DEFAULT_PORT);

        let page_size = or_default(
            parse_var::<usize>(&lookup, "WORKOUT_PAGE_SIZE", "a positive integer").and_then(
                |size| match size {
                    Some(size) => NonZeroUsize::new(size).map(Some).ok_or_else(|| {
                        ConfigError::Invalid {
                            name: "WORKOUT_PAGE_SIZE",
                            value: size.to_string(),
                            expected: "a positive integer",
                        }
                    }),
                    None => Ok(None),
                },
            ),
            NonZeroUsize::new(DEFAULT_PAGE_SIZE).unwrap_or(NonZeroUsize::MIN),
        );

        let history_limit = or_default(
            parse_var(&lookup, "WORKOUT_HISTORY_LIMIT", "a non-negative integer"),
            DEFAULT_HISTORY_LIMIT,
        );

        let export_secret = lookup("WORKOUT_EXPORT_SECRET").filter(|s| !s.trim().is_empty());

        let session_idle = parse_var::<u64>(&lookup, "WORKOUT_SESSION_IDLE_SECS", "whole seconds")
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Ignoring invalid setting, idle eviction disabled");
                None
            })
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        Self {
            db_path,
            port,
            page_size,
            history_limit,
            export_secret,
            session_idle,
        }
    }

    pub fn dialog_context(&self) -> DialogContext {
        DialogContext::new(self.page_size, self.history_limit)
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    expected: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(name) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid {
                name,
                value,
                expected,
            }),
    }
}

fn or_default<T>(parsed: Result<Option<T>, ConfigError>, default: T) -> T {
    match parsed {
        Ok(value) => value.unwrap_or(default),
        Err(e) => {
            tracing::warn!(error = %e, "Ignoring invalid setting, using default");
            default
        }
    }
}
