//! Request logger configuration.
//!
//! [`Config`] carries everything [`RequestLogger::from_config`] needs. Build
//! it directly, start from [`Config::default`], or read it from the
//! environment:
//!
//! | Variable | Meaning | Default |
//! |---|---|---|
//! | `TSU_LOG_LEVEL` | `error`, `warn`, `info`, `debug`, `trace` | `info` |
//! | `TSU_LOG_FORMAT` | `text` or `json` | `text` |
//! | `TSU_LOG_NAME` | name used in `measure#<name>.latency` | `web` |
//! | `TSU_LOG_STARTING` | log `started handling request` (`true`/`false`) | `true` |
//! | `TSU_LOG_EXCLUDE` | comma-separated paths not to log | empty |
//!
//! [`RequestLogger::from_config`]: crate::middleware::RequestLogger::from_config

use std::str::FromStr;

use tracing::Level;

use crate::error::Error;

/// Output format of the access log.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Format {
    #[default]
    Text,
    Json,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub level: Level,
    pub format: Format,
    pub name: String,
    pub log_starting: bool,
    pub exclude: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: Format::Text,
            name: "web".to_owned(),
            log_starting: true,
            exclude: Vec::new(),
        }
    }
}

impl Config {
    /// Reads the `TSU_LOG_*` variables. Unset variables keep their defaults.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidConfig`] for a value that does not parse.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env), reading values through `lookup`.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidConfig`] for a value that does not parse.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let mut config = Self::default();

        if let Some(value) = lookup("TSU_LOG_LEVEL") {
            config.level = Level::from_str(value.trim())
                .map_err(|_| Error::InvalidConfig { key: "TSU_LOG_LEVEL", value })?;
        }
        if let Some(value) = lookup("TSU_LOG_FORMAT") {
            config.format = match value.trim().to_ascii_lowercase().as_str() {
                "text" => Format::Text,
                "json" => Format::Json,
                _ => return Err(Error::InvalidConfig { key: "TSU_LOG_FORMAT", value }),
            };
        }
        if let Some(value) = lookup("TSU_LOG_NAME") {
            config.name = value;
        }
        if let Some(value) = lookup("TSU_LOG_STARTING") {
            config.log_starting = parse_bool(&value)
                .ok_or(Error::InvalidConfig { key: "TSU_LOG_STARTING", value })?;
        }
        if let Some(value) = lookup("TSU_LOG_EXCLUDE") {
            config.exclude = value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
                .collect();
        }

        Ok(config)
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}
