//! Runtime configuration read from the environment (and `.env`).

use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub port: u16,
    /// Postgres connection string. Without one the service keeps everything in memory.
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub nats_url: Option<String>,
    pub nats_subject_prefix: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}")]
    Invalid { key: &'static str, value: String },
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Ok(Self {
            port: parse(&non_empty, "PORT", 8083)?,
            database_url: non_empty("DATABASE_URL"),
            max_connections: parse(&non_empty, "DATABASE_MAX_CONNECTIONS", 10)?,
            nats_url: non_empty("NATS_URL"),
            nats_subject_prefix: non_empty("NATS_SUBJECT_PREFIX").unwrap_or_else(|| "evoque".to_string()),
        })
    }
}

fn parse<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &'static str, default: T) -> Result<T, ConfigError> {
    match lookup(key) {
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let c = config(&[]).unwrap();
        assert_eq!(c.port, 8083);
        assert_eq!(c.max_connections, 10);
        assert_eq!(c.database_url, None);
        assert_eq!(c.nats_subject_prefix, "evoque");
    }

    #[test]
    fn test_overrides_and_blank_values() {
        let c = config(&[("PORT", "4000"), ("DATABASE_URL", "postgres://localhost/evoque"), ("NATS_URL", " ")]).unwrap();
        assert_eq!(c.port, 4000);
        assert_eq!(c.database_url.as_deref(), Some("postgres://localhost/evoque"));
        assert_eq!(c.nats_url, None);
    }

    #[test]
    fn test_invalid_port() {
        assert_eq!(config(&[("PORT", "http")]).unwrap_err(), ConfigError::Invalid { key: "PORT", value: "http".into() });
    }
}
