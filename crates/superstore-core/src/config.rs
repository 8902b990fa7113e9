//! Environment-driven configuration.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::ident::Identifier;

pub const DB_HOST_VAR: &str = "DB_HOST";
pub const DB_NAME_VAR: &str = "DB_NAME";
pub const DB_USER_VAR: &str = "DB_USER";
pub const DB_PASSWORD_VAR: &str = "DB_PASSWORD";
pub const DB_PORT_VAR: &str = "DB_PORT";
pub const DB_ADMIN_DATABASE_VAR: &str = "DB_ADMIN_DATABASE";
pub const CSV_PATH_VAR: &str = "CSV_PATH";
pub const WAIT_INTERVAL_VAR: &str = "DB_WAIT_INTERVAL_SECS";
pub const WAIT_MAX_ATTEMPTS_VAR: &str = "DB_WAIT_MAX_ATTEMPTS";

pub const DEFAULT_PORT: u16 = 5432;
pub const DEFAULT_ADMIN_DATABASE: &str = "postgres";
pub const DEFAULT_CSV_PATH: &str = "/data/SuperStoreData.csv";
pub const DEFAULT_WAIT_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("required environment variable {var} is not set")]
    Missing { var: &'static str },

    #[error("environment variable {var} has invalid value {value:?}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// How long and how often to probe the server before giving up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    pub interval: Duration,
    /// `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_WAIT_INTERVAL,
            max_attempts: None,
        }
    }
}

#[derive(Clone)]
pub struct EtlConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub admin_database: String,
    pub target_database: Identifier,
    pub csv_path: PathBuf,
    pub wait: WaitPolicy,
}

impl std::fmt::Debug for EtlConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EtlConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("admin_database", &self.admin_database)
            .field("target_database", &self.target_database)
            .field("csv_path", &self.csv_path)
            .field("wait", &self.wait)
            .finish()
    }
}

impl EtlConfig {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> crate::error::Result<Self> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> crate::error::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |var: &'static str| -> Result<String, ConfigError> {
            lookup(var)
                .filter(|value| !value.trim().is_empty())
                .ok_or(ConfigError::Missing { var })
        };
        let optional = |var: &'static str| lookup(var).filter(|value| !value.trim().is_empty());

        let host = required(DB_HOST_VAR)?;
        let name = required(DB_NAME_VAR)?;
        let user = required(DB_USER_VAR)?;
        let password = required(DB_PASSWORD_VAR)?;

        let port = match optional(DB_PORT_VAR) {
            Some(raw) => parse_number::<u16>(DB_PORT_VAR, &raw)?,
            None => DEFAULT_PORT,
        };
        let admin_database =
            optional(DB_ADMIN_DATABASE_VAR).unwrap_or_else(|| DEFAULT_ADMIN_DATABASE.to_string());
        let csv_path = optional(CSV_PATH_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CSV_PATH));

        let interval = match optional(WAIT_INTERVAL_VAR) {
            Some(raw) => Duration::from_secs(parse_number::<u64>(WAIT_INTERVAL_VAR, &raw)?),
            None => DEFAULT_WAIT_INTERVAL,
        };
        let max_attempts = match optional(WAIT_MAX_ATTEMPTS_VAR) {
            Some(raw) => {
                let attempts = parse_number::<u32>(WAIT_MAX_ATTEMPTS_VAR, &raw)?;
                if attempts == 0 {
                    return Err(ConfigError::Invalid {
                        var: WAIT_MAX_ATTEMPTS_VAR,
                        value: raw,
                        reason: "must be at least 1".into(),
                    }
                    .into());
                }
                Some(attempts)
            }
            None => None,
        };

        let target_database = Identifier::parse_target_database(name.trim(), &admin_database)?;

        Ok(Self {
            host,
            port,
            user,
            password,
            admin_database,
            target_database,
            csv_path,
            wait: WaitPolicy {
                interval,
                max_attempts,
            },
        })
    }
}

fn parse_number<T>(var: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse::<T>().map_err(|err| ConfigError::Invalid {
        var,
        value: raw.to_string(),
        reason: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::error::EtlError;

    fn base_env() -> HashMap<&'static str, String> {
        HashMap::from([
            (DB_HOST_VAR, "db".to_string()),
            (DB_NAME_VAR, "superstore".to_string()),
            (DB_USER_VAR, "etl".to_string()),
            (DB_PASSWORD_VAR, "secret".to_string()),
        ])
    }

    fn load(env: &HashMap<&'static str, String>) -> crate::error::Result<EtlConfig> {
        EtlConfig::from_lookup(|var| env.get(var).cloned())
    }

    #[test]
    fn applies_defaults_for_optional_settings() {
        let config = load(&base_env()).expect("config");
        assert_eq!(config.host, "db");
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.admin_database, "postgres");
        assert_eq!(config.target_database.as_str(), "superstore");
        assert_eq!(config.csv_path, PathBuf::from(DEFAULT_CSV_PATH));
        assert_eq!(config.wait, WaitPolicy::default());
        assert_eq!(config.wait.interval, Duration::from_secs(5));
        assert!(config.wait.max_attempts.is_none());
    }

    #[test]
    fn every_required_variable_fails_fast_when_absent_or_blank() {
        for var in [DB_HOST_VAR, DB_NAME_VAR, DB_USER_VAR, DB_PASSWORD_VAR] {
            let mut env = base_env();
            env.remove(var);
            match load(&env) {
                Err(EtlError::Config(ConfigError::Missing { var: missing })) => {
                    assert_eq!(missing, var)
                }
                other => panic!("expected missing {var}, got {other:?}"),
            }

            let mut env = base_env();
            env.insert(var, "   ".into());
            assert!(matches!(
                load(&env),
                Err(EtlError::Config(ConfigError::Missing { .. }))
            ));
        }
    }

    #[test]
    fn parses_optional_overrides() {
        let mut env = base_env();
        env.insert(DB_PORT_VAR, "6543".into());
        env.insert(DB_ADMIN_DATABASE_VAR, "maintenance".into());
        env.insert(CSV_PATH_VAR, "/tmp/orders.csv".into());
        env.insert(WAIT_INTERVAL_VAR, "1".into());
        env.insert(WAIT_MAX_ATTEMPTS_VAR, "12".into());

        let config = load(&env).expect("config");
        assert_eq!(config.port, 6543);
        assert_eq!(config.admin_database, "maintenance");
        assert_eq!(config.csv_path, PathBuf::from("/tmp/orders.csv"));
        assert_eq!(
            config.wait,
            WaitPolicy {
                interval: Duration::from_secs(1),
                max_attempts: Some(12),
            }
        );
    }

    #[test]
    fn rejects_unparseable_numbers() {
        let mut env = base_env();
        env.insert(DB_PORT_VAR, "70000".into());
        assert!(matches!(
            load(&env),
            Err(EtlError::Config(ConfigError::Invalid { var: DB_PORT_VAR, .. }))
        ));

        let mut env = base_env();
        env.insert(WAIT_MAX_ATTEMPTS_VAR, "0".into());
        assert!(matches!(
            load(&env),
            Err(EtlError::Config(ConfigError::Invalid {
                var: WAIT_MAX_ATTEMPTS_VAR,
                ..
            }))
        ));
    }

    #[test]
    fn rejects_unsafe_database_names() {
        let mut env = base_env();
        env.insert(DB_NAME_VAR, "x\"; DROP DATABASE postgres; --".into());
        assert!(matches!(
            load(&env),
            Err(EtlError::InvalidIdentifier { .. })
        ));

        let mut env = base_env();
        env.insert(DB_NAME_VAR, "postgres".into());
        assert!(matches!(
            load(&env),
            Err(EtlError::InvalidIdentifier { .. })
        ));
    }

    #[test]
    fn debug_output_hides_the_password() {
        let config = load(&base_env()).expect("config");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
