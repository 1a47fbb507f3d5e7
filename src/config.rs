use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;
use tracing::{info, warn};

const DEFAULT_ADMIN_PASSWORD: &str = "admin123";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid {key} value '{value}': {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub admin_password: String,
    /// Where the JSON stores live
    pub data_dir: PathBuf,
    /// Front-end files served at `/` when the directory exists
    pub static_dir: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let admin_password = env::var("ADMIN_PASSWORD").unwrap_or_else(|_| {
            warn!("ADMIN_PASSWORD not set, using the default password; change this!");
            DEFAULT_ADMIN_PASSWORD.to_string()
        });

        Ok(Self {
            port: try_load("PORT", "8080")?,
            admin_password,
            data_dir: try_load("DATA_DIR", "data")?,
            static_dir: try_load("STATIC_DIR", "static")?,
        })
    }
}

fn try_load<T: FromStr>(key: &'static str, default: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    let value = env::var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });
    match value.parse() {
        Ok(parsed) => Ok(parsed),
        Err(e) => {
            warn!("Invalid {key} value: {e}");
            Err(ConfigError::Invalid {
                key,
                value,
                reason: e.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_variable_falls_back_to_default() {
        let port: u16 = try_load("OFFICER_SCHEDULER_TEST_UNSET_PORT", "9090").unwrap();
        assert_eq!(port, 9090);
    }

    #[test]
    fn unparsable_value_is_reported() {
        let err = try_load::<u16>("OFFICER_SCHEDULER_TEST_UNSET_BAD", "eighty").unwrap_err();
        assert!(err.to_string().contains("eighty"));
    }
}
