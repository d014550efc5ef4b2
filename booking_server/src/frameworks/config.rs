use std::collections::HashMap;
use std::str::FromStr;
use std::{env, fs};

use chrono::FixedOffset;
use serde::Deserialize;
use thiserror::Error;

use crate::domain::lockout::{
    DEFAULT_COUNTER_WINDOW_SECS, DEFAULT_LOCK_DURATION_SECS, DEFAULT_MAX_ATTEMPTS, LockoutPolicy,
};
use crate::domain::query::DEFAULT_UTC_OFFSET_SECS;
use crate::interface_adapters::clients::CloudinaryConfig;

// Runtime configuration: optional TOML file, overridden by environment variables.

pub const CONFIG_PATH_ENV: &str = "BOOKING_CONFIG";
pub const DEFAULT_PORT: u16 = 3003;
pub const DEFAULT_SESSION_TTL_HOURS: u64 = 12;
pub const DEFAULT_API_BASE: &str = "https://api.cloudinary.com/v1_1";
pub const DEFAULT_BOOKING_PREFIX: &str = "booking";
pub const DEFAULT_RESOURCE_TYPE: &str = "raw";
pub const DEFAULT_DELIVERY_TYPE: &str = "upload";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Toml {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Clone, Debug)]
pub struct AdminSettings {
    pub username: String,
    pub password: String,
    pub secret: String,
    pub session_ttl_secs: u64,
}

#[derive(Clone, Debug)]
pub struct Settings {
    pub port: u16,
    pub admin: AdminSettings,
    pub lockout: LockoutPolicy,
    pub store: CloudinaryConfig,
    pub booking_prefix: String,
    pub utc_offset: FixedOffset,
}

// Shape of the optional TOML file. Every key may be omitted.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub port: Option<u16>,
    pub admin: AdminSection,
    pub lockout: LockoutSection,
    pub store: StoreSection,
    pub query: QuerySection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AdminSection {
    pub user: Option<String>,
    pub password: Option<String>,
    pub secret: Option<String>,
    pub session_ttl_hours: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LockoutSection {
    pub max_attempts: Option<u32>,
    pub lock_minutes: Option<u64>,
    pub counter_window_minutes: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    pub cloud_name: Option<String>,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    pub api_base: Option<String>,
    pub prefix: Option<String>,
    pub resource_type: Option<String>,
    pub delivery_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct QuerySection {
    pub tz_offset_minutes: Option<i32>,
}

impl FileConfig {
    pub fn parse(path: &str, contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|source| ConfigError::Toml {
            path: path.to_string(),
            source,
        })
    }

    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_string(),
            source,
        })?;
        Self::parse(path, &contents)
    }
}

impl Settings {
    // Process environment plus the file named by BOOKING_CONFIG, if any.
    pub fn from_env() -> Result<Self, ConfigError> {
        let file = match env::var(CONFIG_PATH_ENV) {
            Ok(path) if !path.trim().is_empty() => FileConfig::load(path.trim())?,
            _ => FileConfig::default(),
        };
        let vars: HashMap<String, String> = env::vars().collect();
        Self::from_sources(file, &vars)
    }

    pub fn from_sources(
        file: FileConfig,
        vars: &HashMap<String, String>,
    ) -> Result<Self, ConfigError> {
        let sources = Sources { vars };

        let port = sources.parsed("BOOKING_SERVER_PORT", file.port, DEFAULT_PORT)?;

        let admin = AdminSettings {
            username: sources.required("ADMIN_USER", file.admin.user)?,
            password: sources.required("ADMIN_PASS", file.admin.password)?,
            secret: sources.required("ADMIN_JWT_SECRET", file.admin.secret)?,
            session_ttl_secs: sources.seconds(
                "ADMIN_SESSION_TTL_HOURS",
                file.admin.session_ttl_hours,
                DEFAULT_SESSION_TTL_HOURS,
                3600,
            )?,
        };

        let lockout = LockoutPolicy {
            max_attempts: sources.positive(
                "LOGIN_MAX_ATTEMPTS",
                file.lockout.max_attempts,
                DEFAULT_MAX_ATTEMPTS,
            )?,
            lock_duration_secs: sources.seconds(
                "LOGIN_LOCK_MINUTES",
                file.lockout.lock_minutes,
                DEFAULT_LOCK_DURATION_SECS / 60,
                60,
            )?,
            counter_window_secs: sources.seconds(
                "LOGIN_COUNTER_WINDOW_MINUTES",
                file.lockout.counter_window_minutes,
                DEFAULT_COUNTER_WINDOW_SECS / 60,
                60,
            )?,
        };

        let store = CloudinaryConfig {
            api_base: sources.text("CLOUDINARY_API_BASE", file.store.api_base, DEFAULT_API_BASE),
            cloud_name: sources.required("CLOUDINARY_CLOUD_NAME", file.store.cloud_name)?,
            api_key: sources.required("CLOUDINARY_API_KEY", file.store.api_key)?,
            api_secret: sources.required("CLOUDINARY_API_SECRET", file.store.api_secret)?,
            resource_type: sources.text(
                "CLOUDINARY_RESOURCE_TYPE",
                file.store.resource_type,
                DEFAULT_RESOURCE_TYPE,
            ),
            delivery_type: sources.text(
                "CLOUDINARY_DELIVERY_TYPE",
                file.store.delivery_type,
                DEFAULT_DELIVERY_TYPE,
            ),
        };

        let booking_prefix = sources.text(
            "CLOUDINARY_BOOKING_PREFIX",
            file.store.prefix,
            DEFAULT_BOOKING_PREFIX,
        );
        validate_prefix(&booking_prefix)?;

        let offset_minutes = sources.parsed(
            "BOOKING_TZ_OFFSET_MINUTES",
            file.query.tz_offset_minutes,
            DEFAULT_UTC_OFFSET_SECS / 60,
        )?;
        let utc_offset = offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| ConfigError::Invalid {
                key: "BOOKING_TZ_OFFSET_MINUTES",
                reason: format!("{offset_minutes} is not a valid UTC offset"),
            })?;

        Ok(Self {
            port,
            admin,
            lockout,
            store,
            booking_prefix,
            utc_offset,
        })
    }
}

struct Sources<'a> {
    vars: &'a HashMap<String, String>,
}

impl Sources<'_> {
    fn var(&self, key: &str) -> Option<String> {
        self.vars
            .get(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn required(&self, key: &'static str, file: Option<String>) -> Result<String, ConfigError> {
        self.var(key)
            .or_else(|| file.filter(|value| !value.trim().is_empty()))
            .ok_or(ConfigError::Missing(key))
    }

    fn text(&self, key: &'static str, file: Option<String>, default: &str) -> String {
        self.var(key)
            .or_else(|| file.filter(|value| !value.trim().is_empty()))
            .unwrap_or_else(|| default.to_string())
    }

    fn parsed<T>(&self, key: &'static str, file: Option<T>, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.var(key) {
            Some(raw) => raw.parse().map_err(|err: T::Err| ConfigError::Invalid {
                key,
                reason: err.to_string(),
            }),
            None => Ok(file.unwrap_or(default)),
        }
    }

    fn positive<T>(&self, key: &'static str, file: Option<T>, default: T) -> Result<T, ConfigError>
    where
        T: FromStr + PartialOrd + Default + std::fmt::Display,
        T::Err: std::fmt::Display,
    {
        let value = self.parsed(key, file, default)?;
        if value <= T::default() {
            return Err(ConfigError::Invalid {
                key,
                reason: format!("{value} must be greater than zero"),
            });
        }
        Ok(value)
    }

    // A positive count of `unit_secs`-long units, converted to seconds.
    fn seconds(
        &self,
        key: &'static str,
        file: Option<u64>,
        default: u64,
        unit_secs: u64,
    ) -> Result<u64, ConfigError> {
        let units = self.positive(key, file, default)?;
        units
            .checked_mul(unit_secs)
            .ok_or_else(|| ConfigError::Invalid {
                key,
                reason: format!("{units} is too large"),
            })
    }
}

// The prefix is rendered unescaped in front of the search wildcard.
fn validate_prefix(prefix: &str) -> Result<(), ConfigError> {
    let valid = !prefix.is_empty()
        && prefix
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '/'));
    if valid {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            key: "CLOUDINARY_BOOKING_PREFIX",
            reason: format!("{prefix:?} allows only letters, digits, _ - /"),
        })
    }
}
