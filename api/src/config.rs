use crate::router::FrontConfig;
use lovenote_mailer::RelayConfig;
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_DATABASE_NAME: &str = "Valentine_day";
pub const DEFAULT_SMTP_HOST: &str = "smtp.forwardemail.net";
pub const DEFAULT_LINK_BASE_URL: &str = "https://gleaming-seahorse-86d78b.netlify.app";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} must be {expected}, got {value:?}")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Development,
    Production,
}

impl FromStr for RunMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_name: String,
    pub port: u16,
    pub frontend_url: String,
    pub relay: RelayConfig,
    pub pages_dir: PathBuf,
    pub mode: RunMode,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from any variable source; `from_env` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).filter(|value| !value.is_empty());
        let required = |name: &'static str| var(name).ok_or(ConfigError::Missing(name));

        let port = parse_port(&var, "PORT", 3000)?;
        let smtp_port = parse_port(&var, "SMTP_PORT", 465)?;

        let mode = match var("APP_ENV") {
            Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
                name: "APP_ENV",
                expected: "development or production",
                value,
            })?,
            None => RunMode::Development,
        };

        let username = required("SMTP_USERNAME")?;
        let relay = RelayConfig {
            host: var("SMTP_HOST").unwrap_or_else(|| DEFAULT_SMTP_HOST.to_string()),
            port: smtp_port,
            sender: var("SMTP_SENDER").unwrap_or_else(|| username.clone()),
            username,
            password: required("SMTP_PASSWORD")?,
            link_base_url: var("LINK_BASE_URL")
                .unwrap_or_else(|| DEFAULT_LINK_BASE_URL.to_string()),
        };

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            database_name: var("DATABASE_NAME")
                .unwrap_or_else(|| DEFAULT_DATABASE_NAME.to_string()),
            port,
            frontend_url: required("FRONTEND_URL")?,
            relay,
            pages_dir: var("PAGES_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./public")),
            mode,
        })
    }

    pub fn front(&self) -> FrontConfig {
        FrontConfig {
            frontend_url: self.frontend_url.clone(),
            pages_dir: self.pages_dir.clone(),
            mode: self.mode,
        }
    }
}

fn parse_port(
    var: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: u16,
) -> Result<u16, ConfigError> {
    match var(name) {
        Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
            name,
            expected: "a valid u16",
            value,
        }),
        None => Ok(default),
    }
}
