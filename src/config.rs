use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Page size used by every listing when nothing else is configured
pub const DEFAULT_PAGE_SIZE: u32 = 10;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),
    #[error("{name} has an invalid value '{value}': expected a positive integer")]
    Invalid { name: &'static str, value: String },
}

/// Application configuration
/// Loads from a .env file when one is present, then from the process environment.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    /// Base URL of the collection API (e.g. https://gallery.example.com/api)
    pub api_url: Option<String>,
    /// Bearer token attached to every request. Stored elsewhere, only read here.
    pub api_token: Option<String>,
    /// Items requested per listing page
    pub page_size: u32,
    /// Simultaneous image encodes. None means one encode per staged file.
    pub encode_concurrency: Option<usize>,
    pub request_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: None,
            api_token: None,
            page_size: DEFAULT_PAGE_SIZE,
            encode_concurrency: None,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl Config {
    /// Load configuration: .env file first (if any), then environment variables
    pub fn load() -> Result<Self, ConfigError> {
        if dotenvy::dotenv().is_ok() {
            info!("Config: loaded .env file");
        } else {
            debug!("Config: no .env file found, using process environment");
        }

        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    ///
    /// Split out from `load` so tests don't have to mutate the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let api_url = lookup("CURATOR_API_URL")
            .map(|v| v.trim().trim_end_matches('/').to_string())
            .filter(|v| !v.is_empty());
        let api_token = lookup("CURATOR_API_TOKEN").filter(|v| !v.trim().is_empty());

        let page_size = match lookup("CURATOR_PAGE_SIZE") {
            Some(value) => parse_positive::<u32>("CURATOR_PAGE_SIZE", &value)?,
            None => defaults.page_size,
        };

        let encode_concurrency = match lookup("CURATOR_ENCODE_CONCURRENCY") {
            Some(value) => Some(parse_positive::<usize>("CURATOR_ENCODE_CONCURRENCY", &value)?),
            None => None,
        };

        let request_timeout = match lookup("CURATOR_REQUEST_TIMEOUT_SECS") {
            Some(value) => Duration::from_secs(parse_positive::<u64>(
                "CURATOR_REQUEST_TIMEOUT_SECS",
                &value,
            )?),
            None => defaults.request_timeout,
        };

        Ok(Self {
            api_url,
            api_token,
            page_size,
            encode_concurrency,
            request_timeout,
        })
    }

    /// API base URL, or an error when no network commands can run
    pub fn require_api_url(&self) -> Result<&str, ConfigError> {
        self.api_url
            .as_deref()
            .ok_or(ConfigError::Missing("CURATOR_API_URL"))
    }
}

/// Parse straight into the target width so out-of-range values are rejected, not wrapped
fn parse_positive<T>(name: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr + PartialOrd + Default,
{
    match value.trim().parse::<T>() {
        Ok(n) if n > T::default() => Ok(n),
        _ => Err(ConfigError::Invalid {
            name,
            value: value.to_string(),
        }),
    }
}
