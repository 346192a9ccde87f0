use std::env;

use chrono_tz::Tz;

use crate::fetch::FailurePolicy;
use crate::model::DisplayZone;

pub const DEFAULT_MONNIT_URL: &str = "https://www.imonnit.com/json/SensorChartMessages";
pub const DEFAULT_SUB_WINDOWS: u32 = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Deployment {
    Local,
    Dev,
    Stage,
    Prod,
}

impl Deployment {
    #[must_use]
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "dev" | "development" => Self::Dev,
            "stage" | "staging" => Self::Stage,
            "prod" | "production" => Self::Prod,
            _ => Self::Local,
        }
    }
}

/// Static API key pair forwarded on every Monnit request.
///
/// Neither value is validated; empty strings are sent as-is and the remote side
/// rejects them.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub key_id: String,
    pub secret: String,
}

impl Credentials {
    #[must_use]
    pub fn new(key_id: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            key_id: key_id.into(),
            secret: secret.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("key_id", &self.key_id)
            .field("secret", &"***")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    // Monnit API
    pub monnit_url: String,
    pub credentials: Credentials,

    // Fetch settings
    pub fetch_sub_windows: u32,
    pub fetch_failure_policy: FailurePolicy,
    pub display_zone: DisplayZone,

    // Chart settings
    pub chart_width: u32,
    pub chart_height: u32,

    // API settings
    pub api_host: String,
    pub api_port: u16,

    // Application metadata
    pub deployment: Deployment,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            monnit_url: DEFAULT_MONNIT_URL.to_string(),
            credentials: Credentials::default(),
            fetch_sub_windows: DEFAULT_SUB_WINDOWS,
            fetch_failure_policy: FailurePolicy::FailFast,
            display_zone: DisplayZone::Local,
            chart_width: 1024,
            chart_height: 640,
            api_host: "0.0.0.0".to_string(),
            api_port: 3000,
            deployment: Deployment::Local,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if a variable is set to a value that has no
    /// sensible fallback (zero sub-windows, unknown policy, unknown time zone).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let fetch_sub_windows: u32 = env::var("FETCH_SUB_WINDOWS")
            .unwrap_or_else(|_| DEFAULT_SUB_WINDOWS.to_string())
            .parse()
            .unwrap_or(DEFAULT_SUB_WINDOWS);
        if fetch_sub_windows == 0 {
            return Err(ConfigError::Invalid(
                "FETCH_SUB_WINDOWS",
                "must be at least 1".to_string(),
            ));
        }

        let policy_raw = env::var("FETCH_FAILURE_POLICY").unwrap_or_else(|_| "fail-fast".to_string());
        let fetch_failure_policy = FailurePolicy::parse(&policy_raw).ok_or_else(|| {
            ConfigError::Invalid(
                "FETCH_FAILURE_POLICY",
                format!("unknown policy '{policy_raw}', expected fail-fast or best-effort"),
            )
        })?;

        let display_zone = match env::var("DISPLAY_TIMEZONE") {
            Ok(name) if !name.trim().is_empty() => {
                let tz: Tz = name.trim().parse().map_err(|_| {
                    ConfigError::Invalid("DISPLAY_TIMEZONE", format!("unknown time zone '{name}'"))
                })?;
                DisplayZone::Named(tz)
            }
            _ => DisplayZone::Local,
        };

        Ok(Self {
            // Monnit API
            monnit_url: env::var("MONNIT_API_URL").unwrap_or_else(|_| DEFAULT_MONNIT_URL.to_string()),
            credentials: Credentials::new(
                env::var("API_KEY").unwrap_or_default(),
                env::var("API_SECRET").unwrap_or_default(),
            ),

            // Fetch settings
            fetch_sub_windows,
            fetch_failure_policy,
            display_zone,

            // Chart settings
            chart_width: env::var("CHART_WIDTH")
                .unwrap_or_else(|_| "1024".to_string())
                .parse()
                .unwrap_or(1024),
            chart_height: env::var("CHART_HEIGHT")
                .unwrap_or_else(|_| "640".to_string())
                .parse()
                .unwrap_or(640),

            // API settings
            api_host: env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            api_port: env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .unwrap_or(3000),

            // Application metadata
            deployment: Deployment::from_str(
                &env::var("DEPLOYMENT").unwrap_or_else(|_| "local".to_string()),
            ),
        })
    }

    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api_host, self.api_port)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}
