//! Configuration types.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Service configuration, built from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// Maximum number of datasets classified in parallel.
    pub max_concurrent_analysis: usize,
    /// Where the staff roster document lives.
    pub roster_path: PathBuf,
    /// Directory datasets are resolved against.
    pub data_dir: PathBuf,
    /// Publish progress every this many records.
    pub progress_interval: usize,
    /// CORS origins; `*` allows any.
    pub allowed_origins: Vec<String>,
    pub filter: FilterConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            max_concurrent_analysis: 3,
            roster_path: PathBuf::from("./config/staff.json"),
            data_dir: PathBuf::from("./uploads"),
            progress_interval: 1000,
            allowed_origins: vec!["*".to_string()],
            filter: FilterConfig::default(),
        }
    }
}

impl AppConfig {
    /// Build config from `CHAT_FILTER_*` environment variables, falling back
    /// to defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let host = std::env::var("CHAT_FILTER_HOST").unwrap_or(defaults.host);
        let port = parse_env("CHAT_FILTER_PORT", defaults.port)?;
        let max_concurrent_analysis = parse_env(
            "CHAT_FILTER_MAX_CONCURRENT_ANALYSIS",
            defaults.max_concurrent_analysis,
        )?;
        if max_concurrent_analysis == 0 {
            return Err(ConfigError::InvalidValue {
                key: "CHAT_FILTER_MAX_CONCURRENT_ANALYSIS".into(),
                message: "must be at least 1".into(),
            });
        }

        let roster_path = std::env::var("CHAT_FILTER_ROSTER_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.roster_path);
        let data_dir = std::env::var("CHAT_FILTER_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);

        let progress_interval =
            parse_env("CHAT_FILTER_PROGRESS_INTERVAL", defaults.progress_interval)?.max(1);

        let allowed_origins: Vec<String> = std::env::var("CHAT_FILTER_ALLOWED_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            host,
            port,
            max_concurrent_analysis,
            roster_path,
            data_dir,
            progress_interval,
            allowed_origins,
            filter: FilterConfig::default(),
        })
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

/// Markers and thresholds the rule chain matches against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Early-morning window start hour (inclusive).
    pub early_start_hour: u32,
    /// Early-morning window end hour (exclusive).
    pub early_end_hour: u32,
    /// Substring identifying the storefront's own operator accounts.
    pub operator_marker: String,
    /// Reserved service-assistant sender account.
    pub assistant_account: String,
    /// Content summary tag of the "please confirm shipping address" prompt.
    pub address_confirm_tag: String,
    /// Prefix shared by every storefront-side nickname.
    pub store_prefix: String,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            early_start_hour: 0,
            early_end_hour: 8,
            operator_marker: "tineco添可官方旗舰店:k".to_string(),
            assistant_account: "tineco添可官方旗舰店:服务助手".to_string(),
            address_confirm_tag: "请确认收货地址".to_string(),
            store_prefix: "tineco添可官方旗舰店:".to_string(),
        }
    }
}

/// On/off switches for the four content rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterRules {
    #[serde(default = "enabled")]
    pub early_morning: bool,
    #[serde(default = "enabled")]
    pub staff: bool,
    #[serde(default = "enabled")]
    pub service_assistant: bool,
    #[serde(default = "enabled")]
    pub address_confirm: bool,
}

fn enabled() -> bool {
    true
}

impl Default for FilterRules {
    fn default() -> Self {
        Self {
            early_morning: true,
            staff: true,
            service_assistant: true,
            address_confirm: true,
        }
    }
}
