//! Configuration management
//!
//! Settings come from an optional TOML file overlaid by environment variables
//! (a `.env` file is loaded into the environment by `main`). Keys are the
//! lowercase form of the environment names, e.g. `DISCORD_TOKEN` / `discord_token`.

use crate::error::ConfigError;
use crate::types::EndpointKind;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://open-api.bingx.com";
pub const DEFAULT_DISCORD_API_URL: &str = "https://discord.com/api/v10";
pub const DEFAULT_SYMBOL: &str = "BTC-USDT";
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_MAX_CACHE: usize = 1000;

/// Environment variables read on top of the config file
const ENV_KEYS: &[&str] = &[
    "DISCORD_TOKEN",
    "CHANNEL_ID",
    "BINGX_API_KEY",
    "BINGX_SECRET_KEY",
    "BINGX_BASE_URL",
    "DISCORD_API_URL",
    "SYMBOL",
    "POLL_INTERVAL_SECS",
    "COMMAND_POLL_SECS",
    "REQUEST_TIMEOUT_SECS",
    "MAX_CACHE",
    "ORDERS_PATH",
    "POSITIONS_PATH",
    "TPSL_PATH",
];

/// Settings as read from file/environment, before validation
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSettings {
    pub discord_token: Option<String>,
    pub channel_id: Option<String>,
    pub bingx_api_key: Option<String>,
    pub bingx_secret_key: Option<String>,
    pub bingx_base_url: Option<String>,
    pub discord_api_url: Option<String>,
    pub symbol: Option<String>,
    pub poll_interval_secs: Option<u64>,
    pub command_poll_secs: Option<u64>,
    pub request_timeout_secs: Option<u64>,
    pub max_cache: Option<usize>,
    pub orders_path: Option<String>,
    pub positions_path: Option<String>,
    pub tpsl_path: Option<String>,
}

/// Validated application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub discord: DiscordConfig,
    pub venue: VenueConfig,
    pub poller: PollerConfig,
}

#[derive(Clone)]
pub struct DiscordConfig {
    pub bot_token: String,
    pub channel_id: String,
    pub api_url: String,
    /// Interval between command polls
    pub command_poll_secs: u64,
}

#[derive(Clone)]
pub struct VenueConfig {
    pub api_key: String,
    pub secret_key: String,
    pub base_url: String,
    pub symbol: String,
    pub request_timeout_secs: u64,
    pub orders_path: String,
    pub positions_path: String,
    pub tpsl_path: String,
}

#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub interval_secs: u64,
    pub max_cache: usize,
    /// Endpoint kinds polled every cycle, in delivery order
    pub kinds: Vec<EndpointKind>,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            max_cache: DEFAULT_MAX_CACHE,
            kinds: EndpointKind::ALL.to_vec(),
        }
    }
}

impl PollerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl VenueConfig {
    /// Path of the REST endpoint backing a kind, relative to `base_url`
    pub fn path_for(&self, kind: EndpointKind) -> &str {
        match kind {
            EndpointKind::Order => &self.orders_path,
            EndpointKind::Position => &self.positions_path,
            EndpointKind::TpSl => &self.tpsl_path,
        }
    }
}

impl Config {
    /// Load configuration from an optional file plus the process environment
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        Self::load_with_env(path, None)
    }

    /// Load configuration with an explicit environment map (`None` reads the process env)
    pub fn load_with_env(
        path: &str,
        env: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigError> {
        let env = env.unwrap_or_else(|| std::env::vars().collect());
        let mut builder =
            config::Config::builder().add_source(config::File::from(Path::new(path)).required(false));

        for name in ENV_KEYS {
            builder = builder.set_override_option(name.to_lowercase(), env.get(*name).cloned())?;
        }

        let raw: RawSettings = builder.build()?.try_deserialize()?;
        Self::from_raw(raw)
    }

    /// Validate raw settings, failing on the first missing required value
    pub fn from_raw(raw: RawSettings) -> Result<Self, ConfigError> {
        let discord_token = required(raw.discord_token, "DISCORD_TOKEN")?;
        let channel_id = required(raw.channel_id, "CHANNEL_ID")?;
        let api_key = required(raw.bingx_api_key, "BINGX_API_KEY")?;
        let secret_key = required(raw.bingx_secret_key, "BINGX_SECRET_KEY")?;

        if !channel_id.chars().all(|c| c.is_ascii_digit()) {
            return Err(ConfigError::Invalid {
                name: "CHANNEL_ID",
                reason: format!("expected a numeric channel id, got {:?}", channel_id),
            });
        }

        let interval_secs = raw.poll_interval_secs.unwrap_or(DEFAULT_POLL_INTERVAL_SECS);
        if interval_secs == 0 {
            return Err(ConfigError::Invalid {
                name: "POLL_INTERVAL_SECS",
                reason: "must be greater than zero".into(),
            });
        }

        let max_cache = raw.max_cache.unwrap_or(DEFAULT_MAX_CACHE);
        if max_cache == 0 {
            return Err(ConfigError::Invalid {
                name: "MAX_CACHE",
                reason: "must be greater than zero".into(),
            });
        }

        let request_timeout_secs = raw.request_timeout_secs.unwrap_or(10);
        if request_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                name: "REQUEST_TIMEOUT_SECS",
                reason: "must be greater than zero".into(),
            });
        }

        let open_orders = "openApi/swap/v2/trade/openOrders".to_string();

        Ok(Self {
            discord: DiscordConfig {
                bot_token: discord_token,
                channel_id,
                api_url: trimmed_url(raw.discord_api_url, DEFAULT_DISCORD_API_URL),
                command_poll_secs: raw.command_poll_secs.unwrap_or(3).max(1),
            },
            venue: VenueConfig {
                api_key,
                secret_key,
                base_url: trimmed_url(raw.bingx_base_url, DEFAULT_BASE_URL),
                symbol: raw.symbol.unwrap_or_else(|| DEFAULT_SYMBOL.to_string()),
                request_timeout_secs,
                orders_path: raw.orders_path.unwrap_or_else(|| open_orders.clone()),
                positions_path: raw
                    .positions_path
                    .unwrap_or_else(|| "openApi/swap/v2/user/positions".to_string()),
                tpsl_path: raw.tpsl_path.unwrap_or(open_orders),
            },
            poller: PollerConfig {
                interval_secs,
                max_cache,
                ..Default::default()
            },
        })
    }
}

fn required(value: Option<String>, name: &'static str) -> Result<String, ConfigError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(ConfigError::Missing(name)),
    }
}

fn trimmed_url(value: Option<String>, default: &str) -> String {
    value
        .unwrap_or_else(|| default.to_string())
        .trim_end_matches('/')
        .to_string()
}

impl std::fmt::Debug for DiscordConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordConfig")
            .field("bot_token", &"[REDACTED]")
            .field("channel_id", &self.channel_id)
            .field("api_url", &self.api_url)
            .field("command_poll_secs", &self.command_poll_secs)
            .finish()
    }
}

impl std::fmt::Debug for VenueConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VenueConfig")
            .field("api_key", &"[REDACTED]")
            .field("secret_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("symbol", &self.symbol)
            .field("orders_path", &self.orders_path)
            .field("positions_path", &self.positions_path)
            .field("tpsl_path", &self.tpsl_path)
            .finish()
    }
}
