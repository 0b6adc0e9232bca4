//! Environment-driven runtime configuration.
//!
//! Read once at startup into a plain struct. Numeric values are clamped
//! into their documented bounds; unparseable values fall back to the
//! default rather than failing startup.

use crate::errors::{SellerError, SellerResult};
use acp_client::constants::DEFAULT_BASE_URL;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 15_000;
pub const MIN_POLL_INTERVAL_MS: u64 = 2_000;
pub const DEFAULT_POLL_PAGE_SIZE: u32 = 50;
pub const DEFAULT_DISCONNECT_ALERT_SECS: u64 = 120;
pub const DEFAULT_RECONNECT_ALERT_ATTEMPTS: u32 = 3;

/// Full runtime configuration for the seller process.
#[derive(Debug, Clone)]
pub struct SellerConfig {
    /// Backend base URL (`ACP_URL`).
    pub base_url: String,
    /// Static API key sent as `x-api-key` (`ACP_API_KEY`).
    pub api_key: String,
    /// The seller wallet, lowercased (`ACP_WALLET_ADDRESS`).
    pub wallet_address: String,
    /// Whether the poll reconciler runs (`ACP_SELLER_POLL`, "0" disables).
    pub poll_enabled: bool,
    /// Poll cadence (`ACP_SELLER_POLL_INTERVAL_MS`, min 2000).
    pub poll_interval: Duration,
    /// Active-jobs page size (`ACP_SELLER_POLL_PAGE_SIZE`, 1..=200).
    pub poll_page_size: u32,
    /// Root directory holding offering configs (`ACP_OFFERINGS_ROOT`).
    pub offerings_root: PathBuf,
    /// Root for per-job deliverable directories.
    pub delivery_root: PathBuf,
    /// Config store holding the PID file (`ACP_CONFIG_DIR`).
    pub config_dir: PathBuf,
    /// PagerDuty routing key; alerting is a no-op when absent.
    pub pagerduty_routing_key: Option<String>,
    pub disconnect_alert_after: Duration,
    pub reconnect_alert_attempts: u32,
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_u64(key: &str, default: u64) -> u64 {
    env_string(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl SellerConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> SellerResult<Self> {
        let wallet_address = env_string("ACP_WALLET_ADDRESS")
            .map(|w| w.trim().to_lowercase())
            .ok_or_else(|| SellerError::Config {
                field: "ACP_WALLET_ADDRESS".into(),
                reason: "missing".into(),
            })?;
        let api_key = env_string("ACP_API_KEY").ok_or_else(|| SellerError::Config {
            field: "ACP_API_KEY".into(),
            reason: "missing".into(),
        })?;

        let poll_interval_ms =
            env_u64("ACP_SELLER_POLL_INTERVAL_MS", DEFAULT_POLL_INTERVAL_MS).max(MIN_POLL_INTERVAL_MS);
        let poll_page_size =
            env_u64("ACP_SELLER_POLL_PAGE_SIZE", DEFAULT_POLL_PAGE_SIZE as u64).clamp(1, 200) as u32;

        let config_dir = env_string("ACP_CONFIG_DIR").map(PathBuf::from).unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".acp-seller")
        });

        Ok(Self {
            base_url: env_string("ACP_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            api_key,
            wallet_address,
            poll_enabled: env_string("ACP_SELLER_POLL").as_deref() != Some("0"),
            poll_interval: Duration::from_millis(poll_interval_ms),
            poll_page_size,
            offerings_root: env_string("ACP_OFFERINGS_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("offerings")),
            delivery_root: crate::delivery::resolve_delivery_root(),
            config_dir,
            pagerduty_routing_key: env_string("PAGERDUTY_ROUTING_KEY"),
            disconnect_alert_after: Duration::from_secs(env_u64(
                "ACP_SOCKET_DISCONNECT_ALERT_SECS",
                DEFAULT_DISCONNECT_ALERT_SECS,
            )),
            reconnect_alert_attempts: env_u64(
                "ACP_SOCKET_RECONNECT_ALERT_ATTEMPTS",
                DEFAULT_RECONNECT_ALERT_ATTEMPTS as u64,
            ) as u32,
        })
    }

    /// Websocket endpoint derived from the backend base URL.
    pub fn socket_url(&self) -> String {
        let ws_base = if let Some(rest) = self.base_url.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = self.base_url.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            format!("wss://{}", self.base_url)
        };
        format!(
            "{}/?walletAddress={}&transport=websocket",
            ws_base.trim_end_matches('/'),
            self.wallet_address
        )
    }
}
