//! Configuration management with profile support.
//!
//! Provides centralized configuration for all bot parameters with
//! support for different profiles (default, testing, production).

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::expand_env;

/// Main configuration structure containing all bot parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// Profile name (for logging/identification)
    #[serde(default = "default_profile_name")]
    pub profile: String,

    /// Outbound request budget
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Position snapshot refresh
    #[serde(default)]
    pub store: StoreConfig,

    /// Sweep loop timing
    #[serde(default)]
    pub sweep: SweepTimingConfig,

    /// Background watchers
    #[serde(default)]
    pub monitoring: MonitoringConfig,

    /// Operator notifications
    #[serde(default)]
    pub notifications: NotificationConfig,
}

fn default_profile_name() -> String {
    "default".to_string()
}

/// Outbound request budget shared by every RPC call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum requests per window
    #[serde(default = "default_max_requests")]
    pub max_requests: usize,

    /// Window length (seconds)
    #[serde(default = "default_window")]
    pub window_secs: u64,
}

fn default_max_requests() -> usize {
    perps_chain::DEVNET_MAX_REQUESTS
}
fn default_window() -> u64 {
    perps_chain::DEVNET_WINDOW.as_secs()
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: default_max_requests(),
            window_secs: default_window(),
        }
    }
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Full position refresh interval (seconds)
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,
}

fn default_refresh_interval() -> u64 {
    60
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_refresh_interval(),
        }
    }
}

impl StoreConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepTimingConfig {
    /// Floor on the time between cycle starts (milliseconds)
    #[serde(default = "default_min_cycle_delay")]
    pub min_cycle_delay_ms: u64,

    /// Upper bound on any single external call (seconds)
    #[serde(default = "default_call_timeout")]
    pub call_timeout_secs: u64,
}

fn default_min_cycle_delay() -> u64 {
    1000
}
fn default_call_timeout() -> u64 {
    30
}

impl Default for SweepTimingConfig {
    fn default() -> Self {
        Self {
            min_cycle_delay_ms: default_min_cycle_delay(),
            call_timeout_secs: default_call_timeout(),
        }
    }
}

impl SweepTimingConfig {
    pub fn min_cycle_delay(&self) -> Duration {
        Duration::from_millis(self.min_cycle_delay_ms)
    }
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    /// How often the published IDL is checked for a new program address (seconds)
    #[serde(default = "default_program_id_poll")]
    pub program_id_poll_secs: u64,

    /// Healthcheck ping interval (seconds)
    #[serde(default = "default_healthcheck_interval")]
    pub healthcheck_interval_secs: u64,
}

fn default_program_id_poll() -> u64 {
    60
}
fn default_healthcheck_interval() -> u64 {
    60
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            program_id_poll_secs: default_program_id_poll(),
            healthcheck_interval_secs: default_healthcheck_interval(),
        }
    }
}

impl MonitoringConfig {
    pub fn program_id_poll_interval(&self) -> Duration {
        Duration::from_secs(self.program_id_poll_secs)
    }
    pub fn healthcheck_interval(&self) -> Duration {
        Duration::from_secs(self.healthcheck_interval_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Minimum gap between forwarded notifications (seconds)
    #[serde(default = "default_throttle")]
    pub throttle_secs: u64,

    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,
}

fn default_throttle() -> u64 {
    40
}
fn default_http_timeout() -> u64 {
    10
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            throttle_secs: default_throttle(),
            http_timeout_secs: default_http_timeout(),
        }
    }
}

impl NotificationConfig {
    pub fn throttle(&self) -> Duration {
        Duration::from_secs(self.throttle_secs)
    }
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            profile: default_profile_name(),
            rate_limit: RateLimitConfig::default(),
            store: StoreConfig::default(),
            sweep: SweepTimingConfig::default(),
            monitoring: MonitoringConfig::default(),
            notifications: NotificationConfig::default(),
        }
    }
}

impl BotConfig {
    /// Load configuration from a TOML file.
    ///
    /// `${VAR}` references are expanded from the environment before parsing.
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(&expand_env(content))?;
        config.validate()?;
        Ok(config)
    }

    /// Short intervals for exercising the bot against a local validator.
    pub fn testing() -> Self {
        Self {
            profile: "testing".to_string(),
            rate_limit: RateLimitConfig {
                max_requests: 100,
                window_secs: 10,
            },
            store: StoreConfig {
                refresh_interval_secs: 10,
            },
            sweep: SweepTimingConfig {
                min_cycle_delay_ms: 250,
                call_timeout_secs: 10,
            },
            monitoring: MonitoringConfig {
                program_id_poll_secs: 15,
                healthcheck_interval_secs: 60,
            },
            notifications: NotificationConfig {
                throttle_secs: 5,
                http_timeout_secs: 10,
            },
        }
    }

    /// Dedicated RPC provider with a larger quota.
    pub fn production() -> Self {
        Self {
            profile: "production".to_string(),
            rate_limit: RateLimitConfig {
                max_requests: 100,
                window_secs: 1,
            },
            store: StoreConfig {
                refresh_interval_secs: 30,
            },
            sweep: SweepTimingConfig {
                min_cycle_delay_ms: 1000,
                call_timeout_secs: 20,
            },
            monitoring: MonitoringConfig::default(),
            notifications: NotificationConfig::default(),
        }
    }

    /// Get profile from environment variable BOT_PROFILE, or load the TOML
    /// file named by BOT_CONFIG. Supported profiles: testing, production.
    ///
    /// REFRESH_INTERVAL_SECS and MIN_CYCLE_DELAY_MS override the profile.
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = match std::env::var("BOT_CONFIG") {
            Ok(path) => Self::from_file(&path)?,
            Err(_) => {
                let profile =
                    std::env::var("BOT_PROFILE").unwrap_or_else(|_| "default".to_string());
                Self::from_profile(&profile)
            }
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_profile(profile: &str) -> Self {
        match profile.to_lowercase().as_str() {
            "testing" | "test" => Self::testing(),
            "production" | "prod" => Self::production(),
            _ => Self::default(),
        }
    }

    fn apply_env_overrides(&mut self) -> anyhow::Result<()> {
        if let Ok(v) = std::env::var("REFRESH_INTERVAL_SECS") {
            self.store.refresh_interval_secs = v
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid REFRESH_INTERVAL_SECS {v:?}: {e}"))?;
        }
        if let Ok(v) = std::env::var("MIN_CYCLE_DELAY_MS") {
            self.sweep.min_cycle_delay_ms = v
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid MIN_CYCLE_DELAY_MS {v:?}: {e}"))?;
        }
        Ok(())
    }

    /// Reject values the runtime cannot work with: zero budgets, windows,
    /// intervals and timeouts. A zero cycle delay or throttle is allowed.
    pub fn validate(&self) -> anyhow::Result<()> {
        let non_zero = [
            ("rate_limit.max_requests", self.rate_limit.max_requests as u64),
            ("rate_limit.window_secs", self.rate_limit.window_secs),
            ("store.refresh_interval_secs", self.store.refresh_interval_secs),
            ("sweep.call_timeout_secs", self.sweep.call_timeout_secs),
            ("monitoring.program_id_poll_secs", self.monitoring.program_id_poll_secs),
            (
                "monitoring.healthcheck_interval_secs",
                self.monitoring.healthcheck_interval_secs,
            ),
            ("notifications.http_timeout_secs", self.notifications.http_timeout_secs),
        ];
        for (name, value) in non_zero {
            if value == 0 {
                anyhow::bail!("{name} must be greater than zero");
            }
        }
        Ok(())
    }

    /// Log the current configuration.
    pub fn log_config(&self) {
        tracing::info!(profile = %self.profile, "Bot configuration loaded");
        tracing::info!(
            max_requests = self.rate_limit.max_requests,
            window_secs = self.rate_limit.window_secs,
            "Rate limit"
        );
        tracing::info!(
            refresh_interval_secs = self.store.refresh_interval_secs,
            min_cycle_delay_ms = self.sweep.min_cycle_delay_ms,
            call_timeout_secs = self.sweep.call_timeout_secs,
            "Sweep timing"
        );
    }
}

use std::sync::OnceLock;

static GLOBAL_CONFIG: OnceLock<BotConfig> = OnceLock::new();

/// Initialize global configuration.
pub fn init_config(config: BotConfig) {
    let _ = GLOBAL_CONFIG.set(config);
}

/// Get the global configuration, initializing from environment if needed.
///
/// A broken `BOT_CONFIG` file falls back to the default profile here; call
/// `BotConfig::from_env` directly to surface the error.
pub fn config() -> &'static BotConfig {
    GLOBAL_CONFIG.get_or_init(|| {
        BotConfig::from_env().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Falling back to default configuration");
            BotConfig::default()
        })
    })
}
