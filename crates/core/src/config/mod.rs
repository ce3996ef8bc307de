//! Runtime configuration.
//!
//! - `BotConfig`: timing and budget parameters, selected by profile or TOML file
//! - `RuntimeEnv`: endpoints, key material and optional integrations from the environment

mod bot;
mod env;

pub use bot::{
    config, init_config, BotConfig, MonitoringConfig, NotificationConfig, RateLimitConfig,
    StoreConfig, SweepTimingConfig,
};
pub use env::{vars, RuntimeEnv, DEFAULT_RPC_ENDPOINT};

use regex_lite::{Captures, Regex};

/// Expand `${VAR_NAME}` patterns with environment variable values.
///
/// Unset variables are left as written.
pub(crate) fn expand_env(s: &str) -> String {
    let Ok(re) = Regex::new(r"\$\{([^}]+)\}") else {
        return s.to_string();
    };
    re.replace_all(s, |caps: &Captures| {
        std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
    })
    .into_owned()
}
