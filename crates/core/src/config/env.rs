//! Process environment: endpoints, key material and optional integrations.

use anyhow::{Context, Result};

pub const DEFAULT_RPC_ENDPOINT: &str = "https://api.devnet.solana.com";

/// Environment variable names.
pub mod vars {
    pub const RPC_ENDPOINT: &str = "RPC_ENDPOINT";
    pub const PRIVATE_KEY: &str = "PRIVATE_KEY";
    pub const PROGRAM_ID: &str = "PROGRAM_ID";
    pub const PERPETUALS_IDL_URL: &str = "PERPETUALS_IDL_URL";
    pub const HEALTHCHECKS_URL: &str = "HEALTHCHECKS_URL";
    pub const TG_BOT_TOKEN: &str = "TG_BOT_TOKEN";
    pub const TG_CHAT_ID: &str = "TG_CHAT_ID";
}

/// Settings that come from the environment rather than the config profile.
#[derive(Clone)]
pub struct RuntimeEnv {
    pub rpc_endpoint: String,
    /// JSON byte array of the signing keypair
    pub private_key: String,
    pub program_id: Option<String>,
    pub idl_url: Option<String>,
    pub healthcheck_url: Option<String>,
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,
}

impl RuntimeEnv {
    /// Read the environment. Fails only when the signing key is missing.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let optional = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let private_key = optional(vars::PRIVATE_KEY).context(
            "Private key not found. Please set the PRIVATE_KEY environment variable.",
        )?;

        Ok(Self {
            rpc_endpoint: optional(vars::RPC_ENDPOINT)
                .unwrap_or_else(|| DEFAULT_RPC_ENDPOINT.to_string()),
            private_key,
            program_id: optional(vars::PROGRAM_ID),
            idl_url: optional(vars::PERPETUALS_IDL_URL),
            healthcheck_url: optional(vars::HEALTHCHECKS_URL),
            telegram_bot_token: optional(vars::TG_BOT_TOKEN),
            telegram_chat_id: optional(vars::TG_CHAT_ID),
        })
    }

    /// Telegram is used only when both token and chat are set.
    pub fn telegram(&self) -> Option<(String, String)> {
        match (&self.telegram_bot_token, &self.telegram_chat_id) {
            (Some(token), Some(chat)) => Some((token.clone(), chat.clone())),
            _ => None,
        }
    }
}

impl std::fmt::Debug for RuntimeEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeEnv")
            .field("rpc_endpoint", &self.rpc_endpoint)
            .field("private_key", &"<redacted>")
            .field("program_id", &self.program_id)
            .field("idl_url", &self.idl_url)
            .field("healthcheck_url", &self.healthcheck_url)
            .field("telegram", &self.telegram().is_some())
            .finish()
    }
}
