//! Perpetuals Liquidation Bot
//!
//! Liquidation bot for the Solana perpetuals program.
//! Features:
//! - Position snapshot refreshed on its own schedule
//! - Sequential sweep asking the program for each position's liquidation state
//! - Every RPC request gated by a shared sliding-window rate limit
//! - Program redeploy watcher, healthcheck pings and Telegram notifications

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use perps_api::{HealthcheckClient, IdlClient, Notifier, TelegramConfig};
use perps_chain::{keypair_from_json, rate_limited_client, PerpetualsClient, RateLimiter, RpcPerpetualsClient};
use perps_core::{
    config, init_config, resolve_program_id, run_healthcheck, watch_program_id, BotConfig,
    Liquidator, PositionStore, ProgramAddressSource, RuntimeEnv,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Print startup banner
    print_banner();

    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,perps_core=debug,perps_chain=info")),
        )
        .init();

    // Use BOT_PROFILE to select a profile, or BOT_CONFIG for a TOML file
    let bot_config = BotConfig::from_env()?;
    bot_config.log_config();
    init_config(bot_config);
    let cfg = config();

    // Missing or malformed key material is the only fatal runtime input
    let env = RuntimeEnv::from_env()?;
    let signer = keypair_from_json(&env.private_key).context("PRIVATE_KEY")?;

    let idl = env
        .idl_url
        .as_deref()
        .map(IdlClient::new)
        .transpose()?
        .map(Arc::new);
    let program = resolve_program_id(
        env.program_id.as_deref(),
        idl.as_deref().map(|c| c as &dyn ProgramAddressSource),
    )
    .await?;

    let limiter = Arc::new(RateLimiter::new(
        cfg.rate_limit.max_requests,
        cfg.rate_limit.window(),
    ));
    let rpc = Arc::new(rate_limited_client(
        &env.rpc_endpoint,
        Arc::clone(&limiter),
        cfg.sweep.call_timeout(),
    ));
    let client: Arc<dyn PerpetualsClient> =
        Arc::new(RpcPerpetualsClient::new(rpc, signer, program.address));

    let telegram = env
        .telegram()
        .map(|(bot_token, chat_id)| TelegramConfig { bot_token, chat_id });
    let notifier = Notifier::new(
        telegram,
        cfg.notifications.throttle(),
        cfg.notifications.http_timeout(),
    )?;

    info!(
        rpc = %env.rpc_endpoint,
        program = %program.address,
        origin = ?program.origin,
        liquidator = %client.liquidator(),
        "Starting perpetuals liquidator"
    );
    notifier.notify(format!("Starting liquidator against {}", program.address));

    // First snapshot before the sweep starts
    let store = Arc::new(PositionStore::new());
    match store.refresh(client.as_ref(), cfg.sweep.call_timeout()).await {
        Ok(count) => info!(positions = count, "Refreshed positions to track"),
        Err(e) => warn!(error = %e, "Initial position refresh failed, starting empty"),
    }

    let token = CancellationToken::new();
    let mut handles = Vec::new();

    handles.push(tokio::spawn(Arc::clone(&store).run_refresh(
        Arc::clone(&client),
        cfg.store.refresh_interval(),
        cfg.sweep.call_timeout(),
        token.clone(),
    )));

    if let Some(url) = env.healthcheck_url.as_deref() {
        handles.push(tokio::spawn(run_healthcheck(
            HealthcheckClient::new(url)?,
            cfg.monitoring.healthcheck_interval(),
            token.clone(),
        )));
    }

    // PROGRAM_ID pins the program; only published or bundled ids follow redeploys
    if let Some(idl) = idl.filter(|_| program.follows_published()) {
        let token = token.clone();
        let poll = cfg.monitoring.program_id_poll_interval();
        handles.push(tokio::spawn(async move {
            watch_program_id(idl, program, poll, token).await;
        }));
    }

    {
        let token = token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Received Ctrl-C, stopping after the current cycle");
                token.cancel();
            }
        });
    }

    let liquidator = Liquidator::new(Arc::clone(&client), store, notifier, &cfg.sweep);
    let cycles = liquidator.run(token.clone(), None).await;

    token.cancel();
    for handle in handles {
        if let Err(e) = handle.await {
            warn!(error = %e, "Background task ended abnormally");
        }
    }

    info!(cycles, "Liquidator stopped");
    Ok(())
}

/// Print startup banner.
fn print_banner() {
    println!(
        r#"
    ┌─┐┌─┐┬─┐┌─┐┌─┐
    ├─┘├┤ ├┬┘├─┘└─┐
    ┴  └─┘┴└─┴  └─┘
    Perpetuals Liquidator v0.1.0
    "#
    );
}
