//! Rate-limited RPC transport.
//!
//! Wraps the HTTP sender so that every JSON-RPC request issued through the
//! client, whichever component issues it, takes a slot from the shared
//! [`RateLimiter`] first.

use async_trait::async_trait;
use serde_json::Value;
use solana_rpc_client::http_sender::HttpSender;
use solana_rpc_client::nonblocking::rpc_client::RpcClient;
use solana_rpc_client::rpc_client::RpcClientConfig;
use solana_rpc_client::rpc_sender::{RpcSender, RpcTransportStats};
use solana_rpc_client_api::client_error::Result as RpcResult;
use solana_rpc_client_api::request::RpcRequest;
use solana_sdk::commitment_config::CommitmentConfig;
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

use crate::rate_limiter::RateLimiter;

pub struct RateLimitedSender {
    inner: HttpSender,
    limiter: Arc<RateLimiter>,
}

impl RateLimitedSender {
    pub fn new(url: impl ToString, limiter: Arc<RateLimiter>, timeout: Duration) -> Self {
        Self {
            inner: HttpSender::new_with_timeout(url.to_string(), timeout),
            limiter,
        }
    }
}

#[async_trait]
impl RpcSender for RateLimitedSender {
    async fn send(&self, request: RpcRequest, params: Value) -> RpcResult<Value> {
        self.limiter.acquire().await;
        trace!(method = %request, "Sending rpc request");
        self.inner.send(request, params).await
    }

    fn get_transport_stats(&self) -> RpcTransportStats {
        self.inner.get_transport_stats()
    }

    fn url(&self) -> String {
        self.inner.url()
    }
}

/// Build a nonblocking RPC client whose every request goes through `limiter`.
pub fn rate_limited_client(
    url: &str,
    limiter: Arc<RateLimiter>,
    timeout: Duration,
) -> RpcClient {
    let sender = RateLimitedSender::new(url, limiter, timeout);
    RpcClient::new_sender(
        sender,
        RpcClientConfig::with_commitment(CommitmentConfig::confirmed()),
    )
}
