//! Solana JSON-RPC probe.
//!
//! Two calls per cycle: `getHealth` for liveness and `getSlot` for the
//! last-seen slot shown on the dashboard.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ChainProbe, HttpGate};
use crate::types::SpreadNetError;

const ENDPOINT: &str = "solana-rpc";

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
}

impl<'a> RpcRequest<'a> {
    fn new(method: &'a str) -> Self {
        Self {
            jsonrpc: "2.0",
            id: 1,
            method,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

pub struct SolanaRpcClient {
    gate: HttpGate,
    url: String,
}

impl SolanaRpcClient {
    pub fn new(gate: HttpGate, url: &str) -> Self {
        Self {
            gate,
            url: url.to_string(),
        }
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
    ) -> Result<RpcResponse<T>, SpreadNetError> {
        self.gate
            .post_json(ENDPOINT, &self.url, &RpcRequest::new(method))
            .await
    }
}

#[async_trait]
impl ChainProbe for SolanaRpcClient {
    async fn health(&self) -> Result<bool, SpreadNetError> {
        let resp: RpcResponse<String> = self.call("getHealth").await?;
        if let Some(err) = resp.error {
            // An unhealthy node answers with an RPC error, not an HTTP error
            debug!(code = err.code, message = %err.message, "Node reports unhealthy");
            return Ok(false);
        }
        Ok(resp.result.as_deref() == Some("ok"))
    }

    async fn slot(&self) -> Result<u64, SpreadNetError> {
        let resp: RpcResponse<u64> = self.call("getSlot").await?;
        match (resp.result, resp.error) {
            (Some(slot), _) => Ok(slot),
            (None, Some(err)) => Err(SpreadNetError::malformed(
                ENDPOINT,
                format!("getSlot error {}: {}", err.code, err.message),
            )),
            (None, None) => Err(SpreadNetError::malformed(ENDPOINT, "getSlot returned no result")),
        }
    }
}
