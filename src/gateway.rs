use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

use crate::abi::{self, Token};
use crate::config::Config;
use crate::error::{LedgerError, Result};
use crate::models::{AccountAddress, Connection, TransactionReceipt};

/// Raw bytes returned by a read-only call, still ABI-encoded.
pub type RawResult = Vec<u8>;

const USER_REJECTED: i64 = 4001;
const EXECUTION_REVERTED: i64 = 3;
const METHOD_NOT_FOUND: i64 = -32601;

/// The narrow capability the rest of the client needs from a ledger node.
///
/// `method` is the canonical Solidity signature, e.g. `getShipment(uint256)`.
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// Resolve the active network and acting account.
    async fn connect(&self) -> Result<Connection>;

    /// Read-only call. Never mutates ledger state and may be retried freely.
    async fn query(&self, method: &str, args: &[Token]) -> Result<RawResult>;

    /// Signed, state-changing call. Not idempotent: resubmitting may create
    /// a duplicate entity.
    async fn execute(
        &self,
        method: &str,
        args: &[Token],
        from: &AccountAddress,
    ) -> Result<TransactionReceipt>;
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Clone, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcReceipt {
    transaction_hash: String,
    #[serde(default)]
    block_number: Option<String>,
    from: String,
    #[serde(default)]
    gas_used: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

/// Why a JSON-RPC round trip failed, before it is mapped onto a
/// `LedgerError` by the operation that issued it.
#[derive(Debug)]
enum RpcFailure {
    Transport(String),
    Rpc(RpcErrorObject),
}

impl RpcErrorObject {
    fn is_user_rejection(&self) -> bool {
        self.code == USER_REJECTED
    }

    fn is_revert(&self) -> bool {
        self.code == EXECUTION_REVERTED || self.message.to_lowercase().contains("revert")
    }

    fn revert_reason(&self) -> String {
        self.data
            .as_ref()
            .and_then(Value::as_str)
            .and_then(|data| decode_hex(data).ok())
            .and_then(|bytes| abi::decode_revert_reason(&bytes))
            .unwrap_or_else(|| self.message.clone())
    }

    fn describe(&self) -> String {
        format!("rpc error {}: {}", self.code, self.message)
    }
}

/// Gateway backed by an EVM node's JSON-RPC endpoint. The node holds the
/// keys and signs for its unlocked accounts.
pub struct JsonRpcGateway {
    config: Config,
    http_client: HttpClient,
    next_id: AtomicU64,
}

impl JsonRpcGateway {
    pub fn new(config: Config) -> Self {
        Self::with_http_client(config, HttpClient::new())
    }

    pub fn with_http_client(config: Config, http_client: HttpClient) -> Self {
        Self {
            config,
            http_client,
            next_id: AtomicU64::new(1),
        }
    }

    fn endpoint(&self) -> Result<&str> {
        self.config
            .ledger_rpc_url
            .as_deref()
            .ok_or_else(|| LedgerError::NoProvider("LEDGER_RPC_URL is not configured".to_string()))
    }

    async fn rpc_call(&self, method: &str, params: Value) -> std::result::Result<Value, RpcFailure> {
        let endpoint = self
            .endpoint()
            .map_err(|e| RpcFailure::Transport(e.to_string()))?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        debug!(id, method, "rpc request");

        let response = self
            .http_client
            .post(endpoint)
            .json(&json!({
                "jsonrpc": "2.0",
                "id": id,
                "method": method,
                "params": params,
            }))
            .send()
            .await
            .map_err(|e| RpcFailure::Transport(format!("failed to reach {}: {}", endpoint, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RpcFailure::Transport(format!(
                "{} failed (status {}): {}",
                method, status, body
            )));
        }

        let body: RpcResponse = response
            .json()
            .await
            .map_err(|e| RpcFailure::Transport(format!("failed to parse {} response: {}", method, e)))?;

        if let Some(error) = body.error {
            debug!(id, method, code = error.code, message = %error.message, "rpc error");
            return Err(RpcFailure::Rpc(error));
        }

        Ok(body.result.unwrap_or(Value::Null))
    }

    async fn request_accounts(&self) -> Result<Value> {
        let unavailable = |failure: RpcFailure| match failure {
            RpcFailure::Transport(message) => LedgerError::NoProvider(message),
            RpcFailure::Rpc(error) if error.is_user_rejection() => {
                LedgerError::AccountUnavailable("account access was declined".to_string())
            }
            RpcFailure::Rpc(error) => LedgerError::AccountUnavailable(error.describe()),
        };

        match self.rpc_call("eth_requestAccounts", json!([])).await {
            Ok(accounts) => Ok(accounts),
            Err(RpcFailure::Rpc(error)) if error.code == METHOD_NOT_FOUND => self
                .rpc_call("eth_accounts", json!([]))
                .await
                .map_err(unavailable),
            Err(failure) => Err(unavailable(failure)),
        }
    }

    async fn wait_for_receipt(&self, tx_hash: &str) -> Result<TransactionReceipt> {
        loop {
            let value = self
                .rpc_call("eth_getTransactionReceipt", json!([tx_hash]))
                .await
                .map_err(|failure| LedgerError::ReceiptUnavailable {
                    tx_hash: tx_hash.to_string(),
                    reason: transport(failure).to_string(),
                })?;

            if value.is_null() {
                debug!(tx_hash, "receipt pending");
                tokio::time::sleep(self.config.receipt_poll_interval).await;
                continue;
            }

            return parse_receipt(value);
        }
    }
}

#[async_trait]
impl LedgerGateway for JsonRpcGateway {
    async fn connect(&self) -> Result<Connection> {
        let endpoint = self.endpoint()?;

        let accounts = self.request_accounts().await?;
        let active_account = first_account(&accounts)?;

        let network_id = match self.rpc_call("net_version", json!([])).await {
            Ok(Value::String(id)) => id,
            Ok(Value::Number(id)) => id.to_string(),
            Ok(other) => {
                return Err(LedgerError::malformed(format!("unexpected net_version result {}", other)));
            }
            Err(RpcFailure::Transport(message)) => return Err(LedgerError::NoProvider(message)),
            Err(RpcFailure::Rpc(error)) => return Err(LedgerError::Transport(error.describe())),
        };

        info!(endpoint, network_id = %network_id, account = %active_account, "connected to ledger");

        Ok(Connection {
            network_id,
            active_account,
        })
    }

    #[tracing::instrument(skip_all, fields(method = %method))]
    async fn query(&self, method: &str, args: &[Token]) -> Result<RawResult> {
        let data = abi::encode_call(method, args);
        let params = json!([
            {
                "to": self.config.registry_address.to_string(),
                "data": format!("0x{}", hex::encode(data)),
            },
            "latest"
        ]);

        let result = self
            .rpc_call("eth_call", params)
            .await
            .map_err(|failure| match failure {
                RpcFailure::Rpc(error) if error.is_revert() => {
                    LedgerError::CallReverted(error.revert_reason())
                }
                other => transport(other),
            })?;

        let raw = result
            .as_str()
            .ok_or_else(|| LedgerError::malformed(format!("eth_call returned {}", result)))?;

        decode_hex(raw)
    }

    #[tracing::instrument(skip_all, fields(method = %method, from = %from))]
    async fn execute(
        &self,
        method: &str,
        args: &[Token],
        from: &AccountAddress,
    ) -> Result<TransactionReceipt> {
        let data = abi::encode_call(method, args);
        let params = json!([{
            "from": from.to_string(),
            "to": self.config.registry_address.to_string(),
            "data": format!("0x{}", hex::encode(data)),
        }]);

        let result = self
            .rpc_call("eth_sendTransaction", params)
            .await
            .map_err(|failure| match failure {
                RpcFailure::Rpc(error) if error.is_user_rejection() => {
                    LedgerError::TransactionRejected(error.message)
                }
                RpcFailure::Rpc(error) if error.is_revert() => {
                    LedgerError::TransactionReverted(error.revert_reason())
                }
                other => transport(other),
            })?;

        let tx_hash = result
            .as_str()
            .ok_or_else(|| LedgerError::malformed(format!("eth_sendTransaction returned {}", result)))?
            .to_string();

        info!(tx_hash = %tx_hash, "transaction submitted");

        let receipt = self.wait_for_receipt(&tx_hash).await;
        if let Err(e) = &receipt {
            warn!(tx_hash = %tx_hash, error = %e, "transaction did not succeed");
        }
        receipt
    }
}

fn transport(failure: RpcFailure) -> LedgerError {
    match failure {
        RpcFailure::Transport(message) => LedgerError::Transport(message),
        RpcFailure::Rpc(error) => LedgerError::Transport(error.describe()),
    }
}

fn first_account(accounts: &Value) -> Result<AccountAddress> {
    let accounts = accounts
        .as_array()
        .ok_or_else(|| LedgerError::malformed(format!("account list was {}", accounts)))?;

    let first = accounts
        .first()
        .ok_or_else(|| LedgerError::AccountUnavailable("provider returned no accounts".to_string()))?;

    first
        .as_str()
        .ok_or_else(|| LedgerError::malformed(format!("account entry was {}", first)))?
        .parse::<AccountAddress>()
        .map_err(|e: LedgerError| LedgerError::malformed(e.to_string()))
}

fn decode_hex(raw: &str) -> Result<Vec<u8>> {
    let digits = raw.strip_prefix("0x").unwrap_or(raw);
    hex::decode(digits).map_err(|e| LedgerError::malformed(format!("invalid hex data: {}", e)))
}

fn parse_quantity(raw: &str) -> Result<u64> {
    let digits = raw.strip_prefix("0x").unwrap_or(raw);
    u64::from_str_radix(digits, 16)
        .map_err(|_| LedgerError::malformed(format!("invalid quantity {:?}", raw)))
}

fn parse_receipt(value: Value) -> Result<TransactionReceipt> {
    let receipt: RpcReceipt = serde_json::from_value(value)
        .map_err(|e| LedgerError::malformed(format!("invalid transaction receipt: {}", e)))?;

    if receipt.status.as_deref().map(parse_quantity).transpose()? == Some(0) {
        return Err(LedgerError::TransactionReverted(format!(
            "transaction {} reverted",
            receipt.transaction_hash
        )));
    }

    let from = receipt
        .from
        .parse::<AccountAddress>()
        .map_err(|e: LedgerError| LedgerError::malformed(e.to_string()))?;

    Ok(TransactionReceipt {
        block_number: receipt.block_number.as_deref().map(parse_quantity).transpose()?,
        gas_used: receipt.gas_used.as_deref().map(parse_quantity).transpose()?,
        transaction_hash: receipt.transaction_hash,
        from,
    })
}
