//! Ethereum JSON-RPC backed chain client.
//!
//! Transactions are sent with `eth_sendTransaction`, so the sender must be an account the node
//! signs for (a local Anvil or Hardhat node, or a signing proxy in front of the real network).

use std::{collections::HashMap, time::Duration};

use alloy_core::primitives::{Address, Bytes, TxHash};
use alloy_sol_types::{SolCall, SolValue};
use anyhow::Context;
use backon::{ConstantBuilder, Retryable};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use tokio::sync::Mutex;
use url::Url;

use super::{Artifacts, ChainClient, ChainError, PendingTx, Receipt};
use crate::{ContractKind, contracts::IUUPSUpgradeable};

/// Default JSON-RPC endpoint.
pub const DEFAULT_RPC_URL: &str = "http://localhost:8545";

/// Default timeout for a single RPC request.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for [`RpcChainClient`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    /// The JSON-RPC endpoint.
    pub url: String,
    /// The account transactions are sent from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender: Option<Address>,
    /// Interval between two receipt polls, in milliseconds.
    pub poll_interval_ms: u64,
    /// How long to poll for a receipt before giving up, in seconds.
    pub confirmation_timeout_secs: u64,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_RPC_URL.to_string(),
            sender: None,
            poll_interval_ms: 1_000,
            confirmation_timeout_secs: 300,
        }
    }
}

impl RpcConfig {
    fn max_polls(&self) -> usize {
        let interval = self.poll_interval_ms.max(1);
        let polls = (self.confirmation_timeout_secs.saturating_mul(1_000) / interval).max(1);
        usize::try_from(polls).unwrap_or(usize::MAX)
    }
}

/// Transaction receipt as returned by `eth_getTransactionReceipt`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcReceipt {
    transaction_hash: TxHash,
    #[serde(deserialize_with = "deserialize_u64_from_hex")]
    block_number: u64,
    #[serde(deserialize_with = "deserialize_u64_from_hex")]
    status: u64,
    contract_address: Option<Address>,
}

/// Deserialize a u64 from a hex string (with 0x prefix).
fn deserialize_u64_from_hex<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    u64::from_str_radix(s.trim_start_matches("0x"), 16).map_err(serde::de::Error::custom)
}

/// Chain client talking to an Ethereum JSON-RPC endpoint.
pub struct RpcChainClient {
    http: reqwest::Client,
    url: Url,
    sender: Address,
    config: RpcConfig,
    artifacts: Artifacts,
    /// Implementations deployed by this client, reused by later proxies and upgrades.
    implementations: Mutex<HashMap<ContractKind, Address>>,
}

impl RpcChainClient {
    /// Connect to the configured endpoint and check that it answers.
    pub async fn connect(config: RpcConfig, artifacts: Artifacts) -> anyhow::Result<Self> {
        let url = Url::parse(&config.url)
            .with_context(|| format!("Invalid RPC URL: {}", config.url))?;
        let sender = config
            .sender
            .context("No sender account configured (set rpc.sender or --from)")?;
        let http = create_client()?;

        let chain_id: String = json_rpc_call(&http, &url, "eth_chainId", vec![])
            .await
            .context("Failed to reach the RPC endpoint")?;

        tracing::info!(
            url = %url,
            chain_id = %chain_id,
            sender = %sender,
            "Connected to JSON-RPC endpoint"
        );

        Ok(Self {
            http,
            url,
            sender,
            config,
            artifacts,
            implementations: Mutex::new(HashMap::new()),
        })
    }

    /// Deploy the `kind` implementation once and return its address.
    async fn ensure_implementation(&self, kind: ContractKind) -> Result<Address, ChainError> {
        let mut implementations = self.implementations.lock().await;
        if let Some(address) = implementations.get(&kind) {
            return Ok(*address);
        }

        let bytecode = self
            .artifacts
            .implementation(kind)
            .ok_or(ChainError::MissingArtifact(kind))?
            .clone();

        tracing::info!(implementation = kind.artifact_name(), "Deploying implementation");
        let pending = self.submit(None, bytecode).await?;
        let receipt = self.await_confirmation(pending).await?;
        let address = receipt
            .contract_address
            .ok_or(ChainError::MissingContractAddress(receipt.tx_hash))?;

        tracing::info!(
            implementation = kind.artifact_name(),
            address = %address,
            "Implementation deployed"
        );
        implementations.insert(kind, address);
        Ok(address)
    }

    /// Send a transaction from the configured sender. `to = None` creates a contract.
    async fn submit(&self, to: Option<Address>, data: Bytes) -> Result<PendingTx, ChainError> {
        let mut tx = serde_json::json!({
            "from": self.sender,
            "data": data,
        });
        if let Some(to) = to {
            tx["to"] = serde_json::json!(to);
        }

        let hash: TxHash =
            json_rpc_call(&self.http, &self.url, "eth_sendTransaction", vec![tx]).await?;
        tracing::trace!(tx_hash = %hash, "Transaction accepted by node");
        Ok(PendingTx { hash })
    }
}

impl ChainClient for RpcChainClient {
    fn sender(&self) -> Address {
        self.sender
    }

    async fn create_proxy_instance(&self, kind: ContractKind) -> Result<PendingTx, ChainError> {
        let implementation = self.ensure_implementation(kind).await?;

        // The proxy is created uninitialized; the initializer is a separate transaction.
        let constructor_args = (implementation, Bytes::new()).abi_encode_params();
        let mut data = self.artifacts.proxy.to_vec();
        data.extend_from_slice(&constructor_args);

        self.submit(None, data.into()).await
    }

    async fn call_initializer(
        &self,
        proxy: Address,
        calldata: Bytes,
    ) -> Result<PendingTx, ChainError> {
        self.submit(Some(proxy), calldata).await
    }

    async fn upgrade_implementation(
        &self,
        proxy: Address,
        new_kind: ContractKind,
    ) -> Result<PendingTx, ChainError> {
        let implementation = self.ensure_implementation(new_kind).await?;
        let calldata = IUUPSUpgradeable::upgradeToAndCallCall {
            newImplementation: implementation,
            data: Bytes::new(),
        }
        .abi_encode();

        self.submit(Some(proxy), calldata.into()).await
    }

    async fn call(&self, to: Address, calldata: Bytes) -> Result<Bytes, ChainError> {
        let request = serde_json::json!({
            "from": self.sender,
            "to": to,
            "data": calldata,
        });

        json_rpc_call(
            &self.http,
            &self.url,
            "eth_call",
            vec![request, serde_json::json!("latest")],
        )
        .await
        .map_err(|e| match e {
            ChainError::Rejected(reason) => ChainError::CallReverted { to, reason },
            other => other,
        })
    }

    async fn send_transaction(
        &self,
        to: Address,
        calldata: Bytes,
    ) -> Result<PendingTx, ChainError> {
        self.submit(Some(to), calldata).await
    }

    async fn await_confirmation(&self, tx: PendingTx) -> Result<Receipt, ChainError> {
        let poll = || async {
            let receipt: Option<RpcReceipt> = json_rpc_call(
                &self.http,
                &self.url,
                "eth_getTransactionReceipt",
                vec![serde_json::json!(tx.hash)],
            )
            .await?;
            receipt.ok_or(ChainError::Pending(tx.hash))
        };

        let receipt = poll
            .retry(
                ConstantBuilder::default()
                    .with_delay(Duration::from_millis(self.config.poll_interval_ms))
                    .with_max_times(self.config.max_polls()),
            )
            .when(|e| matches!(e, ChainError::Pending(_)))
            .notify(|_, delay| {
                tracing::trace!(tx_hash = %tx.hash, ?delay, "Receipt not available yet, polling...");
            })
            .await
            .map_err(|e| match e {
                ChainError::Pending(hash) => ChainError::ConfirmationTimeout(hash),
                other => other,
            })?;

        if receipt.status != 1 {
            return Err(ChainError::Reverted {
                tx_hash: receipt.transaction_hash,
                reason: format!("receipt status {}", receipt.status),
            });
        }

        tracing::debug!(
            tx_hash = %receipt.transaction_hash,
            block_number = receipt.block_number,
            "Transaction confirmed"
        );

        Ok(Receipt {
            tx_hash: receipt.transaction_hash,
            block_number: receipt.block_number,
            contract_address: receipt.contract_address,
        })
    }
}

/// Create an HTTP client configured for JSON-RPC requests.
fn create_client() -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(DEFAULT_REQUEST_TIMEOUT)
        .build()
        .context("Failed to create HTTP client")
}

/// Make a JSON-RPC call and deserialize the result.
///
/// Transport failures map to [`ChainError::Rpc`], error responses from the node to
/// [`ChainError::Rejected`].
async fn json_rpc_call<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &Url,
    method: &str,
    params: Vec<Value>,
) -> Result<T, ChainError> {
    let response = client
        .post(url.clone())
        .json(&serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        }))
        .send()
        .await
        .map_err(|e| ChainError::Rpc(format!("failed to send {method} request: {e}")))?;

    let result: Value = response
        .json()
        .await
        .map_err(|e| ChainError::Rpc(format!("failed to parse {method} response: {e}")))?;

    parse_rpc_response(method, result)
}

/// Extract the `result` member of a JSON-RPC response.
fn parse_rpc_response<T: DeserializeOwned>(method: &str, response: Value) -> Result<T, ChainError> {
    if let Some(error) = response.get("error") {
        return Err(ChainError::Rejected(
            error
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown")
                .to_string(),
        ));
    }

    let result_value = response
        .get("result")
        .cloned()
        .ok_or_else(|| ChainError::Rpc(format!("no result in {method} response")))?;

    serde_json::from_value(result_value)
        .map_err(|e| ChainError::Decode(format!("failed to deserialize {method} result: {e}")))
}
