//! Remote contract-execution clients.
//!
//! The orchestration core only talks to the chain through [`ChainClient`]. It never builds raw
//! transactions: it hands ABI-encoded calldata to the client and waits for receipts.

mod artifacts;
mod rpc;
mod simulated;

use std::future::Future;

use alloy_core::primitives::{Address, Bytes, TxHash};
use alloy_sol_types::SolCall;

use crate::ContractKind;

pub use artifacts::{Artifacts, ArtifactsConfig};
pub use rpc::{DEFAULT_RPC_URL, RpcChainClient, RpcConfig};
pub use simulated::{SimulatedChain, SimulatedOperation};

/// A submitted transaction that has not been confirmed yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingTx {
    pub hash: TxHash,
}

/// A confirmed, successful transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Receipt {
    pub tx_hash: TxHash,
    pub block_number: u64,
    /// Address of the contract created by this transaction, if any.
    pub contract_address: Option<Address>,
}

/// Errors reported by a [`ChainClient`].
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    /// The node could not be reached or answered with something that is not JSON-RPC.
    #[error("RPC transport error: {0}")]
    Rpc(String),
    /// The node refused the request (insufficient funds, nonce conflict, reverted estimate).
    #[error("request rejected: {0}")]
    Rejected(String),
    #[error("transaction {tx_hash} reverted: {reason}")]
    Reverted { tx_hash: TxHash, reason: String },
    #[error("call to {to} reverted: {reason}")]
    CallReverted { to: Address, reason: String },
    #[error("transaction {0} did not create a contract")]
    MissingContractAddress(TxHash),
    #[error("transaction {0} is not mined yet")]
    Pending(TxHash),
    #[error("timed out waiting for confirmation of {0}")]
    ConfirmationTimeout(TxHash),
    #[error("unknown transaction {0}")]
    UnknownTransaction(TxHash),
    #[error("no artifact loaded for {0}")]
    MissingArtifact(ContractKind),
    #[error("failed to decode return data: {0}")]
    Decode(String),
}

/// Remote contract-execution client.
///
/// Every mutating method returns as soon as the transaction is accepted by the node; callers
/// suspend on [`ChainClient::await_confirmation`] before using its effects.
pub trait ChainClient: Send + Sync {
    /// The account every transaction is sent from.
    fn sender(&self) -> Address;

    /// Create a new proxy delegating to a `kind` implementation, without initializing it.
    fn create_proxy_instance(
        &self,
        kind: ContractKind,
    ) -> impl Future<Output = Result<PendingTx, ChainError>> + Send;

    /// Call the one-time initializer of a freshly created proxy.
    fn call_initializer(
        &self,
        proxy: Address,
        calldata: Bytes,
    ) -> impl Future<Output = Result<PendingTx, ChainError>> + Send;

    /// Repoint `proxy` at a `new_kind` implementation, keeping its address and storage.
    fn upgrade_implementation(
        &self,
        proxy: Address,
        new_kind: ContractKind,
    ) -> impl Future<Output = Result<PendingTx, ChainError>> + Send;

    /// Execute a read-only call and return the raw return data.
    fn call(
        &self,
        to: Address,
        calldata: Bytes,
    ) -> impl Future<Output = Result<Bytes, ChainError>> + Send;

    /// Submit a state-changing call.
    fn send_transaction(
        &self,
        to: Address,
        calldata: Bytes,
    ) -> impl Future<Output = Result<PendingTx, ChainError>> + Send;

    /// Suspend until `tx` is mined. A reverted transaction is an error.
    fn await_confirmation(
        &self,
        tx: PendingTx,
    ) -> impl Future<Output = Result<Receipt, ChainError>> + Send;
}

/// Execute a typed view call and decode its return values.
pub async fn read<C, T>(client: &C, to: Address, call: T) -> Result<T::Return, ChainError>
where
    C: ChainClient,
    T: SolCall + Send,
{
    let data = client.call(to, call.abi_encode().into()).await?;
    T::abi_decode_returns(&data, true).map_err(|e| ChainError::Decode(e.to_string()))
}

/// Submit a typed state-changing call and wait for its confirmation.
pub async fn transact<C, T>(client: &C, to: Address, call: T) -> Result<Receipt, ChainError>
where
    C: ChainClient,
    T: SolCall + Send,
{
    let pending = client
        .send_transaction(to, call.abi_encode().into())
        .await?;
    tracing::debug!(tx_hash = %pending.hash, %to, "Transaction submitted");
    client.await_confirmation(pending).await
}

/// Create a `kind` proxy, wait for it, then run its initializer and wait again.
///
/// The initializer only goes out once the proxy creation is confirmed, so no later step can
/// reference an address that does not exist yet.
pub async fn deploy_proxy<C>(
    client: &C,
    kind: ContractKind,
    initializer: Bytes,
) -> Result<Address, ChainError>
where
    C: ChainClient,
{
    let pending = client.create_proxy_instance(kind).await?;
    tracing::debug!(tx_hash = %pending.hash, %kind, "Proxy creation submitted");
    let receipt = client.await_confirmation(pending).await?;
    let proxy = receipt
        .contract_address
        .ok_or(ChainError::MissingContractAddress(receipt.tx_hash))?;
    tracing::debug!(
        address = %proxy,
        block_number = receipt.block_number,
        "Proxy created"
    );

    let pending = client.call_initializer(proxy, initializer).await?;
    tracing::debug!(tx_hash = %pending.hash, address = %proxy, "Initializer submitted");
    client.await_confirmation(pending).await?;
    Ok(proxy)
}
