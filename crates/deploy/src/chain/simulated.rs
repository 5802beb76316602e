//! In-memory chain used for dry runs and tests.
//!
//! Models exactly what the deployment flow relies on: proxies that are created uninitialized,
//! one-time initializers, an owner-restricted token mint, balances and UUPS upgrades guarded by
//! owner authority and storage compatibility. Every mutating call gets a receipt; a reverted call
//! leaves the state untouched and fails at confirmation time, like on a real node.

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

use alloy_core::primitives::{Address, Bytes, TxHash, U256, keccak256};
use alloy_sol_types::SolCall;

use super::{ChainClient, ChainError, PendingTx, Receipt};
use crate::{
    ContractKind, DeployConfig, REWARDS_TOKEN, VAULT, VAULT_TOKEN,
    contracts::{IVault, IVaultToken, IVaultV2, VaultParams},
};

/// Mutating operations whose next occurrence can be forced to revert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum SimulatedOperation {
    CreateProxy,
    Initialize,
    Mint,
    Upgrade,
}

#[derive(Debug, Clone)]
enum Storage {
    Empty,
    Token {
        name: String,
        symbol: String,
        balances: HashMap<Address, U256>,
    },
    Vault(VaultParams),
}

#[derive(Debug, Clone)]
struct Proxy {
    kind: ContractKind,
    /// Set by the initializer; holds mint and upgrade authority.
    owner: Option<Address>,
    storage: Storage,
}

#[derive(Debug)]
struct State {
    sender: Address,
    nonce: u64,
    block_number: u64,
    contracts: HashMap<Address, Proxy>,
    receipts: HashMap<TxHash, Result<Receipt, String>>,
    failures: HashMap<SimulatedOperation, String>,
    rename_on_upgrade: Option<String>,
    history: Vec<(SimulatedOperation, Address)>,
}

impl State {
    /// Record a transaction and return its pending handle.
    fn record(&mut self, created: Option<Address>, outcome: Result<(), String>) -> PendingTx {
        let hash = keccak256(
            [
                self.sender.as_slice(),
                self.nonce.to_be_bytes().as_slice(),
            ]
            .concat(),
        );
        self.nonce += 1;
        self.block_number += 1;

        let receipt = outcome.map(|()| Receipt {
            tx_hash: hash,
            block_number: self.block_number,
            contract_address: created,
        });
        self.receipts.insert(hash, receipt);
        PendingTx { hash }
    }

    fn forced_failure(&mut self, op: SimulatedOperation) -> Option<String> {
        self.failures.remove(&op)
    }
}

/// In-memory [`ChainClient`].
#[derive(Debug)]
pub struct SimulatedChain {
    state: Mutex<State>,
}

impl SimulatedChain {
    pub fn new(sender: Address) -> Self {
        Self {
            state: Mutex::new(State {
                sender,
                nonce: 0,
                block_number: 0,
                contracts: HashMap::new(),
                receipts: HashMap::new(),
                failures: HashMap::new(),
                rename_on_upgrade: None,
                history: Vec::new(),
            }),
        }
    }

    /// Build a simulation in which every address pinned in `config` is a live instance.
    pub fn with_pins(config: &DeployConfig) -> Self {
        let chain = Self::new(config.admin);
        let book = &config.address_book;

        if let Some(address) = book.get(VAULT_TOKEN) {
            chain.pin_token(
                *address,
                &config.tokens.primary.name,
                &config.tokens.primary.symbol,
            );
        }
        if let Some(address) = book.get(REWARDS_TOKEN) {
            chain.pin_token(
                *address,
                &config.tokens.rewards.name,
                &config.tokens.rewards.symbol,
            );
        }
        if let Some(address) = book.get(VAULT) {
            let params = VaultParams {
                token: book.get(VAULT_TOKEN).copied().unwrap_or_default(),
                rewardsToken: book.get(REWARDS_TOKEN).copied().unwrap_or_default(),
                name: config.vault.name.clone(),
                symbol: config.vault.symbol.clone(),
                flagA: config.vault.flag_a,
                flagB: config.vault.flag_b,
                paramX: U256::from(config.vault.param_x),
                paramY: U256::from(config.vault.param_y),
            };
            chain.pin_vault(*address, params);
        }
        chain
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Change the account later transactions are sent from.
    pub fn set_sender(&self, sender: Address) {
        self.state().sender = sender;
    }

    /// Make the next `op` revert with `reason`.
    pub fn fail_next(&self, op: SimulatedOperation, reason: impl Into<String>) {
        self.state().failures.insert(op, reason.into());
    }

    /// Make upgraded vaults report `name` from then on, as an implementation that changes the
    /// name getter would.
    pub fn rename_on_upgrade(&self, name: impl Into<String>) {
        self.state().rename_on_upgrade = Some(name.into());
    }

    /// Materialise an initialized token proxy owned by the current sender.
    pub fn pin_token(&self, address: Address, name: &str, symbol: &str) {
        let mut state = self.state();
        let owner = state.sender;
        state.contracts.insert(
            address,
            Proxy {
                kind: ContractKind::VaultToken,
                owner: Some(owner),
                storage: Storage::Token {
                    name: name.to_string(),
                    symbol: symbol.to_string(),
                    balances: HashMap::new(),
                },
            },
        );
    }

    /// Materialise an initialized first-version vault proxy owned by the current sender.
    pub fn pin_vault(&self, address: Address, params: VaultParams) {
        let mut state = self.state();
        let owner = state.sender;
        state.contracts.insert(
            address,
            Proxy {
                kind: ContractKind::Vault,
                owner: Some(owner),
                storage: Storage::Vault(params),
            },
        );
    }

    /// Current balance of `account` on `token`, zero for unknown tokens.
    pub fn balance_of(&self, token: Address, account: Address) -> U256 {
        match self.state().contracts.get(&token).map(|p| &p.storage) {
            Some(Storage::Token { balances, .. }) => {
                balances.get(&account).copied().unwrap_or_default()
            }
            _ => U256::ZERO,
        }
    }

    /// The implementation a proxy currently delegates to.
    pub fn implementation_of(&self, address: Address) -> Option<ContractKind> {
        self.state().contracts.get(&address).map(|p| p.kind)
    }

    /// Every mutating operation submitted so far with its target (or created) address,
    /// including the reverted ones.
    pub fn history(&self) -> Vec<(SimulatedOperation, Address)> {
        self.state().history.clone()
    }

    fn initialize(state: &mut State, proxy: Address, calldata: &[u8]) -> Result<(), String> {
        let sender = state.sender;
        let contract = state
            .contracts
            .get_mut(&proxy)
            .ok_or_else(|| format!("no contract at {proxy}"))?;
        if contract.owner.is_some() {
            return Err("Initializable: contract is already initialized".to_string());
        }

        contract.storage = match contract.kind {
            ContractKind::VaultToken => {
                let call = IVaultToken::initializeCall::abi_decode(calldata, true)
                    .map_err(|e| format!("invalid token initializer: {e}"))?;
                Storage::Token {
                    name: call.name,
                    symbol: call.symbol,
                    balances: HashMap::new(),
                }
            }
            ContractKind::Vault | ContractKind::VaultV2 => {
                let call = IVault::initializeCall::abi_decode(calldata, true)
                    .map_err(|e| format!("invalid vault initializer: {e}"))?;
                Storage::Vault(call.params)
            }
        };
        contract.owner = Some(sender);
        Ok(())
    }

    fn mint(state: &mut State, token: Address, calldata: &[u8]) -> Result<(), String> {
        let sender = state.sender;
        let call = IVaultToken::mintCall::abi_decode(calldata, true)
            .map_err(|e| format!("invalid mint call: {e}"))?;
        let contract = state
            .contracts
            .get_mut(&token)
            .ok_or_else(|| format!("no contract at {token}"))?;
        if contract.owner != Some(sender) {
            return Err("caller lacks mint role".to_string());
        }
        let Storage::Token { balances, .. } = &mut contract.storage else {
            return Err(format!("{token} is not a token"));
        };

        let balance = balances.entry(call.to).or_default();
        *balance = balance
            .checked_add(call.amount)
            .ok_or_else(|| "balance overflow".to_string())?;
        Ok(())
    }

    fn upgrade(state: &mut State, proxy: Address, new_kind: ContractKind) -> Result<(), String> {
        let sender = state.sender;
        let rename = state.rename_on_upgrade.clone();
        let contract = state
            .contracts
            .get_mut(&proxy)
            .ok_or_else(|| format!("no contract at {proxy}"))?;
        if contract.owner != Some(sender) {
            return Err("caller lacks upgrade authority".to_string());
        }
        if !contract.kind.can_upgrade_to(new_kind) {
            return Err(format!(
                "storage layout of {} is not compatible with {}",
                contract.kind.artifact_name(),
                new_kind.artifact_name()
            ));
        }

        contract.kind = new_kind;
        if let (Some(name), Storage::Vault(params)) = (rename, &mut contract.storage) {
            params.name = name;
        }
        Ok(())
    }

    fn view(contract: &Proxy, calldata: &[u8]) -> Result<Vec<u8>, String> {
        let selector: [u8; 4] = calldata
            .get(..4)
            .and_then(|s| s.try_into().ok())
            .ok_or_else(|| "calldata too short".to_string())?;

        let unknown = || format!("unknown selector 0x{}", hex::encode(selector));

        match &contract.storage {
            Storage::Empty => Err("proxy is not initialized".to_string()),
            Storage::Token {
                name,
                symbol,
                balances,
            } => {
                if selector == IVaultToken::nameCall::SELECTOR {
                    Ok(IVaultToken::nameCall::abi_encode_returns(&(name.clone(),)))
                } else if selector == IVaultToken::symbolCall::SELECTOR {
                    Ok(IVaultToken::symbolCall::abi_encode_returns(&(symbol.clone(),)))
                } else if selector == IVaultToken::balanceOfCall::SELECTOR {
                    let call = IVaultToken::balanceOfCall::abi_decode(calldata, true)
                        .map_err(|e| e.to_string())?;
                    let balance = balances.get(&call.account).copied().unwrap_or_default();
                    Ok(IVaultToken::balanceOfCall::abi_encode_returns(&(balance,)))
                } else {
                    Err(unknown())
                }
            }
            Storage::Vault(params) => {
                if selector == IVaultV2::nameCall::SELECTOR {
                    Ok(IVaultV2::nameCall::abi_encode_returns(&(params.name.clone(),)))
                } else if selector == IVaultV2::tokenCall::SELECTOR {
                    Ok(IVaultV2::tokenCall::abi_encode_returns(&(params.token,)))
                } else if selector == IVaultV2::rewardsTokenCall::SELECTOR {
                    Ok(IVaultV2::rewardsTokenCall::abi_encode_returns(&(
                        params.rewardsToken,
                    )))
                } else {
                    Err(unknown())
                }
            }
        }
    }
}

impl ChainClient for SimulatedChain {
    fn sender(&self) -> Address {
        self.state().sender
    }

    async fn create_proxy_instance(&self, kind: ContractKind) -> Result<PendingTx, ChainError> {
        let mut state = self.state();
        let address = state.sender.create(state.nonce);
        state.history.push((SimulatedOperation::CreateProxy, address));

        if let Some(reason) = state.forced_failure(SimulatedOperation::CreateProxy) {
            return Ok(state.record(None, Err(reason)));
        }

        state.contracts.insert(
            address,
            Proxy {
                kind,
                owner: None,
                storage: Storage::Empty,
            },
        );
        Ok(state.record(Some(address), Ok(())))
    }

    async fn call_initializer(
        &self,
        proxy: Address,
        calldata: Bytes,
    ) -> Result<PendingTx, ChainError> {
        let mut state = self.state();
        state.history.push((SimulatedOperation::Initialize, proxy));

        let outcome = match state.forced_failure(SimulatedOperation::Initialize) {
            Some(reason) => Err(reason),
            None => Self::initialize(&mut state, proxy, &calldata),
        };
        Ok(state.record(None, outcome))
    }

    async fn upgrade_implementation(
        &self,
        proxy: Address,
        new_kind: ContractKind,
    ) -> Result<PendingTx, ChainError> {
        let mut state = self.state();
        state.history.push((SimulatedOperation::Upgrade, proxy));

        let outcome = match state.forced_failure(SimulatedOperation::Upgrade) {
            Some(reason) => Err(reason),
            None => Self::upgrade(&mut state, proxy, new_kind),
        };
        Ok(state.record(None, outcome))
    }

    async fn call(&self, to: Address, calldata: Bytes) -> Result<Bytes, ChainError> {
        let state = self.state();
        let contract = state.contracts.get(&to).ok_or_else(|| ChainError::CallReverted {
            to,
            reason: "no contract at address".to_string(),
        })?;

        Self::view(contract, &calldata)
            .map(Bytes::from)
            .map_err(|reason| ChainError::CallReverted { to, reason })
    }

    async fn send_transaction(
        &self,
        to: Address,
        calldata: Bytes,
    ) -> Result<PendingTx, ChainError> {
        let mut state = self.state();

        if calldata.starts_with(&IVaultToken::mintCall::SELECTOR) {
            state.history.push((SimulatedOperation::Mint, to));
            let outcome = match state.forced_failure(SimulatedOperation::Mint) {
                Some(reason) => Err(reason),
                None => Self::mint(&mut state, to, &calldata),
            };
            return Ok(state.record(None, outcome));
        }

        Err(ChainError::Rejected(format!(
            "unsupported call to {to}: 0x{}",
            hex::encode(calldata.get(..4).unwrap_or_default())
        )))
    }

    async fn await_confirmation(&self, tx: PendingTx) -> Result<Receipt, ChainError> {
        match self.state().receipts.get(&tx.hash) {
            Some(Ok(receipt)) => Ok(*receipt),
            Some(Err(reason)) => Err(ChainError::Reverted {
                tx_hash: tx.hash,
                reason: reason.clone(),
            }),
            None => Err(ChainError::UnknownTransaction(tx.hash)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{read, transact};
    use alloy_core::primitives::address;

    const ADMIN: Address = address!("5aF828D07f4e403522F2E88eC544E1F7D559E29d");

    async fn deploy(chain: &SimulatedChain, kind: ContractKind, init: Vec<u8>) -> Address {
        let pending = chain.create_proxy_instance(kind).await.unwrap();
        let receipt = chain.await_confirmation(pending).await.unwrap();
        let proxy = receipt.contract_address.unwrap();
        let pending = chain.call_initializer(proxy, init.into()).await.unwrap();
        chain.await_confirmation(pending).await.unwrap();
        proxy
    }

    fn token_init(name: &str, symbol: &str) -> Vec<u8> {
        IVaultToken::initializeCall {
            name: name.to_string(),
            symbol: symbol.to_string(),
        }
        .abi_encode()
    }

    #[tokio::test]
    async fn test_token_lifecycle() {
        let chain = SimulatedChain::new(ADMIN);
        let token = deploy(&chain, ContractKind::VaultToken, token_init("VaultToken", "VT")).await;

        let name = read(&chain, token, IVaultToken::nameCall {}).await.unwrap();
        assert_eq!(name._0, "VaultToken");

        let amount = U256::from(42);
        transact(&chain, token, IVaultToken::mintCall { to: ADMIN, amount })
            .await
            .unwrap();
        assert_eq!(chain.balance_of(token, ADMIN), amount);
    }

    #[tokio::test]
    async fn test_initializer_runs_once() {
        let chain = SimulatedChain::new(ADMIN);
        let token = deploy(&chain, ContractKind::VaultToken, token_init("A", "A")).await;

        let pending = chain
            .call_initializer(token, token_init("B", "B").into())
            .await
            .unwrap();
        let err = chain.await_confirmation(pending).await.unwrap_err();
        assert!(matches!(err, ChainError::Reverted { .. }));
    }

    #[tokio::test]
    async fn test_mint_requires_owner() {
        let chain = SimulatedChain::new(ADMIN);
        let token = deploy(&chain, ContractKind::VaultToken, token_init("A", "A")).await;

        chain.set_sender(Address::repeat_byte(0x11));
        let err = transact(
            &chain,
            token,
            IVaultToken::mintCall {
                to: ADMIN,
                amount: U256::from(1),
            },
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("caller lacks mint role"));
        assert_eq!(chain.balance_of(token, ADMIN), U256::ZERO);
    }

    #[tokio::test]
    async fn test_upgrade_rules() {
        let chain = SimulatedChain::new(ADMIN);
        let token = deploy(&chain, ContractKind::VaultToken, token_init("A", "A")).await;

        let pending = chain
            .upgrade_implementation(token, ContractKind::VaultV2)
            .await
            .unwrap();
        assert!(chain.await_confirmation(pending).await.is_err());
        assert_eq!(
            chain.implementation_of(token),
            Some(ContractKind::VaultToken)
        );
    }

    #[tokio::test]
    async fn test_forced_failure_is_consumed() {
        let chain = SimulatedChain::new(ADMIN);
        chain.fail_next(SimulatedOperation::CreateProxy, "out of gas");

        let pending = chain
            .create_proxy_instance(ContractKind::Vault)
            .await
            .unwrap();
        assert!(chain.await_confirmation(pending).await.is_err());

        let pending = chain
            .create_proxy_instance(ContractKind::Vault)
            .await
            .unwrap();
        let receipt = chain.await_confirmation(pending).await.unwrap();
        assert!(receipt.contract_address.is_some());
        assert_eq!(chain.history().len(), 2);
    }

    #[tokio::test]
    async fn test_call_unknown_address() {
        let chain = SimulatedChain::new(ADMIN);
        let err = chain
            .call(Address::repeat_byte(0x22), Bytes::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ChainError::CallReverted { .. }));
    }

    #[tokio::test]
    async fn test_unknown_transaction() {
        let chain = SimulatedChain::new(ADMIN);
        let err = chain
            .await_confirmation(PendingTx { hash: TxHash::ZERO })
            .await
            .unwrap_err();
        assert!(matches!(err, ChainError::UnknownTransaction(_)));
    }
}
