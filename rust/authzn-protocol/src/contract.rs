//! The chain-side collaborators: the account manager contract and the
//! transaction relay that carries sponsored registrations.

use crate::abi::{AuthenticatorResponse, RegisterArgs};
use crate::{ContractError, RelayError};
use alloy_primitives::{Address, B256, Bytes, U256};
use async_trait::async_trait;
use authzn_common::ConditionalSync;
use std::sync::Arc;

/// Read access to the account manager contract.
///
/// Every method is a view call; nothing here changes chain state.
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
pub trait AccountContract: ConditionalSync {
    /// The contract's address. Part of every personalized challenge.
    fn address(&self) -> Address;

    /// The salt usernames are hashed with.
    async fn salt(&self) -> Result<B256, ContractError>;

    /// Whether an account is registered under `hashed_username`.
    async fn user_exists(&self, hashed_username: B256) -> Result<bool, ContractError>;

    /// The credential ids registered for `hashed_username`.
    async fn credential_ids_by_username(
        &self,
        hashed_username: B256,
    ) -> Result<Vec<B256>, ContractError>;

    /// The address that pays gas for sponsored registrations.
    async fn gaspaying_address(&self) -> Result<Address, ContractError>;

    /// Ask the contract to sign a registration transaction from its sponsor
    /// account with the given `nonce` and `gas_price`.
    async fn gasless_register(
        &self,
        args: RegisterArgs,
        nonce: u64,
        gas_price: U256,
    ) -> Result<Bytes, ContractError>;

    /// Run `data` against the account of the credential identified by
    /// `credential_id_hashed`, authorized by `response`.
    async fn proxy_view(
        &self,
        credential_id_hashed: B256,
        response: AuthenticatorResponse,
        data: Bytes,
    ) -> Result<Bytes, ContractError>;
}

/// Where a transaction ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionReceipt {
    /// The block that included the transaction.
    pub block_number: u64,
    /// The transaction hash.
    pub transaction_hash: B256,
    /// Gas consumed by the transaction.
    pub gas_used: u64,
}

/// Submission and inclusion of raw transactions.
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
pub trait TransactionRelay: ConditionalSync {
    /// The chain id reported by the node.
    async fn chain_id(&self) -> Result<u64, RelayError>;

    /// The current gas price.
    async fn gas_price(&self) -> Result<U256, RelayError>;

    /// The next nonce for `address`, counting pending transactions.
    async fn transaction_count(&self, address: Address) -> Result<u64, RelayError>;

    /// Relay a signed transaction, returning its hash.
    async fn send_raw_transaction(&self, raw: Bytes) -> Result<B256, RelayError>;

    /// The receipt for `hash`, or `None` while it is not yet included.
    async fn transaction_receipt(
        &self,
        hash: B256,
    ) -> Result<Option<TransactionReceipt>, RelayError>;
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
impl<T> AccountContract for Arc<T>
where
    T: AccountContract + ?Sized,
{
    fn address(&self) -> Address {
        (**self).address()
    }

    async fn salt(&self) -> Result<B256, ContractError> {
        (**self).salt().await
    }

    async fn user_exists(&self, hashed_username: B256) -> Result<bool, ContractError> {
        (**self).user_exists(hashed_username).await
    }

    async fn credential_ids_by_username(
        &self,
        hashed_username: B256,
    ) -> Result<Vec<B256>, ContractError> {
        (**self).credential_ids_by_username(hashed_username).await
    }

    async fn gaspaying_address(&self) -> Result<Address, ContractError> {
        (**self).gaspaying_address().await
    }

    async fn gasless_register(
        &self,
        args: RegisterArgs,
        nonce: u64,
        gas_price: U256,
    ) -> Result<Bytes, ContractError> {
        (**self).gasless_register(args, nonce, gas_price).await
    }

    async fn proxy_view(
        &self,
        credential_id_hashed: B256,
        response: AuthenticatorResponse,
        data: Bytes,
    ) -> Result<Bytes, ContractError> {
        (**self)
            .proxy_view(credential_id_hashed, response, data)
            .await
    }
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
impl<T> TransactionRelay for Arc<T>
where
    T: TransactionRelay + ?Sized,
{
    async fn chain_id(&self) -> Result<u64, RelayError> {
        (**self).chain_id().await
    }

    async fn gas_price(&self) -> Result<U256, RelayError> {
        (**self).gas_price().await
    }

    async fn transaction_count(&self, address: Address) -> Result<u64, RelayError> {
        (**self).transaction_count(address).await
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> Result<B256, RelayError> {
        (**self).send_raw_transaction(raw).await
    }

    async fn transaction_receipt(
        &self,
        hash: B256,
    ) -> Result<Option<TransactionReceipt>, RelayError> {
        (**self).transaction_receipt(hash).await
    }
}
