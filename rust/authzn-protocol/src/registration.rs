//! Gas-sponsored registration.
//!
//! The account manager holds the key of a sponsor account. A registration is
//! built by asking the contract, in a view call, to sign its own
//! `register` transaction for the supplied nonce and gas price. The signed
//! bytes are then relayed like any other raw transaction.
//!
//! Nonce and gas price are read immediately before signing and nothing
//! serializes concurrent registrations: two registrations built against the
//! same nonce both sign fine, and the node rejects the second one.

use crate::abi::{CosePublicKey, RegisterArgs};
use crate::{AccountContract, AuthznError, ContractError, TransactionReceipt, TransactionRelay};
use alloy_primitives::{Address, B256, Bytes, U256};
use authzn_common::time::{Duration, sleep, timeout};
use authzn_credentials::CoseKey;

const DEFAULT_INCLUSION_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Nonce and gas price of the sponsor account at the moment of asking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SponsorTerms {
    /// The account paying for the registration.
    pub sponsor: Address,
    /// The sponsor's next nonce, counting pending transactions.
    pub nonce: u64,
    /// The gas price to sign with.
    pub gas_price: U256,
}

impl From<&CoseKey> for CosePublicKey {
    fn from(key: &CoseKey) -> Self {
        CosePublicKey {
            kty: key.kty,
            alg: key.alg,
            crv: key.crv,
            x: U256::from_be_bytes(key.x),
            y: U256::from_be_bytes(key.y),
        }
    }
}

/// The registration arguments for a credential. `optionalPassword` is
/// always zero.
pub fn register_args(
    hashed_username: B256,
    credential_id: &[u8],
    public_key: &CoseKey,
) -> RegisterArgs {
    RegisterArgs {
        hashedUsername: hashed_username,
        credentialId: Bytes::copy_from_slice(credential_id),
        pubkey: public_key.into(),
        optionalPassword: B256::ZERO,
    }
}

/// Builds and relays sponsor-signed registration transactions.
#[derive(Debug, Clone)]
pub struct GaslessRegistrar<C, R> {
    contract: C,
    relay: R,
    inclusion_timeout: Duration,
    poll_interval: Duration,
}

impl<C, R> GaslessRegistrar<C, R>
where
    C: AccountContract,
    R: TransactionRelay,
{
    /// Create a registrar with default inclusion deadline and poll interval.
    pub fn new(contract: C, relay: R) -> Self {
        Self {
            contract,
            relay,
            inclusion_timeout: DEFAULT_INCLUSION_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// How long [`GaslessRegistrar::wait_for_inclusion`] waits for a receipt.
    pub fn with_inclusion_timeout(mut self, inclusion_timeout: Duration) -> Self {
        self.inclusion_timeout = inclusion_timeout;
        self
    }

    /// How often receipts are polled.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// The account manager.
    pub fn contract(&self) -> &C {
        &self.contract
    }

    /// The relay.
    pub fn relay(&self) -> &R {
        &self.relay
    }

    /// Read the sponsor address, then its pending nonce and the gas price.
    pub async fn sponsor_terms(&self) -> Result<SponsorTerms, AuthznError> {
        let sponsor = self.contract.gaspaying_address().await?;
        let nonce = self.relay.transaction_count(sponsor).await?;
        let gas_price = self.relay.gas_price().await?;
        tracing::debug!(%sponsor, nonce, %gas_price, "read sponsor terms");
        Ok(SponsorTerms {
            sponsor,
            nonce,
            gas_price,
        })
    }

    /// Have the contract sign a registration transaction for `nonce` and
    /// `gas_price`.
    ///
    /// A revert is the contract's signer refusing and surfaces as
    /// [`AuthznError::Signing`] with the contract's reason.
    pub async fn build_signed_registration(
        &self,
        hashed_username: B256,
        credential_id: &[u8],
        public_key: &CoseKey,
        nonce: u64,
        gas_price: U256,
    ) -> Result<Bytes, AuthznError> {
        let args = register_args(hashed_username, credential_id, public_key);
        match self.contract.gasless_register(args, nonce, gas_price).await {
            Ok(signed) => Ok(signed),
            Err(ContractError::Reverted { reason }) => Err(AuthznError::Signing { reason }),
            Err(other) => Err(other.into()),
        }
    }

    /// Relay a signed transaction. Node rejections surface as
    /// [`AuthznError::Submission`].
    pub async fn send(&self, signed: Bytes) -> Result<B256, AuthznError> {
        let hash = self.relay.send_raw_transaction(signed).await?;
        tracing::info!(transaction = %hash, "registration submitted");
        Ok(hash)
    }

    /// Poll for the receipt of `hash` until it appears or the inclusion
    /// deadline passes.
    pub async fn wait_for_inclusion(&self, hash: B256) -> Result<TransactionReceipt, AuthznError> {
        let poll = async {
            loop {
                if let Some(receipt) = self.relay.transaction_receipt(hash).await? {
                    return Ok::<_, AuthznError>(receipt);
                }
                sleep(self.poll_interval).await;
            }
        };

        let receipt = timeout(self.inclusion_timeout, poll)
            .await
            .map_err(|_| AuthznError::Timeout {
                operation: "transaction inclusion",
                after: self.inclusion_timeout,
            })??;

        tracing::info!(
            transaction = %receipt.transaction_hash,
            block = receipt.block_number,
            gas_used = receipt.gas_used,
            "registration included"
        );
        Ok(receipt)
    }

    /// Relay a signed transaction and wait for its inclusion. No retries.
    pub async fn submit(&self, signed: Bytes) -> Result<TransactionReceipt, AuthznError> {
        let hash = self.send(signed).await?;
        self.wait_for_inclusion(hash).await
    }
}
