//! In-memory stand-ins for the chain and the derivation, for tests and local
//! development.

use crate::abi::{AuthenticatorResponse, RegisterArgs, SignatureRSV};
use crate::challenge::personalize;
use crate::proxy::{InnerCall, credential_id_hash};
use crate::{
    AccountContract, ContractError, KeyDerivation, RelayError, TransactionReceipt,
    TransactionRelay,
};
use alloy_primitives::{Address, B256, Bytes, U256, keccak256};
use alloy_sol_types::SolValue;
use async_trait::async_trait;
use authzn_credentials::{
    AssertionResponse, AssertionVerifier, AttestationResponse, Authenticator, ClientDataToken,
    CoseKey, CredentialError, RelyingParty, TokenKind, UserIdentity, render_tokens,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};
use std::time::Duration;

/// Gas charged for every registration included by a [`MemoryLedger`].
pub const REGISTRATION_GAS: u64 = 150_000;

/// A read-only contract reachable through an account `staticcall`.
/// `Err` carries revert data.
pub type ViewHandler = Arc<dyn Fn(&[u8]) -> Result<Bytes, Bytes> + Send + Sync>;

/// A proxied call as the ledger received it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyCallRecord {
    /// The credential the caller claimed to assert with.
    pub credential_id_hashed: B256,
    /// The assertion.
    pub response: AuthenticatorResponse,
    /// The calldata to run against the account.
    pub data: Bytes,
}

#[derive(Clone)]
struct StoredCredential {
    account: Address,
    public_key: CoseKey,
}

struct LedgerState {
    users: HashMap<B256, Vec<B256>>,
    credentials: HashMap<B256, StoredCredential>,
    sponsor_nonce: u64,
    gas_price: U256,
    block_number: u64,
    receipts: HashMap<B256, TransactionReceipt>,
    hold_receipts: bool,
    signing_refusal: Option<String>,
    views: HashMap<Address, ViewHandler>,
    last_proxy_call: Option<ProxyCallRecord>,
}

/// An account manager and the chain it lives on, held in memory.
///
/// It verifies assertions the way the contract does (the rebuilt
/// `clientDataJSON` must carry the personalized challenge and the P-256
/// signature must verify under the registered key) and accepts a sponsored
/// registration only at the sponsor's next nonce.
///
/// A "signed" registration is the ABI encoding of its arguments, nonce and
/// gas price; its hash is the keccak of those bytes.
#[derive(Clone)]
pub struct MemoryLedger {
    address: Address,
    chain_id: u64,
    salt: B256,
    sponsor: Address,
    salt_reads: Arc<AtomicUsize>,
    state: Arc<Mutex<LedgerState>>,
}

impl std::fmt::Debug for MemoryLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryLedger")
            .field("address", &self.address)
            .field("chain_id", &self.chain_id)
            .finish_non_exhaustive()
    }
}

impl MemoryLedger {
    /// A ledger for the account manager at `address` on `chain_id`, hashing
    /// usernames with `salt`.
    pub fn new(address: Address, chain_id: u64, salt: B256) -> Self {
        Self {
            address,
            chain_id,
            salt,
            sponsor: Address::from_word(keccak256(address)),
            salt_reads: Arc::new(AtomicUsize::default()),
            state: Arc::new(Mutex::new(LedgerState {
                users: HashMap::new(),
                credentials: HashMap::new(),
                sponsor_nonce: 0,
                gas_price: U256::from(100_000_000_000u64),
                block_number: 0,
                receipts: HashMap::new(),
                hold_receipts: false,
                signing_refusal: None,
                views: HashMap::new(),
                last_proxy_call: None,
            })),
        }
    }

    /// The sponsor account.
    pub fn sponsor(&self) -> Address {
        self.sponsor
    }

    /// How many times the salt was read.
    pub fn salt_reads(&self) -> usize {
        self.salt_reads.load(Ordering::Relaxed)
    }

    /// The account a registered username controls.
    pub fn account_of(hashed_username: B256) -> Address {
        Address::from_word(keccak256(hashed_username))
    }

    /// Register `credential_id` for `hashed_username` directly, without a
    /// transaction.
    pub fn insert_user(&self, hashed_username: B256, credential_id: &[u8], public_key: CoseKey) {
        let mut state = self.state.lock();
        let id = B256::left_padding_from(credential_id);
        state.users.entry(hashed_username).or_default().push(id);
        state.credentials.insert(
            credential_id_hash(credential_id),
            StoredCredential {
                account: Self::account_of(hashed_username),
                public_key,
            },
        );
    }

    /// Mark `hashed_username` as taken without registering a credential.
    pub fn insert_account(&self, hashed_username: B256) {
        self.state.lock().users.entry(hashed_username).or_default();
    }

    /// Make `address` answer account `staticcall`s through `handler`.
    pub fn register_view<F>(&self, address: Address, handler: F)
    where
        F: Fn(&[u8]) -> Result<Bytes, Bytes> + Send + Sync + 'static,
    {
        self.state.lock().views.insert(address, Arc::new(handler));
    }

    /// Have the contract refuse to sign registrations with `reason`.
    pub fn refuse_signing(&self, reason: impl Into<String>) {
        self.state.lock().signing_refusal = Some(reason.into());
    }

    /// Stop (or resume) producing receipts, as if blocks stopped.
    pub fn hold_receipts(&self, hold: bool) {
        self.state.lock().hold_receipts = hold;
    }

    /// Set the gas price reported by the relay.
    pub fn set_gas_price(&self, gas_price: U256) {
        self.state.lock().gas_price = gas_price;
    }

    /// The most recent proxied call, verified or not.
    pub fn last_proxy_call(&self) -> Option<ProxyCallRecord> {
        self.state.lock().last_proxy_call.clone()
    }

    fn verify(
        &self,
        credential: &StoredCredential,
        response: &AuthenticatorResponse,
        data: &[u8],
    ) -> Result<(), ContractError> {
        let tokens = response
            .clientDataTokens
            .iter()
            .map(|field| {
                let kind = match field.t {
                    0 => TokenKind::String,
                    1 => TokenKind::Literal,
                    other => {
                        return Err(reverted(format!("unknown client data token type {other}")));
                    }
                };
                Ok(ClientDataToken {
                    kind,
                    key: field.k.clone(),
                    value: field.v.clone(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let client_data_json = render_tokens(&tokens);

        let challenge = personalize(self.chain_id, self.address, self.salt, data);
        AssertionVerifier::from_cose(&credential.public_key)
            .and_then(|verifier| {
                verifier.verify(
                    challenge.as_slice(),
                    &response.authenticatorData,
                    client_data_json.as_bytes(),
                    &response.sigR.to_be_bytes::<32>(),
                    &response.sigS.to_be_bytes::<32>(),
                )
            })
            .map_err(|e| reverted(format!("invalid assertion: {e}")))
    }

    fn execute(&self, account: Address, data: &[u8]) -> Result<Bytes, ContractError> {
        let call = InnerCall::decode(data).map_err(|e| reverted(e.to_string()))?;
        match call {
            InnerCall::Sign { digest } => {
                let r = keccak256([account.as_slice(), digest.as_slice()].concat());
                let signature = SignatureRSV {
                    r,
                    s: keccak256(r),
                    v: U256::from(27),
                };
                Ok((signature,).abi_encode_params().into())
            }
            InnerCall::Staticcall { target, data } => {
                let handler = self.state.lock().views.get(&target).cloned();
                let (success, out_data) = match handler {
                    Some(handler) => match handler(&data) {
                        Ok(out) => (true, out),
                        Err(revert) => (false, revert),
                    },
                    None => (false, Bytes::new()),
                };
                Ok((success, out_data).abi_encode_params().into())
            }
        }
    }
}

fn reverted(reason: impl Into<String>) -> ContractError {
    ContractError::Reverted {
        reason: reason.into(),
    }
}

fn rejected(code: i64, message: &str) -> RelayError {
    RelayError::Rejected {
        code,
        message: message.to_owned(),
    }
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
impl AccountContract for MemoryLedger {
    fn address(&self) -> Address {
        self.address
    }

    async fn salt(&self) -> Result<B256, ContractError> {
        self.salt_reads.fetch_add(1, Ordering::Relaxed);
        Ok(self.salt)
    }

    async fn user_exists(&self, hashed_username: B256) -> Result<bool, ContractError> {
        Ok(self.state.lock().users.contains_key(&hashed_username))
    }

    async fn credential_ids_by_username(
        &self,
        hashed_username: B256,
    ) -> Result<Vec<B256>, ContractError> {
        Ok(self
            .state
            .lock()
            .users
            .get(&hashed_username)
            .cloned()
            .unwrap_or_default())
    }

    async fn gaspaying_address(&self) -> Result<Address, ContractError> {
        Ok(self.sponsor)
    }

    async fn gasless_register(
        &self,
        args: RegisterArgs,
        nonce: u64,
        gas_price: U256,
    ) -> Result<Bytes, ContractError> {
        if let Some(reason) = self.state.lock().signing_refusal.clone() {
            return Err(reverted(reason));
        }
        if args.credentialId.len() > 32 {
            return Err(reverted("credential id longer than 32 bytes"));
        }
        Ok((args, nonce, gas_price).abi_encode_params().into())
    }

    async fn proxy_view(
        &self,
        credential_id_hashed: B256,
        response: AuthenticatorResponse,
        data: Bytes,
    ) -> Result<Bytes, ContractError> {
        let credential = {
            let mut state = self.state.lock();
            state.last_proxy_call = Some(ProxyCallRecord {
                credential_id_hashed,
                response: response.clone(),
                data: data.clone(),
            });
            state.credentials.get(&credential_id_hashed).cloned()
        };
        let credential = credential.ok_or_else(|| reverted("unknown credential"))?;

        self.verify(&credential, &response, &data)?;
        self.execute(credential.account, &data)
    }
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
impl TransactionRelay for MemoryLedger {
    async fn chain_id(&self) -> Result<u64, RelayError> {
        Ok(self.chain_id)
    }

    async fn gas_price(&self) -> Result<U256, RelayError> {
        Ok(self.state.lock().gas_price)
    }

    async fn transaction_count(&self, address: Address) -> Result<u64, RelayError> {
        let state = self.state.lock();
        Ok(if address == self.sponsor {
            state.sponsor_nonce
        } else {
            0
        })
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> Result<B256, RelayError> {
        let (args, nonce, _gas_price) = <(RegisterArgs, u64, U256)>::abi_decode_params(&raw)
            .map_err(|_| rejected(-32602, "invalid transaction"))?;

        let mut state = self.state.lock();
        if nonce < state.sponsor_nonce {
            return Err(rejected(-32000, "nonce too low"));
        }
        if nonce > state.sponsor_nonce {
            return Err(rejected(-32000, "nonce too high"));
        }
        if state.users.contains_key(&args.hashedUsername) {
            return Err(rejected(3, "execution reverted: user already exists"));
        }

        let credential_id = args.credentialId.as_ref();
        state
            .users
            .entry(args.hashedUsername)
            .or_default()
            .push(B256::left_padding_from(credential_id));
        state.credentials.insert(
            credential_id_hash(credential_id),
            StoredCredential {
                account: Self::account_of(args.hashedUsername),
                public_key: CoseKey {
                    kty: args.pubkey.kty,
                    alg: args.pubkey.alg,
                    crv: args.pubkey.crv,
                    x: args.pubkey.x.to_be_bytes::<32>(),
                    y: args.pubkey.y.to_be_bytes::<32>(),
                },
            },
        );

        state.sponsor_nonce += 1;
        state.block_number += 1;
        let transaction_hash = keccak256(&raw);
        let receipt = TransactionReceipt {
            block_number: state.block_number,
            transaction_hash,
            gas_used: REGISTRATION_GAS,
        };
        state.receipts.insert(transaction_hash, receipt);
        Ok(transaction_hash)
    }

    async fn transaction_receipt(
        &self,
        hash: B256,
    ) -> Result<Option<TransactionReceipt>, RelayError> {
        let state = self.state.lock();
        if state.hold_receipts {
            return Ok(None);
        }
        Ok(state.receipts.get(&hash).copied())
    }
}

/// A [`KeyDerivation`] proxy that counts derivations.
#[derive(Clone, Debug)]
pub struct MeasuredDerivation<K> {
    derivations: Arc<AtomicUsize>,
    inner: K,
}

impl<K> MeasuredDerivation<K>
where
    K: KeyDerivation,
{
    /// Wrap `inner` so that its derivations may be counted.
    pub fn new(inner: K) -> Self {
        Self {
            derivations: Arc::new(AtomicUsize::default()),
            inner,
        }
    }

    /// The number of derivations so far, across clones.
    pub fn derivations(&self) -> usize {
        self.derivations.load(Ordering::Relaxed)
    }
}

impl<K> KeyDerivation for MeasuredDerivation<K>
where
    K: KeyDerivation,
{
    fn derive(&self, username: &str, salt: &B256) -> B256 {
        self.derivations.fetch_add(1, Ordering::Relaxed);
        self.inner.derive(username, salt)
    }
}

/// An [`Authenticator`] proxy that records the challenges it is asked to
/// sign.
#[derive(Clone)]
pub struct RecordingAuthenticator<A> {
    challenges: Arc<Mutex<Vec<Vec<u8>>>>,
    allowed: Arc<Mutex<Vec<Vec<Vec<u8>>>>>,
    inner: A,
}

impl<A> RecordingAuthenticator<A>
where
    A: Authenticator,
{
    /// Wrap `inner`.
    pub fn new(inner: A) -> Self {
        Self {
            challenges: Arc::new(Mutex::new(Vec::new())),
            allowed: Arc::new(Mutex::new(Vec::new())),
            inner,
        }
    }

    /// Every assertion challenge seen so far, oldest first.
    pub fn assertion_challenges(&self) -> Vec<Vec<u8>> {
        self.challenges.lock().clone()
    }

    /// The allowed credential ids of every assertion, oldest first.
    pub fn allowed_credentials(&self) -> Vec<Vec<Vec<u8>>> {
        self.allowed.lock().clone()
    }
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
impl<A> Authenticator for RecordingAuthenticator<A>
where
    A: Authenticator,
{
    async fn create(
        &self,
        rp: &RelyingParty,
        user: &UserIdentity,
        challenge: &[u8],
        timeout: Duration,
    ) -> Result<AttestationResponse, CredentialError> {
        self.inner.create(rp, user, challenge, timeout).await
    }

    async fn get(
        &self,
        allowed: &[Vec<u8>],
        challenge: &[u8],
        timeout: Duration,
    ) -> Result<AssertionResponse, CredentialError> {
        self.challenges.lock().push(challenge.to_vec());
        self.allowed.lock().push(allowed.to_vec());
        self.inner.get(allowed, challenge, timeout).await
    }
}
