//! The protocol surface exposed to a user interface.

use crate::proxy::{
    InnerCall, authenticator_response, credential_id_from_word, credential_id_hash,
    decode_signature, unwrap_staticcall_result, wrap_staticcall,
};
use crate::{
    AccountContract, AuthznConfig, AuthznError, GaslessRegistrar, KeyDerivation, Pbkdf2Sha256,
    Status, TransactionReceipt, TransactionRelay, UsernameCheck, UsernameError, UsernameHasher,
    UsernameStatus, abi::SignatureRSV, challenge::personalize,
};
use alloy_primitives::{Address, B256, Bytes};
use authzn_credentials::{Authenticator, CredentialBroker, RelyingParty, UserIdentity};
use rand_core::{OsRng, RngCore as _};
use std::sync::Arc;
use tokio::sync::watch;

/// What a successful registration produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationResult {
    /// The account identifier.
    pub hashed_username: B256,
    /// The id of the credential that now controls the account.
    pub credential_id: Vec<u8>,
    /// Inclusion of the registration transaction.
    pub receipt: TransactionReceipt,
}

/// Registers accounts and makes authenticated calls through them.
///
/// Progress is published as [`Status`] snapshots; see
/// [`AuthznClient::subscribe`].
pub struct AuthznClient<C, R, A, K = Pbkdf2Sha256> {
    config: AuthznConfig,
    contract: Arc<C>,
    hasher: UsernameHasher<Arc<C>, K>,
    registrar: GaslessRegistrar<Arc<C>, R>,
    broker: CredentialBroker<A>,
    status: watch::Sender<Status>,
}

impl<C, R, A> AuthznClient<C, R, A, Pbkdf2Sha256>
where
    C: AccountContract,
    R: TransactionRelay,
    A: Authenticator,
{
    /// Create a client hashing usernames with PBKDF2 at the configured
    /// iteration count.
    pub fn new(config: AuthznConfig, contract: C, relay: R, authenticator: A) -> Self {
        let derivation = Pbkdf2Sha256::new(config.pbkdf2_rounds);
        Self::with_key_derivation(config, contract, relay, authenticator, derivation)
    }
}

impl<C, R, A, K> AuthznClient<C, R, A, K>
where
    C: AccountContract,
    R: TransactionRelay,
    A: Authenticator,
    K: KeyDerivation,
{
    /// Create a client with a custom username derivation.
    pub fn with_key_derivation(
        config: AuthznConfig,
        contract: C,
        relay: R,
        authenticator: A,
        derivation: K,
    ) -> Self {
        let contract = Arc::new(contract);
        let hasher = UsernameHasher::with_derivation(contract.clone(), derivation);
        let registrar = GaslessRegistrar::new(contract.clone(), relay)
            .with_inclusion_timeout(config.inclusion_timeout())
            .with_poll_interval(config.poll_interval());
        let broker = CredentialBroker::new(authenticator).with_timeout(config.ceremony_timeout());
        let (status, _) = watch::channel(Status::Idle);

        Self {
            config,
            contract,
            hasher,
            registrar,
            broker,
            status,
        }
    }

    /// The configuration the client was built with.
    pub fn config(&self) -> &AuthznConfig {
        &self.config
    }

    /// The username hasher.
    pub fn hasher(&self) -> &UsernameHasher<Arc<C>, K> {
        &self.hasher
    }

    /// The registrar.
    pub fn registrar(&self) -> &GaslessRegistrar<Arc<C>, R> {
        &self.registrar
    }

    /// The credential broker.
    pub fn broker(&self) -> &CredentialBroker<A> {
        &self.broker
    }

    /// Receive a snapshot every time the status changes.
    pub fn subscribe(&self) -> watch::Receiver<Status> {
        self.status.subscribe()
    }

    /// The latest status.
    pub fn status(&self) -> Status {
        self.status.borrow().clone()
    }

    fn publish(&self, status: Status) {
        self.status.send_replace(status);
    }

    fn report<T>(&self, result: Result<T, AuthznError>) -> Result<T, AuthznError> {
        if let Err(error) = &result {
            tracing::warn!(kind = %error.kind(), %error, "operation failed");
            self.publish(Status::from(error));
        }
        result
    }

    /// Check whether `username` may be registered (`must_exist == false`) or
    /// signed in with (`must_exist == true`).
    #[tracing::instrument(skip_all, fields(must_exist = must_exist))]
    pub async fn check_username(
        &self,
        username: &str,
        must_exist: bool,
    ) -> Result<UsernameCheck, AuthznError> {
        self.publish(Status::CheckingUsername);
        let result = self.hasher.check(username, must_exist).await;
        if let Ok(check) = &result {
            self.publish(Status::UsernameChecked(*check));
        }
        self.report(result)
    }

    /// Check `username` and return its hash, failing when the check does.
    async fn require(&self, username: &str, must_exist: bool) -> Result<B256, AuthznError> {
        let check = self.check_username(username, must_exist).await?;
        let rejection = match check.status {
            UsernameStatus::Available => return self.hasher.hash(username).await,
            UsernameStatus::Required => UsernameError::Empty,
            UsernameStatus::InvalidCharacters => {
                UsernameError::InvalidCharacters(username.to_owned())
            }
            UsernameStatus::AlreadyExists => UsernameError::AlreadyExists(username.to_owned()),
            UsernameStatus::DoesNotExist => UsernameError::DoesNotExist(username.to_owned()),
        };
        Err(rejection.into())
    }

    /// Create a credential for `username` and register it through a
    /// sponsored transaction.
    #[tracing::instrument(skip_all)]
    pub async fn register(&self, username: &str) -> Result<RegistrationResult, AuthznError> {
        let result = self.register_unreported(username).await;
        self.report(result)
    }

    async fn register_unreported(
        &self,
        username: &str,
    ) -> Result<RegistrationResult, AuthznError> {
        let hashed_username = self.require(username, false).await?;
        let name = username.to_ascii_lowercase();

        self.publish(Status::RequestingCredential);
        let mut challenge = [0u8; 32];
        OsRng.fill_bytes(&mut challenge);
        let rp = RelyingParty {
            id: self.config.rp_id.clone(),
            name: self.config.rp_name.clone(),
        };
        let user = UserIdentity {
            id: hashed_username.to_vec(),
            name: name.clone(),
            display_name: name,
        };
        let credential = self.broker.register(&rp, &user, &challenge).await?;

        self.publish(Status::AwaitingSponsorSignature);
        let terms = self.registrar.sponsor_terms().await?;
        let signed = self
            .registrar
            .build_signed_registration(
                hashed_username,
                &credential.id,
                &credential.public_key,
                terms.nonce,
                terms.gas_price,
            )
            .await?;

        let transaction_hash = self.registrar.send(signed).await?;
        self.publish(Status::Submitted { transaction_hash });

        let receipt = self.registrar.wait_for_inclusion(transaction_hash).await?;
        self.publish(Status::Registered(receipt));

        Ok(RegistrationResult {
            hashed_username,
            credential_id: credential.id,
            receipt,
        })
    }

    /// The chain id challenges are bound to, as reported by the node.
    ///
    /// Read on every call and checked against the configured chain id; a
    /// node serving another chain is an [`AuthznError::ChainMismatch`].
    pub async fn chain_id(&self) -> Result<u64, AuthznError> {
        let reported = self.registrar.relay().chain_id().await?;
        if reported != self.config.chain_id {
            return Err(AuthznError::ChainMismatch {
                configured: self.config.chain_id,
                reported,
            });
        }
        Ok(reported)
    }

    /// Run `calldata` against `username`'s account, authorized by an
    /// assertion over its personalized challenge. Returns the account's raw
    /// return data.
    async fn account_call(&self, username: &str, calldata: Bytes) -> Result<Bytes, AuthznError> {
        let hashed_username = self.require(username, true).await?;
        let chain_id = self.chain_id().await?;
        let salt = self.hasher.salt().await?;
        let challenge = personalize(
            chain_id,
            self.contract.address(),
            salt,
            &calldata,
        );

        self.publish(Status::FetchingCredentials);
        let candidates: Vec<Vec<u8>> = self
            .contract
            .credential_ids_by_username(hashed_username)
            .await?
            .iter()
            .map(credential_id_from_word)
            .collect();

        self.publish(Status::AwaitingAssertion);
        let assertion = self.broker.assert(&candidates, challenge.as_slice()).await?;

        let returned = self
            .contract
            .proxy_view(
                credential_id_hash(&assertion.credential_id),
                authenticator_response(&assertion),
                calldata,
            )
            .await?;
        Ok(returned)
    }

    /// Call `target` with `data` as `username`'s account and return what the
    /// target returned.
    #[tracing::instrument(skip_all, fields(target = %target))]
    pub async fn proxy_call(
        &self,
        username: &str,
        target: Address,
        data: impl Into<Bytes>,
    ) -> Result<Bytes, AuthznError> {
        let outer = wrap_staticcall(target, data);
        let result = async {
            let returned = self.account_call(username, outer).await?;
            unwrap_staticcall_result(&returned)
        }
        .await;
        if result.is_ok() {
            self.publish(Status::Completed);
        }
        self.report(result)
    }

    /// Have `username`'s account sign `digest`.
    #[tracing::instrument(skip_all)]
    pub async fn sign_message(
        &self,
        username: &str,
        digest: B256,
    ) -> Result<SignatureRSV, AuthznError> {
        let call = InnerCall::Sign { digest };
        let result = async {
            let returned = self.account_call(username, call.encode()).await?;
            Ok::<_, AuthznError>(decode_signature(&returned)?)
        }
        .await;
        if result.is_ok() {
            self.publish(Status::Completed);
        }
        self.report(result)
    }
}
