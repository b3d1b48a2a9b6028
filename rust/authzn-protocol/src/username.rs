//! Username validation and hashing.
//!
//! The on-chain account identifier is `PBKDF2-HMAC-SHA256(lowercase(username),
//! salt, 100_000, 32)`. The derivation is deliberately slow, so every hash is
//! memoized for the lifetime of the hasher and concurrent requests for the
//! same username share one computation.

use crate::{AccountContract, AuthznError, ContractError, UsernameError};
use alloy_primitives::B256;
use authzn_common::{ConditionalSync, spawn_blocking, time::Instant};
use nom::{
    IResult,
    bytes::complete::take_while1,
    character::complete::char,
    combinator::{all_consuming, opt},
    sequence::{pair, preceded},
};
use parking_lot::Mutex;
use sha2::Sha256;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::OnceCell;

/// Iteration count the account manager's identifiers are derived with.
pub const PBKDF2_ROUNDS: u32 = 100_000;

fn is_local_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')
}

fn is_domain_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '-')
}

/// `local` or `local@domain`.
fn username(input: &str) -> IResult<&str, (&str, Option<&str>)> {
    all_consuming(pair(
        take_while1(is_local_char),
        opt(preceded(char('@'), take_while1(is_domain_char))),
    ))(input)
}

/// Check `input` against the username grammar and fold it to lowercase.
pub fn validate_username(input: &str) -> Result<String, UsernameError> {
    if input.is_empty() {
        return Err(UsernameError::Empty);
    }
    username(input).map_err(|_| UsernameError::InvalidCharacters(input.to_owned()))?;
    Ok(input.to_ascii_lowercase())
}

/// Outcome of checking a username against the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsernameStatus {
    /// The username can be used for the requested operation.
    Available,
    /// No username was given.
    Required,
    /// The username does not match the grammar.
    InvalidCharacters,
    /// Registering, but the username is taken.
    AlreadyExists,
    /// Signing in, but nobody is registered under the username.
    DoesNotExist,
}

impl UsernameStatus {
    /// The user-facing explanation.
    pub fn reason(&self) -> &'static str {
        match self {
            UsernameStatus::Available => "Available",
            UsernameStatus::Required => "Required!",
            UsernameStatus::InvalidCharacters => "Bad Chars!",
            UsernameStatus::AlreadyExists => "Already Exists!",
            UsernameStatus::DoesNotExist => "Doesn't Exist!",
        }
    }
}

/// Result of [`UsernameHasher::check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsernameCheck {
    /// Whether the requested operation may proceed.
    pub available: bool,
    /// The user-facing explanation.
    pub reason: &'static str,
    /// The precise outcome.
    pub status: UsernameStatus,
}

impl From<UsernameStatus> for UsernameCheck {
    fn from(status: UsernameStatus) -> Self {
        Self {
            available: status == UsernameStatus::Available,
            reason: status.reason(),
            status,
        }
    }
}

/// Turns a normalized username and the contract salt into an identifier.
///
/// Implementations are CPU-bound and are run off the executor.
pub trait KeyDerivation: ConditionalSync + 'static {
    /// Derive the identifier for `username`.
    fn derive(&self, username: &str, salt: &B256) -> B256;
}

impl<T> KeyDerivation for Arc<T>
where
    T: KeyDerivation + ?Sized,
{
    fn derive(&self, username: &str, salt: &B256) -> B256 {
        (**self).derive(username, salt)
    }
}

/// PBKDF2-HMAC-SHA256 with a 32-byte output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pbkdf2Sha256 {
    rounds: u32,
}

impl Pbkdf2Sha256 {
    /// Derive with `rounds` iterations.
    pub fn new(rounds: u32) -> Self {
        Self { rounds }
    }

    /// The iteration count.
    pub fn rounds(&self) -> u32 {
        self.rounds
    }
}

impl Default for Pbkdf2Sha256 {
    fn default() -> Self {
        Self::new(PBKDF2_ROUNDS)
    }
}

impl KeyDerivation for Pbkdf2Sha256 {
    fn derive(&self, username: &str, salt: &B256) -> B256 {
        let mut out = B256::ZERO;
        pbkdf2::pbkdf2_hmac::<Sha256>(
            username.as_bytes(),
            salt.as_slice(),
            self.rounds,
            out.as_mut_slice(),
        );
        out
    }
}

/// Salted, memoized username hashing against one account manager.
pub struct UsernameHasher<C, K = Pbkdf2Sha256> {
    contract: C,
    derivation: Arc<K>,
    salt: OnceCell<B256>,
    hashes: Mutex<HashMap<String, Arc<OnceCell<B256>>>>,
}

impl<C> UsernameHasher<C, Pbkdf2Sha256>
where
    C: AccountContract,
{
    /// Hash with PBKDF2-HMAC-SHA256 at the standard iteration count.
    pub fn new(contract: C) -> Self {
        Self::with_derivation(contract, Pbkdf2Sha256::default())
    }
}

impl<C, K> UsernameHasher<C, K> {
    /// The key derivation usernames are hashed with.
    pub fn derivation(&self) -> &K {
        &self.derivation
    }
}

impl<C, K> UsernameHasher<C, K>
where
    C: AccountContract,
    K: KeyDerivation,
{
    /// Hash with a custom derivation.
    pub fn with_derivation(contract: C, derivation: K) -> Self {
        Self {
            contract,
            derivation: Arc::new(derivation),
            salt: OnceCell::new(),
            hashes: Mutex::new(HashMap::new()),
        }
    }

    /// The account manager this hasher reads from.
    pub fn contract(&self) -> &C {
        &self.contract
    }

    /// The contract salt. Fetched on first use and never again; concurrent
    /// first callers share a single read.
    pub async fn salt(&self) -> Result<B256, ContractError> {
        self.salt
            .get_or_try_init(|| async {
                tracing::debug!(contract = %self.contract.address(), "fetching username salt");
                self.contract.salt().await
            })
            .await
            .copied()
    }

    /// The on-chain identifier for `username`.
    ///
    /// The username is validated and lowercased first. Each distinct
    /// username is derived at most once; concurrent callers await the
    /// in-flight derivation.
    pub async fn hash(&self, username: &str) -> Result<B256, AuthznError> {
        let username = validate_username(username)?;

        let cell = {
            let mut hashes = self.hashes.lock();
            hashes.entry(username.clone()).or_default().clone()
        };

        let hash = cell
            .get_or_try_init(|| async {
                let salt = self.salt().await?;
                let derivation = self.derivation.clone();
                let started = Instant::now();
                let name = username.clone();
                let hash = spawn_blocking(move || derivation.derive(&name, &salt)).await?;
                tracing::debug!(
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "derived username hash"
                );
                Ok::<_, AuthznError>(hash)
            })
            .await?;

        Ok(*hash)
    }

    /// Whether an account is registered under `username`.
    pub async fn exists(&self, username: &str) -> Result<bool, AuthznError> {
        let hashed = self.hash(username).await?;
        Ok(self.contract.user_exists(hashed).await?)
    }

    /// Check whether `username` may be used. Registering needs a free
    /// username (`must_exist == false`); signing in needs a taken one.
    ///
    /// Malformed usernames are reported in the result. Only failures to reach
    /// the contract are errors.
    pub async fn check(
        &self,
        username: &str,
        must_exist: bool,
    ) -> Result<UsernameCheck, AuthznError> {
        let status = match self.exists(username).await {
            Ok(true) if !must_exist => UsernameStatus::AlreadyExists,
            Ok(false) if must_exist => UsernameStatus::DoesNotExist,
            Ok(_) => UsernameStatus::Available,
            Err(AuthznError::Validation(UsernameError::Empty)) => UsernameStatus::Required,
            Err(AuthznError::Validation(UsernameError::InvalidCharacters(_))) => {
                UsernameStatus::InvalidCharacters
            }
            Err(other) => return Err(other),
        };
        Ok(status.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::b256;

    fn salt() -> B256 {
        b256!("0000000000000000000000000000000000000000000000000000000000000001")
    }

    #[test]
    fn it_accepts_plain_and_qualified_usernames() -> testresult::TestResult {
        assert_eq!(validate_username("alice")?, "alice");
        assert_eq!(validate_username("Alice.B-C_d")?, "alice.b-c_d");
        assert_eq!(validate_username("bob@Example.org")?, "bob@example.org");
        Ok(())
    }

    #[test]
    fn it_rejects_empty_usernames() {
        assert_eq!(validate_username(""), Err(UsernameError::Empty));
    }

    #[test]
    fn it_rejects_characters_outside_the_grammar() {
        for input in ["al ice", "alice!", "a@b@c", "@host", "alice@", "alice@ho_st", "ålice"] {
            assert!(
                matches!(
                    validate_username(input),
                    Err(UsernameError::InvalidCharacters(_))
                ),
                "{input:?} should be rejected"
            );
        }
    }

    #[test]
    fn it_matches_the_pbkdf2_reference_vector() {
        let hash = Pbkdf2Sha256::default().derive("alice", &salt());
        assert_eq!(
            hash,
            b256!("da7d8f550fb5e5b29ac4006c7b953e46b306fe515e1329579b8a3e341956fb68")
        );
    }

    #[test]
    fn it_honours_the_iteration_count() {
        let hash = Pbkdf2Sha256::new(1).derive("alice", &salt());
        assert_eq!(
            hash,
            b256!("a038808a9b200d4451454cbf1acd07a5642c785c3f5979a11cf5ce12ac72b592")
        );
    }
}
