//! Reads from the TOTP example contract through a user's account.

use crate::abi::TOTPExample;
use crate::{
    AccountContract, AuthznClient, AuthznError, DecodeError, KeyDerivation, TransactionRelay,
};
use alloy_primitives::{Address, B256};
use alloy_sol_types::SolCall;
use authzn_credentials::Authenticator;

/// Derives a user's TOTP secret and current code. Each read is one proxied
/// call, so each prompts for an assertion.
pub struct TotpReader<'a, C, R, A, K> {
    client: &'a AuthznClient<C, R, A, K>,
    contract: Address,
}

impl<'a, C, R, A, K> TotpReader<'a, C, R, A, K>
where
    C: AccountContract,
    R: TransactionRelay,
    A: Authenticator,
    K: KeyDerivation,
{
    /// Read the TOTP contract at `contract` through `client`.
    pub fn new(client: &'a AuthznClient<C, R, A, K>, contract: Address) -> Self {
        Self { client, contract }
    }

    /// The secret the contract derives for `username`'s account.
    pub async fn secret(&self, username: &str) -> Result<B256, AuthznError> {
        let returned = self
            .client
            .proxy_call(username, self.contract, TOTPExample::deriveSecretCall {}.abi_encode())
            .await?;
        Ok(TOTPExample::deriveSecretCall::abi_decode_returns(&returned)
            .map_err(|e| DecodeError::new("deriveSecret result", e))?)
    }

    /// The current code for `username`'s account.
    pub async fn code(&self, username: &str) -> Result<u32, AuthznError> {
        let returned = self
            .client
            .proxy_call(username, self.contract, TOTPExample::generateCall {}.abi_encode())
            .await?;
        Ok(TOTPExample::generateCall::abi_decode_returns(&returned)
            .map_err(|e| DecodeError::new("generate result", e))?)
    }
}

impl<C, R, A, K> AuthznClient<C, R, A, K>
where
    C: AccountContract,
    R: TransactionRelay,
    A: Authenticator,
    K: KeyDerivation,
{
    /// A reader for the configured TOTP contract, if there is one.
    pub fn totp(&self) -> Option<TotpReader<'_, C, R, A, K>> {
        self.config()
            .totp_contract
            .map(|contract| TotpReader::new(self, contract))
    }
}
