#![warn(missing_docs)]

//! Client side of the authzn account protocol.
//!
//! A user controls an account held by an account manager contract with a
//! WebAuthn credential instead of a private key. This crate holds everything
//! that has to agree bit-for-bit with the contract:
//!
//! - [`UsernameHasher`]: the salted PBKDF2 account identifier
//! - [`personalize`]: the challenge an assertion signs, bound to chain,
//!   contract, salt and calldata
//! - [`proxy`]: the `sign` / `staticcall` calldata run through the account
//! - [`GaslessRegistrar`]: registration transactions signed by the contract's
//!   sponsor key
//!
//! [`AuthznClient`] ties these to a [`authzn_credentials::CredentialBroker`]
//! and publishes progress as [`Status`] snapshots. The contract and the node
//! are reached through the [`AccountContract`] and [`TransactionRelay`]
//! traits; `authzn-rpc` implements both over JSON-RPC, and the `helpers`
//! feature provides an in-memory [`MemoryLedger`].

#[allow(missing_docs)]
pub mod abi;

mod challenge;
pub use challenge::*;

mod client;
pub use client::*;

mod config;
pub use config::*;

mod contract;
pub use contract::*;

mod error;
pub use error::*;

pub mod proxy;

mod registration;
pub use registration::*;

mod status;
pub use status::*;

mod totp;
pub use totp::*;

mod username;
pub use username::*;

#[cfg(any(test, feature = "helpers"))]
mod helpers;
#[cfg(any(test, feature = "helpers"))]
pub use helpers::*;
