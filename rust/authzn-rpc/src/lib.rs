#![warn(missing_docs)]

//! JSON-RPC 2.0 transport for the authzn account protocol.
//!
//! [`JsonRpcClient`] implements both [`authzn_protocol::AccountContract`] and
//! [`authzn_protocol::TransactionRelay`] against a single node. Calls go out
//! as plain `eth_call`; wrapping them in a confidential envelope is left to
//! the node or a gateway in front of it.

mod client;
pub use client::*;

mod config;
pub use config::*;

mod error;
pub use error::*;

mod message;
