//! Client configuration.

use crate::ConfigError;
use crate::username::PBKDF2_ROUNDS;
use alloy_primitives::Address;
use authzn_common::time::Duration;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Everything an [`crate::AuthznClient`] needs to know about its deployment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthznConfig {
    /// JSON-RPC endpoint of the chain.
    pub jsonrpc: String,

    /// Address of the account manager contract.
    pub account_manager: Address,

    /// Chain id personalized challenges are bound to.
    pub chain_id: u64,

    /// Address of the TOTP example contract, if deployed.
    pub totp_contract: Option<Address>,

    /// Relying party id credentials are scoped to (the origin's host).
    pub rp_id: String,

    /// Relying party name shown by the platform.
    pub rp_name: String,

    /// Deadline for a WebAuthn ceremony in seconds (default: 60)
    pub ceremony_timeout_seconds: u64,

    /// Deadline for a registration to be included in seconds (default: 60)
    pub inclusion_timeout_seconds: u64,

    /// Receipt poll interval in milliseconds (default: 500)
    pub poll_interval_millis: u64,

    /// PBKDF2 iterations for username hashing (default: 100 000)
    pub pbkdf2_rounds: u32,
}

impl Default for AuthznConfig {
    fn default() -> Self {
        Self {
            jsonrpc: "http://localhost:8545".to_string(),
            account_manager: Address::ZERO,
            chain_id: 0x5afd,
            totp_contract: None,
            rp_id: "localhost".to_string(),
            rp_name: "Sapphire-Auth[ZN]".to_string(),
            ceremony_timeout_seconds: 60,
            inclusion_timeout_seconds: 60,
            poll_interval_millis: 500,
            pbkdf2_rounds: PBKDF2_ROUNDS,
        }
    }
}

impl AuthznConfig {
    /// Create a configuration for the account manager at `account_manager`
    /// on `chain_id`, reachable at `jsonrpc`.
    pub fn new(jsonrpc: impl Into<String>, account_manager: Address, chain_id: u64) -> Self {
        Self {
            jsonrpc: jsonrpc.into(),
            account_manager,
            chain_id,
            ..Default::default()
        }
    }

    /// Read the configuration from the process environment.
    ///
    /// `AUTHZN_JSONRPC` and `AUTHZN_WEBAUTH_ADDR` are required;
    /// `AUTHZN_CHAIN_ID` (hex), `AUTHZN_TOTP_ADDR`, `AUTHZN_RP_ID` and
    /// `AUTHZN_RP_NAME` are optional.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`AuthznConfig::from_env`], reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let jsonrpc = read("AUTHZN_JSONRPC").ok_or(ConfigError::Missing("AUTHZN_JSONRPC"))?;
        let account_manager = read("AUTHZN_WEBAUTH_ADDR")
            .ok_or(ConfigError::Missing("AUTHZN_WEBAUTH_ADDR"))
            .and_then(|value| parse_address("AUTHZN_WEBAUTH_ADDR", &value))?;

        let mut config = Self {
            jsonrpc,
            account_manager,
            ..Default::default()
        };

        if let Some(value) = read("AUTHZN_CHAIN_ID") {
            config.chain_id = parse_chain_id(&value)?;
        }
        if let Some(value) = read("AUTHZN_TOTP_ADDR") {
            config.totp_contract = Some(parse_address("AUTHZN_TOTP_ADDR", &value)?);
        }
        if let Some(value) = read("AUTHZN_RP_ID") {
            config.rp_id = value;
        }
        if let Some(value) = read("AUTHZN_RP_NAME") {
            config.rp_name = value;
        }

        Ok(config)
    }

    /// Set the TOTP example contract
    pub fn with_totp_contract(mut self, address: Address) -> Self {
        self.totp_contract = Some(address);
        self
    }

    /// Set the relying party
    pub fn with_relying_party(mut self, id: impl Into<String>, name: impl Into<String>) -> Self {
        self.rp_id = id.into();
        self.rp_name = name.into();
        self
    }

    /// Set the ceremony deadline
    pub fn with_ceremony_timeout(mut self, seconds: u64) -> Self {
        self.ceremony_timeout_seconds = seconds;
        self
    }

    /// Set the inclusion deadline
    pub fn with_inclusion_timeout(mut self, seconds: u64) -> Self {
        self.inclusion_timeout_seconds = seconds;
        self
    }

    /// Set the receipt poll interval
    pub fn with_poll_interval(mut self, millis: u64) -> Self {
        self.poll_interval_millis = millis;
        self
    }

    /// Set the PBKDF2 iteration count
    pub fn with_pbkdf2_rounds(mut self, rounds: u32) -> Self {
        self.pbkdf2_rounds = rounds;
        self
    }

    /// The ceremony deadline.
    pub fn ceremony_timeout(&self) -> Duration {
        Duration::from_secs(self.ceremony_timeout_seconds)
    }

    /// The inclusion deadline.
    pub fn inclusion_timeout(&self) -> Duration {
        Duration::from_secs(self.inclusion_timeout_seconds)
    }

    /// The receipt poll interval.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_millis)
    }
}

fn parse_address(name: &'static str, value: &str) -> Result<Address, ConfigError> {
    Address::from_str(value.trim()).map_err(|e| ConfigError::Invalid {
        name,
        message: e.to_string(),
    })
}

/// Chain ids are always hex, with or without a `0x` prefix.
fn parse_chain_id(value: &str) -> Result<u64, ConfigError> {
    let value = value.trim();
    let hex = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);
    u64::from_str_radix(hex, 16).map_err(|e| ConfigError::Invalid {
        name: "AUTHZN_CHAIN_ID",
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;
    use std::collections::HashMap;
    use testresult::TestResult;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn it_reads_the_deployment_from_the_environment() -> TestResult {
        let config = AuthznConfig::from_lookup(lookup(&[
            ("AUTHZN_JSONRPC", "http://localhost:8545"),
            (
                "AUTHZN_WEBAUTH_ADDR",
                "0x5FbDB2315678afecb367f032d93F642f64180aa3",
            ),
            ("AUTHZN_CHAIN_ID", "0x5aff"),
            (
                "AUTHZN_TOTP_ADDR",
                "0xe7f1725E7734CE288F8367e1Bb143E90bb3F0512",
            ),
        ]))?;

        assert_eq!(config.jsonrpc, "http://localhost:8545");
        assert_eq!(
            config.account_manager,
            address!("5FbDB2315678afecb367f032d93F642f64180aa3")
        );
        assert_eq!(config.chain_id, 0x5aff);
        assert_eq!(
            config.totp_contract,
            Some(address!("e7f1725E7734CE288F8367e1Bb143E90bb3F0512"))
        );
        assert_eq!(config.pbkdf2_rounds, 100_000);
        Ok(())
    }

    #[test]
    fn it_requires_an_endpoint_and_a_contract() {
        assert_eq!(
            AuthznConfig::from_lookup(lookup(&[(
                "AUTHZN_WEBAUTH_ADDR",
                "0x5FbDB2315678afecb367f032d93F642f64180aa3"
            )])),
            Err(ConfigError::Missing("AUTHZN_JSONRPC"))
        );
        assert_eq!(
            AuthznConfig::from_lookup(lookup(&[("AUTHZN_JSONRPC", "http://localhost:8545")])),
            Err(ConfigError::Missing("AUTHZN_WEBAUTH_ADDR"))
        );
    }

    #[test]
    fn it_reads_chain_ids_as_hex_with_or_without_a_prefix() -> TestResult {
        assert_eq!(parse_chain_id("5aff")?, 0x5aff);
        assert_eq!(parse_chain_id("0x5aff")?, 0x5aff);
        assert_eq!(parse_chain_id(" 0X5AFD ")?, 0x5afd);
        assert_eq!(parse_chain_id("23295")?, 0x23295);
        assert!(parse_chain_id("sapphire").is_err());

        let config = AuthznConfig::from_lookup(lookup(&[
            ("AUTHZN_JSONRPC", "http://localhost:8545"),
            (
                "AUTHZN_WEBAUTH_ADDR",
                "0x5FbDB2315678afecb367f032d93F642f64180aa3",
            ),
            ("AUTHZN_CHAIN_ID", "5aff"),
        ]))?;
        assert_eq!(config.chain_id, 0x5aff);
        Ok(())
    }

    #[test]
    fn it_deserializes_partial_json_over_defaults() -> TestResult {
        let config: AuthznConfig = serde_json::from_str(
            r#"{"jsonrpc":"https://testnet.sapphire.oasis.io","chain_id":23295,"pbkdf2_rounds":1}"#,
        )?;
        assert_eq!(config.chain_id, 23295);
        assert_eq!(config.pbkdf2_rounds, 1);
        assert_eq!(config.rp_id, "localhost");
        assert_eq!(config.ceremony_timeout(), Duration::from_secs(60));
        Ok(())
    }
}
