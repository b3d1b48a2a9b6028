use crate::message::{CallRequest, ReceiptObject, Request, Response};
use crate::{AuthMethod, JsonRpcConfig, JsonRpcError};
use alloy_primitives::{Address, B256, Bytes, U64, U256};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use authzn_protocol::abi::{AccountManager, AuthenticatorResponse, RegisterArgs};
use authzn_protocol::{
    AccountContract, AuthznConfig, ContractError, DecodeError, RelayError, TransactionReceipt,
    TransactionRelay,
};
use reqwest::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use url::Url;

const NO_PARAMS: [(); 0] = [];

/// JSON-RPC client for an account manager deployment.
///
/// Implements [`AccountContract`] with `eth_call` against the account manager
/// at `account_manager`, and [`TransactionRelay`] with the plain `eth_*`
/// transaction methods of the same node.
///
/// ```no_run
/// use authzn_rpc::{AuthMethod, JsonRpcClient, JsonRpcConfig};
/// use authzn_protocol::AccountContract;
/// use alloy_primitives::address;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = JsonRpcConfig::new("https://testnet.sapphire.oasis.io")
///     .with_auth(AuthMethod::Bearer("my-token".to_string()))
///     .with_timeout(10);
/// let client = JsonRpcClient::new(
///     config,
///     address!("0x1111111111111111111111111111111111111111"),
/// )?;
///
/// let salt = client.salt().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct JsonRpcClient {
    config: JsonRpcConfig,
    endpoint: Url,
    account_manager: Address,
    client: Client,
    next_id: Arc<AtomicU64>,
}

impl JsonRpcClient {
    /// Create a client for the account manager at `account_manager`.
    pub fn new(config: JsonRpcConfig, account_manager: Address) -> Result<Self, JsonRpcError> {
        let endpoint = config
            .endpoint_url()
            .map_err(|e| JsonRpcError::InvalidEndpoint {
                endpoint: config.endpoint.clone(),
                reason: e.to_string(),
            })?;

        #[cfg(not(target_arch = "wasm32"))]
        let client = {
            let mut client_builder = Client::builder();
            if let Some(timeout) = config.timeout_seconds {
                client_builder = client_builder.timeout(std::time::Duration::from_secs(timeout));
            }
            client_builder.build().unwrap_or_else(|_| Client::new())
        };
        #[cfg(target_arch = "wasm32")]
        let client = Client::new();

        Ok(Self {
            config,
            endpoint,
            account_manager,
            client,
            next_id: Arc::new(AtomicU64::new(1)),
        })
    }

    /// Create a client from the endpoint and contract address in `config`.
    pub fn from_config(config: &AuthznConfig) -> Result<Self, JsonRpcError> {
        Self::new(JsonRpcConfig::from(config), config.account_manager)
    }

    /// The configuration this client was built with.
    pub fn config(&self) -> &JsonRpcConfig {
        &self.config
    }

    /// Build a request with authentication and custom headers
    fn build_request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let mut builder = builder;

        match &self.config.auth_method {
            AuthMethod::None => {}
            AuthMethod::Bearer(token) => {
                builder = builder.bearer_auth(token);
            }
        }

        for (key, value) in &self.config.headers {
            builder = builder.header(key, value);
        }

        builder
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Response, JsonRpcError> {
        let response = request
            .send()
            .await
            .map_err(|e| JsonRpcError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(JsonRpcError::Status {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
            });
        }

        response
            .json::<Response>()
            .await
            .map_err(|e| JsonRpcError::Transport(e.to_string()))
    }

    /// Invoke `method` with `params` and deserialize its result.
    pub async fn request<P, T>(&self, method: &'static str, params: P) -> Result<T, JsonRpcError>
    where
        P: Serialize + Send + Sync,
        T: DeserializeOwned,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(id, method, "JSON-RPC request");

        let request = self.build_request(
            self.client
                .post(self.endpoint.clone())
                .json(&Request::new(id, method, params)),
        );

        #[cfg(not(target_arch = "wasm32"))]
        let response = self.send(request).await?;
        #[cfg(target_arch = "wasm32")]
        let response = match self.config.timeout_seconds {
            Some(seconds) => {
                let deadline = authzn_common::time::Duration::from_secs(seconds);
                authzn_common::time::timeout(deadline, self.send(request))
                    .await
                    .map_err(|_| JsonRpcError::TimedOut(deadline))??
            }
            None => self.send(request).await?,
        };

        let value = response.into_result()?;
        serde_json::from_value(value).map_err(|e| JsonRpcError::Malformed {
            method,
            reason: e.to_string(),
        })
    }

    async fn call<C>(&self, call: C) -> Result<C::Return, ContractError>
    where
        C: SolCall + Send + Sync,
    {
        let request = CallRequest {
            to: self.account_manager,
            data: call.abi_encode().into(),
        };
        let output: Bytes = self.request("eth_call", (request, "latest")).await?;
        C::abi_decode_returns(&output).map_err(|e| DecodeError::new(C::SIGNATURE, e).into())
    }
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
impl AccountContract for JsonRpcClient {
    fn address(&self) -> Address {
        self.account_manager
    }

    async fn salt(&self) -> Result<B256, ContractError> {
        self.call(AccountManager::saltCall {}).await
    }

    async fn user_exists(&self, hashed_username: B256) -> Result<bool, ContractError> {
        self.call(AccountManager::userExistsCall {
            in_usernameHash: hashed_username,
        })
        .await
    }

    async fn credential_ids_by_username(
        &self,
        hashed_username: B256,
    ) -> Result<Vec<B256>, ContractError> {
        self.call(AccountManager::credentialIdsByUsernameCall {
            in_usernameHash: hashed_username,
        })
        .await
    }

    async fn gaspaying_address(&self) -> Result<Address, ContractError> {
        self.call(AccountManager::gaspayingAddressCall {}).await
    }

    async fn gasless_register(
        &self,
        args: RegisterArgs,
        nonce: u64,
        gas_price: U256,
    ) -> Result<Bytes, ContractError> {
        self.call(AccountManager::gasless_registerECES256P256Call {
            args,
            nonce,
            gasPrice: gas_price,
        })
        .await
    }

    async fn proxy_view(
        &self,
        credential_id_hashed: B256,
        response: AuthenticatorResponse,
        data: Bytes,
    ) -> Result<Bytes, ContractError> {
        self.call(AccountManager::proxyViewECES256P256Call {
            in_credentialIdHashed: credential_id_hashed,
            in_resp: response,
            in_data: data,
        })
        .await
    }
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
impl TransactionRelay for JsonRpcClient {
    async fn chain_id(&self) -> Result<u64, RelayError> {
        let chain_id: U64 = self.request("eth_chainId", NO_PARAMS).await?;
        Ok(chain_id.to::<u64>())
    }

    async fn gas_price(&self) -> Result<U256, RelayError> {
        Ok(self.request("eth_gasPrice", NO_PARAMS).await?)
    }

    async fn transaction_count(&self, address: Address) -> Result<u64, RelayError> {
        let count: U64 = self
            .request("eth_getTransactionCount", (address, "pending"))
            .await?;
        Ok(count.to::<u64>())
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> Result<B256, RelayError> {
        let hash: B256 = self.request("eth_sendRawTransaction", [raw]).await?;
        tracing::debug!(%hash, "transaction accepted by node");
        Ok(hash)
    }

    async fn transaction_receipt(
        &self,
        transaction_hash: B256,
    ) -> Result<Option<TransactionReceipt>, RelayError> {
        let receipt: Option<ReceiptObject> = self
            .request("eth_getTransactionReceipt", [transaction_hash])
            .await?;
        let Some(receipt) = receipt else {
            return Ok(None);
        };
        if receipt.reverted() {
            tracing::warn!(%transaction_hash, "transaction was included but reverted");
        }
        Ok(receipt.into_receipt())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_refuses_an_invalid_endpoint() {
        let result = JsonRpcClient::new(JsonRpcConfig::new("::"), Address::ZERO);
        assert!(matches!(
            result,
            Err(JsonRpcError::InvalidEndpoint { .. })
        ));
    }

    #[test]
    fn it_reports_the_account_manager_address() -> testresult::TestResult {
        let account_manager = Address::repeat_byte(0x11);
        let config = AuthznConfig::new("http://localhost:8545", account_manager, 0x5afd);
        let client = JsonRpcClient::from_config(&config)?;

        assert_eq!(client.address(), account_manager);
        assert_eq!(client.config().endpoint, "http://localhost:8545");
        Ok(())
    }
}
