use authzn_protocol::AuthznConfig;
use url::Url;

/// Authentication for the JSON-RPC endpoint
#[derive(Debug, Clone, Default)]
pub enum AuthMethod {
    /// No authentication
    #[default]
    None,
    /// Bearer token, for hosted node providers
    Bearer(String),
}

/// Configuration for a [`crate::JsonRpcClient`]
#[derive(Debug, Clone)]
pub struct JsonRpcConfig {
    /// JSON-RPC endpoint URL
    pub endpoint: String,

    /// Authentication method
    pub auth_method: AuthMethod,

    /// Request timeout in seconds (default: 30)
    pub timeout_seconds: Option<u64>,

    /// Additional headers sent with every request
    pub headers: Vec<(String, String)>,
}

impl Default for JsonRpcConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8545".to_string(),
            auth_method: AuthMethod::None,
            timeout_seconds: Some(30),
            headers: Vec::new(),
        }
    }
}

impl JsonRpcConfig {
    /// Create a new configuration for `endpoint`
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    /// Set the authentication method
    pub fn with_auth(mut self, auth_method: AuthMethod) -> Self {
        self.auth_method = auth_method;
        self
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = Some(seconds);
        self
    }

    /// Add a header sent with every request
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    /// The endpoint as a parsed URL.
    pub fn endpoint_url(&self) -> Result<Url, url::ParseError> {
        Url::parse(&self.endpoint)
    }
}

impl From<&AuthznConfig> for JsonRpcConfig {
    fn from(config: &AuthznConfig) -> Self {
        Self::new(config.jsonrpc.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_builds_a_config() {
        let config = JsonRpcConfig::new("https://testnet.sapphire.oasis.io")
            .with_auth(AuthMethod::Bearer("token123".to_string()))
            .with_timeout(5)
            .with_header("X-Custom", "value");

        assert_eq!(config.endpoint, "https://testnet.sapphire.oasis.io");
        assert!(matches!(config.auth_method, AuthMethod::Bearer(_)));
        assert_eq!(config.timeout_seconds, Some(5));
        assert_eq!(config.headers.len(), 1);
    }

    #[test]
    fn it_takes_the_endpoint_from_the_client_config() {
        let config = AuthznConfig::default();
        let rpc = JsonRpcConfig::from(&config);

        assert_eq!(rpc.endpoint, config.jsonrpc);
        assert_eq!(rpc.timeout_seconds, Some(30));
    }

    #[test]
    fn it_rejects_an_unparseable_endpoint() {
        assert!(JsonRpcConfig::new("not a url").endpoint_url().is_err());
        assert!(JsonRpcConfig::default().endpoint_url().is_ok());
    }
}
