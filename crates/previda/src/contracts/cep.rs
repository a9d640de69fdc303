use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

/// Street recorded when the lookup succeeds but omits the street field.
pub const STREET_PLACEHOLDER: &str = "street not provided";

/// Address data extracted from a successful postal-code lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAddress {
    pub street: String,
}

/// Failure modes of the external lookup. `NotFound` means the service
/// answered and rejected the code; `Transport` means it never answered.
#[derive(Debug, thiserror::Error)]
pub enum AddressLookupError {
    #[error("postal code not recognized by the address service")]
    NotFound { details: Value },
    #[error("address service unreachable: {details}")]
    Transport { details: String },
}

impl From<reqwest::Error> for AddressLookupError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport {
            details: err.to_string(),
        }
    }
}

/// Seam over the external lookup so intake can be exercised without the
/// network.
#[async_trait]
pub trait AddressResolver: Send + Sync {
    async fn resolve(&self, postal_code: &str) -> Result<ResolvedAddress, AddressLookupError>;
}

/// Client for the BrasilAPI CEP v1 endpoint. No retries and no caching;
/// every intake performs exactly one lookup.
#[derive(Debug, Clone)]
pub struct BrasilApiResolver {
    client: reqwest::Client,
    base_url: String,
}

impl BrasilApiResolver {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    fn endpoint(&self, postal_code: &str) -> String {
        format!(
            "{}/api/cep/v1/{postal_code}",
            self.base_url.trim_end_matches('/')
        )
    }
}

#[derive(Debug, Deserialize)]
struct CepPayload {
    street: Option<String>,
}

#[async_trait]
impl AddressResolver for BrasilApiResolver {
    async fn resolve(&self, postal_code: &str) -> Result<ResolvedAddress, AddressLookupError> {
        let response = self.client.get(self.endpoint(postal_code)).send().await?;

        if !response.status().is_success() {
            let details = response.json::<Value>().await.unwrap_or(Value::Null);
            return Err(AddressLookupError::NotFound { details });
        }

        let payload: CepPayload = response.json().await?;
        let street = payload
            .street
            .unwrap_or_else(|| STREET_PLACEHOLDER.to_string());
        debug!(%postal_code, %street, "postal code resolved");
        Ok(ResolvedAddress { street })
    }
}
