use std::sync::Arc;

use chrono::{Local, NaiveDate};
use serde_json::Value;
use tracing::{info, warn};

use super::cep::{AddressLookupError, AddressResolver};
use super::domain::{ContractDetail, ContractRequest, ValidationError};
use super::store::{ContractRepository, ContractStatusRow, NewContract, RepositoryError};

/// Service composing request validation, the external address lookup, and
/// the transactional store.
pub struct ContractService<R, A> {
    repository: Arc<R>,
    resolver: Arc<A>,
}

impl<R, A> ContractService<R, A>
where
    R: ContractRepository + 'static,
    A: AddressResolver + 'static,
{
    pub fn new(repository: Arc<R>, resolver: Arc<A>) -> Self {
        Self {
            repository,
            resolver,
        }
    }

    /// Create a holder, contract, and its installments from one request.
    ///
    /// Validation failures return before the lookup; lookup failures return
    /// before any write. The store performs the cascade inside a single
    /// transaction, so no partial rows survive a persistence error.
    pub async fn create(&self, request: ContractRequest) -> Result<i64, ContractServiceError> {
        request.validate()?;

        let normalized = request.normalized_postal_code();
        let address = self
            .resolver
            .resolve(&normalized)
            .await
            .map_err(|err| match err {
                AddressLookupError::NotFound { details } => {
                    warn!(postal_code = %normalized, "postal code rejected by address service");
                    ContractServiceError::AddressResolution { details }
                }
                AddressLookupError::Transport { details } => {
                    ContractServiceError::ExternalService { details }
                }
            })?;

        let contract_id = self
            .repository
            .create_contract(NewContract {
                holder_name: request.holder_name,
                postal_code: request.postal_code,
                street: address.street,
                contract_date: Local::now().date_naive(),
                installments: request.installments,
            })
            .map_err(map_repository)?;

        info!(contract_id, "contract, holder, and installments persisted");
        Ok(contract_id)
    }

    /// Read a persisted contract aggregate back.
    pub fn get(&self, contract_id: i64) -> Result<ContractDetail, ContractServiceError> {
        self.repository
            .fetch_contract(contract_id)
            .map_err(map_repository)
    }

    /// Classify every contract against `today` (defaults to the current
    /// date), ordered by contract id.
    pub fn status_report(
        &self,
        today: Option<NaiveDate>,
    ) -> Result<Vec<ContractStatusRow>, ContractServiceError> {
        let today = today.unwrap_or_else(|| Local::now().date_naive());
        self.repository.status_report(today).map_err(map_repository)
    }
}

fn map_repository(err: RepositoryError) -> ContractServiceError {
    match err {
        // A poisoned store lock is not a database failure; it lands in the
        // catch-all bucket.
        RepositoryError::Unavailable(details) => ContractServiceError::Unexpected(details),
        other => ContractServiceError::Persistence(other),
    }
}

/// Error taxonomy surfaced at the request boundary. Every kind maps to a
/// distinct user-visible status and none leaves partial state behind.
#[derive(Debug, thiserror::Error)]
pub enum ContractServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("postal code rejected by the address service")]
    AddressResolution { details: Value },
    #[error("address service unreachable: {details}")]
    ExternalService { details: String },
    #[error("database error: {0}")]
    Persistence(#[source] RepositoryError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}
