//! Contract intake and delinquency reporting for funeral-assistance plans.
//!
//! A contract request carries the holder, their postal code, and one or more
//! installments. Intake resolves the holder's street through the external CEP
//! service and persists the whole aggregate in a single transaction; the
//! status report classifies every contract as active or inactive from its
//! overdue installments.

pub mod cep;
pub mod domain;
pub mod router;
pub mod service;
pub mod store;

pub use cep::{
    AddressLookupError, AddressResolver, BrasilApiResolver, ResolvedAddress, STREET_PLACEHOLDER,
};
pub use domain::{
    Contract, ContractDetail, ContractRequest, ContractStatus, Holder, Installment,
    InstallmentSpec, ValidationError,
};
pub use router::contract_router;
pub use service::{ContractService, ContractServiceError};
pub use store::{
    ContractRepository, ContractStatusRow, NewContract, RepositoryError, SqliteContractStore,
};
