use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Upper bound accepted for a holder name, matching the column width.
pub const MAX_HOLDER_NAME_LEN: usize = 255;

/// A person associated with a funeral-assistance contract. Created once per
/// contract; this system never reuses holder rows across contracts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Holder {
    pub id: i64,
    pub name: String,
    pub postal_code: String,
    pub street: String,
}

/// An agreement tied to exactly one holder.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Contract {
    pub id: i64,
    pub holder_id: i64,
    pub contract_date: NaiveDate,
    pub total_paid: f64,
}

/// A billable amount due on a specific date under a contract. Payment fields
/// are never populated by this system and stay null at creation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Installment {
    pub id: i64,
    pub contract_id: i64,
    pub amount: f64,
    pub due_date: NaiveDate,
    pub payment_date: Option<NaiveDate>,
    pub amount_paid: Option<f64>,
}

/// Full read model for a persisted contract aggregate.
#[derive(Debug, Clone, Serialize)]
pub struct ContractDetail {
    pub contract: Contract,
    pub holder: Holder,
    pub installments: Vec<Installment>,
}

/// One requested installment inside a contract-creation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallmentSpec {
    pub amount: f64,
    pub due_date: NaiveDate,
}

/// Inbound contract-creation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractRequest {
    pub holder_name: String,
    pub postal_code: String,
    pub installments: Vec<InstallmentSpec>,
}

impl ContractRequest {
    /// Checks the request constraints before any external call or write
    /// happens. The first violation found is reported.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let name_len = self.holder_name.chars().count();
        if name_len == 0 || name_len > MAX_HOLDER_NAME_LEN {
            return Err(ValidationError::HolderName { length: name_len });
        }

        let code_len = self.postal_code.chars().count();
        if !(8..=9).contains(&code_len) {
            return Err(ValidationError::PostalCode { length: code_len });
        }

        if self.installments.is_empty() {
            return Err(ValidationError::NoInstallments);
        }

        if let Some((index, spec)) = self
            .installments
            .iter()
            .enumerate()
            .find(|(_, spec)| spec.amount <= 0.0)
        {
            return Err(ValidationError::NonPositiveAmount {
                index,
                amount: spec.amount,
            });
        }

        Ok(())
    }

    /// Postal code with hyphens stripped, as the lookup service expects.
    pub fn normalized_postal_code(&self) -> String {
        self.postal_code.chars().filter(|c| *c != '-').collect()
    }
}

/// Activity classification derived from a contract's overdue installments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ContractStatus {
    Active,
    Inactive,
}

impl ContractStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ContractStatus::Active => "ACTIVE",
            ContractStatus::Inactive => "INACTIVE",
        }
    }
}

/// Request shape violation caught before intake performs any side effect.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("holder name must be between 1 and {MAX_HOLDER_NAME_LEN} characters (got {length})")]
    HolderName { length: usize },
    #[error("postal code must be 8 or 9 characters (got {length})")]
    PostalCode { length: usize },
    #[error("a contract requires at least one installment")]
    NoInstallments,
    #[error("installment {index} must have an amount greater than zero (got {amount})")]
    NonPositiveAmount { index: usize, amount: f64 },
}
