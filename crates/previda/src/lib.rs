//! Funeral-assistance contract management: intake of holders, contracts, and
//! billable installments, plus the derived delinquency status report.

pub mod config;
pub mod contracts;
pub mod error;
pub mod telemetry;
