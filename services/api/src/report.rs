use chrono::{Local, NaiveDate};
use clap::Args;
use previda::config::AppConfig;
use previda::contracts::{ContractRepository, SqliteContractStore};
use previda::error::AppError;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub(crate) struct StatusArgs {
    /// Evaluation date for overdue classification (YYYY-MM-DD, defaults to today)
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) today: Option<NaiveDate>,
    /// Override the configured SQLite database path
    #[arg(long)]
    pub(crate) database: Option<PathBuf>,
}

pub(crate) fn run_status_report(args: StatusArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let path = args.database.unwrap_or(config.database.path);
    let store = SqliteContractStore::open(&path)?;

    let today = args.today.unwrap_or_else(|| Local::now().date_naive());
    let rows = store.status_report(today)?;

    if rows.is_empty() {
        println!("no contracts recorded");
        return Ok(());
    }

    println!(
        "{:>10}  {:<32} {:<8} {:>14}",
        "contract", "holder", "status", "overdue"
    );
    for row in rows {
        println!(
            "{:>10}  {:<32} {:<8} {:>14.2}",
            row.contract_id,
            row.holder_name,
            row.status.label(),
            row.overdue_amount
        );
    }

    Ok(())
}
