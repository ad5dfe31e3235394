// 📂 Record Loader - CSV → typed records
// Header-driven: columns are matched by name, extra columns are ignored,
// empty cells become nulls.
//
// Raw rows are deserialized first and normalized second, so a bad date or an
// unknown in_out value is reported with its line number.

use crate::records::{
    BankTransaction, Direction, MonthlyFinancial, VendorRecord, VendorRoster, WindowInput,
};
use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::Deserialize;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("line {line}: {source}")]
    Malformed {
        line: usize,
        #[source]
        source: csv::Error,
    },

    #[error("line {line}: invalid {field} value {value:?}")]
    InvalidField {
        line: usize,
        field: &'static str,
        value: String,
    },

    #[error("line {line}: missing required {field}")]
    MissingField { line: usize, field: &'static str },
}

// ============================================================================
// RAW ROWS (as they appear in the CSV)
// ============================================================================

#[derive(Debug, Deserialize)]
struct RawBankRow {
    date: String,
    amount: Option<f64>,
    in_out: String,
    category: Option<String>,
    counterparty: Option<String>,
    balance: Option<f64>,
    due_date: Option<String>,
    invoice_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawMonthRow {
    month: String,
    revenue: Option<f64>,
    cogs: Option<f64>,
    operating_expense: Option<f64>,
    other_income_expense: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawVendorRow {
    vendor_id: Option<String>,
    name: Option<String>,
    category: Option<String>,
    is_critical: Option<String>,
}

// ============================================================================
// FIELD PARSERS
// ============================================================================

/// Accepts YYYY-MM-DD, YYYY-MM-DD HH:MM:SS and MM/DD/YYYY
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();

    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(datetime) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
        return Some(datetime.date());
    }
    NaiveDate::parse_from_str(value, "%m/%d/%Y").ok()
}

/// Accepts YYYY-MM or any full date inside the month; returns the 1st
pub fn parse_month(value: &str) -> Option<NaiveDate> {
    let value = value.trim();

    if let Ok(date) = NaiveDate::parse_from_str(&format!("{}-01", value), "%Y-%m-%d") {
        return Some(date);
    }
    parse_date(value).and_then(|date| date.with_day(1))
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "1" => Some(true),
        "false" | "f" | "no" | "n" | "0" => Some(false),
        _ => None,
    }
}

fn optional_date(
    value: Option<String>,
    line: usize,
    field: &'static str,
) -> Result<Option<NaiveDate>, LoadError> {
    match value {
        None => Ok(None),
        Some(raw) => parse_date(&raw)
            .map(Some)
            .ok_or(LoadError::InvalidField { line, field, value: raw }),
    }
}

fn csv_reader<R: io::Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader)
}

// Header is line 1, first data row is line 2
fn line_of(index: usize) -> usize {
    index + 2
}

// ============================================================================
// READERS
// ============================================================================

pub fn read_bank_transactions<R: io::Read>(reader: R) -> Result<Vec<BankTransaction>, LoadError> {
    let mut rdr = csv_reader(reader);
    let mut transactions = Vec::new();

    for (index, result) in rdr.deserialize::<RawBankRow>().enumerate() {
        let line = line_of(index);
        let raw = result.map_err(|source| LoadError::Malformed { line, source })?;

        let date = parse_date(&raw.date).ok_or_else(|| LoadError::InvalidField {
            line,
            field: "date",
            value: raw.date.clone(),
        })?;
        let in_out = Direction::parse(&raw.in_out).ok_or_else(|| LoadError::InvalidField {
            line,
            field: "in_out",
            value: raw.in_out.clone(),
        })?;
        let balance = raw
            .balance
            .ok_or(LoadError::MissingField { line, field: "balance" })?;

        transactions.push(BankTransaction {
            date,
            amount: raw.amount,
            in_out,
            category: raw.category,
            counterparty: raw.counterparty,
            balance,
            due_date: optional_date(raw.due_date, line, "due_date")?,
            invoice_date: optional_date(raw.invoice_date, line, "invoice_date")?,
        });
    }

    Ok(transactions)
}

pub fn read_monthly_financials<R: io::Read>(reader: R) -> Result<Vec<MonthlyFinancial>, LoadError> {
    let mut rdr = csv_reader(reader);
    let mut months = Vec::new();

    for (index, result) in rdr.deserialize::<RawMonthRow>().enumerate() {
        let line = line_of(index);
        let raw = result.map_err(|source| LoadError::Malformed { line, source })?;

        let month = parse_month(&raw.month).ok_or_else(|| LoadError::InvalidField {
            line,
            field: "month",
            value: raw.month.clone(),
        })?;

        months.push(MonthlyFinancial {
            month,
            revenue: raw.revenue,
            cogs: raw.cogs,
            operating_expense: raw.operating_expense,
            other_income_expense: raw.other_income_expense,
        });
    }

    Ok(months)
}

pub fn read_vendors<R: io::Read>(reader: R) -> Result<Vec<VendorRecord>, LoadError> {
    let mut rdr = csv_reader(reader);
    let mut vendors = Vec::new();

    for (index, result) in rdr.deserialize::<RawVendorRow>().enumerate() {
        let line = line_of(index);
        let raw = result.map_err(|source| LoadError::Malformed { line, source })?;

        let is_critical = match raw.is_critical {
            None => None,
            Some(flag) => Some(parse_flag(&flag).ok_or(LoadError::InvalidField {
                line,
                field: "is_critical",
                value: flag,
            })?),
        };

        vendors.push(VendorRecord {
            vendor_id: raw.vendor_id,
            name: raw.name,
            category: raw.category,
            is_critical,
        });
    }

    Ok(vendors)
}

// ============================================================================
// FILE LOADERS
// ============================================================================

pub fn load_bank_transactions(path: &Path) -> Result<Vec<BankTransaction>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open bank transactions file {}", path.display()))?;
    read_bank_transactions(file)
        .with_context(|| format!("Failed to parse bank transactions file {}", path.display()))
}

pub fn load_monthly_financials(path: &Path) -> Result<Vec<MonthlyFinancial>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open monthly P&L file {}", path.display()))?;
    read_monthly_financials(file)
        .with_context(|| format!("Failed to parse monthly P&L file {}", path.display()))
}

pub fn load_vendors(path: &Path) -> Result<Vec<VendorRecord>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open vendors file {}", path.display()))?;
    read_vendors(file).with_context(|| format!("Failed to parse vendors file {}", path.display()))
}

/// The three files making up one window
#[derive(Debug, Clone, PartialEq)]
pub struct WindowFiles {
    pub bank_tx: PathBuf,
    pub pnl_monthly: PathBuf,
    pub vendors: Option<PathBuf>,
}

impl WindowFiles {
    pub const BANK_TX_FILE: &'static str = "bank_tx.csv";
    pub const PNL_MONTHLY_FILE: &'static str = "pnl_monthly.csv";
    pub const VENDORS_FILE: &'static str = "vendors.csv";

    /// Standard layout: `bank_tx.csv`, `pnl_monthly.csv` and, when present,
    /// `vendors.csv` inside `dir`
    pub fn in_dir(dir: &Path) -> Self {
        let vendors = dir.join(Self::VENDORS_FILE);
        WindowFiles {
            bank_tx: dir.join(Self::BANK_TX_FILE),
            pnl_monthly: dir.join(Self::PNL_MONTHLY_FILE),
            vendors: if vendors.exists() { Some(vendors) } else { None },
        }
    }
}

/// Load a window. Bank and P&L failures are fatal; a vendor failure is kept
/// as an unreadable roster so the other checks still run.
pub fn load_window(files: &WindowFiles) -> Result<WindowInput> {
    let bank_tx = load_bank_transactions(&files.bank_tx)?;
    let pnl_monthly = load_monthly_financials(&files.pnl_monthly)?;

    let mut input = WindowInput::new(bank_tx, pnl_monthly);

    if let Some(path) = &files.vendors {
        let roster = match load_vendors(path) {
            Ok(records) => VendorRoster::Loaded(records),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %format!("{:#}", e), "vendor roster unreadable");
                VendorRoster::Unreadable(format!("{:#}", e))
            }
        };
        input = input.with_vendors(roster);
    }

    Ok(input)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const BANK_CSV: &str = "\
date,amount,in_out,category,counterparty,balance,invoice_date,due_date
2025-01-01,1000.00,in,customer_payment,Counterparty_1,21000.00,,
2025-01-02,250.50,out,supplier_payment,Counterparty_7,20749.50,2024-12-05,2025-01-04
2025-01-03,,out,,Counterparty_7,20749.50,,
";

    #[test]
    fn test_read_bank_transactions() {
        let txs = read_bank_transactions(BANK_CSV.as_bytes()).unwrap();

        assert_eq!(txs.len(), 3);
        assert_eq!(txs[0].in_out, Direction::In);
        assert_eq!(txs[0].category.as_deref(), Some("customer_payment"));
        assert_eq!(txs[0].due_date, None);
        assert_eq!(txs[1].due_date, NaiveDate::from_ymd_opt(2025, 1, 4));
        assert_eq!(txs[1].invoice_date, NaiveDate::from_ymd_opt(2024, 12, 5));
        assert_eq!(txs[2].amount, None);
        assert_eq!(txs[2].category, None);
    }

    #[test]
    fn test_due_date_column_is_optional() {
        let csv = "date,amount,in_out,category,counterparty,balance\n2025-01-01,5,out,rent,Landlord,95\n";
        let txs = read_bank_transactions(csv.as_bytes()).unwrap();
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].due_date, None);
    }

    #[test]
    fn test_bad_direction_names_line() {
        let csv = "date,amount,in_out,category,counterparty,balance\n2025-01-01,5,sideways,rent,Landlord,95\n";
        let err = read_bank_transactions(csv.as_bytes()).unwrap_err();

        assert!(matches!(err, LoadError::InvalidField { line: 2, field: "in_out", .. }));
    }

    #[test]
    fn test_missing_balance_is_an_error() {
        let csv = "date,amount,in_out,category,counterparty,balance\n2025-01-01,5,in,rent,Landlord,\n";
        let err = read_bank_transactions(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, LoadError::MissingField { field: "balance", .. }));
    }

    #[test]
    fn test_read_monthly_financials() {
        let csv = "\
month,revenue,cogs,operating_expense,other_income_expense
2025-01,100000,45000,25000,1200
2025-02-28,110000,,27000,
";
        let months = read_monthly_financials(csv.as_bytes()).unwrap();

        assert_eq!(months.len(), 2);
        assert_eq!(months[0].month, NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        assert_eq!(months[0].nocf(), Some(30000.0));
        assert_eq!(months[1].month, NaiveDate::from_ymd_opt(2025, 2, 1).unwrap());
        assert_eq!(months[1].cogs, None);
    }

    #[test]
    fn test_read_vendors_with_flags() {
        let csv = "vendor_id,name,category,is_critical\nV1,Vendor Name 1,rent,True\nV2,,software,False\n";
        let vendors = read_vendors(csv.as_bytes()).unwrap();

        assert_eq!(vendors[0].is_critical, Some(true));
        assert_eq!(vendors[1].name, None);
        assert_eq!(vendors[1].is_critical, Some(false));
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2025, 3, 9);
        assert_eq!(parse_date("2025-03-09"), expected);
        assert_eq!(parse_date("2025-03-09 00:00:00"), expected);
        assert_eq!(parse_date("03/09/2025"), expected);
        assert_eq!(parse_date("yesterday"), None);
    }

    #[test]
    fn test_load_window_keeps_bad_vendor_file_as_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("bank_tx.csv"), BANK_CSV).unwrap();
        fs::write(
            dir.path().join("pnl_monthly.csv"),
            "month,revenue,cogs,operating_expense\n2025-01,100,40,20\n",
        )
        .unwrap();
        fs::write(dir.path().join("vendors.csv"), "vendor_id,name,is_critical\nV1,Acme,maybe\n").unwrap();

        let files = WindowFiles::in_dir(dir.path());
        let input = load_window(&files).unwrap();

        assert_eq!(input.bank_tx.len(), 3);
        match input.vendors {
            Some(VendorRoster::Unreadable(message)) => assert!(message.contains("is_critical")),
            other => panic!("expected unreadable roster, got {:?}", other),
        }
    }

    #[test]
    fn test_load_window_fails_without_bank_file() {
        let dir = tempfile::tempdir().unwrap();
        let files = WindowFiles::in_dir(dir.path());

        assert_eq!(files.vendors, None);
        let err = load_window(&files).unwrap_err();
        assert!(format!("{:#}", err).contains("bank transactions"));
    }
}
