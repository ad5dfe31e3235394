// ✅ Data Validator - Quality gate in front of feature engineering
// Fixed battery of checks over ledger, P&L and vendor roster.
//
// Every check produces a count where 0 means clean. The window passes only if
// every count is 0. A check that could not run records an error string instead,
// which does not by itself fail the window.
//
// Two distinct failure shapes:
//   - checked:    { passed: false, checks: {...} }  → data owner must fix the files
//   - unreadable: { passed: false, error: "..." }   → files could not be parsed at all

use crate::loader::{self, WindowFiles};
use crate::policy::ValidationPolicy;
use crate::records::{BankTransaction, MonthlyFinancial, VendorRecord, VendorRoster, WindowInput};
use crate::series;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

// ============================================================================
// CHECK NAMES
// ============================================================================

pub mod check_names {
    pub const BANK_TX_MISSING_DATES: &str = "bank_tx_missing_dates";
    pub const BANK_TX_DUPLICATE_ROWS: &str = "bank_tx_duplicate_rows";
    pub const BANK_TX_NEGATIVE_OR_EMPTY_AMOUNTS: &str = "bank_tx_negative_or_empty_amounts";
    pub const BALANCE_CONTINUITY_ERRORS: &str = "balance_continuity_errors";
    pub const CATEGORY_COVERAGE_LOW: &str = "category_coverage_low";
    pub const PNL_NULL_VALUES: &str = "pnl_null_values";
    pub const VENDORS_NULL_VALUES: &str = "vendors_null_values";
    pub const VENDORS_DUPLICATE_IDS: &str = "vendors_duplicate_ids";
    pub const VENDORS_READ_ERROR: &str = "vendors_read_error";
}

// ============================================================================
// VALIDATION REPORT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CheckValue {
    Count(u64),
    Error(String),
}

impl CheckValue {
    pub fn count(&self) -> Option<u64> {
        match self {
            CheckValue::Count(n) => Some(*n),
            CheckValue::Error(_) => None,
        }
    }
}

pub type Checks = BTreeMap<String, CheckValue>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ValidationReport {
    Checked { passed: bool, checks: Checks },
    Unreadable { passed: bool, error: String },
}

impl ValidationReport {
    /// Passed iff every numeric check is exactly 0
    pub fn from_checks(checks: Checks) -> Self {
        let passed = checks
            .values()
            .all(|value| value.count().map_or(true, |n| n == 0));
        ValidationReport::Checked { passed, checks }
    }

    pub fn unreadable(error: impl Into<String>) -> Self {
        ValidationReport::Unreadable {
            passed: false,
            error: error.into(),
        }
    }

    pub fn passed(&self) -> bool {
        match self {
            ValidationReport::Checked { passed, .. } => *passed,
            ValidationReport::Unreadable { .. } => false,
        }
    }

    /// `None` when the files could not be validated at all
    pub fn checks(&self) -> Option<&Checks> {
        match self {
            ValidationReport::Checked { checks, .. } => Some(checks),
            ValidationReport::Unreadable { .. } => None,
        }
    }

    pub fn count(&self, check: &str) -> Option<u64> {
        self.checks()?.get(check)?.count()
    }

    /// Non-zero checks, in name order
    pub fn failing_checks(&self) -> Vec<(&str, u64)> {
        self.checks()
            .map(|checks| {
                checks
                    .iter()
                    .filter_map(|(name, value)| match value.count() {
                        Some(n) if n > 0 => Some((name.as_str(), n)),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn summary(&self) -> String {
        match self {
            ValidationReport::Unreadable { error, .. } => format!("Could not validate: {}", error),
            ValidationReport::Checked { passed: true, checks } => {
                format!("Validation passed ({} checks)", checks.len())
            }
            ValidationReport::Checked { passed: false, .. } => {
                let failing: Vec<String> = self
                    .failing_checks()
                    .iter()
                    .map(|(name, n)| format!("{}={}", name, n))
                    .collect();
                format!("Validation failed: {}", failing.join(", "))
            }
        }
    }
}

// ============================================================================
// DATA VALIDATOR
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct DataValidator {
    policy: ValidationPolicy,
}

impl DataValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: ValidationPolicy) -> Self {
        DataValidator { policy }
    }

    pub fn policy(&self) -> &ValidationPolicy {
        &self.policy
    }

    /// Run every check over already-loaded records
    pub fn validate(
        &self,
        bank_tx: &[BankTransaction],
        pnl_monthly: &[MonthlyFinancial],
        vendors: Option<&VendorRoster>,
    ) -> ValidationReport {
        use self::check_names::*;

        let mut checks = Checks::new();

        // Bank ledger
        record(&mut checks, BANK_TX_MISSING_DATES, self.missing_dates(bank_tx));
        record(&mut checks, BANK_TX_DUPLICATE_ROWS, self.duplicate_rows(bank_tx));
        record(
            &mut checks,
            BANK_TX_NEGATIVE_OR_EMPTY_AMOUNTS,
            self.negative_or_empty_amounts(bank_tx),
        );
        record(&mut checks, BALANCE_CONTINUITY_ERRORS, self.balance_continuity_errors(bank_tx));
        record(
            &mut checks,
            CATEGORY_COVERAGE_LOW,
            u64::from(self.category_coverage_low(bank_tx)),
        );

        // P&L
        record(&mut checks, PNL_NULL_VALUES, self.pnl_null_values(pnl_monthly));

        // Vendor roster (optional)
        match vendors {
            Some(VendorRoster::Loaded(records)) => {
                record(&mut checks, VENDORS_NULL_VALUES, self.vendor_null_values(records));
                record(&mut checks, VENDORS_DUPLICATE_IDS, self.vendor_duplicate_ids(records));
            }
            Some(VendorRoster::Unreadable(error)) => {
                tracing::debug!(check = VENDORS_READ_ERROR, %error, "validation check skipped");
                checks.insert(VENDORS_READ_ERROR.to_string(), CheckValue::Error(error.clone()));
            }
            None => {}
        }

        ValidationReport::from_checks(checks)
    }

    pub fn validate_input(&self, input: &WindowInput) -> ValidationReport {
        self.validate(&input.bank_tx, &input.pnl_monthly, input.vendors.as_ref())
    }

    /// Load and validate. A mandatory file that cannot be parsed yields the
    /// unreadable report shape with no checks.
    pub fn validate_files(&self, files: &WindowFiles) -> ValidationReport {
        match loader::load_window(files) {
            Ok(input) => self.validate_input(&input),
            Err(e) => ValidationReport::unreadable(format!("{:#}", e)),
        }
    }

    // ========================================================================
    // BANK LEDGER CHECKS
    // ========================================================================

    /// Gaps wider than the allowed step between consecutive distinct dates
    pub fn missing_dates(&self, bank_tx: &[BankTransaction]) -> u64 {
        series::distinct_dates(bank_tx)
            .windows(2)
            .filter(|pair| (pair[1] - pair[0]).num_days() > self.policy.max_date_gap_days)
            .count() as u64
    }

    /// Rows identical to an earlier row (the first occurrence is not counted)
    pub fn duplicate_rows(&self, bank_tx: &[BankTransaction]) -> u64 {
        let mut seen = HashSet::new();
        bank_tx
            .iter()
            .filter(|tx| !seen.insert(tx.row_key()))
            .count() as u64
    }

    pub fn negative_or_empty_amounts(&self, bank_tx: &[BankTransaction]) -> u64 {
        bank_tx
            .iter()
            .filter(|tx| match tx.amount {
                None => true,
                Some(amount) => amount < 0.0 || amount.is_nan(),
            })
            .count() as u64
    }

    /// Days (after the first) whose closing balance is not the prior close
    /// plus that day's net signed flow, within tolerance
    pub fn balance_continuity_errors(&self, bank_tx: &[BankTransaction]) -> u64 {
        let days = series::daily_summary(bank_tx);

        days.windows(2)
            .filter(|pair| {
                let expected = pair[0].closing_balance + pair[1].net_change;
                !self.policy.balances_match(pair[1].closing_balance, expected)
            })
            .count() as u64
    }

    /// True when fewer than the required share of rows carry a category.
    /// An empty ledger is not low.
    pub fn category_coverage_low(&self, bank_tx: &[BankTransaction]) -> bool {
        if bank_tx.is_empty() {
            return false;
        }
        let categorized = bank_tx.iter().filter(|tx| is_present(&tx.category)).count();
        let coverage = categorized as f64 / bank_tx.len() as f64;
        coverage < self.policy.min_category_coverage
    }

    // ========================================================================
    // P&L AND VENDOR CHECKS
    // ========================================================================

    pub fn pnl_null_values(&self, pnl_monthly: &[MonthlyFinancial]) -> u64 {
        pnl_monthly.iter().map(|m| m.null_count() as u64).sum()
    }

    /// Missing `vendor_id` or `name` cells
    pub fn vendor_null_values(&self, vendors: &[VendorRecord]) -> u64 {
        vendors
            .iter()
            .map(|v| u64::from(!is_present(&v.vendor_id)) + u64::from(!is_present(&v.name)))
            .sum()
    }

    /// Rows repeating an earlier `vendor_id`
    pub fn vendor_duplicate_ids(&self, vendors: &[VendorRecord]) -> u64 {
        let mut seen = HashSet::new();
        vendors
            .iter()
            .filter(|v| !seen.insert(v.vendor_id.as_deref()))
            .count() as u64
    }
}

fn record(checks: &mut Checks, name: &str, value: u64) {
    tracing::debug!(check = name, value, "validation check");
    checks.insert(name.to_string(), CheckValue::Count(value));
}

fn is_present(value: &Option<String>) -> bool {
    value.as_deref().map_or(false, |s| !s.trim().is_empty())
}

/// Validate with the default tolerances
pub fn validate(
    bank_tx: &[BankTransaction],
    pnl_monthly: &[MonthlyFinancial],
    vendors: Option<&VendorRoster>,
) -> ValidationReport {
    DataValidator::new().validate(bank_tx, pnl_monthly, vendors)
}

// ============================================================================
// TESTS
// ============================================================================
