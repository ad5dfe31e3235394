// 🧾 Record Model - Typed inputs for the scorecard pipeline
// Bank ledger, monthly P&L and vendor roster, exactly as the loader hands them over
//
// Records carry nullable fields on purpose: the validator COUNTS missing values,
// it does not reject them at construction.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ============================================================================
// WELL-KNOWN CATEGORIES
// ============================================================================

/// Category labels the feature engine looks for. Anything else is free-form.
pub mod categories {
    pub const NSF_FEE: &str = "nsf_fee";
    pub const RETURNED_ACH: &str = "returned_ach";
    pub const LOAN_REPAYMENT: &str = "loan_repayment";
    pub const CREDIT: &str = "credit";
}

// ============================================================================
// BANK TRANSACTION
// ============================================================================

/// Direction of money movement on the account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::In => "in",
            Direction::Out => "out",
        }
    }

    /// Parse the `in_out` column (case-insensitive)
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "in" => Some(Direction::In),
            "out" => Some(Direction::Out),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankTransaction {
    pub date: NaiveDate,

    /// Non-negative magnitude; `None` when the source cell was empty
    pub amount: Option<f64>,

    pub in_out: Direction,

    pub category: Option<String>,

    pub counterparty: Option<String>,

    /// Running balance at the end of `date`
    pub balance: f64,

    /// Present only for some outflows (vendor bills)
    #[serde(default)]
    pub due_date: Option<NaiveDate>,

    /// Carried through from the ledger, not used by any computation
    #[serde(default)]
    pub invoice_date: Option<NaiveDate>,
}

impl BankTransaction {
    pub fn new(date: NaiveDate, amount: f64, in_out: Direction, balance: f64) -> Self {
        BankTransaction {
            date,
            amount: Some(amount),
            in_out,
            category: None,
            counterparty: None,
            balance,
            due_date: None,
            invoice_date: None,
        }
    }

    /// Builder pattern: add category
    pub fn with_category(mut self, category: &str) -> Self {
        self.category = Some(category.to_string());
        self
    }

    /// Builder pattern: add counterparty
    pub fn with_counterparty(mut self, counterparty: &str) -> Self {
        self.counterparty = Some(counterparty.to_string());
        self
    }

    /// Builder pattern: add due date
    pub fn with_due_date(mut self, due_date: NaiveDate) -> Self {
        self.due_date = Some(due_date);
        self
    }

    /// `+amount` for inflows, `-amount` for outflows; `None` if amount is missing
    pub fn signed_amount(&self) -> Option<f64> {
        self.amount.map(|amount| match self.in_out {
            Direction::In => amount,
            Direction::Out => -amount,
        })
    }

    pub fn is_inflow(&self) -> bool {
        self.in_out == Direction::In
    }

    pub fn is_outflow(&self) -> bool {
        self.in_out == Direction::Out
    }

    pub fn has_category(&self, category: &str) -> bool {
        self.category.as_deref() == Some(category)
    }

    /// Key over every field, used to spot fully duplicated rows.
    /// Two records share a key iff all of their fields are equal.
    pub fn row_key(&self) -> RowKey<'_> {
        RowKey {
            date: self.date,
            amount: self.amount.map(f64::to_bits),
            in_out: self.in_out,
            category: self.category.as_deref(),
            counterparty: self.counterparty.as_deref(),
            balance: self.balance.to_bits(),
            due_date: self.due_date,
            invoice_date: self.invoice_date,
        }
    }
}

/// Borrowed, hashable view of a whole bank row. Floats compare by bit pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RowKey<'a> {
    date: NaiveDate,
    amount: Option<u64>,
    in_out: Direction,
    category: Option<&'a str>,
    counterparty: Option<&'a str>,
    balance: u64,
    due_date: Option<NaiveDate>,
    invoice_date: Option<NaiveDate>,
}

// ============================================================================
// MONTHLY FINANCIAL STATEMENT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyFinancial {
    /// First day of the calendar month
    pub month: NaiveDate,
    pub revenue: Option<f64>,
    pub cogs: Option<f64>,
    pub operating_expense: Option<f64>,
    #[serde(default)]
    pub other_income_expense: Option<f64>,
}

impl MonthlyFinancial {
    pub fn new(month: NaiveDate, revenue: f64, cogs: f64, operating_expense: f64) -> Self {
        MonthlyFinancial {
            month,
            revenue: Some(revenue),
            cogs: Some(cogs),
            operating_expense: Some(operating_expense),
            other_income_expense: None,
        }
    }

    /// Net operating cash flow: revenue - cogs - operating_expense
    pub fn nocf(&self) -> Option<f64> {
        Some(self.revenue? - self.cogs? - self.operating_expense?)
    }

    /// Number of missing values among the three mandatory figures
    pub fn null_count(&self) -> usize {
        [self.revenue, self.cogs, self.operating_expense]
            .iter()
            .filter(|v| v.is_none())
            .count()
    }
}

// ============================================================================
// VENDOR ROSTER
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VendorRecord {
    pub vendor_id: Option<String>,
    pub name: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub is_critical: Option<bool>,
}

impl VendorRecord {
    pub fn new(vendor_id: &str, name: &str) -> Self {
        VendorRecord {
            vendor_id: Some(vendor_id.to_string()),
            name: Some(name.to_string()),
            category: None,
            is_critical: None,
        }
    }
}

/// The optional vendor file either loaded or failed to load.
/// A failed roster never blocks the bank and P&L checks.
#[derive(Debug, Clone, PartialEq)]
pub enum VendorRoster {
    Loaded(Vec<VendorRecord>),
    Unreadable(String),
}

impl VendorRoster {
    pub fn records(&self) -> Option<&[VendorRecord]> {
        match self {
            VendorRoster::Loaded(records) => Some(records),
            VendorRoster::Unreadable(_) => None,
        }
    }
}

// ============================================================================
// WINDOW INPUT
// ============================================================================

/// Everything one window's pipeline run consumes, already materialized
#[derive(Debug, Clone, PartialEq)]
pub struct WindowInput {
    pub bank_tx: Vec<BankTransaction>,
    pub pnl_monthly: Vec<MonthlyFinancial>,
    pub vendors: Option<VendorRoster>,
}

impl WindowInput {
    pub fn new(bank_tx: Vec<BankTransaction>, pnl_monthly: Vec<MonthlyFinancial>) -> Self {
        WindowInput {
            bank_tx,
            pnl_monthly,
            vendors: None,
        }
    }

    /// Builder pattern: attach a vendor roster
    pub fn with_vendors(mut self, vendors: VendorRoster) -> Self {
        self.vendors = Some(vendors);
        self
    }
}

// ============================================================================
// TESTS
// ============================================================================
