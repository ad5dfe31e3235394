// 🧮 Feature Engine - Financial metrics from a validated window
// Liquidity, cash flow, payment discipline, revenue stability,
// concentration and coverage.
//
// Pure function of its inputs. Every division is guarded with an explicit
// fallback; the only implicit coercion is the final sanitize pass, which turns
// any non-finite value (e.g. std of a single week) into 0.
//
// Precondition: the window passed validation. Not re-checked here.

use crate::records::{categories, BankTransaction, MonthlyFinancial, VendorRecord};
use crate::series;
use crate::stats;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Days per month used to turn monthly operating expense into a daily burn
const DAYS_PER_MONTH: f64 = 30.0;
/// Revenue points used for the trend slope
const SLOPE_MONTHS: usize = 3;
/// Counterparties summed for the top-N concentration share
const TOP_N_VENDORS: usize = 5;

// ============================================================================
// FEATURE SET
// ============================================================================

/// The fixed set of named features a window produces.
/// Serialized names are the stable schema consumed downstream.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FeatureSet {
    // Liquidity
    pub average_daily_balance: f64,
    pub percent_of_days_below_zero: f64,
    pub days_cash_on_hand: f64,

    // Cash flow
    pub median_monthly_nocf: f64,
    pub weekly_net_cashflow_variability: f64,
    pub draw_on_credit_ratio: f64,

    // Payment discipline
    pub nsf_count: u32,
    pub returned_ach_count: u32,
    pub vendor_late_proxy: f64,

    // Revenue stability
    pub mom_revenue_variability: f64,
    #[serde(rename = "3_month_slope")]
    pub three_month_slope: f64,
    /// Reserved for a seasonal adjustment; not computed yet, always 0
    pub seasonal_delta: f64,

    // Concentration
    pub top_vendor_share: f64,
    pub top_5_vendors_share: f64,

    // Coverage
    pub dscr_proxy: f64,
    pub annualized_revenue: f64,
}

impl FeatureSet {
    pub const NAMES: [&'static str; 16] = [
        "average_daily_balance",
        "percent_of_days_below_zero",
        "days_cash_on_hand",
        "median_monthly_nocf",
        "weekly_net_cashflow_variability",
        "draw_on_credit_ratio",
        "nsf_count",
        "returned_ach_count",
        "vendor_late_proxy",
        "mom_revenue_variability",
        "3_month_slope",
        "seasonal_delta",
        "top_vendor_share",
        "top_5_vendors_share",
        "dscr_proxy",
        "annualized_revenue",
    ];

    /// Name/value pairs in schema order
    pub fn entries(&self) -> Vec<(&'static str, f64)> {
        let values = [
            self.average_daily_balance,
            self.percent_of_days_below_zero,
            self.days_cash_on_hand,
            self.median_monthly_nocf,
            self.weekly_net_cashflow_variability,
            self.draw_on_credit_ratio,
            f64::from(self.nsf_count),
            f64::from(self.returned_ach_count),
            self.vendor_late_proxy,
            self.mom_revenue_variability,
            self.three_month_slope,
            self.seasonal_delta,
            self.top_vendor_share,
            self.top_5_vendors_share,
            self.dscr_proxy,
            self.annualized_revenue,
        ];
        Self::NAMES.iter().copied().zip(values).collect()
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.entries()
            .into_iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value)
    }

    pub fn is_finite(&self) -> bool {
        self.entries().iter().all(|(_, value)| value.is_finite())
    }

    /// Replace every non-finite value with 0
    pub fn sanitize(mut self) -> Self {
        for value in self.float_fields_mut() {
            if !value.is_finite() {
                *value = 0.0;
            }
        }
        self
    }

    fn float_fields_mut(&mut self) -> [&mut f64; 14] {
        [
            &mut self.average_daily_balance,
            &mut self.percent_of_days_below_zero,
            &mut self.days_cash_on_hand,
            &mut self.median_monthly_nocf,
            &mut self.weekly_net_cashflow_variability,
            &mut self.draw_on_credit_ratio,
            &mut self.vendor_late_proxy,
            &mut self.mom_revenue_variability,
            &mut self.three_month_slope,
            &mut self.seasonal_delta,
            &mut self.top_vendor_share,
            &mut self.top_5_vendors_share,
            &mut self.dscr_proxy,
            &mut self.annualized_revenue,
        ]
    }
}

// ============================================================================
// FEATURE ENGINE
// ============================================================================

/// Compute every feature for one window.
///
/// The vendor roster is accepted for interface symmetry with the validator;
/// no feature reads it.
pub fn compute_features(
    bank_tx: &[BankTransaction],
    pnl_monthly: &[MonthlyFinancial],
    _vendors: Option<&[VendorRecord]>,
) -> FeatureSet {
    let mut features = FeatureSet::default();

    liquidity(&mut features, bank_tx, pnl_monthly);
    cash_flow(&mut features, bank_tx, pnl_monthly);
    payment_discipline(&mut features, bank_tx);
    revenue_stability(&mut features, pnl_monthly);
    concentration(&mut features, bank_tx);
    coverage(&mut features, bank_tx, pnl_monthly);

    features.sanitize()
}

fn liquidity(features: &mut FeatureSet, bank_tx: &[BankTransaction], pnl: &[MonthlyFinancial]) {
    let balances: Vec<f64> = series::daily_closing_balance(bank_tx)
        .into_iter()
        .map(|(_, balance)| balance)
        .collect();

    features.average_daily_balance = stats::mean(&balances);

    let below_zero = balances.iter().filter(|b| **b < 0.0).count();
    features.percent_of_days_below_zero = below_zero as f64 / balances.len() as f64 * 100.0;

    let opex: Vec<f64> = pnl.iter().filter_map(|m| m.operating_expense).collect();
    let daily_expense = stats::mean(&opex) / DAYS_PER_MONTH;
    features.days_cash_on_hand = if daily_expense > 0.0 {
        features.average_daily_balance / daily_expense
    } else {
        0.0
    };
}

fn cash_flow(features: &mut FeatureSet, bank_tx: &[BankTransaction], pnl: &[MonthlyFinancial]) {
    let nocf: Vec<f64> = pnl.iter().filter_map(MonthlyFinancial::nocf).collect();
    features.median_monthly_nocf = stats::median(&nocf);

    let weekly: Vec<f64> = series::weekly_net_cashflow(bank_tx)
        .into_iter()
        .map(|(_, flow)| flow)
        .collect();
    let weekly_mean = stats::mean(&weekly);
    features.weekly_net_cashflow_variability = if weekly_mean != 0.0 {
        stats::sample_std(&weekly) / weekly_mean
    } else {
        0.0
    };

    let inflows: Vec<&BankTransaction> = bank_tx.iter().filter(|tx| tx.is_inflow()).collect();
    let total_inflows: f64 = inflows.iter().filter_map(|tx| tx.amount).sum();
    let credit_inflows: f64 = inflows
        .iter()
        .filter(|tx| tx.has_category(categories::CREDIT))
        .filter_map(|tx| tx.amount)
        .sum();
    features.draw_on_credit_ratio = if total_inflows > 0.0 {
        credit_inflows / total_inflows
    } else {
        0.0
    };
}

fn payment_discipline(features: &mut FeatureSet, bank_tx: &[BankTransaction]) {
    let count = |category: &str| bank_tx.iter().filter(|tx| tx.has_category(category)).count() as u32;
    features.nsf_count = count(categories::NSF_FEE);
    features.returned_ach_count = count(categories::RETURNED_ACH);

    // Outgoing payments against a bill: late when paid after the due date
    let billed: Vec<(&BankTransaction, chrono::NaiveDate)> = bank_tx
        .iter()
        .filter(|tx| tx.is_outflow())
        .filter_map(|tx| tx.due_date.map(|due| (tx, due)))
        .collect();
    let late = billed.iter().filter(|(tx, due)| tx.date > *due).count();
    features.vendor_late_proxy = if billed.is_empty() {
        0.0
    } else {
        late as f64 / billed.len() as f64 * 100.0
    };
}

fn revenue_stability(features: &mut FeatureSet, pnl: &[MonthlyFinancial]) {
    let revenue: Vec<Option<f64>> = pnl.iter().map(|m| m.revenue).collect();

    // 0 → 0 is undefined and skipped; x → anything after a 0 month is ±inf
    // and still poisons the std
    let pct_changes: Vec<f64> = revenue
        .windows(2)
        .filter_map(|pair| match (pair[0], pair[1]) {
            (Some(prev), Some(cur)) => Some((cur - prev) / prev),
            _ => None,
        })
        .filter(|change| !change.is_nan())
        .collect();
    features.mom_revenue_variability = stats::sample_std(&pct_changes);

    features.three_month_slope = if revenue.len() >= SLOPE_MONTHS {
        let recent: Option<Vec<f64>> = revenue[revenue.len() - SLOPE_MONTHS..].iter().copied().collect();
        recent.map_or(f64::NAN, |values| stats::ols_slope(&values))
    } else {
        0.0
    };

    features.seasonal_delta = 0.0;
}

fn concentration(features: &mut FeatureSet, bank_tx: &[BankTransaction]) {
    let mut spend: HashMap<&str, f64> = HashMap::new();
    for tx in bank_tx.iter().filter(|tx| tx.is_outflow()) {
        if let (Some(counterparty), Some(amount)) = (tx.counterparty.as_deref(), tx.amount) {
            *spend.entry(counterparty).or_insert(0.0) += amount;
        }
    }

    let mut totals: Vec<f64> = spend.into_values().collect();
    totals.sort_by(|a, b| b.total_cmp(a));
    let total_spend: f64 = totals.iter().sum();

    if total_spend > 0.0 {
        features.top_vendor_share = totals[0] / total_spend;
        features.top_5_vendors_share = totals.iter().take(TOP_N_VENDORS).sum::<f64>() / total_spend;
    } else {
        features.top_vendor_share = 0.0;
        features.top_5_vendors_share = 0.0;
    }
}

fn coverage(features: &mut FeatureSet, bank_tx: &[BankTransaction], pnl: &[MonthlyFinancial]) {
    let total_nocf: f64 = pnl.iter().filter_map(MonthlyFinancial::nocf).sum();
    let debt_service: f64 = bank_tx
        .iter()
        .filter(|tx| tx.is_outflow() && tx.has_category(categories::LOAN_REPAYMENT))
        .filter_map(|tx| tx.amount)
        .sum();
    features.dscr_proxy = if debt_service > 0.0 {
        total_nocf / debt_service
    } else {
        0.0
    };

    let total_revenue: f64 = pnl.iter().filter_map(|m| m.revenue).sum();
    features.annualized_revenue = if pnl.is_empty() {
        0.0
    } else {
        total_revenue * (12.0 / pnl.len() as f64)
    };
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::Direction;
    use chrono::{Duration, NaiveDate};

    fn day(offset: i64) -> NaiveDate {
        // 2025-01-06 is a Monday
        NaiveDate::from_ymd_opt(2025, 1, 6).unwrap() + Duration::days(offset)
    }

    fn month(m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, m, 1).unwrap()
    }

    fn create_test_transaction(
        offset: i64,
        amount: f64,
        dir: Direction,
        balance: f64,
        category: &str,
        counterparty: &str,
    ) -> BankTransaction {
        BankTransaction::new(day(offset), amount, dir, balance)
            .with_category(category)
            .with_counterparty(counterparty)
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {}, got {}",
            expected,
            actual
        );
    }

    #[test]
    fn test_liquidity_features() {
        let ledger = vec![
            create_test_transaction(0, 100.0, Direction::In, 1000.0, "customer_payment", "C1"),
            create_test_transaction(0, 200.0, Direction::Out, 800.0, "rent", "Landlord"),
            create_test_transaction(1, 1000.0, Direction::Out, -200.0, "payroll", "Staff"),
            create_test_transaction(2, 600.0, Direction::In, 400.0, "customer_payment", "C1"),
        ];
        let pnl = vec![
            MonthlyFinancial::new(month(1), 10_000.0, 4_000.0, 3_000.0),
            MonthlyFinancial::new(month(2), 10_000.0, 4_000.0, 3_000.0),
        ];

        let f = compute_features(&ledger, &pnl, None);

        // daily closes: 800, -200, 400
        assert_close(f.average_daily_balance, 1000.0 / 3.0);
        assert_close(f.percent_of_days_below_zero, 100.0 / 3.0);
        // burn = 3000 / 30 = 100 per day
        assert_close(f.days_cash_on_hand, (1000.0 / 3.0) / 100.0);
    }

    #[test]
    fn test_days_cash_on_hand_zero_when_no_expenses() {
        let ledger = vec![create_test_transaction(0, 100.0, Direction::In, 5000.0, "credit", "Bank")];
        let pnl = vec![MonthlyFinancial::new(month(1), 1000.0, 100.0, 0.0)];

        let f = compute_features(&ledger, &pnl, None);

        assert_eq!(f.days_cash_on_hand, 0.0);
        assert_eq!(f.average_daily_balance, 5000.0);
    }

    #[test]
    fn test_cash_flow_features() {
        let ledger = vec![
            // week ending 01-12: +100 +300 (credit)
            create_test_transaction(0, 100.0, Direction::In, 100.0, "customer_payment", "C1"),
            create_test_transaction(1, 300.0, Direction::In, 400.0, "credit", "Bank"),
            // week ending 01-19: -200
            create_test_transaction(7, 200.0, Direction::Out, 200.0, "rent", "Landlord"),
            // week ending 01-26: +500
            create_test_transaction(14, 500.0, Direction::In, 700.0, "customer_payment", "C2"),
        ];
        let pnl = vec![
            MonthlyFinancial::new(month(1), 1000.0, 300.0, 200.0),
            MonthlyFinancial::new(month(2), 1000.0, 800.0, 300.0),
            MonthlyFinancial::new(month(3), 1000.0, 400.0, 300.0),
        ];

        let f = compute_features(&ledger, &pnl, None);

        // nocf: 500, -100, 300
        assert_eq!(f.median_monthly_nocf, 300.0);

        // weekly: 400, -200, 500 → mean 233.33
        let weekly = [400.0, -200.0, 500.0];
        assert_close(
            f.weekly_net_cashflow_variability,
            stats::sample_std(&weekly) / stats::mean(&weekly),
        );

        assert_close(f.draw_on_credit_ratio, 300.0 / 900.0);
    }

    #[test]
    fn test_single_week_variability_sanitized_to_zero() {
        let ledger = vec![create_test_transaction(0, 100.0, Direction::In, 100.0, "customer_payment", "C1")];
        let pnl = vec![MonthlyFinancial::new(month(1), 1000.0, 300.0, 200.0)];

        let f = compute_features(&ledger, &pnl, None);

        assert_eq!(f.weekly_net_cashflow_variability, 0.0);
        assert_eq!(f.mom_revenue_variability, 0.0);
        assert!(f.is_finite());
    }

    #[test]
    fn test_payment_discipline_features() {
        let late_bill = create_test_transaction(10, 50.0, Direction::Out, 0.0, "supplier_payment", "S1")
            .with_due_date(day(5));
        let on_time_bill = create_test_transaction(10, 50.0, Direction::Out, 0.0, "supplier_payment", "S2")
            .with_due_date(day(10));
        let early_bill = create_test_transaction(10, 50.0, Direction::Out, 0.0, "supplier_payment", "S3")
            .with_due_date(day(12));
        // an inflow with a due date never counts
        let refund = create_test_transaction(10, 50.0, Direction::In, 0.0, "refund", "S1").with_due_date(day(1));

        let ledger = vec![
            create_test_transaction(0, 35.0, Direction::Out, 0.0, "nsf_fee", "Bank"),
            create_test_transaction(1, 35.0, Direction::Out, 0.0, "nsf_fee", "Bank"),
            create_test_transaction(2, 900.0, Direction::Out, 0.0, "returned_ach", "Bank"),
            late_bill,
            on_time_bill,
            early_bill,
            refund,
        ];

        let f = compute_features(&ledger, &[], None);

        assert_eq!(f.nsf_count, 2);
        assert_eq!(f.returned_ach_count, 1);
        assert_close(f.vendor_late_proxy, 100.0 / 3.0);
    }

    #[test]
    fn test_vendor_late_proxy_zero_without_due_dates() {
        let ledger = vec![create_test_transaction(0, 10.0, Direction::Out, 0.0, "rent", "Landlord")];
        let f = compute_features(&ledger, &[], None);
        assert_eq!(f.vendor_late_proxy, 0.0);
    }

    #[test]
    fn test_revenue_stability_features() {
        let pnl = vec![
            MonthlyFinancial::new(month(1), 100.0, 0.0, 0.0),
            MonthlyFinancial::new(month(2), 110.0, 0.0, 0.0),
            MonthlyFinancial::new(month(3), 99.0, 0.0, 0.0),
            MonthlyFinancial::new(month(4), 120.0, 0.0, 0.0),
        ];

        let f = compute_features(&[], &pnl, None);

        let changes = [0.1, -0.1, 21.0 / 99.0];
        assert_close(f.mom_revenue_variability, stats::sample_std(&changes));
        // last three: 110, 99, 120 → slope (120 - 110) / 2
        assert_close(f.three_month_slope, 5.0);
        assert_eq!(f.seasonal_delta, 0.0);
    }

    #[test]
    fn test_flat_zero_revenue_months_are_skipped() {
        // changes: +1.0, -1.0, then 0 → 0 which has no defined change
        let pnl: Vec<MonthlyFinancial> = [10.0, 20.0, 0.0, 0.0]
            .iter()
            .enumerate()
            .map(|(i, revenue)| MonthlyFinancial::new(month(i as u32 + 1), *revenue, 0.0, 0.0))
            .collect();

        let f = compute_features(&[], &pnl, None);

        assert_close(f.mom_revenue_variability, 2.0_f64.sqrt());

        let card = crate::scoring::calculate_scorecard(&f);
        assert_eq!(card.sub_scores.stability, 0.0);
        assert!(card.reason_codes.contains(&crate::scoring::ReasonCode::RevVar));
    }

    #[test]
    fn test_recovery_from_zero_revenue_is_unavailable() {
        // 0 → 50 is an infinite change: variability is undefined, sanitized to 0
        let pnl = vec![
            MonthlyFinancial::new(month(1), 100.0, 0.0, 0.0),
            MonthlyFinancial::new(month(2), 0.0, 0.0, 0.0),
            MonthlyFinancial::new(month(3), 50.0, 0.0, 0.0),
        ];

        let f = compute_features(&[], &pnl, None);

        assert_eq!(f.mom_revenue_variability, 0.0);
    }

    #[test]
    fn test_slope_needs_three_months() {
        let pnl = vec![
            MonthlyFinancial::new(month(1), 100.0, 0.0, 0.0),
            MonthlyFinancial::new(month(2), 200.0, 0.0, 0.0),
        ];
        let f = compute_features(&[], &pnl, None);
        assert_eq!(f.three_month_slope, 0.0);
    }

    #[test]
    fn test_concentration_features() {
        let mut ledger = Vec::new();
        // outflows: A 500, B 200, C..G 50 each = 250; total 950
        ledger.push(create_test_transaction(0, 300.0, Direction::Out, 0.0, "supplier_payment", "A"));
        ledger.push(create_test_transaction(1, 200.0, Direction::Out, 0.0, "supplier_payment", "A"));
        ledger.push(create_test_transaction(1, 200.0, Direction::Out, 0.0, "supplier_payment", "B"));
        for name in ["C", "D", "E", "F", "G"] {
            ledger.push(create_test_transaction(2, 50.0, Direction::Out, 0.0, "utilities", name));
        }
        // inflows never count toward vendor spend
        ledger.push(create_test_transaction(3, 10_000.0, Direction::In, 0.0, "customer_payment", "Z"));

        let f = compute_features(&ledger, &[], None);

        assert_close(f.top_vendor_share, 500.0 / 950.0);
        assert_close(f.top_5_vendors_share, (500.0 + 200.0 + 150.0) / 950.0);
    }

    #[test]
    fn test_concentration_zero_without_outflows() {
        let ledger = vec![create_test_transaction(0, 10.0, Direction::In, 10.0, "customer_payment", "C1")];
        let f = compute_features(&ledger, &[], None);
        assert_eq!(f.top_vendor_share, 0.0);
        assert_eq!(f.top_5_vendors_share, 0.0);
    }

    #[test]
    fn test_coverage_features() {
        let ledger = vec![
            create_test_transaction(0, 400.0, Direction::Out, 0.0, "loan_repayment", "Lender"),
            create_test_transaction(1, 100.0, Direction::Out, 0.0, "loan_repayment", "Lender"),
        ];
        let pnl = vec![
            MonthlyFinancial::new(month(1), 1000.0, 300.0, 200.0),
            MonthlyFinancial::new(month(2), 2000.0, 600.0, 400.0),
            MonthlyFinancial::new(month(3), 3000.0, 900.0, 600.0),
        ];

        let f = compute_features(&ledger, &pnl, None);

        // nocf 500 + 1000 + 1500 = 3000 over 500 of repayments
        assert_close(f.dscr_proxy, 6.0);
        assert_close(f.annualized_revenue, 6000.0 * 4.0);
    }

    #[test]
    fn test_dscr_zero_without_repayments() {
        let pnl = vec![MonthlyFinancial::new(month(1), 1000.0, 300.0, 200.0)];
        let f = compute_features(&[], &pnl, None);
        assert_eq!(f.dscr_proxy, 0.0);
        assert_close(f.annualized_revenue, 12_000.0);
    }

    #[test]
    fn test_empty_inputs_give_all_zero_features() {
        let f = compute_features(&[], &[], None);
        assert_eq!(f, FeatureSet::default());
    }

    #[test]
    fn test_sanitize_only_touches_non_finite() {
        let raw = FeatureSet {
            average_daily_balance: f64::NAN,
            dscr_proxy: f64::INFINITY,
            days_cash_on_hand: 12.5,
            nsf_count: 3,
            ..FeatureSet::default()
        };

        let clean = raw.sanitize();

        assert_eq!(clean.average_daily_balance, 0.0);
        assert_eq!(clean.dscr_proxy, 0.0);
        assert_eq!(clean.days_cash_on_hand, 12.5);
        assert_eq!(clean.nsf_count, 3);
    }

    #[test]
    fn test_feature_names_serialize_as_schema() {
        let json = serde_json::to_value(FeatureSet::default()).unwrap();
        let object = json.as_object().unwrap();

        assert_eq!(object.len(), FeatureSet::NAMES.len());
        for name in FeatureSet::NAMES {
            assert!(object.contains_key(name), "missing {}", name);
        }
        assert_eq!(FeatureSet::default().get("3_month_slope"), Some(0.0));
        assert_eq!(FeatureSet::default().get("unknown"), None);
    }

    #[test]
    fn test_compute_is_deterministic() {
        let ledger = vec![
            create_test_transaction(0, 100.0, Direction::In, 100.0, "customer_payment", "C1"),
            create_test_transaction(9, 40.0, Direction::Out, 60.0, "rent", "Landlord"),
        ];
        let pnl = vec![
            MonthlyFinancial::new(month(1), 1000.0, 300.0, 200.0),
            MonthlyFinancial::new(month(2), 1100.0, 300.0, 200.0),
        ];

        let first = compute_features(&ledger, &pnl, None);
        let second = compute_features(&ledger, &pnl, None);

        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }
}
