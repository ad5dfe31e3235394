// 🚦 Key Metrics - Pass/Watch flags for the credit memo
// Headline features with a display string and a traffic-light status

use crate::features::FeatureSet;
use crate::scoring::Scorecard;
use serde::{Deserialize, Serialize};
use std::fmt;

const MIN_DAYS_CASH_ON_HAND: f64 = 15.0;
const MAX_WEEKLY_NCF_VARIABILITY: f64 = 0.3;
const MAX_NSF_COUNT: u32 = 2;
const MAX_VENDOR_LATE_PERCENT: f64 = 35.0;
const MIN_DSCR: f64 = 1.25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlagStatus {
    Pass,
    Watch,
}

impl FlagStatus {
    fn from_ok(ok: bool) -> Self {
        if ok {
            FlagStatus::Pass
        } else {
            FlagStatus::Watch
        }
    }
}

impl fmt::Display for FlagStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlagStatus::Pass => f.write_str("Pass"),
            FlagStatus::Watch => f.write_str("Watch"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyMetric {
    pub metric: String,
    pub value: f64,
    pub display: String,
    pub status: FlagStatus,
}

impl KeyMetric {
    fn new(metric: &str, value: f64, display: String, status: FlagStatus) -> Self {
        KeyMetric {
            metric: metric.to_string(),
            value,
            display,
            status,
        }
    }
}

/// Key-metric table in memo order
pub fn key_metrics(f: &FeatureSet) -> Vec<KeyMetric> {
    vec![
        KeyMetric::new(
            "Avg Daily Balance",
            f.average_daily_balance,
            format_currency(f.average_daily_balance),
            FlagStatus::Pass,
        ),
        KeyMetric::new(
            "Days Cash on Hand",
            f.days_cash_on_hand,
            format!("{:.1}", f.days_cash_on_hand),
            FlagStatus::from_ok(f.days_cash_on_hand >= MIN_DAYS_CASH_ON_HAND),
        ),
        KeyMetric::new(
            "Median Monthly NOCF",
            f.median_monthly_nocf,
            format_currency(f.median_monthly_nocf),
            FlagStatus::Pass,
        ),
        KeyMetric::new(
            "Weekly NCF Variability",
            f.weekly_net_cashflow_variability,
            format!("{:.2}", f.weekly_net_cashflow_variability),
            FlagStatus::from_ok(f.weekly_net_cashflow_variability < MAX_WEEKLY_NCF_VARIABILITY),
        ),
        KeyMetric::new(
            "NSF Count",
            f64::from(f.nsf_count),
            f.nsf_count.to_string(),
            FlagStatus::from_ok(f.nsf_count < MAX_NSF_COUNT),
        ),
        KeyMetric::new(
            "Returned ACH Count",
            f64::from(f.returned_ach_count),
            f.returned_ach_count.to_string(),
            FlagStatus::from_ok(f.returned_ach_count == 0),
        ),
        KeyMetric::new(
            "Vendor Late Proxy (%)",
            f.vendor_late_proxy,
            format!("{:.1}%", f.vendor_late_proxy),
            FlagStatus::from_ok(f.vendor_late_proxy < MAX_VENDOR_LATE_PERCENT),
        ),
        KeyMetric::new(
            "DSCR Proxy",
            f.dscr_proxy,
            format!("{:.2}x", f.dscr_proxy),
            FlagStatus::from_ok(f.dscr_proxy >= MIN_DSCR),
        ),
    ]
}

/// `Score: 82 | Grade: A | Eligible Capital: $480,000 | Annual ECL: $1,764`
pub fn summary_line(card: &Scorecard) -> String {
    format!(
        "Score: {:.0} | Grade: {} | Eligible Capital: {} | Annual ECL: {}",
        card.score,
        card.grade,
        format_currency(card.eligible_capital),
        format_currency(card.expected_loss_annualized)
    )
}

/// Whole dollars with thousands separators: `$1,234,567`
pub fn format_currency(amount: f64) -> String {
    let rounded = format!("{:.0}", amount.abs());
    let mut grouped = String::with_capacity(rounded.len() + rounded.len() / 3);
    for (i, digit) in rounded.chars().enumerate() {
        if i > 0 && (rounded.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    if amount < 0.0 && rounded != "0" {
        format!("$-{}", grouped)
    } else {
        format!("${}", grouped)
    }
}
