// 📈 Ledger Series - Pure derivations over the bank ledger
// Daily closing balances, daily net flow, weekly net cash flow
//
// The caller's records are never touched: every series is a fresh view.
// Dates come out sorted; rows sharing a date keep their original order,
// so "closing balance" is the balance on the LAST row of that date.

use crate::records::BankTransaction;
use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;
use std::collections::BTreeMap;

// ============================================================================
// DAILY SUMMARY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailySummary {
    pub date: NaiveDate,
    /// Sum of signed amounts booked that day (missing amounts skipped)
    pub net_change: f64,
    pub closing_balance: f64,
}

/// One entry per distinct date, ascending
pub fn daily_summary(transactions: &[BankTransaction]) -> Vec<DailySummary> {
    let mut days: BTreeMap<NaiveDate, (f64, f64)> = BTreeMap::new();

    for tx in transactions {
        let entry = days.entry(tx.date).or_insert((0.0, tx.balance));
        if let Some(signed) = tx.signed_amount() {
            entry.0 += signed;
        }
        entry.1 = tx.balance;
    }

    days.into_iter()
        .map(|(date, (net_change, closing_balance))| DailySummary {
            date,
            net_change,
            closing_balance,
        })
        .collect()
}

/// Closing balance per distinct date, ascending
pub fn daily_closing_balance(transactions: &[BankTransaction]) -> Vec<(NaiveDate, f64)> {
    daily_summary(transactions)
        .into_iter()
        .map(|day| (day.date, day.closing_balance))
        .collect()
}

/// Distinct transaction dates, ascending
pub fn distinct_dates(transactions: &[BankTransaction]) -> Vec<NaiveDate> {
    let mut dates: Vec<NaiveDate> = transactions.iter().map(|tx| tx.date).collect();
    dates.sort();
    dates.dedup();
    dates
}

// ============================================================================
// WEEKLY NET CASH FLOW
// ============================================================================

/// The Sunday closing the calendar week that contains `date`
pub fn week_ending(date: NaiveDate) -> NaiveDate {
    let days_to_sunday = 6 - date.weekday().num_days_from_monday() as i64;
    date + Duration::days(days_to_sunday)
}

/// Net signed flow per Sunday-ending week. Weeks between the first and last
/// active week with no transactions are present with a 0 total.
pub fn weekly_net_cashflow(transactions: &[BankTransaction]) -> Vec<(NaiveDate, f64)> {
    let mut weeks: BTreeMap<NaiveDate, f64> = BTreeMap::new();

    for tx in transactions {
        let total = weeks.entry(week_ending(tx.date)).or_insert(0.0);
        if let Some(signed) = tx.signed_amount() {
            *total += signed;
        }
    }

    let (first, last) = match (weeks.keys().next(), weeks.keys().next_back()) {
        (Some(first), Some(last)) => (*first, *last),
        _ => return Vec::new(),
    };

    let mut series = Vec::new();
    let mut week = first;
    while week <= last {
        series.push((week, weeks.get(&week).copied().unwrap_or(0.0)));
        week = week + Duration::days(7);
    }
    series
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::Direction;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn create_test_transaction(d: NaiveDate, amount: f64, dir: Direction, balance: f64) -> BankTransaction {
        BankTransaction::new(d, amount, dir, balance)
    }

    #[test]
    fn test_daily_summary_uses_last_balance_and_sorts() {
        let txs = vec![
            create_test_transaction(date(2025, 1, 2), 50.0, Direction::Out, 1050.0),
            create_test_transaction(date(2025, 1, 1), 100.0, Direction::In, 1100.0),
            create_test_transaction(date(2025, 1, 2), 25.0, Direction::In, 1075.0),
        ];

        let days = daily_summary(&txs);

        assert_eq!(days.len(), 2);
        assert_eq!(days[0].date, date(2025, 1, 1));
        assert_eq!(days[0].net_change, 100.0);
        assert_eq!(days[1].net_change, -25.0);
        assert_eq!(days[1].closing_balance, 1075.0);
    }

    #[test]
    fn test_week_ending_is_sunday() {
        // 2025-01-06 is a Monday
        assert_eq!(week_ending(date(2025, 1, 6)), date(2025, 1, 12));
        assert_eq!(week_ending(date(2025, 1, 12)), date(2025, 1, 12));
        assert_eq!(week_ending(date(2025, 1, 13)), date(2025, 1, 19));
    }

    #[test]
    fn test_weekly_series_fills_empty_weeks() {
        let txs = vec![
            create_test_transaction(date(2025, 1, 6), 100.0, Direction::In, 100.0),
            create_test_transaction(date(2025, 1, 7), 30.0, Direction::Out, 70.0),
            create_test_transaction(date(2025, 1, 21), 10.0, Direction::In, 80.0),
        ];

        let weeks = weekly_net_cashflow(&txs);

        assert_eq!(
            weeks,
            vec![
                (date(2025, 1, 12), 70.0),
                (date(2025, 1, 19), 0.0),
                (date(2025, 1, 26), 10.0),
            ]
        );
    }

    #[test]
    fn test_empty_ledger_series() {
        assert!(daily_summary(&[]).is_empty());
        assert!(weekly_net_cashflow(&[]).is_empty());
        assert!(distinct_dates(&[]).is_empty());
    }
}
