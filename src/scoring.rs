// 🎯 Scoring Engine - Feature set → scorecard
// Sub-scores → composite → grade → eligible capital → expected loss → reason codes
//
// Pure: no I/O, no state. All tables come from `ScoringPolicy`.

use crate::features::FeatureSet;
use crate::policy::{Grade, ScoringPolicy};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Days of cash that earn a full liquidity score
const FULL_LIQUIDITY_DAYS: f64 = 30.0;
/// Discipline points lost per NSF event
const NSF_PENALTY_POINTS: f64 = 20.0;
/// Top-vendor share where the concentration score starts to drop
const CONCENTRATION_BASELINE: f64 = 0.2;
/// Concentration points lost per unit of share above the baseline
const CONCENTRATION_SLOPE: f64 = 200.0;
/// Sub-score used when a variability feature is unavailable
const NEUTRAL_SCORE: f64 = 50.0;
/// At most this many reason codes are reported
const MAX_REASON_CODES: usize = 3;

fn clip(value: f64) -> f64 {
    value.clamp(0.0, 100.0)
}

// ============================================================================
// REASON CODES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonCode {
    // Negative drivers, in priority order
    LowLiq,
    RevVar,
    HighConc,
    NsfEvents,
    LowDscr,
    NegativeCashflow,

    // Positive drivers, in priority order
    RevStable,
    CashBuffer,
    NoNsf,
    ConsistentCashflow,
    DiversifiedVendors,
}

impl ReasonCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonCode::LowLiq => "LOW_LIQ",
            ReasonCode::RevVar => "REV_VAR",
            ReasonCode::HighConc => "HIGH_CONC",
            ReasonCode::NsfEvents => "NSF_EVENTS",
            ReasonCode::LowDscr => "LOW_DSCR",
            ReasonCode::NegativeCashflow => "NEGATIVE_CASHFLOW",
            ReasonCode::RevStable => "REV_STABLE",
            ReasonCode::CashBuffer => "CASH_BUFFER",
            ReasonCode::NoNsf => "NO_NSF",
            ReasonCode::ConsistentCashflow => "CONSISTENT_CASHFLOW",
            ReasonCode::DiversifiedVendors => "DIVERSIFIED_VENDORS",
        }
    }

    pub fn is_negative(&self) -> bool {
        matches!(
            self,
            ReasonCode::LowLiq
                | ReasonCode::RevVar
                | ReasonCode::HighConc
                | ReasonCode::NsfEvents
                | ReasonCode::LowDscr
                | ReasonCode::NegativeCashflow
        )
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SCORECARD
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SubScores {
    pub liquidity: f64,
    pub cash_flow: f64,
    pub discipline: f64,
    pub stability: f64,
    pub concentration: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scorecard {
    /// Weighted composite; not re-clamped
    pub score: f64,
    pub grade: Grade,
    pub eligible_capital: f64,
    pub expected_loss_annualized: f64,
    /// At most three, negative drivers first
    pub reason_codes: Vec<ReasonCode>,
    pub sub_scores: SubScores,
}

impl Scorecard {
    pub fn summary(&self) -> String {
        format!(
            "Score {:.1}, grade {}, eligible capital {:.2}, annual ECL {:.2}, reasons [{}]",
            self.score,
            self.grade,
            self.eligible_capital,
            self.expected_loss_annualized,
            self.reason_codes
                .iter()
                .map(ReasonCode::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        )
    }
}

// ============================================================================
// SCORING ENGINE
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct ScoringEngine {
    policy: ScoringPolicy,
}

impl ScoringEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: ScoringPolicy) -> Self {
        ScoringEngine { policy }
    }

    pub fn policy(&self) -> &ScoringPolicy {
        &self.policy
    }

    pub fn calculate(&self, features: &FeatureSet) -> Scorecard {
        let sub_scores = self.sub_scores(features);
        let score = self.composite(&sub_scores);
        let grade = self.policy.grade_cutoffs.grade_for(score);
        let eligible_capital = self.eligible_capital(features, grade);
        let expected_loss_annualized = self.expected_loss(features, grade, eligible_capital);
        let reason_codes = self.reason_codes(features);

        Scorecard {
            score,
            grade,
            eligible_capital,
            expected_loss_annualized,
            reason_codes,
            sub_scores,
        }
    }

    /// Step 1: five sub-scores, each in [0, 100]
    pub fn sub_scores(&self, f: &FeatureSet) -> SubScores {
        let liquidity = clip(f.days_cash_on_hand / FULL_LIQUIDITY_DAYS * 100.0);

        let cash_flow = if f.median_monthly_nocf < 0.0 {
            0.0
        } else {
            variability_score(f.weekly_net_cashflow_variability)
        };

        let stability = variability_score(f.mom_revenue_variability);

        let discipline = 100.0 - clip(f64::from(f.nsf_count) * NSF_PENALTY_POINTS);

        let concentration =
            100.0 - clip((f.top_vendor_share - CONCENTRATION_BASELINE) * CONCENTRATION_SLOPE);

        SubScores {
            liquidity,
            cash_flow,
            discipline,
            stability,
            concentration,
        }
    }

    /// Step 2: weighted sum of the sub-scores
    pub fn composite(&self, s: &SubScores) -> f64 {
        let w = &self.policy.weights;
        s.liquidity * w.liquidity
            + s.cash_flow * w.cash_flow
            + s.discipline * w.discipline
            + s.stability * w.stability
            + s.concentration * w.concentration
    }

    /// Step 4: capital sized on median NOCF, discounted for risk, capped by
    /// revenue, floored for prime grades
    pub fn eligible_capital(&self, f: &FeatureSet, grade: Grade) -> f64 {
        let p = &self.policy;

        let base_capital = (f.median_monthly_nocf * p.capital_multiples.get(grade)).max(0.0);

        // Zero variability reads as "not measured", same as NaN
        let variability = if f.weekly_net_cashflow_variability.is_finite()
            && f.weekly_net_cashflow_variability != 0.0
        {
            f.weekly_net_cashflow_variability
        } else {
            p.fallback_variability
        };
        let volatility_discount = (1.0 - variability).max(p.volatility_floor);

        let liquidity_guard = if f.days_cash_on_hand < p.liquidity_guard_days {
            p.liquidity_guard_factor
        } else {
            1.0
        };
        let discipline_penalty = if f.nsf_count >= p.nsf_penalty_count {
            p.nsf_penalty_factor
        } else {
            1.0
        };
        let concentration_penalty = if f.top_vendor_share > p.concentration_penalty_share {
            p.concentration_penalty_factor
        } else {
            1.0
        };

        let adjusted_capital = base_capital
            * volatility_discount
            * liquidity_guard
            * discipline_penalty
            * concentration_penalty;

        let revenue_cap = p.revenue_cap_ratio * f.annualized_revenue;
        let eligible = adjusted_capital.min(revenue_cap);

        if grade.is_prime() {
            eligible.max(p.prime_capital_floor)
        } else {
            eligible
        }
    }

    /// Step 5: PD × LGD × EAD
    pub fn expected_loss(&self, f: &FeatureSet, grade: Grade, eligible_capital: f64) -> f64 {
        let p = &self.policy;

        let lgd = if f.nsf_count == 0 && f.percent_of_days_below_zero == 0.0 {
            p.lgd_clean
        } else {
            p.lgd_impaired
        };
        let ead = p.exposure_factor * eligible_capital;

        p.probability_of_default.get(grade) * lgd * ead
    }

    /// Step 6: negative drivers win outright; positive drivers only when
    /// nothing negative fired
    pub fn reason_codes(&self, f: &FeatureSet) -> Vec<ReasonCode> {
        let t = &self.policy.reasons;

        let negative = [
            (f.days_cash_on_hand < t.cash_buffer_days, ReasonCode::LowLiq),
            (f.mom_revenue_variability > t.revenue_variability_high, ReasonCode::RevVar),
            (f.top_vendor_share > t.high_concentration_share, ReasonCode::HighConc),
            (f.nsf_count >= t.nsf_events, ReasonCode::NsfEvents),
            (f.dscr_proxy < t.min_dscr, ReasonCode::LowDscr),
            (f.median_monthly_nocf < 0.0, ReasonCode::NegativeCashflow),
        ];
        let positive = [
            (f.mom_revenue_variability < t.revenue_variability_low, ReasonCode::RevStable),
            (f.days_cash_on_hand >= t.cash_buffer_days, ReasonCode::CashBuffer),
            (f.nsf_count == 0, ReasonCode::NoNsf),
            (
                f.weekly_net_cashflow_variability < t.consistent_cashflow_variability,
                ReasonCode::ConsistentCashflow,
            ),
            (f.top_vendor_share < t.diversified_share, ReasonCode::DiversifiedVendors),
        ];

        let fired = |triggers: &[(bool, ReasonCode)]| -> Vec<ReasonCode> {
            triggers
                .iter()
                .filter(|(hit, _)| *hit)
                .map(|(_, code)| *code)
                .collect()
        };

        let mut reasons = fired(&negative);
        if reasons.is_empty() {
            reasons = fired(&positive);
        }
        reasons.truncate(MAX_REASON_CODES);
        reasons
    }
}

/// `(1 - variability) * 100` clipped, or neutral when unavailable
fn variability_score(variability: f64) -> f64 {
    if variability.is_finite() {
        clip((1.0 - variability) * 100.0)
    } else {
        NEUTRAL_SCORE
    }
}

/// Score with the default policy
pub fn calculate_scorecard(features: &FeatureSet) -> Scorecard {
    ScoringEngine::new().calculate(features)
}

// ============================================================================
// TESTS
// ============================================================================
