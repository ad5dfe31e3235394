// 📏 Policy Tables - Weights, ladders and tolerances as data
// Every number the validator and the scoring engine depend on lives here.
//
// Defaults are the production calibration. A JSON file may override any subset
// of fields; whatever it leaves out keeps the default.

use anyhow::{bail, Context as AnyhowContext, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;

// ============================================================================
// GRADE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    E,
}

impl Grade {
    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::E => "E",
        }
    }

    /// A and B are the grades that earn the minimum-capital floor
    pub fn is_prime(&self) -> bool {
        matches!(self, Grade::A | Grade::B)
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One value per grade
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GradeTable {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
}

/// Partial table from a calibration file; missing grades keep their default
#[derive(Debug, Default, Deserialize)]
struct GradeTableOverride {
    a: Option<f64>,
    b: Option<f64>,
    c: Option<f64>,
    d: Option<f64>,
    e: Option<f64>,
}

impl GradeTable {
    /// Months of median NOCF lent per grade
    pub fn capital_multiples() -> Self {
        GradeTable {
            a: 4.0,
            b: 3.0,
            c: 2.0,
            d: 1.0,
            e: 0.0,
        }
    }

    /// Annual probability of default per grade
    pub fn probability_of_default() -> Self {
        GradeTable {
            a: 0.015,
            b: 0.03,
            c: 0.06,
            d: 0.12,
            e: 0.25,
        }
    }

    fn overlay(self, o: GradeTableOverride) -> Self {
        GradeTable {
            a: o.a.unwrap_or(self.a),
            b: o.b.unwrap_or(self.b),
            c: o.c.unwrap_or(self.c),
            d: o.d.unwrap_or(self.d),
            e: o.e.unwrap_or(self.e),
        }
    }

    pub fn get(&self, grade: Grade) -> f64 {
        match grade {
            Grade::A => self.a,
            Grade::B => self.b,
            Grade::C => self.c,
            Grade::D => self.d,
            Grade::E => self.e,
        }
    }
}

// ============================================================================
// SCORING TABLES
// ============================================================================

/// Composite weights; they sum to 1.0
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub liquidity: f64,
    pub cash_flow: f64,
    pub discipline: f64,
    pub stability: f64,
    pub concentration: f64,
}

impl ScoreWeights {
    pub fn total(&self) -> f64 {
        self.liquidity + self.cash_flow + self.discipline + self.stability + self.concentration
    }
}

impl Default for ScoreWeights {
    fn default() -> Self {
        ScoreWeights {
            liquidity: 0.25,
            cash_flow: 0.35,
            discipline: 0.20,
            stability: 0.10,
            concentration: 0.10,
        }
    }
}

/// Lower bound (inclusive) of each grade tier. Below `d` is E.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GradeCutoffs {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
}

impl GradeCutoffs {
    pub fn is_descending(&self) -> bool {
        self.a > self.b && self.b > self.c && self.c > self.d
    }

    /// Descending ladder: first tier whose lower bound the score reaches
    pub fn grade_for(&self, score: f64) -> Grade {
        if score >= self.a {
            Grade::A
        } else if score >= self.b {
            Grade::B
        } else if score >= self.c {
            Grade::C
        } else if score >= self.d {
            Grade::D
        } else {
            Grade::E
        }
    }
}

impl Default for GradeCutoffs {
    fn default() -> Self {
        GradeCutoffs {
            a: 80.0,
            b: 70.0,
            c: 60.0,
            d: 45.0,
        }
    }
}

/// Thresholds that fire reason codes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReasonThresholds {
    /// LOW_LIQ below, CASH_BUFFER at or above
    pub cash_buffer_days: f64,
    /// REV_VAR above
    pub revenue_variability_high: f64,
    /// REV_STABLE below
    pub revenue_variability_low: f64,
    /// HIGH_CONC above
    pub high_concentration_share: f64,
    /// DIVERSIFIED_VENDORS below
    pub diversified_share: f64,
    /// NSF_EVENTS at or above
    pub nsf_events: u32,
    /// LOW_DSCR below
    pub min_dscr: f64,
    /// CONSISTENT_CASHFLOW below
    pub consistent_cashflow_variability: f64,
}

impl Default for ReasonThresholds {
    fn default() -> Self {
        ReasonThresholds {
            cash_buffer_days: 15.0,
            revenue_variability_high: 0.3,
            revenue_variability_low: 0.1,
            high_concentration_share: 0.35,
            diversified_share: 0.2,
            nsf_events: 2,
            min_dscr: 1.25,
            consistent_cashflow_variability: 0.3,
        }
    }
}

/// Full scoring calibration: sub-score weights, grade ladder, capital sizing,
/// expected-loss tables and reason-code triggers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringPolicy {
    pub weights: ScoreWeights,
    pub grade_cutoffs: GradeCutoffs,

    /// Months of median NOCF lent per grade
    #[serde(deserialize_with = "capital_multiples_overlay")]
    pub capital_multiples: GradeTable,
    /// Floor on the volatility discount
    pub volatility_floor: f64,
    /// Variability assumed when the feature is missing or zero
    pub fallback_variability: f64,
    pub liquidity_guard_days: f64,
    pub liquidity_guard_factor: f64,
    pub nsf_penalty_count: u32,
    pub nsf_penalty_factor: f64,
    pub concentration_penalty_share: f64,
    pub concentration_penalty_factor: f64,
    /// Share of annualized revenue that caps eligible capital
    pub revenue_cap_ratio: f64,
    /// Floor applied to prime grades (A, B)
    pub prime_capital_floor: f64,

    #[serde(deserialize_with = "probability_of_default_overlay")]
    pub probability_of_default: GradeTable,
    /// LGD for a clean ledger (no NSF, never below zero)
    pub lgd_clean: f64,
    pub lgd_impaired: f64,
    /// EAD as a share of eligible capital
    pub exposure_factor: f64,

    pub reasons: ReasonThresholds,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        ScoringPolicy {
            weights: ScoreWeights::default(),
            grade_cutoffs: GradeCutoffs::default(),
            capital_multiples: GradeTable::capital_multiples(),
            volatility_floor: 0.6,
            fallback_variability: 0.5,
            liquidity_guard_days: 15.0,
            liquidity_guard_factor: 0.5,
            nsf_penalty_count: 2,
            nsf_penalty_factor: 0.8,
            concentration_penalty_share: 0.35,
            concentration_penalty_factor: 0.85,
            revenue_cap_ratio: 0.15,
            prime_capital_floor: 5000.0,
            probability_of_default: GradeTable::probability_of_default(),
            lgd_clean: 0.35,
            lgd_impaired: 0.45,
            exposure_factor: 0.70,
            reasons: ReasonThresholds::default(),
        }
    }
}

impl ScoringPolicy {
    /// Load a calibration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read policy file: {:?}", path.as_ref()))?;

        let policy: ScoringPolicy =
            serde_json::from_str(&content).context("Failed to parse policy JSON")?;

        policy
            .check()
            .with_context(|| format!("Invalid policy file: {:?}", path.as_ref()))?;

        Ok(policy)
    }

    /// Weights must sum to 1 and the grade ladder must strictly descend,
    /// otherwise the composite leaves [0, 100] or grades overlap
    pub fn check(&self) -> Result<()> {
        let total = self.weights.total();
        if (total - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            bail!("score weights sum to {}, expected 1.0", total);
        }
        if !self.grade_cutoffs.is_descending() {
            bail!(
                "grade cutoffs must strictly descend (a > b > c > d), got {:?}",
                self.grade_cutoffs
            );
        }
        Ok(())
    }
}

const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;

fn capital_multiples_overlay<'de, D>(deserializer: D) -> Result<GradeTable, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let o = GradeTableOverride::deserialize(deserializer)?;
    Ok(GradeTable::capital_multiples().overlay(o))
}

fn probability_of_default_overlay<'de, D>(deserializer: D) -> Result<GradeTable, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let o = GradeTableOverride::deserialize(deserializer)?;
    Ok(GradeTable::probability_of_default().overlay(o))
}

// ============================================================================
// VALIDATION TOLERANCES
// ============================================================================

/// Balance continuity uses `|actual - expected| <= abs + rel * |expected|`.
/// The absolute part absorbs cent rounding on the recorded balance; the
/// relative part absorbs float error on large balances.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationPolicy {
    pub balance_abs_tolerance: f64,
    pub balance_rel_tolerance: f64,
    /// Minimum share of transactions that must carry a category
    pub min_category_coverage: f64,
    /// Largest allowed step between consecutive distinct dates
    pub max_date_gap_days: i64,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        ValidationPolicy {
            balance_abs_tolerance: 0.02,
            balance_rel_tolerance: 1e-5,
            min_category_coverage: 0.95,
            max_date_gap_days: 1,
        }
    }
}

impl ValidationPolicy {
    pub fn balances_match(&self, actual: f64, expected: f64) -> bool {
        (actual - expected).abs() <= self.balance_abs_tolerance + self.balance_rel_tolerance * expected.abs()
    }
}

// ============================================================================
// TESTS
// ============================================================================
