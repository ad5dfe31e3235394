// Credit Scorecard - Core Library
// Validation → feature engineering → scoring for small-business bank data.
// Exposes all modules for use in the CLI and tests.

pub mod records;    // Typed bank / P&L / vendor rows
pub mod loader;     // CSV → records
pub mod policy;     // Weights, cutoffs, tables, tolerances
pub mod stats;      // Small numeric helpers
pub mod series;     // Daily and weekly series over the ledger
pub mod validation; // Data Validator
pub mod features;   // Feature Engine
pub mod scoring;    // Scoring Engine
pub mod flags;      // Key-metric Pass/Watch flags
pub mod pipeline;   // Per-window orchestration

// Re-export commonly used types
pub use records::{
    BankTransaction, Direction, MonthlyFinancial, VendorRecord, VendorRoster, WindowInput,
};
pub use loader::{load_window, LoadError, WindowFiles};
pub use policy::{Grade, ScoringPolicy, ValidationPolicy};
pub use validation::{validate, CheckValue, Checks, DataValidator, ValidationReport};
pub use features::{compute_features, FeatureSet};
pub use scoring::{calculate_scorecard, ReasonCode, Scorecard, ScoringEngine, SubScores};
pub use flags::{key_metrics, summary_line, FlagStatus, KeyMetric};
pub use pipeline::{
    BusinessAssessment, Pipeline, PipelineError, Window, WindowResult, WindowScore, WindowSource,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
