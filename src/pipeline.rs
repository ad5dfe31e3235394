// 🔗 Scorecard Pipeline - Validate → features → score, per window
// Runs the trailing 3-month and 6-month windows of one business independently.
//
// A window ends in exactly one of three shapes:
//   - scored:            { scorecard, features, key_metrics, summary }
//   - validation failed: { error: "Data validation failed", details: {...checks} }
//   - failed:            { error: "..." }  (unreadable files or an internal fault)
//
// One window's failure never touches the other's result.

use crate::features::{compute_features, FeatureSet};
use crate::flags::{self, KeyMetric};
use crate::loader::{self, WindowFiles};
use crate::records::WindowInput;
use crate::scoring::{Scorecard, ScoringEngine};
use crate::validation::{Checks, DataValidator, ValidationReport};
use anyhow::{bail, Result};
use serde::Serialize;
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::thread;
use thiserror::Error;
use uuid::Uuid;

// ============================================================================
// WINDOWS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Window {
    #[serde(rename = "3m")]
    ThreeMonth,
    #[serde(rename = "6m")]
    SixMonth,
}

impl Window {
    pub const ALL: [Window; 2] = [Window::ThreeMonth, Window::SixMonth];

    pub fn label(&self) -> &'static str {
        match self {
            Window::ThreeMonth => "3m",
            Window::SixMonth => "6m",
        }
    }

    /// Sub-directory holding this window's files in a business directory
    pub fn dir_name(&self) -> &'static str {
        match self {
            Window::ThreeMonth => "trailing_3m",
            Window::SixMonth => "trailing_6m",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "3m" | "trailing_3m" => Some(Window::ThreeMonth),
            "6m" | "trailing_6m" => Some(Window::SixMonth),
            _ => None,
        }
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// RESULTS
// ============================================================================

pub const VALIDATION_FAILED: &str = "Data validation failed";

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{0}")]
    Unreadable(String),

    #[error("Data validation failed")]
    ValidationFailed(Checks),

    #[error("Error processing {window} data: {detail}")]
    Processing { window: Window, detail: String },
}

/// Successful outcome for one window
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowScore {
    pub scorecard: Scorecard,
    pub features: FeatureSet,
    pub key_metrics: Vec<KeyMetric>,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum WindowResult {
    Scored(WindowScore),
    ValidationFailed { error: String, details: Checks },
    Failed { error: String },
}

impl WindowResult {
    pub fn is_scored(&self) -> bool {
        matches!(self, WindowResult::Scored(_))
    }

    pub fn score(&self) -> Option<&WindowScore> {
        match self {
            WindowResult::Scored(score) => Some(score),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            WindowResult::Scored(_) => None,
            WindowResult::ValidationFailed { error, .. } | WindowResult::Failed { error } => {
                Some(error)
            }
        }
    }
}

impl From<Result<WindowScore, PipelineError>> for WindowResult {
    fn from(outcome: Result<WindowScore, PipelineError>) -> Self {
        match outcome {
            Ok(score) => WindowResult::Scored(score),
            Err(PipelineError::ValidationFailed(details)) => WindowResult::ValidationFailed {
                error: VALIDATION_FAILED.to_string(),
                details,
            },
            Err(e) => WindowResult::Failed {
                error: e.to_string(),
            },
        }
    }
}

/// Every window result for one business, keyed by window label
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BusinessAssessment {
    pub business_name: String,
    pub run_id: Uuid,
    pub windows: BTreeMap<String, WindowResult>,
}

impl BusinessAssessment {
    pub fn window(&self, window: Window) -> Option<&WindowResult> {
        self.windows.get(window.label())
    }

    pub fn scored_count(&self) -> usize {
        self.windows.values().filter(|r| r.is_scored()).count()
    }
}

/// Where a window's records come from
#[derive(Debug, Clone)]
pub enum WindowSource {
    Files(WindowFiles),
    Records(WindowInput),
}

// ============================================================================
// PIPELINE
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    validator: DataValidator,
    scorer: ScoringEngine,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder pattern: custom validator
    pub fn with_validator(mut self, validator: DataValidator) -> Self {
        self.validator = validator;
        self
    }

    /// Builder pattern: custom scoring engine
    pub fn with_scorer(mut self, scorer: ScoringEngine) -> Self {
        self.scorer = scorer;
        self
    }

    pub fn validator(&self) -> &DataValidator {
        &self.validator
    }

    pub fn scorer(&self) -> &ScoringEngine {
        &self.scorer
    }

    /// Run one window end to end
    pub fn assess_window(&self, business: &str, window: Window, source: &WindowSource) -> WindowResult {
        self.assess_window_in_run(Uuid::new_v4(), business, window, source)
    }

    /// Run several windows on their own threads and collect results by label
    pub fn assess_windows(
        &self,
        business: &str,
        sources: &[(Window, WindowSource)],
    ) -> BusinessAssessment {
        let run_id = Uuid::new_v4();

        let windows: BTreeMap<String, WindowResult> = thread::scope(|scope| {
            let handles: Vec<_> = sources
                .iter()
                .map(|(window, source)| {
                    let handle = scope
                        .spawn(move || self.assess_window_in_run(run_id, business, *window, source));
                    (*window, handle)
                })
                .collect();

            handles
                .into_iter()
                .map(|(window, handle)| {
                    let result = handle.join().unwrap_or_else(|payload| {
                        processing_failure(window, panic_message(payload.as_ref()))
                    });
                    (window.label().to_string(), result)
                })
                .collect()
        });

        BusinessAssessment {
            business_name: business.to_string(),
            run_id,
            windows,
        }
    }

    /// Assess a business directory laid out as `<dir>/trailing_3m/*.csv` and
    /// `<dir>/trailing_6m/*.csv`. The directory name is the business name.
    pub fn assess_business_dir(&self, dir: &Path) -> Result<BusinessAssessment> {
        let business = dir
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| dir.display().to_string());

        let sources: Vec<(Window, WindowSource)> = Window::ALL
            .iter()
            .filter_map(|window| {
                let window_dir = dir.join(window.dir_name());
                window_dir
                    .is_dir()
                    .then(|| (*window, WindowSource::Files(WindowFiles::in_dir(&window_dir))))
            })
            .collect();

        if sources.is_empty() {
            bail!(
                "No window directories ({}, {}) found in {}",
                Window::ThreeMonth.dir_name(),
                Window::SixMonth.dir_name(),
                dir.display()
            );
        }

        Ok(self.assess_windows(&business, &sources))
    }

    fn assess_window_in_run(
        &self,
        run_id: Uuid,
        business: &str,
        window: Window,
        source: &WindowSource,
    ) -> WindowResult {
        let span = tracing::info_span!(
            "assess_window",
            %run_id,
            business = %business,
            window = window.label()
        );
        let _enter = span.enter();

        let outcome = self.run(window, source);
        match &outcome {
            Ok(score) => tracing::info!(
                score = score.scorecard.score,
                grade = score.scorecard.grade.as_str(),
                eligible_capital = score.scorecard.eligible_capital,
                "window scored"
            ),
            Err(PipelineError::ValidationFailed(checks)) => {
                let report = ValidationReport::from_checks(checks.clone());
                tracing::warn!("{}", report.summary());
            }
            Err(e) => tracing::error!(error = %e, "window failed"),
        }

        WindowResult::from(outcome)
    }

    fn run(&self, window: Window, source: &WindowSource) -> Result<WindowScore, PipelineError> {
        let loaded;
        let input = match source {
            WindowSource::Records(input) => input,
            WindowSource::Files(files) => {
                loaded = loader::load_window(files)
                    .map_err(|e| PipelineError::Unreadable(format!("{:#}", e)))?;
                &loaded
            }
        };

        let report = self.validator.validate_input(input);
        match report {
            ValidationReport::Checked { passed: true, .. } => {}
            ValidationReport::Checked { checks, .. } => {
                return Err(PipelineError::ValidationFailed(checks));
            }
            ValidationReport::Unreadable { error, .. } => return Err(PipelineError::Unreadable(error)),
        }
        tracing::debug!(rows = input.bank_tx.len(), months = input.pnl_monthly.len(), "validation passed");

        let scorer = &self.scorer;
        let (features, scorecard) = panic::catch_unwind(AssertUnwindSafe(|| {
            let vendors = input.vendors.as_ref().and_then(|roster| roster.records());
            let features = compute_features(&input.bank_tx, &input.pnl_monthly, vendors);
            let scorecard = scorer.calculate(&features);
            (features, scorecard)
        }))
        .map_err(|payload| PipelineError::Processing {
            window,
            detail: panic_message(payload.as_ref()),
        })?;

        if !scorecard.score.is_finite() || !scorecard.eligible_capital.is_finite() {
            return Err(PipelineError::Processing {
                window,
                detail: "scorecard contains non-finite values".to_string(),
            });
        }

        let key_metrics = flags::key_metrics(&features);
        let summary = flags::summary_line(&scorecard);

        Ok(WindowScore {
            scorecard,
            features,
            key_metrics,
            summary,
        })
    }
}

fn processing_failure(window: Window, detail: String) -> WindowResult {
    WindowResult::Failed {
        error: PipelineError::Processing { window, detail }.to_string(),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown internal error".to_string()
    }
}

// ============================================================================
// TESTS
// ============================================================================
