use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use credit_scorecard::{
    DataValidator, Pipeline, ScoringEngine, ScoringPolicy, ValidationPolicy, Window, WindowFiles,
    WindowSource,
};

#[derive(Debug, Parser)]
#[command(name = "credit-scorecard", version, about = "Score small-business bank data")]
struct Cli {
    /// JSON calibration file overriding the default scoring policy
    #[arg(long, global = true)]
    policy: Option<PathBuf>,

    /// Absolute tolerance for balance continuity checks
    #[arg(long, global = true)]
    balance_abs_tolerance: Option<f64>,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Validate one window's files without scoring
    Validate(WindowArgs),

    /// Validate, compute features and score one window
    Score {
        #[command(flatten)]
        files: WindowArgs,

        /// Business name used in logs
        #[arg(long, default_value = "business")]
        business: String,

        /// Window label (3m or 6m)
        #[arg(long, default_value = "3m", value_parser = parse_window)]
        window: Window,
    },

    /// Score every window found in a business directory
    /// (`trailing_3m/` and `trailing_6m/`)
    Assess {
        dir: PathBuf,
    },
}

#[derive(Debug, Args)]
struct WindowArgs {
    #[arg(long)]
    bank_tx: PathBuf,

    #[arg(long)]
    pnl_monthly: PathBuf,

    #[arg(long)]
    vendors: Option<PathBuf>,
}

impl WindowArgs {
    fn into_files(self) -> WindowFiles {
        WindowFiles {
            bank_tx: self.bank_tx,
            pnl_monthly: self.pnl_monthly,
            vendors: self.vendors,
        }
    }
}

fn parse_window(value: &str) -> Result<Window, String> {
    Window::parse(value).ok_or_else(|| format!("unknown window '{}', expected 3m or 6m", value))
}

fn main() -> Result<()> {
    // Logs go to stderr so stdout stays pure JSON
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let pipeline = build_pipeline(&cli)?;

    match cli.command {
        Command::Validate(args) => {
            let report = pipeline.validator().validate_files(&args.into_files());
            tracing::info!("{}", report.summary());
            print_json(&report, cli.pretty)?;
        }
        Command::Score {
            files,
            business,
            window,
        } => {
            let source = WindowSource::Files(files.into_files());
            let result = pipeline.assess_window(&business, window, &source);
            print_json(&result, cli.pretty)?;
        }
        Command::Assess { dir } => {
            let assessment = pipeline.assess_business_dir(&dir)?;
            tracing::info!(
                business = %assessment.business_name,
                scored = assessment.scored_count(),
                windows = assessment.windows.len(),
                "assessment complete"
            );
            print_json(&assessment, cli.pretty)?;
        }
    }

    Ok(())
}

fn build_pipeline(cli: &Cli) -> Result<Pipeline> {
    let scoring_policy = match &cli.policy {
        Some(path) => {
            tracing::info!(path = %path.display(), "loading scoring policy");
            ScoringPolicy::from_file(path)?
        }
        None => ScoringPolicy::default(),
    };

    let mut validation_policy = ValidationPolicy::default();
    if let Some(tolerance) = cli.balance_abs_tolerance {
        validation_policy.balance_abs_tolerance = tolerance;
    }

    Ok(Pipeline::new()
        .with_validator(DataValidator::with_policy(validation_policy))
        .with_scorer(ScoringEngine::with_policy(scoring_policy)))
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .context("Failed to serialize output")?;

    println!("{}", json);
    Ok(())
}
