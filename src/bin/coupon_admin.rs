use std::{fs, path::PathBuf, process::ExitCode};

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use clap::{ArgAction, Args, Parser, Subcommand};
use coupon_admin::{
    config::{self, AppConfig},
    errors::{ErrorResponse, ServiceError},
    models::CouponDraft,
    validation::{Redeemability, SubmissionResult},
    AppState,
};
use serde::Serialize;
use uuid::Uuid;

const EXIT_REJECTED: u8 = 2;
const EXIT_ERROR: u8 = 1;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let json = cli.json;
    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            report_error(err, json);
            ExitCode::from(EXIT_ERROR)
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = config::load_config().context("failed to load application config")?;
    config::init_tracing(config.log_level(), config.log_json);

    match cli.command {
        Commands::CheckSubmission(args) => handle_check_submission(config, args, cli.json).await,
        Commands::CheckCode(args) => handle_check_code(config, args, cli.json).await,
        Commands::Stats(args) => handle_stats(config, args, cli.json).await,
    }
}

/// With `--json`, failures are printed on stdout as an error body so scripts
/// always get a JSON document. Otherwise the full context chain goes to stderr.
fn report_error(err: anyhow::Error, json: bool) {
    if !json {
        eprintln!("Error: {:#}", err);
        return;
    }
    // Anything that is not a service error stems from arguments, config or input files.
    let service_error = match err.downcast::<ServiceError>() {
        Ok(service_error) => service_error,
        Err(other) => ServiceError::InvalidInput(format!("{:#}", other)),
    };
    let body = ErrorResponse::from(&service_error);
    if print_json(&body).is_err() {
        eprintln!("Error: {}", body.message);
    }
}

#[derive(Parser)]
#[command(
    name = "coupon-admin",
    about = "Validate coupon submissions and inspect coupon usage from a JSON snapshot",
    version
)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON"
    )]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every uniqueness and policy check on a coupon submission
    CheckSubmission(CheckSubmissionArgs),
    /// Check whether a base or child code can be redeemed
    CheckCode(CheckCodeArgs),
    /// Print coupon usage statistics
    Stats(StatsArgs),
}

#[derive(Args)]
struct SnapshotArg {
    #[arg(long, help = "Snapshot file; defaults to the configured snapshot_path")]
    snapshot: Option<PathBuf>,
}

#[derive(Args)]
struct CheckSubmissionArgs {
    #[command(flatten)]
    snapshot: SnapshotArg,
    #[arg(long, help = "JSON file holding the coupon draft with its child coupons")]
    submission: PathBuf,
    #[arg(long, help = "Validate as an edit of this existing coupon")]
    coupon_id: Option<Uuid>,
}

#[derive(Args)]
struct CheckCodeArgs {
    #[command(flatten)]
    snapshot: SnapshotArg,
    #[arg(help = "Base or child coupon code")]
    code: String,
    #[arg(long, help = "Evaluate on this date (YYYY-MM-DD) instead of today")]
    today: Option<NaiveDate>,
}

#[derive(Args)]
struct StatsArgs {
    #[command(flatten)]
    snapshot: SnapshotArg,
    #[arg(long, help = "Number of coupons in the usage ranking")]
    top: Option<usize>,
}

fn build_state(mut config: AppConfig, snapshot: &SnapshotArg) -> Result<AppState> {
    if let Some(path) = &snapshot.snapshot {
        config.snapshot_path = Some(path.display().to_string());
    }
    if config.snapshot_path.is_none() {
        return Err(anyhow!(
            "no snapshot given; pass --snapshot or set APP__SNAPSHOT_PATH"
        ));
    }
    AppState::from_config(config).context("failed to load snapshot")
}

async fn handle_check_submission(
    config: AppConfig,
    args: CheckSubmissionArgs,
    json: bool,
) -> Result<ExitCode> {
    let state = build_state(config, &args.snapshot)?;
    let raw = fs::read_to_string(&args.submission)
        .with_context(|| format!("failed to read {}", args.submission.display()))?;
    let draft: CouponDraft =
        serde_json::from_str(&raw).context("submission is not a valid coupon draft")?;

    let result = state
        .coupons
        .validate_draft(args.coupon_id, draft)
        .await
        .context("submission could not be evaluated")?;

    if json {
        print_json(&result)?;
    } else {
        match &result {
            SubmissionResult::Accepted => println!("Submission accepted"),
            SubmissionResult::Rejected(report) => {
                println!("Submission rejected ({} field(s)):", report.len());
                for (field, failure) in report.iter() {
                    println!("  - {} [{}]: {}", field, failure.kind, failure.reason);
                }
            }
        }
    }

    Ok(if result.is_accepted() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_REJECTED)
    })
}

async fn handle_check_code(config: AppConfig, args: CheckCodeArgs, json: bool) -> Result<ExitCode> {
    let state = build_state(config, &args.snapshot)?;
    let result = match args.today {
        Some(day) => state.coupons.check_code_on(&args.code, day).await?,
        None => state.coupons.check_code(&args.code).await?,
    };

    if json {
        print_json(&result)?;
    } else {
        match &result {
            Redeemability::Redeemable {
                coupon_id,
                child_id: Some(child_id),
            } => println!(
                "{} is redeemable (coupon {}, child coupon {})",
                args.code, coupon_id, child_id
            ),
            Redeemability::Redeemable { coupon_id, .. } => {
                println!("{} is redeemable (coupon {})", args.code, coupon_id)
            }
            Redeemability::NotRedeemable { reason } => {
                println!("{} is not redeemable: {}", args.code, reason)
            }
        }
    }

    Ok(if result.is_redeemable() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_REJECTED)
    })
}

async fn handle_stats(mut config: AppConfig, args: StatsArgs, json: bool) -> Result<ExitCode> {
    if let Some(top) = args.top {
        config.top_coupons_limit = top;
    }
    let state = build_state(config, &args.snapshot)?;
    let summary = state.dashboard.summary().await?;

    if json {
        print_json(&summary)?;
    } else {
        println!(
            "Coupons: {} ({} active) • affiliates: {}",
            summary.total_coupons, summary.active_coupons, summary.total_affiliates
        );
        println!(
            "Used coupons: {} • usage rate: {}%",
            summary.total_used_coupons, summary.coupon_usage_rate
        );
        for (rank, coupon) in summary.top_coupons.iter().enumerate() {
            println!(
                "  {}. {} ({}) • {} / {} used",
                rank + 1,
                coupon.code,
                coupon.name,
                coupon.used_count,
                coupon.available_quantity
            );
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
