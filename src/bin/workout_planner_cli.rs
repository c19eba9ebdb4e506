//! Workout Planner CLI — 训练计划生成、请求摘要查询的命令行工具
//!
//! Usage:
//!   workout-planner-cli plan --owner <id> --type <t> --duration <m>   Generate (or replay) a plan
//!   workout-planner-cli digest --owner <id> --type <t> --duration <m> Print canonical key and digest
//!   workout-planner-cli version                                       Show version information

use anyhow::{anyhow, bail, Context};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use workout_planner::cache::{canonicalize, digest};
use workout_planner::client::StaticProfiles;
use workout_planner::generation::GenerationRequest;
use workout_planner::resilience::{GenerationStage, ProgressEvent, ProgressObserver};
use workout_planner::{OwnerProfile, PlanClient, PlannerConfig, WorkoutRequest};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("workout_planner=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }

    let result = match args[1].as_str() {
        "plan" => cmd_plan(&args[2..]).await,
        "digest" => cmd_digest(&args[2..]),
        "version" | "--version" | "-V" => {
            cmd_version();
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn print_usage() {
    println!(
        r#"workout-planner-cli — 训练计划命令行工具

USAGE:
    workout-planner-cli <COMMAND> [OPTIONS]

COMMANDS:
    plan      Generate a plan, or replay a stored one for an identical request
    digest    Print the canonical request key and its dedup digest
    version   Show version information
    help      Show this help message

OPTIONS (plan, digest):
    --owner <id>           Owner id (required)
    --type <workout>       Workout type, e.g. Legs (required)
    --duration <minutes>   Duration in minutes, 5-180 (required)
    --experience <level>   Experience level [default: beginner]
    --goal <goal>          Training goal, repeatable
    --equipment <a,b>      Comma-separated equipment list
    --constraint <text>    Constraint, repeatable
    --config <file.yaml>   Configuration file

ENVIRONMENT:
    WORKOUT_PLANNER_CONTRACT_VERSION      Prompt contract version
    WORKOUT_PLANNER_BACKEND_URL           Generation endpoint
    WORKOUT_PLANNER_BACKEND_API_KEY       Bearer token for the endpoint
    WORKOUT_PLANNER_MAX_ATTEMPTS          Attempts per generation
    WORKOUT_PLANNER_BACKOFF_BASE_MS       Retry backoff base
    WORKOUT_PLANNER_PROXY_URL             HTTP proxy for the backend
    RUST_LOG                              Log filter [default: workout_planner=info]"#
    );
}

fn cmd_version() {
    println!(
        "workout-planner-cli {} (contract {})",
        env!("CARGO_PKG_VERSION"),
        workout_planner::config::DEFAULT_CONTRACT_VERSION,
    );
}

struct PlanArgs {
    profile: OwnerProfile,
    request: WorkoutRequest,
    config: PlannerConfig,
}

fn flag_value<'a>(args: &'a [String], name: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == name)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

fn flag_values(args: &[String], name: &str) -> Vec<String> {
    args.iter()
        .enumerate()
        .filter(|(_, a)| *a == name)
        .filter_map(|(i, _)| args.get(i + 1).cloned())
        .collect()
}

fn parse_plan_args(args: &[String]) -> anyhow::Result<PlanArgs> {
    let owner = flag_value(args, "--owner").ok_or_else(|| anyhow!("--owner is required"))?;
    let workout_type = flag_value(args, "--type").ok_or_else(|| anyhow!("--type is required"))?;
    let duration: u32 = flag_value(args, "--duration")
        .ok_or_else(|| anyhow!("--duration is required"))?
        .parse()
        .context("--duration must be a whole number of minutes")?;
    let experience = flag_value(args, "--experience").unwrap_or("beginner");
    let equipment: Vec<String> = flag_value(args, "--equipment")
        .map(|s| s.split(',').map(|e| e.trim().to_string()).collect())
        .unwrap_or_default();

    let config = match flag_value(args, "--config") {
        Some(path) => PlannerConfig::from_file(path)?,
        None => PlannerConfig::default(),
    }
    .with_env_overrides()?;

    Ok(PlanArgs {
        profile: OwnerProfile::new(owner, experience).with_goals(flag_values(args, "--goal")),
        request: WorkoutRequest::new(workout_type, duration)
            .with_equipment(equipment)
            .with_constraints(flag_values(args, "--constraint")),
        config,
    })
}

fn cmd_digest(args: &[String]) -> anyhow::Result<()> {
    let parsed = parse_plan_args(args)?;
    let resolved = GenerationRequest::resolve(&parsed.profile, &parsed.request);
    resolved.validate()?;
    let key = canonicalize(&resolved.descriptor());
    let d = digest(&key, &parsed.config.contract_version);
    println!("contract: {}", parsed.config.contract_version);
    println!("key:      {}", key.as_str());
    println!("digest:   {}", d);
    Ok(())
}

struct StderrProgress;

impl ProgressObserver for StderrProgress {
    fn on_progress(&self, event: &ProgressEvent) {
        match (event.stage, event.delay) {
            (GenerationStage::Retrying, Some(delay)) => eprintln!(
                "attempt {}/{} timed out, retrying in {:?}",
                event.attempt, event.max_attempts, delay
            ),
            (GenerationStage::Generating, _) => eprintln!(
                "generating (attempt {}/{})",
                event.attempt, event.max_attempts
            ),
            (stage, _) => eprintln!("{:?}", stage),
        }
    }
}

async fn cmd_plan(args: &[String]) -> anyhow::Result<()> {
    let parsed = parse_plan_args(args)?;
    if parsed.config.backend.url.is_none() {
        bail!("no generation backend configured; set WORKOUT_PLANNER_BACKEND_URL or backend.url");
    }
    let owner = parsed.profile.owner_id.clone();
    let client = PlanClient::builder()
        .config(parsed.config)
        .profiles(Arc::new(StaticProfiles::new().with_profile(parsed.profile)))
        .build()?;

    let workout = client
        .request_plan(&owner, &parsed.request, Some(Arc::new(StderrProgress)))
        .await
        .map_err(|e| anyhow!("{} ({})", e.user_message(), e))?;

    eprintln!(
        "workout {} ({}, {} attempt(s))",
        workout.workout_id,
        if workout.deduped { "replayed" } else { "generated" },
        workout.attempts
    );
    println!("{}", serde_json::to_string_pretty(&workout.plan)?);
    Ok(())
}
