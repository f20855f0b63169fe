use anyhow::{bail, Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use efi_engine::{telemetry, EngineConfig, FailureIntelligenceEngine, Snapshot};
use efi_ranking::{DiagnosticContext, RankingReport};
use efi_store::SystemClock;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Command::new("efi")
        .version(efi_engine::VERSION)
        .about("Failure Intelligence Engine for EV service diagnostics")
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML configuration file"),
        )
        .subcommand(
            Command::new("rank")
                .about("Rank probable root causes against a snapshot")
                .arg(snapshot_arg())
                .arg(
                    Arg::new("org")
                        .long("org")
                        .required(true)
                        .help("Calling organization"),
                )
                .arg(Arg::new("make").long("make").help("Vehicle make"))
                .arg(Arg::new("model").long("model").help("Vehicle model"))
                .arg(Arg::new("subsystem").long("subsystem").help("Suspected subsystem"))
                .arg(
                    Arg::new("symptom")
                        .long("symptom")
                        .action(ArgAction::Append)
                        .help("Reported symptom (repeatable)"),
                )
                .arg(
                    Arg::new("dtc")
                        .long("dtc")
                        .action(ArgAction::Append)
                        .help("Diagnostic trouble code (repeatable)"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        )
        .subcommand(
            Command::new("sweep")
                .about("Process unprocessed learning events in a snapshot")
                .arg(snapshot_arg())
                .arg(
                    Arg::new("batch")
                        .long("batch")
                        .value_parser(value_parser!(usize))
                        .help("Maximum events to process"),
                )
                .arg(
                    Arg::new("write")
                        .long("write")
                        .action(ArgAction::SetTrue)
                        .help("Write the updated snapshot back"),
                ),
        )
        .subcommand(Command::new("config").about("Print the effective configuration"));

    let matches = cli.get_matches();

    let config = match matches.get_one::<PathBuf>("config") {
        Some(path) => EngineConfig::load_from_path(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => EngineConfig::default(),
    };
    telemetry::init(&config.telemetry)?;

    match matches.subcommand() {
        Some(("rank", args)) => rank(config, args).await,
        Some(("sweep", args)) => sweep(config, args).await,
        Some(("config", _)) => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
        Some((other, _)) => bail!("unknown command: {other}"),
        None => Ok(()),
    }
}

fn snapshot_arg() -> Arg {
    Arg::new("snapshot")
        .long("snapshot")
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help("JSON snapshot of the store")
}

fn open_engine(config: EngineConfig, path: &Path) -> Result<FailureIntelligenceEngine> {
    let snapshot = Snapshot::load(path)
        .with_context(|| format!("reading snapshot {}", path.display()))?;
    Ok(FailureIntelligenceEngine::new(
        config,
        snapshot.into_collections(),
        Arc::new(SystemClock),
    ))
}

fn many(args: &ArgMatches, id: &str) -> Vec<String> {
    args.get_many::<String>(id)
        .map(|values| values.cloned().collect())
        .unwrap_or_default()
}

async fn rank(config: EngineConfig, args: &ArgMatches) -> Result<()> {
    let Some(path) = args.get_one::<PathBuf>("snapshot") else {
        bail!("--snapshot is required");
    };
    let Some(org) = args.get_one::<String>("org") else {
        bail!("--org is required");
    };
    let engine = open_engine(config, path)?;

    let mut context = DiagnosticContext::new(org.as_str())
        .with_symptoms(many(args, "symptom"))
        .with_dtc_codes(many(args, "dtc"));
    if let Some(make) = args.get_one::<String>("make") {
        context = context.with_make(make.as_str());
    }
    if let Some(model) = args.get_one::<String>("model") {
        context.vehicle_model = Some(model.clone());
    }
    if let Some(subsystem) = args.get_one::<String>("subsystem") {
        context = context.with_subsystem(subsystem.as_str());
    }

    let report = engine.diagnose(&context).await?;
    if args.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &RankingReport) {
    println!("Confidence: {}", report.confidence);
    for (position, cause) in report.causes.iter().enumerate() {
        let factors: Vec<&str> = cause.matching_factors.iter().map(|f| f.as_str()).collect();
        println!(
            "{}. {} [{}] score {:.3}",
            position + 1,
            cause.title,
            cause.failure_card_id,
            cause.score
        );
        println!("   fix: {}", cause.verified_fix);
        if !factors.is_empty() {
            println!("   matched: {}", factors.join(", "));
        }
    }
    if report.escalate {
        println!("Escalate: {}", report.escalation_reason);
    }
    if !report.safe_checklist.is_empty() {
        println!("Safe checklist:");
        for item in &report.safe_checklist {
            println!("  - {item}");
        }
    }
}

async fn sweep(config: EngineConfig, args: &ArgMatches) -> Result<()> {
    let Some(path) = args.get_one::<PathBuf>("snapshot") else {
        bail!("--snapshot is required");
    };
    let batch = args
        .get_one::<usize>("batch")
        .copied()
        .unwrap_or(config.learning.default_batch_size);

    let snapshot = Snapshot::load(path)
        .with_context(|| format!("reading snapshot {}", path.display()))?;
    let collections = snapshot.into_collections();
    let engine = FailureIntelligenceEngine::new(config, collections.clone(), Arc::new(SystemClock));

    let report = engine.learning().process_pending_events(batch).await?;
    println!(
        "processed {} skipped {} alerts created {} updated {} drafts {}",
        report.processed,
        report.skipped,
        report.alerts_created,
        report.alerts_updated,
        report.drafts_created
    );

    if args.get_flag("write") {
        Snapshot::capture(&collections).await?.save(path)?;
        tracing::info!(path = %path.display(), "snapshot written");
    }
    Ok(())
}
