//! edge-release CLI
//!
//! The `edge-release` command runs versioned releases of edge functions.
//!
//! ## Commands
//!
//! - `push` (alias `stage`): Upload code bundles to object storage
//! - `deploy`: Point functions at their staged bundles
//! - `publish`: Publish a new numbered version of each function
//! - `activate`: Rebind distribution triggers to published versions
//! - `versions`: List or resolve published versions of a function
//!
//! Providers are served from a filesystem sandbox rooted at `--backend-dir`.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use edge_providers::{FsProviders, ProviderFactory};
use edge_release_core::{
    load_request_file, Operation, ReleaseOrchestrator, ReleaseReport, RequestOverrides,
    TriggerSlot, TriggerStatus, VersionResolver,
};
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "edge-release")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Versioned edge function releases", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines and a JSON report
    #[arg(long, global = true)]
    json: bool,

    /// Sandbox directory backing the providers
    #[arg(
        long,
        global = true,
        env = "EDGE_RELEASE_BACKEND_DIR",
        default_value = ".edge-release"
    )]
    backend_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload code bundles to object storage
    #[command(alias = "stage")]
    Push(ReleaseArgs),

    /// Point each function's unpublished code at its staged bundle
    Deploy(ReleaseArgs),

    /// Publish a new numbered version of each function
    Publish(ReleaseArgs),

    /// Rebind distribution triggers to published versions
    Activate(ReleaseArgs),

    /// List published versions of a function
    Versions {
        /// Function name
        function: String,

        /// Resolve this exact version label instead of listing
        #[arg(long)]
        version: Option<String>,

        /// Function platform region
        #[arg(long)]
        region: Option<String>,
    },
}

#[derive(Args, Debug, Default)]
struct ReleaseArgs {
    /// Release config file (JSON, or TOML by extension)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory that relative config and artifact paths resolve against
    #[arg(long)]
    pwd: Option<PathBuf>,

    /// Log planned requests without changing anything
    #[arg(long)]
    dry_run: bool,

    /// Region for every provider unless overridden
    #[arg(long)]
    region: Option<String>,

    /// Object storage region
    #[arg(long)]
    s3_region: Option<String>,

    /// Function platform region
    #[arg(long)]
    lambda_region: Option<String>,

    /// Distribution to activate on
    #[arg(long)]
    distribution_id: Option<String>,

    /// Cache behavior path pattern, or "default"
    #[arg(long)]
    cache_behavior_path: Option<String>,

    /// Artifact bucket
    #[arg(long)]
    bucket: Option<String>,

    /// Artifact key (single trigger)
    #[arg(long)]
    key: Option<String>,

    /// Function name (single trigger)
    #[arg(long)]
    function_name: Option<String>,

    /// Local artifact path (single trigger)
    #[arg(long)]
    file_path: Option<PathBuf>,

    /// Trigger slot (single trigger)
    #[arg(long, value_parser = parse_slot)]
    trigger_name: Option<TriggerSlot>,

    /// Pin every trigger to this version; disables auto-increment
    #[arg(long)]
    lambda_version: Option<String>,

    /// Label artifacts with the next version number
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    auto_increment: Option<bool>,

    /// Only the viewer-request trigger
    #[arg(long)]
    vreq: bool,

    /// Only the origin-request trigger
    #[arg(long)]
    oreq: bool,

    /// Only the origin-response trigger
    #[arg(long)]
    ores: bool,

    /// Only the viewer-response trigger
    #[arg(long)]
    vres: bool,
}

fn parse_slot(s: &str) -> std::result::Result<TriggerSlot, String> {
    s.parse::<TriggerSlot>().map_err(|e| e.to_string())
}

impl ReleaseArgs {
    fn slots(&self) -> Vec<TriggerSlot> {
        [
            (self.vreq, TriggerSlot::ViewerRequest),
            (self.oreq, TriggerSlot::OriginRequest),
            (self.ores, TriggerSlot::OriginResponse),
            (self.vres, TriggerSlot::ViewerResponse),
        ]
        .into_iter()
        .filter_map(|(selected, slot)| selected.then_some(slot))
        .collect()
    }

    fn overrides(&self) -> RequestOverrides {
        RequestOverrides {
            dry_run: self.dry_run,
            region: self.region.clone(),
            s3_region: self.s3_region.clone(),
            lambda_region: self.lambda_region.clone(),
            distribution_id: self.distribution_id.clone(),
            cache_behavior_path: self.cache_behavior_path.clone(),
            bucket: self.bucket.clone(),
            auto_increment: self.auto_increment,
            trigger_name: self.trigger_name.map(|slot| slot.to_string()),
            function_name: self.function_name.clone(),
            function_version: self.lambda_version.clone(),
            key: self.key.clone(),
            file_path: self.file_path.clone(),
            slots: self.slots(),
            pwd: self.pwd.clone(),
        }
    }

    fn config_path(&self) -> Option<PathBuf> {
        let config = self.config.as_ref()?;
        Some(match &self.pwd {
            Some(pwd) => pwd.join(config),
            None => config.clone(),
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    edge_release_core::telemetry::init_tracing(cli.json, level);

    let providers = FsProviders::new(&cli.backend_dir).with_context(|| {
        format!(
            "failed to open provider sandbox at {}",
            cli.backend_dir.display()
        )
    })?;
    let providers: Arc<dyn ProviderFactory> = Arc::new(providers);

    match cli.command {
        Commands::Push(args) => cmd_release(providers, Operation::Stage, &args, cli.json).await,
        Commands::Deploy(args) => cmd_release(providers, Operation::Deploy, &args, cli.json).await,
        Commands::Publish(args) => cmd_release(providers, Operation::Publish, &args, cli.json).await,
        Commands::Activate(args) => {
            cmd_release(providers, Operation::Activate, &args, cli.json).await
        }
        Commands::Versions {
            function,
            version,
            region,
        } => cmd_versions(providers.as_ref(), &function, version.as_deref(), region.as_deref()).await,
    }
}

/// Run one release operation and print its report.
async fn cmd_release(
    providers: Arc<dyn ProviderFactory>,
    operation: Operation,
    args: &ReleaseArgs,
    json: bool,
) -> Result<()> {
    let base = args
        .config_path()
        .map(|path| load_request_file(&path))
        .transpose()?;
    let cwd = std::env::current_dir().context("cannot determine current directory")?;
    let raw = args.overrides().apply(operation, base, &cwd);

    let report = ReleaseOrchestrator::new(providers)
        .run(operation, &raw)
        .await
        .with_context(|| format!("{operation} failed"))?;

    print_report(&report, json)?;
    let failed = report.failed_count();
    let total = report.triggers.len();
    report
        .into_result()
        .with_context(|| format!("{operation}: {failed} of {total} triggers failed"))?;
    Ok(())
}

fn print_report(report: &ReleaseReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&report.summary())?);
        return Ok(());
    }

    let mode = if report.dry_run { " (dry run)" } else { "" };
    println!("{} {}{}", report.operation, report.release_id, mode);
    for trigger in &report.triggers {
        let outcome = match &trigger.result {
            Ok(TriggerStatus::Applied) => "applied".to_string(),
            Ok(TriggerStatus::Unchanged) => "unchanged".to_string(),
            Ok(TriggerStatus::DryRun) => "planned".to_string(),
            Ok(TriggerStatus::Skipped(reason)) => format!("skipped: {reason}"),
            Err(err) => format!("FAILED: {err}"),
        };
        let mut details = Vec::new();
        if let Some(version) = &trigger.effect.version {
            details.push(format!("version={version}"));
        }
        if let (Some(bucket), Some(key)) = (&trigger.effect.bucket, &trigger.effect.key) {
            details.push(format!("object=s3://{bucket}/{key}"));
        }
        if let Some(arn) = &trigger.effect.function_arn {
            details.push(format!("arn={arn}"));
        }
        println!(
            "  {:<16} {:<24} {} {}",
            trigger.trigger,
            trigger.function_name.as_deref().unwrap_or("-"),
            outcome,
            details.join(" ")
        );
    }
    if let Some(write) = &report.distribution_write {
        println!(
            "  distribution {} updated (etag {} -> {})",
            write.distribution_id, write.if_match, write.new_etag
        );
    }
    Ok(())
}

/// List published versions, or resolve one label.
async fn cmd_versions(
    providers: &dyn ProviderFactory,
    function: &str,
    version: Option<&str>,
    region: Option<&str>,
) -> Result<()> {
    let platform = providers.function_platform(region)?;
    let resolver = VersionResolver::new(platform.as_ref());

    if version.is_some() {
        let resolved = resolver
            .resolve(function, version)
            .await
            .with_context(|| format!("failed to resolve {function}"))?;
        match (resolved.version, resolved.function_arn) {
            (Some(version), Some(arn)) => println!("{function} {version} {arn}"),
            _ => println!("No published version of {function} matches {}", version.unwrap_or("")),
        }
        return Ok(());
    }

    let versions = resolver
        .list_all(function)
        .await
        .with_context(|| format!("failed to list versions of {function}"))?;
    info!(function = %function, count = versions.len(), "versions listed");
    for v in versions.iter().filter(|v| !v.is_latest_alias()) {
        println!("{} {}", v.version, v.function_arn);
    }
    if let Some(latest) = edge_release_core::select_latest(&versions) {
        println!("latest: {}", latest.version);
    }
    Ok(())
}
