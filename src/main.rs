//! Bentobox - Main entry point
//!
//! Resolves paths and configuration once, then hands off to the orchestrator.

use anyhow::{Context, Result};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use bentobox::cli::{Cli, Commands, RunArgs};
use bentobox::report::render_status;
use bentobox::{
    InstallConfig, InstallPaths, Orchestrator, ProcessGuard, SessionSignal, StateStore,
    SystemRunner, UnitManifest,
};

/// Structured logs go to stderr so they never interleave with the console report
fn init_logger() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    init_logger();
    info!("Bentobox starting up");

    if let Err(e) = bentobox::process_guard::init_signal_handlers() {
        warn!("Failed to initialize signal handlers: {}", e);
    }

    let cli = Cli::parse_args();
    debug!(?cli, "CLI arguments parsed");

    let result = match cli.command {
        Some(Commands::Status) => show_status(),
        Some(Commands::Plan(args)) => show_plan(&args),
        None => run(&cli.run),
    };

    if let Err(e) = result {
        error!("{:#}", e);
        eprintln!("\n❌ {:#}", e);
        std::process::exit(1);
    }
}

fn orchestrator(args: &RunArgs) -> Result<(Orchestrator<SystemRunner>, InstallConfig)> {
    let paths = InstallPaths::from_env()
        .context("Failed to resolve install paths")?
        .with_config_file(args.config.as_deref());

    let mut manifest = UnitManifest::load(&paths.manifest_file)
        .with_context(|| format!("Invalid unit manifest {}", paths.manifest_file.display()))?;
    if let Some(order) = args.order {
        manifest.ordering = order;
    }

    let (config, source) = InstallConfig::load_or_default(&paths.config_file);
    debug!(?source, "Configuration source");

    let session = SessionSignal::from_env();
    Ok((Orchestrator::new(paths, manifest, SystemRunner, session), config))
}

fn run(args: &RunArgs) -> Result<()> {
    println!("🚀 Bentobox Installation Orchestrator");
    println!("{}", "=".repeat(50));

    // Stops any action still running if we unwind out of the run
    let _guard = ProcessGuard::new();

    let (orchestrator, config) = orchestrator(args)?;
    let outcome = orchestrator
        .run(&config)
        .context("Installation aborted")?;

    println!("\n{}", outcome.report);
    println!("\n💾 State saved to: {}", orchestrator.store().path().display());
    println!("\n✅ Installation complete!");
    Ok(())
}

fn show_plan(args: &RunArgs) -> Result<()> {
    let (orchestrator, config) = orchestrator(args)?;
    let plan = orchestrator.plan(&config).context("Failed to build plan")?;
    println!("\n{}", plan.describe());
    Ok(())
}

fn show_status() -> Result<()> {
    let paths = InstallPaths::from_env().context("Failed to resolve install paths")?;
    let store = StateStore::new(&paths.state_file);
    let snapshot = store.read_snapshot_with_retry(5, std::time::Duration::from_millis(200));
    print!("{}", render_status(&snapshot));
    Ok(())
}
