// Abandonship - notify a Pushover recipient using credentials from Secret Manager
//
// This is the main entry point for the application.

use abandonship::cli::InvocationArgs;
use abandonship::config::Settings;
use abandonship::identity::{AmbientIdentity, AmbientSources};
use abandonship::notify::PushoverClient;
use abandonship::pipeline;
use abandonship::secret_store::SecretManager;
use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("ABANDONSHIP_LOG").unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("abandonship=debug")
        } else {
            EnvFilter::new("abandonship=warn")
        }
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .without_time(),
        )
        .init();
}

fn run(args: &InvocationArgs) -> Result<()> {
    let settings = Settings::from_env().context("Failed to load settings")?;

    let resolver = AmbientIdentity::new(&settings, AmbientSources::from_env())?;
    let connector = SecretManager::new(&settings);
    let notifier = PushoverClient::new(&settings)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    runtime.block_on(pipeline::run(
        args,
        &settings,
        &resolver,
        &connector,
        &notifier,
    ))?;

    Ok(())
}

fn main() {
    let args = InvocationArgs::parse();
    init_tracing(args.verbose);

    if let Err(e) = run(&args) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
