mod bridge;
mod cli;
mod codec;
mod error;
mod logging;
mod manifest;
mod protocol;
mod session;

use std::path::Path;
use std::process::ExitCode;

use clap::Parser;

use reelwatch_api::IngestClient;
use reelwatch_core::config::AppConfig;
use reelwatch_detect::SiteDatabase;

use crate::cli::{Cli, Command};
use crate::error::HostError;
use crate::manifest::HostManifest;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match &cli.command {
        Some(Command::Manifest { extension_id, path }) => {
            print_manifest(extension_id, path.as_deref())
        }
        None => run_host(&cli).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // stderr ends up in the browser's log when launched as a host.
            eprintln!("reelwatch-host: {e}");
            ExitCode::FAILURE
        }
    }
}

fn print_manifest(extension_id: &str, path: Option<&Path>) -> Result<(), HostError> {
    let binary = match path {
        Some(path) => path.to_path_buf(),
        None => std::env::current_exe()?,
    };
    let manifest = HostManifest::new(extension_id, &binary);
    println!("{}", serde_json::to_string_pretty(&manifest)?);
    Ok(())
}

async fn run_host(cli: &Cli) -> Result<(), HostError> {
    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };
    let _guard = logging::init(&config.logging.filter)?;
    tracing::info!(caller = ?cli.caller, "Native host started");

    let sites = SiteDatabase::load_with_user(&AppConfig::sites_path())?;
    let ingest = IngestClient::new(config.ingest.endpoint.clone(), config.ingest.timeout())?;

    let summary = session::serve(
        tokio::io::stdin(),
        tokio::io::stdout(),
        ingest,
        sites,
        config.detector.timing(),
        config.bridge.request_timeout(),
    )
    .await
    .inspect_err(|e| tracing::error!(error = %e, "Native host stopped"))?;

    tracing::info!(
        submitted = summary.submitted,
        duplicates = summary.duplicates,
        failed = summary.failed,
        "Native host stopped"
    );
    Ok(())
}
