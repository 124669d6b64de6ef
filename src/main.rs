//! maafetch CLI - download and deploy prebuilt MAA Core artifacts

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use maafetch::{AbiFilter, Api, DeployConfig, RunReport};

const RULE: &str = "=======================================================";

/// Download prebuilt MAA Core artifacts and deploy them into the Android project
#[derive(Debug, Parser)]
#[command(name = "maafetch")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Release tag to deploy (default: latest)
    #[arg(short, long)]
    tag: Option<String>,

    /// Clean target dirs before deploy
    #[arg(short, long)]
    clean: bool,

    /// Skip download, deploy from the cache only
    #[arg(short, long)]
    skip_download: bool,

    /// Process only the given ABI
    #[arg(long, default_value = "all", value_parser = ["arm64-v8a", "x86_64", "all"])]
    abi: String,

    /// Project root the asset, jniLibs and cache dirs are relative to
    #[arg(short = 'p', long, default_value = ".")]
    project_root: PathBuf,

    /// Do not print download progress
    #[arg(long)]
    no_progress: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stdout)
                .without_time()
                .with_target(false)
                .with_level(false),
        )
        .with(filter)
        .init();

    let cli = Cli::parse();

    tracing::info!("{RULE}");
    tracing::info!("==> MAA Core Download & Deploy");
    tracing::info!("{RULE}");

    match run(cli).await {
        Ok(report) => {
            print_summary(&report);
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("[ERROR] {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> maafetch::Result<RunReport> {
    let mut api = Api::new(DeployConfig::from_env())
        .set_project_root(&cli.project_root)
        .abi(cli.abi.parse::<AbiFilter>()?)
        .clean(cli.clean);
    if cli.no_progress {
        api = api.no_progress();
    }

    let deploy = if cli.skip_download {
        api.cached()
    } else if let Some(tag) = &cli.tag {
        api.tag(tag)
    } else {
        api.latest()
    };
    deploy.deploy().await
}

fn print_summary(report: &RunReport) {
    tracing::info!("");
    tracing::info!("{RULE}");
    match &report.tag {
        Some(tag) => tracing::info!("[DONE] Deploy complete! ({tag})"),
        None => tracing::info!("[DONE] Deploy complete!"),
    }
    tracing::info!("{RULE}");
    for (abi, libraries) in &report.summary.libraries {
        tracing::info!("  {abi}/: {}", libraries.join(", "));
    }
    if report.summary.resource_files > 0 {
        tracing::info!(
            "  resource: {} files, {:.1} MB",
            report.summary.resource_files,
            report.summary.resource_bytes as f64 / (1024.0 * 1024.0)
        );
    }
}
