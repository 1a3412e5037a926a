//! ndirx viewer — entry point.
//!
//! ```text
//! ndirx-viewer                      Receive with defaults (mock backend)
//! ndirx-viewer --config <path>      Use custom config TOML
//! ndirx-viewer --source "cam-1"     Receive the first source containing "cam-1"
//! ndirx-viewer --gen-config         Dump default config and exit
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ndirx_viewer::config::{BackendKind, ViewerConfig};
use ndirx_viewer::runner::{self, RunSummary};

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "ndirx-viewer", about = "Headless NDI source receiver")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "ndirx-viewer.toml")]
    config: PathBuf,

    /// Source name substring (overrides config). Example: "cam-1"
    #[arg(short, long)]
    source: Option<String>,

    /// Only accept sources on this host, port excluded (overrides config).
    #[arg(short, long)]
    address: Option<String>,

    /// Native backend (overrides config).
    #[arg(short, long, value_enum)]
    backend: Option<BackendKind>,

    /// Stop after this many ticks (overrides config).
    #[arg(long)]
    ticks: Option<u64>,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.gen_config {
        let text = toml::to_string_pretty(&ViewerConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    let mut config = ViewerConfig::load(&cli.config);
    if let Some(source) = cli.source {
        config.receiver.source_name = source;
    }
    if let Some(address) = cli.address {
        config.receiver.address_filter = Some(address);
    }
    if let Some(backend) = cli.backend {
        config.backend.kind = backend;
    }
    if let Some(ticks) = cli.ticks {
        config.runtime.max_ticks = ticks;
    }

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("ndirx-viewer v{}", env!("CARGO_PKG_VERSION"));

    let shutdown = async {
        // An unavailable signal handler just means we run to max_ticks.
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    let summary = match config.backend.kind {
        BackendKind::Mock => {
            let backend = runner::mock_backend(&config.backend);
            runner::run(backend, &config, shutdown).await
        }
        #[cfg(feature = "ndi-sdk")]
        BackendKind::Sdk => {
            let backend = runner::sdk_backend(&config.backend)?;
            runner::run(backend, &config, shutdown).await
        }
        #[cfg(not(feature = "ndi-sdk"))]
        BackendKind::Sdk => {
            return Err("the sdk backend needs a build with the `ndi-sdk` feature".into());
        }
    };

    report(&summary);
    Ok(())
}

fn report(summary: &RunSummary) {
    info!(
        ticks = summary.ticks,
        sessions = summary.receiver.sessions_opened,
        received = summary.receiver.frames_received,
        decoded = summary.receiver.frames_decoded,
        decode_failures = summary.receiver.decode_failures,
        presented_bytes = summary.present.total_bytes,
        state = %summary.final_state,
        "done"
    );
}
