//! wsi-dzi - Convert Whole Slide Images into Deep Zoom tile pyramids.
//!
//! `convert` runs one conversion and reports progress on stdout; `serve`
//! starts the upload service.

use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wsi_dzi::{
    config::{Cli, Command, ConvertConfig, ServeConfig},
    convert::{convert, ConsoleObserver},
    server::{create_router, AppState, RouterConfig},
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // Usage errors exit 1; help and version are not errors.
            let _ = e.print();
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::FAILURE,
            };
        }
    };

    init_logging(cli.verbose);

    match cli.command {
        Command::Convert(config) => run_convert(config).await,
        Command::Serve(config) => run_serve(config).await,
    }
}

// =============================================================================
// Convert Command
// =============================================================================

async fn run_convert(config: ConvertConfig) -> ExitCode {
    if let Err(e) = config.validate() {
        eprintln!("ERROR: {}", e);
        return ExitCode::FAILURE;
    }

    match convert(
        &config.input_file,
        &config.output_dir,
        &config.output_name,
        &config.slide_options(),
        &ConsoleObserver,
    )
    .await
    {
        Ok(summary) => {
            info!(
                levels = summary.level_count,
                tiles = summary.tile_count,
                "done"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("ERROR: {}", e);
            ExitCode::FAILURE
        }
    }
}

// =============================================================================
// Serve Command
// =============================================================================

async fn run_serve(config: ServeConfig) -> ExitCode {
    if let Err(e) = config.validate() {
        eprintln!("ERROR: {}", e);
        return ExitCode::FAILURE;
    }

    let slides_dir = config.slides_dir();
    if let Err(e) = tokio::fs::create_dir_all(&slides_dir).await {
        eprintln!("ERROR: Failed to create {}: {}", slides_dir.display(), e);
        return ExitCode::FAILURE;
    }

    let state = AppState::new(&config.data_dir).with_slide_options(config.slide_options());
    let router = create_router(state, build_router_config(&config));

    let addr = config.bind_address();
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    info!("WSI Backend running on {}", addr);
    info!("  Upload endpoint: http://{}/upload", addr);
    info!("  Health check:    http://{}/health", addr);
    info!("  Slides:          {}", slides_dir.display());

    if let Err(e) = axum::serve(listener, router).await {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn build_router_config(config: &ServeConfig) -> RouterConfig {
    let mut router_config = RouterConfig::default()
        .with_tracing(!config.no_tracing)
        .with_max_upload_size(config.body_limit());

    if let Some(ref origins) = config.cors_origins {
        router_config = router_config.with_cors_origins(origins.clone());
    }

    router_config
}

/// Initialize the tracing/logging subsystem.
///
/// Logs go to stderr so the conversion progress on stdout stays clean.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "wsi_dzi=debug,tower_http=debug"
    } else {
        "wsi_dzi=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
