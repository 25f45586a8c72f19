//! NDM recorder - call recording for the NDM desktop companion.
//!
//! Records the microphone and the system audio of one phone call at a time
//! into `<recordings_dir>/<call_id>/{mic,system}.wav`, and exposes the
//! start/stop/status handlers the HTTP layer serves.

pub mod capture;
pub mod commands;
pub mod config;
pub mod recorder;
pub mod store;
pub mod utils;

use anyhow::Context;
use capture::CpalBackend;
use commands::recording::{start_recording, stop_recording, RecorderState};
use config::{RecorderConfig, CONFIG_PATH_ENV};
use recorder::RecordingSession;
use std::path::PathBuf;
use std::sync::Arc;
use store::MemoryCallStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utils::{AppError, ErrorResponse};

const USAGE: &str = "usage: ndm-recorder <call_id> [phone_digits]";

/// Record one call from the command line until Ctrl+C
pub async fn run() -> anyhow::Result<()> {
    // Initialize tracing/logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ndm_recorder=debug,ndm_recorder_lib=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting NDM recorder v{}", env!("CARGO_PKG_VERSION"));

    let args: Vec<String> = std::env::args().collect();
    let call_id: i64 = args
        .get(1)
        .context(USAGE)?
        .parse()
        .context("call_id must be an integer")?;
    let phone_digits = args.get(2).cloned().unwrap_or_default();

    let config_path = std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from);
    let config = RecorderConfig::load(config_path.as_deref())?;
    tracing::info!("Recording into {:?}", config.recordings_dir);

    let session = Arc::new(RecordingSession::new(Arc::new(CpalBackend::new()), &config));
    let store = Arc::new(MemoryCallStore::new());
    store.insert_call(call_id, &phone_digits);
    let state = RecorderState::new(session, store);

    let mut events = state.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match serde_json::to_string(&event) {
                Ok(json) => tracing::info!("event: {}", json),
                Err(e) => tracing::warn!("Failed to encode event: {}", e),
            }
        }
    });

    let started = match start_recording(&state, call_id).await {
        Ok(response) => response,
        Err(e) => return report_failure(e),
    };
    println!("{}", serde_json::to_string_pretty(&started)?);
    if !started.ok {
        return Ok(());
    }

    tracing::info!("Recording call {}... Press Ctrl+C to stop.", call_id);
    tokio::signal::ctrl_c().await?;

    let stopped = match stop_recording(&state, call_id).await {
        Ok(response) => response,
        Err(e) => return report_failure(e),
    };
    println!("{}", serde_json::to_string_pretty(&stopped)?);

    Ok(())
}

/// Print a failed command the way HTTP clients receive it
fn report_failure(error: AppError) -> anyhow::Result<()> {
    let response = ErrorResponse::from(error);
    println!("{}", serde_json::to_string_pretty(&response)?);
    anyhow::bail!("{}: {}", response.code, response.message)
}
