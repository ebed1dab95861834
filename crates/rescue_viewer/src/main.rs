use std::env;
use std::process::ExitCode;

use rescue_viewer::{
    run_session, HttpSource, Pacer, ReconcileScheduler, DEFAULT_SERVER_URL,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const SERVER_ENV_VAR: &str = "RESCUE_VIEWER_SERVER";

fn main() -> ExitCode {
    init_tracing();
    info!("=== Rescue Viewer Startup ===");

    let url = env::var(SERVER_ENV_VAR).unwrap_or_else(|_| DEFAULT_SERVER_URL.to_string());
    info!(server = %url, "polling simulation server");

    // Single logical thread of cooperative execution; suspension only at
    // the engine's dwell points.
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            error!(error = %err, "runtime_startup_failed");
            return ExitCode::FAILURE;
        }
    };

    let source = HttpSource::new(url);
    let mut scheduler = ReconcileScheduler::with_pacer(Pacer::wall());
    match runtime.block_on(run_session(&source, &mut scheduler)) {
        Ok(summary) => {
            info!(
                batches_applied = summary.batches_applied,
                elements = summary.registry.element_count(),
                "session_complete"
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %err, "session_failed");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
