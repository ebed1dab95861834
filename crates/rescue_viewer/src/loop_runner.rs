//! The poll loop.
//!
//! One request at startup yields the initial board; every completed
//! reconciliation cycle triggers exactly one more request, until the server
//! reports `simulation_finished`. Parse and fatal input errors stop the loop
//! (fail-closed, no automatic retry) so a corrupt batch cannot cascade into
//! nonsense scene state.

use gridscene::{GridRegistry, RegistryError};
use thiserror::Error;
use tracing::{error, info};

use crate::batch::{parse_incremental, parse_initial, ParseError};
use crate::build::build_scene;
use crate::reconcile::{ReconcileError, ReconcileScheduler};
use crate::transport::{BatchSource, TransportError, ACK_PAYLOAD};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("scene construction failed: {0}")]
    Build(#[from] RegistryError),
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
}

#[derive(Debug)]
pub struct SessionSummary {
    pub registry: GridRegistry,
    pub batches_applied: usize,
}

/// Fetches the initial board and reconciles incremental batches until the
/// simulation finishes.
pub async fn run_session<S: BatchSource>(
    source: &S,
    scheduler: &mut ReconcileScheduler,
) -> Result<SessionSummary, SessionError> {
    let raw = source.fetch(ACK_PAYLOAD).await?;
    let initial = parse_initial(&raw)?;
    let mut registry = build_scene(&initial)?;
    info!(
        damage_points = initial.scoreboard.damage_points,
        people_lost = initial.scoreboard.people_lost,
        people_rescued = initial.scoreboard.people_rescued,
        "initial_board_ready"
    );

    let mut batches_applied = 0usize;
    while !scheduler.simulation_finished() {
        // The gate: a new batch is requested only while no reconciliation
        // is in flight.
        debug_assert!(scheduler.is_idle());
        let raw = source.fetch(ACK_PAYLOAD).await?;
        let batch = parse_incremental(&raw)?;
        if let Err(err) = scheduler.apply_incremental(&mut registry, batch).await {
            error!(error = %err, "batch reconciliation aborted");
            return Err(err.into());
        }
        batches_applied += 1;
    }

    info!(batches_applied, "simulation_finished");
    Ok(SessionSummary {
        registry,
        batches_applied,
    })
}
