//! Reconciliation scheduling.
//!
//! One cooperative run per received batch: action replay, fire/smoke sync,
//! explosion cascade, POI removal sweep, POI placement sweep, strictly in
//! that order. The scheduler owns the registry for the duration of a run;
//! the transport gate is tied to the terminal transition back to
//! `WaitingForBatch`, never to wall-clock time.

pub mod cascade;
pub mod mutate;
pub mod partition;
pub mod replay;

use gridscene::{GridRegistry, RegistryError};
use thiserror::Error;
use tracing::{debug, info};

use crate::batch::{FatalInputError, GridDims, IncrementalBatch, Scoreboard};
use crate::pace::Pacer;
use cascade::CascadeResolver;
use partition::partition;
use replay::ActionReplayProcessor;

/// Dwell after each synced fire/smoke diff application.
pub const FIRE_SYNC_DWELL_UNITS: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    WaitingForBatch,
    Replaying,
    SyncingFireSmoke,
    RunningExplosions,
    SweepingPoi,
    SettlingNewPoi,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Fatal(#[from] FatalInputError),
    #[error("scene registry rejected a mutation: {0}")]
    Registry(#[from] RegistryError),
}

pub struct ReconcileScheduler {
    replay: ActionReplayProcessor,
    cascade: CascadeResolver,
    pacer: Pacer,
    phase: Phase,
    scoreboard: Scoreboard,
    finished: bool,
}

impl ReconcileScheduler {
    pub fn new(replay: ActionReplayProcessor, cascade: CascadeResolver, pacer: Pacer) -> Self {
        Self {
            replay,
            cascade,
            pacer,
            phase: Phase::WaitingForBatch,
            scoreboard: Scoreboard::default(),
            finished: false,
        }
    }

    pub fn with_pacer(pacer: Pacer) -> Self {
        Self::new(ActionReplayProcessor::default(), CascadeResolver, pacer)
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The transport layer's "may I send the next request" gate.
    pub fn is_idle(&self) -> bool {
        self.phase == Phase::WaitingForBatch
    }

    pub fn scoreboard(&self) -> Scoreboard {
        self.scoreboard
    }

    pub fn simulation_finished(&self) -> bool {
        self.finished
    }

    /// Plays one incremental batch against the registry. On error the
    /// scheduler stays out of `WaitingForBatch`: phases already completed
    /// stay completed and polling is suppressed.
    pub async fn apply_incremental(
        &mut self,
        registry: &mut GridRegistry,
        batch: IncrementalBatch,
    ) -> Result<(), ReconcileError> {
        if !self.is_idle() {
            return Err(FatalInputError::BatchInFlight.into());
        }
        let dims = GridDims {
            width: registry.width(),
            height: registry.height(),
        };
        batch.validate(dims)?;
        let parts = partition(batch);
        self.scoreboard = parts.scoreboard;
        self.replay.reset();

        self.phase = Phase::Replaying;
        debug!(actions = parts.actions.len(), "phase_replaying");
        self.replay
            .replay(registry, &self.pacer, &parts.actions)
            .await?;

        self.phase = Phase::SyncingFireSmoke;
        debug!(diffs = parts.fire_sync.len(), "phase_fire_smoke_sync");
        for diff in &parts.fire_sync {
            mutate::set_fire_or_smoke(registry, diff.position, diff.value)?;
            self.pacer.dwell(FIRE_SYNC_DWELL_UNITS).await;
        }

        self.phase = Phase::RunningExplosions;
        debug!(epicenters = parts.cascade.len(), "phase_explosions");
        self.cascade
            .run(registry, &self.pacer, &parts.cascade)
            .await?;

        self.phase = Phase::SweepingPoi;
        debug!(removals = parts.poi_removals.len(), "phase_poi_sweep");
        for diff in &parts.poi_removals {
            mutate::set_poi(registry, diff.position, diff.transition)?;
        }

        self.phase = Phase::SettlingNewPoi;
        debug!(placements = parts.poi_placements.len(), "phase_poi_settle");
        for diff in &parts.poi_placements {
            mutate::set_poi(registry, diff.position, diff.transition)?;
        }

        parts.unclaimed.report();
        self.finished = parts.simulation_finished;
        info!(
            damage_points = self.scoreboard.damage_points,
            people_lost = self.scoreboard.people_lost,
            people_rescued = self.scoreboard.people_rescued,
            finished = self.finished,
            "batch_reconciled"
        );
        self.phase = Phase::WaitingForBatch;
        Ok(())
    }
}
