//! Ordered action-log replay.
//!
//! Actions are the only sequencing signal for per-agent effects: one action
//! is fully applied, including its own pacing, before the next begins.
//! Several kinds touch the same per-agent or per-cell resources
//! (`pick_up_victim` reveals the POI before marking the agent as carrying),
//! so nothing here may run concurrently.

use gridscene::{AgentId, GridRegistry, Position, RegistryError, SlotKey};
use tracing::{debug, warn};

use crate::batch::{Action, PoiTransition};
use crate::pace::Pacer;
use crate::reconcile::mutate;

/// Dwell per movement interpolation tick.
pub const MOVE_TICK_UNITS: f32 = 0.1;
/// Interpolation ticks per single-cell move.
pub const MOVE_STEPS: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayState {
    Idle,
    Replaying { index: usize },
    Done,
}

#[derive(Debug)]
pub struct ActionReplayProcessor {
    state: ReplayState,
}

impl Default for ActionReplayProcessor {
    fn default() -> Self {
        Self {
            state: ReplayState::Idle,
        }
    }
}

impl ActionReplayProcessor {
    pub fn state(&self) -> ReplayState {
        self.state
    }

    pub async fn replay(
        &mut self,
        registry: &mut GridRegistry,
        pacer: &Pacer,
        actions: &[Action],
    ) -> Result<(), RegistryError> {
        for (index, action) in actions.iter().enumerate() {
            self.state = ReplayState::Replaying { index };
            debug!(index, agent = action.agent().0, "replaying_action");
            apply_action(registry, pacer, action).await?;
        }
        self.state = ReplayState::Done;
        Ok(())
    }

    /// Resets to `Idle` for the next batch.
    pub fn reset(&mut self) {
        self.state = ReplayState::Idle;
    }
}

async fn apply_action(
    registry: &mut GridRegistry,
    pacer: &Pacer,
    action: &Action,
) -> Result<(), RegistryError> {
    match action {
        Action::Move { agent, from, to } => move_agent(registry, pacer, *agent, *from, *to).await,
        Action::ExtinguishFire { position, .. } => {
            mutate::clear_marker(registry, *position, SlotKey::Fire)
        }
        Action::ExtinguishSmoke { position, .. } => {
            mutate::clear_marker(registry, *position, SlotKey::Smoke)
        }
        Action::OpenDoor { a, b, .. } => mutate::open_door(registry, *a, *b),
        Action::PickUpVictim { agent, position } => {
            pick_up_victim(registry, *agent, *position)
        }
        Action::DropVictim { agent, position } => drop_victim(registry, *agent, *position),
        Action::RevealPoiVictim { position, .. } => {
            mutate::set_poi(registry, *position, PoiTransition::ShowVictim)
        }
        Action::RevealPoiFalseAlarm { position, .. } => {
            mutate::set_poi(registry, *position, PoiTransition::RevealFalseAlarm)
        }
        Action::Unknown { agent, kind } => {
            warn!(agent = agent.0, kind, "unknown action kind skipped");
            Ok(())
        }
    }
}

async fn move_agent(
    registry: &mut GridRegistry,
    pacer: &Pacer,
    agent: AgentId,
    from: Position,
    to: Position,
) -> Result<(), RegistryError> {
    if registry.agent(agent).is_none() {
        warn!(agent = agent.0, "move for an unknown agent skipped");
        return Ok(());
    }
    let start = from.world();
    let end = to.world();
    for step in 1..=MOVE_STEPS {
        let t = step as f32 / MOVE_STEPS as f32;
        registry.set_agent_world(agent, start.lerp(end, t))?;
        pacer.dwell(MOVE_TICK_UNITS).await;
    }
    registry.set_agent_cell(agent, to)
}

fn pick_up_victim(
    registry: &mut GridRegistry,
    agent: AgentId,
    position: Position,
) -> Result<(), RegistryError> {
    if registry.agent(agent).is_none() {
        warn!(agent = agent.0, "pick_up_victim for an unknown agent skipped");
        return Ok(());
    }
    // The marker is revealed first, then leaves the board with the agent.
    mutate::set_poi(registry, position, PoiTransition::ShowVictim)?;
    if registry.find(position, SlotKey::Poi).is_some() {
        mutate::clear_marker(registry, position, SlotKey::Poi)?;
    }
    registry.set_agent_carrying(agent, true)
}

fn drop_victim(
    registry: &mut GridRegistry,
    agent: AgentId,
    position: Position,
) -> Result<(), RegistryError> {
    match registry.agent(agent).map(|node| node.carrying_victim) {
        Some(true) => {
            debug!(agent = agent.0, position = %position, "victim_dropped");
            registry.set_agent_carrying(agent, false)
        }
        Some(false) => {
            warn!(agent = agent.0, "drop_victim while carrying nothing");
            Ok(())
        }
        None => {
            warn!(agent = agent.0, "drop_victim for an unknown agent skipped");
            Ok(())
        }
    }
}
