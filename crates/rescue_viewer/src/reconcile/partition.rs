//! Partitions an incremental batch's diff lists by consumer before any
//! mutation begins, so no phase ever mutates a list another phase scans.
//! Each entry is claimed by exactly one consumer; whatever is left over is
//! reported once at the end of the batch.

use gridscene::{DoorStatus, Position, Side};
use tracing::warn;

use crate::batch::{
    Action, DamageDiff, DoorDiff, FireDiff, IncrementalBatch, PoiDiff, Scoreboard, WallDiff,
};

/// Everything the cascade resolver consumes for one epicenter, in the order
/// the sub-phases visit it.
#[derive(Debug, Clone, PartialEq)]
pub struct EpicenterClaims {
    pub epicenter: Position,
    pub doors: Vec<DoorDiff>,
    pub walls: Vec<WallDiff>,
    pub damage: Vec<DamageDiff>,
    pub fires: Vec<FireDiff>,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct UnclaimedDiffs {
    pub walls: Vec<WallDiff>,
    pub damage: Vec<DamageDiff>,
    pub doors: Vec<DoorDiff>,
    pub pois: Vec<PoiDiff>,
}

impl UnclaimedDiffs {
    pub fn is_empty(&self) -> bool {
        self.walls.is_empty()
            && self.damage.is_empty()
            && self.doors.is_empty()
            && self.pois.is_empty()
    }

    pub fn report(&self) {
        for diff in &self.walls {
            warn!(position = %diff.position, "wall diff matched no explosion; dropped");
        }
        for diff in &self.damage {
            warn!(position = %diff.position, "damage diff matched no explosion; dropped");
        }
        for diff in &self.doors {
            warn!(a = %diff.a, b = %diff.b, status = ?diff.status, "door diff had no consumer; dropped");
        }
        for diff in &self.pois {
            warn!(
                position = %diff.position,
                transition = ?diff.transition,
                "poi transition had no consumer; dropped"
            );
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PartitionedBatch {
    pub scoreboard: Scoreboard,
    pub actions: Vec<Action>,
    pub fire_sync: Vec<FireDiff>,
    pub cascade: Vec<EpicenterClaims>,
    pub poi_removals: Vec<PoiDiff>,
    pub poi_placements: Vec<PoiDiff>,
    pub unclaimed: UnclaimedDiffs,
    pub simulation_finished: bool,
}

pub fn partition(batch: IncrementalBatch) -> PartitionedBatch {
    let IncrementalBatch {
        scoreboard,
        actions,
        fires,
        walls,
        damage,
        pois,
        doors,
        explosions,
        simulation_finished,
    } = batch;

    let mut fire_claimed = vec![false; fires.len()];
    let mut wall_claimed = vec![false; walls.len()];
    let mut damage_claimed = vec![false; damage.len()];
    let mut door_claimed = vec![false; doors.len()];

    let cascade = explosions
        .iter()
        .map(|&epicenter| {
            let claimed_doors = claim(&doors, &mut door_claimed, |diff| {
                diff.status == DoorStatus::Destroyed
                    && (diff.a == epicenter || diff.b == epicenter)
            });
            let claimed_walls = claim(&walls, &mut wall_claimed, |diff| diff.position == epicenter);
            let claimed_damage =
                claim(&damage, &mut damage_claimed, |diff| diff.position == epicenter);

            // Fire propagation scans the four orthogonal neighbors in
            // fixed order; within a side the list is walked from the back,
            // the safe order for in-place removal.
            let mut claimed_fires = Vec::new();
            for side in Side::ALL {
                let Some(neighbor) = epicenter.neighbor(side) else {
                    continue;
                };
                for index in (0..fires.len()).rev() {
                    if !fire_claimed[index] && fires[index].position == neighbor {
                        fire_claimed[index] = true;
                        claimed_fires.push(fires[index]);
                    }
                }
            }

            EpicenterClaims {
                epicenter,
                doors: claimed_doors,
                walls: claimed_walls,
                damage: claimed_damage,
                fires: claimed_fires,
            }
        })
        .collect();

    let fire_sync = fires
        .iter()
        .zip(&fire_claimed)
        .filter(|(_, claimed)| !**claimed)
        .map(|(diff, _)| *diff)
        .collect();

    let mut poi_removals = Vec::new();
    let mut poi_placements = Vec::new();
    let mut unclaimed_pois = Vec::new();
    for diff in pois {
        if diff.transition.is_removal() {
            poi_removals.push(diff);
        } else if diff.transition.is_placement() {
            poi_placements.push(diff);
        } else {
            // Reveal transitions are driven by the action log, not the
            // diff list; a stray one has no consumer.
            debug_assert!(diff.transition.is_reveal());
            unclaimed_pois.push(diff);
        }
    }

    let unclaimed = UnclaimedDiffs {
        walls: drop_claimed(walls, &wall_claimed),
        damage: drop_claimed(damage, &damage_claimed),
        doors: drop_claimed(doors, &door_claimed),
        pois: unclaimed_pois,
    };

    PartitionedBatch {
        scoreboard,
        actions,
        fire_sync,
        cascade,
        poi_removals,
        poi_placements,
        unclaimed,
        simulation_finished,
    }
}

fn claim<T: Copy>(items: &[T], claimed: &mut [bool], mut matches: impl FnMut(&T) -> bool) -> Vec<T> {
    let mut taken = Vec::new();
    for (index, item) in items.iter().enumerate() {
        if !claimed[index] && matches(item) {
            claimed[index] = true;
            taken.push(*item);
        }
    }
    taken
}

fn drop_claimed<T>(items: Vec<T>, claimed: &[bool]) -> Vec<T> {
    items
        .into_iter()
        .zip(claimed)
        .filter(|(_, claimed)| !**claimed)
        .map(|(item, _)| item)
        .collect()
}
