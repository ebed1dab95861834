//! Explosion cascade resolution.
//!
//! For each epicenter, in list order, exactly four sub-phases run fully
//! sequentially: destroyed doors, blasted walls, damaged-wall shakes, then
//! fire propagation into the four orthogonal neighbors. Each sub-phase
//! waits out its own dwell before the next epicenter starts.

use gridscene::{GridRegistry, Position, RegistryError, Side, SlotKey};
use tracing::{debug, warn};

use crate::batch::DoorDiff;
use crate::pace::Pacer;
use crate::reconcile::mutate;
use crate::reconcile::partition::EpicenterClaims;

/// Dwell separating cascade sub-phases.
pub const SUB_PHASE_DWELL_UNITS: f32 = 0.5;
/// Dwell after each propagated fire placement.
pub const FIRE_SPREAD_DWELL_UNITS: f32 = 0.3;

#[derive(Debug, Default)]
pub struct CascadeResolver;

impl CascadeResolver {
    pub async fn run(
        &self,
        registry: &mut GridRegistry,
        pacer: &Pacer,
        claims: &[EpicenterClaims],
    ) -> Result<(), RegistryError> {
        for claim in claims {
            debug!(epicenter = %claim.epicenter, "explosion_cascade");
            self.door_phase(registry, pacer, claim).await?;
            self.wall_phase(registry, pacer, claim).await?;
            self.damage_phase(registry, pacer, claim).await?;
            self.fire_phase(registry, pacer, claim).await?;
        }
        Ok(())
    }

    async fn door_phase(
        &self,
        registry: &mut GridRegistry,
        pacer: &Pacer,
        claim: &EpicenterClaims,
    ) -> Result<(), RegistryError> {
        for diff in &claim.doors {
            let Some(side) = door_side_at_epicenter(diff, claim.epicenter) else {
                warn!(a = %diff.a, b = %diff.b, "destroyed door does not touch epicenter");
                continue;
            };
            let (owner, owner_side) = gridscene::boundary_owner(claim.epicenter, side);
            match registry.find(owner, SlotKey::Door(owner_side)) {
                Some(id) => mutate::destroy(registry, pacer, id, side).await?,
                None => {
                    warn!(a = %diff.a, b = %diff.b, "no door element to destroy");
                }
            }
        }
        pacer.dwell(SUB_PHASE_DWELL_UNITS).await;
        Ok(())
    }

    async fn wall_phase(
        &self,
        registry: &mut GridRegistry,
        pacer: &Pacer,
        claim: &EpicenterClaims,
    ) -> Result<(), RegistryError> {
        for diff in &claim.walls {
            for side in diff.mask.cleared_sides() {
                let (owner, owner_side) = gridscene::boundary_owner(diff.position, side);
                match registry.find(owner, SlotKey::Wall(owner_side)) {
                    Some(id) => mutate::destroy(registry, pacer, id, side).await?,
                    None => {
                        // A cleared bit may simply mean the side never had
                        // a wall; only standing walls fall.
                        debug!(position = %diff.position, %side, "no wall at cleared side");
                    }
                }
            }
        }
        pacer.dwell(SUB_PHASE_DWELL_UNITS).await;
        Ok(())
    }

    async fn damage_phase(
        &self,
        registry: &mut GridRegistry,
        pacer: &Pacer,
        claim: &EpicenterClaims,
    ) -> Result<(), RegistryError> {
        for diff in &claim.damage {
            for side in diff.damaged_sides() {
                let (owner, owner_side) = gridscene::boundary_owner(diff.position, side);
                match registry.find(owner, SlotKey::Wall(owner_side)) {
                    Some(id) => mutate::shake(registry, pacer, id).await?,
                    None => {
                        warn!(position = %diff.position, %side, "no wall to shake");
                    }
                }
            }
        }
        pacer.dwell(SUB_PHASE_DWELL_UNITS).await;
        Ok(())
    }

    async fn fire_phase(
        &self,
        registry: &mut GridRegistry,
        pacer: &Pacer,
        claim: &EpicenterClaims,
    ) -> Result<(), RegistryError> {
        for diff in &claim.fires {
            mutate::set_fire_or_smoke(registry, diff.position, diff.value)?;
            pacer.dwell(FIRE_SPREAD_DWELL_UNITS).await;
        }
        pacer.dwell(SUB_PHASE_DWELL_UNITS).await;
        Ok(())
    }
}

fn door_side_at_epicenter(diff: &DoorDiff, epicenter: Position) -> Option<Side> {
    if diff.a == epicenter {
        Side::between(diff.a, diff.b)
    } else if diff.b == epicenter {
        Side::between(diff.b, diff.a)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::parse_incremental;
    use crate::reconcile::partition::partition;
    use gridscene::{DoorStatus, ElementDescriptor, ElementFx, ElementTransform};

    fn wall(registry: &mut GridRegistry, position: Position, side: Side) -> gridscene::ElementId {
        registry
            .place(
                position,
                SlotKey::Wall(side),
                ElementDescriptor::Wall,
                ElementTransform::default(),
            )
            .expect("wall")
    }

    fn door(registry: &mut GridRegistry, position: Position, side: Side) -> gridscene::ElementId {
        registry
            .place(
                position,
                SlotKey::Door(side),
                ElementDescriptor::Door {
                    status: DoorStatus::Closed,
                },
                ElementTransform::default(),
            )
            .expect("door")
    }

    async fn run_cascade(registry: &mut GridRegistry, raw: &str) {
        let parts = partition(parse_incremental(raw).expect("parse"));
        CascadeResolver
            .run(registry, &Pacer::Instant, &parts.cascade)
            .await
            .expect("cascade");
    }

    #[tokio::test]
    async fn destroyed_door_diff_removes_the_door_element() {
        let mut registry = GridRegistry::new(3, 3);
        let id = door(&mut registry, Position::new(1, 1), Side::Down);

        run_cascade(
            &mut registry,
            r#"{
                "doors": [{"position": [[1, 1], [1, 2]], "new_value": "destroyed"}],
                "explosions": [{"position": [1, 1]}]
            }"#,
        )
        .await;

        assert!(registry.element(id).is_none());
    }

    #[tokio::test]
    async fn destroyed_door_resolves_from_the_far_endpoint_too() {
        // The same boundary, but the epicenter is the higher-indexed cell
        // and the diff lists the endpoints in the other order.
        let mut registry = GridRegistry::new(3, 3);
        let id = door(&mut registry, Position::new(1, 1), Side::Down);

        run_cascade(
            &mut registry,
            r#"{
                "doors": [{"position": [[1, 1], [1, 2]], "new_value": "destroyed"}],
                "explosions": [{"position": [1, 2]}]
            }"#,
        )
        .await;

        assert!(registry.element(id).is_none());
    }

    #[tokio::test]
    async fn cleared_wall_bits_destroy_only_standing_walls() {
        let mut registry = GridRegistry::new(3, 3);
        let epicenter = Position::new(1, 1);
        let down = wall(&mut registry, epicenter, Side::Down);
        let right = wall(&mut registry, epicenter, Side::Right);

        // New mask 0b1001 keeps up+right, clears left+down; only the down
        // wall exists, so only it falls.
        run_cascade(
            &mut registry,
            r#"{
                "walls": [{"position": [1, 1], "new_value": 9}],
                "explosions": [{"position": [1, 1]}]
            }"#,
        )
        .await;

        assert!(registry.element(down).is_none());
        assert!(registry.element(right).is_some());
    }

    #[tokio::test]
    async fn wall_destruction_resolves_ownership_across_the_boundary() {
        // The epicenter's Up boundary is owned by the neighbor above as its
        // Down side.
        let mut registry = GridRegistry::new(3, 3);
        let owned_by_neighbor = wall(&mut registry, Position::new(1, 0), Side::Down);

        run_cascade(
            &mut registry,
            r#"{
                "walls": [{"position": [1, 1], "new_value": 7}],
                "explosions": [{"position": [1, 1]}]
            }"#,
        )
        .await;

        assert!(registry.element(owned_by_neighbor).is_none());
    }

    #[tokio::test]
    async fn damage_shakes_without_destroying() {
        let mut registry = GridRegistry::new(3, 3);
        let id = wall(&mut registry, Position::new(1, 1), Side::Down);

        run_cascade(
            &mut registry,
            r#"{
                "damage": [{"position": [1, 1], "new_value": [0, 0, 1, 0]}],
                "explosions": [{"position": [1, 1]}]
            }"#,
        )
        .await;

        let element = registry.element(id).expect("wall still standing");
        assert_eq!(element.fx, ElementFx::None);
    }

    #[tokio::test]
    async fn fire_propagates_into_claimed_neighbors() {
        let mut registry = GridRegistry::new(3, 3);

        run_cascade(
            &mut registry,
            r#"{
                "fires": [
                    {"position": [1, 0], "new_value": 1},
                    {"position": [0, 1], "new_value": 0.5}
                ],
                "explosions": [{"position": [1, 1]}]
            }"#,
        )
        .await;

        assert!(registry.find(Position::new(1, 0), SlotKey::Fire).is_some());
        assert!(registry
            .find(Position::new(0, 1), SlotKey::Smoke)
            .is_some());
    }

    #[tokio::test]
    async fn door_and_wall_phases_run_before_fire_phase() {
        // Explosion at (1,1) with new wall mask 0b1011 (left side cleared)
        // and a fire diff at the cleared neighbor: the wall falls and the
        // neighbor catches fire, wall phase first regardless of the diff
        // list order in the payload.
        let mut registry = GridRegistry::new(3, 3);
        // The epicenter's Left boundary element, at its owning address.
        let blasted = wall(&mut registry, Position::new(0, 1), Side::Right);

        run_cascade(
            &mut registry,
            r#"{
                "fires": [{"position": [0, 1], "new_value": 1}],
                "walls": [{"position": [1, 1], "new_value": 11}],
                "explosions": [{"position": [1, 1]}]
            }"#,
        )
        .await;

        assert!(registry.element(blasted).is_none());
        assert!(registry.find(Position::new(0, 1), SlotKey::Fire).is_some());
    }
}
