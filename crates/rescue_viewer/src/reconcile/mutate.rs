//! Cell mutation primitives.
//!
//! Each primitive applies one visual change through the registry. A target
//! that no longer holds the expected element is a recoverable condition:
//! the mutation is skipped with a warning and processing continues. Grid
//! invariant violations (out-of-range cells reaching this layer, double
//! placement) propagate as registry errors.

use gridscene::{
    DoorStatus, ElementDescriptor, ElementFx, ElementId, ElementTransform, GridRegistry, PoiKind,
    PoiVisibility, Position, RegistryError, Side, SlotKey, Vec3,
};
use tracing::{debug, warn};

use crate::batch::{FireValue, PoiTransition};
use crate::pace::Pacer;

/// Dwell between applying a destruction impulse and purging the element, so
/// the detachment stays visible.
pub const DESTROY_DWELL_UNITS: f32 = 1.5;
/// Dwell holding a damaged wall's shake before it settles.
pub const SHAKE_DWELL_UNITS: f32 = 0.5;

const POI_LIFT: Vec3 = Vec3::new(0.0, 0.5, 0.0);
const POI_EULER: Vec3 = Vec3::new(-90.0, 0.0, 0.0);

/// What a boundary segment should become.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    Wall,
    Door(DoorStatus),
}

/// Places a wall or door element at the geometrically correct offset and
/// orientation for the `position`/`side` boundary. Boundaries already
/// represented are left alone; boundary-facing sides of a registered entry
/// point receive an entry frame instead. Returns the new element, if any.
pub fn set_wall_or_door(
    registry: &mut GridRegistry,
    position: Position,
    side: Side,
    segment: SegmentKind,
) -> Result<Option<ElementId>, RegistryError> {
    let (owner, side) = gridscene::boundary_owner(position, side);
    registry.resolve(owner)?;
    if registry.find(owner, SlotKey::Wall(side)).is_some()
        || registry.find(owner, SlotKey::Door(side)).is_some()
    {
        // Both cells of a shared boundary may assert it; draw it once.
        return Ok(None);
    }

    let geometry = side.geometry();
    let boundary_facing = match owner.neighbor(side) {
        Some(neighbor) => !registry.contains(neighbor),
        None => true,
    };
    if boundary_facing && registry.is_entry_point(owner) {
        let transform = ElementTransform {
            position: owner.world() + geometry.frame_offset,
            euler_degrees: geometry.frame_euler_degrees,
        };
        let id = registry.place(owner, SlotKey::Door(side), ElementDescriptor::EntryFrame, transform)?;
        return Ok(Some(id));
    }

    match segment {
        SegmentKind::Wall => {
            let transform = ElementTransform {
                position: owner.world() + geometry.wall_offset,
                euler_degrees: geometry.wall_euler_degrees,
            };
            let id = registry.place(owner, SlotKey::Wall(side), ElementDescriptor::Wall, transform)?;
            Ok(Some(id))
        }
        SegmentKind::Door(DoorStatus::Destroyed) => {
            debug!(position = %owner, %side, "destroyed door leaves no element");
            Ok(None)
        }
        SegmentKind::Door(status) => {
            let transform = ElementTransform {
                position: owner.world() + geometry.door_offset,
                euler_degrees: geometry.door_euler_degrees,
            };
            let id = registry.place(
                owner,
                SlotKey::Door(side),
                ElementDescriptor::Door { status },
                transform,
            )?;
            Ok(Some(id))
        }
    }
}

/// Applies the detachment effect to `element` and removes it after the
/// removal dwell. Pushes along `impulse_side`'s outward impulse.
pub async fn destroy(
    registry: &mut GridRegistry,
    pacer: &Pacer,
    element: ElementId,
    impulse_side: Side,
) -> Result<(), RegistryError> {
    if registry.element(element).is_none() {
        warn!(element = element.raw(), "destroy target is already gone");
        return Ok(());
    }
    registry.set_fx(
        element,
        ElementFx::Detaching {
            impulse: impulse_side.geometry().impulse,
        },
    )?;
    pacer.dwell(DESTROY_DWELL_UNITS).await;
    registry.remove(element)?;
    Ok(())
}

/// Transient shake for a structurally weakened (not destroyed) wall.
pub async fn shake(
    registry: &mut GridRegistry,
    pacer: &Pacer,
    element: ElementId,
) -> Result<(), RegistryError> {
    if registry.element(element).is_none() {
        warn!(element = element.raw(), "shake target is already gone");
        return Ok(());
    }
    registry.set_fx(element, ElementFx::Shaking)?;
    pacer.dwell(SHAKE_DWELL_UNITS).await;
    if registry.element(element).is_some() {
        registry.set_fx(element, ElementFx::None)?;
    }
    Ok(())
}

/// Applies a tri-state fire layer value. Fire and smoke are mutually
/// exclusive; when a batch asserts both for one cell, fire wins: placing
/// fire clears smoke first, and smoke onto a burning cell is a no-op.
pub fn set_fire_or_smoke(
    registry: &mut GridRegistry,
    position: Position,
    value: FireValue,
) -> Result<(), RegistryError> {
    registry.resolve(position)?;
    let fire = registry.find(position, SlotKey::Fire);
    let smoke = registry.find(position, SlotKey::Smoke);

    match value {
        FireValue::Clear => {
            if let Some(id) = fire {
                registry.remove(id)?;
            } else if let Some(id) = smoke {
                registry.remove(id)?;
            } else {
                warn!(position = %position, "no fire or smoke to clear");
            }
        }
        FireValue::Fire => {
            if fire.is_some() {
                debug!(position = %position, "fire already present");
                return Ok(());
            }
            if let Some(id) = smoke {
                registry.remove(id)?;
            }
            registry.place(
                position,
                SlotKey::Fire,
                ElementDescriptor::Fire,
                marker_transform(position),
            )?;
        }
        FireValue::Smoke => {
            if fire.is_some() {
                warn!(position = %position, "smoke asserted on a burning cell; fire wins");
                return Ok(());
            }
            if smoke.is_some() {
                debug!(position = %position, "smoke already present");
                return Ok(());
            }
            registry.place(
                position,
                SlotKey::Smoke,
                ElementDescriptor::Smoke,
                marker_transform(position),
            )?;
        }
    }
    Ok(())
}

/// Removes a single marker element, warning when the slot is already empty.
pub fn clear_marker(
    registry: &mut GridRegistry,
    position: Position,
    slot: SlotKey,
) -> Result<(), RegistryError> {
    registry.resolve(position)?;
    match registry.find(position, slot) {
        Some(id) => {
            registry.remove(id)?;
            Ok(())
        }
        None => {
            warn!(position = %position, ?slot, "nothing to remove");
            Ok(())
        }
    }
}

/// Applies a POI transition label to the cell's marker slot.
pub fn set_poi(
    registry: &mut GridRegistry,
    position: Position,
    transition: PoiTransition,
) -> Result<(), RegistryError> {
    registry.resolve(position)?;
    let current = registry.find(position, SlotKey::Poi);

    match transition {
        PoiTransition::PlaceVictim | PoiTransition::PlaceFalseAlarm => {
            if current.is_some() {
                warn!(position = %position, "cell already holds a poi marker");
                return Ok(());
            }
            let kind = if transition == PoiTransition::PlaceVictim {
                PoiKind::Victim
            } else {
                PoiKind::FalseAlarm
            };
            registry.place(
                position,
                SlotKey::Poi,
                ElementDescriptor::Poi {
                    kind,
                    visibility: PoiVisibility::Hidden,
                },
                poi_transform(position),
            )?;
        }
        PoiTransition::ShowVictim | PoiTransition::RevealFalseAlarm => {
            let Some(id) = current else {
                warn!(position = %position, "no poi marker to reveal");
                return Ok(());
            };
            let kind = if transition == PoiTransition::ShowVictim {
                PoiKind::Victim
            } else {
                PoiKind::FalseAlarm
            };
            registry.remove(id)?;
            registry.place(
                position,
                SlotKey::Poi,
                ElementDescriptor::Poi {
                    kind,
                    visibility: PoiVisibility::Revealed,
                },
                poi_transform(position),
            )?;
        }
        PoiTransition::Death | PoiTransition::FalseAlarm => {
            let Some(id) = current else {
                warn!(position = %position, "no poi marker to remove");
                return Ok(());
            };
            registry.remove(id)?;
        }
    }
    Ok(())
}

/// Opens the door spanning the `a`/`b` boundary, if one is present.
pub fn open_door(
    registry: &mut GridRegistry,
    a: Position,
    b: Position,
) -> Result<(), RegistryError> {
    let Some(side) = Side::between(a, b) else {
        // Validation rejects this earlier; keep the fallback recoverable.
        warn!(a = %a, b = %b, "open_door endpoints are not adjacent");
        return Ok(());
    };
    let (owner, owner_side) = gridscene::boundary_owner(a, side);
    match registry.find(owner, SlotKey::Door(owner_side)) {
        Some(id) => registry.set_door_status(id, DoorStatus::Open),
        None => {
            warn!(a = %a, b = %b, "no door to open at boundary");
            Ok(())
        }
    }
}

/// Transform for cell-center markers (fire, smoke).
pub(crate) fn marker_transform(position: Position) -> ElementTransform {
    ElementTransform {
        position: position.world(),
        euler_degrees: Vec3::default(),
    }
}

/// Transform for POI markers, lifted above the floor tile.
pub(crate) fn poi_transform(position: Position) -> ElementTransform {
    ElementTransform {
        position: position.world() + POI_LIFT,
        euler_degrees: POI_EULER,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_registry() -> GridRegistry {
        GridRegistry::new(3, 3)
    }

    fn place_fire(registry: &mut GridRegistry, position: Position) {
        set_fire_or_smoke(registry, position, FireValue::Fire).expect("place fire");
    }

    #[test]
    fn applying_fire_twice_is_idempotent() {
        let mut registry = empty_registry();
        let position = Position::new(1, 1);
        place_fire(&mut registry, position);
        let first = registry.find(position, SlotKey::Fire).expect("fire");

        set_fire_or_smoke(&mut registry, position, FireValue::Fire).expect("second fire");
        assert_eq!(registry.find(position, SlotKey::Fire), Some(first));
        assert_eq!(registry.element_count(), 1);
    }

    #[test]
    fn fire_replaces_smoke() {
        let mut registry = empty_registry();
        let position = Position::new(0, 2);
        set_fire_or_smoke(&mut registry, position, FireValue::Smoke).expect("smoke");
        set_fire_or_smoke(&mut registry, position, FireValue::Fire).expect("fire");

        assert!(registry.find(position, SlotKey::Smoke).is_none());
        assert!(registry.find(position, SlotKey::Fire).is_some());
        assert_eq!(registry.element_count(), 1);
    }

    #[test]
    fn smoke_on_a_burning_cell_is_a_noop() {
        let mut registry = empty_registry();
        let position = Position::new(2, 0);
        place_fire(&mut registry, position);
        set_fire_or_smoke(&mut registry, position, FireValue::Smoke).expect("smoke");

        assert!(registry.find(position, SlotKey::Fire).is_some());
        assert!(registry.find(position, SlotKey::Smoke).is_none());
    }

    #[test]
    fn clear_removes_whichever_marker_is_present() {
        let mut registry = empty_registry();
        let position = Position::new(1, 0);
        place_fire(&mut registry, position);
        set_fire_or_smoke(&mut registry, position, FireValue::Clear).expect("clear");
        assert_eq!(registry.element_count(), 0);

        set_fire_or_smoke(&mut registry, position, FireValue::Smoke).expect("smoke");
        set_fire_or_smoke(&mut registry, position, FireValue::Clear).expect("clear");
        assert_eq!(registry.element_count(), 0);

        // Clearing an already clear cell is a warned no-op.
        set_fire_or_smoke(&mut registry, position, FireValue::Clear).expect("noop clear");
    }

    #[test]
    fn mutual_exclusion_holds_across_any_diff_sequence() {
        let mut registry = empty_registry();
        let position = Position::new(1, 1);
        let sequence = [
            FireValue::Smoke,
            FireValue::Fire,
            FireValue::Fire,
            FireValue::Smoke,
            FireValue::Clear,
            FireValue::Smoke,
        ];
        for value in sequence {
            set_fire_or_smoke(&mut registry, position, value).expect("apply");
            let fire = registry.find(position, SlotKey::Fire).is_some();
            let smoke = registry.find(position, SlotKey::Smoke).is_some();
            assert!(!(fire && smoke), "fire and smoke coexist after {value:?}");
        }
    }

    #[tokio::test]
    async fn destroy_marks_detaching_then_purges() {
        let mut registry = empty_registry();
        let wall = registry
            .place(
                Position::new(0, 0),
                SlotKey::Wall(Side::Down),
                ElementDescriptor::Wall,
                ElementTransform::default(),
            )
            .expect("wall");

        destroy(&mut registry, &Pacer::Instant, wall, Side::Down)
            .await
            .expect("destroy");
        assert!(registry.element(wall).is_none());
        assert!(registry
            .find(Position::new(0, 0), SlotKey::Wall(Side::Down))
            .is_none());
    }

    #[tokio::test]
    async fn destroy_of_a_missing_element_is_a_warned_noop() {
        let mut registry = empty_registry();
        let wall = registry
            .place(
                Position::new(0, 0),
                SlotKey::Wall(Side::Down),
                ElementDescriptor::Wall,
                ElementTransform::default(),
            )
            .expect("wall");
        registry.remove(wall).expect("remove");

        destroy(&mut registry, &Pacer::Instant, wall, Side::Down)
            .await
            .expect("destroy is recoverable");
    }

    #[tokio::test]
    async fn shake_settles_back_to_no_fx() {
        let mut registry = empty_registry();
        let wall = registry
            .place(
                Position::new(1, 1),
                SlotKey::Wall(Side::Right),
                ElementDescriptor::Wall,
                ElementTransform::default(),
            )
            .expect("wall");

        shake(&mut registry, &Pacer::Instant, wall)
            .await
            .expect("shake");
        assert_eq!(registry.element(wall).expect("wall").fx, ElementFx::None);
        assert!(registry.element(wall).is_some());
    }

    #[test]
    fn poi_lifecycle_place_reveal_remove() {
        let mut registry = empty_registry();
        let position = Position::new(2, 2);

        set_poi(&mut registry, position, PoiTransition::PlaceVictim).expect("place");
        assert_eq!(
            registry
                .element_at(position, SlotKey::Poi)
                .expect("marker")
                .descriptor,
            ElementDescriptor::Poi {
                kind: PoiKind::Victim,
                visibility: PoiVisibility::Hidden,
            }
        );

        set_poi(&mut registry, position, PoiTransition::ShowVictim).expect("reveal");
        assert_eq!(
            registry
                .element_at(position, SlotKey::Poi)
                .expect("marker")
                .descriptor,
            ElementDescriptor::Poi {
                kind: PoiKind::Victim,
                visibility: PoiVisibility::Revealed,
            }
        );

        set_poi(&mut registry, position, PoiTransition::Death).expect("remove");
        assert!(registry.find(position, SlotKey::Poi).is_none());
    }

    #[test]
    fn reveal_can_reclassify_a_hidden_marker_as_false_alarm() {
        let mut registry = empty_registry();
        let position = Position::new(0, 0);
        set_poi(&mut registry, position, PoiTransition::PlaceVictim).expect("place");
        set_poi(&mut registry, position, PoiTransition::RevealFalseAlarm).expect("reveal");
        assert_eq!(
            registry
                .element_at(position, SlotKey::Poi)
                .expect("marker")
                .descriptor,
            ElementDescriptor::Poi {
                kind: PoiKind::FalseAlarm,
                visibility: PoiVisibility::Revealed,
            }
        );
    }

    #[test]
    fn poi_transitions_without_a_marker_are_warned_noops() {
        let mut registry = empty_registry();
        let position = Position::new(1, 2);
        set_poi(&mut registry, position, PoiTransition::ShowVictim).expect("reveal noop");
        set_poi(&mut registry, position, PoiTransition::Death).expect("remove noop");
        assert_eq!(registry.element_count(), 0);
    }

    #[test]
    fn placing_over_an_existing_marker_is_skipped() {
        let mut registry = empty_registry();
        let position = Position::new(1, 2);
        set_poi(&mut registry, position, PoiTransition::PlaceVictim).expect("place");
        set_poi(&mut registry, position, PoiTransition::PlaceFalseAlarm).expect("skip");
        assert_eq!(
            registry
                .element_at(position, SlotKey::Poi)
                .expect("marker")
                .descriptor,
            ElementDescriptor::Poi {
                kind: PoiKind::Victim,
                visibility: PoiVisibility::Hidden,
            }
        );
    }

    #[test]
    fn open_door_flips_status_at_the_owning_boundary() {
        let mut registry = empty_registry();
        let door = registry
            .place(
                Position::new(0, 0),
                SlotKey::Door(Side::Right),
                ElementDescriptor::Door {
                    status: DoorStatus::Closed,
                },
                ElementTransform::default(),
            )
            .expect("door");

        // The action may name the boundary from either endpoint.
        open_door(&mut registry, Position::new(1, 0), Position::new(0, 0)).expect("open");
        assert_eq!(
            registry.element(door).expect("door").descriptor,
            ElementDescriptor::Door {
                status: DoorStatus::Open,
            }
        );
    }

    #[test]
    fn open_door_with_no_door_is_a_warned_noop() {
        let mut registry = empty_registry();
        open_door(&mut registry, Position::new(0, 0), Position::new(1, 0)).expect("noop");
    }

    #[test]
    fn set_wall_or_door_places_once_per_shared_boundary() {
        let mut registry = empty_registry();
        let first = set_wall_or_door(
            &mut registry,
            Position::new(1, 1),
            Side::Down,
            SegmentKind::Wall,
        )
        .expect("place");
        assert!(first.is_some());

        // The same boundary named from the neighbor below resolves to the
        // same owning slot and is skipped.
        let second = set_wall_or_door(
            &mut registry,
            Position::new(1, 2),
            Side::Up,
            SegmentKind::Wall,
        )
        .expect("skip");
        assert!(second.is_none());
        assert_eq!(registry.element_count(), 1);
    }

    #[test]
    fn set_wall_or_door_skips_boundaries_with_doors() {
        let mut registry = empty_registry();
        set_wall_or_door(
            &mut registry,
            Position::new(0, 0),
            Side::Right,
            SegmentKind::Door(DoorStatus::Closed),
        )
        .expect("door");
        let skipped = set_wall_or_door(
            &mut registry,
            Position::new(0, 0),
            Side::Right,
            SegmentKind::Wall,
        )
        .expect("skip");
        assert!(skipped.is_none());
        assert!(registry
            .find(Position::new(0, 0), SlotKey::Door(Side::Right))
            .is_some());
    }

    #[test]
    fn set_wall_or_door_places_entry_frames_on_boundary_sides() {
        let mut registry = empty_registry();
        registry
            .register_entry_point(Position::new(0, 0))
            .expect("entry point");
        let placed = set_wall_or_door(
            &mut registry,
            Position::new(0, 0),
            Side::Left,
            SegmentKind::Wall,
        )
        .expect("frame")
        .expect("element");
        assert_eq!(
            registry.element(placed).expect("frame").descriptor,
            ElementDescriptor::EntryFrame
        );
    }
}
