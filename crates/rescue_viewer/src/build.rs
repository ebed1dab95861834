//! Scene construction from the initial board snapshot.
//!
//! Produces exactly one scene element per asserted wall/door/fire/POI/agent
//! entry. Shared boundaries are drawn once, by their owning cell (see
//! `gridscene::boundary_owner`); entry-point cells get an entry frame on
//! their boundary-facing sides instead of a wall or door.

use gridscene::{
    boundary_owner, ElementDescriptor, GridRegistry, PoiVisibility, Position, RegistryError, Side,
    SlotKey,
};
use tracing::{info, warn};

use crate::batch::{DoorSpec, FireValue, GridDims, InitialBatch};
use crate::reconcile::mutate::{marker_transform, poi_transform, set_wall_or_door, SegmentKind};

pub fn build_grid(dims: GridDims) -> GridRegistry {
    GridRegistry::new(dims.width, dims.height)
}

/// Builds the whole scene for an initial batch.
pub fn build_scene(batch: &InitialBatch) -> Result<GridRegistry, RegistryError> {
    let mut registry = build_grid(batch.dims);
    place_static_walls(&mut registry, batch)?;
    place_initial_fires(&mut registry, batch)?;
    place_initial_pois(&mut registry, batch)?;
    place_agents(&mut registry, batch)?;
    info!(
        width = batch.dims.width,
        height = batch.dims.height,
        elements = registry.element_count(),
        agents = registry.agent_count(),
        "scene_built"
    );
    Ok(registry)
}

pub fn place_static_walls(
    registry: &mut GridRegistry,
    batch: &InitialBatch,
) -> Result<(), RegistryError> {
    for entry_point in &batch.entry_points {
        registry.register_entry_point(*entry_point)?;
    }

    for col in 0..batch.dims.width {
        for row in 0..batch.dims.height {
            let position = Position::new(col, row);
            let mask = batch.wall_mask_at(position);
            for side in mask.asserted_sides() {
                let (owner, owner_side) = boundary_owner(position, side);
                place_boundary_segment(registry, batch, owner, owner_side)?;
            }
        }
    }
    Ok(())
}

fn place_boundary_segment(
    registry: &mut GridRegistry,
    batch: &InitialBatch,
    position: Position,
    side: Side,
) -> Result<(), RegistryError> {
    let segment = match door_spanning(batch, position, side) {
        Some(door) => SegmentKind::Door(door.status),
        None => SegmentKind::Wall,
    };
    set_wall_or_door(registry, position, side, segment)?;
    Ok(())
}

fn door_spanning(batch: &InitialBatch, position: Position, side: Side) -> Option<&DoorSpec> {
    let neighbor = position.neighbor(side)?;
    batch.doors.iter().find(|door| {
        (door.a == position && door.b == neighbor) || (door.a == neighbor && door.b == position)
    })
}

pub fn place_initial_fires(
    registry: &mut GridRegistry,
    batch: &InitialBatch,
) -> Result<(), RegistryError> {
    for row in 0..batch.dims.height {
        for col in 0..batch.dims.width {
            let position = Position::new(col, row);
            let (slot, descriptor) = match batch.fire_at(position) {
                FireValue::Clear => continue,
                FireValue::Smoke => (SlotKey::Smoke, ElementDescriptor::Smoke),
                FireValue::Fire => (SlotKey::Fire, ElementDescriptor::Fire),
            };
            registry.place(position, slot, descriptor, marker_transform(position))?;
        }
    }
    Ok(())
}

pub fn place_initial_pois(
    registry: &mut GridRegistry,
    batch: &InitialBatch,
) -> Result<(), RegistryError> {
    for row in 0..batch.dims.height {
        for col in 0..batch.dims.width {
            let position = Position::new(col, row);
            let Some(kind) = batch.poi_at(position) else {
                continue;
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
    }
    Ok(())
}

pub fn place_agents(
    registry: &mut GridRegistry,
    batch: &InitialBatch,
) -> Result<(), RegistryError> {
    for agent in &batch.agents {
        if let Err(error) = registry.place_agent(agent.id, agent.position) {
            match error {
                RegistryError::DuplicateAgent(id) => {
                    warn!(agent = id.0, "duplicate agent start position ignored");
                }
                other => return Err(other),
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::parse_initial;
    use gridscene::{AgentId, DoorStatus, ElementFx, PoiKind};

    fn minimal_board() -> InitialBatch {
        parse_initial(
            r#"{
                "width": 2,
                "height": 1,
                "walls": [[0], [0]],
                "fires": [[0, 0]],
                "points_of_interest": [["", "v"]],
                "doors": [],
                "entry_points": [],
                "agent_positions": [{"agentID": 1, "position": [0, 0]}]
            }"#,
        )
        .expect("parse")
    }

    #[test]
    fn minimal_board_builds_one_poi_and_one_agent() {
        let batch = minimal_board();
        let registry = build_scene(&batch).expect("build");

        assert_eq!(registry.element_count(), 1);
        let poi = registry
            .element_at(Position::new(1, 0), SlotKey::Poi)
            .expect("poi element");
        assert_eq!(
            poi.descriptor,
            ElementDescriptor::Poi {
                kind: PoiKind::Victim,
                visibility: PoiVisibility::Hidden,
            }
        );
        assert_eq!(poi.fx, ElementFx::None);

        assert_eq!(registry.agent_count(), 1);
        let agent = registry.agent(AgentId(1)).expect("agent");
        assert_eq!(agent.cell, Position::new(0, 0));
        assert!(!agent.carrying_victim);
    }

    #[test]
    fn shared_boundaries_are_drawn_once_by_the_lower_indexed_cell() {
        // Two cells side by side, both asserting the shared boundary:
        // cell (0,0) asserts Right (0b0001), cell (1,0) asserts Left (0b0100).
        let batch = parse_initial(
            r#"{
                "width": 2,
                "height": 1,
                "walls": [[1], [4]],
                "fires": [[0, 0]],
                "points_of_interest": [["", ""]],
                "doors": [],
                "entry_points": [],
                "agent_positions": []
            }"#,
        )
        .expect("parse");
        let registry = build_scene(&batch).expect("build");

        assert_eq!(registry.element_count(), 1);
        assert!(registry
            .find(Position::new(0, 0), SlotKey::Wall(Side::Right))
            .is_some());
        assert!(registry
            .find(Position::new(1, 0), SlotKey::Wall(Side::Left))
            .is_none());
    }

    #[test]
    fn perimeter_sides_are_owned_by_the_boundary_cell() {
        // A single cell walled on all four sides.
        let batch = parse_initial(
            r#"{
                "width": 1,
                "height": 1,
                "walls": [[15]],
                "fires": [[0]],
                "points_of_interest": [[""]],
                "doors": [],
                "entry_points": [],
                "agent_positions": []
            }"#,
        )
        .expect("parse");
        let registry = build_scene(&batch).expect("build");

        assert_eq!(registry.element_count(), 4);
        for side in Side::ALL {
            assert!(
                registry
                    .find(Position::new(0, 0), SlotKey::Wall(side))
                    .is_some(),
                "missing {side} wall"
            );
        }
    }

    #[test]
    fn doors_replace_walls_on_their_boundary() {
        let batch = parse_initial(
            r#"{
                "width": 2,
                "height": 1,
                "walls": [[1], [4]],
                "fires": [[0, 0]],
                "points_of_interest": [["", ""]],
                "doors": [{"coord1": [0, 0], "coord2": [1, 0], "status": "closed"}],
                "entry_points": [],
                "agent_positions": []
            }"#,
        )
        .expect("parse");
        let registry = build_scene(&batch).expect("build");

        assert_eq!(registry.element_count(), 1);
        assert!(registry
            .find(Position::new(0, 0), SlotKey::Wall(Side::Right))
            .is_none());
        let door = registry
            .element_at(Position::new(0, 0), SlotKey::Door(Side::Right))
            .expect("door element");
        assert_eq!(
            door.descriptor,
            ElementDescriptor::Door {
                status: DoorStatus::Closed,
            }
        );
    }

    #[test]
    fn entry_points_get_a_frame_instead_of_a_boundary_wall() {
        // Entry point at (0,0) with a wall asserted on its Up perimeter side.
        let batch = parse_initial(
            r#"{
                "width": 2,
                "height": 1,
                "walls": [[8], [0]],
                "fires": [[0, 0]],
                "points_of_interest": [["", ""]],
                "doors": [],
                "entry_points": [[0, 0]],
                "agent_positions": []
            }"#,
        )
        .expect("parse");
        let registry = build_scene(&batch).expect("build");

        assert_eq!(registry.element_count(), 1);
        assert!(registry
            .find(Position::new(0, 0), SlotKey::Wall(Side::Up))
            .is_none());
        let frame = registry
            .element_at(Position::new(0, 0), SlotKey::Door(Side::Up))
            .expect("entry frame");
        assert_eq!(frame.descriptor, ElementDescriptor::EntryFrame);
    }

    #[test]
    fn interior_sides_of_entry_points_still_get_walls() {
        // Entry point at (0,0) asserting its interior Right side.
        let batch = parse_initial(
            r#"{
                "width": 2,
                "height": 1,
                "walls": [[1], [0]],
                "fires": [[0, 0]],
                "points_of_interest": [["", ""]],
                "doors": [],
                "entry_points": [[0, 0]],
                "agent_positions": []
            }"#,
        )
        .expect("parse");
        let registry = build_scene(&batch).expect("build");

        assert!(registry
            .find(Position::new(0, 0), SlotKey::Wall(Side::Right))
            .is_some());
    }

    #[test]
    fn initial_fires_and_smoke_occupy_their_cells() {
        let batch = parse_initial(
            r#"{
                "width": 2,
                "height": 1,
                "walls": [[0], [0]],
                "fires": [[1, 0.5]],
                "points_of_interest": [["", ""]],
                "doors": [],
                "entry_points": [],
                "agent_positions": []
            }"#,
        )
        .expect("parse");
        let registry = build_scene(&batch).expect("build");

        assert_eq!(registry.element_count(), 2);
        assert!(registry.find(Position::new(0, 0), SlotKey::Fire).is_some());
        assert!(registry.find(Position::new(1, 0), SlotKey::Smoke).is_some());
    }

    #[test]
    fn wall_transform_uses_the_side_geometry_table() {
        let batch = parse_initial(
            r#"{
                "width": 1,
                "height": 1,
                "walls": [[2]],
                "fires": [[0]],
                "points_of_interest": [[""]],
                "doors": [],
                "entry_points": [],
                "agent_positions": []
            }"#,
        )
        .expect("parse");
        let registry = build_scene(&batch).expect("build");

        let wall = registry
            .element_at(Position::new(0, 0), SlotKey::Wall(Side::Down))
            .expect("down wall");
        let geometry = Side::Down.geometry();
        assert_eq!(
            wall.transform.position,
            Position::new(0, 0).world() + geometry.wall_offset
        );
        assert_eq!(wall.transform.euler_degrees, geometry.wall_euler_degrees);
    }
}
