use std::collections::{BTreeMap, HashMap, HashSet};

use thiserror::Error;
use tracing::debug;

use crate::geometry::{Position, Side};
use crate::Vec3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementId(u64);

impl ElementId {
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Sub-cell slot. A cell owns at most one element per slot; boundary slots
/// (walls, doors) exist on all four sides but by convention only the
/// owning cell of a shared boundary holds the element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotKey {
    Wall(Side),
    Door(Side),
    Fire,
    Smoke,
    Poi,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotAddress {
    pub position: Position,
    pub slot: SlotKey,
}

impl std::fmt::Display for SlotAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}@{}", self.slot, self.position)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoorStatus {
    Closed,
    Open,
    Destroyed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoiKind {
    Victim,
    FalseAlarm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoiVisibility {
    Hidden,
    Revealed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementDescriptor {
    Wall,
    Door { status: DoorStatus },
    EntryFrame,
    Fire,
    Smoke,
    Poi { kind: PoiKind, visibility: PoiVisibility },
}

/// Transient visual state driven by the mutation layer. `Detaching` marks an
/// element that has received its destruction impulse and is waiting out the
/// removal dwell.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum ElementFx {
    #[default]
    None,
    Shaking,
    Detaching {
        impulse: Vec3,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ElementTransform {
    pub position: Vec3,
    pub euler_degrees: Vec3,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub id: ElementId,
    pub address: SlotAddress,
    pub descriptor: ElementDescriptor,
    pub transform: ElementTransform,
    pub fx: ElementFx,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AgentId(pub u32);

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "agent#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AgentNode {
    pub id: AgentId,
    pub cell: Position,
    pub world: Vec3,
    pub carrying_victim: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("position {position} is outside the {width}x{height} grid")]
    OutOfBounds {
        position: Position,
        width: u32,
        height: u32,
    },
    #[error("slot {address} is already occupied")]
    SlotOccupied { address: SlotAddress },
    #[error("fire and smoke are mutually exclusive at {position}")]
    FireSmokeConflict { position: Position },
    #[error("element {0:?} is not registered")]
    UnknownElement(ElementId),
    #[error("{0} is not registered")]
    UnknownAgent(AgentId),
    #[error("{0} is already registered")]
    DuplicateAgent(AgentId),
    #[error("element {0:?} is not a door")]
    NotADoor(ElementId),
}

/// Lookup structure mapping `(position, slot)` composite keys and agent ids
/// to live scene elements. The registry never holds two elements under one
/// address; placing over a live element is an error, not a replacement.
#[derive(Debug, Default)]
pub struct GridRegistry {
    width: u32,
    height: u32,
    next_element: u64,
    elements: HashMap<ElementId, Element>,
    occupancy: HashMap<SlotAddress, ElementId>,
    agents: BTreeMap<AgentId, AgentNode>,
    entry_points: HashSet<Position>,
}

impl GridRegistry {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn contains(&self, position: Position) -> bool {
        position.col < self.width && position.row < self.height
    }

    /// Validates that `position` addresses an existing cell.
    pub fn resolve(&self, position: Position) -> Result<Position, RegistryError> {
        if self.contains(position) {
            Ok(position)
        } else {
            Err(RegistryError::OutOfBounds {
                position,
                width: self.width,
                height: self.height,
            })
        }
    }

    pub fn register_entry_point(&mut self, position: Position) -> Result<(), RegistryError> {
        let position = self.resolve(position)?;
        self.entry_points.insert(position);
        Ok(())
    }

    pub fn is_entry_point(&self, position: Position) -> bool {
        self.entry_points.contains(&position)
    }

    pub fn find(&self, position: Position, slot: SlotKey) -> Option<ElementId> {
        self.occupancy
            .get(&SlotAddress { position, slot })
            .copied()
    }

    pub fn element(&self, id: ElementId) -> Option<&Element> {
        self.elements.get(&id)
    }

    pub fn element_at(&self, position: Position, slot: SlotKey) -> Option<&Element> {
        self.find(position, slot).and_then(|id| self.element(id))
    }

    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.elements.values()
    }

    pub fn place(
        &mut self,
        position: Position,
        slot: SlotKey,
        descriptor: ElementDescriptor,
        transform: ElementTransform,
    ) -> Result<ElementId, RegistryError> {
        let position = self.resolve(position)?;
        let address = SlotAddress { position, slot };
        if self.occupancy.contains_key(&address) {
            return Err(RegistryError::SlotOccupied { address });
        }
        let rival = match slot {
            SlotKey::Fire => Some(SlotKey::Smoke),
            SlotKey::Smoke => Some(SlotKey::Fire),
            _ => None,
        };
        if let Some(rival) = rival {
            if self.find(position, rival).is_some() {
                return Err(RegistryError::FireSmokeConflict { position });
            }
        }

        let id = ElementId(self.next_element);
        self.next_element = self.next_element.saturating_add(1);
        self.elements.insert(
            id,
            Element {
                id,
                address,
                descriptor,
                transform,
                fx: ElementFx::None,
            },
        );
        self.occupancy.insert(address, id);
        debug!(%address, element = id.0, "element_placed");
        Ok(id)
    }

    pub fn remove(&mut self, id: ElementId) -> Result<Element, RegistryError> {
        let element = self
            .elements
            .remove(&id)
            .ok_or(RegistryError::UnknownElement(id))?;
        self.occupancy.remove(&element.address);
        debug!(address = %element.address, element = id.0, "element_removed");
        Ok(element)
    }

    pub fn set_fx(&mut self, id: ElementId, fx: ElementFx) -> Result<(), RegistryError> {
        let element = self
            .elements
            .get_mut(&id)
            .ok_or(RegistryError::UnknownElement(id))?;
        element.fx = fx;
        Ok(())
    }

    pub fn set_door_status(
        &mut self,
        id: ElementId,
        status: DoorStatus,
    ) -> Result<(), RegistryError> {
        let element = self
            .elements
            .get_mut(&id)
            .ok_or(RegistryError::UnknownElement(id))?;
        match &mut element.descriptor {
            ElementDescriptor::Door { status: current } => {
                *current = status;
                Ok(())
            }
            _ => Err(RegistryError::NotADoor(id)),
        }
    }

    pub fn place_agent(&mut self, id: AgentId, cell: Position) -> Result<(), RegistryError> {
        let cell = self.resolve(cell)?;
        if self.agents.contains_key(&id) {
            return Err(RegistryError::DuplicateAgent(id));
        }
        self.agents.insert(
            id,
            AgentNode {
                id,
                cell,
                world: cell.world(),
                carrying_victim: false,
            },
        );
        debug!(agent = id.0, cell = %cell, "agent_placed");
        Ok(())
    }

    pub fn agent(&self, id: AgentId) -> Option<&AgentNode> {
        self.agents.get(&id)
    }

    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    pub fn agents(&self) -> impl Iterator<Item = &AgentNode> {
        self.agents.values()
    }

    pub fn set_agent_world(&mut self, id: AgentId, world: Vec3) -> Result<(), RegistryError> {
        let agent = self.agents.get_mut(&id).ok_or(RegistryError::UnknownAgent(id))?;
        agent.world = world;
        Ok(())
    }

    /// Snaps the agent to `cell`, updating both the logical cell and the
    /// world position.
    pub fn set_agent_cell(&mut self, id: AgentId, cell: Position) -> Result<(), RegistryError> {
        let cell = self.resolve(cell)?;
        let agent = self.agents.get_mut(&id).ok_or(RegistryError::UnknownAgent(id))?;
        agent.cell = cell;
        agent.world = cell.world();
        Ok(())
    }

    pub fn set_agent_carrying(
        &mut self,
        id: AgentId,
        carrying_victim: bool,
    ) -> Result<(), RegistryError> {
        let agent = self.agents.get_mut(&id).ok_or(RegistryError::UnknownAgent(id))?;
        agent.carrying_victim = carrying_victim;
        Ok(())
    }
}
