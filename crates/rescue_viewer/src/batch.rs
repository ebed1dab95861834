//! Wire batch model and parsing.
//!
//! The server speaks two JSON shapes: the first response is a full board
//! snapshot, every later response is an incremental diff. Wire quirks are
//! normalized here so the rest of the crate only sees validated domain
//! types: `walls` grids arrive column-major while `fires` and
//! `points_of_interest` arrive row-major (the upstream serializer transposes
//! the latter two), numbers arrive as doubles, and positions arrive as
//! two-element arrays.

use gridscene::{AgentId, DoorStatus, PoiKind, Position, Side, WallMask};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridDims {
    pub width: u32,
    pub height: u32,
}

impl GridDims {
    pub fn contains(self, position: Position) -> bool {
        position.col < self.width && position.row < self.height
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Scoreboard {
    pub damage_points: u32,
    pub people_lost: u32,
    pub people_rescued: u32,
}

/// Tri-state fire layer value decoded from wire floats `0 / 0.5 / 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireValue {
    Clear,
    Smoke,
    Fire,
}

impl FireValue {
    fn from_wire(value: f64) -> Result<Self, ParseError> {
        if value == 0.0 {
            Ok(FireValue::Clear)
        } else if value == 0.5 {
            Ok(FireValue::Smoke)
        } else if value == 1.0 {
            Ok(FireValue::Fire)
        } else {
            Err(ParseError::InvalidFireValue { value })
        }
    }
}

/// POI diff values are transition labels, not states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoiTransition {
    PlaceVictim,
    PlaceFalseAlarm,
    ShowVictim,
    RevealFalseAlarm,
    Death,
    FalseAlarm,
}

impl PoiTransition {
    fn from_wire(label: &str) -> Result<Self, ParseError> {
        match label {
            "v" => Ok(PoiTransition::PlaceVictim),
            "f" => Ok(PoiTransition::PlaceFalseAlarm),
            "show_victim" => Ok(PoiTransition::ShowVictim),
            "reveal" => Ok(PoiTransition::RevealFalseAlarm),
            "death" => Ok(PoiTransition::Death),
            "false" => Ok(PoiTransition::FalseAlarm),
            _ => Err(ParseError::UnknownPoiLabel {
                label: label.to_string(),
            }),
        }
    }

    pub fn is_placement(self) -> bool {
        matches!(self, PoiTransition::PlaceVictim | PoiTransition::PlaceFalseAlarm)
    }

    pub fn is_removal(self) -> bool {
        matches!(self, PoiTransition::Death | PoiTransition::FalseAlarm)
    }

    pub fn is_reveal(self) -> bool {
        matches!(self, PoiTransition::ShowVictim | PoiTransition::RevealFalseAlarm)
    }
}

fn door_status_from_wire(status: &str) -> Result<DoorStatus, ParseError> {
    match status {
        "closed" => Ok(DoorStatus::Closed),
        "open" => Ok(DoorStatus::Open),
        "destroyed" => Ok(DoorStatus::Destroyed),
        _ => Err(ParseError::UnknownDoorStatus {
            status: status.to_string(),
        }),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FireDiff {
    pub position: Position,
    pub value: FireValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WallDiff {
    pub position: Position,
    pub mask: WallMask,
}

/// Per-side structural damage counters in fixed {up, left, down, right}
/// order. A non-zero counter marks a weakened, still standing wall.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DamageDiff {
    pub position: Position,
    pub counters: [u8; 4],
}

impl DamageDiff {
    pub fn damaged_sides(&self) -> impl Iterator<Item = Side> + '_ {
        Side::ALL
            .into_iter()
            .zip(self.counters)
            .filter(|(_, hits)| *hits > 0)
            .map(|(side, _)| side)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoiDiff {
    pub position: Position,
    pub transition: PoiTransition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DoorDiff {
    pub a: Position,
    pub b: Position,
    pub status: DoorStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DoorSpec {
    pub a: Position,
    pub b: Position,
    pub status: DoorStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentStart {
    pub id: AgentId,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Move {
        agent: AgentId,
        from: Position,
        to: Position,
    },
    ExtinguishFire {
        agent: AgentId,
        position: Position,
    },
    ExtinguishSmoke {
        agent: AgentId,
        position: Position,
    },
    OpenDoor {
        agent: AgentId,
        a: Position,
        b: Position,
    },
    PickUpVictim {
        agent: AgentId,
        position: Position,
    },
    DropVictim {
        agent: AgentId,
        position: Position,
    },
    RevealPoiVictim {
        agent: AgentId,
        position: Position,
    },
    RevealPoiFalseAlarm {
        agent: AgentId,
        position: Position,
    },
    Unknown {
        agent: AgentId,
        kind: String,
    },
}

impl Action {
    pub fn agent(&self) -> AgentId {
        match self {
            Action::Move { agent, .. }
            | Action::ExtinguishFire { agent, .. }
            | Action::ExtinguishSmoke { agent, .. }
            | Action::OpenDoor { agent, .. }
            | Action::PickUpVictim { agent, .. }
            | Action::DropVictim { agent, .. }
            | Action::RevealPoiVictim { agent, .. }
            | Action::RevealPoiFalseAlarm { agent, .. }
            | Action::Unknown { agent, .. } => *agent,
        }
    }
}

/// Full board snapshot from the first server response.
#[derive(Debug, Clone, PartialEq)]
pub struct InitialBatch {
    pub dims: GridDims,
    pub scoreboard: Scoreboard,
    /// Column-major: `walls[col][row]`.
    pub walls: Vec<Vec<WallMask>>,
    /// Row-major: `fires[row][col]`.
    pub fires: Vec<Vec<FireValue>>,
    /// Row-major: `pois[row][col]`; `None` for empty cells.
    pub pois: Vec<Vec<Option<PoiKind>>>,
    pub doors: Vec<DoorSpec>,
    pub entry_points: Vec<Position>,
    pub agents: Vec<AgentStart>,
}

impl InitialBatch {
    pub fn wall_mask_at(&self, position: Position) -> WallMask {
        self.walls[position.col as usize][position.row as usize]
    }

    pub fn fire_at(&self, position: Position) -> FireValue {
        self.fires[position.row as usize][position.col as usize]
    }

    pub fn poi_at(&self, position: Position) -> Option<PoiKind> {
        self.pois[position.row as usize][position.col as usize]
    }
}

/// Incremental diff batch; consumed exactly once by the scheduler.
#[derive(Debug, Clone, PartialEq)]
pub struct IncrementalBatch {
    pub scoreboard: Scoreboard,
    pub actions: Vec<Action>,
    pub fires: Vec<FireDiff>,
    pub walls: Vec<WallDiff>,
    pub damage: Vec<DamageDiff>,
    pub pois: Vec<PoiDiff>,
    pub doors: Vec<DoorDiff>,
    pub explosions: Vec<Position>,
    pub simulation_finished: bool,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("malformed batch json at {path}: {message}")]
    Json { path: String, message: String },
    #[error("fire layer value {value} is not one of 0, 0.5, 1")]
    InvalidFireValue { value: f64 },
    #[error("unknown point-of-interest label '{label}'")]
    UnknownPoiLabel { label: String },
    #[error("unknown door status '{status}'")]
    UnknownDoorStatus { status: String },
    #[error("wall mask {value} does not fit in 4 bits")]
    InvalidWallMask { value: i64 },
    #[error("position {coords:?} is not a pair of non-negative integers")]
    InvalidPosition { coords: Vec<i64> },
    #[error("door position must list exactly two cells, got {count}")]
    InvalidDoorEndpoints { count: usize },
    #[error("damage vector {values:?} must hold four non-negative counters")]
    InvalidDamageVector { values: Vec<i64> },
    #[error("{field} grid must be {expected_outer}x{expected_inner}, got outer length {actual}")]
    GridShape {
        field: &'static str,
        expected_outer: usize,
        expected_inner: usize,
        actual: usize,
    },
    #[error("{field} grid row {index} must have length {expected}, got {actual}")]
    GridRowShape {
        field: &'static str,
        index: usize,
        expected: usize,
        actual: usize,
    },
    #[error("action '{kind}' is missing its '{field}' payload")]
    MissingActionField { kind: String, field: &'static str },
    #[error("agent id {value} is not a non-negative integer")]
    InvalidAgentId { value: i64 },
    #[error("{field} position {position} is outside the {width}x{height} board")]
    PositionOutOfBoard {
        field: &'static str,
        position: Position,
        width: u32,
        height: u32,
    },
    #[error("door endpoints {a} and {b} are not grid-adjacent")]
    NonAdjacentDoor { a: Position, b: Position },
}

/// Fatal input errors: the diff itself is well-formed JSON but contradicts
/// the board. Processing of the batch aborts and polling is suppressed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FatalInputError {
    #[error("diff position {position} is outside the {width}x{height} grid")]
    OutOfRange {
        position: Position,
        width: u32,
        height: u32,
    },
    #[error("door endpoints {a} and {b} are not grid-adjacent")]
    NonAdjacentDoor { a: Position, b: Position },
    #[error("a batch is already being reconciled")]
    BatchInFlight,
    #[error("incremental batch received before the initial board snapshot")]
    MissingBoard,
}

// Wire shapes, mirroring the upstream serializer field-for-field.

#[derive(Debug, Deserialize)]
struct WireInitial {
    #[serde(default)]
    damage_points: u32,
    #[serde(default)]
    people_lost: u32,
    #[serde(default)]
    people_rescued: u32,
    width: u32,
    height: u32,
    walls: Vec<Vec<f64>>,
    fires: Vec<Vec<f64>>,
    points_of_interest: Vec<Vec<String>>,
    doors: Vec<WireDoor>,
    entry_points: Vec<Vec<i64>>,
    #[serde(default)]
    agent_positions: Vec<WireAgentPosition>,
}

#[derive(Debug, Deserialize)]
struct WireDoor {
    coord1: Vec<i64>,
    coord2: Vec<i64>,
    status: String,
}

#[derive(Debug, Deserialize)]
struct WireAgentPosition {
    #[serde(rename = "agentID")]
    agent_id: i64,
    position: Vec<i64>,
}

#[derive(Debug, Deserialize)]
struct WireIncremental {
    #[serde(default)]
    damage_points: u32,
    #[serde(default)]
    people_lost: u32,
    #[serde(default)]
    people_rescued: u32,
    #[serde(default)]
    actions: Vec<WireAction>,
    #[serde(default)]
    walls: Vec<WireEntry<f64>>,
    #[serde(default)]
    fires: Vec<WireEntry<f64>>,
    #[serde(default)]
    damage: Vec<WireEntry<Vec<i64>>>,
    #[serde(default)]
    points_of_interest: Vec<WireEntry<String>>,
    #[serde(default)]
    doors: Vec<WireDoorEntry>,
    #[serde(default)]
    explosions: Vec<WireExplosion>,
    #[serde(default)]
    simulation_finished: bool,
}

#[derive(Debug, Deserialize)]
struct WireEntry<T> {
    position: Vec<i64>,
    new_value: T,
}

#[derive(Debug, Deserialize)]
struct WireDoorEntry {
    position: Vec<Vec<i64>>,
    new_value: String,
}

#[derive(Debug, Deserialize)]
struct WireExplosion {
    position: Vec<i64>,
}

#[derive(Debug, Deserialize)]
struct WireAction {
    agent_id: i64,
    action: String,
    #[serde(default)]
    position: Option<Vec<i64>>,
    #[serde(default)]
    from: Option<Vec<i64>>,
    #[serde(default)]
    to: Option<Vec<i64>>,
    #[serde(default)]
    positions: Option<Vec<Vec<i64>>>,
}

fn deserialize_wire<'a, T: Deserialize<'a>>(raw: &'a str) -> Result<T, ParseError> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    match serde_path_to_error::deserialize::<_, T>(&mut deserializer) {
        Ok(value) => Ok(value),
        Err(error) => {
            let path = error.path().to_string();
            let message = error.into_inner().to_string();
            Err(ParseError::Json { path, message })
        }
    }
}

fn wire_position(coords: &[i64]) -> Result<Position, ParseError> {
    match coords {
        [col, row] if *col >= 0 && *row >= 0 => Ok(Position::new(*col as u32, *row as u32)),
        _ => Err(ParseError::InvalidPosition {
            coords: coords.to_vec(),
        }),
    }
}

fn wire_agent_id(value: i64) -> Result<AgentId, ParseError> {
    if value >= 0 {
        Ok(AgentId(value as u32))
    } else {
        Err(ParseError::InvalidAgentId { value })
    }
}

fn wire_wall_mask(value: f64) -> Result<WallMask, ParseError> {
    let raw = value as i64;
    if raw as f64 == value && (0..16).contains(&raw) {
        Ok(WallMask::new(raw as u8))
    } else {
        Err(ParseError::InvalidWallMask { value: raw })
    }
}

fn wire_damage_counters(values: &[i64]) -> Result<[u8; 4], ParseError> {
    let invalid = || ParseError::InvalidDamageVector {
        values: values.to_vec(),
    };
    if values.len() != 4 {
        return Err(invalid());
    }
    let mut counters = [0u8; 4];
    for (slot, value) in counters.iter_mut().zip(values) {
        if !(0..=u8::MAX as i64).contains(value) {
            return Err(invalid());
        }
        *slot = *value as u8;
    }
    Ok(counters)
}

fn check_grid_shape<T>(
    field: &'static str,
    grid: &[Vec<T>],
    outer: usize,
    inner: usize,
) -> Result<(), ParseError> {
    if grid.len() != outer {
        return Err(ParseError::GridShape {
            field,
            expected_outer: outer,
            expected_inner: inner,
            actual: grid.len(),
        });
    }
    for (index, row) in grid.iter().enumerate() {
        if row.len() != inner {
            return Err(ParseError::GridRowShape {
                field,
                index,
                expected: inner,
                actual: row.len(),
            });
        }
    }
    Ok(())
}

pub fn parse_initial(raw: &str) -> Result<InitialBatch, ParseError> {
    let wire: WireInitial = deserialize_wire(raw)?;
    let dims = GridDims {
        width: wire.width,
        height: wire.height,
    };
    let (width, height) = (dims.width as usize, dims.height as usize);

    check_grid_shape("walls", &wire.walls, width, height)?;
    check_grid_shape("fires", &wire.fires, height, width)?;
    check_grid_shape("points_of_interest", &wire.points_of_interest, height, width)?;

    let walls = wire
        .walls
        .iter()
        .map(|column| column.iter().map(|raw| wire_wall_mask(*raw)).collect())
        .collect::<Result<Vec<Vec<WallMask>>, ParseError>>()?;
    let fires = wire
        .fires
        .iter()
        .map(|row| row.iter().map(|raw| FireValue::from_wire(*raw)).collect())
        .collect::<Result<Vec<Vec<FireValue>>, ParseError>>()?;
    let pois = wire
        .points_of_interest
        .iter()
        .map(|row| {
            row.iter()
                .map(|label| match label.as_str() {
                    "" => Ok(None),
                    "v" => Ok(Some(PoiKind::Victim)),
                    "f" => Ok(Some(PoiKind::FalseAlarm)),
                    other => Err(ParseError::UnknownPoiLabel {
                        label: other.to_string(),
                    }),
                })
                .collect()
        })
        .collect::<Result<Vec<Vec<Option<PoiKind>>>, ParseError>>()?;

    let doors = wire
        .doors
        .iter()
        .map(|door| {
            Ok(DoorSpec {
                a: wire_position(&door.coord1)?,
                b: wire_position(&door.coord2)?,
                status: door_status_from_wire(&door.status)?,
            })
        })
        .collect::<Result<Vec<DoorSpec>, ParseError>>()?;
    let entry_points = wire
        .entry_points
        .iter()
        .map(|coords| wire_position(coords))
        .collect::<Result<Vec<Position>, ParseError>>()?;
    let agents = wire
        .agent_positions
        .iter()
        .map(|agent| {
            Ok(AgentStart {
                id: wire_agent_id(agent.agent_id)?,
                position: wire_position(&agent.position)?,
            })
        })
        .collect::<Result<Vec<AgentStart>, ParseError>>()?;

    let on_board = |field: &'static str, position: Position| -> Result<(), ParseError> {
        if dims.contains(position) {
            Ok(())
        } else {
            Err(ParseError::PositionOutOfBoard {
                field,
                position,
                width: dims.width,
                height: dims.height,
            })
        }
    };
    for door in &doors {
        on_board("doors", door.a)?;
        on_board("doors", door.b)?;
        if Side::between(door.a, door.b).is_none() {
            return Err(ParseError::NonAdjacentDoor {
                a: door.a,
                b: door.b,
            });
        }
    }
    for entry_point in &entry_points {
        on_board("entry_points", *entry_point)?;
    }
    for agent in &agents {
        on_board("agent_positions", agent.position)?;
    }

    Ok(InitialBatch {
        dims,
        scoreboard: Scoreboard {
            damage_points: wire.damage_points,
            people_lost: wire.people_lost,
            people_rescued: wire.people_rescued,
        },
        walls,
        fires,
        pois,
        doors,
        entry_points,
        agents,
    })
}

pub fn parse_incremental(raw: &str) -> Result<IncrementalBatch, ParseError> {
    let wire: WireIncremental = deserialize_wire(raw)?;

    let actions = wire
        .actions
        .iter()
        .map(parse_action)
        .collect::<Result<Vec<Action>, ParseError>>()?;
    let walls = wire
        .walls
        .iter()
        .map(|entry| {
            Ok(WallDiff {
                position: wire_position(&entry.position)?,
                mask: wire_wall_mask(entry.new_value)?,
            })
        })
        .collect::<Result<Vec<WallDiff>, ParseError>>()?;
    let fires = wire
        .fires
        .iter()
        .map(|entry| {
            Ok(FireDiff {
                position: wire_position(&entry.position)?,
                value: FireValue::from_wire(entry.new_value)?,
            })
        })
        .collect::<Result<Vec<FireDiff>, ParseError>>()?;
    let damage = wire
        .damage
        .iter()
        .map(|entry| {
            Ok(DamageDiff {
                position: wire_position(&entry.position)?,
                counters: wire_damage_counters(&entry.new_value)?,
            })
        })
        .collect::<Result<Vec<DamageDiff>, ParseError>>()?;
    let pois = wire
        .points_of_interest
        .iter()
        .map(|entry| {
            Ok(PoiDiff {
                position: wire_position(&entry.position)?,
                transition: PoiTransition::from_wire(&entry.new_value)?,
            })
        })
        .collect::<Result<Vec<PoiDiff>, ParseError>>()?;
    let doors = wire
        .doors
        .iter()
        .map(|entry| {
            let [a, b] = entry.position.as_slice() else {
                return Err(ParseError::InvalidDoorEndpoints {
                    count: entry.position.len(),
                });
            };
            Ok(DoorDiff {
                a: wire_position(a)?,
                b: wire_position(b)?,
                status: door_status_from_wire(&entry.new_value)?,
            })
        })
        .collect::<Result<Vec<DoorDiff>, ParseError>>()?;
    let explosions = wire
        .explosions
        .iter()
        .map(|explosion| wire_position(&explosion.position))
        .collect::<Result<Vec<Position>, ParseError>>()?;

    Ok(IncrementalBatch {
        scoreboard: Scoreboard {
            damage_points: wire.damage_points,
            people_lost: wire.people_lost,
            people_rescued: wire.people_rescued,
        },
        actions,
        fires,
        walls,
        damage,
        pois,
        doors,
        explosions,
        simulation_finished: wire.simulation_finished,
    })
}

fn parse_action(wire: &WireAction) -> Result<Action, ParseError> {
    let agent = wire_agent_id(wire.agent_id)?;
    let kind = wire.action.as_str();
    let single_position = |field: &'static str| -> Result<Position, ParseError> {
        let coords = wire
            .position
            .as_deref()
            .ok_or(ParseError::MissingActionField {
                kind: kind.to_string(),
                field,
            })?;
        wire_position(coords)
    };

    match kind {
        "move" => {
            let from = wire.from.as_deref().ok_or(ParseError::MissingActionField {
                kind: kind.to_string(),
                field: "from",
            })?;
            let to = wire.to.as_deref().ok_or(ParseError::MissingActionField {
                kind: kind.to_string(),
                field: "to",
            })?;
            Ok(Action::Move {
                agent,
                from: wire_position(from)?,
                to: wire_position(to)?,
            })
        }
        "extinguish_fire" => Ok(Action::ExtinguishFire {
            agent,
            position: single_position("position")?,
        }),
        "extinguish_smoke" => Ok(Action::ExtinguishSmoke {
            agent,
            position: single_position("position")?,
        }),
        "open_door" => {
            let positions = wire
                .positions
                .as_deref()
                .ok_or(ParseError::MissingActionField {
                    kind: kind.to_string(),
                    field: "positions",
                })?;
            let [a, b] = positions else {
                return Err(ParseError::InvalidDoorEndpoints {
                    count: positions.len(),
                });
            };
            Ok(Action::OpenDoor {
                agent,
                a: wire_position(a)?,
                b: wire_position(b)?,
            })
        }
        "pick_up_victim" => Ok(Action::PickUpVictim {
            agent,
            position: single_position("position")?,
        }),
        "drop_victim" => Ok(Action::DropVictim {
            agent,
            position: single_position("position")?,
        }),
        "reveal_poi_victim" => Ok(Action::RevealPoiVictim {
            agent,
            position: single_position("position")?,
        }),
        "reveal_poi_false_alarm" => Ok(Action::RevealPoiFalseAlarm {
            agent,
            position: single_position("position")?,
        }),
        other => Ok(Action::Unknown {
            agent,
            kind: other.to_string(),
        }),
    }
}

impl IncrementalBatch {
    /// Range- and adjacency-checks every referenced position against the
    /// board. Runs before any mutation; a failure aborts the batch.
    pub fn validate(&self, dims: GridDims) -> Result<(), FatalInputError> {
        let check = |position: Position| -> Result<(), FatalInputError> {
            if dims.contains(position) {
                Ok(())
            } else {
                Err(FatalInputError::OutOfRange {
                    position,
                    width: dims.width,
                    height: dims.height,
                })
            }
        };
        let check_door = |a: Position, b: Position| -> Result<(), FatalInputError> {
            check(a)?;
            check(b)?;
            if Side::between(a, b).is_none() {
                return Err(FatalInputError::NonAdjacentDoor { a, b });
            }
            Ok(())
        };

        for action in &self.actions {
            match action {
                Action::Move { from, to, .. } => {
                    check(*from)?;
                    check(*to)?;
                }
                Action::OpenDoor { a, b, .. } => check_door(*a, *b)?,
                Action::ExtinguishFire { position, .. }
                | Action::ExtinguishSmoke { position, .. }
                | Action::PickUpVictim { position, .. }
                | Action::DropVictim { position, .. }
                | Action::RevealPoiVictim { position, .. }
                | Action::RevealPoiFalseAlarm { position, .. } => check(*position)?,
                Action::Unknown { .. } => {}
            }
        }
        for diff in &self.fires {
            check(diff.position)?;
        }
        for diff in &self.walls {
            check(diff.position)?;
        }
        for diff in &self.damage {
            check(diff.position)?;
        }
        for diff in &self.pois {
            check(diff.position)?;
        }
        for diff in &self.doors {
            check_door(diff.a, diff.b)?;
        }
        for epicenter in &self.explosions {
            check(*epicenter)?;
        }
        Ok(())
    }
}
