use crate::Vec3;

/// Logical grid coordinate. `col` grows rightward, `row` grows downward
/// (toward the viewer), matching the upstream board layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Position {
    pub col: u32,
    pub row: u32,
}

impl Position {
    pub fn new(col: u32, row: u32) -> Self {
        Self { col, row }
    }

    /// The adjacent position across `side`, or `None` when it would leave
    /// the non-negative quadrant. Grid-bounds checks belong to the registry.
    pub fn neighbor(self, side: Side) -> Option<Position> {
        match side {
            Side::Up => self.row.checked_sub(1).map(|row| Position::new(self.col, row)),
            Side::Left => self.col.checked_sub(1).map(|col| Position::new(col, self.row)),
            Side::Down => Some(Position::new(self.col, self.row + 1)),
            Side::Right => Some(Position::new(self.col + 1, self.row)),
        }
    }

    /// World-space center of the cell's floor tile.
    pub fn world(self) -> Vec3 {
        Vec3 {
            x: self.col as f32,
            y: 0.0,
            z: self.row as f32,
        }
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.col, self.row)
    }
}

/// Cell-boundary direction. The wall-mask bit order is fixed
/// {up, left, down, right} reading the 4-bit value MSB-first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Up,
    Left,
    Down,
    Right,
}

impl Side {
    /// Canonical scan order for per-side sweeps.
    pub const ALL: [Side; 4] = [Side::Up, Side::Left, Side::Down, Side::Right];

    /// Direction from `a` toward `b`, or `None` when the two positions are
    /// not orthogonally adjacent.
    pub fn between(a: Position, b: Position) -> Option<Side> {
        let dc = b.col as i64 - a.col as i64;
        let dr = b.row as i64 - a.row as i64;
        match (dc, dr) {
            (0, -1) => Some(Side::Up),
            (-1, 0) => Some(Side::Left),
            (0, 1) => Some(Side::Down),
            (1, 0) => Some(Side::Right),
            _ => None,
        }
    }

    pub fn opposite(self) -> Side {
        match self {
            Side::Up => Side::Down,
            Side::Left => Side::Right,
            Side::Down => Side::Up,
            Side::Right => Side::Left,
        }
    }

    /// Bit shift of this side within a wall mask.
    pub fn mask_shift(self) -> u8 {
        match self {
            Side::Up => 3,
            Side::Left => 2,
            Side::Down => 1,
            Side::Right => 0,
        }
    }

    pub fn geometry(self) -> SideGeometry {
        side_geometry(self)
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Side::Up => "up",
            Side::Left => "left",
            Side::Down => "down",
            Side::Right => "right",
        };
        f.write_str(name)
    }
}

/// Per-cell wall assertion mask; only the low 4 bits are meaningful.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WallMask(u8);

impl WallMask {
    pub fn new(raw: u8) -> Self {
        Self(raw & 0b1111)
    }

    pub fn has(self, side: Side) -> bool {
        (self.0 >> side.mask_shift()) & 1 == 1
    }

    pub fn raw(self) -> u8 {
        self.0
    }

    pub fn asserted_sides(self) -> impl Iterator<Item = Side> {
        Side::ALL.into_iter().filter(move |side| self.has(*side))
    }

    pub fn cleared_sides(self) -> impl Iterator<Item = Side> {
        Side::ALL.into_iter().filter(move |side| !self.has(*side))
    }
}

/// Resolves which cell owns the element for a shared boundary: the
/// lower-indexed cell holds it on its Down/Right slot. Up/Left sides with no
/// lower-indexed neighbor (grid perimeter) are owned by the cell itself.
pub fn boundary_owner(position: Position, side: Side) -> (Position, Side) {
    match side {
        Side::Down | Side::Right => (position, side),
        Side::Up | Side::Left => match position.neighbor(side) {
            Some(neighbor) => (neighbor, side.opposite()),
            None => (position, side),
        },
    }
}

/// Fixed placement table for boundary elements. Offsets are relative to the
/// owning cell's floor-tile center; angles are degrees. The down/right rows
/// carry the canonical constants; up/left mirror them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SideGeometry {
    pub wall_offset: Vec3,
    pub wall_euler_degrees: Vec3,
    pub door_offset: Vec3,
    pub door_euler_degrees: Vec3,
    pub frame_offset: Vec3,
    pub frame_euler_degrees: Vec3,
    pub impulse: Vec3,
}

const HALF_CELL: f32 = 0.5;
const WALL_SEAM_OFFSET: f32 = 0.168;
const DOOR_LIFT: f32 = 0.4;
const FRAME_LIFT: f32 = 0.08;

fn side_geometry(side: Side) -> SideGeometry {
    match side {
        Side::Down => SideGeometry {
            wall_offset: Vec3::new(WALL_SEAM_OFFSET, 0.0, -HALF_CELL),
            wall_euler_degrees: Vec3::new(0.0, 90.0, 0.0),
            door_offset: Vec3::new(0.0, DOOR_LIFT, -HALF_CELL),
            door_euler_degrees: Vec3::new(90.0, 0.0, 0.0),
            frame_offset: Vec3::new(0.0, FRAME_LIFT, -HALF_CELL),
            frame_euler_degrees: Vec3::new(-90.0, 0.0, 0.0),
            impulse: Vec3::new(0.0, 0.0, 1.0),
        },
        Side::Right => SideGeometry {
            wall_offset: Vec3::new(HALF_CELL, 0.0, WALL_SEAM_OFFSET),
            wall_euler_degrees: Vec3::new(0.0, 0.0, 0.0),
            door_offset: Vec3::new(HALF_CELL, DOOR_LIFT, 0.0),
            door_euler_degrees: Vec3::new(90.0, 90.0, 0.0),
            frame_offset: Vec3::new(HALF_CELL, FRAME_LIFT, 0.0),
            frame_euler_degrees: Vec3::new(-90.0, 0.0, 90.0),
            impulse: Vec3::new(1.0, 0.0, 0.0),
        },
        Side::Up => SideGeometry {
            wall_offset: Vec3::new(-WALL_SEAM_OFFSET, 0.0, HALF_CELL),
            wall_euler_degrees: Vec3::new(0.0, 90.0, 0.0),
            door_offset: Vec3::new(0.0, DOOR_LIFT, HALF_CELL),
            door_euler_degrees: Vec3::new(90.0, 0.0, 0.0),
            frame_offset: Vec3::new(0.0, FRAME_LIFT, HALF_CELL),
            frame_euler_degrees: Vec3::new(-90.0, 0.0, 0.0),
            impulse: Vec3::new(0.0, 0.0, -1.0),
        },
        Side::Left => SideGeometry {
            wall_offset: Vec3::new(-HALF_CELL, 0.0, -WALL_SEAM_OFFSET),
            wall_euler_degrees: Vec3::new(0.0, 0.0, 0.0),
            door_offset: Vec3::new(-HALF_CELL, DOOR_LIFT, 0.0),
            door_euler_degrees: Vec3::new(90.0, 90.0, 0.0),
            frame_offset: Vec3::new(-HALF_CELL, FRAME_LIFT, 0.0),
            frame_euler_degrees: Vec3::new(-90.0, 0.0, 90.0),
            impulse: Vec3::new(-1.0, 0.0, 0.0),
        },
    }
}
