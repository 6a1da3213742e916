//! The 18 lattice moves and their bit-mask encoding.
//!
//! Each direction occupies one bit of an 18-bit allowed-direction mask:
//!
//! ```text
//! | Up   Dn | N    S    E    W  | NE   SE   SW   NW |NxNE ExNE ExSE SxSE|SxSW WxSW WxNW NxNW|
//! |  17  16 | 15   14   13   12 | 11   10    9    8 |   7    6    5   4 |   3    2    1   0 |
//! ```
//!
//! The named masks below are wire-compatible with the values consumed by
//! map ingestion.

use crate::coords::Coord;

pub type DirMask = u32;

pub const ANY: DirMask = 0x03FFFF;
pub const NONE: DirMask = 0x000000;
pub const ANY_LATERAL: DirMask = 0x00FFFF;
pub const MANHATTAN: DirMask = 0x03F000;
pub const X_ROUTING: DirMask = 0x030F00;
pub const NORTH_SOUTH: DirMask = 0x03C000;
pub const EAST_WEST: DirMask = 0x033000;
pub const MANHATTAN_X: DirMask = 0x03FF00;
pub const UP_DOWN: DirMask = 0x030000;

/// One of the 18 legal lattice moves. The discriminant is the bit position
/// in a direction mask.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
#[repr(u8)]
pub enum Direction {
    NxNW = 0,
    WxNW = 1,
    WxSW = 2,
    SxSW = 3,
    SxSE = 4,
    ExSE = 5,
    ExNE = 6,
    NxNE = 7,
    NW = 8,
    SW = 9,
    SE = 10,
    NE = 11,
    West = 12,
    East = 13,
    South = 14,
    North = 15,
    Down = 16,
    Up = 17,
}

use Direction::*;

/// All directions, in expansion order: vertical first, then Manhattan,
/// diagonal, and knight moves. Expanding cheap moves first keeps the open
/// set ordering deterministic across runs.
pub const ALL_DIRECTIONS: [Direction; 18] = [
    Up, Down, North, South, East, West, NE, SE, SW, NW, NxNE, ExNE, ExSE, SxSE, SxSW, WxSW, WxNW,
    NxNW,
];

impl Direction {
    #[inline]
    pub const fn bit(self) -> DirMask {
        1 << (self as u8)
    }

    /// The (dx, dy, dz) step this direction takes. North is +y, east is +x,
    /// up is +z.
    pub const fn step(self) -> (i32, i32, i32) {
        match self {
            Up => (0, 0, 1),
            Down => (0, 0, -1),
            North => (0, 1, 0),
            South => (0, -1, 0),
            East => (1, 0, 0),
            West => (-1, 0, 0),
            NE => (1, 1, 0),
            SE => (1, -1, 0),
            SW => (-1, -1, 0),
            NW => (-1, 1, 0),
            NxNE => (1, 2, 0),
            ExNE => (2, 1, 0),
            ExSE => (2, -1, 0),
            SxSE => (1, -2, 0),
            SxSW => (-1, -2, 0),
            WxSW => (-2, -1, 0),
            WxNW => (-2, 1, 0),
            NxNW => (-1, 2, 0),
        }
    }

    /// Map a (dx, dy, dz) triple back onto a direction. Non-lattice triples
    /// return `None`.
    pub fn from_step(dx: i32, dy: i32, dz: i32) -> Option<Direction> {
        let d = match (dx, dy, dz) {
            (0, 0, 1) => Up,
            (0, 0, -1) => Down,
            (0, 1, 0) => North,
            (0, -1, 0) => South,
            (1, 0, 0) => East,
            (-1, 0, 0) => West,
            (1, 1, 0) => NE,
            (1, -1, 0) => SE,
            (-1, -1, 0) => SW,
            (-1, 1, 0) => NW,
            (1, 2, 0) => NxNE,
            (2, 1, 0) => ExNE,
            (2, -1, 0) => ExSE,
            (1, -2, 0) => SxSE,
            (-1, -2, 0) => SxSW,
            (-2, -1, 0) => WxSW,
            (-2, 1, 0) => WxNW,
            (-1, 2, 0) => NxNW,
            _ => return None,
        };
        Some(d)
    }

    /// The opposite move, used when backtracing from the target to a start.
    pub const fn reverse(self) -> Direction {
        match self {
            Up => Down,
            Down => Up,
            North => South,
            South => North,
            East => West,
            West => East,
            NE => SW,
            SE => NW,
            SW => NE,
            NW => SE,
            NxNE => SxSW,
            ExNE => WxSW,
            ExSE => WxNW,
            SxSE => NxNW,
            SxSW => NxNE,
            WxSW => ExNE,
            WxNW => ExSE,
            NxNW => SxSE,
        }
    }

    #[inline]
    pub const fn is_vertical(self) -> bool {
        matches!(self, Up | Down)
    }

    #[inline]
    pub const fn is_lateral(self) -> bool {
        matches!(self, North | South | East | West)
    }

    #[inline]
    pub const fn is_diagonal(self) -> bool {
        matches!(self, NE | SE | SW | NW)
    }

    #[inline]
    pub const fn is_knight(self) -> bool {
        (self as u8) < 8
    }

    /// Cells crossed by this move besides the two endpoints, relative to the
    /// move's origin. Diagonals cross one corner cell, knights cross two;
    /// every other move crosses nothing.
    pub fn corner_cells(self, from: Coord) -> CornerCells {
        let (dx, dy, _) = self.step();
        if self.is_diagonal() {
            CornerCells::One(Coord::new(from.x + dx, from.y, from.z))
        } else if self.is_knight() {
            // The straight line from cell-center to cell-center passes
            // through exactly two intermediate cells.
            if dx.abs() == 2 {
                let sx = dx / 2;
                CornerCells::Two(
                    Coord::new(from.x + sx, from.y, from.z),
                    Coord::new(from.x + sx, from.y + dy, from.z),
                )
            } else {
                let sy = dy / 2;
                CornerCells::Two(
                    Coord::new(from.x, from.y + sy, from.z),
                    Coord::new(from.x + dx, from.y + sy, from.z),
                )
            }
        } else {
            CornerCells::None
        }
    }
}

/// The intermediate cells a single move passes through.
#[derive(Clone, Copy, Debug)]
pub enum CornerCells {
    None,
    One(Coord),
    Two(Coord, Coord),
}

impl CornerCells {
    pub fn iter(self) -> impl Iterator<Item = Coord> {
        let (a, b) = match self {
            CornerCells::None => (None, None),
            CornerCells::One(a) => (Some(a), None),
            CornerCells::Two(a, b) => (Some(a), Some(b)),
        };
        a.into_iter().chain(b)
    }
}

/// Test whether the move represented by (dx, dy, dz) is permitted by
/// `allowed`. Any non-lattice triple fails.
#[inline]
pub fn allowed_direction(dx: i32, dy: i32, dz: i32, allowed: DirMask) -> bool {
    match Direction::from_step(dx, dy, dz) {
        Some(d) => d.bit() & allowed != 0,
        None => false,
    }
}

/// The more restrictive combination of two direction masks.
///
/// When the masks overlap, the intersection is the answer. Zero overlap
/// means the two requirements contradict, so the union is returned to tell
/// the caller which combined directions might be acceptable. `NONE` is
/// absorbing on either side.
pub fn calc_minimum_allowed_direction(a: DirMask, b: DirMask) -> DirMask {
    if a == NONE || b == NONE {
        return NONE;
    }
    let intersection = a & b;
    if intersection != NONE {
        intersection
    } else {
        a | b
    }
}
