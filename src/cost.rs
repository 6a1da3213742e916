//! Cost primitives: the per-move distance G-cost, the congestion penalty,
//! via congestion, and the admissible heuristic H.

use crate::cell::ShapeType;
use crate::config::*;
use crate::coords::{Coord, Cost, PathNum};
use crate::direction::{DirMask, Direction};
use crate::grid::CellGrid;
use crate::input::InputValues;
use crate::mapinfo::MapInfo;

/// Distance component of the G-cost for the single move `dir` from `from`
/// to `to`.
///
/// Both endpoints must be walkable for the move's shape, and every corner
/// cell crossed by a diagonal or knight move must be trace-walkable;
/// otherwise the move is illegal and `None` is returned.
///
/// The base cost is multiplied by the applicable cost-multiplier at the
/// destination, except inside pin-swap zones (and in iteration 1, when
/// cost zones are disregarded for the rat's-nest overview; the caller
/// passes `use_multipliers = false` there).
pub fn calc_distance_g_cost(
    grid: &CellGrid,
    inputs: &InputValues,
    from: Coord,
    to: Coord,
    dir: Direction,
    use_multipliers: bool,
) -> Option<Cost> {
    let to_cell = grid.cell(to);
    let from_cell = grid.cell(from);

    let base = if dir.is_vertical() {
        let blocked = if dir == Direction::Up {
            from_cell.forbidden_up_via_barrier || to_cell.forbidden_down_via_barrier
        } else {
            from_cell.forbidden_down_via_barrier || to_cell.forbidden_up_via_barrier
        };
        if blocked {
            return None;
        }
        inputs.base_vertical_cost()
    } else {
        if !from_cell.is_trace_walkable() || !to_cell.is_trace_walkable() {
            return None;
        }
        for corner in dir.corner_cells(from).iter() {
            if !grid.contains(corner) || !grid.cell(corner).is_trace_walkable() {
                return None;
            }
        }
        if dir.is_lateral() {
            BASE_LATERAL_COST
        } else if dir.is_diagonal() {
            BASE_DIAGONAL_COST
        } else {
            BASE_KNIGHT_COST
        }
    };

    // Multipliers are bypassed inside pin-swap zones.
    if !use_multipliers || to_cell.in_swap_zone() {
        return Some(base);
    }

    let multiplier = if dir.is_vertical() {
        let idx = if dir == Direction::Up {
            to_cell.via_down_cost_multiplier_index
        } else {
            to_cell.via_up_cost_multiplier_index
        };
        inputs.via_cost_multiplier[idx as usize]
    } else {
        inputs.trace_cost_multiplier[to_cell.trace_cost_multiplier_index as usize]
    };
    Some(base * multiplier as Cost)
}

/// Congestion-related G-cost of stepping onto `to` for `path`: foreign
/// TRACE congestion at the destination, plus via congestion when the move
/// changes layers.
pub fn calc_congestion_penalty(
    grid: &CellGrid,
    inputs: &InputValues,
    map: &MapInfo,
    path: PathNum,
    from: Coord,
    to: Coord,
) -> Cost {
    let trace_raw = grid
        .cell(to)
        .foreign_congestion(ShapeType::Trace, |other| inputs.is_friendly(path, other));
    let mut penalty = (trace_raw as f64 * map.trace_congestion_multiplier) as Cost;
    if from.z != to.z {
        penalty += calc_via_congestion(grid, inputs, map, path, to.x, to.y, from.z, to.z);
    }
    penalty
}

/// Congestion-G-cost of a via between `(x, y, parent_z)` and
/// `(x, y, target_z)`.
///
/// For each foreign path, via-shape contributions on the two cells are
/// de-duplicated (the same physical via deposits VIA_UP on one layer and
/// VIA_DOWN on the other, and must not be charged twice) by taking the
/// larger of the two per-cell sums. Pseudo-paths and the universal
/// repellent are charged exactly like user paths.
pub fn calc_via_congestion(
    grid: &CellGrid,
    inputs: &InputValues,
    map: &MapInfo,
    path: PathNum,
    x: i32,
    y: i32,
    parent_z: i32,
    target_z: i32,
) -> Cost {
    let parent = grid.cell(Coord::new(x, y, parent_z));
    let target = grid.cell(Coord::new(x, y, target_z));

    let mut raw: u64 = 0;
    let mut seen: smallvec::SmallVec<[u16; 8]> = smallvec::SmallVec::new();
    for cell in [parent, target] {
        for entry in cell.congestion.iter() {
            if entry.shape.is_via() && !seen.contains(&entry.path) {
                seen.push(entry.path);
            }
        }
    }
    for other in seen {
        let other = other as PathNum;
        if inputs.is_friendly(path, other) {
            continue;
        }
        let at_parent = parent.congestion_of_path(other, ShapeType::ViaUp)
            + parent.congestion_of_path(other, ShapeType::ViaDown);
        let at_target = target.congestion_of_path(other, ShapeType::ViaUp)
            + target.congestion_of_path(other, ShapeType::ViaDown);
        raw += at_parent.max(at_target);
    }
    (raw as f64 * map.via_congestion_multiplier) as Cost
}

/// The heuristic H: a lower bound on the distance cost from `from` to `to`
/// under `mask`. Never overestimates.
///
/// The lateral part is Chebyshev-like: with knight moves available no move
/// advances the major axis by more than two cells and no move is cheaper
/// per major-axis cell than a lateral step, so `dmax * lateral` is a valid
/// bound; with only diagonals the bound tightens to the standard octile
/// distance; with only Manhattan moves it is the Manhattan distance.
///
/// When either endpoint lies in a pin-swap zone the estimate is scaled
/// down hard, so the search willingly wanders the whole swap region.
pub fn calc_heuristic(
    grid: &CellGrid,
    inputs: &InputValues,
    from: Coord,
    to: Coord,
    mask: DirMask,
) -> Cost {
    let adx = (to.x - from.x).unsigned_abs() as Cost;
    let ady = (to.y - from.y).unsigned_abs() as Cost;
    let adz = (to.z - from.z).unsigned_abs() as Cost;
    let (dmax, dmin) = if adx >= ady { (adx, ady) } else { (ady, adx) };

    const KNIGHT_BITS: DirMask = 0x0000FF;
    const DIAGONAL_BITS: DirMask = 0x000F00;
    let lateral = if mask & KNIGHT_BITS != 0 {
        BASE_LATERAL_COST * dmax
    } else if mask & DIAGONAL_BITS != 0 {
        BASE_DIAGONAL_COST * dmin + BASE_LATERAL_COST * (dmax - dmin)
    } else {
        BASE_LATERAL_COST * (adx + ady)
    };

    let mut h = lateral + adz * inputs.base_vertical_cost();
    if grid.cell(from).in_swap_zone() || grid.cell(to).in_swap_zone() {
        h /= PIN_SWAP_HEURISTIC_DIVISOR;
    }
    h
}
