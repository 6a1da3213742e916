//! Per-cell state: barriers, routing flags, and the two sparse lists that
//! record congestion and path centerlines.

use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use smallvec::SmallVec;

use crate::coords::PathNum;

/// The three shapes a path can stamp onto a cell.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, Serialize)]
#[repr(u8)]
pub enum ShapeType {
    Trace = 0,
    ViaUp = 1,
    ViaDown = 2,
}

pub const NUM_SHAPE_TYPES: usize = 3;

impl ShapeType {
    pub const ALL: [ShapeType; NUM_SHAPE_TYPES] = [ShapeType::Trace, ShapeType::ViaUp, ShapeType::ViaDown];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[inline]
    pub const fn is_via(self) -> bool {
        !matches!(self, ShapeType::Trace)
    }
}

/// One entry of a cell's sparse congestion list.
///
/// No two entries of one cell share all of (path, subset, shape), and
/// zero-valued entries are removed as soon as they appear.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct CongestionEntry {
    pub path: u16,
    pub subset: u8,
    pub shape: ShapeType,
    pub traversals_x100: u32,
}

/// One entry of a cell's path-center list: a path whose centerline crosses
/// this cell, with the shape it stamped here.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct PathCenter {
    pub path: u16,
    pub shape: ShapeType,
}

/// A single cell of the routing lattice.
///
/// The A* search scratch (g/f costs, parent direction, open-set handle)
/// does not live here; it lives in [`crate::astar::PathFinding`] and is
/// invalidated per search by an epoch counter, so a fresh search never pays
/// for clearing the whole grid.
#[derive(Debug, Default)]
pub struct CellInfo {
    // Hard barriers.
    pub forbidden_trace_barrier: bool,
    pub forbidden_up_via_barrier: bool,
    pub forbidden_down_via_barrier: bool,
    pub forbidden_proximity_barrier: bool,
    pub forbidden_proximity_pin_swap: bool,

    /// Which design-rule set applies at this cell.
    pub design_rule_set: u8,
    pub trace_cost_multiplier_index: u8,
    pub via_up_cost_multiplier_index: u8,
    pub via_down_cost_multiplier_index: u8,

    // Metal fill painted by routed paths (real and pseudo).
    pub routing_layer_metal_fill: bool,
    pub pseudo_routing_layer_metal_fill: bool,
    pub via_above_metal_fill: bool,
    pub via_below_metal_fill: bool,
    pub pseudo_via_above_metal_fill: bool,
    pub pseudo_via_below_metal_fill: bool,

    // DRC flags from the most recent metrics pass.
    pub drc_flag: bool,
    pub pseudo_drc_flag: bool,

    // Centerline flags from the most recent marking pass.
    pub center_line_flag: bool,
    pub via_up_center_flag: bool,
    pub via_down_center_flag: bool,

    /// Set when any path's centerline passes within the interaction radius.
    /// Written concurrently by the per-path marking pass, hence atomic.
    pub near_a_net: AtomicBool,

    /// Pin-swap zone id; zero means not in a swap zone.
    pub swap_zone: u8,

    pub congestion: SmallVec<[CongestionEntry; 4]>,
    pub path_centers: SmallVec<[PathCenter; 2]>,
}

impl Clone for CellInfo {
    fn clone(&self) -> Self {
        CellInfo {
            forbidden_trace_barrier: self.forbidden_trace_barrier,
            forbidden_up_via_barrier: self.forbidden_up_via_barrier,
            forbidden_down_via_barrier: self.forbidden_down_via_barrier,
            forbidden_proximity_barrier: self.forbidden_proximity_barrier,
            forbidden_proximity_pin_swap: self.forbidden_proximity_pin_swap,
            design_rule_set: self.design_rule_set,
            trace_cost_multiplier_index: self.trace_cost_multiplier_index,
            via_up_cost_multiplier_index: self.via_up_cost_multiplier_index,
            via_down_cost_multiplier_index: self.via_down_cost_multiplier_index,
            routing_layer_metal_fill: self.routing_layer_metal_fill,
            pseudo_routing_layer_metal_fill: self.pseudo_routing_layer_metal_fill,
            via_above_metal_fill: self.via_above_metal_fill,
            via_below_metal_fill: self.via_below_metal_fill,
            pseudo_via_above_metal_fill: self.pseudo_via_above_metal_fill,
            pseudo_via_below_metal_fill: self.pseudo_via_below_metal_fill,
            drc_flag: self.drc_flag,
            pseudo_drc_flag: self.pseudo_drc_flag,
            center_line_flag: self.center_line_flag,
            via_up_center_flag: self.via_up_center_flag,
            via_down_center_flag: self.via_down_center_flag,
            near_a_net: AtomicBool::new(self.near_a_net.load(Ordering::Relaxed)),
            swap_zone: self.swap_zone,
            congestion: self.congestion.clone(),
            path_centers: self.path_centers.clone(),
        }
    }
}

impl CellInfo {
    /// Whether a trace may occupy this cell at all.
    #[inline]
    pub fn is_trace_walkable(&self) -> bool {
        !self.forbidden_trace_barrier
    }

    #[inline]
    pub fn in_swap_zone(&self) -> bool {
        self.swap_zone != 0
    }

    /// Total congestion at this cell from paths other than `path` (and any
    /// path the caller chooses to treat as friendly), for one shape type.
    pub fn foreign_congestion<F>(&self, shape: ShapeType, is_friendly: F) -> u64
    where
        F: Fn(PathNum) -> bool,
    {
        self.congestion
            .iter()
            .filter(|e| e.shape == shape && !is_friendly(e.path as PathNum))
            .map(|e| e.traversals_x100 as u64)
            .sum()
    }

    /// Congestion deposited by one specific path at this cell, summed over
    /// subsets, for one shape type.
    pub fn congestion_of_path(&self, path: PathNum, shape: ShapeType) -> u64 {
        self.congestion
            .iter()
            .filter(|e| e.path as PathNum == path && e.shape == shape)
            .map(|e| e.traversals_x100 as u64)
            .sum()
    }

    /// Record that `path`'s centerline crosses this cell with `shape`,
    /// unless an identical entry already exists.
    pub fn add_path_center_info(&mut self, path: PathNum, shape: ShapeType) {
        let entry = PathCenter {
            path: path as u16,
            shape,
        };
        if !self.path_centers.contains(&entry) {
            self.path_centers.push(entry);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_center_info_is_deduplicated() {
        let mut cell = CellInfo::default();
        cell.add_path_center_info(3, ShapeType::Trace);
        cell.add_path_center_info(3, ShapeType::Trace);
        cell.add_path_center_info(3, ShapeType::ViaUp);
        assert_eq!(cell.path_centers.len(), 2);
    }

    #[test]
    fn foreign_congestion_skips_friendly_paths() {
        let mut cell = CellInfo::default();
        cell.congestion.push(CongestionEntry {
            path: 1,
            subset: 0,
            shape: ShapeType::Trace,
            traversals_x100: 100,
        });
        cell.congestion.push(CongestionEntry {
            path: 2,
            subset: 0,
            shape: ShapeType::Trace,
            traversals_x100: 40,
        });
        assert_eq!(cell.foreign_congestion(ShapeType::Trace, |p| p == 1), 40);
        assert_eq!(cell.foreign_congestion(ShapeType::ViaUp, |_| false), 0);
    }
}
