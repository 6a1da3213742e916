//! The 3-D cell lattice and its congestion store.
//!
//! The grid is one flat allocation indexed by `(z * height + y) * width + x`,
//! so a Z plane is a contiguous slice and `evaporate_congestion` can hand
//! each plane to its own worker without any locking.

use rayon::prelude::*;

use crate::cell::{CellInfo, CongestionEntry, ShapeType};
use crate::coords::{Coord, PathNum};
use crate::input::InputValues;

#[derive(Clone, Debug)]
pub struct CellGrid {
    pub width: i32,
    pub height: i32,
    pub num_layers: i32,
    cells: Vec<CellInfo>,
}

impl CellGrid {
    pub fn new(width: i32, height: i32, num_layers: i32) -> Self {
        let n = (width as usize) * (height as usize) * (num_layers as usize);
        let mut cells = Vec::new();
        cells.resize_with(n, CellInfo::default);
        CellGrid {
            width,
            height,
            num_layers,
            cells,
        }
    }

    #[inline]
    pub fn contains(&self, c: Coord) -> bool {
        c.x >= 0
            && c.x < self.width
            && c.y >= 0
            && c.y < self.height
            && c.z >= 0
            && c.z < self.num_layers
    }

    #[inline]
    pub fn index(&self, c: Coord) -> usize {
        debug_assert!(self.contains(c), "coordinate {c} outside the map");
        ((c.z * self.height + c.y) * self.width + c.x) as usize
    }

    #[inline]
    pub fn coord_of(&self, index: usize) -> Coord {
        let plane = (self.width * self.height) as usize;
        let z = index / plane;
        let rem = index % plane;
        Coord::new((rem % self.width as usize) as i32, (rem / self.width as usize) as i32, z as i32)
    }

    #[inline]
    pub fn num_cells(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    pub fn cell(&self, c: Coord) -> &CellInfo {
        &self.cells[self.index(c)]
    }

    #[inline]
    pub fn cell_mut(&mut self, c: Coord) -> &mut CellInfo {
        let i = self.index(c);
        &mut self.cells[i]
    }

    pub fn cells(&self) -> &[CellInfo] {
        &self.cells
    }

    /// Add `penalty` of congestion for (path, subset, shape) at `c`. An
    /// existing matching entry is incremented; otherwise the sparse list
    /// grows by one. Swap-zone cells never carry congestion.
    pub fn add_congestion(
        &mut self,
        c: Coord,
        path: PathNum,
        subset: u8,
        shape: ShapeType,
        penalty: u32,
    ) {
        if penalty == 0 {
            return;
        }
        let cell = self.cell_mut(c);
        if cell.in_swap_zone() {
            return;
        }
        let path16 = path as u16;
        if let Some(entry) = cell
            .congestion
            .iter_mut()
            .find(|e| e.path == path16 && e.subset == subset && e.shape == shape)
        {
            entry.traversals_x100 = entry.traversals_x100.saturating_add(penalty);
        } else {
            cell.congestion.push(CongestionEntry {
                path: path16,
                subset,
                shape,
                traversals_x100: penalty,
            });
        }
    }

    /// The fundamental congestion write: overwrite the raw value of the
    /// entry at `entry_index` in `c`'s sparse list. A zero value is removed
    /// immediately so zero entries never persist.
    pub fn assign_congestion_by_entry_index(&mut self, c: Coord, entry_index: usize, value: u32) {
        let cell = self.cell_mut(c);
        if value == 0 {
            cell.congestion.remove(entry_index);
        } else {
            cell.congestion[entry_index].traversals_x100 = value;
        }
    }

    /// Evaporate `rate` percent of every congestion entry in the map,
    /// rounding down, removing entries that reach zero. Congestion from the
    /// universal repellent never evaporates.
    ///
    /// Each Z plane is a disjoint slice of the store, so planes evaporate
    /// in parallel.
    pub fn evaporate_congestion(&mut self, rate_percent: f64, universal_repellent: PathNum) {
        let keep = (100.0 - rate_percent) / 100.0;
        let plane = (self.width * self.height) as usize;
        let repellent = universal_repellent as u16;
        self.cells.par_chunks_mut(plane).for_each(|layer| {
            for cell in layer {
                cell.congestion.retain(|e| {
                    if e.path == repellent {
                        return true;
                    }
                    e.traversals_x100 = (e.traversals_x100 as f64 * keep) as u32;
                    e.traversals_x100 > 0
                });
            }
        });
    }

    /// Deposit `amount` of congestion to every cell within `radius_cells`
    /// (Euclidean) of `center` on the center's layer. Swap-zone cells and
    /// cells outside the map are skipped.
    #[allow(clippy::too_many_arguments)]
    pub fn add_congestion_around_point(
        &mut self,
        path: PathNum,
        subset: u8,
        shape: ShapeType,
        center: Coord,
        radius_cells: i32,
        radius_squared: i64,
        amount: u32,
    ) {
        for dy in -radius_cells..=radius_cells {
            for dx in -radius_cells..=radius_cells {
                if (dx as i64) * (dx as i64) + (dy as i64) * (dy as i64) > radius_squared {
                    continue;
                }
                let c = Coord::new(center.x + dx, center.y + dy, center.z);
                if self.contains(c) {
                    self.add_congestion(c, path, subset, shape, amount);
                }
            }
        }
    }

    /// Deposit congestion around a terminal using the design-rule radius
    /// for `shape` at the terminal's cell. Terminals inside their own
    /// pin-swap zone deposit nothing.
    pub fn add_congestion_around_terminal(
        &mut self,
        inputs: &InputValues,
        path: PathNum,
        terminal: Coord,
        shape: ShapeType,
        amount: u32,
    ) {
        if self.cell(terminal).in_swap_zone() {
            return;
        }
        let set = self.cell(terminal).design_rule_set;
        let subset = inputs.subset_of(path, set);
        let rule = inputs.rule(set, subset);
        self.add_congestion_around_point(
            path,
            subset,
            shape,
            terminal,
            rule.radius[shape.index()],
            rule.radius_squared[shape.index()],
            amount,
        );
    }

    /// Hand every congestion entry of `from_path` at `c` over to
    /// `to_path`, and vice versa. Used when a P/N-swappable diff pair
    /// exchanges its start terminals.
    pub fn convert_congestion_at_cell(&mut self, c: Coord, from_path: PathNum, to_path: PathNum) {
        let (a, b) = (from_path as u16, to_path as u16);
        let cell = self.cell_mut(c);
        for entry in cell.congestion.iter_mut() {
            if entry.path == a {
                entry.path = b;
            } else if entry.path == b {
                entry.path = a;
            }
        }
        // Merge any duplicate (path, subset, shape) keys the exchange created.
        let mut merged: smallvec::SmallVec<[CongestionEntry; 4]> = smallvec::SmallVec::new();
        for e in cell.congestion.drain(..) {
            if let Some(m) = merged
                .iter_mut()
                .find(|m| m.path == e.path && m.subset == e.subset && m.shape == e.shape)
            {
                m.traversals_x100 = m.traversals_x100.saturating_add(e.traversals_x100);
            } else {
                merged.push(e);
            }
        }
        cell.congestion = merged;
    }

    /// Sum of `path`'s TRACE congestion within `radius` of `center`, on the
    /// center's layer only.
    pub fn trace_congestion_near(
        &self,
        path: PathNum,
        center: Coord,
        radius_cells: i32,
    ) -> u64 {
        let r2 = (radius_cells as i64) * (radius_cells as i64);
        let mut total = 0;
        for dy in -radius_cells..=radius_cells {
            for dx in -radius_cells..=radius_cells {
                if (dx as i64) * (dx as i64) + (dy as i64) * (dy as i64) > r2 {
                    continue;
                }
                let c = Coord::new(center.x + dx, center.y + dy, center.z);
                if self.contains(c) {
                    total += self.cell(c).congestion_of_path(path, ShapeType::Trace);
                }
            }
        }
        total
    }

    /// Clear the per-iteration marking state (centerline flags, DRC flags,
    /// near-a-net, path-center lists) before a new metrics pass.
    pub fn clear_marking_state(&mut self) {
        let plane = (self.width * self.height) as usize;
        self.cells.par_chunks_mut(plane).for_each(|layer| {
            for cell in layer {
                cell.center_line_flag = false;
                cell.via_up_center_flag = false;
                cell.via_down_center_flag = false;
                cell.drc_flag = false;
                cell.pseudo_drc_flag = false;
                cell.routing_layer_metal_fill = false;
                cell.pseudo_routing_layer_metal_fill = false;
                cell.via_above_metal_fill = false;
                cell.via_below_metal_fill = false;
                cell.pseudo_via_above_metal_fill = false;
                cell.pseudo_via_below_metal_fill = false;
                *cell.near_a_net.get_mut() = false;
                cell.path_centers.clear();
            }
        });
    }
}
