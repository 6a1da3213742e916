//! Sub-map extraction for the diff-pair optimizer: an independent grid
//! deep-copied from a rectangular prism of the parent map, with the two
//! children under optimization scrubbed out of it.

use crate::config::{
    CONG_SENSITIVITIES, DEFAULT_CELL_COST, DEFAULT_EVAP_RATE, SUBMAP_MAX_ITERATIONS,
};
use crate::coords::{Coord, PathNum};
use crate::diffpair::connections::Connection;
use crate::errors::{Result, RouteError};
use crate::grid::CellGrid;
use crate::mapinfo::MapInfo;
use crate::path::Path;

pub struct SubMap {
    pub grid: CellGrid,
    pub map: MapInfo,
    /// Parent coordinate of the sub-map's origin.
    pub offset: Coord,
}

impl SubMap {
    /// Cut the window for `connection` out of the parent map.
    ///
    /// The window is a square in the X/Y plane centered on the midpoint of
    /// the four terminals, with a half-side of `scale` times the larger
    /// terminal span, clamped to the parent; the layer range is the
    /// terminals' layer range. Congestion and path centers of the two
    /// children are not copied. Child cells from *outside* the connection's
    /// own segment range become hard obstacles, except close to the four
    /// terminals where the stitched wiring must be free to land.
    pub fn build(
        parent_grid: &CellGrid,
        parent_map: &MapInfo,
        connection: &Connection,
        pseudo_path: PathNum,
        children: [PathNum; 2],
        child_paths: [&Path; 2],
        scale: usize,
    ) -> Result<SubMap> {
        let terminals = [
            connection.start[0],
            connection.start[1],
            connection.end[0],
            connection.end[1],
        ];
        let min_x = terminals.iter().map(|c| c.x).min().expect("4 terminals");
        let max_x = terminals.iter().map(|c| c.x).max().expect("4 terminals");
        let min_y = terminals.iter().map(|c| c.y).min().expect("4 terminals");
        let max_y = terminals.iter().map(|c| c.y).max().expect("4 terminals");
        let min_z = terminals.iter().map(|c| c.z).min().expect("4 terminals");
        let max_z = terminals.iter().map(|c| c.z).max().expect("4 terminals");

        let mid_x = (min_x + max_x) / 2;
        let mid_y = (min_y + max_y) / 2;
        let max_span = scale as i32 * (max_x - min_x).max(max_y - min_y).max(1);

        if scale > 2
            && mid_x - max_span < 0
            && mid_x + max_span >= parent_map.width
            && mid_y - max_span < 0
            && mid_y + max_span >= parent_map.height
        {
            return Err(RouteError::SubMapExpansionLimit {
                iteration: parent_map.current_iteration,
                pseudo_path,
                start: connection.start[0],
                end: connection.end[0],
            });
        }

        let lo = Coord::new((mid_x - max_span).max(0), (mid_y - max_span).max(0), min_z);
        let hi = Coord::new(
            (mid_x + max_span).min(parent_map.width - 1),
            (mid_y + max_span).min(parent_map.height - 1),
            max_z,
        );

        let width = hi.x - lo.x + 1;
        let height = hi.y - lo.y + 1;
        let layers = hi.z - lo.z + 1;
        let mut grid = CellGrid::new(width, height, layers);

        let exclude = [children[0] as u16, children[1] as u16];
        for z in 0..layers {
            for y in 0..height {
                for x in 0..width {
                    let local = Coord::new(x, y, z);
                    let global = Coord::new(x + lo.x, y + lo.y, z + lo.z);
                    let mut cell = parent_grid.cell(global).clone();
                    cell.congestion.retain(|e| !exclude.contains(&e.path));
                    cell.path_centers.retain(|e| !exclude.contains(&e.path));
                    *grid.cell_mut(local) = cell;
                }
            }
        }

        // The children's own wiring outside this connection stays put while
        // the connection is re-routed, so it is a hard obstacle here.
        let guard_radius = parent_map.diff_pair_start_pitch_cells[pseudo_path].max(2.0) as f64;
        for (child_index, coords) in child_paths.iter().enumerate() {
            let first = connection.start_segment[child_index];
            let last = connection.end_segment[child_index];
            for (segment, &c) in coords.iter().enumerate() {
                if segment >= first && segment <= last {
                    continue;
                }
                if c.x < lo.x || c.x > hi.x || c.y < lo.y || c.y > hi.y || c.z < lo.z || c.z > hi.z
                {
                    continue;
                }
                if terminals
                    .iter()
                    .any(|t| t.lateral_distance(&c) <= guard_radius)
                {
                    continue;
                }
                let local = Coord::new(c.x - lo.x, c.y - lo.y, c.z - lo.z);
                let cell = grid.cell_mut(local);
                cell.forbidden_trace_barrier = true;
                cell.forbidden_up_via_barrier = true;
                cell.forbidden_down_via_barrier = true;
            }
        }

        // The sub-map routes at nominal sensitivity from sub-iteration one;
        // there is no ramp-up schedule inside a window this small.
        let mut map = MapInfo::new(
            width,
            height,
            layers,
            parent_map.num_paths,
            parent_map.num_pseudo_paths,
            SUBMAP_MAX_ITERATIONS,
        );
        let base = DEFAULT_CELL_COST * DEFAULT_EVAP_RATE / (100.0 - DEFAULT_EVAP_RATE) / 100.0;
        map.iteration_dependent_ratio = 1.0;
        map.trace_congestion_multiplier =
            CONG_SENSITIVITIES[parent_map.current_trace_cong_sens_index] as f64 / 100.0 * base;
        map.via_congestion_multiplier =
            CONG_SENSITIVITIES[parent_map.current_via_cong_sens_index] as f64 / 100.0 * base;
        map.swap_zone = parent_map.swap_zone.clone();
        map.diff_pair_start_pitch_cells = parent_map.diff_pair_start_pitch_cells.clone();
        map.diff_pair_end_pitch_cells = parent_map.diff_pair_end_pitch_cells.clone();
        for layer in 0..layers as usize {
            let parent_layer = layer + lo.z as usize;
            map.max_interaction_radius_cells[layer] =
                parent_map.max_interaction_radius_cells[parent_layer];
            map.max_interaction_radius_squared[layer] =
                parent_map.max_interaction_radius_squared[parent_layer];
        }

        Ok(SubMap {
            grid,
            map,
            offset: lo,
        })
    }

    #[inline]
    pub fn to_local(&self, c: Coord) -> Coord {
        Coord::new(c.x - self.offset.x, c.y - self.offset.y, c.z - self.offset.z)
    }

    #[inline]
    pub fn to_global(&self, c: Coord) -> Coord {
        Coord::new(c.x + self.offset.x, c.y + self.offset.y, c.z + self.offset.z)
    }

    /// Evaporate only the two children's congestion, at the sub-map rate.
    pub fn evaporate_child_congestion(&mut self, children: [PathNum; 2], rate_percent: f64) {
        let keep = (100.0 - rate_percent) / 100.0;
        let exclude = [children[0] as u16, children[1] as u16];
        for index in 0..self.grid.num_cells() {
            let c = self.grid.coord_of(index);
            let cell = self.grid.cell_mut(c);
            cell.congestion.retain(|e| {
                if !exclude.contains(&e.path) {
                    return true;
                }
                e.traversals_x100 = (e.traversals_x100 as f64 * keep) as u32;
                e.traversals_x100 > 0
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::ShapeType;

    fn connection() -> Connection {
        Connection {
            start: [Coord::new(4, 4, 0), Coord::new(4, 6, 0)],
            end: [Coord::new(10, 4, 0), Coord::new(10, 6, 0)],
            start_segment: [0, 0],
            end_segment: [6, 6],
            start_shape: [ShapeType::Trace, ShapeType::Trace],
            end_shape: [ShapeType::Trace, ShapeType::Trace],
            same_layer_terminals: true,
            swap: false,
            symmetry_ratio: 0.5,
        }
    }

    #[test]
    fn child_state_is_scrubbed_from_the_copy() {
        let mut grid = CellGrid::new(20, 20, 1);
        let map = MapInfo::new(20, 20, 1, 2, 1, 10);
        let inside = Coord::new(7, 5, 0);
        grid.add_congestion(inside, 0, 0, ShapeType::Trace, 500);
        grid.add_congestion(inside, 3, 0, ShapeType::Trace, 500);
        grid.cell_mut(inside).add_path_center_info(0, ShapeType::Trace);

        let child_paths: [&Path; 2] = [&vec![], &vec![]];
        let sub = SubMap::build(&grid, &map, &connection(), 2, [0, 1], child_paths, 1).unwrap();
        let local = sub.to_local(inside);
        assert_eq!(sub.grid.cell(local).congestion_of_path(0, ShapeType::Trace), 0);
        assert_eq!(sub.grid.cell(local).congestion_of_path(3, ShapeType::Trace), 500);
        assert!(sub.grid.cell(local).path_centers.is_empty());
    }

    #[test]
    fn out_of_connection_child_cells_become_obstacles() {
        let grid = CellGrid::new(20, 20, 1);
        let map = MapInfo::new(20, 20, 1, 2, 1, 10);
        let mut conn = connection();
        conn.start_segment = [2, 0];
        // Child 0 continues beyond the connection into the window.
        let child_0: Path = (0..=10).map(|x| Coord::new(x, 9, 0)).collect();
        let child_1: Path = Vec::new();
        let sub = SubMap::build(&grid, &map, &conn, 2, [0, 1], [&child_0, &child_1], 1).unwrap();
        // Segment 1 of child 0 lies before the connection and far from all
        // terminals, so its cell is forbidden in the sub-map.
        let local = sub.to_local(Coord::new(1, 9, 0));
        assert!(sub.grid.contains(local));
        assert!(sub.grid.cell(local).forbidden_trace_barrier);
        // Cells within the connection's own span stay walkable.
        let local = sub.to_local(Coord::new(5, 9, 0));
        assert!(!sub.grid.cell(local).forbidden_trace_barrier);
    }

    #[test]
    fn oversized_window_is_fatal_after_scale_two() {
        let grid = CellGrid::new(12, 12, 1);
        let map = MapInfo::new(12, 12, 1, 2, 1, 10);
        let result = SubMap::build(&grid, &map, &connection(), 2, [0, 1], [&vec![], &vec![]], 5);
        assert!(matches!(result, Err(RouteError::SubMapExpansionLimit { .. })));
    }
}
