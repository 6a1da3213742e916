//! The A* path-finder: single-net shortest path over the 18-direction
//! lattice, with pin-swap multi-source seeding and optional routing
//! restrictions.

use crate::coords::{Coord, Cost, PathNum};
use crate::cost::{calc_congestion_penalty, calc_distance_g_cost, calc_heuristic};
use crate::datastructures::indexed_heap::IndexedHeap;
use crate::direction::{Direction, ALL_DIRECTIONS};
use crate::grid::CellGrid;
use crate::input::InputValues;
use crate::mapinfo::{MapInfo, RoutingRestriction};

/// Outcome of one search. A failed search is the sentinel `g_cost == 0`
/// with empty `coords`; the sub-map optimizer reacts by enlarging its
/// window, the main orchestrator treats it as a hard routing failure.
#[derive(Clone, Debug, Default)]
pub struct SearchResult {
    pub g_cost: Cost,
    /// Head-to-tail: (a pin-swap-equivalent of) start first, `end` last.
    pub coords: Vec<Coord>,
    /// Which seeded start reached the target, for pin-swap bookkeeping.
    pub source_index: usize,
    pub explored_cells: u64,
}

impl SearchResult {
    pub fn found(&self) -> bool {
        !self.coords.is_empty()
    }
}

/// Per-cell search scratch, re-initialized per run via an epoch tag so a
/// new search never clears the whole grid.
#[derive(Default)]
pub struct PathFinding {
    g: Vec<Cost>,
    h: Vec<Cost>,
    parent: Vec<Option<Direction>>,
    source: Vec<u16>,
    tag: Vec<u32>,
    epoch: u32,
    heap: IndexedHeap,
}

impl PathFinding {
    pub fn new() -> Self {
        PathFinding::default()
    }

    fn reset(&mut self, num_cells: usize) {
        if self.g.len() < num_cells {
            self.g.resize(num_cells, Cost::MAX);
            self.h.resize(num_cells, 0);
            self.parent.resize(num_cells, None);
            self.source.resize(num_cells, 0);
            self.tag.resize(num_cells, 0);
        }
        self.epoch = self.epoch.wrapping_add(1);
        if self.epoch == 0 {
            self.tag.fill(0);
            self.epoch = 1;
        }
        self.heap.reset(num_cells);
    }

    #[inline]
    fn fresh(&mut self, cell: usize) -> bool {
        if self.tag[cell] == self.epoch {
            false
        } else {
            self.tag[cell] = self.epoch;
            self.g[cell] = Cost::MAX;
            self.parent[cell] = None;
            self.source[cell] = 0;
            true
        }
    }

    /// Search a shortest path from `start` to `end` for `path`.
    ///
    /// When `start` lies in a pin-swap zone, every cell of the connected
    /// swap region sharing its zone id is seeded as a valid start, each
    /// tagged with its own source index; the returned path traces back
    /// through whichever source reached the target first.
    ///
    /// `congestion_enabled` is false in iteration 1 to produce the
    /// rat's-nest overview; cost multipliers are disregarded there too.
    #[allow(clippy::too_many_arguments)]
    pub fn find_path(
        &mut self,
        grid: &CellGrid,
        inputs: &InputValues,
        map: &MapInfo,
        path: PathNum,
        start: Coord,
        end: Coord,
        restriction: &RoutingRestriction,
        congestion_enabled: bool,
    ) -> SearchResult {
        self.reset(grid.num_cells());
        let mask = inputs.route_directions[path.min(inputs.route_directions.len() - 1)];
        let use_multipliers = congestion_enabled;

        let mut result = SearchResult::default();
        let end_index = grid.index(end);

        // Seed the open set: the start itself, or the whole pin-swap region.
        let seeds = collect_seeds(grid, map, path, start);
        for (source_index, &seed) in seeds.iter().enumerate() {
            let cell = grid.index(seed);
            self.fresh(cell);
            self.g[cell] = 0;
            self.source[cell] = source_index as u16;
            let h = calc_heuristic(grid, inputs, seed, end, mask);
            self.h[cell] = h;
            self.heap.push_or_decrease(cell, h, h);
            result.explored_cells += 1;
        }

        while let Some((_, cell)) = self.heap.pop() {
            if cell == end_index {
                result.g_cost = self.g[cell];
                result.source_index = self.source[cell] as usize;
                result.coords = self.backtrace(grid, end);
                return result;
            }
            let from = grid.coord_of(cell);
            let g_here = self.g[cell];
            let source_here = self.source[cell];

            for dir in ALL_DIRECTIONS {
                if dir.bit() & mask == 0 {
                    continue;
                }
                let (dx, dy, dz) = dir.step();
                let to = Coord::new(from.x + dx, from.y + dy, from.z + dz);
                if !grid.contains(to) || !restriction.permits(to) {
                    continue;
                }
                let Some(step_cost) =
                    calc_distance_g_cost(grid, inputs, from, to, dir, use_multipliers)
                else {
                    continue;
                };
                let penalty = if congestion_enabled {
                    calc_congestion_penalty(grid, inputs, map, path, from, to)
                } else {
                    0
                };
                let tentative = g_here + step_cost + penalty;

                let to_index = grid.index(to);
                if self.fresh(to_index) {
                    self.h[to_index] = calc_heuristic(grid, inputs, to, end, mask);
                } else if tentative >= self.g[to_index] {
                    continue;
                }
                self.g[to_index] = tentative;
                self.parent[to_index] = Some(dir);
                self.source[to_index] = source_here;
                let h = self.h[to_index];
                self.heap.push_or_decrease(to_index, tentative + h, h);
                result.explored_cells += 1;
            }
        }

        // Open set exhausted: sentinel failure.
        result
    }

    fn backtrace(&self, grid: &CellGrid, end: Coord) -> Vec<Coord> {
        let mut coords = vec![end];
        let mut current = end;
        while let Some(dir) = self.parent[grid.index(current)] {
            let (dx, dy, dz) = dir.step();
            current = Coord::new(current.x - dx, current.y - dy, current.z - dz);
            coords.push(current);
        }
        coords.reverse();
        coords
    }
}

/// All valid starts for `path`: just `start`, or, when the path's start
/// terminal is assigned to a pin-swap zone, every cell of that zone, in
/// grid-index order so seeding is deterministic.
fn collect_seeds(grid: &CellGrid, map: &MapInfo, path: PathNum, start: Coord) -> Vec<Coord> {
    let zone = map.swap_zone.get(path).copied().unwrap_or(0);
    if zone == 0 {
        return vec![start];
    }
    let seeds: Vec<Coord> = (0..grid.num_cells())
        .filter(|&i| grid.cells()[i].swap_zone == zone)
        .map(|i| grid.coord_of(i))
        .collect();
    if seeds.is_empty() {
        vec![start]
    } else {
        seeds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BASE_KNIGHT_COST, BASE_LATERAL_COST};
    use crate::direction::{ANY, ANY_LATERAL, MANHATTAN};
    use crate::input::DesignRuleSubset;
    use itertools::Itertools;

    fn setup(w: i32, h: i32, layers: i32, mask: u32) -> (CellGrid, InputValues, MapInfo) {
        let grid = CellGrid::new(w, h, layers);
        let inputs = InputValues::plain(2, mask, DesignRuleSubset::uniform(100.0, 1, 1.0));
        let mut map = MapInfo::new(w, h, layers, 2, 0, 50);
        map.current_iteration = 1;
        (grid, inputs, map)
    }

    #[test]
    fn straight_line_route() {
        let (grid, inputs, map) = setup(11, 11, 1, ANY_LATERAL);
        let mut pf = PathFinding::new();
        let r = pf.find_path(
            &grid,
            &inputs,
            &map,
            0,
            Coord::new(0, 0, 0),
            Coord::new(10, 0, 0),
            &RoutingRestriction::none(1),
            false,
        );
        assert!(r.found());
        assert_eq!(r.coords.len(), 11);
        assert_eq!(r.g_cost, 10 * BASE_LATERAL_COST);
        for (a, b) in r.coords.iter().tuple_windows() {
            assert_eq!(b.delta(a), (1, 0, 0));
        }
    }

    #[test]
    fn knight_moves_beat_staircases() {
        let (grid, inputs, map) = setup(5, 5, 1, ANY_LATERAL);
        let mut pf = PathFinding::new();
        let r = pf.find_path(
            &grid,
            &inputs,
            &map,
            0,
            Coord::new(0, 0, 0),
            Coord::new(2, 1, 0),
            &RoutingRestriction::none(1),
            false,
        );
        assert_eq!(r.g_cost, BASE_KNIGHT_COST);
        assert_eq!(r.coords.len(), 2);
    }

    #[test]
    fn obstacle_forces_detour() {
        let (mut grid, inputs, map) = setup(7, 3, 1, MANHATTAN);
        // Wall across x = 3 except y = 2.
        for y in 0..2 {
            grid.cell_mut(Coord::new(3, y, 0)).forbidden_trace_barrier = true;
        }
        let mut pf = PathFinding::new();
        let r = pf.find_path(
            &grid,
            &inputs,
            &map,
            0,
            Coord::new(0, 0, 0),
            Coord::new(6, 0, 0),
            &RoutingRestriction::none(1),
            false,
        );
        assert!(r.found());
        assert!(r.coords.contains(&Coord::new(3, 2, 0)));
        assert_eq!(r.g_cost, 10 * BASE_LATERAL_COST);
    }

    #[test]
    fn walled_off_target_returns_sentinel() {
        let (mut grid, inputs, map) = setup(5, 5, 1, ANY_LATERAL);
        for y in 0..5 {
            grid.cell_mut(Coord::new(2, y, 0)).forbidden_trace_barrier = true;
        }
        let mut pf = PathFinding::new();
        let r = pf.find_path(
            &grid,
            &inputs,
            &map,
            0,
            Coord::new(0, 2, 0),
            Coord::new(4, 2, 0),
            &RoutingRestriction::none(1),
            false,
        );
        assert!(!r.found());
        assert_eq!(r.g_cost, 0);
    }

    #[test]
    fn vertical_route_uses_vias() {
        let (mut grid, inputs, map) = setup(3, 3, 3, ANY);
        // Block the whole middle layer laterally; vias still pass through.
        for y in 0..3 {
            for x in 0..3 {
                grid.cell_mut(Coord::new(x, y, 1)).forbidden_trace_barrier = true;
            }
        }
        let mut pf = PathFinding::new();
        let r = pf.find_path(
            &grid,
            &inputs,
            &map,
            0,
            Coord::new(0, 0, 0),
            Coord::new(0, 0, 2),
            &RoutingRestriction::none(3),
            false,
        );
        assert!(r.found());
        assert_eq!(r.coords.len(), 3);
        assert_eq!(r.g_cost, 2 * inputs.base_vertical_cost());
    }

    #[test]
    fn pin_swap_zone_seeds_every_member() {
        let (mut grid, inputs, mut map) = setup(9, 3, 1, ANY_LATERAL);
        // Swap zone occupying x in 0..=2, y = 0; the member at (2,0) is
        // nearest the target, so the path starts there.
        map.swap_zone[0] = 1;
        for x in 0..=2 {
            grid.cell_mut(Coord::new(x, 0, 0)).swap_zone = 1;
        }
        let mut pf = PathFinding::new();
        let r = pf.find_path(
            &grid,
            &inputs,
            &map,
            0,
            Coord::new(0, 0, 0),
            Coord::new(8, 0, 0),
            &RoutingRestriction::none(1),
            false,
        );
        assert!(r.found());
        assert_eq!(r.coords[0], Coord::new(2, 0, 0));
        assert_eq!(r.g_cost, 6 * BASE_LATERAL_COST);
    }

    #[test]
    fn restriction_disc_confines_the_search() {
        let (grid, inputs, map) = setup(11, 11, 1, ANY_LATERAL);
        let mut restriction = RoutingRestriction::none(1);
        restriction.restriction_flag = true;
        restriction.allowed_layers = vec![true];
        restriction.allowed_radii_cells = vec![1.5];
        restriction.center_x = 5;
        restriction.center_y = 5;
        let mut pf = PathFinding::new();
        // Target outside the disc is unreachable.
        let r = pf.find_path(
            &grid,
            &inputs,
            &map,
            0,
            Coord::new(5, 5, 0),
            Coord::new(9, 9, 0),
            &restriction,
            false,
        );
        assert!(!r.found());
    }

    #[test]
    fn congestion_pushes_the_route_sideways() {
        let (mut grid, inputs, mut map) = setup(7, 5, 1, MANHATTAN);
        map.current_iteration = 2;
        map.trace_congestion_multiplier = 1.0;
        // Heavy foreign congestion along y = 2 between the terminals.
        for x in 1..6 {
            grid.add_congestion(
                Coord::new(x, 2, 0),
                1,
                0,
                crate::cell::ShapeType::Trace,
                10_000,
            );
        }
        let mut pf = PathFinding::new();
        let r = pf.find_path(
            &grid,
            &inputs,
            &map,
            0,
            Coord::new(0, 2, 0),
            Coord::new(6, 2, 0),
            &RoutingRestriction::none(1),
            true,
        );
        assert!(r.found());
        // The straight line costs 6 * 100 + 5 * 10_000; any detour is cheaper.
        assert!(r.coords.iter().any(|c| c.y != 2));
    }
}
