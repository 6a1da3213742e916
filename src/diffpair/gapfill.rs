//! Heuristic short-path filler for tiny same-layer gaps.
//!
//! Re-stitching a diff-pair connection can leave a seam of up to five
//! lateral cells between copied segment runs. Re-running A* for such a
//! seam would cost more than the whole stitching pass, so the candidate
//! bridges for every reachable (|dx|, |dy|) case are enumerated directly
//! and the cheapest walkable one wins.

use crate::coords::{Coord, Cost, PathNum};
use crate::cost::{calc_congestion_penalty, calc_distance_g_cost};
use crate::direction::Direction;
use crate::errors::{Result, RouteError};
use crate::grid::CellGrid;
use crate::input::InputValues;
use crate::mapinfo::MapInfo;

/// Candidate interior-cell sets per canonical (|dx| >= |dy|) case, in
/// units of the start cell. Routes are evaluated in order; the first
/// legal minimum wins ties. The y offsets of the |dy| = 0 knight detours
/// are literal (one route below the line, one above).
fn candidate_routes(adx: i32, ady: i32) -> Option<&'static [&'static [(i32, i32)]]> {
    let routes: &'static [&'static [(i32, i32)]] = match (adx, ady) {
        (2, 0) => &[&[(1, 0)]],
        (3, 0) => &[&[(1, 0), (2, 0)]],
        (4, 0) => &[&[(1, 0), (2, 0), (3, 0)], &[(2, -1)], &[(2, 1)]],
        (5, 0) => &[
            &[(1, 0), (2, 0), (3, 0), (4, 0)],
            &[(2, -1), (3, -1)],
            &[(2, 1), (3, 1)],
        ],
        (3, 1) => &[&[(2, 1)], &[(1, 0)]],
        (4, 1) => &[&[(1, 0), (2, 0)], &[(2, 1), (3, 1)]],
        (2, 2) => &[&[(1, 1)]],
        (3, 2) => &[&[(2, 1)], &[(1, 1)]],
        (4, 2) => &[&[(2, 1)]],
        (3, 3) => &[&[(1, 1), (2, 2)], &[(2, 1)], &[(1, 2)]],
        (4, 3) => &[&[(2, 1), (3, 2)], &[(1, 1), (3, 2)], &[(1, 1), (2, 2)]],
        _ => return None,
    };
    Some(routes)
}

/// Bridge the gap between `start` and `end` with inserted segments.
///
/// Returns the inserted coordinates, ending with `end` itself. The two
/// cells must lie on the same layer within five cells of each other, and
/// the (|dx|, |dy|) pair must be one of the enumerated non-direct cases;
/// anything else is a structural precondition failure.
pub fn find_short_path_heuristically(
    grid: &CellGrid,
    inputs: &InputValues,
    map: &MapInfo,
    path: PathNum,
    start: Coord,
    end: Coord,
) -> Result<Vec<Coord>> {
    let (dx, dy, dz) = end.delta(&start);
    if dz != 0 || dx * dx + dy * dy > 25 {
        return Err(RouteError::IllegalGap { path, start, end });
    }
    let (adx, ady) = (dx.abs(), dy.abs());

    // Canonicalize to |dx| >= |dy|; remember to swap offsets back.
    let swapped_axes = ady > adx;
    let (cx, cy) = if swapped_axes { (ady, adx) } else { (adx, ady) };
    let routes = candidate_routes(cx, cy).ok_or(RouteError::IllegalGap { path, start, end })?;

    let x_dir = dx.signum();
    let y_dir = dy.signum();
    let place = |&(ox, oy): &(i32, i32)| -> Coord {
        // Offsets scale by the travel direction on axes the gap actually
        // moves along; on a zero axis the table's literal sign stands.
        let (ox, oy) = if swapped_axes { (oy, ox) } else { (ox, oy) };
        let px = if dx != 0 { ox * x_dir } else { ox };
        let py = if dy != 0 { oy * y_dir } else { oy };
        Coord::new(start.x + px, start.y + py, start.z)
    };

    let mut best: Option<(Cost, Vec<Coord>)> = None;
    'routes: for route in routes {
        let interior: Vec<Coord> = route.iter().map(place).collect();
        for &c in &interior {
            if !grid.contains(c) || !grid.cell(c).is_trace_walkable() {
                continue 'routes;
            }
        }
        let mut cost: Cost = 0;
        let mut from = start;
        for &to in interior.iter().chain(std::iter::once(&end)) {
            let (sdx, sdy, sdz) = to.delta(&from);
            let Some(dir) = Direction::from_step(sdx, sdy, sdz) else {
                continue 'routes;
            };
            let Some(step) = calc_distance_g_cost(grid, inputs, from, to, dir, true) else {
                continue 'routes;
            };
            cost += step + calc_congestion_penalty(grid, inputs, map, path, from, to);
            from = to;
        }
        if best.as_ref().map_or(true, |(c, _)| cost < *c) {
            let mut inserted = interior;
            inserted.push(end);
            best = Some((cost, inserted));
        }
    }

    match best {
        Some((_, inserted)) => Ok(inserted),
        None => Err(RouteError::NoWalkableBridge {
            iteration: map.current_iteration,
            path,
            start,
            end,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::direction::ANY_LATERAL;
    use crate::input::DesignRuleSubset;

    fn setup() -> (CellGrid, InputValues, MapInfo) {
        let grid = CellGrid::new(12, 12, 2);
        let inputs = InputValues::plain(1, ANY_LATERAL, DesignRuleSubset::uniform(100.0, 1, 1.0));
        let map = MapInfo::new(12, 12, 2, 1, 0, 10);
        (grid, inputs, map)
    }

    #[test]
    fn knight_or_lateral_tie_takes_route_a() {
        let (grid, inputs, map) = setup();
        // dx = 3, dy = 1: knight-first (route A) and lateral-first (route B)
        // cost the same with zero congestion; route A wins the tie.
        let inserted =
            find_short_path_heuristically(&grid, &inputs, &map, 0, Coord::new(0, 0, 0), Coord::new(3, 1, 0))
                .unwrap();
        assert_eq!(inserted.len(), 2);
        assert_eq!(inserted[0], Coord::new(2, 1, 0));
        assert_eq!(inserted[1], Coord::new(3, 1, 0));
    }

    #[test]
    fn congestion_flips_the_choice() {
        let (mut grid, inputs, mut map) = setup();
        map.trace_congestion_multiplier = 1.0;
        grid.add_congestion(
            Coord::new(2, 1, 0),
            1,
            0,
            crate::cell::ShapeType::Trace,
            100_000,
        );
        let inserted =
            find_short_path_heuristically(&grid, &inputs, &map, 0, Coord::new(0, 0, 0), Coord::new(3, 1, 0))
                .unwrap();
        assert_eq!(inserted[0], Coord::new(1, 0, 0));
    }

    #[test]
    fn straight_gap_of_two_inserts_the_midpoint() {
        let (grid, inputs, map) = setup();
        let inserted =
            find_short_path_heuristically(&grid, &inputs, &map, 0, Coord::new(5, 5, 0), Coord::new(3, 5, 0))
                .unwrap();
        assert_eq!(inserted, vec![Coord::new(4, 5, 0), Coord::new(3, 5, 0)]);
    }

    #[test]
    fn four_cell_gap_prefers_knight_detour_over_blocked_line() {
        let (mut grid, inputs, map) = setup();
        // Block the direct route; the knight detours remain.
        grid.cell_mut(Coord::new(3, 5, 0)).forbidden_trace_barrier = true;
        let inserted =
            find_short_path_heuristically(&grid, &inputs, &map, 0, Coord::new(1, 5, 0), Coord::new(5, 5, 0))
                .unwrap();
        assert_eq!(inserted.len(), 2);
        assert_eq!(inserted[0], Coord::new(3, 4, 0));
    }

    #[test]
    fn axis_swapped_cases_mirror() {
        let (grid, inputs, map) = setup();
        // dy dominant: (1, 3) mirrors (3, 1); knight-first interior.
        let inserted =
            find_short_path_heuristically(&grid, &inputs, &map, 0, Coord::new(5, 5, 0), Coord::new(6, 8, 0))
                .unwrap();
        assert_eq!(inserted[0], Coord::new(6, 7, 0));
    }

    #[test]
    fn negative_directions_mirror_signs() {
        let (grid, inputs, map) = setup();
        let inserted =
            find_short_path_heuristically(&grid, &inputs, &map, 0, Coord::new(8, 8, 0), Coord::new(5, 7, 0))
                .unwrap();
        // Canonical (3,1) route A interior (2,1) mirrored to (-2,-1).
        assert_eq!(inserted[0], Coord::new(6, 7, 0));
    }

    #[test]
    fn cross_layer_and_oversize_gaps_are_fatal() {
        let (grid, inputs, map) = setup();
        assert!(find_short_path_heuristically(
            &grid,
            &inputs,
            &map,
            0,
            Coord::new(0, 0, 0),
            Coord::new(2, 0, 1)
        )
        .is_err());
        assert!(find_short_path_heuristically(
            &grid,
            &inputs,
            &map,
            0,
            Coord::new(0, 0, 0),
            Coord::new(6, 0, 0)
        )
        .is_err());
    }
}
