//! End-to-end scenarios for a single routed net.

use acorn::prelude::*;
use itertools::Itertools;

fn plain_router(w: i32, h: i32, layers: i32, mask: u32, max_iterations: usize) -> Router {
    let map = MapInfo::new(w, h, layers, 1, 0, max_iterations);
    let inputs = InputValues::plain(1, mask, DesignRuleSubset::uniform(100.0, 1, 1.0));
    let grid = CellGrid::new(w, h, layers);
    Router::new(map, inputs, grid).unwrap()
}

#[test]
fn single_straight_path() {
    let mut router = plain_router(11, 11, 1, ANY_LATERAL, 5);
    router.map.start_cells[0] = Coord::new(0, 0, 0);
    router.map.end_cells[0] = Coord::new(10, 0, 0);

    let summary = router.run().unwrap();
    assert!(summary.solved);

    let path = &router.paths[0];
    assert_eq!(path.len(), 11);
    for (a, b) in path.iter().tuple_windows() {
        assert_eq!(b.delta(a), (1, 0, 0));
    }
    // 10 lateral moves at one traversal each.
    assert_eq!(router.metrics.path_cost[0], 10 * BASE_LATERAL_COST);
    // The contiguous form of an already-contiguous path is itself.
    assert_eq!(&router.contiguous_paths[0], path);
}

#[test]
fn knight_target_routes_in_one_jump() {
    let mut router = plain_router(5, 5, 1, ANY_LATERAL, 3);
    router.map.start_cells[0] = Coord::new(0, 0, 0);
    router.map.end_cells[0] = Coord::new(3, 1, 0);

    router.run().unwrap();
    // Knight plus lateral, or lateral plus knight: cost 324 either way.
    assert_eq!(
        router.metrics.path_cost[0],
        BASE_KNIGHT_COST + BASE_LATERAL_COST
    );
    // The contiguous form is all unit steps.
    for (a, b) in router.contiguous_paths[0].iter().tuple_windows() {
        let (dx, dy, dz) = b.delta(a);
        assert_eq!(dx.abs() + dy.abs() + dz.abs(), 1);
    }
}

#[test]
fn returned_path_is_reproducible_across_runs() {
    let run = || {
        let mut router = plain_router(16, 16, 2, ANY, 8);
        router.map.start_cells[0] = Coord::new(1, 14, 0);
        router.map.end_cells[0] = Coord::new(14, 2, 1);
        router.run().unwrap();
        (router.paths[0].clone(), router.metrics.path_cost[0])
    };
    let first = run();
    let second = run();
    assert_eq!(first, second);
}

#[test]
fn plateau_flag_set_for_flat_cost_history() {
    let mut router = plain_router(11, 11, 1, ANY_LATERAL, 40);
    router.map.start_cells[0] = Coord::new(0, 0, 0);
    router.map.end_cells[0] = Coord::new(10, 0, 0);
    // Inject a cost history by hand: noisy early iterations, then flat
    // 1000 in iterations 11..20.
    for i in 1..=10 {
        router.metrics.non_pseudo_path_costs[i] = 1000 + 37 * i as Cost;
    }
    for i in 11..=20 {
        router.metrics.non_pseudo_path_costs[i] = 1000;
    }
    router.metrics.determine_if_metrics_plateaued(20);
    assert!(router.metrics.in_metrics_plateau[20]);
}
