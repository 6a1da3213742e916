//! Two nets whose straight-line routes collide: the congestion feedback
//! loop must teach them to avoid each other.

use acorn::prelude::*;

fn crossing_router(layers: i32, masks: [u32; 2], max_iterations: usize) -> Router {
    let mut map = MapInfo::new(11, 11, layers, 2, 0, max_iterations);
    map.start_cells[0] = Coord::new(0, 5, 0);
    map.end_cells[0] = Coord::new(10, 5, 0);
    map.start_cells[1] = Coord::new(5, 0, 0);
    map.end_cells[1] = Coord::new(5, 10, 0);
    let mut inputs = InputValues::plain(2, masks[0], DesignRuleSubset::uniform(100.0, 1, 1.0));
    inputs.route_directions[1] = masks[1];
    inputs.base_vert_cost_cells = 1;
    let grid = CellGrid::new(11, 11, layers);
    Router::new(map, inputs, grid).unwrap()
}

#[test]
fn first_iteration_crosses_at_the_center() {
    let mut router = crossing_router(1, [ANY_LATERAL, ANY_LATERAL], 1);
    let summary = router.run().unwrap();
    assert!(!summary.solved);
    assert!(router.paths[0].contains(&Coord::new(5, 5, 0)));
    assert!(router.paths[1].contains(&Coord::new(5, 5, 0)));
    assert!(router.metrics.non_pseudo_drc[1].cells > 0);
}

#[test]
fn congestion_feedback_resolves_the_crossing() {
    // Net 0 is pinned to lateral routing; net 1 may use vias. Two
    // four-connected curves between these terminals must always share a
    // cell on one layer, so the only escape is vertical: once twenty
    // iterations of deposits make the shared cell costlier than a via
    // pair, net 1 climbs over net 0 and stays there.
    let mut router = crossing_router(2, [ANY_LATERAL, ANY], 20);
    // Start at a raised sensitivity so the equilibrium congestion cost of
    // an occupied cell clearly exceeds the via detour.
    router.map.current_trace_cong_sens_index = 4;
    router.map.current_via_cong_sens_index = 4;

    let summary = router.run().unwrap();
    let last = summary.iterations_run;
    assert_eq!(
        router.metrics.non_pseudo_drc[last].cells, 0,
        "crossing not resolved: {} DRC cells at iteration {last}",
        router.metrics.non_pseudo_drc[last].cells
    );
    // The escape was vertical, taken by the net that was allowed to.
    assert_eq!(router.metrics.num_vias[0], 0);
    assert!(router.metrics.num_vias[1] >= 2);
    // Both nets still connect their own terminals.
    assert_eq!(router.paths[0][0], Coord::new(0, 5, 0));
    assert_eq!(*router.paths[0].last().unwrap(), Coord::new(10, 5, 0));
    assert_eq!(router.paths[1][0], Coord::new(5, 0, 0));
    assert_eq!(*router.paths[1].last().unwrap(), Coord::new(5, 10, 0));
}

#[test]
fn crossing_matrix_records_the_conflict() {
    let mut router = crossing_router(1, [ANY_LATERAL, ANY_LATERAL], 1);
    router.run().unwrap();
    assert!(router.metrics.crossings(0, 1) > 0);
    // Nets in conflict are both flagged in the per-path tallies.
    assert!(router.metrics.path_drc_cells[0] > 0);
    assert!(router.metrics.path_drc_cells[1] > 0);
}

#[test]
fn runs_are_deterministic() {
    let run = || {
        let mut router = crossing_router(2, [ANY_LATERAL, ANY], 12);
        router.map.current_trace_cong_sens_index = 4;
        router.map.current_via_cong_sens_index = 4;
        router.run().unwrap();
        (
            router.paths.clone(),
            router.metrics.non_pseudo_path_costs.clone(),
            router.metrics.best_iteration,
        )
    };
    assert_eq!(run(), run());
}
