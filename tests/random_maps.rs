//! Seeded random multi-net maps: every net must reach its terminals with
//! legal moves, and two runs over the same input must agree bit for bit.

use acorn::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn random_router(seed: u64, num_nets: usize, iterations: usize) -> Router {
    let (w, h, layers) = (24, 24, 2);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut map = MapInfo::new(w, h, layers, num_nets, 0, iterations);
    for net in 0..num_nets {
        map.start_cells[net] = Coord::new(rng.gen_range(0..w), rng.gen_range(0..h), 0);
        loop {
            let end = Coord::new(
                rng.gen_range(0..w),
                rng.gen_range(0..h),
                rng.gen_range(0..layers),
            );
            if end.lateral_distance(&map.start_cells[net]) >= 8.0 {
                map.end_cells[net] = end;
                break;
            }
        }
    }
    let inputs = InputValues::plain(num_nets, ANY, DesignRuleSubset::uniform(100.0, 1, 1.0));
    let grid = CellGrid::new(w, h, layers);
    Router::new(map, inputs, grid).unwrap()
}

#[test]
fn every_net_reaches_its_terminals() {
    for seed in [3, 17] {
        let mut router = random_router(seed, 6, 10);
        router.run().unwrap();
        for net in 0..6 {
            let path = &router.paths[net];
            assert_eq!(path[0], router.map.start_cells[net], "seed {seed}, net {net}");
            assert_eq!(
                *path.last().unwrap(),
                router.map.end_cells[net],
                "seed {seed}, net {net}"
            );
            for w in path.windows(2) {
                let (dx, dy, dz) = w[1].delta(&w[0]);
                assert!(
                    allowed_direction(dx, dy, dz, ANY),
                    "seed {seed}, net {net}: illegal jump {} -> {}",
                    w[0],
                    w[1]
                );
            }
            // Distance cost of the contiguous form accounts for the whole
            // non-congestion part of the reported path cost.
            assert!(router.metrics.path_cost[net] > 0);
        }
    }
}

#[test]
fn identical_seeds_give_identical_runs() {
    let run = |seed| {
        let mut router = random_router(seed, 6, 15);
        let summary = router.run().unwrap();
        (
            summary.best_iteration,
            router.paths.clone(),
            router.metrics.non_pseudo_path_costs.clone(),
            router.metrics.cumulative_drc_free_iterations.clone(),
        )
    };
    assert_eq!(run(11), run(11));
    assert_ne!(run(11).1, run(12).1);
}
