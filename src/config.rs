//! Constants used throughout the router. Most of these are candidates for
//! becoming user-configurable options eventually.

use crate::coords::Cost;

/// Cost of traversing one cell laterally, in hundredths of a cell. All
/// G-costs are expressed in this unit so that integer arithmetic suffices.
pub const ONE_TRAVERSAL: Cost = 100;

/// Lateral (N/S/E/W) step cost in hundredths of a cell.
pub const BASE_LATERAL_COST: Cost = ONE_TRAVERSAL;

/// Diagonal step cost: round(100 * sqrt(2)).
pub const BASE_DIAGONAL_COST: Cost = 141;

/// Knight step cost: round(100 * sqrt(5)).
pub const BASE_KNIGHT_COST: Cost = 224;

/// Window size, in iterations, of every sliding-window statistic: recent DRC
/// history per path, sensitivity metrics, the DRC shift registers, and the
/// re-equilibration delay after an algorithm change.
pub const NUM_ITERATIONS_TO_RE_EQUILIBRATE: usize = 20;

/// Upper bound on sub-iterations of the diff-pair sub-map optimizer.
pub const SUBMAP_MAX_ITERATIONS: usize = 8;

/// Default congestion evaporation rate, in percent per iteration.
pub const DEFAULT_EVAP_RATE: f64 = 20.0;

/// Default cost of one cell, used in the congestion-multiplier formula.
pub const DEFAULT_CELL_COST: f64 = 100.0;

/// The ladder of congestion sensitivities, in percent: six geometric steps
/// with a ratio of sqrt(2) between consecutive entries.
pub const CONG_SENSITIVITIES: [u32; 6] = [100, 141, 200, 283, 400, 500];

/// Heuristic divisor applied when either endpoint of an estimate lies in a
/// pin-swap zone. Shrinking H strongly biases the search toward exploring
/// the whole swap region.
pub const PIN_SWAP_HEURISTIC_DIVISOR: Cost = 10;

/// Sub-map optimizer: number of consecutive sub-iterations that must agree
/// on the swap vote before stopping early.
pub const STABLE_SWAP_VOTES: usize = 5;

/// Sub-map optimizer: number of consecutive symmetry ratios that must agree
/// within [`RATIO_STABILITY_TOLERANCE`] before stopping early.
pub const STABLE_RATIO_VOTES: usize = 3;

/// Allowed sub-iteration-to-sub-iteration drift for a symmetry ratio to
/// count as stable.
pub const RATIO_STABILITY_TOLERANCE: f64 = 1e-4;

/// Symmetry ratios inside this dead zone are too close to 0.5 to stop the
/// sub-map loop, unless three identical ratios land inside it.
pub const RATIO_DEAD_ZONE: (f64, f64) = (0.495, 0.505);

/// Evaporation rate applied inside the sub-map optimizer to the two
/// diff-pair children only, in percent per sub-iteration.
pub const SUBMAP_CHILD_EVAP_RATE: f64 = 10.0;
