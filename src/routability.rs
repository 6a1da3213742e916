//! Routability metrics: DRC detection, per-path and per-iteration
//! histories, the plateau detector, and best-iteration selection.

use derive_more::AddAssign;
use rayon::prelude::*;
use rustc_hash::FxHashSet;
use serde::Serialize;
use std::sync::atomic::Ordering;

use crate::cell::ShapeType;
use crate::config::NUM_ITERATIONS_TO_RE_EQUILIBRATE;
use crate::coords::{Coord, Cost, PathNum};
use crate::grid::CellGrid;
use crate::input::InputValues;
use crate::mapinfo::MapInfo;
use crate::path::{count_steps, lateral_length_cells, shapes_along, Path};

/// Sliding-window routing metrics measured while one sensitivity setting
/// was active. `iteration_of_measured_metrics == 0` means not yet
/// measured (or stale and due for re-measurement).
#[derive(Clone, Copy, Debug, Default)]
pub struct DynamicAlgorithmMetrics {
    /// The sensitivity value itself, in percent.
    pub dynamic_parameter: u32,
    pub iteration_of_measured_metrics: usize,
    pub fraction_iterations_without_drcs: f64,
    pub avg_non_pseudo_nets_with_drcs: f64,
    pub stderr_non_pseudo_nets_with_drcs: f64,
    pub avg_non_pseudo_routing_cost: f64,
    pub stderr_non_pseudo_routing_cost: f64,
}

impl DynamicAlgorithmMetrics {
    pub fn measured(&self) -> bool {
        self.iteration_of_measured_metrics != 0
    }

    pub fn invalidate(&mut self) {
        *self = DynamicAlgorithmMetrics {
            dynamic_parameter: self.dynamic_parameter,
            ..Default::default()
        };
    }
}

/// DRC cell counts of one iteration, split by shape-type pair.
#[derive(Clone, Copy, Debug, Default, AddAssign, Serialize)]
pub struct DrcTally {
    pub cells: usize,
    pub trace_to_trace: usize,
    pub via_to_via: usize,
    pub trace_to_via: usize,
}

/// Per-iteration snapshot handed to the statistics/rendering collaborators.
#[derive(Clone, Debug, Serialize)]
pub struct IterationSnapshot {
    pub iteration: usize,
    pub non_pseudo_path_length_cells: f64,
    pub non_pseudo_path_cost: Cost,
    pub non_pseudo_via_count: usize,
    pub drc: DrcTally,
    pub nets_with_drcs: usize,
    pub in_metrics_plateau: bool,
    pub cumulative_drc_free_iterations: usize,
    pub elapsed_seconds: f32,
}

/// The full metrics record of a run. Per-path arrays are indexed by path
/// number over `[0, total_nets)`; per-iteration arrays are indexed by
/// iteration number and sized `max_iterations + 1` (iteration 0 unused).
pub struct RoutingMetrics {
    num_paths: usize,
    total_nets: usize,
    num_layers: usize,

    // Per-path, refreshed every iteration.
    pub path_cost: Vec<Cost>,
    pub lateral_path_lengths: Vec<f64>,
    pub num_adjacent_steps: Vec<usize>,
    pub num_diagonal_steps: Vec<usize>,
    pub num_knight_steps: Vec<usize>,
    pub num_vias: Vec<usize>,
    pub path_drc_cells: Vec<usize>,
    pub path_drc_cells_by_layer: Vec<Vec<usize>>,
    pub path_explored_cells: Vec<u64>,
    pub path_elapsed_seconds: Vec<f32>,

    /// `crossing_matrix[i][j]` for `j <= i`: DRC cells where nets i and j
    /// share space illegally. The diagonal records self-conflicts.
    pub crossing_matrix: Vec<Vec<usize>>,

    /// Circular buffers of per-path DRC cells over the last
    /// [`NUM_ITERATIONS_TO_RE_EQUILIBRATE`] iterations.
    pub recent_path_drc_cells: Vec<[usize; NUM_ITERATIONS_TO_RE_EQUILIBRATE]>,
    pub fraction_recent_iterations_without_path_drcs: Vec<f64>,

    // Per-iteration histories.
    pub non_pseudo_path_lengths: Vec<f64>,
    pub non_pseudo_drc: Vec<DrcTally>,
    pub non_pseudo_via_counts: Vec<usize>,
    pub non_pseudo_path_costs: Vec<Cost>,
    pub num_non_pseudo_drc_nets: Vec<usize>,
    pub path_costs_stddev_trailing: Vec<f64>,
    pub path_costs_slope_trailing: Vec<f64>,
    pub in_metrics_plateau: Vec<bool>,
    pub cumulative_drc_free_iterations: Vec<usize>,
    pub iteration_elapsed_seconds: Vec<f32>,
    pub iteration_explored_cells: Vec<u64>,

    // Algorithm-change decisions per iteration.
    pub swap_start_and_end_terms: Vec<bool>,
    pub change_via_cong_sensitivity: Vec<bool>,
    pub change_trace_cong_sensitivity: Vec<bool>,
    pub enable_pseudo_trace_congestion: Vec<bool>,

    /// 32-bit shift registers: bit k set means iteration `current - k` had
    /// a DRC for that (pseudo-path, layer).
    pub recent_drc_flags_by_pseudo_path_layer: Vec<Vec<u32>>,

    // Adaptive-controller state.
    pub trace_cong_sensitivity_metrics: Vec<DynamicAlgorithmMetrics>,
    pub via_cong_sensitivity_metrics: Vec<DynamicAlgorithmMetrics>,
    pub num_start_end_terminal_swaps: usize,
    pub num_via_cong_sensitivity_changes: usize,
    pub num_trace_cong_sensitivity_changes: usize,
    pub num_via_cong_sensitivity_reductions: usize,
    pub num_trace_cong_sensitivity_reductions: usize,
    pub num_via_cong_sensitivity_stable: usize,
    pub num_trace_cong_sensitivity_stable: usize,
    pub latest_algorithm_change: usize,
    pub fraction_recent_iterations_without_map_drcs: f64,

    /// First iteration at which the cumulative DRC-free count reached the
    /// threshold; zero until then.
    pub drc_free_threshold_achieved: usize,
    pub best_iteration: usize,
}

impl RoutingMetrics {
    pub fn new(map: &MapInfo) -> Self {
        let total = map.total_nets();
        let iters = map.max_iterations + 1;
        let layers = map.num_layers as usize;
        RoutingMetrics {
            num_paths: map.num_paths,
            total_nets: total,
            num_layers: layers,
            path_cost: vec![0; total],
            lateral_path_lengths: vec![0.0; total],
            num_adjacent_steps: vec![0; total],
            num_diagonal_steps: vec![0; total],
            num_knight_steps: vec![0; total],
            num_vias: vec![0; total],
            path_drc_cells: vec![0; total],
            path_drc_cells_by_layer: vec![vec![0; layers]; total],
            path_explored_cells: vec![0; total],
            path_elapsed_seconds: vec![0.0; total],
            crossing_matrix: (0..total).map(|i| vec![0; i + 1]).collect(),
            recent_path_drc_cells: vec![[0; NUM_ITERATIONS_TO_RE_EQUILIBRATE]; total],
            fraction_recent_iterations_without_path_drcs: vec![1.0; total],
            non_pseudo_path_lengths: vec![0.0; iters],
            non_pseudo_drc: vec![DrcTally::default(); iters],
            non_pseudo_via_counts: vec![0; iters],
            non_pseudo_path_costs: vec![0; iters],
            num_non_pseudo_drc_nets: vec![0; iters],
            path_costs_stddev_trailing: vec![0.0; iters],
            path_costs_slope_trailing: vec![0.0; iters],
            in_metrics_plateau: vec![false; iters],
            cumulative_drc_free_iterations: vec![0; iters],
            iteration_elapsed_seconds: vec![0.0; iters],
            iteration_explored_cells: vec![0; iters],
            swap_start_and_end_terms: vec![false; iters],
            change_via_cong_sensitivity: vec![false; iters],
            change_trace_cong_sensitivity: vec![false; iters],
            enable_pseudo_trace_congestion: vec![false; iters],
            recent_drc_flags_by_pseudo_path_layer: vec![vec![0; layers]; map.num_pseudo_paths],
            trace_cong_sensitivity_metrics: sensitivity_ladder(),
            via_cong_sensitivity_metrics: sensitivity_ladder(),
            num_start_end_terminal_swaps: 0,
            num_via_cong_sensitivity_changes: 0,
            num_trace_cong_sensitivity_changes: 0,
            num_via_cong_sensitivity_reductions: 0,
            num_trace_cong_sensitivity_reductions: 0,
            num_via_cong_sensitivity_stable: 0,
            num_trace_cong_sensitivity_stable: 0,
            latest_algorithm_change: 0,
            fraction_recent_iterations_without_map_drcs: 1.0,
            drc_free_threshold_achieved: 0,
            best_iteration: 0,
        }
    }

    /// Crossing-matrix accessor for an unordered net pair.
    pub fn crossings(&self, a: PathNum, b: PathNum) -> usize {
        let (hi, lo) = if a >= b { (a, b) } else { (b, a) };
        self.crossing_matrix[hi][lo]
    }

    fn add_crossing(&mut self, a: PathNum, b: PathNum) {
        let (hi, lo) = if a >= b { (a, b) } else { (b, a) };
        self.crossing_matrix[hi][lo] += 1;
    }

    /// Path-level metrics for one iteration: lengths, step counts, via
    /// counts, and the centerline marks in the grid. Serial: the marking
    /// grows per-cell sparse lists.
    pub fn calc_path_metrics(
        &mut self,
        grid: &mut CellGrid,
        map: &MapInfo,
        paths: &[Path],
        contiguous_paths: &[Path],
    ) {
        grid.clear_marking_state();
        for path in 0..map.total_nets() {
            let steps = count_steps(&paths[path]);
            self.num_adjacent_steps[path] = steps.adjacent;
            self.num_diagonal_steps[path] = steps.diagonal;
            self.num_knight_steps[path] = steps.knight;
            self.num_vias[path] = steps.vias;
            self.lateral_path_lengths[path] = lateral_length_cells(&paths[path]);

            let pseudo = map.is_pseudo_path(path);
            for (c, shape) in shapes_along(&contiguous_paths[path]) {
                let cell = grid.cell_mut(c);
                cell.add_path_center_info(path, shape);
                match shape {
                    ShapeType::Trace => {
                        cell.center_line_flag = true;
                        if pseudo {
                            cell.pseudo_routing_layer_metal_fill = true;
                        } else {
                            cell.routing_layer_metal_fill = true;
                        }
                    }
                    ShapeType::ViaUp => {
                        cell.via_up_center_flag = true;
                        if pseudo {
                            cell.pseudo_via_above_metal_fill = true;
                        } else {
                            cell.via_above_metal_fill = true;
                        }
                    }
                    ShapeType::ViaDown => {
                        cell.via_down_center_flag = true;
                        if pseudo {
                            cell.pseudo_via_below_metal_fill = true;
                        } else {
                            cell.via_below_metal_fill = true;
                        }
                    }
                }
            }
        }
    }

    /// Flag every cell within the layer's interaction radius of a
    /// centerline, so the DRC pass can skip everything else.
    ///
    /// Parallel over paths: each worker only stores `true` into the atomic
    /// flag byte, so racing writers agree. This is the documented contract
    /// that makes the per-path parallelism sound.
    pub fn mark_cells_near_centerlines(
        grid: &CellGrid,
        map: &MapInfo,
        contiguous_paths: &[Path],
    ) {
        contiguous_paths.par_iter().for_each(|contig| {
            for &c in contig {
                let radius = map.max_interaction_radius_cells[c.z as usize];
                let r2 = map.max_interaction_radius_squared[c.z as usize];
                for dy in -radius..=radius {
                    for dx in -radius..=radius {
                        if (dx as i64) * (dx as i64) + (dy as i64) * (dy as i64) > r2 {
                            continue;
                        }
                        let n = Coord::new(c.x + dx, c.y + dy, c.z);
                        if grid.contains(n) {
                            grid.cell(n).near_a_net.store(true, Ordering::Relaxed);
                        }
                    }
                }
            }
        });
    }

    /// Detect design-rule violations: two paths conflict on a cell when
    /// their centerlines are closer than the rule spacing for the relevant
    /// shape-type pair. Shape pairs considered are trace-trace, via-via,
    /// and trace-via.
    pub fn detect_drcs(&mut self, grid: &mut CellGrid, inputs: &InputValues, map: &MapInfo) {
        for path in 0..self.total_nets {
            self.path_drc_cells[path] = 0;
            self.path_drc_cells_by_layer[path].fill(0);
        }
        for row in &mut self.crossing_matrix {
            row.fill(0);
        }

        let mut drc_cells: Vec<(Coord, PathNum, PathNum, ShapeType, ShapeType)> = Vec::new();
        let mut seen: FxHashSet<(PathNum, PathNum, u8, u8)> = FxHashSet::default();

        for index in 0..grid.num_cells() {
            let c = grid.coord_of(index);
            let here = grid.cell(c);
            if here.path_centers.is_empty() || !here.near_a_net.load(Ordering::Relaxed) {
                continue;
            }
            seen.clear();
            let radius = map.max_interaction_radius_cells[c.z as usize];
            let set = here.design_rule_set;

            for dy in -radius..=radius {
                for dx in -radius..=radius {
                    let n = Coord::new(c.x + dx, c.y + dy, c.z);
                    if !grid.contains(n) {
                        continue;
                    }
                    let there = grid.cell(n);
                    if there.path_centers.is_empty() {
                        continue;
                    }
                    let dist = ((dx as f64) * (dx as f64) + (dy as f64) * (dy as f64)).sqrt();
                    for a in here.path_centers.iter() {
                        for b in there.path_centers.iter() {
                            let (pa, pb) = (a.path as PathNum, b.path as PathNum);
                            if inputs.is_friendly(pa, pb) {
                                continue;
                            }
                            let rule = inputs.rule(set, inputs.subset_of(pa, set));
                            if dist >= rule.spacing_for(a.shape, b.shape) as f64 {
                                continue;
                            }
                            let key = (pa, pb, a.shape as u8, b.shape as u8);
                            if seen.insert(key) {
                                drc_cells.push((c, pa, pb, a.shape, b.shape));
                            }
                        }
                    }
                }
            }
        }

        let iteration = map.current_iteration;
        let mut tally = DrcTally::default();
        let mut non_pseudo_cells: FxHashSet<usize> = FxHashSet::default();
        for (c, pa, pb, sa, sb) in drc_cells {
            let layer = c.z as usize;
            self.path_drc_cells[pa] += 1;
            self.path_drc_cells_by_layer[pa][layer] += 1;
            self.add_crossing(pa, pb);

            let both_user = pa < self.num_paths && pb < self.num_paths;
            let index = grid.index(c);
            if both_user {
                grid.cell_mut(c).drc_flag = true;
                if non_pseudo_cells.insert(index) {
                    tally.cells += 1;
                    match (sa.is_via(), sb.is_via()) {
                        (false, false) => tally.trace_to_trace += 1,
                        (true, true) => tally.via_to_via += 1,
                        _ => tally.trace_to_via += 1,
                    }
                }
            } else {
                grid.cell_mut(c).pseudo_drc_flag = true;
            }
        }
        self.non_pseudo_drc[iteration] = tally;
    }

    /// Fold this iteration's per-path data into the history arrays, advance
    /// the circular buffers and shift registers, and re-evaluate the
    /// plateau flag.
    pub fn update_history(&mut self, inputs: &InputValues, map: &MapInfo) {
        let iteration = map.current_iteration;
        let slot = iteration % NUM_ITERATIONS_TO_RE_EQUILIBRATE;

        let mut total_cost = 0;
        let mut total_length = 0.0;
        let mut total_vias = 0;
        let mut drc_nets = 0;
        for path in 0..self.num_paths {
            total_cost += self.path_cost[path];
            total_length += self.lateral_path_lengths[path];
            total_vias += self.num_vias[path];
            if self.path_drc_cells[path] > 0 {
                drc_nets += 1;
            }
        }
        self.non_pseudo_path_costs[iteration] = total_cost;
        self.non_pseudo_path_lengths[iteration] = total_length;
        self.non_pseudo_via_counts[iteration] = total_vias;
        self.num_non_pseudo_drc_nets[iteration] = drc_nets;

        for path in 0..self.total_nets {
            self.recent_path_drc_cells[path][slot] = self.path_drc_cells[path];
            self.fraction_recent_iterations_without_path_drcs[path] = 1.0
                - calc_fraction_of_recent_iterations_with_drcs(
                    &self.recent_path_drc_cells[path],
                    iteration.min(NUM_ITERATIONS_TO_RE_EQUILIBRATE),
                );
        }

        // Advance the per-(pseudo-path, layer) DRC shift registers.
        for pseudo in 0..self.recent_drc_flags_by_pseudo_path_layer.len() {
            let (c1, c2) = inputs.pseudo_net_to_diff_pair[pseudo];
            for layer in 0..self.num_layers {
                let register = &mut self.recent_drc_flags_by_pseudo_path_layer[pseudo][layer];
                *register <<= 1;
                if self.path_drc_cells_by_layer[c1][layer] > 0
                    || self.path_drc_cells_by_layer[c2][layer] > 0
                {
                    *register |= 1;
                } else {
                    *register &= !1;
                }
            }
        }

        let drc_free = self.non_pseudo_drc[iteration].cells == 0;
        self.cumulative_drc_free_iterations[iteration] =
            self.cumulative_drc_free_iterations[iteration.saturating_sub(1)]
                + usize::from(drc_free);

        self.determine_if_metrics_plateaued(iteration);
    }

    /// Least-squares slope and population standard deviation of the last
    /// `window` values of `series` ending at `end` inclusive.
    fn trailing_stats(series: &[Cost], end: usize, window: usize) -> (f64, f64, f64) {
        let first = end + 1 - window;
        let n = window as f64;
        let mean_x = (first + end) as f64 / 2.0;
        let mean_y = series[first..=end].iter().map(|&v| v as f64).sum::<f64>() / n;
        let mut cov = 0.0;
        let mut var_x = 0.0;
        let mut var_y = 0.0;
        for (i, &v) in series[first..=end].iter().enumerate() {
            let dx = (first + i) as f64 - mean_x;
            let dy = v as f64 - mean_y;
            cov += dx * dy;
            var_x += dx * dx;
            var_y += dy * dy;
        }
        let slope = if var_x == 0.0 { 0.0 } else { cov / var_x };
        let stddev = (var_y / n).sqrt();
        (slope, stddev, mean_y)
    }

    /// The plateau test over the non-pseudo path costs.
    ///
    /// Rule 1: slope and standard deviation over the last 10 iterations
    /// are both exactly zero. Rule 2: the standard deviation is at most
    /// twice the one measured 10 iterations earlier, the slope magnitude
    /// is at most 0.1%/iteration now and was at most 0.2%/iteration then.
    pub fn determine_if_metrics_plateaued(&mut self, iteration: usize) {
        const WINDOW: usize = 10;
        if iteration < WINDOW {
            return;
        }
        let (slope, stddev, mean) =
            Self::trailing_stats(&self.non_pseudo_path_costs, iteration, WINDOW);
        self.path_costs_slope_trailing[iteration] = slope;
        self.path_costs_stddev_trailing[iteration] = stddev;

        if slope == 0.0 && stddev == 0.0 {
            self.in_metrics_plateau[iteration] = true;
            return;
        }
        if iteration < 2 * WINDOW {
            return;
        }
        let slope_pct = |slope: f64, mean: f64| {
            if mean == 0.0 {
                0.0
            } else {
                slope / mean * 100.0
            }
        };
        let prev_slope = self.path_costs_slope_trailing[iteration - WINDOW];
        let prev_stddev = self.path_costs_stddev_trailing[iteration - WINDOW];
        let (_, _, prev_mean) =
            Self::trailing_stats(&self.non_pseudo_path_costs, iteration - WINDOW, WINDOW);
        if stddev <= 2.0 * prev_stddev
            && slope_pct(slope, mean).abs() <= 0.1
            && slope_pct(prev_slope, prev_mean).abs() <= 0.2
        {
            self.in_metrics_plateau[iteration] = true;
        }
    }

    /// The iteration to report. With no DRC-free iteration on record, the
    /// one with the fewest non-pseudo DRC cells (lowest iteration wins
    /// ties); otherwise the DRC-free iteration with the lowest cost.
    /// Iteration 1 is skipped when user cost multipliers exist, since it
    /// was routed multiplier-blind for the rat's-nest view.
    pub fn determine_best_iteration(&mut self, map: &MapInfo, cost_multipliers_used: bool) {
        let start = if cost_multipliers_used && map.current_iteration > 1 {
            2
        } else {
            1
        };
        let current = map.current_iteration;
        let any_drc_free = self.cumulative_drc_free_iterations[current] > 0;

        let mut best = start;
        if any_drc_free {
            let mut min_cost = Cost::MAX;
            for iteration in start..=current {
                if self.non_pseudo_drc[iteration].cells == 0
                    && self.non_pseudo_path_costs[iteration] < min_cost
                {
                    min_cost = self.non_pseudo_path_costs[iteration];
                    best = iteration;
                }
            }
        } else {
            let mut min_cells = usize::MAX;
            for iteration in start..=current {
                if self.non_pseudo_drc[iteration].cells < min_cells {
                    min_cells = self.non_pseudo_drc[iteration].cells;
                    best = iteration;
                }
            }
        }
        self.best_iteration = best;
    }

    pub fn snapshot(&self, iteration: usize) -> IterationSnapshot {
        IterationSnapshot {
            iteration,
            non_pseudo_path_length_cells: self.non_pseudo_path_lengths[iteration],
            non_pseudo_path_cost: self.non_pseudo_path_costs[iteration],
            non_pseudo_via_count: self.non_pseudo_via_counts[iteration],
            drc: self.non_pseudo_drc[iteration],
            nets_with_drcs: self.num_non_pseudo_drc_nets[iteration],
            in_metrics_plateau: self.in_metrics_plateau[iteration],
            cumulative_drc_free_iterations: self.cumulative_drc_free_iterations[iteration],
            elapsed_seconds: self.iteration_elapsed_seconds[iteration],
        }
    }
}

/// Mean and standard error of the mean of a window of values.
pub fn mean_and_stderr<T>(values: impl Iterator<Item = T>) -> (f64, f64)
where
    T: num_traits::AsPrimitive<f64>,
{
    let mut n = 0usize;
    let mut sum = 0.0;
    let mut sum_sq = 0.0;
    for v in values {
        let v = v.as_();
        n += 1;
        sum += v;
        sum_sq += v * v;
    }
    if n == 0 {
        return (0.0, 0.0);
    }
    let n = n as f64;
    let mean = sum / n;
    let stderr = ((sum_sq - sum * sum / n).max(0.0)).sqrt() / n;
    (mean, stderr)
}

fn sensitivity_ladder() -> Vec<DynamicAlgorithmMetrics> {
    crate::config::CONG_SENSITIVITIES
        .iter()
        .map(|&s| DynamicAlgorithmMetrics {
            dynamic_parameter: s,
            ..Default::default()
        })
        .collect()
}

/// Fraction (0 to 1) of the most recent `num_iterations` entries of a
/// recent-DRC circular buffer that recorded a violation. `num_iterations`
/// is capped at the buffer length.
pub fn calc_fraction_of_recent_iterations_with_drcs(
    recent: &[usize; NUM_ITERATIONS_TO_RE_EQUILIBRATE],
    num_iterations: usize,
) -> f64 {
    let n = num_iterations.clamp(1, NUM_ITERATIONS_TO_RE_EQUILIBRATE);
    let with_drcs = recent.iter().take(n).filter(|&&cells| cells > 0).count();
    with_drcs as f64 / n as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics_for(iterations: usize) -> (RoutingMetrics, MapInfo) {
        let map = MapInfo::new(10, 10, 1, 2, 0, iterations);
        let metrics = RoutingMetrics::new(&map);
        (metrics, map)
    }

    #[test]
    fn constant_costs_plateau_by_rule_one() {
        let (mut metrics, _) = metrics_for(30);
        for i in 1..=20 {
            metrics.non_pseudo_path_costs[i] = 1000;
        }
        metrics.determine_if_metrics_plateaued(20);
        assert!(metrics.in_metrics_plateau[20]);
    }

    #[test]
    fn steep_costs_do_not_plateau() {
        let (mut metrics, _) = metrics_for(30);
        for i in 1..=20 {
            metrics.non_pseudo_path_costs[i] = (1000 * i) as Cost;
        }
        metrics.determine_if_metrics_plateaued(20);
        assert!(!metrics.in_metrics_plateau[20]);
    }

    #[test]
    fn best_iteration_prefers_drc_free_lowest_cost() {
        let (mut metrics, mut map) = metrics_for(10);
        map.current_iteration = 4;
        metrics.non_pseudo_drc[1].cells = 5;
        metrics.non_pseudo_drc[2].cells = 0;
        metrics.non_pseudo_drc[3].cells = 0;
        metrics.non_pseudo_drc[4].cells = 2;
        metrics.non_pseudo_path_costs[2] = 900;
        metrics.non_pseudo_path_costs[3] = 700;
        metrics.cumulative_drc_free_iterations[4] = 2;
        metrics.determine_best_iteration(&map, false);
        assert_eq!(metrics.best_iteration, 3);
    }

    #[test]
    fn best_iteration_minimizes_drcs_when_none_clean() {
        let (mut metrics, mut map) = metrics_for(10);
        map.current_iteration = 3;
        metrics.non_pseudo_drc[1].cells = 5;
        metrics.non_pseudo_drc[2].cells = 3;
        metrics.non_pseudo_drc[3].cells = 3;
        metrics.determine_best_iteration(&map, false);
        assert_eq!(metrics.best_iteration, 2);
    }

    #[test]
    fn fraction_of_recent_drc_iterations() {
        let mut recent = [0; NUM_ITERATIONS_TO_RE_EQUILIBRATE];
        recent[0] = 4;
        recent[5] = 1;
        assert_eq!(calc_fraction_of_recent_iterations_with_drcs(&recent, 20), 0.1);
        assert_eq!(calc_fraction_of_recent_iterations_with_drcs(&recent, 4), 0.25);
    }

    #[test]
    fn crossing_matrix_is_symmetric_by_construction() {
        let (mut metrics, _) = metrics_for(5);
        metrics.add_crossing(0, 1);
        metrics.add_crossing(1, 0);
        assert_eq!(metrics.crossings(0, 1), 2);
        assert_eq!(metrics.crossings(1, 0), 2);
    }
}
