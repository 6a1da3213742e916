//! The adaptive controller: terminal swapping, congestion-sensitivity
//! stepping, pseudo-via trace repulsion, and the solved test.
//!
//! At most one class of change fires per iteration, assessed in reverse
//! order of likelihood: pseudo-via repulsion, then sensitivity stepping,
//! then terminal swaps. Nothing fires outside a metrics plateau, within
//! three re-equilibration windows of the previous change, after the
//! DRC-free threshold is met, or within one window of the iteration cap.

use log::{debug, info, warn};

use crate::config::{CONG_SENSITIVITIES, NUM_ITERATIONS_TO_RE_EQUILIBRATE};
use crate::input::InputValues;
use crate::mapinfo::MapInfo;
use crate::routability::{mean_and_stderr, DynamicAlgorithmMetrics, RoutingMetrics};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Comparison {
    Worse,
    Equivalent,
    Better,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SensitivityChange {
    Increase,
    Decrease,
    NoChange,
}

/// Compare the routing metrics measured at two sensitivity settings.
///
/// Three-stage ladder, each stage falling through when the values are
/// statistically indistinguishable: DRC-free fraction with a 0.05
/// dead-band, then nets-with-DRCs with `max(0.5, stderr)` bands, then
/// routing cost with `max(5% of mean, stderr)` bands.
pub fn compare_routing_metrics(
    first: &DynamicAlgorithmMetrics,
    second: &DynamicAlgorithmMetrics,
) -> Comparison {
    assert!(
        first.measured() && second.measured(),
        "comparing unmeasured sensitivity metrics ({}% vs {}%)",
        first.dynamic_parameter,
        second.dynamic_parameter
    );

    let fraction_delta =
        first.fraction_iterations_without_drcs - second.fraction_iterations_without_drcs;
    if fraction_delta >= 0.05 {
        return Comparison::Better;
    }
    if fraction_delta <= -0.05 {
        return Comparison::Worse;
    }

    let average =
        0.5 * (first.avg_non_pseudo_nets_with_drcs + second.avg_non_pseudo_nets_with_drcs);
    if average > 1e-5 {
        let band_1 = first.stderr_non_pseudo_nets_with_drcs.max(0.5);
        let band_2 = second.stderr_non_pseudo_nets_with_drcs.max(0.5);
        if first.avg_non_pseudo_nets_with_drcs + band_1
            < second.avg_non_pseudo_nets_with_drcs - band_2
        {
            return Comparison::Better;
        }
        if first.avg_non_pseudo_nets_with_drcs - band_1
            > second.avg_non_pseudo_nets_with_drcs + band_2
        {
            return Comparison::Worse;
        }
    }

    let cost_band_1 = (0.05 * first.avg_non_pseudo_routing_cost).max(first.stderr_non_pseudo_routing_cost);
    let cost_band_2 =
        (0.05 * second.avg_non_pseudo_routing_cost).max(second.stderr_non_pseudo_routing_cost);
    if first.avg_non_pseudo_routing_cost + cost_band_1
        < second.avg_non_pseudo_routing_cost - cost_band_2
    {
        return Comparison::Better;
    }
    if first.avg_non_pseudo_routing_cost - cost_band_1
        > second.avg_non_pseudo_routing_cost + cost_band_2
    {
        return Comparison::Worse;
    }

    warn!(
        "routing metrics for sensitivities {}% and {}% are statistically equivalent",
        first.dynamic_parameter, second.dynamic_parameter
    );
    Comparison::Equivalent
}

/// Tallies a sensitivity assessment feeds back into the metrics record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AssessmentOutcome {
    pub change: Option<SensitivityChange>,
    pub counted_change: bool,
    pub counted_reduction: bool,
    pub counted_stable: bool,
}

/// Decide whether to step one congestion sensitivity up or down its
/// ladder.
///
/// The decision depends on the current index position, on whether metrics
/// exist for the neighboring indices, and on the three pairwise
/// comparisons among current/lower/higher. The 26-case truth table biases
/// toward higher sensitivities: an equivalent comparison prefers
/// Increase, and most Equivalent outcomes additionally mark the setting
/// as stable.
pub fn assess_congestion_sensitivity(
    ladder: &[DynamicAlgorithmMetrics],
    current: usize,
    iteration: usize,
) -> AssessmentOutcome {
    use Comparison::*;
    use SensitivityChange::*;

    let top = ladder.len() - 1;
    let (condition, change, stable): (u8, SensitivityChange, bool) = if current == 0 {
        if !ladder[1].measured() {
            (1, Increase, false)
        } else {
            match compare_routing_metrics(&ladder[0], &ladder[1]) {
                Worse => (2, Increase, false),
                Better => (3, NoChange, false),
                Equivalent => (4, Increase, true),
            }
        }
    } else if current < top {
        let lower_known = ladder[current - 1].measured();
        let higher_known = ladder[current + 1].measured();
        if !lower_known {
            if !higher_known {
                (5, Increase, false)
            } else {
                match compare_routing_metrics(&ladder[current], &ladder[current + 1]) {
                    Worse => (6, Increase, false),
                    Better => (7, Decrease, false),
                    Equivalent => (8, Increase, true),
                }
            }
        } else if !higher_known {
            match compare_routing_metrics(&ladder[current], &ladder[current - 1]) {
                Worse => (9, Decrease, false),
                Better => (10, Increase, false),
                Equivalent => (11, Increase, true),
            }
        } else {
            match compare_routing_metrics(&ladder[current], &ladder[current - 1]) {
                Worse => match compare_routing_metrics(&ladder[current], &ladder[current + 1]) {
                    Worse => {
                        match compare_routing_metrics(&ladder[current + 1], &ladder[current - 1]) {
                            Worse => (12, Decrease, false),
                            Better => (13, Increase, false),
                            Equivalent => (14, Increase, false),
                        }
                    }
                    Better => (15, Decrease, false),
                    Equivalent => (16, Increase, true),
                },
                Better => match compare_routing_metrics(&ladder[current], &ladder[current + 1]) {
                    Worse => (17, Increase, false),
                    Better => (18, NoChange, true),
                    Equivalent => (19, Increase, true),
                },
                Equivalent => match compare_routing_metrics(&ladder[current], &ladder[current + 1]) {
                    Worse => (20, Increase, false),
                    Better => (21, NoChange, true),
                    Equivalent => (22, Increase, true),
                },
            }
        }
    } else {
        // Highest rung.
        if !ladder[current - 1].measured() {
            (23, Decrease, false)
        } else {
            match compare_routing_metrics(&ladder[current], &ladder[current - 1]) {
                Worse => (24, Decrease, false),
                Better | Equivalent => (25, NoChange, true),
            }
        }
    };

    debug!(
        "sensitivity condition #{condition} at iteration {iteration}: {:?} from {}%",
        change, ladder[current].dynamic_parameter
    );

    AssessmentOutcome {
        change: Some(change),
        counted_change: change != NoChange,
        counted_reduction: change == Decrease,
        counted_stable: stable,
    }
}

/// Flag paths whose recent history is DRC-heavy for start/end-terminal
/// exchange, and perform the exchange unless `count_only`. Returns the
/// number of non-pseudo paths flagged.
///
/// Paths starting in a pin-swap zone and pseudo-nets are never flagged
/// directly; flagging a diff-pair child also flags its partner and its
/// pseudo parent so the trio swaps together.
pub fn swap_start_and_end_terminals_of_drc_paths(
    map: &mut MapInfo,
    metrics: &RoutingMetrics,
    inputs: &InputValues,
    count_only: bool,
) -> usize {
    let total = map.total_nets();
    let mut swap_path = vec![false; total];
    for path in 0..total {
        if map.swap_zone[path] != 0 || inputs.is_pseudo_net[path] {
            continue;
        }
        if metrics.fraction_recent_iterations_without_path_drcs[path] < 0.5 {
            swap_path[path] = true;
            if inputs.is_diff_pair[path] {
                swap_path[inputs.diff_pair_partner[path]] = true;
                swap_path[inputs.diff_pair_to_pseudo_net[path]] = true;
            }
        }
    }

    let mut swapped = 0;
    for path in 0..total {
        if !swap_path[path] {
            continue;
        }
        if !count_only {
            map.swap_start_and_end_terminals(path);
            info!("swapped start/end terminals of net {path} ({})", inputs.net_names[path]);
        }
        if !inputs.is_pseudo_net[path] {
            swapped += 1;
        }
    }
    swapped
}

/// One iteration of the controller: refresh the sliding-window metrics for
/// the active sensitivities, invalidate stale neighbors, and decide which
/// single algorithm change (if any) this iteration makes.
pub fn determine_algorithm_changes(
    map: &mut MapInfo,
    metrics: &mut RoutingMetrics,
    inputs: &InputValues,
    drc_free_threshold: usize,
) {
    let iteration = map.current_iteration;
    metrics.swap_start_and_end_terms[iteration] = false;
    metrics.change_via_cong_sensitivity[iteration] = false;
    metrics.change_trace_cong_sensitivity[iteration] = false;
    metrics.enable_pseudo_trace_congestion[iteration] = false;

    // Sliding-window statistics over the recent iterations: DRC-free
    // fraction, nets with DRCs, and routing cost, each with a standard
    // error of the mean. Iterations without DRCs contribute zero to the
    // nets tally but still count toward the window.
    let window = iteration.min(NUM_ITERATIONS_TO_RE_EQUILIBRATE);
    let first = iteration + 1 - window;
    let with_drcs = (first..=iteration)
        .filter(|&i| metrics.non_pseudo_drc[i].cells > 0)
        .count();
    metrics.fraction_recent_iterations_without_map_drcs = 1.0 - with_drcs as f64 / window as f64;
    let (avg_nets, stderr_nets) = mean_and_stderr((first..=iteration).map(|i| {
        if metrics.non_pseudo_drc[i].cells > 0 {
            metrics.num_non_pseudo_drc_nets[i]
        } else {
            0
        }
    }));
    let (avg_cost, stderr_cost) =
        mean_and_stderr((first..=iteration).map(|i| metrics.non_pseudo_path_costs[i]));

    let num_swap_eligible =
        swap_start_and_end_terminals_of_drc_paths(map, metrics, inputs, true);

    // Count (pseudo-path, layer) pairs whose DRC shift register shows a
    // solid run of recent violations.
    let all_ones: u32 = (1 << NUM_ITERATIONS_TO_RE_EQUILIBRATE) - 1;
    let mut num_repulsion_eligible = 0;
    for registers in &metrics.recent_drc_flags_by_pseudo_path_layer {
        for &register in registers {
            if register & all_ones == all_ones {
                num_repulsion_eligible += 1;
            }
        }
    }

    // Refresh the measured metrics for the active sensitivities.
    for (index, ladder) in [
        (map.current_via_cong_sens_index, &mut metrics.via_cong_sensitivity_metrics),
        (map.current_trace_cong_sens_index, &mut metrics.trace_cong_sensitivity_metrics),
    ] {
        ladder[index].iteration_of_measured_metrics = iteration;
        ladder[index].fraction_iterations_without_drcs =
            metrics.fraction_recent_iterations_without_map_drcs;
        ladder[index].avg_non_pseudo_nets_with_drcs = avg_nets;
        ladder[index].stderr_non_pseudo_nets_with_drcs = stderr_nets;
        ladder[index].avg_non_pseudo_routing_cost = avg_cost;
        ladder[index].stderr_non_pseudo_routing_cost = stderr_cost;
    }

    // Invalidate measurements stale by 12 windows or more.
    let stale_after = 12 * NUM_ITERATIONS_TO_RE_EQUILIBRATE;
    for ladder in [
        &mut metrics.via_cong_sensitivity_metrics,
        &mut metrics.trace_cong_sensitivity_metrics,
    ] {
        for entry in ladder.iter_mut() {
            if entry.measured() && iteration - entry.iteration_of_measured_metrics >= stale_after {
                debug!(
                    "invalidating stale metrics for sensitivity {}% (measured at iteration {})",
                    entry.dynamic_parameter, entry.iteration_of_measured_metrics
                );
                entry.invalidate();
            }
        }
    }

    // Global gating: no changes outside a plateau, too soon after the last
    // change, after the threshold is met, or too close to the cap.
    if !(metrics.in_metrics_plateau[iteration]
        && iteration >= metrics.latest_algorithm_change + 3 * NUM_ITERATIONS_TO_RE_EQUILIBRATE
        && metrics.cumulative_drc_free_iterations[iteration] < drc_free_threshold
        && map.max_iterations - iteration > NUM_ITERATIONS_TO_RE_EQUILIBRATE)
    {
        return;
    }

    let mut changed = false;

    // Step 1: pseudo-via TRACE repulsion.
    if map.num_layers > 1
        && num_repulsion_eligible > 0
        && metrics.fraction_recent_iterations_without_map_drcs <= 0.1
        && metrics.num_via_cong_sensitivity_reductions + metrics.num_via_cong_sensitivity_stable
            >= 1
        && metrics.num_trace_cong_sensitivity_reductions
            + metrics.num_trace_cong_sensitivity_stable
            >= 1
    {
        info!("enabling pseudo-via TRACE repulsion at iteration {iteration}");
        metrics.enable_pseudo_trace_congestion[iteration] = true;
        enable_pseudo_trace_repulsion_flags(map, metrics, all_ones);
        changed = true;
    }

    // Step 2: congestion sensitivities, targeted by DRC dominance.
    if !changed
        && metrics.fraction_recent_iterations_without_map_drcs <= 0.2
        && (metrics.num_start_end_terminal_swaps >= 3 || num_swap_eligible == 0)
    {
        let mut trace2trace = 0usize;
        let mut via2via = 0usize;
        let mut total = 0usize;
        for i in first..=iteration {
            let tally = metrics.non_pseudo_drc[i];
            trace2trace += tally.trace_to_trace;
            via2via += tally.via_to_via;
            total += tally.trace_to_trace + tally.via_to_via + tally.trace_to_via;
        }
        let fraction_t2t = trace2trace as f64 / total.max(1) as f64;
        let fraction_v2v = via2via as f64 / total.max(1) as f64;

        let mut assess_via = true;
        let mut assess_trace = true;
        if fraction_v2v > 0.8 {
            assess_trace = false;
            metrics.num_trace_cong_sensitivity_stable += 1;
        } else if fraction_t2t > 0.8 {
            assess_via = false;
            metrics.num_via_cong_sensitivity_stable += 1;
        }

        if assess_via {
            let outcome = assess_congestion_sensitivity(
                &metrics.via_cong_sensitivity_metrics,
                map.current_via_cong_sens_index,
                iteration,
            );
            apply_assessment(
                outcome,
                &mut metrics.change_via_cong_sensitivity[iteration],
                &mut metrics.num_via_cong_sensitivity_changes,
                &mut metrics.num_via_cong_sensitivity_reductions,
                &mut metrics.num_via_cong_sensitivity_stable,
                &mut map.current_via_cong_sens_index,
                &mut changed,
            );
        }
        if assess_trace {
            let outcome = assess_congestion_sensitivity(
                &metrics.trace_cong_sensitivity_metrics,
                map.current_trace_cong_sens_index,
                iteration,
            );
            apply_assessment(
                outcome,
                &mut metrics.change_trace_cong_sensitivity[iteration],
                &mut metrics.num_trace_cong_sensitivity_changes,
                &mut metrics.num_trace_cong_sensitivity_reductions,
                &mut metrics.num_trace_cong_sensitivity_stable,
                &mut map.current_trace_cong_sens_index,
                &mut changed,
            );
        }
    }

    // Step 3: terminal swaps.
    if !changed
        && num_swap_eligible > 0
        && metrics.fraction_recent_iterations_without_map_drcs <= 0.6
    {
        metrics.swap_start_and_end_terms[iteration] = true;
        changed = true;
    }

    if changed {
        metrics.latest_algorithm_change = iteration;
    }
}

#[allow(clippy::too_many_arguments)]
fn apply_assessment(
    outcome: AssessmentOutcome,
    change_flag: &mut bool,
    num_changes: &mut usize,
    num_reductions: &mut usize,
    num_stable: &mut usize,
    sensitivity_index: &mut usize,
    changed: &mut bool,
) {
    if outcome.counted_stable {
        *num_stable += 1;
    }
    match outcome.change {
        Some(SensitivityChange::Increase) => {
            *change_flag = true;
            *num_changes += 1;
            *sensitivity_index = (*sensitivity_index + 1).min(CONG_SENSITIVITIES.len() - 1);
            *changed = true;
        }
        Some(SensitivityChange::Decrease) => {
            *change_flag = true;
            *num_changes += 1;
            *num_reductions += 1;
            *sensitivity_index = sensitivity_index.saturating_sub(1);
            *changed = true;
        }
        _ => {}
    }
}

/// Turn on the per-(pseudo-path, layer) repulsion flags for every pair
/// whose shift register shows the full recent run of DRCs.
fn enable_pseudo_trace_repulsion_flags(map: &mut MapInfo, metrics: &RoutingMetrics, all_ones: u32) {
    for (pseudo, registers) in metrics
        .recent_drc_flags_by_pseudo_path_layer
        .iter()
        .enumerate()
    {
        let path = map.num_paths + pseudo;
        for (layer, &register) in registers.iter().enumerate() {
            if register & all_ones == all_ones {
                map.add_pseudo_trace_congestion_near_vias[path][layer] = true;
            }
        }
    }
}

/// Whether the run has converged.
///
/// Requires the cumulative DRC-free count to have reached the threshold,
/// and then any of: a single routed net, a metrics plateau, at least one
/// re-equilibration window past the iteration that first reached the
/// threshold, or the iteration cap.
pub fn determine_if_solved(
    map: &MapInfo,
    metrics: &mut RoutingMetrics,
    drc_free_threshold: usize,
    num_routed_paths: usize,
) -> bool {
    let iteration = map.current_iteration;
    if metrics.drc_free_threshold_achieved == 0
        && metrics.cumulative_drc_free_iterations[iteration] == drc_free_threshold
    {
        metrics.drc_free_threshold_achieved = iteration;
    }
    metrics.cumulative_drc_free_iterations[iteration] >= drc_free_threshold
        && (num_routed_paths == 1
            || metrics.in_metrics_plateau[iteration]
            || iteration
                >= metrics.drc_free_threshold_achieved + NUM_ITERATIONS_TO_RE_EQUILIBRATE
            || iteration == map.max_iterations)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn measured(
        parameter: u32,
        fraction: f64,
        nets: f64,
        cost: f64,
    ) -> DynamicAlgorithmMetrics {
        DynamicAlgorithmMetrics {
            dynamic_parameter: parameter,
            iteration_of_measured_metrics: 10,
            fraction_iterations_without_drcs: fraction,
            avg_non_pseudo_nets_with_drcs: nets,
            stderr_non_pseudo_nets_with_drcs: 0.1,
            avg_non_pseudo_routing_cost: cost,
            stderr_non_pseudo_routing_cost: 1.0,
        }
    }

    #[test]
    fn comparison_ladder_falls_through_each_band() {
        // Clear difference in DRC-free fraction wins immediately.
        let a = measured(100, 0.9, 5.0, 1000.0);
        let b = measured(141, 0.5, 1.0, 10.0);
        assert_eq!(compare_routing_metrics(&a, &b), Comparison::Better);

        // Equal fractions, clearly fewer DRC nets.
        let a = measured(100, 0.5, 1.0, 1000.0);
        let b = measured(141, 0.5, 5.0, 10.0);
        assert_eq!(compare_routing_metrics(&a, &b), Comparison::Better);

        // Everything equal within bands.
        let a = measured(100, 0.5, 2.0, 1000.0);
        let b = measured(141, 0.52, 2.2, 1010.0);
        assert_eq!(compare_routing_metrics(&a, &b), Comparison::Equivalent);

        // Zero DRC nets on both sides falls through to cost.
        let a = measured(100, 1.0, 0.0, 500.0);
        let b = measured(141, 1.0, 0.0, 1000.0);
        assert_eq!(compare_routing_metrics(&a, &b), Comparison::Better);
    }

    #[test]
    fn lowest_rung_with_unknown_neighbor_increases() {
        let mut ladder = crate::routability::RoutingMetrics::new(&MapInfo::new(4, 4, 1, 1, 0, 10))
            .via_cong_sensitivity_metrics;
        ladder[0] = measured(100, 0.5, 2.0, 100.0);
        let outcome = assess_congestion_sensitivity(&ladder, 0, 5);
        assert_eq!(outcome.change, Some(SensitivityChange::Increase));
        assert!(outcome.counted_change);
        assert!(!outcome.counted_stable);
    }

    #[test]
    fn local_maximum_holds_and_is_stable() {
        let mut ladder = crate::routability::RoutingMetrics::new(&MapInfo::new(4, 4, 1, 1, 0, 10))
            .via_cong_sensitivity_metrics;
        // Current clearly better than both neighbors (condition #18).
        ladder[0] = measured(100, 0.2, 8.0, 100.0);
        ladder[1] = measured(141, 0.9, 0.5, 100.0);
        ladder[2] = measured(200, 0.2, 8.0, 100.0);
        let outcome = assess_congestion_sensitivity(&ladder, 1, 5);
        assert_eq!(outcome.change, Some(SensitivityChange::NoChange));
        assert!(outcome.counted_stable);
    }

    #[test]
    fn highest_rung_never_increases() {
        let mut ladder = crate::routability::RoutingMetrics::new(&MapInfo::new(4, 4, 1, 1, 0, 10))
            .via_cong_sensitivity_metrics;
        let top = ladder.len() - 1;
        ladder[top] = measured(500, 0.2, 8.0, 100.0);
        let outcome = assess_congestion_sensitivity(&ladder, top, 5);
        assert_eq!(outcome.change, Some(SensitivityChange::Decrease));
        assert!(outcome.counted_reduction);
    }

    #[test]
    fn solved_requires_threshold_plus_settling() {
        let map = {
            let mut m = MapInfo::new(8, 8, 1, 2, 0, 100);
            m.current_iteration = 30;
            m
        };
        let mut metrics = RoutingMetrics::new(&map);
        metrics.cumulative_drc_free_iterations[30] = 10;
        // Threshold met this very iteration; no settling criterion holds.
        assert!(!determine_if_solved(&map, &mut metrics, 10, 2));
        assert_eq!(metrics.drc_free_threshold_achieved, 30);
        // A plateau closes the deal.
        metrics.in_metrics_plateau[30] = true;
        assert!(determine_if_solved(&map, &mut metrics, 10, 2));
        // A single routed net needs no settling at all.
        metrics.in_metrics_plateau[30] = false;
        assert!(determine_if_solved(&map, &mut metrics, 10, 1));
    }

    #[test]
    fn terminal_swap_propagates_to_the_diff_pair_family() {
        let mut map = MapInfo::new(8, 8, 1, 2, 1, 100);
        let mut inputs = InputValues::plain(
            2,
            crate::direction::ANY,
            crate::input::DesignRuleSubset::uniform(100.0, 1, 1.0),
        );
        inputs.num_pseudo_nets = 1;
        inputs.is_diff_pair = vec![true, true, false];
        inputs.diff_pair_partner = vec![1, 0, usize::MAX];
        inputs.diff_pair_to_pseudo_net = vec![2, 2, usize::MAX];
        inputs.is_pseudo_net = vec![false, false, true];
        inputs.pn_swappable = vec![false, false, true];
        inputs.pseudo_net_to_diff_pair = vec![(0, 1)];
        inputs.net_names = vec!["p".into(), "n".into(), "pseudo".into()];
        let mut metrics = RoutingMetrics::new(&map);
        metrics.fraction_recent_iterations_without_path_drcs = vec![0.2, 1.0, 1.0];

        let count = swap_start_and_end_terminals_of_drc_paths(&mut map, &metrics, &inputs, true);
        assert_eq!(count, 2); // both children, pseudo not counted
    }
}
