//! The iteration orchestrator: owns the grid, the paths, and the metrics,
//! and drives the route → deposit → optimize → measure → adapt cycle
//! until the map is solved or the iteration cap is reached.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use instant::Instant;
use log::{debug, info};

use crate::astar::PathFinding;
use crate::config::DEFAULT_EVAP_RATE;
use crate::congestion;
use crate::controller;
use crate::coords::Cost;
use crate::cost::calc_distance_g_cost;
use crate::diffpair;
use crate::direction::Direction;
use crate::errors::{Result, RouteError};
use crate::grid::CellGrid;
use crate::input::InputValues;
use crate::mapinfo::{MapInfo, RoutingRestriction};
use crate::path::{contiguous, Path};
use crate::routability::RoutingMetrics;

/// Outcome of a run. The router is an anytime algorithm: `best_iteration`
/// names the iteration worth keeping whether or not the run converged.
#[derive(Clone, Debug)]
pub struct RouteSummary {
    pub solved: bool,
    pub iterations_run: usize,
    pub best_iteration: usize,
    pub best_cost: Cost,
    pub best_drc_cells: usize,
}

pub struct Router {
    pub map: MapInfo,
    pub inputs: InputValues,
    pub grid: CellGrid,
    pub metrics: RoutingMetrics,
    /// Non-contiguous (as-searched) form of every path.
    pub paths: Vec<Path>,
    /// Contiguous form, with corner cells inserted.
    pub contiguous_paths: Vec<Path>,

    finder: PathFinding,
    no_restriction: RoutingRestriction,
    drc_free_threshold: usize,
    cancel: Option<Arc<AtomicBool>>,
}

impl Router {
    pub fn new(map: MapInfo, inputs: InputValues, grid: CellGrid) -> Result<Self> {
        validate_net_tables(&map, &inputs)?;
        let total = map.total_nets();
        let metrics = RoutingMetrics::new(&map);
        let no_restriction = RoutingRestriction::none(map.num_layers);
        Ok(Router {
            map,
            inputs,
            grid,
            metrics,
            paths: vec![Vec::new(); total],
            contiguous_paths: vec![Vec::new(); total],
            finder: PathFinding::new(),
            no_restriction,
            drc_free_threshold: 1,
            cancel: None,
        })
    }

    /// Number of consecutive DRC-free iterations required before the map
    /// counts as solved.
    pub fn set_drc_free_threshold(&mut self, threshold: usize) {
        self.drc_free_threshold = threshold.max(1);
    }

    /// Install a flag the orchestrator checks between iterations; setting
    /// it aborts the run at the next iteration boundary.
    pub fn set_cancel_flag(&mut self, flag: Arc<AtomicBool>) {
        self.cancel = Some(flag);
    }

    /// Nets the solver counts as routed: plain nets plus one per diff
    /// pair (routed via its pseudo-path).
    fn num_routed_paths(&self) -> usize {
        self.map.num_paths + self.map.num_pseudo_paths
            - self
                .inputs
                .is_diff_pair
                .iter()
                .filter(|&&diff| diff)
                .count()
    }

    pub fn run(&mut self) -> Result<RouteSummary> {
        let mut solved = false;
        for iteration in 1..=self.map.max_iterations {
            if let Some(cancel) = &self.cancel {
                if cancel.load(Ordering::Relaxed) {
                    info!("cancellation requested; stopping before iteration {iteration}");
                    break;
                }
            }
            self.map.current_iteration = iteration;
            let started = Instant::now();
            self.run_iteration()?;
            self.metrics.iteration_elapsed_seconds[iteration] = started.elapsed().as_secs_f32();

            info!(
                "iteration {iteration}: cost {}, DRC cells {}, nets with DRCs {}{}",
                self.metrics.non_pseudo_path_costs[iteration],
                self.metrics.non_pseudo_drc[iteration].cells,
                self.metrics.num_non_pseudo_drc_nets[iteration],
                if self.metrics.in_metrics_plateau[iteration] {
                    " (plateau)"
                } else {
                    ""
                }
            );

            let num_routed_paths = self.num_routed_paths();
            if controller::determine_if_solved(
                &self.map,
                &mut self.metrics,
                self.drc_free_threshold,
                num_routed_paths,
            ) {
                solved = true;
                break;
            }
        }

        self.metrics
            .determine_best_iteration(&self.map, self.inputs.cost_multipliers_used());
        let best = self.metrics.best_iteration;
        let summary = RouteSummary {
            solved,
            iterations_run: self.map.current_iteration,
            best_iteration: best,
            best_cost: self.metrics.non_pseudo_path_costs[best],
            best_drc_cells: self.metrics.non_pseudo_drc[best].cells,
        };
        info!(
            "run finished after {} iteration(s); best iteration {} ({} DRC cells, cost {})",
            summary.iterations_run, summary.best_iteration, summary.best_drc_cells, summary.best_cost
        );
        Ok(summary)
    }

    fn run_iteration(&mut self) -> Result<()> {
        let iteration = self.map.current_iteration;

        // 1. The iteration-dependent congestion multiplier schedule.
        congestion::update_iteration_dependent_parameters(&mut self.map, &mut self.metrics);

        // 2-3. Apply the terminal swaps the controller flagged at the end
        // of the previous iteration. (Sensitivity steps and repulsion
        // flags take effect through the map state the controller already
        // updated.)
        if iteration > 1 && self.metrics.swap_start_and_end_terms[iteration - 1] {
            let swapped = controller::swap_start_and_end_terminals_of_drc_paths(
                &mut self.map,
                &self.metrics,
                &self.inputs,
                false,
            );
            self.metrics.num_start_end_terminal_swaps += 1;
            info!("iteration {iteration}: swapped terminals of {swapped} net(s)");
        }

        // 3. Route every searched net: plain nets directly, diff pairs via
        // their pseudo-path. The cost surface must be stable under each
        // search, so this loop is serial in path order.
        let congestion_enabled = iteration > 1;
        for path in 0..self.map.total_nets() {
            if self.inputs.is_diff_pair[path] {
                continue; // derived from the pseudo-path below
            }
            let start = self.map.start_cells[path];
            let end = self.map.end_cells[path];
            let started = Instant::now();
            let result = self.finder.find_path(
                &self.grid,
                &self.inputs,
                &self.map,
                path,
                start,
                end,
                &self.no_restriction,
                congestion_enabled,
            );
            if !result.found() {
                return Err(RouteError::NoRoute {
                    iteration,
                    path,
                    start,
                    end,
                });
            }
            self.metrics.path_cost[path] = result.g_cost;
            self.metrics.path_explored_cells[path] = result.explored_cells;
            self.metrics.path_elapsed_seconds[path] = started.elapsed().as_secs_f32();
            self.metrics.iteration_explored_cells[iteration] += result.explored_cells;
            debug!(
                "iteration {iteration}: routed path {path} in {} segments (G = {})",
                result.coords.len(),
                result.g_cost
            );
            self.paths[path] = result.coords;
            self.update_swap_zone_start_terminal(path);

            if self.map.is_pseudo_path(path) {
                let (low, high) =
                    diffpair::build_shoulder_paths(&self.map, &self.inputs, path, &self.paths[path]);
                let (child_1, child_2) =
                    self.inputs.pseudo_net_to_diff_pair[path - self.map.num_paths];
                self.paths[child_1] = low;
                self.paths[child_2] = high;
            }
        }

        // 4. Contiguous expansion.
        for path in 0..self.map.total_nets() {
            self.contiguous_paths[path] = contiguous(&self.paths[path]);
        }

        // 5. Evaporate, then deposit congestion.
        self.grid
            .evaporate_congestion(DEFAULT_EVAP_RATE, self.map.universal_repellent());
        for path in 0..self.map.total_nets() {
            congestion::deposit_path_congestion(
                &mut self.grid,
                &self.inputs,
                path,
                &self.contiguous_paths[path],
            );
        }
        congestion::add_congestion_around_all_terminals(
            &mut self.grid,
            &self.inputs,
            &self.map,
            &self.contiguous_paths,
        )?;
        congestion::add_trace_congestion_near_pseudo_vias(
            &mut self.grid,
            &self.inputs,
            &self.map,
            &self.paths,
        );

        // 6. The diff-pair optimizer may rewrite the children.
        if self.map.num_pseudo_paths > 0 {
            diffpair::optimize_diff_pair_connections(
                &mut self.grid,
                &mut self.map,
                &self.inputs,
                &self.metrics,
                &mut self.paths,
            )?;
            for pseudo in 0..self.map.num_pseudo_paths {
                let (child_1, child_2) = self.inputs.pseudo_net_to_diff_pair[pseudo];
                for child in [child_1, child_2] {
                    self.contiguous_paths[child] = contiguous(&self.paths[child]);
                    let cost = self.path_distance_cost(&self.paths[child]);
                    self.metrics.path_cost[child] = cost;
                }
            }
        }

        // 7. Metrics, plateau, history, and the controller's decisions for
        // the next iteration.
        self.metrics.calc_path_metrics(
            &mut self.grid,
            &self.map,
            &self.paths,
            &self.contiguous_paths,
        );
        RoutingMetrics::mark_cells_near_centerlines(&self.grid, &self.map, &self.contiguous_paths);
        self.metrics.detect_drcs(&mut self.grid, &self.inputs, &self.map);
        self.metrics.update_history(&self.inputs, &self.map);
        controller::determine_algorithm_changes(
            &mut self.map,
            &mut self.metrics,
            &self.inputs,
            self.drc_free_threshold,
        );
        Ok(())
    }

    /// A path whose start terminal sits in a pin-swap zone really starts
    /// wherever the search left the zone. The last in-zone segment becomes
    /// the recorded start terminal and the zone prefix is dropped; the
    /// user's original terminal stays untouched in the input tables.
    fn update_swap_zone_start_terminal(&mut self, path: usize) {
        if self.map.swap_zone[path] == 0 {
            return;
        }
        let coords = &self.paths[path];
        let Some(first_outside) = coords
            .iter()
            .position(|&c| !self.grid.cell(c).in_swap_zone())
        else {
            return;
        };
        if first_outside > 1 {
            let new_start = coords[first_outside - 1];
            self.map.start_cells[path] = new_start;
            self.paths[path].drain(..first_outside - 1);
        }
    }

    /// Distance-only cost of a path, for nets whose wiring was produced by
    /// stitching rather than by a single search.
    fn path_distance_cost(&self, path: &Path) -> Cost {
        let mut cost = 0;
        for window in path.windows(2) {
            let (dx, dy, dz) = window[1].delta(&window[0]);
            let Some(dir) = Direction::from_step(dx, dy, dz) else {
                continue;
            };
            if let Some(step) = calc_distance_g_cost(
                &self.grid,
                &self.inputs,
                window[0],
                window[1],
                dir,
                self.map.current_iteration > 1,
            ) {
                cost += step;
            }
        }
        cost
    }
}

/// Cross-check the diff-pair tables: twins must agree on their pairing
/// and on the pseudo-net that carries them.
fn validate_net_tables(map: &MapInfo, inputs: &InputValues) -> Result<()> {
    let fail = |message: String| {
        Err(RouteError::InvariantViolation {
            iteration: 0,
            message,
        })
    };
    if inputs.total_nets() != map.total_nets() {
        return fail(format!(
            "input tables cover {} nets but the map has {}",
            inputs.total_nets(),
            map.total_nets()
        ));
    }
    for path in 0..map.num_paths {
        if !inputs.is_diff_pair[path] {
            continue;
        }
        let partner = inputs.diff_pair_partner[path];
        if partner >= map.num_paths
            || !inputs.is_diff_pair[partner]
            || inputs.diff_pair_partner[partner] != path
        {
            return fail(format!("diff-pair twins {path}/{partner} disagree on their pairing"));
        }
        let pseudo = inputs.diff_pair_to_pseudo_net[path];
        if pseudo != inputs.diff_pair_to_pseudo_net[partner] {
            return fail(format!(
                "diff-pair twins {path}/{partner} disagree on their pseudo-net"
            ));
        }
        let (c1, c2) = inputs.pseudo_net_to_diff_pair[pseudo - map.num_paths];
        if (c1, c2) != (path, partner) && (c1, c2) != (partner, path) {
            return fail(format!(
                "pseudo-net {pseudo} does not map back to its children {path}/{partner}"
            ));
        }
    }
    Ok(())
}
