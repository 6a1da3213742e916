//! The pheromone-like congestion feedback loop: deposits around routed
//! centerlines and terminals, evaporation, the universal repellent, and
//! the iteration-dependent multiplier schedule.

use log::{debug, info};

use crate::cell::ShapeType;
use crate::config::*;
use crate::coords::{Coord, PathNum};
use crate::cost::calc_via_congestion;
use crate::errors::{Result, RouteError};
use crate::grid::CellGrid;
use crate::input::InputValues;
use crate::mapinfo::MapInfo;
use crate::path::{shapes_along, Path};
use crate::routability::RoutingMetrics;

/// Update the trace/via congestion multipliers for the current iteration.
///
/// With `T = max(1, round(20 * log10(num_paths)))` the ratio holds at 0.20
/// through iteration T, grows linearly to 1.00 at 5T, and stays there.
/// Each multiplier is `ratio * (sensitivity% / 100) * default_cell_cost *
/// evap_rate / (100 - evap_rate) / 100`. While the ratio is still growing,
/// every iteration counts as an algorithm change so the adaptive
/// controller stays quiet until the schedule settles.
pub fn update_iteration_dependent_parameters(map: &mut MapInfo, metrics: &mut RoutingMetrics) {
    let time_constant = ((20.0 * (map.num_paths.max(1) as f64).log10()).round() as usize).max(1);
    let iteration = map.current_iteration;

    map.iteration_dependent_ratio = if iteration <= time_constant {
        0.20
    } else if iteration <= 5 * time_constant {
        metrics.latest_algorithm_change = iteration;
        iteration as f64 / 5.0 / time_constant as f64
    } else {
        1.00
    };

    let base = DEFAULT_CELL_COST * DEFAULT_EVAP_RATE / (100.0 - DEFAULT_EVAP_RATE) / 100.0;
    let trace_sensitivity = CONG_SENSITIVITIES[map.current_trace_cong_sens_index] as f64 / 100.0;
    let via_sensitivity = CONG_SENSITIVITIES[map.current_via_cong_sens_index] as f64 / 100.0;
    map.trace_congestion_multiplier = map.iteration_dependent_ratio * trace_sensitivity * base;
    map.via_congestion_multiplier = map.iteration_dependent_ratio * via_sensitivity * base;

    debug!(
        "iteration {iteration}: congestion ratio {:.2}, trace multiplier {:.6}, via multiplier {:.6}",
        map.iteration_dependent_ratio, map.trace_congestion_multiplier, map.via_congestion_multiplier
    );
    if iteration == time_constant {
        info!(
            "congestion sensitivities will increase linearly from 20% to 100% until iteration {}",
            5 * time_constant
        );
    } else if iteration == 5 * time_constant {
        info!("congestion sensitivities have reached their nominal values (100%)");
    }
}

/// Deposit one traversal of congestion along a path's contiguous form,
/// cell by cell, with the cost-multiplier at each cell applied.
pub fn deposit_path_congestion(
    grid: &mut CellGrid,
    inputs: &InputValues,
    path: PathNum,
    contig: &Path,
) {
    for (c, shape) in shapes_along(contig) {
        let cell = grid.cell(c);
        let set = cell.design_rule_set;
        let multiplier = match shape {
            ShapeType::Trace => inputs.trace_cost_multiplier[cell.trace_cost_multiplier_index as usize],
            ShapeType::ViaUp => inputs.via_cost_multiplier[cell.via_up_cost_multiplier_index as usize],
            ShapeType::ViaDown => {
                inputs.via_cost_multiplier[cell.via_down_cost_multiplier_index as usize]
            }
        };
        let subset = inputs.subset_of(path, set);
        grid.add_congestion(c, path, subset, shape, ONE_TRAVERSAL as u32 * multiplier);
    }
}

/// Deposit TRACE, VIA_UP, and VIA_DOWN congestion around both terminals of
/// every non-pseudo path. Start terminals inside a pin-swap zone deposit
/// nothing (any zone cell is a legitimate start, so there is nothing to
/// defend yet).
pub fn add_congestion_around_all_terminals(
    grid: &mut CellGrid,
    inputs: &InputValues,
    map: &MapInfo,
    contiguous_paths: &[Path],
) -> Result<()> {
    for path in 0..map.num_paths {
        let contig = &contiguous_paths[path];
        if contig.len() < 2 {
            continue;
        }
        for (terminal, adjacent) in [
            (map.start_cells[path], contig[1]),
            (map.end_cells[path], contig[contig.len() - 2]),
        ] {
            if terminal == adjacent {
                return Err(RouteError::InvariantViolation {
                    iteration: map.current_iteration,
                    message: format!(
                        "terminal of path {path} at {terminal} coincides with its adjacent segment"
                    ),
                });
            }
            if grid.cell(terminal).in_swap_zone() {
                continue;
            }
            for shape in ShapeType::ALL {
                grid.add_congestion_around_terminal(
                    inputs,
                    path,
                    terminal,
                    shape,
                    ONE_TRAVERSAL as u32,
                );
            }
        }
    }
    Ok(())
}

/// A via stack found in a routed path: a maximal run of vertical moves.
#[derive(Clone, Copy, Debug)]
pub struct ViaStack {
    pub path: PathNum,
    pub x: i32,
    pub y: i32,
    pub min_z: i32,
    pub max_z: i32,
}

/// All via stacks in the given paths.
pub fn find_vias(paths: &[(PathNum, &Path)]) -> Vec<ViaStack> {
    let mut vias = Vec::new();
    for &(path, coords) in paths {
        let mut i = 0;
        while i + 1 < coords.len() {
            if coords[i + 1].z != coords[i].z
                && coords[i + 1].x == coords[i].x
                && coords[i + 1].y == coords[i].y
            {
                let (x, y) = (coords[i].x, coords[i].y);
                let mut j = i + 1;
                while j + 1 < coords.len()
                    && coords[j + 1].z != coords[j].z
                    && coords[j + 1].x == x
                    && coords[j + 1].y == y
                {
                    j += 1;
                }
                let (a, b) = (coords[i].z, coords[j].z);
                vias.push(ViaStack {
                    path,
                    x,
                    y,
                    min_z: a.min(b),
                    max_z: a.max(b),
                });
                i = j;
            } else {
                i += 1;
            }
        }
    }
    vias
}

/// Deposit universal-repellent TRACE congestion around every pseudo-via on
/// layers the adaptive controller flagged.
///
/// The amount per cell exceeds the cost of synthesizing an alternative via
/// at that location by a factor of 50, so crowded lateral routing through
/// the via's waist becomes strictly worse than adding a via of its own.
/// The map's top and bottom layers are skipped; no via could escape them.
pub fn add_trace_congestion_near_pseudo_vias(
    grid: &mut CellGrid,
    inputs: &InputValues,
    map: &MapInfo,
    paths: &[Path],
) {
    if map.num_layers < 3 || map.num_pseudo_paths == 0 {
        return;
    }
    let repellent = map.universal_repellent();
    let pseudo_paths: Vec<(PathNum, &Path)> = (map.num_paths..map.total_nets())
        .map(|p| (p, &paths[p]))
        .collect();

    for via in find_vias(&pseudo_paths) {
        for layer in via.min_z..=via.max_z {
            if layer == 0 || layer == map.num_layers - 1 {
                continue;
            }
            if !map.add_pseudo_trace_congestion_near_vias[via.path][layer as usize] {
                continue;
            }
            let center = Coord::new(via.x, via.y, layer);
            let set = grid.cell(center).design_rule_set;
            let subset = inputs.subset_of(via.path, set);
            let rule = inputs.rule(set, subset);
            let radius = rule.radius[ShapeType::Trace.index()].max(1);

            // Cost of one more via from this layer: distance part plus the
            // congestion part an escaping via would pay.
            let (target_layer, multiplier_index) = if layer == via.min_z {
                (layer - 1, grid.cell(center).via_down_cost_multiplier_index)
            } else {
                (layer + 1, grid.cell(center).via_up_cost_multiplier_index)
            };
            let via_multiplier = inputs.via_cost_multiplier[multiplier_index as usize] as u64;
            let distance_g_cost =
                ONE_TRAVERSAL * inputs.base_vert_cost_cells as u64 * via_multiplier;
            let congestion_g_cost = calc_via_congestion(
                grid, inputs, map, via.path, via.x, via.y, layer, target_layer,
            );
            let amount = 50 * ((distance_g_cost + congestion_g_cost) / radius as u64);

            grid.add_congestion_around_point(
                repellent,
                subset,
                ShapeType::Trace,
                center,
                radius,
                rule.radius_squared[ShapeType::Trace.index()],
                amount as u32,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::direction::ANY;
    use crate::input::DesignRuleSubset;

    #[test]
    fn multiplier_schedule_has_three_phases() {
        let mut map = MapInfo::new(10, 10, 1, 10, 0, 500);
        let mut metrics = RoutingMetrics::new(&map);
        // T = max(1, round(20 * log10(10))) = 20.
        map.current_iteration = 5;
        update_iteration_dependent_parameters(&mut map, &mut metrics);
        assert_eq!(map.iteration_dependent_ratio, 0.20);
        map.current_iteration = 50;
        update_iteration_dependent_parameters(&mut map, &mut metrics);
        assert!((map.iteration_dependent_ratio - 0.5).abs() < 1e-9);
        assert_eq!(metrics.latest_algorithm_change, 50);
        map.current_iteration = 200;
        update_iteration_dependent_parameters(&mut map, &mut metrics);
        assert_eq!(map.iteration_dependent_ratio, 1.00);
    }

    #[test]
    fn deposit_stamps_traces_and_vias() {
        let mut grid = CellGrid::new(4, 4, 2);
        let inputs = InputValues::plain(1, ANY, DesignRuleSubset::uniform(100.0, 1, 1.0));
        let contig = vec![Coord::new(0, 0, 0), Coord::new(1, 0, 0), Coord::new(1, 0, 1)];
        deposit_path_congestion(&mut grid, &inputs, 0, &contig);
        assert_eq!(
            grid.cell(Coord::new(0, 0, 0)).congestion_of_path(0, ShapeType::Trace),
            100
        );
        assert_eq!(
            grid.cell(Coord::new(1, 0, 0)).congestion_of_path(0, ShapeType::ViaUp),
            100
        );
        assert_eq!(
            grid.cell(Coord::new(1, 0, 1)).congestion_of_path(0, ShapeType::ViaDown),
            100
        );
    }

    #[test]
    fn via_stacks_are_found_with_their_extent() {
        let path = vec![
            Coord::new(1, 1, 0),
            Coord::new(1, 1, 1),
            Coord::new(1, 1, 2),
            Coord::new(2, 1, 2),
        ];
        let vias = find_vias(&[(0, &path)]);
        assert_eq!(vias.len(), 1);
        assert_eq!((vias[0].min_z, vias[0].max_z), (0, 2));
        assert_eq!((vias[0].x, vias[0].y), (1, 1));
    }
}
