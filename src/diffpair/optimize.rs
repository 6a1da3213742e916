//! The per-connection swap decision and the re-stitching of diff-pair
//! children from their pseudo-path.
//!
//! Each connection climbs a staircase of increasingly expensive tests and
//! commits at the first conclusive one: degenerate endpoint coincidences,
//! straight-line geometry, congestion memory around the four terminals,
//! and finally A* inside a sub-map under both wiring configurations.

use log::{debug, info};

use crate::astar::PathFinding;
use crate::cell::ShapeType;
use crate::config::*;
use crate::coords::{Coord, Cost, PathNum};
use crate::diffpair::connections::{
    detect_diff_pair_connections, Connection, PseudoConnections, NOT_SWAPPED, SWAPPED,
};
use crate::diffpair::gapfill::find_short_path_heuristically;
use crate::diffpair::submap::SubMap;
use crate::direction::Direction;
use crate::errors::{Result, RouteError};
use crate::grid::CellGrid;
use crate::input::InputValues;
use crate::mapinfo::{MapInfo, RoutingRestriction};
use crate::path::{contiguous, delete_duplicate_points, Path};
use crate::routability::RoutingMetrics;

/// Sub-map routing results for one connection: the path of the wire
/// entering at each start side, in parent coordinates, under the chosen
/// configuration.
type RoutedPair = [Path; 2];

struct Decision {
    swap: bool,
    symmetry_ratio: f64,
    routed: Option<RoutedPair>,
}

/// Rewrite the two children of every pseudo-path from this iteration's
/// pseudo-path routing and the per-connection swap decisions.
pub fn optimize_diff_pair_connections(
    grid: &mut CellGrid,
    map: &mut MapInfo,
    inputs: &InputValues,
    metrics: &RoutingMetrics,
    paths: &mut [Path],
) -> Result<()> {
    let mut all = detect_diff_pair_connections(map, inputs, paths)?;
    for pseudo_connections in &mut all {
        let mut routed: Vec<Option<RoutedPair>> =
            vec![None; pseudo_connections.connections.len()];
        for index in 0..pseudo_connections.connections.len() {
            let start_in_swap_zone =
                index == 0 && map.swap_zone[pseudo_connections.pseudo_path] != 0;
            let decision = decide_connection(
                grid,
                map,
                inputs,
                metrics,
                pseudo_connections,
                &pseudo_connections.connections[index],
                paths,
                start_in_swap_zone,
            )?;
            let connection = &mut pseudo_connections.connections[index];
            connection.swap = decision.swap;
            connection.symmetry_ratio = decision.symmetry_ratio;
            routed[index] = decision.routed;
        }
        restitch(grid, map, inputs, pseudo_connections, &routed, paths)?;
    }
    Ok(())
}

/// One connection's staircase of tests.
#[allow(clippy::too_many_arguments)]
fn decide_connection(
    grid: &CellGrid,
    map: &MapInfo,
    inputs: &InputValues,
    metrics: &RoutingMetrics,
    pseudo_connections: &PseudoConnections,
    connection: &Connection,
    paths: &[Path],
    start_in_swap_zone: bool,
) -> Result<Decision> {
    let children = pseudo_connections.children;

    // Degenerate coincidences force the pairing outright.
    let [s1, s2] = connection.start;
    let [e1, e2] = connection.end;
    if s1 == e1 || s2 == e2 {
        return Ok(Decision {
            swap: false,
            symmetry_ratio: 0.0,
            routed: None,
        });
    }
    if s1 == e2 || s2 == e1 {
        return Ok(Decision {
            swap: true,
            symmetry_ratio: 1.0,
            routed: None,
        });
    }

    // The cheap tests apply only to connections that were DRC-clean last
    // iteration and do not start inside a pin-swap zone.
    if !start_in_swap_zone
        && !connection_had_recent_drcs(metrics, children, connection)
    {
        if let Some(decision) = optimize_using_geometry(connection) {
            debug!(
                "pseudo-path {}: connection decided geometrically (ratio {:.3})",
                pseudo_connections.pseudo_path, decision.symmetry_ratio
            );
            return Ok(decision);
        }
        if let Some(decision) = optimize_using_congestion(
            grid,
            map,
            pseudo_connections.pseudo_path,
            children,
            connection,
        ) {
            debug!(
                "pseudo-path {}: connection decided from congestion memory (ratio {:.3})",
                pseudo_connections.pseudo_path, decision.symmetry_ratio
            );
            return Ok(decision);
        }
    }

    optimize_with_submap(
        grid,
        map,
        inputs,
        pseudo_connections,
        connection,
        paths,
        start_in_swap_zone,
    )
}

/// Layers spanned by the connection's terminals had DRCs on either child
/// in the previous iteration.
fn connection_had_recent_drcs(
    metrics: &RoutingMetrics,
    children: [PathNum; 2],
    connection: &Connection,
) -> bool {
    let zs = [
        connection.start[0].z,
        connection.start[1].z,
        connection.end[0].z,
        connection.end[1].z,
    ];
    let min_z = *zs.iter().min().expect("4 layers") as usize;
    let max_z = *zs.iter().max().expect("4 layers") as usize;
    (min_z..=max_z).any(|layer| {
        metrics.path_drc_cells_by_layer[children[0]][layer] > 0
            || metrics.path_drc_cells_by_layer[children[1]][layer] > 0
    })
}

/// The geometric test: straight-line wiring lengths of the two pairings.
/// Only conclusive when all four terminals share one layer and the
/// symmetry ratio leaves the [0.45, 0.55] band.
fn optimize_using_geometry(connection: &Connection) -> Option<Decision> {
    let [s1, s2] = connection.start;
    let [e1, e2] = connection.end;
    if s1.z != s2.z || s1.z != e1.z || s1.z != e2.z {
        return None;
    }
    let unswapped = s1.lateral_distance(&e1) + s2.lateral_distance(&e2);
    let swapped = s1.lateral_distance(&e2) + s2.lateral_distance(&e1);
    let ratio = unswapped / (unswapped + swapped);
    if ratio <= 0.45 {
        Some(Decision {
            swap: false,
            symmetry_ratio: ratio,
            routed: None,
        })
    } else if ratio >= 0.55 {
        Some(Decision {
            swap: true,
            symmetry_ratio: ratio,
            routed: None,
        })
    } else {
        None
    }
}

/// The dominant child near one terminal: the one that deposited more TRACE
/// congestion within half the pair's pitch. `None` when they tie, which
/// makes the terminal useless as evidence.
fn dominant_child_near(
    grid: &CellGrid,
    map: &MapInfo,
    pseudo_path: PathNum,
    children: [PathNum; 2],
    terminal: Coord,
) -> (Option<PathNum>, [u64; 2]) {
    let radius = (map.diff_pair_start_pitch_cells[pseudo_path] / 2.0).max(1.0) as i32;
    let amounts = [
        grid.trace_congestion_near(children[0], terminal, radius),
        grid.trace_congestion_near(children[1], terminal, radius),
    ];
    let dominant = match amounts[0].cmp(&amounts[1]) {
        std::cmp::Ordering::Greater => Some(children[0]),
        std::cmp::Ordering::Less => Some(children[1]),
        std::cmp::Ordering::Equal => None,
    };
    (dominant, amounts)
}

/// The congestion-memory test: infer the previous iteration's pairing from
/// which child's congestion dominates each of the four terminal discs.
///
/// With S/E the per-terminal readings, the four self-consistent patterns
/// are: unswapped via configuration A (child 1 on terminal 1 throughout)
/// or B (children exchanged end to end), and swapped via configuration C
/// or D. The matching pattern's "wrong-pairing" congestion share is the
/// symmetry ratio; it must still clear the usual conclusive bands.
fn optimize_using_congestion(
    grid: &CellGrid,
    map: &MapInfo,
    pseudo_path: PathNum,
    children: [PathNum; 2],
    connection: &Connection,
) -> Option<Decision> {
    let (dom_s1, amounts_s1) =
        dominant_child_near(grid, map, pseudo_path, children, connection.start[0]);
    let (dom_s2, amounts_s2) =
        dominant_child_near(grid, map, pseudo_path, children, connection.start[1]);
    let (dom_e1, amounts_e1) =
        dominant_child_near(grid, map, pseudo_path, children, connection.end[0]);
    let (dom_e2, amounts_e2) =
        dominant_child_near(grid, map, pseudo_path, children, connection.end[1]);

    let (dom_s1, dom_s2, dom_e1, dom_e2) = (dom_s1?, dom_s2?, dom_e1?, dom_e2?);

    let unswapped_start = amounts_s1[0] + amounts_s2[1];
    let unswapped_end = amounts_e1[0] + amounts_e2[1];
    let swapped_start = amounts_s1[1] + amounts_s2[0];
    let swapped_end = amounts_e1[1] + amounts_e2[0];
    let total = (unswapped_start + unswapped_end + swapped_start + swapped_end) as f64;
    if total == 0.0 {
        return None;
    }

    if dom_s1 == dom_e1 && dom_s2 == dom_e2 {
        // Previously unswapped.
        let ratio = if dom_s1 == children[0] {
            (swapped_start + swapped_end) as f64 / total // configuration A
        } else {
            (unswapped_start + unswapped_end) as f64 / total // configuration B
        };
        if ratio <= 0.45 {
            return Some(Decision {
                swap: false,
                symmetry_ratio: ratio,
                routed: None,
            });
        }
    } else if dom_s1 == dom_e2 && dom_s2 == dom_e1 {
        // Previously swapped.
        let ratio = if dom_s1 == children[0] {
            (unswapped_start + swapped_end) as f64 / total // configuration C
        } else {
            (swapped_start + unswapped_end) as f64 / total // configuration D
        };
        if ratio >= 0.55 {
            return Some(Decision {
                swap: true,
                symmetry_ratio: ratio,
                routed: None,
            });
        }
    }
    None
}

/// The expensive fallback: route both configurations inside a sub-map and
/// vote until the decision stabilizes. The window grows by one terminal
/// span each time any search fails.
#[allow(clippy::too_many_arguments)]
fn optimize_with_submap(
    grid: &CellGrid,
    map: &MapInfo,
    inputs: &InputValues,
    pseudo_connections: &PseudoConnections,
    connection: &Connection,
    paths: &[Path],
    start_in_swap_zone: bool,
) -> Result<Decision> {
    let children = pseudo_connections.children;
    let pseudo_path = pseudo_connections.pseudo_path;
    let child_paths = [&paths[children[0]], &paths[children[1]]];

    let mut scale = 0;
    'grow: loop {
        scale += 1;
        let mut sub = SubMap::build(
            grid,
            map,
            connection,
            pseudo_path,
            children,
            child_paths,
            scale,
        )?;
        let start = [
            sub.to_local(connection.start[0]),
            sub.to_local(connection.start[1]),
        ];
        let end = [sub.to_local(connection.end[0]), sub.to_local(connection.end[1])];
        let restriction = gap_restriction(&sub, &[start[0], start[1], end[0], end[1]], scale);

        let mut votes: Vec<(bool, f64)> = Vec::new();
        let mut best: Option<(bool, f64, RoutedPair)> = None;
        let mut finder_0 = PathFinding::new();
        let mut finder_1 = PathFinding::new();

        for sub_iteration in 1..=SUBMAP_MAX_ITERATIONS {
            sub.map.current_iteration = sub_iteration;

            for &terminal in &[start[0], start[1], end[0], end[1]] {
                for (child, t) in [(children[0], terminal), (children[1], terminal)] {
                    for shape in ShapeType::ALL {
                        sub.grid.add_congestion_around_terminal(
                            inputs,
                            child,
                            t,
                            shape,
                            ONE_TRAVERSAL as u32,
                        );
                    }
                }
            }
            sub.evaporate_child_congestion(children, SUBMAP_CHILD_EVAP_RATE);

            // Route each configuration; the two children of one
            // configuration are independent searches.
            let mut g_cost = [[0 as Cost; 2]; 2];
            let mut routes: [[Path; 2]; 2] = Default::default();
            for config in [NOT_SWAPPED, SWAPPED] {
                if start_in_swap_zone && config == SWAPPED {
                    continue;
                }
                let targets = if config == NOT_SWAPPED {
                    [end[0], end[1]]
                } else {
                    [end[1], end[0]]
                };
                let (r0, r1) = rayon::join(
                    || {
                        finder_0.find_path(
                            &sub.grid,
                            inputs,
                            &sub.map,
                            children[0],
                            start[0],
                            targets[0],
                            &restriction,
                            true,
                        )
                    },
                    || {
                        finder_1.find_path(
                            &sub.grid,
                            inputs,
                            &sub.map,
                            children[1],
                            start[1],
                            targets[1],
                            &restriction,
                            true,
                        )
                    },
                );
                if !r0.found() || !r1.found() {
                    debug!(
                        "sub-map search failed for pseudo-path {pseudo_path} at scale {scale}; enlarging window"
                    );
                    continue 'grow;
                }
                g_cost[config] = [r0.g_cost, r1.g_cost];
                routes[config] = [r0.coords, r1.coords];
            }

            let (vote, ratio) = if start_in_swap_zone {
                // The swapped configuration is indistinguishable inside a
                // swap zone; the unswapped wiring stands.
                (false, 0.0)
            } else {
                let unswapped: Cost = g_cost[NOT_SWAPPED].iter().sum();
                let swapped: Cost = g_cost[SWAPPED].iter().sum();
                let ratio = unswapped as f64 / (unswapped + swapped) as f64;
                let vote =
                    decide_whether_to_swap(grid, map, pseudo_path, children, connection, ratio);
                (vote, ratio)
            };
            votes.push((vote, ratio));

            let chosen = if vote { SWAPPED } else { NOT_SWAPPED };
            let routed_pair: RoutedPair = [
                routes[chosen][0].iter().map(|&c| sub.to_global(c)).collect(),
                routes[chosen][1].iter().map(|&c| sub.to_global(c)).collect(),
            ];
            let clean = wires_respect_spacing(&sub, inputs, &routes[chosen]);
            best = Some((vote, ratio, routed_pair));

            // Reinforce the chosen wiring for the next sub-iteration.
            for (child, coords) in [(children[0], &routes[chosen][0]), (children[1], &routes[chosen][1])]
            {
                let contig = contiguous(coords);
                crate::congestion::deposit_path_congestion(&mut sub.grid, inputs, child, &contig);
            }

            if votes_are_stable(&votes) && clean {
                debug!(
                    "pseudo-path {pseudo_path}: sub-map vote stabilized after {sub_iteration} sub-iterations (ratio {ratio:.5})"
                );
                break;
            }
        }

        let (swap, symmetry_ratio, routed) = best.ok_or(RouteError::InvariantViolation {
            iteration: map.current_iteration,
            message: format!("sub-map for pseudo-path {pseudo_path} produced no vote"),
        })?;
        info!(
            "optimized connection of pseudo-path {pseudo_path} by sub-map routing: swap = {swap}, ratio = {symmetry_ratio:.5}"
        );
        return Ok(Decision {
            swap,
            symmetry_ratio,
            routed: Some(routed),
        });
    }
}

/// A restriction disc covering the terminals with headroom that grows with
/// the window scale.
fn gap_restriction(sub: &SubMap, terminals: &[Coord; 4], scale: usize) -> RoutingRestriction {
    let min_x = terminals.iter().map(|c| c.x).min().expect("4 terminals");
    let max_x = terminals.iter().map(|c| c.x).max().expect("4 terminals");
    let min_y = terminals.iter().map(|c| c.y).min().expect("4 terminals");
    let max_y = terminals.iter().map(|c| c.y).max().expect("4 terminals");
    let span = (max_x - min_x).max(max_y - min_y).max(1) as f64;
    let radius = (span * scale as f64 + 2.0).min(sub.map.diagonal);
    let mut restriction = RoutingRestriction::none(sub.map.num_layers);
    restriction.restriction_flag = true;
    restriction.allowed_radii_cells = vec![radius; sub.map.num_layers as usize];
    restriction.center_x = (min_x + max_x) / 2;
    restriction.center_y = (min_y + max_y) / 2;
    restriction
}

/// Sub-map G-costs in hand, settle the swap vote. Clear ratios decide
/// alone; ratios near 0.5 defer to the congestion memory around the
/// terminals in the parent map, and an ambiguous memory falls back to
/// which side of 0.5 the ratio leans.
fn decide_whether_to_swap(
    parent_grid: &CellGrid,
    map: &MapInfo,
    pseudo_path: PathNum,
    children: [PathNum; 2],
    connection: &Connection,
    ratio: f64,
) -> bool {
    if ratio <= 0.45 {
        return false;
    }
    if ratio >= 0.55 {
        return true;
    }
    let (s1, _) = dominant_child_near(parent_grid, map, pseudo_path, children, connection.start[0]);
    let (s2, _) = dominant_child_near(parent_grid, map, pseudo_path, children, connection.start[1]);
    let (e1, _) = dominant_child_near(parent_grid, map, pseudo_path, children, connection.end[0]);
    let (e2, _) = dominant_child_near(parent_grid, map, pseudo_path, children, connection.end[1]);

    let unswapped_evidence = (s1.is_some() && s1 == e1 && s2.is_some() && s2 == e2)
        || (s1.is_some() && s1 == e1 && (s2.is_none() || e2.is_none()))
        || (s2.is_some() && s2 == e2 && (s1.is_none() || e1.is_none()));
    if unswapped_evidence {
        return false;
    }
    let swapped_evidence = (s1.is_some() && s1 == e2 && s2.is_some() && s2 == e1)
        || (s1.is_some() && s1 == e2 && (s2.is_none() || e1.is_none()))
        || (s2.is_some() && s2 == e1 && (s1.is_none() || e2.is_none()));
    if swapped_evidence {
        return true;
    }
    ratio > 0.50
}

/// The stopping rule for the sub-map loop: five agreeing votes, three
/// ratios within tolerance, and a ratio either outside the dead zone or
/// pinned inside it three times running.
fn votes_are_stable(votes: &[(bool, f64)]) -> bool {
    if votes.len() < STABLE_SWAP_VOTES {
        return false;
    }
    let recent = &votes[votes.len() - STABLE_SWAP_VOTES..];
    if !recent.iter().all(|(vote, _)| *vote == recent[0].0) {
        return false;
    }
    let ratios = &votes[votes.len() - STABLE_RATIO_VOTES..];
    let (lo, hi) = (RATIO_DEAD_ZONE.0, RATIO_DEAD_ZONE.1);
    if !ratios
        .iter()
        .all(|(_, r)| (r - ratios[0].1).abs() <= RATIO_STABILITY_TOLERANCE)
    {
        return false;
    }
    let latest = ratios[ratios.len() - 1].1;
    let outside_dead_zone = latest < lo || latest > hi;
    let pinned_inside = ratios.iter().all(|(_, r)| *r == ratios[0].1);
    outside_dead_zone || pinned_inside
}

/// Cheap spacing check between the two routed wires of one configuration
/// inside the sub-map.
fn wires_respect_spacing(sub: &SubMap, inputs: &InputValues, wires: &RoutedPair) -> bool {
    let contig = [contiguous(&wires[0]), contiguous(&wires[1])];
    for &a in &contig[0] {
        let rule = inputs.rule(sub.grid.cell(a).design_rule_set, 0);
        let spacing = rule.spacing_for(ShapeType::Trace, ShapeType::Trace) as f64;
        for &b in &contig[1] {
            if a.z == b.z && a.lateral_distance(&b) < spacing {
                return false;
            }
        }
    }
    true
}

/// Build the two output child paths from the connection decisions.
///
/// Walking the connections, each wire copies its own child's span straight
/// through (NOT_SWAPPED) or cross-copies the partner's span (SWAPPED);
/// sub-map results replace the span outright. Seams that copying leaves
/// between pieces are bridged by the short-path gap filler. A
/// P/N-swappable pair with an odd crossing count exchanges its start
/// terminals (and the congestion around them); otherwise the connection
/// with the least decisive symmetry ratio is toggled to force the count
/// even.
fn restitch(
    grid: &mut CellGrid,
    map: &mut MapInfo,
    inputs: &InputValues,
    pseudo_connections: &mut PseudoConnections,
    routed: &[Option<RoutedPair>],
    paths: &mut [Path],
) -> Result<()> {
    let children = pseudo_connections.children;
    let pseudo_path = pseudo_connections.pseudo_path;
    let connections = &mut pseudo_connections.connections;

    let mut num_swaps = connections.iter().filter(|c| c.swap).count();
    let odd = num_swaps % 2 == 1;
    let pn_swapped = odd && pseudo_connections.pn_swappable;
    if odd && !pseudo_connections.pn_swappable {
        // Force an even count by toggling the least decisive connection.
        let toggle = connections
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                let da = (a.symmetry_ratio - 0.5).abs();
                let db = (b.symmetry_ratio - 0.5).abs();
                da.partial_cmp(&db).expect("symmetry ratios are finite")
            })
            .map(|(i, _)| i)
            .ok_or(RouteError::InvariantViolation {
                iteration: map.current_iteration,
                message: format!("pseudo-path {pseudo_path} has no connections to re-stitch"),
            })?;
        info!(
            "pseudo-path {pseudo_path}: toggling connection {toggle} (ratio {:.4}) to even the swap count",
            connections[toggle].symmetry_ratio
        );
        connections[toggle].swap = !connections[toggle].swap;
        num_swaps = connections.iter().filter(|c| c.swap).count();
        debug_assert_eq!(num_swaps % 2, 0);
    }

    // Build the two wires, tracking which child's side each is on.
    let mut wires: [Path; 2] = Default::default();
    let mut side = [0usize, 1usize];
    for (index, connection) in connections.iter().enumerate() {
        if let Some(pair) = &routed[index] {
            // Sub-map results replace the span outright; the wire enters
            // at its current side and the route itself realizes any swap.
            for wire in 0..2 {
                append_with_bridge(
                    grid,
                    inputs,
                    map,
                    children[side[wire]],
                    &mut wires[wire],
                    pair[side[wire]].iter().copied(),
                )?;
            }
        } else {
            for wire in 0..2 {
                let own = side[wire];
                let copy_from = if connection.swap { 1 - own } else { own };
                let child = children[copy_from];
                let span = &paths[child]
                    [connection.start_segment[copy_from]..=connection.end_segment[copy_from]];
                if connection.swap {
                    // Cross-copy: the wire keeps its own start anchor and
                    // takes the partner's span from its second point on,
                    // crossing over at the seam.
                    if wires[wire].is_empty() {
                        wires[wire].push(connection.start[own]);
                    }
                    append_with_bridge(
                        grid,
                        inputs,
                        map,
                        child,
                        &mut wires[wire],
                        span.iter().skip(1).copied(),
                    )?;
                } else {
                    append_with_bridge(
                        grid,
                        inputs,
                        map,
                        child,
                        &mut wires[wire],
                        span.iter().copied(),
                    )?;
                }
            }
        }
        if connection.swap {
            side.swap(0, 1);
        }

        // Carry the via run between this connection and the next along the
        // wire's current side.
        if index + 1 < connections.len() {
            let next = &connections[index + 1];
            for wire in 0..2 {
                let child_side = side[wire];
                let child = children[child_side];
                let from = connection.end_segment[child_side] + 1;
                let to = next.start_segment[child_side];
                if from <= to {
                    let via_run = &paths[child][from..=to];
                    append_with_bridge(
                        grid,
                        inputs,
                        map,
                        child,
                        &mut wires[wire],
                        via_run.iter().copied(),
                    )?;
                }
            }
        }
    }

    // An odd crossing count on a P/N-swappable pair relabels the start
    // terminals instead of fighting the topology.
    if pn_swapped {
        let start_0 = map.start_cells[children[0]];
        let start_1 = map.start_cells[children[1]];
        map.start_cells[children[0]] = start_1;
        map.start_cells[children[1]] = start_0;
        map.diff_pair_terms_swapped[pseudo_path] = !map.diff_pair_terms_swapped[pseudo_path];
        swap_terminal_congestion(grid, map, pseudo_path, children, [start_0, start_1]);
        paths[children[0]] = std::mem::take(&mut wires[1]);
        paths[children[1]] = std::mem::take(&mut wires[0]);
        info!("pseudo-path {pseudo_path}: odd swap count, exchanged P/N start terminals");
    } else {
        paths[children[0]] = std::mem::take(&mut wires[0]);
        paths[children[1]] = std::mem::take(&mut wires[1]);
    }

    delete_duplicate_points(&mut paths[children[0]]);
    delete_duplicate_points(&mut paths[children[1]]);
    Ok(())
}

/// Append a run of coordinates to a wire, bridging any seam to the wire's
/// current tail: identical points collapse, a legal single move joins
/// directly, and anything else goes through the short-path gap filler.
fn append_with_bridge(
    grid: &CellGrid,
    inputs: &InputValues,
    map: &MapInfo,
    path_num: PathNum,
    wire: &mut Path,
    piece: impl IntoIterator<Item = Coord>,
) -> Result<()> {
    let mut piece = piece.into_iter().peekable();
    if wire.is_empty() {
        if let Some(first) = piece.next() {
            wire.push(first);
        }
    } else if let Some(&first) = piece.peek() {
        let tail = *wire.last().expect("wire is non-empty");
        if tail == first {
            piece.next();
        } else {
            let (dx, dy, dz) = first.delta(&tail);
            if Direction::from_step(dx, dy, dz).is_none() {
                let inserted =
                    find_short_path_heuristically(grid, inputs, map, path_num, tail, first)?;
                // The filler ends with `first`; the piece supplies it too.
                wire.extend(inserted.iter().take(inserted.len() - 1));
            }
        }
    }
    wire.extend(piece);
    Ok(())
}

/// Exchange the two children's congestion within half a pitch of the two
/// (former) start terminals.
fn swap_terminal_congestion(
    grid: &mut CellGrid,
    map: &MapInfo,
    pseudo_path: PathNum,
    children: [PathNum; 2],
    terminals: [Coord; 2],
) {
    let radius = (map.diff_pair_start_pitch_cells[pseudo_path] / 2.0).max(1.0) as i32;
    for terminal in terminals {
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                if dx * dx + dy * dy > radius * radius {
                    continue;
                }
                let c = Coord::new(terminal.x + dx, terminal.y + dy, terminal.z);
                if grid.contains(c) {
                    grid.convert_congestion_at_cell(c, children[0], children[1]);
                }
            }
        }
    }
}
