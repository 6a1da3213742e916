//! Detection of diff-pair connections: the spans between a pseudo-path's
//! terminals and its via stacks, projected onto the two shoulder children.

use crate::cell::ShapeType;
use crate::coords::{Coord, PathNum};
use crate::errors::{Result, RouteError};
use crate::input::InputValues;
use crate::mapinfo::MapInfo;
use crate::path::Path;

/// Whether the two children cross inside a connection.
pub const NOT_SWAPPED: usize = 0;
pub const SWAPPED: usize = 1;

/// One trace run of a diff pair: start-terminal to first via, via to via,
/// or last via to end-terminal, with the endpoint bookkeeping for both
/// children.
#[derive(Clone, Debug)]
pub struct Connection {
    pub start: [Coord; 2],
    pub end: [Coord; 2],
    /// Segment indices into the children's non-contiguous coordinate
    /// vectors.
    pub start_segment: [usize; 2],
    pub end_segment: [usize; 2],
    pub start_shape: [ShapeType; 2],
    pub end_shape: [ShapeType; 2],
    /// Start pair on one layer and end pair on one layer.
    pub same_layer_terminals: bool,
    /// The decision: do the children cross between start and end?
    pub swap: bool,
    /// <0.5 favors not-swapped, >0.5 favors swapped.
    pub symmetry_ratio: f64,
}

/// All connections of one pseudo-path.
#[derive(Clone, Debug)]
pub struct PseudoConnections {
    pub pseudo_path: PathNum,
    pub children: [PathNum; 2],
    pub pn_swappable: bool,
    pub num_pseudo_vias: usize,
    pub connections: Vec<Connection>,
}

/// An anchor within a child path: a terminal or one end of a via stack.
#[derive(Clone, Copy, Debug)]
struct Anchor {
    segment: usize,
    coord: Coord,
    shape: ShapeType,
}

/// Split a path into anchors: start terminal, entry and exit of every via
/// stack, end terminal. Entry/exit shapes record the via direction.
fn anchors_of(path: &Path) -> Vec<Anchor> {
    let mut anchors = Vec::new();
    if path.is_empty() {
        return anchors;
    }
    anchors.push(Anchor {
        segment: 0,
        coord: path[0],
        shape: ShapeType::Trace,
    });
    let mut i = 0;
    while i + 1 < path.len() {
        if path[i + 1].z != path[i].z {
            let going_up = path[i + 1].z > path[i].z;
            let entry_shape = if going_up {
                ShapeType::ViaUp
            } else {
                ShapeType::ViaDown
            };
            let mut j = i + 1;
            while j + 1 < path.len() && path[j + 1].z != path[j].z {
                j += 1;
            }
            let exit_shape = if path[j].z > path[i].z {
                ShapeType::ViaDown
            } else {
                ShapeType::ViaUp
            };
            anchors.push(Anchor {
                segment: i,
                coord: path[i],
                shape: entry_shape,
            });
            anchors.push(Anchor {
                segment: j,
                coord: path[j],
                shape: exit_shape,
            });
            i = j;
        } else {
            i += 1;
        }
    }
    anchors.push(Anchor {
        segment: path.len() - 1,
        coord: path[path.len() - 1],
        shape: ShapeType::Trace,
    });
    anchors
}

/// Populate the connection records of every pseudo-path. Children must
/// carry the same via-stack count as their pseudo parent, or the span
/// pairing is undefined. Returns the largest connection count seen.
pub fn detect_diff_pair_connections(
    map: &MapInfo,
    inputs: &InputValues,
    paths: &[Path],
) -> Result<Vec<PseudoConnections>> {
    let mut all = Vec::with_capacity(map.num_pseudo_paths);
    for pseudo in map.num_paths..map.total_nets() {
        let (child_1, child_2) = inputs.pseudo_net_to_diff_pair[pseudo - map.num_paths];
        let pseudo_anchors = anchors_of(&paths[pseudo]);
        let anchors = [anchors_of(&paths[child_1]), anchors_of(&paths[child_2])];
        let num_connections = pseudo_anchors.len() / 2;
        for (child, child_anchors) in [(child_1, &anchors[0]), (child_2, &anchors[1])] {
            if child_anchors.len() != pseudo_anchors.len() {
                return Err(RouteError::InvariantViolation {
                    iteration: map.current_iteration,
                    message: format!(
                        "child {child} has {} anchors but pseudo-path {pseudo} has {}",
                        child_anchors.len(),
                        pseudo_anchors.len()
                    ),
                });
            }
        }

        let mut connections = Vec::with_capacity(num_connections);
        for k in 0..num_connections {
            // Connection k runs from anchor 2k (terminal or via exit) to
            // anchor 2k+1 (via entry or terminal).
            let (a, b) = (2 * k, 2 * k + 1);
            let start = [anchors[0][a], anchors[1][a]];
            let end = [anchors[0][b], anchors[1][b]];
            connections.push(Connection {
                start: [start[0].coord, start[1].coord],
                end: [end[0].coord, end[1].coord],
                start_segment: [start[0].segment, start[1].segment],
                end_segment: [end[0].segment, end[1].segment],
                start_shape: [start[0].shape, start[1].shape],
                end_shape: [end[0].shape, end[1].shape],
                same_layer_terminals: start[0].coord.same_layer(&start[1].coord)
                    && end[0].coord.same_layer(&end[1].coord),
                swap: false,
                symmetry_ratio: 0.5,
            });
        }
        all.push(PseudoConnections {
            pseudo_path: pseudo,
            children: [child_1, child_2],
            pn_swappable: inputs.pn_swappable[pseudo],
            num_pseudo_vias: num_connections.saturating_sub(1),
            connections,
        });
    }
    Ok(all)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::direction::ANY;
    use crate::input::DesignRuleSubset;

    fn diff_pair_inputs() -> (MapInfo, InputValues) {
        let mut map = MapInfo::new(20, 20, 3, 2, 1, 10);
        map.num_paths = 2;
        map.num_pseudo_paths = 1;
        let mut inputs = InputValues::plain(2, ANY, DesignRuleSubset::uniform(100.0, 1, 1.0));
        inputs.num_pseudo_nets = 1;
        inputs.is_diff_pair = vec![true, true, false];
        inputs.diff_pair_partner = vec![1, 0, usize::MAX];
        inputs.diff_pair_to_pseudo_net = vec![2, 2, usize::MAX];
        inputs.is_pseudo_net = vec![false, false, true];
        inputs.pn_swappable = vec![false, false, true];
        inputs.pseudo_net_to_diff_pair = vec![(0, 1)];
        inputs.net_names.push("pseudo".into());
        inputs.design_rule_subset.push(vec![0]);
        inputs.diff_pair_pitch_cells.push(vec![2.0]);
        inputs.route_directions.push(ANY);
        (map, inputs)
    }

    fn lateral(from: (i32, i32), to_x: i32, z: i32) -> Path {
        (from.0..=to_x).map(|x| Coord::new(x, from.1, z)).collect()
    }

    #[test]
    fn flat_pair_yields_one_connection() {
        let (map, inputs) = diff_pair_inputs();
        let paths = vec![
            lateral((0, 0), 10, 0),
            lateral((0, 2), 10, 0),
            lateral((0, 1), 10, 0),
        ];
        let all = detect_diff_pair_connections(&map, &inputs, &paths).unwrap();
        assert_eq!(all.len(), 1);
        let pc = &all[0];
        assert_eq!(pc.num_pseudo_vias, 0);
        assert_eq!(pc.connections.len(), 1);
        let c = &pc.connections[0];
        assert_eq!(c.start, [Coord::new(0, 0, 0), Coord::new(0, 2, 0)]);
        assert_eq!(c.end, [Coord::new(10, 0, 0), Coord::new(10, 2, 0)]);
        assert!(c.same_layer_terminals);
        assert_eq!(c.start_shape, [ShapeType::Trace, ShapeType::Trace]);
    }

    #[test]
    fn a_via_splits_the_pair_into_two_connections() {
        let (map, inputs) = diff_pair_inputs();
        let with_via = |y: i32| -> Path {
            let mut p: Path = (0..=4).map(|x| Coord::new(x, y, 0)).collect();
            p.push(Coord::new(4, y, 1));
            p.extend((5..=8).map(|x| Coord::new(x, y, 1)));
            p
        };
        let paths = vec![with_via(0), with_via(2), with_via(1)];
        let all = detect_diff_pair_connections(&map, &inputs, &paths).unwrap();
        let pc = &all[0];
        assert_eq!(pc.num_pseudo_vias, 1);
        assert_eq!(pc.connections.len(), 2);
        let first = &pc.connections[0];
        assert_eq!(first.end_shape, [ShapeType::ViaUp, ShapeType::ViaUp]);
        assert_eq!(first.end, [Coord::new(4, 0, 0), Coord::new(4, 2, 0)]);
        let second = &pc.connections[1];
        assert_eq!(second.start_shape, [ShapeType::ViaDown, ShapeType::ViaDown]);
        assert_eq!(second.start, [Coord::new(4, 0, 1), Coord::new(4, 2, 1)]);
        assert_eq!(second.end, [Coord::new(8, 0, 1), Coord::new(8, 2, 1)]);
    }

    #[test]
    fn mismatched_via_counts_are_an_invariant_violation() {
        let (map, inputs) = diff_pair_inputs();
        let mut child_0: Path = (0..=4).map(|x| Coord::new(x, 0, 0)).collect();
        child_0.push(Coord::new(4, 0, 1));
        let paths = vec![child_0, lateral((0, 2), 4, 0), lateral((0, 1), 4, 0)];
        assert!(detect_diff_pair_connections(&map, &inputs, &paths).is_err());
    }
}
