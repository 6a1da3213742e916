//! Shoulder-path generation: derive the two diff-pair children from their
//! pseudo-path midline by offsetting half a pitch to either side.
//!
//! The offset points are a first draft only; the per-connection optimizer
//! re-routes or re-stitches everything that matters. What this pass must
//! guarantee is merely that each child is a legal path from its own start
//! terminal to its own end terminal that shadows the midline.

use crate::coords::{Coord, PathNum};
use crate::direction::Direction;
use crate::input::InputValues;
use crate::mapinfo::MapInfo;
use crate::path::{delete_duplicate_points, Path};

/// Derive both children of `pseudo_path` from its routed midline.
pub fn build_shoulder_paths(
    map: &MapInfo,
    inputs: &InputValues,
    pseudo_path: PathNum,
    midline: &Path,
) -> (Path, Path) {
    let (child_1, child_2) = inputs.pseudo_net_to_diff_pair[pseudo_path - map.num_paths];
    let pitch = map.diff_pair_start_pitch_cells[pseudo_path].max(1.0) as f64;
    let half_pitch = pitch / 2.0;

    let build = |child: PathNum, side: f64| -> Path {
        let mut draft: Path = Vec::with_capacity(midline.len() + 2);
        draft.push(map.start_cells[child]);
        for (i, &c) in midline.iter().enumerate() {
            if i == 0 || i == midline.len() - 1 {
                continue;
            }
            // Local travel direction, from the neighbors of this segment.
            let prev = midline[i - 1];
            let next = midline[i + 1];
            let dx = (next.x - prev.x) as f64;
            let dy = (next.y - prev.y) as f64;
            let len = (dx * dx + dy * dy).sqrt();
            let (ox, oy) = if len == 0.0 {
                (0.0, side * half_pitch)
            } else {
                (-dy / len * side * half_pitch, dx / len * side * half_pitch)
            };
            let offset = Coord::new(
                (c.x as f64 + ox).round() as i32,
                (c.y as f64 + oy).round() as i32,
                c.z,
            );
            if map.contains(offset) {
                draft.push(offset);
            }
        }
        draft.push(map.end_cells[child]);
        let mut legal = legalize(&draft);
        delete_duplicate_points(&mut legal);
        legal
    };

    (build(child_1, -1.0), build(child_2, 1.0))
}

/// Join consecutive draft points that are not a single legal move with a
/// lateral-then-vertical staircase.
fn legalize(draft: &[Coord]) -> Path {
    let mut out: Path = Vec::with_capacity(draft.len() * 2);
    for &point in draft {
        let Some(&tail) = out.last() else {
            out.push(point);
            continue;
        };
        let (dx, dy, dz) = point.delta(&tail);
        if Direction::from_step(dx, dy, dz).is_some() {
            out.push(point);
            continue;
        }
        let mut cursor = tail;
        while cursor.x != point.x {
            cursor.x += (point.x - cursor.x).signum();
            out.push(cursor);
        }
        while cursor.y != point.y {
            cursor.y += (point.y - cursor.y).signum();
            out.push(cursor);
        }
        while cursor.z != point.z {
            cursor.z += (point.z - cursor.z).signum();
            out.push(cursor);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::direction::ANY;
    use crate::input::DesignRuleSubset;

    #[test]
    fn shoulders_straddle_a_straight_midline() {
        let mut map = MapInfo::new(16, 16, 1, 2, 1, 10);
        map.diff_pair_start_pitch_cells[2] = 2.0;
        map.start_cells[0] = Coord::new(0, 4, 0);
        map.end_cells[0] = Coord::new(10, 4, 0);
        map.start_cells[1] = Coord::new(0, 6, 0);
        map.end_cells[1] = Coord::new(10, 6, 0);
        let mut inputs = InputValues::plain(2, ANY, DesignRuleSubset::uniform(100.0, 1, 1.0));
        inputs.num_pseudo_nets = 1;
        inputs.pseudo_net_to_diff_pair = vec![(0, 1)];

        let midline: Path = (0..=10).map(|x| Coord::new(x, 5, 0)).collect();
        let (low, high) = build_shoulder_paths(&map, &inputs, 2, &midline);
        assert_eq!(low[0], Coord::new(0, 4, 0));
        assert_eq!(*low.last().unwrap(), Coord::new(10, 4, 0));
        assert_eq!(high[0], Coord::new(0, 6, 0));
        assert!(low.iter().skip(1).rev().skip(1).all(|c| c.y == 4));
        assert!(high.iter().skip(1).rev().skip(1).all(|c| c.y == 6));
        // Every consecutive pair is a legal move.
        for w in low.windows(2) {
            let (dx, dy, dz) = w[1].delta(&w[0]);
            assert!(Direction::from_step(dx, dy, dz).is_some());
        }
    }

    #[test]
    fn legalize_bridges_long_jumps_with_unit_steps() {
        let out = legalize(&[Coord::new(0, 0, 0), Coord::new(4, 3, 0)]);
        assert_eq!(out.len(), 8);
        for w in out.windows(2) {
            let (dx, dy, dz) = w[1].delta(&w[0]);
            assert_eq!(dx.abs() + dy.abs() + dz.abs(), 1);
        }
    }
}
