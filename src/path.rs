//! Path containers and the contiguous-form expander.
//!
//! A* emits the *non-contiguous* form: consecutive segments may be any
//! legal move, including diagonals and knight jumps. The *contiguous* form
//! inserts the crossed corner cells so that every consecutive pair differs
//! by exactly one lateral or vertical step; congestion deposits and DRC
//! checks always walk the contiguous form.

use itertools::Itertools;

use crate::cell::ShapeType;
use crate::coords::Coord;
use crate::direction::Direction;

pub type Path = Vec<Coord>;

/// Expand `path` to its contiguous form.
///
/// Panics in debug builds if two consecutive segments are not joined by a
/// legal lattice move; release callers validate jumps beforehand.
pub fn contiguous(path: &[Coord]) -> Path {
    let mut out = Vec::with_capacity(path.len() * 2);
    if path.is_empty() {
        return out;
    }
    out.push(path[0]);
    for (&from, &to) in path.iter().tuple_windows() {
        let (dx, dy, dz) = to.delta(&from);
        let dir = Direction::from_step(dx, dy, dz)
            .unwrap_or_else(|| panic!("illegal jump {from} -> {to} in path"));
        for corner in dir.corner_cells(from).iter() {
            out.push(corner);
        }
        out.push(to);
    }
    out
}

/// Remove consecutive duplicate coordinates in place. Re-stitching a
/// diff-pair path can briefly create them at connection seams.
pub fn delete_duplicate_points(path: &mut Path) {
    path.dedup();
}

/// Per-path step statistics over the non-contiguous form.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StepCounts {
    pub adjacent: usize,
    pub diagonal: usize,
    pub knight: usize,
    pub vias: usize,
}

pub fn count_steps(path: &[Coord]) -> StepCounts {
    let mut counts = StepCounts::default();
    for (&from, &to) in path.iter().tuple_windows() {
        let (dx, dy, dz) = to.delta(&from);
        match Direction::from_step(dx, dy, dz) {
            Some(d) if d.is_vertical() => counts.vias += 1,
            Some(d) if d.is_lateral() => counts.adjacent += 1,
            Some(d) if d.is_diagonal() => counts.diagonal += 1,
            Some(_) => counts.knight += 1,
            None => {}
        }
    }
    counts
}

/// Lateral length of the non-contiguous form, in cells.
pub fn lateral_length_cells(path: &[Coord]) -> f64 {
    path.iter()
        .tuple_windows()
        .map(|(a, b)| a.lateral_distance(b))
        .sum()
}

/// The shape each cell of a contiguous path stamps onto the map: TRACE
/// everywhere, with VIA_UP below and VIA_DOWN above every layer change.
pub fn shapes_along(contig: &[Coord]) -> Vec<(Coord, ShapeType)> {
    let mut out = Vec::with_capacity(contig.len() + 4);
    for (i, &c) in contig.iter().enumerate() {
        out.push((c, ShapeType::Trace));
        let up_next = i + 1 < contig.len() && contig[i + 1].z > c.z;
        let up_prev = i > 0 && contig[i - 1].z > c.z;
        let down_next = i + 1 < contig.len() && contig[i + 1].z < c.z;
        let down_prev = i > 0 && contig[i - 1].z < c.z;
        if up_next || up_prev {
            out.push((c, ShapeType::ViaUp));
        }
        if down_next || down_prev {
            out.push((c, ShapeType::ViaDown));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contiguous_inserts_one_corner_for_diagonals() {
        let path = vec![Coord::new(0, 0, 0), Coord::new(1, 1, 0)];
        let contig = contiguous(&path);
        assert_eq!(
            contig,
            vec![Coord::new(0, 0, 0), Coord::new(1, 0, 0), Coord::new(1, 1, 0)]
        );
    }

    #[test]
    fn contiguous_inserts_two_corners_for_knights() {
        let path = vec![Coord::new(0, 0, 0), Coord::new(2, 1, 0)];
        let contig = contiguous(&path);
        assert_eq!(contig.len(), 4);
        for (a, b) in contig.iter().tuple_windows() {
            let (dx, dy, dz) = b.delta(a);
            assert_eq!(dx.abs() + dy.abs() + dz.abs(), 1, "{a} -> {b} not a unit step");
        }
    }

    #[test]
    fn contiguous_leaves_vertical_steps_alone() {
        let path = vec![Coord::new(4, 4, 0), Coord::new(4, 4, 1), Coord::new(5, 4, 1)];
        assert_eq!(contiguous(&path), path);
    }

    #[test]
    fn step_counts_classify_every_move() {
        let path = vec![
            Coord::new(0, 0, 0),
            Coord::new(1, 0, 0), // adjacent
            Coord::new(2, 1, 0), // diagonal
            Coord::new(4, 2, 0), // knight
            Coord::new(4, 2, 1), // via
        ];
        assert_eq!(
            count_steps(&path),
            StepCounts {
                adjacent: 1,
                diagonal: 1,
                knight: 1,
                vias: 1
            }
        );
    }

    #[test]
    fn shapes_mark_both_ends_of_a_via() {
        let contig = vec![Coord::new(0, 0, 0), Coord::new(0, 0, 1), Coord::new(1, 0, 1)];
        let shapes = shapes_along(&contig);
        assert!(shapes.contains(&(Coord::new(0, 0, 0), ShapeType::ViaUp)));
        assert!(shapes.contains(&(Coord::new(0, 0, 1), ShapeType::ViaDown)));
        assert_eq!(
            shapes.iter().filter(|(_, s)| *s == ShapeType::Trace).count(),
            3
        );
    }
}
