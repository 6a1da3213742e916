//! Fatal error kinds surfaced by the orchestrator.
//!
//! Recoverable conditions (A* failing inside a small sub-map window) are
//! sentinel return values, not error types; everything here aborts the run
//! and carries enough context to reproduce the failure.

use thiserror::Error;

use crate::coords::{Coord, PathNum};

#[derive(Error, Debug)]
pub enum RouteError {
    /// The short-path gap filler was called with a gap it cannot bridge.
    #[error("short-path gap filler cannot bridge {start} -> {end} for path {path} (gap longer than 5 cells or spanning layers)")]
    IllegalGap {
        path: PathNum,
        start: Coord,
        end: Coord,
    },

    /// None of the gap filler's candidate bridges was walkable.
    #[error("no walkable bridge between {start} and {end} for path {path} in iteration {iteration}")]
    NoWalkableBridge {
        iteration: usize,
        path: PathNum,
        start: Coord,
        end: Coord,
    },

    /// The main-map search exhausted its open set.
    #[error("no route exists from {start} to {end} for path {path} in iteration {iteration}")]
    NoRoute {
        iteration: usize,
        path: PathNum,
        start: Coord,
        end: Coord,
    },

    /// The sub-map optimizer grew its window past the expansion limit.
    #[error("sub-map for pseudo-path {pseudo_path} grew beyond twice its diagonal in iteration {iteration} ({start} -> {end})")]
    SubMapExpansionLimit {
        iteration: usize,
        pseudo_path: PathNum,
        start: Coord,
        end: Coord,
    },

    /// Internal bookkeeping contradicted itself.
    #[error("invariant violation in iteration {iteration}: {message}")]
    InvariantViolation { iteration: usize, message: String },
}

pub type Result<T> = std::result::Result<T, RouteError>;
