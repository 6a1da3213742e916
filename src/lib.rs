//! Acorn: an iterative, cost-based multi-layer maze router.
//!
//! The core couples four pieces: an A* path-finder over an 18-direction
//! 3-D lattice ([`astar`]), a congestion deposit/evaporation loop that
//! turns repeated routing passes into mutual net avoidance
//! ([`congestion`]), a sub-map-based differential-pair optimizer
//! ([`diffpair`]), and an adaptive controller that watches DRC statistics
//! over sliding windows and perturbs the cost parameters toward a
//! design-rule-clean layout ([`controller`]). The [`router::Router`]
//! orchestrates one global iteration after another and reports the best
//! iteration seen.

pub mod astar;
pub mod cell;
pub mod config;
pub mod congestion;
pub mod controller;
pub mod coords;
pub mod cost;
pub mod datastructures;
pub mod diffpair;
pub mod direction;
pub mod errors;
pub mod grid;
pub mod input;
pub mod mapinfo;
pub mod path;
pub mod routability;
pub mod router;

pub use errors::{Result, RouteError};
pub use router::{RouteSummary, Router};

pub mod prelude {
    pub use rustc_hash::FxHashMap as HashMap;
    pub use rustc_hash::FxHashSet as HashSet;
    pub use std::cmp::{max, min};

    pub use crate::cell::{CellInfo, ShapeType};
    pub use crate::config::*;
    pub use crate::coords::{Coord, Cost, PathNum};
    pub use crate::direction::*;
    pub use crate::grid::CellGrid;
    pub use crate::input::{DesignRuleSubset, InputValues};
    pub use crate::mapinfo::{MapInfo, RoutingRestriction};
    pub use crate::path::Path;
    pub use crate::router::{RouteSummary, Router};
}
