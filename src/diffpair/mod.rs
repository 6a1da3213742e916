//! Differential-pair post-processing: connection detection, the swap
//! optimizer with its sub-map searches, and shoulder-path generation.

pub mod connections;
pub mod gapfill;
pub mod optimize;
pub mod shoulder;
pub mod submap;

pub use connections::{detect_diff_pair_connections, Connection, PseudoConnections};
pub use gapfill::find_short_path_heuristically;
pub use optimize::optimize_diff_pair_connections;
pub use shoulder::build_shoulder_paths;
pub use submap::SubMap;
