//! Update cache and AS-path cache (§4.5, §4.6).

mod fingerprint;
mod path;
mod update;

pub use fingerprint::{compute_path_id, compute_update_id};
pub use path::{PathCache, PathEntry};
pub use update::{UpdateCache, UpdateEntry};
