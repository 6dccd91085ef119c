//! Content-addressed transfer artifacts
//!
//! Fullfiles are archives of one entry's content named by its hash. Deltas
//! transform one exact content into another and are named by [`DeltaKey`].
//! Both are immutable once created.

pub mod planner;
pub mod store;

pub use planner::{ArtifactPlanner, BuildReport, DeltaFailure};
pub use store::{ArtifactClaim, ArtifactStore};

use bundlesmith_core::manifest::ManifestEntry;
use std::fmt;

/// Identity of a delta: `<from>-<to>-<fromhash>-<tohash>`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeltaKey {
    pub from_version: u32,
    pub to_version: u32,
    pub from_hash: String,
    pub to_hash: String,
}

impl DeltaKey {
    /// Key of the delta upgrading `from` to `to`
    pub fn between(from: &ManifestEntry, to: &ManifestEntry) -> Self {
        Self {
            from_version: from.version,
            to_version: to.version,
            from_hash: from.hash.clone(),
            to_hash: to.hash.clone(),
        }
    }
}

impl fmt::Display for DeltaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}-{}",
            self.from_version, self.to_version, self.from_hash, self.to_hash
        )
    }
}

/// Whether a delta can exist between these two entries
pub fn delta_applicable(from: &ManifestEntry, to: &ManifestEntry) -> bool {
    from.is_regular_file() && to.is_regular_file() && !from.is_deleted() && !to.is_deleted()
}
