//! Version reconciliation
//!
//! An entry's version is the release that introduced its exact content. When
//! a path carries the same hash it had in the previous release, the previous
//! version is kept; everything else stays at the new release's version.

use bundlesmith_core::manifest::{Manifest, ManifestEntry};
use tracing::debug;

/// Combine a freshly scanned manifest with the previous release's manifest
pub fn reconcile(mut raw: Manifest, previous: Option<&Manifest>) -> Manifest {
    let Some(previous) = previous else {
        return raw;
    };

    raw.previous = previous.version;

    let mut inherited = 0usize;
    for entry in raw.entries.values_mut() {
        if let Some(prior) = previous.get(&entry.path) {
            if prior.hash == entry.hash {
                entry.version = prior.version;
                inherited += 1;
            }
        }
    }

    debug!(
        version = raw.version,
        previous = previous.version,
        inherited,
        changed = raw.file_count() - inherited,
        "reconciled versions"
    );
    raw
}

/// Entries whose content was introduced by `manifest`'s own release
pub fn changed_entries(manifest: &Manifest) -> Vec<&ManifestEntry> {
    manifest.changed_entries().collect()
}
