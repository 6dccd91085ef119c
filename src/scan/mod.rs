//! Snapshot scanning: turn a content tree into a raw manifest

use crate::di::ContentHasher;
use bundlesmith_core::manifest::{is_boot_path, EntryKind, Manifest, ManifestEntry};
use bundlesmith_core::{BundleError, BundleResult};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{info, warn};
use walkdir::WalkDir;

/// A filesystem object found during the walk, before hashing
#[derive(Debug, Clone)]
struct Candidate {
    virtual_path: String,
    host_path: PathBuf,
    kind: EntryKind,
    size: u64,
}

/// Walks a tree and hashes every entry on a bounded worker pool
pub struct SnapshotScanner {
    hasher: Arc<dyn ContentHasher>,
    max_concurrent: usize,
}

impl SnapshotScanner {
    pub fn new(hasher: Arc<dyn ContentHasher>, max_concurrent: usize) -> Self {
        Self {
            hasher,
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Produce the raw manifest of `root`; every entry gets `version`
    pub async fn scan(&self, root: &Path, version: u32, format: u32) -> BundleResult<Manifest> {
        let walk_root = root.to_path_buf();
        let candidates = tokio::task::spawn_blocking(move || collect_candidates(&walk_root))
            .await
            .map_err(|e| BundleError::Path(format!("Scan of {} aborted: {}", root.display(), e)))??;

        let mut manifest = Manifest::new(format, version, 0, chrono::Utc::now().timestamp());
        let mut join_set = JoinSet::new();
        let mut skipped = 0usize;

        for candidate in candidates {
            if join_set.len() >= self.max_concurrent {
                if let Some(joined) = join_set.join_next().await {
                    skipped += record(&mut manifest, joined, version)?;
                }
            }

            let hasher = Arc::clone(&self.hasher);
            join_set.spawn(async move {
                let boot = is_boot_path(&candidate.virtual_path);
                let hash = hasher.hash(&candidate.host_path, boot).await;
                (candidate, hash)
            });
        }

        while let Some(joined) = join_set.join_next().await {
            skipped += record(&mut manifest, joined, version)?;
        }

        info!(
            root = %root.display(),
            version,
            entries = manifest.file_count(),
            skipped,
            content_size = manifest.content_size,
            "scanned content tree"
        );
        Ok(manifest)
    }
}

/// Add one hashed candidate to the manifest, returning 1 when it was skipped
fn record(
    manifest: &mut Manifest,
    joined: Result<(Candidate, BundleResult<String>), tokio::task::JoinError>,
    version: u32,
) -> BundleResult<usize> {
    let (candidate, hash) =
        joined.map_err(|e| BundleError::Path(format!("Hashing task failed: {}", e)))?;

    match hash {
        Ok(hash) => {
            if candidate.kind == EntryKind::File {
                manifest.content_size += candidate.size;
            }
            manifest.insert(ManifestEntry::new(
                candidate.virtual_path,
                candidate.kind,
                hash,
                version,
            ));
            Ok(0)
        }
        Err(e) => {
            warn!(path = %candidate.virtual_path, error = %e, "failed to hash entry, skipping");
            Ok(1)
        }
    }
}

fn collect_candidates(root: &Path) -> BundleResult<Vec<Candidate>> {
    let mut candidates = Vec::new();

    let walker = WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => return Err(e.into()),
            Err(e) => {
                warn!(path = ?e.path(), error = %e, "unreadable entry, skipping");
                continue;
            }
        };
        let file_type = entry.file_type();
        let kind = if file_type.is_dir() {
            EntryKind::Directory
        } else if file_type.is_symlink() {
            EntryKind::Symlink
        } else if file_type.is_file() {
            EntryKind::File
        } else {
            warn!(path = %entry.path().display(), "unsupported file type, skipping");
            continue;
        };

        let Some(virtual_path) = virtual_path(root, entry.path()) else {
            warn!(path = %entry.path().display(), "path is not valid UTF-8, skipping");
            continue;
        };

        let size = if kind == EntryKind::File {
            match entry.metadata() {
                Ok(metadata) => metadata.len(),
                Err(e) => {
                    warn!(path = %virtual_path, error = %e, "unreadable entry, skipping");
                    continue;
                }
            }
        } else {
            0
        };

        candidates.push(Candidate {
            virtual_path,
            host_path: entry.into_path(),
            kind,
            size,
        });
    }

    Ok(candidates)
}

/// `<root>/usr/bin/tool` -> `/usr/bin/tool`
fn virtual_path(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let mut out = String::new();
    for component in relative.components() {
        out.push('/');
        out.push_str(component.as_os_str().to_str()?);
    }
    Some(out)
}
