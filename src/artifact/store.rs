//! Create-if-absent artifact claims
//!
//! A worker claims a target path before producing it. The claim hands out a
//! staging path next to the target; [`ArtifactClaim::commit`] renames the
//! staged file into place, so a target path only ever holds a complete
//! artifact. Dropping an uncommitted claim removes whatever was staged.

use bundlesmith_core::core::path::ensure_dir;
use bundlesmith_core::{BundleError, BundleResult};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct ArtifactStore {
    claims: Arc<Mutex<HashSet<PathBuf>>>,
}

impl ArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<PathBuf>> {
        self.claims.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Claim `target` for creation
    ///
    /// Returns `None` when the artifact already exists or another worker
    /// holds the claim.
    pub fn claim(&self, target: &Path) -> BundleResult<Option<ArtifactClaim>> {
        self.claim_with(target, false)
    }

    /// Claim `target` for rebuilding, even when a file already sits there
    ///
    /// The existing file stays in place until the new one is committed over
    /// it. Returns `None` only when another worker holds the claim.
    pub fn claim_replace(&self, target: &Path) -> BundleResult<Option<ArtifactClaim>> {
        self.claim_with(target, true)
    }

    fn claim_with(&self, target: &Path, replace: bool) -> BundleResult<Option<ArtifactClaim>> {
        let mut claims = self.lock();
        if claims.contains(target) || (!replace && target.exists()) {
            return Ok(None);
        }

        let parent = target.parent().ok_or_else(|| {
            BundleError::Path(format!("No parent directory: {}", target.display()))
        })?;
        ensure_dir(parent)?;
        let file_name = target
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| BundleError::Path(format!("Invalid file name: {}", target.display())))?;
        let staging = parent.join(format!(".{}.partial", file_name));
        remove_if_present(&staging)?;

        claims.insert(target.to_path_buf());
        Ok(Some(ArtifactClaim {
            target: target.to_path_buf(),
            staging,
            claims: Arc::clone(&self.claims),
            committed: false,
        }))
    }

    pub fn is_claimed(&self, target: &Path) -> bool {
        self.lock().contains(target)
    }
}

/// Exclusive right to create one artifact
#[derive(Debug)]
pub struct ArtifactClaim {
    target: PathBuf,
    staging: PathBuf,
    claims: Arc<Mutex<HashSet<PathBuf>>>,
    committed: bool,
}

impl ArtifactClaim {
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Where the producer writes the artifact before commit
    pub fn staging_path(&self) -> &Path {
        &self.staging
    }

    pub fn is_staged(&self) -> bool {
        self.staging.exists()
    }

    /// Move the staged artifact to its final path
    pub fn commit(mut self) -> BundleResult<PathBuf> {
        if !self.staging.exists() {
            return Err(BundleError::Path(format!(
                "Nothing staged for {}",
                self.target.display()
            )));
        }
        fs::rename(&self.staging, &self.target)?;
        self.committed = true;
        debug!(path = %self.target.display(), "committed artifact");
        Ok(self.target.clone())
    }
}

impl Drop for ArtifactClaim {
    fn drop(&mut self) {
        if !self.committed {
            let _ = remove_if_present(&self.staging);
        }
        self.claims
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&self.target);
    }
}

fn remove_if_present(path: &Path) -> BundleResult<()> {
    let Ok(metadata) = fs::symlink_metadata(path) else {
        return Ok(());
    };
    if metadata.is_dir() {
        fs::remove_dir_all(path)?;
    } else {
        fs::remove_file(path)?;
    }
    Ok(())
}
