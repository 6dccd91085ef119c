//! Trait definitions for the external collaborators of a release build
//!
//! Every tool the pipeline shells out to or talks to over the network sits
//! behind one of these traits so tests can swap in the mocks from
//! [`super::mocks`].

use async_trait::async_trait;
use bundlesmith_core::BundleResult;
use std::path::Path;
use std::time::Duration;

/// Computes the content digest of a filesystem entry
///
/// The digest must be deterministic for identical content, entry type and
/// boot flag.
#[async_trait]
pub trait ContentHasher: Send + Sync {
    /// Hash the entry at `path` (not following symlinks)
    async fn hash(&self, path: &Path, boot: bool) -> BundleResult<String>;
}

/// Result of one binary diff attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffOutcome {
    Built,
    Failed(String),
    TimedOut,
}

/// Produces a binary delta between two files
#[async_trait]
pub trait DeltaTool: Send + Sync {
    /// Whether the tool can run on this host
    fn is_available(&self) -> bool {
        true
    }

    /// Write the delta transforming `old` into `new` to `out`
    ///
    /// Implementations must give up once `timeout` elapses.
    async fn diff(&self, old: &Path, new: &Path, out: &Path, timeout: Duration) -> DiffOutcome;
}

/// Compressed archive creation and extraction
#[async_trait]
pub trait Archiver: Send + Sync {
    /// Archive a single entry (no recursion into directories) stored as `name`
    async fn archive_entry(&self, source: &Path, name: &str, dest: &Path) -> BundleResult<()>;

    /// Archive the trees `root/<name>` for every name, recursively
    async fn archive_trees(&self, root: &Path, names: &[&str], dest: &Path) -> BundleResult<()>;

    /// Unpack `archive` into `dest_dir`
    async fn extract(&self, archive: &Path, dest_dir: &Path) -> BundleResult<()>;
}

/// Produces detached signatures
#[async_trait]
pub trait Signer: Send + Sync {
    /// Sign the document at `document`, returning the detached signature bytes
    async fn sign(&self, document: &Path) -> BundleResult<Vec<u8>>;

    /// Certificate clients use to verify the signature, if any
    fn certificate(&self) -> Option<&Path> {
        None
    }
}

/// Retrieves documents by URL
#[async_trait]
pub trait RemoteFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> BundleResult<Vec<u8>>;
}
