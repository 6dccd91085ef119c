//! Mock implementations of the collaborator traits for testing

use super::traits::{ContentHasher, DeltaTool, DiffOutcome, RemoteFetcher, Signer};
use crate::tools::Sha256Hasher;
use async_trait::async_trait;
use bundlesmith_core::{BundleError, BundleResult};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// In-memory document source keyed by URL
///
/// # Example
///
/// ```
/// use bundlesmith::di::mocks::MockFetcher;
///
/// let fetcher = MockFetcher::new();
/// fetcher.add("https://cdn.example.com/10/Manifest.MoM", "MANIFEST\t30\n");
/// assert!(fetcher.requests().is_empty());
/// ```
#[derive(Clone, Default)]
pub struct MockFetcher {
    documents: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, url: &str, body: impl Into<Vec<u8>>) {
        self.documents
            .lock()
            .unwrap()
            .insert(url.to_string(), body.into());
    }

    /// URLs requested so far, in order
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteFetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> BundleResult<Vec<u8>> {
        self.requests.lock().unwrap().push(url.to_string());

        // Fall through to disk so pipelines can re-read the local store
        if let Some(path) = url.strip_prefix("file://") {
            return tokio::fs::read(path).await.map_err(|e| BundleError::Fetch {
                url: url.to_string(),
                reason: e.to_string(),
            });
        }

        self.documents
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| BundleError::Fetch {
                url: url.to_string(),
                reason: "404 Not Found".to_string(),
            })
    }
}

/// How a [`MockDeltaTool`] responds to diff requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffMode {
    /// Write a small delta file and report success
    Succeed,
    /// Write partial output then report failure
    Fail,
    /// Write partial output then report a timeout
    TimeOut,
    /// Report success without writing anything
    SilentSuccess,
}

/// Delta tool double that records every diff request
#[derive(Clone)]
pub struct MockDeltaTool {
    mode: DiffMode,
    available: bool,
    calls: Arc<Mutex<Vec<(PathBuf, PathBuf)>>>,
}

impl MockDeltaTool {
    pub fn new() -> Self {
        Self::with_mode(DiffMode::Succeed)
    }

    pub fn with_mode(mode: DiffMode) -> Self {
        Self {
            mode,
            available: true,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new()
        }
    }

    /// `(old, new)` pairs diffed so far
    pub fn calls(&self) -> Vec<(PathBuf, PathBuf)> {
        self.calls.lock().unwrap().clone()
    }
}

impl Default for MockDeltaTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeltaTool for MockDeltaTool {
    fn is_available(&self) -> bool {
        self.available
    }

    async fn diff(&self, old: &Path, new: &Path, out: &Path, _timeout: Duration) -> DiffOutcome {
        self.calls
            .lock()
            .unwrap()
            .push((old.to_path_buf(), new.to_path_buf()));

        match self.mode {
            DiffMode::Succeed => match std::fs::write(out, b"BSDIFF-MOCK") {
                Ok(()) => DiffOutcome::Built,
                Err(e) => DiffOutcome::Failed(e.to_string()),
            },
            DiffMode::Fail => {
                let _ = std::fs::write(out, b"partial");
                DiffOutcome::Failed("mock diff failure".to_string())
            }
            DiffMode::TimeOut => {
                let _ = std::fs::write(out, b"partial");
                DiffOutcome::TimedOut
            }
            DiffMode::SilentSuccess => DiffOutcome::Built,
        }
    }
}

/// Signer double returning a fixed signature
#[derive(Clone)]
pub struct MockSigner {
    signature: Vec<u8>,
    certificate: Option<PathBuf>,
    fail: bool,
    signed: Arc<Mutex<Vec<PathBuf>>>,
}

impl MockSigner {
    pub fn new() -> Self {
        Self {
            signature: b"MOCK-SIGNATURE".to_vec(),
            certificate: None,
            fail: false,
            signed: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn with_certificate(mut self, certificate: impl Into<PathBuf>) -> Self {
        self.certificate = Some(certificate.into());
        self
    }

    /// Documents signed so far
    pub fn signed(&self) -> Vec<PathBuf> {
        self.signed.lock().unwrap().clone()
    }
}

impl Default for MockSigner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Signer for MockSigner {
    async fn sign(&self, document: &Path) -> BundleResult<Vec<u8>> {
        if self.fail {
            return Err(BundleError::Sign("mock signing failure".to_string()));
        }
        self.signed.lock().unwrap().push(document.to_path_buf());
        Ok(self.signature.clone())
    }

    fn certificate(&self) -> Option<&Path> {
        self.certificate.as_deref()
    }
}

/// Real SHA-256 hasher that fails for entries with selected file names
#[derive(Clone, Default)]
pub struct FailingHasher {
    inner: Sha256Hasher,
    fail_names: HashSet<String>,
}

impl FailingHasher {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            inner: Sha256Hasher::new(),
            fail_names: names.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl ContentHasher for FailingHasher {
    async fn hash(&self, path: &Path, boot: bool) -> BundleResult<String> {
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        if self.fail_names.contains(name) {
            return Err(BundleError::Hash {
                path: path.display().to_string(),
                reason: "mock hash failure".to_string(),
            });
        }
        self.inner.hash(path, boot).await
    }
}
