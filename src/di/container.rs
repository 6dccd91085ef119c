//! Service container for dependency injection

use super::traits::{Archiver, ContentHasher, DeltaTool, RemoteFetcher, Signer};
use crate::config::{BuildConfig, HasherKind};
use crate::tools::{BsdiffTool, CommandHasher, HttpFetcher, OpensslSigner, Sha256Hasher, TarArchiver};
use bundlesmith_core::BundleResult;
use std::sync::Arc;

/// Service container for dependency injection
///
/// Holds every external collaborator of a release build as a trait object,
/// so tests can swap in the implementations from [`super::mocks`].
///
/// # Example (Testing)
///
/// ```ignore
/// use bundlesmith::di::{ServiceContainer, mocks::*};
/// use bundlesmith::tools::{Sha256Hasher, TarArchiver};
/// use std::sync::Arc;
///
/// let container = ServiceContainer::with_providers(
///     Arc::new(Sha256Hasher::new()),
///     Arc::new(MockDeltaTool::new()),
///     Arc::new(TarArchiver::new()),
///     Arc::new(MockSigner::new()),
///     Arc::new(MockFetcher::new()),
/// );
/// ```
#[derive(Clone)]
pub struct ServiceContainer {
    pub hasher: Arc<dyn ContentHasher>,
    pub delta_tool: Arc<dyn DeltaTool>,
    pub archiver: Arc<dyn Archiver>,
    pub signer: Arc<dyn Signer>,
    pub fetcher: Arc<dyn RemoteFetcher>,
}

impl ServiceContainer {
    /// Create a container with the production tools selected by `config`
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &BuildConfig) -> BundleResult<Self> {
        let hasher: Arc<dyn ContentHasher> = match config.build.hasher {
            HasherKind::Builtin => Arc::new(Sha256Hasher::new()),
            HasherKind::Swupd => Arc::new(CommandHasher::new()),
        };

        Ok(Self {
            hasher,
            delta_tool: Arc::new(BsdiffTool::new()),
            archiver: Arc::new(TarArchiver::new()),
            signer: Arc::new(OpensslSigner::new(
                &config.signing.certificate,
                &config.signing.private_key,
            )),
            fetcher: Arc::new(HttpFetcher::new()?),
        })
    }

    /// Create a container from explicit implementations
    pub fn with_providers(
        hasher: Arc<dyn ContentHasher>,
        delta_tool: Arc<dyn DeltaTool>,
        archiver: Arc<dyn Archiver>,
        signer: Arc<dyn Signer>,
        fetcher: Arc<dyn RemoteFetcher>,
    ) -> Self {
        Self {
            hasher,
            delta_tool,
            archiver,
            signer,
            fetcher,
        }
    }
}
