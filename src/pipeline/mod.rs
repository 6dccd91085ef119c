//! Release build orchestration
//!
//! One build produces release `latest + 10`: resolve the upstream manifests,
//! load the previous release from the local store, stamp and scan the
//! content tree, reconcile versions, build artifacts and packs, then publish.

pub mod chroot;

use crate::artifact::{ArtifactPlanner, ArtifactStore, BuildReport};
use crate::config::BuildConfig;
use crate::di::ServiceContainer;
use crate::fetch::ManifestFetcher;
use crate::pack::{PackArtifact, PackAssembler, PackOrigin};
use crate::publish::{PublishedRelease, ReleasePointers, ReleasePublisher};
use crate::reconcile::reconcile;
use crate::scan::SnapshotScanner;
use bundlesmith_core::manifest::{Manifest, RELEASE_STEP};
use bundlesmith_core::{BundleResult, StoreLayout};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Outcome of one release build
#[derive(Debug, Clone)]
pub struct BuildSummary {
    pub version: u32,
    pub previous: u32,
    pub format: u32,
    pub entries: usize,
    pub changed: usize,
    pub upstream_bundles: Vec<String>,
    pub artifacts: BuildReport,
    pub packs: Vec<PackArtifact>,
    pub published: PublishedRelease,
}

pub struct ReleaseBuilder {
    config: BuildConfig,
    layout: StoreLayout,
    services: ServiceContainer,
}

impl ReleaseBuilder {
    pub fn new(config: BuildConfig, statedir: &Path, services: ServiceContainer) -> Self {
        Self {
            config,
            layout: StoreLayout::new(statedir),
            services,
        }
    }

    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    /// Build and publish the next release from `chroot`
    pub async fn build(&self, chroot: &Path) -> BundleResult<BuildSummary> {
        let bundle = self.config.bundle.name.as_str();
        let previous = ReleasePointers::latest(&self.layout)?;
        let version = previous + RELEASE_STEP;
        info!(bundle, version, previous, "starting release build");

        let fetcher = ManifestFetcher::new(Arc::clone(&self.services.fetcher));

        // Upstream includes must all resolve before anything is written
        let (upstream_mom, upstream) = fetcher
            .fetch_with_includes(
                &self.config.upstream.url,
                self.config.upstream.version,
                &self.config.bundle.includes,
            )
            .await?;
        let format = upstream_mom.format;

        let previous_manifest: Option<Manifest> = if previous == 0 {
            None
        } else {
            Some(
                fetcher
                    .fetch_bundle(&self.layout.file_url()?, previous, bundle)
                    .await?,
            )
        };

        chroot::prepare(
            chroot,
            &self.layout,
            &self.config,
            version,
            self.services.signer.certificate(),
        )?;

        let jobs = self.config.build.jobs();
        let scanner = SnapshotScanner::new(Arc::clone(&self.services.hasher), jobs);
        let mut raw = scanner.scan(chroot, version, format).await?;
        raw.previous = previous;
        let manifest = reconcile(raw, previous_manifest.as_ref());
        let changed = manifest.changed_entries().count();

        let store = ArtifactStore::new();
        let planner = ArtifactPlanner::new(
            self.layout.clone(),
            &self.services,
            store.clone(),
            self.config.build.diff_timeout(),
            jobs,
        );
        let artifacts = planner
            .plan_and_build(&manifest, previous_manifest.as_ref(), chroot)
            .await?;

        let assembler = PackAssembler::new(
            self.layout.clone(),
            Arc::clone(&self.services.archiver),
            store,
        );
        let mut packs = Vec::new();
        if let Some(prior) = previous_manifest.as_ref() {
            packs.push(
                assembler
                    .assemble(&manifest, PackOrigin::Release(prior), bundle)
                    .await?,
            );
        }
        packs.push(assembler.assemble(&manifest, PackOrigin::Scratch, bundle).await?);

        let publisher = ReleasePublisher::new(self.layout.clone(), &self.services);
        let published = publisher
            .publish(&manifest, version, previous, format, bundle)
            .await?;

        Ok(BuildSummary {
            version,
            previous,
            format,
            entries: manifest.file_count(),
            changed,
            upstream_bundles: upstream.into_keys().collect(),
            artifacts,
            packs,
            published,
        })
    }
}

/// Build one release of the configured bundle
pub async fn build_release(
    config: BuildConfig,
    statedir: &Path,
    chroot: &Path,
    services: ServiceContainer,
) -> BundleResult<BuildSummary> {
    ReleaseBuilder::new(config, statedir, services).build(chroot).await
}
