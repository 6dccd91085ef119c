//! Fullfile and delta production for one release

use super::store::ArtifactStore;
use super::{delta_applicable, DeltaKey};
use crate::di::{Archiver, DeltaTool, DiffOutcome, ServiceContainer};
use bundlesmith_core::core::path::host_path;
use bundlesmith_core::manifest::{Manifest, ManifestEntry};
use bundlesmith_core::{BundleError, BundleResult, StoreLayout};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// A delta that could not be produced; the fullfile still serves the entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeltaFailure {
    pub path: String,
    pub reason: String,
}

/// What one planner run produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub fullfiles_created: usize,
    pub fullfiles_existing: usize,
    pub deltas_created: usize,
    pub deltas_existing: usize,
    pub delta_failures: Vec<DeltaFailure>,
}

impl BuildReport {
    fn absorb(&mut self, outcome: JobOutcome) {
        if outcome.fullfile_created {
            self.fullfiles_created += 1;
        } else {
            self.fullfiles_existing += 1;
        }
        match outcome.delta {
            DeltaStep::NotApplicable => {}
            DeltaStep::Created => self.deltas_created += 1,
            DeltaStep::Existing => self.deltas_existing += 1,
            DeltaStep::Failed(reason) => self.delta_failures.push(DeltaFailure {
                path: outcome.path,
                reason,
            }),
        }
    }
}

enum DeltaStep {
    NotApplicable,
    Created,
    Existing,
    Failed(String),
}

struct JobOutcome {
    path: String,
    fullfile_created: bool,
    delta: DeltaStep,
}

/// Builds the fullfiles and deltas a release's changed entries need
pub struct ArtifactPlanner {
    layout: StoreLayout,
    archiver: Arc<dyn Archiver>,
    delta_tool: Arc<dyn DeltaTool>,
    store: ArtifactStore,
    diff_timeout: Duration,
    max_concurrent: usize,
    deltas_enabled: bool,
}

impl ArtifactPlanner {
    pub fn new(
        layout: StoreLayout,
        services: &ServiceContainer,
        store: ArtifactStore,
        diff_timeout: Duration,
        max_concurrent: usize,
    ) -> Self {
        let deltas_enabled = services.delta_tool.is_available();
        if !deltas_enabled {
            warn!("delta tool not available, releases will only carry fullfiles");
        }
        Self {
            layout,
            archiver: Arc::clone(&services.archiver),
            delta_tool: Arc::clone(&services.delta_tool),
            store,
            diff_timeout,
            max_concurrent: max_concurrent.max(1),
            deltas_enabled,
        }
    }

    /// Create every missing artifact for `manifest`'s changed entries
    ///
    /// Running this again over the same release creates nothing new.
    pub async fn plan_and_build(
        &self,
        manifest: &Manifest,
        previous: Option<&Manifest>,
        content_root: &Path,
    ) -> BundleResult<BuildReport> {
        let mut report = BuildReport::default();
        let mut join_set = JoinSet::new();

        for entry in manifest.changed_entries() {
            if join_set.len() >= self.max_concurrent {
                if let Some(joined) = join_set.join_next().await {
                    report.absorb(flatten(joined)?);
                }
            }

            let base = previous
                .and_then(|p| p.get(&entry.path))
                .filter(|prior| self.deltas_enabled && delta_applicable(prior, entry))
                .cloned();

            let job = Job {
                layout: self.layout.clone(),
                archiver: Arc::clone(&self.archiver),
                delta_tool: Arc::clone(&self.delta_tool),
                store: self.store.clone(),
                diff_timeout: self.diff_timeout,
                release: manifest.version,
                source: host_path(content_root, &entry.path),
                entry: entry.clone(),
                base,
            };
            join_set.spawn(job.run());
        }

        while let Some(joined) = join_set.join_next().await {
            report.absorb(flatten(joined)?);
        }

        info!(
            version = manifest.version,
            fullfiles = report.fullfiles_created,
            deltas = report.deltas_created,
            delta_failures = report.delta_failures.len(),
            "built release artifacts"
        );
        Ok(report)
    }
}

fn flatten(
    joined: Result<BundleResult<JobOutcome>, tokio::task::JoinError>,
) -> BundleResult<JobOutcome> {
    joined.map_err(|e| BundleError::Archive(format!("Artifact task failed: {}", e)))?
}

/// Artifact work for one changed entry
struct Job {
    layout: StoreLayout,
    archiver: Arc<dyn Archiver>,
    delta_tool: Arc<dyn DeltaTool>,
    store: ArtifactStore,
    diff_timeout: Duration,
    release: u32,
    source: PathBuf,
    entry: ManifestEntry,
    /// Previous entry at the same path, when a delta applies
    base: Option<ManifestEntry>,
}

impl Job {
    async fn run(self) -> BundleResult<JobOutcome> {
        let fullfile_created = self.build_fullfile().await?;
        let delta = match &self.base {
            Some(base) => self.build_delta(base).await,
            None => DeltaStep::NotApplicable,
        };
        Ok(JobOutcome {
            path: self.entry.path.clone(),
            fullfile_created,
            delta,
        })
    }

    async fn build_fullfile(&self) -> BundleResult<bool> {
        let target = self.layout.fullfile_path(self.release, &self.entry.hash);
        let Some(claim) = self.store.claim(&target)? else {
            return Ok(false);
        };

        self.archiver
            .archive_entry(&self.source, &self.entry.hash, claim.staging_path())
            .await?;
        claim.commit()?;
        debug!(path = %self.entry.path, hash = %self.entry.hash, "created fullfile");
        Ok(true)
    }

    async fn build_delta(&self, base: &ManifestEntry) -> DeltaStep {
        let key = DeltaKey::between(base, &self.entry);
        match self.try_delta(base, &key).await {
            Ok(step) => step,
            Err(reason) => {
                warn!(
                    path = %self.entry.path,
                    delta = %key,
                    reason = %reason,
                    "delta not created, fullfile will be used"
                );
                DeltaStep::Failed(reason)
            }
        }
    }

    async fn try_delta(&self, base: &ManifestEntry, key: &DeltaKey) -> Result<DeltaStep, String> {
        let target = self.layout.delta_path(self.release, &key.to_string());
        let claim = match self.store.claim(&target) {
            Ok(Some(claim)) => claim,
            Ok(None) => return Ok(DeltaStep::Existing),
            Err(e) => return Err(e.to_string()),
        };

        let base_archive = self.layout.fullfile_path(base.version, &base.hash);
        if !base_archive.is_file() {
            return Err(format!("base fullfile {} is missing", base_archive.display()));
        }

        let workdir = tempfile::tempdir().map_err(|e| e.to_string())?;
        self.archiver
            .extract(&base_archive, workdir.path())
            .await
            .map_err(|e| e.to_string())?;
        let old = workdir.path().join(&base.hash);

        match self
            .delta_tool
            .diff(&old, &self.source, claim.staging_path(), self.diff_timeout)
            .await
        {
            DiffOutcome::Built if claim.is_staged() => {
                claim.commit().map_err(|e| e.to_string())?;
                debug!(path = %self.entry.path, delta = %key, "created delta");
                Ok(DeltaStep::Created)
            }
            DiffOutcome::Built => Err("delta tool produced no output".to_string()),
            DiffOutcome::Failed(reason) => Err(reason),
            DiffOutcome::TimedOut => Err(format!(
                "diff timed out after {}s",
                self.diff_timeout.as_secs()
            )),
        }
    }
}
