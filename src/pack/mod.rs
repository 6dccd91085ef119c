//! Pack assembly
//!
//! A pack bundles everything a client at one origin release needs to reach
//! the current release: `delta/<key>` files where a delta was built, and
//! `staged/<hash>` full content for everything else.

use crate::artifact::{delta_applicable, ArtifactStore, DeltaKey};
use crate::di::Archiver;
use crate::publish::ReleasePointers;
use bundlesmith_core::manifest::Manifest;
use bundlesmith_core::{BundleError, BundleResult, StoreLayout};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

const STAGED_DIR: &str = "staged";
const DELTA_DIR: &str = "delta";

/// Release a pack upgrades from
#[derive(Debug, Clone, Copy)]
pub enum PackOrigin<'a> {
    /// Fresh install (origin 0)
    Scratch,
    Release(&'a Manifest),
}

impl PackOrigin<'_> {
    pub fn version(&self) -> u32 {
        match self {
            PackOrigin::Scratch => 0,
            PackOrigin::Release(manifest) => manifest.version,
        }
    }
}

/// Contents selected for one pack
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackPlan {
    /// Delta name -> delta file in the current release
    pub deltas: BTreeMap<String, PathBuf>,
    /// Content hash -> fullfile archive holding it
    pub fullfiles: BTreeMap<String, PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackArtifact {
    pub bundle: String,
    pub origin: u32,
    pub path: PathBuf,
    pub fullfiles: usize,
    pub deltas: usize,
    /// False when the pack already existed and was left untouched
    pub created: bool,
}

pub struct PackAssembler {
    layout: StoreLayout,
    archiver: Arc<dyn Archiver>,
    store: ArtifactStore,
}

impl PackAssembler {
    pub fn new(layout: StoreLayout, archiver: Arc<dyn Archiver>, store: ArtifactStore) -> Self {
        Self {
            layout,
            archiver,
            store,
        }
    }

    /// Select the artifacts a client at `origin` needs
    ///
    /// Entries newer than the origin are included; a delta built for this
    /// release is preferred over the fullfile when the origin holds the
    /// delta's base content.
    pub fn plan(&self, manifest: &Manifest, origin: PackOrigin<'_>) -> PackPlan {
        let origin_version = origin.version();
        let mut plan = PackPlan::default();

        for entry in manifest.entries.values() {
            if entry.is_deleted() || entry.version <= origin_version {
                continue;
            }

            if let PackOrigin::Release(origin_manifest) = origin {
                if let Some(base) = origin_manifest
                    .get(&entry.path)
                    .filter(|base| delta_applicable(base, entry))
                {
                    let name = DeltaKey::between(base, entry).to_string();
                    let delta = self.layout.delta_path(manifest.version, &name);
                    if delta.is_file() {
                        plan.deltas.insert(name, delta);
                        continue;
                    }
                }
            }

            plan.fullfiles
                .entry(entry.hash.clone())
                .or_insert_with(|| self.layout.fullfile_path(entry.version, &entry.hash));
        }

        plan
    }

    /// Write `pack-<bundle>-from-<origin>.tar` for `manifest`'s release
    ///
    /// Packs of a published release are never rewritten. A pack left behind
    /// by a build that failed before publishing is rebuilt, since its name
    /// does not identify its content.
    pub async fn assemble(
        &self,
        manifest: &Manifest,
        origin: PackOrigin<'_>,
        bundle: &str,
    ) -> BundleResult<PackArtifact> {
        let origin_version = origin.version();
        let target = self.layout.pack_path(manifest.version, bundle, origin_version);
        let plan = self.plan(manifest, origin);

        let mut artifact = PackArtifact {
            bundle: bundle.to_string(),
            origin: origin_version,
            path: target.clone(),
            fullfiles: plan.fullfiles.len(),
            deltas: plan.deltas.len(),
            created: false,
        };

        let published = manifest.version <= ReleasePointers::latest(&self.layout)?;
        let claim = if published {
            self.store.claim(&target)?
        } else {
            if target.exists() {
                debug!(pack = %target.display(), "rebuilding unpublished pack");
            }
            self.store.claim_replace(&target)?
        };
        let Some(claim) = claim else {
            debug!(pack = %target.display(), "pack already present");
            return Ok(artifact);
        };

        let workdir = tempfile::tempdir()?;
        let staged = workdir.path().join(STAGED_DIR);
        let delta = workdir.path().join(DELTA_DIR);
        fs::create_dir_all(&staged)?;
        fs::create_dir_all(&delta)?;

        for (name, source) in &plan.deltas {
            fs::copy(source, delta.join(name))?;
        }
        for (hash, archive) in &plan.fullfiles {
            if !archive.is_file() {
                return Err(BundleError::Archive(format!(
                    "Fullfile for {} missing at {}",
                    hash,
                    archive.display()
                )));
            }
            self.archiver.extract(archive, &staged).await?;
        }

        self.archiver
            .archive_trees(workdir.path(), &[STAGED_DIR, DELTA_DIR], claim.staging_path())
            .await?;
        claim.commit()?;
        artifact.created = true;

        info!(
            pack = %target.display(),
            origin = origin_version,
            fullfiles = artifact.fullfiles,
            deltas = artifact.deltas,
            "assembled pack"
        );
        Ok(artifact)
    }
}
