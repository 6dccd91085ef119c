use super::pointers::ReleasePointers;
use crate::di::{Archiver, ContentHasher, ServiceContainer, Signer};
use bundlesmith_core::core::path::{ensure_dir, write_atomic, MOM_NAME};
use bundlesmith_core::manifest::{self, Manifest};
use bundlesmith_core::{BundleError, BundleResult, StoreLayout};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// File name clients expect for the signing certificate
pub const CERTIFICATE_NAME: &str = "Swupd_Root.pem";

/// Paths written for one published release
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedRelease {
    pub version: u32,
    pub manifest_path: PathBuf,
    pub manifest_hash: String,
    pub mom_path: PathBuf,
    pub signature_path: PathBuf,
    pub certificate_path: Option<PathBuf>,
}

/// Writes the bundle manifest, the MoM and its signature, then advances the
/// release pointers
pub struct ReleasePublisher {
    layout: StoreLayout,
    hasher: Arc<dyn ContentHasher>,
    archiver: Arc<dyn Archiver>,
    signer: Arc<dyn Signer>,
}

impl ReleasePublisher {
    pub fn new(layout: StoreLayout, services: &ServiceContainer) -> Self {
        Self {
            layout,
            hasher: Arc::clone(&services.hasher),
            archiver: Arc::clone(&services.archiver),
            signer: Arc::clone(&services.signer),
        }
    }

    pub async fn publish(
        &self,
        manifest: &Manifest,
        version: u32,
        previous: u32,
        format: u32,
        bundle: &str,
    ) -> BundleResult<PublishedRelease> {
        if manifest.version != version {
            return Err(BundleError::Publish(format!(
                "Manifest for {} is at version {}, expected {}",
                bundle, manifest.version, version
            )));
        }
        ensure_dir(&self.layout.release_dir(version))?;

        // 1. Bundle manifest
        let manifest_path = self.write_manifest(version, bundle, manifest).await?;
        let manifest_hash = self.hasher.hash(&manifest_path, false).await?;
        debug!(bundle, hash = %manifest_hash, "wrote bundle manifest");

        // 2. MoM pointing at the bundle manifest
        let mom = Manifest::mom(
            format,
            version,
            previous,
            manifest.timestamp,
            bundle,
            &manifest_hash,
        );
        let mom_path = self.write_manifest(version, MOM_NAME, &mom).await?;

        // 3. Signature and certificate
        let signature = self.signer.sign(&mom_path).await?;
        let signature_path = sibling(&mom_path, ".sig");
        write_atomic(&signature_path, &signature)?;

        let certificate_path = match self.signer.certificate() {
            Some(certificate) => {
                let dest = self.layout.release_dir(version).join(CERTIFICATE_NAME);
                fs::copy(certificate, &dest).map_err(|e| {
                    BundleError::Sign(format!(
                        "Unable to copy certificate {}: {}",
                        certificate.display(),
                        e
                    ))
                })?;
                Some(dest)
            }
            None => None,
        };

        // 4. Pointers last, so a failed build never becomes visible
        ReleasePointers::write(&self.layout, format, version)?;

        info!(bundle, version, previous, format, "published release");
        Ok(PublishedRelease {
            version,
            manifest_path,
            manifest_hash,
            mom_path,
            signature_path,
            certificate_path,
        })
    }

    /// Write `Manifest.<name>` and its `.tar` companion
    async fn write_manifest(&self, version: u32, name: &str, manifest: &Manifest) -> BundleResult<PathBuf> {
        let path = self.layout.manifest_path(version, name);
        write_atomic(&path, manifest::serialize(manifest).as_bytes())?;

        let file_name = format!("Manifest.{}", name);
        let tar_path = sibling(&path, ".tar");
        let staging = sibling(&path, ".tar.partial");
        self.archiver.archive_entry(&path, &file_name, &staging).await?;
        fs::rename(&staging, &tar_path)?;
        Ok(path)
    }
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}
