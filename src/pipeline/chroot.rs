//! Metadata written into the content tree before it is scanned

use crate::config::BuildConfig;
use crate::publish::CERTIFICATE_NAME;
use bundlesmith_core::core::path::ensure_dir;
use bundlesmith_core::{BundleError, BundleResult, StoreLayout};
use std::fs;
use std::path::Path;
use tracing::debug;

pub const OS_RELEASE: &str = "usr/lib/os-release";
pub const BUNDLE_MARKERS: &str = "usr/share/clear/bundles";
pub const USER_CONFIG: &str = "usr/user-config.toml";
pub const CERTIFICATE_DIR: &str = "usr/share/clear/update-ca";

/// Write release metadata into `chroot` and copy the user config next to
/// the release
pub fn prepare(
    chroot: &Path,
    layout: &StoreLayout,
    config: &BuildConfig,
    version: u32,
    certificate: Option<&Path>,
) -> BundleResult<()> {
    write_file(&chroot.join(OS_RELEASE), format!("VERSION_ID={}\n", version).as_bytes())?;
    write_file(&chroot.join(BUNDLE_MARKERS).join(&config.bundle.name), b"")?;

    let user_config = config.user_config().to_toml()?;
    write_file(&chroot.join(USER_CONFIG), user_config.as_bytes())?;
    let release_dir = layout.release_dir(version);
    ensure_dir(&release_dir)?;
    fs::write(release_dir.join("user-config.toml"), user_config.as_bytes())?;

    if let Some(certificate) = certificate {
        let dest = chroot.join(CERTIFICATE_DIR).join(CERTIFICATE_NAME);
        if let Some(parent) = dest.parent() {
            ensure_dir(parent)?;
        }
        fs::copy(certificate, &dest).map_err(|e| {
            BundleError::Config(format!(
                "Unable to copy certificate {}: {}",
                certificate.display(),
                e
            ))
        })?;
    }

    debug!(chroot = %chroot.display(), version, "prepared content tree");
    Ok(())
}

fn write_file(path: &Path, content: &[u8]) -> BundleResult<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    fs::write(path, content)?;
    Ok(())
}
