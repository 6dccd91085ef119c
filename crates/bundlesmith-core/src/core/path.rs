use crate::core::error::{BundleError, BundleResult};
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the manifest-of-manifests document
pub const MOM_NAME: &str = "MoM";

/// Layout of a release store rooted at a state directory
///
/// ```text
/// <statedir>/www/update/<version>/Manifest.<bundle>
/// <statedir>/www/update/<version>/files/<hash>.tar
/// <statedir>/www/update/<version>/delta/<from>-<to>-<fromhash>-<tohash>
/// <statedir>/www/update/<version>/pack-<bundle>-from-<origin>.tar
/// <statedir>/www/update/version/format<N>/{first,latest}
/// ```
#[derive(Debug, Clone)]
pub struct StoreLayout {
    root: PathBuf,
}

impl StoreLayout {
    pub fn new(statedir: &Path) -> Self {
        Self {
            root: statedir.to_path_buf(),
        }
    }

    pub fn statedir(&self) -> &Path {
        &self.root
    }

    /// Get the published web root (`<statedir>/www/update`)
    pub fn update_dir(&self) -> PathBuf {
        self.root.join("www").join("update")
    }

    /// Get the directory holding every artifact of one release
    pub fn release_dir(&self, version: u32) -> PathBuf {
        self.update_dir().join(version.to_string())
    }

    pub fn manifest_path(&self, version: u32, name: &str) -> PathBuf {
        self.release_dir(version).join(format!("Manifest.{}", name))
    }

    pub fn files_dir(&self, version: u32) -> PathBuf {
        self.release_dir(version).join("files")
    }

    /// Get the fullfile archive for content introduced at `version`
    pub fn fullfile_path(&self, version: u32, hash: &str) -> PathBuf {
        self.files_dir(version).join(format!("{}.tar", hash))
    }

    pub fn delta_dir(&self, version: u32) -> PathBuf {
        self.release_dir(version).join("delta")
    }

    pub fn delta_path(&self, version: u32, delta_name: &str) -> PathBuf {
        self.delta_dir(version).join(delta_name)
    }

    pub fn pack_path(&self, version: u32, bundle: &str, origin: u32) -> PathBuf {
        self.release_dir(version)
            .join(format!("{}.tar", pack_name(bundle, origin)))
    }

    /// Get the pointer directory (`<statedir>/www/update/version`)
    pub fn pointer_root(&self) -> PathBuf {
        self.update_dir().join("version")
    }

    pub fn pointer_dir(&self, format: u32) -> PathBuf {
        self.pointer_root().join(format!("format{}", format))
    }

    /// URL of the local store, used to re-read previously published manifests
    pub fn file_url(&self) -> BundleResult<String> {
        let dir = self.update_dir();
        let absolute = if dir.is_absolute() {
            dir
        } else {
            std::env::current_dir()?.join(dir)
        };
        let text = absolute.to_str().ok_or_else(|| {
            BundleError::Path(format!("Non UTF-8 state directory: {}", absolute.display()))
        })?;
        Ok(format!("file://{}", text))
    }
}

/// Name of the pack upgrading a bundle from `origin` (0 = fresh install)
pub fn pack_name(bundle: &str, origin: u32) -> String {
    format!("pack-{}-from-{}", bundle, origin)
}

/// Ensure a directory exists
pub fn ensure_dir(path: &Path) -> BundleResult<()> {
    if !path.exists() {
        fs::create_dir_all(path)?;
    }
    Ok(())
}

/// Write `data` to `path` through a sibling temp file and a rename
///
/// Readers observe either the old content or the complete new content.
pub fn write_atomic(path: &Path, data: &[u8]) -> BundleResult<()> {
    let parent = path
        .parent()
        .ok_or_else(|| BundleError::Path(format!("No parent directory: {}", path.display())))?;
    ensure_dir(parent)?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| BundleError::Path(format!("Invalid file name: {}", path.display())))?;
    let tmp = parent.join(format!(".{}.partial", file_name));
    fs::write(&tmp, data)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Convert an absolute virtual path (`/usr/bin/foo`) to its location under `root`
pub fn host_path(root: &Path, virtual_path: &str) -> PathBuf {
    root.join(virtual_path.trim_start_matches('/'))
}
