use crate::di::ContentHasher;
use async_trait::async_trait;
use bundlesmith_core::{BundleError, BundleResult};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// SHA-256 digest over an entry's type, boot flag, ownership, permissions
/// and content (file bytes or symlink target)
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Hasher;

impl Sha256Hasher {
    pub fn new() -> Self {
        Self
    }

    /// Hash an entry synchronously
    pub fn digest(path: &Path, boot: bool) -> BundleResult<String> {
        let metadata = fs::symlink_metadata(path).map_err(|e| hash_error(path, e))?;
        let file_type = metadata.file_type();

        let tag: &[u8] = if file_type.is_dir() {
            b"D"
        } else if file_type.is_symlink() {
            b"L"
        } else if file_type.is_file() {
            b"F"
        } else {
            return Err(hash_error(path, "unsupported file type"));
        };

        let mut hasher = Sha256::new();
        hasher.update(tag);
        hasher.update(if boot { b"b" } else { b"." });
        hasher.update(
            format!(
                "{:o}:{}:{}\0",
                metadata.mode() & 0o7777,
                metadata.uid(),
                metadata.gid()
            )
            .as_bytes(),
        );

        if file_type.is_file() {
            let mut file = File::open(path).map_err(|e| hash_error(path, e))?;
            io::copy(&mut file, &mut hasher).map_err(|e| hash_error(path, e))?;
        } else if file_type.is_symlink() {
            let target = fs::read_link(path).map_err(|e| hash_error(path, e))?;
            hasher.update(target.as_os_str().as_bytes());
        }

        Ok(hex::encode(hasher.finalize()))
    }
}

#[async_trait]
impl ContentHasher for Sha256Hasher {
    async fn hash(&self, path: &Path, boot: bool) -> BundleResult<String> {
        let owned = path.to_path_buf();
        tokio::task::spawn_blocking(move || Self::digest(&owned, boot))
            .await
            .map_err(|e| hash_error(path, e))?
    }
}

/// Delegates hashing to `swupd hashdump`, matching the client's own digests
#[derive(Debug, Clone)]
pub struct CommandHasher {
    program: PathBuf,
}

impl CommandHasher {
    pub fn new() -> Self {
        Self::with_program("swupd")
    }

    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn is_available(&self) -> bool {
        which::which(&self.program).is_ok()
    }
}

impl Default for CommandHasher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContentHasher for CommandHasher {
    async fn hash(&self, path: &Path, _boot: bool) -> BundleResult<String> {
        let output = Command::new(&self.program)
            .arg("hashdump")
            .arg(path)
            .output()
            .await
            .map_err(|e| hash_error(path, e))?;

        if !output.status.success() {
            return Err(hash_error(
                path,
                String::from_utf8_lossy(&output.stderr).trim(),
            ));
        }

        let digest = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if digest.is_empty() {
            return Err(hash_error(path, "empty hashdump output"));
        }
        Ok(digest)
    }
}

fn hash_error(path: &Path, reason: impl ToString) -> BundleError {
    BundleError::Hash {
        path: path.display().to_string(),
        reason: reason.to_string(),
    }
}
