use crate::di::Archiver;
use async_trait::async_trait;
use bundlesmith_core::{BundleError, BundleResult};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::path::{Path, PathBuf};
use tar::{Archive, Builder};

/// Gzip-compressed tar archives
///
/// Artifacts keep the `.tar` suffix clients look for; the compression is
/// detected when they unpack.
#[derive(Debug, Clone, Copy)]
pub struct TarArchiver {
    level: Compression,
}

impl TarArchiver {
    pub fn new() -> Self {
        Self {
            level: Compression::best(),
        }
    }

    pub fn with_level(level: u32) -> Self {
        Self {
            level: Compression::new(level),
        }
    }

    fn write_entry(&self, source: &Path, name: &str, dest: &Path) -> std::io::Result<()> {
        let encoder = GzEncoder::new(File::create(dest)?, self.level);
        let mut builder = Builder::new(encoder);
        builder.follow_symlinks(false);
        builder.append_path_with_name(source, name)?;
        builder.into_inner()?.finish()?;
        Ok(())
    }

    fn write_trees(&self, root: &Path, names: &[String], dest: &Path) -> std::io::Result<()> {
        let encoder = GzEncoder::new(File::create(dest)?, self.level);
        let mut builder = Builder::new(encoder);
        builder.follow_symlinks(false);
        for name in names {
            builder.append_dir_all(name, root.join(name))?;
        }
        builder.into_inner()?.finish()?;
        Ok(())
    }

    fn unpack(archive: &Path, dest_dir: &Path) -> std::io::Result<()> {
        let mut archive = Archive::new(GzDecoder::new(File::open(archive)?));
        archive.set_preserve_permissions(true);
        archive.unpack(dest_dir)
    }
}

impl Default for TarArchiver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Archiver for TarArchiver {
    async fn archive_entry(&self, source: &Path, name: &str, dest: &Path) -> BundleResult<()> {
        let archiver = *self;
        let (source, name, dest_owned) = (source.to_path_buf(), name.to_string(), dest.to_path_buf());
        run_blocking(dest, move || archiver.write_entry(&source, &name, &dest_owned)).await
    }

    async fn archive_trees(&self, root: &Path, names: &[&str], dest: &Path) -> BundleResult<()> {
        let archiver = *self;
        let root = root.to_path_buf();
        let names: Vec<String> = names.iter().map(|n| n.to_string()).collect();
        let dest_owned = dest.to_path_buf();
        run_blocking(dest, move || archiver.write_trees(&root, &names, &dest_owned)).await
    }

    async fn extract(&self, archive: &Path, dest_dir: &Path) -> BundleResult<()> {
        let (archive_owned, dest_dir) = (archive.to_path_buf(), dest_dir.to_path_buf());
        run_blocking(archive, move || Self::unpack(&archive_owned, &dest_dir)).await
    }
}

async fn run_blocking<F>(subject: &Path, f: F) -> BundleResult<()>
where
    F: FnOnce() -> std::io::Result<()> + Send + 'static,
{
    let subject: PathBuf = subject.to_path_buf();
    match tokio::task::spawn_blocking(f).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(BundleError::Archive(format!("{}: {}", subject.display(), e))),
        Err(e) => Err(BundleError::Archive(format!("{}: {}", subject.display(), e))),
    }
}
