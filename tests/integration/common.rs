//! Common utilities for integration tests

use bundlesmith::config::BuildConfig;
use bundlesmith::di::mocks::{MockDeltaTool, MockFetcher, MockSigner};
use bundlesmith::di::ServiceContainer;
use bundlesmith::fetch::ManifestFetcher;
use bundlesmith::pipeline::{build_release, BuildSummary};
use bundlesmith::tools::{Sha256Hasher, TarArchiver};
use bundlesmith::{BundleResult, EntryKind, Manifest, ManifestEntry, StoreLayout};
use bundlesmith_core::manifest;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use tempfile::TempDir;

pub const UPSTREAM: &str = "https://upstream.example.com/update";
pub const UPSTREAM_VERSION: u32 = 100;
pub const FORMAT: u32 = 30;

pub fn bundlesmith_command() -> Command {
    Command::new(env!("CARGO_BIN_EXE_bundlesmith"))
}

pub fn hash(c: char) -> String {
    std::iter::repeat(c).take(64).collect()
}

/// A state directory, a content tree and a mocked upstream
pub struct Harness {
    pub temp: TempDir,
    pub statedir: PathBuf,
    pub chroot: PathBuf,
    pub fetcher: MockFetcher,
    pub signer: MockSigner,
}

impl Harness {
    pub fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let statedir = temp.path().join("state");
        let chroot = temp.path().join("chroot");
        fs::create_dir_all(chroot.join("usr/bin")).unwrap();
        fs::create_dir_all(chroot.join("usr/share/doc")).unwrap();
        fs::write(chroot.join("usr/bin/tool"), b"tool version one\n").unwrap();
        fs::write(chroot.join("usr/share/doc/README"), b"read me\n").unwrap();
        std::os::unix::fs::symlink("tool", chroot.join("usr/bin/tool-alias")).unwrap();

        let cert = temp.path().join("Swupd_Root.pem");
        fs::write(&cert, b"-----BEGIN CERTIFICATE-----\n").unwrap();

        let fetcher = MockFetcher::new();
        let mut mom = Manifest::new(FORMAT, UPSTREAM_VERSION, 90, 1_700_000_000);
        mom.insert(ManifestEntry::new("os-core", EntryKind::Manifest, hash('c'), 90));
        fetcher.add(
            &ManifestFetcher::manifest_url(UPSTREAM, UPSTREAM_VERSION, "MoM"),
            manifest::serialize(&mom),
        );
        let mut os_core = Manifest::new(FORMAT, 90, 80, 1_700_000_000);
        os_core.insert(ManifestEntry::new("/usr", EntryKind::Directory, hash('d'), 80));
        fetcher.add(
            &ManifestFetcher::manifest_url(UPSTREAM, 90, "os-core"),
            manifest::serialize(&os_core),
        );

        Self {
            signer: MockSigner::new().with_certificate(&cert),
            temp,
            statedir,
            chroot,
            fetcher,
        }
    }

    pub fn config_text(&self, includes: &[&str]) -> String {
        let includes: Vec<String> = includes.iter().map(|i| format!("\"{}\"", i)).collect();
        format!(
            r#"[upstream]
url = "{}"
version = {}

[bundle]
name = "editors"
description = "Text editors"
includes = [{}]
url = "https://bundles.example.com/update"

[signing]
certificate = "Swupd_Root.pem"
private_key = "private.pem"

[build]
jobs = 2
"#,
            UPSTREAM,
            UPSTREAM_VERSION,
            includes.join(", ")
        )
    }

    pub fn config(&self, includes: &[&str]) -> BuildConfig {
        BuildConfig::from_toml_str(&self.config_text(includes)).unwrap()
    }

    pub fn services(&self, delta_tool: MockDeltaTool) -> ServiceContainer {
        ServiceContainer::with_providers(
            Arc::new(Sha256Hasher::new()),
            Arc::new(delta_tool),
            Arc::new(TarArchiver::new()),
            Arc::new(self.signer.clone()),
            Arc::new(self.fetcher.clone()),
        )
    }

    pub async fn build(&self, delta_tool: MockDeltaTool) -> BundleResult<BuildSummary> {
        build_release(
            self.config(&["os-core"]),
            &self.statedir,
            &self.chroot,
            self.services(delta_tool),
        )
        .await
    }

    pub fn layout(&self) -> StoreLayout {
        StoreLayout::new(&self.statedir)
    }

    pub fn published_manifest(&self, version: u32) -> Manifest {
        let text = fs::read_to_string(self.layout().manifest_path(version, "editors")).unwrap();
        manifest::parse(&text).unwrap()
    }
}

/// Unpack a gzip tar archive into a fresh directory
pub fn unpack(archive: &Path) -> TempDir {
    let out = TempDir::new().unwrap();
    let file = fs::File::open(archive).unwrap();
    tar::Archive::new(flate2::read::GzDecoder::new(file))
        .unpack(out.path())
        .unwrap();
    out
}

pub fn dir_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = match fs::read_dir(dir) {
        Ok(entries) => entries
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect(),
        Err(_) => Vec::new(),
    };
    names.sort();
    names
}
