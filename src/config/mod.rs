use bundlesmith_core::core::path::MOM_NAME;
use bundlesmith_core::{BundleError, BundleResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Build configuration, read once from a TOML file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    pub upstream: UpstreamConfig,
    pub bundle: BundleConfig,
    pub signing: SigningConfig,
    #[serde(default)]
    pub build: BuildOptions,
}

/// Upstream release the bundle is layered on
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Base URL of the upstream update content (`<url>/<version>/Manifest.<name>`)
    pub url: String,
    pub version: u32,
}

/// The bundle being published
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleConfig {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Upstream bundles this bundle builds on
    #[serde(default)]
    pub includes: Vec<String>,
    /// URL clients will fetch this bundle's content from
    #[serde(default)]
    pub url: String,
    /// Binaries the bundle exports to clients
    #[serde(default)]
    pub bin: Vec<String>,
}

/// Key material for signing the MoM
///
/// Relative paths are resolved against the directory of the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SigningConfig {
    pub certificate: PathBuf,
    pub private_key: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HasherKind {
    /// In-process SHA-256 digest
    #[default]
    Builtin,
    /// `swupd hashdump`
    Swupd,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildOptions {
    /// Seconds before a single diff is abandoned
    #[serde(default = "default_diff_timeout_secs")]
    pub diff_timeout_secs: u64,

    /// Worker pool width; defaults to the available parallelism
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jobs: Option<usize>,

    #[serde(default)]
    pub hasher: HasherKind,
}

fn default_diff_timeout_secs() -> u64 {
    10
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            diff_timeout_secs: default_diff_timeout_secs(),
            jobs: None,
            hasher: HasherKind::default(),
        }
    }
}

impl BuildOptions {
    pub fn diff_timeout(&self) -> Duration {
        Duration::from_secs(self.diff_timeout_secs)
    }

    pub fn jobs(&self) -> usize {
        self.jobs.filter(|&n| n > 0).unwrap_or_else(default_jobs)
    }
}

/// Default width of the hashing and artifact worker pools
pub fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

/// The subset of the configuration shipped inside the bundle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserConfig {
    pub bundle: BundleConfig,
}

impl BuildConfig {
    /// Load and validate the config at `path`
    pub fn load(path: &Path) -> BundleResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            BundleError::Config(format!("Unable to read {}: {}", path.display(), e))
        })?;
        let mut config = Self::from_toml_str(&content)?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        config.signing.certificate = resolve(base, &config.signing.certificate);
        config.signing.private_key = resolve(base, &config.signing.private_key);
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> BundleResult<Self> {
        let config: BuildConfig = toml::from_str(content)
            .map_err(|e| BundleError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> BundleResult<()> {
        let name = self.bundle.name.as_str();
        if name.trim().is_empty() {
            return Err(BundleError::Config("bundle.name must not be empty".to_string()));
        }
        if name == MOM_NAME {
            return Err(BundleError::Config(format!(
                "bundle.name '{}' is reserved",
                MOM_NAME
            )));
        }
        if name.contains('/') || name.chars().any(char::is_whitespace) {
            return Err(BundleError::Config(format!(
                "bundle.name '{}' must not contain '/' or whitespace",
                name
            )));
        }
        if self.bundle.includes.iter().any(|include| include == name) {
            return Err(BundleError::Config(format!(
                "Bundle '{}' cannot include itself",
                name
            )));
        }
        if self.upstream.url.trim().is_empty() {
            return Err(BundleError::Config("upstream.url must not be empty".to_string()));
        }
        Ok(())
    }

    /// Configuration written into the chroot as `usr/user-config.toml`
    pub fn user_config(&self) -> UserConfig {
        UserConfig {
            bundle: self.bundle.clone(),
        }
    }
}

impl UserConfig {
    pub fn to_toml(&self) -> BundleResult<String> {
        toml::to_string(self)
            .map_err(|e| BundleError::Config(format!("Failed to serialize user config: {}", e)))
    }
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
