//! Retrieval of published manifests
//!
//! Manifests live at `<source>/<version>/Manifest.<name>`. A release's MoM
//! names the version at which each bundle manifest was last published, so
//! looking up a bundle always goes through the MoM of the requested release.

use crate::di::RemoteFetcher;
use bundlesmith_core::core::path::MOM_NAME;
use bundlesmith_core::manifest::{self, Manifest};
use bundlesmith_core::{BundleError, BundleResult};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info};

pub struct ManifestFetcher {
    remote: Arc<dyn RemoteFetcher>,
}

impl ManifestFetcher {
    pub fn new(remote: Arc<dyn RemoteFetcher>) -> Self {
        Self { remote }
    }

    pub fn manifest_url(source: &str, version: u32, name: &str) -> String {
        format!(
            "{}/{}/Manifest.{}",
            source.trim_end_matches('/'),
            version,
            name
        )
    }

    /// Fetch and decode `Manifest.<name>` published at `version`
    pub async fn fetch(&self, source: &str, version: u32, name: &str) -> BundleResult<Manifest> {
        let url = Self::manifest_url(source, version, name);
        debug!(url = %url, "fetching manifest");

        let body = self.remote.fetch(&url).await?;
        let text = String::from_utf8(body).map_err(|e| BundleError::Fetch {
            url: url.clone(),
            reason: format!("manifest is not valid UTF-8: {}", e),
        })?;

        manifest::parse(&text).map_err(|e| BundleError::InvalidManifest {
            name: name.to_string(),
            source: Box::new(e),
        })
    }

    pub async fn fetch_mom(&self, source: &str, version: u32) -> BundleResult<Manifest> {
        self.fetch(source, version, MOM_NAME).await
    }

    /// Fetch every manifest in `names` plus everything they include, transitively
    ///
    /// Versions come from `mom`. A bundle reachable through several include
    /// chains is fetched once, and include cycles terminate.
    pub async fn resolve_includes(
        &self,
        mom: &Manifest,
        names: &[String],
        source: &str,
    ) -> BundleResult<BTreeMap<String, Manifest>> {
        let mut resolved = BTreeMap::new();
        let mut visited: BTreeSet<String> = BTreeSet::new();
        let mut worklist: Vec<(String, Option<String>)> =
            names.iter().rev().map(|name| (name.clone(), None)).collect();

        while let Some((name, included_by)) = worklist.pop() {
            if !visited.insert(name.clone()) {
                continue;
            }

            let version = mom
                .bundle_version(&name)
                .ok_or_else(|| BundleError::UnresolvedInclude {
                    name: name.clone(),
                    included_by: included_by.clone(),
                })?;

            let manifest = self.fetch(source, version, &name).await?;
            for include in manifest.includes.iter().rev() {
                if !visited.contains(include) {
                    worklist.push((include.clone(), Some(name.clone())));
                }
            }
            resolved.insert(name, manifest);
        }

        Ok(resolved)
    }

    /// Fetch the MoM at `version`, then resolve `names` against it
    pub async fn fetch_with_includes(
        &self,
        source: &str,
        version: u32,
        names: &[String],
    ) -> BundleResult<(Manifest, BTreeMap<String, Manifest>)> {
        let mom = self.fetch_mom(source, version).await?;
        let manifests = self.resolve_includes(&mom, names, source).await?;
        info!(
            source,
            version,
            count = manifests.len(),
            "resolved upstream manifests"
        );
        Ok((mom, manifests))
    }

    /// Fetch one bundle's manifest as published in release `version`,
    /// without following its includes
    pub async fn fetch_bundle(&self, source: &str, version: u32, name: &str) -> BundleResult<Manifest> {
        let mom = self.fetch_mom(source, version).await?;
        let bundle_version = mom
            .bundle_version(name)
            .ok_or_else(|| BundleError::UnresolvedInclude {
                name: name.to_string(),
                included_by: None,
            })?;
        self.fetch(source, bundle_version, name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::di::mocks::MockFetcher;
    use bundlesmith_core::manifest::{EntryKind, ManifestEntry, HASH_LEN};

    const SOURCE: &str = "https://cdn.example.com/update";

    fn hash(c: char) -> String {
        std::iter::repeat(c).take(HASH_LEN).collect()
    }

    fn bundle(version: u32, includes: &[&str]) -> String {
        let mut m = Manifest::new(30, version, 0, 1_700_000_000);
        m.includes = includes.iter().map(|s| s.to_string()).collect();
        m.insert(ManifestEntry::new("/usr", EntryKind::Directory, hash('a'), version));
        manifest::serialize(&m)
    }

    fn mom(version: u32, bundles: &[(&str, u32)]) -> String {
        let mut m = Manifest::new(30, version, 0, 1_700_000_000);
        for (name, v) in bundles {
            m.insert(ManifestEntry::new(*name, EntryKind::Manifest, hash('c'), *v));
        }
        manifest::serialize(&m)
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_manifest_url() {
        assert_eq!(
            ManifestFetcher::manifest_url("https://cdn.example.com/update/", 30, "MoM"),
            "https://cdn.example.com/update/30/Manifest.MoM"
        );
    }

    #[tokio::test]
    async fn test_fetch_with_transitive_includes() {
        let remote = MockFetcher::new();
        remote.add(
            &ManifestFetcher::manifest_url(SOURCE, 100, "MoM"),
            mom(100, &[("os-core", 80), ("editors", 100), ("libc", 90)]),
        );
        remote.add(
            &ManifestFetcher::manifest_url(SOURCE, 100, "editors"),
            bundle(100, &["libc"]),
        );
        remote.add(
            &ManifestFetcher::manifest_url(SOURCE, 90, "libc"),
            bundle(90, &["os-core"]),
        );
        remote.add(
            &ManifestFetcher::manifest_url(SOURCE, 80, "os-core"),
            bundle(80, &[]),
        );

        let fetcher = ManifestFetcher::new(Arc::new(remote.clone()));
        let (mom, manifests) = fetcher
            .fetch_with_includes(SOURCE, 100, &names(&["editors"]))
            .await
            .unwrap();

        assert_eq!(mom.format, 30);
        assert_eq!(
            manifests.keys().cloned().collect::<Vec<_>>(),
            vec!["editors", "libc", "os-core"]
        );
        assert_eq!(manifests["os-core"].version, 80);
    }

    #[tokio::test]
    async fn test_include_cycle_terminates() {
        let remote = MockFetcher::new();
        remote.add(
            &ManifestFetcher::manifest_url(SOURCE, 20, "MoM"),
            mom(20, &[("a", 20), ("b", 20)]),
        );
        remote.add(&ManifestFetcher::manifest_url(SOURCE, 20, "a"), bundle(20, &["b"]));
        remote.add(&ManifestFetcher::manifest_url(SOURCE, 20, "b"), bundle(20, &["a"]));

        let fetcher = ManifestFetcher::new(Arc::new(remote.clone()));
        let (_, manifests) = fetcher
            .fetch_with_includes(SOURCE, 20, &names(&["a", "b"]))
            .await
            .unwrap();

        assert_eq!(manifests.len(), 2);
        // MoM + one fetch per bundle
        assert_eq!(remote.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_missing_direct_include() {
        let remote = MockFetcher::new();
        remote.add(
            &ManifestFetcher::manifest_url(SOURCE, 20, "MoM"),
            mom(20, &[("os-core", 20)]),
        );

        let fetcher = ManifestFetcher::new(Arc::new(remote));
        let err = fetcher
            .fetch_with_includes(SOURCE, 20, &names(&["editors"]))
            .await
            .unwrap_err();
        match err {
            BundleError::UnresolvedInclude { name, included_by } => {
                assert_eq!(name, "editors");
                assert_eq!(included_by, None);
            }
            other => panic!("Expected unresolved include, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_nested_include_names_parent() {
        let remote = MockFetcher::new();
        remote.add(
            &ManifestFetcher::manifest_url(SOURCE, 20, "MoM"),
            mom(20, &[("editors", 20)]),
        );
        remote.add(
            &ManifestFetcher::manifest_url(SOURCE, 20, "editors"),
            bundle(20, &["ghost"]),
        );

        let fetcher = ManifestFetcher::new(Arc::new(remote));
        let err = fetcher
            .fetch_with_includes(SOURCE, 20, &names(&["editors"]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            BundleError::UnresolvedInclude { ref name, included_by: Some(ref parent) }
                if name == "ghost" && parent == "editors"
        ));
    }

    #[tokio::test]
    async fn test_fetch_failure_carries_url() {
        let fetcher = ManifestFetcher::new(Arc::new(MockFetcher::new()));
        match fetcher.fetch(SOURCE, 10, "MoM").await {
            Err(BundleError::Fetch { url, .. }) => {
                assert_eq!(url, "https://cdn.example.com/update/10/Manifest.MoM")
            }
            other => panic!("Expected fetch error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_parse_failure_is_wrapped_with_name() {
        let remote = MockFetcher::new();
        remote.add(
            &ManifestFetcher::manifest_url(SOURCE, 10, "editors"),
            "MANIFEST\t30\nversion:\t10\n\nbogus line\n",
        );

        let fetcher = ManifestFetcher::new(Arc::new(remote));
        let err = fetcher.fetch(SOURCE, 10, "editors").await.unwrap_err();
        assert!(err.is_codec_error());
        match err {
            BundleError::InvalidManifest { name, source } => {
                assert_eq!(name, "editors");
                assert!(matches!(*source, BundleError::Parse { line: 4, .. }));
            }
            other => panic!("Expected invalid manifest, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_bundle_uses_mom_version() {
        let remote = MockFetcher::new();
        remote.add(
            &ManifestFetcher::manifest_url(SOURCE, 30, "MoM"),
            mom(30, &[("editors", 20)]),
        );
        remote.add(
            &ManifestFetcher::manifest_url(SOURCE, 20, "editors"),
            bundle(20, &["os-core"]),
        );

        let fetcher = ManifestFetcher::new(Arc::new(remote.clone()));
        let manifest = fetcher.fetch_bundle(SOURCE, 30, "editors").await.unwrap();
        assert_eq!(manifest.version, 20);
        // includes are not followed
        assert_eq!(remote.requests().len(), 2);
    }
}
