//! Release pipeline scenarios

use super::common::{dir_names, unpack, Harness};
use bundlesmith::artifact::{ArtifactPlanner, ArtifactStore, DeltaKey};
use bundlesmith::di::mocks::{DiffMode, MockDeltaTool, MockSigner};
use bundlesmith::pack::{PackAssembler, PackOrigin};
use bundlesmith::pipeline::build_release;
use bundlesmith::publish::ReleasePointers;
use bundlesmith::BundleError;
use std::collections::BTreeSet;
use std::fs;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_first_release() {
    let harness = Harness::new();
    let summary = harness.build(MockDeltaTool::new()).await.unwrap();
    let layout = harness.layout();

    assert_eq!(summary.version, 10);
    assert_eq!(summary.previous, 0);
    assert_eq!(summary.format, 30);
    assert_eq!(summary.upstream_bundles, vec!["os-core"]);

    let manifest = harness.published_manifest(10);
    assert_eq!(manifest.previous, 0);
    assert!(manifest.includes.is_empty());
    assert!(manifest.entries.values().all(|e| e.version == 10));
    for path in [
        "/usr/bin/tool",
        "/usr/bin/tool-alias",
        "/usr/lib/os-release",
        "/usr/share/clear/bundles/editors",
        "/usr/share/clear/update-ca/Swupd_Root.pem",
        "/usr/user-config.toml",
    ] {
        assert!(manifest.get(path).is_some(), "missing {}", path);
    }

    for entry in manifest.entries.values() {
        assert!(layout.fullfile_path(10, &entry.hash).is_file());
    }
    assert!(dir_names(&layout.delta_dir(10)).is_empty());

    let packs: Vec<String> = dir_names(&layout.release_dir(10))
        .into_iter()
        .filter(|n| n.starts_with("pack-"))
        .collect();
    assert_eq!(packs, vec!["pack-editors-from-0.tar"]);

    assert!(layout.release_dir(10).join("Manifest.MoM.sig").is_file());
    assert!(layout.release_dir(10).join("Swupd_Root.pem").is_file());
    assert!(layout.release_dir(10).join("user-config.toml").is_file());
    assert_eq!(ReleasePointers::latest(&layout).unwrap(), 10);
    assert_eq!(ReleasePointers::first(&layout, 30).unwrap(), Some(10));
}

#[tokio::test]
async fn test_second_release_with_one_changed_file() {
    let harness = Harness::new();
    harness.build(MockDeltaTool::new()).await.unwrap();
    let first = harness.published_manifest(10);

    fs::write(harness.chroot.join("usr/bin/tool"), b"tool version two\n").unwrap();
    let summary = harness.build(MockDeltaTool::new()).await.unwrap();
    let layout = harness.layout();
    assert_eq!(summary.version, 20);
    assert_eq!(summary.previous, 10);

    let second = harness.published_manifest(20);
    assert_eq!(second.previous, 10);

    // The tool and the stamped os-release are the only new content
    let changed: Vec<&str> = second.changed_entries().map(|e| e.path.as_str()).collect();
    assert_eq!(changed, vec!["/usr/bin/tool", "/usr/lib/os-release"]);
    assert_eq!(second.get("/usr/share/doc/README").unwrap().version, 10);
    assert_eq!(second.get("/usr/bin/tool-alias").unwrap().version, 10);

    let expected_deltas: BTreeSet<String> = changed
        .iter()
        .map(|path| {
            DeltaKey::between(first.get(path).unwrap(), second.get(path).unwrap()).to_string()
        })
        .collect();
    let deltas: BTreeSet<String> = dir_names(&layout.delta_dir(20)).into_iter().collect();
    assert_eq!(deltas, expected_deltas);

    let from_previous = unpack(&layout.pack_path(20, "editors", 10));
    let packed: BTreeSet<String> = dir_names(&from_previous.path().join("delta"))
        .into_iter()
        .collect();
    assert_eq!(packed, expected_deltas);
    assert!(dir_names(&from_previous.path().join("staged")).is_empty());

    assert!(layout.pack_path(20, "editors", 0).is_file());
    assert_eq!(ReleasePointers::latest(&layout).unwrap(), 20);
    assert_eq!(ReleasePointers::first(&layout, 30).unwrap(), Some(10));
}

#[tokio::test]
async fn test_scratch_pack_is_complete() {
    let harness = Harness::new();
    harness.build(MockDeltaTool::new()).await.unwrap();
    fs::write(harness.chroot.join("usr/bin/tool"), b"tool version two\n").unwrap();
    harness.build(MockDeltaTool::new()).await.unwrap();

    let manifest = harness.published_manifest(20);
    let pack = unpack(&harness.layout().pack_path(20, "editors", 0));

    let staged: BTreeSet<String> = dir_names(&pack.path().join("staged")).into_iter().collect();
    let expected: BTreeSet<String> = manifest
        .entries
        .values()
        .filter(|e| !e.is_deleted())
        .map(|e| e.hash.clone())
        .collect();
    assert_eq!(staged, expected);
    assert!(dir_names(&pack.path().join("delta")).is_empty());
}

#[tokio::test]
async fn test_failed_diffs_fall_back_to_fullfiles() {
    let harness = Harness::new();
    harness.build(MockDeltaTool::new()).await.unwrap();
    fs::write(harness.chroot.join("usr/bin/tool"), b"tool version two\n").unwrap();

    let summary = harness
        .build(MockDeltaTool::with_mode(DiffMode::TimeOut))
        .await
        .unwrap();
    let layout = harness.layout();
    assert_eq!(summary.artifacts.deltas_created, 0);
    assert_eq!(summary.artifacts.delta_failures.len(), 2);
    assert!(dir_names(&layout.delta_dir(20)).is_empty());

    let second = harness.published_manifest(20);
    let tool = second.get("/usr/bin/tool").unwrap();
    let pack = unpack(&layout.pack_path(20, "editors", 10));
    let staged = dir_names(&pack.path().join("staged"));
    assert!(staged.contains(&tool.hash));
    assert_eq!(
        fs::read(pack.path().join("staged").join(&tool.hash)).unwrap(),
        b"tool version two\n"
    );
}

#[tokio::test]
async fn test_rerunning_artifact_stages_creates_nothing() {
    let harness = Harness::new();
    harness.build(MockDeltaTool::new()).await.unwrap();
    fs::write(harness.chroot.join("usr/bin/tool"), b"tool version two\n").unwrap();
    harness.build(MockDeltaTool::new()).await.unwrap();

    let first = harness.published_manifest(10);
    let second = harness.published_manifest(20);
    let layout = harness.layout();
    let pack_before = fs::read(layout.pack_path(20, "editors", 10)).unwrap();

    let services = harness.services(MockDeltaTool::new());
    let store = ArtifactStore::new();
    let planner = ArtifactPlanner::new(
        layout.clone(),
        &services,
        store.clone(),
        Duration::from_secs(10),
        2,
    );
    let report = planner
        .plan_and_build(&second, Some(&first), &harness.chroot)
        .await
        .unwrap();
    assert_eq!(report.fullfiles_created, 0);
    assert_eq!(report.deltas_created, 0);

    let assembler = PackAssembler::new(layout.clone(), Arc::clone(&services.archiver), store);
    let pack = assembler
        .assemble(&second, PackOrigin::Release(&first), "editors")
        .await
        .unwrap();
    assert!(!pack.created);
    assert_eq!(fs::read(layout.pack_path(20, "editors", 10)).unwrap(), pack_before);
}

#[tokio::test]
async fn test_unresolved_include_aborts_before_writing() {
    let harness = Harness::new();
    let result = build_release(
        harness.config(&["os-core", "ghost"]),
        &harness.statedir,
        &harness.chroot,
        harness.services(MockDeltaTool::new()),
    )
    .await;

    assert!(matches!(
        result,
        Err(BundleError::UnresolvedInclude { ref name, .. }) if name == "ghost"
    ));
    assert!(!harness.layout().release_dir(10).exists());
    assert_eq!(ReleasePointers::latest(&harness.layout()).unwrap(), 0);
}

#[tokio::test]
async fn test_signing_failure_keeps_previous_release_current() {
    let mut harness = Harness::new();
    harness.build(MockDeltaTool::new()).await.unwrap();

    harness.signer = MockSigner::failing();
    fs::write(harness.chroot.join("usr/bin/tool"), b"tool version two\n").unwrap();
    let result = harness.build(MockDeltaTool::new()).await;

    assert!(matches!(result, Err(BundleError::Sign(_))));
    assert_eq!(ReleasePointers::latest(&harness.layout()).unwrap(), 10);
}

#[tokio::test]
async fn test_retry_after_failed_signing_rebuilds_packs() {
    let mut harness = Harness::new();
    harness.build(MockDeltaTool::new()).await.unwrap();
    let first = harness.published_manifest(10);

    harness.signer = MockSigner::failing();
    fs::write(harness.chroot.join("usr/bin/tool"), b"abandoned edit\n").unwrap();
    assert!(harness.build(MockDeltaTool::new()).await.is_err());
    let layout = harness.layout();
    assert!(layout.pack_path(20, "editors", 10).is_file());

    let cert = harness.temp.path().join("Swupd_Root.pem");
    harness.signer = MockSigner::new().with_certificate(cert);
    fs::write(harness.chroot.join("usr/bin/tool"), b"tool version two\n").unwrap();
    let summary = harness.build(MockDeltaTool::new()).await.unwrap();
    assert_eq!(summary.version, 20);
    assert!(summary.packs.iter().all(|p| p.created));

    let second = harness.published_manifest(20);
    let tool = second.get("/usr/bin/tool").unwrap();

    let expected_deltas: BTreeSet<String> = second
        .changed_entries()
        .map(|e| DeltaKey::between(first.get(&e.path).unwrap(), e).to_string())
        .collect();
    let from_previous = unpack(&layout.pack_path(20, "editors", 10));
    let packed: BTreeSet<String> = dir_names(&from_previous.path().join("delta"))
        .into_iter()
        .collect();
    assert_eq!(packed, expected_deltas);

    let scratch = unpack(&layout.pack_path(20, "editors", 0));
    assert_eq!(
        fs::read(scratch.path().join("staged").join(&tool.hash)).unwrap(),
        b"tool version two\n"
    );
    assert_eq!(ReleasePointers::latest(&layout).unwrap(), 20);
}

#[tokio::test]
async fn test_previous_release_read_from_local_store() {
    let harness = Harness::new();
    harness.build(MockDeltaTool::new()).await.unwrap();
    harness.build(MockDeltaTool::new()).await.unwrap();

    let local: Vec<String> = harness
        .fetcher
        .requests()
        .into_iter()
        .filter(|url| url.starts_with("file://"))
        .collect();
    assert_eq!(local.len(), 2);
    assert!(local[0].ends_with("/www/update/10/Manifest.MoM"));
    assert!(local[1].ends_with("/www/update/10/Manifest.editors"));
}
