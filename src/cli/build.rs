use bundlesmith::config::BuildConfig;
use bundlesmith::di::ServiceContainer;
use bundlesmith::pipeline::{build_release, BuildSummary};
use bundlesmith_core::BundleResult;
use std::path::Path;

pub async fn run(statedir: &Path, chrootdir: &Path, config_path: &Path) -> BundleResult<()> {
    let config = BuildConfig::load(config_path)?;
    let services = ServiceContainer::new(&config)?;
    let bundle = config.bundle.name.clone();

    println!("Building bundle {}...", bundle);
    let summary = build_release(config, statedir, chrootdir, services).await?;
    print_summary(&bundle, &summary);
    Ok(())
}

fn print_summary(bundle: &str, summary: &BuildSummary) {
    println!(
        "✓ Published {} release {} (previous {}, format {})",
        bundle, summary.version, summary.previous, summary.format
    );
    println!(
        "  {} entries, {} changed in this release",
        summary.entries, summary.changed
    );
    if !summary.upstream_bundles.is_empty() {
        println!("  upstream: {}", summary.upstream_bundles.join(", "));
    }
    println!(
        "  {} fullfile(s), {} delta(s) created",
        summary.artifacts.fullfiles_created, summary.artifacts.deltas_created
    );
    for failure in &summary.artifacts.delta_failures {
        println!("  ⚠ no delta for {}: {}", failure.path, failure.reason);
    }
    for pack in &summary.packs {
        let state = if pack.created { "created" } else { "kept" };
        println!(
            "  ✓ {} {} ({} staged, {} delta)",
            state,
            pack.path.display(),
            pack.fullfiles,
            pack.deltas
        );
    }
}
