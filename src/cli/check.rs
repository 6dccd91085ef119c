use bundlesmith_core::manifest;
use bundlesmith_core::{BundleError, BundleResult};
use std::fs;
use std::path::Path;

/// Parse a manifest file and, with `strict`, require it to be in canonical form
pub fn run(path: &Path, strict: bool) -> BundleResult<()> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let raw = fs::read_to_string(path)?;

    let parsed = manifest::parse(&raw).map_err(|e| BundleError::InvalidManifest {
        name: name.clone(),
        source: Box::new(e),
    })?;

    println!(
        "✓ {}: format {}, version {}, {} entries",
        name,
        parsed.format,
        parsed.version,
        parsed.file_count()
    );

    let canonical = manifest::serialize(&parsed);
    if let Some((line, content)) = first_difference(&raw, &canonical) {
        if strict {
            return Err(BundleError::InvalidManifest {
                name,
                source: Box::new(BundleError::Parse { line, content }),
            });
        }
        println!("  ⚠ not in canonical form (first difference at line {})", line);
    }
    Ok(())
}

/// First 1-based line where `raw` departs from `canonical`
fn first_difference(raw: &str, canonical: &str) -> Option<(usize, String)> {
    let mut raw_lines = raw.lines();
    let mut canonical_lines = canonical.lines();
    let mut line = 0;
    loop {
        line += 1;
        match (raw_lines.next(), canonical_lines.next()) {
            (None, None) => return None,
            (Some(a), Some(b)) if a == b => continue,
            (Some(a), _) => return Some((line, a.to_string())),
            (None, Some(_)) => return Some((line, String::new())),
        }
    }
}
