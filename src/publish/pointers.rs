//! Release version pointers
//!
//! `version/format<N>/first` records the first release published in a
//! manifest format and is never rewritten. `latest` names the newest complete
//! release; it is the last file a build writes.

use bundlesmith_core::core::path::{ensure_dir, write_atomic};
use bundlesmith_core::{BundleError, BundleResult, StoreLayout};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::debug;

const FIRST: &str = "first";
const LATEST: &str = "latest";

pub struct ReleasePointers;

impl ReleasePointers {
    /// Newest format with a pointer directory, if any
    pub fn latest_format(layout: &StoreLayout) -> BundleResult<Option<u32>> {
        let root = layout.pointer_root();
        let entries = match fs::read_dir(&root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut newest = None;
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let format = name
                .to_str()
                .and_then(|n| n.strip_prefix("format"))
                .and_then(|n| n.parse::<u32>().ok());
            if let Some(format) = format {
                newest = newest.max(Some(format));
            }
        }
        Ok(newest)
    }

    /// Version named by the newest format's `latest` pointer, 0 when nothing
    /// has been published
    pub fn latest(layout: &StoreLayout) -> BundleResult<u32> {
        let Some(format) = Self::latest_format(layout)? else {
            return Ok(0);
        };
        Ok(read_pointer(&layout.pointer_dir(format).join(LATEST))?.unwrap_or(0))
    }

    pub fn first(layout: &StoreLayout, format: u32) -> BundleResult<Option<u32>> {
        read_pointer(&layout.pointer_dir(format).join(FIRST))
    }

    /// Record `version` as published in `format`
    pub fn write(layout: &StoreLayout, format: u32, version: u32) -> BundleResult<()> {
        let dir = layout.pointer_dir(format);
        ensure_dir(&dir)?;

        let first = dir.join(FIRST);
        if !first.exists() {
            write_atomic(&first, version.to_string().as_bytes())?;
        }
        write_atomic(&dir.join(LATEST), version.to_string().as_bytes())?;
        debug!(format, version, "updated release pointers");
        Ok(())
    }
}

fn read_pointer(path: &Path) -> BundleResult<Option<u32>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    content
        .trim()
        .parse()
        .map(Some)
        .map_err(|_| BundleError::Publish(format!("Invalid version pointer {}: {:?}", path.display(), content)))
}
