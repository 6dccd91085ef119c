//! Manifest text format
//!
//! ```text
//! MANIFEST\t<format>
//! version:\t<version>
//! previous:\t<previous>
//! minversion:\t<min>          (optional)
//! filecount:\t<count>
//! timestamp:\t<epoch>
//! contentsize:\t<bytes>
//! includes:\t<bundle>         (zero or more)
//!
//! <flags>\t<hash>\t<version>\t<path>
//! ```
//!
//! Serialization is byte-stable: includes are sorted by name and entries by
//! `(version, path)`, so identical logical content always yields identical text.

use super::{EntryKind, Manifest, ManifestEntry, HASH_LEN};
use crate::core::error::{BundleError, BundleResult};
use std::fmt::Write;
use std::str::FromStr;
use tracing::{debug, warn};

const FILE_SECTION: &str = "file section";

#[derive(Default)]
struct HeaderState {
    saw_format: bool,
    saw_version: bool,
    file_count: Option<usize>,
}

/// Parse manifest text
pub fn parse(raw: &str) -> BundleResult<Manifest> {
    let mut manifest = Manifest::default();
    let mut header = HeaderState::default();
    let mut in_entries = false;

    for (idx, line) in raw.lines().enumerate() {
        let line_no = idx + 1;
        if !in_entries {
            if line.is_empty() {
                in_entries = true;
                continue;
            }
            parse_header_line(line, line_no, &mut manifest, &mut header)?;
            continue;
        }

        if line.is_empty() {
            continue;
        }
        let entry = parse_entry_line(line, line_no)?;
        if manifest.entries.contains_key(&entry.path) {
            return Err(parse_error(line_no, line));
        }
        manifest.insert(entry);
    }

    if !header.saw_format {
        return Err(BundleError::MissingSection("MANIFEST header".to_string()));
    }
    if !header.saw_version {
        return Err(BundleError::MissingSection("version header".to_string()));
    }
    if manifest.entries.is_empty() {
        return Err(BundleError::MissingSection(FILE_SECTION.to_string()));
    }

    if let Some(declared) = header.file_count {
        if declared != manifest.file_count() {
            warn!(
                declared,
                actual = manifest.file_count(),
                version = manifest.version,
                "manifest filecount header does not match its entries"
            );
        }
    }

    Ok(manifest)
}

fn parse_header_line(
    line: &str,
    line_no: usize,
    manifest: &mut Manifest,
    header: &mut HeaderState,
) -> BundleResult<()> {
    let (key, value) = line
        .split_once('\t')
        .ok_or_else(|| parse_error(line_no, line))?;

    match key {
        "MANIFEST" => {
            manifest.format = parse_number(value, line_no, line)?;
            header.saw_format = true;
        }
        "version:" => {
            manifest.version = parse_number(value, line_no, line)?;
            header.saw_version = true;
        }
        "previous:" => manifest.previous = parse_number(value, line_no, line)?,
        "minversion:" => manifest.min_version = Some(parse_number(value, line_no, line)?),
        "filecount:" => header.file_count = Some(parse_number(value, line_no, line)?),
        "timestamp:" => manifest.timestamp = parse_number(value, line_no, line)?,
        "contentsize:" => manifest.content_size = parse_number(value, line_no, line)?,
        // Older writers emitted the key without its colon
        "includes:" | "includes" => {
            if value.is_empty() {
                return Err(parse_error(line_no, line));
            }
            manifest.includes.insert(value.to_string());
        }
        _ => debug!(line = line_no, key, "skipping unknown manifest header"),
    }
    Ok(())
}

fn parse_entry_line(line: &str, line_no: usize) -> BundleResult<ManifestEntry> {
    let fields: Vec<&str> = line.split('\t').collect();
    let [flags, hash, version, path] = fields[..] else {
        return Err(parse_error(line_no, line));
    };

    let flag_chars: Vec<char> = flags.chars().collect();
    let [kind, first, boot, last] = flag_chars[..] else {
        return Err(parse_error(line_no, line));
    };
    let kind = EntryKind::from_flag(kind).ok_or_else(|| parse_error(line_no, line))?;
    let boot = match boot {
        'b' => true,
        '.' => false,
        _ => return Err(parse_error(line_no, line)),
    };
    if first.is_whitespace() || last.is_whitespace() {
        return Err(parse_error(line_no, line));
    }

    if hash.len() != HASH_LEN || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(parse_error(line_no, line));
    }
    if path.is_empty() {
        return Err(parse_error(line_no, line));
    }

    Ok(ManifestEntry {
        path: path.to_string(),
        kind,
        boot,
        modifiers: [first, last],
        hash: hash.to_string(),
        version: parse_number(version, line_no, line)?,
    })
}

fn parse_number<T: FromStr>(value: &str, line_no: usize, line: &str) -> BundleResult<T> {
    value.trim().parse().map_err(|_| parse_error(line_no, line))
}

fn parse_error(line_no: usize, line: &str) -> BundleError {
    BundleError::Parse {
        line: line_no,
        content: line.to_string(),
    }
}

/// Serialize a manifest to its canonical text form
pub fn serialize(manifest: &Manifest) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail
    let _ = writeln!(out, "MANIFEST\t{}", manifest.format);
    let _ = writeln!(out, "version:\t{}", manifest.version);
    let _ = writeln!(out, "previous:\t{}", manifest.previous);
    if let Some(min_version) = manifest.min_version {
        let _ = writeln!(out, "minversion:\t{}", min_version);
    }
    let _ = writeln!(out, "filecount:\t{}", manifest.file_count());
    let _ = writeln!(out, "timestamp:\t{}", manifest.timestamp);
    let _ = writeln!(out, "contentsize:\t{}", manifest.content_size);
    for include in &manifest.includes {
        let _ = writeln!(out, "includes:\t{}", include);
    }
    out.push('\n');
    for entry in manifest.sorted_entries() {
        let _ = writeln!(out, "{}", entry);
    }
    out
}
