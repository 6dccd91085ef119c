//! Release manifests
//!
//! A manifest lists every filesystem entry of a bundle at one release. The
//! manifest-of-manifests (MoM) uses the same structure, with one entry per
//! bundle pointing at that bundle's manifest hash and version.

pub mod codec;

pub use codec::{parse, serialize};

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Hash value marking an absent or deleted entry
pub const ZERO_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Length of a hex content digest
pub const HASH_LEN: usize = 64;

/// Release numbers advance by this step on every build
pub const RELEASE_STEP: u32 = 10;

/// Subtrees whose entries carry the boot flag
pub const BOOT_SUBTREES: [&str; 2] = ["/usr/lib/kernel", "/usr/lib/modules"];

/// Type of object a manifest entry describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    File,
    Directory,
    Symlink,
    /// A bundle manifest referenced from a MoM
    Manifest,
    /// An iterative manifest referenced from a MoM
    IterativeManifest,
}

impl EntryKind {
    pub fn from_flag(flag: char) -> Option<Self> {
        match flag {
            'F' => Some(EntryKind::File),
            'D' => Some(EntryKind::Directory),
            'L' => Some(EntryKind::Symlink),
            'M' => Some(EntryKind::Manifest),
            'I' => Some(EntryKind::IterativeManifest),
            _ => None,
        }
    }

    pub fn flag(self) -> char {
        match self {
            EntryKind::File => 'F',
            EntryKind::Directory => 'D',
            EntryKind::Symlink => 'L',
            EntryKind::Manifest => 'M',
            EntryKind::IterativeManifest => 'I',
        }
    }
}

/// True when `path` lies below one of the boot subtrees
pub fn is_boot_path(path: &str) -> bool {
    BOOT_SUBTREES.iter().any(|root| {
        path.strip_prefix(root)
            .is_some_and(|rest| rest.starts_with('/') && rest.len() > 1)
    })
}

/// One filesystem object (or, inside a MoM, one bundle manifest)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub path: String,
    pub kind: EntryKind,
    pub boot: bool,
    /// Flag positions 1 and 3, kept verbatim
    pub modifiers: [char; 2],
    pub hash: String,
    pub version: u32,
}

impl ManifestEntry {
    pub fn new(path: impl Into<String>, kind: EntryKind, hash: impl Into<String>, version: u32) -> Self {
        let path = path.into();
        let boot = matches!(
            kind,
            EntryKind::File | EntryKind::Directory | EntryKind::Symlink
        ) && is_boot_path(&path);
        Self {
            path,
            kind,
            boot,
            modifiers: ['.', '.'],
            hash: hash.into(),
            version,
        }
    }

    /// Render the four-character flag field
    pub fn flags(&self) -> String {
        let mut flags = String::with_capacity(4);
        flags.push(self.kind.flag());
        flags.push(self.modifiers[0]);
        flags.push(if self.boot { 'b' } else { '.' });
        flags.push(self.modifiers[1]);
        flags
    }

    pub fn is_deleted(&self) -> bool {
        self.hash == ZERO_HASH
    }

    pub fn is_regular_file(&self) -> bool {
        self.kind == EntryKind::File
    }
}

impl fmt::Display for ManifestEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}",
            self.flags(),
            self.hash,
            self.version,
            self.path
        )
    }
}

/// A bundle's listing at one release
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Manifest {
    pub format: u32,
    pub version: u32,
    /// Prior release, 0 when there is none
    pub previous: u32,
    pub min_version: Option<u32>,
    pub timestamp: i64,
    pub content_size: u64,
    pub includes: BTreeSet<String>,
    pub entries: BTreeMap<String, ManifestEntry>,
}

impl Manifest {
    pub fn new(format: u32, version: u32, previous: u32, timestamp: i64) -> Self {
        Self {
            format,
            version,
            previous,
            timestamp,
            ..Default::default()
        }
    }

    /// Build a MoM pointing at a single bundle manifest
    pub fn mom(
        format: u32,
        version: u32,
        previous: u32,
        timestamp: i64,
        bundle: &str,
        manifest_hash: &str,
    ) -> Self {
        let mut mom = Self::new(format, version, previous, timestamp);
        mom.insert(ManifestEntry::new(
            bundle,
            EntryKind::Manifest,
            manifest_hash,
            version,
        ));
        mom
    }

    pub fn file_count(&self) -> usize {
        self.entries.len()
    }

    /// Insert an entry, replacing any entry with the same path
    pub fn insert(&mut self, entry: ManifestEntry) -> Option<ManifestEntry> {
        self.entries.insert(entry.path.clone(), entry)
    }

    pub fn get(&self, path: &str) -> Option<&ManifestEntry> {
        self.entries.get(path)
    }

    /// Version of `bundle`'s manifest as listed in a MoM
    pub fn bundle_version(&self, bundle: &str) -> Option<u32> {
        self.entries
            .get(bundle)
            .filter(|e| {
                matches!(
                    e.kind,
                    EntryKind::Manifest | EntryKind::IterativeManifest
                )
            })
            .map(|e| e.version)
    }

    /// Entries whose content is introduced by this release
    pub fn changed_entries(&self) -> impl Iterator<Item = &ManifestEntry> {
        let version = self.version;
        self.entries
            .values()
            .filter(move |e| e.version == version && !e.is_deleted())
    }

    /// Entries in canonical serialization order: `(version, path)`
    pub fn sorted_entries(&self) -> Vec<&ManifestEntry> {
        let mut entries: Vec<&ManifestEntry> = self.entries.values().collect();
        entries.sort_by(|a, b| (a.version, &a.path).cmp(&(b.version, &b.path)));
        entries
    }
}
