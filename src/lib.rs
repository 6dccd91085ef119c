//! Bundlesmith: incremental, content-addressed bundle releases
//!
//! This crate builds on `bundlesmith-core` (error type, store layout and the
//! manifest codec) with the release pipeline: fetching upstream manifests,
//! scanning a content tree, reconciling versions, building fullfiles, deltas
//! and packs, and publishing signed releases.

pub use bundlesmith_core::{
    BundleError, BundleResult, EntryKind, Manifest, ManifestEntry, StoreLayout, ZERO_HASH,
};

/// Build configuration.
pub mod config;

/// Dependency injection infrastructure.
pub mod di;

/// Production collaborators (hashing, diffing, archiving, signing, fetching).
pub mod tools;

/// Manifest retrieval and include resolution.
pub mod fetch;

/// Content tree scanning.
pub mod scan;

/// Version reconciliation against the previous release.
pub mod reconcile;

/// Fullfile and delta artifacts.
pub mod artifact;

/// Pack assembly.
pub mod pack;

/// Manifest, MoM and pointer publication.
pub mod publish;

/// Release build orchestration.
pub mod pipeline;
