//! Core types shared by the Bundlesmith release builder
//!
//! This crate holds the pieces every stage shares: the error type,
//! the release store layout, and the manifest model with its text codec.

pub mod core;
pub mod manifest;

pub use crate::core::error::{format_error, BundleError, BundleResult};
pub use crate::core::path::StoreLayout;
pub use crate::manifest::{EntryKind, Manifest, ManifestEntry, ZERO_HASH};
