//! Production implementations of the collaborator traits

pub mod archive;
pub mod bsdiff;
pub mod hasher;
pub mod http;
pub mod signer;

pub use archive::TarArchiver;
pub use bsdiff::BsdiffTool;
pub use hasher::{CommandHasher, Sha256Hasher};
pub use http::HttpFetcher;
pub use signer::OpensslSigner;
