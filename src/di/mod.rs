//! Dependency injection for external collaborators
//!
//! [`ServiceContainer`] bundles trait objects for every tool a release build
//! needs. Production builds use [`ServiceContainer::new`]; tests assemble one
//! from [`mocks`] with [`ServiceContainer::with_providers`].

pub mod container;
pub mod mocks;
pub mod traits;

pub use container::ServiceContainer;
pub use traits::{Archiver, ContentHasher, DeltaTool, DiffOutcome, RemoteFetcher, Signer};
