//! Release publication

pub mod pointers;
pub mod publisher;

pub use pointers::ReleasePointers;
pub use publisher::{PublishedRelease, ReleasePublisher, CERTIFICATE_NAME};
