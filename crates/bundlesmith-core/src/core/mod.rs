pub mod error;
pub mod path;

pub use error::{format_error, BundleError, BundleResult};
