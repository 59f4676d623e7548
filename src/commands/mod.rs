//! What gets written for the KMI symbols once the file has been validated.
pub mod dump;
pub mod format;

pub use dump::*;
pub use format::*;
