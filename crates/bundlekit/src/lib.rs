pub use bundlekit::*;
pub use bundlekit_filesystem as file_system;
pub use error::*;

pub mod bundlekit;
pub mod compress_jobs;
pub mod config;
pub mod manifest;

mod error;

#[cfg(test)]
mod test_utils;
