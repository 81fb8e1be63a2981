use thiserror::Error;

use crate::diagnostic::Diagnostic;
use crate::types::AssetId;

pub type BundlekitResult<T> = std::result::Result<T, BundlekitError>;

/// Bundle configuration problems.
///
/// Only [`ConfigError::InvalidBundleConfig`] stops a build; the other variants
/// are reported as warnings by the bundle graph builder and recovered from.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
  #[error("No bundles could be resolved from the bundle configuration: {0}")]
  InvalidBundleConfig(String),

  #[error("Bundle name \"{name}\" is already in use, renamed to \"{renamed}\"")]
  DuplicateBundleName { name: String, renamed: String },

  #[error("Invalid bundle declaration at index {index}: {reason}")]
  InvalidDeclaration { index: usize, reason: String },
}

#[derive(Error, Debug)]
pub enum BundlekitError {
  #[error(transparent)]
  Config(#[from] ConfigError),

  #[error("Asset {missing} referenced by {referenced_by} could not be found")]
  MissingAsset {
    missing: AssetId,
    referenced_by: String,
  },

  #[error("Texture compression failed: {0}")]
  CompressionJob(Diagnostic),

  #[error("Compression cache could not be read, starting from an empty cache: {0}")]
  CacheCorruption(String),

  #[error("The build was cancelled")]
  Cancelled,

  #[error("{}", .0)]
  Unknown(anyhow::Error),
}

impl BundlekitError {
  /// Whether this error must stop the build instead of being logged.
  pub fn is_fatal(&self) -> bool {
    matches!(
      self,
      BundlekitError::Config(ConfigError::InvalidBundleConfig(_)) | BundlekitError::Cancelled
    )
  }
}
