use std::path::PathBuf;

use bundlekit_core::diagnostic::Diagnostic;
use bundlekit_core::types::AssetId;
use serde::Deserialize;
use serde::Serialize;

use crate::format::CompressFormat;
use crate::format::FormatOptions;

/// One texture to encode into one output format.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressJob {
  pub asset_id: AssetId,
  pub source_path: PathBuf,
  pub dest_path: PathBuf,
  pub options: FormatOptions,

  /// Pre-scaled mip levels to pack into the output, when the tool supports it
  #[serde(default)]
  pub mipmap_sources: Vec<PathBuf>,
}

impl CompressJob {
  pub fn new(
    asset_id: impl Into<AssetId>,
    source_path: impl Into<PathBuf>,
    dest_path: impl Into<PathBuf>,
    options: FormatOptions,
  ) -> Self {
    CompressJob {
      asset_id: asset_id.into(),
      source_path: source_path.into(),
      dest_path: dest_path.into(),
      options,
      mipmap_sources: Vec::new(),
    }
  }

  pub fn format(&self) -> CompressFormat {
    self.options.format()
  }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
  Cached,
  Queued,
  Running,
  Done,
  Failed,
}

/// A job state transition, sent to progress listeners.
#[derive(Clone, Debug, PartialEq)]
pub struct JobEvent {
  pub asset_id: AssetId,
  pub format: CompressFormat,
  pub state: JobState,

  /// Jobs that reached a terminal state so far
  pub completed: usize,
  pub total: usize,
}

/// The final state of a job.
#[derive(Clone, Debug, PartialEq)]
pub struct JobOutcome {
  pub asset_id: AssetId,
  pub format: CompressFormat,
  pub dest_path: PathBuf,
  pub state: JobState,
  pub diagnostic: Option<Diagnostic>,
}
