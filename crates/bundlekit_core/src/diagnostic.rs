use std::fmt::Display;
use std::fmt::Formatter;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

/// This is a user facing error for bundlekit.
///
/// Diagnostics describe recoverable problems (a failed compression job, a
/// missing dependency) that do not stop the build but should be surfaced to
/// whoever runs it.
#[derive(Error, Debug, Deserialize, PartialEq, Serialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
  /// A summary user-facing message
  pub message: String,

  /// Indicates where this diagnostic was emitted from, e.g. a backend or tool name
  pub origin: Option<String>,

  /// The asset this diagnostic relates to
  pub asset_id: Option<String>,

  /// Hints for the user
  pub hints: Option<Vec<String>>,
}

impl Display for Diagnostic {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match &self.origin {
      Some(origin) => write!(f, "[{}] {}", origin, self.message),
      None => f.write_str(&self.message),
    }
  }
}

impl Diagnostic {
  pub fn new(message: impl Into<String>) -> Self {
    Self {
      message: message.into(),
      ..Default::default()
    }
  }

  pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
    self.origin = Some(origin.into());
    self
  }

  pub fn with_asset(mut self, asset_id: impl Display) -> Self {
    self.asset_id = Some(asset_id.to_string());
    self
  }

  pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
    self.hints.get_or_insert_with(Vec::new).push(hint.into());
    self
  }
}

#[macro_export]
macro_rules! diagnostic_error {
  ($($arg:tt)*) => {
    ::anyhow::Error::new($crate::diagnostic::Diagnostic::new(format!($($arg)*)))
  };
}
