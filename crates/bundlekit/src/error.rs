use bundlekit_core::diagnostic::Diagnostic;
use bundlekit_core::error::BundlekitError;
use serde::Serialize;

/// A build error as reported to the user.
#[derive(Debug, PartialEq)]
pub enum BuildError {
  Diagnostic(Diagnostic),
  Fatal(String),
  Unknown(String),
}

impl BuildError {
  /// Process exit code of a build that stopped with this error.
  pub fn exit_code(&self) -> i32 {
    match self {
      BuildError::Fatal(_) => 2,
      BuildError::Diagnostic(_) | BuildError::Unknown(_) => 1,
    }
  }
}

impl Serialize for BuildError {
  fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
  where
    S: serde::Serializer,
  {
    match self {
      BuildError::Diagnostic(diagnostic) => diagnostic.serialize(serializer),
      BuildError::Fatal(message) | BuildError::Unknown(message) => message.serialize(serializer),
    }
  }
}

impl From<&anyhow::Error> for BuildError {
  fn from(error: &anyhow::Error) -> Self {
    if let Some(diagnostic) = error.downcast_ref::<Diagnostic>() {
      Self::Diagnostic(diagnostic.clone())
    } else if let Some(error) = error.downcast_ref::<BundlekitError>() {
      match error {
        BundlekitError::CompressionJob(diagnostic) => Self::Diagnostic(diagnostic.clone()),
        error if error.is_fatal() => Self::Fatal(error.to_string()),
        error => Self::Unknown(error.to_string()),
      }
    } else {
      Self::Unknown(format!("{:#}", error))
    }
  }
}
