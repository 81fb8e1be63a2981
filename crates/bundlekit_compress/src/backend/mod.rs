use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use bundlekit_filesystem::FileSystemRef;
use serde::Deserialize;
use serde::Serialize;

use crate::format::CompressFormat;
use crate::job::CompressJob;

pub use self::external_tool::*;
pub use self::image_backend::*;

mod external_tool;
mod image_backend;

/// How a backend may be scheduled.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct BackendCapabilities {
  /// Several jobs of this format may run at the same time
  pub parallel: bool,

  /// Jobs spawn an external process and count towards the child-process quota
  pub child_process: bool,
}

pub type CompressBackendRef = Arc<dyn CompressBackend>;

/// Encodes a texture into one output format.
#[mockall::automock]
#[async_trait]
pub trait CompressBackend: Send + Sync {
  fn capabilities(&self) -> BackendCapabilities;

  /// Reads `job.source_path` and writes the encoded result to `job.dest_path`
  async fn encode(&self, job: &CompressJob) -> anyhow::Result<()>;
}

/// Maps each output format to the backend that produces it.
#[derive(Clone, Default)]
pub struct BackendRegistry {
  backends: HashMap<CompressFormat, CompressBackendRef>,
}

impl std::fmt::Debug for BackendRegistry {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let mut formats: Vec<_> = self.backends.keys().collect();
    formats.sort();
    f.debug_struct("BackendRegistry")
      .field("formats", &formats)
      .finish()
  }
}

impl BackendRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// The in-process image backend for png/jpg/webp plus an external tool for
  /// each block format that has one configured.
  pub fn with_defaults(fs: FileSystemRef, tools: &ToolPaths) -> Self {
    let mut registry = Self::new();

    let image_backend: CompressBackendRef = Arc::new(ImageBackend::new(fs.clone()));
    registry.register(CompressFormat::Png, image_backend.clone());
    registry.register(CompressFormat::Jpg, image_backend.clone());
    registry.register(CompressFormat::Webp, image_backend);

    if let Some(program) = &tools.pvrtc {
      registry.register(
        CompressFormat::Pvrtc,
        Arc::new(ExternalToolBackend::pvr_tex_tool(
          fs.clone(),
          program.clone(),
          "pvrtc",
        )),
      );
    }
    if let Some(program) = &tools.etc {
      registry.register(
        CompressFormat::Etc,
        Arc::new(ExternalToolBackend::pvr_tex_tool(
          fs.clone(),
          program.clone(),
          "etc",
        )),
      );
    }
    if let Some(program) = &tools.astc {
      registry.register(
        CompressFormat::Astc,
        Arc::new(ExternalToolBackend::astcenc(fs.clone(), program.clone())),
      );
    }

    registry
  }

  pub fn register(&mut self, format: CompressFormat, backend: CompressBackendRef) {
    self.backends.insert(format, backend);
  }

  pub fn get(&self, format: CompressFormat) -> Option<CompressBackendRef> {
    self.backends.get(&format).cloned()
  }

  /// Capabilities of the backend for `format`.
  ///
  /// Formats without a backend report the defaults; their jobs fail as soon as
  /// they run.
  pub fn capabilities(&self, format: CompressFormat) -> BackendCapabilities {
    self
      .backends
      .get(&format)
      .map(|backend| backend.capabilities())
      .unwrap_or_default()
  }
}

/// Locations of the external command-line encoders.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolPaths {
  /// PVRTexToolCLI, used for pvrtc
  pub pvrtc: Option<PathBuf>,

  /// PVRTexToolCLI or etcpack, used for etc
  pub etc: Option<PathBuf>,

  /// astcenc
  pub astc: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
  use bundlekit_filesystem::InMemoryFileSystem;

  use super::*;

  #[test]
  fn default_registry_only_covers_configured_tools() {
    let registry = BackendRegistry::with_defaults(
      Arc::new(InMemoryFileSystem::default()),
      &ToolPaths {
        astc: Some(PathBuf::from("/usr/bin/astcenc")),
        ..ToolPaths::default()
      },
    );

    assert!(registry.get(CompressFormat::Jpg).is_some());
    assert!(registry.get(CompressFormat::Astc).is_some());
    assert!(registry.get(CompressFormat::Pvrtc).is_none());

    assert_eq!(
      registry.capabilities(CompressFormat::Png),
      BackendCapabilities {
        parallel: true,
        child_process: false
      }
    );
    assert_eq!(
      registry.capabilities(CompressFormat::Astc),
      BackendCapabilities {
        parallel: true,
        child_process: true
      }
    );
  }
}
