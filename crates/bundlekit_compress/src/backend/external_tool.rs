use std::path::PathBuf;

use async_trait::async_trait;
use bundlekit_core::diagnostic::Diagnostic;
use bundlekit_filesystem::FileSystemRef;
use tokio::process::Command;

use super::BackendCapabilities;
use super::CompressBackend;
use crate::job::CompressJob;

/// Runs a command line encoder for each job.
///
/// Arguments are templates where `{src}`, `{dest}` and the option values of the
/// job (`{quality}`, `{block}`, `{pixel_format}`) are substituted. An argument
/// that is exactly `{mipmaps}` expands to one argument per mip level source.
///
/// The child process is killed when the encode future is dropped, so aborting
/// a job also stops the tool.
#[derive(Clone, Debug)]
pub struct ExternalToolBackend {
  fs: FileSystemRef,
  name: String,
  program: PathBuf,
  args: Vec<String>,
  parallel: bool,
}

impl ExternalToolBackend {
  pub fn new(
    fs: FileSystemRef,
    name: impl Into<String>,
    program: PathBuf,
    args: Vec<String>,
  ) -> Self {
    ExternalToolBackend {
      fs,
      name: name.into(),
      program,
      args,
      parallel: true,
    }
  }

  /// Marks the tool as unsafe to run more than once at a time.
  pub fn sequential(mut self) -> Self {
    self.parallel = false;
    self
  }

  /// PVRTexTool for pvrtc and etc. It keeps global state in its working files,
  /// so only one instance may run at a time.
  pub fn pvr_tex_tool(fs: FileSystemRef, program: PathBuf, name: &str) -> Self {
    Self::new(
      fs,
      name,
      program,
      [
        "-i",
        "{src}",
        "-o",
        "{dest}",
        "-f",
        "{pixel_format}",
        "-q",
        "{quality}",
        "{mipmaps}",
      ]
      .map(String::from)
      .to_vec(),
    )
    .sequential()
  }

  pub fn astcenc(fs: FileSystemRef, program: PathBuf) -> Self {
    Self::new(
      fs,
      "astc",
      program,
      ["-cl", "{src}", "{dest}", "{block}", "-{quality}"]
        .map(String::from)
        .to_vec(),
    )
  }

  pub fn render_args(&self, job: &CompressJob) -> Vec<String> {
    let values = job.options.template_values();
    let src = job.source_path.display().to_string();
    let dest = job.dest_path.display().to_string();

    let mut args = Vec::with_capacity(self.args.len());
    for template in &self.args {
      if template == "{mipmaps}" {
        args.extend(
          job
            .mipmap_sources
            .iter()
            .map(|path| path.display().to_string()),
        );
        continue;
      }

      let mut arg = template.replace("{src}", &src).replace("{dest}", &dest);
      for (key, value) in &values {
        arg = arg.replace(&format!("{{{}}}", key), value);
      }
      args.push(arg);
    }
    args
  }
}

#[async_trait]
impl CompressBackend for ExternalToolBackend {
  fn capabilities(&self) -> BackendCapabilities {
    BackendCapabilities {
      parallel: self.parallel,
      child_process: true,
    }
  }

  #[tracing::instrument(level = "debug", skip_all, fields(tool = %self.name, asset = %job.asset_id))]
  async fn encode(&self, job: &CompressJob) -> anyhow::Result<()> {
    if let Some(parent) = job.dest_path.parent() {
      self.fs.create_dir_all(parent)?;
    }

    let args = self.render_args(job);
    tracing::debug!("{} {}", self.program.display(), args.join(" "));

    let output = Command::new(&self.program)
      .args(&args)
      .kill_on_drop(true)
      .output()
      .await
      .map_err(|error| {
        Diagnostic::new(format!(
          "Failed to start {}: {}",
          self.program.display(),
          error
        ))
        .with_origin(self.name.clone())
        .with_asset(&job.asset_id)
        .with_hint("Check the tool path configured for this format")
      })?;

    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr);
      return Err(
        Diagnostic::new(format!("Exited with {}: {}", output.status, stderr.trim()))
          .with_origin(self.name.clone())
          .with_asset(&job.asset_id)
          .into(),
      );
    }

    Ok(())
  }
}
