use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;

use anyhow::Context;
use bundlekit_compress::backend::ToolPaths;
use bundlekit_compress::format::FormatOptions;
use bundlekit_compress::SchedulerOptions;
use bundlekit_core::types::AssetId;
use bundlekit_core::types::BuiltinBundle;
use bundlekit_core::types::BundleDeclaration;
use bundlekit_filesystem::FileSystemRef;
use serde::Deserialize;
use serde::Serialize;

pub const DEFAULT_CONFIG_FILE: &str = "bundlekit.json";
pub const DEFAULT_OUTPUT_DIR: &str = "build";

/// Build configuration, usually read from `bundlekit.json`.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildOptions {
  /// Exported asset database, see `InMemoryAssetGraph::from_json`
  pub assets: Option<PathBuf>,

  pub output_dir: Option<PathBuf>,

  /// The scene loaded first, which decides the launch bundle's contents
  pub start_scene: Option<AssetId>,

  /// Bundle declarations, the builtin bundles when left out
  #[serde(default = "BuildOptions::default_bundles")]
  pub bundles: Vec<BundleDeclaration>,

  /// Named texture compression presets, referenced by `AssetInfo::compress_preset`
  #[serde(default)]
  pub compress_presets: BTreeMap<String, Vec<FormatOptions>>,

  #[serde(default)]
  pub tools: ToolPaths,

  /// Compression cache file, defaults to a file inside the output directory
  pub cache_path: Option<PathBuf>,

  /// Caps concurrent compression jobs, defaults to the number of CPUs
  pub threads: Option<usize>,

  /// Free-form settings that invalidate the compression cache when changed
  #[serde(default)]
  pub custom_config: BTreeMap<String, serde_json::Value>,
}

impl Default for BuildOptions {
  fn default() -> Self {
    BuildOptions {
      assets: None,
      output_dir: None,
      start_scene: None,
      bundles: Self::default_bundles(),
      compress_presets: BTreeMap::new(),
      tools: ToolPaths::default(),
      cache_path: None,
      threads: None,
      custom_config: BTreeMap::new(),
    }
  }
}

impl BuildOptions {
  /// The builtin bundles every project gets when it declares none.
  pub fn default_bundles() -> Vec<BundleDeclaration> {
    [
      BuiltinBundle::Internal,
      BuiltinBundle::Resources,
      BuiltinBundle::Main,
    ]
    .into_iter()
    .map(BundleDeclaration::builtin)
    .collect()
  }

  #[tracing::instrument(level = "debug", skip(fs))]
  pub fn load(fs: &FileSystemRef, path: &Path) -> anyhow::Result<Self> {
    let contents = fs
      .read_to_string(path)
      .with_context(|| format!("Unable to read config file {}", path.display()))?;

    let mut options: BuildOptions = serde_json::from_str(&contents)
      .with_context(|| format!("Invalid config file {}", path.display()))?;

    if options.bundles.is_empty() {
      tracing::warn!(
        "No bundles declared in {}, using the default bundles",
        path.display()
      );
      options.bundles = Self::default_bundles();
    }

    Ok(options.relative_to(path.parent().unwrap_or(Path::new(""))))
  }

  /// Resolves relative paths in the options against `root`.
  fn relative_to(mut self, root: &Path) -> Self {
    let resolve = |path: PathBuf| {
      if path.is_absolute() {
        path
      } else {
        root.join(path)
      }
    };

    self.assets = self.assets.map(resolve);
    self.output_dir = self.output_dir.map(resolve);
    self.cache_path = self.cache_path.map(resolve);
    self
  }

  pub fn output_dir(&self) -> PathBuf {
    self
      .output_dir
      .clone()
      .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR))
  }

  pub fn cache_path(&self) -> PathBuf {
    self.cache_path.clone().unwrap_or_else(|| {
      self
        .output_dir()
        .join(".bundlekit-cache")
        .join("compress.json")
    })
  }

  pub fn scheduler_options(&self) -> SchedulerOptions {
    let defaults = SchedulerOptions::default();
    let parallelism = self.threads.unwrap_or(defaults.parallelism).max(1);

    SchedulerOptions {
      parallelism,
      child_process_quota: defaults.child_process_quota.min(parallelism),
      custom_config: self.custom_config.clone(),
    }
  }
}
