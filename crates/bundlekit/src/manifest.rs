use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::path::PathBuf;

use bundlekit_core::types::AssetId;
use bundlekit_core::types::Bundle;
use bundlekit_filesystem::FileSystemRef;
use serde::Deserialize;
use serde::Serialize;

/// The `config.json` written next to every output bundle.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleManifest {
  pub name: String,
  pub priority: i32,
  pub is_remote: bool,
  pub dest_dir: PathBuf,
  pub scripts_path: PathBuf,
  pub assets: BTreeSet<AssetId>,

  /// Assets loaded from another bundle, keyed to that bundle's name
  pub redirects: BTreeMap<AssetId, String>,

  pub scenes: BTreeSet<AssetId>,
  pub scripts: BTreeSet<AssetId>,
  pub auto_atlases: BTreeSet<AssetId>,
  pub compressed: BTreeMap<AssetId, Vec<PathBuf>>,
}

impl From<&Bundle> for BundleManifest {
  fn from(bundle: &Bundle) -> Self {
    BundleManifest {
      name: bundle.name.clone(),
      priority: bundle.priority,
      is_remote: bundle.is_remote,
      dest_dir: bundle.output_manifest.dest_dir.clone(),
      scripts_path: bundle.output_manifest.scripts_path.clone(),
      assets: bundle.assets.clone(),
      redirects: bundle.redirects.clone(),
      scenes: bundle.scenes.clone(),
      scripts: bundle.scripts.clone(),
      auto_atlases: bundle.auto_atlases.clone(),
      compressed: bundle.output_manifest.compressed.clone(),
    }
  }
}

/// Writes the manifest of `bundle` to its config path.
#[tracing::instrument(level = "debug", skip_all, fields(bundle = %bundle.name))]
pub fn write_manifest(fs: &FileSystemRef, bundle: &Bundle) -> anyhow::Result<PathBuf> {
  let manifest = BundleManifest::from(bundle);
  let path = bundle.output_manifest.config_path.clone();

  fs.write(&path, &serde_json::to_vec_pretty(&manifest)?)?;

  Ok(path)
}
