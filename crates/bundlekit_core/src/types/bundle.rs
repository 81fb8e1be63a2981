use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

use super::asset::AssetId;
use super::bundle_declaration::BuiltinBundle;

/// Where a bundle is written and what was produced for it.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleOutput {
  pub dest_dir: PathBuf,

  /// The bundle's import/config file
  pub config_path: PathBuf,

  /// The bundle's compiled script bundle
  pub scripts_path: PathBuf,

  /// Compressed texture files per owned asset, filled in by the compression phase
  pub compressed: BTreeMap<AssetId, Vec<PathBuf>>,
}

impl BundleOutput {
  pub fn in_dir(dest_dir: PathBuf) -> Self {
    Self {
      config_path: dest_dir.join("config.json"),
      scripts_path: dest_dir.join("index.js"),
      dest_dir,
      compressed: BTreeMap::new(),
    }
  }
}

/// A named, independently loadable group of assets.
///
/// An asset is either owned (`assets`) or redirected (`redirects`) by a given
/// bundle, never both.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Bundle {
  pub name: String,

  /// Higher priorities are resolved first and win ownership of shared assets
  pub priority: i32,

  pub root: Option<String>,
  pub builtin: Option<BuiltinBundle>,
  pub is_remote: bool,

  /// Whether this bundle is materialized in this build
  pub output: bool,

  /// Assets explicitly declared to belong to this bundle
  pub root_assets: BTreeSet<AssetId>,

  /// Full resolved membership
  pub assets: BTreeSet<AssetId>,

  /// Assets this bundle references but another bundle stores, keyed to the owner's name
  pub redirects: BTreeMap<AssetId, String>,

  pub scenes: BTreeSet<AssetId>,
  pub scripts: BTreeSet<AssetId>,

  /// Auto-atlas composites, packed by a later phase
  pub auto_atlases: BTreeSet<AssetId>,

  pub allowed_scenes: Option<BTreeSet<AssetId>>,

  pub output_manifest: BundleOutput,
}

impl Bundle {
  pub fn new(name: impl Into<String>, priority: i32) -> Self {
    Self {
      name: name.into(),
      priority,
      output: true,
      ..Default::default()
    }
  }

  pub fn owns(&self, asset_id: &AssetId) -> bool {
    self.assets.contains(asset_id)
  }

  pub fn redirect_for(&self, asset_id: &AssetId) -> Option<&str> {
    self.redirects.get(asset_id).map(String::as_str)
  }

  pub fn is_builtin(&self, builtin: BuiltinBundle) -> bool {
    self.builtin == Some(builtin)
  }
}

/// Orders bundles the way they are resolved: descending priority, then name.
pub fn resolution_order(a: &Bundle, b: &Bundle) -> std::cmp::Ordering {
  b.priority
    .cmp(&a.priority)
    .then_with(|| a.name.cmp(&b.name))
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;

  use super::*;

  #[test]
  fn resolution_order_sorts_by_priority_then_name() {
    let mut bundles = vec![
      Bundle::new("b", 5),
      Bundle::new("main", 7),
      Bundle::new("a", 5),
      Bundle::new("internal", 21),
    ];

    bundles.sort_by(resolution_order);

    let names: Vec<&str> = bundles.iter().map(|b| b.name.as_str()).collect();
    assert_eq!(names, vec!["internal", "main", "a", "b"]);
  }

  #[test]
  fn output_paths_derive_from_dest_dir() {
    let output = BundleOutput::in_dir(PathBuf::from("/build/remote/levels"));

    assert_eq!(
      output.config_path,
      PathBuf::from("/build/remote/levels/config.json")
    );
    assert_eq!(
      output.scripts_path,
      PathBuf::from("/build/remote/levels/index.js")
    );
  }
}
