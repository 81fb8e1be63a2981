use std::fmt::Display;
use std::fmt::Formatter;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

use super::asset_kind::AssetKind;

/// Project url prefix reserved for engine-internal assets.
pub const INTERNAL_NAMESPACE: &str = "db://internal";

/// Globally unique asset identifier (a uuid in the asset database).
///
/// Ordered so that every set and map keyed by asset id iterates the same way
/// on every run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(transparent)]
pub struct AssetId(String);

impl AssetId {
  pub fn new(id: impl Into<String>) -> Self {
    Self(id.into())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl Display for AssetId {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.write_str(&self.0)
  }
}

impl From<&str> for AssetId {
  fn from(value: &str) -> Self {
    Self(value.to_string())
  }
}

impl From<String> for AssetId {
  fn from(value: String) -> Self {
    Self(value)
  }
}

/// What the asset metadata store knows about one asset.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetInfo {
  pub id: AssetId,

  /// Project url of the asset, e.g. `db://assets/levels/forest.scene`
  pub url: String,

  #[serde(default)]
  pub kind: AssetKind,

  /// Location of the source file on disk
  #[serde(default)]
  pub source_path: PathBuf,

  /// Name of the texture compression preset configured for this asset
  #[serde(default)]
  pub compress_preset: Option<String>,

  #[serde(default)]
  pub dependencies: Vec<AssetId>,
}

impl AssetInfo {
  pub fn new(id: impl Into<AssetId>, url: impl Into<String>, kind: AssetKind) -> Self {
    Self {
      id: id.into(),
      url: url.into(),
      kind,
      ..Default::default()
    }
  }

  pub fn with_dependencies(mut self, dependencies: &[&str]) -> Self {
    self.dependencies = dependencies.iter().map(|d| AssetId::from(*d)).collect();
    self
  }

  pub fn is_internal(&self) -> bool {
    is_url_inside(&self.url, INTERNAL_NAMESPACE)
  }
}

/// Whether `url` is `root` or lives below it.
///
/// Containment is checked per path component, so `db://assets/ui` does not
/// contain `db://assets/ui-extra/button.png`.
pub fn is_url_inside(url: &str, root: &str) -> bool {
  let root = root.trim_end_matches('/');
  match url.strip_prefix(root) {
    Some("") => true,
    Some(rest) => rest.starts_with('/'),
    None => false,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn containment_is_per_component() {
    assert!(is_url_inside("db://assets/ui/button.png", "db://assets/ui"));
    assert!(is_url_inside("db://assets/ui/button.png", "db://assets/ui/"));
    assert!(is_url_inside("db://assets/ui", "db://assets/ui"));
    assert!(!is_url_inside("db://assets/ui-extra/button.png", "db://assets/ui"));
    assert!(!is_url_inside("db://assets", "db://assets/ui"));
  }

  #[test]
  fn internal_assets_are_detected_by_namespace() {
    let internal = AssetInfo::new("a", "db://internal/effects/sprite.effect", AssetKind::Other("effect".into()));
    let project = AssetInfo::new("b", "db://assets/internal/readme.txt", AssetKind::Other("text".into()));

    assert!(internal.is_internal());
    assert!(!project.is_internal());
  }
}
