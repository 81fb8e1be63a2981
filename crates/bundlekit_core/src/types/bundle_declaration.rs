use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

use super::asset::AssetId;
use super::asset::INTERNAL_NAMESPACE;

/// Bundles every project has available without declaring a root path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum BuiltinBundle {
  /// Engine-internal assets under `db://internal`
  Internal,
  /// Holds the start scene so it can load before everything else
  StartScene,
  /// Assets that are loadable by url at runtime
  Resources,
  /// Scenes and scripts that don't belong to any other bundle
  Main,
}

impl BuiltinBundle {
  pub fn default_name(&self) -> &'static str {
    match self {
      BuiltinBundle::Internal => "internal",
      BuiltinBundle::StartScene => "start-scene",
      BuiltinBundle::Resources => "resources",
      BuiltinBundle::Main => "main",
    }
  }

  pub fn default_root(&self) -> Option<&'static str> {
    match self {
      BuiltinBundle::Internal => Some(INTERNAL_NAMESPACE),
      BuiltinBundle::Resources => Some("db://assets/resources"),
      BuiltinBundle::StartScene | BuiltinBundle::Main => None,
    }
  }

  pub fn default_priority(&self) -> i32 {
    match self {
      BuiltinBundle::Internal => 21,
      BuiltinBundle::StartScene => 20,
      BuiltinBundle::Resources => 8,
      BuiltinBundle::Main => 7,
    }
  }
}

/// Priority of custom bundles that don't declare one.
pub const DEFAULT_BUNDLE_PRIORITY: i32 = 1;

/// One bundle as written in the build configuration.
///
/// A declaration either points at a project folder (`root`) or names a
/// [`BuiltinBundle`]. Everything else falls back to defaults.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleDeclaration {
  pub name: Option<String>,

  /// Project url of the folder this bundle owns, e.g. `db://assets/levels`
  pub root: Option<String>,

  pub builtin: Option<BuiltinBundle>,

  pub priority: Option<i32>,

  #[serde(default)]
  pub is_remote: bool,

  /// Whether this bundle is materialized by this build
  #[serde(default = "default_output")]
  pub output: bool,

  /// Destination directory, defaults to a folder named after the bundle
  pub dest: Option<PathBuf>,

  /// Scenes this bundle may hold. Scenes inside the bundle's folder that are
  /// not listed here are moved to the main bundle.
  pub scenes: Option<BTreeSet<AssetId>>,
}

fn default_output() -> bool {
  true
}

impl BundleDeclaration {
  pub fn builtin(builtin: BuiltinBundle) -> Self {
    Self {
      builtin: Some(builtin),
      output: true,
      ..Default::default()
    }
  }

  pub fn custom(name: impl Into<String>, root: impl Into<String>) -> Self {
    Self {
      name: Some(name.into()),
      root: Some(root.into()),
      output: true,
      ..Default::default()
    }
  }

  pub fn with_priority(mut self, priority: i32) -> Self {
    self.priority = Some(priority);
    self
  }

  pub fn remote(mut self) -> Self {
    self.is_remote = true;
    self
  }

  pub fn resolved_name(&self) -> Option<String> {
    match (&self.name, &self.builtin) {
      (Some(name), _) => Some(name.clone()),
      (None, Some(builtin)) => Some(builtin.default_name().to_string()),
      (None, None) => None,
    }
  }

  pub fn resolved_root(&self) -> Option<String> {
    self
      .root
      .clone()
      .or_else(|| self.builtin.and_then(|b| b.default_root()).map(String::from))
  }

  pub fn resolved_priority(&self) -> i32 {
    self.priority.unwrap_or_else(|| {
      self
        .builtin
        .map(|b| b.default_priority())
        .unwrap_or(DEFAULT_BUNDLE_PRIORITY)
    })
  }
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;

  use super::*;

  #[test]
  fn builtin_declarations_use_defaults() {
    let declaration = BundleDeclaration::builtin(BuiltinBundle::Resources);

    assert_eq!(declaration.resolved_name(), Some("resources".into()));
    assert_eq!(
      declaration.resolved_root(),
      Some("db://assets/resources".into())
    );
    assert_eq!(declaration.resolved_priority(), 8);
  }

  #[test]
  fn declared_values_override_defaults() {
    let declaration = BundleDeclaration {
      name: Some("core".into()),
      priority: Some(30),
      ..BundleDeclaration::builtin(BuiltinBundle::Main)
    };

    assert_eq!(declaration.resolved_name(), Some("core".into()));
    assert_eq!(declaration.resolved_root(), None);
    assert_eq!(declaration.resolved_priority(), 30);
  }

  #[test]
  fn deserializes_from_camel_case_json() {
    let declaration: BundleDeclaration = serde_json::from_str(
      r#"{ "name": "levels", "root": "db://assets/levels", "isRemote": true }"#,
    )
    .unwrap();

    assert_eq!(declaration.resolved_priority(), DEFAULT_BUNDLE_PRIORITY);
    assert!(declaration.is_remote);
    assert!(declaration.output);
  }
}
