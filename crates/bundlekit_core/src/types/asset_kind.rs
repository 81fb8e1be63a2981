use serde::Deserialize;
use serde::Serialize;

/// The asset types the bundle graph builder treats specially.
///
/// Defaults to `AssetKind::Other` for anything the pipeline has no rules for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AssetKind {
  Script,
  Scene,
  Image,
  AutoAtlas,
  Other(String),
}

impl Default for AssetKind {
  fn default() -> Self {
    AssetKind::Other(String::from("unknown"))
  }
}

impl Serialize for AssetKind {
  fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
  where
    S: serde::Serializer,
  {
    self.name().serialize(serializer)
  }
}

impl<'de> Deserialize<'de> for AssetKind {
  fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
  where
    D: serde::Deserializer<'de>,
  {
    let name: String = Deserialize::deserialize(deserializer)?;
    Ok(Self::from_name(&name))
  }
}

impl AssetKind {
  pub fn name(&self) -> &str {
    match self {
      AssetKind::Script => "script",
      AssetKind::Scene => "scene",
      AssetKind::Image => "image",
      AssetKind::AutoAtlas => "auto-atlas",
      AssetKind::Other(s) => s.as_str(),
    }
  }

  pub fn from_name(name: &str) -> Self {
    match name {
      "script" | "javascript" | "typescript" => AssetKind::Script,
      "scene" => AssetKind::Scene,
      "image" | "texture" => AssetKind::Image,
      "auto-atlas" => AssetKind::AutoAtlas,
      other => AssetKind::Other(other.to_string()),
    }
  }
}
