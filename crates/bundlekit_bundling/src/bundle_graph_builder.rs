use std::collections::HashSet;
use std::path::PathBuf;

use bundlekit_core::asset_graph::AssetGraphProvider;
use bundlekit_core::error::BundlekitError;
use bundlekit_core::error::BundlekitResult;
use bundlekit_core::error::ConfigError;
use bundlekit_core::types::is_url_inside;
use bundlekit_core::types::resolution_order;
use bundlekit_core::types::AssetId;
use bundlekit_core::types::AssetInfo;
use bundlekit_core::types::AssetKind;
use bundlekit_core::types::BuiltinBundle;
use bundlekit_core::types::Bundle;
use bundlekit_core::types::BundleDeclaration;
use bundlekit_core::types::BundleOutput;
use tracing::debug;
use tracing::info;
use tracing::warn;

#[derive(Clone, Debug, Default)]
pub struct BundleGraphBuilderOptions {
  /// Directory bundle destinations default to
  pub output_dir: PathBuf,

  /// The scene the game launches with
  pub start_scene: Option<AssetId>,
}

/// Turns bundle declarations into [`Bundle`]s and decides which bundle each
/// project asset is a root asset of.
pub struct BundleGraphBuilder<'a> {
  provider: &'a (dyn AssetGraphProvider + Send + Sync),
  options: BundleGraphBuilderOptions,
}

impl<'a> BundleGraphBuilder<'a> {
  pub fn new(
    provider: &'a (dyn AssetGraphProvider + Send + Sync),
    options: BundleGraphBuilderOptions,
  ) -> Self {
    Self { provider, options }
  }

  /// Returns the bundles in resolution order (descending priority, then name).
  #[tracing::instrument(level = "info", skip_all)]
  pub async fn build(&self, declarations: &[BundleDeclaration]) -> BundlekitResult<Vec<Bundle>> {
    let mut bundles = self.create_bundles(declarations);

    if bundles.is_empty() {
      return Err(
        ConfigError::InvalidBundleConfig(format!(
          "{} declaration(s) given, none of them usable",
          declarations.len()
        ))
        .into(),
      );
    }

    let mut assets = self
      .provider
      .assets()
      .await
      .map_err(BundlekitError::Unknown)?;
    assets.sort_by(|a, b| a.url.cmp(&b.url).then_with(|| a.id.cmp(&b.id)));

    for asset in &assets {
      self.assign(&mut bundles, asset);
    }

    bundles.sort_by(resolution_order);

    for bundle in &bundles {
      info!(
        bundle = %bundle.name,
        priority = bundle.priority,
        roots = bundle.root_assets.len(),
        "Created bundle"
      );
    }

    Ok(bundles)
  }

  fn create_bundles(&self, declarations: &[BundleDeclaration]) -> Vec<Bundle> {
    let mut bundles = Vec::with_capacity(declarations.len());
    let mut used_names = HashSet::new();

    for (index, declaration) in declarations.iter().enumerate() {
      let Some(name) = declaration.resolved_name().filter(|n| !n.trim().is_empty()) else {
        warn!(
          "{}",
          ConfigError::InvalidDeclaration {
            index,
            reason: String::from("the bundle has no name"),
          }
        );
        continue;
      };

      let root = declaration.resolved_root();
      if root.is_none() && declaration.builtin.is_none() {
        warn!(
          "{}",
          ConfigError::InvalidDeclaration {
            index,
            reason: format!("bundle \"{name}\" has neither a root folder nor a builtin type"),
          }
        );
        continue;
      }

      let unique_name = unique_name(&name, &used_names);
      if unique_name != name {
        warn!(
          "{}",
          ConfigError::DuplicateBundleName {
            name: name.clone(),
            renamed: unique_name.clone(),
          }
        );
      }
      used_names.insert(unique_name.clone());

      let dest_dir = declaration.dest.clone().unwrap_or_else(|| {
        if declaration.is_remote {
          self.options.output_dir.join("remote").join(&unique_name)
        } else {
          self.options.output_dir.join(&unique_name)
        }
      });

      bundles.push(Bundle {
        name: unique_name,
        priority: declaration.resolved_priority(),
        root,
        builtin: declaration.builtin,
        is_remote: declaration.is_remote,
        output: declaration.output,
        allowed_scenes: declaration.scenes.clone(),
        output_manifest: BundleOutput::in_dir(dest_dir),
        ..Default::default()
      });
    }

    bundles
  }

  fn assign(&self, bundles: &mut [Bundle], asset: &AssetInfo) {
    let containing = containing_bundle(bundles, &asset.url);
    let launch = launch_bundle(bundles);
    let main = bundles.iter().position(|b| b.is_builtin(BuiltinBundle::Main));

    let target = match &asset.kind {
      AssetKind::Script => match containing {
        Some(index) => Some(index),
        None if !asset.is_internal() => launch,
        None => None,
      },
      AssetKind::Scene => {
        if self.options.start_scene.as_ref() == Some(&asset.id) {
          launch
        } else {
          match containing {
            Some(index) if scene_allowed(&bundles[index], &asset.id) => Some(index),
            _ => main,
          }
        }
      }
      _ => containing,
    };

    let Some(index) = target else {
      if matches!(asset.kind, AssetKind::Script | AssetKind::Scene) {
        debug!(asset = %asset.id, url = %asset.url, "No bundle can hold this asset");
      }
      return;
    };

    let bundle = &mut bundles[index];
    bundle.root_assets.insert(asset.id.clone());
    match asset.kind {
      AssetKind::Script => {
        bundle.scripts.insert(asset.id.clone());
      }
      AssetKind::Scene => {
        bundle.scenes.insert(asset.id.clone());
      }
      AssetKind::AutoAtlas => {
        bundle.auto_atlases.insert(asset.id.clone());
      }
      _ => {}
    }
  }
}

fn unique_name(name: &str, used_names: &HashSet<String>) -> String {
  if !used_names.contains(name) {
    return name.to_string();
  }

  let mut suffix = 1;
  loop {
    let candidate = format!("{name}_{suffix}");
    if !used_names.contains(&candidate) {
      return candidate;
    }
    suffix += 1;
  }
}

/// The bundle with the longest root that contains `url`.
fn containing_bundle(bundles: &[Bundle], url: &str) -> Option<usize> {
  bundles
    .iter()
    .enumerate()
    .filter_map(|(index, bundle)| {
      let root = bundle.root.as_deref()?;
      is_url_inside(url, root).then_some((index, root.trim_end_matches('/').len()))
    })
    .max_by(|(a_index, a_len), (b_index, b_len)| a_len.cmp(b_len).then(b_index.cmp(a_index)))
    .map(|(index, _)| index)
}

/// The start-scene bundle if one is declared, otherwise main.
fn launch_bundle(bundles: &[Bundle]) -> Option<usize> {
  bundles
    .iter()
    .position(|b| b.is_builtin(BuiltinBundle::StartScene))
    .or_else(|| bundles.iter().position(|b| b.is_builtin(BuiltinBundle::Main)))
}

fn scene_allowed(bundle: &Bundle, scene: &AssetId) -> bool {
  bundle
    .allowed_scenes
    .as_ref()
    .map_or(true, |allowed| allowed.contains(scene))
}

#[cfg(test)]
mod tests {
  use std::collections::BTreeSet;

  use bundlekit_core::asset_graph::InMemoryAssetGraph;
  use pretty_assertions::assert_eq;
  use tracing_test::traced_test;

  use super::*;

  fn ids(ids: &[&str]) -> BTreeSet<AssetId> {
    ids.iter().map(|id| AssetId::from(*id)).collect()
  }

  fn project() -> InMemoryAssetGraph {
    InMemoryAssetGraph::from_assets([
      AssetInfo::new("boot", "db://assets/scenes/boot.scene", AssetKind::Scene),
      AssetInfo::new("menu", "db://assets/scenes/menu.scene", AssetKind::Scene),
      AssetInfo::new("forest", "db://assets/levels/forest/forest.scene", AssetKind::Scene),
      AssetInfo::new("secret", "db://assets/levels/secret.scene", AssetKind::Scene),
      AssetInfo::new("tree", "db://assets/levels/forest/tree.png", AssetKind::Image),
      AssetInfo::new("rock", "db://assets/levels/rock.png", AssetKind::Image),
      AssetInfo::new("atlas", "db://assets/levels/forest/leaves.pac", AssetKind::AutoAtlas),
      AssetInfo::new("player", "db://assets/scripts/player.ts", AssetKind::Script),
      AssetInfo::new("enemy", "db://assets/levels/enemy.ts", AssetKind::Script),
      AssetInfo::new("engine", "db://internal/scripts/engine.ts", AssetKind::Script),
      AssetInfo::new("sprite", "db://internal/default/sprite.png", AssetKind::Image),
      AssetInfo::new("icon", "db://assets/resources/icon.png", AssetKind::Image),
      AssetInfo::new("loose", "db://assets/misc/loose.png", AssetKind::Image),
    ])
  }

  fn options() -> BundleGraphBuilderOptions {
    BundleGraphBuilderOptions {
      output_dir: PathBuf::from("/build"),
      start_scene: Some(AssetId::from("boot")),
    }
  }

  fn declarations() -> Vec<BundleDeclaration> {
    vec![
      BundleDeclaration::builtin(BuiltinBundle::Main),
      BundleDeclaration::builtin(BuiltinBundle::Internal),
      BundleDeclaration::builtin(BuiltinBundle::Resources),
      BundleDeclaration::custom("levels", "db://assets/levels").remote(),
      BundleDeclaration::custom("forest", "db://assets/levels/forest").with_priority(2),
    ]
  }

  fn find<'a>(bundles: &'a [Bundle], name: &str) -> &'a Bundle {
    bundles.iter().find(|b| b.name == name).unwrap()
  }

  #[tokio::test]
  async fn assigns_assets_to_the_most_specific_bundle() {
    let graph = project();
    let bundles = BundleGraphBuilder::new(&graph, options())
      .build(&declarations())
      .await
      .unwrap();

    assert_eq!(find(&bundles, "forest").root_assets, ids(&["atlas", "forest", "tree"]));
    assert_eq!(
      find(&bundles, "levels").root_assets,
      ids(&["enemy", "rock", "secret"])
    );
    assert_eq!(find(&bundles, "resources").root_assets, ids(&["icon"]));
    assert_eq!(find(&bundles, "internal").root_assets, ids(&["engine", "sprite"]));
  }

  #[tokio::test]
  async fn routes_scripts_and_scenes_to_the_launch_bundle() {
    let graph = project();
    let bundles = BundleGraphBuilder::new(&graph, options())
      .build(&declarations())
      .await
      .unwrap();

    let main = find(&bundles, "main");
    assert_eq!(main.root_assets, ids(&["boot", "menu", "player"]));
    assert_eq!(main.scripts, ids(&["player"]));
    assert_eq!(main.scenes, ids(&["boot", "menu"]));
    assert!(!main.root_assets.contains(&AssetId::from("loose")));
    assert_eq!(find(&bundles, "forest").auto_atlases, ids(&["atlas"]));
  }

  #[tokio::test]
  async fn start_scene_goes_to_the_start_scene_bundle_when_declared() {
    let graph = project();
    let mut declarations = declarations();
    declarations.push(BundleDeclaration::builtin(BuiltinBundle::StartScene));

    let bundles = BundleGraphBuilder::new(&graph, options())
      .build(&declarations)
      .await
      .unwrap();

    assert_eq!(find(&bundles, "start-scene").root_assets, ids(&["boot", "player"]));
    assert_eq!(find(&bundles, "main").root_assets, ids(&["menu"]));
  }

  #[tokio::test]
  async fn scenes_not_allowed_by_their_bundle_move_to_main() {
    let graph = project();
    let mut declarations = declarations();
    declarations[3].scenes = Some(ids(&[]));

    let bundles = BundleGraphBuilder::new(&graph, options())
      .build(&declarations)
      .await
      .unwrap();

    assert!(find(&bundles, "main").scenes.contains(&AssetId::from("secret")));
    assert!(!find(&bundles, "levels").root_assets.contains(&AssetId::from("secret")));
  }

  #[tokio::test]
  async fn bundles_are_sorted_by_priority_then_name() {
    let graph = project();
    let bundles = BundleGraphBuilder::new(&graph, options())
      .build(&declarations())
      .await
      .unwrap();

    let order: Vec<(&str, i32)> = bundles
      .iter()
      .map(|b| (b.name.as_str(), b.priority))
      .collect();
    assert_eq!(
      order,
      vec![
        ("internal", 21),
        ("resources", 8),
        ("main", 7),
        ("forest", 2),
        ("levels", 1),
      ]
    );
  }

  #[tokio::test]
  async fn remote_bundles_default_to_the_remote_folder() {
    let graph = project();
    let bundles = BundleGraphBuilder::new(&graph, options())
      .build(&declarations())
      .await
      .unwrap();

    assert_eq!(
      find(&bundles, "levels").output_manifest.dest_dir,
      PathBuf::from("/build/remote/levels")
    );
    assert_eq!(
      find(&bundles, "forest").output_manifest.config_path,
      PathBuf::from("/build/forest/config.json")
    );
  }

  #[tokio::test]
  #[traced_test]
  async fn duplicate_names_are_renamed_with_a_warning() {
    let graph = project();
    let declarations = vec![
      BundleDeclaration::builtin(BuiltinBundle::Main),
      BundleDeclaration::custom("levels", "db://assets/levels"),
      BundleDeclaration::custom("levels", "db://assets/levels/forest"),
      BundleDeclaration::custom("levels", "db://assets/resources"),
    ];

    let bundles = BundleGraphBuilder::new(&graph, options())
      .build(&declarations)
      .await
      .unwrap();

    let mut names: Vec<&str> = bundles.iter().map(|b| b.name.as_str()).collect();
    names.sort();
    assert_eq!(names, vec!["levels", "levels_1", "levels_2", "main"]);
    assert_eq!(find(&bundles, "levels_1").root_assets, ids(&["atlas", "forest", "tree"]));
    assert!(logs_contain("renamed to \"levels_1\""));
  }

  #[tokio::test]
  async fn fails_when_no_bundle_can_be_created() {
    let graph = project();
    let declarations = vec![BundleDeclaration::default()];

    let result = BundleGraphBuilder::new(&graph, options())
      .build(&declarations)
      .await;

    assert!(matches!(
      result,
      Err(BundlekitError::Config(ConfigError::InvalidBundleConfig(_)))
    ));
  }

  #[tokio::test]
  async fn fails_with_no_declarations() {
    let graph = project();
    let result = BundleGraphBuilder::new(&graph, options()).build(&[]).await;

    assert!(result.is_err_and(|e| e.is_fatal()));
  }

  #[tokio::test]
  #[traced_test]
  async fn invalid_declarations_are_skipped() {
    let graph = project();
    let declarations = vec![
      BundleDeclaration {
        name: Some("nowhere".into()),
        ..Default::default()
      },
      BundleDeclaration::builtin(BuiltinBundle::Main),
    ];

    let bundles = BundleGraphBuilder::new(&graph, options())
      .build(&declarations)
      .await
      .unwrap();

    assert_eq!(bundles.len(), 1);
    assert!(logs_contain("neither a root folder nor a builtin type"));
  }
}
