use bundlekit_core::asset_graph::AssetGraphProvider;
use bundlekit_core::error::BundlekitResult;
use bundlekit_core::types::Bundle;
use bundlekit_core::types::BundleDeclaration;

pub use self::bundle_graph_builder::*;
pub use self::partition::*;
pub use self::redirect_resolver::*;

mod bundle_graph_builder;
mod partition;
mod redirect_resolver;

/// Builds the bundles for a set of declarations and resolves their shared assets.
///
/// The returned bundles are in resolution order, with `assets` and `redirects`
/// populated. Only a configuration that yields no bundle at all is an error.
pub async fn bundle(
  provider: &(dyn AssetGraphProvider + Send + Sync),
  declarations: &[BundleDeclaration],
  options: BundleGraphBuilderOptions,
) -> BundlekitResult<Vec<Bundle>> {
  let mut bundles = BundleGraphBuilder::new(provider, options)
    .build(declarations)
    .await?;

  RedirectResolver::new(provider).resolve(&mut bundles).await;

  Ok(bundles)
}

#[cfg(test)]
mod tests {
  use std::path::PathBuf;

  use bundlekit_core::asset_graph::InMemoryAssetGraph;
  use bundlekit_core::types::AssetId;
  use bundlekit_core::types::AssetInfo;
  use bundlekit_core::types::AssetKind;
  use bundlekit_core::types::BuiltinBundle;
  use pretty_assertions::assert_eq;

  use super::*;

  #[tokio::test]
  async fn main_and_remote_share_a_texture() {
    let graph = InMemoryAssetGraph::from_assets([
      AssetInfo::new("menu", "db://assets/scenes/menu.scene", AssetKind::Scene).with_dependencies(&["T"]),
      AssetInfo::new("level", "db://assets/remote/level.scene", AssetKind::Scene)
        .with_dependencies(&["T", "music"]),
      AssetInfo::new("T", "db://assets/textures/t.png", AssetKind::Image),
      AssetInfo::new("music", "db://assets/remote/music.mp3", AssetKind::Other("audio".into())),
    ]);
    let declarations = vec![
      BundleDeclaration::builtin(BuiltinBundle::Main).with_priority(7),
      BundleDeclaration::custom("Remote", "db://assets/remote")
        .with_priority(3)
        .remote(),
    ];

    let bundles = bundle(
      &graph,
      &declarations,
      BundleGraphBuilderOptions {
        output_dir: PathBuf::from("/build"),
        start_scene: None,
      },
    )
    .await
    .unwrap();

    let main = bundles.iter().find(|b| b.name == "main").unwrap();
    let remote = bundles.iter().find(|b| b.name == "Remote").unwrap();

    assert!(main.owns(&AssetId::from("T")));
    assert_eq!(remote.redirect_for(&AssetId::from("T")), Some("main"));
    assert!(remote.owns(&AssetId::from("music")));
    assert!(check_partition(&bundles).is_empty());
  }
}
