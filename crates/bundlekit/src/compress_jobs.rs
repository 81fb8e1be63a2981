use std::collections::BTreeMap;

use bundlekit_compress::format::FormatOptions;
use bundlekit_compress::CompressJob;
use bundlekit_core::asset_graph::AssetGraphProvider;
use bundlekit_core::types::AssetKind;
use bundlekit_core::types::Bundle;

pub const NATIVE_DIR: &str = "native";

/// Plans one compression job per output format for every image owned by a
/// bundle that is written by this build.
///
/// Outputs land in `<bundle dest>/native/<asset id>.<extension>`. Images
/// without a preset are left alone; a preset name that is not configured is
/// reported and skipped.
#[tracing::instrument(level = "debug", skip_all)]
pub async fn plan_compress_jobs(
  provider: &(dyn AssetGraphProvider + Send + Sync),
  bundles: &[Bundle],
  presets: &BTreeMap<String, Vec<FormatOptions>>,
) -> Vec<CompressJob> {
  let mut jobs = Vec::new();

  for bundle in bundles.iter().filter(|bundle| bundle.output) {
    let native_dir = bundle.output_manifest.dest_dir.join(NATIVE_DIR);

    for asset_id in &bundle.assets {
      let Some(asset) = provider.get_asset(asset_id).await else {
        continue;
      };
      if asset.kind != AssetKind::Image {
        continue;
      }
      let Some(preset_name) = &asset.compress_preset else {
        continue;
      };
      let Some(preset) = presets.get(preset_name) else {
        tracing::warn!(
          "Unknown compression preset {} for {}, skipping",
          preset_name,
          asset.url
        );
        continue;
      };

      for options in preset {
        let dest_path = native_dir.join(format!("{}.{}", asset_id, options.extension()));
        jobs.push(CompressJob::new(
          asset_id.clone(),
          asset.source_path.clone(),
          dest_path,
          options.clone(),
        ));
      }
    }
  }

  jobs
}

#[cfg(test)]
mod tests {
  use std::path::PathBuf;

  use bundlekit_compress::format::AstcOptions;
  use bundlekit_compress::format::QualityOptions;
  use bundlekit_core::asset_graph::InMemoryAssetGraph;
  use bundlekit_core::types::AssetId;
  use bundlekit_core::types::AssetInfo;
  use bundlekit_core::types::BundleOutput;
  use pretty_assertions::assert_eq;
  use tracing_test::traced_test;

  use super::*;

  fn image(id: &str, preset: Option<&str>) -> AssetInfo {
    AssetInfo {
      source_path: PathBuf::from(format!("/project/assets/{id}.png")),
      compress_preset: preset.map(String::from),
      ..AssetInfo::new(id, format!("db://assets/{id}.png"), AssetKind::Image)
    }
  }

  fn bundle(name: &str, output: bool, assets: &[&str]) -> Bundle {
    Bundle {
      output,
      assets: assets.iter().map(|a| AssetId::from(*a)).collect(),
      output_manifest: BundleOutput::in_dir(PathBuf::from(format!("/build/{name}"))),
      ..Bundle::new(name, 1)
    }
  }

  #[tokio::test]
  #[traced_test]
  async fn plans_jobs_for_images_with_a_preset() {
    let graph = InMemoryAssetGraph::from_assets([
      image("a", Some("default")),
      image("b", None),
      image("c", Some("missing")),
      image("d", Some("default")),
      AssetInfo::new("s", "db://assets/s.scene", AssetKind::Scene),
    ]);
    let presets = BTreeMap::from([(
      "default".to_string(),
      vec![
        FormatOptions::Jpg(QualityOptions { quality: 80 }),
        FormatOptions::Astc(AstcOptions::default()),
      ],
    )]);
    let bundles = vec![
      bundle("main", true, &["a", "b", "c", "s"]),
      bundle("skipped", false, &["d"]),
    ];

    let jobs = plan_compress_jobs(&graph, &bundles, &presets).await;

    assert_eq!(
      jobs
        .iter()
        .map(|job| (job.asset_id.to_string(), job.dest_path.clone()))
        .collect::<Vec<_>>(),
      vec![
        ("a".to_string(), PathBuf::from("/build/main/native/a.jpg")),
        ("a".to_string(), PathBuf::from("/build/main/native/a.astc")),
      ]
    );
    assert_eq!(jobs[0].source_path, PathBuf::from("/project/assets/a.png"));
    assert!(logs_contain("Unknown compression preset missing"));
  }
}
