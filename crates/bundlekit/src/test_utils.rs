use std::collections::BTreeMap;
use std::io::Cursor;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use bundlekit_compress::format::FormatOptions;
use bundlekit_compress::format::QualityOptions;
use bundlekit_core::asset_graph::AssetGraphProviderRef;
use bundlekit_core::asset_graph::InMemoryAssetGraph;
use bundlekit_core::types::AssetInfo;
use bundlekit_core::types::AssetKind;
use bundlekit_core::types::BuiltinBundle;
use bundlekit_core::types::BundleDeclaration;
use bundlekit_filesystem::FileSystem;
use bundlekit_filesystem::FileSystemRef;
use bundlekit_filesystem::InMemoryFileSystem;
use image::DynamicImage;
use image::ImageFormat;
use image::Rgba;
use image::RgbaImage;

use crate::config::BuildOptions;

pub(crate) struct TestProject {
  pub fs: Arc<InMemoryFileSystem>,
  pub graph: Arc<InMemoryAssetGraph>,
  pub options: BuildOptions,
}

impl TestProject {
  pub fn fs(&self) -> FileSystemRef {
    self.fs.clone()
  }

  pub fn provider(&self) -> AssetGraphProviderRef {
    self.graph.clone()
  }

  pub fn options(&self) -> BuildOptions {
    self.options.clone()
  }
}

pub(crate) fn png_bytes() -> Vec<u8> {
  let img = RgbaImage::from_pixel(8, 8, Rgba([20, 120, 220, 255]));
  let mut bytes = Vec::new();
  DynamicImage::ImageRgba8(img)
    .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
    .unwrap();
  bytes
}

/// A `menu` scene in main and a `level` scene in a remote bundle, both using
/// the texture `T`.
pub(crate) fn main_and_remote_project() -> TestProject {
  let fs = Arc::new(InMemoryFileSystem::default());
  fs.write(Path::new("/project/assets/textures/t.png"), &png_bytes())
    .unwrap();

  let graph = InMemoryAssetGraph::from_assets([
    AssetInfo::new("menu", "db://assets/scenes/menu.scene", AssetKind::Scene).with_dependencies(&["T"]),
    AssetInfo::new("level", "db://assets/remote/level.scene", AssetKind::Scene)
      .with_dependencies(&["T"]),
    AssetInfo {
      source_path: PathBuf::from("/project/assets/textures/t.png"),
      compress_preset: Some("default".into()),
      ..AssetInfo::new("T", "db://assets/textures/t.png", AssetKind::Image)
    },
  ]);

  let options = BuildOptions {
    output_dir: Some(PathBuf::from("/build")),
    bundles: vec![
      BundleDeclaration::builtin(BuiltinBundle::Main),
      BundleDeclaration::custom("Remote", "db://assets/remote")
        .with_priority(3)
        .remote(),
    ],
    compress_presets: BTreeMap::from([(
      "default".to_string(),
      vec![FormatOptions::Jpg(QualityOptions { quality: 80 })],
    )]),
    threads: Some(2),
    ..BuildOptions::default()
  };

  TestProject {
    fs,
    graph: Arc::new(graph),
    options,
  }
}
