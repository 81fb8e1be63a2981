use std::path::PathBuf;
use std::sync::Arc;

use bundlekit_bundling::bundle;
use bundlekit_bundling::explain_redirect;
use bundlekit_bundling::BundleGraphBuilderOptions;
use bundlekit_compress::backend::BackendRegistry;
use bundlekit_compress::overrides::CompressOverrideRef;
use bundlekit_compress::CacheStore;
use bundlekit_compress::CompressJob;
use bundlekit_compress::CompressReport;
use bundlekit_compress::CompressScheduler;
use bundlekit_compress::JobEvent;
use bundlekit_compress::JobState;
use bundlekit_core::asset_graph::AssetGraphProviderRef;
use bundlekit_core::asset_graph::InMemoryAssetGraph;
use bundlekit_core::diagnostic::Diagnostic;
use bundlekit_core::error::BundlekitError;
use bundlekit_core::types::Bundle;
use bundlekit_filesystem::FileSystemRef;
use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

use crate::compress_jobs::plan_compress_jobs;
use crate::config::BuildOptions;
use crate::error::BuildError;
use crate::manifest::write_manifest;

/// Runs a whole build: bundle graph, redirects, texture compression and the
/// bundle manifests.
pub struct Bundlekit {
  pub fs: FileSystemRef,
  pub provider: AssetGraphProviderRef,
  pub options: BuildOptions,
  backends: BackendRegistry,
  overrides: Vec<CompressOverrideRef>,
  cancellation: CancellationToken,
  events: Option<UnboundedSender<JobEvent>>,
}

#[derive(Debug)]
pub struct BuildResult {
  /// Every bundle in resolution order
  pub bundles: Vec<Bundle>,
  pub report: CompressReport,
  pub manifests: Vec<PathBuf>,
}

impl BuildResult {
  pub fn bundle(&self, name: &str) -> Option<&Bundle> {
    self.bundles.iter().find(|bundle| bundle.name == name)
  }

  pub fn summary(&self) -> BuildSummary {
    BuildSummary {
      success: self.report.is_success(),
      bundles: self
        .bundles
        .iter()
        .filter(|bundle| bundle.output)
        .map(|bundle| bundle.name.clone())
        .collect(),
      compressed: self.report.count(JobState::Done),
      cached: self.report.count(JobState::Cached),
      failed: self
        .report
        .failed()
        .filter_map(|outcome| outcome.diagnostic.clone())
        .collect(),
      error: None,
    }
  }
}

/// Machine readable outcome of a build, written by `bundlekit build --report`.
#[derive(Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildSummary {
  pub success: bool,
  pub bundles: Vec<String>,
  pub compressed: usize,
  pub cached: usize,
  pub failed: Vec<Diagnostic>,
  pub error: Option<BuildError>,
}

impl BuildSummary {
  pub fn from_error(error: &anyhow::Error) -> Self {
    BuildSummary {
      error: Some(BuildError::from(error)),
      ..BuildSummary::default()
    }
  }
}

impl Bundlekit {
  pub fn new(fs: FileSystemRef, provider: AssetGraphProviderRef, options: BuildOptions) -> Self {
    let backends = BackendRegistry::with_defaults(fs.clone(), &options.tools);

    Bundlekit {
      fs,
      provider,
      options,
      backends,
      overrides: Vec::new(),
      cancellation: CancellationToken::new(),
      events: None,
    }
  }

  /// Creates a build whose asset graph is read from the asset database file
  /// named in `options`.
  pub fn from_asset_database(fs: FileSystemRef, options: BuildOptions) -> anyhow::Result<Self> {
    let Some(path) = &options.assets else {
      anyhow::bail!("No asset database configured, set \"assets\" or pass --assets");
    };

    let graph = InMemoryAssetGraph::from_json(&fs.read_to_string(path)?)?;
    tracing::info!("Loaded {} assets from {}", graph.len(), path.display());

    Ok(Self::new(fs, Arc::new(graph), options))
  }

  pub fn with_backends(mut self, backends: BackendRegistry) -> Self {
    self.backends = backends;
    self
  }

  pub fn with_override(mut self, compress_override: CompressOverrideRef) -> Self {
    self.overrides.push(compress_override);
    self
  }

  pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
    self.cancellation = cancellation;
    self
  }

  pub fn with_events(mut self, events: UnboundedSender<JobEvent>) -> Self {
    self.events = Some(events);
    self
  }

  #[tracing::instrument(level = "info", skip_all)]
  pub async fn build(&self) -> anyhow::Result<BuildResult> {
    let provider = self.provider.as_ref();

    tracing::info!("Building bundle graph");
    let mut bundles = bundle(
      provider,
      &self.options.bundles,
      BundleGraphBuilderOptions {
        output_dir: self.options.output_dir(),
        start_scene: self.options.start_scene.clone(),
      },
    )
    .await?;
    self.explain_redirects(&bundles).await;

    tracing::info!("Compressing textures");
    let jobs = plan_compress_jobs(provider, &bundles, &self.options.compress_presets).await;
    let report = self.compress(jobs).await?;

    for (asset_id, paths) in report.outputs() {
      if let Some(owner) = bundles.iter_mut().find(|bundle| bundle.owns(&asset_id)) {
        owner.output_manifest.compressed.insert(asset_id, paths);
      }
    }

    tracing::info!("Writing bundle manifests");
    let mut manifests = Vec::new();
    for bundle in bundles.iter().filter(|bundle| bundle.output) {
      manifests.push(write_manifest(&self.fs, bundle)?);
    }

    Ok(BuildResult {
      bundles,
      report,
      manifests,
    })
  }

  async fn compress(&self, jobs: Vec<CompressJob>) -> anyhow::Result<CompressReport> {
    let cache = CacheStore::load(self.fs.clone(), self.options.cache_path());

    let mut scheduler = CompressScheduler::new(self.fs.clone(), self.backends.clone(), cache)
      .with_options(self.options.scheduler_options())
      .with_cancellation(self.cancellation.clone());
    for compress_override in &self.overrides {
      scheduler = scheduler.with_override(compress_override.clone());
    }
    if let Some(events) = &self.events {
      scheduler = scheduler.with_events(events.clone());
    }

    let report = scheduler.run(jobs).await.map_err(BundlekitError::from)?;
    Ok(report)
  }

  async fn explain_redirects(&self, bundles: &[Bundle]) {
    if !tracing::enabled!(tracing::Level::DEBUG) {
      return;
    }

    for bundle in bundles {
      for (asset_id, owner) in &bundle.redirects {
        let users = explain_redirect(self.provider.as_ref(), bundle, asset_id).await;
        let users: Vec<String> = users.iter().map(|user| user.to_string()).collect();
        tracing::debug!(
          "Bundle {} loads {} from {}, used by {}",
          bundle.name,
          asset_id,
          owner,
          users.join(", ")
        );
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use std::path::Path;

  use bundlekit_core::error::ConfigError;
  use bundlekit_core::types::AssetId;
  use bundlekit_filesystem::FileSystem;
  use pretty_assertions::assert_eq;

  use super::*;
  use crate::manifest::BundleManifest;
  use crate::test_utils::main_and_remote_project;

  #[tokio::test]
  async fn builds_main_and_remote_bundles() {
    let project = main_and_remote_project();

    let result = Bundlekit::new(project.fs(), project.provider(), project.options())
      .build()
      .await
      .unwrap();

    let main = result.bundle("main").unwrap();
    let remote = result.bundle("Remote").unwrap();
    assert!(main.owns(&AssetId::from("T")));
    assert_eq!(remote.redirect_for(&AssetId::from("T")), Some("main"));

    let texture = PathBuf::from("/build/main/native/T.jpg");
    assert_eq!(
      main.output_manifest.compressed.get(&AssetId::from("T")),
      Some(&vec![texture.clone()])
    );
    assert!(project.fs.is_file(&texture));
    assert!(result.report.is_success());
    assert_eq!(
      result.summary(),
      BuildSummary {
        success: true,
        bundles: vec!["main".into(), "Remote".into()],
        compressed: 1,
        ..BuildSummary::default()
      }
    );

    assert_eq!(
      result.manifests,
      vec![
        PathBuf::from("/build/main/config.json"),
        PathBuf::from("/build/remote/Remote/config.json"),
      ]
    );
    let remote_manifest: BundleManifest = serde_json::from_slice(
      &project
        .fs
        .read(Path::new("/build/remote/Remote/config.json"))
        .unwrap(),
    )
    .unwrap();
    assert_eq!(
      remote_manifest.redirects.get(&AssetId::from("T")).map(String::as_str),
      Some("main")
    );
  }

  #[tokio::test]
  async fn rebuilding_reuses_compressed_textures() {
    let project = main_and_remote_project();

    let build = || Bundlekit::new(project.fs(), project.provider(), project.options());
    build().build().await.unwrap();
    let second = build().build().await.unwrap();

    assert_eq!(second.report.count(JobState::Cached), 1);
    assert_eq!(second.report.count(JobState::Done), 0);
    assert_eq!(
      second
        .bundle("main")
        .unwrap()
        .output_manifest
        .compressed
        .len(),
      1
    );
  }

  #[tokio::test]
  async fn empty_bundle_configuration_is_fatal() {
    let project = main_and_remote_project();
    let options = BuildOptions {
      bundles: Vec::new(),
      ..project.options()
    };

    let error = Bundlekit::new(project.fs(), project.provider(), options)
      .build()
      .await
      .unwrap_err();

    assert!(matches!(
      error.downcast_ref::<BundlekitError>(),
      Some(BundlekitError::Config(ConfigError::InvalidBundleConfig(_)))
    ));
  }

  #[tokio::test]
  async fn default_options_build_the_builtin_bundles() {
    let project = main_and_remote_project();
    let options = BuildOptions {
      output_dir: Some(PathBuf::from("/build")),
      ..BuildOptions::default()
    };

    let result = Bundlekit::new(project.fs(), project.provider(), options)
      .build()
      .await
      .unwrap();

    let names: Vec<&str> = result
      .bundles
      .iter()
      .map(|bundle| bundle.name.as_str())
      .collect();
    assert_eq!(names, vec!["internal", "resources", "main"]);

    let main = result.bundle("main").unwrap();
    for asset in ["menu", "level", "T"] {
      assert!(main.owns(&AssetId::from(asset)), "main should own {asset}");
    }
    assert!(project.fs.is_file(Path::new("/build/main/config.json")));
  }

  #[tokio::test]
  async fn cancelled_builds_stop_before_writing_manifests() {
    let project = main_and_remote_project();
    let cancellation = CancellationToken::new();
    cancellation.cancel();

    let error = Bundlekit::new(project.fs(), project.provider(), project.options())
      .with_cancellation(cancellation)
      .build()
      .await
      .unwrap_err();

    assert!(matches!(
      error.downcast_ref::<BundlekitError>(),
      Some(BundlekitError::Cancelled)
    ));
    assert!(!project.fs.is_file(Path::new("/build/main/config.json")));
  }

  #[tokio::test]
  async fn loads_the_asset_database_from_the_options() {
    let project = main_and_remote_project();
    project
      .fs
      .write(
        Path::new("/project/library/assets.json"),
        br#"{ "assets": [{ "id": "menu", "url": "db://assets/menu.scene", "kind": "scene" }] }"#,
      )
      .unwrap();
    let options = BuildOptions {
      assets: Some(PathBuf::from("/project/library/assets.json")),
      ..project.options()
    };

    let result = Bundlekit::from_asset_database(project.fs(), options)
      .unwrap()
      .build()
      .await
      .unwrap();

    assert!(result.bundle("main").unwrap().owns(&AssetId::from("menu")));
  }
}
