use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;
use std::time::UNIX_EPOCH;

use bundlekit_core::error::BundlekitError;
use bundlekit_core::hash::hash_serialized;
use bundlekit_core::types::AssetId;
use bundlekit_filesystem::FileSystemRef;
use serde::Deserialize;
use serde::Serialize;

use crate::format::FormatOptions;
use crate::job::CompressJob;

pub const CACHE_FILE_VERSION: u32 = 1;

/// What was produced for an asset the last time its jobs all succeeded.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
  pub input_hash: String,

  /// One output per job, in the job order used to compute `input_hash`
  pub dest_paths: Vec<PathBuf>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct CacheFile {
  version: u32,
  entries: BTreeMap<AssetId, CacheEntry>,
}

/// The compression cache, persisted as a single JSON file.
///
/// The file is read once when the store is loaded and written once at the end
/// of a scheduler run.
#[derive(Debug)]
pub struct CacheStore {
  fs: FileSystemRef,
  path: PathBuf,
  entries: BTreeMap<AssetId, CacheEntry>,
}

impl CacheStore {
  pub fn empty(fs: FileSystemRef, path: PathBuf) -> Self {
    CacheStore {
      fs,
      path,
      entries: BTreeMap::new(),
    }
  }

  /// Loads the cache file at `path`.
  ///
  /// A missing file is a cold cache. An unreadable or corrupted file is logged
  /// and also treated as a cold cache.
  #[tracing::instrument(level = "debug", skip(fs))]
  pub fn load(fs: FileSystemRef, path: PathBuf) -> Self {
    if !fs.is_file(&path) {
      tracing::debug!("No compression cache at {}", path.display());
      return Self::empty(fs, path);
    }

    match read_cache_file(&fs, &path) {
      Ok(entries) => CacheStore { fs, path, entries },
      Err(error) => {
        tracing::warn!("{}", error);
        Self::empty(fs, path)
      }
    }
  }

  pub fn get(&self, asset_id: &AssetId) -> Option<&CacheEntry> {
    self.entries.get(asset_id)
  }

  /// Returns the entry for `asset_id` if it was recorded for `input_hash` and
  /// every recorded output still exists.
  pub fn lookup(&self, asset_id: &AssetId, input_hash: &str) -> Option<&CacheEntry> {
    self.entries.get(asset_id).filter(|entry| {
      entry.input_hash == input_hash && entry.dest_paths.iter().all(|dest| self.fs.is_file(dest))
    })
  }

  pub fn update(&mut self, asset_id: AssetId, entry: CacheEntry) {
    self.entries.insert(asset_id, entry);
  }

  pub fn remove(&mut self, asset_id: &AssetId) -> Option<CacheEntry> {
    self.entries.remove(asset_id)
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  #[tracing::instrument(level = "debug", skip_all)]
  pub fn save(&self) -> anyhow::Result<()> {
    let file = CacheFile {
      version: CACHE_FILE_VERSION,
      entries: self.entries.clone(),
    };
    let contents = serde_json::to_vec_pretty(&file)?;
    self.fs.write(&self.path, &contents)?;

    tracing::debug!(
      "Wrote {} compression cache entries to {}",
      self.entries.len(),
      self.path.display()
    );
    Ok(())
  }
}

fn read_cache_file(
  fs: &FileSystemRef,
  path: &Path,
) -> Result<BTreeMap<AssetId, CacheEntry>, BundlekitError> {
  let contents = fs
    .read_to_string(path)
    .map_err(|error| BundlekitError::CacheCorruption(format!("{}: {}", path.display(), error)))?;

  let file: CacheFile = serde_json::from_str(&contents)
    .map_err(|error| BundlekitError::CacheCorruption(format!("{}: {}", path.display(), error)))?;

  if file.version != CACHE_FILE_VERSION {
    return Err(BundlekitError::CacheCorruption(format!(
      "{}: unsupported cache version {}",
      path.display(),
      file.version
    )));
  }

  Ok(file.entries)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CacheKeyInputs<'a> {
  source_mtime_ms: u128,
  source_path: &'a Path,
  options: Vec<&'a FormatOptions>,
  mipmap_sources: Vec<&'a Path>,
  custom_config: &'a BTreeMap<String, serde_json::Value>,
}

/// Computes the cache key of an asset from its jobs.
///
/// The key covers the source modification time and path, the options of every
/// output format and the user's custom config. `jobs` must all belong to the
/// same asset and be in a stable order.
pub fn compute_cache_key(
  fs: &FileSystemRef,
  jobs: &[CompressJob],
  custom_config: &BTreeMap<String, serde_json::Value>,
) -> anyhow::Result<String> {
  let Some(first) = jobs.first() else {
    anyhow::bail!("Cannot compute a cache key without jobs");
  };

  let source_mtime_ms = fs
    .modified(&first.source_path)?
    .duration_since(UNIX_EPOCH)?
    .as_millis();

  hash_serialized(&CacheKeyInputs {
    source_mtime_ms,
    source_path: &first.source_path,
    options: jobs.iter().map(|job| &job.options).collect(),
    mipmap_sources: first
      .mipmap_sources
      .iter()
      .map(|path| path.as_path())
      .collect(),
    custom_config,
  })
}
