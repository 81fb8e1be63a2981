use std::collections::BTreeMap;
use std::collections::HashMap;
use std::path::PathBuf;

use bundlekit_core::diagnostic::Diagnostic;
use bundlekit_core::diagnostic_error;
use bundlekit_core::error::BundlekitError;
use bundlekit_core::types::AssetId;
use bundlekit_filesystem::FileSystemRef;
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::backend::BackendRegistry;
use crate::backend::CompressBackendRef;
use crate::cache_store::compute_cache_key;
use crate::cache_store::CacheEntry;
use crate::cache_store::CacheStore;
use crate::execution_state::ExecutionState;
use crate::job::CompressJob;
use crate::job::JobEvent;
use crate::job::JobOutcome;
use crate::job::JobState;
use crate::overrides::CompressOverrideRef;

#[derive(Clone, Debug)]
pub struct SchedulerOptions {
  /// Upper bound of jobs running at the same time
  pub parallelism: usize,

  /// Upper bound of external tool processes running at the same time
  pub child_process_quota: usize,

  /// User configuration that invalidates every cache entry when it changes
  pub custom_config: BTreeMap<String, serde_json::Value>,
}

impl Default for SchedulerOptions {
  fn default() -> Self {
    SchedulerOptions {
      parallelism: num_cpus::get(),
      child_process_quota: num_cpus::get(),
      custom_config: BTreeMap::new(),
    }
  }
}

#[derive(Debug, Error, PartialEq)]
pub enum CompressError {
  #[error("Texture compression was cancelled after {completed} of {total} jobs")]
  Cancelled { completed: usize, total: usize },
}

impl From<CompressError> for BundlekitError {
  fn from(error: CompressError) -> Self {
    match error {
      CompressError::Cancelled { .. } => BundlekitError::Cancelled,
    }
  }
}

/// The outcome of every job of a scheduler run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CompressReport {
  pub outcomes: Vec<JobOutcome>,
}

impl CompressReport {
  /// Output files per asset, for the jobs that produced one.
  pub fn outputs(&self) -> BTreeMap<AssetId, Vec<PathBuf>> {
    let mut outputs: BTreeMap<AssetId, Vec<PathBuf>> = BTreeMap::new();
    for outcome in &self.outcomes {
      if matches!(outcome.state, JobState::Done | JobState::Cached) {
        outputs
          .entry(outcome.asset_id.clone())
          .or_default()
          .push(outcome.dest_path.clone());
      }
    }
    for paths in outputs.values_mut() {
      paths.sort();
    }
    outputs
  }

  pub fn failed(&self) -> impl Iterator<Item = &JobOutcome> {
    self
      .outcomes
      .iter()
      .filter(|outcome| outcome.state == JobState::Failed)
  }

  pub fn count(&self, state: JobState) -> usize {
    self
      .outcomes
      .iter()
      .filter(|outcome| outcome.state == state)
      .count()
  }

  pub fn is_success(&self) -> bool {
    self.failed().next().is_none()
  }
}

/// Per asset progress of a run, used to decide which cache entries to write.
#[derive(Debug)]
struct AssetProgress {
  input_hash: Option<String>,
  dest_paths: Vec<PathBuf>,
  remaining: usize,
  failed: bool,
}

#[derive(Debug, Default)]
struct RunState {
  total: usize,
  completed: usize,
  assets: HashMap<AssetId, AssetProgress>,
  report: CompressReport,
}

/// Runs compression jobs with bounded concurrency, reusing cached outputs.
///
/// At most one job per asset runs at a time, formats whose backend is not
/// parallel run one job at a time, and external tool processes are capped by
/// the child-process quota.
pub struct CompressScheduler {
  fs: FileSystemRef,
  backends: BackendRegistry,
  overrides: Vec<CompressOverrideRef>,
  cache: CacheStore,
  options: SchedulerOptions,
  events: Option<UnboundedSender<JobEvent>>,
  cancellation: CancellationToken,
}

impl CompressScheduler {
  pub fn new(fs: FileSystemRef, backends: BackendRegistry, cache: CacheStore) -> Self {
    CompressScheduler {
      fs,
      backends,
      overrides: Vec::new(),
      cache,
      options: SchedulerOptions::default(),
      events: None,
      cancellation: CancellationToken::new(),
    }
  }

  pub fn with_options(mut self, options: SchedulerOptions) -> Self {
    self.options = options;
    self
  }

  pub fn with_override(mut self, compress_override: CompressOverrideRef) -> Self {
    self.overrides.push(compress_override);
    self
  }

  /// Sends every job state transition to `events`.
  pub fn with_events(mut self, events: UnboundedSender<JobEvent>) -> Self {
    self.events = Some(events);
    self
  }

  pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
    self.cancellation = cancellation;
    self
  }

  pub fn cache(&self) -> &CacheStore {
    &self.cache
  }

  /// Runs every job to completion and writes the cache file once.
  ///
  /// Failed jobs are reported in the returned [`CompressReport`]. Cancellation
  /// aborts running jobs, keeps the cache entries of fully compressed assets
  /// and returns [`CompressError::Cancelled`].
  #[tracing::instrument(level = "info", skip_all, fields(jobs = jobs.len()))]
  pub async fn run(&mut self, jobs: Vec<CompressJob>) -> Result<CompressReport, CompressError> {
    let mut run = RunState {
      total: jobs.len(),
      ..RunState::default()
    };

    let mut by_asset: BTreeMap<AssetId, Vec<CompressJob>> = BTreeMap::new();
    for job in jobs {
      by_asset.entry(job.asset_id.clone()).or_default().push(job);
    }

    let mut uncached = Vec::new();
    for (asset_id, mut asset_jobs) in by_asset {
      asset_jobs.sort_by(|a, b| {
        a.format()
          .cmp(&b.format())
          .then_with(|| a.dest_path.cmp(&b.dest_path))
      });

      let input_hash =
        match compute_cache_key(&self.fs, &asset_jobs, &self.options.custom_config) {
          Ok(input_hash) => Some(input_hash),
          Err(error) => {
            tracing::warn!("Unable to compute the cache key of {}: {}", asset_id, error);
            None
          }
        };

      if let Some(input_hash) = &input_hash {
        if self.restore_from_cache(&asset_id, input_hash, &asset_jobs) {
          tracing::debug!("Reusing cached compression outputs of {}", asset_id);
          for job in &asset_jobs {
            self.settle(&mut run, job, JobState::Cached, None);
          }
          continue;
        }
      }

      run.assets.insert(
        asset_id,
        AssetProgress {
          input_hash,
          dest_paths: asset_jobs.iter().map(|job| job.dest_path.clone()).collect(),
          remaining: asset_jobs.len(),
          failed: false,
        },
      );
      uncached.extend(asset_jobs);
    }

    let mut queued = Vec::new();
    for job in uncached {
      if self.cancellation.is_cancelled() {
        return Err(self.cancel(&run));
      }

      if self.claimed_by_override(&job).await {
        self.settle(&mut run, &job, JobState::Done, None);
      } else {
        self.emit(&run, &job, JobState::Queued);
        queued.push(job);
      }
    }

    let mut state = ExecutionState::new(queued, self.options.child_process_quota);
    let concurrency = state
      .distinct_pending_assets()
      .min(self.options.parallelism)
      .max(1);
    tracing::debug!("Compressing with up to {} concurrent jobs", concurrency);

    let backends = self.backends.clone();
    let cancellation = self.cancellation.clone();
    let mut tasks = JoinSet::<(CompressJob, anyhow::Result<()>)>::new();

    loop {
      if cancellation.is_cancelled() {
        tasks.abort_all();
        // Wait for the aborted jobs to drop, which kills their child processes
        while tasks.join_next().await.is_some() {}
        return Err(self.cancel(&run));
      }

      while tasks.len() < concurrency {
        let Some(job) = state.next_runnable(|format| backends.capabilities(format)) else {
          break;
        };

        self.emit(&run, &job, JobState::Running);
        let fs = self.fs.clone();
        let backend = backends.get(job.format());
        tasks.spawn(async move {
          let result = run_job(fs, backend, &job).await;
          (job, result)
        });
      }

      if tasks.is_empty() {
        break;
      }

      tokio::select! {
        _ = cancellation.cancelled() => {}
        joined = tasks.join_next() => {
          let Some(joined) = joined else {
            continue;
          };

          let (job, result) = match joined {
            Ok(completed) => completed,
            Err(error) if error.is_panic() => std::panic::resume_unwind(error.into_panic()),
            Err(_) => continue,
          };

          state.finish(&job, backends.capabilities(job.format()));
          match result {
            Ok(()) => self.settle(&mut run, &job, JobState::Done, None),
            Err(error) => {
              let diagnostic = job_diagnostic(error, &job);
              tracing::error!(
                asset = %job.asset_id,
                format = %job.format(),
                "{}",
                BundlekitError::CompressionJob(diagnostic.clone())
              );
              self.settle(&mut run, &job, JobState::Failed, Some(diagnostic));
            }
          }
        }
      }
    }

    self.persist_cache();

    let report = run.report;
    tracing::info!(
      "Compressed {} textures: {} cached, {} failed",
      run.total,
      report.count(JobState::Cached),
      report.count(JobState::Failed)
    );
    Ok(report)
  }

  /// Brings the recorded outputs of a cache hit to where the jobs expect them.
  fn restore_from_cache(
    &mut self,
    asset_id: &AssetId,
    input_hash: &str,
    jobs: &[CompressJob],
  ) -> bool {
    let Some(entry) = self.cache.lookup(asset_id, input_hash) else {
      return false;
    };
    if entry.dest_paths.len() != jobs.len() {
      return false;
    }

    let mut moved = false;
    for (job, recorded) in jobs.iter().zip(&entry.dest_paths) {
      if *recorded == job.dest_path {
        continue;
      }
      if let Err(error) = self.fs.copy(recorded, &job.dest_path) {
        tracing::warn!(
          "Unable to copy cached output {} to {}: {}",
          recorded.display(),
          job.dest_path.display(),
          error
        );
        return false;
      }
      moved = true;
    }

    if moved {
      self.cache.update(
        asset_id.clone(),
        CacheEntry {
          input_hash: input_hash.to_string(),
          dest_paths: jobs.iter().map(|job| job.dest_path.clone()).collect(),
        },
      );
    }
    true
  }

  async fn claimed_by_override(&self, job: &CompressJob) -> bool {
    for compress_override in &self.overrides {
      match compress_override.compress(job).await {
        Ok(true) => return true,
        Ok(false) => {}
        Err(error) => tracing::warn!(
          "Compression override failed for {}, falling back to the built in backends: {}",
          job.asset_id,
          error
        ),
      }
    }
    false
  }

  /// Records a job reaching a terminal state.
  ///
  /// Once every job of an asset succeeded, its cache entry is refreshed. An
  /// asset with a failed job loses its entry.
  fn settle(
    &mut self,
    run: &mut RunState,
    job: &CompressJob,
    state: JobState,
    diagnostic: Option<Diagnostic>,
  ) {
    run.completed += 1;
    self.emit(run, job, state);

    if let Some(progress) = run.assets.get_mut(&job.asset_id) {
      progress.remaining = progress.remaining.saturating_sub(1);
      progress.failed |= state == JobState::Failed;

      if progress.remaining == 0 {
        match (&progress.input_hash, progress.failed) {
          (Some(input_hash), false) => self.cache.update(
            job.asset_id.clone(),
            CacheEntry {
              input_hash: input_hash.clone(),
              dest_paths: progress.dest_paths.clone(),
            },
          ),
          _ => {
            self.cache.remove(&job.asset_id);
          }
        }
      }
    }

    run.report.outcomes.push(JobOutcome {
      asset_id: job.asset_id.clone(),
      format: job.format(),
      dest_path: job.dest_path.clone(),
      state,
      diagnostic,
    });
  }

  fn emit(&self, run: &RunState, job: &CompressJob, state: JobState) {
    let Some(events) = &self.events else {
      return;
    };

    // A dropped receiver only means nobody is listening anymore
    let _ = events.send(JobEvent {
      asset_id: job.asset_id.clone(),
      format: job.format(),
      state,
      completed: run.completed,
      total: run.total,
    });
  }

  fn cancel(&self, run: &RunState) -> CompressError {
    tracing::warn!(
      "Texture compression cancelled after {} of {} jobs",
      run.completed,
      run.total
    );
    self.persist_cache();
    CompressError::Cancelled {
      completed: run.completed,
      total: run.total,
    }
  }

  fn persist_cache(&self) {
    if let Err(error) = self.cache.save() {
      tracing::warn!(
        "Unable to write the compression cache {}: {}",
        self.cache.path().display(),
        error
      );
    }
  }
}

/// Produces the output of a single job.
///
/// A source already in the target format is copied as is when the highest
/// quality is requested, and restored when encoding made it larger.
async fn run_job(
  fs: FileSystemRef,
  backend: Option<CompressBackendRef>,
  job: &CompressJob,
) -> anyhow::Result<()> {
  let same_format = job.options.accepts_source(&job.source_path);

  if same_format && job.options.is_highest_quality() {
    tracing::debug!(
      "Copying {} as is, it is already {} at the highest quality",
      job.source_path.display(),
      job.format()
    );
    fs.copy(&job.source_path, &job.dest_path)?;
    return Ok(());
  }

  let Some(backend) = backend else {
    return Err(diagnostic_error!(
      "No compression backend registered for {}",
      job.format()
    ));
  };

  backend.encode(job).await?;

  if same_format {
    let source_size = fs.file_size(&job.source_path)?;
    let dest_size = fs.file_size(&job.dest_path)?;
    if dest_size > source_size {
      tracing::debug!(
        "Compressed {} is larger than its source ({} > {} bytes), keeping the source",
        job.dest_path.display(),
        dest_size,
        source_size
      );
      fs.copy(&job.source_path, &job.dest_path)?;
    }
  }

  Ok(())
}

fn job_diagnostic(error: anyhow::Error, job: &CompressJob) -> Diagnostic {
  let diagnostic = match error.downcast::<Diagnostic>() {
    Ok(diagnostic) => diagnostic,
    Err(error) => Diagnostic::new(format!("{:#}", error)).with_origin(job.format().name()),
  };

  if diagnostic.asset_id.is_some() {
    diagnostic
  } else {
    diagnostic.with_asset(&job.asset_id)
  }
}
