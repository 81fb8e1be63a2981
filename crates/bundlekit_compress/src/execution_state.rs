use std::collections::HashMap;
use std::collections::HashSet;

use bundlekit_core::types::AssetId;

use crate::backend::BackendCapabilities;
use crate::format::CompressFormat;
use crate::job::CompressJob;

/// Bookkeeping of queued and running jobs.
///
/// Only touched by the scheduler's control loop between completions.
#[derive(Debug, Default)]
pub struct ExecutionState {
  pending: Vec<CompressJob>,
  busy_assets: HashSet<AssetId>,
  busy_formats: HashMap<CompressFormat, usize>,
  child_processes: usize,
  child_process_quota: usize,
}

impl ExecutionState {
  pub fn new(pending: Vec<CompressJob>, child_process_quota: usize) -> Self {
    ExecutionState {
      pending,
      child_process_quota: child_process_quota.max(1),
      ..Default::default()
    }
  }

  /// Removes and returns the first pending job that may start now, marking it
  /// as running.
  ///
  /// A job may start when no other job of its asset runs, when its format is
  /// parallel or has nothing running, and when a child-process slot is free
  /// if it needs one.
  pub fn next_runnable(
    &mut self,
    capabilities: impl Fn(CompressFormat) -> BackendCapabilities,
  ) -> Option<CompressJob> {
    let index = self.pending.iter().position(|job| {
      let format = job.format();
      let caps = capabilities(format);

      !self.busy_assets.contains(&job.asset_id)
        && (caps.parallel || self.busy_formats.get(&format).copied().unwrap_or(0) == 0)
        && (!caps.child_process || self.child_processes < self.child_process_quota)
    })?;

    let job = self.pending.remove(index);
    let caps = capabilities(job.format());

    self.busy_assets.insert(job.asset_id.clone());
    *self.busy_formats.entry(job.format()).or_default() += 1;
    if caps.child_process {
      self.child_processes += 1;
    }

    Some(job)
  }

  /// Releases everything a finished job was holding.
  pub fn finish(&mut self, job: &CompressJob, capabilities: BackendCapabilities) {
    self.busy_assets.remove(&job.asset_id);
    if let Some(count) = self.busy_formats.get_mut(&job.format()) {
      *count = count.saturating_sub(1);
    }
    if capabilities.child_process {
      self.child_processes = self.child_processes.saturating_sub(1);
    }
  }

  pub fn distinct_pending_assets(&self) -> usize {
    self
      .pending
      .iter()
      .map(|job| &job.asset_id)
      .collect::<HashSet<_>>()
      .len()
  }
}
