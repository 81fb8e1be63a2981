use std::sync::Arc;

use async_trait::async_trait;

use crate::job::CompressJob;

pub type CompressOverrideRef = Arc<dyn CompressOverride>;

/// An integration that may compress a job itself before the scheduler does.
///
/// Overrides run in registration order; the first one to claim a job wins and
/// the job is not queued.
#[mockall::automock]
#[async_trait]
pub trait CompressOverride: Send + Sync {
  /// Returns `true` when the job was handled and its output written.
  async fn compress(&self, job: &CompressJob) -> anyhow::Result<bool>;
}
