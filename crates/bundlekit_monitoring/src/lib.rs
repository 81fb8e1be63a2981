//! Configures tracing for bundlekit binaries.
//!
//! A rolling log file is always written; stdout and chrome profile output are
//! enabled through `BUNDLEKIT_TRACING_MODE`.
//!
//! Monitoring should only be initialized once.
use std::sync::Mutex;

pub use from_env::FromEnvError;
pub use tracer::Tracer;
pub use tracer::TracerMode;
pub use tracer::TRACING_MODE_VAR;

mod from_env;
mod tracer;

/// The installed tracer, kept alive until [`close_monitoring`].
static TRACER: Mutex<Option<Tracer>> = Mutex::new(None);

#[derive(Debug, Default)]
pub struct MonitoringOptions {
  pub tracing_options: Vec<TracerMode>,
}

impl MonitoringOptions {
  pub fn from_env() -> Result<Self, FromEnvError> {
    Ok(Self {
      tracing_options: TracerMode::from_env()?,
    })
  }
}

pub fn initialize_monitoring(options: MonitoringOptions) -> anyhow::Result<()> {
  let mut installed = TRACER
    .lock()
    .map_err(|_| anyhow::anyhow!("Tracer lock is poisoned"))?;
  if installed.is_some() {
    tracing::warn!("Tracing is already initialized, ignoring {:?}", options);
    return Ok(());
  }

  *installed = Some(Tracer::new(&options.tracing_options)?);
  Ok(())
}

/// Drops the tracing writers, flushing buffered log lines and the chrome profile.
pub fn close_monitoring() {
  if let Ok(mut installed) = TRACER.lock() {
    if installed.take().is_some() {
      tracing::debug!("Flushed tracing output");
    }
  }
}
