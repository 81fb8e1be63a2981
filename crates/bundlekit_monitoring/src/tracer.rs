//! Sets up `tracing_subscriber` layers for the log file, standard output and
//! chrome profiles.
use std::collections::HashSet;

use anyhow::anyhow;
use serde::Deserialize;
use serde::Serialize;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::RollingFileAppender;
use tracing_appender::rolling::Rotation;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::prelude::*;
use tracing_subscriber::Layer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Registry;

use crate::from_env::optional_var;
use crate::from_env::FromEnvError;

pub const TRACING_MODE_VAR: &str = "BUNDLEKIT_TRACING_MODE";

const LOG_DIRECTORY: &str = "bundlekit_trace";
const LOG_PREFIX: &str = "bundlekit-tracing";
const MAX_LOG_FILES: usize = 4;

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", tag = "mode")]
pub enum TracerMode {
  /// Output the Tracer logs to Stdout
  Stdout,
  /// Output a Chrome profile
  Chrome,
}

impl TracerMode {
  /// Parses a comma separated list such as `stdout,chrome`.
  ///
  /// `file` is accepted and ignored since the log file is always written.
  pub fn parse_list(value: &str) -> Result<Vec<Self>, FromEnvError> {
    let mut tracer_modes = vec![];
    let mut used_modes = HashSet::new();

    for mode in value.split(',').map(|s| s.trim()) {
      let tracer_mode = match mode {
        "stdout" => TracerMode::Stdout,
        "chrome" => TracerMode::Chrome,
        "file" | "" => continue,
        value => {
          return Err(FromEnvError::InvalidKey(
            String::from(TRACING_MODE_VAR),
            anyhow!("Invalid value: {}", value),
          ))
        }
      };

      if used_modes.insert(mode) {
        tracer_modes.push(tracer_mode);
      }
    }

    Ok(tracer_modes)
  }

  pub fn from_env() -> Result<Vec<Self>, FromEnvError> {
    match optional_var(TRACING_MODE_VAR) {
      Some(value) => Self::parse_list(&value),
      None => Ok(vec![]),
    }
  }
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Flushes its writer when dropped.
enum FlushOnDrop {
  Writer(#[allow(unused)] WorkerGuard),
  Chrome(#[allow(unused)] tracing_chrome::FlushGuard),
}

/// The installed global subscriber and the guards of its writers.
pub struct Tracer {
  #[allow(unused)]
  guards: Vec<FlushOnDrop>,
}

impl Tracer {
  /// Installs the global subscriber. Fails if one is already installed.
  pub fn new(modes: &[TracerMode]) -> anyhow::Result<Self> {
    let mut guards = Vec::new();
    let mut layers: Vec<BoxedLayer> = Vec::new();

    let (writer, guard) = tracing_appender::non_blocking(log_file_appender()?);
    guards.push(FlushOnDrop::Writer(guard));
    layers.push(
      tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_span_events(FmtSpan::CLOSE)
        .with_filter(EnvFilter::from_default_env())
        .boxed(),
    );

    for mode in modes {
      match mode {
        TracerMode::Stdout => {
          let (writer, guard) = tracing_appender::non_blocking(std::io::stdout());
          guards.push(FlushOnDrop::Writer(guard));
          layers.push(
            tracing_subscriber::fmt::layer()
              .with_writer(writer)
              .with_target(false)
              .with_filter(EnvFilter::from_default_env())
              .boxed(),
          );
        }
        TracerMode::Chrome => {
          let (layer, guard) = tracing_chrome::ChromeLayerBuilder::new()
            .include_args(true)
            .build();
          guards.push(FlushOnDrop::Chrome(guard));
          layers.push(layer.boxed());
        }
      }
    }

    tracing::subscriber::set_global_default(Registry::default().with(layers))?;

    Ok(Self { guards })
  }
}

/// Hourly rotated log files in `<tmp>/bundlekit_trace`, keeping the newest few.
fn log_file_appender() -> anyhow::Result<RollingFileAppender> {
  let directory = std::env::temp_dir().join(LOG_DIRECTORY);

  RollingFileAppender::builder()
    .rotation(Rotation::HOURLY)
    .max_log_files(MAX_LOG_FILES)
    .filename_prefix(LOG_PREFIX)
    .build(&directory)
    .map_err(|err| anyhow!("Unable to create log files in {}: {}", directory.display(), err))
}
