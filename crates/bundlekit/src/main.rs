use std::path::PathBuf;
use std::sync::Arc;

use bundlekit::config::BuildOptions;
use bundlekit::config::DEFAULT_CONFIG_FILE;
use bundlekit::BuildError;
use bundlekit::BuildSummary;
use bundlekit::Bundlekit;
use bundlekit_compress::JobEvent;
use bundlekit_filesystem::FileSystemRef;
use bundlekit_filesystem::OsFileSystem;
use bundlekit_monitoring::MonitoringOptions;
use bundlekit_monitoring::TracerMode;
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::error;
use tracing::info;
use tracing::warn;

/// Exit code of a build stopped by a second Ctrl-C
const INTERRUPTED_EXIT_CODE: i32 = 130;

#[derive(Debug, Parser)]
#[command(name = "bundlekit", version, about)]
struct Cli {
  #[clap(subcommand)]
  command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
  /// Resolve bundles, compress textures and write bundle manifests
  Build(BuildArgs),
}

#[derive(Debug, Args)]
struct BuildArgs {
  /// Build configuration file
  #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
  config: PathBuf,

  /// Exported asset database, overrides the config file
  #[arg(long)]
  assets: Option<PathBuf>,

  /// Output directory, overrides the config file
  #[arg(short, long)]
  out: Option<PathBuf>,

  /// Compression cache file, overrides the config file
  #[arg(long)]
  cache: Option<PathBuf>,

  /// Maximum number of concurrent compression jobs
  #[arg(long, env = "BUNDLEKIT_THREADS")]
  threads: Option<usize>,

  /// Exit with an error when any texture failed to compress
  #[arg(long)]
  fail_on_compress_error: bool,

  /// Write a JSON summary of the build to this file
  #[arg(long)]
  report: Option<PathBuf>,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() {
  initialize_tracing();

  let cli = Cli::parse();
  let exit_code = match cli.command {
    Command::Build(args) => build(args).await,
  };

  bundlekit_monitoring::close_monitoring();
  std::process::exit(exit_code);
}

async fn build(args: BuildArgs) -> i32 {
  let fs: FileSystemRef = Arc::new(OsFileSystem);

  let cancellation = CancellationToken::new();
  tokio::spawn({
    let cancellation = cancellation.clone();
    async move {
      while tokio::signal::ctrl_c().await.is_ok() {
        if let Some(exit_code) = on_interrupt(&cancellation) {
          bundlekit_monitoring::close_monitoring();
          std::process::exit(exit_code);
        }
      }
    }
  });

  let (summary, exit_code) = match run_build(&fs, &args, cancellation).await {
    Ok(summary) => {
      info!(
        "Built {} bundles: {} textures compressed, {} cached, {} failed",
        summary.bundles.len(),
        summary.compressed,
        summary.cached,
        summary.failed.len()
      );
      let exit_code = if !summary.success && args.fail_on_compress_error {
        1
      } else {
        0
      };
      (summary, exit_code)
    }
    Err(err) => {
      error!("Failed to run bundlekit: {:#}", err);
      let exit_code = BuildError::from(&err).exit_code();
      (BuildSummary::from_error(&err), exit_code)
    }
  };

  if let Some(report) = &args.report {
    let written = serde_json::to_vec_pretty(&summary)
      .map_err(anyhow::Error::from)
      .and_then(|contents| fs.write(report, &contents).map_err(anyhow::Error::from));
    if let Err(err) = written {
      error!("Unable to write the build report {}: {}", report.display(), err);
    }
  }

  exit_code
}

async fn run_build(
  fs: &FileSystemRef,
  args: &BuildArgs,
  cancellation: CancellationToken,
) -> anyhow::Result<BuildSummary> {
  let mut options = if fs.is_file(&args.config) {
    BuildOptions::load(fs, &args.config)?
  } else {
    warn!(
      "No config file at {}, using the default bundles",
      args.config.display()
    );
    BuildOptions::default()
  };

  if let Some(assets) = &args.assets {
    options.assets = Some(assets.clone());
  }
  if let Some(out) = &args.out {
    options.output_dir = Some(out.clone());
  }
  if let Some(cache) = &args.cache {
    options.cache_path = Some(cache.clone());
  }
  if args.threads.is_some() {
    options.threads = args.threads;
  }

  let events = spawn_progress_logger();

  let result = Bundlekit::from_asset_database(fs.clone(), options)?
    .with_cancellation(cancellation)
    .with_events(events)
    .build()
    .await?;

  Ok(result.summary())
}

/// The first Ctrl-C cancels the build, a second one asks to exit right away
/// with the returned code.
fn on_interrupt(cancellation: &CancellationToken) -> Option<i32> {
  if cancellation.is_cancelled() {
    warn!("Interrupted again, exiting without waiting for the build");
    return Some(INTERRUPTED_EXIT_CODE);
  }

  warn!("Interrupted, cancelling the build. Press Ctrl-C again to exit immediately");
  cancellation.cancel();
  None
}

fn spawn_progress_logger() -> UnboundedSender<JobEvent> {
  let (events, mut receiver) = tokio::sync::mpsc::unbounded_channel::<JobEvent>();
  tokio::spawn(async move {
    while let Some(event) = receiver.recv().await {
      tracing::debug!(
        "[{}/{}] {} {} {:?}",
        event.completed,
        event.total,
        event.asset_id,
        event.format,
        event.state
      );
    }
  });
  events
}

fn initialize_tracing() {
  if std::env::var("RUST_LOG").is_err() {
    std::env::set_var("RUST_LOG", "info");
  }

  let mut options = MonitoringOptions::from_env().unwrap_or_else(|err| {
    eprintln!("{}", err);
    MonitoringOptions::default()
  });
  if options.tracing_options.is_empty() {
    options.tracing_options.push(TracerMode::Stdout);
  }
  if let Err(err) = bundlekit_monitoring::initialize_monitoring(options) {
    eprintln!("Failed to initialize tracing: {}", err);
  }
}
