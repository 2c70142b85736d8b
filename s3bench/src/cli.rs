use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::Result;
use argh::FromArgs;
use s3bench_core::Preset;

use crate::config::Config;
use crate::{console, diagnostics, observability, run};

/// Latency and throughput benchmark for S3-compatible object storage.
#[derive(Debug, FromArgs)]
struct Args {
    /// path to the YAML configuration file
    #[argh(option, short = 'c')]
    pub config: Option<PathBuf>,

    #[argh(subcommand)]
    pub command: Command,
}

#[derive(Debug, FromArgs)]
#[argh(subcommand)]
enum Command {
    Run(RunCommand),
    Presets(PresetsCommand),
    Version(VersionCommand),
}

/// run the configured sweep
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "run")]
struct RunCommand {
    /// run a named preset instead of the configured sweep
    #[argh(option)]
    preset: Option<Preset>,
}

/// list the named sweep presets
#[derive(Default, Debug, FromArgs)]
#[argh(subcommand, name = "presets")]
struct PresetsCommand {}

/// print the s3bench version
#[derive(Default, Debug, FromArgs)]
#[argh(subcommand, name = "version")]
struct VersionCommand {}

/// Bootstrap the runtime and execute the CLI command.
pub fn execute() -> Result<()> {
    let args: Args = argh::from_env();

    if !std::io::stdout().is_terminal() {
        yansi::disable();
    }

    let preset = match args.command {
        Command::Version(_) => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        Command::Presets(_) => {
            console::print_presets();
            return Ok(());
        }
        Command::Run(RunCommand { preset }) => preset,
    };

    let config = Config::load(args.config.as_deref())?;

    // Sentry should be initialized before creating the async runtime.
    let _sentry_guard = observability::init_sentry(&config);
    observability::init_tracing(&config);
    tracing::debug!(?config);

    // Threads inherit the affinity, so pin before the runtime spawns its workers.
    diagnostics::apply_cpu_affinity(&config);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .thread_name("s3bench-rt")
        .enable_all()
        .worker_threads(config.runtime.worker_threads.max(1))
        .build()?;

    let plan = match preset {
        Some(preset) => preset.plan(),
        None => config.sweep.plan(),
    };

    let result = runtime.block_on(run::run(config, plan));
    if let Err(ref err) = result {
        tracing::error!("benchmark failed: {err:#}");
    }
    result
}
