use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use nougat_checkpoint::config::AppConfig;
use nougat_checkpoint::experiment::{self, ExperimentConfig, RunIdentity};
use nougat_checkpoint::layout::TrainingCheckpointLayout;
use nougat_checkpoint::Resolver;

/// Provision Nougat checkpoints and prepare training runs.
#[derive(Parser)]
#[command(name = "nougat-checkpoint", version, about)]
struct Cli {
    /// Path to TOML tool configuration
    #[arg(long, global = true, default_value = "nougat.toml")]
    settings: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Locate the checkpoint directory, downloading it if incomplete
    Resolve {
        /// Checkpoint directory (or a file inside it)
        #[arg(long)]
        checkpoint: Option<PathBuf>,

        /// Never download; just report the resolved path
        #[arg(long)]
        no_download: bool,

        /// Hide download progress bars
        #[arg(long)]
        quiet: bool,
    },

    /// Create the run directory for an experiment and snapshot its config
    InitRun {
        /// Experiment config file
        #[arg(long)]
        config: PathBuf,

        /// Run version; defaults to the current local time
        #[arg(long)]
        exp_version: Option<String>,

        #[arg(long)]
        debug: bool,

        #[arg(long)]
        job: Option<u64>,

        /// Config overrides as key=value (dotted keys reach nested tables)
        #[arg(long = "set", value_name = "KEY=VALUE")]
        overrides: Vec<String>,
    },

    /// Show which files a training checkpoint path resolves to
    Inspect { path: PathBuf },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("nougat_checkpoint=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let app_config = AppConfig::load_or_default(&cli.settings)
        .with_context(|| format!("loading config from {}", cli.settings.display()))?;

    let command = cli.command.unwrap_or(Command::Resolve {
        checkpoint: None,
        no_download: false,
        quiet: false,
    });

    match command {
        Command::Resolve {
            checkpoint,
            no_download,
            quiet,
        } => run_resolve(app_config, checkpoint, !no_download, quiet),
        Command::InitRun {
            config,
            exp_version,
            debug,
            job,
            overrides,
        } => run_init(config, exp_version, debug, job, &overrides),
        Command::Inspect { path } => run_inspect(path),
    }
}

fn run_resolve(
    mut app_config: AppConfig,
    checkpoint: Option<PathBuf>,
    allow_download: bool,
    quiet: bool,
) -> Result<()> {
    if quiet {
        app_config.resolver.fetch.quiet = true;
    }
    let resolver =
        Resolver::from_config(&app_config.resolver).context("setting up checkpoint resolver")?;
    let outcome = resolver
        .resolve(checkpoint.as_deref(), allow_download)
        .context("resolving nougat checkpoint")?;
    println!("{}", outcome.path.display());
    Ok(())
}

fn run_init(
    config_path: PathBuf,
    exp_version: Option<String>,
    debug: bool,
    job: Option<u64>,
    overrides: &[String],
) -> Result<()> {
    let mut config = ExperimentConfig::load(&config_path, overrides)
        .with_context(|| format!("loading experiment config from {}", config_path.display()))?;
    config.debug = debug;
    config.job = job;

    let identity = RunIdentity::new(
        &config_path,
        &config,
        exp_version.as_deref(),
        chrono::Local::now(),
    );
    identity.apply(&mut config);
    let run_dir = identity.run_dir(&config.result_path);

    if let Some(resume) = &config.resume_from_checkpoint_path {
        let layout = TrainingCheckpointLayout::locate(resume);
        let missing = layout.missing_files();
        if !missing.is_empty() {
            tracing::warn!(?missing, "resume checkpoint is incomplete");
        }
    }

    experiment::save_config_snapshot(&run_dir, &config, experiment::current_rank())
        .with_context(|| format!("saving config snapshot to {}", run_dir.display()))?;
    println!("{}", run_dir.display());
    Ok(())
}

fn run_inspect(path: PathBuf) -> Result<()> {
    let layout = TrainingCheckpointLayout::locate(&path);
    let report = serde_json::json!({
        "layout": layout,
        "missing": layout.missing_files(),
    });
    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("encoding layout report")?
    );
    Ok(())
}
