mod config;
mod logging;
mod models;
mod ports;
mod report;
mod services;
mod sources;
mod subsonic_rs;

#[cfg(test)]
mod test_utils;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::{
    Result,
    eyre::{Context, OptionExt, eyre},
};

use crate::{
    config::Config,
    logging::setup_logging,
    models::SyncOutcome,
    ports::catalog::CatalogClient,
    services::{
        orchestrator::{InclusionFilter, SyncOrchestrator},
        reconcile::{ConvergeError, ConvergeMode, ReconciliationEngine},
        resolver::ResolvePolicy,
        subsonic::client::{AdapterOptions, SubsonicHttpAdapter},
    },
    sources::{CsvSnapshotSource, DiffSource, XlsxDiffSource, snapshot::read_snapshot_csv},
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// The config file to use
    #[arg(short, long, env = "PLAYLIST_SYNC_CONFIG")]
    config: Option<PathBuf>,

    /// Console log level (default: info)
    #[arg(long, default_value = "info", global = true, env = "LOG_LEVEL")]
    log_level: log::LevelFilter,

    /// File log level (default: debug)
    #[arg(long, default_value = "debug", global = true)]
    log_file_level: log::LevelFilter,

    /// Path to log file
    #[arg(long, env = "PLAYLIST_SYNC_LOG_FILE", global = true)]
    log_file: Option<PathBuf>,

    /// Log playlist writes instead of sending them (overrides the config)
    #[arg(long, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Commands,
}

fn is_file(s: &str) -> Result<PathBuf, String> {
    let p: PathBuf = s.into();
    if p.is_file() {
        Ok(p)
    } else {
        Err(format!("`{}` is not an existing file", s))
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PushMode {
    /// Delete and recreate an existing playlist
    Replace,
    /// Leave an existing playlist untouched
    CreateOrSkip,
    /// Add the tracks to an existing playlist
    Append,
}

impl From<PushMode> for ConvergeMode {
    fn from(mode: PushMode) -> Self {
        match mode {
            PushMode::Replace => ConvergeMode::Replace,
            PushMode::CreateOrSkip => ConvergeMode::CreateOrSkip,
            PushMode::Append => ConvergeMode::Append,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(flatten)]
    Run(RunCommands),
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand, Debug)]
enum RunCommands {
    /// Create missing playlists from the latest snapshot, then apply the latest diffs
    Sync,
    /// Create missing playlists from the latest snapshot only
    Init,
    /// Apply the latest diff sheet to existing playlists
    Diff {
        /// Only diff this playlist (exact name)
        #[arg(short, long)]
        name: Option<String>,
    },
    /// Push a single snapshot CSV to one playlist
    Push {
        /// The CSV to read tracks from
        #[arg(long, value_parser = is_file)]
        csv: PathBuf,

        /// The playlist name on the server
        #[arg(short, long)]
        name: String,

        /// What to do when the playlist already exists
        #[arg(long, value_enum, default_value = "create-or-skip")]
        mode: PushMode,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Create a default config file, if it doesn't exist
    CreateDefault,
    /// Print the path to the config file
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    setup_logging(args.log_level, args.log_file.clone(), args.log_file_level)?;

    log::debug!("Playlist sync starting");

    let command = match args.command {
        Commands::Config(command) => return config_command(command),
        Commands::Run(command) => command,
    };

    log::debug!("Loading configuration");
    let mut config = {
        if let Some(config) = &args.config {
            Config::from_file(config)
        } else {
            Config::load()
        }
    }
    .with_context(|| "Failed to load playlist-sync config")?;
    if args.dry_run {
        config.dry_run = true;
    }

    let server = config
        .subsonic_server()
        .with_context(|| "Failed to read Subsonic credentials")?;
    let adapter = SubsonicHttpAdapter::new(server, AdapterOptions::from_config(&config))?;
    let policy = ResolvePolicy {
        prefer_exact: config.prefer_exact_artist_title,
        concurrency: config.resolve_concurrency,
    };
    let engine = ReconciliationEngine::new(&adapter, policy, config.dedupe);

    let outcomes = match command {
        RunCommands::Sync => {
            let orchestrator = orchestrator(engine, &config);
            let snapshots = snapshot_source(&config)?;
            let diffs = XlsxDiffSource::new(&config.diffs_root()?);
            orchestrator.run(&snapshots, &diffs).await?
        }
        RunCommands::Init => {
            let orchestrator = orchestrator(engine, &config);
            let snapshots = snapshot_source(&config)?;
            orchestrator.initialize_from_snapshot(&snapshots).await?
        }
        RunCommands::Diff { name: None } => {
            let orchestrator = orchestrator(engine, &config);
            let diffs = XlsxDiffSource::new(&config.diffs_root()?);
            orchestrator.apply_latest_diffs(&diffs).await?
        }
        RunCommands::Diff { name: Some(name) } => {
            let diffs = XlsxDiffSource::new(&config.diffs_root()?);
            diff_one(&engine, &diffs, &name).await?
        }
        RunCommands::Push { csv, name, mode } => {
            log::debug!("Pushing {} to '{}' ({:?})", csv.display(), name, mode);
            let references = read_snapshot_csv(&csv, &config.csv_headers, &config.csv_artist_sep)?;
            let orchestrator = SyncOrchestrator::new(engine, InclusionFilter::all());
            vec![
                orchestrator
                    .converge_references(&name, &references, mode.into())
                    .await,
            ]
        }
    };

    finish(&outcomes)
}

fn config_command(command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::CreateDefault => {
            let path = Config::create_default()?;
            println!("Config at {}", path.display());
        }
        ConfigCommands::Path => {
            let path = Config::config_path().ok_or_eyre("No config directory on this platform")?;
            println!("{}", path.display());
        }
    }
    Ok(())
}

fn orchestrator<'a, C: CatalogClient>(
    engine: ReconciliationEngine<'a, C>,
    config: &Config,
) -> SyncOrchestrator<'a, C> {
    SyncOrchestrator::new(engine, InclusionFilter::new(&config.include_playlists))
}

fn snapshot_source(config: &Config) -> Result<CsvSnapshotSource> {
    let source = CsvSnapshotSource::from_exports_root(
        &config.exports_root()?,
        config.csv_headers,
        &config.csv_artist_sep,
    )?;
    log::info!("Using snapshot folder {}", source.folder().display());
    Ok(source)
}

async fn diff_one<C: CatalogClient>(
    engine: &ReconciliationEngine<'_, C>,
    diffs: &impl DiffSource,
    name: &str,
) -> Result<Vec<SyncOutcome>> {
    let Some(diff) = diffs.latest_diff(name)? else {
        log::info!("No diff found for '{}'", name);
        return Ok(Vec::new());
    };

    log::info!("Applying {} to '{}'", diff.source.display(), name);
    let outcome = engine
        .apply_diff(name, &diff.added, &diff.removed)
        .await
        .unwrap_or_else(ConvergeError::into_outcome);
    Ok(vec![outcome])
}

fn finish(outcomes: &[SyncOutcome]) -> Result<()> {
    println!("{}", report::render(outcomes));

    let summary = report::summarize(outcomes);
    if summary.replace_window_failed > 0 {
        log::error!(
            "{} playlist(s) were deleted and not recreated; re-run with --mode replace or push them manually",
            summary.replace_window_failed
        );
    }
    if summary.failed > 0 {
        return Err(eyre!("{} of {} playlists failed", summary.failed, summary.processed));
    }

    log::info!("Sync completed successfully");
    Ok(())
}
