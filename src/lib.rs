//! gallery-sync - image metadata cache with archive sync
//!
//! Keeps an in-memory index of gallery assets backed by a SQLite record
//! store, generates resized variants through an external transform, and
//! periodically pushes new assets plus a store snapshot to a remote archive.

pub mod archive;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod library;
pub mod logging;
pub mod pipeline;
pub mod scheduler;
pub mod signal;
pub mod store;

use anyhow::{bail, Context};
use archive::DriveArchive;
use cache::{MetadataCache, ALL_TAG};
use cli::{Cli, Commands, ListArgs, ServeArgs, UpdateArgs};
use config::Config;
use error::ExitCode;
use library::Library;
use pipeline::ArtifactPipeline;
use scheduler::{SchedulerHandle, SyncOutcome, SyncScheduler, SyncSettings};
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use store::{AssetRecord, RecordEdits, SqliteStore};

/// How often `serve` checks for Ctrl+C.
const SHUTDOWN_POLL: Duration = Duration::from_millis(500);

/// Run the command described by `cli`.
pub fn run_app(cli: Cli) -> anyhow::Result<ExitCode> {
    logging::init_logging(cli.verbose, cli.quiet);

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(dir) = cli.images_dir {
        config.images_dir = dir;
    }
    if let Some(database) = cli.database {
        config.database = database;
    }
    if let Commands::Serve(args) = &cli.command {
        apply_serve_overrides(&mut config, args);
    }
    config.validate()?;

    let library = open_library(&config)?;

    match cli.command {
        Commands::Serve(_) => serve(&config, &library),
        Commands::Add(args) => {
            let record = library
                .create(&args.file, args.orientation)
                .with_context(|| format!("failed to add {}", args.file.display()))?;
            println!("{}", record.name);
            Ok(ExitCode::Success)
        }
        Commands::Update(args) => {
            let edits = edits_from(&args);
            library
                .update(&args.name, &edits)
                .with_context(|| format!("failed to update {}", args.name))?;
            Ok(ExitCode::Success)
        }
        Commands::Delete(args) => {
            library
                .delete(&args.name)
                .with_context(|| format!("failed to delete {}", args.name))?;
            Ok(ExitCode::Success)
        }
        Commands::Sync => sync_once(&config, &library),
        Commands::List(args) => list(&library, &args),
        Commands::Tags => {
            for tag in library.snapshot().tags() {
                println!("{tag}");
            }
            Ok(ExitCode::Success)
        }
    }
}

fn apply_serve_overrides(config: &mut Config, args: &ServeArgs) {
    if args.sync_on_startup {
        config.archive.sync_on_startup = true;
    }
    if let Some(interval) = args.interval {
        config.archive.interval_secs = interval;
    }
}

/// Open the store, load the cache and wire up the write path.
///
/// A store that cannot be opened or read is fatal: serving an empty
/// cache would make the next sync archive an empty snapshot.
fn open_library(config: &Config) -> anyhow::Result<Library> {
    fs::create_dir_all(&config.images_dir).with_context(|| {
        format!("failed to create images directory {}", config.images_dir.display())
    })?;

    let store = SqliteStore::open(&config.database)?;
    let cache = MetadataCache::load(Arc::new(store)).context("failed to load metadata cache")?;
    log::info!(
        "Loaded {} assets from {}",
        cache.snapshot_for_read().len(),
        config.database.display()
    );

    let pipeline = ArtifactPipeline::new(config.profiles(), Arc::new(config.transform()));
    Ok(Library::new(&config.images_dir, pipeline, Arc::new(cache)))
}

fn build_scheduler(config: &Config, cache: Arc<MetadataCache>) -> anyhow::Result<SyncScheduler> {
    if config.archive.access_token.trim().is_empty() {
        bail!("archive.access_token is not configured");
    }
    let archive = DriveArchive::new(config.drive_settings())?;
    Ok(SyncScheduler::new(
        cache,
        Arc::new(archive),
        SyncSettings {
            images_dir: config.images_dir.clone(),
            remote_dir: config.archive.dir.clone(),
        },
    ))
}

fn serve(config: &Config, library: &Library) -> anyhow::Result<ExitCode> {
    let regenerated = library.init_derived_dirs()?;
    if regenerated > 0 {
        log::info!("Regenerated variants for {} assets", regenerated);
    }

    let shutdown = signal::install_handler()?;

    let mut handle = if config.archive.enabled {
        let scheduler = Arc::new(build_scheduler(config, Arc::clone(library.cache()))?);
        let handle = SchedulerHandle::spawn(
            scheduler,
            config.sync_interval(),
            config.archive.sync_on_startup,
        )
        .context("failed to start sync scheduler")?;
        Some(handle)
    } else {
        log::info!("Archive sync disabled");
        None
    };

    log::info!("Serving {} (Ctrl+C to stop)", config.images_dir.display());
    while !shutdown.wait(SHUTDOWN_POLL) {}

    if let Some(handle) = handle.as_mut() {
        handle.stop();
    }
    if library.cache().is_dirty() {
        log::warn!("Unsynced changes remain; the next sync pass will push them");
    }
    Ok(ExitCode::Interrupted)
}

fn sync_once(config: &Config, library: &Library) -> anyhow::Result<ExitCode> {
    let scheduler = build_scheduler(config, Arc::clone(library.cache()))?;
    match scheduler.force_pass().context("sync pass failed")? {
        SyncOutcome::Clean => println!("Nothing to sync"),
        SyncOutcome::Synced(report) => {
            for name in &report.uploaded {
                println!("uploaded {name}");
            }
            if !report.flag_cleared {
                println!("Assets changed during the pass; another sync is needed");
            }
        }
    }
    Ok(ExitCode::Success)
}

fn list(library: &Library, args: &ListArgs) -> anyhow::Result<ExitCode> {
    let snapshot = library.snapshot();
    let records: Vec<&AssetRecord> = if args.tag == ALL_TAG {
        snapshot.by_creation()
    } else {
        snapshot.tagged(&args.tag)
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(ExitCode::Success);
    }

    for record in records {
        let hidden = if record.hidden { " (hidden)" } else { "" };
        println!(
            "{}\t{}\t{}\t{}{}",
            record.name,
            record.created_at.format("%Y-%m-%d %H:%M"),
            record.medium,
            record.tags,
            hidden
        );
    }
    Ok(ExitCode::Success)
}

fn edits_from(args: &UpdateArgs) -> RecordEdits {
    RecordEdits {
        orientation: args.orientation,
        tags: args.tags.clone(),
        description: args.description.clone(),
        alt: args.alt.clone(),
        hidden: args.hidden(),
    }
}
