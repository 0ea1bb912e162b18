//! Command-line interface definitions for gallery-sync.
//!
//! Global options control logging and configuration; each subcommand is one
//! operation on the gallery.
//!
//! # Example
//!
//! ```bash
//! # Run the cache and the daily archive sync until Ctrl+C
//! gallery-sync serve
//!
//! # Add a portrait photo and tag it
//! gallery-sync add ~/photos/cliff_walk.jpg --orientation portrait
//! gallery-sync update cliff_walk.jpg --tags "coast, hiking"
//!
//! # Push everything to the archive now
//! gallery-sync -v sync
//! ```

use crate::store::Orientation;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Image metadata cache with derived-variant generation and archive sync.
#[derive(Debug, Parser)]
#[command(name = "gallery-sync")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Configuration file (TOML)
    #[arg(short, long, global = true, value_name = "PATH", env = "GALLERY_SYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override the images directory
    #[arg(long, global = true, value_name = "DIR")]
    pub images_dir: Option<PathBuf>,

    /// Override the record store database file
    #[arg(long, global = true, value_name = "PATH")]
    pub database: Option<PathBuf>,

    /// Report errors as JSON on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Load the cache and run the sync scheduler until interrupted
    Serve(ServeArgs),
    /// Add a new primary asset and generate its variants
    Add(AddArgs),
    /// Edit the user fields of an asset
    Update(UpdateArgs),
    /// Remove an asset and its variants
    Delete(DeleteArgs),
    /// Run one sync pass immediately
    Sync,
    /// List cached assets
    List(ListArgs),
    /// List the tag index
    Tags,
}

/// Arguments for `serve`.
#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Run a sync pass right away instead of waiting one interval
    #[arg(long)]
    pub sync_on_startup: bool,

    /// Override the sync interval, in seconds
    #[arg(long, value_name = "SECS")]
    pub interval: Option<u64>,
}

/// Arguments for `add`.
#[derive(Debug, Args)]
pub struct AddArgs {
    /// The image file to add (must be a .jpg)
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Framing used when generating variants
    #[arg(long, value_name = "ORIENTATION", default_value = "unset")]
    pub orientation: Orientation,
}

/// Arguments for `update`.
#[derive(Debug, Args)]
pub struct UpdateArgs {
    /// Asset name, e.g. `cliff_walk.jpg`
    #[arg(value_name = "NAME")]
    pub name: String,

    /// New orientation; variants are regenerated if it changes
    #[arg(long, value_name = "ORIENTATION")]
    pub orientation: Option<Orientation>,

    /// Comma-separated tags
    #[arg(long)]
    pub tags: Option<String>,

    #[arg(long)]
    pub description: Option<String>,

    /// Alternative text
    #[arg(long)]
    pub alt: Option<String>,

    /// Hide the asset from display
    #[arg(long, conflicts_with = "shown")]
    pub hidden: bool,

    /// Show a previously hidden asset
    #[arg(long)]
    pub shown: bool,
}

impl UpdateArgs {
    /// `Some(true)` for `--hidden`, `Some(false)` for `--shown`.
    #[must_use]
    pub fn hidden(&self) -> Option<bool> {
        match (self.hidden, self.shown) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }
}

/// Arguments for `delete`.
#[derive(Debug, Args)]
pub struct DeleteArgs {
    #[arg(value_name = "NAME")]
    pub name: String,
}

/// Arguments for `list`.
#[derive(Debug, Args)]
pub struct ListArgs {
    /// Only assets carrying this tag ("all" for everything)
    #[arg(long, default_value = "all")]
    pub tag: String,

    /// Print records as JSON
    #[arg(long)]
    pub json: bool,
}
