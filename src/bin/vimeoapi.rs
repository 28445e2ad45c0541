#![forbid(unsafe_code)]

//! Command-line front end: resolves durations and thumbnails the same way a
//! page render would, and manages the cache.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use env_logger::Env;
use std::path::PathBuf;
use vimeoapi_tools::{
    CacheStore, DurationFormat, Gateway, MemoryStore, Settings, SqliteStore, ThumbSize, Viewer,
    config::{DEFAULT_CONFIG_PATH, load_settings_from},
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Look up Vimeo durations and thumbnails through the cache.")]
struct Cli {
    #[arg(
        long = "config",
        value_name = "PATH",
        default_value = DEFAULT_CONFIG_PATH,
        help = "Path to the config file"
    )]
    config: PathBuf,
    #[arg(long = "admin", help = "Resolve as a site admin (shows origin markers)")]
    admin: bool,
    #[arg(
        long = "update-cache",
        help = "Bypass and rewrite cached values (admin only)"
    )]
    update_cache: bool,
    #[arg(long = "no-cache", help = "Ignore cached values for this run")]
    no_cache: bool,
    #[arg(
        long = "legacy-quirks",
        help = "Reproduce historical formatting and thumbnail selection"
    )]
    legacy_quirks: bool,
    #[arg(long = "html", help = "Render origin markers as HTML")]
    html: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a video's duration.
    VideoDuration {
        id: String,
        #[arg(long, default_value = "hms", help = "hms, :: or seconds")]
        format: DurationFormat,
    },
    /// Print an album's duration.
    AlbumDuration {
        id: String,
        #[arg(long, default_value = "hms", help = "hms, :: or seconds")]
        format: DurationFormat,
    },
    /// Print a video's thumbnail link.
    VideoThumb {
        id: String,
        #[arg(long, default_value = "large", help = "small, medium or large")]
        size: ThumbSize,
        #[arg(long = "no-origin", help = "Never append the origin marker")]
        no_origin: bool,
    },
    /// Remove every cached value.
    Purge,
}

fn main() -> Result<()> {
    env_logger::init_from_env(Env::default().default_filter_or("info"));
    let cli = Cli::parse();

    let mut settings = load_settings_from(&cli.config)
        .with_context(|| format!("loading settings from {}", cli.config.display()))?;
    if cli.no_cache {
        settings.caching = false;
    }
    if cli.legacy_quirks {
        settings.legacy_quirks = true;
    }
    if cli.html {
        settings.html_markers = true;
    }

    match settings.cache_db.clone() {
        Some(path) => {
            let store = SqliteStore::open(&path).context("initializing cache database")?;
            run(&cli, settings, store)
        }
        None => run(&cli, settings, MemoryStore::new()),
    }
}

fn run<S: CacheStore>(cli: &Cli, settings: Settings, store: S) -> Result<()> {
    let gateway = Gateway::connect(settings, store);
    let viewer = Viewer {
        is_admin: cli.admin,
        update_cache: cli.update_cache,
    };

    match &cli.command {
        Command::VideoDuration { id, format } => {
            println!("{}", gateway.video_duration(id, *format, &viewer));
        }
        Command::AlbumDuration { id, format } => {
            println!("{}", gateway.album_duration(id, *format, &viewer));
        }
        Command::VideoThumb {
            id,
            size,
            no_origin,
        } => {
            println!("{}", gateway.video_thumb(id, *size, !no_origin, &viewer));
        }
        Command::Purge => {
            gateway.purge().context("purging cache")?;
            log::info!("cache purged");
        }
    }
    Ok(())
}
