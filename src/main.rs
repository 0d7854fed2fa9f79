use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use geotag_catalog::capture::{CaptureService, ExistingImage, FixedLocation};
use geotag_catalog::config::{AppConfig, CliConfig, FileConfig, DEFAULT_BUSY_TIMEOUT_MS};
use geotag_catalog::{Coordinates, MediaCatalog, MediaId, MediaRecord};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn parse_path(s: &str) -> Result<PathBuf> {
    let original_path = PathBuf::from(s);
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
#[command(about = "Inspect and maintain a geotagged media catalog")]
struct CliArgs {
    /// Path to a TOML config file. Values in it override the flags below.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Directory holding the catalog database.
    #[clap(long, value_parser = parse_path)]
    pub db_dir: Option<PathBuf>,

    /// How long a statement waits on a locked database, in milliseconds.
    #[clap(long, default_value_t = DEFAULT_BUSY_TIMEOUT_MS)]
    pub busy_timeout_ms: u64,

    /// Print records as JSON, one per line.
    #[clap(long)]
    pub json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Records an image at the given position.
    Add {
        uri: String,
        #[clap(allow_hyphen_values = true)]
        latitude: f64,
        #[clap(allow_hyphen_values = true)]
        longitude: f64,
        /// RFC 3339 capture time, defaults to now.
        #[clap(long)]
        captured_at: Option<String>,
    },

    /// Shows one record.
    Get { id: i64 },

    /// Shows all records, oldest first.
    List,

    /// Shows records whose capture time or coordinates contain the query.
    Search {
        #[clap(allow_hyphen_values = true)]
        query: String,
    },

    /// Shows the marker position of every record.
    Markers,

    /// Points a record at a replacement image.
    SetUri { id: i64, uri: String },

    /// Deletes a record permanently.
    Delete { id: i64 },

    /// Shows the number of records.
    Count,

    /// Shows the path of the catalog database.
    Where,
}

fn print_line<T: Serialize>(json: bool, value: &T, text: impl FnOnce() -> String) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(value)?);
    } else {
        println!("{}", text());
    }
    Ok(())
}

fn print_record(json: bool, record: &MediaRecord) -> Result<()> {
    print_line(json, record, || {
        format!(
            "{}\t{}\t{}\t{}\t{}",
            record.id, record.captured_at, record.latitude, record.longitude, record.uri
        )
    })
}

async fn execute(command: Command, catalog: &MediaCatalog, json: bool) -> Result<()> {
    match command {
        Command::Add {
            uri,
            latitude,
            longitude,
            captured_at,
        } => {
            let service = CaptureService::new(
                catalog.clone(),
                Arc::new(ExistingImage::new(uri, captured_at)),
                Arc::new(FixedLocation(Coordinates::new(latitude, longitude))),
            );
            let record = service.capture_and_record().await?;
            print_record(json, &record)?;
        }
        Command::Get { id } => {
            let record = catalog.read(MediaId(id)).await?;
            print_record(json, &record)?;
        }
        Command::List => {
            for record in catalog.read_all().await? {
                print_record(json, &record)?;
            }
        }
        Command::Search { query } => {
            for record in catalog.search(&query).await? {
                print_record(json, &record)?;
            }
        }
        Command::Markers => {
            for marker in catalog.spatial_snapshot().await? {
                print_line(json, &marker, || {
                    format!("{}\t{}\t{}", marker.id, marker.latitude, marker.longitude)
                })?;
            }
        }
        Command::SetUri { id, uri } => {
            catalog.update_uri(MediaId(id), uri).await?;
        }
        Command::Delete { id } => {
            catalog.delete(MediaId(id)).await?;
        }
        Command::Count => {
            let count = catalog.count().await?;
            print_line(json, &count, || count.to_string())?;
        }
        Command::Where => {
            if let Some(location) = catalog.location().await {
                println!("{}", location.display());
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to install tracing subscriber")?;

    let file_config = cli_args
        .config
        .as_deref()
        .map(FileConfig::load)
        .transpose()?;
    let cli_config = CliConfig {
        db_dir: cli_args.db_dir.clone(),
        busy_timeout_ms: cli_args.busy_timeout_ms,
    };
    let config = AppConfig::resolve(&cli_config, file_config)?;

    info!("Opening media catalog at {:?}...", config.catalog_db_path());
    let catalog = MediaCatalog::open(config.catalog_db_path(), config.store_options())
        .await
        .context("Cannot start without the media catalog")?;

    let result = execute(cli_args.command, &catalog, cli_args.json).await;
    let closed = catalog.close().await;
    result?;
    closed?;
    Ok(())
}
