//! Wilayah CLI
//!
//! Command-line interface for:
//! - ingesting boundary files (`.geojson`) at a declared hierarchy level
//! - inspecting stored data per code prefix
//! - hierarchy queries and name search
//! - bootstrap seeding and the HTTP surface (`serve`)

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use serde::Serialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use wilayah_code::Level;
use wilayah_hierarchy::{IngestReport, RegionService, SeedOutcome, Seeder};
use wilayah_storage::config::{DATABASE_URL_ENV, GATEWAY_KEY_ENV, GATEWAY_URL_ENV};
use wilayah_storage::open_store;

mod config;
mod server;

use config::{Overrides, WilayahConfig};

#[derive(Parser)]
#[command(name = "wilayah")]
#[command(
    author,
    version,
    about = "Wilayah: administrative boundary ingestion and hierarchy queries"
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalArgs {
    /// JSON configuration file.
    #[arg(long, short, global = true, env = "WILAYAH_CONFIG")]
    config: Option<PathBuf>,

    /// PostGIS connection URL (selects the direct database backend).
    #[arg(long, global = true, env = DATABASE_URL_ENV, hide_env_values = true)]
    database_url: Option<String>,

    /// Create the schema on connect (direct database backend only).
    #[arg(long, global = true)]
    migrate: bool,

    /// Base URL of the remote procedure gateway.
    #[arg(long, global = true, env = GATEWAY_URL_ENV)]
    gateway_url: Option<String>,

    /// API key for the gateway.
    #[arg(long, global = true, env = GATEWAY_KEY_ENV, hide_env_values = true)]
    gateway_key: Option<String>,

    /// Use the in-process store regardless of other settings.
    #[arg(long, global = true)]
    memory: bool,

    /// Log filter (e.g. `debug`, `wilayah_hierarchy=trace`). Defaults to `RUST_LOG`, then `info`.
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest GeoJSON boundary files.
    ///
    /// The hierarchy level comes from `--source` (e.g. `provinsi`,
    /// `kecamatan`, `4`), or from each file's name when omitted.
    Ingest {
        /// Boundary files to ingest. Files are ingested concurrently.
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Source tag declaring the level of every file.
        #[arg(long)]
        source: Option<String>,

        /// Print the full reports as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Per-level counts of a code and its descendants.
    Status {
        /// Code prefix, e.g. `11` or `11.01`.
        prefix: String,
    },

    /// Hierarchy bundle for a code, as JSON.
    Query {
        code: String,

        /// Pretty-print the bundle.
        #[arg(long)]
        pretty: bool,
    },

    /// Case-insensitive name search.
    Search { text: String },

    /// Seed top-level regions if none are stored.
    Seed {
        /// Province boundary file (also `WILAYAH_SEED_SOURCE`).
        #[arg(long)]
        source: Option<PathBuf>,

        /// Attempt marker file.
        #[arg(long)]
        marker: Option<PathBuf>,
    },

    /// Seed if needed, then serve the HTTP API.
    Serve {
        /// Listen address.
        #[arg(long)]
        listen: Option<SocketAddr>,

        /// Skip the bootstrap seeding phase.
        #[arg(long)]
        no_seed: bool,

        #[arg(long)]
        seed_source: Option<PathBuf>,

        #[arg(long)]
        seed_marker: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.global.log_level.as_deref())?;

    let mut overrides = Overrides {
        database_url: cli.global.database_url.clone(),
        migrate: cli.global.migrate,
        gateway_url: cli.global.gateway_url.clone(),
        gateway_key: cli.global.gateway_key.clone(),
        memory: cli.global.memory,
        ..Overrides::default()
    };
    match &cli.command {
        Commands::Seed { source, marker } => {
            overrides.seed_source = source.clone();
            overrides.seed_marker = marker.clone();
        }
        Commands::Serve {
            listen,
            seed_source,
            seed_marker,
            ..
        } => {
            overrides.listen = *listen;
            overrides.seed_source = seed_source.clone();
            overrides.seed_marker = seed_marker.clone();
        }
        _ => {}
    }
    let config = WilayahConfig::load(cli.global.config.as_deref(), &overrides)?;
    tracing::debug!(store = ?config.store, "configuration loaded");

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("starting async runtime")?;
    rt.block_on(run(cli.command, config))
}

fn init_tracing(level: Option<&str>) -> Result<()> {
    let filter = match level {
        Some(level) => EnvFilter::try_new(level).map_err(|e| anyhow!("invalid --log-level: {e}"))?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

async fn run(command: Commands, config: WilayahConfig) -> Result<()> {
    let store = open_store(&config.store)
        .await
        .context("opening region store")?;
    let service = RegionService::new(store);

    match command {
        Commands::Ingest {
            files,
            source,
            json,
        } => cmd_ingest(&service, &files, source.as_deref(), json).await,
        Commands::Status { prefix } => {
            let report = service.status(&prefix).await?;
            print_json(&report, true)?;
            let verdict = if report.available {
                "available".green().bold()
            } else {
                "no data".yellow().bold()
            };
            eprintln!("{} {} ({} regions)", verdict, report.prefix, report.counts.total());
            Ok(())
        }
        Commands::Query { code, pretty } => {
            let bundle = service.query_hierarchy(&code).await?;
            print_json(&bundle, pretty)
        }
        Commands::Search { text } => {
            let hits = service.search(&text).await?;
            for hit in &hits {
                println!("{}\t{}\t{}", hit.level, hit.code, hit.name);
            }
            if hits.is_empty() {
                eprintln!("{} no regions match `{}`", "info:".yellow().bold(), text.trim());
            }
            Ok(())
        }
        Commands::Seed { .. } => {
            let seeder = Seeder::new(config.seed);
            let outcome = service.seed(&seeder).await?;
            report_seed(&outcome);
            Ok(())
        }
        Commands::Serve { no_seed, .. } => {
            let seeder = (!no_seed).then(|| Seeder::new(config.seed));
            server::serve(service, seeder, config.listen).await
        }
    }
}

async fn cmd_ingest(
    service: &RegionService,
    files: &[PathBuf],
    source: Option<&str>,
    json: bool,
) -> Result<()> {
    let jobs = files.iter().map(|path| async move {
        let report = ingest_file(service, path, source).await;
        (path, report)
    });
    let results = futures::future::join_all(jobs).await;

    let mut reports = Vec::new();
    let mut failed_files = 0;
    for (path, result) in results {
        match result {
            Ok(report) => {
                eprintln!(
                    "{} {} level={} written={} skipped={}",
                    "ok".green().bold(),
                    path.display(),
                    report.level,
                    report.written,
                    report.failed()
                );
                for failure in &report.failures {
                    eprintln!(
                        "  {} feature #{} [{}] {}",
                        "skip".yellow(),
                        failure.index,
                        failure.stage,
                        failure.reason
                    );
                }
                reports.push(report);
            }
            Err(err) => {
                failed_files += 1;
                eprintln!("{} {}: {err:#}", "error".red().bold(), path.display());
            }
        }
    }

    if json {
        print_json(&reports, true)?;
    }
    let written: usize = reports.iter().map(IngestReport::processed).sum();
    println!("{written}");
    if failed_files > 0 {
        return Err(anyhow!("{failed_files} of {} file(s) failed", files.len()));
    }
    Ok(())
}

async fn ingest_file(
    service: &RegionService,
    path: &Path,
    source: Option<&str>,
) -> Result<IngestReport> {
    let tag = match source {
        Some(tag) => tag.to_string(),
        None => path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .ok_or_else(|| anyhow!("cannot take a source tag from {}", path.display()))?,
    };
    if Level::from_source_tag(&tag).is_none() {
        return Err(anyhow!(
            "cannot tell the level of `{tag}`; pass --source (provinsi, kabupaten, kecamatan, desa)"
        ));
    }
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    Ok(service.ingest(&tag, &text).await?)
}

fn report_seed(outcome: &SeedOutcome) {
    match outcome {
        SeedOutcome::Seeded(report) => eprintln!(
            "{} seeded {} top-level region(s), {} skipped",
            "ok".green().bold(),
            report.written,
            report.failed()
        ),
        SeedOutcome::DataPresent => {
            eprintln!("{} top-level regions already stored", "info:".yellow().bold())
        }
        SeedOutcome::Blocked { path, .. } => eprintln!(
            "{} a previous seed attempt left {}; remove it to retry",
            "blocked".red().bold(),
            path.display()
        ),
        SeedOutcome::NoSource => eprintln!(
            "{} no seed source configured (--source or WILAYAH_SEED_SOURCE)",
            "info:".yellow().bold()
        ),
        SeedOutcome::Disabled => eprintln!("{} seeding disabled", "info:".yellow().bold()),
        SeedOutcome::AlreadyAttempted => {
            eprintln!("{} already attempted in this process", "info:".yellow().bold())
        }
    }
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let text = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{text}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_flags_parse_before_the_subcommand() {
        let cli = Cli::try_parse_from(["wilayah", "--memory", "status", "11"]).unwrap();
        assert!(cli.global.memory);
        assert!(matches!(cli.command, Commands::Status { ref prefix } if prefix == "11"));
    }

    #[test]
    fn simplification_tolerance_is_not_configurable() {
        assert!(Cli::try_parse_from(["wilayah", "--tolerance", "0.01", "status", "11"]).is_err());

        let config: WilayahConfig =
            serde_json::from_str(r#"{"simplify_tolerance": 0.01}"#).unwrap();
        assert_eq!(config, WilayahConfig::default());
    }
}
