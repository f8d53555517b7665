//! `mettle` — score the supply-chain health of a dependency manifest.
//!
//! # Usage
//!
//! ```
//! mettle deps.purl --fail-on 3.0
//! cat deps.purl | mettle --generate
//! mettle db create --source dump.jsonl
//! mettle db pull ghcr.io/example/mettle-db:latest
//! ```
//!
//! The root command resolves each package to a repository and attaches
//! scores from the local database (populated via `db create` / `db pull`),
//! optionally falling back to the external score generator.

mod manifest;
mod output;

use std::{
  io::Read as _,
  path::PathBuf,
  sync::Arc,
  time::Duration,
};

use anyhow::{Context as _, Result, bail};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use manifest::ManifestFormat;
use mettle_core::{
  resolve::{RepoMapper, ResultCache, ScoreClient},
  store::Source,
};
use mettle_resolve::{
  CachedClient, GeneratorClient, HintMapper, HostMapper, HttpGenerator,
  MultiMapper, ResolutionEngine, StoreClient, StoreMapper,
};
use mettle_store_sqlite::{ScoreCache, SqliteStore};
use mettle_sync::{
  JsonlSource, Manager, PullOutcome, Registry, RegistryOpts, STORE_FILE,
};
use output::OutputFormat;

// ─── CLI args ────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "mettle", about = "Supply-chain health scores for a dependency manifest")]
struct Cli {
  /// Manifest path; `-` or absent reads standard input.
  manifest: Option<PathBuf>,

  /// Manifest format.
  #[arg(long, value_enum, default_value = "purl")]
  input_format: ManifestFormat,

  /// Output format.
  #[arg(long, value_enum, default_value = "table")]
  output: OutputFormat,

  /// Exit non-zero if any repository scores below this threshold.
  #[arg(long)]
  fail_on: Option<f64>,

  /// Invoke the external score generator for repositories absent from the
  /// local database.
  #[arg(long)]
  generate: bool,

  /// Drop repositories without a score from the output.
  #[arg(long)]
  hide_unscored: bool,

  /// Managed score-database directory.
  #[arg(long, env = "METTLE_DB_DIR")]
  db_dir: Option<PathBuf>,

  /// Result-cache file.
  #[arg(long, env = "METTLE_CACHE")]
  cache: Option<PathBuf>,

  /// Result-cache lifetime, in hours.
  #[arg(long, default_value_t = 168)]
  cache_ttl_hours: u64,

  /// Base URL of the score-generation API.
  #[arg(long, env = "METTLE_API_URL")]
  api_url: Option<String>,

  /// Path to a TOML config file (db_dir, cache, api_url).
  #[arg(short, long, value_name = "FILE")]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Manage the local score database.
  #[command(subcommand)]
  Db(DbCommand),
}

#[derive(Subcommand, Debug)]
enum DbCommand {
  /// Build a fresh database from one or more bulk sources.
  Create {
    /// JSONL dump file; repeatable.
    #[arg(long = "source", value_name = "FILE", required = true)]
    sources: Vec<PathBuf>,
  },
  /// Fetch the database artifact from a registry, skipping the transfer
  /// when the local copy is current.
  Pull {
    /// Registry reference, e.g. `ghcr.io/example/mettle-db:latest`.
    reference: String,

    /// Talk plain HTTP to the registry.
    #[arg(long)]
    plain_http: bool,
  },
  /// Push the local database artifact to a registry.
  Push {
    reference: String,

    #[arg(long)]
    plain_http: bool,
  },
}

// ─── Config file ─────────────────────────────────────────────────────────────

/// Shape of the optional TOML config file. CLI flags override these values,
/// which override built-in defaults.
#[derive(Deserialize, Default)]
struct ConfigFile {
  #[serde(default)]
  db_dir:  Option<PathBuf>,
  #[serde(default)]
  cache:   Option<PathBuf>,
  #[serde(default)]
  api_url: Option<String>,
}

fn home_relative(parts: &[&str]) -> PathBuf {
  let mut path = std::env::var_os("HOME")
    .map(PathBuf::from)
    .unwrap_or_else(|| PathBuf::from("."));
  for part in parts {
    path.push(part);
  }
  path
}

// ─── Entry point ─────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  let mut cli = Cli::parse();

  let file_cfg: ConfigFile = if let Some(path) = &cli.config {
    let raw = std::fs::read_to_string(path)
      .with_context(|| format!("reading config file {}", path.display()))?;
    toml::from_str(&raw).context("parsing config file")?
  } else {
    ConfigFile::default()
  };

  let db_dir = cli
    .db_dir
    .clone()
    .or(file_cfg.db_dir)
    .unwrap_or_else(|| home_relative(&[".local", "share", "mettle", "db"]));

  match cli.command.take() {
    Some(Command::Db(cmd)) => run_db(cmd, db_dir).await,
    None => {
      let cache_path = cli
        .cache
        .clone()
        .or(file_cfg.cache)
        .unwrap_or_else(|| home_relative(&[".cache", "mettle", "results.db"]));
      let api_url = cli
        .api_url
        .clone()
        .or(file_cfg.api_url)
        .unwrap_or_else(|| mettle_resolve::DEFAULT_API_URL.to_owned());
      run_scan(cli, db_dir, cache_path, api_url).await
    }
  }
}

// ─── Database subcommands ────────────────────────────────────────────────────

async fn run_db(cmd: DbCommand, db_dir: PathBuf) -> Result<()> {
  match cmd {
    DbCommand::Create { sources } => {
      let sources: Vec<Box<dyn Source>> = sources
        .into_iter()
        .map(|p| Box::new(JsonlSource::new(p)) as Box<dyn Source>)
        .collect();
      let manager =
        Manager::new(&db_dir, Registry::new(&RegistryOpts::default()));
      let metadata = manager
        .build(&sources)
        .await
        .context("building score database")?;
      println!("database created ({})", metadata.hash);
    }
    DbCommand::Pull { reference, plain_http } => {
      let mut manager =
        Manager::new(&db_dir, Registry::new(&RegistryOpts { plain_http }));
      match manager
        .pull(&reference)
        .await
        .context("pulling score database")?
      {
        PullOutcome::UpToDate => println!("database is up to date"),
        PullOutcome::Updated(metadata) => {
          println!("database updated ({})", metadata.hash);
        }
      }
    }
    DbCommand::Push { reference, plain_http } => {
      let mut manager =
        Manager::new(&db_dir, Registry::new(&RegistryOpts { plain_http }));
      let url = manager
        .push(&reference)
        .await
        .context("pushing score database")?;
      println!("pushed {url}");
    }
  }
  Ok(())
}

// ─── Scan ────────────────────────────────────────────────────────────────────

async fn run_scan(
  cli: Cli,
  db_dir: PathBuf,
  cache_path: PathBuf,
  api_url: String,
) -> Result<()> {
  let raw = match &cli.manifest {
    Some(path) if path.as_os_str() != "-" => std::fs::read_to_string(path)
      .with_context(|| format!("reading manifest {}", path.display()))?,
    _ => {
      let mut buf = String::new();
      std::io::stdin()
        .read_to_string(&mut buf)
        .context("reading standard input")?;
      buf
    }
  };
  let entries =
    manifest::decode(&raw, cli.input_format).context("decoding manifest")?;
  if entries.is_empty() {
    bail!("manifest contains no packages");
  }

  let store = open_store(&db_dir).await?;

  if let Some(parent) = cache_path.parent() {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("creating {}", parent.display()))?;
  }
  let ttl = Duration::from_secs(cli.cache_ttl_hours * 3600);
  let cache: Arc<dyn ResultCache> = Arc::new(
    ScoreCache::open(&cache_path, ttl)
      .await
      .context("opening result cache")?,
  );

  // Mapper order is deliberate: manifest hints beat the host heuristic,
  // which beats store rows.
  let mut mappers: Vec<Box<dyn RepoMapper>> =
    vec![Box::new(HintMapper), Box::new(HostMapper)];
  if let Some(store) = &store {
    mappers.push(Box::new(StoreMapper::new(Arc::clone(store))));
  }

  let mut clients: Vec<Arc<dyn ScoreClient>> = Vec::new();
  if let Some(store) = &store {
    clients.push(Arc::new(CachedClient::new(
      Arc::clone(&cache),
      StoreClient::new(Arc::clone(store)),
    )));
  }
  if cli.generate {
    let generator = HttpGenerator::new(api_url).context("building generator")?;
    clients.push(Arc::new(CachedClient::new(
      Arc::clone(&cache),
      GeneratorClient::new(generator),
    )));
  }
  if clients.is_empty() {
    tracing::warn!("no score sources available, results will be unscored");
  }

  let engine =
    ResolutionEngine::new(Box::new(MultiMapper::new(mappers)), clients)
      .hide_unscored(cli.hide_unscored);

  let cancel = CancellationToken::new();
  {
    let cancel = cancel.clone();
    tokio::spawn(async move {
      if tokio::signal::ctrl_c().await.is_ok() {
        tracing::info!("interrupt received, cancelling");
        cancel.cancel();
      }
    });
  }

  let rows = engine.run(entries, cancel).await.context("resolving scores")?;
  print!("{}", output::render(&rows, cli.output)?);

  if let Some(threshold) = cli.fail_on {
    let failing = rows
      .iter()
      .filter(|row| row.score.is_some_and(|s| s < threshold))
      .count();
    if failing > 0 {
      bail!("{failing} repositories scored below {threshold}");
    }
  }
  Ok(())
}

async fn open_store(db_dir: &std::path::Path) -> Result<Option<Arc<SqliteStore>>> {
  match SqliteStore::open(db_dir.join(STORE_FILE)).await {
    Ok(store) => Ok(Some(Arc::new(store))),
    Err(mettle_store_sqlite::Error::NotInitialized(path)) => {
      tracing::warn!(
        path = %path.display(),
        "no local score database, run `mettle db pull` or `mettle db create`"
      );
      Ok(None)
    }
    Err(e) => Err(e).context("opening score database"),
  }
}
