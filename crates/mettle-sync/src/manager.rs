//! [`Manager`] — lifecycle of the managed store directory.
//!
//! The managed directory holds the store file and a sibling metadata file.
//! It is only ever replaced wholesale: rebuilds and pulls stage both files
//! in a fresh sibling directory and swap it into place with directory
//! renames, so readers never observe a data file paired with metadata for a
//! different version.

use std::{
  fs,
  io::Read as _,
  path::{Path, PathBuf},
};

use chrono::Utc;
use sha2::{Digest as _, Sha256};

use mettle_core::{metadata::Metadata, store::Source};
use mettle_store_sqlite::SqliteStore;

use crate::{Error, Registry, Result, StoreArtifact};

/// File name of the store inside the managed directory.
pub const STORE_FILE: &str = "scores.db";

/// File name of the metadata sibling.
pub const METADATA_FILE: &str = "metadata.json";

/// Outcome of a differential pull.
#[derive(Debug, PartialEq, Eq)]
pub enum PullOutcome {
  /// Local hash matched the remote metadata; nothing was transferred.
  UpToDate,
  /// The data layer was fetched and the managed directory replaced.
  Updated(Metadata),
}

/// Owns a managed store directory and drives rebuilds, pushes and pulls.
pub struct Manager {
  dir:      PathBuf,
  registry: Registry,
}

impl Manager {
  pub fn new(dir: impl Into<PathBuf>, registry: Registry) -> Self {
    Self { dir: dir.into(), registry }
  }

  /// Path of the managed store file.
  pub fn store_path(&self) -> PathBuf {
    self.dir.join(STORE_FILE)
  }

  /// Read the managed metadata file. `NotFound` if the directory has never
  /// been populated.
  pub fn metadata(&self) -> Result<Metadata> {
    let path = self.dir.join(METADATA_FILE);
    if !path.exists() {
      return Err(Error::Core(mettle_core::Error::NotFound));
    }
    let raw = fs::read(&path)?;
    Ok(serde_json::from_slice(&raw)?)
  }

  /// Rebuild the store wholesale from `sources` and swap it into the
  /// managed location. The old contents are discarded only after the new
  /// store is fully populated and hashed.
  pub async fn build(&self, sources: &[Box<dyn Source>]) -> Result<Metadata> {
    let staging = self.staging_dir()?;
    let result = self.build_in(&staging, sources).await;
    match result {
      Ok(metadata) => {
        swap_into_place(&staging, &self.dir)?;
        tracing::info!(hash = %metadata.hash, "store rebuilt");
        Ok(metadata)
      }
      Err(e) => {
        let _ = fs::remove_dir_all(&staging);
        Err(e)
      }
    }
  }

  async fn build_in(
    &self,
    staging: &Path,
    sources: &[Box<dyn Source>],
  ) -> Result<Metadata> {
    let db_path = staging.join(STORE_FILE);
    let store = SqliteStore::create(&db_path).await?;

    for source in sources {
      tracing::info!(source = source.name(), "updating from source");
      source.update(&store).await?;
    }
    store.close().await?;

    let metadata = Metadata::new(file_sha256(&db_path)?, Utc::now());
    write_metadata(staging, &metadata)?;
    Ok(metadata)
  }

  /// Differential pull: fetch remote metadata first and short-circuit when
  /// the local copy already matches.
  pub async fn pull(&mut self, reference: &str) -> Result<PullOutcome> {
    let remote = self.registry.fetch_metadata(reference).await?;

    match self.metadata() {
      Ok(local) if local.matches(&remote) => {
        tracing::info!(hash = %local.hash, "store is up to date");
        return Ok(PullOutcome::UpToDate);
      }
      Ok(_) => {}
      Err(e) if e.is_not_found() => {}
      Err(e) => return Err(e),
    }

    let artifact = self.registry.pull(reference).await?;
    let metadata = artifact.metadata().clone();

    let staging = self.staging_dir()?;
    let result = (|| {
      fs::write(staging.join(STORE_FILE), artifact.db())?;
      write_metadata(&staging, &metadata)
    })();
    match result {
      Ok(()) => {
        swap_into_place(&staging, &self.dir)?;
        tracing::info!(hash = %metadata.hash, "store updated from registry");
        Ok(PullOutcome::Updated(metadata))
      }
      Err(e) => {
        let _ = fs::remove_dir_all(&staging);
        Err(e)
      }
    }
  }

  /// Export the managed store as an artifact and push it to `reference`.
  pub async fn push(&mut self, reference: &str) -> Result<String> {
    let metadata = self.metadata()?;
    let db = fs::read(self.store_path())?;
    let artifact = StoreArtifact::new(db, metadata);
    self.registry.push(reference, &artifact).await
  }

  fn staging_dir(&self) -> Result<PathBuf> {
    let name = self
      .dir
      .file_name()
      .map(|n| n.to_string_lossy().into_owned())
      .unwrap_or_else(|| "store".to_owned());
    let staging = self
      .dir
      .parent()
      .unwrap_or_else(|| Path::new("."))
      .join(format!(".{name}.staging"));
    if staging.exists() {
      fs::remove_dir_all(&staging)?;
    }
    fs::create_dir_all(&staging)?;
    Ok(staging)
  }
}

// ─── File helpers ────────────────────────────────────────────────────────────

fn write_metadata(dir: &Path, metadata: &Metadata) -> Result<()> {
  let raw = serde_json::to_vec_pretty(metadata)?;
  fs::write(dir.join(METADATA_FILE), raw)?;
  Ok(())
}

/// Replace `dir` with `staging`: retire the current directory, rename the
/// staging directory into place, then drop the retired copy.
fn swap_into_place(staging: &Path, dir: &Path) -> Result<()> {
  if let Some(parent) = dir.parent() {
    fs::create_dir_all(parent)?;
  }
  let retired = dir.with_extension("retired");
  if retired.exists() {
    fs::remove_dir_all(&retired)?;
  }
  if dir.exists() {
    fs::rename(dir, &retired)?;
  }
  fs::rename(staging, dir)?;
  if retired.exists() {
    fs::remove_dir_all(&retired)?;
  }
  Ok(())
}

/// Streaming hex sha256 of a file.
pub fn file_sha256(path: &Path) -> Result<String> {
  let mut file = fs::File::open(path)?;
  let mut hasher = Sha256::new();
  let mut buf = [0u8; 64 * 1024];
  loop {
    let n = file.read(&mut buf)?;
    if n == 0 {
      break;
    }
    hasher.update(&buf[..n]);
  }
  Ok(hex::encode(hasher.finalize()))
}
