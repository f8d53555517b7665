//! [`ScoreCache`] — a TTL-bounded local cache of fetched score results.
//!
//! Same storage technology as the store, its own file. Expiry is evaluated
//! at read time against the configured duration; there is no background
//! eviction sweep. An expired row is treated as absent and physically
//! overwritten by the next put.

use std::{path::Path, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension as _;

use mettle_core::{repo::RepoName, resolve::ResultCache, score::ScoreSet};

use crate::{Error, Result};

const CACHE_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS cache_entries (
    repository  TEXT PRIMARY KEY,
    result_json TEXT NOT NULL,
    recorded_at TEXT NOT NULL    -- RFC 3339 UTC
);
";

/// A cache keyed by repository name, expiring entries `ttl` after they were
/// written.
#[derive(Clone)]
pub struct ScoreCache {
  conn: tokio_rusqlite::Connection,
  ttl:  chrono::Duration,
}

impl ScoreCache {
  /// Open (or create) a cache at `path`. The schema is idempotent — the
  /// cache file is owned exclusively by this component.
  pub async fn open(path: impl AsRef<Path>, ttl: Duration) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    Self::init(conn, ttl).await
  }

  /// In-memory cache — useful for testing.
  pub async fn open_in_memory(ttl: Duration) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Self::init(conn, ttl).await
  }

  async fn init(conn: tokio_rusqlite::Connection, ttl: Duration) -> Result<Self> {
    conn
      .call(|conn| {
        conn.execute_batch(CACHE_SCHEMA)?;
        Ok(())
      })
      .await?;
    let ttl = chrono::Duration::from_std(ttl)
      .unwrap_or_else(|_| chrono::Duration::MAX);
    Ok(Self { conn, ttl })
  }

  /// Look up `repo`, treating anything written longer than the TTL ago as
  /// absent.
  pub async fn get(&self, repo: &RepoName) -> Result<ScoreSet> {
    let repo_str = repo.to_string();

    let row: Option<(String, String)> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT result_json, recorded_at FROM cache_entries WHERE repository = ?1",
              rusqlite::params![repo_str],
              |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?,
        )
      })
      .await?;

    let Some((json, recorded_at)) = row else {
      return Err(Error::NotFound);
    };

    let recorded_at = DateTime::parse_from_rfc3339(&recorded_at)
      .map_err(|e| Error::Timestamp(e.to_string()))?
      .with_timezone(&Utc);
    if Utc::now().signed_duration_since(recorded_at) > self.ttl {
      tracing::debug!(repo = %repo, "cache entry expired");
      return Err(Error::NotFound);
    }

    Ok(serde_json::from_str(&json)?)
  }

  /// Insert or replace the entry for `repo`.
  pub async fn put(&self, repo: &RepoName, result: &ScoreSet) -> Result<()> {
    let repo_str = repo.to_string();
    let json = serde_json::to_string(result)?;
    let at = Utc::now().to_rfc3339();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR REPLACE INTO cache_entries (repository, result_json, recorded_at)
           VALUES (?1, ?2, ?3)",
          rusqlite::params![repo_str, json, at],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

#[async_trait]
impl ResultCache for ScoreCache {
  async fn get(&self, repo: &RepoName) -> mettle_core::Result<ScoreSet> {
    ScoreCache::get(self, repo).await.map_err(Into::into)
  }

  async fn put(&self, repo: &RepoName, result: &ScoreSet) -> mettle_core::Result<()> {
    ScoreCache::put(self, repo, result).await.map_err(Into::into)
  }
}
