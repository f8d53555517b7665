//! [`SqliteStore`] — the SQLite implementation of the score store.
//!
//! Bulk writes all follow the same staging-table merge: incoming rows land
//! in a temp table in chunks sized under SQLite's bound-parameter ceiling,
//! new dimension values are inserted if absent, and the staging rows are
//! merged into the fact table with natural-key conflict resolution — all
//! inside one transaction, so readers never observe a partial batch.

use std::path::Path;

use async_trait::async_trait;
use rusqlite::types::Value;

use mettle_core::{
  package::System,
  repo::RepoName,
  score::{CheckScore, PackageRepo, Score},
  store::{ScoreStore, ScoreWriter},
};

use crate::{
  Error, Result,
  schema::{SCHEMA, SCHEMA_VERSION},
};

/// SQLite's historical `SQLITE_MAX_VARIABLE_NUMBER` floor. Each chunked
/// insert keeps `rows × columns` under this bound.
const MAX_BOUND_PARAMS: usize = 999;

/// Rows per staging-insert chunk for a table of `cols` columns.
pub(crate) fn chunk_capacity(cols: usize) -> usize {
  MAX_BOUND_PARAMS / cols
}

/// `(?,?,..),(?,?,..),..` for a multi-row insert.
fn placeholders(rows: usize, cols: usize) -> String {
  let row = format!("({})", vec!["?"; cols].join(","));
  vec![row; rows].join(",")
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A score store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone, Debug)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Create a store at `path` and run schema initialisation.
  ///
  /// Fails with [`Error::AlreadyInitialized`] if the file already carries
  /// a schema version.
  pub async fn create(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref().to_path_buf();
    let conn = tokio_rusqlite::Connection::open(path.clone()).await?;
    if schema_version(&conn).await? != 0 {
      return Err(Error::AlreadyInitialized(path));
    }
    init_schema(&conn).await?;
    Ok(Self { conn })
  }

  /// Open an existing, initialised store at `path`.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref().to_path_buf();
    if !path.exists() {
      return Err(Error::NotInitialized(path));
    }
    let conn = tokio_rusqlite::Connection::open(path.clone()).await?;
    if schema_version(&conn).await? != SCHEMA_VERSION {
      return Err(Error::NotInitialized(path));
    }
    Ok(Self { conn })
  }

  /// Create an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    init_schema(&conn).await?;
    Ok(Self { conn })
  }

  /// Close the underlying connection, checkpointing the WAL so the file on
  /// disk is complete and hashable.
  pub async fn close(self) -> Result<()> {
    self.conn.close().await?;
    Ok(())
  }

  // ── Bulk writers ──────────────────────────────────────────────────────────

  /// Record package → repository associations. Existing associations are
  /// immutable: conflicts on the full natural key are ignored.
  pub async fn add_packages(&self, rows: Vec<PackageRepo>) -> Result<()> {
    if rows.is_empty() {
      return Ok(());
    }
    tracing::debug!(rows = rows.len(), "adding package associations");
    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute_batch(
          "CREATE TEMP TABLE staging_packages (
             system     TEXT NOT NULL,
             name       TEXT NOT NULL,
             repository TEXT NOT NULL
           )",
        )?;

        for chunk in rows.chunks(chunk_capacity(3)) {
          let sql = format!(
            "INSERT INTO staging_packages (system, name, repository) VALUES {}",
            placeholders(chunk.len(), 3)
          );
          let mut params = Vec::with_capacity(chunk.len() * 3);
          for row in chunk {
            params.push(Value::from(row.package.system.to_string()));
            params.push(Value::from(row.package.name.clone()));
            params.push(Value::from(row.repository.to_string()));
          }
          tx.execute(&sql, rusqlite::params_from_iter(params))?;
        }

        tx.execute(
          "INSERT OR IGNORE INTO package_systems (name)
           SELECT DISTINCT system FROM staging_packages",
          [],
        )?;
        tx.execute(
          "INSERT OR IGNORE INTO repositories (name)
           SELECT DISTINCT repository FROM staging_packages",
          [],
        )?;
        tx.execute(
          "INSERT OR IGNORE INTO packages (system_id, name, repository_id)
           SELECT ps.id, st.name, r.id
           FROM staging_packages st
           JOIN package_systems ps ON ps.name = st.system
           JOIN repositories    r  ON r.name  = st.repository",
          [],
        )?;
        tx.execute_batch("DROP TABLE staging_packages")?;
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Record aggregate scores. The last write for a repository wins, within
  /// and across calls.
  pub async fn add_scores(&self, rows: Vec<Score>) -> Result<()> {
    if rows.is_empty() {
      return Ok(());
    }
    tracing::debug!(rows = rows.len(), "adding scores");
    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute_batch(
          "CREATE TEMP TABLE staging_scores (
             repository TEXT NOT NULL,
             score      REAL NOT NULL
           )",
        )?;

        for chunk in rows.chunks(chunk_capacity(2)) {
          let sql = format!(
            "INSERT INTO staging_scores (repository, score) VALUES {}",
            placeholders(chunk.len(), 2)
          );
          let mut params = Vec::with_capacity(chunk.len() * 2);
          for row in chunk {
            params.push(Value::from(row.repository.to_string()));
            params.push(Value::from(row.score));
          }
          tx.execute(&sql, rusqlite::params_from_iter(params))?;
        }

        tx.execute(
          "INSERT OR IGNORE INTO repositories (name)
           SELECT DISTINCT repository FROM staging_scores",
          [],
        )?;
        // rowid order keeps "last writer wins" deterministic within a batch.
        tx.execute(
          "INSERT OR REPLACE INTO scores (repository_id, score)
           SELECT r.id, st.score
           FROM staging_scores st
           JOIN repositories r ON r.name = st.repository
           ORDER BY st.rowid",
          [],
        )?;
        tx.execute_batch("DROP TABLE staging_scores")?;
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Record per-check scores. Replacement is independent per check name.
  pub async fn add_checks(&self, rows: Vec<CheckScore>) -> Result<()> {
    if rows.is_empty() {
      return Ok(());
    }
    tracing::debug!(rows = rows.len(), "adding check scores");
    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute_batch(
          "CREATE TEMP TABLE staging_checks (
             repository TEXT    NOT NULL,
             name       TEXT    NOT NULL,
             score      INTEGER NOT NULL
           )",
        )?;

        for chunk in rows.chunks(chunk_capacity(3)) {
          let sql = format!(
            "INSERT INTO staging_checks (repository, name, score) VALUES {}",
            placeholders(chunk.len(), 3)
          );
          let mut params = Vec::with_capacity(chunk.len() * 3);
          for row in chunk {
            params.push(Value::from(row.repository.to_string()));
            params.push(Value::from(row.name.clone()));
            params.push(Value::from(row.score));
          }
          tx.execute(&sql, rusqlite::params_from_iter(params))?;
        }

        tx.execute(
          "INSERT OR IGNORE INTO repositories (name)
           SELECT DISTINCT repository FROM staging_checks",
          [],
        )?;
        tx.execute(
          "INSERT OR IGNORE INTO check_names (name)
           SELECT DISTINCT name FROM staging_checks",
          [],
        )?;
        tx.execute(
          "INSERT OR REPLACE INTO check_scores (check_name_id, repository_id, score)
           SELECT cn.id, r.id, st.score
           FROM staging_checks st
           JOIN check_names  cn ON cn.name = st.name
           JOIN repositories r  ON r.name  = st.repository
           ORDER BY st.rowid",
          [],
        )?;
        tx.execute_batch("DROP TABLE staging_checks")?;
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Readers ───────────────────────────────────────────────────────────────

  /// All repository names for a package identity, ordered lexicographically.
  pub async fn repositories(&self, system: System, name: &str) -> Result<Vec<RepoName>> {
    let system_str = system.to_string();
    let name_owned = name.to_owned();

    let names: Vec<String> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT r.name
           FROM packages p
           JOIN package_systems ps ON ps.id = p.system_id
           JOIN repositories    r  ON r.id  = p.repository_id
           WHERE ps.name = ?1 AND p.name = ?2
           ORDER BY r.name",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![system_str, name_owned], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    if names.is_empty() {
      return Err(Error::NotFound);
    }
    names
      .iter()
      .map(|n| RepoName::parse(n).map_err(Error::Core))
      .collect()
  }

  /// Aggregate scores for any of `repos`. The `IN` list is chunked under
  /// the same parameter ceiling as the writers.
  pub async fn scores(&self, repos: &[RepoName]) -> Result<Vec<Score>> {
    let mut out = Vec::new();
    for chunk in repos.chunks(chunk_capacity(1)) {
      let names: Vec<Value> = chunk
        .iter()
        .map(|r| Value::from(r.to_string()))
        .collect();
      let sql = format!(
        "SELECT r.name, s.score
         FROM scores s
         JOIN repositories r ON r.id = s.repository_id
         WHERE r.name IN ({})
         ORDER BY r.name",
        vec!["?"; names.len()].join(",")
      );

      let rows: Vec<(String, f64)> = self
        .conn
        .call(move |conn| {
          let mut stmt = conn.prepare(&sql)?;
          let rows = stmt
            .query_map(rusqlite::params_from_iter(names), |row| {
              Ok((row.get(0)?, row.get(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
          Ok(rows)
        })
        .await?;

      for (name, score) in rows {
        let repository = RepoName::parse(&name).map_err(Error::Core)?;
        out.push(Score { repository, score });
      }
    }

    if out.is_empty() {
      return Err(Error::NotFound);
    }
    Ok(out)
  }

  /// All check scores for `repo`, ordered by check name.
  pub async fn checks(&self, repo: &RepoName) -> Result<Vec<CheckScore>> {
    let repo_str = repo.to_string();
    let repo_owned = repo.clone();

    let rows: Vec<(String, i64)> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT cn.name, cs.score
           FROM check_scores cs
           JOIN check_names  cn ON cn.id = cs.check_name_id
           JOIN repositories r  ON r.id  = cs.repository_id
           WHERE r.name = ?1
           ORDER BY cn.name",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![repo_str], |row| {
            Ok((row.get(0)?, row.get(1)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    if rows.is_empty() {
      return Err(Error::NotFound);
    }
    Ok(
      rows
        .into_iter()
        .map(|(name, score)| CheckScore {
          repository: repo_owned.clone(),
          name,
          score,
        })
        .collect(),
    )
  }
}

// ─── Connection helpers ──────────────────────────────────────────────────────

async fn schema_version(conn: &tokio_rusqlite::Connection) -> Result<i64> {
  let version = conn
    .call(|conn| {
      Ok(conn.query_row("PRAGMA user_version", [], |row| row.get::<_, i64>(0))?)
    })
    .await?;
  Ok(version)
}

async fn init_schema(conn: &tokio_rusqlite::Connection) -> Result<()> {
  conn
    .call(|conn| {
      conn.execute_batch(SCHEMA)?;
      Ok(())
    })
    .await?;
  Ok(())
}

// ─── Trait impls ─────────────────────────────────────────────────────────────

#[async_trait]
impl ScoreWriter for SqliteStore {
  async fn add_packages(&self, rows: Vec<PackageRepo>) -> mettle_core::Result<()> {
    SqliteStore::add_packages(self, rows).await.map_err(Into::into)
  }

  async fn add_scores(&self, rows: Vec<Score>) -> mettle_core::Result<()> {
    SqliteStore::add_scores(self, rows).await.map_err(Into::into)
  }

  async fn add_checks(&self, rows: Vec<CheckScore>) -> mettle_core::Result<()> {
    SqliteStore::add_checks(self, rows).await.map_err(Into::into)
  }
}

impl ScoreStore for SqliteStore {
  async fn repositories(&self, system: System, name: &str) -> mettle_core::Result<Vec<RepoName>> {
    SqliteStore::repositories(self, system, name)
      .await
      .map_err(Into::into)
  }

  async fn scores(&self, repos: &[RepoName]) -> mettle_core::Result<Vec<Score>> {
    SqliteStore::scores(self, repos).await.map_err(Into::into)
  }

  async fn checks(&self, repo: &RepoName) -> mettle_core::Result<Vec<CheckScore>> {
    SqliteStore::checks(self, repo).await.map_err(Into::into)
  }
}
