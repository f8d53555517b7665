//! The score store traits and the bulk [`Source`] contract.
//!
//! The traits are implemented by storage backends (e.g.
//! `mettle-store-sqlite`). Higher layers (`mettle-sync`, `mettle-resolve`,
//! `mettle-cli`) depend on these abstractions, not on any concrete backend.

use std::future::Future;

use async_trait::async_trait;

use crate::{
  Result,
  package::System,
  repo::RepoName,
  score::{CheckScore, PackageRepo, Score},
};

// ─── Writer ──────────────────────────────────────────────────────────────────

/// Bulk write access to a score store.
///
/// Object-safe so heterogeneous [`Source`]s can be driven against one store
/// during a rebuild. Writers apply last-write-wins upserts for scores and
/// checks, and insert-if-absent for package associations; repeated writes of
/// the same rows are idempotent.
#[async_trait]
pub trait ScoreWriter: Send + Sync {
  async fn add_packages(&self, rows: Vec<PackageRepo>) -> Result<()>;
  async fn add_scores(&self, rows: Vec<Score>) -> Result<()>;
  async fn add_checks(&self, rows: Vec<CheckScore>) -> Result<()>;
}

// ─── Reader ──────────────────────────────────────────────────────────────────

/// Read access to a score store.
///
/// All read methods return `Error::NotFound` when zero rows match — never an
/// empty success value — so callers can fall through to the next lookup
/// strategy uniformly.
pub trait ScoreStore: ScoreWriter {
  /// All repository names associated with a package identity, ordered
  /// lexicographically.
  fn repositories<'a>(
    &'a self,
    system: System,
    name: &'a str,
  ) -> impl Future<Output = Result<Vec<RepoName>>> + Send + 'a;

  /// Aggregate scores for any of `repos`.
  fn scores<'a>(
    &'a self,
    repos: &'a [RepoName],
  ) -> impl Future<Output = Result<Vec<Score>>> + Send + 'a;

  /// All check scores recorded for `repo`.
  fn checks<'a>(
    &'a self,
    repo: &'a RepoName,
  ) -> impl Future<Output = Result<Vec<CheckScore>>> + Send + 'a;
}

// ─── Bulk sources ────────────────────────────────────────────────────────────

/// A bulk ingestion collaborator: reads rows from some external dataset and
/// writes them into a store under construction.
///
/// Sources must batch their own writes; the store additionally chunks each
/// batch to respect its bound-parameter ceiling.
#[async_trait]
pub trait Source: Send + Sync {
  /// Short display name used in rebuild logging.
  fn name(&self) -> &str;

  /// Stream this source's rows into `writer`.
  async fn update(&self, writer: &dyn ScoreWriter) -> Result<()>;
}
