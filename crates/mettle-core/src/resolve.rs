//! Capability traits composed by the resolution engine.
//!
//! Each is a small, explicit interface with a closed set of concrete
//! implementations, assembled into ordered or wrapping composites at
//! construction time (`mettle-resolve`).

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::{Result, package::ManifestEntry, repo::RepoName, score::ScoreSet};

/// A single repository-mapping strategy.
///
/// Strategies report "no opinion" as an empty list, not as an error;
/// a returned error aborts resolution for that package.
#[async_trait]
pub trait RepoMapper: Send + Sync {
  async fn repositories(&self, entry: &ManifestEntry) -> Result<Vec<RepoName>>;
}

/// A score-lookup strategy tried by the engine in declared order.
#[async_trait]
pub trait ScoreClient: Send + Sync {
  /// Display name used in progress messages and logs.
  fn name(&self) -> &'static str;

  /// 0 = unconstrained; 1 = calls must not run concurrently within one
  /// engine run. The engine sizes its worker pool accordingly.
  fn concurrency_limit(&self) -> usize {
    0
  }

  /// Score data for `repo`, or `Error::NotFound` to defer to the next
  /// client in the chain.
  async fn score(
    &self,
    repo: &RepoName,
    cancel: &CancellationToken,
  ) -> Result<ScoreSet>;
}

// Clients are shared between the engine and decorators; delegate through
// `Arc` so both can hold the same instance.
#[async_trait]
impl<T: ScoreClient + ?Sized> ScoreClient for std::sync::Arc<T> {
  fn name(&self) -> &'static str {
    (**self).name()
  }

  fn concurrency_limit(&self) -> usize {
    (**self).concurrency_limit()
  }

  async fn score(
    &self,
    repo: &RepoName,
    cancel: &CancellationToken,
  ) -> Result<ScoreSet> {
    (**self).score(repo, cancel).await
  }
}

/// The expensive external scoring capability, e.g. a remote scorecard
/// service. Adapted into the client chain by `mettle-resolve`.
#[async_trait]
pub trait ScoreGenerator: Send + Sync {
  async fn generate(
    &self,
    repo: &RepoName,
    cancel: &CancellationToken,
  ) -> Result<ScoreSet>;
}

/// TTL-bounded storage for previously fetched score results.
///
/// `get` returns `Error::NotFound` on miss *and* on expiry; `put` is an
/// idempotent insert-or-replace.
#[async_trait]
pub trait ResultCache: Send + Sync {
  async fn get(&self, repo: &RepoName) -> Result<ScoreSet>;
  async fn put(&self, repo: &RepoName, result: &ScoreSet) -> Result<()>;
}
