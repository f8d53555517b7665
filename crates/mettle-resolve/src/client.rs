//! Score-client strategies and the caching decorator.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use mettle_core::{
  Error, Result,
  repo::RepoName,
  resolve::{ResultCache, ScoreClient, ScoreGenerator},
  score::ScoreSet,
  store::ScoreStore,
};

// ─── Store-backed lookup ─────────────────────────────────────────────────────

/// Reads the aggregate score and check scores for a repository from the
/// local store. Cheap and safe to run at full parallelism.
pub struct StoreClient<S> {
  store: Arc<S>,
}

impl<S> StoreClient<S> {
  pub fn new(store: Arc<S>) -> Self {
    Self { store }
  }
}

#[async_trait]
impl<S: ScoreStore> ScoreClient for StoreClient<S> {
  fn name(&self) -> &'static str {
    "store"
  }

  async fn score(
    &self,
    repo: &RepoName,
    _cancel: &CancellationToken,
  ) -> Result<ScoreSet> {
    // NotFound propagates: no aggregate score means no opinion here.
    let scores = self.store.scores(std::slice::from_ref(repo)).await?;
    let score = scores
      .first()
      .ok_or(Error::NotFound)?
      .score;

    // Checks are optional detail; a repository can carry a score alone.
    let checks = match self.store.checks(repo).await {
      Ok(rows) => rows.into_iter().map(|c| (c.name, c.score)).collect(),
      Err(Error::NotFound) => Default::default(),
      Err(e) => return Err(e),
    };

    Ok(ScoreSet { score, checks })
  }
}

// ─── Generator adapter ───────────────────────────────────────────────────────

/// Adapts the external scoring capability into the client chain.
///
/// Declares a concurrency limit of 1: external score generation is
/// expensive and must be serialized by the engine. A generation failure for
/// one repository is logged and skipped, never retried.
pub struct GeneratorClient<G> {
  generator: G,
}

impl<G> GeneratorClient<G> {
  pub fn new(generator: G) -> Self {
    Self { generator }
  }
}

#[async_trait]
impl<G: ScoreGenerator> ScoreClient for GeneratorClient<G> {
  fn name(&self) -> &'static str {
    "generator"
  }

  fn concurrency_limit(&self) -> usize {
    1
  }

  async fn score(
    &self,
    repo: &RepoName,
    cancel: &CancellationToken,
  ) -> Result<ScoreSet> {
    match self.generator.generate(repo, cancel).await {
      Ok(set) => Ok(set),
      Err(Error::NotFound) => Err(Error::NotFound),
      Err(Error::Upstream(message)) => {
        tracing::warn!(repo = %repo, error = %message, "score generation failed, skipping");
        Err(Error::NotFound)
      }
      Err(e) => Err(e),
    }
  }
}

// ─── Caching decorator ───────────────────────────────────────────────────────

/// Wraps an inner client with the shared result cache: a hit answers
/// immediately; on a miss the inner client is queried and a found result is
/// stored. NotFound and other inner errors propagate unchanged.
pub struct CachedClient<C> {
  cache: Arc<dyn ResultCache>,
  inner: C,
}

impl<C> CachedClient<C> {
  pub fn new(cache: Arc<dyn ResultCache>, inner: C) -> Self {
    Self { cache, inner }
  }
}

#[async_trait]
impl<C: ScoreClient> ScoreClient for CachedClient<C> {
  fn name(&self) -> &'static str {
    self.inner.name()
  }

  fn concurrency_limit(&self) -> usize {
    self.inner.concurrency_limit()
  }

  async fn score(
    &self,
    repo: &RepoName,
    cancel: &CancellationToken,
  ) -> Result<ScoreSet> {
    match self.cache.get(repo).await {
      Ok(set) => {
        tracing::debug!(repo = %repo, "cache hit");
        return Ok(set);
      }
      Err(Error::NotFound) => {}
      Err(e) => return Err(e),
    }

    let set = self.inner.score(repo, cancel).await?;
    self.cache.put(repo, &set).await?;
    Ok(set)
  }
}
