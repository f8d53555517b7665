//! Repository-mapping strategies and their aggregating composite.

use async_trait::async_trait;
use std::sync::Arc;

use mettle_core::{
  Error, Result,
  package::ManifestEntry,
  repo::RepoName,
  resolve::RepoMapper,
  store::ScoreStore,
};

/// Hosts whose naming conventions embed the repository in the package name
/// itself (Go module paths, mostly).
const KNOWN_HOSTS: &[&str] = &["github.com", "gitlab.com", "bitbucket.org"];

// ─── Host heuristic ──────────────────────────────────────────────────────────

/// Derives a repository from a package's own namespaced name when it starts
/// with a known hosting service. A name that looks host-like but does not
/// canonicalise is "no opinion", not an error — this is a heuristic.
pub struct HostMapper;

#[async_trait]
impl RepoMapper for HostMapper {
  async fn repositories(&self, entry: &ManifestEntry) -> Result<Vec<RepoName>> {
    let name = entry.package.name.to_ascii_lowercase();
    for host in KNOWN_HOSTS {
      if name.strip_prefix(host).is_some_and(|rest| rest.starts_with('/')) {
        return Ok(RepoName::parse(&name).map(|r| vec![r]).unwrap_or_default());
      }
    }
    Ok(vec![])
  }
}

// ─── Manifest hints ──────────────────────────────────────────────────────────

/// Reads the repository hint attached to the originating manifest entry.
/// A hint that fails to canonicalise is malformed input and aborts
/// resolution for that package.
pub struct HintMapper;

#[async_trait]
impl RepoMapper for HintMapper {
  async fn repositories(&self, entry: &ManifestEntry) -> Result<Vec<RepoName>> {
    match &entry.repository {
      Some(hint) => Ok(vec![RepoName::parse(hint)?]),
      None => Ok(vec![]),
    }
  }
}

// ─── Store lookup ────────────────────────────────────────────────────────────

/// Looks the package identity up in the local score store. An absent entry
/// is "no opinion" so the aggregate degrades gracefully when the store has
/// no row.
pub struct StoreMapper<S> {
  store: Arc<S>,
}

impl<S> StoreMapper<S> {
  pub fn new(store: Arc<S>) -> Self {
    Self { store }
  }
}

#[async_trait]
impl<S: ScoreStore> RepoMapper for StoreMapper<S> {
  async fn repositories(&self, entry: &ManifestEntry) -> Result<Vec<RepoName>> {
    match self
      .store
      .repositories(entry.package.system, &entry.package.name)
      .await
    {
      Ok(repos) => Ok(repos),
      Err(Error::NotFound) => Ok(vec![]),
      Err(e) => Err(e),
    }
  }
}

// ─── Composite ───────────────────────────────────────────────────────────────

/// Runs every mapper for every package — all signals are gathered, never
/// short-circuited — then deduplicates across outputs preserving first-seen
/// order. Any mapper error aborts resolution for that package.
pub struct MultiMapper {
  mappers: Vec<Box<dyn RepoMapper>>,
}

impl MultiMapper {
  pub fn new(mappers: Vec<Box<dyn RepoMapper>>) -> Self {
    Self { mappers }
  }
}

#[async_trait]
impl RepoMapper for MultiMapper {
  async fn repositories(&self, entry: &ManifestEntry) -> Result<Vec<RepoName>> {
    let mut combined: Vec<RepoName> = Vec::new();
    for mapper in &self.mappers {
      for repo in mapper.repositories(entry).await? {
        if !combined.contains(&repo) {
          combined.push(repo);
        }
      }
    }
    Ok(combined)
  }
}
