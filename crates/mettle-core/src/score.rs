//! Score rows and result shapes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{package::Package, repo::RepoName};

// ─── Store rows ──────────────────────────────────────────────────────────────

/// A package → repository association row. The key is the whole triple: a
/// package may legitimately map to several repositories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRepo {
  #[serde(flatten)]
  pub package:    Package,
  pub repository: RepoName,
}

/// One aggregate score per repository. A later write replaces the earlier
/// value; no history is kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Score {
  pub repository: RepoName,
  pub score:      f64,
}

/// One value per (check name, repository) pair, same replacement semantics
/// as [`Score`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckScore {
  pub repository: RepoName,
  pub name:       String,
  pub score:      i64,
}

// ─── Client results ──────────────────────────────────────────────────────────

/// Score data for a single repository, as produced by score clients and
/// cached between runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreSet {
  pub score:  f64,
  #[serde(default)]
  pub checks: BTreeMap<String, i64>,
}

// ─── Engine output ───────────────────────────────────────────────────────────

/// One output row per distinct repository (or per unresolved package, under
/// the empty-repository bucket).
#[derive(Debug, Clone, Serialize)]
pub struct RepoScore {
  pub repository: Option<RepoName>,
  pub packages:   Vec<Package>,
  pub score:      Option<f64>,
  #[serde(skip_serializing_if = "BTreeMap::is_empty")]
  pub checks:     BTreeMap<String, i64>,
}

impl RepoScore {
  pub fn unscored(repository: Option<RepoName>, packages: Vec<Package>) -> Self {
    Self { repository, packages, score: None, checks: BTreeMap::new() }
  }

  pub fn apply(&mut self, set: ScoreSet) {
    self.score = Some(set.score);
    self.checks = set.checks;
  }
}
