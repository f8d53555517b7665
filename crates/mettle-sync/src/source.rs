//! [`JsonlSource`] — a file-backed bulk source.
//!
//! Reads newline-delimited JSON rows of the shape
//! `{"system": "go", "name": "...", "repository": "...", "score": 7.5,
//! "checks": {"Maintained": 10}}` and streams them into a store writer in
//! batches. `score` and `checks` are optional; a row without them only
//! records the package → repository association.

use std::{collections::BTreeMap, path::PathBuf};

use async_trait::async_trait;
use serde::Deserialize;

use mettle_core::{
  package::{Package, System},
  repo::RepoName,
  score::{CheckScore, PackageRepo, Score},
  store::{ScoreWriter, Source},
};

/// Rows accumulated before each flush to the writer. The store chunks
/// further under its own parameter ceiling.
const BATCH_ROWS: usize = 500;

#[derive(Debug, Deserialize)]
struct Row {
  system:     System,
  name:       String,
  repository: String,
  #[serde(default)]
  score:      Option<f64>,
  #[serde(default)]
  checks:     BTreeMap<String, i64>,
}

/// A bulk source reading a local JSONL dump.
pub struct JsonlSource {
  path: PathBuf,
  name: String,
}

impl JsonlSource {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    let path = path.into();
    let name = path
      .file_name()
      .map(|n| n.to_string_lossy().into_owned())
      .unwrap_or_else(|| "jsonl".to_owned());
    Self { path, name }
  }
}

#[async_trait]
impl Source for JsonlSource {
  fn name(&self) -> &str {
    &self.name
  }

  async fn update(&self, writer: &dyn ScoreWriter) -> mettle_core::Result<()> {
    let raw = std::fs::read_to_string(&self.path)?;

    let mut packages = Vec::new();
    let mut scores = Vec::new();
    let mut checks = Vec::new();

    for (lineno, line) in raw.lines().enumerate() {
      let line = line.trim();
      if line.is_empty() {
        continue;
      }
      let row: Row = match serde_json::from_str(line) {
        Ok(row) => row,
        Err(e) => {
          // Malformed input is fatal for the row, not for the rebuild.
          tracing::warn!(line = lineno + 1, error = %e, "skipping malformed row");
          continue;
        }
      };
      let repository = match RepoName::parse(&row.repository) {
        Ok(repo) => repo,
        Err(e) => {
          tracing::warn!(line = lineno + 1, error = %e, "skipping row");
          continue;
        }
      };

      packages.push(PackageRepo {
        package:    Package::new(row.system, row.name),
        repository: repository.clone(),
      });
      if let Some(score) = row.score {
        scores.push(Score { repository: repository.clone(), score });
      }
      for (name, score) in row.checks {
        checks.push(CheckScore { repository: repository.clone(), name, score });
      }

      if packages.len() >= BATCH_ROWS {
        writer.add_packages(std::mem::take(&mut packages)).await?;
      }
      if scores.len() >= BATCH_ROWS {
        writer.add_scores(std::mem::take(&mut scores)).await?;
      }
      if checks.len() >= BATCH_ROWS {
        writer.add_checks(std::mem::take(&mut checks)).await?;
      }
    }

    writer.add_packages(packages).await?;
    writer.add_scores(scores).await?;
    writer.add_checks(checks).await?;
    Ok(())
  }
}
