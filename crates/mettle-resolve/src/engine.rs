//! [`ResolutionEngine`] — groups packages by repository and drives the
//! client chain across all repositories under bounded concurrency.

use std::{
  collections::HashMap,
  num::NonZeroUsize,
  sync::{Arc, Mutex},
};

use tokio::{sync::Semaphore, task::JoinSet};
use tokio_util::sync::CancellationToken;

use mettle_core::{
  Error, Result,
  package::{ManifestEntry, Package},
  repo::RepoName,
  resolve::{RepoMapper, ScoreClient},
  score::{RepoScore, ScoreSet},
};

// ─── Progress ────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Clone)]
struct ProgressState {
  done:    usize,
  total:   usize,
  message: String,
}

/// The run's shared progress counter and display message. The one piece of
/// mutable state tasks share, guarded by a single mutex.
#[derive(Debug, Default)]
pub struct Progress {
  state: Mutex<ProgressState>,
}

impl Progress {
  fn reset(&self, total: usize) {
    let mut state = self.state.lock().expect("progress mutex");
    *state = ProgressState { done: 0, total, message: String::new() };
  }

  fn advance(&self, message: String) -> usize {
    let mut state = self.state.lock().expect("progress mutex");
    state.done += 1;
    state.message = message;
    state.done
  }

  /// `(done, total, message)` at this instant.
  pub fn snapshot(&self) -> (usize, usize, String) {
    let state = self.state.lock().expect("progress mutex");
    (state.done, state.total, state.message.clone())
  }
}

// ─── Engine ──────────────────────────────────────────────────────────────────

/// Worker-pool ceiling: available processing units, clamped.
fn default_workers() -> usize {
  std::thread::available_parallelism()
    .map(NonZeroUsize::get)
    .unwrap_or(4)
    .clamp(1, 16)
}

/// The top-level resolution driver.
///
/// Per run: (1) group input packages by mapped repository, keeping an
/// explicit no-repository bucket; (2) for each client in declared order,
/// score every still-unresolved repository under a bounded worker pool;
/// (3) emit one row per repository, sorted by score then name, both
/// descending, with unscored rows in the lowest tier.
pub struct ResolutionEngine {
  mapper:        Box<dyn RepoMapper>,
  clients:       Vec<Arc<dyn ScoreClient>>,
  workers:       usize,
  hide_unscored: bool,
  progress:      Arc<Progress>,
}

impl ResolutionEngine {
  pub fn new(
    mapper: Box<dyn RepoMapper>,
    clients: Vec<Arc<dyn ScoreClient>>,
  ) -> Self {
    Self {
      mapper,
      clients,
      workers: default_workers(),
      hide_unscored: false,
      progress: Arc::new(Progress::default()),
    }
  }

  /// Override the worker-pool ceiling (tests, benchmarks).
  pub fn with_workers(mut self, workers: usize) -> Self {
    self.workers = workers.max(1);
    self
  }

  /// Drop rows without a score from the final output.
  pub fn hide_unscored(mut self, hide: bool) -> Self {
    self.hide_unscored = hide;
    self
  }

  /// Shared progress handle, for display while a run is in flight.
  pub fn progress(&self) -> Arc<Progress> {
    Arc::clone(&self.progress)
  }

  /// Resolve and score every entry. Fails fast on the first unexpected
  /// error; the caller never sees a partial result set.
  pub async fn run(
    &self,
    entries: Vec<ManifestEntry>,
    cancel: CancellationToken,
  ) -> Result<Vec<RepoScore>> {
    let (groups, unresolved) = self.group(&entries).await?;
    let results = self.score_groups(&groups, &cancel).await?;

    let mut out: Vec<RepoScore> =
      Vec::with_capacity(groups.len() + unresolved.len());
    for ((repo, packages), result) in groups.into_iter().zip(results) {
      let mut row = RepoScore::unscored(Some(repo), packages);
      if let Some(set) = result {
        row.apply(set);
      }
      out.push(row);
    }
    // Unresolved packages still surface, unscored and listed individually.
    for package in unresolved {
      out.push(RepoScore::unscored(None, vec![package]));
    }

    if self.hide_unscored {
      out.retain(|row| row.score.is_some());
    }
    sort_rows(&mut out);
    Ok(out)
  }

  /// Group entries by their first mapped repository. A mapper rejection of
  /// a single entry (bad hint, unsupported input) downgrades that entry to
  /// the no-repository bucket; anything else fails the run.
  async fn group(
    &self,
    entries: &[ManifestEntry],
  ) -> Result<(Vec<(RepoName, Vec<Package>)>, Vec<Package>)> {
    let mut groups: Vec<(RepoName, Vec<Package>)> = Vec::new();
    let mut index: HashMap<RepoName, usize> = HashMap::new();
    let mut unresolved: Vec<Package> = Vec::new();

    for entry in entries {
      match self.mapper.repositories(entry).await {
        Ok(repos) => match repos.first() {
          Some(repo) => {
            let slot = *index.entry(repo.clone()).or_insert_with(|| {
              groups.push((repo.clone(), Vec::new()));
              groups.len() - 1
            });
            groups[slot].1.push(entry.package.clone());
          }
          None => unresolved.push(entry.package.clone()),
        },
        Err(e @ (Error::InvalidRepo(_) | Error::UnsupportedSystem(_))) => {
          tracing::warn!(package = %entry.package, error = %e, "cannot resolve repository");
          unresolved.push(entry.package.clone());
        }
        Err(e) => return Err(e),
      }
    }
    Ok((groups, unresolved))
  }

  /// Run each client pass over the still-unresolved groups. Completions
  /// carry their group index, so concurrent passes write disjoint slots.
  async fn score_groups(
    &self,
    groups: &[(RepoName, Vec<Package>)],
    cancel: &CancellationToken,
  ) -> Result<Vec<Option<ScoreSet>>> {
    let mut results: Vec<Option<ScoreSet>> = vec![None; groups.len()];
    self.progress.reset(groups.len());

    for client in &self.clients {
      let pending: Vec<usize> =
        (0..groups.len()).filter(|&i| results[i].is_none()).collect();
      if pending.is_empty() {
        break;
      }

      // A declared limit of 1 serializes the pass; 0 means pool-wide.
      let limit = client.concurrency_limit();
      let workers = if limit == 0 { self.workers } else { limit.min(self.workers) };
      let semaphore = Arc::new(Semaphore::new(workers));
      tracing::debug!(
        client = client.name(),
        repos = pending.len(),
        workers,
        "starting client pass"
      );

      let mut tasks: JoinSet<(usize, Result<ScoreSet>)> = JoinSet::new();
      for i in pending {
        let client = Arc::clone(client);
        let repo = groups[i].0.clone();
        let semaphore = Arc::clone(&semaphore);
        let cancel = cancel.clone();
        tasks.spawn(async move {
          let Ok(_permit) = semaphore.acquire().await else {
            return (i, Err(Error::Cancelled));
          };
          let outcome = tokio::select! {
            () = cancel.cancelled() => Err(Error::Cancelled),
            outcome = client.score(&repo, &cancel) => outcome,
          };
          (i, outcome)
        });
      }

      while let Some(joined) = tasks.join_next().await {
        let (i, outcome) = match joined {
          Ok(v) => v,
          Err(e) if e.is_cancelled() => return Err(Error::Cancelled),
          Err(e) => {
            return Err(Error::Upstream(format!("resolution task failed: {e}")));
          }
        };
        match outcome {
          Ok(set) => {
            let done = self
              .progress
              .advance(format!("{}: scored {}", client.name(), groups[i].0));
            tracing::info!(
              client = client.name(),
              repo = %groups[i].0,
              done,
              total = groups.len(),
              "scored repository"
            );
            results[i] = Some(set);
          }
          // NotFound leaves the slot open for the next client in sequence.
          Err(Error::NotFound) => {}
          Err(e) => {
            tasks.abort_all();
            return Err(e);
          }
        }
      }
    }

    Ok(results)
  }
}

/// Score descending, then repository name descending; rows without a score
/// form the lowest tier.
fn sort_rows(rows: &mut [RepoScore]) {
  use std::cmp::Ordering;

  rows.sort_by(|a, b| match (a.score, b.score) {
    (Some(x), Some(y)) => y
      .partial_cmp(&x)
      .unwrap_or(Ordering::Equal)
      .then_with(|| b.repository.cmp(&a.repository)),
    (Some(_), None) => Ordering::Less,
    (None, Some(_)) => Ordering::Greater,
    (None, None) => b.repository.cmp(&a.repository),
  });
}
