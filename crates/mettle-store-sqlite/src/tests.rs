//! Integration tests for `SqliteStore` and `ScoreCache` against in-memory
//! databases.

use std::time::Duration;

use mettle_core::{
  package::{Package, System},
  repo::RepoName,
  score::{CheckScore, PackageRepo, Score, ScoreSet},
};

use crate::{Error, ScoreCache, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory().await.expect("in-memory store")
}

fn repo(s: &str) -> RepoName {
  RepoName::parse(s).unwrap()
}

fn pkg_row(system: System, name: &str, repository: &str) -> PackageRepo {
  PackageRepo {
    package:    Package::new(system, name),
    repository: repo(repository),
  }
}

// ─── Packages ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn add_and_get_repositories() {
  let s = store().await;
  s.add_packages(vec![pkg_row(System::Go, "github.com/foo/bar", "github.com/foo/bar")])
    .await
    .unwrap();

  let repos = s.repositories(System::Go, "github.com/foo/bar").await.unwrap();
  assert_eq!(repos, vec![repo("github.com/foo/bar")]);
}

#[tokio::test]
async fn repositories_missing_is_not_found() {
  let s = store().await;
  let err = s.repositories(System::Npm, "left-pad").await.unwrap_err();
  assert!(matches!(err, Error::NotFound));
}

#[tokio::test]
async fn repeated_package_writes_are_idempotent() {
  let s = store().await;
  let rows = vec![
    pkg_row(System::Npm, "left-pad", "github.com/left-pad/left-pad"),
    pkg_row(System::Npm, "left-pad", "gitlab.com/mirror/left-pad"),
  ];

  s.add_packages(rows.clone()).await.unwrap();
  s.add_packages(rows).await.unwrap();

  let repos = s.repositories(System::Npm, "left-pad").await.unwrap();
  assert_eq!(
    repos,
    vec![
      repo("github.com/left-pad/left-pad"),
      repo("gitlab.com/mirror/left-pad"),
    ]
  );
}

#[tokio::test]
async fn repositories_are_ordered_lexicographically() {
  let s = store().await;
  s.add_packages(vec![
    pkg_row(System::Cargo, "serde", "gitlab.com/z/serde"),
    pkg_row(System::Cargo, "serde", "bitbucket.org/a/serde"),
    pkg_row(System::Cargo, "serde", "github.com/serde-rs/serde"),
  ])
  .await
  .unwrap();

  let repos = s.repositories(System::Cargo, "serde").await.unwrap();
  let names: Vec<&str> = repos.iter().map(RepoName::as_str).collect();
  assert_eq!(
    names,
    vec![
      "bitbucket.org/a/serde",
      "github.com/serde-rs/serde",
      "gitlab.com/z/serde",
    ]
  );
}

#[tokio::test]
async fn same_package_different_systems_are_distinct() {
  let s = store().await;
  s.add_packages(vec![
    pkg_row(System::Npm, "redis", "github.com/redis/node-redis"),
    pkg_row(System::Pypi, "redis", "github.com/redis/redis-py"),
  ])
  .await
  .unwrap();

  let npm = s.repositories(System::Npm, "redis").await.unwrap();
  assert_eq!(npm, vec![repo("github.com/redis/node-redis")]);
  let pypi = s.repositories(System::Pypi, "redis").await.unwrap();
  assert_eq!(pypi, vec![repo("github.com/redis/redis-py")]);
}

// ─── Scores ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn add_and_get_scores() {
  let s = store().await;
  s.add_scores(vec![Score { repository: repo("github.com/foo/bar"), score: 7.5 }])
    .await
    .unwrap();

  let scores = s.scores(&[repo("github.com/foo/bar")]).await.unwrap();
  assert_eq!(scores.len(), 1);
  assert_eq!(scores[0].score, 7.5);
}

#[tokio::test]
async fn scores_missing_is_not_found() {
  let s = store().await;
  let err = s.scores(&[repo("github.com/foo/bar")]).await.unwrap_err();
  assert!(matches!(err, Error::NotFound));
}

#[tokio::test]
async fn later_score_replaces_earlier() {
  let s = store().await;
  let r = repo("github.com/foo/bar");

  s.add_scores(vec![Score { repository: r.clone(), score: 3.0 }])
    .await
    .unwrap();
  s.add_scores(vec![Score { repository: r.clone(), score: 9.1 }])
    .await
    .unwrap();

  let scores = s.scores(std::slice::from_ref(&r)).await.unwrap();
  assert_eq!(scores.len(), 1);
  assert_eq!(scores[0].score, 9.1);
}

#[tokio::test]
async fn duplicate_scores_in_one_batch_last_wins() {
  let s = store().await;
  let r = repo("github.com/foo/bar");

  s.add_scores(vec![
    Score { repository: r.clone(), score: 1.0 },
    Score { repository: r.clone(), score: 2.0 },
    Score { repository: r.clone(), score: 4.2 },
  ])
  .await
  .unwrap();

  let scores = s.scores(std::slice::from_ref(&r)).await.unwrap();
  assert_eq!(scores.len(), 1);
  assert_eq!(scores[0].score, 4.2);
}

#[tokio::test]
async fn scores_returns_only_matching_repositories() {
  let s = store().await;
  s.add_scores(vec![
    Score { repository: repo("github.com/a/a"), score: 1.0 },
    Score { repository: repo("github.com/b/b"), score: 2.0 },
    Score { repository: repo("github.com/c/c"), score: 3.0 },
  ])
  .await
  .unwrap();

  let scores = s
    .scores(&[repo("github.com/a/a"), repo("github.com/c/c")])
    .await
    .unwrap();
  let got: Vec<&str> = scores.iter().map(|s| s.repository.as_str()).collect();
  assert_eq!(got, vec!["github.com/a/a", "github.com/c/c"]);
}

// ─── Checks ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn add_and_get_checks() {
  let s = store().await;
  let r = repo("github.com/foo/bar");

  s.add_checks(vec![
    CheckScore { repository: r.clone(), name: "Maintained".into(), score: 10 },
    CheckScore { repository: r.clone(), name: "Code-Review".into(), score: 4 },
  ])
  .await
  .unwrap();

  let checks = s.checks(&r).await.unwrap();
  let got: Vec<(&str, i64)> =
    checks.iter().map(|c| (c.name.as_str(), c.score)).collect();
  assert_eq!(got, vec![("Code-Review", 4), ("Maintained", 10)]);
}

#[tokio::test]
async fn checks_missing_is_not_found() {
  let s = store().await;
  let err = s.checks(&repo("github.com/foo/bar")).await.unwrap_err();
  assert!(matches!(err, Error::NotFound));
}

#[tokio::test]
async fn check_replacement_is_independent_per_name() {
  let s = store().await;
  let r = repo("github.com/foo/bar");

  s.add_checks(vec![
    CheckScore { repository: r.clone(), name: "Maintained".into(), score: 10 },
    CheckScore { repository: r.clone(), name: "License".into(), score: 9 },
  ])
  .await
  .unwrap();
  s.add_checks(vec![CheckScore {
    repository: r.clone(),
    name:       "Maintained".into(),
    score:      2,
  }])
  .await
  .unwrap();

  let checks = s.checks(&r).await.unwrap();
  let got: Vec<(&str, i64)> =
    checks.iter().map(|c| (c.name.as_str(), c.score)).collect();
  assert_eq!(got, vec![("License", 9), ("Maintained", 2)]);
}

// ─── Chunking ────────────────────────────────────────────────────────────────

// 1200 three-column rows force several staging chunks under the 999-param
// ceiling; the result must match what row-at-a-time writes produce.
#[tokio::test]
async fn chunked_and_single_row_writes_agree() {
  let chunked = store().await;
  let single = store().await;

  let rows: Vec<PackageRepo> = (0..1200)
    .map(|i| {
      pkg_row(
        System::Go,
        &format!("github.com/mod/pkg{i}"),
        &format!("github.com/mod/pkg{i}"),
      )
    })
    .collect();

  chunked.add_packages(rows.clone()).await.unwrap();
  for row in rows.clone() {
    single.add_packages(vec![row]).await.unwrap();
  }

  for row in &rows {
    let a = chunked
      .repositories(System::Go, &row.package.name)
      .await
      .unwrap();
    let b = single
      .repositories(System::Go, &row.package.name)
      .await
      .unwrap();
    assert_eq!(a, b);
  }
}

#[tokio::test]
async fn large_score_batch_round_trips() {
  let s = store().await;
  let rows: Vec<Score> = (0..1500)
    .map(|i| Score {
      repository: repo(&format!("github.com/org/repo{i}")),
      score:      f64::from(i % 11),
    })
    .collect();
  let all: Vec<RepoName> = rows.iter().map(|r| r.repository.clone()).collect();

  s.add_scores(rows).await.unwrap();

  let scores = s.scores(&all).await.unwrap();
  assert_eq!(scores.len(), 1500);
}

// ─── Lifecycle ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_twice_fails() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("scores.db");

  let s = SqliteStore::create(&path).await.unwrap();
  s.close().await.unwrap();

  let err = SqliteStore::create(&path).await.unwrap_err();
  assert!(matches!(err, Error::AlreadyInitialized(_)));
}

#[tokio::test]
async fn open_uninitialized_fails() {
  let dir = tempfile::tempdir().unwrap();
  let err = SqliteStore::open(dir.path().join("missing.db")).await.unwrap_err();
  assert!(matches!(err, Error::NotInitialized(_)));
}

#[tokio::test]
async fn create_close_reopen_keeps_data() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("scores.db");

  let s = SqliteStore::create(&path).await.unwrap();
  s.add_scores(vec![Score { repository: repo("github.com/foo/bar"), score: 5.0 }])
    .await
    .unwrap();
  s.close().await.unwrap();

  let s = SqliteStore::open(&path).await.unwrap();
  let scores = s.scores(&[repo("github.com/foo/bar")]).await.unwrap();
  assert_eq!(scores[0].score, 5.0);
}

// ─── Cache ───────────────────────────────────────────────────────────────────

fn score_set(score: f64) -> ScoreSet {
  ScoreSet {
    score,
    checks: [("Maintained".to_owned(), 10)].into_iter().collect(),
  }
}

#[tokio::test]
async fn cache_round_trip() {
  let cache = ScoreCache::open_in_memory(Duration::from_secs(3600))
    .await
    .unwrap();
  let r = repo("github.com/foo/bar");

  cache.put(&r, &score_set(7.5)).await.unwrap();
  let got = cache.get(&r).await.unwrap();
  assert_eq!(got, score_set(7.5));
}

#[tokio::test]
async fn cache_miss_is_not_found() {
  let cache = ScoreCache::open_in_memory(Duration::from_secs(3600))
    .await
    .unwrap();
  let err = cache.get(&repo("github.com/foo/bar")).await.unwrap_err();
  assert!(matches!(err, Error::NotFound));
}

#[tokio::test]
async fn cache_entry_expires() {
  let cache = ScoreCache::open_in_memory(Duration::from_millis(50))
    .await
    .unwrap();
  let r = repo("github.com/foo/bar");

  cache.put(&r, &score_set(7.5)).await.unwrap();
  tokio::time::sleep(Duration::from_millis(80)).await;

  let err = cache.get(&r).await.unwrap_err();
  assert!(matches!(err, Error::NotFound));
}

#[tokio::test]
async fn cache_put_overwrites() {
  let cache = ScoreCache::open_in_memory(Duration::from_secs(3600))
    .await
    .unwrap();
  let r = repo("github.com/foo/bar");

  cache.put(&r, &score_set(1.0)).await.unwrap();
  cache.put(&r, &score_set(9.0)).await.unwrap();

  let got = cache.get(&r).await.unwrap();
  assert_eq!(got.score, 9.0);
}
