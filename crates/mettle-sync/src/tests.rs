//! Tests for artifact packing/validation and the managed-directory
//! lifecycle. Registry round-trips need a live registry and are exercised
//! end-to-end via the CLI; everything up to the wire is covered here.

use async_trait::async_trait;
use chrono::Utc;
use oci_distribution::client::ImageLayer;

use mettle_core::{
  metadata::Metadata,
  package::{Package, System},
  repo::RepoName,
  score::{PackageRepo, Score},
  store::{ScoreWriter, Source},
};
use mettle_store_sqlite::SqliteStore;

use crate::{
  DATA_MEDIA_TYPE, Error, JsonlSource, METADATA_FILE, METADATA_MEDIA_TYPE,
  Manager, Registry, RegistryOpts, STORE_FILE, StoreArtifact,
  manager::file_sha256,
};

fn metadata() -> Metadata {
  Metadata::new("abc123", Utc::now())
}

fn repo(s: &str) -> RepoName {
  RepoName::parse(s).unwrap()
}

// ─── Artifact ────────────────────────────────────────────────────────────────

#[test]
fn pack_then_unpack_round_trips() {
  let artifact = StoreArtifact::new(b"sqlite bytes here".to_vec(), metadata());

  let layers = artifact.layers().unwrap();
  assert_eq!(layers.len(), 2);
  assert_eq!(layers[0].media_type, METADATA_MEDIA_TYPE);
  assert_eq!(layers[1].media_type, DATA_MEDIA_TYPE);
  // The data layer is compressed; the raw bytes must not appear verbatim.
  assert_ne!(layers[1].data, b"sqlite bytes here".to_vec());

  let decoded = StoreArtifact::from_layers(layers).unwrap();
  assert_eq!(decoded.db(), b"sqlite bytes here");
  assert_eq!(decoded.metadata(), artifact.metadata());
}

#[test]
fn unpack_accepts_layers_in_any_order() {
  let artifact = StoreArtifact::new(b"data".to_vec(), metadata());
  let mut layers = artifact.layers().unwrap();
  layers.reverse();

  let decoded = StoreArtifact::from_layers(layers).unwrap();
  assert_eq!(decoded.db(), b"data");
}

#[test]
fn unpack_rejects_wrong_layer_count() {
  let artifact = StoreArtifact::new(b"data".to_vec(), metadata());
  let mut layers = artifact.layers().unwrap();
  layers.pop();

  let err = StoreArtifact::from_layers(layers).unwrap_err();
  assert!(matches!(err, Error::Artifact(_)));
}

#[test]
fn unpack_rejects_unknown_media_type() {
  let artifact = StoreArtifact::new(b"data".to_vec(), metadata());
  let mut layers = artifact.layers().unwrap();
  layers[1] = ImageLayer::new(
    layers[1].data.clone(),
    "application/vnd.oci.image.layer.v1.tar".to_owned(),
    None,
  );

  let err = StoreArtifact::from_layers(layers).unwrap_err();
  assert!(matches!(err, Error::Artifact(_)));
}

#[test]
fn unpack_rejects_duplicate_metadata_layers() {
  let artifact = StoreArtifact::new(b"data".to_vec(), metadata());
  let layers = artifact.layers().unwrap();
  let doubled = vec![layers[0].clone(), layers[0].clone()];

  let err = StoreArtifact::from_layers(doubled).unwrap_err();
  assert!(matches!(err, Error::Artifact(_)));
}

#[test]
fn metadata_json_shape() {
  let m = Metadata::new("deadbeef", Utc::now());
  let json = serde_json::to_value(&m).unwrap();
  assert_eq!(json["hash"], "deadbeef");
  // RFC 3339 timestamp.
  assert!(json["timestamp"].as_str().unwrap().contains('T'));
}

// ─── Manager ─────────────────────────────────────────────────────────────────

struct FakeSource {
  rows: Vec<(PackageRepo, f64)>,
}

#[async_trait]
impl Source for FakeSource {
  fn name(&self) -> &str {
    "fake"
  }

  async fn update(&self, writer: &dyn ScoreWriter) -> mettle_core::Result<()> {
    writer
      .add_packages(self.rows.iter().map(|(p, _)| p.clone()).collect())
      .await?;
    writer
      .add_scores(
        self
          .rows
          .iter()
          .map(|(p, score)| Score { repository: p.repository.clone(), score: *score })
          .collect(),
      )
      .await?;
    Ok(())
  }
}

fn fake_source(rows: &[(&str, f64)]) -> Box<dyn Source> {
  Box::new(FakeSource {
    rows: rows
      .iter()
      .map(|(r, score)| {
        (
          PackageRepo {
            package:    Package::new(System::Go, *r),
            repository: repo(r),
          },
          *score,
        )
      })
      .collect(),
  })
}

fn manager(dir: &std::path::Path) -> Manager {
  Manager::new(dir.join("db"), Registry::new(&RegistryOpts::default()))
}

#[tokio::test]
async fn build_populates_managed_directory() {
  let tmp = tempfile::tempdir().unwrap();
  let mgr = manager(tmp.path());

  let built = mgr
    .build(&[fake_source(&[("github.com/foo/bar", 7.5)])])
    .await
    .unwrap();

  let db_path = tmp.path().join("db").join(STORE_FILE);
  assert!(db_path.exists());
  assert!(tmp.path().join("db").join(METADATA_FILE).exists());
  assert_eq!(built.hash, file_sha256(&db_path).unwrap());
  assert_eq!(mgr.metadata().unwrap(), built);

  let store = SqliteStore::open(&db_path).await.unwrap();
  let scores = store.scores(&[repo("github.com/foo/bar")]).await.unwrap();
  assert_eq!(scores[0].score, 7.5);
}

#[tokio::test]
async fn rebuild_replaces_previous_contents() {
  let tmp = tempfile::tempdir().unwrap();
  let mgr = manager(tmp.path());

  let first = mgr
    .build(&[fake_source(&[("github.com/old/repo", 1.0)])])
    .await
    .unwrap();
  let second = mgr
    .build(&[fake_source(&[("github.com/new/repo", 2.0)])])
    .await
    .unwrap();
  assert_ne!(first.hash, second.hash);

  let store = SqliteStore::open(tmp.path().join("db").join(STORE_FILE))
    .await
    .unwrap();
  assert!(store.scores(&[repo("github.com/old/repo")]).await.is_err());
  assert_eq!(
    store.scores(&[repo("github.com/new/repo")]).await.unwrap()[0].score,
    2.0
  );
  // No staging or retired directories left behind.
  assert!(!tmp.path().join(".db.staging").exists());
  assert!(!tmp.path().join("db.retired").exists());
}

#[tokio::test]
async fn metadata_missing_is_not_found() {
  let tmp = tempfile::tempdir().unwrap();
  let mgr = manager(tmp.path());
  assert!(mgr.metadata().unwrap_err().is_not_found());
}

#[test]
fn identical_hashes_mean_no_update() {
  let now = Utc::now();
  let local = Metadata::new("same", now);
  let remote = Metadata::new("same", now + chrono::Duration::hours(4));
  // Only the hash decides currency; timestamps may differ.
  assert!(local.matches(&remote));
  assert!(!local.matches(&Metadata::new("other", now)));
}

// ─── JsonlSource ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn jsonl_source_loads_rows_and_skips_bad_ones() {
  let tmp = tempfile::tempdir().unwrap();
  let path = tmp.path().join("dump.jsonl");
  std::fs::write(
    &path,
    concat!(
      r#"{"system":"go","name":"github.com/foo/bar","repository":"github.com/foo/bar","score":7.5,"checks":{"Maintained":10}}"#,
      "\n",
      r#"{"system":"npm","name":"left-pad","repository":"github.com/left-pad/left-pad"}"#,
      "\n",
      "not json at all\n",
      r#"{"system":"npm","name":"broken","repository":"nowhere"}"#,
      "\n",
    ),
  )
  .unwrap();

  let store = SqliteStore::open_in_memory().await.unwrap();
  let source = JsonlSource::new(&path);
  source.update(&store).await.unwrap();

  let repos = store.repositories(System::Go, "github.com/foo/bar").await.unwrap();
  assert_eq!(repos, vec![repo("github.com/foo/bar")]);
  let scores = store.scores(&[repo("github.com/foo/bar")]).await.unwrap();
  assert_eq!(scores[0].score, 7.5);
  let checks = store.checks(&repo("github.com/foo/bar")).await.unwrap();
  assert_eq!(checks[0].name, "Maintained");

  // Association-only row: package present, no score.
  assert!(store.repositories(System::Npm, "left-pad").await.is_ok());
  assert!(
    store
      .scores(&[repo("github.com/left-pad/left-pad")])
      .await
      .is_err()
  );
  // The unparsable rows were skipped, not fatal.
  assert!(store.repositories(System::Npm, "broken").await.is_err());
}
