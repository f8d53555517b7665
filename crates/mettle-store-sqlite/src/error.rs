//! Error type for `mettle-store-sqlite`.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] mettle_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  /// No rows for the requested key. Reads never return empty success
  /// values; callers treat this as "try the next lookup strategy".
  #[error("not found")]
  NotFound,

  #[error("store already initialized: {0}")]
  AlreadyInitialized(PathBuf),

  #[error("store not initialized: {0}")]
  NotInitialized(PathBuf),

  #[error("timestamp parse error: {0}")]
  Timestamp(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl From<Error> for mettle_core::Error {
  fn from(err: Error) -> mettle_core::Error {
    match err {
      Error::NotFound => mettle_core::Error::NotFound,
      Error::Core(e) => e,
      other => mettle_core::Error::Store(other.to_string()),
    }
  }
}
