//! Error taxonomy shared by every mettle crate.
//!
//! `NotFound` is the one non-fatal variant: it means "absent here, try the
//! next mapper/client/store" and is never logged as an error. Everything
//! else is fatal for the operation that raised it.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// No data for this key. Drives fallback throughout the resolver chains.
  #[error("not found")]
  NotFound,

  #[error("invalid repository: {0:?}")]
  InvalidRepo(String),

  #[error("unsupported package system: {0:?}")]
  UnsupportedSystem(String),

  #[error("unsupported manifest format: {0:?}")]
  UnsupportedFormat(String),

  /// A collaborator returned something we cannot interpret.
  #[error("unexpected upstream response: {0}")]
  Upstream(String),

  /// The run's cancellation context fired.
  #[error("operation cancelled")]
  Cancelled,

  #[error("store error: {0}")]
  Store(String),

  #[error("sync error: {0}")]
  Sync(String),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),
}

impl Error {
  /// Whether this is the "try the next thing" sentinel.
  pub fn is_not_found(&self) -> bool {
    matches!(self, Error::NotFound)
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
