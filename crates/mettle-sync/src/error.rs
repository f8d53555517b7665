//! Error type for `mettle-sync`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] mettle_core::Error),

  #[error("store error: {0}")]
  Store(#[from] mettle_store_sqlite::Error),

  #[error("registry error: {0}")]
  Registry(#[from] oci_distribution::errors::OciDistributionError),

  #[error("invalid registry reference: {0}")]
  Reference(#[from] oci_distribution::ParseError),

  /// The pulled artifact does not have the expected two-layer shape.
  #[error("invalid artifact: {0}")]
  Artifact(String),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),
}

impl Error {
  /// Whether this is the non-fatal "no data here" sentinel.
  pub fn is_not_found(&self) -> bool {
    match self {
      Error::Core(e) => e.is_not_found(),
      Error::Store(e) => matches!(e, mettle_store_sqlite::Error::NotFound),
      _ => false,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl From<Error> for mettle_core::Error {
  fn from(err: Error) -> mettle_core::Error {
    match err {
      Error::Core(e) => e,
      Error::Store(e) => e.into(),
      Error::Io(e) => mettle_core::Error::Io(e),
      Error::Json(e) => mettle_core::Error::Json(e),
      other => mettle_core::Error::Sync(other.to_string()),
    }
  }
}
