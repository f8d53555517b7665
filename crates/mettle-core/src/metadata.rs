//! Store metadata — the content hash and generation timestamp that decide
//! whether a local copy is current.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Exactly one active value per managed store location. Recomputed on every
/// full rebuild or successful pull; hash equality is the sole currency
/// criterion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
  /// Hex-encoded sha256 of the serialized store file.
  pub hash:      String,
  pub timestamp: DateTime<Utc>,
}

impl Metadata {
  pub fn new(hash: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
    Self { hash: hash.into(), timestamp }
  }

  /// Whether `other` describes the same store contents.
  pub fn matches(&self, other: &Metadata) -> bool {
    self.hash == other.hash
  }
}
