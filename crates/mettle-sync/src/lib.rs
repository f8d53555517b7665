//! Store distribution: the two-layer registry artifact and the managed
//! on-disk lifecycle.
//!
//! [`StoreArtifact`] packs a store file plus its metadata into an
//! OCI-compatible artifact with exactly two typed layers; [`Registry`]
//! moves artifacts to and from a registry reference; [`Manager`] owns the
//! managed directory — wholesale rebuilds from bulk [`Source`]s, content
//! hashing, atomic replacement, differential pulls.

mod artifact;
mod manager;
mod progress;
mod source;

pub mod error;

pub use artifact::{
  DATA_MEDIA_TYPE, METADATA_MEDIA_TYPE, Registry, RegistryOpts, StoreArtifact,
};
pub use error::{Error, Result};
pub use manager::{METADATA_FILE, Manager, PullOutcome, STORE_FILE};
pub use progress::ProgressReader;
pub use source::JsonlSource;

#[cfg(test)]
mod tests;
