//! The two-layer store artifact and its registry transport.
//!
//! The wire format is an OCI-compatible image with exactly two layers: an
//! uncompressed JSON metadata layer and a gzip-compressed data layer (the
//! store file). Each layer carries a distinct fixed media type so decoders
//! select by type, never by position.

use std::{
  env,
  io::{Read as _, Write as _},
};

use flate2::{Compression, read::GzDecoder, write::GzEncoder};
use oci_distribution::{
  Reference,
  client::{Client, ClientConfig, ClientProtocol, Config, ImageData, ImageLayer},
  manifest::OciImageManifest,
  secrets::RegistryAuth,
};

use mettle_core::metadata::Metadata;

use crate::{
  Error, Result,
  progress::{ProgressReader, decile_logger},
};

/// Media type of the uncompressed JSON metadata layer.
pub const METADATA_MEDIA_TYPE: &str =
  "application/vnd.mettle.store.metadata.v1+json";

/// Media type of the gzip-compressed store-file layer.
pub const DATA_MEDIA_TYPE: &str = "application/vnd.mettle.store.data.v1+gzip";

/// Media type of the (empty) image config blob.
const CONFIG_MEDIA_TYPE: &str = "application/vnd.mettle.store.config.v1+json";

// ─── Artifact ────────────────────────────────────────────────────────────────

/// A store file plus its metadata, in distributable form.
#[derive(Debug, Clone)]
pub struct StoreArtifact {
  db:       Vec<u8>,
  metadata: Metadata,
}

impl StoreArtifact {
  /// Pack raw store-file bytes and their metadata.
  pub fn new(db: Vec<u8>, metadata: Metadata) -> Self {
    Self { db, metadata }
  }

  /// The decompressed store file.
  pub fn db(&self) -> &[u8] {
    &self.db
  }

  pub fn metadata(&self) -> &Metadata {
    &self.metadata
  }

  /// Encode into the two wire layers: metadata first, data second. Order is
  /// a convention only — decoding matches on media type.
  pub fn layers(&self) -> Result<Vec<ImageLayer>> {
    let metadata_bytes = serde_json::to_vec(&self.metadata)?;

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&self.db)?;
    let data_bytes = encoder.finish()?;

    Ok(vec![
      ImageLayer::new(metadata_bytes, METADATA_MEDIA_TYPE.to_owned(), None),
      ImageLayer::new(data_bytes, DATA_MEDIA_TYPE.to_owned(), None),
    ])
  }

  /// Validate a pulled image and decode it back into an artifact.
  pub fn from_image(image: ImageData) -> Result<Self> {
    Self::from_layers(image.layers)
  }

  /// Validate wire layers and decode them back into an artifact.
  ///
  /// Any missing layer, extra layer or unknown media type is a hard
  /// failure: the artifact shape is fixed and nothing else is accepted.
  pub fn from_layers(layers: Vec<ImageLayer>) -> Result<Self> {
    if layers.len() != 2 {
      return Err(Error::Artifact(format!(
        "expected exactly 2 layers, got {}",
        layers.len()
      )));
    }

    let mut metadata_layer = None;
    let mut data_layer = None;
    for layer in layers {
      match layer.media_type.as_str() {
        METADATA_MEDIA_TYPE if metadata_layer.is_none() => {
          metadata_layer = Some(layer)
        }
        DATA_MEDIA_TYPE if data_layer.is_none() => data_layer = Some(layer),
        other => {
          return Err(Error::Artifact(format!(
            "unexpected layer media type {other:?}"
          )));
        }
      }
    }
    let metadata_layer = metadata_layer
      .ok_or_else(|| Error::Artifact("missing metadata layer".into()))?;
    let data_layer =
      data_layer.ok_or_else(|| Error::Artifact("missing data layer".into()))?;

    let metadata: Metadata = serde_json::from_slice(&metadata_layer.data)
      .map_err(|e| Error::Artifact(format!("metadata layer: {e}")))?;

    let compressed_len = data_layer.data.len() as u64;
    let reader = ProgressReader::new(
      data_layer.data.as_slice(),
      compressed_len,
      decile_logger("data layer"),
    );
    let mut db = Vec::new();
    GzDecoder::new(reader)
      .read_to_end(&mut db)
      .map_err(|e| Error::Artifact(format!("data layer: {e}")))?;

    Ok(Self { db, metadata })
  }
}

// ─── Registry transport ──────────────────────────────────────────────────────

/// Connection settings for the artifact registry.
#[derive(Debug, Clone, Default)]
pub struct RegistryOpts {
  /// Talk plain HTTP instead of HTTPS (local registries, tests).
  pub plain_http: bool,
}

/// Pushes and pulls store artifacts against an OCI registry.
pub struct Registry {
  client: Client,
  auth:   RegistryAuth,
}

impl Registry {
  /// Build a registry client. Credentials come from
  /// `METTLE_REGISTRY_USERNAME` / `METTLE_REGISTRY_PASSWORD`; unset means
  /// anonymous.
  pub fn new(opts: &RegistryOpts) -> Self {
    let protocol = if opts.plain_http {
      ClientProtocol::Http
    } else {
      ClientProtocol::Https
    };
    let client = Client::new(ClientConfig {
      protocol,
      ..ClientConfig::default()
    });
    Self { client, auth: auth_from_env() }
  }

  /// Push `artifact` to `reference`. Returns the manifest digest reported
  /// by the registry.
  pub async fn push(
    &mut self,
    reference: &str,
    artifact: &StoreArtifact,
  ) -> Result<String> {
    let reference = Reference::try_from(reference)?;
    let layers = artifact.layers()?;
    let config = Config::new(b"{}".to_vec(), CONFIG_MEDIA_TYPE.to_owned(), None);
    let manifest = OciImageManifest::build(&layers, &config, None);

    tracing::info!(reference = %reference, "pushing store artifact");
    let response = self
      .client
      .push(&reference, &layers, config, &self.auth, Some(manifest))
      .await?;
    Ok(response.manifest_url)
  }

  /// Pull and validate the full artifact at `reference`.
  pub async fn pull(&mut self, reference: &str) -> Result<StoreArtifact> {
    let reference = Reference::try_from(reference)?;

    tracing::info!(reference = %reference, "pulling store artifact");
    let image = self
      .client
      .pull(
        &reference,
        &self.auth,
        vec![METADATA_MEDIA_TYPE, DATA_MEDIA_TYPE],
      )
      .await?;
    StoreArtifact::from_image(image)
  }

  /// Fetch only the metadata layer of the artifact at `reference` — the
  /// differential-pull fast path that avoids transferring the data layer.
  pub async fn fetch_metadata(&mut self, reference: &str) -> Result<Metadata> {
    let reference = Reference::try_from(reference)?;

    let (manifest, _digest) =
      self.client.pull_image_manifest(&reference, &self.auth).await?;
    let descriptor = manifest
      .layers
      .iter()
      .find(|l| l.media_type == METADATA_MEDIA_TYPE)
      .ok_or_else(|| Error::Artifact("missing metadata layer".into()))?;

    let mut buf = std::io::Cursor::new(Vec::new());
    self
      .client
      .pull_blob(&reference, &descriptor.digest, &mut buf)
      .await?;

    let metadata: Metadata = serde_json::from_slice(buf.get_ref())
      .map_err(|e| Error::Artifact(format!("metadata layer: {e}")))?;
    Ok(metadata)
  }
}

fn auth_from_env() -> RegistryAuth {
  let username = env::var("METTLE_REGISTRY_USERNAME").unwrap_or_default();
  let password = env::var("METTLE_REGISTRY_PASSWORD").unwrap_or_default();
  if username.is_empty() || password.is_empty() {
    RegistryAuth::Anonymous
  } else {
    RegistryAuth::Basic(username, password)
  }
}
