//! Thin manifest decoding at the CLI boundary.
//!
//! Two formats: one purl per line, or a JSON array of
//! `{"system": ..., "name": ..., "repository": ...?}` objects. A row the
//! decoder cannot interpret is skipped with a warning — bad input is fatal
//! for the row, not for the run.

use std::str::FromStr as _;

use clap::ValueEnum;

use mettle_core::{
  Error, Result,
  package::{ManifestEntry, Package, System},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ManifestFormat {
  /// One package URL per line, e.g. `pkg:golang/github.com/foo/bar@v1.2.3`.
  Purl,
  /// A JSON array of manifest entries.
  Json,
}

/// Decode raw manifest text into entries.
pub fn decode(raw: &str, format: ManifestFormat) -> Result<Vec<ManifestEntry>> {
  match format {
    ManifestFormat::Json => {
      serde_json::from_str(raw).map_err(|e| Error::UnsupportedFormat(e.to_string()))
    }
    ManifestFormat::Purl => {
      let mut entries = Vec::new();
      for (lineno, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
          continue;
        }
        match parse_purl(line) {
          Ok(entry) => entries.push(entry),
          Err(e) => {
            tracing::warn!(line = lineno + 1, error = %e, "skipping manifest line");
          }
        }
      }
      Ok(entries)
    }
  }
}

/// Parse a purl into a package identity.
///
/// Handles the subset this tool consumes: scheme, type, namespace/name,
/// with version, qualifiers and subpath stripped.
fn parse_purl(raw: &str) -> Result<ManifestEntry> {
  let rest = raw
    .strip_prefix("pkg:")
    .ok_or_else(|| Error::UnsupportedFormat(raw.to_owned()))?;

  // Drop subpath, qualifiers, then version — in that order.
  let rest = rest.split('#').next().unwrap_or(rest);
  let rest = rest.split('?').next().unwrap_or(rest);
  let rest = rest.rsplit_once('@').map_or(rest, |(head, _)| head);

  let (purl_type, name) = rest
    .split_once('/')
    .ok_or_else(|| Error::UnsupportedFormat(raw.to_owned()))?;

  let system = match purl_type.to_ascii_lowercase().as_str() {
    "golang" => System::Go,
    "gem" => System::Rubygems,
    other => System::from_str(other)
      .map_err(|_| Error::UnsupportedSystem(other.to_owned()))?,
  };

  let name = name.replace("%40", "@");
  if name.is_empty() {
    return Err(Error::UnsupportedFormat(raw.to_owned()));
  }

  Ok(ManifestEntry::new(Package::new(system, name)))
}
