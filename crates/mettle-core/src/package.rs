//! Package identity — the unit a manifest declares.
//!
//! Packages are not versioned here: the store records the latest known
//! repository association per `(system, name)` identity.

use serde::{Deserialize, Serialize};

/// The package ecosystem a name belongs to.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum System {
  Go,
  Npm,
  Cargo,
  Pypi,
  Maven,
  Nuget,
  Rubygems,
}

/// A package identity: ecosystem plus name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Package {
  pub system: System,
  pub name:   String,
}

impl Package {
  pub fn new(system: System, name: impl Into<String>) -> Self {
    Self { system, name: name.into() }
  }
}

impl std::fmt::Display for Package {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}:{}", self.system, self.name)
  }
}

/// A decoded manifest row: a package plus the repository hint the manifest
/// carried for it, if any.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
  #[serde(flatten)]
  pub package:    Package,
  /// Raw repository hint as written in the manifest (URL or host path).
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub repository: Option<String>,
}

impl ManifestEntry {
  pub fn new(package: Package) -> Self {
    Self { package, repository: None }
  }

  pub fn with_hint(package: Package, hint: impl Into<String>) -> Self {
    Self { package, repository: Some(hint.into()) }
  }
}
