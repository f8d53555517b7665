//! Canonical repository names — the store's join key.
//!
//! A [`RepoName`] is always `host/org/name`, lower-cased, with no scheme and
//! no trailing path. [`RepoName::parse`] owns the canonicalisation rules;
//! everything downstream trusts the invariant.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A canonical source-hosting location, e.g. `github.com/foo/bar`.
#[derive(
  Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct RepoName(String);

impl RepoName {
  /// Canonicalise `input` into a repository name.
  ///
  /// Accepts bare `host/org/name` paths as well as clone-style URLs
  /// (`https://github.com/Foo/Bar.git`, `git+https://...`). Anything that
  /// does not reduce to three path segments is rejected.
  pub fn parse(input: &str) -> Result<Self> {
    let mut s = input.trim();
    for prefix in ["git+", "https://", "http://"] {
      s = s.strip_prefix(prefix).unwrap_or(s);
    }
    // Fragment / query noise from manifest-supplied URLs.
    s = s.split(['#', '?']).next().unwrap_or(s);

    let segments: Vec<&str> = s.split('/').filter(|p| !p.is_empty()).collect();
    if segments.len() < 3 {
      return Err(Error::InvalidRepo(input.to_owned()));
    }

    let host = segments[0].to_ascii_lowercase();
    let org = segments[1].to_ascii_lowercase();
    let name = segments[2]
      .trim_end_matches(".git")
      .to_ascii_lowercase();

    if !host.contains('.') || org.is_empty() || name.is_empty() {
      return Err(Error::InvalidRepo(input.to_owned()));
    }
    if [&host, &org, &name]
      .iter()
      .any(|p| p.chars().any(char::is_whitespace))
    {
      return Err(Error::InvalidRepo(input.to_owned()));
    }

    Ok(Self(format!("{host}/{org}/{name}")))
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }

  /// The hosting service, e.g. `github.com`.
  pub fn host(&self) -> &str {
    self.0.split('/').next().unwrap_or(&self.0)
  }
}

impl std::fmt::Display for RepoName {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(&self.0)
  }
}

impl std::str::FromStr for RepoName {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    Self::parse(s)
  }
}

impl TryFrom<String> for RepoName {
  type Error = Error;

  fn try_from(s: String) -> Result<Self> {
    Self::parse(&s)
  }
}

impl From<RepoName> for String {
  fn from(repo: RepoName) -> String {
    repo.0
  }
}

#[cfg(test)]
mod tests {
  use super::RepoName;

  #[test]
  fn parses_bare_path() {
    let r = RepoName::parse("github.com/foo/bar").unwrap();
    assert_eq!(r.as_str(), "github.com/foo/bar");
    assert_eq!(r.host(), "github.com");
  }

  #[test]
  fn canonicalises_clone_urls() {
    for input in [
      "https://github.com/Foo/Bar",
      "https://github.com/foo/bar.git",
      "git+https://github.com/foo/bar",
      "GitHub.com/FOO/BAR",
    ] {
      assert_eq!(
        RepoName::parse(input).unwrap().as_str(),
        "github.com/foo/bar",
        "input: {input}"
      );
    }
  }

  #[test]
  fn drops_trailing_path() {
    let r = RepoName::parse("github.com/foo/bar/tree/main/pkg").unwrap();
    assert_eq!(r.as_str(), "github.com/foo/bar");
  }

  #[test]
  fn rejects_short_and_malformed() {
    for input in ["github.com/foo", "not a repo", "", "nodots/foo/bar"] {
      assert!(RepoName::parse(input).is_err(), "input: {input}");
    }
  }
}
