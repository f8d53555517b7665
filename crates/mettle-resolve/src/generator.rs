//! [`HttpGenerator`] — score generation via a scorecard-shaped REST API.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use mettle_core::{
  Error, Result, repo::RepoName, resolve::ScoreGenerator, score::ScoreSet,
};

/// Default public endpoint serving generated scores.
pub const DEFAULT_API_URL: &str = "https://api.securityscorecards.dev";

#[derive(Debug, Deserialize)]
struct ApiCheck {
  name:  String,
  score: i64,
}

#[derive(Debug, Deserialize)]
struct ApiResult {
  score:  f64,
  #[serde(default)]
  checks: Vec<ApiCheck>,
}

/// Fetches scores from `GET {base}/projects/{host}/{org}/{name}`.
///
/// HTTP 404 is the NotFound sentinel; any other failure is an upstream
/// error for that repository.
pub struct HttpGenerator {
  client:   reqwest::Client,
  base_url: String,
}

impl HttpGenerator {
  pub fn new(base_url: impl Into<String>) -> Result<Self> {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(30))
      .build()
      .map_err(|e| Error::Upstream(e.to_string()))?;
    Ok(Self {
      client,
      base_url: base_url.into(),
    })
  }

  fn url(&self, repo: &RepoName) -> String {
    format!("{}/projects/{}", self.base_url.trim_end_matches('/'), repo)
  }
}

#[async_trait]
impl ScoreGenerator for HttpGenerator {
  async fn generate(
    &self,
    repo: &RepoName,
    cancel: &CancellationToken,
  ) -> Result<ScoreSet> {
    let request = self.client.get(self.url(repo)).send();
    let response = tokio::select! {
      () = cancel.cancelled() => return Err(Error::Cancelled),
      response = request => {
        response.map_err(|e| Error::Upstream(format!("GET {repo}: {e}")))?
      }
    };

    if response.status() == reqwest::StatusCode::NOT_FOUND {
      return Err(Error::NotFound);
    }
    if !response.status().is_success() {
      return Err(Error::Upstream(format!(
        "GET {repo} → {}",
        response.status()
      )));
    }

    let result: ApiResult = response
      .json()
      .await
      .map_err(|e| Error::Upstream(format!("decoding score for {repo}: {e}")))?;

    Ok(ScoreSet {
      score:  result.score,
      checks: result
        .checks
        .into_iter()
        .map(|c| (c.name, c.score))
        .collect(),
    })
  }
}
