//! Result rendering: a fixed-width table for terminals, JSON for machines.

use clap::ValueEnum;

use mettle_core::score::RepoScore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
  Table,
  Json,
}

pub fn render(rows: &[RepoScore], format: OutputFormat) -> serde_json::Result<String> {
  match format {
    OutputFormat::Json => serde_json::to_string_pretty(rows),
    OutputFormat::Table => Ok(render_table(rows)),
  }
}

fn render_table(rows: &[RepoScore]) -> String {
  let mut lines: Vec<(String, String, String)> = vec![(
    "SCORE".to_owned(),
    "REPOSITORY".to_owned(),
    "PACKAGES".to_owned(),
  )];
  for row in rows {
    let score = row
      .score
      .map(|s| format!("{s:.1}"))
      .unwrap_or_else(|| "-".to_owned());
    let repo = row
      .repository
      .as_ref()
      .map(ToString::to_string)
      .unwrap_or_else(|| "-".to_owned());
    let packages = row
      .packages
      .iter()
      .map(ToString::to_string)
      .collect::<Vec<_>>()
      .join(", ");
    lines.push((score, repo, packages));
  }

  let score_w = lines.iter().map(|l| l.0.len()).max().unwrap_or(0);
  let repo_w = lines.iter().map(|l| l.1.len()).max().unwrap_or(0);

  let mut out = String::new();
  for (score, repo, packages) in lines {
    out.push_str(&format!(
      "{score:<score_w$}  {repo:<repo_w$}  {packages}\n"
    ));
  }
  out
}
