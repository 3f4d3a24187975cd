use anyhow::{bail, Result};
use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

use crate::model::{SortDirection, WidgetConfiguration};
use crate::service::{self, EnvMergeService, FixtureMergeService, HttpMergeService, MergeService};
use crate::util;

#[derive(Parser, Debug)]
#[command(
    name = "merged-report-grid",
    version,
    about = "Merge 2-5 reports through a Merge Service and render the result as a grid view model (JSON)",
    long_about = None
)]
pub struct Cli {
  /// Widget configuration JSON (camelCase keys, e.g. report1Id, mergeMode)
  #[arg(long)]
  pub config: Option<PathBuf>,

  /// Serve this MergeResult JSON instead of calling a live service
  #[arg(long)]
  pub result: Option<PathBuf>,

  /// Merge Service endpoint (POST {reportIds, optionsJson}); falls back to MRG_MERGE_ENDPOINT
  #[arg(long)]
  pub endpoint: Option<String>,

  /// Behave as if rendered inside an editor (longer debounce, cache-busting token)
  #[arg(long)]
  pub editor: bool,

  /// Apply a user sort before the first fetch
  #[arg(long)]
  pub sort_by: Option<String>,

  /// Direction for --sort-by (asc|desc)
  #[arg(long, default_value = "asc")]
  pub sort_direction: String,

  /// Include the diagnostics report regardless of the configuration's debugMode
  #[arg(long)]
  pub debug: bool,

  /// Emit a troff man page to stdout (internal; for packaging)
  #[arg(long, hide = true)]
  pub gen_man: bool,

  /// Override the "now" instant for cache-busting tokens (hidden; tests only)
  #[arg(long = "now-override", hide = true)]
  pub now_override: Option<String>,
}

/// Where merge results come from for this run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ServiceSource {
  /// MRG_TEST_MERGE_* variables.
  Env,
  Fixture { path: String },
  Http { endpoint: String },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectiveConfig {
  pub widget: WidgetConfiguration,
  pub source: ServiceSource,
  pub design_mode: bool,
  pub sort: Option<(String, SortDirection)>,
  pub now_override_ms: Option<i64>,
}

impl EffectiveConfig {
  pub fn build_service(&self) -> Result<Arc<dyn MergeService>> {
    Ok(match &self.source {
      ServiceSource::Env => Arc::new(EnvMergeService),
      ServiceSource::Fixture { path } => Arc::new(FixtureMergeService::from_path(std::path::Path::new(path))?),
      ServiceSource::Http { endpoint } => Arc::new(HttpMergeService::new(endpoint.clone())),
    })
  }
}

pub fn normalize(cli: Cli) -> Result<EffectiveConfig> {
  let mut widget = match &cli.config {
    Some(path) => util::load_config(path)?,
    None => WidgetConfiguration::default(),
  };
  if cli.debug {
    widget.debug_mode = true;
  }

  // Env mock wins so tests can drive the binary without files or network.
  let source = if service::env_wants_mock() {
    ServiceSource::Env
  } else if let Some(path) = &cli.result {
    ServiceSource::Fixture { path: path.to_string_lossy().to_string() }
  } else if let Some(endpoint) = cli.endpoint.clone().or_else(|| std::env::var(service::ENV_ENDPOINT).ok()) {
    ServiceSource::Http { endpoint }
  } else {
    bail!("Provide one of --result <file> or --endpoint <url> (or set {})", service::ENV_ENDPOINT)
  };

  let sort = match &cli.sort_by {
    Some(field) => {
      let Some(direction) = SortDirection::parse(&cli.sort_direction) else {
        bail!("Invalid --sort-direction {:?}: expected asc or desc", cli.sort_direction)
      };
      Some((field.clone(), direction))
    }
    None => None,
  };

  let now_override_ms = cli.now_override.as_deref().map(util::parse_now_override).transpose()?;

  Ok(EffectiveConfig { widget, source, design_mode: cli.editor, sort, now_override_ms })
}
