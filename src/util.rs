// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: Utilities for clock overrides, config file loading, and man page rendering
// role: utilities/helpers
// inputs: optional RFC3339/epoch override strings; config paths; clap CommandFactory
// outputs: epoch milliseconds, WidgetConfiguration, man page text
// invariants:
// - effective_now_ms is the only place the wall clock is read for request tokens
// errors: IO and parse errors bubble with path context
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::CommandFactory;

use crate::model::WidgetConfiguration;

/// Returns the effective "now" in epoch milliseconds given an optional override.
pub fn effective_now_ms(override_ms: Option<i64>) -> i64 {
  override_ms.unwrap_or_else(|| Utc::now().timestamp_millis())
}

/// Accepts either an RFC3339 timestamp or a bare epoch-millis integer.
pub fn parse_now_override(raw: &str) -> Result<i64> {
  let raw = raw.trim();
  if let Ok(ms) = raw.parse::<i64>() {
    return Ok(ms);
  }
  let dt = DateTime::parse_from_rfc3339(raw).with_context(|| format!("invalid --now-override: {}", raw))?;
  Ok(dt.timestamp_millis())
}

/// Read a widget configuration document; unknown keys are ignored, missing ones default.
pub fn load_config(path: &Path) -> Result<WidgetConfiguration> {
  let buf = std::fs::read(path).with_context(|| format!("reading config {}", path.display()))?;
  serde_json::from_slice(&buf).with_context(|| format!("parsing config {}", path.display()))
}

/// Render a section-1 man page for a clap `CommandFactory` implementor.
/// Returns the troff content as a UTF-8 string.
pub fn render_man_page<T: CommandFactory>() -> anyhow::Result<String> {
  let cmd = T::command();
  let man = clap_mangen::Man::new(cmd);
  let mut buf: Vec<u8> = Vec::new();

  man.render(&mut buf)?;

  Ok(String::from_utf8_lossy(&buf).to_string())
}
