// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: Turn a raw WidgetConfiguration plus the applied sort into canonical RequestOptions and advisory diagnostics
// role: normalization/config
// inputs: WidgetConfiguration, SortState
// outputs: Normalized { options, diagnostics }; stable and transport JSON serializations
// invariants:
// - normalize never fails; each free-form JSON field degrades independently to {} or []
// - at most one size advisory and one parse/shape diagnostic per field
// - the stable form never contains the cache-busting token
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use serde::Serialize;
use serde_json::{Map, Value};

use crate::host::Severity;
use crate::model::{non_blank, MergeMode, RequestOptions, SortDirection, SortState, VisibilityScope, WidgetConfiguration};

pub const DEFAULT_MAX_ROWS: u32 = 200;
pub const DEFAULT_SUBTOTAL_LABEL: &str = "SUBTOTAL";
pub const DEFAULT_SORT_BY: &str = "KEY";

/// Raw JSON above this many bytes earns an informational advisory.
pub const JSON_SIZE_WARNING: usize = 10_000;
/// Raw JSON above this many bytes earns a warning advisory.
pub const JSON_SIZE_CRITICAL: usize = 50_000;

/// Wire name of the cache-busting token in the transport form.
pub const CACHE_BUSTER_KEY: &str = "_designModeCacheBuster";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ConfigField {
  ColumnAliases,
  CalculatedFields,
  DimensionConstants,
}

impl ConfigField {
  pub fn label(&self) -> &'static str {
    match self {
      Self::ColumnAliases => "Column Aliases",
      Self::CalculatedFields => "Calculated Fields",
      Self::DimensionConstants => "Dimension Constants",
    }
  }

  pub fn raw<'a>(&self, config: &'a WidgetConfiguration) -> Option<&'a str> {
    let raw = match self {
      Self::ColumnAliases => &config.column_aliases_json,
      Self::CalculatedFields => &config.calculated_fields_json,
      Self::DimensionConstants => &config.dimension_constants_json,
    };
    non_blank(raw.as_deref())
  }

  fn expects_array(&self) -> bool {
    matches!(self, Self::CalculatedFields)
  }

  fn fallback_phrase(&self) -> &'static str {
    if self.expects_array() { "Using empty array." } else { "Using empty object." }
  }

  fn shape_hint(&self) -> &'static str {
    match self {
      Self::ColumnAliases => r#"a JSON object (e.g., {"Column": "Alias"})"#,
      Self::CalculatedFields => r#"a JSON array (e.g., [{"label": "...", "formula": "..."}])"#,
      Self::DimensionConstants => r#"a JSON object (e.g., {"1": "Total"})"#,
    }
  }

  fn large_suffix(&self) -> &'static str {
    match self {
      Self::ColumnAliases => " If you experience issues, consider reducing aliases.",
      Self::CalculatedFields => " If you experience issues, consider reducing calculated fields.",
      Self::DimensionConstants => "",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DiagnosticKind {
  Large,
  VeryLarge,
  Malformed,
  WrongShape,
}

/// Advisory produced while normalizing; never blocks the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
  pub field: ConfigField,
  pub kind: DiagnosticKind,
  pub severity: Severity,
  pub title: String,
  pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
  pub options: RequestOptions,
  pub diagnostics: Vec<Diagnostic>,
}

/// Approximate size in kilobytes, rounded to nearest.
pub fn approx_kb(bytes: usize) -> u64 {
  (bytes as f64 / 1024.0).round() as u64
}

fn size_advisory(field: ConfigField, raw: &str) -> Option<Diagnostic> {
  let size = raw.len();
  let kb = approx_kb(size);
  if size > JSON_SIZE_CRITICAL {
    Some(Diagnostic {
      field,
      kind: DiagnosticKind::VeryLarge,
      severity: Severity::Warning,
      title: "Warning".into(),
      message: format!(
        "{} JSON is very large ({}KB). This may cause performance issues.",
        field.label(),
        kb
      ),
    })
  } else if size > JSON_SIZE_WARNING {
    Some(Diagnostic {
      field,
      kind: DiagnosticKind::Large,
      severity: Severity::Info,
      title: "Info".into(),
      message: format!("{} JSON is large ({}KB).{}", field.label(), kb, field.large_suffix()),
    })
  } else {
    None
  }
}

/// Parse one free-form field. `None` when absent or unusable; shape is checked by the caller.
fn parse_field(config: &WidgetConfiguration, field: ConfigField, diags: &mut Vec<Diagnostic>) -> Option<Value> {
  let raw = field.raw(config)?;

  if let Some(d) = size_advisory(field, raw) {
    diags.push(d);
  }

  match serde_json::from_str::<Value>(raw) {
    Ok(v) => Some(v),
    Err(e) => {
      tracing::debug!(field = field.label(), error = %e, "free-form JSON did not parse");
      diags.push(Diagnostic {
        field,
        kind: DiagnosticKind::Malformed,
        severity: Severity::Warning,
        title: "Warning".into(),
        message: format!("Invalid {} JSON: {}. {}", field.label(), e, field.fallback_phrase()),
      });
      None
    }
  }
}

fn wrong_shape(field: ConfigField) -> Diagnostic {
  Diagnostic {
    field,
    kind: DiagnosticKind::WrongShape,
    severity: Severity::Warning,
    title: "Warning".into(),
    message: format!("{} should be {}. {}", field.label(), field.shape_hint(), field.fallback_phrase()),
  }
}

fn parse_object(config: &WidgetConfiguration, field: ConfigField, diags: &mut Vec<Diagnostic>) -> Map<String, Value> {
  match parse_field(config, field, diags) {
    Some(Value::Object(map)) => map,
    Some(_) => {
      diags.push(wrong_shape(field));
      Map::new()
    }
    None => Map::new(),
  }
}

fn parse_array(config: &WidgetConfiguration, field: ConfigField, diags: &mut Vec<Diagnostic>) -> Vec<Value> {
  match parse_field(config, field, diags) {
    Some(Value::Array(items)) => items,
    Some(_) => {
      diags.push(wrong_shape(field));
      Vec::new()
    }
    None => Vec::new(),
  }
}

/// Canonical options for `config` under the applied `sort`.
pub fn normalize(config: &WidgetConfiguration, sort: &SortState) -> Normalized {
  let mut diagnostics = Vec::new();

  let column_aliases = parse_object(config, ConfigField::ColumnAliases, &mut diagnostics);
  let calculated_fields = parse_array(config, ConfigField::CalculatedFields, &mut diagnostics);
  let dimension_constants = parse_object(config, ConfigField::DimensionConstants, &mut diagnostics);

  let sort_by = non_blank(sort.sort_by.as_deref())
    .or_else(|| non_blank(config.sort_by.as_deref()))
    .unwrap_or(DEFAULT_SORT_BY)
    .to_string();

  let sort_direction = sort
    .sort_direction
    .or_else(|| config.sort_direction.as_deref().and_then(SortDirection::parse))
    .unwrap_or_default();

  let options = RequestOptions {
    merge_mode: non_blank(config.merge_mode.as_deref()).map(MergeMode::parse).unwrap_or_default(),
    data_visibility: non_blank(config.visibility_scope.as_deref())
      .map(VisibilityScope::parse)
      .unwrap_or_default(),
    missing_value_as_zero: config.missing_value_as_zero,
    sort_by,
    sort_direction,
    sort_groups_by: non_blank(config.sort_groups_by.as_deref()).map(str::to_string),
    max_rows: config.max_rows.filter(|n| *n > 0).unwrap_or(DEFAULT_MAX_ROWS),
    show_grand_total_row: config.show_grand_total_row != Some(false),
    show_subtotals: config.show_subtotals,
    subtotal_label: non_blank(config.subtotal_label.as_deref())
      .unwrap_or(DEFAULT_SUBTOTAL_LABEL)
      .to_string(),
    fill_missing_categories: config.fill_missing_categories,
    dimension_constants,
    column_aliases,
    calculated_fields,
  };

  Normalized { options, diagnostics }
}

#[derive(Serialize)]
struct TransportForm<'a> {
  #[serde(flatten)]
  options: &'a RequestOptions,
  #[serde(rename = "_designModeCacheBuster", skip_serializing_if = "Option::is_none")]
  cache_buster: Option<i64>,
}

impl RequestOptions {
  /// Serialization used for change detection. Never carries a token.
  pub fn stable_json(&self) -> String {
    // String keys and JSON values only; serialization cannot fail.
    serde_json::to_string(self).unwrap_or_default()
  }

  /// Serialization sent to the Merge Service. Must never be compared for equality.
  pub fn transport_json(&self, cache_buster: Option<i64>) -> String {
    serde_json::to_string(&TransportForm { options: self, cache_buster }).unwrap_or_default()
  }
}
