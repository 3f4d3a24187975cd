// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: Build the opt-in debug report: configuration echo, response summary, and ordered recommendations
// role: diagnostics/inspection
// inputs: WidgetConfiguration, normalized RequestOptions, last MergeResult, last transport payload, design-mode flag
// outputs: DiagnosticsReport (serializable; pretty JSON rendering)
// invariants:
// - read-only: never influences requests or the view model
// - recommendation rules run independently, in fixed order, without de-duplication
// - exactly one SUCCESS entry when no rule fires, none otherwise
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use serde::Serialize;
use serde_json::{json, Value};

use crate::ext::serde_json::JsonFetch;
use crate::model::{MergeResult, RequestOptions, WidgetConfiguration};
use crate::normalize::ConfigField;

/// Overlap below this percentage suggests an inner join.
pub const LOW_OVERLAP_THRESHOLD: f64 = 70.0;

const NOT_SET: &str = "(not set)";
const NOT_CALLED: &str = "(no API call yet)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecommendationKind {
  Error,
  Warning,
  Success,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recommendation {
  #[serde(rename = "type")]
  pub kind: RecommendationKind,
  pub issue: String,
  pub fix: String,
}

impl Recommendation {
  fn new(kind: RecommendationKind, issue: impl Into<String>, fix: impl Into<String>) -> Self {
    Self { kind, issue: issue.into(), fix: fix.into() }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosticsReport {
  pub configuration: Value,
  pub reports: Value,
  pub response: Value,
  pub recommendations: Vec<Recommendation>,
}

impl DiagnosticsReport {
  pub fn to_pretty_json(&self) -> String {
    serde_json::to_string_pretty(self).unwrap_or_default()
  }

  pub fn count(&self, kind: RecommendationKind) -> usize {
    self.recommendations.iter().filter(|r| r.kind == kind).count()
  }
}

/// Extra context the widget holds beyond configuration and result.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiagnosticsContext<'a> {
  pub design_mode: bool,
  pub last_options_json: Option<&'a str>,
}

pub fn diagnose(
  config: &WidgetConfiguration,
  options: &RequestOptions,
  last_result: Option<&MergeResult>,
  ctx: DiagnosticsContext<'_>,
) -> DiagnosticsReport {
  DiagnosticsReport {
    configuration: configuration_section(config, options, ctx),
    reports: reports_section(last_result),
    response: response_section(last_result),
    recommendations: recommendations(config, last_result),
  }
}

fn or_not_set(v: Option<&str>) -> Value {
  Value::String(crate::model::non_blank(v).unwrap_or(NOT_SET).to_string())
}

fn configuration_section(config: &WidgetConfiguration, options: &RequestOptions, ctx: DiagnosticsContext<'_>) -> Value {
  let options_sent = ctx
    .last_options_json
    .and_then(|raw| serde_json::from_str::<Value>(raw).ok())
    .unwrap_or_else(|| Value::String(NOT_CALLED.to_string()));
  let caching_mode = if ctx.design_mode { "DISABLED (cache buster active)" } else { "ENABLED (responses cached)" };

  json!({
    "reportIds": config.report_ids(),
    "mergeMode": config.merge_mode,
    "dimensionConstantsJson": or_not_set(config.dimension_constants_json.as_deref()),
    "showSubtotals": config.show_subtotals,
    "subtotalLabel": config.subtotal_label,
    "fillMissingCategories": config.fill_missing_categories,
    "sortGroupsBy": or_not_set(config.sort_groups_by.as_deref()),
    "columnAliases": or_not_set(config.column_aliases_json.as_deref()),
    "calculatedFields": or_not_set(config.calculated_fields_json.as_deref()),
    "missingValueAsZero": config.missing_value_as_zero,
    "sortBy": config.sort_by,
    "sortDirection": config.sort_direction,
    "maxRows": config.max_rows,
    "showGrandTotalRow": config.show_grand_total_row,
    "isInDesignMode": ctx.design_mode,
    "cachingMode": caching_mode,
    "normalizedOptions": options,
    "optionsSent": options_sent,
  })
}

fn reports_section(result: Option<&MergeResult>) -> Value {
  let Some(r) = result else {
    return json!({ "status": "No data received yet" });
  };

  let columns: Vec<Value> = r
    .columns
    .iter()
    .filter(|c| !c.is_key_column && !c.is_second_key_column)
    .map(|c| {
      json!({
        "reportId": c.report_id.as_deref().unwrap_or("(merged)"),
        "columnKey": c.key,
        "columnLabel": c.label,
        "isMergedColumn": c.is_merged_column,
      })
    })
    .collect();

  json!({
    "columnCount": r.columns.len(),
    "rowCount": r.rows.len(),
    "hasSecondDimension": r.has_second_dimension,
    "columns": columns,
  })
}

fn response_section(result: Option<&MergeResult>) -> Value {
  let Some(r) = result else {
    return json!({ "status": "No data received" });
  };

  json!({
    "processingTimeMs": r.processing_time_ms,
    "totalRowCount": r.total_row_count,
    "isTruncated": r.is_truncated,
    "hasSecondDimension": r.has_second_dimension,
    "hasTotalsRow": r.totals_row.is_some(),
    "errors": r.errors,
    "warnings": r.warnings,
    "keyOverlapPercentage": r.key_overlap_percentage,
  })
}

/// Recommendations in rule order; one SUCCESS entry when nothing fired.
pub fn recommendations(config: &WidgetConfiguration, result: Option<&MergeResult>) -> Vec<Recommendation> {
  use RecommendationKind::*;

  let mut recs = Vec::new();

  if let Some(r) = result {
    if r.errors.iter().any(|e| e.message.to_lowercase().contains("dimension")) {
      recs.push(Recommendation::new(
        Error,
        "Dimension mismatch detected",
        "Change Merge Mode to UNION, or set Dimension Constants for reports with fewer dimensions",
      ));
    }
  }

  let dimension_constants = ConfigField::DimensionConstants.raw(config);

  if config.merge_mode.as_deref().map(str::trim) == Some("UNION") && dimension_constants.is_none() {
    recs.push(Recommendation::new(
      Warning,
      "UNION mode without Dimension Constants",
      r#"If reports have different dimension counts, set constants like {"2": "Total"}"#,
    ));
  }

  if let Some(raw) = ConfigField::CalculatedFields.raw(config) {
    match serde_json::from_str::<Value>(raw) {
      Ok(Value::Array(fields)) => {
        for (i, f) in fields.iter().enumerate() {
          if !f.fetch("label").is_truthy() {
            recs.push(Recommendation::new(
              Error,
              format!("Calculated field {} missing label", i + 1),
              r#"Add "label" property to calculated field"#,
            ));
          }
          if !f.fetch("formula").is_truthy() {
            recs.push(Recommendation::new(
              Error,
              format!("Calculated field {} missing formula", i + 1),
              r#"Add "formula" property"#,
            ));
          }
        }
      }
      Ok(_) => {}
      Err(_) => recs.push(Recommendation::new(Error, "Invalid Calculated Fields JSON", "Check JSON syntax")),
    }
  }

  for field in [ConfigField::ColumnAliases, ConfigField::DimensionConstants] {
    if let Some(raw) = field.raw(config) {
      if serde_json::from_str::<Value>(raw).is_err() {
        recs.push(Recommendation::new(Error, format!("Invalid {} JSON", field.label()), "Check JSON syntax"));
      }
    }
  }

  if let Some(overlap) = result.and_then(|r| r.key_overlap_percentage) {
    if overlap < LOW_OVERLAP_THRESHOLD {
      recs.push(Recommendation::new(
        Warning,
        format!("Low key overlap: {:.0}%", overlap),
        "Consider INNER_JOIN to only show matching keys",
      ));
    }
  }

  if recs.is_empty() {
    recs.push(Recommendation::new(Success, "No issues detected", "Configuration looks good!"));
  }

  recs
}
