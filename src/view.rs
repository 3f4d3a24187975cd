// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: Project a MergeResult plus sort/display state into a renderable table view model and header details
// role: projection/view-model
// inputs: Option<&MergeResult>, SortState, RequestOptions (row cap, totals flag), fetch status
// outputs: ViewModel (columns, rows, totals, truncation notice, status); title/subtitle; report popover entries
// invariants:
// - pure: identical inputs yield identical view models; nothing is patched incrementally
// - key columns map to synthetic field names; the second key column is never sortable
// - missing cell values render as the placeholder glyph
// - totals row present only when requested AND provided
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use std::collections::BTreeMap;

use serde::Serialize;

use crate::host::HostContext;
use crate::model::{non_blank, MergeColumn, MergeResult, MergeRow, RequestOptions, SortState, VisibilityScope, WidgetConfiguration};

/// Shown wherever a value is missing.
pub const PLACEHOLDER: &str = "—";
/// Table field bound to the primary key column.
pub const KEY_FIELD: &str = "keyLabel";
/// Table field bound to the secondary key column.
pub const SECOND_KEY_FIELD: &str = "secondKeyLabel";
pub const TOTALS_ROW_ID: &str = "totals-row";
pub const DEFAULT_TITLE: &str = "Merged Report Grid";
pub const FALLBACK_ERROR: &str = "An unexpected error occurred.";

const KEY_COLUMN_WIDTH: u32 = 180;
const SECOND_KEY_COLUMN_WIDTH: u32 = 140;
const SUBTOTAL_ROW_CLASS: &str = "slds-text-title_bold subtotal-row";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ViewStatus {
  #[default]
  Loading,
  /// Fewer than two reports; quiet, no message.
  Unconfigured,
  Error,
  Empty,
  Ready,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ColumnRole {
  Key,
  SecondKey,
  Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableColumn {
  pub label: String,
  pub field_name: String,
  pub role: ColumnRole,
  pub sortable: bool,
  pub hide_default_actions: bool,
  pub column_index: usize,
  #[serde(rename = "type")]
  pub column_type: &'static str,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub initial_width: Option<u32>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub alignment: Option<&'static str>,
}

/// A value column with its grand total, when the service sent one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueColumn {
  pub key: String,
  pub label: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub report_id: Option<String>,
  pub is_merged_column: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub total_value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableRow {
  pub id: String,
  pub key_value: String,
  pub key_label: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub second_key_value: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub second_key_label: Option<String>,
  pub is_subtotal_row: bool,
  pub row_class: &'static str,
  /// Value-column key → display string.
  pub cells: BTreeMap<String, String>,
}

impl TableRow {
  /// Resolve a table field name the way the grid binds it.
  pub fn field(&self, field_name: &str) -> Option<&str> {
    match field_name {
      KEY_FIELD => Some(self.key_label.as_str()),
      SECOND_KEY_FIELD => self.second_key_label.as_deref(),
      key => self.cells.get(key).map(String::as_str),
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewModel {
  pub status: ViewStatus,
  pub columns: Vec<TableColumn>,
  pub value_columns: Vec<ValueColumn>,
  pub rows: Vec<TableRow>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub totals_row: Option<TableRow>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub truncation_notice: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error_message: Option<String>,
  pub has_data: bool,
  pub processing_time_ms: u64,
  pub sorted_by: String,
  pub sorted_direction: &'static str,
}

/// Where the fetch lifecycle stands, as far as rendering cares.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchStatus<'a> {
  pub is_loading: bool,
  pub configured: bool,
  pub error: Option<&'a str>,
}

struct Classified<'a> {
  key: Option<&'a MergeColumn>,
  second_key: Option<&'a MergeColumn>,
  values: Vec<&'a MergeColumn>,
}

fn classify(columns: &[MergeColumn]) -> Classified<'_> {
  let mut out = Classified { key: None, second_key: None, values: Vec::new() };
  for col in columns {
    if col.is_key_column {
      if out.key.is_none() {
        out.key = Some(col);
      } else {
        tracing::warn!(column = %col.key, "extra key column dropped");
      }
    } else if col.is_second_key_column {
      if out.second_key.is_none() {
        out.second_key = Some(col);
      } else {
        tracing::warn!(column = %col.key, "extra second key column dropped");
      }
    } else {
      out.values.push(col);
    }
  }
  out
}

fn cell(row: &MergeRow, key: &str) -> String {
  row
    .formatted_values
    .get(key)
    .filter(|v| !v.is_empty())
    .cloned()
    .unwrap_or_else(|| PLACEHOLDER.to_string())
}

fn table_columns(result: &MergeResult, classified: &Classified<'_>) -> Vec<TableColumn> {
  result
    .columns
    .iter()
    .filter(|col| {
      let is_key = classified.key.is_some_and(|k| std::ptr::eq(k, *col));
      let is_second = classified.second_key.is_some_and(|k| std::ptr::eq(k, *col));
      is_key || is_second || !(col.is_key_column || col.is_second_key_column)
    })
    .enumerate()
    .map(|(index, col)| {
      let (role, field_name, initial_width, alignment) = if col.is_key_column {
        (ColumnRole::Key, KEY_FIELD.to_string(), Some(KEY_COLUMN_WIDTH), None)
      } else if col.is_second_key_column {
        (ColumnRole::SecondKey, SECOND_KEY_FIELD.to_string(), Some(SECOND_KEY_COLUMN_WIDTH), None)
      } else {
        (ColumnRole::Value, col.key.clone(), None, Some("right"))
      };
      TableColumn {
        label: col.label.clone(),
        field_name,
        role,
        sortable: role != ColumnRole::SecondKey,
        hide_default_actions: true,
        column_index: index,
        column_type: "text",
        initial_width,
        alignment,
      }
    })
    .collect()
}

fn project_row(row: &MergeRow, index: usize, values: &[&MergeColumn]) -> TableRow {
  TableRow {
    id: format!("{}-{}-{}", row.key_value, row.second_key_value.as_deref().unwrap_or(""), index),
    key_value: row.key_value.clone(),
    key_label: row.key_label.clone(),
    second_key_value: row.second_key_value.clone(),
    second_key_label: row.second_key_label.clone(),
    is_subtotal_row: row.is_subtotal_row,
    row_class: if row.is_subtotal_row { SUBTOTAL_ROW_CLASS } else { "" },
    cells: values.iter().map(|c| (c.key.clone(), cell(row, &c.key))).collect(),
  }
}

fn project_totals(totals: &MergeRow, values: &[&MergeColumn]) -> TableRow {
  TableRow {
    id: TOTALS_ROW_ID.to_string(),
    key_value: "TOTAL".to_string(),
    key_label: "Total".to_string(),
    second_key_value: None,
    second_key_label: Some(String::new()),
    is_subtotal_row: false,
    row_class: "",
    cells: values.iter().map(|c| (c.key.clone(), cell(totals, &c.key))).collect(),
  }
}

/// Truncation banner text.
pub fn truncation_message(max_rows: u32, total_row_count: u64) -> String {
  format!("Showing first {} of {} rows.", max_rows, total_row_count)
}

/// Build the table from the latest result. `None` yields an empty table.
pub fn build(result: Option<&MergeResult>, sort: &SortState, options: &RequestOptions) -> ViewModel {
  let sorted_by = non_blank(sort.sort_by.as_deref()).unwrap_or(options.sort_by.as_str()).to_string();
  let sorted_direction = sort.sort_direction.unwrap_or(options.sort_direction).as_str();

  let Some(result) = result else {
    return ViewModel { status: ViewStatus::Empty, sorted_by, sorted_direction, ..Default::default() };
  };

  let classified = classify(&result.columns);
  let columns = table_columns(result, &classified);

  let value_columns = classified
    .values
    .iter()
    .map(|c| ValueColumn {
      key: c.key.clone(),
      label: c.label.clone(),
      report_id: c.report_id.clone(),
      is_merged_column: c.is_merged_column,
      total_value: result.totals_row.as_ref().map(|t| cell(t, &c.key)),
    })
    .collect();

  let rows: Vec<TableRow> =
    result.rows.iter().enumerate().map(|(i, r)| project_row(r, i, &classified.values)).collect();

  let totals_row = if options.show_grand_total_row {
    result.totals_row.as_ref().map(|t| project_totals(t, &classified.values))
  } else {
    None
  };

  let truncation_notice = if result.is_truncated {
    let total = result.total_row_count.unwrap_or(result.rows.len() as u64);
    Some(truncation_message(options.max_rows, total))
  } else {
    None
  };

  let has_data = !rows.is_empty();

  ViewModel {
    status: if has_data { ViewStatus::Ready } else { ViewStatus::Empty },
    columns,
    value_columns,
    rows,
    totals_row,
    truncation_notice,
    error_message: None,
    has_data,
    processing_time_ms: result.processing_time_ms.unwrap_or(0),
    sorted_by,
    sorted_direction,
  }
}

impl ViewModel {
  pub fn show_error_state(&self) -> bool {
    self.status == ViewStatus::Error
  }

  /// Fold the fetch lifecycle into the status flag. Rows stay visible under an error banner.
  pub fn with_status(mut self, status: FetchStatus<'_>) -> Self {
    self.error_message = status.error.map(|e| if e.is_empty() { FALLBACK_ERROR.to_string() } else { e.to_string() });
    self.status = if status.is_loading {
      ViewStatus::Loading
    } else if self.error_message.is_some() {
      ViewStatus::Error
    } else if !status.configured {
      ViewStatus::Unconfigured
    } else if self.has_data {
      ViewStatus::Ready
    } else {
      ViewStatus::Empty
    };
    self
  }
}

/// Card title.
pub fn title(config: &WidgetConfiguration) -> String {
  non_blank(config.component_title.as_deref()).unwrap_or(DEFAULT_TITLE).to_string()
}

/// e.g. "OUTER JOIN from 3 reports (My Team)".
pub fn subtitle(config: &WidgetConfiguration, options: &RequestOptions) -> String {
  let count = config.report_ids().len();
  let display_mode = options.merge_mode.as_str().replacen('_', " ", 1);
  let visibility = match options.data_visibility {
    VisibilityScope::MyRecords => " (My Records)",
    VisibilityScope::MyTeam => " (My Team)",
    _ => "",
  };
  format!("{} from {} reports{}", display_mode, count, visibility)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportDetail {
  pub id: String,
  pub name: String,
  pub url: String,
  pub dimension_constant: Option<String>,
}

/// One entry per configured slot, for the "show reports" popover.
pub fn report_details(
  config: &WidgetConfiguration,
  options: &RequestOptions,
  result: Option<&MergeResult>,
  host: &dyn HostContext,
) -> Vec<ReportDetail> {
  config
    .report_slots()
    .iter()
    .enumerate()
    .filter_map(|(index, slot)| {
      let id = (*slot)?;
      let slot_number = index + 1;
      let name = result
        .and_then(|r| r.report_names.get(id))
        .cloned()
        .unwrap_or_else(|| format!("Report {}", slot_number));
      let dimension_constant = options
        .dimension_constants
        .get(&slot_number.to_string())
        .filter(|v| crate::ext::serde_json::is_truthy(v))
        .map(|v| match v.as_str() {
          Some(s) => s.to_string(),
          None => v.to_string(),
        });
      Some(ReportDetail { id: id.to_string(), name, url: host.report_url(id), dimension_constant })
    })
    .collect()
}
