// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: Define the widget configuration contract, canonical request options, and Merge Service result shapes
// role: model/types
// outputs: Serializable structs with stable camelCase wire names shared by normalization, scheduling, and projection
// invariants: WidgetConfiguration fields are all optional; RequestOptions field order is the wire order; token never lives on RequestOptions
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Number of report slots a widget exposes.
pub const REPORT_SLOTS: usize = 5;

/// Minimum number of configured reports before a request is issued.
pub const MIN_REPORTS: usize = 2;

/// Externally supplied widget configuration. Every field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WidgetConfiguration {
  pub report1_id: Option<String>,
  pub report2_id: Option<String>,
  pub report3_id: Option<String>,
  pub report4_id: Option<String>,
  pub report5_id: Option<String>,

  pub merge_mode: Option<String>,
  pub visibility_scope: Option<String>,

  pub dimension_constants_json: Option<String>,
  pub column_aliases_json: Option<String>,
  pub calculated_fields_json: Option<String>,

  pub show_subtotals: bool,
  pub subtotal_label: Option<String>,
  pub fill_missing_categories: bool,
  pub missing_value_as_zero: bool,
  pub sort_groups_by: Option<String>,
  pub sort_by: Option<String>,
  pub sort_direction: Option<String>,
  pub max_rows: Option<u32>,
  pub show_grand_total_row: Option<bool>,
  pub component_title: Option<String>,
  pub debug_mode: bool,
}

impl WidgetConfiguration {
  /// The five report slots in order; blank identifiers read as empty.
  pub fn report_slots(&self) -> [Option<&str>; REPORT_SLOTS] {
    [
      &self.report1_id,
      &self.report2_id,
      &self.report3_id,
      &self.report4_id,
      &self.report5_id,
    ]
    .map(|slot| non_blank(slot.as_deref()))
  }

  /// Configured report identifiers, slot order preserved, empties skipped.
  pub fn report_ids(&self) -> Vec<String> {
    self.report_slots().iter().flatten().map(|id| id.to_string()).collect()
  }

  pub fn is_configured(&self) -> bool {
    self.report_ids().len() >= MIN_REPORTS
  }
}

/// Treat `None`, `""` and whitespace-only strings alike.
pub(crate) fn non_blank(s: Option<&str>) -> Option<&str> {
  s.filter(|v| !v.trim().is_empty())
}

/// How the Merge Service combines reports. Unknown modes are passed through verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum MergeMode {
  #[default]
  OuterJoin,
  InnerJoin,
  Union,
  Other(String),
}

impl MergeMode {
  pub fn parse(raw: &str) -> Self {
    match raw.trim() {
      "OUTER_JOIN" => Self::OuterJoin,
      "INNER_JOIN" => Self::InnerJoin,
      "UNION" => Self::Union,
      other => Self::Other(other.to_string()),
    }
  }

  pub fn as_str(&self) -> &str {
    match self {
      Self::OuterJoin => "OUTER_JOIN",
      Self::InnerJoin => "INNER_JOIN",
      Self::Union => "UNION",
      Self::Other(s) => s,
    }
  }
}

/// Row-level visibility applied by the Merge Service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum VisibilityScope {
  #[default]
  All,
  MyRecords,
  MyTeam,
  Other(String),
}

impl VisibilityScope {
  pub fn parse(raw: &str) -> Self {
    match raw.trim() {
      "ALL" => Self::All,
      "MY_RECORDS" => Self::MyRecords,
      "MY_TEAM" => Self::MyTeam,
      other => Self::Other(other.to_string()),
    }
  }

  pub fn as_str(&self) -> &str {
    match self {
      Self::All => "ALL",
      Self::MyRecords => "MY_RECORDS",
      Self::MyTeam => "MY_TEAM",
      Self::Other(s) => s,
    }
  }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SortDirection {
  #[default]
  Ascending,
  Descending,
}

impl SortDirection {
  /// Case-insensitive; table sort events report `asc`/`desc`, configuration uses `ASC`/`DESC`.
  pub fn parse(raw: &str) -> Option<Self> {
    let v = raw.trim();
    if v.eq_ignore_ascii_case("asc") || v.eq_ignore_ascii_case("ascending") {
      Some(Self::Ascending)
    } else if v.eq_ignore_ascii_case("desc") || v.eq_ignore_ascii_case("descending") {
      Some(Self::Descending)
    } else {
      None
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Ascending => "ASC",
      Self::Descending => "DESC",
    }
  }
}

macro_rules! wire_string {
  ($ty:ty, $parse:expr) => {
    impl Serialize for $ty {
      fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
      }
    }

    impl<'de> Deserialize<'de> for $ty {
      fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        $parse(raw.as_str()).ok_or_else(|| serde::de::Error::custom(format!("unrecognized value {:?}", raw)))
      }
    }

    impl fmt::Display for $ty {
      fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
      }
    }
  };
}

wire_string!(MergeMode, |s: &str| Some(MergeMode::parse(s)));
wire_string!(VisibilityScope, |s: &str| Some(VisibilityScope::parse(s)));
wire_string!(SortDirection, SortDirection::parse);

/// Sort currently applied by the user, if any. Falls back to configuration when unset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortState {
  pub sort_by: Option<String>,
  pub sort_direction: Option<SortDirection>,
}

impl SortState {
  pub fn applied(field: impl Into<String>, direction: SortDirection) -> Self {
    Self { sort_by: Some(field.into()), sort_direction: Some(direction) }
  }
}

/// Canonical request options. Field order here is the serialized order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestOptions {
  pub merge_mode: MergeMode,
  pub data_visibility: VisibilityScope,
  pub missing_value_as_zero: bool,
  pub sort_by: String,
  pub sort_direction: SortDirection,
  pub sort_groups_by: Option<String>,
  pub max_rows: u32,
  pub show_grand_total_row: bool,
  pub show_subtotals: bool,
  pub subtotal_label: String,
  pub fill_missing_categories: bool,
  pub dimension_constants: serde_json::Map<String, serde_json::Value>,
  pub column_aliases: serde_json::Map<String, serde_json::Value>,
  pub calculated_fields: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MergeColumn {
  pub key: String,
  pub label: String,
  pub is_key_column: bool,
  pub is_second_key_column: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub report_id: Option<String>,
  pub is_merged_column: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MergeRow {
  pub key_value: String,
  pub key_label: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub second_key_value: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub second_key_label: Option<String>,
  pub is_subtotal_row: bool,
  pub formatted_values: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MergeError {
  pub message: String,
  pub is_fatal: bool,
}

/// Response of the Merge Service. Missing fields take their empty defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MergeResult {
  pub columns: Vec<MergeColumn>,
  pub rows: Vec<MergeRow>,
  pub totals_row: Option<MergeRow>,
  pub errors: Vec<MergeError>,
  pub warnings: Vec<String>,
  pub is_truncated: bool,
  pub total_row_count: Option<u64>,
  pub processing_time_ms: Option<u64>,
  pub has_second_dimension: bool,
  pub key_overlap_percentage: Option<f64>,
  pub report_names: BTreeMap<String, String>,
}

impl MergeResult {
  pub fn has_fatal_errors(&self) -> bool {
    self.errors.iter().any(|e| e.is_fatal)
  }

  pub fn fatal_error_messages(&self) -> Vec<&str> {
    self.errors.iter().filter(|e| e.is_fatal).map(|e| e.message.as_str()).collect()
  }

  /// Fatal messages joined for the error banner; `None` when nothing is fatal.
  pub fn fatal_error_message(&self) -> Option<String> {
    if self.has_fatal_errors() {
      Some(self.fatal_error_messages().join("; "))
    } else {
      None
    }
  }
}
