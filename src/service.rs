// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: Trait seam for the external Merge Service plus HTTP, fixture, and env-driven implementations
// role: integration/merge-service
// inputs: ordered report ids (2..=5) and transport-form options JSON
// outputs: MergeResult or ServiceError; reduce_error collapses any error shape into one display string
// side_effects: HttpMergeService performs a blocking POST; EnvMergeService reads MRG_TEST_* variables
// invariants:
// - reduce_error never panics and always yields a non-empty string
// - error shape precedence: plain string > body.message > message > body[].message > "Unknown error"
// errors: Transport failures and non-2xx replies map to ServiceError; callers reduce them for display
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Context;
use serde_json::Value;
use thiserror::Error;

use crate::ext::serde_json::JsonFetch;
use crate::model::MergeResult;

pub const UNKNOWN_ERROR: &str = "Unknown error";

/// Env var holding a MergeResult JSON document served by `EnvMergeService`.
pub const ENV_RESULT_JSON: &str = "MRG_TEST_MERGE_RESULT_JSON";
/// Env var holding an error payload served by `EnvMergeService`.
pub const ENV_ERROR_JSON: &str = "MRG_TEST_MERGE_ERROR_JSON";
/// Env var naming the HTTP endpoint when none is given on the command line.
pub const ENV_ENDPOINT: &str = "MRG_MERGE_ENDPOINT";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ServiceError {
  /// A bare string thrown by the service.
  #[error("{0}")]
  Message(String),
  /// The call never produced a reply.
  #[error("transport failure: {0}")]
  Transport(String),
  /// A structured error payload of unknown exact shape.
  #[error("structured service error: {0}")]
  Structured(Value),
}

/// Collapse any error shape into the single string shown in the error banner.
pub fn reduce_error(err: &ServiceError) -> String {
  match err {
    ServiceError::Message(s) | ServiceError::Transport(s) if !s.is_empty() => s.clone(),
    ServiceError::Message(_) | ServiceError::Transport(_) => UNKNOWN_ERROR.to_string(),
    ServiceError::Structured(v) => reduce_payload(v),
  }
}

fn reduce_payload(v: &Value) -> String {
  if let Some(s) = v.as_str() {
    return if s.is_empty() { UNKNOWN_ERROR.to_string() } else { s.to_string() };
  }

  if let Some(m) = v.fetch("body.message").text() {
    return m.to_string();
  }

  if let Some(m) = v.fetch("message").text() {
    return m.to_string();
  }

  if let Some(items) = v.fetch("body").value().and_then(Value::as_array) {
    return items
      .iter()
      .map(|e| e.fetch("message").text().unwrap_or_default())
      .collect::<Vec<_>>()
      .join(", ");
  }

  UNKNOWN_ERROR.to_string()
}

/// The external component that performs the cross-report merge.
pub trait MergeService: Send + Sync {
  fn get_merged_report_data(&self, report_ids: &[String], options_json: &str) -> Result<MergeResult, ServiceError>;
}

/// Blocking JSON-over-HTTP client for a Merge Service endpoint.
pub struct HttpMergeService {
  endpoint: String,
  agent: ureq::Agent,
}

impl HttpMergeService {
  pub fn new(endpoint: impl Into<String>) -> Self {
    let agent = ureq::AgentBuilder::new().timeout(Duration::from_secs(60)).build();
    Self { endpoint: endpoint.into(), agent }
  }
}

impl MergeService for HttpMergeService {
  fn get_merged_report_data(&self, report_ids: &[String], options_json: &str) -> Result<MergeResult, ServiceError> {
    let body = serde_json::json!({ "reportIds": report_ids, "optionsJson": options_json });

    let response = self
      .agent
      .post(&self.endpoint)
      .set("Accept", "application/json")
      .set("User-Agent", "merged-report-grid")
      .send_json(body);

    match response {
      Ok(resp) => resp
        .into_json::<MergeResult>()
        .map_err(|e| ServiceError::Transport(format!("unreadable merge result: {}", e))),
      Err(ureq::Error::Status(code, resp)) => match resp.into_json::<Value>() {
        Ok(payload) => Err(ServiceError::Structured(payload)),
        Err(_) => Err(ServiceError::Message(format!("Merge service responded with HTTP {}", code))),
      },
      Err(ureq::Error::Transport(t)) => Err(ServiceError::Transport(t.to_string())),
    }
  }
}

/// Serves one canned outcome and records every call.
pub struct FixtureMergeService {
  outcome: Result<MergeResult, ServiceError>,
  calls: AtomicUsize,
  last_request: Mutex<Option<(Vec<String>, String)>>,
}

impl FixtureMergeService {
  pub fn succeeding(result: MergeResult) -> Self {
    Self::with_outcome(Ok(result))
  }

  pub fn failing(err: ServiceError) -> Self {
    Self::with_outcome(Err(err))
  }

  fn with_outcome(outcome: Result<MergeResult, ServiceError>) -> Self {
    Self { outcome, calls: AtomicUsize::new(0), last_request: Mutex::new(None) }
  }

  /// Load a MergeResult JSON document from disk.
  pub fn from_path(path: &Path) -> anyhow::Result<Self> {
    let buf = std::fs::read(path).with_context(|| format!("reading merge result {}", path.display()))?;
    let result: MergeResult =
      serde_json::from_slice(&buf).with_context(|| format!("parsing merge result {}", path.display()))?;
    Ok(Self::succeeding(result))
  }

  pub fn call_count(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }

  pub fn last_request(&self) -> Option<(Vec<String>, String)> {
    self.last_request.lock().ok().and_then(|r| r.clone())
  }
}

impl MergeService for FixtureMergeService {
  fn get_merged_report_data(&self, report_ids: &[String], options_json: &str) -> Result<MergeResult, ServiceError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    if let Ok(mut last) = self.last_request.lock() {
      *last = Some((report_ids.to_vec(), options_json.to_string()));
    }
    self.outcome.clone()
  }
}

/// Reads its reply from `MRG_TEST_MERGE_RESULT_JSON` / `MRG_TEST_MERGE_ERROR_JSON` at call time.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvMergeService;

impl MergeService for EnvMergeService {
  fn get_merged_report_data(&self, _report_ids: &[String], _options_json: &str) -> Result<MergeResult, ServiceError> {
    if let Ok(raw) = std::env::var(ENV_ERROR_JSON) {
      let payload = serde_json::from_str::<Value>(&raw).unwrap_or(Value::String(raw));
      return Err(ServiceError::Structured(payload));
    }

    let raw = std::env::var(ENV_RESULT_JSON)
      .map_err(|_| ServiceError::Transport(format!("{} is not set", ENV_RESULT_JSON)))?;
    serde_json::from_str::<MergeResult>(&raw).map_err(|e| ServiceError::Message(format!("Invalid merge result: {}", e)))
  }
}

pub fn env_wants_mock() -> bool {
  std::env::var(ENV_RESULT_JSON).is_ok() || std::env::var(ENV_ERROR_JSON).is_ok()
}
