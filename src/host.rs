// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: Capability seams for the hosting surface (design-mode flag, report links) and transient notifications
// role: integration/collaborators
// outputs: HostContext and Notifier traits plus stock implementations (static, URL-derived, tracing, recording)
// invariants: Notifier::notify never blocks and returns nothing; HostContext answers are stable for a widget's lifetime
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use std::sync::Mutex;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
  Info,
  Warning,
  Error,
  Success,
}

/// What the widget may ask of the page it is rendered on.
pub trait HostContext: Send + Sync {
  /// True when rendered inside an editor/design surface.
  fn is_design_mode(&self) -> bool;

  fn report_url(&self, report_id: &str) -> String {
    format!("/lightning/r/Report/{}/view", report_id)
  }
}

/// Fire-and-forget sink for toasts.
pub trait Notifier: Send + Sync {
  fn notify(&self, title: &str, message: &str, severity: Severity);
}

/// Fixed answer, for tests and the binary.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticHost {
  pub design_mode: bool,
}

impl StaticHost {
  pub fn runtime() -> Self {
    Self { design_mode: false }
  }

  pub fn editor() -> Self {
    Self { design_mode: true }
  }
}

impl HostContext for StaticHost {
  fn is_design_mode(&self) -> bool {
    self.design_mode
  }
}

/// Derives design mode from the page location once, at construction.
#[derive(Debug, Clone)]
pub struct LocationHost {
  design_mode: bool,
}

const DESIGN_SURFACE_MARKERS: [&str; 3] = ["/flexipage/", "flexipageEditor", "/lightning/setup/"];

impl LocationHost {
  pub fn new(location: &str) -> Self {
    Self { design_mode: DESIGN_SURFACE_MARKERS.iter().any(|m| location.contains(m)) }
  }
}

impl HostContext for LocationHost {
  fn is_design_mode(&self) -> bool {
    self.design_mode
  }
}

/// Routes notifications into `tracing` at the matching level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
  fn notify(&self, title: &str, message: &str, severity: Severity) {
    match severity {
      Severity::Error => tracing::error!(title, "{}", message),
      Severity::Warning => tracing::warn!(title, "{}", message),
      Severity::Info | Severity::Success => tracing::info!(title, "{}", message),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
  pub title: String,
  pub message: String,
  pub severity: Severity,
}

/// Keeps every notice in memory.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
  notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn notices(&self) -> Vec<Notice> {
    self.notices.lock().map(|n| n.clone()).unwrap_or_default()
  }
}

impl Notifier for RecordingNotifier {
  fn notify(&self, title: &str, message: &str, severity: Severity) {
    if let Ok(mut notices) = self.notices.lock() {
      notices.push(Notice { title: title.to_string(), message: message.to_string(), severity });
    }
  }
}
