// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: Sans-IO fetch lifecycle: debounce configuration/sort changes into one Merge Service call and apply its outcome
// role: orchestration/state-machine
// inputs: configuration updates, sort actions, refresh, render passes, timer expiry, service outcomes, teardown
// outputs: Commands (arm/cancel timer, dispatch request, notify) for a driver to execute
// invariants:
// - at most one timer armed; re-arming cancels the previous one; stale timer tokens are ignored
// - at most one request in flight; changes observed meanwhile are replayed after settlement
// - change detection compares report ids plus stable forms; the cache-busting token never participates
// - nothing is emitted after teardown
// - every outcome (success, fatal result, failure, unconfigured) lands in Settled
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use std::time::Duration;

use serde::Serialize;

use crate::host::Severity;
use crate::model::{MergeResult, SortDirection, SortState, WidgetConfiguration};
use crate::normalize::{normalize, Normalized};
use crate::service::{reduce_error, ServiceError};

/// Delay inside an editor, where properties arrive one at a time.
pub const EDITOR_DEBOUNCE: Duration = Duration::from_millis(500);
/// Delay on a live page.
pub const RUNTIME_DEBOUNCE: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum FetchState {
  #[default]
  Idle,
  PendingFetch,
  InFlight,
  Settled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerToken(u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
  pub report_ids: Vec<String>,
  pub options_json: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
  ArmTimer { token: TimerToken, delay: Duration },
  CancelTimer { token: TimerToken },
  Dispatch(FetchRequest),
  Notify { title: String, message: String, severity: Severity },
}

/// What the last evaluated fetch was for: ordered report ids and the stable options form.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ChangeKey {
  report_ids: Vec<String>,
  stable: String,
}

#[derive(Debug, Clone)]
pub struct FetchScheduler {
  design_mode: bool,
  config: WidgetConfiguration,
  sort: SortState,
  state: FetchState,
  is_loading: bool,
  armed: Option<TimerToken>,
  next_token: u64,
  has_fetched: bool,
  changed_in_flight: bool,
  last_key: Option<ChangeKey>,
  last_transport: Option<String>,
  last_cache_buster: Option<i64>,
  result: Option<MergeResult>,
  error: Option<String>,
  torn_down: bool,
}

impl FetchScheduler {
  pub fn new(config: WidgetConfiguration, design_mode: bool) -> Self {
    Self {
      design_mode,
      config,
      sort: SortState::default(),
      state: FetchState::Idle,
      is_loading: true,
      armed: None,
      next_token: 0,
      has_fetched: false,
      changed_in_flight: false,
      last_key: None,
      last_transport: None,
      last_cache_buster: None,
      result: None,
      error: None,
      torn_down: false,
    }
  }

  pub fn debounce(&self) -> Duration {
    if self.design_mode { EDITOR_DEBOUNCE } else { RUNTIME_DEBOUNCE }
  }

  /// Widget inserted into the page.
  pub fn connect(&mut self) -> Vec<Command> {
    self.schedule()
  }

  /// Replace the whole configuration atomically.
  pub fn update_config(&mut self, config: WidgetConfiguration) -> Vec<Command> {
    self.config = config;
    match self.state {
      FetchState::InFlight => {
        self.changed_in_flight = true;
        Vec::new()
      }
      FetchState::Settled if self.has_fetched && !self.key_changed() => Vec::new(),
      _ => self.schedule(),
    }
  }

  /// User clicked a sortable column header.
  pub fn sort(&mut self, field: impl Into<String>, direction: SortDirection) -> Vec<Command> {
    self.sort = SortState::applied(field, direction);
    self.request_fetch()
  }

  /// User asked for fresh data.
  pub fn refresh(&mut self) -> Vec<Command> {
    self.request_fetch()
  }

  /// Called after each render; re-arms when the stable form drifted since the last dispatch.
  pub fn on_render(&mut self) -> Vec<Command> {
    if self.torn_down || !self.has_fetched {
      return Vec::new();
    }
    match self.state {
      FetchState::Idle | FetchState::Settled if self.key_changed() => {
        tracing::debug!("reports or stable options drifted since last dispatch; re-arming");
        self.schedule()
      }
      _ => Vec::new(),
    }
  }

  /// The debounce timer identified by `token` expired at `now_ms` (epoch millis).
  pub fn timer_fired(&mut self, token: TimerToken, now_ms: i64) -> Vec<Command> {
    if self.torn_down || self.armed != Some(token) {
      tracing::debug!(?token, "ignoring stale timer");
      return Vec::new();
    }
    self.armed = None;

    let report_ids = self.config.report_ids();
    if report_ids.len() < crate::model::MIN_REPORTS {
      tracing::debug!(configured = report_ids.len(), "awaiting configuration; no request");
      self.last_key = Some(self.change_key());
      self.state = FetchState::Settled;
      self.is_loading = false;
      self.error = None;
      self.result = None;
      return Vec::new();
    }

    let Normalized { options, diagnostics } = self.normalized();

    let mut cmds: Vec<Command> = diagnostics
      .into_iter()
      .map(|d| Command::Notify { title: d.title, message: d.message, severity: d.severity })
      .collect();

    let cache_buster = if self.design_mode { Some(self.next_cache_buster(now_ms)) } else { None };
    let options_json = options.transport_json(cache_buster);

    self.last_transport = Some(options_json.clone());
    self.last_key = Some(ChangeKey { report_ids: report_ids.clone(), stable: options.stable_json() });
    self.state = FetchState::InFlight;
    self.is_loading = true;
    self.error = None;

    tracing::info!(reports = report_ids.len(), "dispatching merge request");
    cmds.push(Command::Dispatch(FetchRequest { report_ids, options_json }));
    cmds
  }

  /// The Merge Service replied.
  pub fn on_response(&mut self, result: MergeResult) -> Vec<Command> {
    if self.torn_down {
      return Vec::new();
    }

    self.has_fetched = true;
    self.error = result.fatal_error_message();

    let mut cmds: Vec<Command> = result
      .warnings
      .iter()
      .map(|w| Command::Notify { title: "Warning".into(), message: w.clone(), severity: Severity::Warning })
      .collect();

    if let Some(err) = &self.error {
      tracing::warn!(error = %err, "merge result carries fatal errors");
    }
    self.result = Some(result);
    cmds.extend(self.settle());
    cmds
  }

  /// The Merge Service call itself failed.
  pub fn on_failure(&mut self, err: &ServiceError) -> Vec<Command> {
    if self.torn_down {
      return Vec::new();
    }

    let message = reduce_error(err);
    tracing::warn!(error = %message, "merge request failed");
    self.error = Some(message);
    self.result = None;
    self.settle()
  }

  /// Widget removed; cancel anything pending.
  pub fn teardown(&mut self) -> Vec<Command> {
    self.torn_down = true;
    self.changed_in_flight = false;
    match self.armed.take() {
      Some(token) => vec![Command::CancelTimer { token }],
      None => Vec::new(),
    }
  }

  pub fn state(&self) -> FetchState {
    self.state
  }

  pub fn is_loading(&self) -> bool {
    self.is_loading
  }

  pub fn is_design_mode(&self) -> bool {
    self.design_mode
  }

  pub fn is_torn_down(&self) -> bool {
    self.torn_down
  }

  pub fn error(&self) -> Option<&str> {
    self.error.as_deref()
  }

  pub fn result(&self) -> Option<&MergeResult> {
    self.result.as_ref()
  }

  pub fn config(&self) -> &WidgetConfiguration {
    &self.config
  }

  pub fn sort_state(&self) -> &SortState {
    &self.sort
  }

  pub fn armed_timer(&self) -> Option<TimerToken> {
    self.armed
  }

  /// Transport form of the most recent dispatch.
  pub fn last_options_json(&self) -> Option<&str> {
    self.last_transport.as_deref()
  }

  /// Current configuration normalized under the applied sort.
  pub fn normalized(&self) -> Normalized {
    normalize(&self.config, &self.sort)
  }

  fn change_key(&self) -> ChangeKey {
    ChangeKey { report_ids: self.config.report_ids(), stable: self.normalized().options.stable_json() }
  }

  fn key_changed(&self) -> bool {
    self.last_key.as_ref() != Some(&self.change_key())
  }

  fn request_fetch(&mut self) -> Vec<Command> {
    if self.state == FetchState::InFlight {
      self.changed_in_flight = true;
      return Vec::new();
    }
    self.schedule()
  }

  fn settle(&mut self) -> Vec<Command> {
    self.state = FetchState::Settled;
    self.is_loading = false;
    if std::mem::take(&mut self.changed_in_flight) {
      tracing::debug!("replaying change observed while in flight");
      return self.schedule();
    }
    Vec::new()
  }

  fn schedule(&mut self) -> Vec<Command> {
    if self.torn_down {
      return Vec::new();
    }

    let mut cmds = Vec::with_capacity(2);
    if let Some(prev) = self.armed.take() {
      cmds.push(Command::CancelTimer { token: prev });
    }

    self.next_token += 1;
    let token = TimerToken(self.next_token);
    let delay = self.debounce();
    self.armed = Some(token);
    self.state = FetchState::PendingFetch;
    self.is_loading = true;

    tracing::debug!(?token, delay_ms = delay.as_millis() as u64, "debounce armed");
    cmds.push(Command::ArmTimer { token, delay });
    cmds
  }

  /// Timestamp token that never repeats or goes backwards.
  fn next_cache_buster(&mut self, now_ms: i64) -> i64 {
    let token = match self.last_cache_buster {
      Some(prev) if now_ms <= prev => prev + 1,
      _ => now_ms,
    };
    self.last_cache_buster = Some(token);
    token
  }
}
