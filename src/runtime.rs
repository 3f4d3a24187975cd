// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: Drive FetchScheduler on a tokio task: real timers, blocking service calls, notifications, and published snapshots
// role: orchestration/driver
// inputs: WidgetEvent stream (config changes, sort, refresh, render, teardown); MergeService/Notifier/HostContext seams
// outputs: WidgetSnapshot via a watch channel after every processed event
// side_effects: spawns timer tasks and blocking service calls; emits notifications
// invariants:
// - a single task owns the scheduler; timers and service replies come back as internal events
// - re-arming aborts the previous timer task; teardown aborts the armed one and drops late replies
// - every processed event is followed by one published snapshot and one on_render pass
// errors: handle methods surface a closed widget as anyhow errors; service failures flow into the snapshot
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use std::sync::Arc;

use anyhow::{anyhow, Result};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::diagnostics::{diagnose, DiagnosticsContext, DiagnosticsReport};
use crate::host::{HostContext, Notifier};
use crate::model::{MergeResult, SortDirection, WidgetConfiguration};
use crate::scheduler::{Command, FetchRequest, FetchScheduler, FetchState, TimerToken};
use crate::service::{MergeService, ServiceError};
use crate::view::{self, FetchStatus, ReportDetail, ViewModel};

#[derive(Debug, Clone, PartialEq)]
pub enum WidgetEvent {
  ConfigChanged(WidgetConfiguration),
  Sort { field: String, direction: SortDirection },
  Refresh,
  Rendered,
  Teardown,
}

enum Internal {
  Timer(TimerToken),
  Settled(Result<MergeResult, ServiceError>),
}

/// Collaborators a widget needs from its surroundings.
#[derive(Clone)]
pub struct WidgetDeps {
  pub service: Arc<dyn MergeService>,
  pub notifier: Arc<dyn Notifier>,
  pub host: Arc<dyn HostContext>,
  /// Fixed epoch millis for the editor cache-busting token.
  pub now_override: Option<i64>,
}

/// Everything a renderer needs, captured after one event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetSnapshot {
  pub state: FetchState,
  pub title: String,
  pub subtitle: String,
  pub view_model: ViewModel,
  pub reports: Vec<ReportDetail>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub diagnostics: Option<DiagnosticsReport>,
  #[serde(skip)]
  pub armed: bool,
  #[serde(skip)]
  pub torn_down: bool,
}

impl WidgetSnapshot {
  /// Nothing armed and nothing in flight.
  pub fn is_quiescent(&self) -> bool {
    self.state == FetchState::Settled && !self.armed
  }
}

pub fn snapshot(scheduler: &FetchScheduler, host: &dyn HostContext) -> WidgetSnapshot {
  let config = scheduler.config();
  let options = scheduler.normalized().options;
  let result = scheduler.result();

  let view_model = view::build(result, scheduler.sort_state(), &options).with_status(FetchStatus {
    is_loading: scheduler.is_loading(),
    configured: config.is_configured(),
    error: scheduler.error(),
  });

  let diagnostics = config.debug_mode.then(|| {
    diagnose(
      config,
      &options,
      result,
      DiagnosticsContext { design_mode: scheduler.is_design_mode(), last_options_json: scheduler.last_options_json() },
    )
  });

  WidgetSnapshot {
    state: scheduler.state(),
    title: view::title(config),
    subtitle: view::subtitle(config, &options),
    view_model,
    reports: view::report_details(config, &options, result, host),
    diagnostics,
    armed: scheduler.armed_timer().is_some(),
    torn_down: scheduler.is_torn_down(),
  }
}

struct WidgetRuntime {
  scheduler: FetchScheduler,
  deps: WidgetDeps,
  timer: Option<(TimerToken, JoinHandle<()>)>,
  internal_tx: mpsc::UnboundedSender<Internal>,
  snapshots: watch::Sender<WidgetSnapshot>,
}

impl WidgetRuntime {
  fn execute(&mut self, cmds: Vec<Command>) {
    for cmd in cmds {
      match cmd {
        Command::ArmTimer { token, delay } => {
          if let Some((_, prev)) = self.timer.take() {
            prev.abort();
          }
          let deadline = tokio::time::Instant::now() + delay;
          let tx = self.internal_tx.clone();
          let handle = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            let _ = tx.send(Internal::Timer(token));
          });
          self.timer = Some((token, handle));
        }
        Command::CancelTimer { token } => {
          if let Some((armed, handle)) = self.timer.take() {
            if armed == token {
              handle.abort();
            } else {
              self.timer = Some((armed, handle));
            }
          }
        }
        Command::Dispatch(request) => self.dispatch(request),
        Command::Notify { title, message, severity } => self.deps.notifier.notify(&title, &message, severity),
      }
    }
  }

  fn dispatch(&self, request: FetchRequest) {
    let service = Arc::clone(&self.deps.service);
    let tx = self.internal_tx.clone();
    tokio::spawn(async move {
      let joined = tokio::task::spawn_blocking(move || {
        service.get_merged_report_data(&request.report_ids, &request.options_json)
      })
      .await;
      let outcome = joined.unwrap_or_else(|e| Err(ServiceError::Transport(format!("merge call aborted: {}", e))));
      let _ = tx.send(Internal::Settled(outcome));
    });
  }

  fn handle_event(&mut self, event: WidgetEvent) {
    let cmds = match event {
      WidgetEvent::ConfigChanged(config) => self.scheduler.update_config(config),
      WidgetEvent::Sort { field, direction } => self.scheduler.sort(field, direction),
      WidgetEvent::Refresh => self.scheduler.refresh(),
      WidgetEvent::Rendered => Vec::new(),
      WidgetEvent::Teardown => self.scheduler.teardown(),
    };
    self.execute(cmds);
  }

  fn handle_internal(&mut self, internal: Internal) {
    let cmds = match internal {
      Internal::Timer(token) => {
        if matches!(&self.timer, Some((armed, _)) if *armed == token) {
          self.timer = None;
        }
        let now = crate::util::effective_now_ms(self.deps.now_override);
        self.scheduler.timer_fired(token, now)
      }
      Internal::Settled(Ok(result)) => self.scheduler.on_response(result),
      Internal::Settled(Err(err)) => self.scheduler.on_failure(&err),
    };
    self.execute(cmds);
  }

  fn render(&mut self) {
    self.snapshots.send_replace(snapshot(&self.scheduler, self.deps.host.as_ref()));
    let cmds = self.scheduler.on_render();
    if !cmds.is_empty() {
      self.execute(cmds);
      self.snapshots.send_replace(snapshot(&self.scheduler, self.deps.host.as_ref()));
    }
  }
}

async fn run(
  mut rt: WidgetRuntime,
  mut events: mpsc::UnboundedReceiver<WidgetEvent>,
  mut internal: mpsc::UnboundedReceiver<Internal>,
) {
  let cmds = rt.scheduler.connect();
  rt.execute(cmds);
  rt.render();

  loop {
    tokio::select! {
      event = events.recv() => match event {
        Some(WidgetEvent::Teardown) | None => {
          rt.handle_event(WidgetEvent::Teardown);
          rt.render();
          break;
        }
        Some(event) => rt.handle_event(event),
      },
      Some(msg) = internal.recv() => rt.handle_internal(msg),
    }
    rt.render();
  }

  tracing::debug!("widget torn down");
}

/// Owner side of a running widget.
pub struct WidgetHandle {
  events: mpsc::UnboundedSender<WidgetEvent>,
  snapshots: watch::Receiver<WidgetSnapshot>,
  task: JoinHandle<()>,
}

/// Start a widget on the current tokio runtime and connect it.
pub fn spawn_widget(config: WidgetConfiguration, deps: WidgetDeps) -> WidgetHandle {
  let scheduler = FetchScheduler::new(config, deps.host.is_design_mode());
  let (snap_tx, snap_rx) = watch::channel(snapshot(&scheduler, deps.host.as_ref()));
  let (event_tx, event_rx) = mpsc::unbounded_channel();
  let (internal_tx, internal_rx) = mpsc::unbounded_channel();

  let rt = WidgetRuntime { scheduler, deps, timer: None, internal_tx, snapshots: snap_tx };
  let task = tokio::spawn(run(rt, event_rx, internal_rx));

  WidgetHandle { events: event_tx, snapshots: snap_rx, task }
}

impl WidgetHandle {
  pub fn send(&self, event: WidgetEvent) -> Result<()> {
    self.events.send(event).map_err(|_| anyhow!("widget is no longer running"))
  }

  pub fn update_config(&self, config: WidgetConfiguration) -> Result<()> {
    self.send(WidgetEvent::ConfigChanged(config))
  }

  pub fn sort(&self, field: impl Into<String>, direction: SortDirection) -> Result<()> {
    self.send(WidgetEvent::Sort { field: field.into(), direction })
  }

  pub fn refresh(&self) -> Result<()> {
    self.send(WidgetEvent::Refresh)
  }

  /// Latest published snapshot.
  pub fn snapshot(&self) -> WidgetSnapshot {
    self.snapshots.borrow().clone()
  }

  /// Wait until the latest snapshot satisfies `pred`.
  pub async fn wait_for(&mut self, pred: impl Fn(&WidgetSnapshot) -> bool) -> Result<WidgetSnapshot> {
    loop {
      {
        let current = self.snapshots.borrow_and_update();
        if pred(&*current) {
          return Ok(current.clone());
        }
      }
      self.snapshots.changed().await.map_err(|_| anyhow!("widget stopped before reaching the awaited state"))?;
    }
  }

  /// Send `event`, then wait for the first snapshot after it that satisfies `pred`.
  pub async fn send_and_wait(
    &mut self,
    event: WidgetEvent,
    pred: impl Fn(&WidgetSnapshot) -> bool,
  ) -> Result<WidgetSnapshot> {
    self.snapshots.borrow_and_update();
    self.send(event)?;
    loop {
      self.snapshots.changed().await.map_err(|_| anyhow!("widget stopped before reaching the awaited state"))?;
      let current = self.snapshots.borrow_and_update();
      if pred(&*current) {
        return Ok(current.clone());
      }
    }
  }

  /// Wait until nothing is armed or in flight.
  pub async fn settled(&mut self) -> Result<WidgetSnapshot> {
    self.wait_for(WidgetSnapshot::is_quiescent).await
  }

  /// Tear the widget down and wait for its task to finish; returns the final snapshot.
  pub async fn teardown(self) -> Result<WidgetSnapshot> {
    let _ = self.events.send(WidgetEvent::Teardown);
    self.task.await.map_err(|e| anyhow!("widget task failed: {}", e))?;
    let last = self.snapshots.borrow().clone();
    Ok(last)
  }
}
