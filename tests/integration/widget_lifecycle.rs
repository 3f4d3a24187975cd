use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};

use merged_report_grid::host::{LocationHost, RecordingNotifier, StaticHost};
use merged_report_grid::model::{MergeResult, WidgetConfiguration};
use merged_report_grid::runtime::{spawn_widget, WidgetDeps, WidgetEvent, WidgetSnapshot};
use merged_report_grid::scheduler::FetchState;
use merged_report_grid::service::{FixtureMergeService, MergeService, ServiceError};
use merged_report_grid::view::ViewStatus;

/// Blocks every call until the test releases it.
struct GatedService {
  gate: Mutex<mpsc::Receiver<()>>,
  calls: AtomicUsize,
  last_options: Mutex<Option<String>>,
}

impl GatedService {
  fn new() -> (Arc<Self>, mpsc::Sender<()>) {
    let (tx, rx) = mpsc::channel();
    let svc = Arc::new(Self { gate: Mutex::new(rx), calls: AtomicUsize::new(0), last_options: Mutex::new(None) });
    (svc, tx)
  }
}

impl MergeService for GatedService {
  fn get_merged_report_data(&self, _report_ids: &[String], options_json: &str) -> Result<MergeResult, ServiceError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    *self.last_options.lock().unwrap() = Some(options_json.to_string());
    self.gate.lock().unwrap().recv().map_err(|_| ServiceError::Transport("gate closed".into()))?;
    Ok(MergeResult::default())
  }
}

fn cfg(mode: &str) -> WidgetConfiguration {
  WidgetConfiguration {
    report1_id: Some("R1".into()),
    report2_id: Some("R2".into()),
    merge_mode: Some(mode.into()),
    ..Default::default()
  }
}

fn deps(service: Arc<dyn MergeService>) -> WidgetDeps {
  WidgetDeps {
    service,
    notifier: Arc::new(RecordingNotifier::new()),
    host: Arc::new(StaticHost::runtime()),
    now_override: None,
  }
}

#[tokio::test(start_paused = true)]
async fn change_during_flight_is_replayed_after_settlement() {
  test_support::init_tracing();
  let (svc, gate) = GatedService::new();
  let mut w = spawn_widget(cfg("OUTER_JOIN"), deps(svc.clone()));

  w.wait_for(|s| s.state == FetchState::InFlight).await.unwrap();
  w.send_and_wait(WidgetEvent::ConfigChanged(cfg("UNION")), |s| s.state == FetchState::InFlight).await.unwrap();
  assert_eq!(svc.calls.load(Ordering::SeqCst), 1);

  gate.send(()).unwrap();
  gate.send(()).unwrap();
  w.wait_for(|s| s.is_quiescent() && svc.calls.load(Ordering::SeqCst) == 2).await.unwrap();

  let last = svc.last_options.lock().unwrap().clone().unwrap();
  assert!(last.contains(r#""mergeMode":"UNION""#));
  w.teardown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn teardown_while_in_flight_drops_late_reply() {
  let (svc, gate) = GatedService::new();
  let mut w = spawn_widget(cfg("OUTER_JOIN"), deps(svc.clone()));
  w.wait_for(|s| s.state == FetchState::InFlight).await.unwrap();

  let last = w.teardown().await.unwrap();
  assert!(last.torn_down);
  gate.send(()).unwrap();
  test_support::tokio_time_advance(std::time::Duration::from_secs(1)).await;
  assert_eq!(svc.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn unchanged_configuration_does_not_refetch() {
  let (svc, gate) = GatedService::new();
  gate.send(()).unwrap();
  let mut w = spawn_widget(cfg("OUTER_JOIN"), deps(svc.clone()));
  w.settled().await.unwrap();

  let retitled = WidgetConfiguration { component_title: Some("Renamed".into()), ..cfg("OUTER_JOIN") };
  let snap = w.send_and_wait(WidgetEvent::ConfigChanged(retitled), |_| true).await.unwrap();
  assert_eq!(snap.title, "Renamed");
  assert!(snap.is_quiescent());

  w.send_and_wait(WidgetEvent::Rendered, WidgetSnapshot::is_quiescent).await.unwrap();
  assert_eq!(svc.calls.load(Ordering::SeqCst), 1);
  w.teardown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn editor_location_attaches_cache_token() {
  let (svc, gate) = GatedService::new();
  gate.send(()).unwrap();
  let deps = WidgetDeps {
    service: svc.clone(),
    notifier: Arc::new(RecordingNotifier::new()),
    host: Arc::new(LocationHost::new("https://example.lightning.force.com/flexipageEditor/surface.app")),
    now_override: Some(42),
  };
  let mut w = spawn_widget(cfg("OUTER_JOIN"), deps);
  let snap = w.settled().await.unwrap();
  assert_eq!(snap.state, FetchState::Settled);

  let last = svc.last_options.lock().unwrap().clone().unwrap();
  assert!(last.ends_with(r#","_designModeCacheBuster":42}"#));
  w.teardown().await.unwrap();
}

fn with_rows() -> FixtureMergeService {
  FixtureMergeService::succeeding(MergeResult { rows: vec![Default::default()], ..Default::default() })
}

#[tokio::test(start_paused = true)]
async fn swapping_a_report_refetches_with_new_ids() {
  let svc = Arc::new(with_rows());
  let mut w = spawn_widget(cfg("OUTER_JOIN"), deps(svc.clone()));
  w.settled().await.unwrap();
  assert_eq!(svc.call_count(), 1);

  let swapped = WidgetConfiguration { report2_id: Some("R3".into()), ..cfg("OUTER_JOIN") };
  w.send_and_wait(WidgetEvent::ConfigChanged(swapped), |s| s.is_quiescent() && svc.call_count() == 2)
    .await
    .unwrap();

  let (ids, _) = svc.last_request().unwrap();
  assert_eq!(ids, vec!["R1", "R3"]);
  w.teardown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn removing_a_report_clears_rows_without_a_call() {
  let svc = Arc::new(with_rows());
  let mut w = spawn_widget(cfg("OUTER_JOIN"), deps(svc.clone()));
  let snap = w.settled().await.unwrap();
  assert_eq!(snap.view_model.rows.len(), 1);

  let reduced = WidgetConfiguration { report2_id: None, ..cfg("UNION") };
  let snap = w
    .send_and_wait(WidgetEvent::ConfigChanged(reduced), |s| {
      s.is_quiescent() && s.view_model.status == ViewStatus::Unconfigured
    })
    .await
    .unwrap();
  assert!(snap.view_model.rows.is_empty());
  assert!(!snap.view_model.has_data);

  let snap = w.send_and_wait(WidgetEvent::Rendered, |_| true).await.unwrap();
  assert!(snap.is_quiescent());
  test_support::tokio_time_advance(std::time::Duration::from_secs(1)).await;
  assert!(w.snapshot().is_quiescent());
  assert_eq!(svc.call_count(), 1);
  w.teardown().await.unwrap();
}
