use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

use merged_report_grid::cli::{normalize, Cli};
use merged_report_grid::host::{StaticHost, TracingNotifier};
use merged_report_grid::runtime::{spawn_widget, WidgetDeps, WidgetEvent, WidgetSnapshot};
use merged_report_grid::util;

fn init_tracing() {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
  let _ = fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
  init_tracing();
  let cli = Cli::parse();

  if cli.gen_man {
    let page = util::render_man_page::<Cli>()?;
    print!("{}", page);
    return Ok(());
  }

  // Phase 1: normalize CLI
  let cfg = normalize(cli)?;
  tracing::debug!(source = ?cfg.source, design_mode = cfg.design_mode, "effective config");

  // Phase 2: run one widget until it has nothing armed or in flight
  let deps = WidgetDeps {
    service: cfg.build_service()?,
    notifier: Arc::new(TracingNotifier),
    host: Arc::new(StaticHost { design_mode: cfg.design_mode }),
    now_override: cfg.now_override_ms,
  };
  let mut widget = spawn_widget(cfg.widget.clone(), deps);
  if let Some((field, direction)) = cfg.sort.clone() {
    widget.send(WidgetEvent::Sort { field, direction })?;
  }
  let snapshot = widget.wait_for(WidgetSnapshot::is_quiescent).await?;
  widget.teardown().await?;

  // Phase 3: emit the rendered view model
  println!("{}", serde_json::to_string_pretty(&snapshot)?);
  Ok(())
}
