use predicates::prelude::*;
use test_support::{cmd_bin, fixtures_dir};

fn run_json(args: &[&str], env: &[(&str, &str)]) -> serde_json::Value {
  let mut cmd = cmd_bin("merged-report-grid");
  cmd.env_remove("MRG_TEST_MERGE_RESULT_JSON");
  cmd.env_remove("MRG_TEST_MERGE_ERROR_JSON");
  cmd.env_remove("MRG_MERGE_ENDPOINT");
  for (k, v) in env {
    cmd.env(k, v);
  }
  let out = cmd.args(args).output().unwrap();
  assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
  serde_json::from_slice(&out.stdout).unwrap()
}

fn fixture(name: &str) -> String {
  fixtures_dir().join(name).to_string_lossy().to_string()
}

#[test]
fn fixture_result_renders_ready_view() {
  let config = fixture("widget_outer_join.json");
  let result = fixture("result_truncated.json");
  let v = run_json(&["--config", &config, "--result", &result], &[]);

  assert_eq!(v["state"], "Settled");
  assert_eq!(v["title"], "Pipeline by Region");
  assert_eq!(v["subtitle"], "OUTER JOIN from 2 reports");

  let vm = &v["viewModel"];
  assert_eq!(vm["status"], "ready");
  assert_eq!(vm["hasData"], true);
  assert_eq!(vm["truncationNotice"], "Showing first 200 of 500 rows.");
  assert_eq!(vm["rows"].as_array().unwrap().len(), 2);
  assert_eq!(vm["rows"][1]["cells"]["col_b"], "—");
  assert_eq!(vm["totalsRow"]["id"], "totals-row");
  assert_eq!(vm["sortedBy"], "KEY");

  assert_eq!(v["reports"][0]["name"], "Q1 Pipeline");
  assert_eq!(v["reports"][1]["url"], "/lightning/r/Report/00O5e000001BBBB/view");
  assert!(v.get("diagnostics").is_none());
}

#[test]
fn debug_flag_adds_diagnostics() {
  let config = fixture("widget_outer_join.json");
  let result = fixture("result_truncated.json");
  let v = run_json(
    &["--config", &config, "--result", &result, "--debug", "--editor", "--now-override", "1700000000000"],
    &[],
  );

  let diag = &v["diagnostics"];
  assert_eq!(diag["configuration"]["isInDesignMode"], true);
  assert_eq!(diag["configuration"]["optionsSent"]["_designModeCacheBuster"], 1_700_000_000_000i64);
  assert_eq!(diag["recommendations"][0]["type"], "WARNING");
  assert_eq!(diag["recommendations"][0]["issue"], "Low key overlap: 65%");
  assert_eq!(diag["response"]["totalRowCount"], 500);
}

#[test]
fn sort_flag_is_applied_before_first_fetch() {
  let config = fixture("widget_outer_join.json");
  let result = fixture("result_truncated.json");
  let v = run_json(&["--config", &config, "--result", &result, "--sort-by", "col_a", "--sort-direction", "desc"], &[]);
  assert_eq!(v["viewModel"]["sortedBy"], "col_a");
  assert_eq!(v["viewModel"]["sortedDirection"], "DESC");
}

#[test]
fn missing_configuration_is_quiet() {
  let result = fixture("result_truncated.json");
  let v = run_json(&["--result", &result], &[]);
  assert_eq!(v["viewModel"]["status"], "unconfigured");
  assert!(v["viewModel"].get("errorMessage").is_none());
}

#[test]
fn env_error_payload_becomes_error_state() {
  let config = fixture("widget_outer_join.json");
  let v = run_json(
    &["--config", &config],
    &[("MRG_TEST_MERGE_ERROR_JSON", r#"{"body":[{"message":"no access"},{"message":"report deleted"}]}"#)],
  );
  assert_eq!(v["viewModel"]["status"], "error");
  assert_eq!(v["viewModel"]["errorMessage"], "no access, report deleted");
  assert_eq!(v["viewModel"]["rows"].as_array().unwrap().len(), 0);
}

#[test]
fn no_service_source_fails() {
  let mut cmd = cmd_bin("merged-report-grid");
  cmd.env_remove("MRG_TEST_MERGE_RESULT_JSON");
  cmd.env_remove("MRG_TEST_MERGE_ERROR_JSON");
  cmd.env_remove("MRG_MERGE_ENDPOINT");
  cmd.assert().failure().stderr(predicate::str::contains("Provide one of --result"));
}
