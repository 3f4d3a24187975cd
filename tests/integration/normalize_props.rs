use merged_report_grid::model::{SortState, WidgetConfiguration};
use merged_report_grid::normalize::{normalize, CACHE_BUSTER_KEY};
use merged_report_grid::view;
use proptest::prelude::*;

fn free_form() -> impl Strategy<Value = Option<String>> {
  prop_oneof![
    Just(None),
    Just(Some(String::new())),
    Just(Some("{}".to_string())),
    Just(Some("[1,2]".to_string())),
    Just(Some(r#"{"2":"Total"}"#.to_string())),
    Just(Some(r#"[{"label":"A","formula":"x"}]"#.to_string())),
    "\\PC{0,40}".prop_map(Some),
  ]
}

fn config() -> impl Strategy<Value = WidgetConfiguration> {
  (
    free_form(),
    free_form(),
    free_form(),
    prop::option::of(prop_oneof![Just("OUTER_JOIN"), Just("INNER_JOIN"), Just("UNION"), Just("")]),
    prop::option::of(0u32..1000),
    prop::option::of(any::<bool>()),
  )
    .prop_map(|(aliases, calc, constants, mode, max_rows, grand_total)| WidgetConfiguration {
      report1_id: Some("R1".into()),
      report2_id: Some("R2".into()),
      column_aliases_json: aliases,
      calculated_fields_json: calc,
      dimension_constants_json: constants,
      merge_mode: mode.map(str::to_string),
      max_rows,
      show_grand_total_row: grand_total,
      ..Default::default()
    })
}

proptest! {
  #[test]
  fn stable_form_is_repeatable_and_token_free(cfg in config(), token in any::<i64>()) {
    let a = normalize(&cfg, &SortState::default());
    let b = normalize(&cfg, &SortState::default());
    prop_assert_eq!(a.options.stable_json(), b.options.stable_json());
    prop_assert!(!a.options.stable_json().contains(CACHE_BUSTER_KEY));
    prop_assert!(a.options.transport_json(Some(token)).contains(CACHE_BUSTER_KEY));
    prop_assert_eq!(a.options.transport_json(None), a.options.stable_json());
  }

  #[test]
  fn malformed_fields_degrade_to_empty_defaults(cfg in config()) {
    let n = normalize(&cfg, &SortState::default());
    let parsed = |raw: &Option<String>| raw.as_deref().map(|s| serde_json::from_str::<serde_json::Value>(s));

    if !matches!(parsed(&cfg.column_aliases_json), Some(Ok(serde_json::Value::Object(_)))) {
      prop_assert!(n.options.column_aliases.is_empty());
    }
    if !matches!(parsed(&cfg.calculated_fields_json), Some(Ok(serde_json::Value::Array(_)))) {
      prop_assert!(n.options.calculated_fields.is_empty());
    }
    if !matches!(parsed(&cfg.dimension_constants_json), Some(Ok(serde_json::Value::Object(_)))) {
      prop_assert!(n.options.dimension_constants.is_empty());
    }
    prop_assert!(n.diagnostics.len() <= 3);
    prop_assert!(n.options.max_rows > 0);
  }

  #[test]
  fn normalize_then_build_is_deterministic(cfg in config()) {
    let result: merged_report_grid::model::MergeResult = test_support::read_fixture_json("result_truncated.json");
    let sort = SortState::default();
    let first = view::build(Some(&result), &sort, &normalize(&cfg, &sort).options);
    let second = view::build(Some(&result), &sort, &normalize(&cfg, &sort).options);
    prop_assert_eq!(first, second);
  }
}
