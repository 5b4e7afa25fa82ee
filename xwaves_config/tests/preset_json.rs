use std::fs;

use rstest::rstest;
use tempfile::tempdir;
use xwaves_config::{AutorangeModeCfg, ErrorModeCfg, load_preset_json, parse_preset_json};

#[rstest]
fn loads_preset_from_disk() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("preset.json");
    fs::write(
        &path,
        r#"{
  "experiment_name": "gaas_run1",
  "time_constant_s": 0.3,
  "filter_roll_off_db_per_oct": 18,
  "time_zero_ps": 12.5,
  "num_scans": 4,
  "legs": [
    { "start_ps": 0.0, "end_ps": 10.0, "step_ps": 5.0 },
    { "start_ps": 10.0, "end_ps": 50.0, "step_ps": 10.0 }
  ],
  "error_measurement_mode": "EveryPoint",
  "autorange_mode": "OnceAtTimeZero"
}"#,
    )
    .unwrap();

    let p = load_preset_json(&path).unwrap();
    assert_eq!(p.experiment_name, "gaas_run1");
    assert_eq!(p.filter_roll_off_db_per_oct, 18);
    assert_eq!(p.num_scans, 4);
    assert_eq!(p.legs.len(), 2);
    assert_eq!(p.legs[1].step_ps, 10.0);
    assert_eq!(p.error_measurement_mode, ErrorModeCfg::EveryPoint);
    assert_eq!(p.autorange_mode, AutorangeModeCfg::OnceAtTimeZero);
}

#[rstest]
#[case(r#"{"time_constant_s":0.1}"#, "invalid preset JSON")]
#[case(
    r#"{"time_constant_s":0.1,"filter_roll_off_db_per_oct":24,"time_zero_ps":0,"num_scans":1,"legs":[]}"#,
    "at least one leg"
)]
#[case(
    r#"{"time_constant_s":0.1,"filter_roll_off_db_per_oct":24,"time_zero_ps":0,"num_scans":1,
        "legs":[{"start_ps":0,"end_ps":1,"step_ps":1}],"autorange_mode":"Sometimes"}"#,
    "invalid preset JSON"
)]
#[case(
    r#"{"experiment_name":"  ","time_constant_s":0.1,"filter_roll_off_db_per_oct":24,"time_zero_ps":0,
        "num_scans":1,"legs":[{"start_ps":0,"end_ps":1,"step_ps":1}]}"#,
    "experiment_name must not be empty"
)]
#[case(
    r#"{"experiment_name":"../outside","time_constant_s":0.1,"filter_roll_off_db_per_oct":24,
        "time_zero_ps":0,"num_scans":1,"legs":[{"start_ps":0,"end_ps":1,"step_ps":1}]}"#,
    "plain name"
)]
#[case(
    r#"{"experiment_name":"/abs/run","time_constant_s":0.1,"filter_roll_off_db_per_oct":24,
        "time_zero_ps":0,"num_scans":1,"legs":[{"start_ps":0,"end_ps":1,"step_ps":1}]}"#,
    "plain name"
)]
#[case(
    r#"{"experiment_name":"..","time_constant_s":0.1,"filter_roll_off_db_per_oct":24,
        "time_zero_ps":0,"num_scans":1,"legs":[{"start_ps":0,"end_ps":1,"step_ps":1}]}"#,
    "plain name"
)]
fn rejects_malformed_presets(#[case] json: &str, #[case] needle: &str) {
    let err = parse_preset_json(json).expect_err("malformed");
    assert!(err.to_string().contains(needle), "got: {err}");
}

#[test]
fn missing_file_names_the_path() {
    let err = load_preset_json(std::path::Path::new("/nonexistent/preset.json")).unwrap_err();
    assert!(err.to_string().contains("preset.json"));
}
