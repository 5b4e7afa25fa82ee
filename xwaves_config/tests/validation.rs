use rstest::rstest;
use xwaves_config::load_toml;

const FULL: &str = r#"
[stage]
serial_number = "83840000"
channel = 1
min_delay_ps = -50.0
max_delay_ps = 600.0
on_axis_error_um = 12.0
move_timeout_ms = 10000

[lockin]
port = "/dev/ttyUSB0"
baud_rate = 115200
timeout_ms = 2000

[timing]
move_s = 2.2
capture_s = 1.1
error_measurement_s = 2.2
autorange_s = 1.3

[simulation]
noise_v = 1e-5
time_scale = 0.0

[output]
directory = "data"

[logging]
rotation = "daily"
"#;

#[test]
fn accepts_full_config() {
    let cfg = load_toml(FULL).expect("parse TOML");
    cfg.validate().expect("valid config should pass");
    assert_eq!(cfg.stage.serial_number.as_deref(), Some("83840000"));
    assert_eq!(cfg.stage.max_delay_ps, 600.0);
    assert_eq!(cfg.simulation.time_scale, 0.0);
}

#[test]
fn empty_document_uses_defaults() {
    let cfg = load_toml("").expect("parse TOML");
    cfg.validate().expect("defaults are valid");
    assert_eq!(cfg.stage.on_axis_error_um, 12.0);
    assert_eq!(cfg.timing.capture_s, 1.1);
    assert_eq!(cfg.output.poll_ms, 10);
}

#[rstest]
#[case("[stage]\nmin_delay_ps = 10.0\nmax_delay_ps = 10.0\n", "stage.max_delay_ps must be > stage.min_delay_ps")]
#[case("[stage]\nvelocity_mm_per_s = 0.0\n", "stage.velocity_mm_per_s must be > 0")]
#[case("[lockin]\nbaud_rate = 0\n", "lockin.baud_rate must be > 0")]
#[case("[timing]\nmove_s = -1.0\n", "timing.move_s must be a finite value >= 0")]
#[case("[simulation]\ndecay_ps = 0.0\n", "simulation.decay_ps must be > 0")]
#[case("[simulation]\ntime_scale = 2.0\n", "simulation.time_scale must be in [0.0, 1.0]")]
#[case("[output]\npoll_ms = 0\n", "output.poll_ms must be >= 1")]
#[case("[logging]\nrotation = \"weekly\"\n", "logging.rotation must be one of never|daily|hourly")]
fn rejects_bad_values(#[case] toml: &str, #[case] needle: &str) {
    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("should be rejected");
    assert!(
        err.to_string().contains(needle),
        "expected '{needle}', got '{err}'"
    );
}

#[test]
fn unknown_types_fail_to_parse() {
    assert!(load_toml("[stage]\nchannel = \"one\"\n").is_err());
}
