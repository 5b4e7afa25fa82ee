#![no_main]
use libfuzzer_sys::fuzz_target;
use xwaves_core::{EstimatorCfg, ExperimentParameters, TravelLimits};

fuzz_target!(|data: &str| {
    let Ok(preset) = xwaves_config::parse_preset_json(data) else {
        return;
    };
    let Ok(params) = ExperimentParameters::try_from(&preset) else {
        return;
    };
    let _ = xwaves_core::estimate_params(&params, &EstimatorCfg::default());
    let limits = TravelLimits {
        min_delay_ps: -1.0e4,
        max_delay_ps: 1.0e4,
    };
    if params.validate(Some(&limits)).is_ok() {
        // Validated legs only fail to expand when one is too dense.
        if let Ok(positions) = xwaves_core::sequencer::expand(&params.legs) {
            assert!(positions.iter().all(|p| p.is_finite()));
        } else {
            assert!(
                params
                    .legs
                    .iter()
                    .any(|l| (l.end_ps - l.start_ps) / l.step_ps >= 9.9e5)
            );
        }
    }
});
