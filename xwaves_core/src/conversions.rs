//! `From`/`TryFrom` implementations bridging `xwaves_config` documents to `xwaves_core` types.

use crate::config::{
    AutorangeMode, ErrorMeasurementMode, EstimatorCfg, ExperimentParameters, LegDescriptor,
    TravelLimits,
};
use crate::error::ScanError;
use crate::lockin::FilterSlope;

// ── LegDescriptor ────────────────────────────────────────────────────────────

impl From<&xwaves_config::LegPreset> for LegDescriptor {
    fn from(l: &xwaves_config::LegPreset) -> Self {
        Self::new(l.start_ps, l.end_ps, l.step_ps)
    }
}

// ── Modes ────────────────────────────────────────────────────────────────────

impl From<xwaves_config::ErrorModeCfg> for ErrorMeasurementMode {
    fn from(m: xwaves_config::ErrorModeCfg) -> Self {
        match m {
            xwaves_config::ErrorModeCfg::Never => Self::Never,
            xwaves_config::ErrorModeCfg::Once => Self::Once,
            xwaves_config::ErrorModeCfg::EveryPoint => Self::EveryPoint,
        }
    }
}

impl From<xwaves_config::AutorangeModeCfg> for AutorangeMode {
    fn from(m: xwaves_config::AutorangeModeCfg) -> Self {
        match m {
            xwaves_config::AutorangeModeCfg::Never => Self::Never,
            xwaves_config::AutorangeModeCfg::OnceAtTimeZero => Self::OnceAtTimeZero,
            xwaves_config::AutorangeModeCfg::EveryPoint => Self::EveryPoint,
        }
    }
}

// ── ExperimentParameters ─────────────────────────────────────────────────────

impl TryFrom<&xwaves_config::ExperimentPreset> for ExperimentParameters {
    type Error = ScanError;

    /// Only the roll-off can fail here; everything else is checked by `validate`.
    fn try_from(p: &xwaves_config::ExperimentPreset) -> Result<Self, Self::Error> {
        Ok(Self {
            experiment_name: p.experiment_name.clone(),
            time_constant_s: p.time_constant_s,
            filter_slope: FilterSlope::try_from(p.filter_roll_off_db_per_oct)?,
            time_zero_ps: p.time_zero_ps,
            num_scans: p.num_scans,
            legs: p.legs.iter().map(LegDescriptor::from).collect(),
            error_mode: p.error_measurement_mode.into(),
            autorange_mode: p.autorange_mode.into(),
        })
    }
}

impl From<&ExperimentParameters> for xwaves_config::ExperimentPreset {
    fn from(p: &ExperimentParameters) -> Self {
        Self {
            experiment_name: p.experiment_name.clone(),
            time_constant_s: p.time_constant_s,
            filter_roll_off_db_per_oct: p.filter_slope.db_per_octave(),
            time_zero_ps: p.time_zero_ps,
            num_scans: p.num_scans,
            legs: p
                .legs
                .iter()
                .map(|l| xwaves_config::LegPreset {
                    start_ps: l.start_ps,
                    end_ps: l.end_ps,
                    step_ps: l.step_ps,
                })
                .collect(),
            error_measurement_mode: match p.error_mode {
                ErrorMeasurementMode::Never => xwaves_config::ErrorModeCfg::Never,
                ErrorMeasurementMode::Once => xwaves_config::ErrorModeCfg::Once,
                ErrorMeasurementMode::EveryPoint => xwaves_config::ErrorModeCfg::EveryPoint,
            },
            autorange_mode: match p.autorange_mode {
                AutorangeMode::Never => xwaves_config::AutorangeModeCfg::Never,
                AutorangeMode::OnceAtTimeZero => xwaves_config::AutorangeModeCfg::OnceAtTimeZero,
                AutorangeMode::EveryPoint => xwaves_config::AutorangeModeCfg::EveryPoint,
            },
        }
    }
}

// ── TravelLimits ─────────────────────────────────────────────────────────────

impl From<&xwaves_config::StageCfg> for TravelLimits {
    fn from(c: &xwaves_config::StageCfg) -> Self {
        Self {
            min_delay_ps: c.min_delay_ps,
            max_delay_ps: c.max_delay_ps,
        }
    }
}

// ── EstimatorCfg ─────────────────────────────────────────────────────────────

impl From<&xwaves_config::TimingCfg> for EstimatorCfg {
    fn from(c: &xwaves_config::TimingCfg) -> Self {
        Self {
            move_s: c.move_s,
            capture_s: c.capture_s,
            error_measurement_s: c.error_measurement_s,
            autorange_s: c.autorange_s,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preset_maps_to_parameters() {
        let preset = xwaves_config::ExperimentPreset {
            experiment_name: "kerr".into(),
            time_constant_s: 0.1,
            filter_roll_off_db_per_oct: 18,
            time_zero_ps: 10.0,
            num_scans: 2,
            legs: vec![xwaves_config::LegPreset {
                start_ps: 0.0,
                end_ps: 5.0,
                step_ps: 1.0,
            }],
            error_measurement_mode: xwaves_config::ErrorModeCfg::Once,
            autorange_mode: xwaves_config::AutorangeModeCfg::EveryPoint,
        };
        let p = ExperimentParameters::try_from(&preset).unwrap();
        assert_eq!(p.filter_slope, FilterSlope::Db18);
        assert_eq!(p.error_mode, ErrorMeasurementMode::Once);
        assert_eq!(p.autorange_mode, AutorangeMode::EveryPoint);
        assert_eq!(p.legs, vec![LegDescriptor::new(0.0, 5.0, 1.0)]);

        let back = xwaves_config::ExperimentPreset::from(&p);
        assert_eq!(back, preset);
    }

    #[test]
    fn unsupported_roll_off_is_rejected() {
        let preset = xwaves_config::ExperimentPreset {
            filter_roll_off_db_per_oct: 9,
            ..Default::default()
        };
        assert!(matches!(
            ExperimentParameters::try_from(&preset),
            Err(ScanError::InvalidParameter(_))
        ));
    }
}
