//! Lock-in amplifier settings understood by the scan engine.

use crate::error::{ScanError, invalid};

/// Output filter time constants supported by the instrument, seconds.
pub const TIME_CONSTANTS_S: [f64; 22] = [
    1e-6, 3e-6, 10e-6, 30e-6, 100e-6, 300e-6, 1e-3, 3e-3, 10e-3, 30e-3, 100e-3, 300e-3, 1.0, 3.0,
    10.0, 30.0, 100.0, 300.0, 1e3, 3e3, 10e3, 30e3,
];

/// Relative tolerance when matching a time constant against the table.
const TC_REL_TOLERANCE: f64 = 1e-12;

/// Index of `seconds` in [`TIME_CONSTANTS_S`], if it is a supported value.
pub fn time_constant_index(seconds: f64) -> Option<usize> {
    TIME_CONSTANTS_S
        .iter()
        .position(|&tc| (tc - seconds).abs() <= tc * TC_REL_TOLERANCE)
}

/// Output filter roll-off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterSlope {
    Db6,
    Db12,
    Db18,
    Db24,
}

impl FilterSlope {
    pub const fn db_per_octave(self) -> u8 {
        match self {
            Self::Db6 => 6,
            Self::Db12 => 12,
            Self::Db18 => 18,
            Self::Db24 => 24,
        }
    }

    /// Time constants to wait for the output to settle within 0.1 %.
    pub const fn settling_multiplier(self) -> f64 {
        match self {
            Self::Db6 => 6.91,
            Self::Db12 => 9.23,
            Self::Db18 => 11.23,
            Self::Db24 => 13.06,
        }
    }

    /// Settling wait in seconds for the given time constant.
    pub fn settling_time_s(self, time_constant_s: f64) -> f64 {
        time_constant_s * self.settling_multiplier()
    }
}

impl TryFrom<u8> for FilterSlope {
    type Error = ScanError;

    fn try_from(db: u8) -> Result<Self, Self::Error> {
        match db {
            6 => Ok(Self::Db6),
            12 => Ok(Self::Db12),
            18 => Ok(Self::Db18),
            24 => Ok(Self::Db24),
            other => Err(invalid(format!(
                "filter roll-off must be 6, 12, 18 or 24 dB/oct, got {other}"
            ))),
        }
    }
}

impl std::fmt::Display for FilterSlope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} dB/oct", self.db_per_octave())
    }
}
