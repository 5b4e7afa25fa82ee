//! Sensitivity and input-range tables of the SR860 class of lock-in amplifiers.

/// Full-scale sensitivities in volts, largest first (1-2-5 pattern).
pub const SENSITIVITIES_V: [f64; 28] = [
    1.0, 500e-3, 200e-3, 100e-3, 50e-3, 20e-3, 10e-3, 5e-3, 2e-3, 1e-3, 500e-6, 200e-6, 100e-6,
    50e-6, 20e-6, 10e-6, 5e-6, 2e-6, 1e-6, 500e-9, 200e-9, 100e-9, 50e-9, 20e-9, 10e-9, 5e-9,
    2e-9, 1e-9,
];

/// Voltage input ranges in volts, largest first.
pub const INPUT_RANGES_V: [f64; 5] = [1.0, 300e-3, 100e-3, 30e-3, 10e-3];

/// Smallest sensitivity strictly above the given input range.
/// Falls back to the largest input range when no sensitivity is larger.
pub fn next_sensitivity_for_range(range_v: f64) -> f64 {
    SENSITIVITIES_V
        .iter()
        .rev()
        .copied()
        .find(|&s| s > range_v)
        .unwrap_or(INPUT_RANGES_V[0])
}

/// Smallest input range that still holds `signal_v` without overload.
pub fn input_range_for(signal_v: f64) -> f64 {
    INPUT_RANGES_V
        .iter()
        .rev()
        .copied()
        .find(|&r| r >= signal_v.abs())
        .unwrap_or(INPUT_RANGES_V[0])
}

/// True when `volts` is one of the supported sensitivities.
pub fn is_sensitivity(volts: f64) -> bool {
    SENSITIVITIES_V
        .iter()
        .any(|&s| (s - volts).abs() <= s * 1e-9)
}
