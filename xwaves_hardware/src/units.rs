//! Optical path conversions between time delay and stage travel.
//!
//! The delayed beam passes the retroreflector twice, so one millimetre of stage
//! travel adds two millimetres of optical path.

/// Speed of light in vacuum, m/s.
pub const SPEED_OF_LIGHT_M_PER_S: f64 = 299_792_458.0;
/// Refractive index of air used for the delay line.
pub const N_AIR: f64 = 1.0003;

/// Optical path length in millimetres travelled by light in `delay_ps`.
#[inline]
pub fn delay_ps_to_path_mm(delay_ps: f64) -> f64 {
    delay_ps * SPEED_OF_LIGHT_M_PER_S / (N_AIR * 1e9)
}

/// Stage position in millimetres that produces `delay_ps` of delay.
#[inline]
pub fn delay_ps_to_stage_mm(delay_ps: f64) -> f64 {
    delay_ps_to_path_mm(delay_ps) / 2.0
}

/// Inverse of [`delay_ps_to_stage_mm`].
#[inline]
pub fn stage_mm_to_delay_ps(stage_mm: f64) -> f64 {
    stage_mm * 2.0 * N_AIR * 1e9 / SPEED_OF_LIGHT_M_PER_S
}

/// Delay uncertainty in picoseconds caused by an on-axis positioning error
/// of `error_um` micrometres.
#[inline]
pub fn on_axis_error_ps(error_um: f64) -> f64 {
    stage_mm_to_delay_ps(error_um / 1000.0)
}
