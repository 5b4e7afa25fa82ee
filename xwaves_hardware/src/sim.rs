//! Simulated delay stage and lock-in amplifier.
//!
//! The two devices share the stage position so the lock-in can synthesize a
//! time-resolved transient at the current delay: flat baseline before time zero,
//! single exponential decay after it, plus uniform pseudo-noise.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use xwaves_traits::{DelayStage, DeviceError, LockIn};

use crate::error::HwError;
use crate::ranges::{input_range_for, is_sensitivity, next_sensitivity_for_range, INPUT_RANGES_V};
use crate::util::wait_until_with_timeout;

const TIME_CONSTANT_TOLERANCE: f64 = 1e-12;

/// Synthetic transient seen by the simulated lock-in.
#[derive(Debug, Clone)]
pub struct SimSignal {
    pub time_zero_ps: f64,
    pub amplitude_v: f64,
    pub decay_ps: f64,
    pub baseline_v: f64,
    /// Peak amplitude of the uniform noise added to each magnitude read.
    pub noise_v: f64,
    pub seed: u64,
}

impl Default for SimSignal {
    fn default() -> Self {
        Self {
            time_zero_ps: 0.0,
            amplitude_v: 5e-3,
            decay_ps: 20.0,
            baseline_v: 50e-6,
            noise_v: 0.0,
            seed: 0x5eed_1234,
        }
    }
}

impl SimSignal {
    /// Noise-free magnitude at the given delay.
    pub fn magnitude_at(&self, delay_ps: f64) -> f64 {
        let dt = delay_ps - self.time_zero_ps;
        if dt < 0.0 || self.decay_ps <= 0.0 {
            return self.baseline_v;
        }
        self.baseline_v + self.amplitude_v * (-dt / self.decay_ps).exp()
    }
}

/// Stage behaviour knobs.
#[derive(Debug, Clone)]
pub struct SimStageCfg {
    pub min_delay_ps: f64,
    pub max_delay_ps: f64,
    /// Travel speed; `None` completes moves instantly.
    pub velocity_ps_per_s: Option<f64>,
    pub move_timeout: Duration,
    /// Half-width of the uniform error between requested and reached delay.
    pub on_axis_error_ps: f64,
    /// Fail every move after this many successful ones.
    pub fail_after_moves: Option<usize>,
}

impl Default for SimStageCfg {
    fn default() -> Self {
        Self {
            min_delay_ps: -100.0,
            max_delay_ps: 1000.0,
            velocity_ps_per_s: None,
            move_timeout: Duration::from_secs(30),
            on_axis_error_ps: 0.0,
            fail_after_moves: None,
        }
    }
}

/// Lock-free shared f64 holding the current stage delay.
#[derive(Debug, Clone, Default)]
struct SharedDelay(Arc<AtomicU64>);

impl SharedDelay {
    fn get(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Acquire))
    }
    fn set(&self, ps: f64) {
        self.0.store(ps.to_bits(), Ordering::Release);
    }
}

/// Tiny xorshift PRNG; deterministic per seed.
#[derive(Debug, Clone)]
struct XorShift64(u64);

impl XorShift64 {
    fn new(seed: u64) -> Self {
        Self(seed.max(1))
    }
    fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }
    /// Uniform in [-1, 1).
    fn next_symmetric(&mut self) -> f64 {
        let unit = (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64;
        unit * 2.0 - 1.0
    }
}

/// Build a stage/lock-in pair sharing one position.
pub fn simulated_pair(
    stage_cfg: SimStageCfg,
    signal: SimSignal,
) -> (SimulatedStage, SimulatedLockIn) {
    let position = SharedDelay::default();
    let stage = SimulatedStage {
        rng: XorShift64::new(signal.seed ^ 0x9e37_79b9),
        cfg: stage_cfg,
        position: position.clone(),
        moves: 0,
    };
    let lockin = SimulatedLockIn {
        rng: XorShift64::new(signal.seed),
        signal,
        position,
        time_constant_s: 0.1,
        slope_db: 24,
        sensitivity_v: 1.0,
        input_range_v: INPUT_RANGES_V[0],
    };
    (stage, lockin)
}

pub struct SimulatedStage {
    cfg: SimStageCfg,
    position: SharedDelay,
    moves: usize,
    rng: XorShift64,
}

impl SimulatedStage {
    /// Last delay reached by the stage.
    pub fn position_ps(&self) -> f64 {
        self.position.get()
    }

    /// Number of successful moves so far.
    pub fn moves(&self) -> usize {
        self.moves
    }
}

impl DelayStage for SimulatedStage {
    fn move_to(&mut self, delay_ps: f64) -> Result<f64, DeviceError> {
        if !delay_ps.is_finite()
            || delay_ps < self.cfg.min_delay_ps
            || delay_ps > self.cfg.max_delay_ps
        {
            return Err(HwError::OutOfTravel {
                requested_ps: delay_ps,
                min_ps: self.cfg.min_delay_ps,
                max_ps: self.cfg.max_delay_ps,
            }
            .into());
        }
        if let Some(limit) = self.cfg.fail_after_moves
            && self.moves >= limit
        {
            tracing::warn!(moves = self.moves, "simulated stage link failure");
            return Err(HwError::Link("simulated controller stopped responding".into()).into());
        }

        if let Some(v) = self.cfg.velocity_ps_per_s.filter(|v| *v > 0.0) {
            let travel = Duration::from_secs_f64((delay_ps - self.position.get()).abs() / v);
            let started = Instant::now();
            wait_until_with_timeout(
                || started.elapsed() >= travel,
                self.cfg.move_timeout,
                Duration::from_millis(1),
            )?;
        }

        let reached = delay_ps + self.cfg.on_axis_error_ps * self.rng.next_symmetric();
        self.position.set(reached);
        self.moves += 1;
        tracing::trace!(requested_ps = delay_ps, reached_ps = reached, "stage move");
        Ok(reached)
    }

    fn home(&mut self) -> Result<(), DeviceError> {
        self.position.set(0.0);
        tracing::debug!("stage homed (simulated)");
        Ok(())
    }
}

pub struct SimulatedLockIn {
    signal: SimSignal,
    position: SharedDelay,
    time_constant_s: f64,
    slope_db: u8,
    sensitivity_v: f64,
    input_range_v: f64,
    rng: XorShift64,
}

impl SimulatedLockIn {
    pub fn time_constant_s(&self) -> f64 {
        self.time_constant_s
    }
    pub fn filter_slope_db(&self) -> u8 {
        self.slope_db
    }
    pub fn sensitivity_v(&self) -> f64 {
        self.sensitivity_v
    }
    pub fn input_range_v(&self) -> f64 {
        self.input_range_v
    }
}

/// Time constants accepted by the simulated instrument, seconds.
const TIME_CONSTANTS_S: [f64; 22] = [
    1e-6, 3e-6, 10e-6, 30e-6, 100e-6, 300e-6, 1e-3, 3e-3, 10e-3, 30e-3, 100e-3, 300e-3, 1.0, 3.0,
    10.0, 30.0, 100.0, 300.0, 1e3, 3e3, 10e3, 30e3,
];

impl LockIn for SimulatedLockIn {
    fn set_time_constant(&mut self, seconds: f64) -> Result<(), DeviceError> {
        let known = TIME_CONSTANTS_S
            .iter()
            .any(|&tc| (tc - seconds).abs() <= tc * TIME_CONSTANT_TOLERANCE);
        if !known {
            return Err(HwError::InvalidSetting(format!("time constant {seconds} s")).into());
        }
        self.time_constant_s = seconds;
        Ok(())
    }

    fn set_filter_slope(&mut self, db_per_octave: u8) -> Result<(), DeviceError> {
        if !matches!(db_per_octave, 6 | 12 | 18 | 24) {
            return Err(HwError::InvalidSetting(format!("filter slope {db_per_octave} dB/oct")).into());
        }
        self.slope_db = db_per_octave;
        Ok(())
    }

    fn read_magnitude(&mut self) -> Result<f64, DeviceError> {
        let clean = self.signal.magnitude_at(self.position.get());
        let noisy = (clean + self.signal.noise_v * self.rng.next_symmetric()).abs();
        if noisy > self.sensitivity_v {
            tracing::warn!(
                signal_v = noisy,
                sensitivity_v = self.sensitivity_v,
                "simulated lock-in overload"
            );
            return Ok(self.sensitivity_v);
        }
        Ok(noisy)
    }

    fn read_noise(&mut self) -> Result<f64, DeviceError> {
        // Standard deviation of the uniform noise model.
        Ok(self.signal.noise_v / 3f64.sqrt())
    }

    fn autorange(&mut self) -> Result<(), DeviceError> {
        let signal = self.signal.magnitude_at(self.position.get()) + self.signal.noise_v;
        self.input_range_v = input_range_for(signal);
        tracing::debug!(input_range_v = self.input_range_v, "autorange (simulated)");
        Ok(())
    }

    fn find_next_sensitivity(&mut self) -> Result<f64, DeviceError> {
        Ok(next_sensitivity_for_range(self.input_range_v))
    }

    fn set_sensitivity(&mut self, volts: f64) -> Result<(), DeviceError> {
        if !is_sensitivity(volts) {
            return Err(HwError::InvalidSetting(format!("sensitivity {volts} V")).into());
        }
        self.sensitivity_v = volts;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_is_flat_before_time_zero() {
        let s = SimSignal {
            time_zero_ps: 10.0,
            ..SimSignal::default()
        };
        assert_eq!(s.magnitude_at(-5.0), s.baseline_v);
        assert_eq!(s.magnitude_at(9.999), s.baseline_v);
        assert!(s.magnitude_at(10.0) > s.baseline_v);
    }

    #[test]
    fn xorshift_stays_in_range() {
        let mut r = XorShift64::new(7);
        for _ in 0..1000 {
            let v = r.next_symmetric();
            assert!((-1.0..1.0).contains(&v));
        }
    }
}
