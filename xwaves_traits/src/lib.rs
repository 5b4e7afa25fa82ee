//! Device contracts for the delay-scan engine.
//!
//! Everything the scan core needs from the outside world goes through the
//! `DelayStage` and `LockIn` traits below, plus the `Clock` abstraction used
//! for settling waits. Errors cross the boundary as boxed trait objects and
//! are mapped to typed errors by the core.
pub mod clock;

pub use clock::{Clock, MonotonicClock};

/// Error type used at the device trait boundary.
pub type DeviceError = Box<dyn std::error::Error + Send + Sync>;

/// Motorized optical delay line addressed in picoseconds of delay.
pub trait DelayStage {
    /// Move to the given absolute delay and block until the move completes.
    /// Returns the delay the stage actually reached.
    fn move_to(&mut self, delay_ps: f64) -> Result<f64, DeviceError>;

    /// Drive the stage to its home reference.
    fn home(&mut self) -> Result<(), DeviceError>;
}

/// Lock-in amplifier used to sample the delayed signal.
pub trait LockIn {
    /// Output filter time constant in seconds.
    fn set_time_constant(&mut self, seconds: f64) -> Result<(), DeviceError>;

    /// Output filter roll-off in dB per octave (6, 12, 18 or 24).
    fn set_filter_slope(&mut self, db_per_octave: u8) -> Result<(), DeviceError>;

    /// Signal magnitude R in volts rms.
    fn read_magnitude(&mut self) -> Result<f64, DeviceError>;

    /// Noise estimate of the magnitude in volts rms.
    fn read_noise(&mut self) -> Result<f64, DeviceError>;

    /// Let the instrument pick its input range.
    fn autorange(&mut self) -> Result<(), DeviceError>;

    /// Sensitivity that best fits the current input range, in volts.
    fn find_next_sensitivity(&mut self) -> Result<f64, DeviceError>;

    /// Apply a sensitivity in volts.
    fn set_sensitivity(&mut self, volts: f64) -> Result<(), DeviceError>;
}

impl<T: DelayStage + ?Sized> DelayStage for Box<T> {
    fn move_to(&mut self, delay_ps: f64) -> Result<f64, DeviceError> {
        (**self).move_to(delay_ps)
    }
    fn home(&mut self) -> Result<(), DeviceError> {
        (**self).home()
    }
}

impl<T: LockIn + ?Sized> LockIn for Box<T> {
    fn set_time_constant(&mut self, seconds: f64) -> Result<(), DeviceError> {
        (**self).set_time_constant(seconds)
    }
    fn set_filter_slope(&mut self, db_per_octave: u8) -> Result<(), DeviceError> {
        (**self).set_filter_slope(db_per_octave)
    }
    fn read_magnitude(&mut self) -> Result<f64, DeviceError> {
        (**self).read_magnitude()
    }
    fn read_noise(&mut self) -> Result<f64, DeviceError> {
        (**self).read_noise()
    }
    fn autorange(&mut self) -> Result<(), DeviceError> {
        (**self).autorange()
    }
    fn find_next_sensitivity(&mut self) -> Result<f64, DeviceError> {
        (**self).find_next_sensitivity()
    }
    fn set_sensitivity(&mut self, volts: f64) -> Result<(), DeviceError> {
        (**self).set_sensitivity(volts)
    }
}
