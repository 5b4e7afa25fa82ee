//! Maps `Box<dyn Error>` from device trait boundaries to typed `ScanError`.
//!
//! The traits in `xwaves_traits` use `Box<dyn Error + Send + Sync>`; this
//! module converts those to our typed error enum, with an optional
//! feature-gated path for `xwaves_hardware::HwError` downcasting.

use crate::error::ScanError;

/// Map a trait-boundary error to a typed `ScanError`.
///
/// Known hardware error types are downcast first, then string heuristics apply.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> ScanError {
    #[cfg(feature = "hardware-errors")]
    {
        use xwaves_hardware::HwError;
        if let Some(hw) = e.downcast_ref::<HwError>() {
            return match hw {
                // Parameters were validated before the scan; a driver that still
                // refuses a move or setting is a device fault.
                HwError::Timeout => ScanError::DeviceTimeout(hw.to_string()),
                HwError::Io(io) => ScanError::Io(io.to_string()),
                other => ScanError::DeviceCommunication(other.to_string()),
            };
        }
    }

    let s = e.to_string();
    if s.to_lowercase().contains("timeout") || s.to_lowercase().contains("timed out") {
        ScanError::DeviceTimeout(s)
    } else {
        ScanError::DeviceCommunication(s)
    }
}

/// Wrap a boxed device error into an `eyre::Report` carrying a typed `ScanError`.
pub fn device_report(e: &xwaves_traits::DeviceError) -> eyre::Report {
    eyre::Report::new(map_hw_error(&**e))
}
