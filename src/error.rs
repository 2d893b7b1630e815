//! Error types for the load cell driver.

use core::fmt;

/// Everything a driver operation can fail with.
///
/// `E` is the error type of the underlying GPIO pins.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    /// The pins could not be claimed at setup.
    GpioUnavailable(ClaimError),
    /// The HAL reported a failure while driving or sampling a pin.
    Pin(E),
    /// The data line never signalled ready within the watchdog bound.
    Timeout,
    /// Invalid or degenerate calibration inputs.
    Calibration(CalibrationError),
    /// The driver is not set up, or has already been cleaned up.
    NotReady,
}

impl<E> From<ClaimError> for Error<E> {
    fn from(value: ClaimError) -> Self {
        Self::GpioUnavailable(value)
    }
}

impl<E> From<CalibrationError> for Error<E> {
    fn from(value: CalibrationError) -> Self {
        Self::Calibration(value)
    }
}

impl<E: fmt::Debug> fmt::Display for Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::GpioUnavailable(e) => write!(f, "gpio unavailable: {e}"),
            Error::Pin(e) => write!(f, "pin error: {e:?}"),
            Error::Timeout => write!(f, "timed out waiting for the hx711 to become ready"),
            Error::Calibration(e) => write!(f, "calibration failed: {e}"),
            Error::NotReady => write!(f, "driver is not set up"),
        }
    }
}

#[cfg(feature = "std")]
impl<E: fmt::Debug> std::error::Error for Error<E> {}

/// Why a pin claim was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClaimError {
    /// Data and clock refer to the same pin.
    SamePin(u8),
    /// The pin id is outside the range the registry tracks.
    OutOfRange(u8),
    /// Another driver instance holds the pin.
    AlreadyClaimed(u8),
    /// The pin was free but the HAL refused to drive it.
    Unusable(u8),
}

impl fmt::Display for ClaimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClaimError::SamePin(pin) => write!(f, "data and clock both use pin {pin}"),
            ClaimError::OutOfRange(pin) => write!(f, "pin {pin} is out of range"),
            ClaimError::AlreadyClaimed(pin) => write!(f, "pin {pin} is already claimed"),
            ClaimError::Unusable(pin) => write!(f, "pin {pin} cannot be driven"),
        }
    }
}

/// Why a calibration was rejected.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CalibrationError {
    /// The reference weight must be a finite value above zero.
    NonPositiveWeight,
    /// Zero and loaded readings are within the noise epsilon of each other.
    Degenerate { zero: i32, loaded: i32 },
    /// A scale of zero, NaN or infinity.
    InvalidScale,
}

impl fmt::Display for CalibrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CalibrationError::NonPositiveWeight => {
                write!(f, "reference weight must be greater than zero")
            }
            CalibrationError::Degenerate { zero, loaded } => write!(
                f,
                "zero reading {zero} and loaded reading {loaded} are indistinguishable"
            ),
            CalibrationError::InvalidScale => write!(f, "scale must be finite and non-zero"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ClaimError {}

#[cfg(feature = "std")]
impl std::error::Error for CalibrationError {}
