//! A no-std driver for the HX711 load cell amplifier built on embedded-hal.
//!
//! The driver bit-bangs the HX711's two-wire interface, filters readings by
//! median and converts them to grams with a tare offset and a scale.
//!
//! ```ignore
//! let mut hx711 = HX711::new(PinConfig::new(5, 6), sck, dt, delay);
//! let mut scale = hx711.session()?;
//! scale.calibrate(500.0, || wait_for_reference_weight())?;
//!
//! let mut poller = Poller::new(PollConfig::default(), timer);
//! poller.run(&mut *scale, || stop_requested(), |reading| {
//!     if let Ok(weight) = reading {
//!         println!("Weight: {}", weight);
//!     }
//! })?;
//! // pins are released when `scale` goes out of scope
//! ```

#![cfg_attr(not(any(test, feature = "std")), no_std)]

pub mod calibration;
pub mod claim;
pub mod error;
pub mod filter;
pub mod hx711;
pub mod poll;
#[cfg(any(test, feature = "sim"))]
pub mod sim;

pub use calibration::{Calibration, Weight};
pub use error::{CalibrationError, ClaimError, Error};
pub use hx711::{Config, GainMode, PinConfig, Session, State, HX711};
pub use poll::{PollConfig, Poller};

pub trait LoadCell {
    type Error;

    /// Read the raw value from the load cell
    fn read(&mut self) -> Result<i32, Self::Error>;

    /// Read the value after applying the offset and scale.
    fn read_scaled(&mut self) -> Result<f32, Self::Error>;

    /// Zero the load cell offset by averaging `num_samples` readings
    fn tare(&mut self, num_samples: usize) -> Result<(), Self::Error>;

    /// Get the load cell offset.
    fn get_offset(&self) -> i32;

    /// Set the scale (AKA calibrate the scale).
    /// Use this to ensure that 1kg ~ 1kg
    fn set_scale(&mut self, scale: f32) -> Result<(), Self::Error>;

    /// Get the scale.
    fn get_scale(&self) -> f32;
}
