//! Cooperative polling loop.
//!
//! Reads a weight every `interval_ms` until the stop signal is raised. The
//! stop signal is only checked between cycles, so a transfer that has started
//! always finishes.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use log::{debug, warn};

use crate::calibration::Weight;
use crate::error::Error;
use crate::filter::DEFAULT_SAMPLES;
use crate::hx711::HX711;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PollConfig {
    /// pause after each reading
    pub interval_ms: u32,
    /// samples per filtered reading
    pub samples: usize,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            samples: DEFAULT_SAMPLES,
        }
    }
}

pub struct Poller<Delay> {
    config: PollConfig,
    delay: Delay,
}

impl<Delay: DelayNs> Poller<Delay> {
    pub fn new(config: PollConfig, delay: Delay) -> Self {
        Self { config, delay }
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    /// Poll `driver` until `stop` returns true.
    ///
    /// Each reading, or a [`Error::Timeout`], is handed to `on_reading`; a
    /// timeout is retried on the next cycle. Any other error ends the loop
    /// and is returned. Returns the number of completed cycles.
    pub fn run<SckPin, DTPin, D, Stop, F>(
        &mut self,
        driver: &mut HX711<SckPin, DTPin, D>,
        mut stop: Stop,
        mut on_reading: F,
    ) -> Result<u32, Error<SckPin::Error>>
    where
        SckPin: OutputPin,
        DTPin: InputPin<Error = SckPin::Error>,
        D: DelayNs,
        Stop: FnMut() -> bool,
        F: FnMut(Result<Weight, Error<SckPin::Error>>),
    {
        let mut cycles = 0;
        while !stop() {
            match driver.get_weight(self.config.samples) {
                Ok(weight) => on_reading(Ok(weight)),
                Err(Error::Timeout) => {
                    warn!("hx711 poll cycle {} timed out, retrying", cycles);
                    on_reading(Err(Error::Timeout));
                }
                Err(e) => return Err(e),
            }
            cycles += 1;
            self.delay.delay_ms(self.config.interval_ms);
        }
        debug!("hx711 polling stopped after {} cycles", cycles);
        Ok(cycles)
    }
}
