//! Scoped ownership of a set-up driver.
//!
//! A [`Session`] is taken with [`HX711::session`]. It derefs to the driver and
//! runs [`HX711::cleanup`] when it goes out of scope, on early return and on
//! panic unwind alike.

use core::ops::{Deref, DerefMut};

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use log::warn;

use crate::error::Error;
use crate::hx711::HX711;

pub struct Session<'a, SckPin, DTPin, Delay>
where
    SckPin: OutputPin,
    DTPin: InputPin<Error = SckPin::Error>,
    Delay: DelayNs,
{
    driver: &'a mut HX711<SckPin, DTPin, Delay>,
}

impl<'a, SckPin, DTPin, Delay> Session<'a, SckPin, DTPin, Delay>
where
    SckPin: OutputPin,
    DTPin: InputPin<Error = SckPin::Error>,
    Delay: DelayNs,
{
    pub(crate) fn open(
        driver: &'a mut HX711<SckPin, DTPin, Delay>,
    ) -> Result<Self, Error<SckPin::Error>> {
        driver.setup()?;
        Ok(Self { driver })
    }

    /// Clean up now and report the outcome, instead of on drop.
    pub fn close(self) -> Result<(), Error<SckPin::Error>> {
        self.driver.cleanup()
    }
}

impl<SckPin, DTPin, Delay> Deref for Session<'_, SckPin, DTPin, Delay>
where
    SckPin: OutputPin,
    DTPin: InputPin<Error = SckPin::Error>,
    Delay: DelayNs,
{
    type Target = HX711<SckPin, DTPin, Delay>;

    fn deref(&self) -> &Self::Target {
        self.driver
    }
}

impl<SckPin, DTPin, Delay> DerefMut for Session<'_, SckPin, DTPin, Delay>
where
    SckPin: OutputPin,
    DTPin: InputPin<Error = SckPin::Error>,
    Delay: DelayNs,
{
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.driver
    }
}

impl<SckPin, DTPin, Delay> Drop for Session<'_, SckPin, DTPin, Delay>
where
    SckPin: OutputPin,
    DTPin: InputPin<Error = SckPin::Error>,
    Delay: DelayNs,
{
    fn drop(&mut self) {
        // no-op after close()
        if let Err(e) = self.driver.cleanup() {
            warn!("hx711 cleanup failed: {:?}", e);
        }
    }
}
