//! Process-wide registry of claimed pin ids.
//!
//! A driver claims its data and clock pin ids at setup and releases them at
//! cleanup, so two instances can never drive the same physical pins.

use core::cell::Cell;

use critical_section::Mutex;

use crate::error::ClaimError;
use crate::hx711::PinConfig;

/// Pin ids at or above this are refused.
pub const MAX_PIN_ID: u8 = 64;

// one bit per pin id
static CLAIMED: Mutex<Cell<u64>> = Mutex::new(Cell::new(0));

fn mask(pin: u8) -> Result<u64, ClaimError> {
    if pin >= MAX_PIN_ID {
        return Err(ClaimError::OutOfRange(pin));
    }
    Ok(1u64 << pin)
}

/// Claim both pins, or neither.
pub fn claim(pins: PinConfig) -> Result<(), ClaimError> {
    if pins.data_pin == pins.clock_pin {
        return Err(ClaimError::SamePin(pins.data_pin));
    }
    let data = mask(pins.data_pin)?;
    let clock = mask(pins.clock_pin)?;

    critical_section::with(|cs| {
        let claimed = CLAIMED.borrow(cs);
        let current = claimed.get();
        if current & data != 0 {
            return Err(ClaimError::AlreadyClaimed(pins.data_pin));
        }
        if current & clock != 0 {
            return Err(ClaimError::AlreadyClaimed(pins.clock_pin));
        }
        claimed.set(current | data | clock);
        Ok(())
    })
}

/// Release both pins. Releasing an unclaimed pin does nothing.
pub fn release(pins: PinConfig) {
    let bits = mask(pins.data_pin).unwrap_or(0) | mask(pins.clock_pin).unwrap_or(0);
    critical_section::with(|cs| {
        let claimed = CLAIMED.borrow(cs);
        claimed.set(claimed.get() & !bits);
    });
}

/// Whether `pin` is currently held by some driver.
pub fn is_claimed(pin: u8) -> bool {
    match mask(pin) {
        Ok(bit) => critical_section::with(|cs| CLAIMED.borrow(cs).get() & bit != 0),
        Err(_) => false,
    }
}
