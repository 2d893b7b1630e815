//! A software HX711 for tests and host demos.
//!
//! The simulator models the chip at pin level. Queued samples are shifted out
//! MSB first on each rising clock edge, extra pulses after the 24th bit are
//! recorded as the gain for the next conversion, and holding the clock high for
//! 60 µs or more powers the chip down.
//!
//! ```ignore
//! let sim = SimHx711::new();
//! sim.push(1000).unwrap();
//! let (sck, dt) = sim.pins();
//! let mut hx711 = HX711::new(PinConfig::new(5, 6), sck, dt, sim.delay());
//! ```

use core::cell::RefCell;
use core::convert::Infallible;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, InputPin, OutputPin};
use heapless::Deque;

/// Samples the simulator can hold before `push` refuses more.
pub const QUEUE_CAPACITY: usize = 32;

const POWER_DOWN_NS: u64 = 60_000;

struct Transfer {
    pattern: u32,
    pulses: u8,
    // gain the conversion being shifted out was taken at
    gain_pulses: u8,
}

// after reset and after waking from power down
const RESET_GAIN_PULSES: u8 = 1;

struct SimState {
    queue: Deque<i32, QUEUE_CAPACITY>,
    hold: Option<i32>,
    disconnected: bool,
    clock_high: bool,
    high_since_ns: u64,
    now_ns: u64,
    transfer: Option<Transfer>,
    gain_pulses: u8,
    last_gain_pulses: Option<u8>,
    last_conversion_gain: Option<u8>,
    conversions: u32,
    power_cycles: u32,
}

impl Default for SimState {
    fn default() -> Self {
        Self {
            queue: Deque::new(),
            hold: None,
            disconnected: false,
            clock_high: false,
            high_since_ns: 0,
            now_ns: 0,
            transfer: None,
            gain_pulses: RESET_GAIN_PULSES,
            last_gain_pulses: None,
            last_conversion_gain: None,
            conversions: 0,
            power_cycles: 0,
        }
    }
}

impl SimState {
    fn powered_down(&self) -> bool {
        self.clock_high && self.now_ns - self.high_since_ns >= POWER_DOWN_NS
    }

    fn next_sample(&self) -> Option<i32> {
        self.queue.front().copied().or(self.hold)
    }

    fn data_ready(&self) -> bool {
        !self.disconnected && !self.powered_down() && self.next_sample().is_some()
    }

    fn rising_edge(&mut self) {
        self.clock_high = true;
        self.high_since_ns = self.now_ns;
        if let Some(transfer) = self.transfer.as_mut() {
            transfer.pulses = transfer.pulses.saturating_add(1);
            return;
        }
        if !self.data_ready() {
            return;
        }
        if let Some(sample) = self.next_sample() {
            self.transfer = Some(Transfer {
                pattern: sample as u32 & 0x00FF_FFFF,
                pulses: 1,
                gain_pulses: self.gain_pulses,
            });
        }
    }

    fn falling_edge(&mut self) {
        if self.now_ns - self.high_since_ns >= POWER_DOWN_NS {
            // chip slept while the clock was high, and resets on wake
            self.transfer = None;
            self.gain_pulses = RESET_GAIN_PULSES;
            self.power_cycles += 1;
        }
        self.clock_high = false;
    }

    fn finish_transfer(&mut self) {
        let done = matches!(&self.transfer, Some(t) if t.pulses > 24);
        if !done {
            return;
        }
        if let Some(transfer) = self.transfer.take() {
            self.last_gain_pulses = Some(transfer.pulses - 24);
            self.last_conversion_gain = Some(transfer.gain_pulses);
            self.gain_pulses = transfer.pulses - 24;
            self.queue.pop_front();
            self.conversions += 1;
        }
    }

    /// Level of the data line, `true` for high.
    fn data_level(&mut self) -> bool {
        if self.clock_high {
            return match &self.transfer {
                Some(t) if (1..=24).contains(&t.pulses) => {
                    (t.pattern >> (24 - t.pulses)) & 1 == 1
                }
                _ => true,
            };
        }
        self.finish_transfer();
        if self.transfer.is_some() {
            return true;
        }
        !self.data_ready()
    }
}

/// A simulated HX711. Borrow its pins and delay to build a driver.
#[derive(Default)]
pub struct SimHx711 {
    state: RefCell<SimState>,
}

impl SimHx711 {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a conversion result. Only the low 24 bits are shifted out.
    pub fn push(&self, raw: i32) -> Result<(), i32> {
        self.state.borrow_mut().queue.push_back(raw)
    }

    /// Value to keep reporting once the queue is empty, or `None` to stop
    /// signalling ready.
    pub fn hold(&self, raw: Option<i32>) {
        self.state.borrow_mut().hold = raw;
    }

    /// Keep the data line high forever, as if the sensor were unplugged.
    pub fn disconnect(&self) {
        self.state.borrow_mut().disconnected = true;
    }

    pub fn reconnect(&self) {
        self.state.borrow_mut().disconnected = false;
    }

    /// Queued samples not yet read out.
    pub fn queued(&self) -> usize {
        self.state.borrow().queue.len()
    }

    /// Extra pulses seen after the last completed transfer.
    pub fn last_gain_pulses(&self) -> Option<u8> {
        self.state.borrow().last_gain_pulses
    }

    /// Gain, as extra pulses, the last completed conversion was taken at.
    pub fn last_conversion_gain(&self) -> Option<u8> {
        self.state.borrow().last_conversion_gain
    }

    /// Completed transfers.
    pub fn conversions(&self) -> u32 {
        self.state.borrow().conversions
    }

    /// Times the chip was powered down and woken again.
    pub fn power_cycles(&self) -> u32 {
        self.state.borrow().power_cycles
    }

    pub fn clock_is_high(&self) -> bool {
        self.state.borrow().clock_high
    }

    pub fn is_powered_down(&self) -> bool {
        self.state.borrow().powered_down()
    }

    /// Virtual time spent in delays.
    pub fn elapsed_us(&self) -> u64 {
        self.state.borrow().now_ns / 1_000
    }

    /// Clock (output) and data (input) pins wired to this chip.
    pub fn pins(&self) -> (SimClock<'_>, SimData<'_>) {
        (SimClock { sim: self }, SimData { sim: self })
    }

    /// A delay that advances the simulator's clock instead of sleeping.
    pub fn delay(&self) -> SimDelay<'_> {
        SimDelay { sim: self }
    }
}

/// PD_SCK pin of a [`SimHx711`].
pub struct SimClock<'a> {
    sim: &'a SimHx711,
}

impl ErrorType for SimClock<'_> {
    type Error = Infallible;
}

impl OutputPin for SimClock<'_> {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        let mut state = self.sim.state.borrow_mut();
        if state.clock_high {
            state.falling_edge();
        }
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        let mut state = self.sim.state.borrow_mut();
        if !state.clock_high {
            state.rising_edge();
        }
        Ok(())
    }
}

/// DOUT pin of a [`SimHx711`].
pub struct SimData<'a> {
    sim: &'a SimHx711,
}

impl ErrorType for SimData<'_> {
    type Error = Infallible;
}

impl InputPin for SimData<'_> {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.sim.state.borrow_mut().data_level())
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.sim.state.borrow_mut().data_level())
    }
}

/// Delay that advances a [`SimHx711`]'s virtual clock.
pub struct SimDelay<'a> {
    sim: &'a SimHx711,
}

impl DelayNs for SimDelay<'_> {
    fn delay_ns(&mut self, ns: u32) {
        self.sim.state.borrow_mut().now_ns += ns as u64;
    }
}
