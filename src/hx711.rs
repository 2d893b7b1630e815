use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use log::{debug, trace, warn};

use crate::calibration::{self, Calibration, Weight};
use crate::claim;
use crate::error::{ClaimError, Error};
use crate::filter::{self, Window, DEFAULT_SAMPLES};
use crate::LoadCell;

pub mod session;

pub use session::Session;

pub const HX711_MINIMUM: i32 = -(1 << 23);
pub const HX711_MAXIMUM: i32 = (1 << 23) - 1;
const HX711_DELAY_TIME_US: u32 = 1;
// the chip sleeps once the clock is held high for more than 60 µs
const HX711_POWER_DOWN_US: u32 = 80;

/// Channel and gain of the next conversion, selected by the number of extra
/// clock pulses after the 24 data bits.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GainMode {
    #[default]
    A128 = 1, // extra pulses
    B32 = 2,
    A64 = 3,
}

impl GainMode {
    pub fn extra_pulses(self) -> u8 {
        self as u8
    }
}

/// Pin ids of the data (DOUT) and clock (PD_SCK) lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PinConfig {
    pub data_pin: u8,
    pub clock_pin: u8,
}

impl PinConfig {
    pub const fn new(data_pin: u8, clock_pin: u8) -> Self {
        Self {
            data_pin,
            clock_pin,
        }
    }
}

/// Timing and filtering parameters of the driver.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// gain used for every conversion after the first
    pub gain: GainMode,
    /// clock high and low time per pulse
    pub pulse_us: u32,
    /// how long `read_raw` waits for the data line before giving up
    pub ready_timeout_us: u32,
    /// delay between two checks of the data line
    pub ready_poll_us: u32,
    /// zero and loaded readings closer than this are rejected by `calibrate`
    pub calibration_epsilon: u32,
    /// samples per filtered reading while calibrating
    pub calibration_samples: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gain: GainMode::A128,
            pulse_us: HX711_DELAY_TIME_US,
            // 10 SPS gives a conversion every 100 ms
            ready_timeout_us: 500_000,
            ready_poll_us: 100,
            calibration_epsilon: 10,
            calibration_samples: DEFAULT_SAMPLES,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum State {
    Uninitialized,
    Ready,
    Closed,
}

/// Sign-extend a 24-bit two's complement pattern.
pub fn decode(raw: u32) -> i32 {
    (((raw & 0x00FF_FFFF) << 8) as i32) >> 8
}

/// HX711 load cell amplifier read by bit-banging a clock and a data pin.
///
/// The driver owns both pins. Call [`HX711::setup`] (or take a
/// [`HX711::session`]) before reading, and [`HX711::cleanup`] when done.
pub struct HX711<SckPin, DTPin, Delay> {
    sck_pin: SckPin,
    dt_pin: DTPin,
    delay: Delay,
    pins: PinConfig,
    config: Config,
    state: State,
    sleeping: bool,
    last_reading: i32,
    calibration: Calibration,
}

impl<SckPin, DTPin, Delay> HX711<SckPin, DTPin, Delay>
where
    SckPin: OutputPin,
    DTPin: InputPin<Error = SckPin::Error>,
    Delay: DelayNs,
{
    pub fn new(pins: PinConfig, sck_pin: SckPin, dt_pin: DTPin, delay: Delay) -> Self {
        Self::with_config(pins, sck_pin, dt_pin, delay, Config::default())
    }

    pub fn with_config(
        pins: PinConfig,
        sck_pin: SckPin,
        dt_pin: DTPin,
        delay: Delay,
        config: Config,
    ) -> Self {
        Self {
            sck_pin,
            dt_pin,
            delay,
            pins,
            config,
            state: State::Uninitialized,
            sleeping: false,
            last_reading: 0,
            calibration: Calibration::default(),
        }
    }

    /// Claim the pins and idle the clock low.
    ///
    /// Does nothing if the driver is already set up. A closed driver can be
    /// set up again.
    pub fn setup(&mut self) -> Result<(), Error<SckPin::Error>> {
        if self.state == State::Ready {
            return Ok(());
        }
        claim::claim(self.pins)?;
        if let Err(e) = self.sck_pin.set_low() {
            claim::release(self.pins);
            warn!(
                "hx711 clock pin {} cannot be driven: {:?}",
                self.pins.clock_pin, e
            );
            return Err(Error::GpioUnavailable(ClaimError::Unusable(
                self.pins.clock_pin,
            )));
        }
        self.state = State::Ready;
        self.sleeping = false;
        debug!(
            "hx711 ready on dt={} sck={}",
            self.pins.data_pin, self.pins.clock_pin
        );
        Ok(())
    }

    /// Set the driver up and return a guard that cleans it up when dropped.
    pub fn session(
        &mut self,
    ) -> Result<Session<'_, SckPin, DTPin, Delay>, Error<SckPin::Error>> {
        Session::open(self)
    }

    /// Idle the clock and release the pins. Calling it again does nothing.
    pub fn cleanup(&mut self) -> Result<(), Error<SckPin::Error>> {
        match self.state {
            State::Closed => Ok(()),
            State::Uninitialized => {
                self.state = State::Closed;
                Ok(())
            }
            State::Ready => {
                self.state = State::Closed;
                self.sleeping = false;
                claim::release(self.pins);
                debug!(
                    "hx711 released dt={} sck={}",
                    self.pins.data_pin, self.pins.clock_pin
                );
                self.sck_pin.set_low().map_err(Error::Pin)
            }
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn pins(&self) -> PinConfig {
        self.pins
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn ensure_ready(&self) -> Result<(), Error<SckPin::Error>> {
        if self.state != State::Ready || self.sleeping {
            return Err(Error::NotReady);
        }
        Ok(())
    }

    /// Whether a conversion is waiting to be read (the data line is low).
    pub fn is_ready(&mut self) -> Result<bool, Error<SckPin::Error>> {
        self.ensure_ready()?;
        self.dt_pin.is_low().map_err(Error::Pin)
    }

    /// Read one conversion, waiting for the chip to signal ready.
    ///
    /// Fails with [`Error::Timeout`] if the data line stays high for longer
    /// than `ready_timeout_us`.
    pub fn read_raw(&mut self) -> Result<i32, Error<SckPin::Error>> {
        self.ensure_ready()?;
        self.wait_ready()?;
        self.read_conversion()
    }

    /// Read one conversion if one is waiting.
    pub fn try_read_raw(&mut self) -> nb::Result<i32, Error<SckPin::Error>> {
        if !self.is_ready()? {
            return Err(nb::Error::WouldBlock);
        }
        Ok(self.read_conversion()?)
    }

    fn wait_ready(&mut self) -> Result<(), Error<SckPin::Error>> {
        let poll_us = self.config.ready_poll_us.max(1);
        let mut waited_us: u32 = 0;
        loop {
            if self.dt_pin.is_low().map_err(Error::Pin)? {
                return Ok(());
            }
            if waited_us >= self.config.ready_timeout_us {
                warn!(
                    "hx711 on dt={} not ready after {} us",
                    self.pins.data_pin, waited_us
                );
                return Err(Error::Timeout);
            }
            self.delay.delay_us(poll_us);
            waited_us = waited_us.saturating_add(poll_us);
        }
    }

    fn read_conversion(&mut self) -> Result<i32, Error<SckPin::Error>> {
        let pulse_us = self.config.pulse_us;
        let mut value: u32 = 0;
        // read in data bits
        for _ in 0..24 {
            let current_bit = self.read_hx711_bit(pulse_us)? as u32;
            // bits arrive MSB first
            value = (value << 1) | current_bit;
        }
        // send gain mode for next reading
        for _ in 0..self.config.gain.extra_pulses() {
            self.toggle_sck_bit(pulse_us)?;
        }

        let signed = decode(value);
        trace!("hx711 raw {:#08x} -> {}", value, signed);
        self.last_reading = signed;
        Ok(signed)
    }

    fn read_hx711_bit(&mut self, hx711_delay_time_us: u32) -> Result<bool, Error<SckPin::Error>> {
        self.sck_pin.set_high().map_err(Error::Pin)?;
        self.delay.delay_us(hx711_delay_time_us);

        let pin_state = self.dt_pin.is_high();

        // bring the clock down even when the sample failed
        self.sck_pin.set_low().map_err(Error::Pin)?;
        self.delay.delay_us(hx711_delay_time_us);

        pin_state.map_err(Error::Pin)
    }

    fn toggle_sck_bit(&mut self, hx711_delay_time_us: u32) -> Result<(), Error<SckPin::Error>> {
        self.sck_pin.set_high().map_err(Error::Pin)?;
        self.delay.delay_us(hx711_delay_time_us);
        self.sck_pin.set_low().map_err(Error::Pin)?;
        self.delay.delay_us(hx711_delay_time_us);
        Ok(())
    }

    fn read_window(&mut self, samples: usize) -> Result<Window, Error<SckPin::Error>> {
        let mut window = Window::new();
        for _ in 0..filter::sample_count(samples) {
            let raw = self.read_raw()?;
            if window.push(raw).is_err() {
                break;
            }
        }
        Ok(window)
    }

    fn read_median(&mut self, samples: usize) -> Result<i32, Error<SckPin::Error>> {
        let mut window = self.read_window(samples)?;
        filter::median(&mut window).ok_or(Error::NotReady)
    }

    /// Median of `samples` raw readings, converted to grams.
    ///
    /// `samples` is clamped to `1..=MAX_SAMPLES`. Any read failure is
    /// returned as is; no partial result is produced.
    pub fn get_weight(&mut self, samples: usize) -> Result<Weight, Error<SckPin::Error>> {
        let raw = self.read_median(samples)?;
        Ok(Weight(self.calibration.to_grams(raw)))
    }

    /// Median of `samples` raw readings minus the offset.
    pub fn get_value(&mut self, samples: usize) -> Result<i32, Error<SckPin::Error>> {
        let raw = self.read_median(samples)?;
        Ok(self.calibration.tared(raw))
    }

    /// Zero the scale on the mean of `num_samples` readings.
    pub fn tare(&mut self, num_samples: usize) -> Result<(), Error<SckPin::Error>> {
        let window = self.read_window(num_samples)?;
        if let Some(offset) = filter::mean(&window) {
            self.calibration.offset = offset;
            debug!("hx711 tare offset = {}", offset);
        }
        Ok(())
    }

    /// Calibrate against a reference weight.
    ///
    /// Reads the unloaded baseline, calls `load_reference` so the caller can
    /// put `known_weight_grams` on the scale, then reads again. The previous
    /// calibration is kept if anything fails.
    pub fn calibrate<F>(
        &mut self,
        known_weight_grams: f32,
        load_reference: F,
    ) -> Result<Calibration, Error<SckPin::Error>>
    where
        F: FnOnce(),
    {
        calibration::check_weight(known_weight_grams)?;
        self.ensure_ready()?;

        let samples = self.config.calibration_samples;
        let zero = self.read_median(samples)?;
        load_reference();
        let loaded = self.read_median(samples)?;

        let calibration = Calibration::from_readings(
            zero,
            loaded,
            known_weight_grams,
            self.config.calibration_epsilon,
        )?;
        debug!(
            "hx711 calibrated: zero = {}, loaded = {}, scale = {}",
            zero, loaded, calibration.scale
        );
        self.calibration = calibration;
        Ok(calibration)
    }

    /// Hold the clock high so the chip enters power down mode.
    pub fn power_down(&mut self) -> Result<(), Error<SckPin::Error>> {
        self.ensure_ready()?;
        self.sck_pin.set_high().map_err(Error::Pin)?;
        self.delay.delay_us(HX711_POWER_DOWN_US);
        self.sleeping = true;
        Ok(())
    }

    /// Wake the chip. The first conversion after waking uses gain A128.
    pub fn power_up(&mut self) -> Result<(), Error<SckPin::Error>> {
        if self.state != State::Ready {
            return Err(Error::NotReady);
        }
        self.sck_pin.set_low().map_err(Error::Pin)?;
        self.sleeping = false;
        debug!(
            "hx711 awake, next conversion at A128, then {:?}",
            self.config.gain
        );
        Ok(())
    }

    pub fn is_powered_down(&self) -> bool {
        self.sleeping
    }

    /// Get last reading, offset relative to the tare, and scaled.
    pub fn get_last(&self) -> Weight {
        Weight(self.calibration.to_grams(self.last_reading))
    }

    pub fn get_last_raw(&self) -> i32 {
        self.last_reading
    }

    pub fn get_gain_mode(&self) -> GainMode {
        self.config.gain
    }

    pub fn set_gain_mode(&mut self, new_mode: GainMode) {
        self.config.gain = new_mode;
    }

    pub fn calibration(&self) -> Calibration {
        self.calibration
    }

    pub fn set_calibration(
        &mut self,
        calibration: Calibration,
    ) -> Result<(), Error<SckPin::Error>> {
        calibration::check_scale(calibration.scale)?;
        self.calibration = calibration;
        Ok(())
    }

    pub fn get_offset(&self) -> i32 {
        self.calibration.offset
    }

    pub fn set_offset(&mut self, offset: i32) {
        self.calibration.offset = offset;
    }

    pub fn get_scale(&self) -> f32 {
        self.calibration.scale
    }

    pub fn set_scale(&mut self, scale: f32) -> Result<(), Error<SckPin::Error>> {
        calibration::check_scale(scale)?;
        self.calibration.scale = scale;
        Ok(())
    }
}

impl<SckPin, DTPin, Delay> Drop for HX711<SckPin, DTPin, Delay> {
    fn drop(&mut self) {
        // the pins themselves go with the driver, only the claims need freeing
        if self.state == State::Ready {
            claim::release(self.pins);
        }
    }
}

impl<SckPin, DTPin, Delay> LoadCell for HX711<SckPin, DTPin, Delay>
where
    SckPin: OutputPin,
    DTPin: InputPin<Error = SckPin::Error>,
    Delay: DelayNs,
{
    type Error = Error<SckPin::Error>;

    fn read(&mut self) -> Result<i32, Self::Error> {
        self.read_raw()
    }

    fn read_scaled(&mut self) -> Result<f32, Self::Error> {
        let raw = self.read_raw()?;
        Ok(self.calibration.to_grams(raw))
    }

    fn tare(&mut self, num_samples: usize) -> Result<(), Self::Error> {
        HX711::tare(self, num_samples)
    }

    fn get_offset(&self) -> i32 {
        HX711::get_offset(self)
    }

    fn set_scale(&mut self, scale: f32) -> Result<(), Self::Error> {
        HX711::set_scale(self, scale)
    }

    fn get_scale(&self) -> f32 {
        HX711::get_scale(self)
    }
}

#[cfg(test)]
mod tests {
    use embedded_hal_mock::eh1::delay::NoopDelay;
    use embedded_hal_mock::eh1::digital::{Mock as PinMock, State as PinState, Transaction};

    use super::*;
    use crate::error::{CalibrationError, ClaimError};
    use crate::sim::{SimClock, SimData, SimDelay, SimHx711};

    // the pin registry is global, so every test uses its own pin ids
    type SimDriver<'a> = HX711<SimClock<'a>, SimData<'a>, SimDelay<'a>>;

    fn driver(sim: &SimHx711, data_pin: u8, clock_pin: u8) -> SimDriver<'_> {
        let (sck, dt) = sim.pins();
        HX711::new(PinConfig::new(data_pin, clock_pin), sck, dt, sim.delay())
    }

    #[test]
    fn decode_sign_extends() {
        assert_eq!(decode(0x00_0000), 0);
        assert_eq!(decode(0x00_0001), 1);
        assert_eq!(decode(0x7F_FFFF), HX711_MAXIMUM);
        assert_eq!(decode(0x80_0000), HX711_MINIMUM);
        assert_eq!(decode(0xFF_FFFF), -1);
        assert_eq!(decode(0xFF_FFF3), -13);
    }

    #[test]
    fn decode_negation_pattern_is_negative() {
        let mut r: u32 = 0;
        while r <= 0x00FF_FFFF {
            let negated = ((r ^ 0x00FF_FFFF) + 1) & 0x00FF_FFFF;
            // -2^23 has no positive counterpart
            if r != 0x80_0000 {
                assert_eq!(decode(negated), -decode(r), "pattern {r:#08x}");
            }
            r += 251;
        }
        assert_eq!(decode(0x80_0001), -decode(0x7F_FFFF));
    }

    #[test]
    fn wire_sequence_with_gain_64() {
        let pattern: u32 = 0x80_0001;

        let mut sck_expected = std::vec![Transaction::set(PinState::Low)];
        for _ in 0..(24 + 3) {
            sck_expected.push(Transaction::set(PinState::High));
            sck_expected.push(Transaction::set(PinState::Low));
        }
        // cleanup
        sck_expected.push(Transaction::set(PinState::Low));

        let mut dt_expected = std::vec![Transaction::get(PinState::Low)];
        for bit in (0..24).rev() {
            let level = if (pattern >> bit) & 1 == 1 {
                PinState::High
            } else {
                PinState::Low
            };
            dt_expected.push(Transaction::get(level));
        }

        let sck = PinMock::new(&sck_expected);
        let dt = PinMock::new(&dt_expected);
        let mut sck_done = sck.clone();
        let mut dt_done = dt.clone();

        let config = Config {
            gain: GainMode::A64,
            ..Config::default()
        };
        let mut hx711 = HX711::with_config(PinConfig::new(0, 1), sck, dt, NoopDelay::new(), config);
        hx711.setup().unwrap();
        assert_eq!(hx711.read_raw().unwrap(), -8_388_607);
        hx711.cleanup().unwrap();

        sck_done.done();
        dt_done.done();
    }

    #[test]
    fn gain_mode_sets_extra_pulses() {
        let sim = SimHx711::new();
        for raw in [10, 20, 30] {
            sim.push(raw).unwrap();
        }
        let mut hx711 = driver(&sim, 2, 3);
        hx711.setup().unwrap();

        assert_eq!(hx711.read_raw().unwrap(), 10);
        hx711.set_gain_mode(GainMode::B32);
        assert_eq!(hx711.read_raw().unwrap(), 20);
        // transfers complete on the next look at the data line
        assert!(hx711.is_ready().unwrap());
        assert_eq!(sim.last_gain_pulses(), Some(2));
        hx711.set_gain_mode(GainMode::A64);
        assert_eq!(hx711.read_raw().unwrap(), 30);
        assert!(!hx711.is_ready().unwrap());
        assert_eq!(sim.last_gain_pulses(), Some(3));
        hx711.cleanup().unwrap();
    }

    #[test]
    fn read_raw_times_out_without_ready_signal() {
        let sim = SimHx711::new();
        sim.push(1234).unwrap();
        sim.disconnect();
        let config = Config {
            ready_timeout_us: 10_000,
            ready_poll_us: 100,
            ..Config::default()
        };
        let (sck, dt) = sim.pins();
        let mut hx711 = HX711::with_config(PinConfig::new(4, 5), sck, dt, sim.delay(), config);
        hx711.setup().unwrap();

        assert_eq!(hx711.read_raw(), Err(Error::Timeout));
        assert!(sim.elapsed_us() >= 10_000);
        assert_eq!(sim.conversions(), 0);
        assert_eq!(hx711.get_last_raw(), 0);
        assert_eq!(hx711.get_weight(3), Err(Error::Timeout));
        hx711.cleanup().unwrap();
    }

    #[test]
    fn try_read_raw_would_block() {
        let sim = SimHx711::new();
        let mut hx711 = driver(&sim, 6, 7);
        hx711.setup().unwrap();
        assert_eq!(hx711.try_read_raw(), Err(nb::Error::WouldBlock));
        sim.push(-42).unwrap();
        assert_eq!(hx711.try_read_raw(), Ok(-42));
        hx711.cleanup().unwrap();
    }

    #[test]
    fn reads_fail_outside_ready_state() {
        let sim = SimHx711::new();
        sim.hold(Some(100));
        let mut hx711 = driver(&sim, 8, 9);

        assert_eq!(hx711.state(), State::Uninitialized);
        assert_eq!(hx711.read_raw(), Err(Error::NotReady));
        assert_eq!(hx711.get_weight(3), Err(Error::NotReady));
        assert_eq!(hx711.try_read_raw(), Err(nb::Error::Other(Error::NotReady)));

        hx711.setup().unwrap();
        assert_eq!(hx711.read_raw(), Ok(100));

        hx711.cleanup().unwrap();
        assert_eq!(hx711.state(), State::Closed);
        assert_eq!(hx711.read_raw(), Err(Error::NotReady));
        assert_eq!(hx711.get_weight(1), Err(Error::NotReady));
    }

    #[test]
    fn cleanup_is_idempotent() {
        let sim = SimHx711::new();
        let mut hx711 = driver(&sim, 10, 11);
        hx711.setup().unwrap();
        assert!(claim::is_claimed(10));

        hx711.cleanup().unwrap();
        hx711.cleanup().unwrap();
        assert_eq!(hx711.state(), State::Closed);
        assert!(!claim::is_claimed(10));
        assert!(!claim::is_claimed(11));
        assert!(!sim.clock_is_high());
    }

    #[test]
    fn second_driver_cannot_claim_same_pins() {
        let sim = SimHx711::new();
        let other = SimHx711::new();
        let mut first = driver(&sim, 12, 13);
        let mut second = driver(&other, 14, 13);

        first.setup().unwrap();
        assert_eq!(
            second.setup(),
            Err(Error::GpioUnavailable(ClaimError::AlreadyClaimed(13)))
        );
        assert_eq!(second.state(), State::Uninitialized);

        first.cleanup().unwrap();
        second.setup().unwrap();
        second.cleanup().unwrap();
    }

    #[test]
    fn same_pin_for_data_and_clock_is_refused() {
        let sim = SimHx711::new();
        let mut hx711 = driver(&sim, 15, 15);
        assert_eq!(
            hx711.setup(),
            Err(Error::GpioUnavailable(ClaimError::SamePin(15)))
        );
    }

    #[test]
    fn closed_driver_can_be_set_up_again() {
        let sim = SimHx711::new();
        sim.hold(Some(5));
        let mut hx711 = driver(&sim, 16, 17);
        hx711.setup().unwrap();
        hx711.cleanup().unwrap();
        hx711.setup().unwrap();
        assert_eq!(hx711.read_raw(), Ok(5));
        hx711.cleanup().unwrap();
    }

    #[test]
    fn unit_calibration_weight() {
        let sim = SimHx711::new();
        sim.hold(Some(100));
        let mut hx711 = driver(&sim, 18, 19);
        hx711.setup().unwrap();
        assert_eq!(hx711.get_weight(DEFAULT_SAMPLES), Ok(Weight(100.0)));
        hx711.cleanup().unwrap();
    }

    #[test]
    fn median_rejects_spike() {
        let sim = SimHx711::new();
        for raw in [500, HX711_MAXIMUM, 502] {
            sim.push(raw).unwrap();
        }
        let mut hx711 = driver(&sim, 20, 21);
        hx711.setup().unwrap();
        hx711.set_offset(2);
        assert_eq!(hx711.get_value(3), Ok(500));
        hx711.cleanup().unwrap();
    }

    #[test]
    fn calibrate_against_reference_weight() {
        let sim = SimHx711::new();
        for _ in 0..3 {
            sim.push(1000).unwrap();
        }
        let mut hx711 = driver(&sim, 22, 23);
        hx711.setup().unwrap();

        let calibration = hx711
            .calibrate(500.0, || sim.hold(Some(3000)))
            .unwrap();
        assert_eq!(calibration.offset, 1000);
        assert_eq!(calibration.scale, 4.0);
        assert_eq!(hx711.calibration(), calibration);

        let weight = hx711.get_weight(3).unwrap();
        assert!((weight.grams() - 500.0).abs() < 1e-3);
        hx711.cleanup().unwrap();
    }

    #[test]
    fn degenerate_calibration_is_rejected() {
        let sim = SimHx711::new();
        sim.hold(Some(1000));
        let mut hx711 = driver(&sim, 24, 25);
        hx711.setup().unwrap();

        assert_eq!(
            hx711.calibrate(0.0, || {}),
            Err(Error::Calibration(CalibrationError::NonPositiveWeight))
        );
        // nothing was read for an invalid weight
        assert_eq!(sim.conversions(), 0);

        assert_eq!(
            hx711.calibrate(500.0, || {}),
            Err(Error::Calibration(CalibrationError::Degenerate {
                zero: 1000,
                loaded: 1000
            }))
        );
        assert_eq!(hx711.calibration(), Calibration::default());

        // a reference weight so small the scale overflows to infinity
        hx711.set_scale(2.0).unwrap();
        assert_eq!(
            hx711.calibrate(1e-38, || sim.hold(Some(3000))),
            Err(Error::Calibration(CalibrationError::InvalidScale))
        );
        assert_eq!(hx711.calibration(), Calibration::new(0, 2.0));
        assert_eq!(hx711.get_weight(3), Ok(Weight(1500.0)));
        hx711.cleanup().unwrap();
    }

    #[test]
    fn tare_averages_readings() {
        let sim = SimHx711::new();
        for raw in [90, 100, 110, 100] {
            sim.push(raw).unwrap();
        }
        let mut hx711 = driver(&sim, 26, 27);
        hx711.setup().unwrap();
        LoadCell::tare(&mut hx711, 4).unwrap();
        assert_eq!(LoadCell::get_offset(&hx711), 100);

        sim.hold(Some(150));
        LoadCell::set_scale(&mut hx711, 2.0).unwrap();
        assert_eq!(LoadCell::read_scaled(&mut hx711), Ok(25.0));
        assert_eq!(hx711.get_last(), Weight(25.0));
        hx711.cleanup().unwrap();
    }

    #[test]
    fn invalid_scale_is_rejected() {
        let sim = SimHx711::new();
        let mut hx711 = driver(&sim, 28, 29);
        assert_eq!(
            hx711.set_scale(0.0),
            Err(Error::Calibration(CalibrationError::InvalidScale))
        );
        assert_eq!(
            hx711.set_calibration(Calibration::new(0, f32::NAN)),
            Err(Error::Calibration(CalibrationError::InvalidScale))
        );
        assert_eq!(hx711.get_scale(), 1.0);
    }

    #[test]
    fn power_down_and_up() {
        let sim = SimHx711::new();
        sim.hold(Some(77));
        let mut hx711 = driver(&sim, 30, 31);
        hx711.setup().unwrap();
        hx711.set_gain_mode(GainMode::A64);

        // the first conversion after setup runs at the chip's reset gain
        assert_eq!(hx711.read_raw(), Ok(77));
        assert_eq!(hx711.read_raw(), Ok(77));
        assert!(hx711.is_ready().unwrap());
        assert_eq!(sim.last_conversion_gain(), Some(3));

        hx711.power_down().unwrap();
        assert!(sim.is_powered_down());
        assert!(hx711.is_powered_down());
        assert_eq!(hx711.read_raw(), Err(Error::NotReady));

        hx711.power_up().unwrap();
        assert!(!sim.is_powered_down());
        assert_eq!(sim.power_cycles(), 1);
        assert_eq!(hx711.read_raw(), Ok(77));
        assert!(hx711.is_ready().unwrap());
        // waking resets the chip to A128 whatever the driver asks for...
        assert_eq!(sim.last_conversion_gain(), Some(1));
        // ...while the driver has already requested A64 for the next one
        assert_eq!(sim.last_gain_pulses(), Some(3));
        assert_eq!(hx711.get_gain_mode(), GainMode::A64);

        assert_eq!(hx711.read_raw(), Ok(77));
        assert!(hx711.is_ready().unwrap());
        assert_eq!(sim.last_conversion_gain(), Some(3));
        hx711.cleanup().unwrap();
    }

    #[test]
    fn dropping_a_set_up_driver_frees_pins() {
        let sim = SimHx711::new();
        {
            let mut hx711 = driver(&sim, 32, 33);
            hx711.setup().unwrap();
            assert!(claim::is_claimed(32));
        }
        assert!(!claim::is_claimed(32));
        assert!(!claim::is_claimed(33));

        let mut again = driver(&sim, 32, 33);
        again.setup().unwrap();
        again.cleanup().unwrap();
    }

    #[test]
    fn dropping_after_cleanup_leaves_other_claims_alone() {
        let sim = SimHx711::new();
        let other = SimHx711::new();
        let mut first = driver(&sim, 57, 58);
        first.setup().unwrap();
        first.cleanup().unwrap();

        let mut second = driver(&other, 57, 58);
        second.setup().unwrap();
        drop(first);
        // the closed driver must not free pins now held by someone else
        assert!(claim::is_claimed(57));
        assert!(claim::is_claimed(58));
        second.cleanup().unwrap();
    }

    #[test]
    fn zero_samples_reads_exactly_one() {
        let sim = SimHx711::new();
        for raw in [123, 456] {
            sim.push(raw).unwrap();
        }
        let mut hx711 = driver(&sim, 59, 60);
        hx711.setup().unwrap();
        assert_eq!(hx711.get_weight(0), Ok(Weight(123.0)));
        assert_eq!(hx711.read_raw(), Ok(456));

        // a failed read never falls back to the previous sample
        sim.disconnect();
        assert_eq!(hx711.get_weight(0), Err(Error::Timeout));
        assert_eq!(hx711.get_value(1), Err(Error::Timeout));
        hx711.cleanup().unwrap();
    }

    struct StuckClock;

    impl embedded_hal::digital::ErrorType for StuckClock {
        type Error = embedded_hal::digital::ErrorKind;
    }

    impl OutputPin for StuckClock {
        fn set_low(&mut self) -> Result<(), Self::Error> {
            Err(embedded_hal::digital::ErrorKind::Other)
        }

        fn set_high(&mut self) -> Result<(), Self::Error> {
            Err(embedded_hal::digital::ErrorKind::Other)
        }
    }

    struct IdleData;

    impl embedded_hal::digital::ErrorType for IdleData {
        type Error = embedded_hal::digital::ErrorKind;
    }

    impl InputPin for IdleData {
        fn is_high(&mut self) -> Result<bool, Self::Error> {
            Ok(true)
        }

        fn is_low(&mut self) -> Result<bool, Self::Error> {
            Ok(false)
        }
    }

    #[test]
    fn undrivable_clock_is_unavailable_at_setup() {
        let mut hx711 = HX711::new(PinConfig::new(61, 62), StuckClock, IdleData, NoopDelay::new());
        assert_eq!(
            hx711.setup(),
            Err(Error::GpioUnavailable(ClaimError::Unusable(62)))
        );
        assert_eq!(hx711.state(), State::Uninitialized);
        assert!(!claim::is_claimed(61));
        assert!(!claim::is_claimed(62));
    }
}
