//! HX 711 Polling Example
//!
//! Runs the polling loop against a simulated HX711 on the host: calibrate
//! with a 500 g reference, then print a weight once per second until the
//! stop flag is raised.
//!
//! `RUST_LOG=debug cargo run --example polling --features sim,std`

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use embedded_hal_mock::eh1::delay::StdSleep;
use loadcell_reader::sim::SimHx711;
use loadcell_reader::{PinConfig, PollConfig, Poller, HX711};

const CYCLES: u32 = 5;

static STOP: AtomicBool = AtomicBool::new(false);

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let sim = SimHx711::new();
    // unloaded scale, one noisy sample
    for raw in [8_120, 8_090, 30_000] {
        sim.push(raw).map_err(|_| "simulator queue full")?;
    }

    let (sck, dt) = sim.pins();
    let mut hx711 = HX711::new(PinConfig::new(5, 6), sck, dt, sim.delay());
    let mut scale = hx711.session()?;
    println!("ready");

    let calibration = scale.calibrate(500.0, || sim.hold(Some(8_100 + 500 * 420)))?;
    println!(
        "offset = {}, scale = {:.1} counts/g",
        calibration.offset, calibration.scale
    );

    let cycle = AtomicU32::new(0);
    let mut poller = Poller::new(PollConfig::default(), StdSleep::new());
    poller.run(
        &mut *scale,
        || STOP.load(Ordering::Relaxed),
        |reading| {
            match reading {
                Ok(weight) => println!("Weight: {}", weight),
                Err(e) => eprintln!("read failed: {}", e),
            }
            // take a little off the scale each second
            let n = cycle.fetch_add(1, Ordering::Relaxed) + 1;
            sim.hold(Some(8_100 + (500 - 50 * n as i32) * 420));
            if n >= CYCLES {
                STOP.store(true, Ordering::Relaxed);
            }
        },
    )?;

    scale.close()?;
    Ok(())
}
