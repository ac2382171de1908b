//! Real-time playback on the system audio device.

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::Args;
use polyvox_engine::{CpalDriver, Engine};
use polyvox_units::UnitRegistry;

use super::common::load_config;

#[derive(Args)]
pub struct RunArgs {
    /// Engine configuration (TOML)
    config: PathBuf,

    /// Output device name (overrides the configuration)
    #[arg(long)]
    device: Option<String>,

    /// MIDI note to start on launch (repeat for chords)
    #[arg(short, long = "note")]
    notes: Vec<u8>,

    /// Velocity of launch notes
    #[arg(long, default_value = "100")]
    velocity: u8,
}

pub fn run(args: RunArgs) -> anyhow::Result<()> {
    let mut config = load_config(&args.config)?;
    if args.device.is_some() {
        config.device = args.device;
    }

    let driver = CpalDriver::new(&config)?;
    let mut engine = Engine::from_registry(&UnitRegistry::new(), &config, Box::new(driver))?;

    println!(
        "{}: {} voices, {} Hz, {} frames per period",
        engine.unit_name(),
        engine.polyphony(),
        engine.sample_rate(),
        engine.buffer_size()
    );
    if !config.auto_connect {
        println!("Press Enter to start audio...");
        std::io::stdin().read_line(&mut String::new())?;
    }
    engine.start()?;
    for &note in &args.notes {
        engine.key_on(note, args.velocity);
    }

    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;
    let r = Arc::clone(&running);
    std::thread::spawn(move || {
        // A closed stdin leaves Ctrl+C as the only way out.
        let quit = std::io::stdin()
            .lock()
            .lines()
            .map_while(Result::ok)
            .any(|line| line.trim().eq_ignore_ascii_case("q"));
        if quit {
            r.store(false, Ordering::SeqCst);
        }
    });

    println!("Type q and Enter (or press Ctrl+C) to stop...");
    let mut ticks = 0u32;
    while running.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(100));
        ticks = ticks.wrapping_add(1);
        if ticks.is_multiple_of(10) {
            tracing::debug!(
                cpu_load = engine.cpu_load(),
                voices = engine.pool().sounding_count(),
                "status"
            );
        }
    }

    engine.all_notes_off(true);
    engine.stop();
    println!("Stopped.");
    Ok(())
}
