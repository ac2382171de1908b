//! Offline rendering to WAV.

use std::path::PathBuf;

use clap::Args;

use super::common::{load_config, offline_engine};

#[derive(Args)]
pub struct BounceArgs {
    /// Engine configuration (TOML)
    config: PathBuf,

    /// Output WAV file
    #[arg(short, long)]
    output: PathBuf,

    /// MIDI note to hold (repeat for chords)
    #[arg(short, long = "note", default_values_t = [60u8])]
    notes: Vec<u8>,

    /// Note velocity
    #[arg(long, default_value = "100")]
    velocity: u8,

    /// How long the notes are held, in seconds
    #[arg(short, long, default_value = "1.0")]
    seconds: f32,

    /// Render time after release, in seconds
    #[arg(long, default_value = "1.0")]
    tail: f32,

    /// Parameter overrides (e.g., "/organ/volume=0.8")
    #[arg(long, value_parser = parse_key_val, number_of_values = 1)]
    param: Vec<(String, f32)>,
}

fn parse_key_val(s: &str) -> Result<(String, f32), String> {
    let (path, value) = s
        .split_once('=')
        .ok_or_else(|| format!("Invalid parameter format: '{s}' (expected path=value)"))?;
    let value = value
        .trim()
        .parse::<f32>()
        .map_err(|e| format!("Invalid value in '{s}': {e}"))?;
    Ok((path.trim().to_string(), value))
}

fn periods(seconds: f32, sample_rate: u32, period: usize) -> usize {
    let frames = (f64::from(seconds.max(0.0)) * f64::from(sample_rate)).ceil() as usize;
    frames.div_ceil(period.max(1))
}

pub fn run(args: BounceArgs) -> anyhow::Result<()> {
    let config = load_config(&args.config)?;
    let (mut engine, handle) = offline_engine(&config)?;
    for (path, value) in &args.param {
        engine.set_param_value(path.as_str(), *value)?;
    }
    engine.start()?;

    let spec = hound::WavSpec {
        channels: config.channels,
        sample_rate: config.sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(&args.output, spec)?;
    let mut write_periods = |count: usize| -> anyhow::Result<()> {
        for _ in 0..count {
            let period = handle.render_period();
            let frames = period.first().map_or(0, Vec::len);
            for f in 0..frames {
                for channel in &period {
                    writer.write_sample(channel[f])?;
                }
            }
        }
        Ok(())
    };

    for &note in &args.notes {
        engine.key_on(note, args.velocity);
    }
    write_periods(periods(args.seconds, config.sample_rate, handle.buffer_size()))?;

    for &note in &args.notes {
        if let Err(e) = engine.key_off(note) {
            tracing::debug!(note, error = %e, "note already gone");
        }
    }
    write_periods(periods(args.tail, config.sample_rate, handle.buffer_size()))?;
    writer.finalize()?;
    engine.stop();

    println!(
        "Bounced {} note(s) of '{}' to {} ({:.2}s held, {:.2}s tail)",
        args.notes.len(),
        engine.unit_name(),
        args.output.display(),
        args.seconds,
        args.tail
    );
    Ok(())
}
