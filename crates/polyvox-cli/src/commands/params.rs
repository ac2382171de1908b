//! Parameter listing.

#![allow(clippy::print_literal)]

use std::path::PathBuf;

use clap::Args;

use super::common::{load_config, offline_engine};

#[derive(Args)]
pub struct ParamsArgs {
    /// Engine configuration (TOML)
    config: PathBuf,

    /// Also print each control's metadata
    #[arg(short, long)]
    verbose: bool,
}

pub fn run(args: ParamsArgs) -> anyhow::Result<()> {
    let config = load_config(&args.config)?;
    let (engine, _) = offline_engine(&config)?;

    println!(
        "{} ({} voices, {:?} precision)",
        engine.unit_name(),
        engine.polyphony(),
        engine.sample_precision()
    );
    println!();
    println!(
        "  {:>3}  {:32}  {:10}  {:>10}  {:>10}  {:>10}",
        "Id", "Path", "Type", "Init", "Min", "Max"
    );
    println!(
        "  {:>3}  {:32}  {:10}  {:>10}  {:>10}  {:>10}",
        "--", "----", "----", "----", "---", "---"
    );
    for desc in engine.table().iter() {
        println!(
            "  {:>3}  {:32}  {:10}  {:>10.3}  {:>10.3}  {:>10.3}",
            desc.id.0,
            desc.path,
            desc.kind.type_name(),
            desc.range.init,
            desc.range.min,
            desc.range.max
        );
        if args.verbose {
            for (key, value) in &desc.meta {
                println!("       {key} = {value}");
            }
        }
    }
    Ok(())
}
