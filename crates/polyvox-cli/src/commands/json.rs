//! JSON interface dump.

use std::path::PathBuf;

use clap::Args;

use super::common::{load_config, offline_engine};

#[derive(Args)]
pub struct JsonArgs {
    /// Engine configuration (TOML)
    config: PathBuf,

    /// Print only the unit metadata
    #[arg(long)]
    meta: bool,
}

pub fn run(args: JsonArgs) -> anyhow::Result<()> {
    let config = load_config(&args.config)?;
    let (engine, _) = offline_engine(&config)?;
    if args.meta {
        println!("{}", engine.json_meta());
    } else {
        println!("{}", engine.json_ui());
    }
    Ok(())
}
