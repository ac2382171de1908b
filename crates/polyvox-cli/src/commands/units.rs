//! Registered unit listing.

use polyvox_units::UnitRegistry;

pub fn run() -> anyhow::Result<()> {
    let registry = UnitRegistry::new();
    println!("Available Units");
    println!("===============");
    println!();
    for unit in registry.all_units() {
        println!("  {:10}  {}", unit.id, unit.description);
    }
    Ok(())
}
