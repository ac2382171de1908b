//! Integration tests for polyvox-units.
//!
//! Every registered unit must declare a valid interface and render finite
//! audio at its initial control values, gated and released.

use polyvox_core::{NoteRole, ParamId, ParamTable, SamplePrecision, UnitMetadata};
use polyvox_units::UnitRegistry;

const SR: u32 = 48000;

#[test]
fn every_unit_declares_a_valid_table() {
    let registry = UnitRegistry::new();
    for desc in registry.all_units() {
        let unit = registry.create(desc.id).unwrap();
        let table = ParamTable::build(unit.as_ref())
            .unwrap_or_else(|e| panic!("{}: {e}", desc.id));
        assert!(!table.is_empty(), "{} declares no controls", desc.id);

        let gate = table.iter().find(|d| table.note_role(d.id) == Some(NoteRole::Gate));
        assert!(gate.is_some(), "{} has no gate control", desc.id);
    }
}

#[test]
fn every_unit_renders_finite_audio() {
    let registry = UnitRegistry::new();
    for desc in registry.all_units() {
        let mut unit = registry.create(desc.id).unwrap();
        let table = ParamTable::build(unit.as_ref()).unwrap();
        unit.init(SR);
        for d in table.iter().filter(|d| !d.is_output()) {
            unit.set_param(d.id, d.range.init);
        }
        let gate = table
            .iter()
            .find(|d| table.note_role(d.id) == Some(NoteRole::Gate))
            .map(|d| d.id)
            .unwrap_or(ParamId(0));

        let channels = unit.num_outputs();
        let mut buffers = vec![vec![0.0f32; 256]; channels];
        for block in 0..64 {
            unit.set_param(gate, if block < 32 { 1.0 } else { 0.0 });
            let mut outs: Vec<&mut [f32]> = buffers.iter_mut().map(|b| b.as_mut_slice()).collect();
            unit.compute(256, &[], &mut outs);
            for b in &buffers {
                assert!(b.iter().all(|s| s.is_finite()), "{} block {block}", desc.id);
            }
        }
    }
}

#[test]
fn metadata_voices_and_precision() {
    let registry = UnitRegistry::new();

    let organ = registry.create("organ").unwrap();
    let meta = UnitMetadata::collect(organ.as_ref());
    assert_eq!(meta.nvoices(), Some(8));
    assert_eq!(meta.precision(), SamplePrecision::Single);

    let pluck = registry.create("pluck").unwrap();
    assert_eq!(
        UnitMetadata::collect(pluck.as_ref()).precision(),
        SamplePrecision::Double
    );

    let dc = registry.create("dc").unwrap();
    assert_eq!(UnitMetadata::collect(dc.as_ref()).nvoices(), None);
}
