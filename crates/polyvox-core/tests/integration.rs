//! Integration tests for polyvox-core.
//!
//! Drives table construction through the `DspUnit` boundary with scripted
//! units, the same way the engine does.

use polyvox_core::{
    ConstructionError, ControlKind, DspUnit, GroupKind, InterfaceWalker, LookupError, Meta,
    ParamId, ParamRange, ParamRef, ParamTable, SamplePrecision, UnitMetadata,
};

/// A unit whose interface walk is a plain function.
struct ScriptedUnit {
    script: fn(&mut dyn InterfaceWalker),
    options: &'static str,
}

impl DspUnit for ScriptedUnit {
    fn num_inputs(&self) -> usize {
        0
    }
    fn num_outputs(&self) -> usize {
        1
    }
    fn init(&mut self, _sample_rate: u32) {}
    fn instance_clear(&mut self) {}
    fn declare_interface(&self, walker: &mut dyn InterfaceWalker) {
        (self.script)(walker);
    }
    fn declare_metadata(&self, meta: &mut dyn Meta) {
        meta.declare("name", "scripted");
        meta.declare("compile_options", self.options);
    }
    fn set_param(&mut self, _id: ParamId, _value: f32) {}
    fn param(&self, _id: ParamId) -> f32 {
        0.0
    }
    fn compute(&mut self, frames: usize, _inputs: &[&[f32]], outputs: &mut [&mut [f32]]) {
        for out in outputs.iter_mut() {
            out[..frames].fill(0.0);
        }
    }
}

fn instrument(w: &mut dyn InterfaceWalker) {
    w.open_group(GroupKind::Vertical, "inst");
    w.add_control("freq", ControlKind::NumEntry, ParamRange::new(440.0, 20.0, 2000.0, 1.0));
    w.add_control("gain", ControlKind::HorizontalSlider, ParamRange::new(0.5, 0.0, 1.0, 0.01));
    w.add_control("cutoff", ControlKind::HorizontalSlider, ParamRange::new(0.3, 0.0, 1.0, 0.01));
    w.add_control("gate", ControlKind::Button, ParamRange::toggle());
    w.add_control("level", ControlKind::VerticalBargraph, ParamRange::meter(0.0, 1.0));
    w.close_group();
}

fn unbalanced(w: &mut dyn InterfaceWalker) {
    w.open_group(GroupKind::Vertical, "inst");
    w.add_control("freq", ControlKind::NumEntry, ParamRange::new(440.0, 20.0, 2000.0, 1.0));
    w.close_group();
    w.close_group();
    w.add_control("late", ControlKind::NumEntry, ParamRange::new(0.0, 0.0, 1.0, 1.0));
}

#[test]
fn builds_from_unit_interface() {
    let unit = ScriptedUnit {
        script: instrument,
        options: "-lang cpp",
    };
    let table = ParamTable::build(&unit).unwrap();

    assert_eq!(table.len(), 5);
    assert_eq!(table.id_of("/inst/cutoff"), Ok(ParamId(2)));
    assert!(table.descriptor(ParamId(4)).unwrap().is_output());
    assert_eq!(
        table.get(ParamRef::from("/inst/freq")).unwrap().range.init,
        440.0
    );
}

#[test]
fn build_is_deterministic() {
    let unit = ScriptedUnit {
        script: instrument,
        options: "",
    };
    let a = ParamTable::build(&unit).unwrap();
    let b = ParamTable::build(&unit).unwrap();
    assert_eq!(a, b);
}

#[test]
fn unmatched_close_yields_no_table() {
    let unit = ScriptedUnit {
        script: unbalanced,
        options: "",
    };
    let err = ParamTable::build(&unit).unwrap_err();
    assert_eq!(err, ConstructionError::UnbalancedClose { controls: 1 });
}

#[test]
fn out_of_range_id_is_an_error() {
    let unit = ScriptedUnit {
        script: instrument,
        options: "",
    };
    let table = ParamTable::build(&unit).unwrap();
    assert_eq!(
        table.descriptor(ParamId(5)).unwrap_err(),
        LookupError::UnknownId(5)
    );
}

#[test]
fn precision_follows_compile_options() {
    let single = ScriptedUnit {
        script: instrument,
        options: "-lang cpp -ftz 0",
    };
    let double = ScriptedUnit {
        script: instrument,
        options: "-lang cpp -double",
    };
    assert_eq!(
        UnitMetadata::collect(&single).precision(),
        SamplePrecision::Single
    );
    assert_eq!(
        UnitMetadata::collect(&double).precision(),
        SamplePrecision::Double
    );
    assert_eq!(UnitMetadata::collect(&double).get("name"), Some("scripted"));
}
