//! Property-based tests for the parameter table.
//!
//! Generates random nested interfaces and checks id/path addressing and
//! replay stability.

use proptest::prelude::*;
use polyvox_core::{
    ControlKind, ControlSurface, GroupKind, InterfaceWalker, ParamDescriptor, ParamId, ParamRange,
    ParamRef, ParamTable,
};

/// One step of a generated walk.
#[derive(Debug, Clone)]
enum Step {
    Open(String),
    Close,
    Control(String),
}

fn label() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9 ()#]{0,6}"
}

/// Balanced walks: every `Close` matches an earlier `Open`.
fn balanced_walk() -> impl Strategy<Value = Vec<Step>> {
    prop::collection::vec((0u8..3, label()), 1..40).prop_map(|raw| {
        let mut steps = Vec::new();
        let mut depth = 0usize;
        for (kind, text) in raw {
            match kind {
                0 => {
                    depth += 1;
                    steps.push(Step::Open(text));
                }
                1 if depth > 0 => {
                    depth -= 1;
                    steps.push(Step::Close);
                }
                _ => steps.push(Step::Control(text)),
            }
        }
        steps.extend(std::iter::repeat_n(Step::Close, depth));
        steps
    })
}

fn walk(steps: &[Step], w: &mut dyn InterfaceWalker) {
    for step in steps {
        match step {
            Step::Open(label) => w.open_group(GroupKind::Vertical, label),
            Step::Close => w.close_group(),
            Step::Control(label) => {
                w.add_control(label, ControlKind::HorizontalSlider, ParamRange::new(0.0, 0.0, 1.0, 0.1));
            }
        }
    }
}

#[derive(Default)]
struct Counter {
    depth: isize,
    controls: Vec<u32>,
}

impl ControlSurface for Counter {
    fn open_group(&mut self, _kind: GroupKind, _label: &str) {
        self.depth += 1;
    }
    fn close_group(&mut self) {
        self.depth -= 1;
        assert!(self.depth >= 0, "replay closed more groups than it opened");
    }
    fn add_control(&mut self, _label: &str, param: &ParamDescriptor) {
        self.controls.push(param.id.0);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    /// For every id of a successfully built table, looking up its path
    /// returns the same id.
    #[test]
    fn id_path_round_trip(steps in balanced_walk()) {
        // Random labels may collide after normalization; those walks are
        // rejected at construction and say nothing about round trips.
        if let Ok(table) = ParamTable::from_walk(|w| walk(&steps, w)) {
            for i in 0..table.len() {
                let id = ParamId(i as u32);
                let path = table.path_of(id).unwrap().to_string();
                prop_assert_eq!(table.id_of(&path), Ok(id));
                prop_assert_eq!(table.resolve(ParamRef::Path(&path)), Ok(id));
            }
        }
    }

    /// Ids are contiguous, and replay visits them in order with balanced groups.
    #[test]
    fn replay_is_balanced_and_ordered(steps in balanced_walk()) {
        if let Ok(table) = ParamTable::from_walk(|w| walk(&steps, w)) {
            let mut counter = Counter::default();
            table.replay(&mut counter);
            prop_assert_eq!(counter.depth, 0);
            let expected: Vec<u32> = (0..table.len() as u32).collect();
            prop_assert_eq!(counter.controls, expected);
        }
    }

    /// Paths are unique and start with `/`.
    #[test]
    fn paths_are_unique(steps in balanced_walk()) {
        if let Ok(table) = ParamTable::from_walk(|w| walk(&steps, w)) {
            let mut seen = std::collections::HashSet::new();
            for desc in table.iter() {
                prop_assert!(desc.path.starts_with('/'));
                prop_assert!(!desc.path.contains(' '));
                prop_assert!(seen.insert(desc.path.clone()), "duplicate path {}", desc.path);
            }
        }
    }

    /// Clamped values always land inside the declared range.
    #[test]
    fn clamp_stays_in_range(value in -1.0e6f32..1.0e6f32) {
        let table = ParamTable::from_walk(|w| {
            w.add_control("x", ControlKind::NumEntry, ParamRange::new(0.0, -5.0, 5.0, 0.1));
        }).unwrap();
        let desc = table.descriptor(ParamId(0)).unwrap();
        let clamped = desc.clamp(value);
        prop_assert!((-5.0..=5.0).contains(&clamped));
    }
}
