//! Named unit registry.
//!
//! Stands in for the external DSP compiler: a configuration names a unit by
//! id and the registry hands back a [`UnitFactory`] for it.

use std::sync::Arc;

use polyvox_core::{ConstructionError, DspUnit, UnitFactory};

use crate::{DcUnit, OrganUnit, PluckUnit};

/// Describes a unit in the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitDescriptor {
    /// Unique identifier (lowercase, no spaces).
    pub id: &'static str,
    /// Human-readable name.
    pub name: &'static str,
    /// Brief description.
    pub description: &'static str,
}

/// Constructor for a fresh, uninitialized instance.
pub type UnitConstructor = fn() -> Box<dyn DspUnit>;

/// Factory for one registered unit.
#[derive(Debug, Clone)]
pub struct RegisteredUnit {
    descriptor: UnitDescriptor,
    constructor: UnitConstructor,
}

impl RegisteredUnit {
    /// Registry metadata of the unit.
    pub fn descriptor(&self) -> &UnitDescriptor {
        &self.descriptor
    }
}

impl UnitFactory for RegisteredUnit {
    fn name(&self) -> &str {
        self.descriptor.id
    }

    fn create_instance(&self) -> Result<Box<dyn DspUnit>, ConstructionError> {
        Ok((self.constructor)())
    }
}

/// Registry of available units.
///
/// All built-in units are registered by [`UnitRegistry::new`].
#[derive(Debug, Clone)]
pub struct UnitRegistry {
    entries: Vec<RegisteredUnit>,
}

impl Default for UnitRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl UnitRegistry {
    /// Creates a registry with the built-in units.
    pub fn new() -> Self {
        let mut registry = Self {
            entries: Vec::with_capacity(3),
        };
        registry.register(
            UnitDescriptor {
                id: "dc",
                name: "DC",
                description: "Constant level with linear release",
            },
            || Box::new(DcUnit::new()),
        );
        registry.register(
            UnitDescriptor {
                id: "organ",
                name: "Organ",
                description: "Three-drawbar additive organ with ADSR",
            },
            || Box::new(OrganUnit::new()),
        );
        registry.register(
            UnitDescriptor {
                id: "pluck",
                name: "Pluck",
                description: "Karplus-Strong plucked string",
            },
            || Box::new(PluckUnit::new()),
        );
        registry
    }

    /// Registers a unit, replacing any existing entry with the same id.
    pub fn register(&mut self, descriptor: UnitDescriptor, constructor: UnitConstructor) {
        self.entries.retain(|e| e.descriptor.id != descriptor.id);
        self.entries.push(RegisteredUnit {
            descriptor,
            constructor,
        });
    }

    /// All registered units, in registration order.
    pub fn all_units(&self) -> impl Iterator<Item = &UnitDescriptor> {
        self.entries.iter().map(|e| &e.descriptor)
    }

    /// Factory for the unit with `id`.
    pub fn factory(&self, id: &str) -> Option<Arc<dyn UnitFactory>> {
        self.entries
            .iter()
            .find(|e| e.descriptor.id == id)
            .map(|e| Arc::new(e.clone()) as Arc<dyn UnitFactory>)
    }

    /// Creates an instance of the unit with `id`.
    pub fn create(&self, id: &str) -> Option<Box<dyn DspUnit>> {
        self.entries
            .iter()
            .find(|e| e.descriptor.id == id)
            .map(|e| (e.constructor)())
    }
}
