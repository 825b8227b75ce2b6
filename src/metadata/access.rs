use ahash::AHashMap;

use crate::{
    errors::{EntityMapError, Result},
    model::{Field, Model},
};

/// How one member of a mapped type is read and written.
pub trait PropertyAccess {
    fn read(&self, obj: &dyn Model, name: &str) -> Option<Field>;
    fn write(&self, obj: &mut dyn Model, name: &str, value: Field) -> bool;
}

/// Plain member slots.
pub struct DirectFieldAccess;

/// The type's own accessor methods.
pub struct AccessorMethodAccess;

impl PropertyAccess for DirectFieldAccess {
    fn read(&self, obj: &dyn Model, name: &str) -> Option<Field> {
        obj.field(name)
    }

    fn write(&self, obj: &mut dyn Model, name: &str, value: Field) -> bool {
        obj.set_field(name, value)
    }
}

impl PropertyAccess for AccessorMethodAccess {
    fn read(&self, obj: &dyn Model, name: &str) -> Option<Field> {
        obj.get(name)
    }

    fn write(&self, obj: &mut dyn Model, name: &str, value: Field) -> bool {
        obj.set(name, value)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AccessMode {
    #[default]
    DirectField,
    AccessorMethod,
}

impl AccessMode {
    pub fn strategy(self) -> &'static dyn PropertyAccess {
        match self {
            AccessMode::DirectField => &DirectFieldAccess,
            AccessMode::AccessorMethod => &AccessorMethodAccess,
        }
    }
}

/// Access mode per member name, resolved once from a prototype instance.
#[derive(Clone, Debug, Default)]
pub struct AccessPlan {
    modes: AHashMap<String, AccessMode>,
}

impl AccessPlan {
    pub fn resolve<'a>(prototype: &dyn Model, members: impl IntoIterator<Item = &'a str>) -> Self {
        let modes = members
            .into_iter()
            .map(|name| {
                let mode = if prototype.has_accessor(name) {
                    AccessMode::AccessorMethod
                } else {
                    AccessMode::DirectField
                };
                (name.to_string(), mode)
            })
            .collect();
        Self { modes }
    }

    pub fn mode(&self, name: &str) -> AccessMode {
        self.modes.get(name).copied().unwrap_or_default()
    }

    pub fn read(&self, obj: &dyn Model, name: &str) -> Option<Field> {
        self.mode(name).strategy().read(obj, name)
    }

    pub fn write(&self, obj: &mut dyn Model, name: &str, value: Field) -> Result<()> {
        if self.mode(name).strategy().write(obj, name, value) {
            Ok(())
        } else {
            Err(EntityMapError::config(format!(
                "mapped type has no member '{name}'"
            )))
        }
    }
}
