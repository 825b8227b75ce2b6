//! Creation of blank instances for an entity name.

use ahash::AHashMap;

use crate::{
    errors::{EntityMapError, Result},
    model::{Model, Record},
};

pub trait ProxyProvider {
    fn create(&self, entity: &str) -> Result<Box<dyn Model>>;
}

/// Backs every entity with a `Record`.
#[derive(Clone, Copy, Debug, Default)]
pub struct RecordProvider;

impl ProxyProvider for RecordProvider {
    fn create(&self, entity: &str) -> Result<Box<dyn Model>> {
        Ok(Box::new(Record::new(entity)))
    }
}

type Factory = Box<dyn Fn() -> Box<dyn Model>>;

/// Per-entity constructors for concrete model types.
#[derive(Default)]
pub struct ModelFactory {
    factories: AHashMap<String, Factory>,
    strict: bool,
}

impl ModelFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entities without a registered constructor are an error instead of a `Record`.
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    pub fn register<M, F>(mut self, entity: impl Into<String>, factory: F) -> Self
    where
        M: Model,
        F: Fn() -> M + 'static,
    {
        self.factories
            .insert(entity.into(), Box::new(move || Box::new(factory())));
        self
    }

    pub fn is_registered(&self, entity: &str) -> bool {
        self.factories.contains_key(entity)
    }
}

impl ProxyProvider for ModelFactory {
    fn create(&self, entity: &str) -> Result<Box<dyn Model>> {
        match self.factories.get(entity) {
            Some(factory) => Ok(factory()),
            None if self.strict => Err(EntityMapError::config(format!(
                "no model type registered for '{entity}'"
            ))),
            None => Ok(Box::new(Record::new(entity))),
        }
    }
}
