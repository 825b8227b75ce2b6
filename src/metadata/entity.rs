use std::ops::Deref;

use ahash::AHashMap;

use super::{
    access::AccessPlan,
    association::{Association, AssociationKind},
    property::Property,
    registry::Registry,
};
use crate::{
    cache::Snapshot,
    connection::Row,
    errors::{EntityMapError, Result},
    model::{Field, Model, Record},
    value::{Value, from_sql_value, to_sql_value},
};

/// Named group of properties without a table of its own.
#[derive(Clone, Debug)]
pub struct EmbeddableEntity {
    name: String,
    properties: Vec<Property>,
    by_name: AHashMap<String, usize>,
    by_column: AHashMap<String, usize>,
    access: AccessPlan,
}

impl EmbeddableEntity {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: Vec::new(),
            by_name: AHashMap::new(),
            by_column: AHashMap::new(),
            access: AccessPlan::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registers `property`, replacing a previous one with the same name.
    pub fn add_property(&mut self, property: Property) {
        if let Some(&idx) = self.by_name.get(property.name()) {
            if let Some(old) = self.properties[idx].column() {
                self.by_column.remove(old);
            }
            if let Some(column) = property.column() {
                self.by_column.insert(column.to_string(), idx);
            }
            self.properties[idx] = property;
            return;
        }
        let idx = self.properties.len();
        self.by_name.insert(property.name().to_string(), idx);
        if let Some(column) = property.column() {
            self.by_column.insert(column.to_string(), idx);
        }
        self.properties.push(property);
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.by_name.get(name).map(|&idx| &self.properties[idx])
    }

    pub fn property_by_column(&self, column: &str) -> Option<&Property> {
        self.by_column.get(column).map(|&idx| &self.properties[idx])
    }

    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    pub fn embedded_properties(&self) -> impl Iterator<Item = &Property> {
        self.properties.iter().filter(|p| p.is_embedded())
    }

    /// Column-backed properties, including those of embedded groups.
    pub fn column_properties<'r>(&'r self, registry: &'r Registry) -> Result<Vec<&'r Property>> {
        let mut out = Vec::with_capacity(self.properties.len());
        for property in &self.properties {
            match property.embedded_reference() {
                Some(reference) => {
                    out.extend(registry.embeddable(reference)?.column_properties(registry)?)
                }
                None => out.push(property),
            }
        }
        Ok(out)
    }

    pub fn access(&self) -> &AccessPlan {
        &self.access
    }

    pub(crate) fn set_access(&mut self, access: AccessPlan) {
        self.access = access;
    }

    /// Every mapped column of `obj` in declaration order, embedded members flattened.
    pub fn column_values<'r>(
        &'r self,
        registry: &'r Registry,
        obj: &dyn Model,
    ) -> Result<Vec<(&'r Property, Value)>> {
        let mut out = Vec::with_capacity(self.properties.len());
        for property in &self.properties {
            match property.embedded_reference() {
                Some(reference) => {
                    let embeddable = registry.embeddable(reference)?;
                    let record = match self.access.read(obj, property.name()) {
                        Some(Field::Embedded(record)) => record,
                        _ => Record::new(reference),
                    };
                    out.extend(embeddable.column_values(registry, &record)?);
                }
                None => {
                    let value = self
                        .access
                        .read(obj, property.name())
                        .map(Field::into_value)
                        .unwrap_or_default();
                    out.push((property, value));
                }
            }
        }
        Ok(out)
    }

    pub fn extract_values(&self, registry: &Registry, obj: &dyn Model) -> Result<Vec<(String, Value)>> {
        Ok(self
            .column_values(registry, obj)?
            .into_iter()
            .map(|(property, value)| (property.name().to_string(), value))
            .collect())
    }

    pub fn extract_values_to_sql(&self, registry: &Registry, obj: &dyn Model) -> Result<Snapshot> {
        Ok(self
            .column_values(registry, obj)?
            .into_iter()
            .filter_map(|(property, value)| {
                property
                    .column()
                    .map(|column| (column.to_string(), to_sql_value(property.property_type(), &value)))
            })
            .collect())
    }

    /// Writes row values into `obj`. Columns this entity does not own are offered to
    /// its embedded properties, each backed by a fresh `Record`.
    pub fn populate(&self, registry: &Registry, obj: &mut dyn Model, row: &Row) -> Result<()> {
        let mut unknown = Row::default();
        for (column, raw) in row.iter() {
            match self.property_by_column(column) {
                Some(property) => {
                    let value = from_sql_value(property.property_type(), raw.clone())?;
                    self.access
                        .write(obj, property.name(), Field::Value(value))?;
                }
                None => unknown.push(column, raw.clone()),
            }
        }
        for property in self.embedded_properties() {
            let Some(reference) = property.embedded_reference() else {
                continue;
            };
            let embeddable = registry.embeddable(reference)?;
            let mut record = Record::new(reference);
            embeddable.populate(registry, &mut record, &unknown)?;
            self.access
                .write(obj, property.name(), Field::Embedded(record))?;
        }
        Ok(())
    }

    /// Column of a property declared here or inside one of the embedded groups.
    pub fn column_for<'r>(&'r self, registry: &'r Registry, name: &str) -> Option<&'r str> {
        if let Some(property) = self.property(name) {
            if let Some(column) = property.column() {
                return Some(column);
            }
        }
        self.embedded_properties()
            .filter_map(|p| p.embedded_reference())
            .filter_map(|reference| registry.embeddable(reference).ok())
            .find_map(|embeddable| embeddable.column_for(registry, name))
    }
}

/// Mapped type backed by a table.
#[derive(Clone, Debug)]
pub struct Entity {
    base: EmbeddableEntity,
    table: String,
    plural: Option<String>,
    sequence_name: Option<String>,
    associations: Vec<Association>,
    association_index: AHashMap<String, usize>,
    primary_keys: Vec<String>,
}

impl Entity {
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            base: EmbeddableEntity::new(name),
            table: table.into(),
            plural: None,
            sequence_name: None,
            associations: Vec::new(),
            association_index: AHashMap::new(),
            primary_keys: Vec::new(),
        }
    }

    pub fn with_plural(mut self, plural: impl Into<String>) -> Self {
        self.plural = Some(plural.into());
        self
    }

    pub fn with_sequence_name(mut self, sequence: impl Into<String>) -> Self {
        self.sequence_name = Some(sequence.into());
        self
    }

    pub fn with_property(mut self, property: Property) -> Self {
        self.add_property(property);
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn plural(&self) -> String {
        self.plural
            .clone()
            .unwrap_or_else(|| format!("{}s", self.base.name()))
    }

    pub fn sequence_name(&self) -> Option<&str> {
        self.sequence_name.as_deref()
    }

    pub fn add_property(&mut self, property: Property) {
        if property.is_primary_key() && !self.primary_keys.iter().any(|k| k == property.name()) {
            self.primary_keys.push(property.name().to_string());
        }
        self.base.add_property(property);
    }

    pub fn primary_keys(&self) -> &[String] {
        &self.primary_keys
    }

    pub fn primary_key_properties(&self) -> impl Iterator<Item = &Property> {
        self.primary_keys
            .iter()
            .filter_map(|name| self.base.property(name))
    }

    pub fn main_primary_key(&self) -> Result<&str> {
        self.primary_keys
            .first()
            .map(String::as_str)
            .ok_or_else(|| {
                EntityMapError::precondition(format!(
                    "entity '{}' has no primary key",
                    self.name()
                ))
            })
    }

    pub fn add_association(&mut self, association: Association) {
        match self.association_index.get(association.name()) {
            Some(&idx) => self.associations[idx] = association,
            None => {
                self.association_index
                    .insert(association.name().to_string(), self.associations.len());
                self.associations.push(association);
            }
        }
    }

    pub fn association(&self, name: &str) -> Option<&Association> {
        self.association_index
            .get(name)
            .map(|&idx| &self.associations[idx])
    }

    pub fn associations(&self) -> &[Association] {
        &self.associations
    }

    pub fn many_to_one(&self) -> impl Iterator<Item = &Association> {
        self.associations
            .iter()
            .filter(|a| matches!(a.kind(), AssociationKind::ManyToOne { .. }))
    }

    pub fn one_to_one(&self) -> impl Iterator<Item = &Association> {
        self.associations
            .iter()
            .filter(|a| matches!(a.kind(), AssociationKind::OneToOne { .. }))
    }

    pub fn one_to_many(&self) -> impl Iterator<Item = &Association> {
        self.associations
            .iter()
            .filter(|a| matches!(a.kind(), AssociationKind::OneToMany))
    }

    pub fn many_to_many(&self) -> impl Iterator<Item = &Association> {
        self.associations
            .iter()
            .filter(|a| matches!(a.kind(), AssociationKind::ManyToMany { .. }))
    }

    pub fn extract_primary_key_values(&self, obj: &dyn Model) -> Vec<Value> {
        self.primary_keys
            .iter()
            .map(|name| {
                self.base
                    .access()
                    .read(obj, name)
                    .map(Field::into_value)
                    .unwrap_or_default()
            })
            .collect()
    }

    pub fn primary_key_values_from_row(&self, row: &Row) -> Result<Vec<Value>> {
        self.primary_key_properties()
            .map(|property| {
                let column = property.column().unwrap_or(property.name());
                let raw = row.get(column).cloned().ok_or_else(|| {
                    EntityMapError::config(format!(
                        "row for '{}' lacks primary key column '{column}'",
                        self.name()
                    ))
                })?;
                from_sql_value(property.property_type(), raw)
            })
            .collect()
    }

    /// Reads a scalar member through the resolved access path.
    pub fn read_value(&self, obj: &dyn Model, name: &str) -> Value {
        self.base
            .access()
            .read(obj, name)
            .map(Field::into_value)
            .unwrap_or_default()
    }

    pub fn write_value(&self, obj: &mut dyn Model, name: &str, value: Value) -> Result<()> {
        self.base.access().write(obj, name, Field::Value(value))
    }

    pub fn read_slot(&self, obj: &dyn Model, name: &str) -> Option<Field> {
        self.base.access().read(obj, name)
    }

    pub fn write_slot(&self, obj: &mut dyn Model, name: &str, value: Field) -> Result<()> {
        self.base.access().write(obj, name, value)
    }

    pub(crate) fn resolve_access(&mut self, prototype: &dyn Model) {
        let members: Vec<String> = self
            .base
            .properties()
            .iter()
            .map(|p| p.name().to_string())
            .chain(self.associations.iter().map(|a| a.name().to_string()))
            .collect();
        let plan = AccessPlan::resolve(prototype, members.iter().map(String::as_str));
        self.base.set_access(plan);
    }
}

impl Deref for Entity {
    type Target = EmbeddableEntity;

    fn deref(&self) -> &EmbeddableEntity {
        &self.base
    }
}
