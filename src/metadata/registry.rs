use std::collections::BTreeMap;

use tracing::debug;

use super::{
    association::{Association, AssociationKind, AssociationSpec},
    entity::{EmbeddableEntity, Entity},
};
use crate::{
    errors::{EntityMapError, Result},
    proxy::ProxyProvider,
};

/// Every mapped entity and embeddable, keyed by name.
#[derive(Clone, Debug, Default)]
pub struct Registry {
    entities: BTreeMap<String, Entity>,
    embeddables: BTreeMap<String, EmbeddableEntity>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_entity(&mut self, entity: Entity) {
        self.entities.insert(entity.name().to_string(), entity);
    }

    pub fn add_embeddable(&mut self, embeddable: EmbeddableEntity) {
        self.embeddables
            .insert(embeddable.name().to_string(), embeddable);
    }

    pub fn entity(&self, name: &str) -> Result<&Entity> {
        self.entities
            .get(name)
            .ok_or_else(|| EntityMapError::config(format!("entity '{name}' is not mapped")))
    }

    pub fn entity_exists(&self, name: &str) -> bool {
        self.entities.contains_key(name)
    }

    pub fn embeddable(&self, name: &str) -> Result<&EmbeddableEntity> {
        self.embeddables.get(name).ok_or_else(|| {
            EntityMapError::config(format!("embeddable '{name}' is not mapped"))
        })
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn embeddables(&self) -> impl Iterator<Item = &EmbeddableEntity> {
        self.embeddables.values()
    }

    /// Resolves `spec` against the registered target and attaches it to `source`.
    ///
    /// Both entities must already be registered; keys default to the main primary
    /// keys of the relevant side and the name to the target name or plural.
    pub fn associate(&mut self, source: &str, spec: AssociationSpec) -> Result<()> {
        let owner = self.entity(source)?;
        let target = self.entities.get(&spec.target).ok_or_else(|| {
            EntityMapError::config(format!(
                "association '{}' on '{source}' targets unmapped entity '{}'",
                spec.name.as_deref().unwrap_or(&spec.target),
                spec.target
            ))
        })?;
        let (name, key, ref_key) = match &spec.kind {
            AssociationKind::ManyToOne { .. } | AssociationKind::OneToOne { .. } => (
                spec.name.clone().unwrap_or_else(|| target.name().to_string()),
                required_key(&spec, source)?,
                match &spec.ref_key {
                    Some(r) => r.clone(),
                    None => target.main_primary_key()?.to_string(),
                },
            ),
            AssociationKind::OneToMany => (
                spec.name.clone().unwrap_or_else(|| target.plural()),
                required_key(&spec, source)?,
                match &spec.ref_key {
                    Some(r) => r.clone(),
                    None => owner.main_primary_key()?.to_string(),
                },
            ),
            AssociationKind::ManyToMany { .. } => (
                spec.name.clone().unwrap_or_else(|| target.plural()),
                match &spec.key {
                    Some(k) => k.clone(),
                    None => target.main_primary_key()?.to_string(),
                },
                match &spec.ref_key {
                    Some(r) => r.clone(),
                    None => owner.main_primary_key()?.to_string(),
                },
            ),
        };
        let association = Association::resolved(
            name,
            source.to_string(),
            spec.target.clone(),
            key,
            ref_key,
            spec.kind.clone(),
        );
        debug!(
            source,
            target = association.target(),
            name = association.name(),
            kind = association.kind().label(),
            "registered association"
        );
        if let Some(owner) = self.entities.get_mut(source) {
            owner.add_association(association);
        }
        Ok(())
    }

    /// Checks every cross reference: embedded references, association targets and
    /// the key properties each association names.
    pub fn validate(&self) -> Result<()> {
        for entity in self.entities.values() {
            self.validate_embedded(entity)?;
            for association in entity.associations() {
                let target = self.entity(association.target())?;
                let (key_owner, ref_owner) = match association.kind() {
                    AssociationKind::ManyToOne { .. } | AssociationKind::OneToOne { .. } => {
                        (entity, target)
                    }
                    AssociationKind::OneToMany => (target, entity),
                    AssociationKind::ManyToMany { .. } => (target, entity),
                };
                require_property(key_owner, association.key(), association)?;
                require_property(ref_owner, association.ref_key(), association)?;
            }
        }
        for embeddable in self.embeddables.values() {
            self.validate_embedded(embeddable)?;
        }
        Ok(())
    }

    fn validate_embedded(&self, owner: &EmbeddableEntity) -> Result<()> {
        for property in owner.embedded_properties() {
            let reference = property.embedded_reference().ok_or_else(|| {
                EntityMapError::config(format!(
                    "embedded property '{}.{}' has no reference",
                    owner.name(),
                    property.name()
                ))
            })?;
            self.embeddable(reference)?;
        }
        Ok(())
    }

    /// Fixes the access path of every entity member from a prototype instance.
    pub(crate) fn resolve_access(&mut self, provider: &dyn ProxyProvider) -> Result<()> {
        for entity in self.entities.values_mut() {
            let prototype = provider.create(entity.name())?;
            entity.resolve_access(prototype.as_ref());
        }
        Ok(())
    }
}

fn required_key(spec: &AssociationSpec, source: &str) -> Result<String> {
    spec.key.clone().ok_or_else(|| {
        EntityMapError::validation(format!(
            "{} association from '{source}' to '{}' requires a key",
            spec.kind.label(),
            spec.target
        ))
    })
}

fn require_property(owner: &Entity, name: &str, association: &Association) -> Result<()> {
    if owner.property(name).is_some() {
        return Ok(());
    }
    Err(EntityMapError::config(format!(
        "association '{}' on '{}' references missing property '{}.{name}'",
        association.name(),
        association.source(),
        owner.name()
    )))
}
