//! JSON mapping configuration.
//!
//! ```json
//! {
//!   "connection": { "dialect": "sqlite", "dsn": "sqlite::memory:" },
//!   "classes": {
//!     "Project": {
//!       "table": "projects",
//!       "props": {
//!         "ProjectID": { "column": "id", "type": "int", "pk": true, "autoIncrement": true },
//!         "Name": { "column": "name", "type": "varchar" }
//!       },
//!       "associations": [
//!         { "type": "one-to-many", "entity": "Bug", "key": "ProjectID" }
//!       ]
//!     }
//!   }
//! }
//! ```

use std::{collections::BTreeMap, fs, path::Path};

use serde::Deserialize;
use tracing::debug;

use crate::{
    connection::{ConnectionConfig, Dialect},
    errors::{EntityMapError, Result},
    metadata::{AssociationSpec, EmbeddableEntity, Entity, Property, Registry},
    value::{PropertyType, Value},
};

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrmConfig {
    pub connection: ConnectionSection,
    #[serde(default)]
    pub classes: BTreeMap<String, ClassConfig>,
    #[serde(default)]
    pub embeddables: BTreeMap<String, EmbeddableConfig>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionSection {
    pub dialect: String,
    pub dsn: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ClassConfig {
    pub table: String,
    #[serde(default)]
    pub plural: Option<String>,
    #[serde(default)]
    pub sequence_name: Option<String>,
    /// Declaration order is kept: it fixes column order in generated SQL.
    pub props: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub associations: Vec<AssociationConfig>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EmbeddableConfig {
    pub props: serde_json::Map<String, serde_json::Value>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PropConfig {
    #[serde(default)]
    pub column: Option<String>,
    #[serde(rename = "type")]
    pub ty: PropertyType,
    #[serde(default)]
    pub pk: bool,
    #[serde(default)]
    pub auto_increment: bool,
    #[serde(default)]
    pub default: Option<serde_json::Value>,
    #[serde(default)]
    pub default_expr: Option<String>,
    #[serde(default, rename = "ref")]
    pub embedded: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AssociationConfig {
    #[serde(rename = "type")]
    pub kind: String,
    pub entity: String,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub ref_key: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub optional: Option<bool>,
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub table_key_local: Option<String>,
    #[serde(default)]
    pub table_key_foreign: Option<String>,
}

impl AssociationConfig {
    pub fn is_many_to_many(&self) -> bool {
        self.kind == "many-to-many"
    }

    pub fn has_linking_table(&self) -> bool {
        self.table.is_some() && self.table_key_local.is_some() && self.table_key_foreign.is_some()
    }

    pub fn has_any_linking_attribute(&self) -> bool {
        self.table.is_some() || self.table_key_local.is_some() || self.table_key_foreign.is_some()
    }

    pub fn accepts_optional(&self) -> bool {
        matches!(self.kind.as_str(), "many-to-one" | "one-to-one")
    }

    /// Attribute combination allowed for the declared kind.
    pub fn is_well_formed(&self) -> bool {
        if self.optional.is_some() && !self.accepts_optional() {
            return false;
        }
        if self.is_many_to_many() {
            self.has_linking_table() && self.key.is_none() && self.name.is_none()
        } else {
            self.key.is_some() && !self.has_any_linking_attribute()
        }
    }

    fn to_spec(&self, owner: &str) -> Result<AssociationSpec> {
        if !self.is_well_formed() {
            return Err(EntityMapError::validation(format!(
                "association of type '{}' from '{owner}' to '{}' has invalid attributes",
                self.kind, self.entity
            )));
        }
        let optional = self.optional.unwrap_or(false);
        let key = self.key.clone().unwrap_or_default();
        let mut spec = match self.kind.as_str() {
            "many-to-one" => AssociationSpec::many_to_one(&self.entity, key),
            "one-to-one" => AssociationSpec::one_to_one(&self.entity, key),
            "one-to-many" => AssociationSpec::one_to_many(&self.entity, key),
            "many-to-many" => AssociationSpec::many_to_many(
                &self.entity,
                self.table.clone().unwrap_or_default(),
                self.table_key_local.clone().unwrap_or_default(),
                self.table_key_foreign.clone().unwrap_or_default(),
            ),
            other => {
                return Err(EntityMapError::validation(format!(
                    "unknown association type '{other}' on '{owner}'"
                )));
            }
        };
        if optional {
            spec = spec.optional();
        }
        if let Some(ref_key) = &self.ref_key {
            spec = spec.ref_key(ref_key);
        }
        if let Some(name) = &self.name {
            spec = spec.named(name);
        }
        Ok(spec)
    }
}

impl PropConfig {
    pub fn has_conflicting_defaults(&self) -> bool {
        self.default.is_some() && self.default_expr.is_some()
    }

    fn to_property(&self, owner: &str, name: &str) -> Result<Property> {
        if self.has_conflicting_defaults() {
            return Err(EntityMapError::validation(format!(
                "property '{owner}.{name}' declares both a default and a default expression"
            )));
        }
        if self.ty == PropertyType::Embedded {
            let reference = self.embedded.as_deref().ok_or_else(|| {
                EntityMapError::config(format!(
                    "embedded property '{owner}.{name}' requires a ref"
                ))
            })?;
            return Ok(Property::embedded(name, reference));
        }
        let column = self.column.as_deref().ok_or_else(|| {
            EntityMapError::config(format!("property '{owner}.{name}' requires a column"))
        })?;
        let mut property = Property::new(name, column, self.ty.clone());
        if self.pk {
            property = property.primary_key();
        }
        if self.auto_increment {
            property = property.auto_increment();
        }
        if let Some(default) = &self.default {
            property = property.with_default(Value::from_json(default, &self.ty)?);
        }
        if let Some(expression) = &self.default_expr {
            property = property.with_default_expression(expression);
        }
        Ok(property)
    }
}

impl OrmConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        debug!(path = %path.as_ref().display(), "loading mapping configuration");
        Self::from_json(&text)
    }

    pub fn connection_config(&self) -> Result<ConnectionConfig> {
        let dialect: Dialect = self.connection.dialect.parse()?;
        ConnectionConfig::from_dsn(
            dialect,
            self.connection.dsn.clone(),
            self.connection.username.clone(),
            self.connection.password.clone(),
        )
    }

    /// Builds the validated registry; associations are attached once every class
    /// is registered.
    pub fn registry(&self) -> Result<Registry> {
        if self.classes.is_empty() {
            return Err(EntityMapError::config("configuration declares no classes"));
        }
        let mut registry = Registry::new();
        for (name, embeddable) in &self.embeddables {
            let mut entity = EmbeddableEntity::new(name);
            for property in properties(name, &embeddable.props)? {
                entity.add_property(property);
            }
            registry.add_embeddable(entity);
        }
        for (name, class) in &self.classes {
            let mut entity = Entity::new(name, &class.table);
            if let Some(plural) = &class.plural {
                entity = entity.with_plural(plural);
            }
            if let Some(sequence) = &class.sequence_name {
                entity = entity.with_sequence_name(sequence);
            }
            for property in properties(name, &class.props)? {
                entity.add_property(property);
            }
            registry.add_entity(entity);
        }
        for (name, class) in &self.classes {
            for association in &class.associations {
                registry.associate(name, association.to_spec(name)?)?;
            }
        }
        registry.validate()?;
        Ok(registry)
    }

    pub fn build(&self) -> Result<(Registry, ConnectionConfig)> {
        Ok((self.registry()?, self.connection_config()?))
    }
}

fn properties(owner: &str, props: &serde_json::Map<String, serde_json::Value>) -> Result<Vec<Property>> {
    props
        .iter()
        .map(|(name, raw)| {
            let config: PropConfig = serde_json::from_value(raw.clone())?;
            config.to_property(owner, name)
        })
        .collect()
}
