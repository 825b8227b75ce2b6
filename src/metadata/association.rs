/// Relationship kind together with the attributes only that kind carries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AssociationKind {
    ManyToOne {
        optional: bool,
    },
    OneToOne {
        optional: bool,
    },
    OneToMany,
    ManyToMany {
        linking_table: String,
        local_column: String,
        foreign_column: String,
    },
}

impl AssociationKind {
    pub fn label(&self) -> &'static str {
        match self {
            AssociationKind::ManyToOne { .. } => "many-to-one",
            AssociationKind::OneToOne { .. } => "one-to-one",
            AssociationKind::OneToMany => "one-to-many",
            AssociationKind::ManyToMany { .. } => "many-to-many",
        }
    }

    /// Kinds whose key lives on the owning entity.
    pub fn is_to_one(&self) -> bool {
        matches!(
            self,
            AssociationKind::ManyToOne { .. } | AssociationKind::OneToOne { .. }
        )
    }

    pub fn is_optional(&self) -> bool {
        match self {
            AssociationKind::ManyToOne { optional } | AssociationKind::OneToOne { optional } => {
                *optional
            }
            _ => false,
        }
    }
}

/// Declared relationship from `source` to `target`.
///
/// `key` and `ref_key` are property names. For many-to-one and one-to-one the key is
/// the local foreign key and `ref_key` the referenced property on the target; for
/// one-to-many the key is the foreign key on the target and `ref_key` a property of
/// the owner; for many-to-many they are the target and owner properties written to
/// the linking table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Association {
    name: String,
    source: String,
    target: String,
    key: String,
    ref_key: String,
    kind: AssociationKind,
}

impl Association {
    pub(crate) fn resolved(
        name: String,
        source: String,
        target: String,
        key: String,
        ref_key: String,
        kind: AssociationKind,
    ) -> Self {
        Self {
            name,
            source,
            target,
            key,
            ref_key,
            kind,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn ref_key(&self) -> &str {
        &self.ref_key
    }

    pub fn kind(&self) -> &AssociationKind {
        &self.kind
    }

    pub fn is_optional(&self) -> bool {
        self.kind.is_optional()
    }
}

/// Declaration of an association before defaults are filled from the registry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssociationSpec {
    pub(crate) target: String,
    pub(crate) kind: AssociationKind,
    pub(crate) key: Option<String>,
    pub(crate) ref_key: Option<String>,
    pub(crate) name: Option<String>,
}

impl AssociationSpec {
    pub fn many_to_one(target: impl Into<String>, key: impl Into<String>) -> Self {
        Self::keyed(target, AssociationKind::ManyToOne { optional: false }, key)
    }

    pub fn one_to_one(target: impl Into<String>, key: impl Into<String>) -> Self {
        Self::keyed(target, AssociationKind::OneToOne { optional: false }, key)
    }

    pub fn one_to_many(target: impl Into<String>, key: impl Into<String>) -> Self {
        Self::keyed(target, AssociationKind::OneToMany, key)
    }

    pub fn many_to_many(
        target: impl Into<String>,
        linking_table: impl Into<String>,
        local_column: impl Into<String>,
        foreign_column: impl Into<String>,
    ) -> Self {
        Self {
            target: target.into(),
            kind: AssociationKind::ManyToMany {
                linking_table: linking_table.into(),
                local_column: local_column.into(),
                foreign_column: foreign_column.into(),
            },
            key: None,
            ref_key: None,
            name: None,
        }
    }

    fn keyed(target: impl Into<String>, kind: AssociationKind, key: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            kind,
            key: Some(key.into()),
            ref_key: None,
            name: None,
        }
    }

    pub fn optional(mut self) -> Self {
        match &mut self.kind {
            AssociationKind::ManyToOne { optional } | AssociationKind::OneToOne { optional } => {
                *optional = true;
            }
            _ => {}
        }
        self
    }

    pub fn ref_key(mut self, ref_key: impl Into<String>) -> Self {
        self.ref_key = Some(ref_key.into());
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn kind(&self) -> &AssociationKind {
        &self.kind
    }
}
