use crate::value::{PropertyType, Value};

/// Mapping between an object member and a table column.
#[derive(Clone, Debug, PartialEq)]
pub struct Property {
    name: String,
    column: Option<String>,
    ty: PropertyType,
    primary_key: bool,
    auto_increment: bool,
    default_value: Option<Value>,
    default_expression: Option<String>,
    embedded: Option<String>,
}

impl Property {
    pub fn new(name: impl Into<String>, column: impl Into<String>, ty: PropertyType) -> Self {
        Self {
            name: name.into(),
            column: Some(column.into()),
            ty,
            primary_key: false,
            auto_increment: false,
            default_value: None,
            default_expression: None,
            embedded: None,
        }
    }

    /// Property whose members live in the embeddable `reference`.
    pub fn embedded(name: impl Into<String>, reference: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column: None,
            ty: PropertyType::Embedded,
            primary_key: false,
            auto_increment: false,
            default_value: None,
            default_expression: None,
            embedded: Some(reference.into()),
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn with_default_expression(mut self, expression: impl Into<String>) -> Self {
        self.default_expression = Some(expression.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn column(&self) -> Option<&str> {
        self.column.as_deref()
    }

    pub fn property_type(&self) -> &PropertyType {
        &self.ty
    }

    pub fn is_primary_key(&self) -> bool {
        self.primary_key
    }

    pub fn is_auto_increment(&self) -> bool {
        self.auto_increment
    }

    pub fn is_embedded(&self) -> bool {
        self.ty == PropertyType::Embedded
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.default_value.as_ref()
    }

    pub fn default_expression(&self) -> Option<&str> {
        self.default_expression.as_deref()
    }

    pub fn embedded_reference(&self) -> Option<&str> {
        self.embedded.as_deref()
    }
}
