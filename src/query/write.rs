use super::where_clause;
use crate::{
    context::PersistenceContext,
    errors::{EntityMapError, Result},
    metadata::Registry,
    translator::{ColumnStyle, Statement},
    value::{PropertyType, SqlValue, Value, to_sql_value},
};

#[derive(Clone, Debug, PartialEq)]
pub enum Assignment {
    Bound(SqlValue),
    /// Literal SQL written into the statement.
    Expression(String),
}

/// Ordered field assignments shared by inserts and updates.
#[derive(Clone, Debug, Default)]
pub struct WriteFields {
    entries: Vec<(String, Assignment)>,
}

impl WriteFields {
    /// Assigns `value` coerced for `ty`; a repeated field keeps its first position.
    pub fn set(&mut self, field: &str, value: &Value, ty: &PropertyType) {
        self.assign(field, Assignment::Bound(to_sql_value(ty, value)));
    }

    pub fn set_expression(&mut self, field: &str, expression: &str) {
        self.assign(field, Assignment::Expression(expression.to_string()));
    }

    fn assign(&mut self, field: &str, assignment: Assignment) {
        match self.entries.iter_mut().find(|(f, _)| f == field) {
            Some((_, slot)) => *slot = assignment,
            None => self.entries.push((field.to_string(), assignment)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Assignment)> {
        self.entries.iter().map(|(f, a)| (f.as_str(), a))
    }

    /// Bound values in field order followed by `extra`.
    pub fn parameters(&self, extra: &[Value]) -> Vec<SqlValue> {
        self.entries
            .iter()
            .filter_map(|(_, a)| match a {
                Assignment::Bound(v) => Some(v.clone()),
                Assignment::Expression(_) => None,
            })
            .chain(extra.iter().map(Value::to_sql))
            .collect()
    }

    fn placeholder(assignment: &Assignment) -> &str {
        match assignment {
            Assignment::Bound(_) => "?",
            Assignment::Expression(expr) => expr,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct InsertQuery {
    table: Option<String>,
    fields: WriteFields,
}

impl InsertQuery {
    pub fn into_entity(mut self, entity: &str) -> Self {
        self.table = Some(format!("{{{entity}}}"));
        self
    }

    /// Raw table name, used for linking tables.
    pub fn into_table(mut self, table: &str) -> Self {
        self.table = Some(table.to_string());
        self
    }

    pub fn set(mut self, field: &str, value: impl Into<Value>, ty: &PropertyType) -> Self {
        self.fields.set(field, &value.into(), ty);
        self
    }

    pub fn set_expression(mut self, field: &str, expression: &str) -> Self {
        self.fields.set_expression(field, expression);
        self
    }

    pub fn fields(&self) -> &WriteFields {
        &self.fields
    }

    pub fn execute(&self, ctx: &PersistenceContext, extra: &[Value]) -> Result<usize> {
        ctx.execute(self, &self.fields.parameters(extra))
    }
}

impl Statement for InsertQuery {
    fn to_sql(&self, _registry: &Registry) -> Result<String> {
        let table = self
            .table
            .as_deref()
            .ok_or_else(|| EntityMapError::validation("insert requires a table"))?;
        if self.fields.is_empty() {
            return Err(EntityMapError::validation("insert requires at least one field"));
        }
        let columns: Vec<&str> = self.fields.iter().map(|(f, _)| f).collect();
        let values: Vec<&str> = self
            .fields
            .iter()
            .map(|(_, a)| WriteFields::placeholder(a))
            .collect();
        Ok(format!(
            "INSERT INTO {table} ({}) VALUES ({})",
            columns.join(", "),
            values.join(", ")
        ))
    }

    fn column_style(&self) -> ColumnStyle {
        ColumnStyle::Bare
    }
}

#[derive(Clone, Debug, Default)]
pub struct UpdateQuery {
    table: Option<String>,
    criteria: Vec<String>,
    fields: WriteFields,
}

impl UpdateQuery {
    pub fn entity(entity: &str) -> Self {
        Self {
            table: Some(format!("{{{entity}}}")),
            ..Self::default()
        }
    }

    pub fn table(table: &str) -> Self {
        Self {
            table: Some(table.to_string()),
            ..Self::default()
        }
    }

    pub fn set(mut self, field: &str, value: impl Into<Value>, ty: &PropertyType) -> Self {
        self.fields.set(field, &value.into(), ty);
        self
    }

    pub fn set_expression(mut self, field: &str, expression: &str) -> Self {
        self.fields.set_expression(field, expression);
        self
    }

    pub fn filter(mut self, criteria: &str) -> Self {
        self.criteria.push(criteria.to_string());
        self
    }

    pub fn fields(&self) -> &WriteFields {
        &self.fields
    }

    /// Runs the update; `extra` binds the WHERE placeholders after the field values.
    pub fn execute(&self, ctx: &PersistenceContext, extra: &[Value]) -> Result<usize> {
        ctx.execute(self, &self.fields.parameters(extra))
    }
}

impl Statement for UpdateQuery {
    fn to_sql(&self, _registry: &Registry) -> Result<String> {
        let table = self
            .table
            .as_deref()
            .ok_or_else(|| EntityMapError::validation("update requires a table"))?;
        if self.fields.is_empty() {
            return Err(EntityMapError::validation("update requires at least one field"));
        }
        let filter = where_clause(&self.criteria)
            .ok_or_else(|| EntityMapError::validation("update requires a where clause"))?;
        let assignments: Vec<String> = self
            .fields
            .iter()
            .map(|(f, a)| format!("{f} = {}", WriteFields::placeholder(a)))
            .collect();
        Ok(format!("UPDATE {table} SET {} {filter}", assignments.join(", ")))
    }

    fn column_style(&self) -> ColumnStyle {
        ColumnStyle::Bare
    }
}
