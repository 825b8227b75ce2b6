use super::where_clause;
use crate::{
    context::PersistenceContext,
    errors::{EntityMapError, Result},
    metadata::Registry,
    translator::Statement,
    value::Value,
};

#[derive(Clone, Debug, Default)]
pub struct DeleteQuery {
    table: Option<String>,
    criteria: Vec<String>,
}

impl DeleteQuery {
    pub fn from(mut self, entity: &str) -> Self {
        self.table = Some(format!("{{{entity}}}"));
        self
    }

    pub fn from_table(mut self, table: &str) -> Self {
        self.table = Some(table.to_string());
        self
    }

    pub fn filter(mut self, criteria: &str) -> Self {
        self.criteria.push(criteria.to_string());
        self
    }

    pub fn execute(&self, ctx: &PersistenceContext, params: &[Value]) -> Result<usize> {
        let params: Vec<_> = params.iter().map(Value::to_sql).collect();
        ctx.execute(self, &params)
    }
}

impl Statement for DeleteQuery {
    /// Refuses to render a delete without a predicate.
    fn to_sql(&self, _registry: &Registry) -> Result<String> {
        let table = self
            .table
            .as_deref()
            .ok_or_else(|| EntityMapError::validation("delete requires a table"))?;
        let filter = where_clause(&self.criteria)
            .ok_or_else(|| EntityMapError::validation("delete requires a where clause"))?;
        Ok(format!("DELETE FROM {table} {filter}"))
    }
}
