use super::where_clause;
use crate::{
    context::PersistenceContext,
    errors::{EntityMapError, Result},
    metadata::{AssociationKind, Registry},
    model::Object,
    translator::Statement,
    value::{SqlValue, Value},
};

/// Separator between a joined alias and a column in eagerly fetched fields.
pub(crate) const EAGER_SEPARATOR: &str = "__";

#[derive(Clone, Debug)]
enum Join {
    Raw(String),
    Association { name: String, alias: String },
}

#[derive(Clone, Debug, Default)]
pub struct SelectQuery {
    from: Option<String>,
    criteria: Vec<String>,
    params: Vec<SqlValue>,
    fields: Vec<String>,
    joins: Vec<Join>,
    orders: Vec<String>,
    groups: Vec<String>,
    having: Vec<String>,
    limit: Option<u64>,
    offset: Option<u64>,
}

impl SelectQuery {
    /// Selects from `entity`, written `Entity` or `Entity alias`.
    pub fn from(mut self, entity: &str) -> Self {
        self.from = Some(entity.trim().to_string());
        self
    }

    pub fn filter(mut self, criteria: &str) -> Self {
        self.criteria.push(criteria.to_string());
        self
    }

    pub fn filter_with<I, V>(mut self, criteria: &str, params: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.criteria.push(criteria.to_string());
        self.params
            .extend(params.into_iter().map(|p| p.into().to_sql()));
        self
    }

    pub fn bind(mut self, param: impl Into<Value>) -> Self {
        self.params.push(param.into().to_sql());
        self
    }

    pub fn append_property(self, property: &str, alias: Option<&str>) -> Self {
        self.append_field(&format!("{{{property}}}"), alias)
    }

    /// Raw select expression.
    pub fn append_field(mut self, field: &str, alias: Option<&str>) -> Self {
        self.fields.push(match alias {
            Some(alias) => format!("{field} AS {alias}"),
            None => field.to_string(),
        });
        self
    }

    /// Joins an association of the from entity, written `Association` or
    /// `Association alias`. To-one targets are hydrated from the same row.
    pub fn with(mut self, association: &str) -> Self {
        let mut parts = association.split_whitespace();
        let name = parts.next().unwrap_or_default().to_string();
        let alias = parts.next().map(str::to_string).unwrap_or_else(|| name.clone());
        self.joins.push(Join::Association { name, alias });
        self
    }

    pub fn left_join(self, foreign: &str, entity_key: &str, foreign_key: &str) -> Self {
        self.raw_join(format!(
            "LEFT JOIN {{{foreign}}} ON {{{entity_key}}} = {{{foreign_key}}}"
        ))
    }

    pub fn left_join_with_expression(self, foreign: &str, expression: &str) -> Self {
        self.raw_join(format!("LEFT JOIN {{{foreign}}} ON {expression}"))
    }

    pub fn inner_join(self, foreign: &str, entity_key: &str, foreign_key: &str) -> Self {
        self.raw_join(format!(
            "INNER JOIN {{{foreign}}} ON {{{entity_key}}} = {{{foreign_key}}}"
        ))
    }

    /// Inner join on a raw table, typically a linking table.
    pub fn inner_join_with_table(self, table: &str, table_key: &str, entity_key: &str) -> Self {
        self.raw_join(format!("INNER JOIN {table} ON {table_key} = {{{entity_key}}}"))
    }

    fn raw_join(mut self, sql: String) -> Self {
        self.joins.push(Join::Raw(sql));
        self
    }

    pub fn order_by(mut self, order: &str) -> Self {
        self.orders.push(order.to_string());
        self
    }

    pub fn group_by(mut self, group: &str) -> Self {
        self.groups.push(group.to_string());
        self
    }

    pub fn having(mut self, condition: &str) -> Self {
        self.having.push(condition.to_string());
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Only rendered together with a limit.
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn params(&self) -> &[SqlValue] {
        &self.params
    }

    pub fn entity_name(&self) -> Result<&str> {
        self.from_parts().map(|(entity, _)| entity)
    }

    fn from_parts(&self) -> Result<(&str, &str)> {
        let from = self
            .from
            .as_deref()
            .ok_or_else(|| EntityMapError::validation("select requires a from entity"))?;
        let mut parts = from.split_whitespace();
        let entity = parts.next().unwrap_or_default();
        let alias = parts.next().unwrap_or(entity);
        Ok((entity, alias))
    }

    /// Runs the query and hydrates one object per row.
    pub fn find(&self, ctx: &PersistenceContext) -> Result<Vec<Object>> {
        let (entity, _) = self.from_parts()?;
        let rows = ctx.fetch(self, &self.params)?;
        let manager = ctx.manager();
        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            let obj = manager.entity_for_row(entity, row)?;
            for join in &self.joins {
                if let Join::Association { name, alias } = join {
                    manager.hydrate_eager(&obj, name, alias, row)?;
                }
            }
            out.push(obj);
        }
        Ok(out)
    }

    pub fn find_one(&self, ctx: &PersistenceContext) -> Result<Option<Object>> {
        let query = self.clone().limit(1);
        Ok(query.find(ctx)?.into_iter().next())
    }

    /// Number of matching rows, ignoring limit, offset, order and grouping.
    pub fn count(&self, ctx: &PersistenceContext) -> Result<i64> {
        let counting = CountQuery(self);
        let rows = ctx.fetch(&counting, &self.params)?;
        let total = rows
            .first()
            .and_then(|row| row.get("total"))
            .cloned()
            .unwrap_or(SqlValue::Integer(0));
        match total {
            SqlValue::Integer(n) => Ok(n),
            SqlValue::Real(f) => Ok(f as i64),
            other => Err(EntityMapError::conversion(format!(
                "count returned {other:?}"
            ))),
        }
    }

    fn render(&self, registry: &Registry, counting: bool) -> Result<String> {
        let (entity_name, alias) = self.from_parts()?;
        let entity = registry.entity(entity_name)?;
        let from = table_ref(entity_name, alias);

        let mut fields = self.fields.clone();
        let mut joins = Vec::with_capacity(self.joins.len());
        for property in entity.column_properties(registry)? {
            fields.push(format!("{{{alias}.{}}}", property.name()));
        }
        for join in &self.joins {
            match join {
                Join::Raw(sql) => joins.push(sql.clone()),
                Join::Association {
                    name,
                    alias: join_alias,
                } => {
                    let association = entity.association(name).ok_or_else(|| {
                        EntityMapError::config(format!(
                            "entity '{entity_name}' has no association '{name}'"
                        ))
                    })?;
                    let target = association.target();
                    match association.kind() {
                        AssociationKind::ManyToOne { .. } | AssociationKind::OneToOne { .. } => {
                            joins.push(format!(
                                "LEFT JOIN {} ON {{{alias}.{}}} = {{{join_alias}.{}}}",
                                table_ref(target, join_alias),
                                association.key(),
                                association.ref_key()
                            ));
                            for property in registry.entity(target)?.column_properties(registry)? {
                                let column = property.column().unwrap_or(property.name());
                                fields.push(format!(
                                    "{{{join_alias}.{}}} AS {join_alias}{EAGER_SEPARATOR}{column}",
                                    property.name()
                                ));
                            }
                        }
                        AssociationKind::OneToMany => joins.push(format!(
                            "LEFT JOIN {} ON {{{join_alias}.{}}} = {{{alias}.{}}}",
                            table_ref(target, join_alias),
                            association.key(),
                            association.ref_key()
                        )),
                        AssociationKind::ManyToMany {
                            linking_table,
                            local_column,
                            foreign_column,
                        } => {
                            let link = format!("{join_alias}_link");
                            joins.push(format!(
                                "LEFT JOIN {linking_table} {link} ON {link}.{local_column} = {{{alias}.{}}}",
                                association.ref_key()
                            ));
                            joins.push(format!(
                                "LEFT JOIN {} ON {{{join_alias}.{}}} = {link}.{foreign_column}",
                                table_ref(target, join_alias),
                                association.key()
                            ));
                        }
                    }
                }
            }
        }

        let projection = if counting {
            "COUNT(*) AS total".to_string()
        } else {
            fields.join(", ")
        };
        let mut parts = vec![format!("SELECT {projection} FROM {from}")];
        parts.extend(joins);
        parts.extend(where_clause(&self.criteria));
        if !counting && !self.groups.is_empty() {
            parts.push(format!("GROUP BY {}", self.groups.join(", ")));
        }
        if !self.having.is_empty() {
            parts.push(format!("HAVING {}", self.having.join(" AND ")));
        }
        if !counting {
            if !self.orders.is_empty() {
                parts.push(format!("ORDER BY {}", self.orders.join(", ")));
            }
            if let Some(limit) = self.limit {
                parts.push(format!("LIMIT {limit}"));
                if let Some(offset) = self.offset {
                    parts.push(format!("OFFSET {offset}"));
                }
            }
        }
        Ok(parts.join(" "))
    }
}

impl Statement for SelectQuery {
    fn to_sql(&self, registry: &Registry) -> Result<String> {
        self.render(registry, false)
    }
}

fn table_ref(entity: &str, alias: &str) -> String {
    if alias == entity {
        format!("{{{entity}}}")
    } else {
        format!("{{{entity} {alias}}}")
    }
}

struct CountQuery<'q>(&'q SelectQuery);

impl Statement for CountQuery<'_> {
    fn to_sql(&self, registry: &Registry) -> Result<String> {
        self.0.render(registry, true)
    }
}
