//! Expansion of `{Entity alias}` and `{alias.Property}` placeholders into SQL.

use std::sync::LazyLock;

use ahash::AHashMap;
use regex::Regex;

use crate::{
    errors::{EntityMapError, Result},
    metadata::{Entity, Registry},
};

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{[A-Za-z0-9_:\\]+(?:[ .][A-Za-z0-9_]+)*\}").unwrap());

/// How resolved columns are written.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnStyle {
    /// `alias.column`, or `table.column` when no alias was given.
    Qualified,
    /// `column`, for statements that only touch one table.
    Bare,
}

/// A statement whose SQL text carries placeholders.
pub trait Statement {
    fn to_sql(&self, registry: &Registry) -> Result<String>;

    fn column_style(&self) -> ColumnStyle {
        ColumnStyle::Qualified
    }
}

pub struct QueryTranslator<'r> {
    registry: &'r Registry,
}

impl<'r> QueryTranslator<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self { registry }
    }

    pub fn translate(&self, statement: &dyn Statement) -> Result<String> {
        let sql = statement.to_sql(self.registry)?;
        self.translate_sql(&sql, statement.column_style())
    }

    pub fn translate_sql(&self, sql: &str, style: ColumnStyle) -> Result<String> {
        let matches: Vec<_> = PLACEHOLDER.find_iter(sql).collect();
        let mut resolved: Vec<Option<String>> = vec![None; matches.len()];
        let mut bindings: AHashMap<&str, &Entity> = AHashMap::new();

        for (idx, m) in matches.iter().enumerate() {
            let inner = strip_braces(m.as_str());
            if inner.contains('.') {
                continue;
            }
            let mut parts = inner.split(' ');
            let name = parts.next().unwrap_or_default();
            let alias = parts.next();
            if parts.next().is_some() {
                return Err(EntityMapError::config(format!(
                    "malformed table placeholder {}",
                    m.as_str()
                )));
            }
            let entity = self.registry.entity(name)?;
            bindings.insert(alias.unwrap_or(name), entity);
            resolved[idx] = Some(match alias {
                Some(alias) => format!("{} {alias}", entity.table()),
                None => entity.table().to_string(),
            });
        }

        for (idx, m) in matches.iter().enumerate() {
            if resolved[idx].is_some() {
                continue;
            }
            let inner = strip_braces(m.as_str());
            let (alias, property) = inner.split_once('.').ok_or_else(|| {
                EntityMapError::config(format!("malformed column placeholder {}", m.as_str()))
            })?;
            let entity = match bindings.get(alias) {
                Some(entity) => *entity,
                None if self.registry.entity_exists(alias) => self.registry.entity(alias)?,
                None => {
                    return Err(EntityMapError::config(format!(
                        "unknown alias '{alias}' in {}",
                        m.as_str()
                    )));
                }
            };
            let column = entity.column_for(self.registry, property).ok_or_else(|| {
                EntityMapError::config(format!(
                    "entity '{}' has no property '{property}'",
                    entity.name()
                ))
            })?;
            resolved[idx] = Some(match style {
                ColumnStyle::Bare => column.to_string(),
                ColumnStyle::Qualified if alias == entity.name() => {
                    format!("{}.{column}", entity.table())
                }
                ColumnStyle::Qualified => format!("{alias}.{column}"),
            });
        }

        let mut out = String::with_capacity(sql.len());
        let mut last = 0;
        for (m, replacement) in matches.iter().zip(resolved) {
            out.push_str(&sql[last..m.start()]);
            out.push_str(&replacement.unwrap_or_default());
            last = m.end();
        }
        out.push_str(&sql[last..]);
        Ok(out)
    }
}

fn strip_braces(token: &str) -> &str {
    &token[1..token.len() - 1]
}
