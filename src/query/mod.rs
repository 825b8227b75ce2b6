//! Fluent statements over placeholders, executed through a `PersistenceContext`.

mod delete;
mod select;
mod write;

pub use delete::DeleteQuery;
pub(crate) use select::EAGER_SEPARATOR;
pub use select::SelectQuery;
pub use write::{Assignment, InsertQuery, UpdateQuery, WriteFields};

pub fn select() -> SelectQuery {
    SelectQuery::default()
}

pub fn insert() -> InsertQuery {
    InsertQuery::default()
}

/// Update of `entity`'s table.
pub fn update(entity: &str) -> UpdateQuery {
    UpdateQuery::entity(entity)
}

pub fn delete() -> DeleteQuery {
    DeleteQuery::default()
}

fn where_clause(criteria: &[String]) -> Option<String> {
    if criteria.is_empty() {
        None
    } else {
        Some(format!("WHERE {}", criteria.join(" AND ")))
    }
}
