use crate::{errors::Result, value::SqlValue};

/// Statement execution and native transaction primitives of a database handle.
pub trait Driver {
    fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<usize>;
    fn query(&mut self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>>;
    fn begin(&mut self) -> Result<()>;
    fn commit(&mut self) -> Result<()>;
    fn rollback(&mut self) -> Result<()>;
    fn last_insert_id(&mut self, sequence: Option<&str>) -> Result<SqlValue>;
}

/// One result row: column names with their raw values, in select order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<SqlValue>,
}

impl Row {
    pub fn new(columns: Vec<String>, values: Vec<SqlValue>) -> Self {
        Self { columns, values }
    }

    pub fn push(&mut self, column: impl Into<String>, value: SqlValue) {
        self.columns.push(column.into());
        self.values.push(value);
    }

    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|idx| &self.values[idx])
    }

    pub fn value(&self, idx: usize) -> Option<&SqlValue> {
        self.values.get(idx)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl<C: Into<String>> FromIterator<(C, SqlValue)> for Row {
    fn from_iter<T: IntoIterator<Item = (C, SqlValue)>>(iter: T) -> Self {
        let mut row = Row::default();
        for (column, value) in iter {
            row.push(column, value);
        }
        row
    }
}
