//! Database connection: nested transaction counting over a `Driver`, dialect
//! specifics and statement metrics.

mod config;
mod driver;
mod metrics;
#[cfg(feature = "sqlite-backend")]
mod sqlite;

use tracing::{debug, warn};

pub use config::{ConnectionConfig, Dialect};
pub use driver::{Driver, Row};
pub use metrics::{ConnectionMetrics, ConnectionMetricsSnapshot};
#[cfg(feature = "sqlite-backend")]
pub use sqlite::SqliteDriver;

use crate::{
    errors::{EntityMapError, Result},
    value::{SqlValue, Value},
};

pub struct Connection {
    driver: Box<dyn Driver>,
    dialect: Dialect,
    level: usize,
    native_transactions: bool,
    metrics: ConnectionMetrics,
}

impl Connection {
    pub fn new(driver: Box<dyn Driver>, dialect: Dialect) -> Self {
        Self {
            driver,
            dialect,
            level: 0,
            native_transactions: true,
            metrics: ConnectionMetrics::default(),
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn transaction_level(&self) -> usize {
        self.level
    }

    /// False once a native begin has failed and literal statements are used instead.
    pub fn supports_native_transactions(&self) -> bool {
        self.native_transactions
    }

    pub fn metrics(&self) -> &ConnectionMetrics {
        &self.metrics
    }

    pub fn metrics_mut(&mut self) -> &mut ConnectionMetrics {
        &mut self.metrics
    }

    pub fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<usize> {
        debug!(target: "entitymap::sql", sql, params = params.len(), "execute");
        self.metrics.record_statement(sql);
        self.driver.execute(sql, params)
    }

    pub fn query(&mut self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>> {
        debug!(target: "entitymap::sql", sql, params = params.len(), "query");
        self.metrics.record_statement(sql);
        self.driver.query(sql, params)
    }

    /// Only the outermost call opens a transaction on the driver.
    pub fn begin_transaction(&mut self) -> Result<()> {
        self.level += 1;
        if self.level > 1 {
            debug!(level = self.level, "nested begin");
            return Ok(());
        }
        if let Err(err) = self.begin_outermost() {
            self.level -= 1;
            return Err(err);
        }
        Ok(())
    }

    fn begin_outermost(&mut self) -> Result<()> {
        if self.native_transactions {
            match self.driver.begin() {
                Ok(()) => {
                    debug!("begin transaction");
                    self.metrics.record_begin();
                    return Ok(());
                }
                Err(err) => {
                    warn!(error = %err, "native transactions unavailable, using BEGIN TRANSACTION");
                    self.native_transactions = false;
                }
            }
        }
        self.execute("BEGIN TRANSACTION", &[]).map(|_| ())
    }

    pub fn commit(&mut self) -> Result<()> {
        self.leave("commit")?;
        if self.level > 0 {
            return Ok(());
        }
        if self.native_transactions {
            self.driver.commit()?;
            self.metrics.record_commit();
            debug!("commit transaction");
            Ok(())
        } else {
            self.execute("COMMIT TRANSACTION", &[]).map(|_| ())
        }
    }

    pub fn rollback(&mut self) -> Result<()> {
        self.leave("rollback")?;
        if self.level > 0 {
            return Ok(());
        }
        if self.native_transactions {
            self.driver.rollback()?;
            self.metrics.record_rollback();
            debug!("rollback transaction");
            Ok(())
        } else {
            self.execute("ROLLBACK TRANSACTION", &[]).map(|_| ())
        }
    }

    fn leave(&mut self, action: &str) -> Result<()> {
        if self.level == 0 {
            return Err(EntityMapError::precondition(format!(
                "{action} without an open transaction"
            )));
        }
        self.level -= 1;
        Ok(())
    }

    pub fn last_insert_id(&mut self, sequence: Option<&str>) -> Result<SqlValue> {
        if self.dialect == Dialect::MsSql {
            let rows = self.query("SELECT SCOPE_IDENTITY()", &[])?;
            return Ok(rows
                .first()
                .and_then(|row| row.value(0))
                .cloned()
                .unwrap_or(SqlValue::Null));
        }
        self.driver.last_insert_id(sequence)
    }

    /// Renders `value` as an SQL literal.
    pub fn quote(&self, value: &Value) -> String {
        quote_literal(&value.to_sql())
    }
}

pub fn quote_literal(value: &SqlValue) -> String {
    match value {
        SqlValue::Null => "NULL".to_string(),
        SqlValue::Integer(i) => i.to_string(),
        SqlValue::Real(f) => f.to_string(),
        SqlValue::Text(s) => format!("'{}'", s.replace('\'', "''")),
        SqlValue::Blob(bytes) => {
            let hex: String = bytes.iter().map(|b| format!("{b:02X}")).collect();
            format!("X'{hex}'")
        }
    }
}
