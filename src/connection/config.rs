use std::{fmt, str::FromStr};

use super::{Connection, driver::Driver};
use crate::errors::{EntityMapError, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Dialect {
    MySql,
    MsSql,
    PgSql,
    Sqlite,
}

impl Dialect {
    pub fn as_str(self) -> &'static str {
        match self {
            Dialect::MySql => "mysql",
            Dialect::MsSql => "mssql",
            Dialect::PgSql => "pgsql",
            Dialect::Sqlite => "sqlite",
        }
    }
}

impl FromStr for Dialect {
    type Err = EntityMapError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mysql" => Ok(Dialect::MySql),
            "mssql" => Ok(Dialect::MsSql),
            "pgsql" => Ok(Dialect::PgSql),
            "sqlite" => Ok(Dialect::Sqlite),
            other => Err(EntityMapError::precondition(format!(
                "invalid dialect '{other}', expected mysql, mssql, pgsql or sqlite"
            ))),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

enum Endpoint {
    Dsn(String),
    Handle(Box<dyn Driver>),
}

/// Everything needed to open the single connection of a context.
pub struct ConnectionConfig {
    dialect: Dialect,
    endpoint: Endpoint,
    username: Option<String>,
    password: Option<String>,
}

impl ConnectionConfig {
    /// DSN-based config. Dialects other than sqlite require a username.
    pub fn from_dsn(
        dialect: Dialect,
        dsn: impl Into<String>,
        username: Option<String>,
        password: Option<String>,
    ) -> Result<Self> {
        let dsn = dsn.into();
        if dsn.trim().is_empty() {
            return Err(EntityMapError::config("connection dsn must not be empty"));
        }
        if dialect != Dialect::Sqlite && username.as_deref().is_none_or(str::is_empty) {
            return Err(EntityMapError::config(format!(
                "a username is required for {dialect} connections"
            )));
        }
        Ok(Self {
            dialect,
            endpoint: Endpoint::Dsn(dsn),
            username,
            password,
        })
    }

    pub fn sqlite(dsn: impl Into<String>) -> Result<Self> {
        Self::from_dsn(Dialect::Sqlite, dsn, None, None)
    }

    /// Wraps an already opened handle.
    pub fn from_driver(dialect: Dialect, driver: impl Driver + 'static) -> Self {
        Self {
            dialect,
            endpoint: Endpoint::Handle(Box::new(driver)),
            username: None,
            password: None,
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn dsn(&self) -> Option<&str> {
        match &self.endpoint {
            Endpoint::Dsn(dsn) => Some(dsn),
            Endpoint::Handle(_) => None,
        }
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    pub fn connect(self) -> Result<Connection> {
        let driver = match self.endpoint {
            Endpoint::Handle(driver) => driver,
            Endpoint::Dsn(dsn) => open_dsn(self.dialect, &dsn)?,
        };
        Ok(Connection::new(driver, self.dialect))
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("dialect", &self.dialect)
            .field("dsn", &self.dsn())
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

#[cfg(feature = "sqlite-backend")]
fn open_dsn(dialect: Dialect, dsn: &str) -> Result<Box<dyn Driver>> {
    use super::sqlite::SqliteDriver;

    if dialect != Dialect::Sqlite {
        return Err(EntityMapError::config(format!(
            "no bundled driver for {dialect}; supply an opened handle with ConnectionConfig::from_driver"
        )));
    }
    let target = dsn.strip_prefix("sqlite:").unwrap_or(dsn);
    let driver = match target {
        ":memory:" | "" => SqliteDriver::open_in_memory()?,
        path => SqliteDriver::open(path)?,
    };
    Ok(Box::new(driver))
}

#[cfg(not(feature = "sqlite-backend"))]
fn open_dsn(dialect: Dialect, _dsn: &str) -> Result<Box<dyn Driver>> {
    Err(EntityMapError::config(format!(
        "no bundled driver for {dialect}; supply an opened handle with ConnectionConfig::from_driver"
    )))
}
