#![allow(dead_code)]

use std::{cell::RefCell, collections::VecDeque, io, rc::Rc};

use entitymap::{
    AssociationSpec, ConnectionConfig, Dialect, Driver, EmbeddableEntity, Entity, EntityMapError,
    PersistenceContext, Property, PropertyType, ProxyProvider, RecordProvider, Registry, Result,
    Row, SqlValue, SqliteDriver,
};

pub const SCHEMA: &str = "
    CREATE TABLE projects (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        status_id INTEGER NOT NULL
    );
    CREATE TABLE bugs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        severity INTEGER,
        project_id INTEGER,
        reported_at TEXT
    );
    CREATE TABLE profiles (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        bio TEXT
    );
    CREATE TABLE users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        street TEXT,
        city TEXT,
        profile_id INTEGER
    );
    CREATE TABLE project_members (
        project_id INTEGER NOT NULL,
        user_id INTEGER NOT NULL
    );
    CREATE TABLE memberships (
        project_id INTEGER NOT NULL,
        user_id INTEGER NOT NULL,
        role TEXT,
        PRIMARY KEY (project_id, user_id)
    );
";

pub fn registry() -> Registry {
    let mut registry = Registry::new();
    let mut address = EmbeddableEntity::new("Address");
    address.add_property(Property::new("Street", "street", PropertyType::Varchar));
    address.add_property(
        Property::new("City", "city", PropertyType::Varchar).with_default("Springfield"),
    );
    registry.add_embeddable(address);

    registry.add_entity(
        Entity::new("Project", "projects")
            .with_property(
                Property::new("ProjectID", "id", PropertyType::Int)
                    .primary_key()
                    .auto_increment(),
            )
            .with_property(Property::new("Name", "name", PropertyType::Varchar))
            .with_property(Property::new("StatusID", "status_id", PropertyType::Int).with_default(1)),
    );
    registry.add_entity(
        Entity::new("Bug", "bugs")
            .with_property(
                Property::new("ID", "id", PropertyType::Int)
                    .primary_key()
                    .auto_increment(),
            )
            .with_property(Property::new("Title", "title", PropertyType::Varchar))
            .with_property(Property::new("Severity", "severity", PropertyType::Int))
            .with_property(Property::new("ProjectID", "project_id", PropertyType::Int))
            .with_property(
                Property::new("Reported", "reported_at", PropertyType::DateTime)
                    .with_default_expression("CURRENT_TIMESTAMP"),
            ),
    );
    registry.add_entity(
        Entity::new("Profile", "profiles")
            .with_property(
                Property::new("ProfileID", "id", PropertyType::Int)
                    .primary_key()
                    .auto_increment(),
            )
            .with_property(Property::new("Bio", "bio", PropertyType::Text)),
    );
    registry.add_entity(
        Entity::new("User", "users")
            .with_property(
                Property::new("UserID", "id", PropertyType::Int)
                    .primary_key()
                    .auto_increment(),
            )
            .with_property(Property::new("Name", "name", PropertyType::Varchar))
            .with_property(Property::embedded("Address", "Address"))
            .with_property(Property::new("ProfileID", "profile_id", PropertyType::Int)),
    );
    registry.add_entity(
        Entity::new("Membership", "memberships")
            .with_property(Property::new("ProjectID", "project_id", PropertyType::Int).primary_key())
            .with_property(Property::new("UserID", "user_id", PropertyType::Int).primary_key())
            .with_property(Property::new("Role", "role", PropertyType::Varchar)),
    );

    registry
        .associate("Project", AssociationSpec::one_to_many("Bug", "ProjectID"))
        .expect("project bugs");
    registry
        .associate(
            "Project",
            AssociationSpec::many_to_many("User", "project_members", "project_id", "user_id")
                .named("Members"),
        )
        .expect("project members");
    registry
        .associate("Bug", AssociationSpec::many_to_one("Project", "ProjectID"))
        .expect("bug project");
    registry
        .associate(
            "User",
            AssociationSpec::one_to_one("Profile", "ProfileID").optional(),
        )
        .expect("user profile");
    registry
}

pub fn sqlite_context() -> PersistenceContext {
    sqlite_context_with(RecordProvider)
}

pub fn sqlite_context_with(provider: impl ProxyProvider + 'static) -> PersistenceContext {
    let driver = SqliteDriver::open_in_memory().expect("sqlite");
    driver.execute_batch(SCHEMA).expect("schema");
    PersistenceContext::new(
        registry(),
        ConnectionConfig::from_driver(Dialect::Sqlite, driver),
        provider,
    )
    .expect("context")
}

/// Statements sent through the context's connection, oldest first.
pub fn history(ctx: &PersistenceContext) -> Vec<String> {
    ctx.with_connection(|conn| Ok(conn.metrics().history().map(str::to_string).collect()))
        .expect("history")
}

pub fn count_rows(ctx: &PersistenceContext, sql: &str) -> i64 {
    let rows = ctx.query(sql, &[]).expect("count query");
    match rows.first().and_then(|row| row.value(0)) {
        Some(SqlValue::Integer(n)) => *n,
        other => panic!("unexpected count result {other:?}"),
    }
}

/// Shared view of what a `RecordingDriver` was asked to do.
#[derive(Clone, Default)]
pub struct DriverLog {
    entries: Rc<RefCell<Vec<(String, Vec<SqlValue>)>>>,
}

impl DriverLog {
    fn push(&self, entry: impl Into<String>, params: &[SqlValue]) {
        self.entries
            .borrow_mut()
            .push((entry.into(), params.to_vec()));
    }

    pub fn statements(&self) -> Vec<String> {
        self.entries.borrow().iter().map(|(s, _)| s.clone()).collect()
    }

    pub fn params(&self, idx: usize) -> Vec<SqlValue> {
        self.entries.borrow()[idx].1.clone()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.entries
            .borrow()
            .iter()
            .filter(|(s, _)| s == entry)
            .count()
    }
}

/// Driver that records every call and answers queries from a script.
pub struct RecordingDriver {
    log: DriverLog,
    native_transactions: bool,
    fail_prefix: Option<String>,
    responses: VecDeque<Vec<Row>>,
    next_id: i64,
}

impl RecordingDriver {
    pub fn new() -> (Self, DriverLog) {
        let log = DriverLog::default();
        (
            Self {
                log: log.clone(),
                native_transactions: true,
                fail_prefix: None,
                responses: VecDeque::new(),
                next_id: 1,
            },
            log,
        )
    }

    pub fn without_native_transactions(mut self) -> Self {
        self.native_transactions = false;
        self
    }

    pub fn failing_on(mut self, prefix: &str) -> Self {
        self.fail_prefix = Some(prefix.to_string());
        self
    }

    pub fn respond(mut self, rows: Vec<Row>) -> Self {
        self.responses.push_back(rows);
        self
    }

    fn check(&self, sql: &str) -> Result<()> {
        match &self.fail_prefix {
            Some(prefix) if sql.starts_with(prefix.as_str()) => Err(EntityMapError::driver(
                io::Error::other(format!("scripted failure for {sql}")),
            )),
            _ => Ok(()),
        }
    }
}

impl Driver for RecordingDriver {
    fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<usize> {
        self.log.push(sql, params);
        self.check(sql)?;
        Ok(1)
    }

    fn query(&mut self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>> {
        self.log.push(sql, params);
        self.check(sql)?;
        Ok(self.responses.pop_front().unwrap_or_default())
    }

    fn begin(&mut self) -> Result<()> {
        if !self.native_transactions {
            self.log.push("native:begin failed", &[]);
            return Err(EntityMapError::driver(io::Error::other(
                "native transactions unsupported",
            )));
        }
        self.log.push("native:begin", &[]);
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.log.push("native:commit", &[]);
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        self.log.push("native:rollback", &[]);
        Ok(())
    }

    fn last_insert_id(&mut self, sequence: Option<&str>) -> Result<SqlValue> {
        self.log
            .push(format!("last_insert_id:{}", sequence.unwrap_or("-")), &[]);
        let id = self.next_id;
        self.next_id += 1;
        Ok(SqlValue::Integer(id))
    }
}

pub fn recording_context(dialect: Dialect, driver: RecordingDriver) -> PersistenceContext {
    PersistenceContext::new(
        registry(),
        ConnectionConfig::from_driver(dialect, driver),
        RecordProvider,
    )
    .expect("context")
}

pub const CONFIG_JSON: &str = r#"{
    "connection": { "dialect": "sqlite", "dsn": "sqlite::memory:" },
    "embeddables": {
        "Address": {
            "props": {
                "Street": { "column": "street", "type": "varchar" },
                "City": { "column": "city", "type": "varchar", "default": "Springfield" }
            }
        }
    },
    "classes": {
        "Project": {
            "table": "projects",
            "props": {
                "ProjectID": { "column": "id", "type": "int", "pk": true, "autoIncrement": true },
                "Name": { "column": "name", "type": "varchar" },
                "StatusID": { "column": "status_id", "type": "int", "default": 1 }
            },
            "associations": [
                { "type": "one-to-many", "entity": "Bug", "key": "ProjectID" },
                {
                    "type": "many-to-many",
                    "entity": "User",
                    "table": "project_members",
                    "tableKeyLocal": "project_id",
                    "tableKeyForeign": "user_id"
                }
            ]
        },
        "Bug": {
            "table": "bugs",
            "props": {
                "ID": { "column": "id", "type": "int", "pk": true, "autoIncrement": true },
                "Title": { "column": "title", "type": "varchar" },
                "Severity": { "column": "severity", "type": "int" },
                "ProjectID": { "column": "project_id", "type": "int" }
            },
            "associations": [
                { "type": "many-to-one", "entity": "Project", "key": "ProjectID", "optional": true }
            ]
        },
        "User": {
            "table": "users",
            "props": {
                "UserID": { "column": "id", "type": "int", "pk": true, "autoIncrement": true },
                "Name": { "column": "name", "type": "varchar" },
                "Address": { "type": "embedded", "ref": "Address" }
            }
        }
    }
}"#;
