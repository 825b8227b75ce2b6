//! Metadata-driven object/relational mapping over SQL connections.
//! Run Criterion benchmarks with `cargo bench` to inspect reports under `target/criterion`.

pub mod bench_utils;
pub mod cache;
pub mod cli;
pub mod config;
pub mod connection;
pub mod context;
pub mod errors;
pub mod manager;
pub mod metadata;
pub mod model;
pub mod proxy;
pub mod query;
pub mod translator;
pub mod value;

pub use crate::cache::{CacheEntry, IdentityCache, Snapshot};
pub use crate::config::OrmConfig;
pub use crate::connection::{Connection, ConnectionConfig, Dialect, Driver, Row};
#[cfg(feature = "sqlite-backend")]
pub use crate::connection::SqliteDriver;
pub use crate::context::PersistenceContext;
pub use crate::errors::{EntityMapError, Result};
pub use crate::manager::{EntityManager, PrimaryKey};
pub use crate::metadata::{
    AccessMode, Association, AssociationKind, AssociationSpec, EmbeddableEntity, Entity, Property,
    Registry,
};
pub use crate::model::{Collection, Field, LifecycleState, Member, Model, Object, Record};
pub use crate::proxy::{ModelFactory, ProxyProvider, RecordProvider};
pub use crate::query::{DeleteQuery, InsertQuery, SelectQuery, UpdateQuery};
pub use crate::translator::{ColumnStyle, QueryTranslator, Statement};
pub use crate::value::{PropertyType, SqlValue, Value};
