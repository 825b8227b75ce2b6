use std::{
    cell::{Ref, RefCell, RefMut},
    path::Path,
};

use tracing::debug;

use crate::{
    cache::IdentityCache,
    config::OrmConfig,
    connection::{Connection, ConnectionConfig, ConnectionMetricsSnapshot, Row},
    errors::{EntityMapError, Result},
    manager::{EntityManager, PrimaryKey, SaveJournal},
    metadata::{Entity, Registry},
    model::Object,
    proxy::{ProxyProvider, RecordProvider},
    query::{self, SelectQuery},
    translator::{ColumnStyle, QueryTranslator, Statement},
    value::{SqlValue, Value},
};

pub type HydrateHook = Box<dyn Fn(&Object) -> Result<()>>;

/// Everything one unit of work needs: metadata, the lazily opened connection, the
/// identity cache and the instance provider.
///
/// The context is single-threaded; hand each thread or request its own.
pub struct PersistenceContext {
    registry: Registry,
    connection_config: RefCell<Option<ConnectionConfig>>,
    connection: RefCell<Option<Connection>>,
    cache: RefCell<IdentityCache>,
    journal: RefCell<SaveJournal>,
    provider: Box<dyn ProxyProvider>,
    on_hydrate: Option<HydrateHook>,
}

impl PersistenceContext {
    /// Validates `registry` and resolves member access paths through `provider`.
    pub fn new(
        mut registry: Registry,
        connection: ConnectionConfig,
        provider: impl ProxyProvider + 'static,
    ) -> Result<Self> {
        registry.validate()?;
        registry.resolve_access(&provider)?;
        debug!(
            entities = registry.entities().count(),
            dialect = %connection.dialect(),
            "persistence context ready"
        );
        Ok(Self {
            registry,
            connection_config: RefCell::new(Some(connection)),
            connection: RefCell::new(None),
            cache: RefCell::new(IdentityCache::new()),
            journal: RefCell::new(SaveJournal::default()),
            provider: Box::new(provider),
            on_hydrate: None,
        })
    }

    pub fn from_config(config: &OrmConfig) -> Result<Self> {
        Self::from_config_with_provider(config, RecordProvider)
    }

    pub fn from_config_with_provider(
        config: &OrmConfig,
        provider: impl ProxyProvider + 'static,
    ) -> Result<Self> {
        let (registry, connection) = config.build()?;
        Self::new(registry, connection, provider)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_config(&OrmConfig::from_path(path)?)
    }

    /// Installs a hook run on every freshly hydrated object.
    pub fn on_hydrate<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Object) -> Result<()> + 'static,
    {
        self.on_hydrate = Some(Box::new(hook));
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn entity(&self, name: &str) -> Result<&Entity> {
        self.registry.entity(name)
    }

    pub(crate) fn provider(&self) -> &dyn ProxyProvider {
        self.provider.as_ref()
    }

    pub(crate) fn hydrate_hook(&self) -> Option<&HydrateHook> {
        self.on_hydrate.as_ref()
    }

    pub fn cache(&self) -> Ref<'_, IdentityCache> {
        self.cache.borrow()
    }

    pub(crate) fn cache_mut(&self) -> RefMut<'_, IdentityCache> {
        self.cache.borrow_mut()
    }

    pub(crate) fn journal_mut(&self) -> RefMut<'_, SaveJournal> {
        self.journal.borrow_mut()
    }

    /// Runs `f` on the connection, opening it on first use.
    pub fn with_connection<R>(&self, f: impl FnOnce(&mut Connection) -> Result<R>) -> Result<R> {
        let mut slot = self.connection.borrow_mut();
        if slot.is_none() {
            let config = self.connection_config.borrow_mut().take().ok_or_else(|| {
                EntityMapError::config("connection configuration was already consumed")
            })?;
            debug!(dialect = %config.dialect(), "opening connection");
            *slot = Some(config.connect()?);
        }
        match slot.as_mut() {
            Some(conn) => f(conn),
            None => Err(EntityMapError::config("connection is not available")),
        }
    }

    pub fn begin_transaction(&self) -> Result<()> {
        self.with_connection(Connection::begin_transaction)
    }

    pub fn commit(&self) -> Result<()> {
        self.with_connection(Connection::commit)
    }

    pub fn rollback(&self) -> Result<()> {
        self.with_connection(Connection::rollback)
    }

    pub fn metrics(&self) -> Result<ConnectionMetricsSnapshot> {
        self.with_connection(|conn| Ok(conn.metrics().snapshot()))
    }

    pub fn reset_metrics(&self) -> Result<()> {
        self.with_connection(|conn| {
            conn.metrics_mut().reset();
            Ok(())
        })
    }

    pub fn translator(&self) -> QueryTranslator<'_> {
        QueryTranslator::new(&self.registry)
    }

    pub fn translate(&self, statement: &dyn Statement) -> Result<String> {
        self.translator().translate(statement)
    }

    pub fn execute(&self, statement: &dyn Statement, params: &[SqlValue]) -> Result<usize> {
        let sql = self.translate(statement)?;
        self.with_connection(|conn| conn.execute(&sql, params))
    }

    pub fn fetch(&self, statement: &dyn Statement, params: &[SqlValue]) -> Result<Vec<Row>> {
        let sql = self.translate(statement)?;
        self.with_connection(|conn| conn.query(&sql, params))
    }

    /// Runs raw SQL after expanding its placeholders.
    pub fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        let sql = self.translator().translate_sql(sql, ColumnStyle::Qualified)?;
        let params: Vec<SqlValue> = params.iter().map(Value::to_sql).collect();
        self.with_connection(|conn| conn.query(&sql, &params))
    }

    pub fn quote(&self, value: &Value) -> Result<String> {
        self.with_connection(|conn| Ok(conn.quote(value)))
    }

    pub fn last_insert_id(&self, sequence: Option<&str>) -> Result<SqlValue> {
        self.with_connection(|conn| conn.last_insert_id(sequence))
    }

    pub fn manager(&self) -> EntityManager<'_> {
        EntityManager::new(self)
    }

    pub fn from(&self, entity: &str) -> SelectQuery {
        query::select().from(entity)
    }

    /// Objects of `entity` matching a raw filter.
    pub fn select(&self, entity: &str, criteria: &str, params: &[Value]) -> Result<Vec<Object>> {
        self.filtered(entity, criteria, params).find(self)
    }

    pub fn select_one(&self, entity: &str, criteria: &str, params: &[Value]) -> Result<Option<Object>> {
        self.filtered(entity, criteria, params).find_one(self)
    }

    fn filtered(&self, entity: &str, criteria: &str, params: &[Value]) -> SelectQuery {
        let query = self.from(entity);
        if criteria.trim().is_empty() {
            query
        } else {
            query.filter_with(criteria, params.iter().cloned())
        }
    }

    pub fn save(&self, obj: &Object) -> Result<()> {
        self.manager().save(obj)
    }

    pub fn load(&self, entity: &str, pk: impl Into<PrimaryKey>) -> Result<Option<Object>> {
        self.manager().load(entity, pk, true)
    }

    pub fn refresh(&self, obj: &Object) -> Result<Option<Object>> {
        self.manager().refresh(obj)
    }

    pub fn delete(&self, entity: &str, pk: impl Into<PrimaryKey>) -> Result<()> {
        self.manager().delete(entity, pk)
    }

    pub fn delete_object(&self, obj: &Object) -> Result<()> {
        self.manager().delete_object(obj)
    }

    pub fn to_json(&self, obj: &Object) -> Result<serde_json::Value> {
        self.manager().to_json(obj)
    }

    pub fn clear_cache(&self) {
        self.cache_mut().clear();
    }
}
