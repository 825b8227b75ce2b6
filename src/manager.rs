//! Identity-mapped load, save and delete with association cascades.

use tracing::{debug, warn};

use crate::{
    cache::CacheEntry,
    connection::{Dialect, Row},
    context::PersistenceContext,
    errors::{EntityMapError, Result},
    metadata::{AssociationKind, EmbeddableEntity, Entity, Registry},
    model::{Collection, Field, LifecycleState, Member, Model, Object, Record},
    query::{self, SelectQuery},
    value::{Value, from_sql_value},
};

/// Primary-key tuple in declaration order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PrimaryKey(Vec<Value>);

impl PrimaryKey {
    pub fn values(&self) -> &[Value] {
        &self.0
    }

    pub fn into_values(self) -> Vec<Value> {
        self.0
    }
}

impl<T: Into<Value>> From<T> for PrimaryKey {
    fn from(value: T) -> Self {
        PrimaryKey(vec![value.into()])
    }
}

impl From<Vec<Value>> for PrimaryKey {
    fn from(values: Vec<Value>) -> Self {
        PrimaryKey(values)
    }
}

impl From<&[Value]> for PrimaryKey {
    fn from(values: &[Value]) -> Self {
        PrimaryKey(values.to_vec())
    }
}

/// In-memory change made while saving, kept so a failed save can be undone.
pub(crate) enum Undo {
    State(Object, LifecycleState),
    Value(Object, String, Value),
    Slot(Object, String, Field),
    Cache(String, Vec<Value>, Option<CacheEntry>),
}

/// Objects currently being saved and the changes made since the outermost save began.
#[derive(Default)]
pub(crate) struct SaveJournal {
    saving: Vec<Object>,
    undo: Vec<Undo>,
}

impl SaveJournal {
    fn enter(&mut self, obj: &Object) {
        self.saving.push(obj.clone());
    }

    /// Returns the collected changes once the outermost save has left.
    fn leave(&mut self) -> Option<Vec<Undo>> {
        self.saving.pop();
        if self.saving.is_empty() {
            Some(std::mem::take(&mut self.undo))
        } else {
            None
        }
    }

    fn contains(&self, obj: &Object) -> bool {
        self.saving.iter().any(|saving| Object::ptr_eq(saving, obj))
    }

    fn record(&mut self, change: Undo) {
        if !self.saving.is_empty() {
            self.undo.push(change);
        }
    }
}

pub struct EntityManager<'c> {
    ctx: &'c PersistenceContext,
}

impl<'c> EntityManager<'c> {
    pub fn new(ctx: &'c PersistenceContext) -> Self {
        Self { ctx }
    }

    fn registry(&self) -> &'c Registry {
        self.ctx.registry()
    }

    /// Inserts a transient object or updates a managed one inside a transaction.
    /// Any failure rolls the transaction back and is returned unchanged; the outermost
    /// save then restores every object and cache entry it touched.
    pub fn save(&self, obj: &Object) -> Result<()> {
        if self.is_saving(obj) {
            debug!(entity = obj.entity_name(), "already being saved");
            return Ok(());
        }
        self.ctx.journal_mut().enter(obj);
        let result = self.save_in_transaction(obj);
        let undo = self.ctx.journal_mut().leave();
        if let (Err(_), Some(undo)) = (&result, undo) {
            self.restore(undo);
        }
        result
    }

    fn save_in_transaction(&self, obj: &Object) -> Result<()> {
        self.ctx.begin_transaction()?;
        match self.persist(obj) {
            Ok(()) => self.ctx.commit(),
            Err(err) => {
                if let Err(rollback_err) = self.ctx.rollback() {
                    warn!(error = %rollback_err, "rollback after failed save also failed");
                }
                Err(err)
            }
        }
    }

    fn is_saving(&self, obj: &Object) -> bool {
        self.ctx.journal_mut().contains(obj)
    }

    fn record(&self, change: Undo) {
        self.ctx.journal_mut().record(change);
    }

    fn set_state(&self, obj: &Object, state: LifecycleState) {
        self.record(Undo::State(obj.clone(), obj.state()));
        obj.set_state(state);
    }

    fn write_value(&self, entity: &Entity, obj: &Object, name: &str, value: Value) -> Result<()> {
        let previous = entity.read_value(&*obj.borrow(), name);
        self.record(Undo::Value(obj.clone(), name.to_string(), previous));
        entity.write_value(&mut *obj.borrow_mut(), name, value)
    }

    fn write_collection(
        &self,
        entity: &Entity,
        obj: &Object,
        name: &str,
        previous: Collection,
        collection: Collection,
    ) -> Result<()> {
        self.record(Undo::Slot(obj.clone(), name.to_string(), Field::Many(previous)));
        entity.write_slot(&mut *obj.borrow_mut(), name, Field::Many(collection))
    }

    fn cache_entry(&self, entity: &str, keys: &[Value], entry: Option<CacheEntry>) {
        let previous = self.ctx.cache().retrieve(entity, keys).cloned();
        self.record(Undo::Cache(entity.to_string(), keys.to_vec(), previous));
        let mut cache = self.ctx.cache_mut();
        match entry {
            Some(entry) => cache.persist(entity, keys, entry),
            None => cache.remove(entity, keys),
        }
    }

    /// Replays `undo` newest first.
    fn restore(&self, undo: Vec<Undo>) {
        debug!(changes = undo.len(), "restoring objects after failed save");
        for change in undo.into_iter().rev() {
            let restored = match change {
                Undo::State(obj, state) => {
                    obj.set_state(state);
                    Ok(())
                }
                Undo::Value(obj, name, value) => self
                    .registry()
                    .entity(obj.entity_name())
                    .and_then(|entity| entity.write_value(&mut *obj.borrow_mut(), &name, value)),
                Undo::Slot(obj, name, field) => self
                    .registry()
                    .entity(obj.entity_name())
                    .and_then(|entity| entity.write_slot(&mut *obj.borrow_mut(), &name, field)),
                Undo::Cache(entity, keys, previous) => {
                    let mut cache = self.ctx.cache_mut();
                    match previous {
                        Some(entry) => cache.persist(&entity, &keys, entry),
                        None => cache.remove(&entity, &keys),
                    }
                    Ok(())
                }
            };
            if let Err(err) = restored {
                warn!(error = %err, "could not restore object after failed save");
            }
        }
    }

    fn persist(&self, obj: &Object) -> Result<()> {
        let entity = self.registry().entity(obj.entity_name())?;
        if obj.is_managed() {
            self.update(obj, entity)
        } else {
            self.insert(obj, entity)
        }
    }

    fn insert(&self, obj: &Object, entity: &'c Entity) -> Result<()> {
        self.save_one_to_one(obj, entity)?;
        self.save_many_to_one(obj, entity)?;
        if obj.is_managed() {
            // A cascade above reached this object through a back reference.
            return Ok(());
        }
        debug!(entity = entity.name(), "insert");
        apply_defaults(entity, self.registry(), &mut *obj.borrow_mut())?;

        let values = entity.column_values(self.registry(), &*obj.borrow())?;
        let mut insert = query::insert().into_entity(entity.name());
        for (property, value) in values {
            if property.is_auto_increment() {
                continue;
            }
            let field = format!("{{{}.{}}}", entity.name(), property.name());
            insert = match property.default_expression() {
                Some(expression) if value.is_null() => insert.set_expression(&field, expression),
                _ => insert.set(&field, value, property.property_type()),
            };
        }
        insert.execute(self.ctx, &[])?;

        self.assign_generated_keys(obj, entity)?;
        self.set_state(obj, LifecycleState::Managed);
        self.save_one_to_many(obj, entity)?;
        self.save_many_to_many(obj, entity)?;
        self.cache_snapshot(obj, entity)
    }

    fn assign_generated_keys(&self, obj: &Object, entity: &Entity) -> Result<()> {
        let dialect = self.ctx.with_connection(|conn| Ok(conn.dialect()))?;
        for property in entity.properties().iter().filter(|p| p.is_auto_increment()) {
            let sequence = match (entity.sequence_name(), dialect) {
                (Some(sequence), _) => Some(sequence.to_string()),
                (None, Dialect::PgSql) => Some(format!(
                    "{}_{}_seq",
                    entity.table(),
                    property.column().unwrap_or(property.name())
                )),
                (None, _) => None,
            };
            let raw = self.ctx.last_insert_id(sequence.as_deref())?;
            let value = from_sql_value(property.property_type(), raw)?;
            self.write_value(entity, obj, property.name(), value)?;
        }
        Ok(())
    }

    fn update(&self, obj: &Object, entity: &'c Entity) -> Result<()> {
        self.save_one_to_one(obj, entity)?;
        self.save_many_to_one(obj, entity)?;

        let (keys, current, values) = {
            let model = obj.borrow();
            (
                entity.extract_primary_key_values(&*model),
                entity.extract_values_to_sql(self.registry(), &*model)?,
                entity.column_values(self.registry(), &*model)?,
            )
        };
        let original = self
            .ctx
            .cache()
            .retrieve(entity.name(), &keys)
            .map(|entry| entry.original.clone());
        let changed: Vec<&str> = match &original {
            Some(original) => original.changed_columns(&current),
            None => current.iter().map(|(column, _)| column).collect(),
        };

        let mut update = query::update(entity.name());
        let mut assigned = 0;
        for (property, value) in values {
            let Some(column) = property.column() else {
                continue;
            };
            if property.is_primary_key() || !changed.contains(&column) {
                continue;
            }
            let field = format!("{{{}.{}}}", entity.name(), property.name());
            update = update.set(&field, value, property.property_type());
            assigned += 1;
        }
        if assigned > 0 {
            debug!(entity = entity.name(), columns = assigned, "update");
            for property in entity.primary_key_properties() {
                update = update.filter(&format!("{{{}.{}}} = ?", entity.name(), property.name()));
            }
            update.execute(self.ctx, &keys)?;
        } else {
            debug!(entity = entity.name(), "unchanged, no update issued");
        }

        self.save_one_to_many(obj, entity)?;
        self.save_many_to_many(obj, entity)?;
        self.cache_snapshot(obj, entity)
    }

    fn save_many_to_one(&self, obj: &Object, entity: &Entity) -> Result<()> {
        for association in entity.many_to_one() {
            let related = match entity.read_slot(&*obj.borrow(), association.name()) {
                Some(Field::One(Some(related))) => related,
                _ => continue,
            };
            let target = self.registry().entity(association.target())?;
            if !related.is_managed() {
                self.insert(&related, target)?;
            }
            let key = target.read_value(&*related.borrow(), association.ref_key());
            self.write_value(entity, obj, association.key(), key)?;
        }
        Ok(())
    }

    fn save_one_to_one(&self, obj: &Object, entity: &Entity) -> Result<()> {
        for association in entity.one_to_one() {
            let related = match entity.read_slot(&*obj.borrow(), association.name()) {
                Some(Field::One(Some(related))) => related,
                _ => continue,
            };
            if self.is_saving(&related) {
                // Mapped from both sides; the outer save owns the target.
                continue;
            }
            let target = self.registry().entity(association.target())?;
            self.save(&related)?;
            let key = target.read_value(&*related.borrow(), association.ref_key());
            self.write_value(entity, obj, association.key(), key)?;
        }
        Ok(())
    }

    fn save_one_to_many(&self, obj: &Object, entity: &Entity) -> Result<()> {
        for association in entity.one_to_many() {
            let mut collection = match entity.read_slot(&*obj.borrow(), association.name()) {
                Some(Field::Many(collection)) => collection,
                _ => continue,
            };
            let target = self.registry().entity(association.target())?;
            let parent_key = entity.read_value(&*obj.borrow(), association.ref_key());
            debug!(
                entity = entity.name(),
                association = association.name(),
                members = collection.len(),
                replace = collection.is_remove_all(),
                "cascade one-to-many"
            );
            if collection.is_remove_all() {
                query::delete()
                    .from(target.name())
                    .filter(&format!("{{{}.{}}} = ?", target.name(), association.key()))
                    .execute(self.ctx, std::slice::from_ref(&parent_key))?;
                for child in collection.objects() {
                    if child.is_managed() {
                        self.forget(child, target);
                    }
                }
            }
            for member in collection.members() {
                let Member::Object(child) = member else {
                    return Err(EntityMapError::validation(format!(
                        "one-to-many collection '{}.{}' must hold objects",
                        entity.name(),
                        association.name()
                    )));
                };
                self.write_value(target, child, association.key(), parent_key.clone())?;
                self.save(child)?;
            }
            let previous = collection.clone();
            collection.mark_synced();
            self.write_collection(entity, obj, association.name(), previous, collection)?;
        }
        Ok(())
    }

    fn save_many_to_many(&self, obj: &Object, entity: &Entity) -> Result<()> {
        for association in entity.many_to_many() {
            let AssociationKind::ManyToMany {
                linking_table,
                local_column,
                foreign_column,
            } = association.kind()
            else {
                continue;
            };
            let mut collection = match entity.read_slot(&*obj.borrow(), association.name()) {
                Some(Field::Many(collection)) => collection,
                _ => continue,
            };
            let target = self.registry().entity(association.target())?;
            let local_type = property_type(entity, association.ref_key())?;
            let foreign_type = property_type(target, association.key())?;
            let parent_key = entity.read_value(&*obj.borrow(), association.ref_key());

            let members: Vec<Member> = if collection.is_remove_all() {
                query::delete()
                    .from_table(linking_table)
                    .filter(&format!("{local_column} = ?"))
                    .execute(self.ctx, std::slice::from_ref(&parent_key))?;
                collection.members().to_vec()
            } else {
                collection.pending().cloned().collect()
            };
            debug!(
                entity = entity.name(),
                association = association.name(),
                links = members.len(),
                "cascade many-to-many"
            );
            for member in members {
                let foreign_key = match member {
                    Member::Object(child) => {
                        if !child.is_managed() {
                            self.save(&child)?;
                        }
                        target.read_value(&*child.borrow(), association.key())
                    }
                    Member::Key(key) => key,
                };
                query::insert()
                    .into_table(linking_table)
                    .set(local_column, parent_key.clone(), &local_type)
                    .set(foreign_column, foreign_key, &foreign_type)
                    .execute(self.ctx, &[])?;
            }
            let previous = collection.clone();
            collection.mark_synced();
            self.write_collection(entity, obj, association.name(), previous, collection)?;
        }
        Ok(())
    }

    /// Drops `obj` from the cache and makes it transient so the next save inserts it.
    fn forget(&self, obj: &Object, entity: &Entity) {
        let keys = entity.extract_primary_key_values(&*obj.borrow());
        self.cache_entry(entity.name(), &keys, None);
        self.set_state(obj, LifecycleState::Transient);
    }

    fn cache_snapshot(&self, obj: &Object, entity: &Entity) -> Result<()> {
        let (keys, original) = {
            let model = obj.borrow();
            (
                entity.extract_primary_key_values(&*model),
                entity.extract_values_to_sql(self.registry(), &*model)?,
            )
        };
        self.cache_entry(
            entity.name(),
            &keys,
            Some(CacheEntry {
                object: obj.clone(),
                original,
            }),
        );
        Ok(())
    }

    /// Returns the object for `pk`, from the identity cache when `use_cache` allows.
    pub fn load(
        &self,
        entity_name: &str,
        pk: impl Into<PrimaryKey>,
        use_cache: bool,
    ) -> Result<Option<Object>> {
        let entity = self.registry().entity(entity_name)?;
        let keys = checked_keys(entity, pk.into())?;
        if use_cache {
            if let Some(entry) = self.ctx.cache().retrieve(entity_name, &keys) {
                debug!(target: "entitymap::cache", entity = entity_name, "hit");
                return Ok(Some(entry.object.clone()));
            }
        }
        let select = primary_key_filter(query::select().from(entity_name), entity, &keys);
        let rows = self.ctx.fetch(&select, select.params())?;
        match rows.first() {
            Some(row) => self.materialize(entity, row).map(Some),
            None => Ok(None),
        }
    }

    /// Reads `obj`'s row again, bypassing the identity cache.
    pub fn refresh(&self, obj: &Object) -> Result<Option<Object>> {
        let entity = self.registry().entity(obj.entity_name())?;
        let keys = entity.extract_primary_key_values(&*obj.borrow());
        self.load(entity.name(), keys, false)
    }

    /// Deletes one row by primary key. Children are left in place.
    pub fn delete(&self, entity_name: &str, pk: impl Into<PrimaryKey>) -> Result<()> {
        let entity = self.registry().entity(entity_name)?;
        let keys = checked_keys(entity, pk.into())?;
        let mut delete = query::delete().from(entity_name);
        for property in entity.primary_key_properties() {
            delete = delete.filter(&format!("{{{entity_name}.{}}} = ?", property.name()));
        }
        delete.execute(self.ctx, &keys)?;
        self.ctx.cache_mut().remove(entity_name, &keys);
        debug!(entity = entity_name, "deleted");
        Ok(())
    }

    pub fn delete_object(&self, obj: &Object) -> Result<()> {
        let entity = self.registry().entity(obj.entity_name())?;
        let keys = entity.extract_primary_key_values(&*obj.borrow());
        self.delete(entity.name(), keys)?;
        obj.set_state(LifecycleState::Removed);
        Ok(())
    }

    /// Shared hydration path: the cached object for the row's key, or a new one.
    pub fn entity_for_row(&self, entity_name: &str, row: &Row) -> Result<Object> {
        let entity = self.registry().entity(entity_name)?;
        let keys = entity.primary_key_values_from_row(row)?;
        if let Some(entry) = self.ctx.cache().retrieve(entity_name, &keys) {
            return Ok(entry.object.clone());
        }
        self.materialize(entity, row)
    }

    fn materialize(&self, entity: &Entity, row: &Row) -> Result<Object> {
        let model = self.ctx.provider().create(entity.name())?;
        let obj = Object::from_boxed(entity.name(), model, LifecycleState::Managed);
        entity.populate(self.registry(), &mut *obj.borrow_mut(), row)?;
        if let Some(hook) = self.ctx.hydrate_hook() {
            hook(&obj)?;
        }
        self.cache_snapshot(&obj, entity)?;
        Ok(obj)
    }

    /// Attaches the to-one target selected under `alias` in `row`.
    pub(crate) fn hydrate_eager(&self, obj: &Object, name: &str, alias: &str, row: &Row) -> Result<()> {
        let entity = self.registry().entity(obj.entity_name())?;
        let association = entity.association(name).ok_or_else(|| {
            EntityMapError::config(format!(
                "entity '{}' has no association '{name}'",
                entity.name()
            ))
        })?;
        if !association.kind().is_to_one() {
            return Ok(());
        }
        let prefix = format!("{alias}{}", query::EAGER_SEPARATOR);
        let related_row: Row = row
            .iter()
            .filter_map(|(column, value)| {
                column
                    .strip_prefix(prefix.as_str())
                    .map(|column| (column.to_string(), value.clone()))
            })
            .collect();
        let target = self.registry().entity(association.target())?;
        let keys = target.primary_key_values_from_row(&related_row)?;
        let related = if keys.iter().all(Value::is_null) {
            None
        } else {
            Some(self.entity_for_row(target.name(), &related_row)?)
        };
        entity.write_slot(&mut *obj.borrow_mut(), name, Field::One(related))
    }

    /// Value of an association slot, loading it from storage on first access.
    pub fn related(&self, obj: &Object, name: &str) -> Result<Field> {
        let entity = self.registry().entity(obj.entity_name())?;
        let association = entity.association(name).ok_or_else(|| {
            EntityMapError::config(format!(
                "entity '{}' has no association '{name}'",
                entity.name()
            ))
        })?;
        let current = entity.read_slot(&*obj.borrow(), name);
        if association.kind().is_to_one() {
            if let Some(Field::One(Some(related))) = current {
                return Ok(Field::One(Some(related)));
            }
            let key = entity.read_value(&*obj.borrow(), association.key());
            if key.is_null() {
                return Ok(Field::One(None));
            }
            let target = self.registry().entity(association.target())?;
            let related = if target.primary_keys() == [association.ref_key()] {
                self.load(target.name(), key, true)?
            } else {
                self.related_query(obj, name)?.find_one(self.ctx)?
            };
            entity.write_slot(&mut *obj.borrow_mut(), name, Field::One(related.clone()))?;
            return Ok(Field::One(related));
        }
        if let Some(Field::Many(collection)) = current {
            return Ok(Field::Many(collection));
        }
        if !obj.is_managed() {
            return Ok(Field::Many(Collection::new()));
        }
        let collection = Collection::loaded(self.related_query(obj, name)?.find(self.ctx)?);
        entity.write_slot(&mut *obj.borrow_mut(), name, Field::Many(collection.clone()))?;
        Ok(Field::Many(collection))
    }

    /// Query selecting the targets of `obj`'s association; callers may narrow it.
    pub fn related_query(&self, obj: &Object, name: &str) -> Result<SelectQuery> {
        let entity = self.registry().entity(obj.entity_name())?;
        let association = entity.association(name).ok_or_else(|| {
            EntityMapError::config(format!(
                "entity '{}' has no association '{name}'",
                entity.name()
            ))
        })?;
        let target = association.target();
        let select = query::select().from(target);
        let query = match association.kind() {
            AssociationKind::ManyToOne { .. } | AssociationKind::OneToOne { .. } => {
                let key = entity.read_value(&*obj.borrow(), association.key());
                select.filter_with(&format!("{{{target}.{}}} = ?", association.ref_key()), [key])
            }
            AssociationKind::OneToMany => {
                let key = entity.read_value(&*obj.borrow(), association.ref_key());
                select.filter_with(&format!("{{{target}.{}}} = ?", association.key()), [key])
            }
            AssociationKind::ManyToMany {
                linking_table,
                local_column,
                foreign_column,
            } => {
                let key = entity.read_value(&*obj.borrow(), association.ref_key());
                select
                    .inner_join_with_table(
                        linking_table,
                        &format!("{linking_table}.{foreign_column}"),
                        &format!("{target}.{}", association.key()),
                    )
                    .filter_with(&format!("{linking_table}.{local_column} = ?"), [key])
            }
        };
        Ok(query)
    }

    /// Property name → value map of `obj`, embedded groups nested.
    pub fn to_json(&self, obj: &Object) -> Result<serde_json::Value> {
        let entity = self.registry().entity(obj.entity_name())?;
        json_of(entity, self.registry(), &*obj.borrow())
    }

    pub fn clear_cache(&self) {
        self.ctx.cache_mut().clear();
    }
}

fn checked_keys(entity: &Entity, pk: PrimaryKey) -> Result<Vec<Value>> {
    let keys = pk.into_values();
    if keys.is_empty() || keys.iter().all(Value::is_null) {
        return Err(EntityMapError::precondition(format!(
            "a primary key is required for '{}'",
            entity.name()
        )));
    }
    if keys.len() != entity.primary_keys().len() {
        return Err(EntityMapError::precondition(format!(
            "'{}' has {} primary key column(s), got {}",
            entity.name(),
            entity.primary_keys().len(),
            keys.len()
        )));
    }
    Ok(keys)
}

fn primary_key_filter(mut select: SelectQuery, entity: &Entity, keys: &[Value]) -> SelectQuery {
    for (property, key) in entity.primary_key_properties().zip(keys) {
        select = select.filter_with(
            &format!("{{{}.{}}} = ?", entity.name(), property.name()),
            [key.clone()],
        );
    }
    select
}

fn property_type(entity: &Entity, name: &str) -> Result<crate::value::PropertyType> {
    entity
        .property(name)
        .map(|p| p.property_type().clone())
        .ok_or_else(|| {
            EntityMapError::config(format!("entity '{}' has no property '{name}'", entity.name()))
        })
}

/// Fills null members that declare a default value, descending into embedded groups.
fn apply_defaults(owner: &EmbeddableEntity, registry: &Registry, model: &mut dyn Model) -> Result<()> {
    for property in owner.properties() {
        if let Some(reference) = property.embedded_reference() {
            let embeddable = registry.embeddable(reference)?;
            let mut record = match owner.access().read(model, property.name()) {
                Some(Field::Embedded(record)) => record,
                _ => Record::new(reference),
            };
            apply_defaults(embeddable, registry, &mut record)?;
            owner
                .access()
                .write(model, property.name(), Field::Embedded(record))?;
            continue;
        }
        let Some(default) = property.default_value() else {
            continue;
        };
        let current = owner
            .access()
            .read(model, property.name())
            .map(Field::into_value)
            .unwrap_or_default();
        if current.is_null() {
            owner
                .access()
                .write(model, property.name(), Field::Value(default.clone()))?;
        }
    }
    Ok(())
}

fn json_of(owner: &EmbeddableEntity, registry: &Registry, model: &dyn Model) -> Result<serde_json::Value> {
    let mut map = serde_json::Map::new();
    for property in owner.properties() {
        let field = owner.access().read(model, property.name());
        let json = match (property.embedded_reference(), field) {
            (Some(reference), Some(Field::Embedded(record))) => {
                json_of(registry.embeddable(reference)?, registry, &record)?
            }
            (Some(_), _) => serde_json::Value::Null,
            (None, field) => field
                .map(Field::into_value)
                .unwrap_or_default()
                .to_json(),
        };
        map.insert(property.name().to_string(), json);
    }
    Ok(serde_json::Value::Object(map))
}
