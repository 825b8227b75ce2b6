use ahash::AHashMap;
use tracing::debug;

use crate::{
    model::Object,
    value::{SqlValue, Value},
};

/// Column → SQL value pairs of an object as last read from or written to storage.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Snapshot {
    columns: Vec<(String, SqlValue)>,
}

impl Snapshot {
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.columns.iter().map(|(c, v)| (c.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Columns of `current` whose value differs from this snapshot, in `current` order.
    pub fn changed_columns<'a>(&self, current: &'a Snapshot) -> Vec<&'a str> {
        current
            .iter()
            .filter(|(column, value)| self.get(column) != Some(*value))
            .map(|(column, _)| column)
            .collect()
    }
}

impl FromIterator<(String, SqlValue)> for Snapshot {
    fn from_iter<T: IntoIterator<Item = (String, SqlValue)>>(iter: T) -> Self {
        Self {
            columns: iter.into_iter().collect(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct CacheEntry {
    pub object: Object,
    pub original: Snapshot,
}

/// Identity map: one live object per entity and primary key.
#[derive(Debug, Default)]
pub struct IdentityCache {
    entities: AHashMap<String, AHashMap<String, CacheEntry>>,
}

impl IdentityCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `entry`, replacing whatever was cached under the same key.
    pub fn persist(&mut self, entity: &str, keys: &[Value], entry: CacheEntry) {
        let hash = hash_keys(keys);
        debug!(target: "entitymap::cache", entity, key = %hash, "persist");
        self.entities
            .entry(entity.to_string())
            .or_default()
            .insert(hash, entry);
    }

    pub fn retrieve(&self, entity: &str, keys: &[Value]) -> Option<&CacheEntry> {
        self.entities.get(entity)?.get(&hash_keys(keys))
    }

    pub fn remove(&mut self, entity: &str, keys: &[Value]) {
        if let Some(entries) = self.entities.get_mut(entity) {
            entries.remove(&hash_keys(keys));
        }
    }

    pub fn clear_entity_cache(&mut self, entity: &str) {
        self.entities.remove(entity);
    }

    pub fn clear(&mut self) {
        self.entities.clear();
    }

    pub fn len(&self) -> usize {
        self.entities.values().map(|entries| entries.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Cache key of a primary-key tuple; a single value hashes to its own text.
pub fn hash_keys(keys: &[Value]) -> String {
    match keys {
        [single] => single.to_string(),
        many => many
            .iter()
            .map(Value::to_string)
            .collect::<Vec<_>>()
            .join(";"),
    }
}
