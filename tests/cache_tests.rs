use entitymap::{
    CacheEntry, IdentityCache, Object, SqlValue, Snapshot, Value, cache::hash_keys,
};

fn entry(entity: &str) -> CacheEntry {
    CacheEntry {
        object: Object::record(entity),
        original: Snapshot::default(),
    }
}

#[test]
fn test_single_key_hashes_to_its_text() {
    assert_eq!(hash_keys(&[Value::Int(5)]), "5");
    assert_eq!(hash_keys(&[Value::Int(5)]), hash_keys(&[Value::from("5")]));
    assert_eq!(hash_keys(&[Value::Int(1), Value::Int(2)]), "1;2");
    assert_eq!(hash_keys(&[Value::Int(1), Value::Null]), "1;");
}

#[test]
fn test_persist_retrieve_remove() {
    let mut cache = IdentityCache::new();
    let project = entry("Project");
    let handle = project.object.clone();
    cache.persist("Project", &[Value::Int(1)], project);
    let found = cache.retrieve("Project", &[Value::Int(1)]).expect("cached");
    assert!(Object::ptr_eq(&found.object, &handle));
    assert!(cache.retrieve("Bug", &[Value::Int(1)]).is_none());

    cache.remove("Project", &[Value::Int(1)]);
    assert!(cache.is_empty());
}

#[test]
fn test_persist_replaces_existing_entry() {
    let mut cache = IdentityCache::new();
    cache.persist("Project", &[Value::Int(1)], entry("Project"));
    let replacement = entry("Project");
    let handle = replacement.object.clone();
    cache.persist("Project", &[Value::Int(1)], replacement);
    assert_eq!(cache.len(), 1);
    let found = cache.retrieve("Project", &[Value::Int(1)]).expect("cached");
    assert!(Object::ptr_eq(&found.object, &handle));
}

#[test]
fn test_clear_entity_cache_keeps_other_entities() {
    let mut cache = IdentityCache::new();
    cache.persist("Project", &[Value::Int(1)], entry("Project"));
    cache.persist("Bug", &[Value::Int(1)], entry("Bug"));
    cache.persist("Bug", &[Value::Int(2)], entry("Bug"));
    cache.clear_entity_cache("Bug");
    assert_eq!(cache.len(), 1);
    cache.clear();
    assert!(cache.is_empty());
}

#[test]
fn test_snapshot_diff_lists_changed_columns() {
    let original: Snapshot = [
        ("id".to_string(), SqlValue::Integer(1)),
        ("name".to_string(), SqlValue::Text("Alpha".into())),
        ("status_id".to_string(), SqlValue::Integer(1)),
    ]
    .into_iter()
    .collect();
    let current: Snapshot = [
        ("id".to_string(), SqlValue::Integer(1)),
        ("name".to_string(), SqlValue::Text("Beta".into())),
        ("status_id".to_string(), SqlValue::Integer(1)),
    ]
    .into_iter()
    .collect();
    assert_eq!(original.changed_columns(&current), vec!["name"]);
    assert!(original.changed_columns(&original).is_empty());
}
