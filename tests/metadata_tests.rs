mod common;

use entitymap::{
    AssociationKind, AssociationSpec, EmbeddableEntity, Entity, EntityMapError, Property,
    PropertyType, Record, Registry, Value,
};

#[test]
fn test_association_defaults_follow_target_and_owner() {
    let registry = common::registry();
    let project = registry.entity("Project").expect("project");

    let bugs = project.association("Bugs").expect("bugs");
    assert_eq!(bugs.target(), "Bug");
    assert_eq!(bugs.key(), "ProjectID");
    assert_eq!(bugs.ref_key(), "ProjectID");
    assert_eq!(bugs.kind(), &AssociationKind::OneToMany);

    let members = project.association("Members").expect("members");
    assert_eq!(members.key(), "UserID");
    assert_eq!(members.ref_key(), "ProjectID");

    let bug = registry.entity("Bug").expect("bug");
    let owner = bug.association("Project").expect("project");
    assert_eq!(owner.ref_key(), "ProjectID");
    assert!(!owner.is_optional());

    let user = registry.entity("User").expect("user");
    assert!(user.association("Profile").expect("profile").is_optional());
}

#[test]
fn test_kind_filters() {
    let registry = common::registry();
    let project = registry.entity("Project").expect("project");
    assert_eq!(project.one_to_many().count(), 1);
    assert_eq!(project.many_to_many().count(), 1);
    assert_eq!(project.many_to_one().count(), 0);
    let user = registry.entity("User").expect("user");
    assert_eq!(user.one_to_one().count(), 1);
}

#[test]
fn test_plural_defaults_to_name_with_suffix() {
    let entity = Entity::new("Bug", "bugs");
    assert_eq!(entity.plural(), "Bugs");
    let entity = Entity::new("Category", "categories").with_plural("Categories");
    assert_eq!(entity.plural(), "Categories");
}

#[test]
fn test_association_to_unmapped_entity_fails() {
    let mut registry = common::registry();
    let err = registry
        .associate("Bug", AssociationSpec::many_to_one("Ticket", "ProjectID"))
        .unwrap_err();
    assert!(matches!(err, EntityMapError::Configuration(_)));
}

#[test]
fn test_validate_rejects_missing_key_property() {
    let mut registry = common::registry();
    registry
        .associate("Project", AssociationSpec::one_to_many("Bug", "OwnerID").named("Owned"))
        .expect("associate");
    let err = registry.validate().unwrap_err();
    assert!(err.to_string().contains("OwnerID"));
}

#[test]
fn test_validate_rejects_unknown_embeddable() {
    let mut registry = Registry::new();
    registry.add_entity(
        Entity::new("Shop", "shops")
            .with_property(Property::new("ID", "id", PropertyType::Int).primary_key())
            .with_property(Property::embedded("Location", "Coordinates")),
    );
    assert!(matches!(
        registry.validate().unwrap_err(),
        EntityMapError::Configuration(_)
    ));
}

#[test]
fn test_primary_keys_keep_declaration_order() {
    let registry = common::registry();
    let membership = registry.entity("Membership").expect("membership");
    assert_eq!(membership.primary_keys(), ["ProjectID", "UserID"]);
    assert_eq!(membership.main_primary_key().expect("pk"), "ProjectID");
    assert!(
        Entity::new("Log", "logs")
            .main_primary_key()
            .is_err()
    );
}

#[test]
fn test_property_replacement_keeps_position() {
    let mut embeddable = EmbeddableEntity::new("Address");
    embeddable.add_property(Property::new("Street", "street", PropertyType::Varchar));
    embeddable.add_property(Property::new("City", "city", PropertyType::Varchar));
    embeddable.add_property(Property::new("Street", "street_line", PropertyType::Text));
    let names: Vec<&str> = embeddable.properties().iter().map(|p| p.name()).collect();
    assert_eq!(names, ["Street", "City"]);
    assert!(embeddable.property_by_column("street").is_none());
    assert_eq!(
        embeddable
            .property_by_column("street_line")
            .expect("street")
            .property_type(),
        &PropertyType::Text
    );
}

#[test]
fn test_column_values_flatten_embedded_groups() {
    let registry = common::registry();
    let user = registry.entity("User").expect("user");
    let record = Record::new("User")
        .with("UserID", 4)
        .with("Name", "Ann")
        .with("Address", Record::new("Address").with("City", "Paris"));
    let values: Vec<(String, Value)> = user
        .extract_values(&registry, &record)
        .expect("values");
    assert_eq!(
        values,
        vec![
            ("UserID".to_string(), Value::Int(4)),
            ("Name".to_string(), Value::from("Ann")),
            ("Street".to_string(), Value::Null),
            ("City".to_string(), Value::from("Paris")),
            ("ProfileID".to_string(), Value::Null),
        ]
    );
    assert_eq!(user.column_for(&registry, "City"), Some("city"));
    assert_eq!(user.extract_primary_key_values(&record), vec![Value::Int(4)]);
}

#[test]
fn test_embedded_property_has_no_column() {
    let property = Property::embedded("Address", "Address");
    assert!(property.is_embedded());
    assert_eq!(property.column(), None);
    assert_eq!(property.embedded_reference(), Some("Address"));
}
