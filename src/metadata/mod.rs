//! Entity metadata: properties, entities, embeddables and associations.

pub mod access;
pub mod association;
pub mod entity;
pub mod property;
pub mod registry;

pub use access::{AccessMode, AccessPlan, AccessorMethodAccess, DirectFieldAccess, PropertyAccess};
pub use association::{Association, AssociationKind, AssociationSpec};
pub use entity::{EmbeddableEntity, Entity};
pub use property::Property;
pub use registry::Registry;
