//! Object model: the `Model` capability mapped types implement, the generic `Record`
//! property bag and the shared `Object` handle tracked by the identity cache.

use std::{
    any::Any,
    cell::{Cell, Ref, RefCell, RefMut},
    fmt,
    rc::Rc,
};

use ahash::AHashMap;

use crate::value::Value;

/// Content of one named slot on a mapped object.
#[derive(Clone, Debug)]
pub enum Field {
    Value(Value),
    Embedded(Record),
    One(Option<Object>),
    Many(Collection),
}

impl Field {
    pub fn into_value(self) -> Value {
        match self {
            Field::Value(v) => v,
            _ => Value::Null,
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Field::Value(v) => Some(v),
            _ => None,
        }
    }
}

impl<T: Into<Value>> From<T> for Field {
    fn from(value: T) -> Self {
        Field::Value(value.into())
    }
}

impl From<Record> for Field {
    fn from(value: Record) -> Self {
        Field::Embedded(value)
    }
}

impl From<Collection> for Field {
    fn from(value: Collection) -> Self {
        Field::Many(value)
    }
}

/// Capability implemented by every mapped type.
///
/// `field`/`set_field` are the plain member slots. Types that route some properties
/// through accessor methods report it with `has_accessor` and override `get`/`set`;
/// the mapper resolves which path to use once per property.
pub trait Model: Any {
    fn field(&self, name: &str) -> Option<Field>;

    /// Returns false when the type has no member of that name.
    fn set_field(&mut self, name: &str, value: Field) -> bool;

    fn has_accessor(&self, _property: &str) -> bool {
        false
    }

    fn get(&self, property: &str) -> Option<Field> {
        self.field(property)
    }

    fn set(&mut self, property: &str, value: Field) -> bool {
        self.set_field(property, value)
    }

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Generic property bag used when no concrete type is registered for an entity and
/// for embedded instances.
#[derive(Clone, Debug, Default)]
pub struct Record {
    entity: String,
    fields: AHashMap<String, Field>,
}

impl Record {
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            fields: AHashMap::new(),
        }
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn with(mut self, name: &str, value: impl Into<Field>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }

    pub fn value(&self, name: &str) -> Value {
        self.fields
            .get(name)
            .and_then(Field::as_value)
            .cloned()
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Model for Record {
    fn field(&self, name: &str) -> Option<Field> {
        self.fields.get(name).cloned()
    }

    fn set_field(&mut self, name: &str, value: Field) -> bool {
        self.fields.insert(name.to_string(), value);
        true
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleState {
    Transient,
    Managed,
    Removed,
}

struct ObjectCell {
    entity: String,
    state: Cell<LifecycleState>,
    model: RefCell<Box<dyn Model>>,
}

/// Shared handle to a mapped instance. Clones point at the same instance; equality
/// is identity.
#[derive(Clone)]
pub struct Object {
    inner: Rc<ObjectCell>,
}

impl Object {
    pub fn new(entity: impl Into<String>, model: impl Model) -> Self {
        Self::from_boxed(entity, Box::new(model), LifecycleState::Transient)
    }

    /// Transient object backed by a `Record`.
    pub fn record(entity: impl Into<String>) -> Self {
        let entity = entity.into();
        let record = Record::new(entity.clone());
        Self::new(entity, record)
    }

    pub(crate) fn from_boxed(
        entity: impl Into<String>,
        model: Box<dyn Model>,
        state: LifecycleState,
    ) -> Self {
        Self {
            inner: Rc::new(ObjectCell {
                entity: entity.into(),
                state: Cell::new(state),
                model: RefCell::new(model),
            }),
        }
    }

    pub fn entity_name(&self) -> &str {
        &self.inner.entity
    }

    pub fn state(&self) -> LifecycleState {
        self.inner.state.get()
    }

    pub fn is_managed(&self) -> bool {
        self.state() == LifecycleState::Managed
    }

    pub(crate) fn set_state(&self, state: LifecycleState) {
        self.inner.state.set(state);
    }

    pub fn borrow(&self) -> Ref<'_, dyn Model> {
        Ref::map(self.inner.model.borrow(), |m| m.as_ref())
    }

    pub fn borrow_mut(&self) -> RefMut<'_, dyn Model> {
        RefMut::map(self.inner.model.borrow_mut(), |m| m.as_mut())
    }

    /// Reads a slot through the type's public accessor path.
    pub fn get(&self, name: &str) -> Option<Field> {
        self.borrow().get(name)
    }

    pub fn value(&self, name: &str) -> Value {
        self.get(name).map(Field::into_value).unwrap_or_default()
    }

    pub fn set(&self, name: &str, value: impl Into<Field>) -> bool {
        self.borrow_mut().set(name, value.into())
    }

    pub fn with<T: 'static, R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        let model = self.borrow();
        model.as_any().downcast_ref::<T>().map(f)
    }

    pub fn with_mut<T: 'static, R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let mut model = self.borrow_mut();
        model.as_any_mut().downcast_mut::<T>().map(f)
    }

    pub fn ptr_eq(a: &Object, b: &Object) -> bool {
        Rc::ptr_eq(&a.inner, &b.inner)
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        Object::ptr_eq(self, other)
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("entity", &self.inner.entity)
            .field("state", &self.state())
            .finish()
    }
}

/// Member of a to-many collection: a mapped object or a bare key of the target.
#[derive(Clone, Debug, PartialEq)]
pub enum Member {
    Object(Object),
    Key(Value),
}

impl From<Object> for Member {
    fn from(value: Object) -> Self {
        Member::Object(value)
    }
}

impl From<Value> for Member {
    fn from(value: Value) -> Self {
        Member::Key(value)
    }
}

/// Value of a one-to-many or many-to-many slot.
///
/// Members added since the last save are pending. A collection built with
/// `replacing` drops every stored link of the parent before relinking its members.
#[derive(Clone, Debug, Default)]
pub struct Collection {
    items: Vec<Member>,
    pending: Vec<bool>,
    remove_all: bool,
}

impl Collection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replacing<I, M>(items: I) -> Self
    where
        I: IntoIterator<Item = M>,
        M: Into<Member>,
    {
        let mut collection = Self::new();
        collection.extend(items);
        collection.remove_all = true;
        collection
    }

    pub(crate) fn loaded(items: Vec<Object>) -> Self {
        let pending = vec![false; items.len()];
        Self {
            items: items.into_iter().map(Member::Object).collect(),
            pending,
            remove_all: false,
        }
    }

    pub fn push(&mut self, member: impl Into<Member>) {
        self.items.push(member.into());
        self.pending.push(true);
    }

    pub fn extend<I, M>(&mut self, items: I)
    where
        I: IntoIterator<Item = M>,
        M: Into<Member>,
    {
        for item in items {
            self.push(item);
        }
    }

    /// Marks the collection for wholesale replacement on the next save.
    pub fn remove_all(&mut self) {
        self.remove_all = true;
    }

    pub fn is_remove_all(&self) -> bool {
        self.remove_all
    }

    pub fn members(&self) -> &[Member] {
        &self.items
    }

    pub fn pending(&self) -> impl Iterator<Item = &Member> {
        self.items
            .iter()
            .zip(self.pending.iter())
            .filter(|(_, pending)| **pending)
            .map(|(member, _)| member)
    }

    pub fn objects(&self) -> impl Iterator<Item = &Object> {
        self.items.iter().filter_map(|m| match m {
            Member::Object(obj) => Some(obj),
            Member::Key(_) => None,
        })
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub(crate) fn mark_synced(&mut self) {
        self.remove_all = false;
        self.pending.iter_mut().for_each(|p| *p = false);
    }
}

impl<M: Into<Member>> FromIterator<M> for Collection {
    fn from_iter<T: IntoIterator<Item = M>>(iter: T) -> Self {
        let mut collection = Collection::new();
        collection.extend(iter);
        collection
    }
}
