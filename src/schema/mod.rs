//! Schema Registry - declared attributes classified into storage shapes
//!
//! Every registered type becomes a [`PersistableType`]: an ordered list of
//! [`PersistedAttribute`]s, each one of
//! - `Scalar`: one column holding a primitive value
//! - `EmbeddedReference`: one column holding the target's UUID
//! - `ListReference`: no column, a `<Owner>To<Member>` junction table

pub mod builder;
pub mod naming;
pub mod registry;

use std::any::TypeId;

use crate::entity::Storable;
use crate::value::{PrimitiveKind, StorageKind, Value};
use crate::{Error, ErrorKind, Result};
use builder::{Accessor, foreign_object};

pub use builder::{SchemaBuilder, TypeDescriptor};
pub use registry::{RegistryBuilder, SchemaRegistry, derive_type};

/// Physical junction table of a list reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JunctionTable {
    pub name: String,
    pub owner_column: String,
    pub member_column: String,
}

impl JunctionTable {
    pub fn new(owner: &str, member: &str) -> Self {
        let (owner_column, member_column) = naming::junction_columns(owner, member);
        Self {
            name: naming::junction_table_name(owner, member),
            owner_column,
            member_column,
        }
    }
}

/// Storage shape of an attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeKind {
    Scalar(PrimitiveKind),
    EmbeddedReference { target: String },
    ListReference { target: String, junction: JunctionTable },
}

impl AttributeKind {
    /// Column type, or `None` for list references
    pub fn storage_kind(&self) -> Option<StorageKind> {
        match self {
            AttributeKind::Scalar(kind) => Some(kind.storage_kind()),
            AttributeKind::EmbeddedReference { .. } => Some(StorageKind::Text),
            AttributeKind::ListReference { .. } => None,
        }
    }

    /// Name of the referenced type, for reference attributes
    pub fn target(&self) -> Option<&str> {
        match self {
            AttributeKind::Scalar(_) => None,
            AttributeKind::EmbeddedReference { target } => Some(target),
            AttributeKind::ListReference { target, .. } => Some(target),
        }
    }
}

/// A classified attribute with its accessor binding
#[derive(Debug)]
pub struct PersistedAttribute {
    name: String,
    kind: AttributeKind,
    accessor: Accessor,
}

impl PersistedAttribute {
    pub(crate) fn new(name: String, kind: AttributeKind, accessor: Accessor) -> Self {
        Self { name, kind, accessor }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &AttributeKind {
        &self.kind
    }

    /// True if this attribute owns a column on the primary table
    pub fn has_column(&self) -> bool {
        self.kind.storage_kind().is_some()
    }

    pub fn junction(&self) -> Option<&JunctionTable> {
        match &self.kind {
            AttributeKind::ListReference { junction, .. } => Some(junction),
            _ => None,
        }
    }
}

/// The derived, immutable schema of one registered type.
#[derive(Debug)]
pub struct PersistableType {
    name: &'static str,
    type_id: TypeId,
    attributes: Vec<PersistedAttribute>,
    factory: fn() -> Box<dyn Storable>,
}

impl PersistableType {
    pub(crate) fn new(
        name: &'static str,
        type_id: TypeId,
        attributes: Vec<PersistedAttribute>,
        factory: fn() -> Box<dyn Storable>,
    ) -> Self {
        Self {
            name,
            type_id,
            attributes,
            factory,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Primary table; named after the type
    pub fn table_name(&self) -> &str {
        self.name
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn attribute_descriptors(&self) -> &[PersistedAttribute] {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&PersistedAttribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Scalar and embedded-reference attributes, in declaration order
    pub fn column_attributes(&self) -> impl Iterator<Item = &PersistedAttribute> {
        self.attributes.iter().filter(|a| a.has_column())
    }

    /// Embedded-reference attributes
    pub fn embedded_attributes(&self) -> impl Iterator<Item = &PersistedAttribute> {
        self.attributes
            .iter()
            .filter(|a| matches!(a.kind, AttributeKind::EmbeddedReference { .. }))
    }

    /// List-reference attributes
    pub fn list_attributes(&self) -> impl Iterator<Item = &PersistedAttribute> {
        self.attributes.iter().filter(|a| a.junction().is_some())
    }

    pub fn junction_tables(&self) -> impl Iterator<Item = &JunctionTable> {
        self.attributes.iter().filter_map(|a| a.junction())
    }

    /// True if `object`'s runtime type is this type
    pub fn is_instance(&self, object: &dyn Storable) -> bool {
        object.as_any().type_id() == self.type_id
    }

    /// Blank instance used by the read path
    pub fn new_instance(&self) -> Box<dyn Storable> {
        (self.factory)()
    }

    /// Read an attribute by name
    pub fn get(&self, object: &dyn Storable, name: &str) -> Result<Value> {
        let attribute = self.require(name)?;
        self.read(object, attribute)
    }

    /// Assign an attribute by name
    pub fn set(&self, object: &mut dyn Storable, name: &str, value: Value) -> Result<()> {
        let attribute = self.require(name)?;
        self.write(object, attribute, value)
    }

    pub(crate) fn read(&self, object: &dyn Storable, attribute: &PersistedAttribute) -> Result<Value> {
        attribute
            .accessor
            .get(object.as_any())
            .ok_or_else(|| foreign_object(self.name))
    }

    pub(crate) fn write(
        &self,
        object: &mut dyn Storable,
        attribute: &PersistedAttribute,
        value: Value,
    ) -> Result<()> {
        attribute
            .accessor
            .set(object.as_any_mut(), value)
            .ok_or_else(|| foreign_object(self.name))?
    }

    /// Flag in-memory resolved targets of every reference attribute
    pub(crate) fn mark_references_used(&self, object: &mut dyn Storable) {
        for attribute in self.attributes.iter().filter(|a| a.kind.target().is_some()) {
            attribute.accessor.mark_used_in_relation(object.as_any_mut());
        }
    }

    fn require(&self, name: &str) -> Result<&PersistedAttribute> {
        self.attribute(name).ok_or_else(|| {
            Error::new(
                ErrorKind::ColumnNotFound,
                format!("{} has no attribute '{}'", self.name, name),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::{self, Book, Customer};

    #[test]
    fn test_get_and_set_by_name() {
        let registry = sample::registry().unwrap();
        let ty = registry.get::<Customer>().unwrap();

        let mut customer = Customer::named("Ada");
        assert_eq!(ty.get(&customer, "name").unwrap(), Value::Text("Ada".into()));

        ty.set(&mut customer, "age", Value::Int(36)).unwrap();
        assert_eq!(customer.age, 36);

        let err = ty.get(&customer, "nope").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ColumnNotFound);
    }

    #[test]
    fn test_wrong_type_is_mismatch() {
        let registry = sample::registry().unwrap();
        let ty = registry.get::<Customer>().unwrap();
        let book = Book::titled("Dune");

        assert!(!ty.is_instance(&book));
        let err = ty.get(&book, "name").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
    }

    #[test]
    fn test_attribute_partitions() {
        let registry = sample::registry().unwrap();
        let store = registry.by_name("Store").unwrap();

        let columns: Vec<_> = store.column_attributes().map(|a| a.name()).collect();
        assert_eq!(columns, vec!["name", "opened"]);

        let junctions: Vec<_> = store.junction_tables().map(|j| j.name.as_str()).collect();
        assert_eq!(junctions, vec!["StoreToBook"]);
    }
}
