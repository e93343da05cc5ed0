//! Storable objects, their attribute fields, and references between them
//!
//! A type takes part in persistence by implementing [`Entity`]: it names
//! itself, exposes its [`Identity`], and declares its attributes once through
//! a [`SchemaBuilder`]. Every declared field implements [`Attribute`], which
//! carries both the field's declared type (used for classification) and its
//! conversion to and from [`Value`].

use std::any::Any;

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::identity::Identity;
use crate::schema::SchemaBuilder;
use crate::value::{PrimitiveKind, Value};
use crate::{Error, ErrorKind, Result};

/// Access to the concrete type behind a trait object.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
    /// Rust type name of the concrete type
    fn type_label(&self) -> &'static str;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }

    fn type_label(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

/// Object-safe capability shared by every storable object.
pub trait Storable: AsAny {
    fn identity(&self) -> &Identity;
    fn identity_mut(&mut self) -> &mut Identity;
}

/// A registrable storable type.
///
/// ```text
/// #[derive(Default)]
/// struct Customer {
///     identity: Identity,
///     name: String,
///     address: Option<Link<Address>>,
/// }
///
/// impl Entity for Customer {
///     const TYPE_NAME: &'static str = "Customer";
///
///     fn describe(schema: &mut SchemaBuilder<Self>) {
///         schema
///             .attribute("name", |c| &c.name, |c| &mut c.name)
///             .attribute("address", |c| &c.address, |c| &mut c.address);
///     }
/// }
/// ```
///
/// `Default` is used by the read path to build a blank instance before the
/// row's identity and attributes are restored into it.
pub trait Entity: Storable + Default {
    /// Type name; also the primary table name.
    const TYPE_NAME: &'static str;

    /// Declare the persisted attributes of this type.
    fn describe(schema: &mut SchemaBuilder<Self>);
}

/// Declared type of an attribute, before classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeclaredType {
    Primitive(PrimitiveKind),
    /// A single storable type, by name
    Object(&'static str),
    /// A homogeneous ordered collection of a storable type
    ObjectList(&'static str),
    /// Anything without a storage mapping
    Unsupported(&'static str),
}

/// A field type that can be declared as a persisted attribute.
pub trait Attribute: Sized {
    fn declared_type() -> DeclaredType;

    fn to_value(&self) -> Value;

    fn from_value(value: Value) -> Result<Self>;

    /// Flag every resolved target held by this field as used in a relation.
    fn mark_used_in_relation(&mut self) {}
}

/// A reference to another storable object.
///
/// Objects read back from the store only carry the target's UUID
/// (`Unresolved`); the target's own collection resolves it on demand.
#[derive(Debug, Clone, PartialEq)]
pub enum Link<T> {
    Unresolved(Uuid),
    Resolved(Box<T>),
}

impl<T: Storable> Link<T> {
    /// Reference an existing object by identity only
    pub fn to(target: &T) -> Self {
        Link::Unresolved(target.identity().uuid())
    }

    /// Reference an object, keeping it in memory
    pub fn resolved(target: T) -> Self {
        Link::Resolved(Box::new(target))
    }

    /// UUID of the referenced object
    pub fn uuid(&self) -> Uuid {
        match self {
            Link::Unresolved(uuid) => *uuid,
            Link::Resolved(target) => target.identity().uuid(),
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Link::Resolved(_))
    }

    /// The target, if resolved
    pub fn get(&self) -> Option<&T> {
        match self {
            Link::Unresolved(_) => None,
            Link::Resolved(target) => Some(target.as_ref()),
        }
    }

    pub fn get_mut(&mut self) -> Option<&mut T> {
        match self {
            Link::Unresolved(_) => None,
            Link::Resolved(target) => Some(target.as_mut()),
        }
    }

    pub fn into_inner(self) -> Option<T> {
        match self {
            Link::Unresolved(_) => None,
            Link::Resolved(target) => Some(*target),
        }
    }

    fn mark_used_in_relation(&mut self) {
        if let Link::Resolved(target) = self {
            target.identity_mut().set_used_in_relation(true);
        }
    }
}

fn unexpected(expected: PrimitiveKind, found: &Value) -> Error {
    Error::format(format!("expected a {} value, got {}", expected, found.type_label()))
}

macro_rules! primitive_attribute {
    ($ty:ty, $kind:ident) => {
        impl Attribute for $ty {
            fn declared_type() -> DeclaredType {
                DeclaredType::Primitive(PrimitiveKind::$kind)
            }

            fn to_value(&self) -> Value {
                Value::$kind(self.clone())
            }

            fn from_value(value: Value) -> Result<Self> {
                match value {
                    Value::$kind(v) => Ok(v),
                    Value::Null => Err(Error::format(format!(
                        "unexpected NULL for a {} attribute",
                        PrimitiveKind::$kind
                    ))),
                    other => Err(unexpected(PrimitiveKind::$kind, &other)),
                }
            }
        }
    };
}

primitive_attribute!(String, Text);
primitive_attribute!(bool, Boolean);
primitive_attribute!(i32, Int);
primitive_attribute!(i64, Long);
primitive_attribute!(f32, Float);
primitive_attribute!(f64, Double);
primitive_attribute!(NaiveDate, Date);
primitive_attribute!(DateTime<Utc>, DateTime);

macro_rules! unsupported_attribute {
    ($ty:ty, $label:expr) => {
        impl Attribute for $ty {
            fn declared_type() -> DeclaredType {
                DeclaredType::Unsupported($label)
            }

            fn to_value(&self) -> Value {
                Value::Null
            }

            fn from_value(_value: Value) -> Result<Self> {
                Err(Error::new(
                    ErrorKind::UnsupportedAttributeType,
                    format!("{} attributes cannot be stored", $label),
                ))
            }
        }
    };
}

unsupported_attribute!(Vec<u8>, "byte array");
unsupported_attribute!(Vec<String>, "list of text");
unsupported_attribute!(Vec<i64>, "list of long");

impl<U: Entity> Attribute for Option<Link<U>> {
    fn declared_type() -> DeclaredType {
        DeclaredType::Object(U::TYPE_NAME)
    }

    fn to_value(&self) -> Value {
        Value::Reference(self.as_ref().map(Link::uuid))
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Reference(target) => Ok(target.map(Link::Unresolved)),
            Value::Null => Ok(None),
            other => Err(Error::format(format!(
                "expected a reference to {}, got {}",
                U::TYPE_NAME,
                other.type_label()
            ))),
        }
    }

    fn mark_used_in_relation(&mut self) {
        if let Some(link) = self {
            link.mark_used_in_relation();
        }
    }
}

impl<U: Entity> Attribute for Vec<Link<U>> {
    fn declared_type() -> DeclaredType {
        DeclaredType::ObjectList(U::TYPE_NAME)
    }

    fn to_value(&self) -> Value {
        Value::References(self.iter().map(Link::uuid).collect())
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::References(members) => Ok(members.into_iter().map(Link::Unresolved).collect()),
            Value::Null => Ok(Vec::new()),
            other => Err(Error::format(format!(
                "expected references to {}, got {}",
                U::TYPE_NAME,
                other.type_label()
            ))),
        }
    }

    fn mark_used_in_relation(&mut self) {
        for link in self.iter_mut() {
            link.mark_used_in_relation();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::Book;

    #[test]
    fn test_primitive_declared_types() {
        assert_eq!(String::declared_type(), DeclaredType::Primitive(PrimitiveKind::Text));
        assert_eq!(bool::declared_type(), DeclaredType::Primitive(PrimitiveKind::Boolean));
        assert_eq!(
            NaiveDate::declared_type(),
            DeclaredType::Primitive(PrimitiveKind::Date)
        );
        assert!(matches!(Vec::<u8>::declared_type(), DeclaredType::Unsupported(_)));
    }

    #[test]
    fn test_primitive_value_conversion() {
        assert_eq!(42i64.to_value(), Value::Long(42));
        assert_eq!(i32::from_value(Value::Int(7)).unwrap(), 7);
        let err = String::from_value(Value::Long(1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
        assert!(bool::from_value(Value::Null).is_err());
    }

    #[test]
    fn test_reference_attributes_use_target_name() {
        assert_eq!(Option::<Link<Book>>::declared_type(), DeclaredType::Object("Book"));
        assert_eq!(Vec::<Link<Book>>::declared_type(), DeclaredType::ObjectList("Book"));
    }

    #[test]
    fn test_links_hydrate_unresolved() {
        let book = Book::titled("Dune");
        let uuid = book.identity().uuid();

        let list = vec![Link::resolved(book)];
        assert_eq!(list.to_value(), Value::References(vec![uuid]));

        let back = Vec::<Link<Book>>::from_value(Value::References(vec![uuid])).unwrap();
        assert_eq!(back.len(), 1);
        assert!(!back[0].is_resolved());
        assert_eq!(back[0].uuid(), uuid);

        let none = Option::<Link<Book>>::from_value(Value::Reference(None)).unwrap();
        assert!(none.is_none());
    }

    #[test]
    fn test_mark_used_in_relation_only_touches_resolved() {
        let mut field = Some(Link::resolved(Book::titled("Emma")));
        field.mark_used_in_relation();
        let book = field.as_ref().and_then(|l| l.get()).unwrap();
        assert!(book.identity().is_used_in_relation());

        let mut placeholder: Option<Link<Book>> = Some(Link::Unresolved(Uuid::new_v4()));
        placeholder.mark_used_in_relation();
        assert!(!placeholder.unwrap().is_resolved());
    }
}
