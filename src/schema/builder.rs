//! Declared schema of a single type, before classification

use std::any::{Any, TypeId};
use std::marker::PhantomData;
use std::sync::Arc;

use crate::entity::{Attribute, DeclaredType, Entity, Storable};
use crate::value::Value;
use crate::{Error, Result};

type Getter = Box<dyn Fn(&dyn Any) -> Option<Value> + Send + Sync>;
type Setter = Box<dyn Fn(&mut dyn Any, Value) -> Option<Result<()>> + Send + Sync>;
type Marker = Box<dyn Fn(&mut dyn Any) + Send + Sync>;

/// Type-erased get/set binding of one attribute.
///
/// Each closure returns `None` when handed an object of another type.
pub struct Accessor {
    get: Getter,
    set: Setter,
    mark: Marker,
}

impl Accessor {
    pub(crate) fn get(&self, object: &dyn Any) -> Option<Value> {
        (self.get)(object)
    }

    pub(crate) fn set(&self, object: &mut dyn Any, value: Value) -> Option<Result<()>> {
        (self.set)(object, value)
    }

    pub(crate) fn mark_used_in_relation(&self, object: &mut dyn Any) {
        (self.mark)(object)
    }
}

impl std::fmt::Debug for Accessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Accessor")
    }
}

/// One declared attribute
#[derive(Debug)]
pub struct AttributeDecl {
    pub name: String,
    pub declared: DeclaredType,
    pub(crate) accessor: Accessor,
}

/// Collects the attribute declarations of `T` inside [`Entity::describe`].
pub struct SchemaBuilder<T> {
    attributes: Vec<AttributeDecl>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Entity> SchemaBuilder<T> {
    fn new() -> Self {
        Self {
            attributes: Vec::new(),
            _marker: PhantomData,
        }
    }

    /// Declare a persisted attribute bound to a field of `T`.
    pub fn attribute<A, G, M>(&mut self, name: &str, get: G, get_mut: M) -> &mut Self
    where
        A: Attribute + 'static,
        G: Fn(&T) -> &A + Send + Sync + 'static,
        M: Fn(&mut T) -> &mut A + Send + Sync + 'static,
    {
        let get_mut = Arc::new(get_mut);
        let set_field = Arc::clone(&get_mut);

        let accessor = Accessor {
            get: Box::new(move |object: &dyn Any| {
                object.downcast_ref::<T>().map(|target| get(target).to_value())
            }),
            set: Box::new(move |object: &mut dyn Any, value: Value| {
                object.downcast_mut::<T>().map(|target| {
                    *(*set_field)(target) = A::from_value(value)?;
                    Ok(())
                })
            }),
            mark: Box::new(move |object: &mut dyn Any| {
                if let Some(target) = object.downcast_mut::<T>() {
                    (*get_mut)(target).mark_used_in_relation();
                }
            }),
        };

        self.attributes.push(AttributeDecl {
            name: name.to_string(),
            declared: A::declared_type(),
            accessor,
        });
        self
    }
}

/// Everything known about a registered type before the registry classifies it.
#[derive(Debug)]
pub struct TypeDescriptor {
    pub name: &'static str,
    pub type_id: TypeId,
    pub attributes: Vec<AttributeDecl>,
    pub(crate) factory: fn() -> Box<dyn Storable>,
}

impl TypeDescriptor {
    /// Run `T::describe` and capture the declarations
    pub fn of<T: Entity>() -> Self {
        let mut builder = SchemaBuilder::<T>::new();
        T::describe(&mut builder);

        Self {
            name: T::TYPE_NAME,
            type_id: TypeId::of::<T>(),
            attributes: builder.attributes,
            factory: new_boxed::<T>,
        }
    }
}

fn new_boxed<T: Entity>() -> Box<dyn Storable> {
    Box::new(T::default())
}

/// Error for an accessor that was handed the wrong concrete type
pub(crate) fn foreign_object(type_name: &str) -> Error {
    Error::type_mismatch(type_name, "an object of another type")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::{Book, Customer};
    use crate::value::PrimitiveKind;

    #[test]
    fn test_descriptor_captures_declarations() {
        let descriptor = TypeDescriptor::of::<Customer>();
        assert_eq!(descriptor.name, "Customer");
        let names: Vec<_> = descriptor.attributes.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["name", "age", "vip", "since", "address"]);
        assert_eq!(
            descriptor.attributes[0].declared,
            DeclaredType::Primitive(PrimitiveKind::Text)
        );
        assert_eq!(descriptor.attributes[4].declared, DeclaredType::Object("Address"));
    }

    #[test]
    fn test_accessor_get_and_set() {
        let descriptor = TypeDescriptor::of::<Book>();
        let title = &descriptor.attributes[0];

        let mut book = Book::titled("Dune");
        assert_eq!(title.accessor.get(&book), Some(Value::Text("Dune".into())));

        let result = title.accessor.set(&mut book, Value::Text("Emma".into()));
        assert!(matches!(result, Some(Ok(()))));
        assert_eq!(book.title, "Emma");
    }

    #[test]
    fn test_accessor_rejects_foreign_objects() {
        let descriptor = TypeDescriptor::of::<Book>();
        let customer = Customer::named("Ada");
        assert!(descriptor.attributes[0].accessor.get(&customer).is_none());
    }

    #[test]
    fn test_factory_builds_blank_instance() {
        let descriptor = TypeDescriptor::of::<Book>();
        let blank = (descriptor.factory)();
        assert!(!blank.identity().is_persistent());
        assert!((*blank).as_any().downcast_ref::<Book>().is_some());
    }
}
