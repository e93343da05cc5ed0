//! Registration and closure validation of the participating types

use std::any::TypeId;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::entity::{DeclaredType, Entity};
use crate::{Error, ErrorKind, Result};

use super::builder::TypeDescriptor;
use super::naming;
use super::{AttributeKind, JunctionTable, PersistableType, PersistedAttribute};

/// Classify a type's declared attributes.
///
/// `known` is the full set of registered type names; a reference to any
/// other name is an `UnknownReferenceType` error.
pub fn derive_type(descriptor: TypeDescriptor, known: &HashSet<&str>) -> Result<PersistableType> {
    let type_name = descriptor.name;
    naming::validate_identifier(type_name)?;

    if descriptor.attributes.is_empty() {
        return Err(Error::new(
            ErrorKind::NoPersistableAttributes,
            format!("{} declares no persisted attributes", type_name),
        ));
    }

    let mut seen = HashSet::new();
    let mut attributes = Vec::with_capacity(descriptor.attributes.len());

    for decl in descriptor.attributes {
        naming::check_attribute_name(type_name, &decl.name)?;
        if !seen.insert(decl.name.to_ascii_lowercase()) {
            return Err(Error::configuration(format!(
                "{} declares attribute '{}' twice",
                type_name, decl.name
            )));
        }

        let kind = match decl.declared {
            DeclaredType::Primitive(kind) => AttributeKind::Scalar(kind),
            DeclaredType::Object(target) => {
                require_known(type_name, &decl.name, target, known)?;
                AttributeKind::EmbeddedReference {
                    target: target.to_string(),
                }
            }
            DeclaredType::ObjectList(target) => {
                require_known(type_name, &decl.name, target, known)?;
                AttributeKind::ListReference {
                    target: target.to_string(),
                    junction: JunctionTable::new(type_name, target),
                }
            }
            DeclaredType::Unsupported(label) => {
                return Err(Error::new(
                    ErrorKind::UnsupportedAttributeType,
                    format!("{}.{}: {} has no storage mapping", type_name, decl.name, label),
                ));
            }
        };

        attributes.push(PersistedAttribute::new(decl.name, kind, decl.accessor));
    }

    Ok(PersistableType::new(
        type_name,
        descriptor.type_id,
        attributes,
        descriptor.factory,
    ))
}

fn require_known(owner: &str, attribute: &str, target: &str, known: &HashSet<&str>) -> Result<()> {
    if known.contains(target) {
        Ok(())
    } else {
        Err(Error::new(
            ErrorKind::UnknownReferenceType,
            format!("{}.{} references unregistered type {}", owner, attribute, target),
        ))
    }
}

/// Collects type registrations; `build` validates them as one set.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    descriptors: Vec<TypeDescriptor>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entity type
    pub fn register<T: Entity>(&mut self) -> &mut Self {
        self.descriptors.push(TypeDescriptor::of::<T>());
        self
    }

    /// Names registered so far, in registration order
    pub fn names(&self) -> Vec<&'static str> {
        self.descriptors.iter().map(|d| d.name).collect()
    }

    /// Derive every participating type and check reference closure.
    ///
    /// `selection` is the ordered type list from configuration; an empty
    /// selection means every registered type, in registration order.
    pub fn build(self, selection: &[String]) -> Result<SchemaRegistry> {
        let mut by_name: HashMap<&'static str, TypeDescriptor> = HashMap::new();
        let mut order = Vec::new();
        for descriptor in self.descriptors {
            let name = descriptor.name;
            if by_name.iter().any(|(n, _)| n.eq_ignore_ascii_case(name)) {
                return Err(Error::configuration(format!("type {} is registered twice", name)));
            }
            order.push(name);
            by_name.insert(name, descriptor);
        }

        let selected: Vec<&'static str> = if selection.is_empty() {
            order
        } else {
            let mut chosen = Vec::with_capacity(selection.len());
            for wanted in selection {
                let name = order
                    .iter()
                    .copied()
                    .find(|n| *n == wanted.as_str())
                    .ok_or_else(|| {
                        Error::configuration(format!("configured type {} is not registered", wanted))
                    })?;
                if chosen.contains(&name) {
                    return Err(Error::configuration(format!("type {} is listed twice", name)));
                }
                chosen.push(name);
            }
            chosen
        };

        let known: HashSet<&str> = selected.iter().copied().collect();
        let mut types = Vec::with_capacity(selected.len());
        for name in &selected {
            let descriptor = by_name
                .remove(name)
                .ok_or_else(|| Error::configuration(format!("type {} is not registered", name)))?;
            types.push(Arc::new(derive_type(descriptor, &known)?));
        }

        check_table_names(&types)?;
        tracing::info!(target: "persistkit::schema", "registered {} types: {}", types.len(), selected.join(", "));

        Ok(SchemaRegistry::new(types))
    }
}

/// Primary and junction tables must not share a name.
fn check_table_names(types: &[Arc<PersistableType>]) -> Result<()> {
    let mut tables: HashMap<String, String> = HashMap::new();
    for ty in types {
        tables.insert(ty.table_name().to_ascii_lowercase(), format!("type {}", ty.name()));
    }

    for ty in types {
        for attribute in ty.list_attributes() {
            let Some(junction) = attribute.junction() else {
                continue;
            };
            let owner = format!("{}.{}", ty.name(), attribute.name());
            if let Some(existing) = tables.insert(junction.name.to_ascii_lowercase(), owner.clone()) {
                return Err(Error::configuration(format!(
                    "junction table {} of {} collides with {}",
                    junction.name, owner, existing
                )));
            }
        }
    }
    Ok(())
}

/// The validated, immutable set of participating types.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    types: Vec<Arc<PersistableType>>,
    by_type_id: HashMap<TypeId, usize>,
    by_name: HashMap<&'static str, usize>,
}

impl SchemaRegistry {
    fn new(types: Vec<Arc<PersistableType>>) -> Self {
        let by_type_id = types.iter().enumerate().map(|(i, t)| (t.type_id(), i)).collect();
        let by_name = types.iter().enumerate().map(|(i, t)| (t.name(), i)).collect();
        Self {
            types,
            by_type_id,
            by_name,
        }
    }

    /// All types, in configuration order
    pub fn types(&self) -> &[Arc<PersistableType>] {
        &self.types
    }

    pub fn get<T: Entity>(&self) -> Option<&Arc<PersistableType>> {
        self.by_type_id(TypeId::of::<T>())
    }

    pub fn by_type_id(&self, type_id: TypeId) -> Option<&Arc<PersistableType>> {
        self.by_type_id.get(&type_id).map(|&i| &self.types[i])
    }

    pub fn by_name(&self, name: &str) -> Option<&Arc<PersistableType>> {
        self.by_name.get(name).map(|&i| &self.types[i])
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Link, Storable};
    use crate::sample::{self, Address, Book, Customer, Person, Store};
    use crate::identity::Identity;
    use crate::schema::SchemaBuilder;
    use crate::value::PrimitiveKind;

    #[derive(Default)]
    struct Empty {
        identity: Identity,
    }

    impl Storable for Empty {
        fn identity(&self) -> &Identity {
            &self.identity
        }
        fn identity_mut(&mut self) -> &mut Identity {
            &mut self.identity
        }
    }

    impl Entity for Empty {
        const TYPE_NAME: &'static str = "Empty";
        fn describe(_schema: &mut SchemaBuilder<Self>) {}
    }

    #[derive(Default)]
    struct Reserved {
        identity: Identity,
        uuid: String,
    }

    impl Storable for Reserved {
        fn identity(&self) -> &Identity {
            &self.identity
        }
        fn identity_mut(&mut self) -> &mut Identity {
            &mut self.identity
        }
    }

    impl Entity for Reserved {
        const TYPE_NAME: &'static str = "Reserved";
        fn describe(schema: &mut SchemaBuilder<Self>) {
            schema.attribute("uuid", |r| &r.uuid, |r| &mut r.uuid);
        }
    }

    #[derive(Default)]
    struct Blob {
        identity: Identity,
        bytes: Vec<u8>,
    }

    impl Storable for Blob {
        fn identity(&self) -> &Identity {
            &self.identity
        }
        fn identity_mut(&mut self) -> &mut Identity {
            &mut self.identity
        }
    }

    impl Entity for Blob {
        const TYPE_NAME: &'static str = "Blob";
        fn describe(schema: &mut SchemaBuilder<Self>) {
            schema.attribute("bytes", |b| &b.bytes, |b| &mut b.bytes);
        }
    }

    /// Two list attributes of the same member type
    #[derive(Default)]
    struct Shelf {
        identity: Identity,
        books: Vec<Link<Book>>,
        featured: Vec<Link<Book>>,
    }

    impl Storable for Shelf {
        fn identity(&self) -> &Identity {
            &self.identity
        }
        fn identity_mut(&mut self) -> &mut Identity {
            &mut self.identity
        }
    }

    impl Entity for Shelf {
        const TYPE_NAME: &'static str = "Shelf";
        fn describe(schema: &mut SchemaBuilder<Self>) {
            schema
                .attribute("books", |s| &s.books, |s| &mut s.books)
                .attribute("featured", |s| &s.featured, |s| &mut s.featured);
        }
    }

    fn build(builder: RegistryBuilder) -> Result<SchemaRegistry> {
        builder.build(&[])
    }

    #[test]
    fn test_classifies_attributes() {
        let registry = sample::registry().unwrap();
        let customer = registry.get::<Customer>().unwrap();

        assert_eq!(
            customer.attribute("name").unwrap().kind(),
            &AttributeKind::Scalar(PrimitiveKind::Text)
        );
        assert_eq!(
            customer.attribute("address").unwrap().kind(),
            &AttributeKind::EmbeddedReference { target: "Address".into() }
        );

        let store = registry.get::<Store>().unwrap();
        let books = store.attribute("books").unwrap();
        assert_eq!(books.kind().target(), Some("Book"));
        assert_eq!(books.junction().unwrap().name, "StoreToBook");
        assert!(!books.has_column());
    }

    #[test]
    fn test_empty_type_is_rejected() {
        let mut builder = RegistryBuilder::new();
        builder.register::<Empty>();
        let err = build(builder).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoPersistableAttributes);
    }

    #[test]
    fn test_reserved_name_is_rejected() {
        let mut builder = RegistryBuilder::new();
        builder.register::<Reserved>();
        let err = build(builder).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ReservedAttributeName);
    }

    #[test]
    fn test_unsupported_type_is_rejected() {
        let mut builder = RegistryBuilder::new();
        builder.register::<Blob>();
        let err = build(builder).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedAttributeType);
    }

    #[test]
    fn test_closure_check_needs_every_target() {
        // Customer embeds Address, which is not registered here
        let mut builder = RegistryBuilder::new();
        builder.register::<Customer>();
        let err = build(builder).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownReferenceType);

        // Registration order does not matter
        let mut builder = RegistryBuilder::new();
        builder.register::<Customer>().register::<Address>();
        assert!(build(builder).is_ok());
    }

    #[test]
    fn test_selection_limits_the_closure() {
        let mut builder = RegistryBuilder::new();
        builder
            .register::<Address>()
            .register::<Customer>()
            .register::<Book>()
            .register::<Store>();

        let selection = vec!["Book".to_string(), "Store".to_string()];
        let registry = builder.build(&selection).unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.types()[0].name(), "Book");
        assert!(registry.get::<Customer>().is_none());

        let mut builder = RegistryBuilder::new();
        builder.register::<Address>().register::<Customer>();
        let err = builder.build(&["Customer".to_string()]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownReferenceType);
    }

    #[test]
    fn test_unknown_configured_type() {
        let mut builder = RegistryBuilder::new();
        builder.register::<Book>();
        let err = builder.build(&["Magazine".to_string()]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_duplicate_registration() {
        let mut builder = RegistryBuilder::new();
        builder.register::<Book>().register::<Book>();
        assert_eq!(build(builder).unwrap_err().kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_junction_collision() {
        let mut builder = RegistryBuilder::new();
        builder.register::<Book>().register::<Shelf>();
        let err = build(builder).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.message().contains("ShelfToBook"));
    }

    #[test]
    fn test_self_reference_is_allowed() {
        let mut builder = RegistryBuilder::new();
        builder.register::<Person>();
        let registry = build(builder).unwrap();
        let junction = registry.get::<Person>().unwrap().junction_tables().next().unwrap().clone();
        assert_eq!(junction.name, "PersonToPerson");
        assert_ne!(junction.owner_column, junction.member_column);
    }
}
