//! Persistence context
//!
//! [`Persistence`] is constructed explicitly by the caller and owns the
//! store handle, the schema registry and one [`Collection`] per registered
//! type. Dropping it (or calling [`Persistence::close`]) releases the store.

use std::any::TypeId;
use std::collections::HashMap;
use std::path::Path;

use serde::Serialize;
use uuid::Uuid;

use crate::collection::Collection;
use crate::config::{Config, ensure_db_dir};
use crate::entity::{AsAny, Entity, Link, Storable};
use crate::query::Query;
use crate::schema::{RegistryBuilder, SchemaRegistry};
use crate::storage::{Database, UnitOfWork};
use crate::{Error, ErrorKind, Result};

/// Kind of a managed table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TableKind {
    Primary,
    Junction,
}

impl TableKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TableKind::Primary => "primary",
            TableKind::Junction => "junction",
        }
    }
}

/// Row count of one managed table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableStats {
    pub table: String,
    pub kind: TableKind,
    pub rows: i64,
}

/// Owner of the store, the registry and the collections.
pub struct Persistence {
    db: Database,
    registry: SchemaRegistry,
    collections: Vec<Collection>,
    by_type: HashMap<TypeId, usize>,
}

impl Persistence {
    /// Validate the configured types, open the store and materialize every table.
    pub fn open(config: &Config, builder: RegistryBuilder) -> Result<Self> {
        let registry = builder.build(&config.types)?;
        if !config.is_in_memory() {
            ensure_db_dir(Path::new(&config.database))?;
        }
        let db = Database::open_location(&config.database, config.cursor)?;
        Self::with_database(db, registry)
    }

    /// Bind an already validated registry to an open store
    pub fn with_database(db: Database, registry: SchemaRegistry) -> Result<Self> {
        let mut collections = Vec::with_capacity(registry.len());
        let mut by_type = HashMap::new();
        for ty in registry.types() {
            by_type.insert(ty.type_id(), collections.len());
            collections.push(Collection::new(&db, ty.clone())?);
        }

        tracing::info!(
            target: "persistkit::collection",
            "opened {} with {} collections ({} cursor)",
            db.location(),
            collections.len(),
            db.cursor_mode().as_str()
        );
        Ok(Self {
            db,
            registry,
            collections,
            by_type,
        })
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn collections(&self) -> &[Collection] {
        &self.collections
    }

    /// Collection of a registered type
    pub fn collection<T: Entity>(&self) -> Result<&Collection> {
        self.collection_by_id(TypeId::of::<T>(), T::TYPE_NAME)
    }

    /// Collection of an object's runtime type
    pub fn collection_for(&self, object: &dyn Storable) -> Result<&Collection> {
        self.collection_by_id(object.as_any().type_id(), object.type_label())
    }

    fn collection_by_id(&self, type_id: TypeId, label: &str) -> Result<&Collection> {
        self.by_type
            .get(&type_id)
            .map(|&i| &self.collections[i])
            .ok_or_else(|| Error::configuration(format!("type {} is not registered", label)))
    }

    // ========== Write Path ==========

    pub fn add<T: Entity>(&self, object: &mut T) -> Result<()> {
        self.collection::<T>()?.add_record(&self.db, object)
    }

    pub fn update<T: Entity>(&self, object: &mut T) -> Result<()> {
        self.collection::<T>()?.update_record(&self.db, object)
    }

    pub fn remove<T: Entity>(&self, object: &mut T) -> Result<()> {
        self.collection::<T>()?.remove_record(&self.db, object)
    }

    /// `add` for an object whose type is only known at runtime
    pub fn add_object(&self, object: &mut dyn Storable) -> Result<()> {
        self.collection_for(object)?.add_record(&self.db, object)
    }

    pub fn update_object(&self, object: &mut dyn Storable) -> Result<()> {
        self.collection_for(object)?.update_record(&self.db, object)
    }

    pub fn remove_object(&self, object: &mut dyn Storable) -> Result<()> {
        self.collection_for(object)?.remove_record(&self.db, object)
    }

    // ========== Read Path ==========

    pub fn find_all<T: Entity>(&self) -> Result<Vec<T>> {
        self.collection::<T>()?
            .find_all(&self.db)?
            .into_iter()
            .map(downcast::<T>)
            .collect()
    }

    pub fn find_by_identity<T: Entity>(&self, uuid: Uuid) -> Result<Option<T>> {
        self.collection::<T>()?
            .find_by_identity(&self.db, uuid)?
            .map(downcast::<T>)
            .transpose()
    }

    pub fn find_by_query<T: Entity>(&self, query: &Query) -> Result<Vec<T>> {
        self.collection::<T>()?
            .find_by_query(&self.db, query)?
            .into_iter()
            .map(downcast::<T>)
            .collect()
    }

    /// Load the target of an unresolved link through its own collection.
    pub fn resolve<T: Entity>(&self, link: &mut Link<T>) -> Result<()> {
        let Link::Unresolved(uuid) = *link else {
            return Ok(());
        };
        let target = self.find_by_identity::<T>(uuid)?.ok_or_else(|| {
            Error::new(
                ErrorKind::NotPersisted,
                format!("{} {} is referenced but not stored", T::TYPE_NAME, uuid),
            )
        })?;
        *link = Link::resolved(target);
        Ok(())
    }

    /// Resolve every link of a list reference
    pub fn resolve_all<T: Entity>(&self, links: &mut [Link<T>]) -> Result<()> {
        for link in links.iter_mut() {
            self.resolve(link)?;
        }
        Ok(())
    }

    // ========== Maintenance ==========

    /// Drop every managed table, junction tables first, then recreate them empty.
    pub fn clear(&self) -> Result<()> {
        let mut unit = UnitOfWork::new("clear");
        for collection in &self.collections {
            collection.drop_junctions(&mut unit);
        }
        for collection in &self.collections {
            collection.drop_primary(&mut unit);
        }
        self.db.run(&unit)?;

        for collection in &self.collections {
            collection.rematerialize(&self.db)?;
        }
        tracing::info!(target: "persistkit::collection", "cleared {} tables", unit.len());
        Ok(())
    }

    /// Row counts of every primary and junction table
    pub fn stats(&self) -> Result<Vec<TableStats>> {
        let mut stats = Vec::new();
        for collection in &self.collections {
            stats.push(TableStats {
                table: collection.table_name().to_string(),
                kind: TableKind::Primary,
                rows: collection.count(&self.db)?,
            });
            for junction in collection.junction_names() {
                stats.push(TableStats {
                    table: junction.to_string(),
                    kind: TableKind::Junction,
                    rows: collection.junction_count(&self.db, junction)?,
                });
            }
        }
        Ok(stats)
    }

    /// Release the store handle
    pub fn close(self) -> Result<()> {
        self.db.close()
    }
}

fn downcast<T: Entity>(object: Box<dyn Storable>) -> Result<T> {
    let found = (*object).type_label();
    <dyn Storable as AsAny>::into_any(object)
        .downcast::<T>()
        .map(|boxed| *boxed)
        .map_err(|_| Error::type_mismatch(T::TYPE_NAME, found))
}
