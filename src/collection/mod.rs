//! Collection - the table manager of one registered type
//!
//! A collection owns the primary table of its type and one junction table
//! per list reference. It never looks at another type's schema: reference
//! targets are addressed by table name and UUID only.

mod read;
mod write;

use std::sync::Arc;

use rusqlite::types::Value as SqlValue;
use uuid::Uuid;

use crate::entity::Storable;
use crate::schema::naming::{UUID_COLUMN, quote_ident};
use crate::schema::PersistableType;
use crate::storage::{Database, UnitOfWork, schema};
use crate::{Error, ErrorKind, Result};

/// Table manager bound to one [`PersistableType`].
#[derive(Debug, Clone)]
pub struct Collection {
    ty: Arc<PersistableType>,
}

impl Collection {
    /// Bind `ty` to the store, creating its tables when absent.
    pub fn new(db: &Database, ty: Arc<PersistableType>) -> Result<Self> {
        let collection = Self { ty };
        collection.materialize(db)?;
        Ok(collection)
    }

    pub fn type_info(&self) -> &PersistableType {
        &self.ty
    }

    pub fn table_name(&self) -> &str {
        self.ty.table_name()
    }

    /// Names of the junction tables owned by this collection
    pub fn junction_names(&self) -> Vec<&str> {
        self.ty.junction_tables().map(|j| j.name.as_str()).collect()
    }

    fn materialize(&self, db: &Database) -> Result<()> {
        let table = self.table_name();
        if db.table_exists(table).map_err(|e| schema_failure(table, e))? {
            self.verify_columns(db)?;
            tracing::debug!(target: "persistkit::collection", "reusing table {}", table);
        } else {
            db.execute(&schema::create_table(&self.ty), &[])
                .map_err(|e| schema_failure(table, e))?;
            tracing::info!(target: "persistkit::collection", "created table {}", table);
        }

        for junction in self.ty.junction_tables() {
            if db.table_exists(&junction.name).map_err(|e| schema_failure(&junction.name, e))? {
                continue;
            }
            db.execute(&schema::create_junction_table(junction), &[])
                .and_then(|_| db.execute(&schema::create_junction_index(junction), &[]))
                .map_err(|e| schema_failure(&junction.name, e))?;
            tracing::info!(target: "persistkit::collection", "created junction table {}", junction.name);
        }
        Ok(())
    }

    /// An existing table must carry every column of the declared schema.
    fn verify_columns(&self, db: &Database) -> Result<()> {
        let table = self.table_name();
        let present = db.table_columns(table).map_err(|e| schema_failure(table, e))?;
        let missing: Vec<String> = schema::expected_columns(&self.ty)
            .into_iter()
            .filter(|c| !present.contains(&c.to_ascii_lowercase()))
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::new(
                ErrorKind::SchemaCreationFailure,
                format!(
                    "existing table {} lacks columns: {}",
                    table,
                    missing.join(", ")
                ),
            ))
        }
    }

    /// Refuse objects of any other runtime type
    pub fn check_type(&self, object: &dyn Storable) -> Result<()> {
        if self.ty.is_instance(object) {
            Ok(())
        } else {
            Err(Error::type_mismatch(self.ty.name(), object.type_label()))
        }
    }

    /// True if a row with this UUID exists
    pub fn exists(&self, db: &Database, uuid: Uuid) -> Result<bool> {
        exists_in(db, self.table_name(), uuid)
    }

    /// Rows in the primary table
    pub fn count(&self, db: &Database) -> Result<i64> {
        db.query_count(&format!("SELECT COUNT(*) FROM {}", quote_ident(self.table_name())), &[])
    }

    /// Rows in one of this collection's junction tables
    pub fn junction_count(&self, db: &Database, junction: &str) -> Result<i64> {
        db.query_count(&format!("SELECT COUNT(*) FROM {}", quote_ident(junction)), &[])
    }

    /// Append DROP statements for the junction tables
    pub(crate) fn drop_junctions(&self, unit: &mut UnitOfWork) {
        for junction in self.ty.junction_tables() {
            unit.push(schema::drop_table(&junction.name), Vec::new());
        }
    }

    /// Append the DROP statement for the primary table
    pub(crate) fn drop_primary(&self, unit: &mut UnitOfWork) {
        unit.push(schema::drop_table(self.table_name()), Vec::new());
    }

    /// Recreate the tables after a drop
    pub(crate) fn rematerialize(&self, db: &Database) -> Result<()> {
        self.materialize(db)
    }
}

pub(crate) fn uuid_param(uuid: Uuid) -> SqlValue {
    SqlValue::Text(uuid.to_string())
}

/// Existence lookup by UUID in any managed primary table
pub(crate) fn exists_in(db: &Database, table: &str, uuid: Uuid) -> Result<bool> {
    let sql = format!(
        "SELECT COUNT(*) FROM {} WHERE {} = ?1",
        quote_ident(table),
        quote_ident(UUID_COLUMN)
    );
    Ok(db.query_count(&sql, &[uuid_param(uuid)])? > 0)
}

fn schema_failure(table: &str, err: Error) -> Error {
    Error::new(
        ErrorKind::SchemaCreationFailure,
        format!("cannot materialize table {}", table),
    )
    .with_source(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::{self, Book, Customer, Store};
    use crate::storage::CursorMode;

    fn open() -> Database {
        Database::open_in_memory(CursorMode::Streaming).unwrap()
    }

    #[test]
    fn test_materialization_is_idempotent() {
        let db = open();
        let registry = sample::registry().unwrap();
        let store = registry.get::<Store>().unwrap();

        let first = Collection::new(&db, Arc::clone(store)).unwrap();
        assert!(db.table_exists("Store").unwrap());
        assert!(db.table_exists("StoreToBook").unwrap());
        assert_eq!(first.junction_names(), vec!["StoreToBook"]);

        // A second construction reuses the tables
        let second = Collection::new(&db, Arc::clone(store)).unwrap();
        assert_eq!(second.count(&db).unwrap(), 0);
    }

    #[test]
    fn test_incompatible_existing_table() {
        let db = open();
        db.execute("CREATE TABLE \"Book\" (\"uuid\" TEXT PRIMARY KEY, \"title\" TEXT)", &[])
            .unwrap();
        let registry = sample::registry().unwrap();

        let err = Collection::new(&db, Arc::clone(registry.get::<Book>().unwrap())).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaCreationFailure);
        assert!(err.message().contains("pages"));
    }

    #[test]
    fn test_check_type() {
        let db = open();
        let registry = sample::registry().unwrap();
        let books = Collection::new(&db, Arc::clone(registry.get::<Book>().unwrap())).unwrap();

        assert!(books.check_type(&Book::titled("Dune")).is_ok());
        let err = books.check_type(&Customer::named("Ada")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
        assert!(err.message().contains("Customer"));
    }
}
