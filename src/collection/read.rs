//! Read path: row hydration
//!
//! A row becomes a blank instance with its identity restored and every
//! column assigned. References come back as `Link::Unresolved` holding
//! only the target UUID.

use rusqlite::types::Value as SqlValue;
use uuid::Uuid;

use super::{Collection, uuid_param};
use crate::entity::Storable;
use crate::identity::Identity;
use crate::query::Query;
use crate::schema::naming::{
    LAST_MODIFIED_COLUMN, REFCOUNT_COLUMN, REMOTE_ID_COLUMN, USN_COLUMN, UUID_COLUMN, quote_ident,
};
use crate::schema::{AttributeKind, JunctionTable};
use crate::storage::{Cursor, Database};
use crate::value::{Value, parse_uuid};
use crate::{Error, ErrorKind, Result};

impl Collection {
    /// Every stored object, in insertion order
    pub fn find_all(&self, db: &Database) -> Result<Vec<Box<dyn Storable>>> {
        let sql = format!("SELECT * FROM {} ORDER BY rowid", quote_ident(self.table_name()));
        let mut objects = db.query(&sql, &[], |cursor| self.hydrate_rows(cursor))?;
        for object in &mut objects {
            self.hydrate_lists(db, object.as_mut())?;
        }
        tracing::debug!(target: "persistkit::collection", "{}: read {} rows", self.table_name(), objects.len());
        Ok(objects)
    }

    /// The object stored under `uuid`, if any
    pub fn find_by_identity(&self, db: &Database, uuid: Uuid) -> Result<Option<Box<dyn Storable>>> {
        let sql = format!(
            "SELECT * FROM {} WHERE {} = ?1",
            quote_ident(self.table_name()),
            quote_ident(UUID_COLUMN)
        );
        let mut objects = db.query(&sql, &[uuid_param(uuid)], |cursor| self.hydrate_rows(cursor))?;
        if objects.len() > 1 {
            return Err(Error::new(
                ErrorKind::DuplicateIdentity,
                format!("{} rows of {} share uuid {}", objects.len(), self.table_name(), uuid),
            ));
        }

        match objects.pop() {
            Some(mut object) => {
                self.hydrate_lists(db, object.as_mut())?;
                Ok(Some(object))
            }
            None => Ok(None),
        }
    }

    /// Predicate queries are not provided.
    pub fn find_by_query(&self, _db: &Database, query: &Query) -> Result<Vec<Box<dyn Storable>>> {
        Err(Error::new(
            ErrorKind::NotImplemented,
            format!("query on {} ({}) is not supported", self.table_name(), query),
        ))
    }

    /// Member UUIDs of one owner in a junction table, in insertion order
    pub(crate) fn load_members(
        &self,
        db: &Database,
        junction: &JunctionTable,
        owner: Uuid,
    ) -> Result<Vec<Uuid>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = ?1 ORDER BY rowid",
            quote_ident(&junction.member_column),
            quote_ident(&junction.name),
            quote_ident(&junction.owner_column)
        );
        db.query_column(&sql, &[uuid_param(owner)])?
            .iter()
            .map(|raw| match raw {
                SqlValue::Text(s) => parse_uuid(s),
                _ => Err(Error::format(format!("{} holds a non-text member", junction.name))),
            })
            .collect()
    }

    fn hydrate_rows(&self, cursor: &mut dyn Cursor) -> Result<Vec<Box<dyn Storable>>> {
        let mut objects = Vec::new();
        while cursor.advance()? {
            objects.push(self.hydrate_row(cursor)?);
        }
        Ok(objects)
    }

    /// Build an object from the current row: identity first, then columns.
    fn hydrate_row(&self, cursor: &dyn Cursor) -> Result<Box<dyn Storable>> {
        let ty = self.type_info();
        let mut object = ty.new_instance();

        let uuid = cursor
            .get_string(UUID_COLUMN)?
            .ok_or_else(|| Error::format(format!("{} row without uuid", self.table_name())))?;
        let refcount = cursor.get_long(REFCOUNT_COLUMN)?.unwrap_or(0);
        *object.identity_mut() = Identity::restore(
            parse_uuid(&uuid)?,
            cursor.get_string(REMOTE_ID_COLUMN)?,
            cursor.get_long(USN_COLUMN)?.unwrap_or(0),
            cursor.get_datetime(LAST_MODIFIED_COLUMN)?,
            refcount > 0,
        );

        for attribute in ty.column_attributes() {
            let value = match attribute.kind() {
                AttributeKind::Scalar(kind) => cursor.get(attribute.name(), *kind)?,
                AttributeKind::EmbeddedReference { .. } => {
                    Value::reference_from_sql(cursor.value(attribute.name())?)?
                }
                AttributeKind::ListReference { .. } => continue,
            };
            // NULL leaves the field at its default
            if value == Value::Null {
                continue;
            }
            ty.write(object.as_mut(), attribute, value)?;
        }
        Ok(object)
    }

    fn hydrate_lists(&self, db: &Database, object: &mut dyn Storable) -> Result<()> {
        let ty = self.type_info();
        let owner = object.identity().uuid();
        for attribute in ty.list_attributes() {
            let Some(junction) = attribute.junction() else {
                continue;
            };
            let members = self.load_members(db, junction, owner)?;
            ty.write(object, attribute, Value::References(members))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::NaiveDate;

    use super::*;
    use crate::sample::{self, Address, Book, Customer};
    use crate::entity::Link;
    use crate::storage::CursorMode;

    fn books(db: &Database) -> Collection {
        let registry = sample::registry().unwrap();
        Collection::new(db, Arc::clone(registry.get::<Book>().unwrap())).unwrap()
    }

    #[test]
    fn test_empty_table_reads_empty() {
        let db = Database::open_in_memory(CursorMode::Buffered).unwrap();
        let books = books(&db);
        assert!(books.find_all(&db).unwrap().is_empty());
        assert!(books.find_by_identity(&db, Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn test_hydrated_scalars_and_identity() {
        let db = Database::open_in_memory(CursorMode::Streaming).unwrap();
        let books = books(&db);

        let mut book = Book::titled("Dune");
        book.pages = 412;
        book.price = 9.5;
        book.rating = 4.5;
        books.add_record(&db, &mut book).unwrap();

        let found = books.find_by_identity(&db, book.identity().uuid()).unwrap().unwrap();
        assert!(found.identity().is_persistent());
        assert!(!found.identity().is_used_in_relation());
        assert_eq!(found.identity().usn(), 1);

        let found = <dyn Storable as crate::entity::AsAny>::into_any(found)
            .downcast::<Book>()
            .unwrap();
        assert_eq!(found.title, "Dune");
        assert_eq!(found.pages, 412);
        assert_eq!(found.price, 9.5);
        assert_eq!(found.rating, 4.5);
        assert_eq!(found.identity().uuid(), book.identity().uuid());
    }

    #[test]
    fn test_embedded_reference_hydrates_unresolved() {
        let db = Database::open_in_memory(CursorMode::Streaming).unwrap();
        let registry = sample::registry().unwrap();
        let addresses = Collection::new(&db, Arc::clone(registry.get::<Address>().unwrap())).unwrap();
        let customers = Collection::new(&db, Arc::clone(registry.get::<Customer>().unwrap())).unwrap();

        let mut address = Address::new("1 Main St", "Springfield");
        addresses.add_record(&db, &mut address).unwrap();

        let mut customer = Customer::named("Ada");
        customer.since = NaiveDate::from_ymd_opt(2021, 11, 7).unwrap();
        customer.address = Some(Link::to(&address));
        customers.add_record(&db, &mut customer).unwrap();

        let found = customers.find_all(&db).unwrap().pop().unwrap();
        let found = <dyn Storable as crate::entity::AsAny>::into_any(found)
            .downcast::<Customer>()
            .unwrap();
        assert_eq!(found.since, customer.since);
        match found.address {
            Some(Link::Unresolved(uuid)) => assert_eq!(uuid, address.identity().uuid()),
            other => panic!("expected an unresolved link, got {:?}", other),
        }

        // The address row now counts one reference
        let stored = addresses.find_by_identity(&db, address.identity().uuid()).unwrap().unwrap();
        assert!(stored.identity().is_used_in_relation());
    }

    #[test]
    fn test_shared_uuid_is_duplicate_identity() {
        let db = Database::open_in_memory(CursorMode::Streaming).unwrap();
        // Every expected column, but no uniqueness on uuid
        db.execute(
            "CREATE TABLE \"Book\" (uuid TEXT, remoteid TEXT, usn INTEGER, lastmodified NUMERIC, \
             refcount INTEGER, title TEXT, pages INTEGER, price REAL, rating REAL)",
            &[],
        )
        .unwrap();
        let uuid = Uuid::new_v4();
        for title in ["Dune", "Emma"] {
            db.execute(
                "INSERT INTO \"Book\" (uuid, usn, refcount, title) VALUES (?1, 1, 0, ?2)",
                &[SqlValue::Text(uuid.to_string()), SqlValue::Text(title.into())],
            )
            .unwrap();
        }

        let books = books(&db);
        let err = books.find_by_identity(&db, uuid).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::DuplicateIdentity);
        assert_eq!(books.find_all(&db).unwrap().len(), 2);
    }

    #[test]
    fn test_find_by_query_is_not_implemented() {
        let db = Database::open_in_memory(CursorMode::Streaming).unwrap();
        let books = books(&db);
        let err = books.find_by_query(&db, &Query::new()).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::NotImplemented);
    }
}
