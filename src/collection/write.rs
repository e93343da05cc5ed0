//! Write path: insert, update and remove as single units of work

use std::collections::HashSet;

use chrono::Utc;
use rusqlite::types::Value as SqlValue;
use uuid::Uuid;

use super::{Collection, exists_in, uuid_param};
use crate::entity::Storable;
use crate::schema::naming::{
    LAST_MODIFIED_COLUMN, REFCOUNT_COLUMN, REMOTE_ID_COLUMN, USN_COLUMN, UUID_COLUMN, quote_ident,
};
use crate::schema::{AttributeKind, JunctionTable, PersistedAttribute};
use crate::storage::{Database, UnitOfWork};
use crate::value::Value;
use crate::{Error, ErrorKind, Result};

/// In-memory state of one object, encoded for storage.
struct Snapshot<'a> {
    columns: Vec<(&'a PersistedAttribute, SqlValue)>,
    embedded: Vec<EmbeddedRef<'a>>,
    lists: Vec<ListRef<'a>>,
}

struct EmbeddedRef<'a> {
    attribute: &'a PersistedAttribute,
    target_table: &'a str,
    target: Option<Uuid>,
}

struct ListRef<'a> {
    attribute: &'a PersistedAttribute,
    target_table: &'a str,
    junction: &'a JunctionTable,
    /// Distinct members, first occurrence order
    members: Vec<Uuid>,
}

impl Collection {
    /// Insert `object`, or update it if its UUID is already stored.
    pub fn add_record(&self, db: &Database, object: &mut dyn Storable) -> Result<()> {
        self.check_type(object)?;
        let uuid = object.identity().uuid();

        if self.exists(db, uuid)? {
            tracing::debug!(target: "persistkit::collection", "{} {} exists, updating", self.table_name(), uuid);
            object.identity_mut().set_persistent(true);
            return self.update_record(db, object);
        }

        let snapshot = self.snapshot(object)?;
        for embedded in &snapshot.embedded {
            if let Some(target) = embedded.target {
                self.require_persisted(db, uuid, embedded.attribute, embedded.target_table, target)?;
            }
        }
        for list in &snapshot.lists {
            for &member in &list.members {
                self.require_persisted(db, uuid, list.attribute, list.target_table, member)?;
            }
        }

        let now = Utc::now();
        let usn = 1;
        let mut unit = UnitOfWork::new(format!("add {} {}", self.table_name(), uuid));

        let mut names = vec![
            quote_ident(UUID_COLUMN),
            quote_ident(REMOTE_ID_COLUMN),
            quote_ident(USN_COLUMN),
            quote_ident(LAST_MODIFIED_COLUMN),
            quote_ident(REFCOUNT_COLUMN),
        ];
        let mut params = vec![
            uuid_param(uuid),
            remote_id_param(object),
            SqlValue::Integer(usn),
            SqlValue::Integer(now.timestamp_millis()),
            SqlValue::Integer(0),
        ];
        for (attribute, value) in &snapshot.columns {
            names.push(quote_ident(attribute.name()));
            params.push(value.clone());
        }
        let placeholders: Vec<String> = (1..=params.len()).map(|i| format!("?{}", i)).collect();
        unit.push(
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                quote_ident(self.table_name()),
                names.join(", "),
                placeholders.join(", ")
            ),
            params,
        );

        for embedded in &snapshot.embedded {
            if let Some(target) = embedded.target {
                push_increment(&mut unit, embedded.target_table, target);
            }
        }
        for list in &snapshot.lists {
            for &member in &list.members {
                push_link(&mut unit, list.junction, uuid, member);
                push_increment(&mut unit, list.target_table, member);
            }
        }

        db.run(&unit)?;
        object.identity_mut().mark_written(usn, now);
        self.type_info().mark_references_used(object);
        tracing::debug!(target: "persistkit::collection", "added {} {}", self.table_name(), uuid);
        Ok(())
    }

    /// Write the current state of a persisted object.
    ///
    /// Columns are rewritten and every junction table is reconciled to the
    /// in-memory member set. An object whose state matches its row is left
    /// untouched, `usn` included.
    pub fn update_record(&self, db: &Database, object: &mut dyn Storable) -> Result<()> {
        self.check_type(object)?;
        let uuid = object.identity().uuid();
        if !object.identity().is_persistent() {
            return Err(not_persisted(self.table_name(), uuid));
        }

        let stored = self.load_stored(db, uuid)?.ok_or_else(|| not_persisted(self.table_name(), uuid))?;
        let snapshot = self.snapshot(object)?;

        let columns_changed = snapshot
            .columns
            .iter()
            .any(|(attribute, value)| stored.column(attribute.name()) != Some(value));

        let label = format!("update {} {}", self.table_name(), uuid);
        let mut relations = UnitOfWork::new(label.clone());

        for embedded in &snapshot.embedded {
            let previous = stored.reference(embedded.attribute.name())?;
            if previous == embedded.target {
                continue;
            }
            if let Some(target) = embedded.target {
                self.require_persisted(db, uuid, embedded.attribute, embedded.target_table, target)?;
                push_increment(&mut relations, embedded.target_table, target);
            }
            if let Some(old) = previous {
                push_decrement(&mut relations, embedded.target_table, old);
            }
        }

        for list in &snapshot.lists {
            let current = self.load_members(db, list.junction, uuid)?;
            let current_set: HashSet<Uuid> = current.iter().copied().collect();
            let wanted: HashSet<Uuid> = list.members.iter().copied().collect();

            for &member in current.iter().filter(|m| !wanted.contains(m)) {
                push_unlink(&mut relations, list.junction, uuid, member);
                push_decrement(&mut relations, list.target_table, member);
            }
            for &member in list.members.iter().filter(|m| !current_set.contains(m)) {
                self.require_persisted(db, uuid, list.attribute, list.target_table, member)?;
                push_link(&mut relations, list.junction, uuid, member);
                push_increment(&mut relations, list.target_table, member);
            }
        }

        if !columns_changed && relations.is_empty() {
            tracing::debug!(target: "persistkit::collection", "{} {} unchanged", self.table_name(), uuid);
            self.type_info().mark_references_used(object);
            return Ok(());
        }

        let now = Utc::now();
        let usn = stored.usn + 1;
        let mut assignments = vec![
            format!("{} = ?1", quote_ident(USN_COLUMN)),
            format!("{} = ?2", quote_ident(LAST_MODIFIED_COLUMN)),
            format!("{} = ?3", quote_ident(REMOTE_ID_COLUMN)),
        ];
        let mut params = vec![
            SqlValue::Integer(usn),
            SqlValue::Integer(now.timestamp_millis()),
            remote_id_param(object),
        ];
        for (attribute, value) in &snapshot.columns {
            params.push(value.clone());
            assignments.push(format!("{} = ?{}", quote_ident(attribute.name()), params.len()));
        }
        params.push(uuid_param(uuid));
        let row_update = format!(
            "UPDATE {} SET {} WHERE {} = ?{}",
            quote_ident(self.table_name()),
            assignments.join(", "),
            quote_ident(UUID_COLUMN),
            params.len()
        );

        let mut unit = UnitOfWork::new(label);
        unit.push(row_update, params);
        unit.append(relations);

        db.run(&unit)?;
        object.identity_mut().mark_written(usn, now);
        self.type_info().mark_references_used(object);
        tracing::debug!(target: "persistkit::collection", "updated {} {} (usn {})", self.table_name(), uuid, usn);
        Ok(())
    }

    /// Delete a persisted object and its junction rows.
    ///
    /// The object's relation flag is refreshed from its row first; an object
    /// still referenced by another persisted object is refused.
    pub fn remove_record(&self, db: &Database, object: &mut dyn Storable) -> Result<()> {
        self.check_type(object)?;
        let uuid = object.identity().uuid();
        if !object.identity().is_persistent() {
            return Err(not_persisted(self.table_name(), uuid));
        }

        let stored = self.load_stored(db, uuid)?.ok_or_else(|| not_persisted(self.table_name(), uuid))?;
        object.identity_mut().set_used_in_relation(stored.refcount > 0);
        if stored.refcount > 0 {
            tracing::warn!(
                target: "persistkit::collection",
                "refusing to remove {} {}: {} live references",
                self.table_name(),
                uuid,
                stored.refcount
            );
            return Err(Error::new(
                ErrorKind::ReferencedObject,
                format!(
                    "{} {} is still referenced by {} persisted object(s)",
                    self.table_name(),
                    uuid,
                    stored.refcount
                ),
            ));
        }

        let mut unit = UnitOfWork::new(format!("remove {} {}", self.table_name(), uuid));
        for attribute in self.type_info().embedded_attributes() {
            if let (Some(target), Some(table)) = (stored.reference(attribute.name())?, attribute.kind().target()) {
                push_decrement(&mut unit, table, target);
            }
        }
        for attribute in self.type_info().list_attributes() {
            let (Some(junction), Some(table)) = (attribute.junction(), attribute.kind().target()) else {
                continue;
            };
            for member in self.load_members(db, junction, uuid)? {
                push_decrement(&mut unit, table, member);
            }
            unit.push(
                format!(
                    "DELETE FROM {} WHERE {} = ?1",
                    quote_ident(&junction.name),
                    quote_ident(&junction.owner_column)
                ),
                vec![uuid_param(uuid)],
            );
        }
        unit.push(
            format!(
                "DELETE FROM {} WHERE {} = ?1",
                quote_ident(self.table_name()),
                quote_ident(UUID_COLUMN)
            ),
            vec![uuid_param(uuid)],
        );

        db.run(&unit)?;
        object.identity_mut().mark_removed();
        tracing::debug!(target: "persistkit::collection", "removed {} {}", self.table_name(), uuid);
        Ok(())
    }

    fn snapshot<'a>(&'a self, object: &dyn Storable) -> Result<Snapshot<'a>> {
        let ty = self.type_info();
        let mut snapshot = Snapshot {
            columns: Vec::new(),
            embedded: Vec::new(),
            lists: Vec::new(),
        };

        for attribute in ty.attribute_descriptors() {
            let value = ty.read(object, attribute)?;
            match attribute.kind() {
                AttributeKind::Scalar(_) => {
                    snapshot.columns.push((attribute, value.to_sql()?));
                }
                AttributeKind::EmbeddedReference { target } => {
                    let uuid = match value {
                        Value::Reference(uuid) => uuid,
                        Value::Null => None,
                        other => return Err(unexpected_value(attribute, &other)),
                    };
                    snapshot.columns.push((attribute, Value::Reference(uuid).to_sql()?));
                    snapshot.embedded.push(EmbeddedRef {
                        attribute,
                        target_table: target,
                        target: uuid,
                    });
                }
                AttributeKind::ListReference { target, junction } => {
                    let members = match value {
                        Value::References(members) => members,
                        Value::Null => Vec::new(),
                        other => return Err(unexpected_value(attribute, &other)),
                    };
                    let mut seen = HashSet::new();
                    let members = members.into_iter().filter(|m| seen.insert(*m)).collect();
                    snapshot.lists.push(ListRef {
                        attribute,
                        target_table: target,
                        junction,
                        members,
                    });
                }
            }
        }
        Ok(snapshot)
    }

    /// Targets must already be stored; an object may reference itself.
    fn require_persisted(
        &self,
        db: &Database,
        owner: Uuid,
        attribute: &PersistedAttribute,
        target_table: &str,
        target: Uuid,
    ) -> Result<()> {
        if target == owner && target_table == self.table_name() {
            return Ok(());
        }
        if exists_in(db, target_table, target)? {
            return Ok(());
        }
        tracing::warn!(
            target: "persistkit::collection",
            "{}.{} references unpersisted {} {}",
            self.table_name(),
            attribute.name(),
            target_table,
            target
        );
        Err(Error::new(
            ErrorKind::UnpersistedDependency,
            format!(
                "{}.{} references {} {}, which has not been persisted",
                self.table_name(),
                attribute.name(),
                target_table,
                target
            ),
        ))
    }

    /// The stored row of `uuid`, every column by name
    fn load_stored(&self, db: &Database, uuid: Uuid) -> Result<Option<StoredRow>> {
        let sql = format!(
            "SELECT * FROM {} WHERE {} = ?1",
            quote_ident(self.table_name()),
            quote_ident(UUID_COLUMN)
        );
        db.query(&sql, &[uuid_param(uuid)], |cursor| {
            if !cursor.advance()? {
                return Ok(None);
            }
            let usn = cursor.get_long(USN_COLUMN)?.unwrap_or(0);
            let refcount = cursor.get_long(REFCOUNT_COLUMN)?.unwrap_or(0);
            let mut values = Vec::with_capacity(cursor.columns().len());
            for column in cursor.columns() {
                values.push((column.clone(), cursor.value(column)?.clone()));
            }
            Ok(Some(StoredRow {
                usn,
                refcount,
                values,
            }))
        })
    }
}

struct StoredRow {
    usn: i64,
    refcount: i64,
    values: Vec<(String, SqlValue)>,
}

impl StoredRow {
    fn column(&self, name: &str) -> Option<&SqlValue> {
        self.values
            .iter()
            .find(|(column, _)| column.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    }

    fn reference(&self, name: &str) -> Result<Option<Uuid>> {
        match self.column(name) {
            Some(raw) => match Value::reference_from_sql(raw)? {
                Value::Reference(uuid) => Ok(uuid),
                _ => Ok(None),
            },
            None => Ok(None),
        }
    }
}

fn remote_id_param(object: &dyn Storable) -> SqlValue {
    match object.identity().remote_id() {
        Some(id) => SqlValue::Text(id.to_string()),
        None => SqlValue::Null,
    }
}

fn push_link(unit: &mut UnitOfWork, junction: &JunctionTable, owner: Uuid, member: Uuid) {
    unit.push(
        format!(
            "INSERT OR REPLACE INTO {} ({}, {}) VALUES (?1, ?2)",
            quote_ident(&junction.name),
            quote_ident(&junction.owner_column),
            quote_ident(&junction.member_column)
        ),
        vec![uuid_param(owner), uuid_param(member)],
    );
}

fn push_unlink(unit: &mut UnitOfWork, junction: &JunctionTable, owner: Uuid, member: Uuid) {
    unit.push(
        format!(
            "DELETE FROM {} WHERE {} = ?1 AND {} = ?2",
            quote_ident(&junction.name),
            quote_ident(&junction.owner_column),
            quote_ident(&junction.member_column)
        ),
        vec![uuid_param(owner), uuid_param(member)],
    );
}

fn push_increment(unit: &mut UnitOfWork, table: &str, target: Uuid) {
    unit.push(
        format!(
            "UPDATE {} SET {rc} = {rc} + 1 WHERE {} = ?1",
            quote_ident(table),
            quote_ident(UUID_COLUMN),
            rc = quote_ident(REFCOUNT_COLUMN)
        ),
        vec![uuid_param(target)],
    );
}

fn push_decrement(unit: &mut UnitOfWork, table: &str, target: Uuid) {
    unit.push(
        format!(
            "UPDATE {} SET {rc} = MAX({rc} - 1, 0) WHERE {} = ?1",
            quote_ident(table),
            quote_ident(UUID_COLUMN),
            rc = quote_ident(REFCOUNT_COLUMN)
        ),
        vec![uuid_param(target)],
    );
}

fn not_persisted(table: &str, uuid: Uuid) -> Error {
    Error::new(
        ErrorKind::NotPersisted,
        format!("{} {} has not been persisted", table, uuid),
    )
}

fn unexpected_value(attribute: &PersistedAttribute, value: &Value) -> Error {
    Error::format(format!(
        "attribute {} produced a {} value",
        attribute.name(),
        value.type_label()
    ))
}
