//! Table definitions synthesized from a [`PersistableType`]

use crate::schema::naming::{
    LAST_MODIFIED_COLUMN, METADATA_COLUMNS, REFCOUNT_COLUMN, REMOTE_ID_COLUMN, USN_COLUMN,
    UUID_COLUMN, quote_ident,
};
use crate::schema::{JunctionTable, PersistableType};

/// SQL to look a table up in the store metadata
pub const TABLE_EXISTS: &str =
    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1 COLLATE NOCASE";

/// SQL listing the column names of a table
pub const TABLE_COLUMNS: &str = "SELECT name FROM pragma_table_info(?1)";

/// Metadata column definitions, in table order
fn metadata_column_defs() -> Vec<String> {
    vec![
        format!("{} TEXT PRIMARY KEY NOT NULL", quote_ident(UUID_COLUMN)),
        format!("{} TEXT", quote_ident(REMOTE_ID_COLUMN)),
        format!("{} INTEGER NOT NULL DEFAULT 0", quote_ident(USN_COLUMN)),
        format!("{} INTEGER", quote_ident(LAST_MODIFIED_COLUMN)),
        format!("{} INTEGER NOT NULL DEFAULT 0", quote_ident(REFCOUNT_COLUMN)),
    ]
}

/// SQL to create the primary table of a type
pub fn create_table(ty: &PersistableType) -> String {
    let mut columns = metadata_column_defs();
    for attribute in ty.column_attributes() {
        if let Some(storage) = attribute.kind().storage_kind() {
            columns.push(format!("{} {}", quote_ident(attribute.name()), storage.sql_type()));
        }
    }

    format!(
        "CREATE TABLE {} ({})",
        quote_ident(ty.table_name()),
        columns.join(", ")
    )
}

/// SQL to create a junction table
pub fn create_junction_table(junction: &JunctionTable) -> String {
    let owner = quote_ident(&junction.owner_column);
    let member = quote_ident(&junction.member_column);
    format!(
        "CREATE TABLE {} ({} TEXT NOT NULL, {} TEXT NOT NULL, PRIMARY KEY ({}, {}))",
        quote_ident(&junction.name),
        owner,
        member,
        owner,
        member
    )
}

/// SQL to index the member side of a junction table
pub fn create_junction_index(junction: &JunctionTable) -> String {
    format!(
        "CREATE INDEX IF NOT EXISTS {} ON {}({})",
        quote_ident(&format!("idx_{}_{}", junction.name, junction.member_column)),
        quote_ident(&junction.name),
        quote_ident(&junction.member_column)
    )
}

/// Every column the primary table of `ty` must have, in table order
pub fn expected_columns(ty: &PersistableType) -> Vec<String> {
    METADATA_COLUMNS
        .iter()
        .map(|c| c.to_string())
        .chain(ty.column_attributes().map(|a| a.name().to_string()))
        .collect()
}

pub fn drop_table(name: &str) -> String {
    format!("DROP TABLE IF EXISTS {}", quote_ident(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::{self, Customer, Store};

    #[test]
    fn test_primary_table_columns() {
        let registry = sample::registry().unwrap();
        let sql = create_table(registry.get::<Customer>().unwrap());
        assert!(sql.starts_with("CREATE TABLE \"Customer\" (\"uuid\" TEXT PRIMARY KEY NOT NULL"));
        assert!(sql.contains("\"remoteid\" TEXT"));
        assert!(sql.contains("\"usn\" INTEGER"));
        assert!(sql.contains("\"vip\" NUMERIC"));
        assert!(sql.contains("\"since\" TEXT"));
        assert!(sql.contains("\"address\" TEXT"));
    }

    #[test]
    fn test_expected_columns_lead_with_metadata() {
        let registry = sample::registry().unwrap();
        let columns = expected_columns(registry.get::<Customer>().unwrap());
        assert_eq!(
            columns,
            vec!["uuid", "remoteid", "usn", "lastmodified", "refcount", "name", "age", "vip", "since", "address"]
        );
    }

    #[test]
    fn test_list_reference_has_no_column() {
        let registry = sample::registry().unwrap();
        let store = registry.get::<Store>().unwrap();
        let sql = create_table(store);
        assert!(!sql.contains("books"));
        assert!(sql.contains("\"opened\" NUMERIC"));

        let junction = store.junction_tables().next().unwrap();
        assert_eq!(
            create_junction_table(junction),
            "CREATE TABLE \"StoreToBook\" (\"storeuuid\" TEXT NOT NULL, \"bookuuid\" TEXT NOT NULL, PRIMARY KEY (\"storeuuid\", \"bookuuid\"))"
        );
    }
}
