//! Table, column and junction naming rules

use std::sync::OnceLock;

use regex::Regex;

use crate::{Error, ErrorKind, Result};

/// Metadata column: primary key
pub const UUID_COLUMN: &str = "uuid";
/// Metadata column: remote identifier, reserved for sync
pub const REMOTE_ID_COLUMN: &str = "remoteid";
/// Metadata column: update sequence number
pub const USN_COLUMN: &str = "usn";
/// Metadata column: last write, epoch milliseconds
pub const LAST_MODIFIED_COLUMN: &str = "lastmodified";
/// Metadata column: number of live references to the row
pub const REFCOUNT_COLUMN: &str = "refcount";

/// All metadata columns, in table order
pub const METADATA_COLUMNS: &[&str] = &[
    UUID_COLUMN,
    REMOTE_ID_COLUMN,
    USN_COLUMN,
    LAST_MODIFIED_COLUMN,
    REFCOUNT_COLUMN,
];

/// SQL keywords that may not be used as attribute names
const SQL_KEYWORDS: &[&str] = &[
    "abort", "add", "all", "alter", "and", "as", "asc", "between", "by", "case", "check",
    "column", "commit", "constraint", "create", "cross", "default", "delete", "desc",
    "distinct", "drop", "else", "end", "escape", "except", "exists", "from", "full", "group",
    "having", "if", "in", "index", "inner", "insert", "intersect", "into", "is", "join", "key",
    "left", "like", "limit", "natural", "not", "null", "of", "offset", "on", "or", "order",
    "outer", "primary", "references", "right", "rollback", "rowid", "select", "set", "table",
    "then", "to", "transaction", "union", "unique", "update", "using", "values", "when",
    "where", "with",
];

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid")
    })
}

/// Check that a type or attribute name is a plain SQL identifier
pub fn validate_identifier(name: &str) -> Result<()> {
    if identifier_pattern().is_match(name) {
        Ok(())
    } else {
        Err(Error::configuration(format!(
            "'{}' is not a valid identifier (letters, digits and '_' only)",
            name
        )))
    }
}

/// True if `name` collides with a metadata column or an SQL keyword
pub fn is_reserved(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    METADATA_COLUMNS.contains(&lower.as_str()) || SQL_KEYWORDS.contains(&lower.as_str())
}

pub fn check_attribute_name(type_name: &str, name: &str) -> Result<()> {
    validate_identifier(name)?;
    if is_reserved(name) {
        return Err(Error::new(
            ErrorKind::ReservedAttributeName,
            format!("{}.{} uses a reserved name", type_name, name),
        ));
    }
    Ok(())
}

/// Junction table name: `<Owner>To<Member>`
pub fn junction_table_name(owner: &str, member: &str) -> String {
    format!("{}To{}", owner, member)
}

/// Junction columns `(<owner>uuid, <member>uuid)`.
///
/// A self-referencing list gets `member<type>uuid` for the member side.
pub fn junction_columns(owner: &str, member: &str) -> (String, String) {
    let owner_column = format!("{}uuid", owner.to_ascii_lowercase());
    let member_column = if owner.eq_ignore_ascii_case(member) {
        format!("member{}uuid", member.to_ascii_lowercase())
    } else {
        format!("{}uuid", member.to_ascii_lowercase())
    };
    (owner_column, member_column)
}

/// Quote an identifier for SQL text
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_names() {
        assert!(is_reserved("uuid"));
        assert!(is_reserved("RemoteId"));
        assert!(is_reserved("select"));
        assert!(is_reserved("Order"));
        assert!(!is_reserved("name"));

        let err = check_attribute_name("Customer", "usn").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ReservedAttributeName);
    }

    #[test]
    fn test_identifier_validation() {
        assert!(validate_identifier("first_name").is_ok());
        assert!(validate_identifier("_x1").is_ok());
        assert_eq!(
            validate_identifier("drop table").unwrap_err().kind(),
            ErrorKind::Configuration
        );
        assert!(validate_identifier("1abc").is_err());
        assert!(validate_identifier("").is_err());
    }

    #[test]
    fn test_junction_naming() {
        assert_eq!(junction_table_name("Store", "Book"), "StoreToBook");
        assert_eq!(
            junction_columns("Store", "Book"),
            ("storeuuid".to_string(), "bookuuid".to_string())
        );
        assert_eq!(
            junction_columns("Person", "Person"),
            ("personuuid".to_string(), "memberpersonuuid".to_string())
        );
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("Store"), "\"Store\"");
        assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
    }
}
