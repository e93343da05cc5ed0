//! # Persistkit - Object-relational persistence core
//!
//! Maps plain Rust types with explicitly declared attributes onto SQLite
//! tables and keeps their relationships consistent.
//!
//! Persistkit provides:
//! - A declared schema per type (no runtime name lookup), classified into
//!   scalar, embedded-reference and list-reference attributes
//! - One table manager (`Collection`) per registered type with transactional
//!   insert / update / remove
//! - Junction tables for list references, reconciled by symmetric difference
//! - Shallow read-path hydration with explicit `Link::Unresolved` placeholders

pub mod value;
pub mod identity;
pub mod entity;
pub mod schema;
pub mod storage;
pub mod collection;
pub mod context;
pub mod query;
pub mod config;
#[cfg(any(test, feature = "demo"))]
pub mod sample;
pub mod ui;

// Re-exports for convenient access
pub use value::{PrimitiveKind, StorageKind, Value};
pub use identity::Identity;
pub use entity::{Attribute, Entity, Link, Storable};
pub use schema::{PersistableType, RegistryBuilder, SchemaBuilder, SchemaRegistry};
pub use storage::{CursorMode, Database};
pub use collection::Collection;
pub use context::{Persistence, TableKind, TableStats};
pub use query::Query;
pub use config::Config;

/// Result type alias for persistence operations
pub type Result<T> = std::result::Result<T, Error>;

/// What went wrong, independent of the message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Invalid configuration or registration set
    Configuration,
    /// A registered type declares no attributes
    NoPersistableAttributes,
    /// An attribute's declared type has no storage mapping
    UnsupportedAttributeType,
    /// An attribute name collides with a metadata column or SQL keyword
    ReservedAttributeName,
    /// A reference points at a type that is not registered
    UnknownReferenceType,
    /// A table or junction table could not be created
    SchemaCreationFailure,
    /// An object was handed to the collection of another type
    TypeMismatch,
    /// A referenced object has not been persisted yet
    UnpersistedDependency,
    /// The object has never been written
    NotPersisted,
    /// The object is still referenced by another persisted object
    ReferencedObject,
    /// More than one row shares a UUID
    DuplicateIdentity,
    /// A stored value could not be decoded
    Format,
    /// A result row has no column of that name
    ColumnNotFound,
    /// The backing store could not be opened
    StorageUnavailable,
    /// The operation is declared but not provided
    NotImplemented,
    /// A statement failed; its unit of work was rolled back
    Persistence,
}

impl ErrorKind {
    /// Get the string representation of the error kind
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Configuration => "configuration error",
            ErrorKind::NoPersistableAttributes => "no persistable attributes",
            ErrorKind::UnsupportedAttributeType => "unsupported attribute type",
            ErrorKind::ReservedAttributeName => "reserved attribute name",
            ErrorKind::UnknownReferenceType => "unknown reference type",
            ErrorKind::SchemaCreationFailure => "schema creation failure",
            ErrorKind::TypeMismatch => "type mismatch",
            ErrorKind::UnpersistedDependency => "unpersisted dependency",
            ErrorKind::NotPersisted => "not persisted",
            ErrorKind::ReferencedObject => "referenced object",
            ErrorKind::DuplicateIdentity => "duplicate identity",
            ErrorKind::Format => "format error",
            ErrorKind::ColumnNotFound => "column not found",
            ErrorKind::StorageUnavailable => "storage unavailable",
            ErrorKind::NotImplemented => "not implemented",
            ErrorKind::Persistence => "persistence error",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Unified persistence error: a kind, a message and an optional cause.
#[derive(Debug, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct Error {
    kind: ErrorKind,
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Attach the underlying cause
    pub fn with_source(
        mut self,
        source: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    ) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    pub(crate) fn format(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Format, message)
    }

    pub(crate) fn type_mismatch(expected: &str, found: &str) -> Self {
        Self::new(
            ErrorKind::TypeMismatch,
            format!("expected an object of type {}, got {}", expected, found),
        )
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::new(ErrorKind::Persistence, err.to_string()).with_source(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::new(ErrorKind::Configuration, err.to_string()).with_source(err)
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::new(ErrorKind::Configuration, err.to_string()).with_source(err)
    }
}

impl From<toml::ser::Error> for Error {
    fn from(err: toml::ser::Error) -> Self {
        Error::new(ErrorKind::Configuration, err.to_string()).with_source(err)
    }
}
