//! Storage Layer - SQLite-backed persistence
//!
//! Per registered type the store holds:
//! - `<Type>(uuid, remoteid, usn, lastmodified, refcount, <attributes...>)`
//! - `<Owner>To<Member>(<owner>uuid, <member>uuid)` for every list reference

pub mod cursor;
pub mod schema;
pub mod sqlite;

pub use cursor::{BufferedCursor, Cursor, CursorMode, StreamingCursor};
pub use sqlite::{Database, IN_MEMORY, Statement, UnitOfWork};
