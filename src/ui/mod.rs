//! Terminal output for the `persistkit` binary

pub mod output;
pub mod table;

pub use output::{header, info, section, success, warn};
pub use table::{TableBuilder, stats_table};
