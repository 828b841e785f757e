//! Relational persistence for project configuration, indexing watermarks,
//! user context, search templates, and cached query results.

mod error;
mod store;
mod table;

pub use error::{RelationalStoreError, Result};
pub use store::{RelationalStore, RelationalTransaction, SqliteRelationalStore};
pub use table::Table;
