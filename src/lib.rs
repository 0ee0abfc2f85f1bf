//! rowbind - Driver-agnostic SQL execution with typed row mapping
//!
//! Runs hand-written, parameterized SQL and converts each result row into a
//! typed value: either an [`Entity`] populated field by field, or a scalar
//! read from the first column. Every operation returns a [`Result`].
//!
//! # Example
//! ```ignore
//! use rowbind::{CatalogBuilder, DbClient, Entity, SqlValue};
//!
//! #[derive(Debug, Default)]
//! struct Player {
//!     id: i64,
//!     name: String,
//! }
//!
//! impl Entity for Player {
//!     fn describe(catalog: CatalogBuilder<Self>) -> CatalogBuilder<Self> {
//!         catalog
//!             .field("id", |p, v| p.id = v)
//!             .field("name", |p, v| p.name = v)
//!     }
//! }
//!
//! let client = DbClient::open_sqlite_in_memory()?;
//! let querier = client.querier();
//!
//! querier.update("create table players (id integer primary key, name text)", &[]).await?;
//! let id: i64 = querier
//!     .insert("insert into players (name) values (?)", &["Alice".into()])
//!     .await?;
//!
//! let player: Player = querier
//!     .first("select * from players where id = ?", &[SqlValue::Int(id)])
//!     .await?;
//! let names: Vec<String> = querier.list("select name from players", &[]).await?;
//! ```

pub mod drivers;
pub mod error;
pub mod executor;
pub mod mapping;
pub mod querier;
pub mod traits;
pub mod types;

mod client;

// Re-export main types for convenient access
pub use client::DbClient;
pub use error::{DbError, DriverError, Result};
pub use mapping::{
    enum_from_str, enum_to_str, Catalog, CatalogBuilder, CoercionError, Entity, FieldDescriptor,
    FieldType, FromRow, FromValue, SqlEnum,
};
pub use querier::Querier;
pub use traits::{DatabaseDriver, Execution, Outcome, PreparedStatement, RowCursor};
pub use types::{Row, SqlValue};
