#![cfg_attr(docsrs, feature(doc_cfg))]
//! `migrata` is a lightweight library for managing database schema
//! migrations.
//!
//! Core concepts:
//! - Migrations are versioned units implementing the [Migration] trait, with
//!   a live [TransformationProvider] to work against rather than just
//!   prepared SQL statements.
//! - Schema operations are expressed once and rendered per database through a
//!   [Dialect]: a data-driven description of a product's type mappings,
//!   quoting rules, and capabilities.
//! - A [Migrator] walks the set to any target version, forward or backward,
//!   running each step in its own transaction and recording progress in a
//!   ledger table.
//!
//! # Typed schema operations
//!
//! Instead of hand-writing `CREATE TABLE` for every supported database, a
//! migration describes columns with [Column] and [DbType] and lets the
//! dialect render them:
//!
//! ```
//! use migrata::{Column, ColumnProperty, DbType, Error, Migration, TransformationProvider};
//!
//! struct CreateUsers;
//!
//! impl Migration for CreateUsers {
//!     fn version(&self) -> i64 { 1 }
//!
//!     fn up(&self, db: &mut TransformationProvider) -> Result<(), Error> {
//!         db.create_table("Users", &[
//!             Column::new("id", DbType::Int64)
//!                 .with_properties(ColumnProperty::PRIMARY_KEY | ColumnProperty::IDENTITY),
//!             Column::new("name", DbType::String)
//!                 .with_properties(ColumnProperty::NOT_NULL),
//!         ])
//!     }
//!
//!     fn down(&self, db: &mut TransformationProvider) -> Result<(), Error> {
//!         db.drop_table("Users")
//!     }
//! }
//! ```
//!
//! # Walking versions
//!
//! ```
//! # use migrata::{Column, ColumnProperty, DbType, Error, Migration, TransformationProvider};
//! # struct CreateUsers;
//! # impl Migration for CreateUsers {
//! #     fn version(&self) -> i64 { 1 }
//! #     fn up(&self, db: &mut TransformationProvider) -> Result<(), Error> { Ok(()) }
//! # }
//! use migrata::{MigrationSet, Migrator};
//! use migrata::sqlite::SqliteConnection;
//!
//! # fn main() -> Result<(), Error> {
//! let provider = TransformationProvider::sqlite(SqliteConnection::open_in_memory()?);
//! let set = MigrationSet::new(vec![Box::new(CreateUsers)])?;
//! let mut migrator = Migrator::new(provider, set);
//! let report = migrator.migrate_to_last_version()?;
//! assert_eq!(report.versions_run, vec![1]);
//! # Ok(())
//! # }
//! ```
//!
//! Versions need not be contiguous: when branches merge, the walk applies
//! whatever the ledger says is missing up to the target.
//!
//! A single process is assumed; nothing coordinates concurrent migrators
//! against one database. Statements that a database refuses to run inside a
//! transaction are not made atomic on its behalf.
//!
//! # Features
//!
//! - `sqlite` (default) - the bundled SQLite driver.
//! - `tracing` (default) - structured logging of every walk and statement.
//! - `testing` - the [testing] harness with schema snapshot support.

mod connection;
pub use connection::DbConnection;

mod dialect;
pub use dialect::{foreign_key_name, unique_constraint_name, Dialect};

mod error;
pub use error::Error;

mod loader;
pub use loader::{MigrationSet, Order};

#[macro_use]
mod macros;

mod migration;
pub use migration::{derive_name, Migration};

mod migrator;
pub use migrator::{Direction, MigrationReport, Migrator};

mod provider;
pub use provider::{TransformationProvider, SCHEMA_INFO_TABLE};

mod schema;
pub use schema::{
    Column, ColumnProperty, DbType, DefaultValue, ForeignKey, ForeignKeyAction, Value,
};

mod sql;

#[cfg(feature = "sqlite")]
#[cfg_attr(docsrs, doc(cfg(feature = "sqlite")))]
pub mod sqlite;

#[cfg(feature = "testing")]
#[cfg_attr(docsrs, doc(cfg(feature = "testing")))]
pub mod testing;
