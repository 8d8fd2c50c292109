//! Testing utilities for migration development.
//!
//! This module provides a test harness for SQLite-backed migration testing:
//! [SqliteTestHarness].

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::migrator::Migrator;
use crate::provider::SCHEMA_INFO_TABLE;
use crate::schema::Value;

/// A test harness that provides state control and assertion helpers around a
/// [Migrator].
///
/// # Example
///
/// ```
/// use migrata::testing::SqliteTestHarness;
/// use migrata::sqlite::SqliteConnection;
/// use migrata::{Migration, MigrationSet, Migrator, TransformationProvider, Error};
///
/// struct Migration1;
/// impl Migration for Migration1 {
///     fn version(&self) -> i64 { 1 }
///     fn up(&self, db: &mut TransformationProvider) -> Result<(), Error> {
///         db.execute("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)")?;
///         Ok(())
///     }
///     fn down(&self, db: &mut TransformationProvider) -> Result<(), Error> {
///         db.execute("DROP TABLE users")?;
///         Ok(())
///     }
/// }
///
/// # fn main() -> Result<(), Error> {
/// let provider = TransformationProvider::sqlite(SqliteConnection::open_in_memory()?);
/// let set = MigrationSet::new(vec![Box::new(Migration1)])?;
/// let mut harness = SqliteTestHarness::new(Migrator::new(provider, set));
///
/// harness.migrate_to(1)?;
/// harness.execute("INSERT INTO users (name) VALUES ('alice')")?;
/// harness.assert_table_exists("users")?;
/// assert_eq!(
///     harness.query_one("SELECT name FROM users WHERE id = 1")?,
///     Some("alice".into())
/// );
/// # Ok(())
/// # }
/// ```
pub struct SqliteTestHarness {
    migrator: Migrator,
}

/// A captured database schema for comparison and snapshotting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    /// Map of table name to table definition.
    pub tables: HashMap<String, TableSchema>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    pub columns: Vec<ColumnInfo>,
    pub indexes: Vec<IndexInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub type_name: String,
    pub not_null: bool,
    pub default_value: Option<String>,
    pub primary_key: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexInfo {
    pub name: String,
    pub unique: bool,
    pub columns: Vec<String>,
}

impl SqliteTestHarness {
    pub fn new(migrator: Migrator) -> Self {
        Self { migrator }
    }

    pub fn migrator(&mut self) -> &mut Migrator {
        &mut self.migrator
    }

    /// Migrate to a specific version.
    ///
    /// Returns an error if the target version does not exist in the
    /// migration set (version 0, the empty state, is always valid).
    pub fn migrate_to(&mut self, target_version: i64) -> Result<(), Error> {
        if target_version > 0 && self.migrator.set().get(target_version).is_none() {
            return Err(Error::Generic(format!(
                "Migration version {} does not exist. Available versions: {}",
                target_version,
                self.migrator
                    .set()
                    .versions(crate::loader::Order::Ascending)
                    .iter()
                    .map(|v| v.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            )));
        }
        self.migrator.migrate_to(target_version)?;
        Ok(())
    }

    /// The highest applied version, or 0 when nothing is applied.
    pub fn current_version(&mut self) -> Result<i64, Error> {
        Ok(self
            .migrator
            .provider()
            .applied_versions()?
            .last()
            .copied()
            .unwrap_or(0))
    }

    /// Execute a SQL statement (for setting up test data).
    pub fn execute(&mut self, sql: &str) -> Result<(), Error> {
        self.migrator.provider().execute(sql)?;
        Ok(())
    }

    /// Query a single value from the database.
    pub fn query_one(&mut self, sql: &str) -> Result<Option<Value>, Error> {
        let rows = self.migrator.provider().query(sql)?;
        Ok(rows.into_iter().next().and_then(|r| r.into_iter().next()))
    }

    /// Query all values from a single-column result.
    pub fn query_all(&mut self, sql: &str) -> Result<Vec<Value>, Error> {
        let rows = self.migrator.provider().query(sql)?;
        Ok(rows.into_iter().filter_map(|r| r.into_iter().next()).collect())
    }

    pub fn assert_table_exists(&mut self, table: &str) -> Result<(), Error> {
        if !self.migrator.provider().table_exists(table)? {
            return Err(Error::TableDoesntExist(table.to_string()));
        }
        Ok(())
    }

    pub fn assert_table_not_exists(&mut self, table: &str) -> Result<(), Error> {
        if self.migrator.provider().table_exists(table)? {
            return Err(Error::Generic(format!(
                "Table '{}' exists but should not",
                table
            )));
        }
        Ok(())
    }

    pub fn assert_column_exists(&mut self, table: &str, column: &str) -> Result<(), Error> {
        if !self.migrator.provider().column_exists(table, column)? {
            return Err(Error::ColumnDoesntExist {
                table: table.to_string(),
                column: column.to_string(),
            });
        }
        Ok(())
    }

    pub fn assert_index_exists(&mut self, table: &str, index: &str) -> Result<(), Error> {
        if !self.migrator.provider().index_exists(table, index)? {
            return Err(Error::Generic(format!("Index '{}' does not exist", index)));
        }
        Ok(())
    }

    /// Capture the current schema (tables, columns, indexes) as a snapshot.
    /// The ledger table is excluded.
    pub fn capture_schema(&mut self) -> Result<SchemaSnapshot, Error> {
        let mut tables = HashMap::new();
        let table_names: Vec<String> = self
            .migrator
            .provider()
            .get_tables()?
            .into_iter()
            .filter(|t| t != SCHEMA_INFO_TABLE)
            .collect();
        for table in table_names {
            let columns = self.capture_columns(&table)?;
            let indexes = self.capture_indexes(&table)?;
            tables.insert(table, TableSchema { columns, indexes });
        }
        Ok(SchemaSnapshot { tables })
    }

    fn capture_columns(&mut self, table: &str) -> Result<Vec<ColumnInfo>, Error> {
        let rows = self
            .migrator
            .provider()
            .query(&format!("PRAGMA table_info({})", table))?;
        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let name = match row.get(1) {
                    Some(Value::Text(name)) => name.clone(),
                    _ => return None,
                };
                let type_name = match row.get(2) {
                    Some(Value::Text(t)) => t.clone(),
                    _ => String::new(),
                };
                let not_null = matches!(row.get(3), Some(Value::Int64(n)) if *n != 0);
                let default_value = match row.get(4) {
                    Some(Value::Text(d)) => Some(d.clone()),
                    Some(Value::Int64(n)) => Some(n.to_string()),
                    _ => None,
                };
                let primary_key = matches!(row.get(5), Some(Value::Int64(n)) if *n != 0);
                Some(ColumnInfo {
                    name,
                    type_name,
                    not_null,
                    default_value,
                    primary_key,
                })
            })
            .collect())
    }

    fn capture_indexes(&mut self, table: &str) -> Result<Vec<IndexInfo>, Error> {
        let list = self
            .migrator
            .provider()
            .query(&format!("PRAGMA index_list({})", table))?;
        let mut indexes = Vec::new();
        for row in list {
            let name = match row.get(1) {
                Some(Value::Text(name)) => name.clone(),
                _ => continue,
            };
            // implicit indexes backing UNIQUE/PRIMARY KEY are not schema
            if name.starts_with("sqlite_autoindex") {
                continue;
            }
            let unique = matches!(row.get(2), Some(Value::Int64(n)) if *n != 0);
            let columns = self
                .migrator
                .provider()
                .query(&format!("PRAGMA index_info({})", name))?
                .into_iter()
                .filter_map(|info| match info.get(2) {
                    Some(Value::Text(c)) => Some(c.clone()),
                    _ => None,
                })
                .collect();
            indexes.push(IndexInfo {
                name,
                unique,
                columns,
            });
        }
        indexes.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(indexes)
    }

    /// Assert that the current schema matches a previously captured
    /// snapshot, reporting per-table differences.
    pub fn assert_schema_matches(&mut self, expected: &SchemaSnapshot) -> Result<(), Error> {
        let actual = self.capture_schema()?;
        if actual == *expected {
            return Ok(());
        }
        let mut differences = Vec::new();
        let mut expected_names: Vec<&String> = expected.tables.keys().collect();
        expected_names.sort();
        for name in &expected_names {
            match actual.tables.get(*name) {
                None => differences.push(format!("  - Table '{}' is missing", name)),
                Some(table) if table != &expected.tables[*name] => {
                    differences.push(format!("  - Table '{}' differs", name))
                }
                Some(_) => {}
            }
        }
        let mut actual_names: Vec<&String> = actual.tables.keys().collect();
        actual_names.sort();
        for name in actual_names {
            if !expected.tables.contains_key(name) {
                differences.push(format!("  - Unexpected table '{}'", name));
            }
        }
        Err(Error::Generic(format!(
            "Schema does not match snapshot:\n{}",
            differences.join("\n")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::MigrationSet;
    use crate::migration::Migration;
    use crate::provider::TransformationProvider;
    use crate::sqlite::SqliteConnection;

    struct CreateUsers;
    impl Migration for CreateUsers {
        fn version(&self) -> i64 {
            1
        }
        fn up(&self, db: &mut TransformationProvider) -> Result<(), Error> {
            db.execute("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL)")?;
            db.execute("CREATE INDEX idx_users_name ON users(name)")?;
            Ok(())
        }
        fn down(&self, db: &mut TransformationProvider) -> Result<(), Error> {
            db.execute("DROP TABLE users")?;
            Ok(())
        }
    }

    fn harness() -> SqliteTestHarness {
        let provider =
            TransformationProvider::sqlite(SqliteConnection::open_in_memory().unwrap());
        let set = MigrationSet::new(vec![Box::new(CreateUsers)]).unwrap();
        SqliteTestHarness::new(Migrator::new(provider, set))
    }

    #[test]
    fn migrate_and_assert_helpers() {
        let mut h = harness();
        assert_eq!(h.current_version().unwrap(), 0);
        h.migrate_to(1).unwrap();
        assert_eq!(h.current_version().unwrap(), 1);
        h.assert_table_exists("users").unwrap();
        h.assert_column_exists("users", "name").unwrap();
        h.assert_index_exists("users", "idx_users_name").unwrap();
        h.assert_table_not_exists("posts").unwrap();

        h.execute("INSERT INTO users (name) VALUES ('alice')").unwrap();
        assert_eq!(
            h.query_one("SELECT name FROM users").unwrap(),
            Some(Value::Text("alice".to_string()))
        );

        h.migrate_to(0).unwrap();
        assert!(h.assert_table_exists("users").is_err());
    }

    #[test]
    fn unknown_target_version_is_rejected() {
        let mut h = harness();
        let err = h.migrate_to(9).unwrap_err();
        assert!(matches!(err, Error::Generic(_)));
    }

    #[test]
    fn schema_snapshot_round_trips_and_compares() {
        let mut h = harness();
        h.migrate_to(1).unwrap();
        let snapshot = h.capture_schema().unwrap();
        let users = &snapshot.tables["users"];
        assert!(users.columns.iter().any(|c| c.name == "id" && c.primary_key));
        assert!(users.columns.iter().any(|c| c.name == "name" && c.not_null));
        assert_eq!(users.indexes.len(), 1);
        assert!(!users.indexes[0].unique);

        h.assert_schema_matches(&snapshot).unwrap();
        h.execute("ALTER TABLE users ADD COLUMN email TEXT").unwrap();
        let err = h.assert_schema_matches(&snapshot).unwrap_err();
        assert!(matches!(err, Error::Generic(msg) if msg.contains("users")));

        // snapshots serialize, so they can be stored alongside tests
        let json = serde_json::to_string(&snapshot).unwrap();
        let restored: SchemaSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, snapshot);
    }
}
