//! The transformation provider: dialect-aware schema operations over a live
//! connection, plus the applied-version ledger.
//!
//! Every existence check introspects the live catalog at call time; nothing
//! is cached between calls, so out-of-band schema changes are picked up
//! immediately. Operations that would fail on the database are checked up
//! front and reported as typed errors ([Error::TableAlreadyExists] and
//! friends), while the "already done" duplicates of additive constraint
//! operations log a warning and return `Ok` so re-runnable migrations stay
//! re-runnable.

use crate::connection::{scalar_to_i64, DbConnection};
use crate::dialect::Dialect;
use crate::error::Error;
use crate::schema::{Column, ColumnProperty, DbType, ForeignKey, Value};
use crate::sql;

/// Name of the applied-version ledger table.
pub const SCHEMA_INFO_TABLE: &str = "SchemaInfo";

pub struct TransformationProvider {
    conn: Box<dyn DbConnection>,
    dialect: Dialect,
    /// Ledger contents, loaded once and kept in sync with ledger writes.
    applied: Option<Vec<i64>>,
}

impl TransformationProvider {
    pub fn new(conn: Box<dyn DbConnection>, dialect: Dialect) -> Self {
        Self {
            conn,
            dialect,
            applied: None,
        }
    }

    #[cfg(feature = "sqlite")]
    pub fn sqlite(conn: crate::sqlite::SqliteConnection) -> Self {
        Self::new(Box::new(conn), Dialect::sqlite())
    }

    pub fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    /// Strip quoting delimiters and any schema qualifier so that
    /// `[dbo].[Users]` compares equal to `users`.
    fn normalize_identifier(name: &str) -> String {
        let trimmed: String = name
            .chars()
            .filter(|c| !matches!(c, '[' | ']' | '"' | '`'))
            .collect();
        match trimmed.rsplit('.').next() {
            Some(last) => last.to_string(),
            None => trimmed,
        }
    }

    // ---- introspection -------------------------------------------------

    pub fn get_tables(&mut self) -> Result<Vec<String>, Error> {
        let rows = self.conn.query(self.dialect.tables_sql)?;
        Ok(rows
            .into_iter()
            .filter_map(|row| match row.into_iter().next() {
                Some(Value::Text(name)) => Some(name),
                _ => None,
            })
            .collect())
    }

    pub fn table_exists(&mut self, table: &str) -> Result<bool, Error> {
        let wanted = Self::normalize_identifier(table);
        Ok(self
            .get_tables()?
            .iter()
            .any(|t| Self::normalize_identifier(t).eq_ignore_ascii_case(&wanted)))
    }

    pub fn get_columns(&mut self, table: &str) -> Result<Vec<Column>, Error> {
        let sql_text = (self.dialect.columns_sql)(table);
        let rows = self.conn.query(&sql_text)?;
        Ok(rows
            .iter()
            .filter_map(|row| (self.dialect.column_from_row)(row))
            .collect())
    }

    pub fn get_column(&mut self, table: &str, column: &str) -> Result<Option<Column>, Error> {
        Ok(self
            .get_columns(table)?
            .into_iter()
            .find(|c| c.name.eq_ignore_ascii_case(column)))
    }

    pub fn column_exists(&mut self, table: &str, column: &str) -> Result<bool, Error> {
        if !self.table_exists(table)? {
            return Ok(false);
        }
        Ok(self.get_column(table, column)?.is_some())
    }

    pub fn constraint_exists(&mut self, table: &str, name: &str) -> Result<bool, Error> {
        match self.dialect.constraint_exists_sql {
            Some(render) => {
                let count = scalar_to_i64(self.conn.query_scalar(&render(table, name))?);
                Ok(count > 0)
            }
            // No catalog to ask (SQLite): constraints are never reported.
            None => Ok(false),
        }
    }

    pub fn index_exists(&mut self, table: &str, name: &str) -> Result<bool, Error> {
        match self.dialect.index_exists_sql {
            Some(render) => {
                let count = scalar_to_i64(self.conn.query_scalar(&render(table, name))?);
                Ok(count > 0)
            }
            None => Ok(false),
        }
    }

    // ---- tables --------------------------------------------------------

    pub fn create_table(&mut self, table: &str, columns: &[Column]) -> Result<(), Error> {
        if self.table_exists(table)? {
            return Err(Error::TableAlreadyExists(table.to_string()));
        }
        let statement = sql::create_table_sql(&self.dialect, table, columns)?;
        self.execute(&statement)?;
        Ok(())
    }

    /// Dropping a table that does not exist is a no-op.
    pub fn drop_table(&mut self, table: &str) -> Result<(), Error> {
        if !self.table_exists(table)? {
            return Ok(());
        }
        self.execute(&sql::drop_table_sql(&self.dialect, table))?;
        Ok(())
    }

    pub fn rename_table(&mut self, old: &str, new: &str) -> Result<(), Error> {
        if self.table_exists(new)? {
            return Err(Error::TableAlreadyExists(new.to_string()));
        }
        if !self.table_exists(old)? {
            return Err(Error::TableDoesntExist(old.to_string()));
        }
        self.execute(&sql::rename_table_sql(&self.dialect, old, new))?;
        Ok(())
    }

    // ---- columns -------------------------------------------------------

    pub fn add_column(&mut self, table: &str, column: &Column) -> Result<(), Error> {
        if !self.table_exists(table)? {
            return Err(Error::TableDoesntExist(table.to_string()));
        }
        if self.column_exists(table, &column.name)? {
            return Err(Error::ColumnAlreadyExists {
                table: table.to_string(),
                column: column.name.clone(),
            });
        }
        let statement = sql::add_column_sql(&self.dialect, table, column)?;
        self.execute(&statement)?;
        Ok(())
    }

    /// Removing an absent column is a no-op. Dialects that track dependent
    /// constraints by column have those dropped first.
    pub fn remove_column(&mut self, table: &str, column: &str) -> Result<(), Error> {
        if !self.column_exists(table, column)? {
            return Ok(());
        }
        if let Some(render) = self.dialect.find_constraints_sql {
            let rows = self.conn.query(&render(table, column))?;
            for row in rows {
                if let Some(Value::Text(constraint)) = row.into_iter().next() {
                    self.remove_constraint(table, &constraint)?;
                }
            }
        }
        self.execute(&sql::remove_column_sql(&self.dialect, table, column))?;
        Ok(())
    }

    pub fn change_column(&mut self, table: &str, column: &Column) -> Result<(), Error> {
        if !self.dialect.supports_change_column {
            return Err(Error::NotSupported(format!(
                "{} cannot redefine columns in place",
                self.dialect.name()
            )));
        }
        if !self.column_exists(table, &column.name)? {
            #[cfg(feature = "tracing")]
            tracing::warn!(table, column = %column.name, "column does not exist, skipping change");
            return Ok(());
        }
        if column.is_primary_key() {
            // Altering a column into a primary key is not portable; keep the
            // rest of the change and leave key structure alone.
            #[cfg(feature = "tracing")]
            tracing::warn!(table, column = %column.name, "ignoring primary key flag in column change");
            let mut stripped = column.clone();
            stripped.properties.remove(ColumnProperty::PRIMARY_KEY);
            let statement = sql::change_column_sql(&self.dialect, table, &stripped)?;
            self.execute(&statement)?;
            return Ok(());
        }
        let statement = sql::change_column_sql(&self.dialect, table, column)?;
        self.execute(&statement)?;
        Ok(())
    }

    pub fn rename_column(&mut self, table: &str, old: &str, new: &str) -> Result<(), Error> {
        if self.column_exists(table, new)? {
            return Err(Error::ColumnAlreadyExists {
                table: table.to_string(),
                column: new.to_string(),
            });
        }
        if !self.column_exists(table, old)? {
            return Ok(());
        }
        match sql::rename_column_sql(&self.dialect, table, old, new) {
            Some(statement) => {
                self.execute(&statement)?;
                Ok(())
            }
            None => Err(Error::NotSupported(format!(
                "{} cannot rename columns",
                self.dialect.name()
            ))),
        }
    }

    // ---- constraints and indexes --------------------------------------

    pub fn add_foreign_key(&mut self, fk: &ForeignKey) -> Result<(), Error> {
        if !self.dialect.supports_constraints {
            #[cfg(feature = "tracing")]
            tracing::warn!(name = %fk.name, "dialect does not support adding constraints, skipping");
            return Ok(());
        }
        if self.constraint_exists(&fk.foreign_table, &fk.name)? {
            #[cfg(feature = "tracing")]
            tracing::warn!(name = %fk.name, table = %fk.foreign_table, "foreign key already exists, skipping");
            return Ok(());
        }
        let statement = sql::add_foreign_key_sql(&self.dialect, fk)?;
        self.execute(&statement)?;
        Ok(())
    }

    pub fn add_primary_key(
        &mut self,
        name: &str,
        table: &str,
        columns: &[&str],
    ) -> Result<(), Error> {
        if self.constraint_exists(table, name)? {
            return Err(Error::ConstraintAlreadyExists {
                table: table.to_string(),
                name: name.to_string(),
            });
        }
        self.execute(&sql::add_primary_key_sql(&self.dialect, name, table, columns))?;
        Ok(())
    }

    pub fn add_unique_constraint(
        &mut self,
        name: &str,
        table: &str,
        columns: &[&str],
    ) -> Result<(), Error> {
        if !self.dialect.supports_constraints {
            #[cfg(feature = "tracing")]
            tracing::warn!(name, "dialect does not support adding constraints, skipping");
            return Ok(());
        }
        if self.constraint_exists(table, name)? {
            #[cfg(feature = "tracing")]
            tracing::warn!(name, table, "unique constraint already exists, skipping");
            return Ok(());
        }
        self.execute(&sql::add_unique_constraint_sql(
            &self.dialect,
            name,
            table,
            columns,
        ))?;
        Ok(())
    }

    pub fn add_check_constraint(
        &mut self,
        name: &str,
        table: &str,
        expression: &str,
    ) -> Result<(), Error> {
        if !self.dialect.supports_check_constraints {
            #[cfg(feature = "tracing")]
            tracing::warn!(name, "dialect does not support check constraints, skipping");
            return Ok(());
        }
        if self.constraint_exists(table, name)? {
            #[cfg(feature = "tracing")]
            tracing::warn!(name, table, "check constraint already exists, skipping");
            return Ok(());
        }
        self.execute(&sql::add_check_constraint_sql(
            &self.dialect,
            name,
            table,
            expression,
        ))?;
        Ok(())
    }

    /// Removing an absent constraint is a no-op.
    pub fn remove_constraint(&mut self, table: &str, name: &str) -> Result<(), Error> {
        if !self.constraint_exists(table, name)? {
            return Ok(());
        }
        self.execute(&sql::remove_constraint_sql(&self.dialect, table, name))?;
        Ok(())
    }

    pub fn add_index(
        &mut self,
        name: &str,
        table: &str,
        columns: &[&str],
        unique: bool,
    ) -> Result<(), Error> {
        if self.index_exists(table, name)? {
            #[cfg(feature = "tracing")]
            tracing::warn!(name, table, "index already exists, skipping");
            return Ok(());
        }
        self.execute(&sql::add_index_sql(&self.dialect, name, table, columns, unique))?;
        Ok(())
    }

    pub fn remove_index(&mut self, table: &str, name: &str) -> Result<(), Error> {
        if !self.index_exists(table, name)? {
            return Ok(());
        }
        self.execute(&sql::remove_index_sql(&self.dialect, table, name))?;
        Ok(())
    }

    // ---- data ----------------------------------------------------------

    pub fn insert(
        &mut self,
        table: &str,
        columns: &[&str],
        values: &[Value],
    ) -> Result<usize, Error> {
        if columns.len() != values.len() {
            return Err(Error::Generic(format!(
                "insert into {}: {} columns but {} values",
                table,
                columns.len(),
                values.len()
            )));
        }
        self.conn
            .execute(&sql::insert_sql(&self.dialect, table, columns, values))
    }

    pub fn update(
        &mut self,
        table: &str,
        columns: &[&str],
        values: &[Value],
        where_clause: Option<&str>,
    ) -> Result<usize, Error> {
        if columns.len() != values.len() {
            return Err(Error::Generic(format!(
                "update {}: {} columns but {} values",
                table,
                columns.len(),
                values.len()
            )));
        }
        self.conn.execute(&sql::update_sql(
            &self.dialect,
            table,
            columns,
            values,
            where_clause,
        ))
    }

    pub fn delete(&mut self, table: &str, where_clause: Option<&str>) -> Result<usize, Error> {
        self.conn
            .execute(&sql::delete_sql(&self.dialect, table, where_clause))
    }

    pub fn select(
        &mut self,
        table: &str,
        columns: &[&str],
        where_clause: Option<&str>,
    ) -> Result<Vec<Vec<Value>>, Error> {
        self.conn
            .query(&sql::select_sql(&self.dialect, table, columns, where_clause))
    }

    pub fn select_scalar(
        &mut self,
        table: &str,
        column: &str,
        where_clause: Option<&str>,
    ) -> Result<Option<Value>, Error> {
        self.conn
            .query_scalar(&sql::select_sql(&self.dialect, table, &[column], where_clause))
    }

    /// Escape hatch for dialect SQL the typed surface does not cover.
    pub fn execute(&mut self, statement: &str) -> Result<usize, Error> {
        #[cfg(feature = "tracing")]
        tracing::debug!(statement, "executing");
        self.conn.execute(statement)
    }

    pub fn query(&mut self, statement: &str) -> Result<Vec<Vec<Value>>, Error> {
        self.conn.query(statement)
    }

    // ---- transactions --------------------------------------------------

    pub fn begin_transaction(&mut self) -> Result<(), Error> {
        self.conn.begin_transaction()
    }

    pub fn commit(&mut self) -> Result<(), Error> {
        self.conn.commit()
    }

    pub fn rollback(&mut self) -> Result<(), Error> {
        // A rollback may have undone ledger writes; reload on next access.
        self.applied = None;
        self.conn.rollback()
    }

    // ---- applied-version ledger ---------------------------------------

    fn ensure_schema_table(&mut self) -> Result<(), Error> {
        if !self.table_exists(SCHEMA_INFO_TABLE)? {
            self.create_table(
                SCHEMA_INFO_TABLE,
                &[Column::new("Version", DbType::Int64)
                    .with_properties(ColumnProperty::PRIMARY_KEY | ColumnProperty::NOT_NULL)],
            )?;
        }
        Ok(())
    }

    /// Every version recorded as applied, in ascending order. Creates the
    /// ledger table on first use; loaded once per provider and kept in sync
    /// by [migration_applied](Self::migration_applied) /
    /// [migration_unapplied](Self::migration_unapplied).
    pub fn applied_versions(&mut self) -> Result<&[i64], Error> {
        if self.applied.is_none() {
            self.ensure_schema_table()?;
            let mut versions: Vec<i64> = self
                .select(SCHEMA_INFO_TABLE, &["Version"], None)?
                .into_iter()
                .filter_map(|row| match row.into_iter().next() {
                    Some(Value::Int64(v)) => Some(v),
                    Some(Value::Int32(v)) => Some(v as i64),
                    _ => None,
                })
                .collect();
            versions.sort_unstable();
            self.applied = Some(versions);
        }
        Ok(self.applied.as_deref().unwrap_or_default())
    }

    /// Record a version as applied.
    pub fn migration_applied(&mut self, version: i64) -> Result<(), Error> {
        self.applied_versions()?;
        self.insert(SCHEMA_INFO_TABLE, &["Version"], &[Value::Int64(version)])?;
        if let Some(applied) = self.applied.as_mut() {
            let at = applied.partition_point(|v| *v < version);
            applied.insert(at, version);
        }
        Ok(())
    }

    /// Record a version as reverted.
    pub fn migration_unapplied(&mut self, version: i64) -> Result<(), Error> {
        self.applied_versions()?;
        self.delete(SCHEMA_INFO_TABLE, Some(&format!("Version={}", version)))?;
        if let Some(applied) = self.applied.as_mut() {
            applied.retain(|v| *v != version);
        }
        Ok(())
    }
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use super::*;
    use crate::sqlite::SqliteConnection;

    fn provider() -> TransformationProvider {
        TransformationProvider::sqlite(SqliteConnection::open_in_memory().unwrap())
    }

    fn users_table() -> Vec<Column> {
        vec![
            Column::new("id", DbType::Int64)
                .with_properties(ColumnProperty::PRIMARY_KEY | ColumnProperty::IDENTITY),
            Column::new("name", DbType::String).with_properties(ColumnProperty::NOT_NULL),
        ]
    }

    #[test]
    fn create_table_then_exists() {
        let mut p = provider();
        p.create_table("Users", &users_table()).unwrap();
        assert!(p.table_exists("Users").unwrap());
        assert!(p.table_exists("users").unwrap());
        assert!(p.table_exists("[Users]").unwrap());
        assert!(p.table_exists("dbo.Users").unwrap());
        assert!(!p.table_exists("Orders").unwrap());
    }

    #[test]
    fn create_existing_table_is_an_error() {
        let mut p = provider();
        p.create_table("Users", &users_table()).unwrap();
        assert_eq!(
            p.create_table("users", &users_table()),
            Err(Error::TableAlreadyExists("users".to_string()))
        );
    }

    #[test]
    fn drop_missing_table_is_a_noop() {
        let mut p = provider();
        p.drop_table("Nothing").unwrap();
        p.create_table("Users", &users_table()).unwrap();
        p.drop_table("Users").unwrap();
        assert!(!p.table_exists("Users").unwrap());
    }

    #[test]
    fn add_and_remove_column() {
        let mut p = provider();
        p.create_table("Users", &users_table()).unwrap();
        p.add_column("Users", &Column::new("email", DbType::String))
            .unwrap();
        assert!(p.column_exists("Users", "email").unwrap());
        assert!(p.column_exists("Users", "EMAIL").unwrap());

        assert_eq!(
            p.add_column("Users", &Column::new("email", DbType::String)),
            Err(Error::ColumnAlreadyExists {
                table: "Users".to_string(),
                column: "email".to_string(),
            })
        );

        p.remove_column("Users", "email").unwrap();
        assert!(!p.column_exists("Users", "email").unwrap());
        // absent column: no-op
        p.remove_column("Users", "email").unwrap();
    }

    #[test]
    fn add_column_to_missing_table_is_an_error() {
        let mut p = provider();
        assert_eq!(
            p.add_column("Nope", &Column::new("x", DbType::Int32)),
            Err(Error::TableDoesntExist("Nope".to_string()))
        );
    }

    #[test]
    fn rename_table_checks_both_ends() {
        let mut p = provider();
        p.create_table("Users", &users_table()).unwrap();
        p.create_table("Orders", &users_table()).unwrap();
        assert_eq!(
            p.rename_table("Users", "Orders"),
            Err(Error::TableAlreadyExists("Orders".to_string()))
        );
        assert_eq!(
            p.rename_table("Missing", "Fresh"),
            Err(Error::TableDoesntExist("Missing".to_string()))
        );
        p.rename_table("Users", "People").unwrap();
        assert!(p.table_exists("People").unwrap());
        assert!(!p.table_exists("Users").unwrap());
    }

    #[test]
    fn rename_column_refuses_existing_target() {
        let mut p = provider();
        p.create_table("Users", &users_table()).unwrap();
        assert_eq!(
            p.rename_column("Users", "id", "name"),
            Err(Error::ColumnAlreadyExists {
                table: "Users".to_string(),
                column: "name".to_string(),
            })
        );
        p.rename_column("Users", "name", "full_name").unwrap();
        assert!(p.column_exists("Users", "full_name").unwrap());
        // absent source column: no-op
        p.rename_column("Users", "ghost", "whatever").unwrap();
    }

    #[test]
    fn sqlite_skips_constraint_additions() {
        let mut p = provider();
        p.create_table("Users", &users_table()).unwrap();
        // No ALTER TABLE ADD CONSTRAINT on sqlite; these warn and succeed.
        p.add_unique_constraint("UQ_Users_NAME", "Users", &["name"])
            .unwrap();
        p.add_check_constraint("CK_Users", "Users", "id > 0").unwrap();
        assert!(!p.constraint_exists("Users", "UQ_Users_NAME").unwrap());
    }

    #[test]
    fn change_column_is_unsupported_on_sqlite() {
        let mut p = provider();
        p.create_table("Users", &users_table()).unwrap();
        assert!(matches!(
            p.change_column("Users", &Column::new("name", DbType::String).with_size(100)),
            Err(Error::NotSupported(_))
        ));
    }

    #[test]
    fn index_lifecycle() {
        let mut p = provider();
        p.create_table("Users", &users_table()).unwrap();
        p.add_index("IX_Users_Name", "Users", &["name"], false).unwrap();
        assert!(p.index_exists("Users", "IX_Users_Name").unwrap());
        // duplicate add warns and no-ops
        p.add_index("IX_Users_Name", "Users", &["name"], false).unwrap();
        p.remove_index("Users", "IX_Users_Name").unwrap();
        assert!(!p.index_exists("Users", "IX_Users_Name").unwrap());
        // absent index: no-op
        p.remove_index("Users", "IX_Users_Name").unwrap();
    }

    #[test]
    fn data_operations_round_trip() {
        let mut p = provider();
        p.create_table("Users", &users_table()).unwrap();
        p.insert("Users", &["id", "name"], &[1i64.into(), "ada".into()])
            .unwrap();
        p.insert("Users", &["id", "name"], &[2i64.into(), "grace".into()])
            .unwrap();
        p.update("Users", &["name"], &["ada l".into()], Some("id=1"))
            .unwrap();
        let rows = p.select("Users", &["name"], Some("id=1")).unwrap();
        assert_eq!(rows, vec![vec![Value::Text("ada l".to_string())]]);
        assert_eq!(p.delete("Users", Some("id=2")).unwrap(), 1);
    }

    #[test]
    fn insert_length_mismatch_is_an_error() {
        let mut p = provider();
        p.create_table("Users", &users_table()).unwrap();
        assert!(matches!(
            p.insert("Users", &["id", "name"], &[1i64.into()]),
            Err(Error::Generic(_))
        ));
    }

    #[test]
    fn ledger_is_created_lazily_and_tracks_versions() {
        let mut p = provider();
        assert!(!p.table_exists(SCHEMA_INFO_TABLE).unwrap());
        assert_eq!(p.applied_versions().unwrap(), Vec::<i64>::new());
        assert!(p.table_exists(SCHEMA_INFO_TABLE).unwrap());

        p.migration_applied(3).unwrap();
        p.migration_applied(1).unwrap();
        p.migration_applied(7).unwrap();
        assert_eq!(p.applied_versions().unwrap(), vec![1, 3, 7]);

        p.migration_unapplied(3).unwrap();
        assert_eq!(p.applied_versions().unwrap(), vec![1, 7]);
    }

    #[test]
    fn get_columns_reports_nullability() {
        let mut p = provider();
        p.create_table("Users", &users_table()).unwrap();
        p.add_column("Users", &Column::new("bio", DbType::String))
            .unwrap();
        let bio = p.get_column("Users", "bio").unwrap().unwrap();
        assert!(bio.is_nullable());
        let name = p.get_column("Users", "name").unwrap().unwrap();
        assert!(!name.is_nullable());
    }
}
