//! Convenience macros for defining migrations.

/// Define a simple SQL-only migration.
///
/// This macro reduces boilerplate for migrations that consist of plain SQL
/// statements run through the provider.
///
/// # Basic Usage
///
/// ```
/// use migrata::sql_migration;
///
/// sql_migration!(CreateUsersTable, 1, "Create users table",
///     up: "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL)",
///     down: "DROP TABLE users"
/// );
/// ```
///
/// This expands to a struct `CreateUsersTable` implementing the
/// [`Migration`](crate::Migration) trait.
///
/// # Multiple Statements
///
/// ```
/// use migrata::sql_migration;
///
/// sql_migration!(InitialSchema, 1, "Create initial schema",
///     up: [
///         "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)",
///         "CREATE TABLE posts (id INTEGER PRIMARY KEY, user_id INTEGER, title TEXT)",
///         "CREATE INDEX idx_posts_user ON posts(user_id)"
///     ],
///     down: [
///         "DROP INDEX idx_posts_user",
///         "DROP TABLE posts",
///         "DROP TABLE users"
///     ]
/// );
/// ```
///
/// # Up-Only Migrations
///
/// Omit the `down` clause for irreversible migrations; walking back over one
/// then does nothing.
///
/// For migrations that need to inspect or transform data in Rust, implement
/// [`Migration`](crate::Migration) directly instead.
#[macro_export]
macro_rules! sql_migration {
    ($name:ident, $version:expr, $migration_name:expr,
        up: [$($up_sql:expr),* $(,)?],
        down: [$($down_sql:expr),* $(,)?]
    ) => {
        pub struct $name;

        impl $crate::Migration for $name {
            fn version(&self) -> i64 {
                $version
            }

            fn name(&self) -> String {
                $migration_name.to_string()
            }

            fn up(
                &self,
                _db: &mut $crate::TransformationProvider,
            ) -> Result<(), $crate::Error> {
                $(_db.execute($up_sql)?;)*
                Ok(())
            }

            fn down(
                &self,
                _db: &mut $crate::TransformationProvider,
            ) -> Result<(), $crate::Error> {
                $(_db.execute($down_sql)?;)*
                Ok(())
            }
        }
    };

    ($name:ident, $version:expr, $migration_name:expr,
        up: $up_sql:expr,
        down: $down_sql:expr
    ) => {
        $crate::sql_migration!($name, $version, $migration_name,
            up: [$up_sql],
            down: [$down_sql]
        );
    };

    ($name:ident, $version:expr, $migration_name:expr,
        up: [$($up_sql:expr),* $(,)?]
    ) => {
        $crate::sql_migration!($name, $version, $migration_name,
            up: [$($up_sql),*],
            down: []
        );
    };

    ($name:ident, $version:expr, $migration_name:expr,
        up: $up_sql:expr
    ) => {
        $crate::sql_migration!($name, $version, $migration_name,
            up: [$up_sql],
            down: []
        );
    };
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use crate::loader::MigrationSet;
    use crate::migration::Migration;
    use crate::migrator::Migrator;
    use crate::provider::TransformationProvider;
    use crate::sqlite::SqliteConnection;

    sql_migration!(CreateUsers, 1, "Create users table",
        up: "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL)",
        down: "DROP TABLE users"
    );

    sql_migration!(CreatePosts, 2, "Create posts",
        up: [
            "CREATE TABLE posts (id INTEGER PRIMARY KEY, user_id INTEGER, title TEXT)",
            "CREATE INDEX idx_posts_user ON posts(user_id)",
        ],
        down: [
            "DROP INDEX idx_posts_user",
            "DROP TABLE posts",
        ]
    );

    sql_migration!(SeedUsers, 3, "Seed users",
        up: "INSERT INTO users (id, name) VALUES (1, 'admin')"
    );

    fn migrator() -> Migrator {
        let provider =
            TransformationProvider::sqlite(SqliteConnection::open_in_memory().unwrap());
        let set = MigrationSet::new(vec![
            Box::new(CreateUsers) as Box<dyn Migration>,
            Box::new(CreatePosts),
            Box::new(SeedUsers),
        ])
        .unwrap();
        Migrator::new(provider, set)
    }

    #[test]
    fn macro_migrations_run_and_revert() {
        let mut m = migrator();
        let report = m.migrate_to_last_version().unwrap();
        assert_eq!(report.versions_run, vec![1, 2, 3]);
        assert!(m.provider().table_exists("posts").unwrap());

        let report = m.migrate_to(1).unwrap();
        assert_eq!(report.versions_run, vec![3, 2]);
        assert!(!m.provider().table_exists("posts").unwrap());
        assert!(m.provider().table_exists("users").unwrap());
    }

    #[test]
    fn macro_fills_in_trait_metadata() {
        assert_eq!(CreateUsers.version(), 1);
        assert_eq!(CreateUsers.name(), "Create users table");
    }
}
