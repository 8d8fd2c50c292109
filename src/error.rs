use crate::schema::DbType;

/// Error type for the migrata crate.
///
/// Precondition variants (`TableAlreadyExists`, `ColumnDoesntExist`, ...) are
/// raised by re-checking schema state before emitting DDL; they are never
/// translated database errors.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[cfg(feature = "sqlite")]
    #[error("{0}")]
    Sqlite(rusqlite::Error),

    #[error("table '{0}' already exists")]
    TableAlreadyExists(String),

    #[error("table '{0}' does not exist")]
    TableDoesntExist(String),

    #[error("column '{column}' already exists in table '{table}'")]
    ColumnAlreadyExists { table: String, column: String },

    #[error("column '{column}' does not exist in table '{table}'")]
    ColumnDoesntExist { table: String, column: String },

    #[error("constraint '{name}' already exists on table '{table}'")]
    ConstraintAlreadyExists { table: String, name: String },

    #[error("index '{name}' already exists on table '{table}'")]
    IndexAlreadyExists { table: String, name: String },

    #[error("migration version #{0} is duplicated")]
    DuplicatedVersion(i64),

    #[error("no type mapping registered for {0:?}")]
    UnsupportedType(DbType),

    #[error("unsupported value type: {0}")]
    UnsupportedValueType(String),

    #[error("{0}")]
    NotSupported(String),

    #[error("migration {version} ('{name}') failed: {source}")]
    Migration {
        version: i64,
        name: String,
        #[source]
        source: Box<Error>,
    },

    /// A migration step failed and the attempt to roll its transaction back
    /// failed as well. Both errors are preserved so the rollback failure
    /// cannot mask the root cause.
    #[error("rollback failed ({rollback_error}) after error: {source}")]
    RollbackFailed {
        #[source]
        source: Box<Error>,
        rollback_error: Box<Error>,
    },

    #[error("{0}")]
    Generic(String),
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

impl From<String> for Error {
    fn from(value: String) -> Self {
        Self::Generic(value)
    }
}

// Manual PartialEq implementation; wrapped variants compare by message.
impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            #[cfg(feature = "sqlite")]
            (Self::Sqlite(a), Self::Sqlite(b)) => a == b,
            (Self::TableAlreadyExists(a), Self::TableAlreadyExists(b)) => a == b,
            (Self::TableDoesntExist(a), Self::TableDoesntExist(b)) => a == b,
            (
                Self::ColumnAlreadyExists { table, column },
                Self::ColumnAlreadyExists {
                    table: t,
                    column: c,
                },
            ) => table == t && column == c,
            (
                Self::ColumnDoesntExist { table, column },
                Self::ColumnDoesntExist {
                    table: t,
                    column: c,
                },
            ) => table == t && column == c,
            (
                Self::ConstraintAlreadyExists { table, name },
                Self::ConstraintAlreadyExists { table: t, name: n },
            ) => table == t && name == n,
            (
                Self::IndexAlreadyExists { table, name },
                Self::IndexAlreadyExists { table: t, name: n },
            ) => table == t && name == n,
            (Self::DuplicatedVersion(a), Self::DuplicatedVersion(b)) => a == b,
            (Self::UnsupportedType(a), Self::UnsupportedType(b)) => a == b,
            (Self::UnsupportedValueType(a), Self::UnsupportedValueType(b)) => a == b,
            (Self::NotSupported(a), Self::NotSupported(b)) => a == b,
            (Self::Generic(a), Self::Generic(b)) => a == b,
            (a, b) => {
                std::mem::discriminant(a) == std::mem::discriminant(b)
                    && a.to_string() == b.to_string()
            }
        }
    }
}
