//! Driver abstraction. The provider only ever speaks to a [DbConnection];
//! concrete drivers live behind cargo features (see the `sqlite` module).

use crate::error::Error;
use crate::schema::Value;

/// A live database connection capable of executing dialect SQL.
///
/// Transaction control is explicit rather than scoped: the provider brackets
/// each migration step with [begin_transaction](DbConnection::begin_transaction)
/// and a matching commit or rollback, so implementations must tolerate those
/// calls arriving as plain statements.
pub trait DbConnection {
    /// Execute a statement, returning the affected row count.
    fn execute(&mut self, sql: &str) -> Result<usize, Error>;

    /// Run a query and materialize every row as a vector of [Value]s.
    fn query(&mut self, sql: &str) -> Result<Vec<Vec<Value>>, Error>;

    fn begin_transaction(&mut self) -> Result<(), Error>;

    fn commit(&mut self) -> Result<(), Error>;

    fn rollback(&mut self) -> Result<(), Error>;

    /// First column of the first row, if any.
    fn query_scalar(&mut self, sql: &str) -> Result<Option<Value>, Error> {
        let rows = self.query(sql)?;
        Ok(rows.into_iter().next().and_then(|r| r.into_iter().next()))
    }
}

/// Interpret a scalar result as a count, treating non-integer or missing
/// values as zero.
pub fn scalar_to_i64(value: Option<Value>) -> i64 {
    match value {
        Some(Value::Int64(n)) => n,
        Some(Value::Int32(n)) => n as i64,
        _ => 0,
    }
}
