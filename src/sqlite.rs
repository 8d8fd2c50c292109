//! SQLite driver, backed by `rusqlite` with the bundled engine.

use rusqlite::types::ValueRef;

use crate::connection::DbConnection;
use crate::error::Error;
use crate::schema::Value;

/// A [DbConnection] over a `rusqlite::Connection`.
pub struct SqliteConnection {
    conn: rusqlite::Connection,
}

impl SqliteConnection {
    pub fn open(path: &str) -> Result<Self, Error> {
        Ok(Self {
            conn: rusqlite::Connection::open(path)?,
        })
    }

    pub fn open_in_memory() -> Result<Self, Error> {
        Ok(Self {
            conn: rusqlite::Connection::open_in_memory()?,
        })
    }

    /// Wrap an already-open connection.
    pub fn new(conn: rusqlite::Connection) -> Self {
        Self { conn }
    }

    pub fn into_inner(self) -> rusqlite::Connection {
        self.conn
    }
}

fn value_from_ref(cell: ValueRef<'_>) -> Result<Value, Error> {
    match cell {
        ValueRef::Null => Ok(Value::Null),
        ValueRef::Integer(n) => Ok(Value::Int64(n)),
        ValueRef::Text(bytes) => match std::str::from_utf8(bytes) {
            Ok(s) => Ok(Value::Text(s.to_string())),
            Err(_) => Err(Error::UnsupportedValueType("non-utf8 text".to_string())),
        },
        ValueRef::Real(_) => Err(Error::UnsupportedValueType("REAL".to_string())),
        ValueRef::Blob(_) => Err(Error::UnsupportedValueType("BLOB".to_string())),
    }
}

impl DbConnection for SqliteConnection {
    fn execute(&mut self, sql: &str) -> Result<usize, Error> {
        Ok(self.conn.execute(sql, [])?)
    }

    fn query(&mut self, sql: &str) -> Result<Vec<Vec<Value>>, Error> {
        let mut stmt = self.conn.prepare(sql)?;
        let column_count = stmt.column_count();
        let mut rows = stmt.query([])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(column_count);
            for i in 0..column_count {
                values.push(value_from_ref(row.get_ref(i)?)?);
            }
            out.push(values);
        }
        Ok(out)
    }

    fn begin_transaction(&mut self) -> Result<(), Error> {
        self.conn.execute_batch("BEGIN")?;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), Error> {
        self.conn.execute_batch("COMMIT")?;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), Error> {
        self.conn.execute_batch("ROLLBACK")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn() -> SqliteConnection {
        SqliteConnection::open_in_memory().unwrap()
    }

    #[test]
    fn execute_and_query_round_trip() {
        let mut c = conn();
        c.execute("CREATE TABLE t (id INTEGER, name TEXT)").unwrap();
        c.execute("INSERT INTO t VALUES (1, 'alpha')").unwrap();
        c.execute("INSERT INTO t VALUES (2, NULL)").unwrap();
        let rows = c.query("SELECT id, name FROM t ORDER BY id").unwrap();
        assert_eq!(
            rows,
            vec![
                vec![Value::Int64(1), Value::Text("alpha".to_string())],
                vec![Value::Int64(2), Value::Null],
            ]
        );
    }

    #[test]
    fn real_cells_are_rejected() {
        let mut c = conn();
        c.execute("CREATE TABLE t (x REAL)").unwrap();
        c.execute("INSERT INTO t VALUES (1.5)").unwrap();
        assert_eq!(
            c.query("SELECT x FROM t"),
            Err(Error::UnsupportedValueType("REAL".to_string()))
        );
    }

    #[test]
    fn transaction_rollback_discards_writes() {
        let mut c = conn();
        c.execute("CREATE TABLE t (id INTEGER)").unwrap();
        c.begin_transaction().unwrap();
        c.execute("INSERT INTO t VALUES (1)").unwrap();
        c.rollback().unwrap();
        let rows = c.query("SELECT COUNT(*) FROM t").unwrap();
        assert_eq!(rows, vec![vec![Value::Int64(0)]]);
    }
}
