//! Shared DDL/DML statement rendering. Everything here is pure string
//! building against a [Dialect]; nothing touches a connection.

use crate::dialect::Dialect;
use crate::error::Error;
use crate::schema::{Column, DefaultValue, ForeignKey, Value};

/// Render one column clause: quoted name, type syntax, then property
/// keywords in fixed order (identity, NOT NULL, PRIMARY KEY, UNIQUE,
/// DEFAULT).
///
/// `inline_primary_key` is false when the table has a compound primary key,
/// in which case the PRIMARY KEY clause is emitted at table level instead.
pub fn column_sql(
    dialect: &Dialect,
    column: &Column,
    inline_primary_key: bool,
) -> Result<String, Error> {
    let mut parts = vec![
        dialect.quote_column_name(&column.name),
        dialect.type_sql(column.db_type, column.size)?,
    ];
    if column.is_identity() {
        if let Some(identity) = dialect.identity_sql {
            parts.push(identity.to_string());
        }
    }
    if !column.is_nullable() || column.is_primary_key() {
        parts.push("NOT NULL".to_string());
    }
    if column.is_primary_key() && inline_primary_key {
        parts.push("PRIMARY KEY".to_string());
    }
    if column.is_unique() {
        parts.push("UNIQUE".to_string());
    }
    if let Some(default) = &column.default {
        parts.push(format!("DEFAULT {}", default_sql(default)));
    }
    Ok(parts.join(" "))
}

fn default_sql(default: &DefaultValue) -> String {
    match default {
        DefaultValue::Typed(value) => value.to_sql_literal(),
        // Raw fragments pass through untouched, e.g. CURRENT_TIMESTAMP.
        DefaultValue::Raw(fragment) => fragment.clone(),
    }
}

pub fn create_table_sql(
    dialect: &Dialect,
    table: &str,
    columns: &[Column],
) -> Result<String, Error> {
    for (i, column) in columns.iter().enumerate() {
        if columns[..i]
            .iter()
            .any(|c| c.name.eq_ignore_ascii_case(&column.name))
        {
            return Err(Error::Generic(format!(
                "table {} declares column '{}' more than once",
                table, column.name
            )));
        }
    }
    if columns
        .iter()
        .filter(|c| c.is_primary_key() && c.is_identity())
        .count()
        > 1
    {
        return Err(Error::NotSupported(
            "a table can have at most one identity primary key column".to_string(),
        ));
    }
    let pk_columns: Vec<&Column> = columns.iter().filter(|c| c.is_primary_key()).collect();
    let inline_pk = pk_columns.len() <= 1;
    let mut clauses = columns
        .iter()
        .map(|c| column_sql(dialect, c, inline_pk))
        .collect::<Result<Vec<_>, _>>()?;
    if !inline_pk {
        let names: Vec<String> = pk_columns
            .iter()
            .map(|c| dialect.quote_column_name(&c.name))
            .collect();
        clauses.push(format!("PRIMARY KEY ({})", names.join(", ")));
    }
    Ok(format!(
        "CREATE TABLE {} ({})",
        dialect.quote_table_name(table),
        clauses.join(", ")
    ))
}

pub fn drop_table_sql(dialect: &Dialect, table: &str) -> String {
    format!("DROP TABLE {}", dialect.quote_table_name(table))
}

pub fn add_column_sql(dialect: &Dialect, table: &str, column: &Column) -> Result<String, Error> {
    Ok(format!(
        "ALTER TABLE {} ADD COLUMN {}",
        dialect.quote_table_name(table),
        column_sql(dialect, column, true)?
    ))
}

pub fn remove_column_sql(dialect: &Dialect, table: &str, column: &str) -> String {
    format!(
        "ALTER TABLE {} DROP COLUMN {}",
        dialect.quote_table_name(table),
        dialect.quote_column_name(column)
    )
}

pub fn change_column_sql(dialect: &Dialect, table: &str, column: &Column) -> Result<String, Error> {
    Ok(format!(
        "ALTER TABLE {} ALTER COLUMN {}",
        dialect.quote_table_name(table),
        column_sql(dialect, column, true)?
    ))
}

/// `ALTER TABLE .. RENAME TO ..` unless the dialect carries a strategy
/// (e.g. `sp_rename` on SQL Server).
pub fn rename_table_sql(dialect: &Dialect, old: &str, new: &str) -> String {
    match dialect.rename_table_sql {
        Some(strategy) => strategy(old, new),
        None => format!(
            "ALTER TABLE {} RENAME TO {}",
            dialect.quote_table_name(old),
            dialect.quote_table_name(new)
        ),
    }
}

pub fn rename_column_sql(dialect: &Dialect, table: &str, old: &str, new: &str) -> Option<String> {
    match dialect.rename_column_sql {
        Some(strategy) => Some(strategy(table, old, new)),
        None if dialect.name() == "sqlserverce" => None,
        None => Some(format!(
            "ALTER TABLE {} RENAME COLUMN {} TO {}",
            dialect.quote_table_name(table),
            dialect.quote_column_name(old),
            dialect.quote_column_name(new)
        )),
    }
}

/// The referential action applies to updates and deletes alike.
pub fn add_foreign_key_sql(dialect: &Dialect, fk: &ForeignKey) -> Result<String, Error> {
    if fk.foreign_columns.len() != fk.primary_columns.len() {
        return Err(Error::Generic(format!(
            "foreign key {}: {} referencing columns against {} referenced columns",
            fk.name,
            fk.foreign_columns.len(),
            fk.primary_columns.len()
        )));
    }
    let quote_all = |names: &[String]| -> String {
        names
            .iter()
            .map(|n| dialect.quote_column_name(n))
            .collect::<Vec<_>>()
            .join(", ")
    };
    Ok(format!(
        "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({}) ON UPDATE {} ON DELETE {}",
        dialect.quote_table_name(&fk.foreign_table),
        dialect.quote_constraint_name(&fk.name),
        quote_all(&fk.foreign_columns),
        dialect.quote_table_name(&fk.primary_table),
        quote_all(&fk.primary_columns),
        fk.on_action.as_sql(),
        fk.on_action.as_sql()
    ))
}

pub fn add_primary_key_sql(dialect: &Dialect, name: &str, table: &str, columns: &[&str]) -> String {
    format!(
        "ALTER TABLE {} ADD CONSTRAINT {} PRIMARY KEY ({})",
        dialect.quote_table_name(table),
        dialect.quote_constraint_name(name),
        quote_columns(dialect, columns)
    )
}

pub fn add_unique_constraint_sql(
    dialect: &Dialect,
    name: &str,
    table: &str,
    columns: &[&str],
) -> String {
    format!(
        "ALTER TABLE {} ADD CONSTRAINT {} UNIQUE ({})",
        dialect.quote_table_name(table),
        dialect.quote_constraint_name(name),
        quote_columns(dialect, columns)
    )
}

/// The check expression is a raw fragment and is never quoted.
pub fn add_check_constraint_sql(dialect: &Dialect, name: &str, table: &str, expr: &str) -> String {
    format!(
        "ALTER TABLE {} ADD CONSTRAINT {} CHECK ({})",
        dialect.quote_table_name(table),
        dialect.quote_constraint_name(name),
        expr
    )
}

pub fn remove_constraint_sql(dialect: &Dialect, table: &str, name: &str) -> String {
    format!(
        "ALTER TABLE {} DROP CONSTRAINT {}",
        dialect.quote_table_name(table),
        dialect.quote_constraint_name(name)
    )
}

pub fn add_index_sql(
    dialect: &Dialect,
    name: &str,
    table: &str,
    columns: &[&str],
    unique: bool,
) -> String {
    format!(
        "CREATE {}INDEX {} ON {} ({})",
        if unique { "UNIQUE " } else { "" },
        dialect.quote_constraint_name(name),
        dialect.quote_table_name(table),
        quote_columns(dialect, columns)
    )
}

pub fn remove_index_sql(dialect: &Dialect, table: &str, name: &str) -> String {
    // MySQL scopes index names to the table; everyone else drops globally.
    if dialect.name() == "mysql" {
        format!(
            "DROP INDEX {} ON {}",
            dialect.quote_constraint_name(name),
            dialect.quote_table_name(table)
        )
    } else {
        format!("DROP INDEX {}", dialect.quote_constraint_name(name))
    }
}

pub fn insert_sql(
    dialect: &Dialect,
    table: &str,
    columns: &[&str],
    values: &[Value],
) -> String {
    let literals: Vec<String> = values.iter().map(Value::to_sql_literal).collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        dialect.quote_table_name(table),
        quote_columns(dialect, columns),
        literals.join(", ")
    )
}

pub fn update_sql(
    dialect: &Dialect,
    table: &str,
    columns: &[&str],
    values: &[Value],
    where_clause: Option<&str>,
) -> String {
    let assignments: Vec<String> = columns
        .iter()
        .zip(values)
        .map(|(c, v)| format!("{}={}", dialect.quote_column_name(c), v.to_sql_literal()))
        .collect();
    let mut sql = format!(
        "UPDATE {} SET {}",
        dialect.quote_table_name(table),
        assignments.join(", ")
    );
    if let Some(clause) = where_clause {
        sql.push_str(" WHERE ");
        sql.push_str(clause);
    }
    sql
}

pub fn delete_sql(dialect: &Dialect, table: &str, where_clause: Option<&str>) -> String {
    let mut sql = format!("DELETE FROM {}", dialect.quote_table_name(table));
    if let Some(clause) = where_clause {
        sql.push_str(" WHERE ");
        sql.push_str(clause);
    }
    sql
}

pub fn select_sql(dialect: &Dialect, table: &str, columns: &[&str], where_clause: Option<&str>) -> String {
    let mut sql = format!(
        "SELECT {} FROM {}",
        quote_columns(dialect, columns),
        dialect.quote_table_name(table)
    );
    if let Some(clause) = where_clause {
        sql.push_str(" WHERE ");
        sql.push_str(clause);
    }
    sql
}

fn quote_columns(dialect: &Dialect, columns: &[&str]) -> String {
    columns
        .iter()
        .map(|c| dialect.quote_column_name(c))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnProperty, DbType, ForeignKeyAction};

    #[test]
    fn column_rendering_on_sql_server() {
        let d = Dialect::sql_server();
        let plain = Column::new("foo", DbType::AnsiString).with_size(30);
        assert_eq!(column_sql(&d, &plain, true).unwrap(), "[foo] VARCHAR(30)");

        let not_null = Column::new("foo", DbType::AnsiString)
            .with_size(30)
            .with_properties(ColumnProperty::NOT_NULL);
        assert_eq!(
            column_sql(&d, &not_null, true).unwrap(),
            "[foo] VARCHAR(30) NOT NULL"
        );

        let pk = Column::new("bar", DbType::AnsiString)
            .with_size(50)
            .with_properties(ColumnProperty::PRIMARY_KEY);
        assert_eq!(
            column_sql(&d, &pk, true).unwrap(),
            "[bar] VARCHAR(50) NOT NULL PRIMARY KEY"
        );
    }

    #[test]
    fn sqlite_leaves_plain_identifiers_unquoted() {
        let d = Dialect::sqlite();
        let col = Column::new("foo", DbType::AnsiString).with_size(30);
        assert_eq!(column_sql(&d, &col, true).unwrap(), "foo TEXT");
    }

    #[test]
    fn default_values_render_typed_and_raw() {
        let d = Dialect::sqlite();
        let with_bool = Column::new("active", DbType::Boolean)
            .with_default(DefaultValue::from(Value::from(true)));
        assert_eq!(
            column_sql(&d, &with_bool, true).unwrap(),
            "active INTEGER DEFAULT 1"
        );

        let with_text = Column::new("title", DbType::String)
            .with_default(DefaultValue::from(Value::from("it's")));
        assert_eq!(
            column_sql(&d, &with_text, true).unwrap(),
            "title TEXT DEFAULT 'it''s'"
        );

        let with_raw = Column::new("deleted_at", DbType::DateTime)
            .with_default(DefaultValue::Raw("NULL".to_string()));
        assert_eq!(
            column_sql(&d, &with_raw, true).unwrap(),
            "deleted_at DATETIME DEFAULT NULL"
        );
    }

    #[test]
    fn compound_primary_key_moves_to_table_level() {
        let d = Dialect::sqlite();
        let sql = create_table_sql(
            &d,
            "OrderItems",
            &[
                Column::new("order_id", DbType::Int64)
                    .with_properties(ColumnProperty::PRIMARY_KEY),
                Column::new("item_id", DbType::Int64).with_properties(ColumnProperty::PRIMARY_KEY),
                Column::new("qty", DbType::Int32).with_properties(ColumnProperty::NOT_NULL),
            ],
        )
        .unwrap();
        assert_eq!(
            sql,
            "CREATE TABLE OrderItems (order_id INTEGER NOT NULL, item_id INTEGER NOT NULL, \
             qty INTEGER NOT NULL, PRIMARY KEY (order_id, item_id))"
        );
    }

    #[test]
    fn single_primary_key_stays_inline() {
        let d = Dialect::sqlite();
        let sql = create_table_sql(
            &d,
            "Users",
            &[
                Column::new("id", DbType::Int64)
                    .with_properties(ColumnProperty::PRIMARY_KEY | ColumnProperty::IDENTITY),
                Column::new("name", DbType::String),
            ],
        )
        .unwrap();
        assert_eq!(
            sql,
            "CREATE TABLE Users (id INTEGER NOT NULL PRIMARY KEY, name TEXT)"
        );
    }

    #[test]
    fn foreign_key_statement_includes_delete_action() {
        let d = Dialect::sql_server();
        let fk = ForeignKey::unnamed(
            "OrderItems",
            vec!["order_id".to_string()],
            "Orders",
            vec!["id".to_string()],
            ForeignKeyAction::Cascade,
        );
        assert_eq!(
            add_foreign_key_sql(&d, &fk).unwrap(),
            "ALTER TABLE [OrderItems] ADD CONSTRAINT [FK_Orders_OrderItems] FOREIGN KEY \
             ([order_id]) REFERENCES [Orders] ([id]) ON UPDATE CASCADE ON DELETE CASCADE"
        );

        let mismatched = ForeignKey::unnamed(
            "OrderItems",
            vec!["order_id".to_string(), "extra".to_string()],
            "Orders",
            vec!["id".to_string()],
            ForeignKeyAction::NoAction,
        );
        assert!(matches!(
            add_foreign_key_sql(&d, &mismatched),
            Err(Error::Generic(_))
        ));
    }

    #[test]
    fn create_table_rejects_duplicate_columns_and_double_identity() {
        let d = Dialect::sql_server();
        let err = create_table_sql(
            &d,
            "T",
            &[
                Column::new("a", DbType::Int32),
                Column::new("A", DbType::Int64),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, Error::Generic(_)));

        let identity_pk = ColumnProperty::PRIMARY_KEY | ColumnProperty::IDENTITY;
        let err = create_table_sql(
            &d,
            "T",
            &[
                Column::new("a", DbType::Int32).with_properties(identity_pk),
                Column::new("b", DbType::Int32).with_properties(identity_pk),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, Error::NotSupported(_)));
    }

    #[test]
    fn rename_strategies_override_the_default() {
        let sqlite = Dialect::sqlite();
        assert_eq!(
            rename_table_sql(&sqlite, "old", "new"),
            "ALTER TABLE old RENAME TO new"
        );
        let mssql = Dialect::sql_server();
        assert_eq!(
            rename_table_sql(&mssql, "old", "new"),
            "EXEC sp_rename 'old', 'new'"
        );
        assert_eq!(
            rename_column_sql(&mssql, "t", "a", "b").unwrap(),
            "EXEC sp_rename 't.a', 'b', 'COLUMN'"
        );
    }

    #[test]
    fn check_expression_is_not_quoted() {
        let d = Dialect::sql_server();
        assert_eq!(
            add_check_constraint_sql(&d, "CK_Age", "Users", "age >= 0"),
            "ALTER TABLE [Users] ADD CONSTRAINT [CK_Age] CHECK (age >= 0)"
        );
    }
}
