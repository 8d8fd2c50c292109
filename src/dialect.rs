//! Dialect definitions: type-mapping tables, quoting rules, reserved words,
//! capability flags, and per-dialect strategy overrides.
//!
//! A [Dialect] is an immutable capability value handed to the
//! [TransformationProvider](crate::provider::TransformationProvider) at
//! construction. Per-dialect customization is data (tables, flags, optional
//! strategy functions), not subclassing: a derived dialect such as
//! [Dialect::sql_server_ce] starts from its base and re-registers the entries
//! it needs to change, since a later registration for the same `(DbType, size
//! threshold)` key replaces the earlier one.

use crate::error::Error;
use crate::schema::{Column, ColumnProperty, DbType, Value};

/// Identifier-length cap applied to generated constraint names. Oracle's
/// 30-character limit is the strictest among supported dialects.
pub const MAX_CONSTRAINT_NAME_LENGTH: usize = 30;

/// Filler words stripped from over-length generated names before truncating.
const COMMON_WORDS: &[&str] = &["Test"];

/// One row of a dialect's type-mapping table.
#[derive(Debug, Clone, PartialEq)]
struct TypeMapping {
    db_type: DbType,
    /// `None` is the unbounded fallback entry for this type.
    threshold: Option<u32>,
    template: &'static str,
}

/// Renders the SQL for renaming a table: `fn(old, new)`.
pub type RenameTableSql = fn(&str, &str) -> String;
/// Renders the SQL for renaming a column: `fn(table, old, new)`.
pub type RenameColumnSql = fn(&str, &str, &str) -> String;
/// Renders the catalog query listing constraints on a column: `fn(table, column)`.
pub type FindConstraintsSql = fn(&str, &str) -> String;
/// Renders the catalog query listing a table's columns.
pub type ColumnsSql = fn(&str) -> String;
/// Normalizes one row of the columns query into a [Column] (name + nullability).
pub type ColumnFromRow = fn(&[Value]) -> Option<Column>;
/// Renders a count query for a named constraint / index on a table.
pub type ExistsSql = fn(&str, &str) -> String;

/// Syntax, quoting, type-mapping, and capability rules of one database
/// product. Built once via a factory, never mutated during a migration run.
#[derive(Debug, Clone)]
pub struct Dialect {
    name: &'static str,
    type_map: Vec<TypeMapping>,
    reserved_words: &'static [&'static str],
    open_quote: char,
    close_quote: char,
    pub table_name_needs_quote: bool,
    pub column_name_needs_quote: bool,
    pub constraint_name_needs_quote: bool,
    pub supports_multi_db: bool,
    /// Whether ALTER TABLE ADD CONSTRAINT is available at all.
    pub supports_constraints: bool,
    pub supports_check_constraints: bool,
    /// Whether ALTER TABLE .. ALTER COLUMN can redefine a column in place.
    pub supports_change_column: bool,
    /// Identifier-length limit the product enforces on constraint names, if
    /// any. Generated names are additionally capped to
    /// [MAX_CONSTRAINT_NAME_LENGTH] so they stay portable.
    pub max_constraint_name_length: Option<usize>,
    /// Keyword appended to identity (auto-increment) columns, if any.
    pub identity_sql: Option<&'static str>,
    /// Catalog query listing all table names.
    pub tables_sql: &'static str,
    pub columns_sql: ColumnsSql,
    pub column_from_row: ColumnFromRow,
    pub constraint_exists_sql: Option<ExistsSql>,
    pub index_exists_sql: Option<ExistsSql>,
    // Strategy overrides; `None` selects the shared default statement.
    pub rename_table_sql: Option<RenameTableSql>,
    pub rename_column_sql: Option<RenameColumnSql>,
    pub find_constraints_sql: Option<FindConstraintsSql>,
}

impl Dialect {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Register the unbounded (fallback) SQL template for a type.
    pub fn register_type(&mut self, db_type: DbType, template: &'static str) {
        self.register(db_type, None, template);
    }

    /// Register a template used when the requested size is `<= threshold`.
    /// `$l` in the template is replaced with the requested size.
    pub fn register_type_with_size(
        &mut self,
        db_type: DbType,
        threshold: u32,
        template: &'static str,
    ) {
        self.register(db_type, Some(threshold), template);
    }

    fn register(&mut self, db_type: DbType, threshold: Option<u32>, template: &'static str) {
        // Last write wins on an exact (type, threshold) key so derived
        // dialects can override individual entries of their base table.
        if let Some(existing) = self
            .type_map
            .iter_mut()
            .find(|m| m.db_type == db_type && m.threshold == threshold)
        {
            existing.template = template;
        } else {
            self.type_map.push(TypeMapping {
                db_type,
                threshold,
                template,
            });
        }
    }

    /// Resolve a `(DbType, size)` pair to dialect SQL type syntax.
    ///
    /// Among entries for the type, the smallest registered threshold still
    /// `>= size` wins; the unbounded entry is the fallback. A size of 0 asks
    /// for the dialect default.
    pub fn type_sql(&self, db_type: DbType, size: u32) -> Result<String, Error> {
        let mut fallback: Option<&TypeMapping> = None;
        let mut best: Option<&TypeMapping> = None;
        for mapping in self.type_map.iter().filter(|m| m.db_type == db_type) {
            match mapping.threshold {
                None => fallback = Some(mapping),
                Some(threshold) if size > 0 && threshold >= size => {
                    if best.map_or(true, |b| threshold < b.threshold.unwrap_or(u32::MAX)) {
                        best = Some(mapping);
                    }
                }
                Some(_) => {}
            }
        }
        let chosen = best.or(fallback).ok_or(Error::UnsupportedType(db_type))?;
        Ok(chosen.template.replace("$l", &size.to_string()))
    }

    /// Wrap an identifier in the dialect's quoting delimiters, doubling any
    /// embedded closing delimiter.
    pub fn quote(&self, identifier: &str) -> String {
        let escaped = identifier.replace(
            self.close_quote,
            &format!("{}{}", self.close_quote, self.close_quote),
        );
        format!("{}{}{}", self.open_quote, escaped, self.close_quote)
    }

    /// Case-insensitive membership test against the dialect's word list.
    pub fn is_reserved_word(&self, name: &str) -> bool {
        self.reserved_words
            .iter()
            .any(|w| w.eq_ignore_ascii_case(name))
    }

    pub fn quote_table_name(&self, name: &str) -> String {
        if self.table_name_needs_quote || self.is_reserved_word(name) {
            self.quote(name)
        } else {
            name.to_string()
        }
    }

    pub fn quote_column_name(&self, name: &str) -> String {
        if self.column_name_needs_quote || self.is_reserved_word(name) {
            self.quote(name)
        } else {
            name.to_string()
        }
    }

    pub fn quote_constraint_name(&self, name: &str) -> String {
        if self.constraint_name_needs_quote || self.is_reserved_word(name) {
            self.quote(name)
        } else {
            name.to_string()
        }
    }

    /// SQLite: no ALTER TABLE ADD CONSTRAINT, introspection through
    /// `sqlite_master` and `PRAGMA table_info`.
    pub fn sqlite() -> Self {
        let mut d = Self {
            name: "sqlite",
            type_map: Vec::new(),
            reserved_words: SQLITE_RESERVED_WORDS,
            open_quote: '"',
            close_quote: '"',
            table_name_needs_quote: false,
            column_name_needs_quote: false,
            constraint_name_needs_quote: false,
            supports_multi_db: false,
            supports_constraints: false,
            supports_check_constraints: false,
            supports_change_column: false,
            max_constraint_name_length: None,
            // INTEGER PRIMARY KEY is the rowid alias and auto-assigns on
            // insert, so no identity keyword is needed (and AUTOINCREMENT is
            // only legal immediately after PRIMARY KEY).
            identity_sql: None,
            tables_sql:
                "SELECT name FROM sqlite_master WHERE type='table' AND name <> 'sqlite_sequence' ORDER BY name",
            columns_sql: |table| format!("PRAGMA table_info({})", table),
            column_from_row: column_from_pragma_row,
            constraint_exists_sql: None,
            index_exists_sql: Some(|table, name| {
                format!(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='index' AND name='{}' AND tbl_name='{}'",
                    name, table
                )
            }),
            rename_table_sql: None,
            rename_column_sql: None,
            find_constraints_sql: None,
        };
        d.register_type(DbType::String, "TEXT");
        d.register_type(DbType::AnsiString, "TEXT");
        d.register_type(DbType::Int16, "INTEGER");
        d.register_type(DbType::Int32, "INTEGER");
        d.register_type(DbType::Int64, "INTEGER");
        d.register_type(DbType::Boolean, "INTEGER");
        d.register_type(DbType::Byte, "INTEGER");
        d.register_type(DbType::Decimal, "NUMERIC");
        d.register_type(DbType::Double, "REAL");
        d.register_type(DbType::Single, "REAL");
        d.register_type(DbType::DateTime, "DATETIME");
        d.register_type(DbType::Binary, "BLOB");
        d.register_type(DbType::Guid, "UNIQUEIDENTIFIER");
        d.register_type(DbType::Currency, "NUMERIC");
        d
    }

    /// MySQL: backtick quoting, sized VARCHAR/TEXT ladder.
    pub fn mysql() -> Self {
        let mut d = Self {
            name: "mysql",
            type_map: Vec::new(),
            reserved_words: MYSQL_RESERVED_WORDS,
            open_quote: '`',
            close_quote: '`',
            table_name_needs_quote: true,
            column_name_needs_quote: true,
            constraint_name_needs_quote: false,
            supports_multi_db: true,
            supports_constraints: true,
            supports_check_constraints: false,
            supports_change_column: true,
            max_constraint_name_length: Some(64),
            identity_sql: Some("AUTO_INCREMENT"),
            tables_sql: "SELECT table_name FROM information_schema.tables WHERE table_schema = DATABASE()",
            columns_sql: information_schema_columns_sql,
            column_from_row: column_from_information_schema_row,
            constraint_exists_sql: Some(|table, name| {
                format!(
                    "SELECT COUNT(*) FROM information_schema.table_constraints WHERE table_name = '{}' AND constraint_name = '{}'",
                    table, name
                )
            }),
            index_exists_sql: Some(|table, name| {
                format!(
                    "SELECT COUNT(DISTINCT index_name) FROM information_schema.statistics WHERE table_name = '{}' AND index_name = '{}'",
                    table, name
                )
            }),
            rename_table_sql: None,
            rename_column_sql: None,
            find_constraints_sql: Some(|table, column| {
                format!(
                    "SELECT constraint_name FROM information_schema.key_column_usage WHERE table_name = '{}' AND column_name = '{}'",
                    table, column
                )
            }),
        };
        d.register_type(DbType::String, "VARCHAR(255)");
        d.register_type_with_size(DbType::String, 255, "VARCHAR($l)");
        d.register_type_with_size(DbType::String, 65535, "TEXT");
        d.register_type_with_size(DbType::String, 16777215, "MEDIUMTEXT");
        d.register_type(DbType::AnsiString, "VARCHAR(255)");
        d.register_type_with_size(DbType::AnsiString, 255, "VARCHAR($l)");
        d.register_type_with_size(DbType::AnsiString, 65535, "TEXT");
        d.register_type(DbType::Int16, "SMALLINT");
        d.register_type(DbType::Int32, "INT");
        d.register_type(DbType::Int64, "BIGINT");
        d.register_type(DbType::Boolean, "TINYINT(1)");
        d.register_type(DbType::Byte, "TINYINT UNSIGNED");
        d.register_type(DbType::Decimal, "DECIMAL(19,5)");
        d.register_type_with_size(DbType::Decimal, 38, "DECIMAL($l)");
        d.register_type(DbType::Double, "DOUBLE");
        d.register_type(DbType::Single, "FLOAT");
        d.register_type(DbType::DateTime, "DATETIME");
        d.register_type(DbType::Binary, "LONGBLOB");
        d.register_type_with_size(DbType::Binary, 127, "TINYBLOB");
        d.register_type_with_size(DbType::Binary, 65535, "BLOB");
        d.register_type_with_size(DbType::Binary, 16777215, "MEDIUMBLOB");
        d.register_type(DbType::Guid, "CHAR(36)");
        d.register_type(DbType::Currency, "DECIMAL(19,4)");
        d
    }

    /// Microsoft SQL Server: bracket quoting everywhere, `sp_rename`
    /// strategies, `sysobjects`/`sysconstraints` catalog queries.
    pub fn sql_server() -> Self {
        let mut d = Self {
            name: "sqlserver",
            type_map: Vec::new(),
            reserved_words: SQL_SERVER_RESERVED_WORDS,
            open_quote: '[',
            close_quote: ']',
            table_name_needs_quote: true,
            column_name_needs_quote: true,
            constraint_name_needs_quote: true,
            supports_multi_db: true,
            supports_constraints: true,
            supports_check_constraints: true,
            supports_change_column: true,
            max_constraint_name_length: Some(128),
            identity_sql: Some("IDENTITY(1,1)"),
            tables_sql: "SELECT table_name FROM information_schema.tables",
            columns_sql: information_schema_columns_sql,
            column_from_row: column_from_information_schema_row,
            constraint_exists_sql: Some(|_table, name| {
                format!(
                    "SELECT COUNT(*) FROM sysobjects WHERE id = object_id('{}')",
                    name
                )
            }),
            index_exists_sql: Some(|table, name| {
                format!(
                    "SELECT COUNT(*) FROM sys.indexes WHERE name = '{}' AND object_id = object_id('{}')",
                    name, table
                )
            }),
            rename_table_sql: Some(|old, new| format!("EXEC sp_rename '{}', '{}'", old, new)),
            rename_column_sql: Some(|table, old, new| {
                format!("EXEC sp_rename '{}.{}', '{}', 'COLUMN'", table, old, new)
            }),
            find_constraints_sql: Some(|table, column| {
                format!(
                    "SELECT cont.name FROM sysobjects cont, syscolumns col, sysconstraints cnt \
                     WHERE cont.parent_obj = col.id AND cnt.constid = cont.id AND cnt.colid=col.colid \
                     AND col.name = '{}' AND col.id = object_id('{}')",
                    column, table
                )
            }),
        };
        d.register_type(DbType::String, "NVARCHAR(255)");
        d.register_type_with_size(DbType::String, 4000, "NVARCHAR($l)");
        d.register_type_with_size(DbType::String, 1073741823, "NTEXT");
        d.register_type(DbType::AnsiString, "VARCHAR(255)");
        d.register_type_with_size(DbType::AnsiString, 8000, "VARCHAR($l)");
        d.register_type_with_size(DbType::AnsiString, 2147483647, "TEXT");
        d.register_type(DbType::Int16, "SMALLINT");
        d.register_type(DbType::Int32, "INT");
        d.register_type(DbType::Int64, "BIGINT");
        d.register_type(DbType::Boolean, "BIT");
        d.register_type(DbType::Byte, "TINYINT");
        d.register_type(DbType::Decimal, "DECIMAL(19,5)");
        d.register_type_with_size(DbType::Decimal, 38, "DECIMAL($l)");
        d.register_type(DbType::Double, "DOUBLE PRECISION");
        d.register_type(DbType::Single, "REAL");
        d.register_type(DbType::DateTime, "DATETIME");
        d.register_type(DbType::Binary, "VARBINARY(8000)");
        d.register_type_with_size(DbType::Binary, 8000, "VARBINARY($l)");
        d.register_type_with_size(DbType::Binary, 2147483647, "IMAGE");
        d.register_type(DbType::Guid, "UNIQUEIDENTIFIER");
        d.register_type(DbType::Currency, "MONEY");
        d
    }

    /// SQL Server Compact Edition: starts from [Dialect::sql_server] and
    /// re-registers the entries the compact engine handles differently.
    pub fn sql_server_ce() -> Self {
        let mut d = Self::sql_server();
        d.name = "sqlserverce";
        d.supports_multi_db = false;
        // CE has no non-unicode text types and no DOUBLE PRECISION.
        d.register_type(DbType::AnsiString, "NVARCHAR(255)");
        d.register_type_with_size(DbType::AnsiString, 4000, "NVARCHAR($l)");
        d.register_type_with_size(DbType::AnsiString, 1073741823, "NTEXT");
        d.register_type_with_size(DbType::AnsiString, 2147483647, "NTEXT");
        d.register_type(DbType::Double, "FLOAT");
        d.register_type_with_size(DbType::String, 1073741823, "NTEXT");
        d.register_type_with_size(DbType::Binary, 2147483647, "IMAGE");
        d.constraint_exists_sql = Some(|table, name| {
            format!(
                "SELECT COUNT(*) FROM INFORMATION_SCHEMA.TABLE_CONSTRAINTS WHERE table_name = '{}' AND constraint_name = '{}'",
                table, name
            )
        });
        d.find_constraints_sql = Some(|table, column| {
            format!(
                "SELECT cont.constraint_name FROM INFORMATION_SCHEMA.KEY_COLUMN_USAGE cont \
                 WHERE cont.Table_Name='{}' AND cont.column_name = '{}'",
                table, column
            )
        });
        // sp_rename on columns is unavailable; the provider falls back to
        // add-copy-drop when no strategy is present.
        d.rename_column_sql = None;
        d
    }
}

fn information_schema_columns_sql(table: &str) -> String {
    format!(
        "SELECT COLUMN_NAME, IS_NULLABLE FROM INFORMATION_SCHEMA.COLUMNS WHERE table_name = '{}'",
        table
    )
}

/// `INFORMATION_SCHEMA.COLUMNS` row shape: (COLUMN_NAME, IS_NULLABLE).
fn column_from_information_schema_row(row: &[Value]) -> Option<Column> {
    let name = match row.first()? {
        Value::Text(name) => name.clone(),
        _ => return None,
    };
    let nullable = matches!(row.get(1)?, Value::Text(s) if s == "YES");
    let properties = if nullable {
        ColumnProperty::NULL
    } else {
        ColumnProperty::NOT_NULL
    };
    Some(Column::new(name, DbType::String).with_properties(properties))
}

/// `PRAGMA table_info` row shape: (cid, name, type, notnull, dflt_value, pk).
fn column_from_pragma_row(row: &[Value]) -> Option<Column> {
    let name = match row.get(1)? {
        Value::Text(name) => name.clone(),
        _ => return None,
    };
    let not_null = matches!(row.get(3)?, Value::Int64(n) if *n != 0);
    let mut properties = if not_null {
        ColumnProperty::NOT_NULL
    } else {
        ColumnProperty::NULL
    };
    if matches!(row.get(5)?, Value::Int64(n) if *n != 0) {
        properties |= ColumnProperty::PRIMARY_KEY;
    }
    Some(Column::new(name, DbType::String).with_properties(properties))
}

/// Shrink a generated identifier to `max` characters: first strip filler
/// words, then hard-truncate.
pub fn adjust_name_to_size(name: &str, max: usize, strip_common_words: bool) -> String {
    let mut adjusted = name.to_string();
    if adjusted.len() > max && strip_common_words {
        for word in COMMON_WORDS {
            adjusted = adjusted.replace(word, "");
        }
    }
    if adjusted.len() > max {
        let mut cut = max;
        // back off to a char boundary so multibyte identifiers survive
        while !adjusted.is_char_boundary(cut) {
            cut -= 1;
        }
        adjusted.truncate(cut);
    }
    adjusted
}

/// Default foreign-key constraint name: `FK_<primaryTable>_<foreignTable>`,
/// capped to the shortest dialect identifier limit.
pub fn foreign_key_name(primary_table: &str, foreign_table: &str) -> String {
    adjust_name_to_size(
        &format!("FK_{}_{}", primary_table, foreign_table),
        MAX_CONSTRAINT_NAME_LENGTH,
        true,
    )
}

/// Generated unique-constraint name: prefix + table + sorted uppercased
/// column names, capped like [foreign_key_name].
pub fn unique_constraint_name(table: &str, columns: &[&str]) -> String {
    let mut upper: Vec<String> = columns.iter().map(|c| c.to_uppercase()).collect();
    upper.sort();
    adjust_name_to_size(
        &format!("UQ_{}_{}", table, upper.join("_")),
        MAX_CONSTRAINT_NAME_LENGTH,
        true,
    )
}

/// Prepend an optional schema qualifier.
pub fn format_table_name(schema: Option<&str>, table: &str) -> String {
    match schema {
        Some(s) if !s.is_empty() => format!("{}.{}", s, table),
        _ => table.to_string(),
    }
}

const SQLITE_RESERVED_WORDS: &[&str] = &[
    "abort", "add", "alter", "and", "autoincrement", "between", "case", "check", "collate",
    "commit", "constraint", "create", "default", "delete", "drop", "else", "escape", "except",
    "exists", "foreign", "from", "group", "having", "in", "index", "insert", "into", "is", "join",
    "key", "limit", "not", "null", "on", "or", "order", "primary", "references", "rollback",
    "select", "set", "table", "then", "to", "transaction", "union", "unique", "update", "values",
    "when", "where",
];

const MYSQL_RESERVED_WORDS: &[&str] = &[
    "add", "all", "alter", "and", "asc", "between", "by", "change", "check", "column", "create",
    "cross", "database", "default", "delete", "desc", "distinct", "drop", "exists", "foreign",
    "from", "group", "having", "index", "inner", "insert", "int", "into", "is", "join", "key",
    "keys", "like", "limit", "not", "null", "on", "or", "order", "primary", "references",
    "select", "set", "show", "table", "then", "to", "union", "unique", "update", "values",
    "varchar", "when", "where",
];

const SQL_SERVER_RESERVED_WORDS: &[&str] = &[
    "add", "alter", "and", "any", "as", "asc", "between", "by", "case", "check", "column",
    "constraint", "create", "database", "default", "delete", "desc", "distinct", "drop", "else",
    "exec", "exists", "foreign", "from", "group", "having", "identity", "in", "index", "inner",
    "insert", "into", "is", "join", "key", "like", "not", "null", "on", "or", "order", "primary",
    "references", "select", "set", "table", "then", "to", "top", "union", "unique", "update",
    "user", "values", "view", "when", "where",
];
