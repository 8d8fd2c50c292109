//! Abstract descriptions of schema objects: columns, foreign keys, and the
//! typed values migrations can bind or use as defaults.
//!
//! These types are dialect-agnostic; a [Dialect](crate::dialect::Dialect)
//! turns them into concrete SQL.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Abstract column type, resolved to dialect-specific SQL through the
/// dialect's type-mapping table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DbType {
    /// Unicode character data.
    String,
    /// Non-unicode character data.
    AnsiString,
    Int16,
    Int32,
    Int64,
    Boolean,
    Byte,
    Decimal,
    Double,
    Single,
    DateTime,
    Binary,
    Guid,
    Currency,
}

bitflags::bitflags! {
    /// Column modifiers. `NULL` and `NOT_NULL` are mutually exclusive in
    /// intent; when neither is set the column is nullable on most dialects.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ColumnProperty: u8 {
        const NULL        = 1 << 0;
        const NOT_NULL    = 1 << 1;
        const PRIMARY_KEY = 1 << 2;
        const IDENTITY    = 1 << 3;
        const UNIQUE      = 1 << 4;
    }
}

impl Default for ColumnProperty {
    fn default() -> Self {
        ColumnProperty::empty()
    }
}

/// A default value for a column definition.
///
/// `Raw` passes its SQL fragment through verbatim, so `Raw("NULL")` renders as
/// the keyword `DEFAULT NULL` and `Raw("CURRENT_TIMESTAMP")` works as
/// expected. `Typed` values are quoted and encoded per dialect rules.
#[derive(Debug, Clone, PartialEq)]
pub enum DefaultValue {
    Typed(Value),
    Raw(String),
}

impl From<Value> for DefaultValue {
    fn from(value: Value) -> Self {
        DefaultValue::Typed(value)
    }
}

impl From<&str> for DefaultValue {
    fn from(value: &str) -> Self {
        DefaultValue::Typed(Value::Text(value.to_string()))
    }
}

/// Description of a single table column.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub db_type: DbType,
    /// Requested size (e.g. varchar length); 0 means "dialect default".
    pub size: u32,
    pub properties: ColumnProperty,
    pub default: Option<DefaultValue>,
}

impl Column {
    pub fn new(name: impl Into<String>, db_type: DbType) -> Self {
        Self {
            name: name.into(),
            db_type,
            size: 0,
            properties: ColumnProperty::empty(),
            default: None,
        }
    }

    pub fn with_size(mut self, size: u32) -> Self {
        self.size = size;
        self
    }

    pub fn with_properties(mut self, properties: ColumnProperty) -> Self {
        self.properties = properties;
        self
    }

    pub fn with_default(mut self, default: impl Into<DefaultValue>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn is_primary_key(&self) -> bool {
        self.properties.contains(ColumnProperty::PRIMARY_KEY)
    }

    pub fn is_identity(&self) -> bool {
        self.properties.contains(ColumnProperty::IDENTITY)
    }

    pub fn is_unique(&self) -> bool {
        self.properties.contains(ColumnProperty::UNIQUE)
    }

    pub fn is_nullable(&self) -> bool {
        !self.properties.contains(ColumnProperty::NOT_NULL)
    }
}

/// Referential action applied on update/delete of the referenced row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ForeignKeyAction {
    #[default]
    NoAction,
    Cascade,
    Restrict,
    SetDefault,
    SetNull,
}

impl ForeignKeyAction {
    /// The SQL keyword spelling, shared by every supported dialect.
    pub fn as_sql(self) -> &'static str {
        match self {
            ForeignKeyAction::NoAction => "NO ACTION",
            ForeignKeyAction::Cascade => "CASCADE",
            ForeignKeyAction::Restrict => "RESTRICT",
            ForeignKeyAction::SetDefault => "SET DEFAULT",
            ForeignKeyAction::SetNull => "SET NULL",
        }
    }
}

/// A foreign-key relation between two tables.
///
/// When no name is supplied the constraint is named
/// `FK_<primaryTable>_<foreignTable>`, capped to the shared constraint-name
/// length limit.
#[derive(Debug, Clone, PartialEq)]
pub struct ForeignKey {
    pub name: String,
    pub foreign_table: String,
    pub foreign_columns: Vec<String>,
    pub primary_table: String,
    pub primary_columns: Vec<String>,
    pub on_action: ForeignKeyAction,
}

impl ForeignKey {
    pub fn new(
        name: impl Into<String>,
        foreign_table: impl Into<String>,
        foreign_columns: Vec<String>,
        primary_table: impl Into<String>,
        primary_columns: Vec<String>,
        on_action: ForeignKeyAction,
    ) -> Self {
        Self {
            name: name.into(),
            foreign_table: foreign_table.into(),
            foreign_columns,
            primary_table: primary_table.into(),
            primary_columns,
            on_action,
        }
    }

    /// Construct with the default `FK_<primaryTable>_<foreignTable>` name.
    pub fn unnamed(
        foreign_table: impl Into<String>,
        foreign_columns: Vec<String>,
        primary_table: impl Into<String>,
        primary_columns: Vec<String>,
        on_action: ForeignKeyAction,
    ) -> Self {
        let foreign_table = foreign_table.into();
        let primary_table = primary_table.into();
        let name = crate::dialect::foreign_key_name(&primary_table, &foreign_table);
        Self {
            name,
            foreign_table,
            foreign_columns,
            primary_table,
            primary_columns,
            on_action,
        }
    }
}

/// A typed value passed to parameterized statements or used as a column
/// default. The variant set is fixed: anything a driver cannot express from
/// this set is reported as [Error::UnsupportedValueType](crate::Error).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Guid(Uuid),
    Int32(i32),
    Int64(i64),
    Text(String),
    DateTime(DateTime<Utc>),
    Bool(bool),
}

impl Value {
    /// Render as a single-quoted SQL literal for UPDATE/DELETE statements.
    /// Embedded single quotes are doubled; `Null` renders as the keyword.
    pub fn to_sql_literal(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Guid(g) => format!("'{}'", g),
            Value::Int32(i) => i.to_string(),
            Value::Int64(i) => i.to_string(),
            Value::Text(s) => format!("'{}'", s.replace('\'', "''")),
            Value::DateTime(dt) => format!("'{}'", dt.to_rfc3339()),
            Value::Bool(b) => if *b { "1" } else { "0" }.to_string(),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int32(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int64(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<Uuid> for Value {
    fn from(value: Uuid) -> Self {
        Value::Guid(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Value::DateTime(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_fk_name_is_primary_then_foreign() {
        let fk = ForeignKey::unnamed(
            "Users",
            vec!["UserId".to_string()],
            "Orders",
            vec!["Id".to_string()],
            ForeignKeyAction::NoAction,
        );
        assert_eq!(fk.name, "FK_Orders_Users");
    }

    #[test]
    fn default_fk_name_is_capped_like_generated_names() {
        let fk = ForeignKey::unnamed(
            "OtherTestTable",
            vec!["ref_id".to_string()],
            "SomeVeryLongTestTableName",
            vec!["id".to_string()],
            ForeignKeyAction::NoAction,
        );
        assert_eq!(fk.name, "FK_SomeVeryLongTableName_Other");
        assert_eq!(
            fk.name,
            crate::dialect::foreign_key_name("SomeVeryLongTestTableName", "OtherTestTable")
        );
    }

    #[test]
    fn literal_quoting_doubles_embedded_quotes() {
        assert_eq!(
            Value::Text("O'Brien".to_string()).to_sql_literal(),
            "'O''Brien'"
        );
        assert_eq!(Value::Null.to_sql_literal(), "null");
        assert_eq!(Value::Bool(true).to_sql_literal(), "1");
        assert_eq!(Value::Bool(false).to_sql_literal(), "0");
    }

    #[test]
    fn column_nullability_defaults_to_nullable() {
        let col = Column::new("name", DbType::String);
        assert!(col.is_nullable());
        let col = col.with_properties(ColumnProperty::NOT_NULL);
        assert!(!col.is_nullable());
    }
}
