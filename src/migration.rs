//! The [Migration] trait: one versioned, reversible schema change.

use crate::error::Error;
use crate::provider::TransformationProvider;

/// A single schema change with a unique version number.
///
/// Versions order the walk but are not required to be contiguous: teams
/// working on parallel branches can merge migration sets with holes, and the
/// migrator applies whatever is missing up to the target.
pub trait Migration {
    /// Unique version of this migration within its set.
    fn version(&self) -> i64;

    /// Human-readable name, used in logs and error reports.
    ///
    /// The default is derived from the version; implementors usually return
    /// something like [derive_name] applied to the type name.
    fn name(&self) -> String {
        format!("Migration {}", self.version())
    }

    /// Ignored migrations are dropped when building a
    /// [MigrationSet](crate::MigrationSet), useful for parking work in
    /// progress.
    fn ignored(&self) -> bool {
        false
    }

    /// Apply the change.
    fn up(&self, db: &mut TransformationProvider) -> Result<(), Error>;

    /// Revert the change. Defaults to doing nothing, for irreversible
    /// migrations.
    fn down(&self, _db: &mut TransformationProvider) -> Result<(), Error> {
        Ok(())
    }
}

impl PartialEq for dyn Migration {
    fn eq(&self, other: &Self) -> bool {
        self.version() == other.version()
    }
}

impl std::fmt::Debug for dyn Migration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Migration")
            .field("version", &self.version())
            .field("name", &self.name())
            .finish()
    }
}

/// Turn a CamelCase type name into a readable migration name:
/// `"CreateATable"` becomes `"Create a table"`.
pub fn derive_name(type_name: &str) -> String {
    let mut out = String::with_capacity(type_name.len() + 4);
    for (i, c) in type_name.chars().enumerate() {
        if i == 0 {
            out.push(c);
        } else if c.is_uppercase() {
            out.push(' ');
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Nop(i64);
    impl Migration for Nop {
        fn version(&self) -> i64 {
            self.0
        }
        fn up(&self, _db: &mut TransformationProvider) -> Result<(), Error> {
            Ok(())
        }
    }

    #[test]
    fn default_name_includes_version() {
        assert_eq!(Nop(12).name(), "Migration 12");
    }

    #[test]
    fn derive_name_splits_camel_case() {
        assert_eq!(derive_name("CreateATable"), "Create a table");
        assert_eq!(derive_name("AddUserEmailIndex"), "Add user email index");
        assert_eq!(derive_name("Single"), "Single");
    }

    #[test]
    fn migrations_compare_by_version() {
        let a: Box<dyn Migration> = Box::new(Nop(1));
        let b: Box<dyn Migration> = Box::new(Nop(1));
        let c: Box<dyn Migration> = Box::new(Nop(2));
        assert!(&a == &b);
        assert!(&a != &c);
        assert!(*a == *b);
        assert!(*a != *c);
    }
}
