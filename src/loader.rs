//! Collects migrations into a validated, version-ordered set.

use crate::error::Error;
use crate::migration::Migration;

/// Iteration order for [MigrationSet::versions].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Ascending,
    Descending,
}

/// An immutable, version-ordered set of migrations with unique versions.
///
/// Versions may have holes; only duplicates are rejected. Migrations marked
/// [ignored](Migration::ignored) are dropped at construction.
#[derive(Default)]
pub struct MigrationSet {
    migrations: Vec<Box<dyn Migration>>,
}

impl MigrationSet {
    pub fn new(migrations: Vec<Box<dyn Migration>>) -> Result<Self, Error> {
        let mut sorted: Vec<Box<dyn Migration>> = migrations
            .into_iter()
            .filter(|m| !m.ignored())
            .collect();
        sorted.sort_by_key(|m| m.version());
        for pair in sorted.windows(2) {
            if pair[0].version() == pair[1].version() {
                return Err(Error::DuplicatedVersion(pair[0].version()));
            }
        }
        Ok(Self { migrations: sorted })
    }

    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    pub fn versions(&self, order: Order) -> Vec<i64> {
        let mut versions: Vec<i64> = self.migrations.iter().map(|m| m.version()).collect();
        if order == Order::Descending {
            versions.reverse();
        }
        versions
    }

    /// The highest version in the set, or 0 when empty.
    pub fn last_version(&self) -> i64 {
        self.migrations.last().map_or(0, |m| m.version())
    }

    pub fn get(&self, version: i64) -> Option<&dyn Migration> {
        self.migrations
            .iter()
            .find(|m| m.version() == version)
            .map(|m| m.as_ref())
    }

    /// Ascending iteration.
    pub fn iter(&self) -> impl Iterator<Item = &dyn Migration> {
        self.migrations.iter().map(|m| m.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::TransformationProvider;

    struct Nop(i64);
    impl Migration for Nop {
        fn version(&self) -> i64 {
            self.0
        }
        fn up(&self, _db: &mut TransformationProvider) -> Result<(), Error> {
            Ok(())
        }
    }

    struct Skipped(i64);
    impl Migration for Skipped {
        fn version(&self) -> i64 {
            self.0
        }
        fn ignored(&self) -> bool {
            true
        }
        fn up(&self, _db: &mut TransformationProvider) -> Result<(), Error> {
            Ok(())
        }
    }

    #[test]
    fn set_sorts_by_version() {
        let set = MigrationSet::new(vec![Box::new(Nop(2)), Box::new(Nop(1)), Box::new(Nop(7))])
            .unwrap();
        assert_eq!(set.versions(Order::Ascending), vec![1, 2, 7]);
        assert_eq!(set.versions(Order::Descending), vec![7, 2, 1]);
        assert_eq!(set.last_version(), 7);
    }

    #[test]
    fn holes_are_allowed() {
        let set = MigrationSet::new(vec![Box::new(Nop(1)), Box::new(Nop(5))]).unwrap();
        assert_eq!(set.versions(Order::Ascending), vec![1, 5]);
    }

    #[test]
    fn duplicate_versions_are_rejected() {
        let result = MigrationSet::new(vec![Box::new(Nop(3)), Box::new(Nop(3))]);
        assert!(matches!(result, Err(Error::DuplicatedVersion(3))));
    }

    #[test]
    fn ignored_migrations_are_filtered_out() {
        let set = MigrationSet::new(vec![Box::new(Nop(1)), Box::new(Skipped(2))]).unwrap();
        assert_eq!(set.versions(Order::Ascending), vec![1]);
        // an ignored duplicate does not count as a duplicate
        let set =
            MigrationSet::new(vec![Box::new(Nop(1)), Box::new(Skipped(1))]).unwrap();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn empty_set_has_last_version_zero() {
        let set = MigrationSet::default();
        assert_eq!(set.last_version(), 0);
        assert!(set.is_empty());
    }

    #[test]
    fn get_finds_by_version() {
        let set = MigrationSet::new(vec![Box::new(Nop(4))]).unwrap();
        assert!(set.get(4).is_some());
        assert!(set.get(5).is_none());
    }
}
