//! The migration path engine: decides which direction to walk, runs each
//! step in its own transaction, and records progress in the ledger.

use std::time::{Duration, Instant};

use crate::error::Error;
use crate::loader::{MigrationSet, Order};
use crate::migration::Migration;
use crate::provider::{TransformationProvider, SCHEMA_INFO_TABLE};

/// Which way a walk moved the schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

/// What a [Migrator::migrate_to] call did.
#[derive(Debug, PartialEq)]
pub struct MigrationReport {
    pub direction: Direction,
    /// Versions whose up/down ran, in execution order.
    pub versions_run: Vec<i64>,
    /// Whether this run created the ledger table.
    pub ledger_created: bool,
}

type StartHook = Box<dyn Fn(i64, &str) + Send + Sync>;
type CompleteHook = Box<dyn Fn(i64, &str, Duration) + Send + Sync>;
type SkippedHook = Box<dyn Fn(i64, &str) + Send + Sync>;
type ErrorHook = Box<dyn Fn(i64, &str, &Error) + Send + Sync>;

#[derive(Default)]
struct Hooks {
    start: Option<StartHook>,
    complete: Option<CompleteHook>,
    skipped: Option<SkippedHook>,
    error: Option<ErrorHook>,
}

/// Drives a [MigrationSet] against a database to a requested target version.
///
/// Each step runs in its own transaction together with its ledger write, so
/// a failing step rolls back cleanly while every step committed before it
/// stays applied. The walk halts on the first failure.
///
/// A single process is assumed: nothing here coordinates concurrent
/// migrators against the same database.
pub struct Migrator {
    provider: TransformationProvider,
    set: MigrationSet,
    hooks: Hooks,
}

impl Migrator {
    pub fn new(provider: TransformationProvider, set: MigrationSet) -> Self {
        Self {
            provider,
            set,
            hooks: Hooks::default(),
        }
    }

    pub fn on_migration_start<F>(mut self, callback: F) -> Self
    where
        F: Fn(i64, &str) + Send + Sync + 'static,
    {
        self.hooks.start = Some(Box::new(callback));
        self
    }

    pub fn on_migration_complete<F>(mut self, callback: F) -> Self
    where
        F: Fn(i64, &str, Duration) + Send + Sync + 'static,
    {
        self.hooks.complete = Some(Box::new(callback));
        self
    }

    pub fn on_migration_skipped<F>(mut self, callback: F) -> Self
    where
        F: Fn(i64, &str) + Send + Sync + 'static,
    {
        self.hooks.skipped = Some(Box::new(callback));
        self
    }

    pub fn on_migration_error<F>(mut self, callback: F) -> Self
    where
        F: Fn(i64, &str, &Error) + Send + Sync + 'static,
    {
        self.hooks.error = Some(Box::new(callback));
        self
    }

    pub fn set(&self) -> &MigrationSet {
        &self.set
    }

    pub fn provider(&mut self) -> &mut TransformationProvider {
        &mut self.provider
    }

    pub fn into_provider(self) -> TransformationProvider {
        self.provider
    }

    /// Versions whose up (ascending) or down (descending) would run for this
    /// target, without touching the database schema. An absent ledger table
    /// is read as "nothing applied" rather than created.
    pub fn preview_migrate_to(&mut self, target: i64) -> Result<Vec<i64>, Error> {
        let applied = if self.provider.table_exists(SCHEMA_INFO_TABLE)? {
            self.provider.applied_versions()?.to_vec()
        } else {
            Vec::new()
        };
        Ok(self.plan(target, &applied).1)
    }

    /// Walk to the set's highest version.
    pub fn migrate_to_last_version(&mut self) -> Result<MigrationReport, Error> {
        self.migrate_to(self.set.last_version())
    }

    /// Walk the schema to `target`, applying or reverting whatever the
    /// ledger says is missing or extra.
    pub fn migrate_to(&mut self, target: i64) -> Result<MigrationReport, Error> {
        let ledger_existed = self.provider.table_exists(SCHEMA_INFO_TABLE)?;
        let applied = self.provider.applied_versions()?.to_vec();

        for version in &applied {
            if self.set.get(*version).is_none() {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    version,
                    "ledger records a version with no known migration, skipping"
                );
            }
        }

        let (direction, plan) = self.plan(target, &applied);

        #[cfg(feature = "tracing")]
        tracing::debug!(target, ?direction, ?plan, "starting migration walk");

        if direction == Direction::Up {
            if let Some(ref hook) = self.hooks.skipped {
                for version in applied.iter().filter(|v| **v <= target) {
                    if let Some(m) = self.set.get(*version) {
                        hook(*version, &m.name());
                    }
                }
            }
        }

        let mut versions_run = Vec::with_capacity(plan.len());
        for version in plan {
            // plan only contains discovered versions
            let migration = match self.set.get(version) {
                Some(m) => m,
                None => continue,
            };
            let name = migration.name();
            if let Some(ref hook) = self.hooks.start {
                hook(version, &name);
            }
            #[cfg(feature = "tracing")]
            let _span = match direction {
                Direction::Up => tracing::info_span!("migration_up", version, name = %name),
                Direction::Down => tracing::info_span!("migration_down", version, name = %name),
            }
            .entered();
            #[cfg(feature = "tracing")]
            tracing::info!("running migration");

            let started = Instant::now();
            self.provider.begin_transaction()?;
            let body = match direction {
                Direction::Up => migration.up(&mut self.provider),
                Direction::Down => migration.down(&mut self.provider),
            };
            let step = body.and_then(|()| match direction {
                Direction::Up => self.provider.migration_applied(version),
                Direction::Down => self.provider.migration_unapplied(version),
            });
            match step {
                Ok(()) => {
                    self.provider.commit()?;
                    let elapsed = started.elapsed();
                    #[cfg(feature = "tracing")]
                    tracing::info!(version, elapsed_ms = elapsed.as_millis() as u64, "migration committed");
                    if let Some(ref hook) = self.hooks.complete {
                        hook(version, &name, elapsed);
                    }
                    versions_run.push(version);
                }
                Err(source) => {
                    #[cfg(feature = "tracing")]
                    tracing::error!(version, error = %source, "migration failed, rolling back");
                    if let Some(ref hook) = self.hooks.error {
                        hook(version, &name, &source);
                    }
                    let failure = Error::Migration {
                        version,
                        name,
                        source: Box::new(source),
                    };
                    return match self.provider.rollback() {
                        Ok(()) => Err(failure),
                        Err(rollback_error) => Err(Error::RollbackFailed {
                            source: Box::new(failure),
                            rollback_error: Box::new(rollback_error),
                        }),
                    };
                }
            }
        }

        Ok(MigrationReport {
            direction,
            versions_run,
            ledger_created: !ledger_existed,
        })
    }

    /// Direction is decided once per walk: forward when any discovered,
    /// non-applied version at or below the target exists, backward
    /// otherwise. Applied versions are skipped going forward, non-applied
    /// going backward, so merged branches with version holes fill in
    /// naturally.
    fn plan(&self, target: i64, applied: &[i64]) -> (Direction, Vec<i64>) {
        let pending_up: Vec<i64> = self
            .set
            .versions(Order::Ascending)
            .into_iter()
            .filter(|v| *v <= target && !applied.contains(v))
            .collect();
        if !pending_up.is_empty() {
            return (Direction::Up, pending_up);
        }
        let mut pending_down: Vec<i64> = applied
            .iter()
            .copied()
            .filter(|v| *v > target && self.set.get(*v).is_some())
            .collect();
        pending_down.sort_unstable_by(|a, b| b.cmp(a));
        (Direction::Down, pending_down)
    }
}
