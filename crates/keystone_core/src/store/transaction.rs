//! Begin/commit/rollback wrapper around one persistence operation.
//!
//! # Responsibility
//! - Open a session, run one operation inside a transaction and close the
//!   session, whatever the outcome.
//! - Convert backend failures into `StoreError` values and log them.
//!
//! # Invariants
//! - A context runs at most one operation: `Idle -> Active -> Committed`
//!   or `Idle -> Active -> RolledBack`.
//! - Any error inside the operation rolls back everything it wrote.
//! - No retries happen here.

use crate::db::{Backend, Session};
use crate::model::item::ModelType;
use crate::store::{StoreError, StoreOptions, StoreResult, StorageRegistry, UnitOfWork};
use log::{debug, error, warn};
use std::fmt::{Display, Formatter};
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    Idle,
    Active,
    Committed,
    RolledBack,
}

impl TxState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Active => "active",
            Self::Committed => "committed",
            Self::RolledBack => "rolled_back",
        }
    }

    pub fn is_finished(self) -> bool {
        matches!(self, Self::Committed | Self::RolledBack)
    }
}

impl Display for TxState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Single-use unit-of-work runner.
pub struct TransactionContext<'a, B: Backend> {
    backend: &'a B,
    registry: &'a StorageRegistry,
    options: StoreOptions,
    report_failures: bool,
    state: TxState,
}

impl<'a, B: Backend> TransactionContext<'a, B> {
    pub fn new(backend: &'a B, registry: &'a StorageRegistry, options: StoreOptions) -> Self {
        Self {
            backend,
            registry,
            options,
            report_failures: true,
            state: TxState::Idle,
        }
    }

    /// Demotes failure logs to `debug`, for lookups where a miss is expected.
    pub fn without_logging(mut self) -> Self {
        self.report_failures = false;
        self
    }

    pub fn state(&self) -> TxState {
        self.state
    }

    /// Runs `work` in one transaction and returns its result.
    ///
    /// # Errors
    /// - `InvalidState` when this context already ran an operation.
    /// - Whatever `work` returned, after rolling back.
    /// - `Persistence` when the session cannot be opened, begun or committed.
    pub fn commit_with<T, F>(&mut self, operation: &'static str, model: ModelType, work: F) -> StoreResult<T>
    where
        F: FnOnce(&UnitOfWork<'_, B::Session>) -> StoreResult<T>,
    {
        if self.state != TxState::Idle {
            return Err(StoreError::InvalidState(self.state));
        }

        let started_at = Instant::now();
        let session = match self.backend.open_session() {
            Ok(session) => session,
            Err(err) => {
                self.state = TxState::RolledBack;
                let err = StoreError::from(err);
                self.report(operation, model, started_at, &err);
                return Err(err);
            }
        };
        if let Err(err) = session.begin() {
            self.state = TxState::RolledBack;
            let err = StoreError::from(err);
            self.report(operation, model, started_at, &err);
            return Err(err);
        }
        self.state = TxState::Active;

        let outcome = {
            let uow = UnitOfWork::new(&session, self.registry, self.options);
            work(&uow)
        };

        let outcome = match outcome {
            Ok(value) => match session.commit() {
                Ok(()) => {
                    self.state = TxState::Committed;
                    Ok(value)
                }
                Err(err) => Err(StoreError::from(err)),
            },
            Err(err) => Err(err),
        };

        match outcome {
            Ok(value) => {
                debug!(
                    "event=tx_commit module=store status=ok operation={} model={} duration_ms={}",
                    operation,
                    model,
                    started_at.elapsed().as_millis()
                );
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = session.rollback() {
                    error!(
                        "event=tx_rollback module=store status=error operation={} model={} error={}",
                        operation, model, rollback_err
                    );
                }
                self.state = TxState::RolledBack;
                self.report(operation, model, started_at, &err);
                Err(err)
            }
        }
    }

    /// Count-shaped `commit_with`: any failure yields `0`.
    pub fn count_with<F>(&mut self, operation: &'static str, model: ModelType, work: F) -> u64
    where
        F: FnOnce(&UnitOfWork<'_, B::Session>) -> StoreResult<u64>,
    {
        self.commit_with(operation, model, work).unwrap_or(0)
    }

    fn report(&self, operation: &str, model: ModelType, started_at: Instant, err: &StoreError) {
        let duration_ms = started_at.elapsed().as_millis();
        if !self.report_failures {
            debug!(
                "event=tx_rollback module=store status=error operation={} model={} duration_ms={} error_code={}",
                operation,
                model,
                duration_ms,
                err.code()
            );
        } else if err.is_not_found() {
            warn!(
                "event=tx_rollback module=store status=error operation={} model={} duration_ms={} error_code={} error={}",
                operation,
                model,
                duration_ms,
                err.code(),
                err
            );
        } else {
            error!(
                "event=tx_rollback module=store status=error operation={} model={} duration_ms={} error_code={} error={}",
                operation,
                model,
                duration_ms,
                err.code(),
                err
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{TransactionContext, TxState};
    use crate::db::SqliteBackend;
    use crate::store::{StoreError, StoreOptions, StorageRegistry};
    use crate::model::item::ModelType;

    const PROBE: ModelType = ModelType::new("probe");

    #[test]
    fn context_commits_once_and_rejects_reuse() {
        let backend = SqliteBackend::in_memory().unwrap();
        let registry = StorageRegistry::with_defaults().unwrap();
        let mut context = TransactionContext::new(&backend, &registry, StoreOptions::default());
        assert_eq!(context.state(), TxState::Idle);

        let value = context.commit_with("probe", PROBE, |_| Ok(7)).unwrap();
        assert_eq!(value, 7);
        assert_eq!(context.state(), TxState::Committed);

        let reused = context.commit_with("probe", PROBE, |_| Ok(8));
        assert!(matches!(
            reused,
            Err(StoreError::InvalidState(TxState::Committed))
        ));
    }

    #[test]
    fn failed_operation_rolls_back_and_counts_zero() {
        let backend = SqliteBackend::in_memory().unwrap();
        let registry = StorageRegistry::with_defaults().unwrap();

        let mut context = TransactionContext::new(&backend, &registry, StoreOptions::default())
            .without_logging();
        let result: Result<(), _> = context.commit_with("probe", PROBE, |_| {
            Err(StoreError::NoSuchStorage("probe".to_string()))
        });
        assert!(matches!(result, Err(StoreError::NoSuchStorage(_))));
        assert_eq!(context.state(), TxState::RolledBack);
        assert!(context.state().is_finished());

        let mut counter = TransactionContext::new(&backend, &registry, StoreOptions::default());
        let count = counter.count_with("probe", PROBE, |_| {
            Err(StoreError::NoSuchStorage("probe".to_string()))
        });
        assert_eq!(count, 0);
    }
}
