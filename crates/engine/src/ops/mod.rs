use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use sea_orm::DatabaseConnection;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::{Clock, IncurrenceConfig, ResultEngine, SystemClock};

mod incur;
mod ledger;
mod recurring;

/// Run a block inside a transaction scope opened on `$conn`, committing on
/// success and rolling back on error.
///
/// `$conn` may be a connection (top-level transaction) or an open
/// `DatabaseTransaction`, in which case the scope is a savepoint and only the
/// inner work is undone. A scope dropped mid-flight (panic, cancellation)
/// rolls back as well.
macro_rules! with_tx {
    ($conn:expr, |$tx:ident| $body:expr) => {{
        let $tx = ::sea_orm::TransactionTrait::begin($conn).await?;
        let result = async {
            let outcome: $crate::ResultEngine<_> = $body;
            outcome
        }
        .await;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = $tx.rollback().await {
                    tracing::warn!("rollback failed after \"{err}\": {rollback_err}");
                }
                Err(err)
            }
        }
    }};
}

pub(crate) use with_tx;

/// One async mutex per recurring transaction. Incurrence, edits and deletion
/// of the same record never interleave.
#[derive(Debug, Default)]
struct RecordLocks {
    locks: Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>,
}

impl RecordLocks {
    async fn acquire(&self, id: Uuid) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(id).or_default())
        };
        lock.lock_owned().await
    }

    /// Drop the entry of a record that no longer exists. Must be called while
    /// holding its guard; the entry stays while other callers are queued on
    /// it, and the last of them removes it.
    fn forget(&self, id: Uuid) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // One reference in the map, one in the caller's guard.
        if locks.get(&id).is_some_and(|lock| Arc::strong_count(lock) <= 2) {
            locks.remove(&id);
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// Entry point for recurring transactions and their incurrence.
///
/// Cloning is cheap and clones share the per-record locks, so an `Engine` can
/// be handed to concurrent tasks.
#[derive(Clone, Debug)]
pub struct Engine {
    database: DatabaseConnection,
    clock: Arc<dyn Clock>,
    config: IncurrenceConfig,
    locks: Arc<RecordLocks>,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    pub fn config(&self) -> &IncurrenceConfig {
        &self.config
    }
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
    clock: Option<Arc<dyn Clock>>,
    config: IncurrenceConfig,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// Replace the system clock.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> EngineBuilder {
        self.clock = Some(clock);
        self
    }

    pub fn config(mut self, config: IncurrenceConfig) -> EngineBuilder {
        self.config = config;
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        let mut config = self.config;
        config.max_occurrences_per_call = config.max_occurrences_per_call.max(1);
        Ok(Engine {
            database: self.database,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            config,
            locks: Arc::default(),
        })
    }
}
