//! Business rules. Handlers authenticate and parse; services authorize,
//! validate and talk to the store under a deadline.

pub mod conversations;
pub mod engagement;
pub mod keys;
pub mod messages;
pub mod sessions;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use courier_shared::error::CourierError;

use crate::clock::Clock;
use crate::store::{Store, StoreError, StoreResult};

pub use conversations::ConversationService;
pub use engagement::EngagementService;
pub use keys::KeyRegistry;
pub use messages::{MessageService, NewMessage};
pub use sessions::SessionEstablisher;

/// Store handle, clock and per-call deadline shared by every service.
#[derive(Clone)]
pub struct ServiceContext {
    pub store: Arc<dyn Store>,
    pub clock: Arc<dyn Clock>,
    pub store_timeout: Duration,
}

impl ServiceContext {
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Run one store operation under the configured deadline. Failures are
    /// logged here once and surfaced as `StorageUnavailable`.
    pub async fn call<T>(
        &self,
        op: &'static str,
        fut: impl Future<Output = StoreResult<T>>,
    ) -> Result<T, CourierError> {
        match tokio::time::timeout(self.store_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(store_err(op, e)),
            Err(_) => {
                tracing::error!(op, timeout = ?self.store_timeout, "store operation timed out");
                Err(CourierError::StorageUnavailable(format!("{op} timed out")))
            }
        }
    }

    /// Run a store operation with no deadline. For background maintenance
    /// whose batches may legitimately outlast a request.
    pub async fn call_unbounded<T>(
        &self,
        op: &'static str,
        fut: impl Future<Output = StoreResult<T>>,
    ) -> Result<T, CourierError> {
        fut.await.map_err(|e| store_err(op, e))
    }
}

fn store_err(op: &'static str, e: StoreError) -> CourierError {
    tracing::error!(op, error = %e, "store operation failed");
    match e {
        StoreError::Database(_) => CourierError::StorageUnavailable(op.into()),
        StoreError::Corrupt(_) => CourierError::Internal("corrupt record".into()),
    }
}

#[derive(Clone)]
pub struct Services {
    pub conversations: ConversationService,
    pub messages: MessageService,
    pub engagement: EngagementService,
    pub keys: KeyRegistry,
    pub sessions: SessionEstablisher,
}

impl Services {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>, store_timeout: Duration) -> Self {
        let ctx = ServiceContext {
            store,
            clock,
            store_timeout,
        };
        let conversations = ConversationService::new(ctx.clone());
        let messages = MessageService::new(ctx.clone(), conversations.clone());
        Self {
            engagement: EngagementService::new(ctx.clone(), messages.clone()),
            keys: KeyRegistry::new(ctx.clone()),
            sessions: SessionEstablisher::new(ctx, conversations.clone()),
            conversations,
            messages,
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::{DateTime, Utc};

    use super::Services;
    use crate::clock::ManualClock;
    use crate::store::memory::MemoryStore;

    pub fn start() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    /// Services over a fresh in-memory store with a controllable clock.
    pub fn services() -> (Services, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(start()));
        let services = Services::new(
            Arc::new(MemoryStore::new()),
            clock.clone(),
            Duration::from_secs(15),
        );
        (services, clock)
    }
}
