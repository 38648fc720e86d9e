//! Offline-safe delivery of rating writes: outbox entries, the durable queue,
//! the persistence collaborator interface, and the background worker.

mod outbox;
mod persistence;
mod queue;
mod worker;

pub use outbox::{
    EntryState, JsonFileStore, MemoryStore, OperationType, OutboxEntry, OutboxEntryId,
    OutboxStore, PersistRequest, RatingsPayload,
};
pub use persistence::{
    JsonFilePersistence, PersistenceError, PersistenceErrorKind, RatingsPersistence,
};
pub use queue::{FlushReport, SyncQueue, SyncStatus};
pub use worker::{SyncWorker, PERSIST_CHANNEL_CAPACITY};
