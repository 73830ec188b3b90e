// telesync-core: request execution engine and persistent event batching.

pub mod batcher;
pub mod client;
pub mod credential;
pub mod engine;
pub mod error;
pub mod operation;
pub mod queue;
pub mod storage;

// ── Primary re-exports ──────────────────────────────────────────────
pub use batcher::{Batch, EventBatcher};
pub use client::{ClientConfig, SyncClient, SyncObserver, SyncStatus};
pub use credential::CredentialStore;
pub use engine::{Backoff, Engine, EngineConfig, MAX_RETRIES};
pub use error::CoreError;
pub use operation::{Operation, OperationHandle, OperationState, StateObserver};
pub use queue::OperationQueue;
pub use storage::{FileStorage, MemoryStorage, Storage, StorageError, StorageExt};

// Transport-layer types callers need alongside the client.
pub use telesync_api::{Credential, Device, Event, Location, TrackedEventType, Transport};
