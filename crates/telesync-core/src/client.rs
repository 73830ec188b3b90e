// ── SyncClient ──
//
// High-level facade: builds operations for each device action, submits
// them to the serial queue and reports outcomes to an optional observer.
// Persistent side effects (credential, push flags) run inside each
// operation's completion, so they land before the next operation starts.

use std::fmt::Write as _;
use std::sync::{Arc, RwLock, Weak};
use std::time::Duration;

use serde::Serialize;
use serde_json::{Map, Value};
use telesync_api::{
    ApiClient, Credential, Device, Event, HttpTransport, Location, Transport, TransportConfig,
    endpoints,
};
use tracing::{debug, info, warn};

use crate::batcher::{self, Batch, EventBatcher};
use crate::credential::CredentialStore;
use crate::engine::{Backoff, Engine, EngineConfig, MAX_RETRIES};
use crate::error::CoreError;
use crate::operation::{Operation, OperationHandle, StateObserver};
use crate::queue::OperationQueue;
use crate::storage::{Storage, StorageExt, keys};

/// Default service base URL.
pub const DEFAULT_API_URL: &str = "https://public-api.telesync.dev/mobile_apps";

/// Event types tracked when the configuration does not say otherwise.
pub const DEFAULT_TRACKED_EVENT_TYPES: [&str; 2] = ["launch", "clickthru"];

// ── Configuration ────────────────────────────────────────────────────

/// Everything needed to build a [`SyncClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub app_id: String,
    pub api_url: String,
    pub advertising_id: Option<String>,
    pub app_version: String,
    pub timeout: Duration,
    pub backoff: Backoff,
    /// Only these event types are sent by [`SyncClient::track`].
    pub tracked_event_types: Vec<String>,
}

impl ClientConfig {
    pub fn new(app_id: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            api_url: DEFAULT_API_URL.into(),
            advertising_id: None,
            app_version: "unknown".into(),
            timeout: TransportConfig::default().timeout,
            backoff: Backoff::default(),
            tracked_event_types: DEFAULT_TRACKED_EVENT_TYPES
                .iter()
                .map(|&t| t.to_owned())
                .collect(),
        }
    }

    fn device(&self) -> Device {
        Device::detect(self.advertising_id.as_deref(), &self.app_version)
    }
}

// ── Observer ─────────────────────────────────────────────────────────

/// Outcome callbacks for device actions. Every method defaults to a no-op.
pub trait SyncObserver: Send + Sync {
    fn did_register_device(&self, _result: &Result<Credential, CoreError>) {}
    fn did_unregister_device(&self, _result: &Result<(), CoreError>) {}
    fn did_update_device(&self, _result: &Result<Credential, CoreError>) {}
    fn did_register_push(&self, _result: &Result<(), CoreError>) {}
    fn did_unregister_push(&self, _result: &Result<(), CoreError>) {}
}

// ── Status ───────────────────────────────────────────────────────────

/// Snapshot of local state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncStatus {
    pub device_id: Option<String>,
    pub known_devices: usize,
    pub push_token: Option<String>,
    pub push_registered: bool,
    pub pending_events: usize,
}

// ── SyncClient ───────────────────────────────────────────────────────

/// Cheaply cloneable client handle.
#[derive(Clone)]
pub struct SyncClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    config: ClientConfig,
    storage: Arc<dyn Storage>,
    credentials: CredentialStore,
    batcher: Arc<EventBatcher>,
    queue: OperationQueue,
    observer: RwLock<Option<Weak<dyn SyncObserver>>>,
}

impl SyncClient {
    /// Build a client talking HTTP to `config.api_url`.
    ///
    /// Spawns the queue worker, so this must run inside a tokio runtime.
    pub fn new(config: ClientConfig, storage: Arc<dyn Storage>) -> Result<Self, CoreError> {
        let transport_config = TransportConfig {
            timeout: config.timeout,
            ..TransportConfig::default()
        };
        let transport = HttpTransport::new(&config.api_url, &transport_config)?;
        Ok(Self::with_transport(config, storage, Arc::new(transport)))
    }

    /// Build a client over an arbitrary transport.
    pub fn with_transport(
        config: ClientConfig,
        storage: Arc<dyn Storage>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self::build(config, storage, transport, None)
    }

    /// Like [`SyncClient::with_transport`], also reporting every
    /// operation state transition to `state_observer`.
    pub fn with_state_observer(
        config: ClientConfig,
        storage: Arc<dyn Storage>,
        transport: Arc<dyn Transport>,
        state_observer: Arc<dyn StateObserver>,
    ) -> Self {
        Self::build(config, storage, transport, Some(state_observer))
    }

    fn build(
        config: ClientConfig,
        storage: Arc<dyn Storage>,
        transport: Arc<dyn Transport>,
        state_observer: Option<Arc<dyn StateObserver>>,
    ) -> Self {
        let credentials = CredentialStore::new(Arc::clone(&storage));
        let engine = Engine::new(
            ApiClient::new(transport),
            credentials.clone(),
            EngineConfig {
                app_id: config.app_id.clone(),
                device: config.device(),
                backoff: config.backoff,
                max_retries: MAX_RETRIES,
            },
        );
        let queue = OperationQueue::with_observer(Arc::new(engine), state_observer);

        Self {
            inner: Arc::new(ClientInner {
                batcher: Arc::new(EventBatcher::new(Arc::clone(&storage))),
                config,
                storage,
                credentials,
                queue,
                observer: RwLock::new(None),
            }),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    // ── Observer ─────────────────────────────────────────────────────

    /// Report action outcomes to `observer`. Only a weak reference is
    /// kept; once the observer is dropped, callbacks stop silently.
    pub fn set_observer(&self, observer: &Arc<dyn SyncObserver>) {
        if let Ok(mut slot) = self.inner.observer.write() {
            *slot = Some(Arc::downgrade(observer));
        }
    }

    pub fn clear_observer(&self) {
        if let Ok(mut slot) = self.inner.observer.write() {
            *slot = None;
        }
    }

    fn notify(&self, f: impl FnOnce(&dyn SyncObserver)) {
        let observer = self
            .inner
            .observer
            .read()
            .ok()
            .and_then(|slot| slot.as_ref().and_then(Weak::upgrade));
        match observer {
            Some(observer) => f(observer.as_ref()),
            None => debug!("no observer to notify"),
        }
    }

    // ── Device lifecycle ─────────────────────────────────────────────

    /// Register this device. When a credential is already stored at the
    /// time the operation runs, it is returned without a network call.
    pub async fn register_device(&self) -> Result<Credential, CoreError> {
        let result = self.submit(self.register_operation()).wait().await;
        self.notify(|o| o.did_register_device(&result));
        result
    }

    fn register_operation(&self) -> Operation<Credential> {
        let app_id = self.inner.config.app_id.clone();
        let device = self.inner.config.device();
        let credentials = self.inner.credentials.clone();

        Operation::new("register_device", move |_| {
            Ok(endpoints::register_device(&app_id, &device))
        })
        .with_shortcut(|credential| {
            let existing = credential.cloned()?;
            debug!(device_id = %existing.device_id, "device already registered");
            Some(existing)
        })
        .with_completion(move |result| {
            let credential = result?;
            credentials.set(Some(&credential))?;
            credentials.remember(&credential)?;
            info!(device_id = %credential.device_id, "device registered");
            Ok(credential)
        })
    }

    /// Unregister this device.
    ///
    /// The local credential and push registration are cleared whatever
    /// the server answers; the server's error (if any) is still returned.
    pub async fn unregister_device(&self) -> Result<(), CoreError> {
        let app_id = self.inner.config.app_id.clone();
        let credentials = self.inner.credentials.clone();
        let storage = Arc::clone(&self.inner.storage);

        let op = Operation::new("unregister_device", move |credential| {
            let credential = credential.ok_or(CoreError::NoCredentials)?;
            Ok(endpoints::unregister_device(&app_id, &credential.device_id))
        })
        .with_retries(MAX_RETRIES)
        .with_completion(move |result| {
            if result == Err(CoreError::NoCredentials) {
                return result;
            }
            if let Some(current) = credentials.get()? {
                credentials.forget(&current)?;
            }
            credentials.set(None)?;
            storage.store::<bool>(keys::PUSH_REGISTERED, None)?;
            if let Err(e) = &result {
                warn!(error = %e, "unregister failed on the server, local credential cleared");
            }
            result
        });

        let result = self.submit(op).wait().await;
        self.notify(|o| o.did_unregister_device(&result));
        result
    }

    /// Replace the device record, optionally with a location. The
    /// credential returned by the service becomes the current one.
    pub async fn update_device(&self, location: Option<Location>) -> Result<Credential, CoreError> {
        let app_id = self.inner.config.app_id.clone();
        let device = self.device_with(location);
        let credentials = self.inner.credentials.clone();

        let op = Operation::new("update_device", move |credential| {
            let credential = credential.ok_or(CoreError::NoCredentials)?;
            Ok(endpoints::update_device(
                &app_id,
                &credential.device_id,
                &device,
            ))
        })
        .with_completion(move |result| {
            let credential = result?;
            credentials.set(Some(&credential))?;
            credentials.remember(&credential)?;
            Ok(credential)
        });

        let result = self.submit(op).wait().await;
        self.notify(|o| o.did_update_device(&result));
        result
    }

    /// Partially update the device record.
    pub async fn patch_device(&self, location: Option<Location>) -> Result<(), CoreError> {
        let app_id = self.inner.config.app_id.clone();
        let device = self.device_with(location);

        let op = Operation::new("patch_device", move |credential| {
            let credential = credential.ok_or(CoreError::NoCredentials)?;
            Ok(endpoints::patch_device(&app_id, &credential.device_id, &device))
        })
        .with_retries(MAX_RETRIES);

        self.submit(op).wait().await
    }

    /// Associate this device with an external person id.
    pub async fn associate_person(&self, external_person_id: &str) -> Result<(), CoreError> {
        let app_id = self.inner.config.app_id.clone();
        let person = external_person_id.to_owned();

        let op = Operation::new("associate_person", move |credential| {
            let credential = credential.ok_or(CoreError::NoCredentials)?;
            Ok(endpoints::associate_person(
                &app_id,
                &credential.device_id,
                &person,
            ))
        })
        .with_retries(MAX_RETRIES);

        self.submit(op).wait().await
    }

    fn device_with(&self, location: Option<Location>) -> Device {
        let device = self.inner.config.device();
        match location {
            Some(location) => device.with_location(location),
            None => device,
        }
    }

    // ── Push ─────────────────────────────────────────────────────────

    /// Store a raw push token as uppercase hex.
    pub fn set_push_token(&self, token: &[u8]) -> Result<(), CoreError> {
        let hex = token.iter().fold(String::with_capacity(token.len() * 2), |mut s, b| {
            let _ = write!(s, "{b:02X}");
            s
        });
        self.set_push_token_str(&hex)
    }

    /// Store an already-encoded push token as-is.
    pub fn set_push_token_str(&self, token: &str) -> Result<(), CoreError> {
        self.inner
            .storage
            .store(keys::PUSH_TOKEN, Some(&token.to_owned()))?;
        debug!("push token stored");
        Ok(())
    }

    pub fn push_token(&self) -> Result<Option<String>, CoreError> {
        Ok(self.inner.storage.load(keys::PUSH_TOKEN)?)
    }

    /// Register the stored push token with the service.
    pub async fn register_push(&self) -> Result<(), CoreError> {
        let app_id = self.inner.config.app_id.clone();
        let storage = Arc::clone(&self.inner.storage);
        let flag_storage = Arc::clone(&self.inner.storage);

        let op = Operation::new("register_push", move |credential| {
            let credential = credential.ok_or(CoreError::NoCredentials)?;
            let token: String = storage
                .load(keys::PUSH_TOKEN)?
                .ok_or(CoreError::NoPushToken)?;
            Ok(endpoints::register_push(
                &app_id,
                &credential.device_id,
                &token,
            ))
        })
        .with_retries(MAX_RETRIES)
        .with_completion(move |result| {
            result?;
            flag_storage.store(keys::PUSH_REGISTERED, Some(&true))?;
            Ok(())
        });

        let result = self.submit(op).wait().await;
        self.notify(|o| o.did_register_push(&result));
        result
    }

    /// Remove the push registration from the service.
    pub async fn unregister_push(&self) -> Result<(), CoreError> {
        let app_id = self.inner.config.app_id.clone();
        let storage = Arc::clone(&self.inner.storage);

        let op = Operation::new("unregister_push", move |credential| {
            let credential = credential.ok_or(CoreError::NoCredentials)?;
            Ok(endpoints::unregister_push(&app_id, &credential.device_id))
        })
        .with_retries(MAX_RETRIES)
        .with_completion(move |result| {
            result?;
            storage.store::<bool>(keys::PUSH_REGISTERED, None)?;
            Ok(())
        });

        let result = self.submit(op).wait().await;
        self.notify(|o| o.did_unregister_push(&result));
        result
    }

    // ── Events ───────────────────────────────────────────────────────

    /// Track one event of `event_type` if that type is enabled in the
    /// configuration. Returns `false` when the type is not tracked.
    pub async fn track(
        &self,
        event_type: &str,
        properties: Map<String, Value>,
    ) -> Result<bool, CoreError> {
        if !self
            .inner
            .config
            .tracked_event_types
            .iter()
            .any(|t| t == event_type)
        {
            debug!(event_type, "event type not tracked, skipping");
            return Ok(false);
        }
        self.track_events(vec![Event::new(event_type, properties)])
            .await?;
        Ok(true)
    }

    /// Persist `events` and send every unsent event of their type.
    ///
    /// On success the sent events are removed from storage; on failure
    /// they stay and are retried with the next batch of the same type.
    pub async fn track_events(&self, events: Vec<Event>) -> Result<(), CoreError> {
        let batch = self.inner.batcher.track(events)?;
        self.submit(self.send_operation(batch)).wait().await
    }

    /// Send `batch`; the completion acknowledges it on the queue worker,
    /// so the acknowledgement happens even if the caller stops waiting.
    fn send_operation(&self, batch: Batch) -> Operation<()> {
        let app_id = self.inner.config.app_id.clone();
        let store = Arc::clone(&self.inner.batcher);
        let sent = batch.clone();
        let events = Arc::new(batch.events);
        let to_validate = Arc::clone(&events);

        Operation::new("track_events", move |credential| {
            let credential = credential.ok_or(CoreError::NoCredentials)?;
            Ok(endpoints::track_events(
                &app_id,
                &credential.device_id,
                &events,
            ))
        })
        .with_validation(move || batcher::validate(&to_validate))
        .with_completion(move |result| {
            match &result {
                Ok(()) => store.acknowledge(&sent)?,
                Err(e) => warn!(
                    event_type = %sent.event_type,
                    events = sent.len(),
                    error = %e,
                    "events kept for a later send"
                ),
            }
            result
        })
    }

    /// Events persisted but not yet acknowledged by the service.
    pub fn pending_events(&self) -> Result<Vec<Event>, CoreError> {
        self.inner.batcher.pending()
    }

    // ── State ────────────────────────────────────────────────────────

    pub fn credential(&self) -> Result<Option<Credential>, CoreError> {
        self.inner.credentials.get()
    }

    pub fn known_credentials(&self) -> Result<Vec<Credential>, CoreError> {
        self.inner.credentials.all()
    }

    pub fn status(&self) -> Result<SyncStatus, CoreError> {
        let push_registered: Option<bool> = self.inner.storage.load(keys::PUSH_REGISTERED)?;
        Ok(SyncStatus {
            device_id: self.credential()?.map(|c| c.device_id),
            known_devices: self.known_credentials()?.len(),
            push_token: self.push_token()?,
            push_registered: push_registered.unwrap_or(false),
            pending_events: self.pending_events()?.len(),
        })
    }

    /// Submit a custom operation to the serial queue.
    pub fn submit<T: Send + 'static>(&self, op: Operation<T>) -> OperationHandle<T> {
        self.inner.queue.submit(op)
    }

    /// Stop the queue once the in-flight operation completes.
    pub async fn shutdown(&self) {
        self.inner.queue.shutdown().await;
    }
}
