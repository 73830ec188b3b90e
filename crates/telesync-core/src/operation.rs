// ── Operations ──
//
// An `Operation<T>` is one retryable unit of HTTP work: a resource
// factory evaluated at execution time, a retry budget, an optional
// validation step, an optional shortcut that resolves it without a
// request, and a completion hook. Its lifecycle
// (Pending -> Running -> Finished, or Cancelled) is published through a
// watch channel on the `OperationHandle` returned by the queue.

use std::fmt;
use std::sync::Arc;

use strum::Display;
use telesync_api::{Credential, Resource};
use tokio::sync::{oneshot, watch};
use tracing::trace;

use crate::error::CoreError;

// ── OperationState ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum OperationState {
    Pending,
    Running,
    Finished,
    Cancelled,
}

impl OperationState {
    /// `Finished` and `Cancelled` are never left.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Cancelled)
    }
}

/// Receives every lifecycle transition of operations run by a queue.
pub trait StateObserver: Send + Sync {
    fn on_state_change(&self, id: u64, name: &'static str, state: OperationState);
}

// ── Lifecycle ────────────────────────────────────────────────────────

/// Shared lifecycle cell for one submitted operation.
pub(crate) struct Lifecycle {
    id: u64,
    name: &'static str,
    state: watch::Sender<OperationState>,
    observer: Option<Arc<dyn StateObserver>>,
}

impl Lifecycle {
    pub(crate) fn new(
        id: u64,
        name: &'static str,
        observer: Option<Arc<dyn StateObserver>>,
    ) -> Self {
        let (state, _) = watch::channel(OperationState::Pending);
        Self {
            id,
            name,
            state,
            observer,
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn state(&self) -> OperationState {
        *self.state.borrow()
    }

    /// `Pending -> Running`. Returns `false` if the operation was
    /// cancelled before it got a chance to start.
    pub(crate) fn start(&self) -> bool {
        self.transition(|s| (s == OperationState::Pending).then_some(OperationState::Running))
    }

    /// `Pending | Running -> Cancelled`. No effect once finished.
    pub(crate) fn cancel(&self) -> bool {
        self.transition(|s| (!s.is_terminal()).then_some(OperationState::Cancelled))
    }

    /// `Running -> Finished`. A cancelled operation stays cancelled.
    pub(crate) fn finish(&self) -> bool {
        self.transition(|s| (s == OperationState::Running).then_some(OperationState::Finished))
    }

    fn transition(&self, next: impl FnOnce(OperationState) -> Option<OperationState>) -> bool {
        let mut entered = None;
        self.state.send_if_modified(|state| match next(*state) {
            Some(to) if to != *state => {
                *state = to;
                entered = Some(to);
                true
            }
            _ => false,
        });

        let Some(state) = entered else { return false };
        trace!(id = self.id, name = self.name, %state, "operation state");
        if let Some(observer) = &self.observer {
            observer.on_state_change(self.id, self.name, state);
        }
        true
    }

    fn subscribe(&self) -> watch::Receiver<OperationState> {
        self.state.subscribe()
    }
}

// ── Operation ────────────────────────────────────────────────────────

/// Builds the request at execution time from the then-current credential.
pub type ResourceFactory<T> =
    Box<dyn Fn(Option<&Credential>) -> Result<Resource<T>, CoreError> + Send + Sync>;

/// Local precondition check run before any network call.
pub type Validator = Box<dyn Fn() -> Result<(), CoreError> + Send + Sync>;

/// Resolves the operation from local state, checked when it starts.
pub type Shortcut<T> = Box<dyn Fn(Option<&Credential>) -> Option<T> + Send + Sync>;

/// Post-processes the terminal result. Runs at most once, on the queue
/// worker, before the next operation starts. Operations rejected without
/// running (cancelled while pending, queue closed) skip it.
pub type Completion<T> =
    Box<dyn FnOnce(Result<T, CoreError>) -> Result<T, CoreError> + Send + Sync>;

/// One retryable unit of HTTP work.
pub struct Operation<T> {
    name: &'static str,
    retries: u32,
    validate: Option<Validator>,
    shortcut: Option<Shortcut<T>>,
    resource: ResourceFactory<T>,
    completion: Option<Completion<T>>,
}

impl<T> Operation<T> {
    /// An operation with no retries, no validation and no completion hook.
    pub fn new<F>(name: &'static str, resource: F) -> Self
    where
        F: Fn(Option<&Credential>) -> Result<Resource<T>, CoreError> + Send + Sync + 'static,
    {
        Self {
            name,
            retries: 0,
            validate: None,
            shortcut: None,
            resource: Box::new(resource),
            completion: None,
        }
    }

    /// Retry budget for transient failures. The engine clamps it.
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_validation<F>(mut self, validate: F) -> Self
    where
        F: Fn() -> Result<(), CoreError> + Send + Sync + 'static,
    {
        self.validate = Some(Box::new(validate));
        self
    }

    /// Finish with `shortcut`'s value, without a request, whenever it
    /// returns `Some` for the credential current at execution time.
    pub fn with_shortcut<F>(mut self, shortcut: F) -> Self
    where
        F: Fn(Option<&Credential>) -> Option<T> + Send + Sync + 'static,
    {
        self.shortcut = Some(Box::new(shortcut));
        self
    }

    pub fn with_completion<F>(mut self, completion: F) -> Self
    where
        F: FnOnce(Result<T, CoreError>) -> Result<T, CoreError> + Send + Sync + 'static,
    {
        self.completion = Some(Box::new(completion));
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub(crate) fn validate(&self) -> Result<(), CoreError> {
        self.validate.as_ref().map_or(Ok(()), |validate| validate())
    }

    pub(crate) fn shortcut(&self, credential: Option<&Credential>) -> Option<T> {
        self.shortcut.as_ref().and_then(|shortcut| shortcut(credential))
    }

    pub(crate) fn resource(&self, credential: Option<&Credential>) -> Result<Resource<T>, CoreError> {
        (self.resource)(credential)
    }

    /// Apply the completion hook, consuming it.
    pub(crate) fn complete(&mut self, result: Result<T, CoreError>) -> Result<T, CoreError> {
        match self.completion.take() {
            Some(completion) => completion(result),
            None => result,
        }
    }

    /// Drop the completion hook unrun.
    pub(crate) fn skip_completion(&mut self) {
        self.completion = None;
    }
}

impl<T> fmt::Debug for Operation<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("name", &self.name)
            .field("retries", &self.retries)
            .field("validated", &self.validate.is_some())
            .field("shortcut", &self.shortcut.is_some())
            .finish_non_exhaustive()
    }
}

// ── OperationHandle ──────────────────────────────────────────────────

/// Caller-side view of a submitted operation.
pub struct OperationHandle<T> {
    lifecycle: Arc<Lifecycle>,
    result: oneshot::Receiver<Result<T, CoreError>>,
}

impl<T> OperationHandle<T> {
    pub(crate) fn new(
        lifecycle: Arc<Lifecycle>,
        result: oneshot::Receiver<Result<T, CoreError>>,
    ) -> Self {
        Self { lifecycle, result }
    }

    /// Queue-assigned id, increasing in submission order.
    pub fn id(&self) -> u64 {
        self.lifecycle.id()
    }

    pub fn name(&self) -> &'static str {
        self.lifecycle.name()
    }

    pub fn state(&self) -> OperationState {
        self.lifecycle.state()
    }

    /// Watch lifecycle transitions.
    pub fn subscribe(&self) -> watch::Receiver<OperationState> {
        self.lifecycle.subscribe()
    }

    /// Request cancellation. A pending operation is skipped and completes
    /// with [`CoreError::Cancelled`]; a running one is not interrupted.
    pub fn cancel(&self) -> bool {
        self.lifecycle.cancel()
    }

    /// Wait for the terminal result.
    pub async fn wait(self) -> Result<T, CoreError> {
        self.result.await.unwrap_or_else(|_| Err(CoreError::queue_closed()))
    }
}

impl<T> fmt::Debug for OperationHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationHandle")
            .field("id", &self.id())
            .field("name", &self.name())
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use telesync_api::endpoints;

    use super::*;

    fn resource(_: Option<&Credential>) -> Result<Resource<()>, CoreError> {
        Ok(endpoints::unregister_push("app", "dev"))
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<(u64, OperationState)>>);

    impl StateObserver for Recorder {
        fn on_state_change(&self, id: u64, _name: &'static str, state: OperationState) {
            self.0.lock().expect("lock").push((id, state));
        }
    }

    #[test]
    fn normal_lifecycle() {
        let recorder = Arc::new(Recorder::default());
        let observer: Arc<dyn StateObserver> = recorder.clone();
        let lifecycle = Lifecycle::new(7, "op", Some(observer));

        assert_eq!(lifecycle.state(), OperationState::Pending);
        assert!(lifecycle.start());
        assert!(lifecycle.finish());
        assert!(!lifecycle.finish());
        assert!(!lifecycle.cancel());

        assert_eq!(
            *recorder.0.lock().expect("lock"),
            vec![(7, OperationState::Running), (7, OperationState::Finished)]
        );
    }

    #[test]
    fn cancelled_before_start_is_skipped() {
        let lifecycle = Lifecycle::new(1, "op", None);
        assert!(lifecycle.cancel());
        assert!(!lifecycle.start());
        assert_eq!(lifecycle.state(), OperationState::Cancelled);
    }

    #[test]
    fn cancelled_while_running_stays_cancelled() {
        let lifecycle = Lifecycle::new(1, "op", None);
        assert!(lifecycle.start());
        assert!(lifecycle.cancel());
        assert!(!lifecycle.finish());
        assert_eq!(lifecycle.state(), OperationState::Cancelled);
    }

    #[test]
    fn watchers_see_transitions() {
        let lifecycle = Lifecycle::new(1, "op", None);
        let mut rx = lifecycle.subscribe();
        lifecycle.start();
        assert!(rx.has_changed().expect("open"));
        assert_eq!(*rx.borrow_and_update(), OperationState::Running);
    }

    #[test]
    fn completion_runs_once() {
        let mut op = Operation::new("op", resource)
            .with_completion(|result: Result<(), CoreError>| result.and(Err(CoreError::NoEvents)));

        assert_eq!(op.complete(Ok(())), Err(CoreError::NoEvents));
        assert_eq!(op.complete(Ok(())), Ok(()));
    }

    #[test]
    fn skipped_completion_never_runs() {
        let mut op = Operation::new("op", resource)
            .with_completion(|result: Result<(), CoreError>| result.and(Err(CoreError::NoEvents)));

        op.skip_completion();
        assert_eq!(op.complete(Err(CoreError::Cancelled)), Err(CoreError::Cancelled));
    }

    #[test]
    fn shortcut_sees_the_credential() {
        let op = Operation::new("op", resource).with_shortcut(|credential| credential.map(|_| ()));

        assert_eq!(op.shortcut(None), None);
        assert_eq!(op.shortcut(Some(&Credential::new("dev", "tok"))), Some(()));
    }

    #[test]
    fn wait_resolves_once_the_result_arrives() {
        let (tx, rx) = oneshot::channel();
        let handle = OperationHandle::<u32>::new(Arc::new(Lifecycle::new(1, "op", None)), rx);
        let mut wait = tokio_test::task::spawn(handle.wait());

        tokio_test::assert_pending!(wait.poll());
        tx.send(Ok(5)).expect("receiver alive");
        assert!(wait.is_woken());
        tokio_test::assert_ready_eq!(wait.poll(), Ok(5));
    }

    #[test]
    fn wait_reports_queue_closed_when_the_worker_drops_it() {
        let (tx, rx) = oneshot::channel::<Result<u32, CoreError>>();
        let handle = OperationHandle::new(Arc::new(Lifecycle::new(1, "op", None)), rx);
        let mut wait = tokio_test::task::spawn(handle.wait());

        drop(tx);
        tokio_test::assert_ready_eq!(wait.poll(), Err(CoreError::queue_closed()));
    }

    #[test]
    fn validation_defaults_to_ok() {
        let op = Operation::new("op", resource);
        assert_eq!(op.validate(), Ok(()));

        let op = op.with_validation(|| Err(CoreError::NoPushToken));
        assert_eq!(op.validate(), Err(CoreError::NoPushToken));
    }
}
