// ── Execution engine ──
//
// Runs one operation to its terminal result: validation, request build
// with the current credential, failure classification, at most one
// credential refresh followed by a replay, and randomized-backoff
// retries for transient failures.

use std::time::Duration;

use rand::Rng;
use telesync_api::{ApiClient, Credential, Device, endpoints};
use tracing::{debug, info, warn};

use crate::credential::CredentialStore;
use crate::error::CoreError;
use crate::operation::Operation;

/// Upper bound applied to every operation's retry budget.
pub const MAX_RETRIES: u32 = 3;

/// Upper bound (exclusive) of the randomized retry delay.
pub const DEFAULT_BACKOFF_MAX: Duration = Duration::from_secs(15);

// ── Backoff ──────────────────────────────────────────────────────────

/// Delay policy between retry attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// A uniformly random whole number of seconds in `[0, max)`.
    Random { max: Duration },
    /// No delay at all.
    Immediate,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::Random {
            max: DEFAULT_BACKOFF_MAX,
        }
    }
}

impl Backoff {
    pub fn delay(&self) -> Duration {
        match *self {
            Self::Random { max } => {
                let secs = max.as_secs();
                if secs == 0 {
                    return Duration::ZERO;
                }
                Duration::from_secs(rand::thread_rng().gen_range(0..secs))
            }
            Self::Immediate => Duration::ZERO,
        }
    }
}

// ── Engine ───────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub app_id: String,
    /// Device description sent when refreshing the credential.
    pub device: Device,
    pub backoff: Backoff,
    pub max_retries: u32,
}

impl EngineConfig {
    pub fn new(app_id: impl Into<String>, device: Device) -> Self {
        Self {
            app_id: app_id.into(),
            device,
            backoff: Backoff::default(),
            max_retries: MAX_RETRIES,
        }
    }
}

/// Executes operations against the service.
pub struct Engine {
    api: ApiClient,
    credentials: CredentialStore,
    config: EngineConfig,
}

impl Engine {
    pub fn new(api: ApiClient, credentials: CredentialStore, config: EngineConfig) -> Self {
        Self {
            api,
            credentials,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run `op` until it succeeds or reaches a terminal failure.
    ///
    /// The completion hook is not applied here; the caller owns that.
    pub async fn execute<T: Send>(&self, op: &Operation<T>) -> Result<T, CoreError> {
        if let Some(value) = op.shortcut(self.credentials.get()?.as_ref()) {
            debug!(op = op.name(), "resolved without a request");
            return Ok(value);
        }
        op.validate()?;

        let mut retries = op.retries().min(self.config.max_retries);
        let mut refreshed = false;
        let mut attempt = 0_u32;

        loop {
            attempt += 1;
            let credential = self.credentials.get()?;
            let resource = op.resource(credential.as_ref())?;
            let token = credential.as_ref().map(|c| &c.auth_token);

            debug!(op = op.name(), attempt, retries, "executing");
            let err = match self.api.request(token, &resource).await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if err.is_auth_expired() && !refreshed {
                refreshed = true;
                let Some(current) = credential else {
                    return Err(CoreError::NoCredentials);
                };
                debug!(op = op.name(), "auth token rejected, refreshing");
                self.refresh(&current).await?;
                continue;
            }

            if err.is_retryable() {
                if retries > 0 {
                    retries -= 1;
                    let delay = self.config.backoff.delay();
                    debug!(op = op.name(), error = %err, ?delay, retries, "retrying");
                    tokio::time::sleep(delay).await;
                    continue;
                }
                warn!(op = op.name(), error = %err, attempt, "giving up after retries");
            }

            return Err(err.into());
        }
    }

    /// Renew the auth token with an update-device call signed by the
    /// rejected token. Stores and remembers the new credential.
    async fn refresh(&self, current: &Credential) -> Result<Credential, CoreError> {
        let resource =
            endpoints::update_device(&self.config.app_id, &current.device_id, &self.config.device);

        let credential = self
            .api
            .request(Some(&current.auth_token), &resource)
            .await?;

        self.credentials.set(Some(&credential))?;
        self.credentials.remember(&credential)?;
        info!(device_id = %credential.device_id, "auth token refreshed");
        Ok(credential)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_backoff_stays_below_max() {
        let backoff = Backoff::Random {
            max: Duration::from_secs(3),
        };
        for _ in 0..200 {
            let delay = backoff.delay();
            assert!(delay < Duration::from_secs(3));
            assert_eq!(delay.subsec_nanos(), 0);
        }
    }

    #[test]
    fn zero_max_and_immediate_do_not_wait() {
        let zero = Backoff::Random {
            max: Duration::ZERO,
        };
        assert_eq!(zero.delay(), Duration::ZERO);
        assert_eq!(Backoff::Immediate.delay(), Duration::ZERO);
    }

    #[test]
    fn default_backoff_is_fifteen_seconds() {
        assert_eq!(
            Backoff::default(),
            Backoff::Random {
                max: Duration::from_secs(15)
            }
        );
    }
}
