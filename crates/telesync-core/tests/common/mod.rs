// Shared fixtures for telesync-core integration tests.

#![allow(dead_code, clippy::unwrap_used)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use telesync_api::{Error, HttpRequest, HttpResponse, Transport};
use telesync_core::{Backoff, ClientConfig, Credential, MemoryStorage, Storage, SyncClient};

pub const APP_ID: &str = "app-1";

/// Transport that replays a fixed script of responses and records every
/// request it receives. Once the script runs out it answers `204`.
#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Result<HttpResponse, Error>>>,
    requests: Mutex<Vec<HttpRequest>>,
    delay: Option<Duration>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Every response is held back by `delay` before it is returned.
    pub fn delayed(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay: Some(delay),
            ..Self::default()
        })
    }

    pub fn push(&self, response: Result<HttpResponse, Error>) -> &Self {
        self.script.lock().unwrap().push_back(response);
        self
    }

    pub fn status(&self, status: u16) -> &Self {
        self.push(Ok(HttpResponse {
            status,
            body: Vec::new(),
        }))
    }

    pub fn json(&self, status: u16, body: &serde_json::Value) -> &Self {
        self.push(Ok(HttpResponse {
            status,
            body: body.to_string().into_bytes(),
        }))
    }

    pub fn credential(&self, device_id: &str, token: &str) -> &Self {
        self.json(
            200,
            &json!({ "auth_token": token, "device": { "device_id": device_id } }),
        )
    }

    pub fn unreachable(&self) -> &Self {
        self.push(Err(Error::Unreachable {
            reason: "connection refused".into(),
        }))
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// `(method, path)` of every request, in order.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.requests()
            .into_iter()
            .map(|r| (r.method.to_string(), r.path))
            .collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, Error> {
        self.requests.lock().unwrap().push(request);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or(Ok(HttpResponse {
            status: 204,
            body: Vec::new(),
        }))
    }
}

pub fn config() -> ClientConfig {
    ClientConfig {
        backoff: Backoff::Immediate,
        ..ClientConfig::new(APP_ID)
    }
}

pub fn client(transport: &Arc<ScriptedTransport>) -> (Arc<MemoryStorage>, SyncClient) {
    let storage = Arc::new(MemoryStorage::new());
    let client = SyncClient::with_transport(config(), storage.clone(), transport.clone());
    (storage, client)
}

/// A client whose store already holds `credential`.
pub fn registered_client(
    transport: &Arc<ScriptedTransport>,
    credential: &Credential,
) -> (Arc<MemoryStorage>, SyncClient) {
    let (storage, client) = client(transport);
    storage
        .set(
            "current_credential",
            Some(serde_json::to_value(credential).unwrap()),
        )
        .unwrap();
    (storage, client)
}
