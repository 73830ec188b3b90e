// Wire and persisted models shared by the API and core crates.

use std::fmt;

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value, json};
use strum::{Display, EnumString};
use uuid::Uuid;

// ── Credential ───────────────────────────────────────────────────────

/// The device id / auth token pair issued by the service.
///
/// Serializes flat (`{device_id, auth_token}`) for local persistence;
/// use [`Credential::from_response`] to decode the service's response shape.
#[derive(Clone, Serialize, Deserialize)]
pub struct Credential {
    pub device_id: String,
    #[serde(serialize_with = "expose_secret", deserialize_with = "wrap_secret")]
    pub auth_token: SecretString,
}

impl Credential {
    pub fn new(device_id: impl Into<String>, auth_token: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            auth_token: SecretString::from(auth_token.into()),
        }
    }

    /// Decode `{"auth_token": "...", "device": {"device_id": "..."}}`.
    pub fn from_response(data: &[u8]) -> Option<Self> {
        #[derive(Deserialize)]
        struct DeviceBody {
            device_id: String,
        }
        #[derive(Deserialize)]
        struct CredentialResponse {
            auth_token: String,
            device: DeviceBody,
        }

        let resp: CredentialResponse = serde_json::from_slice(data).ok()?;
        Some(Self::new(resp.device.device_id, resp.auth_token))
    }
}

impl PartialEq for Credential {
    fn eq(&self, other: &Self) -> bool {
        self.device_id == other.device_id
            && self.auth_token.expose_secret() == other.auth_token.expose_secret()
    }
}

impl Eq for Credential {}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("device_id", &self.device_id)
            .field("auth_token", &"[REDACTED]")
            .finish()
    }
}

fn expose_secret<S: Serializer>(secret: &SecretString, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(secret.expose_secret())
}

fn wrap_secret<'de, D: Deserializer<'de>>(d: D) -> Result<SecretString, D::Error> {
    String::deserialize(d).map(SecretString::from)
}

// ── Device ───────────────────────────────────────────────────────────

/// Advertising id reported by platforms where ad tracking is limited.
const ZEROED_ADVERTISING_ID: &str = "00000000-0000-0000-0000-000000000000";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

/// Device description sent on register / update / patch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub os: String,
    pub os_version: String,
    pub sdk_version: String,
    pub app_version: String,
    pub hardware_make: String,
    pub hardware_model: String,
    pub advertising_id: Option<String>,
    pub locale: String,
    pub timezone: String,
    pub location: Option<Location>,
}

impl Device {
    /// Describe the host this process runs on.
    ///
    /// An empty or all-zero advertising id is treated as absent.
    pub fn detect(advertising_id: Option<&str>, app_version: &str) -> Self {
        let advertising_id = advertising_id
            .filter(|id| !id.is_empty() && *id != ZEROED_ADVERTISING_ID)
            .map(str::to_owned);

        Self {
            os: std::env::consts::OS.into(),
            os_version: std::env::var("TELESYNC_OS_VERSION").unwrap_or_else(|_| "unknown".into()),
            sdk_version: env!("CARGO_PKG_VERSION").into(),
            app_version: app_version.into(),
            hardware_make: std::env::consts::FAMILY.into(),
            hardware_model: std::env::consts::ARCH.into(),
            advertising_id,
            locale: std::env::var("LANG")
                .ok()
                .and_then(|lang| lang.split('.').next().map(str::to_owned))
                .filter(|l| !l.is_empty())
                .unwrap_or_else(|| "en_US".into()),
            timezone: std::env::var("TZ").unwrap_or_else(|_| "UTC".into()),
            location: None,
        }
    }

    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    /// `{"device": {...}}` request body.
    pub fn to_body(&self) -> Value {
        json!({ "device": self })
    }
}

// ── Events ───────────────────────────────────────────────────────────

/// Event types the SDK tracks out of the box. Any string is accepted as an
/// event type; these are the ones with special handling or defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
pub enum TrackedEventType {
    /// App opened.
    #[strum(serialize = "launch")]
    Launch,
    /// App opened from a push notification.
    #[strum(serialize = "clickthru")]
    Clickthru,
    /// Inbox message opened.
    #[strum(serialize = "inbox_open")]
    InboxOpen,
}

impl TrackedEventType {
    pub const ALL: [Self; 3] = [Self::Launch, Self::Clickthru, Self::InboxOpen];
}

/// A telemetry event.
///
/// Two events are equal when `uuid`, `event_type` and `timestamp` match;
/// `properties` do not take part. See [`Event::is_identical`] for a full
/// comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub uuid: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl Event {
    /// A new event timestamped now, with a fresh uuid.
    pub fn new(event_type: impl Into<String>, properties: Map<String, Value>) -> Self {
        Self::at(event_type, properties, Utc::now())
    }

    /// A new event with a fresh uuid and an explicit timestamp.
    pub fn at(
        event_type: impl Into<String>,
        properties: Map<String, Value>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            uuid: Uuid::new_v4().to_string().to_uppercase(),
            event_type: event_type.into(),
            timestamp,
            properties,
        }
    }

    /// Equality including `properties`.
    pub fn is_identical(&self, other: &Self) -> bool {
        self == other && self.properties == other.properties
    }

    pub fn is_type(&self, kind: TrackedEventType) -> bool {
        self.event_type == kind.to_string()
    }

    /// Encoding used in the track-events request body.
    pub fn to_wire(&self) -> Value {
        json!({
            "uuid": self.uuid,
            "type": self.event_type,
            "timestamp": self.timestamp.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            "attributes": self.properties,
        })
    }
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.uuid == other.uuid
            && self.event_type == other.event_type
            && self.timestamp == other.timestamp
    }
}

impl Eq for Event {}
