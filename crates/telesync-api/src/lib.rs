// telesync-api: transport layer for the telesync device API

pub mod client;
pub mod endpoints;
pub mod error;
pub mod models;
pub mod resource;
pub mod transport;

pub use client::ApiClient;
pub use error::Error;
pub use models::{Credential, Device, Event, Location, TrackedEventType};
pub use resource::Resource;
pub use transport::{HttpRequest, HttpResponse, HttpTransport, Transport, TransportConfig};
