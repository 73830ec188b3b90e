// Endpoint catalogue for the device API.
//
// Each function returns an inert `Resource`; nothing here touches the
// network. Paths are relative to the service base URL.

use std::sync::Arc;

use reqwest::Method;
use serde_json::json;

use crate::models::{Credential, Device, Event};
use crate::resource::{Parser, Resource};

/// Header naming the single event type carried by a track-events request.
pub const EVENT_TYPE_HEADER: &str = "X-Event-Type";

fn credential_resource(path: String, method: Method, device: &Device) -> Resource<Credential> {
    let parse: Parser<Credential> = Arc::new(Credential::from_response);
    Resource::new(path, method, parse)
        .with_json_headers()
        .with_body(device.to_body().to_string().into_bytes())
}

/// Register a new device.
///
/// `POST /{app_id}/devices`
pub fn register_device(app_id: &str, device: &Device) -> Resource<Credential> {
    credential_resource(format!("/{app_id}/devices"), Method::POST, device)
}

/// Replace the device record. Also used to renew the auth token.
///
/// `PUT /{app_id}/devices/{device_id}`
pub fn update_device(app_id: &str, device_id: &str, device: &Device) -> Resource<Credential> {
    credential_resource(
        format!("/{app_id}/devices/{device_id}"),
        Method::PUT,
        device,
    )
}

/// Partially update the device record (e.g. location only).
///
/// `PATCH /{app_id}/devices/{device_id}`
pub fn patch_device(app_id: &str, device_id: &str, device: &Device) -> Resource<()> {
    Resource::no_result(
        format!("/{app_id}/devices/{device_id}"),
        Method::PATCH,
        Some(&device.to_body()),
    )
}

/// Associate the device with an externally-identified person.
///
/// `POST /{app_id}/devices/{device_id}/assign`
pub fn associate_person(app_id: &str, device_id: &str, external_person_id: &str) -> Resource<()> {
    Resource::no_result(
        format!("/{app_id}/devices/{device_id}/assign"),
        Method::POST,
        Some(&json!({ "external_person_id": external_person_id })),
    )
}

/// `DELETE /{app_id}/devices/{device_id}`
pub fn unregister_device(app_id: &str, device_id: &str) -> Resource<()> {
    Resource::no_result(
        format!("/{app_id}/devices/{device_id}"),
        Method::DELETE,
        None,
    )
}

/// Register a push token for the device.
///
/// `POST /{app_id}/devices/{device_id}/push_registration`
pub fn register_push(app_id: &str, device_id: &str, push_token: &str) -> Resource<()> {
    Resource::no_result(
        format!("/{app_id}/devices/{device_id}/push_registration"),
        Method::POST,
        Some(&json!({ "device": { "push_token": push_token } })),
    )
}

/// `DELETE /{app_id}/devices/{device_id}/push_registration`
pub fn unregister_push(app_id: &str, device_id: &str) -> Resource<()> {
    Resource::no_result(
        format!("/{app_id}/devices/{device_id}/push_registration"),
        Method::DELETE,
        None,
    )
}

/// Send a batch of events. All events are expected to share one type,
/// which is echoed in the `X-Event-Type` header.
///
/// `POST /{app_id}/devices/{device_id}/events`
pub fn track_events(app_id: &str, device_id: &str, events: &[Event]) -> Resource<()> {
    let event_type = events.first().map_or("event", |e| e.event_type.as_str());
    let body = json!({
        "events": events.iter().map(Event::to_wire).collect::<Vec<_>>(),
    });

    Resource::no_result(
        format!("/{app_id}/devices/{device_id}/events"),
        Method::POST,
        Some(&body),
    )
    .with_header(EVENT_TYPE_HEADER, event_type)
}

#[cfg(test)]
mod tests {
    use serde_json::{Map, Value};

    use super::*;

    fn device() -> Device {
        Device::detect(None, "1.0.0")
    }

    fn shape<T>(resource: &Resource<T>) -> (Method, String) {
        (resource.method().clone(), resource.path().to_owned())
    }

    #[test]
    fn paths_and_methods() {
        let d = device();
        let cases = [
            (shape(&register_device("app", &d)), Method::POST, "/app/devices"),
            (shape(&update_device("app", "dev", &d)), Method::PUT, "/app/devices/dev"),
            (shape(&patch_device("app", "dev", &d)), Method::PATCH, "/app/devices/dev"),
            (shape(&associate_person("app", "dev", "p")), Method::POST, "/app/devices/dev/assign"),
            (shape(&unregister_device("app", "dev")), Method::DELETE, "/app/devices/dev"),
            (
                shape(&register_push("app", "dev", "tok")),
                Method::POST,
                "/app/devices/dev/push_registration",
            ),
            (
                shape(&unregister_push("app", "dev")),
                Method::DELETE,
                "/app/devices/dev/push_registration",
            ),
            (shape(&track_events("app", "dev", &[])), Method::POST, "/app/devices/dev/events"),
        ];

        for ((method, path), want_method, want_path) in cases {
            assert_eq!(method, want_method, "{want_path}");
            assert_eq!(path, want_path);
        }
    }

    #[test]
    fn track_events_sets_type_header_and_body() {
        let events = vec![
            Event::new("clickthru", Map::new()),
            Event::new("clickthru", Map::new()),
        ];
        let resource = track_events("app", "dev", &events);

        assert_eq!(resource.header(EVENT_TYPE_HEADER), Some("clickthru"));
        let body: Value = serde_json::from_slice(resource.body().expect("has body")).expect("json");
        assert_eq!(body["events"].as_array().map(Vec::len), Some(2));
        assert_eq!(body["events"][0]["uuid"], events[0].uuid.as_str());
    }

    #[test]
    fn register_push_body_carries_token() {
        let resource = register_push("app", "dev", "ABCD");
        let body: Value = serde_json::from_slice(resource.body().expect("has body")).expect("json");
        assert_eq!(body["device"]["push_token"], "ABCD");
    }

    #[test]
    fn credential_endpoints_decode_credentials() {
        let resource = register_device("app", &device());
        let cred = resource.parse(br#"{"auth_token":"t","device":{"device_id":"d"}}"#);
        assert_eq!(cred, Some(Credential::new("d", "t")));
        assert!(resource.expects_body());
    }
}
