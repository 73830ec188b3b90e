// Resource-level API client.
//
// Wraps a `Transport` with auth-header injection, status classification
// and response decoding. One `request` call is exactly one network
// attempt -- retries and token refresh belong to the engine in
// `telesync-core`.

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::error::Error;
use crate::resource::Resource;
use crate::transport::{HttpRequest, HttpResponse, Transport};

/// Authorization scheme expected by the service.
pub const AUTH_SCHEME: &str = "MobileAppToken";

/// Async client that turns a [`Resource`] into a decoded value.
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
}

impl ApiClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Issue one request for `resource`.
    ///
    /// When `auth_token` is `None` the `Authorization` header is simply
    /// omitted; the service decides whether that is acceptable.
    pub async fn request<T>(
        &self,
        auth_token: Option<&SecretString>,
        resource: &Resource<T>,
    ) -> Result<T, Error> {
        let request = build_request(auth_token, resource);
        debug!(method = %request.method, path = %request.path, "sending request");

        let response = self.transport.send(request).await?;
        handle_response(resource, response)
    }
}

fn build_request<T>(auth_token: Option<&SecretString>, resource: &Resource<T>) -> HttpRequest {
    let mut headers = resource.headers().to_vec();
    if let Some(token) = auth_token {
        headers.retain(|(k, _)| !k.eq_ignore_ascii_case("Authorization"));
        headers.push((
            "Authorization".into(),
            format!("{AUTH_SCHEME} {}", token.expose_secret()),
        ));
    }

    HttpRequest {
        method: resource.method().clone(),
        path: resource.path().to_owned(),
        headers,
        body: resource.body().map(<[u8]>::to_vec),
    }
}

fn handle_response<T>(resource: &Resource<T>, response: HttpResponse) -> Result<T, Error> {
    let HttpResponse { status, body } = response;

    if !(200..=299).contains(&status) {
        return Err(classify_status(status, &body));
    }

    if body.is_empty() && resource.expects_body() {
        return Err(Error::NoData);
    }

    resource.parse(&body).ok_or_else(|| {
        let body = String::from_utf8_lossy(&body).into_owned();
        let preview: String = body.chars().take(200).collect();
        debug!(%preview, "response did not decode");
        Error::CouldNotParse { body }
    })
}

fn classify_status(status: u16, body: &[u8]) -> Error {
    if status == 401 {
        return Error::Unauthorized;
    }
    Error::InvalidResponse {
        status,
        body: String::from_utf8_lossy(body).into_owned(),
    }
}
