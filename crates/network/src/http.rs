// -------------------------------------------------------------------------------------------------
//  Copyright (C) 2015-2025 Nautech Systems Pty Ltd. All rights reserved.
//  https://nautechsystems.io
//
//  Licensed under the GNU Lesser General Public License Version 3.0 (the "License");
//  You may not use this file except in compliance with the License.
//  You may obtain a copy of the License at https://www.gnu.org/licenses/lgpl-3.0.en.html
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.
// -------------------------------------------------------------------------------------------------

//! A pooled, closable HTTP client built on `reqwest`.
//!
//! The client keeps connections alive, bounds the number of in-flight requests, and retains a
//! configured list of response header fields in each [`HttpResponse`]. Closing the client is
//! idempotent and fails every later request with [`HttpClientError::Closed`].

use std::{collections::HashMap, time::Duration};

use arc_swap::ArcSwapOption;
use bytes::Bytes;
use marketlink_core::consts::MARKETLINK_USER_AGENT;
use reqwest::{
    Method, StatusCode,
    header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue},
};
use tokio::sync::Semaphore;

/// Configuration for an [`HttpClient`].
#[derive(Clone, Debug)]
pub struct HttpClientConfig {
    /// Timeout for establishing a connection, also bounding the wait for a free connection slot.
    pub connect_timeout: Duration,
    /// Timeout for each read of the response.
    pub read_timeout: Duration,
    /// Whether HTTP/2 may be negotiated. When false the client speaks HTTP/1.1 only.
    pub http2: bool,
    /// The `User-Agent` header value.
    pub user_agent: String,
    /// Maximum number of requests in flight at once.
    pub max_connections: usize,
    /// Maximum number of idle connections kept per host.
    pub max_idle_per_host: usize,
    /// How long an idle connection is kept alive.
    pub idle_timeout: Duration,
    /// Headers sent with every request.
    pub default_headers: HashMap<String, String>,
    /// Response header fields retained in [`HttpResponse::headers`].
    pub header_keys: Vec<String>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(30),
            http2: true,
            user_agent: MARKETLINK_USER_AGENT.to_string(),
            max_connections: 20,
            max_idle_per_host: 10,
            idle_timeout: Duration::from_secs(60),
            default_headers: HashMap::new(),
            header_keys: Vec::new(),
        }
    }
}

/// Errors returned by the [`HttpClient`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum HttpClientError {
    /// The request failed at the transport level.
    #[error("HTTP error occurred: {0}")]
    Error(String),
    /// The request or the wait for a connection slot timed out.
    #[error("HTTP request timed out: {0}")]
    TimeoutError(String),
    /// The client has been closed.
    #[error("client closed")]
    Closed,
}

impl From<reqwest::Error> for HttpClientError {
    fn from(source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::TimeoutError(source.to_string())
        } else {
            Self::Error(source.to_string())
        }
    }
}

/// The relevant data of an HTTP response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// The response status code.
    pub status: StatusCode,
    /// The retained response headers, keyed as configured in [`HttpClientConfig::header_keys`].
    pub headers: HashMap<String, String>,
    /// The raw response body.
    pub body: Bytes,
}

impl HttpResponse {
    /// Returns the retained header value for `key`, matching case-insensitively.
    #[must_use]
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }
}

/// A pooled HTTP client with a bounded number of in-flight requests.
#[derive(Debug)]
pub struct HttpClient {
    client: ArcSwapOption<reqwest::Client>,
    permits: Semaphore,
    slot_timeout: Duration,
    header_keys: Vec<String>,
}

impl HttpClient {
    /// Creates a new [`HttpClient`] from `config`.
    ///
    /// `Authorization` default headers are marked sensitive so they never appear in debug output.
    ///
    /// # Errors
    ///
    /// Returns an error if a default header is malformed or the underlying client fails to build.
    pub fn new(config: HttpClientConfig) -> Result<Self, HttpClientError> {
        let mut headers = HeaderMap::with_capacity(config.default_headers.len());
        for (key, value) in &config.default_headers {
            let name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|e| HttpClientError::Error(format!("invalid header name '{key}': {e}")))?;
            let mut value = HeaderValue::from_str(value).map_err(|e| {
                HttpClientError::Error(format!("invalid value for header '{key}': {e}"))
            })?;
            if name == AUTHORIZATION {
                value.set_sensitive(true);
            }
            headers.insert(name, value);
        }

        let mut builder = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(config.user_agent.as_str())
            .connect_timeout(config.connect_timeout)
            .read_timeout(config.read_timeout)
            .pool_max_idle_per_host(config.max_idle_per_host)
            .pool_idle_timeout(config.idle_timeout);
        if !config.http2 {
            builder = builder.http1_only();
        }
        let client = builder.build()?;

        Ok(Self {
            client: ArcSwapOption::from_pointee(client),
            permits: Semaphore::new(config.max_connections.max(1)),
            slot_timeout: config.connect_timeout,
            header_keys: config.header_keys,
        })
    }

    /// Sends an HTTP request and reads the full response body.
    ///
    /// # Errors
    ///
    /// Returns an error if the client is closed, no connection slot frees up within the connect
    /// timeout, or the request fails at the transport level. Non-2xx statuses are not errors.
    pub async fn request(
        &self,
        method: Method,
        url: String,
        headers: Option<HashMap<String, String>>,
        body: Option<Vec<u8>>,
        timeout: Option<Duration>,
    ) -> Result<HttpResponse, HttpClientError> {
        let client = self.client.load_full().ok_or(HttpClientError::Closed)?;

        let _permit = match tokio::time::timeout(self.slot_timeout, self.permits.acquire()).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(HttpClientError::Closed),
            Err(_) => {
                return Err(HttpClientError::TimeoutError(format!(
                    "no connection slot available within {:?}",
                    self.slot_timeout
                )));
            }
        };

        let mut request = client.request(method, url);
        if let Some(headers) = headers {
            for (key, value) in headers {
                request = request.header(key, value);
            }
        }
        if let Some(body) = body {
            request = request.body(body);
        }
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await?;
        self.to_response(response).await
    }

    async fn to_response(
        &self,
        response: reqwest::Response,
    ) -> Result<HttpResponse, HttpClientError> {
        let headers = self
            .header_keys
            .iter()
            .filter_map(|key| {
                response
                    .headers()
                    .get(key.as_str())
                    .and_then(|value| value.to_str().ok())
                    .map(|value| (key.clone(), value.to_owned()))
            })
            .collect();
        let status = response.status();
        let body = response.bytes().await?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }

    /// Closes the client, releasing pooled connections once in-flight requests finish.
    ///
    /// Returns `true` if this call closed the client, `false` if it was already closed.
    pub fn close(&self) -> bool {
        let was_open = self.client.swap(None).is_some();
        self.permits.close();
        was_open
    }

    /// Returns whether the client has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.client.load().is_none()
    }
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////
#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use axum::{
        Router,
        http::{HeaderMap as AxumHeaderMap, StatusCode as AxumStatusCode},
        response::IntoResponse,
        routing::{get, post},
    };
    use rstest::rstest;

    use super::*;

    async fn start_test_server() -> SocketAddr {
        let router = Router::new()
            .route("/get", get(|| async { "hello-world!" }))
            .route("/post", post(|body: String| async move { body }))
            .route(
                "/echo-auth",
                get(|headers: AxumHeaderMap| async move {
                    headers
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default()
                        .to_string()
                }),
            )
            .route(
                "/headers",
                get(|| async {
                    (
                        AxumStatusCode::TOO_MANY_REQUESTS,
                        [("Retry-After", "3"), ("X-Request-Id", "srv-1"), ("X-Other", "x")],
                        "slow down",
                    )
                        .into_response()
                }),
            )
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(2)).await;
                    "late"
                }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        addr
    }

    fn test_client(header_keys: Vec<&str>) -> HttpClient {
        HttpClient::new(HttpClientConfig {
            http2: false,
            default_headers: HashMap::from([(
                "Authorization".to_string(),
                "Basic dXNlcjpwYXNz".to_string(),
            )]),
            header_keys: header_keys.into_iter().map(String::from).collect(),
            ..HttpClientConfig::default()
        })
        .unwrap()
    }

    #[rstest]
    #[tokio::test]
    async fn test_get() {
        let addr = start_test_server().await;
        let client = test_client(vec![]);

        let response = client
            .request(Method::GET, format!("http://{addr}/get"), None, None, None)
            .await
            .unwrap();

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(String::from_utf8_lossy(&response.body), "hello-world!");
    }

    #[rstest]
    #[tokio::test]
    async fn test_post_body() {
        let addr = start_test_server().await;
        let client = test_client(vec![]);

        let response = client
            .request(
                Method::POST,
                format!("http://{addr}/post"),
                Some(HashMap::from([(
                    "Content-Type".to_string(),
                    "application/json".to_string(),
                )])),
                Some(br#"{"a":1}"#.to_vec()),
                None,
            )
            .await
            .unwrap();

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(&response.body[..], br#"{"a":1}"#);
    }

    #[rstest]
    #[tokio::test]
    async fn test_default_headers_sent() {
        let addr = start_test_server().await;
        let client = test_client(vec![]);

        let response = client
            .request(Method::GET, format!("http://{addr}/echo-auth"), None, None, None)
            .await
            .unwrap();

        assert_eq!(String::from_utf8_lossy(&response.body), "Basic dXNlcjpwYXNz");
    }

    #[rstest]
    #[tokio::test]
    async fn test_retains_only_configured_headers() {
        let addr = start_test_server().await;
        let client = test_client(vec!["Retry-After", "X-Request-Id"]);

        let response = client
            .request(Method::GET, format!("http://{addr}/headers"), None, None, None)
            .await
            .unwrap();

        assert_eq!(response.status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.header("retry-after"), Some("3"));
        assert_eq!(response.header("X-Request-Id"), Some("srv-1"));
        assert_eq!(response.header("X-Other"), None);
    }

    #[rstest]
    #[tokio::test]
    async fn test_request_timeout() {
        let addr = start_test_server().await;
        let client = test_client(vec![]);

        let result = client
            .request(
                Method::GET,
                format!("http://{addr}/slow"),
                None,
                None,
                Some(Duration::from_millis(100)),
            )
            .await;

        assert!(matches!(result, Err(HttpClientError::TimeoutError(_))));
    }

    #[rstest]
    #[tokio::test]
    async fn test_close_is_idempotent() {
        let addr = start_test_server().await;
        let client = test_client(vec![]);

        assert!(!client.is_closed());
        assert!(client.close());
        assert!(!client.close());
        assert!(client.is_closed());

        let result = client
            .request(Method::GET, format!("http://{addr}/get"), None, None, None)
            .await;
        assert!(matches!(result, Err(HttpClientError::Closed)));
    }

    #[rstest]
    fn test_invalid_default_header_rejected() {
        let result = HttpClient::new(HttpClientConfig {
            default_headers: HashMap::from([("Bad Header".to_string(), "v".to_string())]),
            ..HttpClientConfig::default()
        });

        assert!(matches!(result, Err(HttpClientError::Error(_))));
    }
}
