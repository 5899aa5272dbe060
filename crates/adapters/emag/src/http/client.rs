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

//! Provides the HTTP client for the **eMAG Marketplace API** (`api-3`).
//!
//! The core type exported by this module is [`EmagHttpClient`]. Every call goes through a single
//! executor which:
//! - Admits the call through the local rate limiter of its resource group.
//! - POSTs the JSON payload to `{base_url}{resource}/{action}` with a fresh `X-Request-Id` per
//!   attempt and an optional `X-Idempotency-Key`.
//! - Retries 429, 5xx and transport failures with exponential backoff, waiting out any
//!   `Retry-After` first.
//! - Normalizes the final response into the upstream JSON payload or an [`EmagHttpError`].

use std::{collections::HashMap, fmt::Debug, sync::Arc};

use marketlink_network::{
    http::{HttpClient, HttpClientConfig, HttpClientError, HttpResponse},
    ratelimiter::{RateLimiter, quota::Quota},
    retry::{RetryDecision, RetryManager},
};
use reqwest::{
    Method, StatusCode,
    header::{ACCEPT, ACCEPT_LANGUAGE, AUTHORIZATION, CONTENT_TYPE},
};
use serde_json::{Value, json};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::{
    parse::{decode_body, extract_error_details, is_success_payload, join_path, parse_retry_after},
    query::{
        AwbReadParams, AwbSaveParams, CategoryReadParams, OfferStockUpdateParams, OrderAckParams,
        OrderReadParams, ProductOfferReadParams,
    },
};
use crate::{
    common::{
        consts::{EMAG_HEADER_IDEMPOTENCY_KEY, EMAG_HEADER_REQUEST_ID, EMAG_HEADER_RETRY_AFTER},
        enums::RateLimitGroup,
        idempotency::{make_idempotency_key, new_request_id},
    },
    config::EmagClientConfig,
    error::{EmagBuildError, EmagConfigError, EmagHttpError},
};

const APPLICATION_JSON: &str = "application/json";

/// Returns how a failed attempt should be handled by the retry loop.
///
/// 429 retries after the server-requested cooldown, 5xx and transport failures retry after the
/// regular backoff, everything else is fatal.
#[must_use]
pub fn retry_decision(error: &EmagHttpError) -> RetryDecision {
    match error {
        EmagHttpError::RateLimited { retry_after, .. } => RetryDecision::Retry {
            cooldown: parse_retry_after(retry_after.as_deref()),
        },
        EmagHttpError::ServerError { .. } | EmagHttpError::TransportError(_) => {
            RetryDecision::RETRY
        }
        _ => RetryDecision::Fatal,
    }
}

/// Provides a HTTP client for connecting to the [eMAG](https://marketplace.emag.ro)
/// Marketplace API.
///
/// Owns the connection pool, the per-group rate limiter and the retry manager, and performs the
/// response classification common to every endpoint.
pub struct EmagHttpInnerClient {
    config: EmagClientConfig,
    client: HttpClient,
    limiter: RateLimiter<RateLimitGroup>,
    retry_manager: RetryManager<EmagHttpError>,
    cancellation_token: CancellationToken,
}

impl Debug for EmagHttpInnerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(stringify!(EmagHttpInnerClient))
            .field("account", &self.config.account)
            .field("country", &self.config.country)
            .field("base_url", &self.config.base_url)
            .field("credential", &"<redacted>")
            .finish_non_exhaustive()
    }
}

impl EmagHttpInnerClient {
    /// Creates a new [`EmagHttpInnerClient`] from `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the retry settings are invalid or the connection pool cannot be
    /// built.
    pub fn new(config: EmagClientConfig) -> Result<Self, EmagHttpError> {
        let retry_manager = RetryManager::new(config.retry.clone()).map_err(|e| {
            EmagConfigError::InvalidValue {
                key: "retry".to_string(),
                value: format!("{:?}", config.retry),
                reason: e.to_string(),
            }
        })?;

        let client = HttpClient::new(Self::http_client_config(&config))?;

        let limiter = RateLimiter::new_with_quota(
            Some(Quota::per_second(config.default_rps)),
            Self::rate_limiter_quotas(&config),
        );

        Ok(Self {
            config,
            client,
            limiter,
            retry_manager,
            cancellation_token: CancellationToken::new(),
        })
    }

    fn rate_limiter_quotas(config: &EmagClientConfig) -> Vec<(RateLimitGroup, Quota)> {
        vec![
            (RateLimitGroup::Orders, Quota::per_second(config.orders_rps)),
            (RateLimitGroup::Default, Quota::per_second(config.default_rps)),
        ]
    }

    fn http_client_config(config: &EmagClientConfig) -> HttpClientConfig {
        let default_headers = HashMap::from([
            (CONTENT_TYPE.to_string(), APPLICATION_JSON.to_string()),
            (ACCEPT.to_string(), APPLICATION_JSON.to_string()),
            (
                ACCEPT_LANGUAGE.to_string(),
                config.country.locale().to_string(),
            ),
            (
                AUTHORIZATION.to_string(),
                config.credential.basic_auth_header(),
            ),
        ]);

        HttpClientConfig {
            connect_timeout: config.connect_timeout,
            read_timeout: config.read_timeout,
            http2: config.http2,
            user_agent: config.user_agent.clone(),
            max_connections: config.max_connections,
            max_idle_per_host: config.max_keepalive,
            idle_timeout: config.keepalive_expiry,
            default_headers,
            header_keys: vec![
                EMAG_HEADER_RETRY_AFTER.to_string(),
                EMAG_HEADER_REQUEST_ID.to_string(),
            ],
        }
    }

    /// Returns the configuration this client was built with.
    #[must_use]
    pub fn config(&self) -> &EmagClientConfig {
        &self.config
    }

    /// Cancel all pending HTTP requests.
    pub fn cancel_all_requests(&self) {
        self.cancellation_token.cancel();
    }

    /// Get the cancellation token for this client.
    #[must_use]
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation_token
    }

    /// Closes the connection pool. Returns `false` if it was already closed.
    pub fn close(&self) -> bool {
        self.client.close()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.client.is_closed()
    }

    /// POSTs `payload` to `{resource}/{action}` and returns the normalized response payload.
    ///
    /// A 204 response yields `{"isError": false, "data": null}`. Headers in `extra_headers`
    /// replace generated ones of the same name.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The client is closed or the call is canceled.
    /// - eMAG answers 4xx other than 429 ([`EmagHttpError::ClientError`], never retried).
    /// - Retries are exhausted on 429, 5xx or transport failures.
    /// - The final payload is not recognized as a success ([`EmagHttpError::ServerError`]).
    pub async fn post(
        &self,
        resource: &str,
        action: &str,
        payload: &Value,
        idempotency_key: Option<&str>,
        extra_headers: Option<HashMap<String, String>>,
    ) -> Result<Value, EmagHttpError> {
        if self.client.is_closed() {
            return Err(HttpClientError::Closed.into());
        }

        let group = RateLimitGroup::for_resource(resource);
        let path = join_path(resource, action);

        tokio::select! {
            biased;
            () = self.cancellation_token.cancelled() => {
                return Err(EmagHttpError::Canceled(format!(
                    "POST {path} canceled while waiting for the {group} rate limit"
                )));
            }
            () = self.limiter.until_key_ready(&group) => {}
        }

        let url = format!("{}{path}", self.config.base_url);
        let body = payload.to_string().into_bytes();

        if self.config.http_log {
            let mut keys: Vec<&str> = payload
                .as_object()
                .map(|object| object.keys().map(String::as_str).collect())
                .unwrap_or_default();
            keys.sort_unstable();
            tracing::info!(
                "POST {path} group={group} keys={} idem={}",
                keys.join(","),
                if idempotency_key.is_some() { "yes" } else { "no" },
            );
        }

        let started = Instant::now();

        let operation = || {
            let url = url.clone();
            let path = path.clone();
            let body = body.clone();
            let extra_headers = extra_headers.clone();

            async move {
                let request_id = new_request_id();
                let mut headers =
                    HashMap::from([(EMAG_HEADER_REQUEST_ID.to_string(), request_id.clone())]);
                if let Some(key) = idempotency_key {
                    headers.insert(EMAG_HEADER_IDEMPOTENCY_KEY.to_string(), key.to_string());
                }
                for (key, value) in extra_headers.unwrap_or_default() {
                    headers.retain(|existing, _| !existing.eq_ignore_ascii_case(&key));
                    headers.insert(key, value);
                }

                let resp = self
                    .client
                    .request(Method::POST, url, Some(headers), Some(body), None)
                    .await?;

                tracing::trace!("Response: {resp:?}");
                Self::check_attempt(&path, resp).map(|resp| (resp, request_id))
            }
        };

        let should_retry = |error: &EmagHttpError| {
            // A closed pool never recovers
            if self.client.is_closed() {
                RetryDecision::Fatal
            } else {
                retry_decision(error)
            }
        };

        let (resp, request_id) = self
            .retry_manager
            .execute_with_retry_with_cancel(
                &path,
                operation,
                should_retry,
                EmagHttpError::TransportError,
                &self.cancellation_token,
                EmagHttpError::Canceled,
            )
            .await?;

        if self.config.http_log {
            self.log_response(&path, &resp, &request_id, started);
        }

        Self::normalize_response(&path, &resp)
    }

    /// Turns retryable statuses into errors so the retry loop sees them.
    fn check_attempt(path: &str, resp: HttpResponse) -> Result<HttpResponse, EmagHttpError> {
        let status = resp.status.as_u16();

        if resp.status == StatusCode::TOO_MANY_REQUESTS {
            let payload = decode_body(status, &resp.body);
            return Err(EmagHttpError::RateLimited {
                retry_after: resp.header(EMAG_HEADER_RETRY_AFTER).map(str::to_string),
                details: extract_error_details(&payload),
            });
        }

        if status >= 500 {
            let payload = decode_body(status, &resp.body);
            return Err(EmagHttpError::ServerError {
                status,
                endpoint: path.to_string(),
                details: extract_error_details(&payload),
            });
        }

        Ok(resp)
    }

    fn normalize_response(path: &str, resp: &HttpResponse) -> Result<Value, EmagHttpError> {
        let status = resp.status.as_u16();

        if resp.status == StatusCode::NO_CONTENT {
            return Ok(json!({"isError": false, "data": null}));
        }

        let payload = decode_body(status, &resp.body);

        if resp.status.is_client_error() {
            return Err(EmagHttpError::ClientError {
                status,
                endpoint: path.to_string(),
                details: extract_error_details(&payload),
            });
        }

        if is_success_payload(&payload) {
            return Ok(payload);
        }

        tracing::debug!("Unexpected payload shape from {path} (status {status})");
        Err(EmagHttpError::ServerError {
            status,
            endpoint: path.to_string(),
            details: extract_error_details(&payload),
        })
    }

    fn log_response(&self, path: &str, resp: &HttpResponse, request_id: &str, started: Instant) {
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        let retry_after = resp.header(EMAG_HEADER_RETRY_AFTER).unwrap_or("none");
        let server_request_id = resp.header(EMAG_HEADER_REQUEST_ID).unwrap_or("none");
        let status = resp.status.as_u16();

        if status >= 400 {
            tracing::warn!(
                "POST {path} -> {status} in {elapsed_ms:.1}ms (retry_after={retry_after}, srv_rid={server_request_id}, cli_rid={request_id})"
            );
        } else {
            tracing::info!(
                "POST {path} -> {status} in {elapsed_ms:.1}ms (retry_after={retry_after}, srv_rid={server_request_id}, cli_rid={request_id})"
            );
        }
    }
}

/// Provides a HTTP client for connecting to the [eMAG](https://marketplace.emag.ro)
/// Marketplace API.
///
/// Cheap to clone: clones share the connection pool, the rate limiter and the cancellation
/// token.
#[derive(Clone, Debug)]
pub struct EmagHttpClient {
    inner: Arc<EmagHttpInnerClient>,
}

impl EmagHttpClient {
    /// Creates a new [`EmagHttpClient`] from a resolved configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the retry settings are invalid or the connection pool cannot be
    /// built.
    pub fn new(config: EmagClientConfig) -> Result<Self, EmagHttpError> {
        Ok(Self {
            inner: Arc::new(EmagHttpInnerClient::new(config)?),
        })
    }

    /// Creates a new [`EmagHttpClient`] for `account` and `country` from environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`EmagHttpError::Configuration`] if the configuration cannot be resolved.
    pub fn from_env(account: &str, country: &str) -> Result<Self, EmagHttpError> {
        Self::new(EmagClientConfig::from_env(account, country)?)
    }

    #[must_use]
    pub fn config(&self) -> &EmagClientConfig {
        self.inner.config()
    }

    /// Returns the API root requests are sent under.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.inner.config().base_url
    }

    /// Cancel all pending HTTP requests.
    pub fn cancel_all_requests(&self) {
        self.inner.cancel_all_requests();
    }

    /// Get the cancellation token for this client.
    #[must_use]
    pub fn cancellation_token(&self) -> &CancellationToken {
        self.inner.cancellation_token()
    }

    /// Closes the connection pool.
    ///
    /// Safe to call any number of times. Later calls fail fast with a transport error.
    pub fn close(&self) {
        if self.inner.close() {
            tracing::debug!(
                "Closed eMAG HTTP client for {}/{}",
                self.inner.config().account,
                self.inner.config().country
            );
        }
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    /// POSTs an arbitrary payload to `{resource}/{action}`.
    ///
    /// # Errors
    ///
    /// See [`EmagHttpInnerClient::post`].
    pub async fn post(
        &self,
        resource: &str,
        action: &str,
        payload: &Value,
        idempotency_key: Option<&str>,
        extra_headers: Option<HashMap<String, String>>,
    ) -> Result<Value, EmagHttpError> {
        self.inner
            .post(resource, action, payload, idempotency_key, extra_headers)
            .await
    }

    /// Generic call for endpoints without a typed helper.
    ///
    /// # Errors
    ///
    /// See [`EmagHttpInnerClient::post`].
    pub async fn call(
        &self,
        resource: &str,
        action: &str,
        payload: &Value,
        idempotency_key: Option<&str>,
    ) -> Result<Value, EmagHttpError> {
        self.post(resource, action, payload, idempotency_key, None)
            .await
    }

    /// Reads a page of the category tree.
    ///
    /// The language defaults to the marketplace locale.
    ///
    /// # Errors
    ///
    /// Returns an error if `params` fail validation or the request fails.
    pub async fn category_read(&self, params: CategoryReadParams) -> Result<Value, EmagHttpError> {
        params.validate()?;
        let payload = params.to_payload(self.config().country.locale())?;
        self.post("category", "read", &payload, None, None).await
    }

    /// Creates or updates an offer, sent verbatim.
    ///
    /// The idempotency key is derived from the offer when not given.
    ///
    /// # Errors
    ///
    /// Returns an error if `offer` is not a JSON object or the request fails.
    pub async fn product_offer_save(
        &self,
        offer: &Value,
        idempotency_key: Option<String>,
    ) -> Result<Value, EmagHttpError> {
        if !offer.is_object() {
            return Err(EmagBuildError::OfferNotObject.into());
        }
        let key = idempotency_key.unwrap_or_else(|| make_idempotency_key(offer));
        self.post("product_offer", "save", offer, Some(&key), None)
            .await
    }

    /// Reads a page of the seller's offers.
    ///
    /// # Errors
    ///
    /// Returns an error if `params` fail validation or the request fails.
    pub async fn product_offer_read(
        &self,
        params: ProductOfferReadParams,
        idempotency_key: Option<String>,
    ) -> Result<Value, EmagHttpError> {
        params.validate()?;
        let payload = params.to_payload()?;
        self.post(
            "product_offer",
            "read",
            &payload,
            idempotency_key.as_deref(),
            None,
        )
        .await
    }

    /// Sets the stock of one offer in one warehouse.
    ///
    /// The idempotency key is derived from the payload when not given.
    ///
    /// # Errors
    ///
    /// Returns an error if `params` fail validation or the request fails.
    pub async fn offer_stock_update(
        &self,
        params: OfferStockUpdateParams,
        idempotency_key: Option<String>,
    ) -> Result<Value, EmagHttpError> {
        params.validate()?;
        let payload = params.to_payload()?;
        let key = idempotency_key.unwrap_or_else(|| make_idempotency_key(&payload));
        self.post("product_offer", "save", &payload, Some(&key), None)
            .await
    }

    /// Reads a page of orders.
    ///
    /// # Errors
    ///
    /// Returns an error if `params` fail validation or the request fails.
    pub async fn order_read(&self, params: OrderReadParams) -> Result<Value, EmagHttpError> {
        params.validate()?;
        self.post("order", "read", &params.to_payload(), None, None)
            .await
    }

    /// Acknowledges the given orders.
    ///
    /// The idempotency key is derived from the full id list when not given.
    ///
    /// # Errors
    ///
    /// Returns an error if the id list is empty, contains zero or duplicates, or the request
    /// fails.
    pub async fn order_ack(
        &self,
        order_ids: Vec<u64>,
        idempotency_key: Option<String>,
    ) -> Result<Value, EmagHttpError> {
        let params = OrderAckParams { order_ids };
        params.validate()?;
        let payload = params.to_payload()?;
        let key = idempotency_key.unwrap_or_else(|| make_idempotency_key(&payload));
        self.post("order", "acknowledge", &payload, Some(&key), None)
            .await
    }

    /// Generates an AWB for an order.
    ///
    /// The idempotency key is derived from the payload (including `extra`) when not given.
    ///
    /// # Errors
    ///
    /// Returns an error if `params` fail validation or the request fails.
    pub async fn awb_save(
        &self,
        params: AwbSaveParams,
        idempotency_key: Option<String>,
    ) -> Result<Value, EmagHttpError> {
        params.validate()?;
        let payload = params.to_payload();
        let key = idempotency_key.unwrap_or_else(|| make_idempotency_key(&payload));
        self.post("awb", "save", &payload, Some(&key), None).await
    }

    /// Reads an AWB document.
    ///
    /// # Errors
    ///
    /// Returns an error if `params` fail validation or the request fails.
    pub async fn awb_read(&self, params: AwbReadParams) -> Result<Value, EmagHttpError> {
        params.validate()?;
        let payload = params.to_payload()?;
        self.post("awb", "read", &payload, None, None).await
    }
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////
