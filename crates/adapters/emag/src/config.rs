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

//! Configuration for the eMAG HTTP client.
//!
//! Settings are resolved per `(account, country)` pair from a [`ConfigSource`], checking the
//! layers `EMAG_{ACC}_{CTY}_{SUFFIX}`, `EMAG_{ACC}_{SUFFIX}` and `EMAG_GLOBAL_{SUFFIX}` in that
//! order. Tuning settings additionally fall back to an unprefixed `EMAG_{SUFFIX}` key before
//! the built-in default. Blank values count as unset.

use std::{num::NonZeroU32, str::FromStr, time::Duration};

use ahash::AHashMap;
use marketlink_core::env::{get_env_var_opt, parse_flag};
use marketlink_network::retry::RetryConfig;

use crate::{
    common::{
        consts::{
            EMAG_DEFAULT_CONNECT_TIMEOUT, EMAG_DEFAULT_KEEPALIVE_EXPIRY,
            EMAG_DEFAULT_MAX_CONNECTIONS, EMAG_DEFAULT_MAX_KEEPALIVE, EMAG_DEFAULT_ORDERS_RPS,
            EMAG_DEFAULT_OTHER_RPS, EMAG_DEFAULT_READ_TIMEOUT, EMAG_GLOBAL_SCOPE,
            EMAG_USER_AGENT,
        },
        credential::EmagCredential,
        enums::EmagCountry,
    },
    error::EmagConfigError,
    http::parse::normalize_base_url,
};

/// A source of raw configuration values.
pub trait ConfigSource {
    /// Returns the value for `key`, if set.
    fn get(&self, key: &str) -> Option<String>;
}

/// Reads configuration from process environment variables.
#[derive(Clone, Copy, Debug, Default)]
pub struct EnvConfigSource;

impl ConfigSource for EnvConfigSource {
    fn get(&self, key: &str) -> Option<String> {
        get_env_var_opt(key)
    }
}

/// Reads configuration from an in-memory map.
#[derive(Clone, Debug, Default)]
pub struct MapConfigSource(AHashMap<String, String>);

impl MapConfigSource {
    /// Creates a new [`MapConfigSource`] instance.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key` to `value`.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.0.insert(key.into(), value.into());
        self
    }
}

impl<K, V> FromIterator<(K, V)> for MapConfigSource
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl ConfigSource for MapConfigSource {
    fn get(&self, key: &str) -> Option<String> {
        self.0.get(key).cloned()
    }
}

/// Ordered layered lookup of one `(account, country)` scope.
#[derive(Debug)]
pub struct LayeredLookup<'a, S: ConfigSource> {
    source: &'a S,
    prefixes: [String; 3],
}

impl<'a, S: ConfigSource> LayeredLookup<'a, S> {
    /// Creates the lookup for an already normalized (trimmed, lower-case) account and country.
    #[must_use]
    pub fn new(source: &'a S, account: &str, country: &str) -> Self {
        let account = account.to_ascii_uppercase();
        let country = country.to_ascii_uppercase();
        Self {
            source,
            prefixes: [
                format!("EMAG_{account}_{country}"),
                format!("EMAG_{account}"),
                format!("EMAG_{EMAG_GLOBAL_SCOPE}"),
            ],
        }
    }

    /// Returns the key prefixes in precedence order.
    #[must_use]
    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }

    /// Returns the first non-blank value for `suffix` across the layers, trimmed.
    #[must_use]
    pub fn get(&self, suffix: &str) -> Option<String> {
        self.prefixes
            .iter()
            .find_map(|prefix| non_blank(self.source.get(&format!("{prefix}_{suffix}"))))
    }

    /// Like [`Self::get`], then falls back to the unprefixed `EMAG_{suffix}` key.
    #[must_use]
    pub fn get_or_legacy(&self, suffix: &str) -> Option<String> {
        self.get(suffix)
            .or_else(|| non_blank(self.source.get(&format!("EMAG_{suffix}"))))
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Configuration for the eMAG HTTP client.
///
/// Build it with [`EmagClientConfig::new`] for programmatic use or [`EmagClientConfig::from_env`]
/// to resolve it from the environment. The client never mutates it.
#[derive(Clone, Debug)]
pub struct EmagClientConfig {
    /// Normalized (trimmed, lower-case) account identifier, e.g. `main` or `fbe`.
    pub account: String,
    pub country: EmagCountry,
    /// API root, ending with a single `/`.
    pub base_url: String,
    pub credential: EmagCredential,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub http2: bool,
    pub user_agent: String,
    /// Requests per second admitted for the orders group.
    pub orders_rps: NonZeroU32,
    /// Requests per second admitted for every other resource.
    pub default_rps: NonZeroU32,
    pub max_connections: usize,
    /// Maximum idle connections kept alive.
    pub max_keepalive: usize,
    pub keepalive_expiry: Duration,
    /// Logs each request and response (payload key names only).
    pub http_log: bool,
    pub retry: RetryConfig,
}

impl EmagClientConfig {
    /// Creates a configuration with default tuning for `country`'s production endpoint.
    #[must_use]
    pub fn new(account: &str, country: EmagCountry, credential: EmagCredential) -> Self {
        Self {
            account: account.trim().to_ascii_lowercase(),
            country,
            base_url: normalize_base_url(country.default_base_url()),
            credential,
            connect_timeout: EMAG_DEFAULT_CONNECT_TIMEOUT,
            read_timeout: EMAG_DEFAULT_READ_TIMEOUT,
            http2: true,
            user_agent: EMAG_USER_AGENT.to_string(),
            orders_rps: NonZeroU32::new(EMAG_DEFAULT_ORDERS_RPS).unwrap_or(NonZeroU32::MIN),
            default_rps: NonZeroU32::new(EMAG_DEFAULT_OTHER_RPS).unwrap_or(NonZeroU32::MIN),
            max_connections: EMAG_DEFAULT_MAX_CONNECTIONS,
            max_keepalive: EMAG_DEFAULT_MAX_KEEPALIVE,
            keepalive_expiry: EMAG_DEFAULT_KEEPALIVE_EXPIRY,
            http_log: false,
            retry: RetryConfig::default(),
        }
    }

    /// Sets the API root, normalizing the trailing slash.
    #[must_use]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = normalize_base_url(base_url);
        self
    }

    /// Resolves the configuration for `account` and `country` from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the country is unsupported, credentials are missing, or a timeout is
    /// malformed.
    pub fn from_env(account: &str, country: &str) -> Result<Self, EmagConfigError> {
        resolve_config(&EnvConfigSource, account, country)
    }
}

/// Resolves an [`EmagClientConfig`] for `account` and `country` from `source`.
///
/// # Errors
///
/// Returns an error if:
/// - The account is blank.
/// - The country is not one of `ro`, `bg`, `hu`.
/// - No username or password is found at any layer.
/// - A timeout or keepalive expiry is not a positive number of seconds that fits a
///   [`Duration`].
pub fn resolve_config<S: ConfigSource>(
    source: &S,
    account: &str,
    country: &str,
) -> Result<EmagClientConfig, EmagConfigError> {
    let account = account.trim().to_ascii_lowercase();
    let country_code = country.trim().to_ascii_lowercase();

    if account.is_empty() {
        return Err(EmagConfigError::MissingAccount);
    }
    let country = EmagCountry::from_str(&country_code)
        .map_err(|_| EmagConfigError::UnsupportedCountry(country_code.clone()))?;

    let lookup = LayeredLookup::new(source, &account, &country_code);

    let (Some(username), Some(password)) = (lookup.get("USER"), lookup.get("PASS")) else {
        return Err(EmagConfigError::MissingCredentials {
            account,
            country: country_code,
            prefix: lookup.prefixes()[0].clone(),
        });
    };

    let mut config = EmagClientConfig::new(
        &account,
        country,
        EmagCredential::new(username, password),
    );

    if let Some(base_url) = non_blank(source.get(&country.base_url_env_key())) {
        config.base_url = normalize_base_url(&base_url);
    }

    config.connect_timeout =
        resolve_secs(&lookup, "CONNECT_TIMEOUT_S", EMAG_DEFAULT_CONNECT_TIMEOUT)?;
    config.read_timeout = resolve_secs(&lookup, "READ_TIMEOUT_S", EMAG_DEFAULT_READ_TIMEOUT)?;
    config.keepalive_expiry = resolve_secs(
        &lookup,
        "KEEPALIVE_EXPIRY_S",
        EMAG_DEFAULT_KEEPALIVE_EXPIRY,
    )?;

    // Anything other than an explicit "off" keeps HTTP/2 enabled
    config.http2 = lookup
        .get_or_legacy("HTTP2")
        .is_none_or(|v| !matches!(v.to_ascii_lowercase().as_str(), "0" | "false" | "no"));

    if let Some(user_agent) = lookup.get_or_legacy("USER_AGENT") {
        config.user_agent = user_agent;
    }

    config.orders_rps = resolve_rps(&lookup, "ORDERS_RPS", config.orders_rps);
    config.default_rps = resolve_rps(&lookup, "DEFAULT_RPS", config.default_rps);
    config.max_connections = resolve_count(&lookup, "MAX_CONNECTIONS", config.max_connections);
    config.max_keepalive = resolve_count(&lookup, "MAX_KEEPALIVE", config.max_keepalive);

    config.http_log = lookup
        .get_or_legacy("HTTP_LOG")
        .and_then(|v| parse_flag(&v))
        .unwrap_or(false);

    Ok(config)
}

fn resolve_secs<S: ConfigSource>(
    lookup: &LayeredLookup<'_, S>,
    suffix: &str,
    default: Duration,
) -> Result<Duration, EmagConfigError> {
    let Some(raw) = lookup.get_or_legacy(suffix) else {
        return Ok(default);
    };

    match raw.parse::<f64>().map(Duration::try_from_secs_f64) {
        Ok(Ok(duration)) if !duration.is_zero() => Ok(duration),
        _ => Err(EmagConfigError::InvalidValue {
            key: suffix.to_string(),
            value: raw,
            reason: "expected a positive number of seconds".to_string(),
        }),
    }
}

fn resolve_rps<S: ConfigSource>(
    lookup: &LayeredLookup<'_, S>,
    suffix: &str,
    default: NonZeroU32,
) -> NonZeroU32 {
    let Some(raw) = lookup.get_or_legacy(suffix) else {
        return default;
    };

    match raw.parse::<NonZeroU32>() {
        Ok(rps) => rps,
        Err(e) => {
            tracing::warn!("Ignoring {suffix}='{raw}' ({e}), using default {default}");
            default
        }
    }
}

fn resolve_count<S: ConfigSource>(
    lookup: &LayeredLookup<'_, S>,
    suffix: &str,
    default: usize,
) -> usize {
    let Some(raw) = lookup.get_or_legacy(suffix) else {
        return default;
    };

    match raw.parse::<usize>() {
        Ok(count) if count > 0 => count,
        _ => {
            tracing::warn!("Ignoring {suffix}='{raw}', using default {default}");
            default
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////
