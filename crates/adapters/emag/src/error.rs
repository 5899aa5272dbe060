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

//! Error structures and enumerations for the eMAG integration.
//!
//! [`EmagHttpError`] is the single error type returned by the client. Its variants follow the
//! upstream failure classes: configuration, rate limiting (429), other client errors (4xx),
//! server errors (5xx or an unrecognized success shape) and transport failures.

use marketlink_network::http::HttpClientError;
use serde_json::Value;
use strum::{AsRefStr, Display};
use thiserror::Error;

/// Errors raised while resolving an [`EmagClientConfig`](crate::config::EmagClientConfig).
#[derive(Debug, Clone, Error)]
pub enum EmagConfigError {
    /// The country code is not one of `ro`, `bg` or `hu`.
    #[error("Unsupported eMAG country: '{0}'")]
    UnsupportedCountry(String),
    /// The account identifier is blank.
    #[error("eMAG account must not be empty")]
    MissingAccount,
    /// No username or password was found at any configuration layer.
    #[error(
        "Missing eMAG username/password for account '{account}' in '{country}': set {prefix}_USER/{prefix}_PASS or a less specific layer"
    )]
    MissingCredentials {
        account: String,
        country: String,
        prefix: String,
    },
    /// A setting is present but cannot be used.
    #[error("Invalid value for {key}: '{value}' ({reason})")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

/// Validation errors raised while building a request payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EmagBuildError {
    /// Page numbers start at 1.
    #[error("Invalid page {0}: must be >= 1")]
    InvalidPage(u32),
    /// Page size outside the accepted range.
    #[error("Invalid limit {0}: must be between 1 and 4000")]
    InvalidLimit(u32),
    /// Language is not of the form `xx_XX`.
    #[error("Invalid language '{0}': expected a locale such as 'ro_RO'")]
    InvalidLanguage(String),
    /// An identifier must be positive.
    #[error("Invalid {0}: must be greater than zero")]
    InvalidId(&'static str),
    /// No order ids were given to acknowledge.
    #[error("At least one order id is required")]
    EmptyOrderIds,
    /// The same order id was given more than once.
    #[error("Duplicate order id {0}")]
    DuplicateOrderId(u64),
    /// A text field is blank after trimming.
    #[error("'{0}' must not be blank")]
    BlankField(&'static str),
    /// Stock quantities cannot be negative.
    #[error("Invalid stock value {0}: must be >= 0")]
    InvalidStockValue(i64),
    /// The offer payload is not a JSON object.
    #[error("Offer payload must be a JSON object")]
    OfferNotObject,
    /// The parameters could not be rendered as JSON.
    #[error("Failed to serialize payload: {0}")]
    Serialization(String),
}

/// The class of an [`EmagHttpError`].
#[derive(Copy, Clone, Debug, Display, PartialEq, Eq, Hash, AsRefStr)]
pub enum EmagErrorKind {
    Configuration,
    RateLimited,
    ClientError,
    ServerError,
    TransportError,
    Canceled,
    BuildError,
}

/// A typed error enumeration for the eMAG HTTP client.
#[derive(Debug, Clone, Error)]
pub enum EmagHttpError {
    /// The client could not be configured.
    #[error("Configuration error: {0}")]
    Configuration(#[from] EmagConfigError),
    /// eMAG answered 429 on every attempt.
    #[error("Rate limited by eMAG (429), Retry-After={}", .retry_after.as_deref().unwrap_or("none"))]
    RateLimited {
        retry_after: Option<String>,
        details: Value,
    },
    /// eMAG rejected the request with a 4xx status other than 429.
    #[error("eMAG API client error {status} on {endpoint}")]
    ClientError {
        status: u16,
        endpoint: String,
        details: Value,
    },
    /// eMAG failed with a 5xx status, or answered with a payload not recognized as success.
    #[error("eMAG API error {status} on {endpoint}")]
    ServerError {
        status: u16,
        endpoint: String,
        details: Value,
    },
    /// The request failed at the transport level.
    #[error("Transport error: {0}")]
    TransportError(String),
    /// The request was canceled before completing.
    #[error("Request canceled: {0}")]
    Canceled(String),
    /// The request payload failed validation; nothing was sent.
    #[error("Build error: {0}")]
    BuildError(#[from] EmagBuildError),
}

impl From<HttpClientError> for EmagHttpError {
    fn from(error: HttpClientError) -> Self {
        Self::TransportError(error.to_string())
    }
}

impl EmagHttpError {
    /// Returns the class of this error.
    #[must_use]
    pub const fn kind(&self) -> EmagErrorKind {
        match self {
            Self::Configuration(_) => EmagErrorKind::Configuration,
            Self::RateLimited { .. } => EmagErrorKind::RateLimited,
            Self::ClientError { .. } => EmagErrorKind::ClientError,
            Self::ServerError { .. } => EmagErrorKind::ServerError,
            Self::TransportError(_) => EmagErrorKind::TransportError,
            Self::Canceled(_) => EmagErrorKind::Canceled,
            Self::BuildError(_) => EmagErrorKind::BuildError,
        }
    }

    /// Returns the upstream HTTP status, when eMAG answered.
    #[must_use]
    pub const fn status_code(&self) -> Option<u16> {
        match self {
            Self::RateLimited { .. } => Some(429),
            Self::ClientError { status, .. } | Self::ServerError { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns the error details extracted from the upstream payload.
    #[must_use]
    pub const fn details(&self) -> Option<&Value> {
        match self {
            Self::RateLimited { details, .. }
            | Self::ClientError { details, .. }
            | Self::ServerError { details, .. } => Some(details),
            _ => None,
        }
    }

    /// Returns the status a REST boundary should answer with for this error.
    ///
    /// Upstream 429 stays 429 and other upstream 4xx pass through. Upstream 5xx, unexpected
    /// payloads and transport failures become 502. Configuration problems and cancellation
    /// become 503. Payload validation failures are the caller's fault and become 400.
    #[must_use]
    pub const fn boundary_status(&self) -> u16 {
        match self {
            Self::RateLimited { .. } => 429,
            Self::ClientError { status, .. } if *status >= 400 && *status < 500 => *status,
            Self::ClientError { .. } | Self::ServerError { .. } | Self::TransportError(_) => 502,
            Self::Configuration(_) | Self::Canceled(_) => 503,
            Self::BuildError(_) => 400,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////
