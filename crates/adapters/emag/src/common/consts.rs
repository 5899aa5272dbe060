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

//! Core constants shared across the eMAG adapter components.

use std::time::Duration;

/// Scope name of the account-independent configuration layer.
pub const EMAG_GLOBAL_SCOPE: &str = "GLOBAL";

pub const EMAG_USER_AGENT: &str = concat!("marketlink-emag/", env!("CARGO_PKG_VERSION"));

pub const EMAG_RO_HTTP_URL: &str = "https://marketplace-api.emag.ro/api-3";
pub const EMAG_BG_HTTP_URL: &str = "https://marketplace-api.emag.bg/api-3";
pub const EMAG_HU_HTTP_URL: &str = "https://marketplace-api.emag.hu/api-3";

pub const EMAG_DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const EMAG_DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);
pub const EMAG_DEFAULT_KEEPALIVE_EXPIRY: Duration = Duration::from_secs(60);
pub const EMAG_DEFAULT_MAX_CONNECTIONS: usize = 20;
pub const EMAG_DEFAULT_MAX_KEEPALIVE: usize = 10;

/// Requests per second admitted for the orders resource family.
pub const EMAG_DEFAULT_ORDERS_RPS: u32 = 12;
/// Requests per second admitted for every other resource.
pub const EMAG_DEFAULT_OTHER_RPS: u32 = 3;

pub const EMAG_HEADER_REQUEST_ID: &str = "X-Request-Id";
pub const EMAG_HEADER_IDEMPOTENCY_KEY: &str = "X-Idempotency-Key";
pub const EMAG_HEADER_RETRY_AFTER: &str = "Retry-After";

/// Number of hex characters kept from the idempotency digest.
pub const EMAG_IDEMPOTENCY_KEY_LEN: usize = 32;
/// Number of random bytes in a request id (hex encoded on the wire).
pub const EMAG_REQUEST_ID_BYTES: usize = 12;

/// Largest page size accepted by the read endpoints.
pub const EMAG_MAX_PAGE_LIMIT: u32 = 4000;
pub const EMAG_DEFAULT_PAGE_LIMIT: u32 = 100;
