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

//! [eMAG](https://www.emag.ro) Marketplace integration client.
//!
//! The `marketlink-emag` crate wraps the eMAG Marketplace API (`api-3`) behind a rate-limited,
//! retrying HTTP client. Every call is an HTTP POST of a JSON payload to `{resource}/{action}`,
//! authenticated with HTTP Basic.
//!
//! The main entry point is [`http::client::EmagHttpClient`], built from an
//! [`config::EmagClientConfig`] resolved per account and country.

#![warn(rustc::all)]
#![deny(unsafe_code)]
#![deny(nonstandard_style)]
#![deny(missing_debug_implementations)]
#![deny(clippy::missing_errors_doc)]
#![deny(clippy::missing_panics_doc)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod common;
pub mod config;
pub mod error;
pub mod http;
