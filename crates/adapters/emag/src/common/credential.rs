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

//! eMAG API credential storage and HTTP Basic authorization helpers.

use std::fmt::Debug;

use base64::prelude::*;
use zeroize::{ZeroizeOnDrop, Zeroizing};

/// eMAG Marketplace API credentials.
///
/// Every request is authenticated with HTTP Basic using these credentials.
/// The password is zeroized on drop and never printed.
#[derive(Clone, ZeroizeOnDrop)]
pub struct EmagCredential {
    #[zeroize(skip)]
    pub username: String,
    password: Box<[u8]>,
}

impl Debug for EmagCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(stringify!(EmagCredential))
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl EmagCredential {
    /// Creates a new [`EmagCredential`] instance.
    #[must_use]
    pub fn new(username: String, password: String) -> Self {
        Self {
            username,
            password: password.into_bytes().into_boxed_slice(),
        }
    }

    /// Returns the `Authorization` header value, `Basic base64(username:password)`.
    #[must_use]
    pub fn basic_auth_header(&self) -> String {
        let mut raw = Zeroizing::new(Vec::with_capacity(self.username.len() + 1 + self.password.len()));
        raw.extend_from_slice(self.username.as_bytes());
        raw.push(b':');
        raw.extend_from_slice(&self.password);
        format!("Basic {}", BASE64_STANDARD.encode(raw.as_slice()))
    }
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////
