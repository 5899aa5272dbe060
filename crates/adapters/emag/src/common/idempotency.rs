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

//! Idempotency keys and request identifiers.
//!
//! An idempotency key is derived from the canonical JSON form of a payload: object keys sorted
//! recursively, no insignificant whitespace, `,` and `:` separators. The key is the first
//! [`EMAG_IDEMPOTENCY_KEY_LEN`] hex characters of the SHA-256 digest of that form, so two
//! structurally identical payloads always share a key regardless of key insertion order.

use aws_lc_rs::digest;
use rand::RngCore;
use serde_json::Value;

use super::consts::{EMAG_IDEMPOTENCY_KEY_LEN, EMAG_REQUEST_ID_BYTES};

/// Derives the idempotency key for `payload`.
#[must_use]
pub fn make_idempotency_key(payload: &Value) -> String {
    let canonical = canonical_json(payload);
    let hash = digest::digest(&digest::SHA256, canonical.as_bytes());
    let mut key = hex::encode(hash.as_ref());
    key.truncate(EMAG_IDEMPOTENCY_KEY_LEN);
    key
}

/// Returns a fresh random request id, hex encoded.
#[must_use]
pub fn new_request_id() -> String {
    let mut bytes = [0u8; EMAG_REQUEST_ID_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Serializes `value` with recursively sorted object keys and compact separators.
#[must_use]
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_unstable_by(|(a, _), (b, _)| a.cmp(b));

            out.push('{');
            for (i, (key, value)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                // Serializing a string into JSON cannot fail
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(value, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}
