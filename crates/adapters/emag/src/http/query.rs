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

//! Builder types for eMAG request payloads.
//!
//! Each parameter struct validates itself and renders the JSON payload expected by one
//! endpoint family. Validation runs before any network traffic.

use ahash::AHashSet;
use derive_builder::Builder;
use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::{
    common::{
        consts::{EMAG_DEFAULT_PAGE_LIMIT, EMAG_MAX_PAGE_LIMIT},
        enums::{EmagAwbFormat, EmagOrderStatus},
    },
    error::EmagBuildError,
};

fn validate_paging(page: u32, limit: u32) -> Result<(), EmagBuildError> {
    if page < 1 {
        return Err(EmagBuildError::InvalidPage(page));
    }
    if !(1..=EMAG_MAX_PAGE_LIMIT).contains(&limit) {
        return Err(EmagBuildError::InvalidLimit(limit));
    }
    Ok(())
}

fn validate_id(id: u64, field: &'static str) -> Result<(), EmagBuildError> {
    if id == 0 {
        return Err(EmagBuildError::InvalidId(field));
    }
    Ok(())
}

/// Returns whether `language` has the `xx_XX` locale form.
fn is_locale(language: &str) -> bool {
    let bytes = language.as_bytes();
    bytes.len() == 5
        && bytes[..2].iter().all(u8::is_ascii_lowercase)
        && bytes[2] == b'_'
        && bytes[3..].iter().all(u8::is_ascii_uppercase)
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().is_none_or(str::is_empty)
}

fn to_json<T: Serialize>(payload: &T) -> Result<Value, EmagBuildError> {
    serde_json::to_value(payload).map_err(|e| EmagBuildError::Serialization(e.to_string()))
}

fn paging_payload(page: u32, limit: u32) -> Map<String, Value> {
    let mut payload = Map::new();
    payload.insert("page".to_string(), json!(page));
    payload.insert("limit".to_string(), json!(limit));
    payload
}

/// Parameters for `category/read`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Builder)]
#[builder(setter(into, strip_option), default)]
pub struct CategoryReadParams {
    pub page: u32,
    pub limit: u32,
    /// Catalogue language; the client fills in the marketplace locale when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl Default for CategoryReadParams {
    fn default() -> Self {
        Self {
            page: 1,
            limit: EMAG_DEFAULT_PAGE_LIMIT,
            language: None,
        }
    }
}

impl CategoryReadParams {
    /// Validates paging and the language tag.
    ///
    /// # Errors
    ///
    /// Returns an error if paging is out of range or the language is not of the form `xx_XX`.
    pub fn validate(&self) -> Result<(), EmagBuildError> {
        validate_paging(self.page, self.limit)?;
        if let Some(language) = &self.language
            && !is_locale(language)
        {
            return Err(EmagBuildError::InvalidLanguage(language.clone()));
        }
        Ok(())
    }

    /// Renders the payload, using `default_language` when no language was set.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be serialized.
    pub fn to_payload(&self, default_language: &str) -> Result<Value, EmagBuildError> {
        let language = self
            .language
            .clone()
            .unwrap_or_else(|| default_language.to_string());
        to_json(&Self {
            page: self.page,
            limit: self.limit,
            language: Some(language),
        })
    }
}

/// Parameters for `product_offer/read`.
///
/// Filters are sent top-level and empty text filters are omitted. Entries in `extra` are merged
/// last and win over named filters.
#[derive(Clone, Debug, PartialEq, Serialize, Builder)]
#[builder(setter(into, strip_option), default)]
pub struct ProductOfferReadParams {
    pub page: u32,
    pub limit: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<i64>,
    #[serde(skip_serializing_if = "is_blank")]
    pub sku: Option<String>,
    #[serde(skip_serializing_if = "is_blank")]
    pub ean: Option<String>,
    #[serde(skip_serializing_if = "is_blank")]
    pub part_number_key: Option<String>,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub extra: Option<Map<String, Value>>,
}

impl Default for ProductOfferReadParams {
    fn default() -> Self {
        Self {
            page: 1,
            limit: EMAG_DEFAULT_PAGE_LIMIT,
            status: None,
            sku: None,
            ean: None,
            part_number_key: None,
            extra: None,
        }
    }
}

impl ProductOfferReadParams {
    /// Validates paging.
    ///
    /// # Errors
    ///
    /// Returns an error if paging is out of range.
    pub fn validate(&self) -> Result<(), EmagBuildError> {
        validate_paging(self.page, self.limit)
    }

    /// Renders the payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be serialized.
    pub fn to_payload(&self) -> Result<Value, EmagBuildError> {
        to_json(self)
    }
}

#[derive(Serialize)]
struct StockEntry {
    warehouse_id: u64,
    value: i64,
}

#[derive(Serialize)]
struct StockUpdatePayload {
    id: u64,
    stock: [StockEntry; 1],
}

/// Parameters for a single-warehouse stock update, sent to `product_offer/save`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Builder)]
#[builder(setter(into), default)]
pub struct OfferStockUpdateParams {
    /// The seller's offer id.
    pub item_id: u64,
    pub warehouse_id: u64,
    /// Units available; zero takes the offer out of stock.
    pub value: i64,
}

impl OfferStockUpdateParams {
    /// Validates ids and the stock value.
    ///
    /// # Errors
    ///
    /// Returns an error if an id is zero or the value is negative.
    pub fn validate(&self) -> Result<(), EmagBuildError> {
        validate_id(self.item_id, "item_id")?;
        validate_id(self.warehouse_id, "warehouse_id")?;
        if self.value < 0 {
            return Err(EmagBuildError::InvalidStockValue(self.value));
        }
        Ok(())
    }

    /// Renders the payload, a `product_offer/save` body with a one-entry stock array.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be serialized.
    pub fn to_payload(&self) -> Result<Value, EmagBuildError> {
        to_json(&StockUpdatePayload {
            id: self.item_id,
            stock: [StockEntry {
                warehouse_id: self.warehouse_id,
                value: self.value,
            }],
        })
    }
}

/// Parameters for `order/read`.
///
/// The status filter is placed under `filters`, then `filters` entries are merged over it.
#[derive(Clone, Debug, PartialEq, Builder)]
#[builder(setter(into, strip_option), default)]
pub struct OrderReadParams {
    pub page: u32,
    pub limit: u32,
    pub status: Option<EmagOrderStatus>,
    pub filters: Option<Map<String, Value>>,
}

impl Default for OrderReadParams {
    fn default() -> Self {
        Self {
            page: 1,
            limit: EMAG_DEFAULT_PAGE_LIMIT,
            status: None,
            filters: None,
        }
    }
}

impl OrderReadParams {
    /// Validates paging.
    ///
    /// # Errors
    ///
    /// Returns an error if paging is out of range.
    pub fn validate(&self) -> Result<(), EmagBuildError> {
        validate_paging(self.page, self.limit)
    }

    #[must_use]
    pub fn to_payload(&self) -> Value {
        let mut payload = paging_payload(self.page, self.limit);

        let mut filters = Map::new();
        if let Some(status) = self.status {
            filters.insert("status".to_string(), json!(u8::from(status)));
        }
        if let Some(extra) = &self.filters {
            filters.extend(extra.clone());
        }
        if self.status.is_some() || self.filters.as_ref().is_some_and(|f| !f.is_empty()) {
            payload.insert("filters".to_string(), Value::Object(filters));
        }

        Value::Object(payload)
    }
}

#[derive(Serialize)]
struct OrderRef {
    id: u64,
}

#[derive(Serialize)]
struct OrderAckPayload {
    orders: Vec<OrderRef>,
}

/// Parameters for `order/acknowledge`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Builder)]
#[builder(setter(into), default)]
pub struct OrderAckParams {
    pub order_ids: Vec<u64>,
}

impl OrderAckParams {
    /// Validates that ids are present, positive and unique.
    ///
    /// # Errors
    ///
    /// Returns an error if the list is empty, contains zero, or repeats an id.
    pub fn validate(&self) -> Result<(), EmagBuildError> {
        if self.order_ids.is_empty() {
            return Err(EmagBuildError::EmptyOrderIds);
        }
        let mut seen = AHashSet::with_capacity(self.order_ids.len());
        for &id in &self.order_ids {
            validate_id(id, "order id")?;
            if !seen.insert(id) {
                return Err(EmagBuildError::DuplicateOrderId(id));
            }
        }
        Ok(())
    }

    /// Renders the payload, one `{"id": ..}` object per order in the given order.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be serialized.
    pub fn to_payload(&self) -> Result<Value, EmagBuildError> {
        to_json(&OrderAckPayload {
            orders: self.order_ids.iter().map(|&id| OrderRef { id }).collect(),
        })
    }
}

/// Parameters for `awb/save`.
///
/// Entries in `extra` are merged over the named fields.
#[derive(Clone, Debug, Default, PartialEq, Builder)]
#[builder(setter(into), default)]
pub struct AwbSaveParams {
    pub order_id: u64,
    pub courier: String,
    pub service: String,
    /// Cash on delivery, sent as `0`/`1`.
    pub cod: bool,
    #[builder(setter(strip_option))]
    pub extra: Option<Map<String, Value>>,
}

impl AwbSaveParams {
    /// Validates the order id and the courier fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the order id is zero or courier or service is blank.
    pub fn validate(&self) -> Result<(), EmagBuildError> {
        validate_id(self.order_id, "order_id")?;
        if self.courier.trim().is_empty() {
            return Err(EmagBuildError::BlankField("courier"));
        }
        if self.service.trim().is_empty() {
            return Err(EmagBuildError::BlankField("service"));
        }
        Ok(())
    }

    #[must_use]
    pub fn to_payload(&self) -> Value {
        let mut payload = Map::new();
        payload.insert("order_id".to_string(), json!(self.order_id));
        payload.insert("courier".to_string(), json!(self.courier.trim()));
        payload.insert("service".to_string(), json!(self.service.trim()));
        payload.insert("cash_on_delivery".to_string(), json!(u8::from(self.cod)));
        if let Some(extra) = &self.extra {
            payload.extend(extra.clone());
        }
        Value::Object(payload)
    }
}

/// Parameters for `awb/read`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Builder)]
#[builder(setter(into), default)]
pub struct AwbReadParams {
    #[serde(rename = "id")]
    pub awb_id: u64,
    pub format: EmagAwbFormat,
}

impl AwbReadParams {
    /// Validates the AWB id.
    ///
    /// # Errors
    ///
    /// Returns an error if the id is zero.
    pub fn validate(&self) -> Result<(), EmagBuildError> {
        validate_id(self.awb_id, "awb_id")
    }

    /// Renders the payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be serialized.
    pub fn to_payload(&self) -> Result<Value, EmagBuildError> {
        to_json(self)
    }
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////
