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

//! Enumerations mapping eMAG Marketplace concepts onto Rust types.

use serde::Serialize;
use strum::{AsRefStr, Display, EnumString, FromRepr};

use super::consts::{EMAG_BG_HTTP_URL, EMAG_HU_HTTP_URL, EMAG_RO_HTTP_URL};

/// A country marketplace served by the eMAG API.
#[derive(Copy, Clone, Debug, Display, PartialEq, Eq, Hash, AsRefStr, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum EmagCountry {
    /// Romania (`marketplace-api.emag.ro`).
    Ro,
    /// Bulgaria (`marketplace-api.emag.bg`).
    Bg,
    /// Hungary (`marketplace-api.emag.hu`).
    Hu,
}

impl EmagCountry {
    /// Returns the locale sent as `Accept-Language` and used as the default catalogue language.
    #[must_use]
    pub const fn locale(self) -> &'static str {
        match self {
            Self::Ro => "ro_RO",
            Self::Bg => "bg_BG",
            Self::Hu => "hu_HU",
        }
    }

    /// Returns the production API root for this marketplace.
    #[must_use]
    pub const fn default_base_url(self) -> &'static str {
        match self {
            Self::Ro => EMAG_RO_HTTP_URL,
            Self::Bg => EMAG_BG_HTTP_URL,
            Self::Hu => EMAG_HU_HTTP_URL,
        }
    }

    /// Returns the environment variable overriding the API root, e.g. `EMAG_BASE_URL_RO`.
    #[must_use]
    pub fn base_url_env_key(self) -> String {
        format!("EMAG_BASE_URL_{}", self.as_ref().to_ascii_uppercase())
    }
}

/// Order lifecycle status codes used by the order endpoints.
#[repr(u8)]
#[derive(Copy, Clone, Debug, Display, PartialEq, Eq, Hash, AsRefStr, EnumString, FromRepr)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum EmagOrderStatus {
    Canceled = 0,
    New = 1,
    InProgress = 2,
    Prepared = 3,
    Finalized = 4,
    Returned = 5,
}

impl From<EmagOrderStatus> for u8 {
    fn from(value: EmagOrderStatus) -> Self {
        value as Self
    }
}

/// Document format returned when reading an AWB.
#[derive(
    Copy,
    Clone,
    Debug,
    Default,
    Display,
    PartialEq,
    Eq,
    Hash,
    AsRefStr,
    EnumString,
    Serialize,
)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
#[serde(rename_all = "UPPERCASE")]
pub enum EmagAwbFormat {
    #[default]
    Pdf,
    Zpl,
}

/// Local rate-limit group a request is admitted under.
#[derive(Copy, Clone, Debug, Display, PartialEq, Eq, Hash, AsRefStr, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum RateLimitGroup {
    /// The `order` resource family.
    Orders,
    /// Every other resource.
    Default,
}

impl RateLimitGroup {
    /// Returns the group for a resource name (`order` or `orders`, case-insensitive, map to
    /// [`RateLimitGroup::Orders`]).
    #[must_use]
    pub fn for_resource(resource: &str) -> Self {
        let resource = resource.trim();
        if resource.eq_ignore_ascii_case("order") || resource.eq_ignore_ascii_case("orders") {
            Self::Orders
        } else {
            Self::Default
        }
    }
}
