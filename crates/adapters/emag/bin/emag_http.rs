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

//! Reads the first page of categories and orders for an account and country.
//!
//! Usage: `emag-http [account] [country]` (defaults `main ro`). Credentials are resolved from the
//! environment, including a `.env` file when present.

use marketlink_emag::http::{
    client::EmagHttpClient,
    query::{CategoryReadParamsBuilder, OrderReadParamsBuilder},
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let account = args.next().unwrap_or_else(|| "main".to_string());
    let country = args.next().unwrap_or_else(|| "ro".to_string());

    let client = EmagHttpClient::from_env(&account, &country)?;
    tracing::info!("Using {}", client.base_url());

    // Request categories
    let params = CategoryReadParamsBuilder::default().limit(10u32).build()?;
    match client.category_read(params).await {
        Ok(resp) => tracing::info!("{resp}"),
        Err(e) => tracing::error!("{e} (boundary status {})", e.boundary_status()),
    }

    // Request orders
    let params = OrderReadParamsBuilder::default().limit(10u32).build()?;
    match client.order_read(params).await {
        Ok(resp) => tracing::info!("{resp}"),
        Err(e) => tracing::error!("{e} (boundary status {})", e.boundary_status()),
    }

    client.close();
    Ok(())
}
