//! NFT metadata construction for completed routes.
//!
//! Produces the standard marketplace metadata shape (name, description,
//! image, external_url, background_color, attributes). The artwork is picked
//! from a fixed pool of hosted images; attributes record the route, the
//! holder's wallet and the completion facts.

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Artwork pool the original collection ships with.
const IMAGE_POOL: &[&str] = &[
    "/pic/img_8.svg",
    "/pic/img_9.svg",
    "/pic/img_11.svg",
    "/pic/img_15.svg",
    "/pic/img_18.svg",
    "/pic/img_22.svg",
];

const BACKGROUND_COLOR: &str = "4A90E2";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NftAttribute {
    pub trait_type: String,
    pub value: serde_json::Value,
}

impl NftAttribute {
    pub fn text(trait_type: &str, value: impl Into<String>) -> Self {
        Self {
            trait_type: trait_type.to_string(),
            value: serde_json::Value::String(value.into()),
        }
    }

    pub fn number(trait_type: &str, value: i64) -> Self {
        Self {
            trait_type: trait_type.to_string(),
            value: serde_json::Value::from(value),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NftMetadata {
    pub name: String,
    pub description: String,
    pub image: String,
    pub external_url: String,
    pub background_color: String,
    pub attributes: Vec<NftAttribute>,
}

impl NftMetadata {
    /// Build the metadata for a freshly completed route.
    ///
    /// `voucher_id` anchors the external_url so marketplaces resolve back to
    /// our metadata endpoint.
    pub fn for_completion(
        base_url: &str,
        voucher_id: Uuid,
        route_name: &str,
        poi_count: i64,
        wallet_address: &str,
        completed_at: DateTime<Utc>,
    ) -> Self {
        let image = IMAGE_POOL
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(IMAGE_POOL[0]);

        Self {
            name: format!("箭塔村探索凭证 · {}", route_name),
            description: format!("完成「{}」路线全部 {} 个打卡点的数字纪念凭证", route_name, poi_count),
            image: format!("{}{}", base_url.trim_end_matches('/'), image),
            external_url: format!(
                "{}/api/v1/metadata/{}",
                base_url.trim_end_matches('/'),
                voucher_id
            ),
            background_color: BACKGROUND_COLOR.to_string(),
            attributes: vec![
                NftAttribute::text("路线名称", route_name),
                NftAttribute::number("POI数量", poi_count),
                NftAttribute::text("持有者", wallet_address),
                NftAttribute::text("完成日期", completed_at.format("%Y-%m-%d").to_string()),
            ],
        }
    }
}
