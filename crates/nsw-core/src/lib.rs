//! Core domain model for NSW: shopping listings and sync snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const CRATE_NAME: &str = "nsw-core";

/// One listing as returned by the Naver shopping search API.
///
/// Field names on the wire are camelCase, matching both the upstream
/// response and the persisted snapshot. All fields arrive as strings;
/// anything the upstream omits defaults to empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ShopItem {
    /// May contain markup (`<b>…</b>`) that must be stripped for display.
    pub title: String,
    pub link: String,
    pub image: String,
    pub lprice: String,
    pub hprice: String,
    pub mall_name: String,
    pub product_id: String,
    pub product_type: String,
    pub brand: String,
    pub maker: String,
    pub category1: String,
    pub category2: String,
    pub category3: String,
    pub category4: String,
}

/// Composite listing identity. Two items with the same product id and link
/// are the same listing and must be deduplicated.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ItemKey {
    pub product_id: String,
    pub link: String,
}

impl ShopItem {
    pub fn key(&self) -> ItemKey {
        ItemKey {
            product_id: self.product_id.clone(),
            link: self.link.clone(),
        }
    }

    /// Title with markup removed.
    pub fn display_title(&self) -> String {
        strip_tags(&self.title)
    }
}

/// The persisted result of one sync run. Fully replaces the previous
/// snapshot; item order is first-seen order across pages and no two items
/// share a composite key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub collected_at: DateTime<Utc>,
    /// Total as claimed by the upstream API; may exceed `items.len()` when a
    /// run was truncated.
    pub total: u64,
    pub items: Vec<ShopItem>,
}

/// Remove `<...>` markup spans from a string.
///
/// Plain character scan rather than an HTML parser: listing titles only ever
/// carry simple highlight tags, and an unclosed `<` drops the rest of the
/// string the same way the rendering side always has.
pub fn strip_tags(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut in_tag = false;
    for ch in value.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    out
}
