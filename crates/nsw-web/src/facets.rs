//! Facet derivation: distinct values of the three categorical fields, sorted
//! in Korean collation order.

use std::collections::HashSet;

use icu::collator::{Collator, CollatorOptions, Strength};
use icu::locid::locale;
use nsw_core::ShopItem;

use crate::filter::FacetKey;

/// Sorted, duplicate-free facet value lists derived from the full item
/// sequence. Empty values are excluded outright, never shown as an "empty"
/// option.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FacetIndex {
    pub malls: Vec<String>,
    pub brands: Vec<String>,
    pub makers: Vec<String>,
}

impl FacetIndex {
    pub fn from_items(items: &[ShopItem]) -> Self {
        Self {
            malls: sorted_unique(items.iter().map(|item| item.mall_name.as_str())),
            brands: sorted_unique(items.iter().map(|item| item.brand.as_str())),
            makers: sorted_unique(items.iter().map(|item| item.maker.as_str())),
        }
    }

    pub fn values(&self, key: FacetKey) -> &[String] {
        match key {
            FacetKey::Mall => &self.malls,
            FacetKey::Brand => &self.brands,
            FacetKey::Maker => &self.makers,
        }
    }
}

/// Distinct non-empty values in `ko` collation order, not codepoint order.
pub fn sorted_unique<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut out: Vec<String> = Vec::new();
    for value in values {
        if value.is_empty() || !seen.insert(value) {
            continue;
        }
        out.push(value.to_string());
    }

    let collator = korean_collator();
    out.sort_by(|a, b| collator.compare(a, b));
    out
}

fn korean_collator() -> Collator {
    let mut options = CollatorOptions::new();
    options.strength = Some(Strength::Tertiary);
    Collator::try_new(&locale!("ko").into(), options)
        .expect("bundled collation data includes the ko locale")
}
