//! Filter-selection state and filter/search evaluation.

use std::collections::BTreeSet;

use nsw_core::{strip_tags, ShopItem};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};

/// The three categorical facets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacetKey {
    Mall,
    Brand,
    Maker,
}

impl FacetKey {
    pub const ALL: [FacetKey; 3] = [FacetKey::Mall, FacetKey::Brand, FacetKey::Maker];

    /// Query-parameter name for this facet.
    pub fn param(self) -> &'static str {
        match self {
            FacetKey::Mall => "mall",
            FacetKey::Brand => "brand",
            FacetKey::Maker => "maker",
        }
    }

    /// Korean panel heading.
    pub fn label(self) -> &'static str {
        match self {
            FacetKey::Mall => "쇼핑몰",
            FacetKey::Brand => "브랜드",
            FacetKey::Maker => "제조사",
        }
    }

    pub fn field(self, item: &ShopItem) -> &str {
        match self {
            FacetKey::Mall => &item.mall_name,
            FacetKey::Brand => &item.brand,
            FacetKey::Maker => &item.maker,
        }
    }
}

/// Filter state for one page session.
///
/// An instance is rebuilt from each request's query string and passed down to
/// whatever needs it, so concurrent sessions never share state. An empty
/// selection set for a facet means "all".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSelection {
    pub mall: BTreeSet<String>,
    pub brand: BTreeSet<String>,
    pub maker: BTreeSet<String>,
    pub keyword: String,
}

impl FilterSelection {
    pub fn selected(&self, key: FacetKey) -> &BTreeSet<String> {
        match key {
            FacetKey::Mall => &self.mall,
            FacetKey::Brand => &self.brand,
            FacetKey::Maker => &self.maker,
        }
    }

    fn selected_mut(&mut self, key: FacetKey) -> &mut BTreeSet<String> {
        match key {
            FacetKey::Mall => &mut self.mall,
            FacetKey::Brand => &mut self.brand,
            FacetKey::Maker => &mut self.maker,
        }
    }

    pub fn is_selected(&self, key: FacetKey, value: &str) -> bool {
        self.selected(key).contains(value)
    }

    /// Add the value to the facet's selection, or remove it if present.
    pub fn toggle(&mut self, key: FacetKey, value: &str) {
        let set = self.selected_mut(key);
        if !set.remove(value) {
            set.insert(value.to_string());
        }
    }

    /// Back to "all" for one facet.
    pub fn clear(&mut self, key: FacetKey) {
        self.selected_mut(key).clear();
    }

    /// An item passes when every active constraint passes.
    ///
    /// Facet checks are exact string membership; the keyword is matched
    /// case-insensitively as a substring of the markup-stripped title. A
    /// keyword that trims to empty imposes no constraint.
    pub fn matches(&self, item: &ShopItem) -> bool {
        for key in FacetKey::ALL {
            let selected = self.selected(key);
            if !selected.is_empty() && !selected.contains(key.field(item)) {
                return false;
            }
        }
        let keyword = self.keyword.trim();
        if keyword.is_empty() {
            return true;
        }
        strip_tags(&item.title)
            .to_lowercase()
            .contains(&keyword.to_lowercase())
    }

    /// Filtered subsequence, original order preserved.
    pub fn apply<'a>(&self, items: &'a [ShopItem]) -> Vec<&'a ShopItem> {
        items.iter().filter(|item| self.matches(item)).collect()
    }

    /// Serialize into a query string for sentinel URLs (and, with the keyword
    /// cleared, facet-button URLs).
    pub fn to_query(&self, visible: Option<usize>) -> String {
        let mut parts = Vec::new();
        for key in FacetKey::ALL {
            for value in self.selected(key) {
                parts.push(format!("{}={}", key.param(), encode(value)));
            }
        }
        let keyword = self.keyword.trim();
        if !keyword.is_empty() {
            parts.push(format!("q={}", encode(keyword)));
        }
        if let Some(visible) = visible {
            parts.push(format!("visible={visible}"));
        }
        parts.join("&")
    }
}

fn encode(value: &str) -> String {
    utf8_percent_encode(value, NON_ALPHANUMERIC).to_string()
}
