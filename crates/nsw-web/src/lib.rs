//! Axum + askama web UI for the NSW product board.
//!
//! The page is server-rendered and driven by htmx partial swaps: the search
//! input and facet buttons re-fetch the board, and a sentinel element at the
//! end of the list grows the reveal window when it scrolls into view. All
//! filter state travels in the request query string, so every page session is
//! isolated by construction.

mod facets;
mod filter;
mod reveal;

pub use facets::FacetIndex;
pub use filter::{FacetKey, FilterSelection};
pub use reveal::{RevealWindow, PAGE_SIZE, VISIBILITY_RATIO};

use std::path::PathBuf;
use std::sync::Arc;

use askama::Template;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use axum_extra::extract::Query;
use nsw_core::{strip_tags, ShopItem};
use nsw_storage::{SnapshotError, SnapshotStore};
use serde::Deserialize;
use tokio::net::TcpListener;
use tracing::{info, warn};

pub const CRATE_NAME: &str = "nsw-web";

/// Quiet period before the search keyword is re-evaluated, in milliseconds.
pub const DEBOUNCE_MS: u64 = 300;

const APP_CSS: &str = include_str!("../assets/app.css");

#[derive(Clone)]
pub struct AppState {
    store: SnapshotStore,
}

impl AppState {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            store: SnapshotStore::new(data_dir),
        }
    }
}

/// Query-string shape shared by the board and its partials. Facet parameters
/// repeat (`?mall=A&mall=B`); `visible` is the reveal cursor being resumed.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    mall: Vec<String>,
    #[serde(default)]
    brand: Vec<String>,
    #[serde(default)]
    maker: Vec<String>,
    #[serde(default)]
    q: String,
    visible: Option<usize>,
}

impl ListQuery {
    fn selection(&self) -> FilterSelection {
        FilterSelection {
            mall: self.mall.iter().cloned().collect(),
            brand: self.brand.iter().cloned().collect(),
            maker: self.maker.iter().cloned().collect(),
            keyword: self.q.clone(),
        }
    }
}

struct StateInput {
    name: &'static str,
    value: String,
}

struct FacetButtonView {
    label: String,
    url: String,
    selected: bool,
}

struct FacetGroupView {
    title: &'static str,
    all_url: String,
    all_selected: bool,
    buttons: Vec<FacetButtonView>,
}

struct ItemView {
    title: String,
    meta: String,
    price: String,
    link: String,
    image: String,
}

impl ItemView {
    fn from(item: &ShopItem) -> Self {
        Self {
            title: item.display_title(),
            meta: meta_line(item),
            price: format_price(&item.lprice),
            link: item.link.clone(),
            image: item.image.clone(),
        }
    }
}

struct SentinelView {
    url: String,
    threshold: f64,
}

#[derive(Template)]
#[template(path = "index.html")]
struct IndexTemplate {
    debounce_ms: u64,
}

#[derive(Template)]
#[template(path = "board_partial.html")]
struct BoardTemplate {
    state_inputs: Vec<StateInput>,
    groups: Vec<FacetGroupView>,
    status: String,
    items: Vec<ItemView>,
    sentinel: Option<SentinelView>,
    empty: bool,
}

#[derive(Template)]
#[template(path = "items_partial.html")]
struct ItemsTemplate {
    items: Vec<ItemView>,
    sentinel: Option<SentinelView>,
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/board", get(board_handler))
        .route("/board/items", get(board_items_handler))
        .route("/assets/app.css", get(app_css_handler))
        .with_state(Arc::new(state))
}

pub async fn serve_from_env() -> anyhow::Result<()> {
    let port: u16 = std::env::var("NSW_WEB_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8000);
    let data_dir = std::env::var("NSW_DATA_DIR").unwrap_or_else(|_| "./data".to_string());

    let state = AppState::new(data_dir);
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    info!(port, "product board listening");
    axum::serve(listener, app(state)).await?;
    Ok(())
}

async fn index_handler() -> Response {
    render_html(IndexTemplate {
        debounce_ms: DEBOUNCE_MS,
    })
}

async fn board_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Response {
    let items = load_items(&state.store).await;
    let selection = query.selection();
    let facets = FacetIndex::from_items(&items);
    let filtered = selection.apply(&items);

    // A fresh board render is the reveal reset: the cursor starts over at
    // min(page size, filtered total).
    let window = RevealWindow::new(PAGE_SIZE, filtered.len());
    let shown = filtered[..window.visible()]
        .iter()
        .map(|&item| ItemView::from(item))
        .collect();

    render_html(BoardTemplate {
        state_inputs: state_inputs(&selection),
        groups: facet_groups(&facets, &selection),
        status: format!("전체 {}개 중 {}개 표시", items.len(), filtered.len()),
        items: shown,
        sentinel: sentinel_for(&selection, &window),
        empty: filtered.is_empty(),
    })
}

async fn board_items_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Response {
    let items = load_items(&state.store).await;
    let selection = query.selection();
    let filtered = selection.apply(&items);

    let mut window = RevealWindow::resume(PAGE_SIZE, filtered.len(), query.visible.unwrap_or(0));
    let already_shown = window.visible();
    // The request itself is the intersection signal: the sentinel fired at
    // the configured visibility threshold.
    if !window.observe(VISIBILITY_RATIO) {
        return Html(String::new()).into_response();
    }

    render_html(ItemsTemplate {
        items: filtered[already_shown..window.visible()]
            .iter()
            .map(|&item| ItemView::from(item))
            .collect(),
        sentinel: sentinel_for(&selection, &window),
    })
}

async fn app_css_handler() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/css; charset=utf-8")], APP_CSS)
}

/// Missing or unreadable snapshots degrade to an empty board, never an error
/// page.
async fn load_items(store: &SnapshotStore) -> Vec<ShopItem> {
    match store.load().await {
        Ok(snapshot) => snapshot.items,
        Err(SnapshotError::Missing(path)) => {
            warn!(path = %path.display(), "no snapshot yet; rendering empty state");
            Vec::new()
        }
        Err(err) => {
            warn!(error = %err, "snapshot unreadable; rendering empty state");
            Vec::new()
        }
    }
}

fn state_inputs(selection: &FilterSelection) -> Vec<StateInput> {
    let mut inputs = Vec::new();
    for key in FacetKey::ALL {
        for value in selection.selected(key) {
            inputs.push(StateInput {
                name: key.param(),
                value: value.clone(),
            });
        }
    }
    inputs
}

/// One group per facet: an "all" button plus a toggle button per derived
/// value, each pointing at the board URL for the selection it would produce.
/// The keyword is left out of these URLs; the buttons pull the live search
/// input into the request instead.
fn facet_groups(facets: &FacetIndex, selection: &FilterSelection) -> Vec<FacetGroupView> {
    FacetKey::ALL
        .iter()
        .map(|&key| {
            let mut cleared = selection.clone();
            cleared.clear(key);
            cleared.keyword.clear();

            let buttons = facets
                .values(key)
                .iter()
                .map(|value| {
                    let mut toggled = selection.clone();
                    toggled.toggle(key, value);
                    toggled.keyword.clear();
                    FacetButtonView {
                        label: value.clone(),
                        url: format!("/board?{}", toggled.to_query(None)),
                        selected: selection.is_selected(key, value),
                    }
                })
                .collect();

            FacetGroupView {
                title: key.label(),
                all_url: format!("/board?{}", cleared.to_query(None)),
                all_selected: selection.selected(key).is_empty(),
                buttons,
            }
        })
        .collect()
}

fn sentinel_for(selection: &FilterSelection, window: &RevealWindow) -> Option<SentinelView> {
    if window.fully_revealed() {
        return None;
    }
    Some(SentinelView {
        url: format!(
            "/board/items?{}",
            selection.to_query(Some(window.visible()))
        ),
        threshold: VISIBILITY_RATIO,
    })
}

/// `"12900"` → `"12,900원"`; anything non-numeric renders as `"-"`.
pub fn format_price(raw: &str) -> String {
    let Ok(value) = raw.trim().parse::<u64>() else {
        return "-".to_string();
    };
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{grouped}원")
}

fn meta_line(item: &ShopItem) -> String {
    let mut parts = Vec::new();
    if !item.mall_name.is_empty() {
        parts.push(format!("쇼핑몰 {}", strip_tags(&item.mall_name)));
    }
    if !item.brand.is_empty() {
        parts.push(format!("브랜드 {}", strip_tags(&item.brand)));
    }
    if !item.maker.is_empty() {
        parts.push(format!("제조사 {}", strip_tags(&item.maker)));
    }
    parts.join(" | ")
}

fn render_html<T: Template>(tpl: T) -> Response {
    match tpl.render() {
        Ok(html) => Html(html).into_response(),
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Html(format!("Server error: {err}")),
        )
            .into_response(),
    }
}
