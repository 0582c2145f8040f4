//! Sync engine: assembles a deduplicated listing snapshot from the paginated
//! Naver shopping search API and persists it.
//!
//! The page loop requests `start = 1, 2, 3, …` — incrementing by one per
//! request rather than by page size. That is deliberate: overlapping pages
//! cost extra requests but make the run robust against the upstream shuffling
//! results between requests, and the dedup accumulator absorbs the overlap.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use nsw_core::{ItemKey, ShopItem, Snapshot};
use nsw_storage::{
    classify_reqwest_error, classify_status, BackoffPolicy, RetryDisposition, SnapshotStore,
};
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

pub const CRATE_NAME: &str = "nsw-sync";

/// Items requested per page.
pub const DISPLAY: u32 = 100;
/// Hard ceiling on the start index the upstream accepts.
pub const MAX_START: u32 = 100;

const DEFAULT_BASE_URL: &str = "https://openapi.naver.com/v1/search";
const DEFAULT_QUERY: &str = "티니핑";
const DAY: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Naver API credentials are missing (NAVER_CLIENT_ID / NAVER_CLIENT_SECRET)")]
    MissingCredentials,
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub client_id: String,
    pub client_secret: String,
    pub query: String,
    pub data_dir: PathBuf,
    pub base_url: String,
    pub http_timeout_secs: u64,
    pub max_start: u32,
    pub backoff: BackoffPolicy,
}

impl SyncConfig {
    /// Load from the environment, reading a `.env` file first (existing
    /// process variables win over file values). Missing credentials fail
    /// here, before any network call.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an injectable lookup so tests never mutate process env.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let client_id = lookup("NAVER_CLIENT_ID").unwrap_or_default();
        let client_secret = lookup("NAVER_CLIENT_SECRET").unwrap_or_default();
        if client_id.is_empty() || client_secret.is_empty() {
            return Err(ConfigError::MissingCredentials);
        }

        Ok(Self {
            client_id,
            client_secret,
            query: lookup("NSW_QUERY").unwrap_or_else(|| DEFAULT_QUERY.to_string()),
            data_dir: lookup("NSW_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./data")),
            base_url: lookup("NSW_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            http_timeout_secs: lookup("NSW_HTTP_TIMEOUT_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
            max_start: MAX_START,
            backoff: BackoffPolicy::default(),
        })
    }
}

/// One page of the upstream search response.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchPage {
    /// Reported total; the upstream may revise it between pages and some
    /// responses omit it entirely.
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub start: u32,
    #[serde(default)]
    pub display: u32,
    #[serde(default)]
    pub items: Vec<ShopItem>,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("http status {status} for {url}")]
    HttpStatus { status: u16, url: String },
}

impl FetchError {
    fn disposition(&self) -> RetryDisposition {
        match self {
            FetchError::Request(err) => classify_reqwest_error(err),
            FetchError::HttpStatus { status, .. } => StatusCode::from_u16(*status)
                .map(classify_status)
                .unwrap_or(RetryDisposition::NonRetryable),
        }
    }
}

/// Client for the Naver shopping search endpoint.
///
/// Use [`ShopSearchClient::new`] for production or [`with_base_url`] to point
/// at a mock server in tests.
///
/// [`with_base_url`]: ShopSearchClient::with_base_url
pub struct ShopSearchClient {
    client: Client,
    base_url: Url,
    client_id: String,
    client_secret: String,
    backoff: BackoffPolicy,
}

impl ShopSearchClient {
    pub fn new(config: &SyncConfig) -> Result<Self> {
        Self::with_base_url(config, &config.base_url)
    }

    pub fn with_base_url(config: &SyncConfig, base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("building reqwest client")?;

        // Ensure the base URL ends with exactly one slash so joining the
        // endpoint appends a segment instead of replacing the last one.
        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised)
            .with_context(|| format!("invalid base URL '{base_url}'"))?;

        Ok(Self {
            client,
            base_url,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            backoff: config.backoff,
        })
    }

    /// Fetch a single page. Non-2xx statuses are errors.
    pub async fn fetch_page(&self, query: &str, start: u32) -> Result<SearchPage, FetchError> {
        let url = self
            .base_url
            .join("shop.json")
            .expect("appending a plain segment to a valid base URL");
        let response = self
            .client
            .get(url)
            .query(&[
                ("query", query),
                ("display", &DISPLAY.to_string()),
                ("start", &start.to_string()),
            ])
            .header(reqwest::header::ACCEPT, "application/json")
            .header("X-Naver-Client-Id", &self.client_id)
            .header("X-Naver-Client-Secret", &self.client_secret)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                status: status.as_u16(),
                url: response.url().to_string(),
            });
        }
        Ok(response.json::<SearchPage>().await?)
    }

    /// Fetch with bounded retry on transient failures (5xx, 429, timeouts,
    /// connection errors).
    pub async fn fetch_page_with_retry(
        &self,
        query: &str,
        start: u32,
    ) -> Result<SearchPage, FetchError> {
        let mut attempt = 0;
        loop {
            match self.fetch_page(query, start).await {
                Ok(page) => return Ok(page),
                Err(err) => {
                    if err.disposition() == RetryDisposition::Retryable
                        && attempt < self.backoff.max_retries
                    {
                        warn!(start, attempt, error = %err, "page fetch failed; retrying");
                        tokio::time::sleep(self.backoff.delay_for_attempt(attempt)).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(err);
                }
            }
        }
    }
}

/// Why the page loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOutcome {
    /// The accumulated item count reached the reported total.
    Complete,
    /// The upstream returned an empty page before the total was reached.
    Exhausted,
    /// The start-index ceiling was hit with items still outstanding.
    Truncated,
    /// A page fetch failed after retries; the run kept its partial result.
    FetchFailed,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub reported_total: u64,
    pub collected: usize,
    pub pages_fetched: u32,
    pub outcome: SyncOutcome,
    pub snapshot_path: String,
}

pub struct SyncEngine {
    config: SyncConfig,
    client: ShopSearchClient,
    store: SnapshotStore,
}

impl SyncEngine {
    pub fn new(config: SyncConfig) -> Result<Self> {
        let client = ShopSearchClient::new(&config)?;
        let store = SnapshotStore::new(config.data_dir.clone());
        Ok(Self {
            config,
            client,
            store,
        })
    }

    /// Run one full sync: page loop, dedup, snapshot write.
    pub async fn run_once(&self) -> Result<SyncSummary> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(%run_id, query = %self.config.query, "sync run starting");

        let (snapshot, pages_fetched, outcome) = self.collect().await;
        let snapshot_path = self.store.write(&snapshot).await?;
        let finished_at = Utc::now();

        let summary = SyncSummary {
            run_id,
            started_at,
            finished_at,
            reported_total: snapshot.total,
            collected: snapshot.items.len(),
            pages_fetched,
            outcome,
            snapshot_path: snapshot_path.display().to_string(),
        };
        match outcome {
            SyncOutcome::Complete | SyncOutcome::Exhausted => info!(
                %run_id,
                collected = summary.collected,
                reported_total = summary.reported_total,
                pages = pages_fetched,
                ?outcome,
                "sync run finished"
            ),
            // Truncation is not an error, but it is not exhaustion either;
            // keep the two distinguishable in the logs.
            SyncOutcome::Truncated | SyncOutcome::FetchFailed => warn!(
                %run_id,
                collected = summary.collected,
                reported_total = summary.reported_total,
                pages = pages_fetched,
                ?outcome,
                "sync run finished with a partial result"
            ),
        }
        Ok(summary)
    }

    /// The pagination/dedup loop.
    ///
    /// Termination, checked in order after each page: empty page (upstream
    /// exhausted), accumulated count >= reported total (complete), next start
    /// index past the ceiling (silent truncation). A page that fails even
    /// after retries contributes no items and ends the run the same way an
    /// empty page would, just labelled differently.
    async fn collect(&self) -> (Snapshot, u32, SyncOutcome) {
        let mut items: Vec<ShopItem> = Vec::new();
        let mut seen: HashSet<ItemKey> = HashSet::new();
        let mut total: u64 = 0;
        let mut start: u32 = 1;
        let mut pages_fetched: u32 = 0;

        let outcome = loop {
            // "Total still unknown" must keep the loop going; only a
            // populated total can satisfy the run.
            if total != 0 && items.len() as u64 >= total {
                break SyncOutcome::Complete;
            }
            if start > self.config.max_start {
                break SyncOutcome::Truncated;
            }

            let page = match self
                .client
                .fetch_page_with_retry(&self.config.query, start)
                .await
            {
                Ok(page) => page,
                Err(err) => {
                    warn!(start, error = %err, "page fetch failed after retries; keeping partial result");
                    break SyncOutcome::FetchFailed;
                }
            };
            pages_fetched += 1;
            total = page.total.unwrap_or(total);

            if page.items.is_empty() {
                break SyncOutcome::Exhausted;
            }
            for item in page.items {
                if seen.insert(item.key()) {
                    items.push(item);
                }
            }
            if items.len() as u64 >= total {
                break SyncOutcome::Complete;
            }
            start += 1;
        };

        let snapshot = Snapshot {
            collected_at: Utc::now(),
            total,
            items,
        };
        (snapshot, pages_fetched, outcome)
    }
}

/// Duration from `now` until the next local midnight.
pub fn time_until_midnight(now: DateTime<Local>) -> Duration {
    let next_midnight = (now.date_naive() + chrono::Days::new(1))
        .and_hms_opt(0, 0, 0)
        .expect("midnight is a valid time of day");
    (next_midnight - now.naive_local())
        .to_std()
        .unwrap_or(Duration::ZERO)
}

/// Daily cadence: wait for the next local midnight, run one sync as an
/// isolated unit of work, then repeat on a fixed 24-hour interval. A failed
/// run is logged and does not stop the loop.
pub async fn run_daily(engine: &SyncEngine) -> Result<()> {
    loop {
        let wait = time_until_midnight(Local::now());
        info!(wait_secs = wait.as_secs(), "waiting for next local midnight");
        tokio::time::sleep(wait).await;

        match engine.run_once().await {
            Ok(summary) => info!(
                run_id = %summary.run_id,
                collected = summary.collected,
                outcome = ?summary.outcome,
                "daily sync finished"
            ),
            Err(err) => error!(error = %err, "daily sync failed"),
        }

        tokio::time::sleep(DAY).await;
    }
}

pub async fn run_once_from_env() -> Result<SyncSummary> {
    let config = SyncConfig::from_env()?;
    let engine = SyncEngine::new(config)?;
    engine.run_once().await
}

pub async fn run_daily_from_env() -> Result<()> {
    let config = SyncConfig::from_env()?;
    let engine = SyncEngine::new(config)?;
    run_daily(&engine).await
}
