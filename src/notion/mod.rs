pub mod snapshot;

use std::future::Future;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use reqwest::header::COOKIE;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::error::ProviderError;
use snapshot::RecordMap;

pub const DEFAULT_API_BASE: &str = "https://www.notion.so/api/v3";

const CHUNK_LIMIT: u32 = 100;
const MAX_CHUNKS: u32 = 10;
const COLLECTION_ROW_LIMIT: u32 = 999;
const MAX_RETRIES: u32 = 2;
const BASE_BACKOFF_MS: u64 = 500;

static DASHED_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b([0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12})$").unwrap()
});
static PLAIN_ID_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"([0-9a-f]{32})$").unwrap());

/// Anything that can produce a page snapshot.
pub trait SnapshotSource {
    fn fetch_page_snapshot(
        &self,
        page_id: &str,
    ) -> impl Future<Output = Result<RecordMap, ProviderError>> + Send;
}

/// Turn a page id, dashed uuid or page URL into the dashed uuid form the
/// API expects.
pub fn parse_page_id(input: &str) -> Option<String> {
    let trimmed = input.trim().to_lowercase();
    let path = trimmed.split(['?', '#']).next().unwrap_or_default();

    if let Some(caps) = DASHED_ID_RE.captures(path) {
        return Some(caps[1].to_string());
    }
    let caps = PLAIN_ID_RE.captures(path)?;
    let id = &caps[1];
    Some(format!(
        "{}-{}-{}-{}-{}",
        &id[..8],
        &id[8..12],
        &id[12..16],
        &id[16..20],
        &id[20..]
    ))
}

/// Client for Notion's unofficial v3 API.
///
/// Constructed once in `main` and passed to whatever needs a snapshot.
pub struct NotionClient {
    http: reqwest::Client,
    api_base: String,
    token: Option<String>,
}

#[derive(Deserialize)]
struct ChunkResponse {
    #[serde(rename = "recordMap", default)]
    record_map: RecordMap,
    #[serde(default)]
    cursor: Option<Cursor>,
}

#[derive(Deserialize)]
struct Cursor {
    #[serde(default)]
    stack: Vec<Value>,
}

#[derive(Deserialize)]
struct RecordMapResponse {
    #[serde(rename = "recordMap", default)]
    record_map: RecordMap,
}

impl NotionClient {
    pub fn new(
        api_base: &str,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            token,
        })
    }

    async fn load_page_chunks(&self, page_id: &str) -> Result<RecordMap, ProviderError> {
        let mut snapshot = RecordMap::default();
        let mut stack: Vec<Value> = Vec::new();

        for chunk_number in 0..MAX_CHUNKS {
            let body = chunk_request(page_id, chunk_number, &stack);
            let chunk: ChunkResponse = self.post("loadPageChunk", &body).await?;
            snapshot.merge(chunk.record_map);

            stack = chunk.cursor.map(|c| c.stack).unwrap_or_default();
            if stack.is_empty() {
                break;
            }
            debug!("Page {} has more chunks after #{}", page_id, chunk_number);
        }

        Ok(snapshot)
    }

    /// Fetch collections referenced by views that the page chunk left out.
    /// On failure the snapshot is kept as is.
    async fn load_missing_collections(&self, snapshot: &mut RecordMap) {
        let missing = missing_collections(snapshot);
        if missing.is_empty() {
            return;
        }

        match self.post::<RecordMapResponse>("syncRecordValues", &sync_request(&missing)).await {
            Ok(resp) => snapshot.merge(resp.record_map),
            Err(e) => warn!("Could not load {} collection(s): {}", missing.len(), e),
        }
    }

    /// Pull row blocks for every collection view. A failing view is skipped.
    async fn load_collection_rows(&self, snapshot: &mut RecordMap) {
        for (collection_id, view_id) in collection_views(snapshot) {
            let body = query_request(&collection_id, &view_id);
            match self.post::<RecordMapResponse>("queryCollection", &body).await {
                Ok(resp) => snapshot.merge(resp.record_map),
                Err(e) => warn!("Skipping collection {} (view {}): {}", collection_id, view_id, e),
            }
        }
    }

    async fn post<T: DeserializeOwned>(&self, endpoint: &str, body: &Value) -> Result<T, ProviderError> {
        for attempt in 0..MAX_RETRIES {
            match self.post_once(endpoint, body).await {
                Err(ProviderError::Status { status, .. }) if is_retryable(status) => {
                    let backoff = Duration::from_millis(BASE_BACKOFF_MS * 2u64.pow(attempt));
                    warn!(
                        "{} returned {} (attempt {}/{}), backing off {:.1}s",
                        endpoint,
                        status,
                        attempt + 1,
                        MAX_RETRIES,
                        backoff.as_secs_f64()
                    );
                    tokio::time::sleep(backoff).await;
                }
                other => return other,
            }
        }
        self.post_once(endpoint, body).await
    }

    async fn post_once<T: DeserializeOwned>(&self, endpoint: &str, body: &Value) -> Result<T, ProviderError> {
        let url = format!("{}/{}", self.api_base, endpoint);
        let mut request = self.http.post(&url).json(body);
        if let Some(token) = &self.token {
            request = request.header(COOKIE, format!("token_v2={}", token));
        }

        let http_err = |source| ProviderError::Http {
            endpoint: endpoint.to_string(),
            source,
        };
        let response = request.send().await.map_err(http_err)?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            });
        }

        let text = response.text().await.map_err(http_err)?;
        serde_json::from_str(&text).map_err(|source| ProviderError::Decode {
            endpoint: endpoint.to_string(),
            source,
        })
    }
}

fn chunk_request(page_id: &str, chunk_number: u32, stack: &[Value]) -> Value {
    json!({
        "pageId": page_id,
        "limit": CHUNK_LIMIT,
        "cursor": { "stack": stack },
        "chunkNumber": chunk_number,
        "verticalColumns": false,
    })
}

/// Collection ids referenced by a view but absent from the snapshot,
/// sorted and without repeats.
fn missing_collections(snapshot: &RecordMap) -> Vec<String> {
    let mut missing: Vec<String> = snapshot
        .blocks()
        .filter(|(_, b)| b.is_collection_view())
        .filter_map(|(_, b)| b.collection_id.clone())
        .filter(|id| snapshot.collection(id).is_none())
        .collect();
    missing.sort();
    missing.dedup();
    missing
}

fn sync_request(collection_ids: &[String]) -> Value {
    let requests: Vec<Value> = collection_ids
        .iter()
        .map(|id| json!({ "table": "collection", "id": id, "version": -1 }))
        .collect();
    json!({ "requests": requests })
}

/// `(collection id, first view id)` for every view that has both.
fn collection_views(snapshot: &RecordMap) -> Vec<(String, String)> {
    snapshot
        .blocks()
        .filter(|(_, b)| b.is_collection_view())
        .filter_map(|(_, b)| {
            let collection_id = b.collection_id.clone()?;
            let view_id = b.view_ids.first()?.clone();
            Some((collection_id, view_id))
        })
        .collect()
}

fn query_request(collection_id: &str, view_id: &str) -> Value {
    json!({
        "collection": { "id": collection_id },
        "collectionView": { "id": view_id },
        "loader": {
            "type": "reducer",
            "reducers": {
                "collection_group_results": { "type": "results", "limit": COLLECTION_ROW_LIMIT }
            },
            "searchQuery": "",
            "userTimeZone": "UTC",
        },
    })
}

fn is_retryable(status: u16) -> bool {
    status == 429 || status >= 500
}

impl SnapshotSource for NotionClient {
    async fn fetch_page_snapshot(&self, page_id: &str) -> Result<RecordMap, ProviderError> {
        let id = parse_page_id(page_id).ok_or_else(|| ProviderError::InvalidPageId(page_id.to_string()))?;

        info!("Fetching Notion page {}", id);
        let mut snapshot = self.load_page_chunks(&id).await?;
        self.load_missing_collections(&mut snapshot).await;
        self.load_collection_rows(&mut snapshot).await;
        info!(
            "Snapshot for {}: {} blocks, {} collections",
            id,
            snapshot.block.len(),
            snapshot.collection.len()
        );
        Ok(snapshot)
    }
}
