//! Bounded, deduplicated metadata URI fetcher.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use reqwest::{Client, Url};
use serde_json::Value;
use tokio::sync::{Semaphore, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use super::sanitize::{cap_array, is_allowed_url, sanitize_text};
use super::ssrf::{GatewayConfig, MAX_REDIRECTS, SsrfError, resolve_safe, rewrite_gateway_uri};
use crate::codec;
use crate::handlers::{URI_WORKER_KEY_PREFIX, UriEnqueuer};
use crate::ports::{AgentStore, MetadataStore};
use crate::types::entities::MetadataEntry;
use crate::types::primitives::Pubkey;

/// Queue capacity; tasks beyond this are rejected with a warning.
const QUEUE_CAPACITY: usize = 5_000;
/// Maximum concurrent in-flight fetches.
const MAX_CONCURRENT_FETCHES: usize = 10;
/// Minimum spacing between dispatching fetch tasks.
const DISPATCH_INTERVAL: Duration = Duration::from_millis(100);
/// Per-task fetch timeout.
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);
/// Response bodies larger than this are rejected.
const METADATA_MAX_BYTES: u64 = 256 * 1024;
/// Values larger than this are offered to the compression codec.
const METADATA_COMPRESS_THRESHOLD: usize = 256;

/// Terminal outcome recorded against `_uri:_status` when a fetch doesn't
/// produce usable JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchOutcome {
    Timeout,
    Error,
    Oversize,
    InvalidJson,
    Blocked,
}

impl FetchOutcome {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Error => "error",
            Self::Oversize => "oversize",
            Self::InvalidJson => "invalid_json",
            Self::Blocked => "blocked",
        }
    }
}

/// A single `(asset, uri)` enrichment request.
#[derive(Debug, Clone)]
pub struct UriTask {
    /// The agent this metadata belongs to.
    pub asset: Pubkey,
    /// The URI to fetch, as stored on `agent.uri`.
    pub uri: String,
}

/// Tunables for the worker's concurrency, timeouts, and SSRF gateways.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum concurrent in-flight fetches.
    pub max_concurrent: usize,
    /// Minimum spacing between dispatching fetch tasks.
    pub dispatch_interval: Duration,
    /// Per-task fetch timeout.
    pub fetch_timeout: Duration,
    /// Response bodies larger than this are rejected.
    pub max_body_bytes: u64,
    /// SSRF gateway rewrite and http opt-in configuration.
    pub gateways: GatewayConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: MAX_CONCURRENT_FETCHES,
            dispatch_interval: DISPATCH_INTERVAL,
            fetch_timeout: FETCH_TIMEOUT,
            max_body_bytes: METADATA_MAX_BYTES,
            gateways: GatewayConfig::default(),
        }
    }
}

/// The URI-metadata worker: a single-owner background queue that fetches
/// off-chain JSON for agents and writes sanitized fields back as
/// `_uri:*`-prefixed metadata entries.
pub struct UriWorker<A, M> {
    agent_store: Arc<A>,
    metadata_store: Arc<M>,
    http: Client,
    config: WorkerConfig,
    sender: mpsc::Sender<UriTask>,
    receiver: tokio::sync::Mutex<mpsc::Receiver<UriTask>>,
    /// Latest requested URI per asset; a dispatch whose URI no longer
    /// matches the latest entry at send time is dropped as stale.
    latest: DashMap<Pubkey, String>,
}

impl<A, M> UriWorker<A, M>
where
    A: AgentStore + Send + Sync + 'static,
    M: MetadataStore + Send + Sync + 'static,
{
    /// Construct a worker with the given config and a fresh bounded queue.
    #[must_use]
    pub fn new(agent_store: Arc<A>, metadata_store: Arc<M>, config: WorkerConfig) -> Self {
        let (sender, receiver) = mpsc::channel(QUEUE_CAPACITY);
        let http = Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(config.fetch_timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            agent_store,
            metadata_store,
            http,
            config,
            sender,
            receiver: tokio::sync::Mutex::new(receiver),
            latest: DashMap::new(),
        }
    }

    /// Enqueue a fetch for `asset`'s current `uri`, deduplicating against
    /// the asset's latest pending request.
    ///
    /// Returns `false` (and logs a warning) if the queue is full or the
    /// URI hasn't changed since the last enqueue for this asset.
    pub fn enqueue(&self, task: UriTask) -> bool {
        if self.latest.get(&task.asset).is_some_and(|v| *v == task.uri) {
            return false;
        }
        self.latest.insert(task.asset, task.uri.clone());

        match self.sender.try_send(task) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(task)) => {
                warn!(asset = %task.asset, "uri worker queue full, dropping task");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    /// Run the dispatch loop until `cancel` fires, spacing dispatches by
    /// [`WorkerConfig::dispatch_interval`] and bounding concurrency with a
    /// semaphore of [`WorkerConfig::max_concurrent`] permits.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent));
        let mut receiver = self.receiver.lock().await;

        loop {
            let task = tokio::select! {
                () = cancel.cancelled() => break,
                task = receiver.recv() => match task {
                    Some(task) => task,
                    None => break,
                },
            };

            let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                break;
            };
            let worker = Arc::clone(&self);
            tokio::spawn(async move {
                worker.process(task).await;
                drop(permit);
            });

            tokio::select! {
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(self.config.dispatch_interval) => {}
            }
        }
    }

    #[instrument(skip(self), fields(asset = %task.asset))]
    async fn process(&self, task: UriTask) {
        // A newer enqueue superseded this one while it sat in the channel.
        if self.latest.get(&task.asset).is_none_or(|v| *v != task.uri) {
            return;
        }

        let outcome = self.fetch_and_apply(&task).await;
        self.latest.remove_if(&task.asset, |_, v| *v == task.uri);

        if let Err(outcome) = outcome {
            warn!(asset = %task.asset, uri = %task.uri, status = outcome.as_str(), "uri fetch failed");
            let _ = self.record_status(&task.asset, outcome).await;
        }
    }

    async fn fetch_and_apply(&self, task: &UriTask) -> Result<(), FetchOutcome> {
        let rewritten = rewrite_gateway_uri(&task.uri, &self.config.gateways);
        let url = Url::parse(&rewritten).map_err(|_| FetchOutcome::Blocked)?;

        let body = self.fetch_body(url).await?;
        let json: Value = serde_json::from_slice(&body).map_err(|_| FetchOutcome::InvalidJson)?;

        // Freshness check (read-your-writes): abort if the asset's URI changed
        // or it vanished while we were fetching.
        let current = self
            .agent_store
            .get_agent(&task.asset)
            .await
            .map_err(|_| FetchOutcome::Error)?;
        match current {
            Some(agent) if agent.uri == task.uri => {}
            _ => return Err(FetchOutcome::Blocked),
        }

        let fields = extract_fields(&json);
        self.write_fields(&task.asset, &fields)
            .await
            .map_err(|_| FetchOutcome::Error)
    }

    async fn fetch_body(&self, mut url: Url) -> Result<Vec<u8>, FetchOutcome> {
        for _ in 0..=MAX_REDIRECTS {
            let pinned_ip = resolve_safe(&url, &self.config.gateways)
                .await
                .map_err(|e| ssrf_outcome(&e))?;

            let resp = self
                .request_pinned(&url, pinned_ip)
                .await
                .map_err(|_| FetchOutcome::Error)?;

            if resp.status().is_redirection() {
                let Some(location) = resp
                    .headers()
                    .get(reqwest::header::LOCATION)
                    .and_then(|v| v.to_str().ok())
                else {
                    return Err(FetchOutcome::Error);
                };
                url = url.join(location).map_err(|_| FetchOutcome::Blocked)?;
                continue;
            }

            if let Some(len) = resp.content_length() {
                if len > self.config.max_body_bytes {
                    return Err(FetchOutcome::Oversize);
                }
            }

            let mut stream = resp.bytes_stream();
            let mut buf = Vec::new();
            use futures_util::StreamExt;
            while let Some(chunk) = stream.next().await {
                let chunk = chunk.map_err(|_| FetchOutcome::Error)?;
                buf.extend_from_slice(&chunk);
                if buf.len() as u64 > self.config.max_body_bytes {
                    return Err(FetchOutcome::Oversize);
                }
            }
            return Ok(buf);
        }
        Err(FetchOutcome::Blocked)
    }

    /// Re-resolves on every hop (catching DNS rebinding between our check
    /// and the connection), then pins the TCP connection to the validated
    /// IP while preserving the original `Host` header.
    async fn request_pinned(&self, url: &Url, ip: IpAddr) -> reqwest::Result<reqwest::Response> {
        let host = url.host_str().unwrap_or_default();
        let port = url.port_or_known_default().unwrap_or(443);

        let pinned_client = Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(self.config.fetch_timeout)
            .resolve(host, std::net::SocketAddr::new(ip, port))
            .build()
            .unwrap_or_else(|_| self.http.clone());

        pinned_client.get(url.clone()).send().await
    }

    async fn write_fields(
        &self,
        asset: &Pubkey,
        fields: &HashMap<String, Vec<u8>>,
    ) -> crate::error::Result<()> {
        let existing = self.metadata_store.list_metadata_for_asset(asset).await?;
        for entry in existing {
            if entry.key.starts_with(URI_WORKER_KEY_PREFIX) {
                self.metadata_store.delete_metadata(asset, &entry.key).await?;
            }
        }

        for (key, value) in fields {
            let framed = if value.len() > METADATA_COMPRESS_THRESHOLD {
                codec::encode(value)
            } else {
                codec::frame_raw(value)
            };
            let entry = MetadataEntry {
                asset: *asset,
                key: format!("{URI_WORKER_KEY_PREFIX}{key}"),
                value: framed,
                immutable: false,
                updated_at: Utc::now(),
            };
            self.metadata_store.set_metadata(&entry).await?;
        }

        info!(asset = %asset, fields = fields.len(), "applied uri metadata");
        Ok(())
    }

    async fn record_status(&self, asset: &Pubkey, outcome: FetchOutcome) -> crate::error::Result<()> {
        let entry = MetadataEntry {
            asset: *asset,
            key: format!("{URI_WORKER_KEY_PREFIX}_status"),
            value: codec::frame_raw(outcome.as_str().as_bytes()),
            immutable: false,
            updated_at: Utc::now(),
        };
        self.metadata_store.set_metadata(&entry).await
    }
}

impl<A, M> UriEnqueuer for UriWorker<A, M>
where
    A: AgentStore + Send + Sync + 'static,
    M: MetadataStore + Send + Sync + 'static,
{
    fn enqueue_uri(&self, asset: Pubkey, uri: String) -> bool {
        self.enqueue(UriTask { asset, uri })
    }
}

fn ssrf_outcome(err: &SsrfError) -> FetchOutcome {
    match err {
        SsrfError::TooManyRedirects => FetchOutcome::Blocked,
        _ => FetchOutcome::Blocked,
    }
}

/// Cap-then-map: known text/url fields are sanitized individually; any
/// `services` array is capped before each element is validated.
fn extract_fields(json: &Value) -> HashMap<String, Vec<u8>> {
    let mut fields = HashMap::new();

    for key in ["name", "description"] {
        if let Some(text) = json.get(key).and_then(Value::as_str) {
            fields.insert(key.to_string(), sanitize_text(text).into_bytes());
        }
    }

    if let Some(image) = json.get("image").and_then(Value::as_str) {
        if is_allowed_url(image) {
            fields.insert("image".to_string(), image.as_bytes().to_vec());
        }
    }

    if let Some(services) = json.get("services").and_then(Value::as_array) {
        let capped = cap_array(services);
        let valid: Vec<&Value> = capped
            .iter()
            .filter(|v| v.get("url").and_then(Value::as_str).is_some_and(is_allowed_url))
            .collect();
        if let Ok(encoded) = serde_json::to_vec(&valid) {
            fields.insert("services".to_string(), encoded);
        }
    }

    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::entities::Agent;
    use crate::types::enums::FinalityStatus;
    use crate::types::primitives::{RawAmount, Slot, TxIndex};
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeAgentStore {
        rows: Mutex<HashMap<Pubkey, Agent>>,
    }

    #[async_trait]
    impl AgentStore for FakeAgentStore {
        async fn upsert_agent(&self, agent: &Agent) -> crate::error::Result<()> {
            self.rows.lock().unwrap().insert(agent.asset, agent.clone());
            Ok(())
        }
        async fn get_agent(&self, asset: &Pubkey) -> crate::error::Result<Option<Agent>> {
            Ok(self.rows.lock().unwrap().get(asset).cloned())
        }
        async fn list_pending_agents(&self, _cutoff: Slot, _limit: u32) -> crate::error::Result<Vec<Agent>> {
            Ok(vec![])
        }
        async fn set_agent_status(&self, _asset: &Pubkey, _status: FinalityStatus) -> crate::error::Result<()> {
            Ok(())
        }
        async fn recompute_agent_stats(&self, _asset: &Pubkey) -> crate::error::Result<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeMetadataStore {
        rows: Mutex<HashMap<(Pubkey, String), MetadataEntry>>,
    }

    #[async_trait]
    impl MetadataStore for FakeMetadataStore {
        async fn set_metadata(&self, entry: &MetadataEntry) -> crate::error::Result<()> {
            self.rows.lock().unwrap().insert((entry.asset, entry.key.clone()), entry.clone());
            Ok(())
        }
        async fn get_metadata(&self, asset: &Pubkey, key: &str) -> crate::error::Result<Option<MetadataEntry>> {
            Ok(self.rows.lock().unwrap().get(&(*asset, key.to_string())).cloned())
        }
        async fn delete_metadata(&self, asset: &Pubkey, key: &str) -> crate::error::Result<()> {
            self.rows.lock().unwrap().remove(&(*asset, key.to_string()));
            Ok(())
        }
        async fn list_metadata_for_asset(&self, asset: &Pubkey) -> crate::error::Result<Vec<MetadataEntry>> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .values()
                .filter(|e| &e.asset == asset)
                .cloned()
                .collect())
        }
    }

    fn agent(asset: Pubkey, uri: &str) -> Agent {
        Agent {
            asset,
            owner: Pubkey::from_bytes([1; 32]),
            collection: Pubkey::from_bytes([2; 32]),
            wallet: Pubkey::from_bytes([3; 32]),
            uri: uri.to_string(),
            enabled: true,
            registered_at_slot: Slot(1),
            registered_tx_index: TxIndex(Some(0)),
            registered_tx_signature: "sig".to_string(),
            feedback_count: 0,
            total_value: RawAmount::zero(),
            raw_avg_score: 0.0,
            status: FinalityStatus::Pending,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn duplicate_uri_enqueue_is_deduplicated() {
        let agent_store = Arc::new(FakeAgentStore::default());
        let metadata_store = Arc::new(FakeMetadataStore::default());
        let worker = UriWorker::new(agent_store, metadata_store, WorkerConfig::default());

        let asset = Pubkey::from_bytes([9; 32]);
        assert!(worker.enqueue(UriTask { asset, uri: "https://x.example/m.json".to_string() }));
        assert!(!worker.enqueue(UriTask { asset, uri: "https://x.example/m.json".to_string() }));
        assert!(worker.enqueue(UriTask { asset, uri: "https://x.example/other.json".to_string() }));
    }

    #[tokio::test]
    async fn freshness_check_blocks_stale_fetch() {
        let asset = Pubkey::from_bytes([9; 32]);
        let agent_store = Arc::new(FakeAgentStore::default());
        agent_store.upsert_agent(&agent(asset, "https://x.example/new.json")).await.unwrap();
        let metadata_store = Arc::new(FakeMetadataStore::default());
        let worker = UriWorker::new(agent_store, metadata_store, WorkerConfig::default());

        let stale = UriTask { asset, uri: "https://x.example/old.json".to_string() };
        let outcome = worker.fetch_and_apply(&stale).await;
        assert_eq!(outcome, Err(FetchOutcome::Blocked));
    }

    #[test]
    fn extract_fields_sanitizes_text_and_validates_image_url() {
        let json = serde_json::json!({
            "name": "<b>Agent</b>",
            "image": "javascript:alert(1)",
        });
        let fields = extract_fields(&json);
        assert_eq!(fields.get("name").unwrap(), b"Agent");
        assert!(!fields.contains_key("image"));
    }
}
