use std::{
    cell::RefCell,
    rc::Rc,
    sync::Arc,
    time::{
        Duration,
        Instant,
    },
};

use bytes::Bytes;
use http_client::{
    FetchClient,
    FetchRequest,
};
use tokio::sync::{
    mpsc,
    Semaphore,
};

use crate::{
    key_info::KeyInfo,
    metrics::SegmenterMetrics,
};

/// What a completed lookup transported back, before any JSON parsing or
/// schema validation — that happens on the engine's side, since it owns the
/// KeyInfo the outcome needs to be folded into.
#[derive(Debug, Clone)]
pub enum TransportOutcome {
    Success { status: http::StatusCode, body: String },
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct LookupCompletion {
    pub key: Bytes,
    pub elapsed: Duration,
    pub outcome: TransportOutcome,
}

pub struct ManifestClientConfig {
    pub manifest_url: String,
    pub user_agent: String,
    pub request_timeout: Duration,
    pub max_in_flight: usize,
}

/// Initiates manifest lookups against a [`FetchClient`], bounding the
/// number that may be outstanding at once with a semaphore rather than
/// serializing them through a queue — distinct keys may resolve
/// concurrently, only one lookup per key is ever in flight at a time.
///
/// Each lookup runs as its own spawned task and reports back over an
/// unbounded channel; nothing about this struct itself is tied to a single
/// task, but the `KeyInfo` it mutates is `Rc`-owned and single-threaded, so
/// `initiate_lookup` must be called from the same task that owns the
/// `KeyDirectory`.
pub struct ManifestClient<F: FetchClient + 'static> {
    fetch: Arc<F>,
    config: ManifestClientConfig,
    semaphore: Arc<Semaphore>,
    completion_tx: mpsc::UnboundedSender<LookupCompletion>,
    metrics: Arc<SegmenterMetrics>,
}

impl<F: FetchClient + 'static> ManifestClient<F> {
    pub fn new(
        fetch: Arc<F>,
        config: ManifestClientConfig,
        metrics: Arc<SegmenterMetrics>,
    ) -> (Self, mpsc::UnboundedReceiver<LookupCompletion>) {
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        let semaphore = Arc::new(Semaphore::new(config.max_in_flight));
        (
            Self {
                fetch,
                config,
                semaphore,
                completion_tx,
                metrics,
            },
            completion_rx,
        )
    }

    /// Attempts to start a lookup for the key owned by `key_info`. Returns
    /// `false` immediately if the concurrency limit is already saturated —
    /// the caller is expected to treat that exactly like any other
    /// initiation failure. On success, marks `key_info` as looking up
    /// before handing the actual request off to a spawned task.
    pub fn initiate_lookup(&self, key_info: &Rc<RefCell<KeyInfo>>) -> bool {
        let Ok(permit) = self.semaphore.clone().try_acquire_owned() else {
            return false;
        };
        let key = key_info.borrow().key().clone();
        key_info.borrow_mut().looking_up = true;

        let fetch = self.fetch.clone();
        let request = FetchRequest {
            url: self.config.manifest_url.clone(),
            user_agent: self.config.user_agent.clone(),
            timeout: self.config.request_timeout,
        };
        let tx = self.completion_tx.clone();
        self.metrics.record_lookup_initiated();
        tokio::spawn(async move {
            let _permit = permit;
            let start = Instant::now();
            let outcome = match fetch.fetch(request).await {
                Ok(response) => TransportOutcome::Success {
                    status: response.status,
                    body: response.body,
                },
                Err(e) => TransportOutcome::Failed(e.0),
            };
            let _ = tx.send(LookupCompletion {
                key,
                elapsed: start.elapsed(),
                outcome,
            });
        });
        true
    }
}

#[cfg(test)]
mod tests {
    use http::StatusCode;
    use http_client::{
        testing::ScriptedFetchClient,
        FetchResponse,
    };

    use super::*;

    fn config() -> ManifestClientConfig {
        ManifestClientConfig {
            manifest_url: "https://manifest.invalid/lookup".to_string(),
            user_agent: "test/1.0".to_string(),
            request_timeout: Duration::from_secs(1),
            max_in_flight: 1,
        }
    }

    #[tokio::test]
    async fn initiate_lookup_sets_looking_up_and_reports_completion() {
        let fetch = Arc::new(ScriptedFetchClient::new());
        fetch.push_response(Ok(FetchResponse {
            status: StatusCode::OK,
            body: r#"{"status":"ok","targets":[{"base_url":"https://a.example/","weight":1}]}"#
                .to_string(),
        }));
        let metrics = Arc::new(SegmenterMetrics::new_for_test());
        let (client, mut completions) = ManifestClient::new(fetch, config(), metrics);

        let key_info = Rc::new(RefCell::new(KeyInfo::new(Bytes::from_static(b"key"))));
        assert!(client.initiate_lookup(&key_info));
        assert!(key_info.borrow().looking_up);

        let completion = completions.recv().await.unwrap();
        assert_eq!(completion.key, Bytes::from_static(b"key"));
        assert!(matches!(completion.outcome, TransportOutcome::Success { .. }));
    }

    #[tokio::test]
    async fn initiate_lookup_fails_once_concurrency_limit_is_saturated() {
        let fetch = Arc::new(ScriptedFetchClient::new());
        fetch.push_response(Ok(FetchResponse {
            status: StatusCode::OK,
            body: "{}".to_string(),
        }));
        let metrics = Arc::new(SegmenterMetrics::new_for_test());
        let (client, _completions) = ManifestClient::new(fetch, config(), metrics);

        let first = Rc::new(RefCell::new(KeyInfo::new(Bytes::from_static(b"a"))));
        let second = Rc::new(RefCell::new(KeyInfo::new(Bytes::from_static(b"b"))));
        assert!(client.initiate_lookup(&first));
        assert!(!client.initiate_lookup(&second));
        assert!(!second.borrow().looking_up);
    }
}
