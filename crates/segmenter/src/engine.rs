use std::{
    cell::RefCell,
    collections::VecDeque,
    rc::Rc,
    sync::Arc,
    time::Duration,
};

use bytes::Bytes;
use common::clock::{
    Clock,
    Timestamp,
};
use http_client::FetchClient;
use tokio::sync::{
    mpsc,
    oneshot,
};

use crate::{
    batcher::Batcher,
    config::SegmenterConfig,
    errors::ManifestError,
    holding_queue::HoldingQueue,
    key_directory::KeyDirectory,
    manifest,
    manifest_client::{
        LookupCompletion,
        ManifestClient,
        ManifestClientConfig,
        TransportOutcome,
    },
    manifest::{
        ManifestFailure,
        ManifestOutcome,
        ManifestSuccess,
    },
    metrics::SegmenterMetrics,
    observability::{
        lossy_key,
        KeyInfoSummary,
        SegmentSummary,
        SegmenterState,
    },
    refresh_scheduler,
    segment_registry::SegmentRegistry,
    transaction::Transaction,
};

struct Counters {
    peak_size_bytes: u64,
    bytes_forwarded: u64,
    count_forwarded: u64,
    bytes_dropped: u64,
    count_dropped: u64,
}

impl Counters {
    fn new() -> Self {
        Self {
            peak_size_bytes: 0,
            bytes_forwarded: 0,
            count_forwarded: 0,
            bytes_dropped: 0,
            count_dropped: 0,
        }
    }
}

/// Owns every piece of mutable state for one segmenter: the key directory,
/// the segment registry, the holding queue, and the manifest client used to
/// resolve unknown keys. Nothing here is `Send` — Segments and KeyInfos are
/// shared via `Rc<RefCell<_>>` on the assumption that exactly one task ever
/// touches this struct, the same assumption a single-threaded event loop
/// makes about its own state. [`SegmenterEngine::run`] is that event loop;
/// [`SegmenterHandle`] is the `Send`, cloneable façade other tasks talk to.
pub struct SegmenterEngine<F: FetchClient + 'static, B: Batcher> {
    key_directory: KeyDirectory,
    segment_registry: SegmentRegistry,
    holding_queue: HoldingQueue,
    manifest_client: ManifestClient<F>,
    batcher: B,
    clock: Arc<dyn Clock>,
    counters: Counters,
    last_error: Option<(Timestamp, String)>,
    next_refresh_deadline: Option<Timestamp>,
    lookup_latency_ewma: Option<Duration>,
    metrics: Arc<SegmenterMetrics>,
}

/// A request handed to the engine over its command channel. Mirrors the
/// collaborator interface an ingest frontend is expected to call: schedule
/// transactions for acceptance, or ask for a state snapshot.
pub enum EngineCommand {
    Schedule {
        transactions: VecDeque<Transaction>,
        total_bytes: u64,
        count: u64,
        reply: oneshot::Sender<(u64, u64)>,
    },
    Inspect {
        reply: oneshot::Sender<SegmenterState>,
    },
}

/// `Send`, `Clone` client for a running [`SegmenterEngine`]. Safe to hand to
/// any number of tasks; every call is funneled through a channel onto the
/// single task actually running the engine's event loop.
#[derive(Clone)]
pub struct SegmenterHandle {
    command_tx: mpsc::Sender<EngineCommand>,
    shutdown: common::shutdown::ShutdownSignal,
}

impl SegmenterHandle {
    /// Hands `transactions` to the engine and waits for how much of them it
    /// accepted. `total_bytes`/`count` are supplied by the caller rather
    /// than recomputed here, since the caller typically already tracked
    /// them while assembling the batch.
    pub async fn schedule(
        &self,
        transactions: VecDeque<Transaction>,
        total_bytes: u64,
        count: u64,
    ) -> anyhow::Result<(u64, u64)> {
        let (reply, rx) = oneshot::channel();
        self.command_tx
            .send(EngineCommand::Schedule {
                transactions,
                total_bytes,
                count,
                reply,
            })
            .await
            .map_err(|_| anyhow::anyhow!("segmenter engine is no longer running"))?;
        rx.await.map_err(|_| anyhow::anyhow!("segmenter engine dropped the reply channel"))
    }

    pub async fn inspect(&self) -> anyhow::Result<SegmenterState> {
        let (reply, rx) = oneshot::channel();
        self.command_tx
            .send(EngineCommand::Inspect { reply })
            .await
            .map_err(|_| anyhow::anyhow!("segmenter engine is no longer running"))?;
        rx.await.map_err(|_| anyhow::anyhow!("segmenter engine dropped the reply channel"))
    }

    pub fn shutdown(&self) {
        self.shutdown.shutdown();
    }
}

type CompletionReceiver = mpsc::UnboundedReceiver<LookupCompletion>;

impl<F: FetchClient + 'static, B: Batcher> SegmenterEngine<F, B> {
    fn build(config: &SegmenterConfig, fetch: Arc<F>, batcher: B, clock: Arc<dyn Clock>) -> (Self, CompletionReceiver) {
        let metrics = Arc::new(SegmenterMetrics::new());
        let (manifest_client, completion_rx) = ManifestClient::new(
            fetch,
            ManifestClientConfig {
                manifest_url: config.manifest_url.clone(),
                user_agent: config.user_agent.clone(),
                request_timeout: config.manifest_timeout,
                max_in_flight: config.manifest_concurrency,
            },
            metrics.clone(),
        );
        let engine = Self {
            key_directory: KeyDirectory::new(),
            segment_registry: SegmentRegistry::new(),
            holding_queue: HoldingQueue::new(config.buffer_limit_bytes),
            manifest_client,
            batcher,
            clock,
            counters: Counters::new(),
            last_error: None,
            next_refresh_deadline: None,
            lookup_latency_ewma: None,
            metrics,
        };
        (engine, completion_rx)
    }

    /// Builds a bare engine and its completion receiver, with no command
    /// channel or handle — for tests and anything else that wants to call
    /// `schedule`/`handle_completion` directly rather than through a
    /// [`SegmenterHandle`].
    pub fn for_test(config: &SegmenterConfig, fetch: Arc<F>, batcher: B, clock: Arc<dyn Clock>) -> (Self, CompletionReceiver) {
        Self::build(config, fetch, batcher, clock)
    }

    /// Builds an engine along with the channel plumbing needed to run it:
    /// a [`SegmenterHandle`] other tasks can clone and call, and the
    /// receivers `run` consumes.
    pub fn channel(
        config: &SegmenterConfig,
        fetch: Arc<F>,
        batcher: B,
        clock: Arc<dyn Clock>,
        command_buffer: usize,
    ) -> (
        Self,
        SegmenterHandle,
        mpsc::Receiver<EngineCommand>,
        CompletionReceiver,
        common::shutdown::ShutdownWatcher,
    ) {
        let (engine, completion_rx) = Self::build(config, fetch, batcher, clock);
        let (command_tx, command_rx) = mpsc::channel(command_buffer);
        let (shutdown_signal, shutdown_watcher) = common::shutdown::ShutdownSignal::new();
        let handle = SegmenterHandle {
            command_tx,
            shutdown: shutdown_signal,
        };
        (engine, handle, command_rx, completion_rx, shutdown_watcher)
    }

    /// The event loop: multiplexes inbound commands, manifest lookup
    /// completions, and the coalesced refresh timer, running each to
    /// completion before considering the next. Exits once `shutdown`
    /// fires.
    pub async fn run(
        mut self,
        mut commands: mpsc::Receiver<EngineCommand>,
        mut completions: mpsc::UnboundedReceiver<LookupCompletion>,
        mut shutdown: common::shutdown::ShutdownWatcher,
    ) {
        self.recompute_refresh_timer();
        loop {
            let sleep_for = self.next_refresh_deadline.map(|deadline| {
                let now = self.clock.now();
                deadline - now
            });
            tokio::select! {
                biased;
                _ = shutdown.signaled() => {
                    return;
                }
                Some(cmd) = commands.recv() => {
                    self.handle_command(cmd).await;
                }
                Some(completion) = completions.recv() => {
                    self.handle_completion(completion).await;
                }
                _ = sleep_until(sleep_for) => {
                    self.handle_refresh_fire().await;
                }
            }
        }
    }

    async fn handle_command(&mut self, command: EngineCommand) {
        match command {
            EngineCommand::Schedule {
                transactions,
                total_bytes,
                count,
                reply,
            } => {
                let result = self.schedule(transactions, total_bytes, count).await;
                let _ = reply.send(result);
            },
            EngineCommand::Inspect { reply } => {
                let _ = reply.send(self.state_snapshot());
            },
        }
        self.recompute_refresh_timer();
    }

    /// Re-initiates a lookup for every key whose refresh deadline has
    /// passed. `run` calls this when the coalesced refresh timer fires;
    /// exposed directly so callers driving the engine without the channel
    /// loop can force a refresh cycle too.
    pub async fn handle_refresh_fire(&mut self) {
        let due: Vec<_> = self
            .key_directory
            .iter()
            .filter(|key_info| !key_info.borrow().looking_up)
            .cloned()
            .collect();
        for key_info in due {
            self.manifest_client.initiate_lookup(&key_info);
        }
        self.recompute_refresh_timer();
    }

    fn recompute_refresh_timer(&mut self) {
        self.next_refresh_deadline = refresh_scheduler::next_refresh_deadline(&self.key_directory);
    }

    /// Accepts as much of `transactions` as the Holding Queue has room for,
    /// routing each transaction to its key's bound Segment if it has one or
    /// queuing it behind an in-flight lookup otherwise. Transactions beyond
    /// what fits are left un-accepted and counted as dropped. Forwards any
    /// Segment that gained its first pending transaction this call to the
    /// Batcher before returning.
    pub async fn schedule(
        &mut self,
        mut transactions: VecDeque<Transaction>,
        total_bytes: u64,
        count: u64,
    ) -> (u64, u64) {
        self.counters.peak_size_bytes = self
            .counters
            .peak_size_bytes
            .max(self.holding_queue.bytes_queued() + total_bytes);

        let mut bytes_accepted = 0u64;
        let mut count_accepted = 0u64;
        let mut bytes_forwarded = 0u64;
        let mut count_forwarded = 0u64;
        let mut to_forward: Vec<Rc<RefCell<crate::segment::Segment>>> = Vec::new();

        while count_accepted < count && !self.holding_queue.is_over_limit() {
            let Some(transaction) = transactions.pop_front() else {
                break;
            };
            let body_len = transaction.body_len();
            let key = transaction.key().clone();

            let key_info = {
                let manifest_client = &self.manifest_client;
                self.key_directory
                    .find_or_create(&key, |key_info| manifest_client.initiate_lookup(key_info))
            };
            let Some(key_info) = key_info else {
                transactions.push_front(transaction);
                break;
            };

            let bound_segment = key_info.borrow().segment.clone();
            if let Some(segment) = bound_segment {
                segment.borrow_mut().push_incoming(transaction);
                self.counters.bytes_forwarded += body_len;
                self.counters.count_forwarded += 1;
                bytes_forwarded += body_len;
                count_forwarded += 1;
                let already_scheduled = segment.borrow().scheduled_for_batching();
                if !already_scheduled {
                    segment.borrow_mut().set_scheduled_for_batching(true);
                    to_forward.push(segment);
                }
            } else {
                self.holding_queue.push_back(transaction);
            }

            bytes_accepted += body_len;
            count_accepted += 1;
        }

        if count_accepted < count {
            let shortfall_bytes = total_bytes.saturating_sub(bytes_accepted);
            let shortfall_count = count - count_accepted;
            self.counters.bytes_dropped += shortfall_bytes;
            self.counters.count_dropped += shortfall_count;
            let recommended_limit_kib = (self.counters.peak_size_bytes * 2) / 1024;
            tracing::warn!(
                dropped_bytes = shortfall_bytes,
                dropped_count = shortfall_count,
                recommended_limit_kib,
                "holding queue over limit; dropping newest transactions"
            );
            self.metrics.record_dropped(shortfall_bytes, shortfall_count);
        }

        self.metrics.record_accepted(bytes_accepted, count_accepted);
        if count_forwarded > 0 {
            self.metrics.record_forwarded(bytes_forwarded, count_forwarded);
        }
        self.metrics
            .set_holding_queue_gauges(self.holding_queue.bytes_queued(), self.holding_queue.count_queued() as u64);
        if !to_forward.is_empty() {
            self.batcher.schedule(&to_forward).await;
            for segment in &to_forward {
                assert!(
                    segment.borrow().incoming_is_empty(),
                    "batcher did not drain segment {:?}",
                    segment.borrow().segment_key()
                );
                segment.borrow_mut().set_scheduled_for_batching(false);
            }
        }

        (bytes_accepted, count_accepted)
    }

    /// Folds a completed lookup back into the owning KeyInfo: clears the
    /// in-flight flag, updates latency bookkeeping, and then either binds
    /// (or rebinds) the key to a Segment on success or records the failure
    /// and drops anything still queued for it.
    pub async fn handle_completion(&mut self, completion: LookupCompletion) {
        let LookupCompletion { key, elapsed, outcome } = completion;
        let Some(key_info) = self.key_directory.get(&key) else {
            tracing::error!(key = %lossy_key(&key), "lookup completion for an untracked key");
            return;
        };
        key_info.borrow_mut().looking_up = false;
        self.update_latency_ewma(&key_info, elapsed);
        self.metrics.record_lookup_latency(elapsed);
        tracing::debug!(key = %lossy_key(&key), elapsed_ms = elapsed.as_millis() as u64, "manifest lookup completed");

        let outcome = match outcome {
            TransportOutcome::Failed(message) => ManifestOutcome::Failure(ManifestFailure {
                error: ManifestError::Transport(message),
                retry_in_errors: None,
            }),
            TransportOutcome::Success { status, body } => manifest::parse_manifest_response(status, &body),
        };

        match outcome {
            ManifestOutcome::Success(success) => self.handle_success(&key_info, &key, success).await,
            ManifestOutcome::Failure(failure) => self.handle_failure(&key_info, &key, failure),
        }

        self.recompute_refresh_timer();
    }

    async fn handle_success(&mut self, key_info: &Rc<RefCell<crate::key_info::KeyInfo>>, key: &Bytes, success: ManifestSuccess) {
        let now = self.clock.now();
        {
            let mut info = key_info.borrow_mut();
            if let Some(timeout) = success.retry_in_healthy {
                info.refresh_timeout_healthy = timeout;
            }
            if let Some(timeout) = success.retry_in_errors {
                info.refresh_timeout_errors = timeout;
            }
            info.rejection_active = false;
            info.last_lookup_success_time = now;
        }

        let previous_segment = key_info.borrow().segment.clone();
        let segment = self.segment_registry.find_or_create(&success.fingerprint);
        let rebinding_only = previous_segment
            .as_ref()
            .is_some_and(|prev| prev.borrow().segment_key() != &success.fingerprint);
        let first_resolution = previous_segment.is_none();

        key_info.borrow_mut().segment = Some(segment.clone());

        if first_resolution {
            let drained = self.holding_queue.drain_matching(key);
            let mut drained_bytes = 0u64;
            let mut drained_count = 0u64;
            for transaction in drained {
                let body_len = transaction.body_len();
                segment.borrow_mut().push_incoming(transaction);
                self.counters.bytes_forwarded += body_len;
                self.counters.count_forwarded += 1;
                drained_bytes += body_len;
                drained_count += 1;
            }
            if drained_count > 0 {
                self.metrics.record_forwarded(drained_bytes, drained_count);
            }
            let already_scheduled = segment.borrow().scheduled_for_batching();
            if !already_scheduled {
                segment.borrow_mut().set_scheduled_for_batching(true);
            }
            self.batcher.schedule(&[segment.clone()]).await;
            assert!(
                segment.borrow().incoming_is_empty(),
                "batcher did not drain segment {:?}",
                segment.borrow().segment_key()
            );
            segment.borrow_mut().set_scheduled_for_batching(false);
        } else if rebinding_only {
            // The key now resolves to a different endpoint set, but any
            // transactions already sitting in the old Segment's incoming
            // list stay there — only new transactions route to the new
            // Segment from here on.
            tracing::debug!(key = %lossy_key(key), "key rebound to a new segment");
        }

        self.metrics.record_lookup_succeeded();
    }

    fn handle_failure(&mut self, key_info: &Rc<RefCell<crate::key_info::KeyInfo>>, key: &Bytes, failure: ManifestFailure) {
        let now = self.clock.now();
        let had_segment = key_info.borrow().segment.is_some();
        {
            let mut info = key_info.borrow_mut();
            info.last_lookup_error_time = now;
            info.last_rejection_time = now;
            info.rejection_active = true;
            info.last_error_message = Some(failure.error.to_string());
            if let Some(timeout) = failure.retry_in_errors {
                info.refresh_timeout_errors = timeout;
            }
        }
        self.last_error = Some((now, failure.error.to_string()));

        if !had_segment {
            let drained = self.holding_queue.drain_matching(key);
            if !drained.is_empty() {
                let bytes: u64 = drained.iter().map(Transaction::body_len).sum();
                self.counters.bytes_dropped += bytes;
                self.counters.count_dropped += drained.len() as u64;
                self.metrics.record_dropped(bytes, drained.len() as u64);
            }
        }

        tracing::warn!(
            key = %lossy_key(key),
            error = %failure.error,
            "manifest lookup did not succeed"
        );
        self.metrics.record_lookup_failed(&failure.error);
    }

    fn update_latency_ewma(&mut self, key_info: &Rc<RefCell<crate::key_info::KeyInfo>>, elapsed: Duration) {
        {
            let mut info = key_info.borrow_mut();
            info.lookup_latency_ewma = Some(ewma(info.lookup_latency_ewma, elapsed));
        }
        self.lookup_latency_ewma = Some(ewma(self.lookup_latency_ewma, elapsed));
    }

    pub fn state_snapshot(&self) -> SegmenterState {
        let now = self.clock.now();
        let segments = self
            .segment_registry
            .iter()
            .map(|segment| {
                let segment = segment.borrow();
                SegmentSummary {
                    segment_key: lossy_key(segment.segment_key()),
                    bytes_incoming: segment.bytes_incoming(),
                    count_incoming: segment.count_incoming(),
                    scheduled_for_batching: segment.scheduled_for_batching(),
                }
            })
            .collect();
        let key_infos = self
            .key_directory
            .iter()
            .map(|key_info| {
                let key_info = key_info.borrow();
                KeyInfoSummary {
                    key: lossy_key(key_info.key()),
                    bound_segment: key_info.segment.as_ref().map(|s| lossy_key(s.borrow().segment_key())),
                    looking_up: key_info.looking_up,
                    rejection_active: key_info.rejection_active,
                    last_error_message: key_info.last_error_message.clone(),
                }
            })
            .collect();
        let in_flight_lookups = self
            .key_directory
            .iter()
            .filter(|key_info| key_info.borrow().looking_up)
            .map(|key_info| lossy_key(key_info.borrow().key()))
            .collect();
        SegmenterState {
            holding_queue_bytes: self.holding_queue.bytes_queued(),
            holding_queue_count: self.holding_queue.count_queued() as u64,
            holding_queue_limit: self.holding_queue.limit(),
            peak_size_bytes: self.counters.peak_size_bytes,
            bytes_forwarded: self.counters.bytes_forwarded,
            count_forwarded: self.counters.count_forwarded,
            bytes_dropped: self.counters.bytes_dropped,
            count_dropped: self.counters.count_dropped,
            next_refresh_in: self.next_refresh_deadline.map(|d| d - now),
            lookup_latency_ewma: self.lookup_latency_ewma,
            last_error_time: self.last_error.as_ref().map(|(time, _)| time.as_duration_since_epoch()),
            last_error_message: self.last_error.as_ref().map(|(_, message)| message.clone()),
            segments,
            key_infos,
            in_flight_lookups,
        }
    }
}

fn ewma(previous: Option<Duration>, sample: Duration) -> Duration {
    match previous {
        None => sample,
        Some(previous) => Duration::from_secs_f64(previous.as_secs_f64() * 0.5 + sample.as_secs_f64() * 0.5),
    }
}

async fn sleep_until(duration: Option<Duration>) {
    match duration {
        Some(duration) => tokio::time::sleep(duration).await,
        None => std::future::pending().await,
    }
}
