use std::{
    collections::VecDeque,
    sync::Arc,
    time::Duration,
};

use common::clock::TestClock;
use http::StatusCode;
use http_client::{
    testing::ScriptedFetchClient,
    FetchResponse,
};
use proptest::prelude::*;
use segmenter::{
    batcher::testing::RecordingBatcher,
    config::SegmenterConfig,
    engine::SegmenterEngine,
    transaction::Transaction,
};

fn config(buffer_limit_bytes: u64) -> SegmenterConfig {
    SegmenterConfig {
        buffer_limit_bytes,
        manifest_url: "https://manifest.invalid/lookup".to_string(),
        manifest_concurrency: 64,
        manifest_timeout: Duration::from_secs(1),
        user_agent: "segmenter-tests/1.0".to_string(),
    }
}

proptest! {
    /// Whatever mix of accepted and dropped transactions a single call
    /// produces, the two counts always add up to what was offered, and
    /// the holding queue never reports more bytes queued than transactions
    /// actually sitting in it could account for.
    #[test]
    fn accepted_and_dropped_always_account_for_every_offered_transaction(
        bodies in prop::collection::vec(1u64..64, 1..20),
        buffer_limit_bytes in 1u64..256,
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        runtime.block_on(async {
            let fetch = Arc::new(ScriptedFetchClient::new());
            for _ in 0..bodies.len() {
                fetch.push_response(Ok(FetchResponse {
                    status: StatusCode::OK,
                    body: "not consumed before the test ends".to_string(),
                }));
            }
            let batcher = RecordingBatcher::new();
            let clock = Arc::new(TestClock::new());
            let (mut engine, _completions) =
                SegmenterEngine::for_test(&config(buffer_limit_bytes), fetch, batcher, clock);

            let total_bytes: u64 = bodies.iter().sum();
            let count = bodies.len() as u64;
            let mut batch = VecDeque::new();
            for (i, len) in bodies.iter().enumerate() {
                let key = format!("key-{i}").into_bytes();
                let body = vec![b'x'; *len as usize];
                batch.push_back(Transaction::new(key, body));
            }

            let (accepted_bytes, accepted_count) = engine.schedule(batch, total_bytes, count).await;
            let state = engine.state_snapshot();

            prop_assert!(accepted_count <= count);
            prop_assert_eq!(accepted_count + state.count_dropped, count);
            prop_assert!(accepted_bytes <= total_bytes);
            prop_assert_eq!(accepted_bytes + state.bytes_dropped, total_bytes);
            prop_assert!(state.holding_queue_count <= accepted_count, "every queued transaction was also accepted");
            Ok(())
        })?;
    }

    /// The coalesced refresh deadline, whenever one exists, always lands on
    /// a five-second boundary of the clock's epoch.
    #[test]
    fn next_refresh_in_is_always_none_or_a_five_second_multiple(
        bodies in prop::collection::vec(1u64..64, 1..8),
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        runtime.block_on(async {
            let fetch = Arc::new(ScriptedFetchClient::new());
            for _ in 0..bodies.len() {
                fetch.push_response(Ok(FetchResponse {
                    status: StatusCode::OK,
                    body: "not consumed before the test ends".to_string(),
                }));
            }
            let batcher = RecordingBatcher::new();
            let clock = Arc::new(TestClock::new());
            let (mut engine, _completions) =
                SegmenterEngine::for_test(&config(1024 * 1024), fetch, batcher, clock.clone());

            let total_bytes: u64 = bodies.iter().sum();
            let count = bodies.len() as u64;
            let mut batch = VecDeque::new();
            for (i, len) in bodies.iter().enumerate() {
                let key = format!("key-{i}").into_bytes();
                let body = vec![b'x'; *len as usize];
                batch.push_back(Transaction::new(key, body));
            }
            engine.schedule(batch, total_bytes, count).await;

            let state = engine.state_snapshot();
            if let Some(next_refresh_in) = state.next_refresh_in {
                let deadline_nanos = clock.now().as_duration_since_epoch().as_nanos() + next_refresh_in.as_nanos();
                prop_assert_eq!(deadline_nanos % Duration::from_secs(5).as_nanos(), 0);
            }
            Ok(())
        })?;
    }
}
