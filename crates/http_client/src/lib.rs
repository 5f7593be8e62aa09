//! A minimal, swappable HTTP client abstraction.
//!
//! Production code talks to [`ReqwestFetchClient`]; tests swap in a fake that
//! implements the same [`FetchClient`] trait so lookup completions can be
//! scripted without a real network endpoint.

mod metrics;

use std::time::Duration;

use async_trait::async_trait;
use http::StatusCode;

/// A single HTTP GET request.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: String,
    pub user_agent: String,
    pub timeout: Duration,
}

/// The result of a completed transfer, as handed back to the caller. This
/// intentionally mirrors what an asynchronous HTTP client with a completion
/// callback would report: a transport-level success/failure, and — if the
/// transport succeeded — the HTTP status and response body.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: StatusCode,
    pub body: String,
}

/// Transport-level failure: DNS, connect, TLS, timeout, or a malformed
/// response the transport itself refused to deliver. Distinct from a
/// successfully-transported non-2xx HTTP response, which is a
/// [`FetchResponse`] with a non-2xx `status`.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct TransportError(pub String);

#[async_trait]
pub trait FetchClient: Send + Sync {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse, TransportError>;
}

/// Production implementation backed by `reqwest`, configured for HTTP/2 and
/// redirect-following the way a manifest lookup is specified to behave.
pub struct ReqwestFetchClient {
    client: reqwest::Client,
}

impl ReqwestFetchClient {
    pub fn new() -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(10))
            .use_rustls_tls()
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl FetchClient for ReqwestFetchClient {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse, TransportError> {
        let timer = metrics::fetch_timer();
        let result = self
            .client
            .get(&request.url)
            .header(http::header::USER_AGENT, &request.user_agent)
            .timeout(request.timeout)
            .send()
            .await;
        let response = match result {
            Ok(response) => response,
            Err(e) => {
                timer.finish(false);
                return Err(TransportError(e.to_string()));
            },
        };
        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                timer.finish(false);
                return Err(TransportError(e.to_string()));
            },
        };
        timer.finish(true);
        Ok(FetchResponse { status, body })
    }
}

#[cfg(any(test, feature = "testing"))]
pub mod testing {
    use std::{
        collections::VecDeque,
        sync::Mutex,
    };

    use super::*;

    /// Records every request it receives and returns pre-scripted responses
    /// in order, one per call. Panics if a call arrives with no scripted
    /// response left — that's a test bug, not a thing to paper over.
    pub struct ScriptedFetchClient {
        responses: Mutex<VecDeque<Result<FetchResponse, TransportError>>>,
        requests: Mutex<Vec<FetchRequest>>,
    }

    impl ScriptedFetchClient {
        pub fn new() -> Self {
            Self {
                responses: Mutex::new(VecDeque::new()),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub fn push_response(&self, response: Result<FetchResponse, TransportError>) {
            self.responses.lock().unwrap().push_back(response);
        }

        pub fn requests(&self) -> Vec<FetchRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl Default for ScriptedFetchClient {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl FetchClient for ScriptedFetchClient {
        async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse, TransportError> {
            self.requests.lock().unwrap().push(request);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .expect("ScriptedFetchClient ran out of scripted responses")
        }
    }
}
