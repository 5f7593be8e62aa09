//! Decoding and validation of the manifest service's JSON responses.
//!
//! A response is either a resolution (`status: "ok"`) carrying a weighted
//! list of gateway endpoints, or a rejection (`status: "error"`) carrying a
//! human-readable reason. Anything else — a non-200 transport status, a
//! malformed body, a missing or unrecognized `status` field, a target with
//! no `base_url` or a zero weight — is folded into the same failure path
//! the engine treats identically to an explicit rejection.

use std::time::Duration;

use bytes::Bytes;
use http::StatusCode;
use serde::{
    Deserialize,
    Serialize,
};
use serde_json::Value;

use crate::errors::ManifestError;

/// One gateway endpoint and its relative share of traffic for a segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub base_url: String,
    pub weight: u32,
}

#[derive(Debug, Clone, Default)]
pub struct RetryIn {
    pub all_healthy: Option<Duration>,
    pub has_errors: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct ManifestSuccess {
    pub targets: Vec<Target>,
    pub fingerprint: Bytes,
    pub retry_in_healthy: Option<Duration>,
    pub retry_in_errors: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct ManifestFailure {
    pub error: ManifestError,
    pub retry_in_errors: Option<Duration>,
}

#[derive(Debug, Clone)]
pub enum ManifestOutcome {
    Success(ManifestSuccess),
    Failure(ManifestFailure),
}

fn parse_scalar_retry_in(obj: &serde_json::Map<String, Value>) -> Option<Duration> {
    obj.get("retry_in")
        .and_then(Value::as_u64)
        .map(Duration::from_secs)
}

fn parse_retry_in_object(obj: &serde_json::Map<String, Value>) -> RetryIn {
    match obj.get("retry_in").and_then(Value::as_object) {
        Some(retry) => RetryIn {
            all_healthy: retry.get("all_healthy").and_then(Value::as_u64).map(Duration::from_secs),
            has_errors: retry.get("has_errors").and_then(Value::as_u64).map(Duration::from_secs),
        },
        None => RetryIn::default(),
    }
}

fn canonical_fingerprint(targets: &[Target]) -> Result<Bytes, ManifestError> {
    serde_json::to_vec(targets)
        .map(Bytes::from)
        .map_err(|e| ManifestError::InvalidSchema(format!("failed to canonicalize targets: {e}")))
}

fn parse_targets(obj: &serde_json::Map<String, Value>) -> Result<Vec<Target>, ManifestError> {
    let raw_targets = obj
        .get("targets")
        .ok_or_else(|| ManifestError::InvalidSchema("missing \"targets\" field".to_string()))?;
    let targets: Vec<Target> = serde_json::from_value(raw_targets.clone())
        .map_err(|e| ManifestError::InvalidSchema(format!("malformed \"targets\" array: {e}")))?;
    if targets.is_empty() {
        return Err(ManifestError::InvalidSchema(
            "\"targets\" array must not be empty".to_string(),
        ));
    }
    for target in &targets {
        if target.base_url.is_empty() {
            return Err(ManifestError::InvalidSchema(
                "target base_url must not be empty".to_string(),
            ));
        }
        if target.weight == 0 {
            return Err(ManifestError::InvalidSchema(
                "target weight must be at least 1".to_string(),
            ));
        }
    }
    Ok(targets)
}

fn rejection_from_body(http_status: StatusCode, obj: Option<&serde_json::Map<String, Value>>) -> ManifestFailure {
    let message = obj
        .and_then(|o| o.get("message"))
        .and_then(Value::as_str)
        .map(str::to_owned)
        .unwrap_or_else(|| format!("manifest endpoint returned HTTP {}", http_status.as_u16()));
    let error_id = obj
        .and_then(|o| o.get("error_id"))
        .and_then(Value::as_str)
        .map(str::to_owned);
    let retry_in_errors = obj.and_then(parse_scalar_retry_in);
    ManifestFailure {
        error: if http_status == StatusCode::OK {
            ManifestError::Rejected { message, error_id }
        } else {
            ManifestError::HttpStatus(http_status.as_u16())
        },
        retry_in_errors,
    }
}

/// Parses and validates a manifest response body. `http_status` governs the
/// outcome first: any non-200 transport status is treated as a rejection
/// even if the body happens to parse, though the body is still consulted
/// for a `message` and `retry_in` if it has one.
pub fn parse_manifest_response(http_status: StatusCode, body: &str) -> ManifestOutcome {
    let value: Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(e) => {
            if http_status != StatusCode::OK {
                return ManifestOutcome::Failure(rejection_from_body(http_status, None));
            }
            return ManifestOutcome::Failure(ManifestFailure {
                error: ManifestError::InvalidJson(e.to_string()),
                retry_in_errors: None,
            });
        },
    };
    let obj = match value.as_object() {
        Some(obj) => obj,
        None => {
            if http_status != StatusCode::OK {
                return ManifestOutcome::Failure(rejection_from_body(http_status, None));
            }
            return ManifestOutcome::Failure(ManifestFailure {
                error: ManifestError::InvalidSchema("response root is not a JSON object".to_string()),
                retry_in_errors: None,
            });
        },
    };

    if http_status != StatusCode::OK {
        return ManifestOutcome::Failure(rejection_from_body(http_status, Some(obj)));
    }

    let status = match obj.get("status").and_then(Value::as_str) {
        Some(status) => status,
        None => {
            return ManifestOutcome::Failure(ManifestFailure {
                error: ManifestError::InvalidSchema("missing \"status\" field".to_string()),
                retry_in_errors: None,
            });
        },
    };

    match status {
        "ok" => match parse_targets(obj) {
            Ok(targets) => match canonical_fingerprint(&targets) {
                Ok(fingerprint) => {
                    let retry_in = parse_retry_in_object(obj);
                    ManifestOutcome::Success(ManifestSuccess {
                        targets,
                        fingerprint,
                        retry_in_healthy: retry_in.all_healthy,
                        retry_in_errors: retry_in.has_errors,
                    })
                },
                Err(error) => ManifestOutcome::Failure(ManifestFailure {
                    error,
                    retry_in_errors: None,
                }),
            },
            Err(error) => ManifestOutcome::Failure(ManifestFailure {
                error,
                retry_in_errors: None,
            }),
        },
        "error" => ManifestOutcome::Failure(rejection_from_body(http_status, Some(obj))),
        other => ManifestOutcome::Failure(ManifestFailure {
            error: ManifestError::InvalidSchema(format!("unrecognized \"status\": {other:?}")),
            retry_in_errors: None,
        }),
    }
}
