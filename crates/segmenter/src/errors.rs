/// Everything that can go wrong resolving a routing key against the
/// manifest service. Kept exhaustive and structured rather than stringly
/// typed so the engine's completion handler can match on it directly and
/// so each variant carries what it needs to populate `KeyInfo`'s last-error
/// fields and the corresponding log event.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ManifestError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("manifest response was not valid JSON: {0}")]
    InvalidJson(String),

    #[error("manifest response did not match the expected schema: {0}")]
    InvalidSchema(String),

    #[error("manifest rejected the key: {message}")]
    Rejected {
        message: String,
        error_id: Option<String>,
    },

    #[error("manifest endpoint returned HTTP {0}")]
    HttpStatus(u16),
}
