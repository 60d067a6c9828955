//! Unified error type.

use thiserror::Error;

/// The error type for tsuki's fallible operations.
///
/// Application-level failures (404, 422, etc.) travel as [`Reply`](crate::Reply)
/// values and are rendered by the resolution pipeline. This type covers the
/// failures the framework itself produces: binding a port, writing to the
/// transport, building headers, or one of the built-in middleware rejecting a
/// request.
#[derive(Debug, Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid socket address `{0}`")]
    InvalidAddress(String),

    #[error("response writer requires a flusher")]
    FlushUnsupported,

    #[error("invalid header `{name}`")]
    InvalidHeader { name: String },

    #[error("unable to read body: {0}")]
    BodyRead(std::io::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("authorization failed: {0}")]
    AuthorizationFailed(#[source] crate::reply::BoxError),

    #[error("validation failed: {0}")]
    ValidationFailed(#[source] crate::reply::BoxError),

    #[error("transform failed: {0}")]
    TransformFailed(#[source] crate::reply::BoxError),

    #[error("{0}")]
    Panic(String),
}
