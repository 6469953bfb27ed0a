use std::time::Duration;

use thiserror::Error;

/// A bot decision request that produced no usable answer. Always recovered
/// by the caller (autodraft or an empty claim set).
#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("failed to materialize bot source {path}: {source}")]
    Materialize {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to launch sandbox: {message}")]
    Launch { message: String },

    #[error("sandbox port {port} not reachable after {waited:?}")]
    PortUnreachable { port: u16, waited: Duration },

    #[error("bot call exceeded its {deadline:?} deadline")]
    Timeout { deadline: Duration },

    #[error("bot call failed: {message}")]
    Remote { message: String },

    #[error("could not decode bot response: {0}")]
    Decode(#[from] serde_json::Error),
}
