use thiserror::Error;

/// Failure terminating one call or one suspended resolution.
///
/// Failures that cross the wire travel as an `exception` frame carrying
/// only the display text; the receiving peer cannot recover the originating
/// variant and surfaces it as `Remote`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallFailure {
    #[error("unknown question id {id}")]
    UnknownQuestion { id: u64 },
    #[error("unknown method '{method}'")]
    UnknownMethod { method: String },
    #[error("{0}")]
    Handler(String),
    #[error("failed to resolve call parameter: {0}")]
    ParamResolution(String),
    #[error("question {id} already reached a terminal state")]
    ProtocolViolation { id: u64 },
    #[error("reference cycle detected through question {id}")]
    ReferenceCycle { id: u64 },
    #[error("{0}")]
    Remote(String),
    #[error("connection closed")]
    ConnectionClosed,
}
