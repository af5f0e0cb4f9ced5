use crate::model::StreamId;

/// Errors returned by [`StreamingMessageParser::parse`](crate::StreamingMessageParser::parse).
///
/// Malformed markup is never an error: it degrades to plain text. These
/// variants only cover violations of the caller contract and internal faults.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// The buffer for a stream is shorter than one already parsed for it.
    /// Buffers are cumulative: each call must pass everything received so far.
    #[error("buffer for stream {stream_id} shrank from {previous} to {current} bytes")]
    BufferShrank {
        stream_id: StreamId,
        previous: usize,
        current: usize,
    },
    /// The consumed offset does not land on a character boundary of the new
    /// buffer, so the already-consumed prefix was altered.
    #[error("buffer for stream {stream_id} was rewritten before offset {position}")]
    NotCharBoundary { stream_id: StreamId, position: usize },
    /// A previous call for this stream panicked while holding its state.
    #[error("state for stream {0} is poisoned")]
    StatePoisoned(StreamId),
    #[error("tool invocation {tool_call_id} could not be serialized: {reason}")]
    InvalidToolInvocation {
        tool_call_id: String,
        reason: String,
    },
}

/// Errors from reading [`ParserConfig`](crate::ParserConfig) out of the environment.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?} ({reason})")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    pub(crate) fn invalid(key: &str, value: &str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}
