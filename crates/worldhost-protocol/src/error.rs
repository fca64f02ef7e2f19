//! Codec and protocol-rule errors.

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Bytes that are not a known message: bad JSON, an unknown `type`
    /// tag, or missing fields.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// A well-formed message sent at the wrong time, such as anything
    /// but `login` as a connection's first message.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
