//! Error type for game state decoding.

/// Errors that abort the decode of a whole game state document.
///
/// Unknown enum values never produce one of these; they decode to an
/// unresolved [`ResolvedOrRaw`](crate::ResolvedOrRaw).
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The top-level document is not a JSON object.
    #[error("game state document is not a JSON object")]
    NotAnObject,

    /// The document is not valid JSON, or a section has the wrong shape.
    #[error("failed to decode game state: {source}")]
    Invalid {
        /// The underlying JSON error, including the failing path.
        #[from]
        source: serde_json::Error,
    },
}
