//! Error types for event conversion.

#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    /// The string is not valid bech32.
    #[error("invalid note id: {0}")]
    InvalidNoteId(String),

    /// Valid bech32, but not a `note` identifier.
    #[error("expected a note id, got prefix '{0}'")]
    UnexpectedPrefix(String),
}
