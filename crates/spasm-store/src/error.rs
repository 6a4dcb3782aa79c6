//! Error types for event storage.

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No pooled connection became available.
    #[error("store connection error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("store database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A stored or submitted event could not be (de)serialized.
    #[error("store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The event cannot be stored as given.
    #[error("invalid event: {0}")]
    InvalidEvent(String),
}
