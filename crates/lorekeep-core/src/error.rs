use thiserror::Error;

/// A convenience `Result` alias using [`KnowledgeError`].
pub type KnowledgeResult<T> = Result<T, KnowledgeError>;

/// Top-level error type for the lorekeep crates.
///
/// Lookups of unknown fragment ids are not errors: they surface as `None`
/// or `false` from the store operations.
#[derive(Error, Debug)]
pub enum KnowledgeError {
    /// A fragment failed validation (empty content, unusable id).
    #[error("Invalid fragment: {0}")]
    InvalidFragment(String),

    /// A scope name other than `shared` or `personal`.
    #[error("Invalid scope: {0}")]
    InvalidScope(String),

    /// The id is already owned by the other scope.
    #[error("Duplicate fragment id: {0}")]
    DuplicateId(String),

    /// A store-level failure that is not a plain I/O error.
    #[error("Store error: {0}")]
    Store(String),

    /// An error in configuration parsing or validation.
    #[error("Config error: {0}")]
    Config(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
