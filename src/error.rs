//! Error types shared by every layer of the crate.

use thiserror::Error;

/// Boxed cause carried by wrapping variants.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Main error type for searchable operations.
#[derive(Error, Debug)]
pub enum SearchableError {
    /// The underlying index could not be opened, created, read or closed.
    #[error("Index unavailable: {message}")]
    IndexUnavailable {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// Free-text criteria could not be parsed.
    #[error("Query syntax error: {0}")]
    QuerySyntax(String),

    /// A hit could not be turned back into a result object.
    #[error("Could not reconstitute resultant object: {message}")]
    Reconstruction {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// The declared identifier type is not one this crate can convert into.
    #[error("Identifier type could not be resolved: {0}")]
    IdentifierType(String),

    /// The directory exists but holds no index yet.
    #[error("No index found: {0}")]
    IndexNotFound(String),

    /// Another writer holds the write lock.
    #[error("Lock obtain failed: {0}")]
    LockObtainFailed(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for searchable operations.
pub type Result<T> = std::result::Result<T, SearchableError>;

impl SearchableError {
    /// Wrap a failure while opening, creating or closing index handles.
    pub fn index_unavailable<E>(message: impl Into<String>, source: E) -> Self
    where
        E: Into<BoxError>,
    {
        SearchableError::IndexUnavailable {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn index_unavailable_msg(message: impl Into<String>) -> Self {
        SearchableError::IndexUnavailable {
            message: message.into(),
            source: None,
        }
    }

    pub fn reconstruction<E>(message: impl Into<String>, source: E) -> Self
    where
        E: Into<BoxError>,
    {
        SearchableError::Reconstruction {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn reconstruction_msg(message: impl Into<String>) -> Self {
        SearchableError::Reconstruction {
            message: message.into(),
            source: None,
        }
    }

    pub fn query_syntax(message: impl Into<String>) -> Self {
        SearchableError::QuerySyntax(message.into())
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        SearchableError::InvalidArgument(message.into())
    }

    pub fn index_not_found(message: impl Into<String>) -> Self {
        SearchableError::IndexNotFound(message.into())
    }

    /// True when the directory simply holds no index yet.
    pub fn is_not_found(&self) -> bool {
        match self {
            SearchableError::IndexNotFound(_) => true,
            SearchableError::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

/// Wrap a failure into `IndexUnavailable`, keeping the cause.
///
/// Errors that already are `IndexUnavailable` pass through unchanged.
pub(crate) fn unavailable(
    message: impl Into<String>,
) -> impl FnOnce(SearchableError) -> SearchableError {
    let message = message.into();
    move |e| match e {
        e @ SearchableError::IndexUnavailable { .. } => e,
        e => SearchableError::index_unavailable(message, e),
    }
}
