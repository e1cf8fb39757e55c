//! # Searchable
//!
//! Full-text indexing and search for application objects.
//!
//! ## Features
//!
//! - Objects opt in through the [`Searchable`] trait and are rebuilt from hits
//! - Shared per-path writer, reader and searcher handles
//! - Batch mode for bulk loads
//! - Query-string parsing with field, phrase and boolean syntax
//! - File and in-memory storage backends

pub mod analysis;
pub mod config;
mod error;
pub mod fields;
pub mod identifier;
pub mod index;
pub mod indexer;
pub mod lifecycle;
pub mod metadata;
pub mod query;
pub mod reconstruct;
pub mod registry;
pub mod result;
pub mod search;
pub mod storage;

// Re-exports for the public API
pub use config::{IndexConfig, StorageKind};
pub use error::{Result, SearchableError};
pub use identifier::{IdType, IdValue};
pub use indexer::{IndexedField, Indexer, Searchable};
pub use lifecycle::{IndexLifecycle, ScopedLifecycle};
pub use metadata::{TypeInfo, TypeMetadata, TypeRegistry};
pub use query::{Query, QueryParser, Sort};
pub use reconstruct::ResultReconstructor;
pub use registry::{HandleKind, ResourceRegistry};
pub use result::{GenericResult, ResultInfo, ResultSet, SearchResult};
pub use search::{Criteria, QueryExecutor, SearchOptions, SortSpec};
pub use storage::{Storage, StorageConfig, StorageFactory};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
