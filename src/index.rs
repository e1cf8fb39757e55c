//! Segment-based full-text index.
//!
//! This is the engine every higher layer drives: a writer appends documents
//! into immutable segments, a reader opens one committed generation, and a
//! searcher executes queries against that reader.
//!
//! # Module Structure
//!
//! - `document`: engine-native documents and fields
//! - `meta`: the commit point (`index.meta`) listing live segments
//! - `segment`: segment files and their in-memory postings
//! - `writer`: buffered mutations, commits, merges and the write lock
//! - `reader`: point-in-time view of one generation
//! - `searcher`: query execution, scoring and sorting

pub mod document;
pub mod meta;
pub mod reader;
pub mod searcher;
pub mod segment;
pub mod writer;

pub use document::{Document, Field};
pub use meta::{IndexMeta, SegmentMeta};
pub use reader::{IndexReader, LeafReader};
pub use searcher::{IndexSearcher, ScoreDoc, TopDocs};
pub use writer::{IndexWriter, IndexWriterConfig, OpenMode};

/// Name of the file that marks a live writer.
pub const WRITE_LOCK_NAME: &str = "write.lock";

/// Global document number inside one reader.
pub type DocId = u32;
