//! Searching an index and rebuilding the hits.
//!
//! [`QueryExecutor::search`] takes one [`SearchOptions`] value:
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use searchable::config::IndexConfig;
//! use searchable::lifecycle::IndexLifecycle;
//! use searchable::metadata::TypeRegistry;
//! use searchable::registry::ResourceRegistry;
//! use searchable::search::{QueryExecutor, SearchOptions, SortSpec};
//!
//! # fn main() -> searchable::Result<()> {
//! let lifecycle = Arc::new(IndexLifecycle::new(
//!     ResourceRegistry::shared(),
//!     IndexConfig::new("/var/lib/app/index"),
//! ));
//! let executor = QueryExecutor::new(lifecycle, Arc::new(TypeRegistry::new()));
//!
//! let results = executor.search(
//!     SearchOptions::text("alpha case")
//!         .with_offset(10)
//!         .with_limit(10)
//!         .with_sort(SortSpec::field("title", false)),
//! )?;
//! for result in results.iter() {
//!     println!("{} {:?}", result.ranking(), result.stored_field("title"));
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use log::debug;

use crate::analysis::{Analyzer, KeywordAnalyzer};
use crate::error::{Result, unavailable};
use crate::fields::{PRIVATE_FIELD_NAMES, is_internal_field, sortable_field_name};
use crate::index::{DocId, Document, IndexReader};
use crate::lifecycle::IndexLifecycle;
use crate::metadata::{TypeMetadata, TypeRegistry};
use crate::query::{Query, QueryParser, Sort};
use crate::reconstruct::ResultReconstructor;
use crate::result::{ResultSet, SearchResult};

/// What to search for.
#[derive(Debug, Clone, PartialEq)]
pub enum Criteria {
    /// Free text, parsed against the default fields.
    Text(String),
    /// A query built by the caller.
    Query(Query),
}

impl From<&str> for Criteria {
    fn from(text: &str) -> Self {
        Criteria::Text(text.to_string())
    }
}

impl From<String> for Criteria {
    fn from(text: String) -> Self {
        Criteria::Text(text)
    }
}

impl From<Query> for Criteria {
    fn from(query: Query) -> Self {
        Criteria::Query(query)
    }
}

/// Result ordering.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum SortSpec {
    /// Best match first.
    #[default]
    Relevance,
    /// By an application field's sortable twin; `reverse` for descending.
    Field { name: String, reverse: bool },
    /// A sort built by the caller, used as is.
    Custom(Sort),
}

impl SortSpec {
    pub fn field(name: impl Into<String>, reverse: bool) -> Self {
        SortSpec::Field {
            name: name.into(),
            reverse,
        }
    }

    /// The engine sort. A blank field name means relevance.
    pub fn to_sort(&self) -> Sort {
        match self {
            SortSpec::Relevance => Sort::relevance(),
            SortSpec::Field { name, .. } if name.trim().is_empty() => Sort::relevance(),
            SortSpec::Field { name, reverse } => {
                Sort::by_field(sortable_field_name(name.trim()), *reverse)
            }
            SortSpec::Custom(sort) => sort.clone(),
        }
    }
}

/// Everything one search needs. Unset options take their defaults: no
/// filter, offset 0, no limit, relevance order.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOptions {
    pub criteria: Criteria,
    /// Fields searched by free-text criteria. Falls back to the type hint's
    /// fields, then to every application field in the index.
    pub default_fields: Option<Vec<String>>,
    /// Restricts hits without affecting their scores.
    pub filter: Option<Query>,
    /// Registered type whose default fields to search.
    pub type_hint: Option<String>,
    pub offset: usize,
    /// Maximum number of results; `None` runs to the end of the matches.
    pub limit: Option<usize>,
    pub sort: SortSpec,
}

impl SearchOptions {
    pub fn new(criteria: impl Into<Criteria>) -> Self {
        SearchOptions {
            criteria: criteria.into(),
            default_fields: None,
            filter: None,
            type_hint: None,
            offset: 0,
            limit: None,
            sort: SortSpec::Relevance,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::new(Criteria::Text(text.into()))
    }

    pub fn query(query: Query) -> Self {
        Self::new(Criteria::Query(query))
    }

    pub fn with_default_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.default_fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_filter(mut self, filter: Query) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_type_hint(mut self, type_name: impl Into<String>) -> Self {
        self.type_hint = Some(type_name.into());
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_sort(mut self, sort: SortSpec) -> Self {
        self.sort = sort;
        self
    }
}

/// Runs searches against the index of a lifecycle.
#[derive(Debug, Clone)]
pub struct QueryExecutor {
    lifecycle: Arc<IndexLifecycle>,
    reconstructor: ResultReconstructor,
}

impl QueryExecutor {
    pub fn new(lifecycle: Arc<IndexLifecycle>, types: Arc<TypeRegistry>) -> Self {
        QueryExecutor {
            lifecycle,
            reconstructor: ResultReconstructor::new(types),
        }
    }

    pub fn lifecycle(&self) -> &Arc<IndexLifecycle> {
        &self.lifecycle
    }

    pub fn types(&self) -> &Arc<TypeRegistry> {
        self.reconstructor.types()
    }

    /// Run a search and rebuild the hits of the requested window.
    ///
    /// The window is `[offset, min(offset + limit, total))`; an offset past
    /// the last match yields an empty set that still reports the total.
    /// Either every hit of the window is rebuilt or the call fails.
    pub fn search(&self, options: SearchOptions) -> Result<ResultSet> {
        let searcher = self.lifecycle.acquire_searcher()?;

        let query = match options.criteria {
            Criteria::Query(query) => query,
            Criteria::Text(ref text) => {
                let fields = self.resolve_default_fields(
                    options.default_fields.as_deref(),
                    options.type_hint.as_deref(),
                    searcher.reader(),
                );
                debug!("Fields being searched: {fields:?}");
                self.prepare_query(text, &fields)?
            }
        };

        debug!("Searching with query: {query}");
        let sort = options.sort.to_sort();
        let window_end = match options.limit {
            Some(limit) => options.offset.saturating_add(limit),
            None => usize::MAX,
        };
        let top = searcher
            .search(&query, options.filter.as_ref(), window_end, &sort)
            .map_err(unavailable("Search failed"))?;

        let mut results: Vec<Box<dyn SearchResult>> = Vec::new();
        for (ranking, hit) in top.score_docs.iter().enumerate().skip(options.offset) {
            let doc = searcher
                .doc(hit.doc)
                .map_err(|e| unavailable(format!("Could not load document {}", hit.doc))(e))?;
            results.push(self.reconstructor.rebuild(&doc, ranking, hit.score)?);
        }

        debug!(
            "Found {} document(s) matching {query}, returning {}",
            top.total_hits,
            results.len()
        );
        Ok(ResultSet::new(
            top.total_hits,
            options.offset,
            Some(query),
            results,
        ))
    }

    fn resolve_default_fields(
        &self,
        explicit: Option<&[String]>,
        type_hint: Option<&str>,
        reader: &IndexReader,
    ) -> Vec<String> {
        if let Some(fields) = explicit.filter(|fields| !fields.is_empty()) {
            return fields.to_vec();
        }
        if let Some(type_name) = type_hint {
            let fields = self.types().default_fields(type_name);
            if !fields.is_empty() {
                return fields;
            }
        }
        fields_present(reader)
    }

    /// Parse free text against `default_fields`, requiring every clause.
    pub fn prepare_query(&self, text: &str, default_fields: &[String]) -> Result<Query> {
        let keyword: Arc<dyn Analyzer> = Arc::new(KeywordAnalyzer::new());
        let parser =
            QueryParser::new(default_fields.to_vec()).with_analyzer(self.lifecycle.analyzer());
        let parser = PRIVATE_FIELD_NAMES.iter().fold(parser, |parser, field| {
            parser.with_field_analyzer(*field, keyword.clone())
        });
        parser.parse(text)
    }

    /// Application fields present in the index.
    pub fn fields_present(&self) -> Result<Vec<String>> {
        let reader = self.lifecycle.acquire_reader()?;
        Ok(fields_present(&reader))
    }

    /// Whether any document has the field, internal fields included.
    pub fn is_field_present(&self, field: &str) -> Result<bool> {
        Ok(self.lifecycle.acquire_reader()?.field_names().contains(field))
    }

    /// Stored fields of a document by internal id.
    pub fn document(&self, doc: DocId) -> Result<Document> {
        self.lifecycle.acquire_reader()?.document(doc)
    }
}

fn fields_present(reader: &IndexReader) -> Vec<String> {
    reader
        .field_names()
        .into_iter()
        .filter(|name| !is_internal_field(name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IndexConfig;
    use crate::index::Document;
    use crate::registry::ResourceRegistry;

    fn executor(name: &str) -> QueryExecutor {
        let lifecycle = Arc::new(IndexLifecycle::new(
            ResourceRegistry::shared(),
            IndexConfig::memory(name),
        ));
        {
            let writer = lifecycle.acquire_writer().unwrap();
            let mut writer = writer.lock();
            for (id, title, body) in [
                ("1", "alpha case", "first body"),
                ("2", "beta case", "second body"),
                ("3", "gamma", "third case"),
            ] {
                writer
                    .add_document(
                        Document::new()
                            .add_keyword("_id", id)
                            .add_keyword("_type", "Doc")
                            .add_text("title", title)
                            .add_keyword("_sort-title", title)
                            .add_text("body", body),
                    )
                    .unwrap();
            }
            writer.commit().unwrap();
        }
        QueryExecutor::new(lifecycle, Arc::new(TypeRegistry::new()))
    }

    #[test]
    fn test_sort_spec() {
        assert!(SortSpec::Relevance.to_sort().is_relevance());
        assert!(SortSpec::field("  ", true).to_sort().is_relevance());
        assert_eq!(
            SortSpec::field("title", true).to_sort(),
            Sort::by_field("_sort-title", true)
        );
    }

    #[test]
    fn test_fields_present_excludes_internal() {
        let executor = executor("fields");
        assert_eq!(executor.fields_present().unwrap(), vec!["body", "title"]);
        assert!(executor.is_field_present("_id").unwrap());
        assert!(!executor.is_field_present("author").unwrap());
    }

    #[test]
    fn test_default_fields_fall_back_to_index() {
        let executor = executor("fallback");
        let results = executor.search(SearchOptions::text("case")).unwrap();
        assert_eq!(results.size(), 3);
        assert_eq!(results.size(), results.count());
    }

    #[test]
    fn test_explicit_default_fields() {
        let executor = executor("explicit");
        let results = executor
            .search(SearchOptions::text("case").with_default_fields(["title"]))
            .unwrap();
        assert_eq!(results.size(), 2);
    }

    #[test]
    fn test_window_and_sort() {
        let executor = executor("window");
        let options = SearchOptions::query(Query::MatchAll)
            .with_sort(SortSpec::field("title", false))
            .with_offset(1)
            .with_limit(1);
        let results = executor.search(options).unwrap();
        assert_eq!(results.size(), 3);
        assert_eq!(results.count(), 1);
        assert_eq!(results.offset(), 1);
        let hit = results.get(0).unwrap();
        assert_eq!(hit.ranking(), 1);
        assert_eq!(hit.stored_field("title"), Some("beta case"));
        // The sortable twin never reaches results.
        assert_eq!(hit.stored_field("_sort-title"), None);
    }

    #[test]
    fn test_offset_past_end() {
        let executor = executor("past-end");
        let results = executor
            .search(SearchOptions::text("case").with_offset(10))
            .unwrap();
        assert!(results.is_empty());
        assert_eq!(results.size(), 3);
    }

    #[test]
    fn test_filter_and_document() {
        let executor = executor("filter");
        let results = executor
            .search(SearchOptions::text("case").with_filter(Query::term("_id", "2")))
            .unwrap();
        assert_eq!(results.count(), 1);
        assert_eq!(results.get(0).unwrap().stored_field("title"), Some("beta case"));
        assert_eq!(executor.document(0).unwrap().get("title"), Some("alpha case"));
    }

    #[test]
    fn test_syntax_error() {
        let executor = executor("syntax");
        let err = executor.search(SearchOptions::text("(case")).unwrap_err();
        assert!(matches!(err, crate::error::SearchableError::QuerySyntax(_)));
    }
}
