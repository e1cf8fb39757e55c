//! Search results.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;

use crate::indexer::Searchable;
use crate::query::Query;

/// Position, relevance and stored fields of one hit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultInfo {
    /// Absolute, 0-based position of the hit in the full match set.
    pub ranking: usize,
    pub score: f32,
    /// Stored application fields; internal fields are never included.
    pub stored_fields: BTreeMap<String, String>,
}

/// An object rebuilt from a hit.
///
/// Types registered in a [`crate::metadata::TypeRegistry`] implement this
/// trait; hits of any other type come back as [`GenericResult`].
pub trait SearchResult: Send + Sync + fmt::Debug {
    fn info(&self) -> &ResultInfo;

    fn info_mut(&mut self) -> &mut ResultInfo;

    /// The identifier-carrying view of this result, if it has one.
    fn as_searchable_mut(&mut self) -> Option<&mut dyn Searchable> {
        None
    }

    fn as_any(&self) -> &dyn Any;

    fn ranking(&self) -> usize {
        self.info().ranking
    }

    fn score(&self) -> f32 {
        self.info().score
    }

    fn stored_fields(&self) -> &BTreeMap<String, String> {
        &self.info().stored_fields
    }

    fn stored_field(&self, name: &str) -> Option<&str> {
        self.info().stored_fields.get(name).map(String::as_str)
    }
}

impl<'a> dyn SearchResult + 'a {
    pub fn downcast_ref<T: SearchResult + 'static>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    pub fn is<T: SearchResult + 'static>(&self) -> bool {
        self.as_any().is::<T>()
    }
}

/// Untyped container for hits whose type is not registered.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenericResult {
    id: Option<String>,
    type_name: Option<String>,
    info: ResultInfo,
}

impl GenericResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw identifier, as indexed.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn set_id(&mut self, id: Option<String>) {
        self.id = id;
    }

    /// Type name recorded in the index, even when it could not be resolved.
    pub fn type_name(&self) -> Option<&str> {
        self.type_name.as_deref()
    }

    pub fn set_type_name(&mut self, type_name: Option<String>) {
        self.type_name = type_name;
    }
}

impl SearchResult for GenericResult {
    fn info(&self) -> &ResultInfo {
        &self.info
    }

    fn info_mut(&mut self) -> &mut ResultInfo {
        &mut self.info
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A window over the full set of matches of one search.
#[derive(Debug, Default)]
pub struct ResultSet {
    total: usize,
    offset: usize,
    query: Option<Query>,
    results: Vec<Box<dyn SearchResult>>,
}

impl ResultSet {
    pub fn new(
        total: usize,
        offset: usize,
        query: Option<Query>,
        results: Vec<Box<dyn SearchResult>>,
    ) -> Self {
        ResultSet {
            total,
            offset,
            query,
            results,
        }
    }

    /// Total number of matches, beyond this window included.
    pub fn size(&self) -> usize {
        self.total
    }

    /// Number of results materialized in this window.
    pub fn count(&self) -> usize {
        self.results.len()
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// The query that was executed.
    pub fn query(&self) -> Option<&Query> {
        self.query.as_ref()
    }

    /// Whether this window holds no results.
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn results(&self) -> &[Box<dyn SearchResult>] {
        &self.results
    }

    pub fn get(&self, index: usize) -> Option<&dyn SearchResult> {
        self.results.get(index).map(|r| r.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn SearchResult> {
        self.results.iter().map(|r| r.as_ref())
    }

    pub fn into_results(self) -> Vec<Box<dyn SearchResult>> {
        self.results
    }
}

impl IntoIterator for ResultSet {
    type Item = Box<dyn SearchResult>;
    type IntoIter = std::vec::IntoIter<Box<dyn SearchResult>>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_set_window() {
        let mut hit = GenericResult::new();
        hit.info_mut().ranking = 5;
        hit.set_id(Some("42".into()));
        let set = ResultSet::new(7, 5, Some(Query::MatchAll), vec![Box::new(hit)]);

        assert_eq!(set.size(), 7);
        assert_eq!(set.count(), 1);
        assert_eq!(set.offset(), 5);
        assert!(!set.is_empty());
        assert_eq!(set.query(), Some(&Query::MatchAll));

        let first = set.get(0).unwrap();
        assert_eq!(first.ranking(), 5);
        assert_eq!(first.downcast_ref::<GenericResult>().unwrap().id(), Some("42"));
    }

    #[test]
    fn test_downcast_borrowed_from_local_set() {
        let set = ResultSet::new(1, 0, None, vec![Box::new(GenericResult::new())]);
        let generic = set.iter().filter(|r| r.is::<GenericResult>()).count();
        assert_eq!(generic, 1);
        assert!(set.get(0).and_then(|r| r.downcast_ref::<GenericResult>()).is_some());
    }

    #[test]
    fn test_empty_window() {
        let set = ResultSet::new(3, 10, None, Vec::new());
        assert!(set.is_empty());
        assert_eq!(set.size(), 3);
        assert_eq!(set.iter().count(), 0);
    }
}
