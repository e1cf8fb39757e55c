//! Query execution over an [`IndexReader`].
//!
//! Scoring is a classic TF-IDF similarity:
//!
//! ```text
//! score(t, d) = sqrt(tf) * idf(t)^2 / sqrt(field_length)
//! idf(t)      = 1 + ln(max_doc / (doc_freq + 1))
//! ```
//!
//! Boolean queries multiply the summed clause scores by a coordination
//! factor (matched scoring clauses / scoring clauses). A phrase uses the
//! sum of its terms' idf.

use std::cmp::Ordering;
use std::sync::Arc;

use ahash::AHashMap;

use crate::error::Result;
use crate::index::DocId;
use crate::index::document::Document;
use crate::index::reader::{IndexReader, LeafReader};
use crate::index::segment::Posting;
use crate::query::{BooleanQuery, Occur, PhraseQuery, Query, Sort, SortKey, TermQuery};

/// A matching document and its relevance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreDoc {
    pub doc: DocId,
    pub score: f32,
}

/// The best hits of a search plus the total number of matches.
#[derive(Debug, Clone, Default)]
pub struct TopDocs {
    pub total_hits: usize,
    pub score_docs: Vec<ScoreDoc>,
}

impl TopDocs {
    pub fn is_empty(&self) -> bool {
        self.score_docs.is_empty()
    }
}

type Scores = AHashMap<DocId, f32>;

/// Executes queries against one reader.
#[derive(Debug, Clone)]
pub struct IndexSearcher {
    reader: Arc<IndexReader>,
}

impl IndexSearcher {
    pub fn new(reader: Arc<IndexReader>) -> Self {
        IndexSearcher { reader }
    }

    pub fn reader(&self) -> &Arc<IndexReader> {
        &self.reader
    }

    /// Run `query`, keep hits also matching `filter`, order them by `sort`
    /// and return the first `n`.
    pub fn search(
        &self,
        query: &Query,
        filter: Option<&Query>,
        n: usize,
        sort: &Sort,
    ) -> Result<TopDocs> {
        let mut scores = self.score(query);
        if let Some(filter) = filter {
            let allowed = self.score(filter);
            scores.retain(|doc, _| allowed.contains_key(doc));
        }

        let total_hits = scores.len();
        let mut hits: Vec<ScoreDoc> = scores
            .into_iter()
            .map(|(doc, score)| ScoreDoc { doc, score })
            .collect();
        hits.sort_by(|a, b| self.compare(a, b, sort));
        hits.truncate(n);

        Ok(TopDocs {
            total_hits,
            score_docs: hits,
        })
    }

    /// Number of documents matching `query`.
    pub fn count(&self, query: &Query) -> usize {
        self.score(query).len()
    }

    /// Stored fields of a hit.
    pub fn doc(&self, doc: DocId) -> Result<Document> {
        self.reader.document(doc)
    }

    fn compare(&self, a: &ScoreDoc, b: &ScoreDoc, sort: &Sort) -> Ordering {
        for field in &sort.fields {
            let ordering = match &field.key {
                SortKey::Score => b.score.total_cmp(&a.score),
                SortKey::Doc => a.doc.cmp(&b.doc),
                SortKey::Field(name) => {
                    match (
                        self.reader.sort_value(a.doc, name),
                        self.reader.sort_value(b.doc, name),
                    ) {
                        (Some(x), Some(y)) if field.reverse => y.cmp(x),
                        (Some(x), Some(y)) => x.cmp(y),
                        (Some(_), None) => Ordering::Less,
                        (None, Some(_)) => Ordering::Greater,
                        (None, None) => Ordering::Equal,
                    }
                }
            };
            let ordering = match field.key {
                SortKey::Field(_) => ordering,
                _ if field.reverse => ordering.reverse(),
                _ => ordering,
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        a.doc.cmp(&b.doc)
    }

    fn score(&self, query: &Query) -> Scores {
        match query {
            Query::Term(q) => self.score_term(q),
            Query::Phrase(q) => self.score_phrase(q),
            Query::Boolean(q) => self.score_boolean(q),
            Query::MatchAll => self.live_docs().map(|doc| (doc, 1.0)).collect(),
        }
    }

    fn live_docs(&self) -> impl Iterator<Item = DocId> + '_ {
        self.reader.leaves().iter().flat_map(|leaf| {
            (0..leaf.segment.max_doc())
                .filter(move |local| !leaf.is_deleted(*local))
                .map(move |local| leaf.base + local)
        })
    }

    fn idf(&self, field: &str, term: &str) -> f32 {
        let doc_freq = self.reader.doc_freq(field, term) as f32;
        let max_doc = self.reader.max_doc().max(1) as f32;
        1.0 + (max_doc / (doc_freq + 1.0)).ln()
    }

    fn weight(freq: usize, idf: f32, leaf: &LeafReader, field: &str, local: u32) -> f32 {
        let length = leaf.segment.field_length(field, local).max(1) as f32;
        (freq as f32).sqrt() * idf * idf / length.sqrt()
    }

    fn score_term(&self, query: &TermQuery) -> Scores {
        let term = &query.term;
        let idf = self.idf(&term.field, &term.text);
        let mut scores = Scores::new();
        for leaf in self.reader.leaves() {
            for posting in leaf.segment.postings(&term.field, &term.text) {
                if leaf.is_deleted(posting.doc) {
                    continue;
                }
                let score = Self::weight(posting.freq(), idf, leaf, &term.field, posting.doc);
                scores.insert(leaf.base + posting.doc, score);
            }
        }
        scores
    }

    fn score_phrase(&self, query: &PhraseQuery) -> Scores {
        match query.terms.as_slice() {
            [] => return Scores::new(),
            [single] => return self.score_term(&TermQuery::new(&query.field, single)),
            _ => {}
        }

        let idf: f32 = query
            .terms
            .iter()
            .map(|term| self.idf(&query.field, term))
            .sum();
        let mut scores = Scores::new();
        for leaf in self.reader.leaves() {
            let lists: Vec<&[Posting]> = query
                .terms
                .iter()
                .map(|term| leaf.segment.postings(&query.field, term))
                .collect();

            for first in lists[0] {
                if leaf.is_deleted(first.doc) {
                    continue;
                }
                let mut rest = Vec::with_capacity(lists.len() - 1);
                for list in &lists[1..] {
                    match list.binary_search_by_key(&first.doc, |p| p.doc) {
                        Ok(i) => rest.push(&list[i].positions),
                        Err(_) => break,
                    }
                }
                if rest.len() != lists.len() - 1 {
                    continue;
                }

                let freq = first
                    .positions
                    .iter()
                    .filter(|&&start| {
                        rest.iter().enumerate().all(|(offset, positions)| {
                            positions.binary_search(&(start + offset as u32 + 1)).is_ok()
                        })
                    })
                    .count();
                if freq > 0 {
                    let score = Self::weight(freq, idf, leaf, &query.field, first.doc);
                    scores.insert(leaf.base + first.doc, score);
                }
            }
        }
        scores
    }

    fn score_boolean(&self, query: &BooleanQuery) -> Scores {
        let mut required: Option<Scores> = None;
        let mut optional: Vec<Scores> = Vec::new();
        let mut prohibited: Vec<Scores> = Vec::new();

        for clause in &query.clauses {
            let scores = self.score(&clause.query);
            match clause.occur {
                Occur::Must => {
                    required = Some(match required.take() {
                        None => scores,
                        Some(mut acc) => {
                            acc.retain(|doc, _| scores.contains_key(doc));
                            for (doc, score) in acc.iter_mut() {
                                *score += scores[doc];
                            }
                            acc
                        }
                    });
                }
                Occur::Should => optional.push(scores),
                Occur::MustNot => prohibited.push(scores),
            }
        }

        let must_count = query
            .clauses
            .iter()
            .filter(|c| c.occur == Occur::Must)
            .count();
        let scoring_clauses = must_count + optional.len();
        if scoring_clauses == 0 {
            return Scores::new();
        }

        // (sum, matched clauses)
        let mut combined: AHashMap<DocId, (f32, usize)> = match required {
            Some(required) => required
                .into_iter()
                .map(|(doc, score)| (doc, (score, must_count)))
                .collect(),
            None => {
                let mut union = AHashMap::new();
                for scores in &optional {
                    for doc in scores.keys() {
                        union.insert(*doc, (0.0, 0));
                    }
                }
                union
            }
        };

        for scores in &optional {
            for (doc, entry) in combined.iter_mut() {
                if let Some(score) = scores.get(doc) {
                    entry.0 += score;
                    entry.1 += 1;
                }
            }
        }

        for scores in &prohibited {
            combined.retain(|doc, _| !scores.contains_key(doc));
        }

        combined
            .into_iter()
            .map(|(doc, (sum, matched))| {
                let coord = matched as f32 / scoring_clauses as f32;
                (doc, sum * coord)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::writer::{IndexWriter, IndexWriterConfig, OpenMode};
    use crate::query::SortField;
    use crate::storage::Storage;
    use crate::storage::memory::{MemoryStorage, MemoryStorageConfig};

    fn searcher(docs: Vec<Document>) -> IndexSearcher {
        let storage: Arc<dyn Storage> =
            Arc::new(MemoryStorage::new(MemoryStorageConfig::default()));
        let mut writer =
            IndexWriter::open(storage.clone(), IndexWriterConfig::default(), OpenMode::Create)
                .unwrap();
        for doc in docs {
            writer.add_document(doc).unwrap();
        }
        writer.close().unwrap();
        IndexSearcher::new(Arc::new(IndexReader::open(storage).unwrap()))
    }

    fn sample() -> IndexSearcher {
        searcher(vec![
            Document::new()
                .add_text("title", "alpha case")
                .add_keyword("_sort-title", "alpha case"),
            Document::new()
                .add_text("title", "beta case")
                .add_keyword("_sort-title", "beta case"),
            Document::new().add_text("title", "gamma ray burst"),
        ])
    }

    fn docs(top: &TopDocs) -> Vec<DocId> {
        top.score_docs.iter().map(|d| d.doc).collect()
    }

    #[test]
    fn test_term_query() {
        let searcher = sample();
        let top = searcher
            .search(&Query::term("title", "case"), None, 10, &Sort::relevance())
            .unwrap();
        assert_eq!(top.total_hits, 2);
        // Equal scores fall back to index order.
        assert_eq!(docs(&top), vec![0, 1]);
        assert!(top.score_docs[0].score > 0.0);
    }

    #[test]
    fn test_boolean_must_and_must_not() {
        let searcher = sample();
        let query: Query = BooleanQuery::new()
            .with(Query::term("title", "case"), Occur::Must)
            .with(Query::term("title", "alpha"), Occur::MustNot)
            .into();
        let top = searcher.search(&query, None, 10, &Sort::relevance()).unwrap();
        assert_eq!(docs(&top), vec![1]);

        let only_negative: Query = BooleanQuery::new()
            .with(Query::term("title", "alpha"), Occur::MustNot)
            .into();
        assert_eq!(searcher.count(&only_negative), 0);
    }

    #[test]
    fn test_should_ranks_more_matches_first() {
        let searcher = sample();
        let query: Query = BooleanQuery::new()
            .with(Query::term("title", "beta"), Occur::Should)
            .with(Query::term("title", "case"), Occur::Should)
            .into();
        let top = searcher.search(&query, None, 10, &Sort::relevance()).unwrap();
        assert_eq!(top.total_hits, 2);
        assert_eq!(top.score_docs[0].doc, 1);
    }

    #[test]
    fn test_phrase_query() {
        let searcher = sample();
        let hit = Query::phrase("title", vec!["ray".into(), "burst".into()]);
        let miss = Query::phrase("title", vec!["burst".into(), "ray".into()]);
        assert_eq!(searcher.count(&hit), 1);
        assert_eq!(searcher.count(&miss), 0);
    }

    #[test]
    fn test_field_sort_and_filter() {
        let searcher = sample();
        let sort = Sort::by_field("_sort-title", true);
        let top = searcher.search(&Query::MatchAll, None, 10, &sort).unwrap();
        // Missing sort values come last.
        assert_eq!(docs(&top), vec![1, 0, 2]);

        let filter = Query::term("title", "alpha");
        let top = searcher
            .search(&Query::term("title", "case"), Some(&filter), 10, &Sort::relevance())
            .unwrap();
        assert_eq!(docs(&top), vec![0]);
    }

    #[test]
    fn test_truncation_keeps_total() {
        let searcher = sample();
        let sort = Sort::new(vec![SortField::doc()]);
        let top = searcher.search(&Query::MatchAll, None, 2, &sort).unwrap();
        assert_eq!(top.total_hits, 3);
        assert_eq!(docs(&top), vec![0, 1]);

        let none = searcher.search(&Query::MatchAll, None, 0, &sort).unwrap();
        assert_eq!(none.total_hits, 3);
        assert!(none.is_empty());
    }
}
