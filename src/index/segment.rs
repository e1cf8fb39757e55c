//! Immutable segments.
//!
//! A segment file holds the full field list of every document written into
//! it. Postings are rebuilt in memory when the segment is loaded, so a
//! loaded segment no longer depends on its file.

use std::collections::BTreeSet;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::analysis::{Analyzer, KeywordAnalyzer, Token};
use crate::error::Result;
use crate::index::document::{Document, Field};
use crate::index::meta::segment_file_name;
use crate::storage::Storage;

/// Gap inserted between two values of the same field so phrases never span them.
const POSITION_GAP: u32 = 100;

/// Occurrences of one term in one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Posting {
    pub doc: u32,
    pub positions: Vec<u32>,
}

impl Posting {
    pub fn freq(&self) -> usize {
        self.positions.len()
    }
}

fn analyze_field(field: &Field, analyzer: &dyn Analyzer, keyword: &KeywordAnalyzer) -> Vec<Token> {
    if field.tokenized {
        analyzer.analyze(&field.value)
    } else {
        keyword.analyze(&field.value)
    }
}

/// Whether an unindexed document would match `field:text` once indexed.
pub fn document_has_term(doc: &Document, field: &str, text: &str, analyzer: &dyn Analyzer) -> bool {
    let keyword = KeywordAnalyzer::new();
    doc.fields()
        .iter()
        .filter(|f| f.indexed && f.name == field)
        .any(|f| {
            analyze_field(f, analyzer, &keyword)
                .iter()
                .any(|token| token.text == text)
        })
}

#[derive(Serialize, Deserialize)]
struct SegmentFile {
    docs: Vec<Document>,
}

type TermPostings = AHashMap<String, Vec<Posting>>;

#[derive(Debug)]
pub struct SegmentReader {
    name: String,
    docs: Vec<Document>,
    postings: AHashMap<String, TermPostings>,
    field_lengths: AHashMap<String, Vec<u32>>,
    field_names: BTreeSet<String>,
}

impl SegmentReader {
    /// Persist documents as a new segment file.
    pub fn write(storage: &dyn Storage, name: &str, docs: &[Document]) -> Result<()> {
        #[derive(Serialize)]
        struct SegmentFileRef<'a> {
            docs: &'a [Document],
        }
        let bytes = serde_json::to_vec(&SegmentFileRef { docs })?;
        storage.write_all(&segment_file_name(name), &bytes)
    }

    /// Load a segment file, analyzing tokenized fields with `analyzer`.
    pub fn load(storage: &dyn Storage, name: &str, analyzer: &dyn Analyzer) -> Result<Self> {
        let bytes = storage.read_all(&segment_file_name(name))?;
        let file: SegmentFile = serde_json::from_slice(&bytes)?;
        Ok(Self::from_documents(name, file.docs, analyzer))
    }

    pub fn from_documents(
        name: impl Into<String>,
        docs: Vec<Document>,
        analyzer: &dyn Analyzer,
    ) -> Self {
        let keyword = KeywordAnalyzer::new();
        let mut postings: AHashMap<String, TermPostings> = AHashMap::new();
        let mut field_lengths: AHashMap<String, Vec<u32>> = AHashMap::new();
        let mut field_names = BTreeSet::new();

        for (doc_num, doc) in docs.iter().enumerate() {
            let doc_num = doc_num as u32;
            let mut next_position: AHashMap<&str, u32> = AHashMap::new();

            for field in doc.fields() {
                field_names.insert(field.name.clone());
                if !field.indexed {
                    continue;
                }

                let tokens = analyze_field(field, analyzer, &keyword);
                let base = next_position.get(field.name.as_str()).copied().unwrap_or(0);

                let lengths = field_lengths
                    .entry(field.name.clone())
                    .or_insert_with(|| vec![0; docs.len()]);
                lengths[doc_num as usize] += tokens.len() as u32;

                let terms = postings.entry(field.name.clone()).or_default();
                let mut last = base;
                for token in tokens {
                    let position = base + token.position;
                    last = position;
                    let list = terms.entry(token.text).or_default();
                    match list.last_mut() {
                        Some(posting) if posting.doc == doc_num => posting.positions.push(position),
                        _ => list.push(Posting {
                            doc: doc_num,
                            positions: vec![position],
                        }),
                    }
                }
                next_position.insert(field.name.as_str(), last + POSITION_GAP);
            }
        }

        Self {
            name: name.into(),
            docs,
            postings,
            field_lengths,
            field_names,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_doc(&self) -> u32 {
        self.docs.len() as u32
    }

    pub fn docs(&self) -> &[Document] {
        &self.docs
    }

    pub fn document(&self, doc: u32) -> Option<&Document> {
        self.docs.get(doc as usize)
    }

    /// Postings for a term, sorted by doc.
    pub fn postings(&self, field: &str, term: &str) -> &[Posting] {
        self.postings
            .get(field)
            .and_then(|terms| terms.get(term))
            .map(|list| list.as_slice())
            .unwrap_or(&[])
    }

    pub fn doc_freq(&self, field: &str, term: &str) -> usize {
        self.postings(field, term).len()
    }

    /// Number of tokens the field contributed to a document.
    pub fn field_length(&self, field: &str, doc: u32) -> u32 {
        self.field_lengths
            .get(field)
            .and_then(|lengths| lengths.get(doc as usize))
            .copied()
            .unwrap_or(0)
    }

    pub fn field_names(&self) -> &BTreeSet<String> {
        &self.field_names
    }
}
