//! Query and sort types understood by the searcher.

pub mod parser;

use std::fmt;

pub use parser::QueryParser;

/// A field name paired with one indexed term.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Term {
    pub field: String,
    pub text: String,
}

impl Term {
    pub fn new(field: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            text: text.into(),
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.field, self.text)
    }
}

/// Matches documents containing an exact term.
#[derive(Debug, Clone, PartialEq)]
pub struct TermQuery {
    pub term: Term,
}

impl TermQuery {
    pub fn new(field: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            term: Term::new(field, text),
        }
    }
}

/// Matches documents containing the terms at consecutive positions.
#[derive(Debug, Clone, PartialEq)]
pub struct PhraseQuery {
    pub field: String,
    pub terms: Vec<String>,
}

impl PhraseQuery {
    pub fn new(field: impl Into<String>, terms: Vec<String>) -> Self {
        Self {
            field: field.into(),
            terms,
        }
    }
}

/// Occurrence requirements for boolean clauses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occur {
    /// The clause must match (equivalent to AND).
    Must,
    /// The clause should match (equivalent to OR).
    Should,
    /// The clause must not match (equivalent to NOT).
    MustNot,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BooleanClause {
    pub query: Query,
    pub occur: Occur,
}

impl BooleanClause {
    pub fn new(query: Query, occur: Occur) -> Self {
        Self { query, occur }
    }
}

/// Combines sub-queries with boolean logic.
///
/// With at least one `Must` clause, `Should` clauses only add score. Without
/// one, at least one `Should` clause has to match. A query made only of
/// `MustNot` clauses matches nothing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BooleanQuery {
    pub clauses: Vec<BooleanClause>,
}

impl BooleanQuery {
    pub fn new() -> Self {
        Self {
            clauses: Vec::new(),
        }
    }

    pub fn add(&mut self, query: Query, occur: Occur) {
        self.clauses.push(BooleanClause::new(query, occur));
    }

    pub fn with(mut self, query: Query, occur: Occur) -> Self {
        self.add(query, occur);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }
}

/// An executable query.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    Term(TermQuery),
    Phrase(PhraseQuery),
    Boolean(BooleanQuery),
    MatchAll,
}

impl Query {
    pub fn term(field: impl Into<String>, text: impl Into<String>) -> Self {
        Query::Term(TermQuery::new(field, text))
    }

    pub fn phrase(field: impl Into<String>, terms: Vec<String>) -> Self {
        Query::Phrase(PhraseQuery::new(field, terms))
    }
}

impl From<TermQuery> for Query {
    fn from(q: TermQuery) -> Self {
        Query::Term(q)
    }
}

impl From<PhraseQuery> for Query {
    fn from(q: PhraseQuery) -> Self {
        Query::Phrase(q)
    }
}

impl From<BooleanQuery> for Query {
    fn from(q: BooleanQuery) -> Self {
        Query::Boolean(q)
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Query::Term(q) => write!(f, "{}", q.term),
            Query::Phrase(q) => write!(f, "{}:\"{}\"", q.field, q.terms.join(" ")),
            Query::MatchAll => write!(f, "*:*"),
            Query::Boolean(q) => {
                let mut first = true;
                for clause in &q.clauses {
                    if !first {
                        write!(f, " ")?;
                    }
                    first = false;
                    let prefix = match clause.occur {
                        Occur::Must => "+",
                        Occur::MustNot => "-",
                        Occur::Should => "",
                    };
                    match clause.query {
                        Query::Boolean(_) => write!(f, "{prefix}({})", clause.query)?,
                        _ => write!(f, "{prefix}{}", clause.query)?,
                    }
                }
                Ok(())
            }
        }
    }
}

/// What a sort field compares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortKey {
    /// Relevance, best first.
    Score,
    /// Index order, oldest first.
    Doc,
    /// First value of a field, compared as strings; missing values sort last.
    Field(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortField {
    pub key: SortKey,
    pub reverse: bool,
}

impl SortField {
    pub fn score() -> Self {
        Self {
            key: SortKey::Score,
            reverse: false,
        }
    }

    pub fn doc() -> Self {
        Self {
            key: SortKey::Doc,
            reverse: false,
        }
    }

    pub fn field(name: impl Into<String>, reverse: bool) -> Self {
        Self {
            key: SortKey::Field(name.into()),
            reverse,
        }
    }
}

/// An ordered list of sort fields. Remaining ties fall back to index order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub fields: Vec<SortField>,
}

impl Sort {
    pub fn new(fields: Vec<SortField>) -> Self {
        Self { fields }
    }

    pub fn relevance() -> Self {
        Self::new(vec![SortField::score()])
    }

    pub fn index_order() -> Self {
        Self::new(vec![SortField::doc()])
    }

    pub fn by_field(name: impl Into<String>, reverse: bool) -> Self {
        Self::new(vec![SortField::field(name, reverse)])
    }

    pub fn is_relevance(&self) -> bool {
        self.fields.len() == 1 && self.fields[0] == SortField::score()
    }
}

impl Default for Sort {
    fn default() -> Self {
        Self::relevance()
    }
}
