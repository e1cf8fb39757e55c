//! Parser for free-text search criteria.

use std::sync::Arc;

use ahash::AHashMap;
use pest::Parser;
use pest::iterators::{Pair, Pairs};
use pest_derive::Parser;

use crate::analysis::{Analyzer, StandardAnalyzer};
use crate::error::{Result, SearchableError};
use crate::query::{BooleanClause, BooleanQuery, Occur, Query};

#[derive(Parser)]
#[grammar = "query/parser.pest"]
struct QueryStringParser;

/// How adjacent clauses without an explicit conjunction combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DefaultOperator {
    /// Every clause is required.
    #[default]
    And,
    /// Any clause may match.
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Conjunction {
    None,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Modifier {
    None,
    Required,
    Prohibited,
}

/// Parses criteria such as `alpha title:"beta gamma" -delta` into a [`Query`].
///
/// Unqualified terms are searched in every default field: each becomes a
/// disjunction with one clause per field. Terms run through the analyzer of
/// their field, so a term that analyzes to several tokens becomes a phrase
/// and one that analyzes to nothing is dropped.
///
/// # Example
///
/// ```
/// use searchable::query::QueryParser;
///
/// let parser = QueryParser::new(vec!["title".into(), "body".into()]);
/// let query = parser.parse("alpha -beta").unwrap();
/// assert_eq!(
///     query.to_string(),
///     "+(title:alpha body:alpha) -(title:beta body:beta)"
/// );
/// ```
#[derive(Debug, Clone)]
pub struct QueryParser {
    default_fields: Vec<String>,
    default_operator: DefaultOperator,
    analyzer: Arc<dyn Analyzer>,
    field_analyzers: AHashMap<String, Arc<dyn Analyzer>>,
}

impl QueryParser {
    /// A parser over `default_fields` that requires every clause by default.
    pub fn new(default_fields: Vec<String>) -> Self {
        QueryParser {
            default_fields,
            default_operator: DefaultOperator::And,
            analyzer: Arc::new(StandardAnalyzer::new()),
            field_analyzers: AHashMap::new(),
        }
    }

    pub fn with_default_operator(mut self, operator: DefaultOperator) -> Self {
        self.default_operator = operator;
        self
    }

    /// Analyzer for fields without a specific one.
    pub fn with_analyzer(mut self, analyzer: Arc<dyn Analyzer>) -> Self {
        self.analyzer = analyzer;
        self
    }

    pub fn with_field_analyzer(
        mut self,
        field: impl Into<String>,
        analyzer: Arc<dyn Analyzer>,
    ) -> Self {
        self.field_analyzers.insert(field.into(), analyzer);
        self
    }

    pub fn default_fields(&self) -> &[String] {
        &self.default_fields
    }

    /// Parse criteria into a query.
    ///
    /// Blank criteria and malformed syntax fail with
    /// [`SearchableError::QuerySyntax`]. Criteria whose terms all analyze to
    /// nothing yield an empty boolean query, which matches nothing.
    pub fn parse(&self, text: &str) -> Result<Query> {
        if text.trim().is_empty() {
            return Err(SearchableError::query_syntax("criteria must not be empty"));
        }

        let mut pairs = QueryStringParser::parse(Rule::query, text).map_err(|e| {
            SearchableError::query_syntax(format!("Failed to parse '{text}': {e}"))
        })?;

        let root = pairs
            .next()
            .ok_or_else(|| SearchableError::query_syntax(format!("Failed to parse '{text}'")))?;
        let query = self.parse_clauses(root.into_inner(), None)?;
        Ok(query.unwrap_or_else(|| Query::Boolean(BooleanQuery::new())))
    }

    fn parse_clauses(&self, pairs: Pairs<Rule>, field: Option<&str>) -> Result<Option<Query>> {
        let mut clauses: Vec<BooleanClause> = Vec::new();

        for pair in pairs {
            if pair.as_rule() != Rule::clause {
                continue;
            }
            let mut conjunction = Conjunction::None;
            let mut modifier = Modifier::None;
            let mut query = None;
            for inner in pair.into_inner() {
                match inner.as_rule() {
                    Rule::conjunction => conjunction = Self::parse_conjunction(inner),
                    Rule::modifier => modifier = Self::parse_modifier(inner),
                    _ => query = self.parse_primary(inner, field)?,
                }
            }
            self.add_clause(&mut clauses, conjunction, modifier, query);
        }

        Ok(match clauses.len() {
            0 => None,
            1 if clauses[0].occur != Occur::MustNot => clauses.pop().map(|c| c.query),
            _ => Some(Query::Boolean(BooleanQuery { clauses })),
        })
    }

    fn parse_conjunction(pair: Pair<Rule>) -> Conjunction {
        match pair.into_inner().next().map(|p| p.as_rule()) {
            Some(Rule::and_op) => Conjunction::And,
            Some(Rule::or_op) => Conjunction::Or,
            _ => Conjunction::None,
        }
    }

    fn parse_modifier(pair: Pair<Rule>) -> Modifier {
        match pair.into_inner().next().map(|p| p.as_rule()) {
            Some(Rule::required) => Modifier::Required,
            Some(Rule::prohibited) | Some(Rule::not_op) => Modifier::Prohibited,
            _ => Modifier::None,
        }
    }

    /// Fold one clause into the list, adjusting its predecessor for explicit
    /// conjunctions.
    fn add_clause(
        &self,
        clauses: &mut Vec<BooleanClause>,
        conjunction: Conjunction,
        modifier: Modifier,
        query: Option<Query>,
    ) {
        if let Some(last) = clauses.last_mut() {
            if last.occur != Occur::MustNot {
                if conjunction == Conjunction::And {
                    last.occur = Occur::Must;
                } else if conjunction == Conjunction::Or
                    && self.default_operator == DefaultOperator::And
                {
                    last.occur = Occur::Should;
                }
            }
        }

        let Some(query) = query else {
            return;
        };

        let prohibited = modifier == Modifier::Prohibited;
        let required = match self.default_operator {
            DefaultOperator::Or => {
                modifier == Modifier::Required || (conjunction == Conjunction::And && !prohibited)
            }
            DefaultOperator::And => !prohibited && conjunction != Conjunction::Or,
        };

        let occur = if prohibited {
            Occur::MustNot
        } else if required {
            Occur::Must
        } else {
            Occur::Should
        };
        clauses.push(BooleanClause::new(query, occur));
    }

    fn parse_primary(&self, pair: Pair<Rule>, field: Option<&str>) -> Result<Option<Query>> {
        match pair.as_rule() {
            Rule::match_all => Ok(Some(Query::MatchAll)),
            Rule::group => self.parse_clauses(pair.into_inner(), field),
            Rule::field_clause => {
                let mut inner = pair.into_inner();
                let (Some(name), Some(value)) = (inner.next(), inner.next()) else {
                    return Err(SearchableError::query_syntax("incomplete field clause"));
                };
                self.parse_primary(value, Some(name.as_str()))
            }
            Rule::phrase => {
                let text = pair
                    .into_inner()
                    .next()
                    .map(|p| unescape(p.as_str()))
                    .unwrap_or_default();
                Ok(self.text_query(&text, field))
            }
            Rule::term => Ok(self.text_query(&unescape(pair.as_str()), field)),
            rule => Err(SearchableError::query_syntax(format!(
                "unexpected {rule:?} in criteria"
            ))),
        }
    }

    /// Build the query for a term or phrase, over `field` or every default field.
    fn text_query(&self, text: &str, field: Option<&str>) -> Option<Query> {
        if let Some(field) = field {
            return self.field_query(field, text);
        }

        let mut per_field: Vec<Query> = self
            .default_fields
            .iter()
            .filter_map(|field| self.field_query(field, text))
            .collect();
        match per_field.len() {
            0 => None,
            1 => per_field.pop(),
            _ => {
                let mut disjunction = BooleanQuery::new();
                for query in per_field {
                    disjunction.add(query, Occur::Should);
                }
                Some(disjunction.into())
            }
        }
    }

    fn field_query(&self, field: &str, text: &str) -> Option<Query> {
        let analyzer = self.field_analyzers.get(field).unwrap_or(&self.analyzer);
        let mut tokens: Vec<String> = analyzer.analyze(text).into_iter().map(|t| t.text).collect();
        match tokens.len() {
            0 => None,
            1 => tokens.pop().map(|token| Query::term(field, token)),
            _ => Some(Query::phrase(field, tokens)),
        }
    }
}

fn unescape(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(escaped) = chars.next() {
                result.push(escaped);
            }
        } else {
            result.push(c);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::KeywordAnalyzer;

    fn parser() -> QueryParser {
        QueryParser::new(vec!["title".to_string()])
    }

    fn parse(text: &str) -> String {
        parser().parse(text).unwrap().to_string()
    }

    #[test]
    fn test_single_term() {
        assert_eq!(parse("Alpha"), "title:alpha");
        assert_eq!(parse("body:Alpha"), "body:alpha");
    }

    #[test]
    fn test_default_operator_is_and() {
        assert_eq!(parse("alpha beta"), "+title:alpha +title:beta");
        assert_eq!(
            QueryParser::new(vec!["title".into()])
                .with_default_operator(DefaultOperator::Or)
                .parse("alpha beta")
                .unwrap()
                .to_string(),
            "title:alpha title:beta"
        );
    }

    #[test]
    fn test_conjunctions_and_modifiers() {
        assert_eq!(parse("alpha OR beta"), "title:alpha title:beta");
        assert_eq!(parse("alpha AND beta"), "+title:alpha +title:beta");
        assert_eq!(parse("alpha -beta"), "+title:alpha -title:beta");
        assert_eq!(parse("alpha NOT beta"), "+title:alpha -title:beta");
        assert_eq!(parse("-beta"), "-title:beta");
    }

    #[test]
    fn test_phrase_and_multi_token_term() {
        assert_eq!(parse("\"Alpha Beta\""), "title:\"alpha beta\"");
        assert_eq!(parse("alpha-beta"), "title:\"alpha beta\"");
    }

    #[test]
    fn test_groups_and_field_scope() {
        assert_eq!(
            parse("gamma AND (alpha OR beta)"),
            "+title:gamma +(title:alpha title:beta)"
        );
        assert_eq!(parse("body:(alpha OR beta)"), "body:alpha body:beta");
        assert_eq!(parse("*:*"), "*:*");
    }

    #[test]
    fn test_multiple_default_fields() {
        let parser = QueryParser::new(vec!["title".into(), "body".into()]);
        assert_eq!(
            parser.parse("case").unwrap().to_string(),
            "title:case body:case"
        );
    }

    #[test]
    fn test_field_analyzer() {
        let parser = parser().with_field_analyzer("_type", Arc::new(KeywordAnalyzer::new()));
        assert_eq!(parser.parse("_type:Article").unwrap().to_string(), "_type:Article");
        assert_eq!(parser.parse("type:Article").unwrap().to_string(), "type:article");
    }

    #[test]
    fn test_nothing_to_search() {
        let query = parser().parse("!!!").unwrap_err();
        assert!(matches!(query, SearchableError::QuerySyntax(_)));
        let query = parser().parse("...").unwrap();
        assert_eq!(query, Query::Boolean(BooleanQuery::new()));
    }

    #[test]
    fn test_syntax_errors() {
        for bad in ["", "   ", "(alpha", "alpha)", "alpha AND", "title:"] {
            let err = parser().parse(bad).unwrap_err();
            assert!(
                matches!(err, SearchableError::QuerySyntax(_)),
                "expected syntax error for {bad:?}"
            );
        }
    }
}
