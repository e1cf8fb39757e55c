//! Text analysis: turning field values into indexed terms.

use unicode_segmentation::UnicodeSegmentation;

/// A single term produced by an analyzer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    /// Position of the token within the field value, starting at 0.
    pub position: u32,
}

/// Splits text into tokens.
pub trait Analyzer: Send + Sync + std::fmt::Debug {
    fn analyze(&self, text: &str) -> Vec<Token>;

    fn name(&self) -> &'static str;
}

/// Unicode word segmentation followed by lower-casing.
#[derive(Debug, Clone, Default)]
pub struct StandardAnalyzer;

impl StandardAnalyzer {
    pub fn new() -> Self {
        Self
    }
}

impl Analyzer for StandardAnalyzer {
    fn analyze(&self, text: &str) -> Vec<Token> {
        text.unicode_words()
            .enumerate()
            .map(|(position, word)| Token {
                text: word.to_lowercase(),
                position: position as u32,
            })
            .collect()
    }

    fn name(&self) -> &'static str {
        "standard"
    }
}

/// Emits the whole value as a single token.
#[derive(Debug, Clone, Default)]
pub struct KeywordAnalyzer;

impl KeywordAnalyzer {
    pub fn new() -> Self {
        Self
    }
}

impl Analyzer for KeywordAnalyzer {
    fn analyze(&self, text: &str) -> Vec<Token> {
        vec![Token {
            text: text.to_string(),
            position: 0,
        }]
    }

    fn name(&self) -> &'static str {
        "keyword"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_lowercases_and_splits() {
        let tokens = StandardAnalyzer::new().analyze("Alpha, Beta-case!");
        let texts: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["alpha", "beta", "case"]);
        assert_eq!(tokens[2].position, 2);
    }

    #[test]
    fn test_keyword_keeps_value() {
        let tokens = KeywordAnalyzer::new().analyze("Doc:42");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].text, "Doc:42");
    }
}
