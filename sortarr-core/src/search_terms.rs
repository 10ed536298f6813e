use serde::{Deserialize, Serialize};

use crate::parser::ParsedFilename;

/// Search terms for one file, most specific first.
///
/// Every term is a lower-cased word prefix of the previous one, ending at a
/// single word.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SearchQuery {
    terms: Vec<String>,
}

impl SearchQuery {
    pub fn from_title(title: &str) -> Self {
        let lowered = title.to_lowercase();
        let tokens: Vec<&str> = lowered.split_whitespace().collect();

        let terms = (1..=tokens.len())
            .rev()
            .map(|len| tokens[..len].join(" "))
            .take_while(|term| !term.is_empty())
            .collect();

        Self { terms }
    }

    pub fn from_parsed(parsed: &ParsedFilename) -> Self {
        Self::from_title(&parsed.guessed_title)
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.terms.iter().map(String::as_str)
    }
}

/// Number of words in a term, used as its specificity.
pub fn term_specificity(term: &str) -> usize {
    term.split_whitespace().count()
}
