//! Query parsing and expansion: stages (a) and (b) of the pipeline
//! (spec §4.7).

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const SYNONYMS_TOML: &str = include_str!("../assets/synonyms.toml");
const ACRONYMS_TOML: &str = include_str!("../assets/acronyms.toml");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Find,
    List,
    Show,
    Explain,
    Compare,
    Recommend,
}

const INTENT_VERBS: &[(&str, Intent)] = &[
    ("find", Intent::Find),
    ("search", Intent::Find),
    ("locate", Intent::Find),
    ("list", Intent::List),
    ("enumerate", Intent::List),
    ("show", Intent::Show),
    ("display", Intent::Show),
    ("explain", Intent::Explain),
    ("describe", Intent::Explain),
    ("compare", Intent::Compare),
    ("diff", Intent::Compare),
    ("recommend", Intent::Recommend),
    ("suggest", Intent::Recommend),
];

const STOPWORDS: &[&str] = &[
    "a", "an", "the", "of", "in", "on", "for", "to", "is", "are", "how", "what", "where", "and", "or",
    "with", "does", "do", "this", "that", "me", "my", "i", "we", "our",
];

const FILE_EXTENSIONS: &[&str] = &[
    "rs", "py", "js", "ts", "tsx", "jsx", "go", "java", "rb", "c", "h", "cpp", "hpp", "json", "toml",
    "yaml", "yml", "md", "sql",
];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryEntities {
    pub files: Vec<String>,
    pub symbols: Vec<String>,
    pub concepts: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedQuery {
    pub intent: Intent,
    pub keywords: Vec<String>,
    pub entities: QueryEntities,
    pub confidence: f32,
}

/// Classifies intent by verb lexicon and splits the query into file-like,
/// symbol-like, and concept tokens.
#[must_use]
pub fn parse(query: &str) -> ParsedQuery {
    let lower = query.to_lowercase();
    let intent = INTENT_VERBS
        .iter()
        .find(|(verb, _)| lower.split_whitespace().any(|w| w == *verb))
        .map(|(_, intent)| *intent)
        .unwrap_or(Intent::Find);

    let mut entities = QueryEntities::default();
    let mut keywords = Vec::new();

    for raw in query.split_whitespace() {
        let token = raw.trim_matches(|c: char| !c.is_ascii_alphanumeric() && c != '.' && c != '_' && c != '*');
        if token.is_empty() {
            continue;
        }

        if is_file_like(token) {
            entities.files.push(token.to_string());
            continue;
        }
        if is_symbol_like(token) {
            entities.symbols.push(token.to_string());
            continue;
        }

        let word = token.to_lowercase();
        if STOPWORDS.contains(&word.as_str()) || INTENT_VERBS.iter().any(|(v, _)| *v == word) {
            continue;
        }
        entities.concepts.push(word.clone());
        keywords.push(word);
    }

    let extracted = entities.files.len() + entities.symbols.len() + entities.concepts.len();
    let confidence = if extracted == 0 {
        0.0
    } else {
        (extracted as f32 / (extracted as f32 + 1.0)).min(1.0)
    };

    ParsedQuery { intent, keywords, entities, confidence }
}

fn is_file_like(token: &str) -> bool {
    if let Some(dot) = token.rfind('.') {
        let ext = &token[dot + 1..];
        if FILE_EXTENSIONS.contains(&ext) {
            return true;
        }
    }
    token.contains('*') || token.contains('/')
}

fn is_symbol_like(token: &str) -> bool {
    if token.ends_with("()") {
        return true;
    }
    let is_camel = token.chars().any(|c| c.is_uppercase()) && token.chars().any(|c| c.is_lowercase());
    let is_snake = token.contains('_') && token.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    (is_camel || is_snake) && token.len() > 2
}

static SYNONYMS: Lazy<HashMap<String, Vec<String>>> =
    Lazy::new(|| toml::from_str(SYNONYMS_TOML).expect("assets/synonyms.toml must parse"));

static ACRONYMS: Lazy<HashMap<String, Vec<String>>> =
    Lazy::new(|| toml::from_str(ACRONYMS_TOML).expect("assets/acronyms.toml must parse"));

/// Expands each keyword against the curated synonym/acronym tables, up to
/// `cap` extra terms appended to the original query.
#[must_use]
pub fn expand(query: &str, keywords: &[String], cap: usize) -> String {
    let mut extra = Vec::new();
    for keyword in keywords {
        if let Some(synonyms) = SYNONYMS.get(keyword) {
            extra.extend(synonyms.iter().cloned());
        }
        if let Some(expansions) = ACRONYMS.get(keyword) {
            extra.extend(expansions.iter().cloned());
        }
    }
    extra.truncate(cap);

    if extra.is_empty() {
        query.to_string()
    } else {
        format!("{query} {}", extra.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_find_intent_and_extracts_a_file() {
        let parsed = parse("find the error handling in api.rs");
        assert_eq!(parsed.intent, Intent::Find);
        assert!(parsed.entities.files.contains(&"api.rs".to_string()));
        assert!(parsed.confidence > 0.0);
    }

    #[test]
    fn extracts_snake_case_and_camel_case_symbols() {
        let parsed = parse("explain handle_error and UserService");
        assert_eq!(parsed.intent, Intent::Explain);
        assert!(parsed.entities.symbols.contains(&"handle_error".to_string()));
        assert!(parsed.entities.symbols.contains(&"UserService".to_string()));
    }

    #[test]
    fn empty_query_has_zero_confidence() {
        let parsed = parse("the of in");
        assert_eq!(parsed.confidence, 0.0);
    }

    #[test]
    fn expansion_respects_the_cap() {
        let keywords = vec!["auth".to_string(), "db".to_string()];
        let expanded = expand("auth db", &keywords, 2);
        let extra_terms = expanded.split_whitespace().count() - 2;
        assert!(extra_terms <= 2);
    }
}
