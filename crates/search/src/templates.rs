//! Intelligent Search Templates (spec §4.10): curated named templates
//! loaded from an embedded TOML asset, plus custom registrations persisted
//! through the Relational Store.

use crate::error::{Result, SearchError};
use cortex_relational_store::{RelationalStore, Table};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateBackend {
    Semantic,
    Keyword,
    Structural,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchTemplate {
    pub name: String,
    pub description: String,
    pub backend: TemplateBackend,
    /// `{param}` placeholders substituted from the caller's params map;
    /// any placeholder left unfilled is dropped from the rendered query.
    pub query_template: String,
}

impl SearchTemplate {
    #[must_use]
    pub fn build_query(&self, params: &HashMap<String, String>) -> String {
        let mut rendered = String::with_capacity(self.query_template.len());
        let mut chars = self.query_template.chars().peekable();
        while let Some(c) = chars.next() {
            if c == '{' {
                let mut name = String::new();
                let mut closed = false;
                for inner in chars.by_ref() {
                    if inner == '}' {
                        closed = true;
                        break;
                    }
                    name.push(inner);
                }
                if closed {
                    if let Some(value) = params.get(&name) {
                        rendered.push_str(value);
                    }
                    continue;
                }
                rendered.push('{');
                rendered.push_str(&name);
            } else {
                rendered.push(c);
            }
        }
        rendered.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() || !self.name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(SearchError::InvalidTemplate(format!("invalid template name: {:?}", self.name)));
        }
        if self.description.trim().is_empty() {
            return Err(SearchError::InvalidTemplate("description must not be empty".to_string()));
        }
        if self.query_template.trim().is_empty() {
            return Err(SearchError::InvalidTemplate("query_template must not be empty".to_string()));
        }
        if self.query_template.matches('{').count() != self.query_template.matches('}').count() {
            return Err(SearchError::InvalidTemplate("unbalanced placeholder braces".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct TemplateFile {
    template: Vec<SearchTemplate>,
}

static CURATED: Lazy<Vec<SearchTemplate>> = Lazy::new(|| {
    let raw: TemplateFile =
        toml::from_str(include_str!("../assets/templates.toml")).expect("bundled templates.toml must parse");
    raw.template
});

/// Curated templates plus a user-registered, persisted custom set.
pub struct TemplateRegistry {
    custom: RwLock<HashMap<String, SearchTemplate>>,
    relational: Arc<dyn RelationalStore>,
}

impl TemplateRegistry {
    #[must_use]
    pub fn new(relational: Arc<dyn RelationalStore>) -> Self {
        Self { custom: RwLock::new(HashMap::new()), relational }
    }

    /// Looks up `name` among curated templates first, then the in-memory
    /// custom set; falls back to the Relational Store on a cold miss.
    pub async fn get(&self, name: &str) -> Result<Option<SearchTemplate>> {
        if let Some(curated) = CURATED.iter().find(|t| t.name == name) {
            return Ok(Some(curated.clone()));
        }
        if let Some(custom) = self.custom.read().await.get(name).cloned() {
            return Ok(Some(custom));
        }
        if let Some(value) = self.relational.get(Table::Templates, name).await? {
            let template: SearchTemplate = serde_json::from_value(value)?;
            self.custom.write().await.insert(template.name.clone(), template.clone());
            return Ok(Some(template));
        }
        Ok(None)
    }

    /// Validates, persists, and caches a custom template registration.
    pub async fn register(&self, template: SearchTemplate) -> Result<()> {
        template.validate()?;
        if CURATED.iter().any(|t| t.name == template.name) {
            return Err(SearchError::InvalidTemplate(format!(
                "{:?} collides with a curated template name",
                template.name
            )));
        }
        let value = serde_json::to_value(&template)?;
        self.relational.put(Table::Templates, &template.name, value).await?;
        self.custom.write().await.insert(template.name.clone(), template);
        Ok(())
    }

    /// Templates whose name, description, or rendered keywords overlap the
    /// query text, ranked by overlap count (heuristic matching, spec §4.10).
    pub async fn match_heuristic(&self, query: &str) -> Vec<SearchTemplate> {
        let query_lower = query.to_lowercase();
        let query_words: Vec<&str> = query_lower.split_whitespace().collect();

        let mut candidates: Vec<SearchTemplate> = CURATED.clone();
        candidates.extend(self.custom.read().await.values().cloned());

        let mut scored: Vec<(usize, SearchTemplate)> = candidates
            .into_iter()
            .map(|t| {
                let haystack = format!("{} {} {}", t.name, t.description, t.query_template).to_lowercase();
                let score = query_words.iter().filter(|w| haystack.contains(*w)).count();
                (score, t)
            })
            .filter(|(score, _)| *score > 0)
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.name.cmp(&b.1.name)));
        scored.into_iter().map(|(_, t)| t).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cortex_relational_store::SqliteRelationalStore;

    async fn registry() -> TemplateRegistry {
        let store = SqliteRelationalStore::open_in_memory().await.unwrap();
        TemplateRegistry::new(Arc::new(store))
    }

    #[test]
    fn curated_templates_load_and_parse() {
        assert!(CURATED.len() >= 5);
        assert!(CURATED.iter().any(|t| t.name == "api_endpoints"));
    }

    #[test]
    fn build_query_substitutes_params_and_drops_unfilled() {
        let template = CURATED.iter().find(|t| t.name == "authentication").unwrap();
        let mut params = HashMap::new();
        params.insert("detail".to_string(), "oauth".to_string());
        let rendered = template.build_query(&params);
        assert!(rendered.contains("oauth"));
        assert!(!rendered.contains('{'));
    }

    #[tokio::test]
    async fn custom_template_registration_round_trips() {
        let registry = registry().await;
        let custom = SearchTemplate {
            name: "feature_flags".to_string(),
            description: "Feature flag checks".to_string(),
            backend: TemplateBackend::Keyword,
            query_template: "feature flag toggle {flag}".to_string(),
        };
        registry.register(custom).await.unwrap();
        let fetched = registry.get("feature_flags").await.unwrap();
        assert!(fetched.is_some());
    }

    #[tokio::test]
    async fn registration_rejects_a_curated_name_collision() {
        let registry = registry().await;
        let collision = SearchTemplate {
            name: "api_endpoints".to_string(),
            description: "duplicate".to_string(),
            backend: TemplateBackend::Keyword,
            query_template: "x".to_string(),
        };
        assert!(registry.register(collision).await.is_err());
    }

    #[tokio::test]
    async fn heuristic_match_ranks_by_overlap() {
        let registry = registry().await;
        let matches = registry.match_heuristic("database model migration").await;
        assert_eq!(matches[0].name, "database_models");
    }
}
