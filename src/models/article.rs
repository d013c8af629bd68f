use serde::{Deserialize, Serialize};

/// A news outlet as reported by the headlines API.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Source {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

impl Source {
    pub fn named(id: Option<&str>, name: &str) -> Self {
        Self {
            id: id.map(str::to_string),
            name: name.to_string(),
            ..Default::default()
        }
    }
}

/// A display-ready article.
///
/// `id` is always non-empty once the article has been through the
/// normalizer or `ensure_id`. Likes, bookmarks and comments are never
/// stored here; they live in the social store and are merged on read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub content: Option<String>,
    pub content_text: Option<String>,
    pub author: Option<String>,
    pub source: Option<Source>,
    pub image_url: Option<String>,
    pub url: Option<String>,
    pub published_at: Option<String>,
    pub category: Option<String>,
}

impl Article {
    pub fn source_name(&self) -> &str {
        self.source
            .as_ref()
            .map(|s| s.name.as_str())
            .filter(|n| !n.is_empty())
            .unwrap_or("Unknown source")
    }

    pub fn title_matches(&self, needle_lowercase: &str) -> bool {
        self.title.to_lowercase().contains(needle_lowercase)
    }
}
