use futures::future::join_all;
use sha2::{Digest, Sha256};

use crate::models::{Author, Topic};

use super::Reconciler;

const TOPIC_CATEGORIES: [&str; 7] = [
    "business",
    "entertainment",
    "general",
    "health",
    "science",
    "sports",
    "technology",
];

/// Only listed when the API actually has sources for them.
const EXTRA_TOPIC_CATEGORIES: [&str; 3] = ["politics", "lifestyle", "art"];

const MAX_AUTHORS: usize = 20;

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn default_topics() -> Vec<Topic> {
    TOPIC_CATEGORIES
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let name = capitalize(c);
            Topic::new((i + 1).to_string(), name.clone(), format!("{} news", name))
        })
        .collect()
}

fn default_authors() -> Vec<Author> {
    [
        ("1", "BBC News", "1.5M"),
        ("2", "CNN", "900k"),
        ("3", "Reuters", "1.2M"),
        ("4", "The New York Times", "2.1M"),
        ("5", "The Guardian", "1.8M"),
        ("6", "Associated Press", "1.1M"),
        ("7", "The Washington Post", "1.3M"),
    ]
    .into_iter()
    .map(|(id, name, followers)| Author::new(id, name, followers))
    .collect()
}

/// Stand-in follower figure; the API has none. Stable per source id.
fn follower_display(id: &str) -> String {
    let digest = Sha256::digest(id.as_bytes());
    let n = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]) % 4900 + 100;
    format!("{}k", n)
}

impl Reconciler {
    /// Build the topic list from per-category source listings.
    pub async fn load_topics(&self) {
        let normalizer = &self.inner.normalizer;
        let primary = join_all(TOPIC_CATEGORIES.iter().map(|c| normalizer.fetch_sources(Some(*c)))).await;
        let extra =
            join_all(EXTRA_TOPIC_CATEGORIES.iter().map(|c| normalizer.fetch_sources(Some(*c)))).await;

        let mut topics = Vec::new();
        for (category, result) in TOPIC_CATEGORIES.iter().zip(primary) {
            let name = capitalize(category);
            match result {
                Ok(sources) if !sources.is_empty() => {
                    let description = sources[0]
                        .description
                        .clone()
                        .unwrap_or_else(|| format!("{} news and updates", name));
                    topics.push(Topic::new((topics.len() + 1).to_string(), name, description));
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!("Sources for {} unavailable: {}", category, e);
                    let description = format!("{} news", name);
                    topics.push(Topic::new((topics.len() + 1).to_string(), name, description));
                }
            }
        }
        for (category, result) in EXTRA_TOPIC_CATEGORIES.iter().zip(extra) {
            if let Ok(sources) = result {
                if let Some(first) = sources.first() {
                    let name = capitalize(category);
                    let description = first
                        .description
                        .clone()
                        .unwrap_or_else(|| format!("{} news", name));
                    topics.push(Topic::new((topics.len() + 1).to_string(), name, description));
                }
            }
        }

        if topics.is_empty() {
            topics = default_topics();
        }

        // Keep saves made before a reload.
        let previous = self.state().topics.get();
        for topic in &mut topics {
            topic.is_saved = previous.iter().any(|p| p.name == topic.name && p.is_saved);
        }
        self.state().topics.set(topics);
    }

    /// The first sources of an unfiltered listing, or well-known outlets if
    /// the listing is unavailable.
    pub async fn load_authors(&self) {
        let authors = match self.inner.normalizer.fetch_sources(None).await {
            Ok(sources) if !sources.is_empty() => sources
                .into_iter()
                .take(MAX_AUTHORS)
                .enumerate()
                .map(|(index, source)| {
                    let id = source
                        .id
                        .filter(|id| !id.is_empty())
                        .unwrap_or_else(|| index.to_string());
                    let followers = follower_display(&id);
                    Author::new(id, source.name, followers)
                })
                .collect(),
            Ok(_) => default_authors(),
            Err(e) => {
                tracing::debug!("Sources unavailable, using default authors: {}", e);
                default_authors()
            }
        };

        let previous = self.state().authors.get();
        let authors = authors
            .into_iter()
            .map(|mut author| {
                author.is_following = previous.iter().any(|p| p.id == author.id && p.is_following);
                author
            })
            .collect();
        self.state().authors.set(authors);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::feed::ScriptedNewsApi;
    use crate::models::Source;
    use crate::social::{MemorySocialStore, Session};
    use std::sync::Arc;

    fn reconciler(api: ScriptedNewsApi) -> Reconciler {
        Reconciler::new(
            Arc::new(api),
            Arc::new(MemorySocialStore::new(Session::new())),
            &Config::default(),
        )
    }

    fn source(id: Option<&str>, name: &str, description: Option<&str>) -> Source {
        Source {
            description: description.map(str::to_string),
            ..Source::named(id, name)
        }
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("business"), "Business");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn test_follower_display_is_stable() {
        assert_eq!(follower_display("bbc-news"), follower_display("bbc-news"));
        assert!(follower_display("cnn").ends_with('k'));
    }

    #[tokio::test]
    async fn test_topics_from_sources() {
        let api = ScriptedNewsApi::new()
            .with_sources(Some("business"), vec![source(Some("b"), "Biz", Some("Markets daily"))])
            .with_sources(Some("health"), vec![source(Some("h"), "Health", None)])
            .failing_sources(Some("science"), "down")
            .with_sources(Some("politics"), vec![source(Some("p"), "Pol", Some("Capitol"))]);
        let r = reconciler(api);

        r.load_topics().await;

        let topics = r.state().topics.get();
        let names: Vec<_> = topics.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Business", "Health", "Science", "Politics"]);
        assert_eq!(topics[0].description.as_deref(), Some("Markets daily"));
        assert_eq!(topics[1].description.as_deref(), Some("Health news and updates"));
        assert_eq!(topics[2].description.as_deref(), Some("Science news"));
        assert_eq!(topics[3].id, "4");
    }

    #[tokio::test]
    async fn test_topics_default_when_nothing_available() {
        let r = reconciler(ScriptedNewsApi::new());
        r.load_topics().await;
        let topics = r.state().topics.get();
        assert_eq!(topics.len(), 7);
        assert_eq!(topics[6].name, "Technology");
    }

    #[tokio::test]
    async fn test_topic_saves_survive_reload() {
        let r = reconciler(ScriptedNewsApi::new());
        r.load_topics().await;
        r.toggle_topic_save("1");
        r.load_topics().await;
        assert!(r.state().topics.get()[0].is_saved);
    }

    #[tokio::test]
    async fn test_authors_from_sources() {
        let sources: Vec<Source> = (0..25)
            .map(|i| source(Some(&format!("s{}", i)), &format!("Outlet {}", i), None))
            .chain(std::iter::once(source(None, "No id", None)))
            .collect();
        let r = reconciler(ScriptedNewsApi::new().with_sources(None, sources));

        r.load_authors().await;

        let authors = r.state().authors.get();
        assert_eq!(authors.len(), MAX_AUTHORS);
        assert_eq!(authors[0].id, "s0");
        assert_eq!(authors[0].logo, None);
        assert!(authors[0].followers.is_some());
    }

    #[tokio::test]
    async fn test_authors_fall_back_to_defaults() {
        let r = reconciler(ScriptedNewsApi::new().failing_sources(None, "down"));
        r.load_authors().await;
        let authors = r.state().authors.get();
        assert_eq!(authors.len(), 7);
        assert_eq!(authors[0].name, "BBC News");
    }
}
