use std::collections::HashSet;
use std::sync::Arc;

use url::Url;

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::{Article, Source};

use super::api::{ApiArticle, EverythingQuery, HeadlinesQuery, NewsApi, SourcesQuery};
use super::identity::derive_article_id;

const PLACEHOLDER_IMAGE: &str = "https://via.placeholder.com/400x300?text=News+Article";

/// Headlines split the way the home screen shows them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeadlineFeed {
    pub trending: Vec<Article>,
    pub latest: Vec<Article>,
}

impl HeadlineFeed {
    pub fn len(&self) -> usize {
        self.trending.len() + self.latest.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn all(&self) -> impl Iterator<Item = &Article> {
        self.trending.iter().chain(self.latest.iter())
    }
}

/// Only articles with a usable absolute image URL are shown.
pub fn is_display_eligible(article: &ApiArticle) -> bool {
    let Some(image) = article.image_url.as_deref().map(str::trim) else {
        return false;
    };
    if image.is_empty() || image.eq_ignore_ascii_case("null") {
        return false;
    }
    let lower = image.to_ascii_lowercase();
    if !(lower.starts_with("http://") || lower.starts_with("https://")) {
        return false;
    }
    Url::parse(image)
        .map(|u| u.host_str().is_some_and(|h| !h.is_empty()))
        .unwrap_or(false)
}

/// Convert an upstream article into the display model. Engagement counters
/// from upstream are dropped here.
fn to_article(raw: ApiArticle, category: Option<&str>) -> Article {
    let id = raw
        .id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| {
            derive_article_id(raw.url.as_deref(), &raw.title, raw.published_at.as_deref())
        });

    // Try content first, then fall back to description
    let content_text = raw
        .content
        .as_deref()
        .or(raw.description.as_deref())
        .and_then(|html| html2text::from_read(html.as_bytes(), 80).ok())
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty());

    Article {
        id,
        title: raw.title.trim().to_string(),
        description: raw.description,
        content: raw.content,
        content_text,
        author: raw.author,
        source: raw.source,
        image_url: raw.image_url.map(|u| u.trim().to_string()),
        url: raw.url,
        published_at: raw.published_at,
        category: raw.category.or_else(|| category.map(str::to_string)),
    }
}

/// Filter, identify and clean one page of upstream results.
pub fn normalize(items: Vec<ApiArticle>, category: Option<&str>) -> Vec<Article> {
    items
        .into_iter()
        .filter(|a| !a.title.trim().is_empty())
        .filter(is_display_eligible)
        .map(|a| to_article(a, category))
        .collect()
}

/// Appends `incoming` to `acc`, skipping titles already present.
fn extend_unique(acc: &mut Vec<Article>, seen: &mut HashSet<String>, incoming: Vec<Article>) {
    for article in incoming {
        if seen.insert(article.title.clone()) {
            acc.push(article);
        }
    }
}

/// Twenty synthetic articles so the rest of the app stays usable offline.
pub fn placeholder_articles(count: usize) -> Vec<Article> {
    (1..=count)
        .map(|index| Article {
            id: format!("article_{}", index),
            title: format!("Sample News Article {}", index),
            description: Some("This is a sample news article description.".to_string()),
            content: Some("Full content of the article goes here...".to_string()),
            content_text: Some("Full content of the article goes here...".to_string()),
            author: Some(format!("Author {}", index)),
            source: Some(Source::named(Some(&format!("source_{}", index)), "BBC News")),
            image_url: Some(PLACEHOLDER_IMAGE.to_string()),
            url: Some(format!("https://example.com/article_{}", index)),
            published_at: Some("2024-01-20T10:00:00Z".to_string()),
            category: Some("General".to_string()),
        })
        .collect()
}

#[derive(Clone)]
pub struct FeedNormalizer {
    api: Arc<dyn NewsApi>,
    country: String,
    language: String,
    min_articles: usize,
    trending_count: usize,
    primary_page_size: u32,
    fallback_page_size: u32,
    search_page_size: u32,
    fallback_categories: Vec<String>,
}

impl FeedNormalizer {
    pub fn new(api: Arc<dyn NewsApi>, config: &Config) -> Self {
        Self {
            api,
            country: config.country.clone(),
            language: config.language.clone(),
            min_articles: config.min_articles,
            trending_count: config.trending_count.min(config.min_articles),
            primary_page_size: config.primary_page_size,
            fallback_page_size: config.fallback_page_size,
            search_page_size: config.search_page_size,
            fallback_categories: config.fallback_categories.clone(),
        }
    }

    fn split(&self, mut articles: Vec<Article>, cap: bool) -> HeadlineFeed {
        if cap {
            articles.truncate(self.min_articles);
        }
        let at = self.trending_count.min(articles.len());
        let latest = articles.split_off(at);
        HeadlineFeed {
            trending: articles,
            latest,
        }
    }

    async fn headlines_page(&self, category: Option<&str>, page_size: u32) -> Result<Vec<Article>> {
        let query = HeadlinesQuery {
            country: self.country.clone(),
            category: category.map(str::to_string),
            page_size,
        };
        let response = self.api.top_headlines(&query).await?.ensure_ok()?;
        Ok(normalize(response.articles, category))
    }

    /// Fetch enough eligible headlines to fill the home screen, broadening
    /// across fallback categories when the first page is too thin.
    pub async fn fetch_headlines(&self) -> Result<HeadlineFeed> {
        let first = self
            .headlines_page(None, self.primary_page_size)
            .await
            .map_err(|e| match e {
                AppError::Upstream(_) => e,
                other => AppError::Upstream(other.to_string()),
            })?;

        let mut seen = HashSet::new();
        let mut articles = Vec::new();
        extend_unique(&mut articles, &mut seen, first);

        if articles.len() >= self.min_articles {
            return Ok(self.split(articles, true));
        }

        tracing::debug!(
            "Only {} eligible headlines, broadening across categories",
            articles.len()
        );

        for category in &self.fallback_categories {
            if articles.len() >= self.min_articles {
                break;
            }
            match self
                .headlines_page(Some(category), self.fallback_page_size)
                .await
            {
                Ok(page) => {
                    tracing::debug!("{} eligible headlines from {}", page.len(), category);
                    extend_unique(&mut articles, &mut seen, page);
                }
                Err(e) => {
                    tracing::debug!("Skipping category {}: {}", category, e);
                }
            }
        }

        if articles.len() >= self.min_articles {
            Ok(self.split(articles, true))
        } else {
            tracing::info!(
                "Proceeding with {} headlines, short of {}",
                articles.len(),
                self.min_articles
            );
            Ok(self.split(articles, false))
        }
    }

    /// Like `fetch_headlines`, but an upstream failure yields the
    /// placeholder feed alongside the error instead of nothing.
    pub async fn load_or_placeholder(&self) -> (HeadlineFeed, Option<AppError>) {
        match self.fetch_headlines().await {
            Ok(feed) => (feed, None),
            Err(e) => {
                tracing::warn!("Headlines unavailable, using placeholders: {}", e);
                let count = self.min_articles.max(self.trending_count).max(1);
                (self.split(placeholder_articles(count), true), Some(e))
            }
        }
    }

    /// Full-text search upstream. Results are re-filtered by title because
    /// upstream relevance also matches bodies.
    pub async fn search_upstream(&self, term: &str) -> Result<Vec<Article>> {
        let needle = term.trim().to_lowercase();
        let query = EverythingQuery::new(needle.clone(), self.search_page_size);
        let response = self.api.everything(&query).await?.ensure_ok()?;

        Ok(normalize(response.articles, None)
            .into_iter()
            .filter(|a| a.title_matches(&needle))
            .collect())
    }

    pub async fn fetch_sources(&self, category: Option<&str>) -> Result<Vec<Source>> {
        let query = SourcesQuery {
            category: category.map(str::to_string),
            language: self.language.clone(),
            country: None,
        };
        Ok(self.api.sources(&query).await?.ensure_ok()?.sources)
    }
}
