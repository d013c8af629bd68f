use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use url::Url;

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::Source;

/// An article exactly as the headlines API returns it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ApiArticle {
    pub id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub content: Option<String>,
    pub author: Option<String>,
    pub source: Option<Source>,
    #[serde(rename = "urlToImage")]
    pub image_url: Option<String>,
    pub url: Option<String>,
    pub published_at: Option<String>,
    pub category: Option<String>,
    // Some mirrors of the API carry engagement counters. They are never
    // trusted; the social store owns those numbers.
    pub views: Option<u32>,
    pub likes: Option<u32>,
    pub comments: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ArticlesResponse {
    pub status: String,
    pub total_results: Option<u32>,
    pub articles: Vec<ApiArticle>,
    pub code: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SourcesResponse {
    pub status: String,
    pub sources: Vec<Source>,
    pub code: Option<String>,
    pub message: Option<String>,
}

fn check_status(status: &str, code: Option<&str>, message: Option<&str>) -> Result<()> {
    if status.eq_ignore_ascii_case("ok") {
        return Ok(());
    }
    let detail = message
        .or(code)
        .map(str::to_string)
        .unwrap_or_else(|| format!("status \"{}\"", status));
    Err(AppError::Upstream(detail))
}

impl ArticlesResponse {
    pub fn ok(articles: Vec<ApiArticle>) -> Self {
        Self {
            status: "ok".to_string(),
            total_results: Some(articles.len() as u32),
            articles,
            ..Default::default()
        }
    }

    pub fn ensure_ok(self) -> Result<Self> {
        check_status(&self.status, self.code.as_deref(), self.message.as_deref())?;
        Ok(self)
    }
}

impl SourcesResponse {
    pub fn ok(sources: Vec<Source>) -> Self {
        Self {
            status: "ok".to_string(),
            sources,
            ..Default::default()
        }
    }

    pub fn ensure_ok(self) -> Result<Self> {
        check_status(&self.status, self.code.as_deref(), self.message.as_deref())?;
        Ok(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EverythingQuery {
    pub q: String,
    pub sort_by: String,
    pub page_size: u32,
}

impl EverythingQuery {
    pub fn new(q: impl Into<String>, page_size: u32) -> Self {
        Self {
            q: q.into(),
            sort_by: "publishedAt".to_string(),
            page_size,
        }
    }

    fn params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("q", self.q.clone()),
            ("sortBy", self.sort_by.clone()),
            ("pageSize", self.page_size.to_string()),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadlinesQuery {
    pub country: String,
    pub category: Option<String>,
    pub page_size: u32,
}

impl HeadlinesQuery {
    fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("country", self.country.clone())];
        if let Some(category) = &self.category {
            params.push(("category", category.clone()));
        }
        params.push(("pageSize", self.page_size.to_string()));
        params
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcesQuery {
    pub category: Option<String>,
    pub language: String,
    pub country: Option<String>,
}

impl SourcesQuery {
    fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(category) = &self.category {
            params.push(("category", category.clone()));
        }
        params.push(("language", self.language.clone()));
        if let Some(country) = &self.country {
            params.push(("country", country.clone()));
        }
        params
    }
}

/// Read side of the headlines service.
#[async_trait]
pub trait NewsApi: Send + Sync {
    async fn everything(&self, query: &EverythingQuery) -> Result<ArticlesResponse>;
    async fn top_headlines(&self, query: &HeadlinesQuery) -> Result<ArticlesResponse>;
    async fn sources(&self, query: &SourcesQuery) -> Result<SourcesResponse>;
}

#[derive(Clone)]
pub struct NewsApiClient {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
}

impl NewsApiClient {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("newsdesk/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: Self::parse_base_url(&config.api_base_url)?,
            api_key: config.api_key.clone(),
        })
    }

    /// Url::join drops the last path segment unless it ends in a slash.
    fn parse_base_url(raw: &str) -> Result<Url> {
        let mut raw = raw.trim().to_string();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        Url::parse(&raw).map_err(|e| AppError::Config(format!("api_base_url: {}", e)))
    }

    pub(crate) fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| AppError::Config(format!("endpoint {}: {}", path, e)))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&'static str, String)],
    ) -> Result<T> {
        let url = self.endpoint(path)?;
        let mut request = self.client.get(url).query(params);
        if let Some(key) = &self.api_key {
            request = request.header("X-Api-Key", key);
        }

        let response = request.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;

        if !status.is_success() {
            // Error bodies carry {status, code, message}
            let message = serde_json::from_slice::<ArticlesResponse>(&bytes)
                .ok()
                .and_then(|body| body.message)
                .unwrap_or_else(|| format!("HTTP {}", status));
            tracing::debug!("{} failed: {}", path, message);
            return Err(AppError::Upstream(message));
        }

        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl NewsApi for NewsApiClient {
    async fn everything(&self, query: &EverythingQuery) -> Result<ArticlesResponse> {
        self.get_json::<ArticlesResponse>("everything", &query.params())
            .await?
            .ensure_ok()
    }

    async fn top_headlines(&self, query: &HeadlinesQuery) -> Result<ArticlesResponse> {
        self.get_json::<ArticlesResponse>("top-headlines", &query.params())
            .await?
            .ensure_ok()
    }

    async fn sources(&self, query: &SourcesQuery) -> Result<SourcesResponse> {
        self.get_json::<SourcesResponse>("top-headlines/sources", &query.params())
            .await?
            .ensure_ok()
    }
}
