use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::models::Source;

use super::api::{
    ApiArticle, ArticlesResponse, EverythingQuery, HeadlinesQuery, NewsApi, SourcesQuery,
    SourcesResponse,
};

enum Reply<T> {
    Ok(T),
    Fail(String),
}

/// A canned `NewsApi` for offline runs and tests.
///
/// Headlines are keyed by category (`None` is the uncategorised page),
/// searches by query string, sources by category. Unscripted requests
/// answer with an empty `ok` page. Every request is recorded.
#[derive(Default)]
pub struct ScriptedNewsApi {
    headlines: Mutex<HashMap<Option<String>, Reply<Vec<ApiArticle>>>>,
    searches: Mutex<HashMap<String, Reply<Vec<ApiArticle>>>>,
    sources: Mutex<HashMap<Option<String>, Reply<Vec<Source>>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedNewsApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_headlines(self, category: Option<&str>, articles: Vec<ApiArticle>) -> Self {
        lock(&self.headlines).insert(category.map(str::to_string), Reply::Ok(articles));
        self
    }

    pub fn failing_headlines(self, category: Option<&str>, message: &str) -> Self {
        lock(&self.headlines).insert(category.map(str::to_string), Reply::Fail(message.to_string()));
        self
    }

    pub fn with_search(self, q: &str, articles: Vec<ApiArticle>) -> Self {
        lock(&self.searches).insert(q.to_string(), Reply::Ok(articles));
        self
    }

    pub fn failing_search(self, q: &str, message: &str) -> Self {
        lock(&self.searches).insert(q.to_string(), Reply::Fail(message.to_string()));
        self
    }

    pub fn with_sources(self, category: Option<&str>, sources: Vec<Source>) -> Self {
        lock(&self.sources).insert(category.map(str::to_string), Reply::Ok(sources));
        self
    }

    pub fn failing_sources(self, category: Option<&str>, message: &str) -> Self {
        lock(&self.sources).insert(category.map(str::to_string), Reply::Fail(message.to_string()));
        self
    }

    /// Requests seen so far, e.g. `headlines:business` or `everything:rust`.
    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    fn record(&self, call: String) {
        lock(&self.calls).push(call);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    // A panicked test thread must not wedge the others.
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn answer<T: Clone>(reply: Option<&Reply<T>>, empty: T) -> Result<T> {
    match reply {
        Some(Reply::Ok(value)) => Ok(value.clone()),
        Some(Reply::Fail(message)) => Err(AppError::Upstream(message.clone())),
        None => Ok(empty),
    }
}

#[async_trait]
impl NewsApi for ScriptedNewsApi {
    async fn everything(&self, query: &EverythingQuery) -> Result<ArticlesResponse> {
        self.record(format!("everything:{}", query.q));
        let articles = answer(lock(&self.searches).get(&query.q), Vec::new())?;
        Ok(ArticlesResponse::ok(articles))
    }

    async fn top_headlines(&self, query: &HeadlinesQuery) -> Result<ArticlesResponse> {
        self.record(format!(
            "headlines:{}",
            query.category.as_deref().unwrap_or("*")
        ));
        let articles = answer(lock(&self.headlines).get(&query.category), Vec::new())?;
        Ok(ArticlesResponse::ok(articles))
    }

    async fn sources(&self, query: &SourcesQuery) -> Result<SourcesResponse> {
        self.record(format!("sources:{}", query.category.as_deref().unwrap_or("*")));
        let sources = answer(lock(&self.sources).get(&query.category), Vec::new())?;
        Ok(SourcesResponse::ok(sources))
    }
}
