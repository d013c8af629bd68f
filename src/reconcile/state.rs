use crate::models::{Article, Author, Comment, Topic};

use super::signal::Signal;

/// Everything the screens observe.
#[derive(Debug, Default)]
pub struct ViewState {
    pub trending: Signal<Vec<Article>>,
    pub latest: Signal<Vec<Article>>,
    pub search_results: Signal<Vec<Article>>,
    pub search_query: Signal<String>,
    pub is_loading: Signal<bool>,
    pub error: Signal<Option<String>>,

    pub selected_article: Signal<Option<Article>>,
    pub article_like_count: Signal<u32>,
    pub article_comment_count: Signal<u32>,
    pub is_article_liked: Signal<bool>,
    pub is_article_bookmarked: Signal<bool>,

    pub bookmarked_articles: Signal<Vec<Article>>,
    pub comments: Signal<Vec<Comment>>,
    pub topics: Signal<Vec<Topic>>,
    pub authors: Signal<Vec<Author>>,
}

impl ViewState {
    /// Trending followed by latest.
    pub fn loaded_articles(&self) -> Vec<Article> {
        let mut all = self.trending.get();
        all.extend(self.latest.get());
        all
    }

    pub fn selected_id(&self) -> Option<String> {
        self.selected_article.get().map(|a| a.id)
    }

    pub(crate) fn is_selected(&self, article_id: &str) -> bool {
        self.selected_id().is_some_and(|id| id == article_id)
    }

    pub(crate) fn reset_selection_counters(&self) {
        self.article_like_count.set(0);
        self.article_comment_count.set(0);
        self.is_article_liked.set(false);
        self.is_article_bookmarked.set(false);
    }
}
