//! Merges the stateless headline feed with per-user social state.
//!
//! The social store is the only source of truth for likes, bookmarks and
//! comments. After every mutation the affected values are read back from it
//! instead of being adjusted locally.

mod catalog;
pub mod signal;
mod state;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use uuid::Uuid;

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::feed::normalizer::FeedNormalizer;
use crate::feed::{ensure_id, NewsApi};
use crate::models::{Article, Comment, CurrentUser, UserProfile};
use crate::social::SocialStore;

pub use signal::Signal;
pub use state::ViewState;

struct Inner {
    normalizer: FeedNormalizer,
    store: Arc<dyn SocialStore>,
    state: ViewState,
    /// Bumped on every selection; loads carry the value they started with.
    selection_epoch: AtomicU64,
    /// Held while checking the epoch and publishing selection signals.
    selection_publish: Mutex<()>,
}

/// Cheap to clone; every operation can run as its own task.
#[derive(Clone)]
pub struct Reconciler {
    inner: Arc<Inner>,
}

/// Best-effort status read: failures become the default value.
fn degrade<T: Default>(result: Result<T>, what: &str, article_id: &str) -> T {
    result.unwrap_or_else(|e| {
        tracing::debug!("Could not read {} for {}: {}", what, article_id, e);
        T::default()
    })
}

fn require_article_id(article_id: &str) -> Result<&str> {
    let trimmed = article_id.trim();
    if trimmed.is_empty() {
        return Err(AppError::InvalidInput("article id is empty".to_string()));
    }
    Ok(trimmed)
}

impl Reconciler {
    pub fn new(api: Arc<dyn NewsApi>, store: Arc<dyn SocialStore>, config: &Config) -> Self {
        Self {
            inner: Arc::new(Inner {
                normalizer: FeedNormalizer::new(api, config),
                store,
                state: ViewState::default(),
                selection_epoch: AtomicU64::new(0),
                selection_publish: Mutex::new(()),
            }),
        }
    }

    pub fn state(&self) -> &ViewState {
        &self.inner.state
    }

    fn selection_guard(&self) -> MutexGuard<'_, ()> {
        self.inner
            .selection_publish
            .lock()
            .unwrap_or_else(|p| p.into_inner())
    }

    fn store(&self) -> &dyn SocialStore {
        self.inner.store.as_ref()
    }

    fn require_user(&self) -> Result<CurrentUser> {
        self.store().current_user().ok_or(AppError::AuthRequired)
    }

    /// Publish a failed write on the error signal and hand it back.
    fn report<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            tracing::warn!("{}", e);
            self.state().error.set(Some(e.to_string()));
        }
        result
    }

    /// Initial load of everything the home screens show.
    pub async fn load_all(&self) -> Result<()> {
        let (news, _, _) = futures::join!(self.load_news(), self.load_topics(), self.load_authors());
        news
    }

    /// Fetch headlines. On upstream failure the placeholder feed is
    /// published and the error is both published and returned.
    pub async fn load_news(&self) -> Result<()> {
        let state = self.state();
        state.is_loading.set(true);
        state.error.set(None);

        let (feed, error) = self.inner.normalizer.load_or_placeholder().await;
        tracing::info!(
            "Loaded {} trending and {} latest articles",
            feed.trending.len(),
            feed.latest.len()
        );
        state.trending.set(feed.trending);
        state.latest.set(feed.latest);
        if let Some(e) = &error {
            state.error.set(Some(e.to_string()));
        }
        state.is_loading.set(false);

        self.refresh_bookmarks().await;

        match error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Make `article` the current selection and load its social state.
    /// Results that arrive after a newer selection are dropped.
    pub async fn select_article(&self, mut article: Article) -> String {
        ensure_id(&mut article);
        let article_id = article.id.clone();
        let state = self.state();

        let epoch = {
            let _guard = self.selection_guard();
            let epoch = self.inner.selection_epoch.fetch_add(1, Ordering::SeqCst) + 1;
            state.reset_selection_counters();
            state.selected_article.set(Some(article));
            epoch
        };

        let store = self.store();
        let (likes, liked, comments, bookmarked) = futures::join!(
            store.like_count(&article_id),
            store.is_liked(&article_id),
            store.count_comments(&article_id),
            store.is_bookmarked(&article_id),
        );

        let _guard = self.selection_guard();
        if self.inner.selection_epoch.load(Ordering::SeqCst) != epoch {
            tracing::debug!("Discarding stale social state for {}", article_id);
            return article_id;
        }

        state.article_like_count.set(degrade(likes, "like count", &article_id));
        state.is_article_liked.set(degrade(liked, "like flag", &article_id));
        state.article_comment_count.set(degrade(comments, "comment count", &article_id));
        state.is_article_bookmarked.set(degrade(bookmarked, "bookmark flag", &article_id));

        article_id
    }

    pub fn selected_article_id(&self) -> Option<String> {
        self.state().selected_id()
    }

    /// Flip the signed-in user's like. Returns whether the article is now
    /// liked.
    pub async fn toggle_like(&self, article_id: &str) -> Result<bool> {
        let result = self.toggle_like_inner(article_id).await;
        self.report(result)
    }

    async fn toggle_like_inner(&self, article_id: &str) -> Result<bool> {
        let article_id = require_article_id(article_id)?;
        self.require_user()?;

        let liked = self.store().toggle_like(article_id).await?;
        let count = self.store().like_count(article_id).await;

        let state = self.state();
        let _guard = self.selection_guard();
        if state.is_selected(article_id) {
            state.is_article_liked.set(liked);
            match count {
                Ok(count) => state.article_like_count.set(count),
                Err(e) => tracing::debug!("Could not re-read like count for {}: {}", article_id, e),
            }
        }
        Ok(liked)
    }

    /// Flip the signed-in user's bookmark and mirror it onto their profile.
    /// Returns whether the article is now bookmarked.
    pub async fn toggle_bookmark(&self, article_id: &str) -> Result<bool> {
        let result = self.toggle_bookmark_inner(article_id).await;
        self.report(result)
    }

    async fn toggle_bookmark_inner(&self, article_id: &str) -> Result<bool> {
        let article_id = require_article_id(article_id)?;
        let user = self.require_user()?;

        let bookmarked = self.store().toggle_bookmark(article_id).await?;
        let profile_update = self.mirror_bookmark(&user, article_id, bookmarked).await;

        {
            let _guard = self.selection_guard();
            if self.state().is_selected(article_id) {
                self.state().is_article_bookmarked.set(bookmarked);
            }
        }
        self.refresh_bookmarks().await;

        profile_update?;
        Ok(bookmarked)
    }

    async fn mirror_bookmark(&self, user: &CurrentUser, article_id: &str, bookmarked: bool) -> Result<()> {
        let mut profile = self
            .store()
            .get_profile(&user.uid)
            .await?
            .unwrap_or_else(|| UserProfile::for_user(user));

        if profile.set_bookmarked(article_id, bookmarked) {
            self.store().set_profile(&profile).await?;
        }
        Ok(())
    }

    /// Rebuild the bookmarked list from the store's bookmark ids and re-read
    /// the selection's bookmark flag. Failures leave the list as it was.
    pub async fn refresh_bookmarks(&self) {
        let ids = match self.store().user_bookmark_ids().await {
            Ok(ids) => ids,
            Err(e) => {
                tracing::debug!("Could not load bookmarks: {}", e);
                return;
            }
        };

        let state = self.state();
        let bookmarked: Vec<Article> = state
            .loaded_articles()
            .into_iter()
            .filter(|a| ids.contains(&a.id))
            .collect();
        state.bookmarked_articles.set(bookmarked);

        if let Some(selected) = state.selected_id() {
            let flag = self.store().is_bookmarked(&selected).await;
            let _guard = self.selection_guard();
            if state.is_selected(&selected) {
                state
                    .is_article_bookmarked
                    .set(degrade(flag, "bookmark flag", &selected));
            }
        }
    }

    pub fn is_bookmarked(&self, article: &Article) -> bool {
        let state = self.state();
        if state.is_selected(&article.id) {
            return state.is_article_bookmarked.get();
        }
        state
            .bookmarked_articles
            .get()
            .iter()
            .any(|a| a.id == article.id)
    }

    /// Post a comment as the signed-in user, then reload the article's
    /// comments so list and count come from the same read.
    pub async fn add_comment(&self, article_id: &str, content: &str) -> Result<Comment> {
        let result = self.add_comment_inner(article_id, content).await;
        self.report(result)
    }

    async fn add_comment_inner(&self, article_id: &str, content: &str) -> Result<Comment> {
        let article_id = require_article_id(article_id)?;
        let user = self.require_user()?;
        let content = content.trim();
        if content.is_empty() {
            return Err(AppError::InvalidInput("comment is empty".to_string()));
        }

        let comment = Comment {
            id: Uuid::new_v4().to_string(),
            author_name: user.display_name(),
            author_image: None,
            content: content.to_string(),
            timestamp: Some(Utc::now().timestamp_millis().to_string()),
            article_id: article_id.to_string(),
            user_id: user.uid,
        };

        self.store().add_comment(article_id, &comment).await?;
        tracing::debug!("Comment {} added to {}", comment.id, article_id);

        self.load_comments_for_article(article_id).await?;
        Ok(comment)
    }

    /// Load every comment on the article, newest first, and publish the list
    /// with a count taken from it.
    pub async fn load_comments_for_article(&self, article_id: &str) -> Result<Vec<Comment>> {
        let state = self.state();
        let article_id = match require_article_id(article_id) {
            Ok(id) => id,
            Err(e) => {
                state.comments.set(Vec::new());
                state.article_comment_count.set(0);
                return Err(e);
            }
        };

        match self.store().list_comments(article_id).await {
            Ok(comments) => {
                tracing::debug!("Loaded {} comments for {}", comments.len(), article_id);
                state.article_comment_count.set(comments.len() as u32);
                state.comments.set(comments.clone());
                Ok(comments)
            }
            Err(e) => {
                tracing::debug!("Could not load comments for {}: {}", article_id, e);
                state.comments.set(Vec::new());
                state.article_comment_count.set(0);
                Err(e)
            }
        }
    }

    /// Title search over loaded headlines, falling back to an upstream
    /// query when nothing local matches.
    pub async fn search_articles(&self, query: &str) -> Vec<Article> {
        let state = self.state();
        let trimmed = query.trim().to_string();
        state.search_query.set(trimmed.clone());

        let term = trimmed.to_lowercase();
        if term.is_empty() {
            state.search_results.set(Vec::new());
            return Vec::new();
        }

        let local: Vec<Article> = state
            .loaded_articles()
            .into_iter()
            .filter(|a| a.title_matches(&term))
            .collect();

        let results = if !local.is_empty() {
            local
        } else {
            match self.inner.normalizer.search_upstream(&term).await {
                Ok(found) => found,
                Err(e) => {
                    tracing::debug!("Upstream search for {:?} failed: {}", term, e);
                    Vec::new()
                }
            }
        };

        // A newer query owns the results signal.
        if state.search_query.get() == trimmed {
            state.search_results.set(results.clone());
        }
        results
    }

    pub fn toggle_topic_save(&self, topic_id: &str) {
        self.state().topics.update(|topics| {
            for topic in topics.iter_mut().filter(|t| t.id == topic_id) {
                topic.is_saved = !topic.is_saved;
            }
        });
    }

    pub fn toggle_author_follow(&self, author_id: &str) {
        self.state().authors.update(|authors| {
            for author in authors.iter_mut().filter(|a| a.id == author_id) {
                author.is_following = !author.is_following;
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::{ApiArticle, ScriptedNewsApi};
    use crate::models::{Author, Topic};
    use crate::social::{MemorySocialStore, Session};

    fn api_article(title: &str) -> ApiArticle {
        ApiArticle {
            title: title.to_string(),
            url: Some(format!("https://news.example.com/{}", title.replace(' ', "-"))),
            image_url: Some("https://img.example.com/a.jpg".to_string()),
            ..Default::default()
        }
    }

    fn headlines(n: usize) -> Vec<ApiArticle> {
        (0..n).map(|i| api_article(&format!("Story {}", i))).collect()
    }

    fn setup(session: Session, api: ScriptedNewsApi) -> (Reconciler, Arc<MemorySocialStore>) {
        let store = Arc::new(MemorySocialStore::new(session));
        let reconciler = Reconciler::new(Arc::new(api), store.clone(), &Config::default());
        (reconciler, store)
    }

    fn article(id: &str, title: &str) -> Article {
        Article {
            id: id.to_string(),
            title: title.to_string(),
            description: None,
            content: None,
            content_text: None,
            author: None,
            source: None,
            image_url: None,
            url: None,
            published_at: None,
            category: None,
        }
    }

    // ==================== load_news ====================

    #[tokio::test]
    async fn test_load_news_publishes_feed() {
        let (r, _) = setup(
            Session::new(),
            ScriptedNewsApi::new().with_headlines(None, headlines(25)),
        );

        r.load_news().await.unwrap();

        assert_eq!(r.state().trending.get().len(), 3);
        assert_eq!(r.state().latest.get().len(), 17);
        assert!(!r.state().is_loading.get());
        assert_eq!(r.state().error.get(), None);
    }

    #[tokio::test]
    async fn test_load_news_failure_publishes_placeholders_and_error() {
        let (r, _) = setup(
            Session::new(),
            ScriptedNewsApi::new().failing_headlines(None, "offline"),
        );

        let result = r.load_news().await;

        assert!(matches!(result, Err(AppError::Upstream(_))));
        assert_eq!(r.state().trending.get()[0].id, "article_1");
        assert_eq!(r.state().latest.get().len(), 17);
        assert!(r.state().error.get().unwrap().contains("offline"));
        assert!(!r.state().is_loading.get());
    }

    #[tokio::test]
    async fn test_load_all_fills_feed_topics_and_authors() {
        let (r, _) = setup(
            Session::new(),
            ScriptedNewsApi::new()
                .with_headlines(None, headlines(20))
                .failing_sources(None, "down"),
        );

        r.load_all().await.unwrap();

        assert_eq!(r.state().loaded_articles().len(), 20);
        assert_eq!(r.state().topics.get().len(), 7);
        assert_eq!(r.state().authors.get()[0].name, "BBC News");
    }

    #[tokio::test]
    async fn test_load_all_reports_feed_failure() {
        let (r, _) = setup(
            Session::new(),
            ScriptedNewsApi::new().failing_headlines(None, "offline"),
        );

        assert!(matches!(r.load_all().await, Err(AppError::Upstream(_))));
        assert_eq!(r.state().topics.get().len(), 7);
    }

    // ==================== select_article ====================

    #[tokio::test]
    async fn test_select_article_derives_id_and_loads_state() {
        let (r, store) = setup(Session::signed_in("u1", None), ScriptedNewsApi::new());
        let mut a = article("", "No id yet");
        a.url = Some("https://news.example.com/x".to_string());

        let expected = crate::feed::derive_article_id(a.url.as_deref(), &a.title, None);
        store.toggle_like(&expected).await.unwrap();
        store.toggle_bookmark(&expected).await.unwrap();

        let id = r.select_article(a).await;

        assert_eq!(id, expected);
        assert_eq!(r.selected_article_id(), Some(expected));
        assert_eq!(r.state().article_like_count.get(), 1);
        assert!(r.state().is_article_liked.get());
        assert!(r.state().is_article_bookmarked.get());
        assert_eq!(r.state().article_comment_count.get(), 0);
    }

    #[tokio::test]
    async fn test_select_article_resets_counters() {
        let (r, _) = setup(Session::signed_in("u1", None), ScriptedNewsApi::new());

        r.select_article(article("a1", "One")).await;
        r.toggle_like("a1").await.unwrap();
        assert_eq!(r.state().article_like_count.get(), 1);

        r.select_article(article("a2", "Two")).await;
        assert_eq!(r.state().article_like_count.get(), 0);
        assert!(!r.state().is_article_liked.get());
    }

    // ==================== toggle_like ====================

    #[tokio::test]
    async fn test_toggle_like_signed_out_reports_auth_error() {
        let (r, store) = setup(Session::new(), ScriptedNewsApi::new());
        r.select_article(article("a1", "One")).await;

        let result = r.toggle_like("a1").await;

        assert!(matches!(result, Err(AppError::AuthRequired)));
        assert!(r.state().error.get().is_some());
        assert_eq!(store.like_count("a1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_toggle_like_reads_authoritative_count() {
        let session = Session::signed_in("other", None);
        let (r, store) = setup(session.clone(), ScriptedNewsApi::new());
        store.toggle_like("a1").await.unwrap();
        session.sign_in("me", None);

        r.select_article(article("a1", "One")).await;
        assert_eq!(r.state().article_like_count.get(), 1);

        assert!(r.toggle_like("a1").await.unwrap());
        assert_eq!(r.state().article_like_count.get(), 2);
        assert!(r.state().is_article_liked.get());
    }

    #[tokio::test]
    async fn test_toggle_like_on_unselected_article_leaves_counters() {
        let (r, _) = setup(Session::signed_in("u1", None), ScriptedNewsApi::new());
        r.select_article(article("a1", "One")).await;

        r.toggle_like("other").await.unwrap();

        assert_eq!(r.state().article_like_count.get(), 0);
        assert!(!r.state().is_article_liked.get());
    }

    #[tokio::test]
    async fn test_empty_article_id_rejected() {
        let (r, _) = setup(Session::signed_in("u1", None), ScriptedNewsApi::new());
        assert!(matches!(r.toggle_like("  ").await, Err(AppError::InvalidInput(_))));
    }

    // ==================== toggle_bookmark ====================

    #[tokio::test]
    async fn test_toggle_bookmark_mirrors_profile_and_list() {
        let (r, store) = setup(
            Session::signed_in("u1", Some("u1@example.com")),
            ScriptedNewsApi::new().with_headlines(None, headlines(20)),
        );
        r.load_news().await.unwrap();
        let target = r.state().latest.get()[0].clone();
        r.select_article(target.clone()).await;

        assert!(r.toggle_bookmark(&target.id).await.unwrap());
        assert!(r.state().is_article_bookmarked.get());
        assert_eq!(r.state().bookmarked_articles.get(), vec![target.clone()]);
        assert!(r.is_bookmarked(&target));
        let profile = store.get_profile("u1").await.unwrap().unwrap();
        assert_eq!(profile.bookmarked_articles, vec![target.id.clone()]);
        assert_eq!(profile.email, "u1@example.com");

        assert!(!r.toggle_bookmark(&target.id).await.unwrap());
        assert!(!r.state().is_article_bookmarked.get());
        assert!(r.state().bookmarked_articles.get().is_empty());
        let profile = store.get_profile("u1").await.unwrap().unwrap();
        assert!(profile.bookmarked_articles.is_empty());
    }

    #[tokio::test]
    async fn test_toggle_bookmark_with_malformed_profile_reports_error() {
        let (r, store) = setup(Session::signed_in("u1", None), ScriptedNewsApi::new());
        store.insert_profile_document("u1", serde_json::json!({"uid": "u1", "bookmarkedArticles": "x"}));

        let result = r.toggle_bookmark("a1").await;

        assert!(matches!(result, Err(AppError::Decode(_))));
        assert!(r.state().error.get().is_some());
        // The bookmark record itself was written before the profile failed.
        assert!(store.is_bookmarked("a1").await.unwrap());
    }

    // ==================== comments ====================

    #[tokio::test]
    async fn test_add_comment_reloads_list_and_count() {
        let (r, _) = setup(
            Session::signed_in("u1", Some("reader@example.com")),
            ScriptedNewsApi::new(),
        );

        let posted = r.add_comment("a1", "  First!  ").await.unwrap();

        assert_eq!(posted.content, "First!");
        assert_eq!(posted.author_name, "reader");
        assert_eq!(posted.user_id, "u1");
        assert!(Uuid::parse_str(&posted.id).is_ok());
        let comments = r.state().comments.get();
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].id, posted.id);
        assert_eq!(r.state().article_comment_count.get(), 1);
    }

    #[tokio::test]
    async fn test_add_empty_comment_rejected() {
        let (r, store) = setup(Session::signed_in("u1", None), ScriptedNewsApi::new());
        assert!(matches!(r.add_comment("a1", "   ").await, Err(AppError::InvalidInput(_))));
        assert_eq!(store.count_comments("a1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_load_comments_for_empty_id_clears() {
        let (r, _) = setup(Session::signed_in("u1", None), ScriptedNewsApi::new());
        r.add_comment("a1", "hello").await.unwrap();

        assert!(r.load_comments_for_article("").await.is_err());
        assert!(r.state().comments.get().is_empty());
        assert_eq!(r.state().article_comment_count.get(), 0);
    }

    // ==================== search ====================

    #[tokio::test]
    async fn test_search_uses_loaded_articles_first() {
        let (r, _) = setup(
            Session::new(),
            ScriptedNewsApi::new().with_headlines(None, headlines(20)),
        );
        r.load_news().await.unwrap();

        let results = r.search_articles("  STORY 1 ").await;

        // "Story 1" and "Story 10".."Story 19"
        assert_eq!(results.len(), 11);
        assert_eq!(r.state().search_query.get(), "STORY 1");
        assert_eq!(r.state().search_results.get().len(), 11);
    }

    #[tokio::test]
    async fn test_search_falls_back_upstream() {
        let api = ScriptedNewsApi::new()
            .with_headlines(None, headlines(20))
            .with_search("volcano", vec![api_article("Volcano erupts"), api_article("Other news")]);
        let (r, _) = setup(Session::new(), api);
        r.load_news().await.unwrap();

        let results = r.search_articles("Volcano").await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].title, "Volcano erupts");
    }

    #[tokio::test]
    async fn test_empty_search_clears_results() {
        let (r, _) = setup(
            Session::new(),
            ScriptedNewsApi::new().with_headlines(None, headlines(20)),
        );
        r.load_news().await.unwrap();
        r.search_articles("story").await;
        assert!(!r.state().search_results.get().is_empty());

        assert!(r.search_articles("   ").await.is_empty());
        assert!(r.state().search_results.get().is_empty());
    }

    #[tokio::test]
    async fn test_search_upstream_failure_is_empty() {
        let api = ScriptedNewsApi::new().failing_search("zzz", "boom");
        let (r, _) = setup(Session::new(), api);

        assert!(r.search_articles("zzz").await.is_empty());
        assert_eq!(r.state().error.get(), None);
    }

    // ==================== local toggles ====================

    #[test]
    fn test_toggle_topic_and_author() {
        let (r, _) = setup(Session::new(), ScriptedNewsApi::new());
        r.state().topics.set(vec![
            Topic::new("1", "Business", "Business news"),
            Topic::new("2", "Health", "Health news"),
        ]);
        r.state().authors.set(vec![Author::new("bbc", "BBC News", "1.5M")]);

        r.toggle_topic_save("2");
        r.toggle_author_follow("bbc");

        let topics = r.state().topics.get();
        assert!(!topics[0].is_saved);
        assert!(topics[1].is_saved);
        assert!(r.state().authors.get()[0].is_following);

        r.toggle_topic_save("2");
        r.toggle_author_follow("missing");
        assert!(!r.state().topics.get()[1].is_saved);
        assert!(r.state().authors.get()[0].is_following);
    }
}
