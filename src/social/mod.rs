//! Per-user social state: likes, bookmarks, comments and profiles.
//!
//! The reconciler only ever talks to [`SocialStore`]; which backend sits
//! behind it is decided by whoever constructs the reconciler.

mod memory;
pub mod record;
mod sqlite;

use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::models::{Comment, CurrentUser, UserProfile};

pub use memory::MemorySocialStore;
pub use sqlite::SqliteSocialStore;

/// Key of a like or bookmark record. One record per user per article.
pub fn record_key(article_id: &str, user_id: &str) -> String {
    format!("{}{}", article_id, user_id)
}

/// Who is signed in. Cloned handles share the same state.
#[derive(Debug, Clone, Default)]
pub struct Session {
    current: Arc<RwLock<Option<CurrentUser>>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signed_in(uid: &str, email: Option<&str>) -> Self {
        let session = Self::new();
        session.sign_in(uid, email);
        session
    }

    pub fn sign_in(&self, uid: &str, email: Option<&str>) {
        let user = CurrentUser {
            uid: uid.to_string(),
            email: email.map(str::to_string),
        };
        *self.current.write().unwrap_or_else(|p| p.into_inner()) = Some(user);
    }

    pub fn sign_out(&self) {
        *self.current.write().unwrap_or_else(|p| p.into_inner()) = None;
    }

    pub fn current(&self) -> Option<CurrentUser> {
        self.current
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    pub fn require(&self) -> Result<CurrentUser> {
        self.current().ok_or(AppError::AuthRequired)
    }
}

/// Durable per-user records keyed by article id.
///
/// Mutations require a signed-in user and fail with
/// [`AppError::AuthRequired`] otherwise. Per-user reads answer "not liked",
/// "not bookmarked" or an empty list when nobody is signed in.
#[async_trait]
pub trait SocialStore: Send + Sync {
    fn current_user(&self) -> Option<CurrentUser>;

    async fn get_profile(&self, uid: &str) -> Result<Option<UserProfile>>;
    async fn set_profile(&self, profile: &UserProfile) -> Result<()>;

    /// Returns whether the article is liked after the flip.
    async fn toggle_like(&self, article_id: &str) -> Result<bool>;
    /// Likes from all users.
    async fn like_count(&self, article_id: &str) -> Result<u32>;
    async fn is_liked(&self, article_id: &str) -> Result<bool>;

    /// Returns whether the article is bookmarked after the flip.
    async fn toggle_bookmark(&self, article_id: &str) -> Result<bool>;
    async fn is_bookmarked(&self, article_id: &str) -> Result<bool>;
    async fn user_bookmark_ids(&self) -> Result<Vec<String>>;

    async fn add_comment(&self, article_id: &str, comment: &Comment) -> Result<()>;
    /// Newest first.
    async fn list_comments(&self, article_id: &str) -> Result<Vec<Comment>>;
    async fn count_comments(&self, article_id: &str) -> Result<u32>;
}
