use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;

use crate::error::Result;
use crate::models::{Comment, CurrentUser, UserProfile};

use super::record::{decode_comments, decode_profile, encode_profile, CommentRecord};
use super::{Session, SocialStore};

/// Likes and bookmarks are matched on `(article_id, user_id)`.
type InteractionKey = (String, String);

#[derive(Debug, Clone)]
struct Interaction {
    article_id: String,
    user_id: String,
    created_at: i64,
}

#[derive(Default)]
struct Tables {
    profiles: HashMap<String, serde_json::Value>,
    likes: HashMap<InteractionKey, Interaction>,
    bookmarks: HashMap<InteractionKey, Interaction>,
    comments: Vec<CommentRecord>,
}

/// Process-local social store. Documents are kept in their stored shape and
/// decoded on every read, same as the durable backend.
pub struct MemorySocialStore {
    session: Session,
    tables: Mutex<Tables>,
}

impl MemorySocialStore {
    pub fn new(session: Session) -> Self {
        Self {
            session,
            tables: Mutex::new(Tables::default()),
        }
    }

    /// Store a comment document as-is, bypassing validation.
    pub fn insert_comment_record(&self, record: CommentRecord) {
        self.tables().comments.push(record);
    }

    /// Store a profile document as-is, bypassing validation.
    pub fn insert_profile_document(&self, uid: &str, document: serde_json::Value) {
        self.tables().profiles.insert(uid.to_string(), document);
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn toggle(
        &self,
        pick: fn(&mut Tables) -> &mut HashMap<InteractionKey, Interaction>,
        article_id: &str,
    ) -> Result<bool> {
        let user = self.session.require()?;
        let key = (article_id.to_string(), user.uid.clone());
        let mut tables = self.tables();
        let records = pick(&mut tables);
        if records.remove(&key).is_some() {
            return Ok(false);
        }
        records.insert(
            key,
            Interaction {
                article_id: article_id.to_string(),
                user_id: user.uid,
                created_at: Utc::now().timestamp_millis(),
            },
        );
        Ok(true)
    }

    fn has(
        &self,
        pick: fn(&Tables) -> &HashMap<InteractionKey, Interaction>,
        article_id: &str,
    ) -> bool {
        match self.session.current() {
            Some(user) => pick(&self.tables()).contains_key(&(article_id.to_string(), user.uid)),
            None => false,
        }
    }
}

#[async_trait]
impl SocialStore for MemorySocialStore {
    fn current_user(&self) -> Option<CurrentUser> {
        self.session.current()
    }

    async fn get_profile(&self, uid: &str) -> Result<Option<UserProfile>> {
        let document = self.tables().profiles.get(uid).cloned();
        document.map(decode_profile).transpose()
    }

    async fn set_profile(&self, profile: &UserProfile) -> Result<()> {
        let document = encode_profile(profile)?;
        self.tables().profiles.insert(profile.uid.clone(), document);
        Ok(())
    }

    async fn toggle_like(&self, article_id: &str) -> Result<bool> {
        self.toggle(|t| &mut t.likes, article_id)
    }

    async fn like_count(&self, article_id: &str) -> Result<u32> {
        let count = self
            .tables()
            .likes
            .values()
            .filter(|like| like.article_id == article_id)
            .count();
        Ok(count as u32)
    }

    async fn is_liked(&self, article_id: &str) -> Result<bool> {
        Ok(self.has(|t| &t.likes, article_id))
    }

    async fn toggle_bookmark(&self, article_id: &str) -> Result<bool> {
        self.toggle(|t| &mut t.bookmarks, article_id)
    }

    async fn is_bookmarked(&self, article_id: &str) -> Result<bool> {
        Ok(self.has(|t| &t.bookmarks, article_id))
    }

    async fn user_bookmark_ids(&self) -> Result<Vec<String>> {
        let Some(user) = self.session.current() else {
            return Ok(Vec::new());
        };
        let mut marks: Vec<Interaction> = self
            .tables()
            .bookmarks
            .values()
            .filter(|b| b.user_id == user.uid)
            .cloned()
            .collect();
        marks.sort_by_key(|b| b.created_at);
        Ok(marks.into_iter().map(|b| b.article_id).collect())
    }

    async fn add_comment(&self, article_id: &str, comment: &Comment) -> Result<()> {
        let user = self.session.require()?;
        let mut record = CommentRecord::from(comment);
        record.article_id = Some(article_id.to_string());
        record.user_id = Some(user.uid);
        self.tables().comments.push(record);
        Ok(())
    }

    async fn list_comments(&self, article_id: &str) -> Result<Vec<Comment>> {
        let records: Vec<CommentRecord> = self
            .tables()
            .comments
            .iter()
            .filter(|r| r.article_id.as_deref() == Some(article_id))
            .cloned()
            .collect();
        Ok(decode_comments(records))
    }

    async fn count_comments(&self, article_id: &str) -> Result<u32> {
        Ok(self.list_comments(article_id).await?.len() as u32)
    }
}
