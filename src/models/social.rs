use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The signed-in identity as known to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub uid: String,
    pub email: Option<String>,
}

impl CurrentUser {
    /// Name shown on comments: the local part of the login email.
    pub fn display_name(&self) -> String {
        self.email
            .as_deref()
            .and_then(|e| e.split('@').next())
            .filter(|local| !local.is_empty())
            .unwrap_or("User")
            .to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub author_name: String,
    pub author_image: Option<String>,
    pub content: String,
    /// Epoch milliseconds or RFC 3339, as written by whichever client stored it.
    pub timestamp: Option<String>,
    pub article_id: String,
    pub user_id: String,
}

impl Comment {
    /// Sort key in epoch milliseconds. Unparseable or missing timestamps are 0.
    pub fn timestamp_millis(&self) -> i64 {
        let Some(raw) = self.timestamp.as_deref().map(str::trim) else {
            return 0;
        };
        if let Ok(millis) = raw.parse::<i64>() {
            return millis;
        }
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc).timestamp_millis())
            .unwrap_or(0)
    }

    /// Newest first; stable for equal timestamps.
    pub fn sort_newest_first(comments: &mut [Comment]) {
        comments.sort_by_key(|c| std::cmp::Reverse(c.timestamp_millis()));
    }
}

/// The per-user profile document. Every field defaults when the stored
/// document omits it, so older documents keep decoding.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UserProfile {
    pub uid: String,
    pub username: String,
    pub full_name: String,
    pub email: String,
    pub phone_number: String,
    pub bio: String,
    pub website: String,
    pub profile_image_url: String,
    pub country: String,
    pub selected_topics: Vec<String>,
    pub followed_sources: Vec<String>,
    pub bookmarked_articles: Vec<String>,
}

impl UserProfile {
    pub fn for_user(user: &CurrentUser) -> Self {
        Self {
            uid: user.uid.clone(),
            email: user.email.clone().unwrap_or_default(),
            username: user.display_name(),
            ..Default::default()
        }
    }

    /// Adds or removes `article_id` from the bookmark list. Returns whether
    /// the list changed.
    pub fn set_bookmarked(&mut self, article_id: &str, bookmarked: bool) -> bool {
        let present = self.bookmarked_articles.iter().any(|id| id == article_id);
        match (bookmarked, present) {
            (true, false) => {
                self.bookmarked_articles.push(article_id.to_string());
                true
            }
            (false, true) => {
                self.bookmarked_articles.retain(|id| id != article_id);
                true
            }
            _ => false,
        }
    }
}
