//! Decoding of stored documents into typed records.
//!
//! Stored documents are schemaless: fields can be missing, null or written by
//! older clients. Required fields are validated here, optional ones get
//! defaults, and a bad record is rejected on its own.

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::{Comment, UserProfile};

/// A comment document as stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CommentRecord {
    pub id: Option<String>,
    pub author_name: Option<String>,
    pub author_image: Option<String>,
    pub content: Option<String>,
    pub timestamp: Option<String>,
    pub article_id: Option<String>,
    pub user_id: Option<String>,
}

fn required(field: &'static str, value: Option<String>) -> Result<String> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AppError::Decode(format!("comment is missing {}", field)))
}

impl TryFrom<CommentRecord> for Comment {
    type Error = AppError;

    fn try_from(record: CommentRecord) -> Result<Self> {
        Ok(Comment {
            id: required("id", record.id)?,
            content: required("content", record.content)?,
            article_id: required("articleId", record.article_id)?,
            user_id: required("userId", record.user_id)?,
            author_name: record
                .author_name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| "User".to_string()),
            author_image: record.author_image.filter(|i| !i.trim().is_empty()),
            timestamp: record.timestamp,
        })
    }
}

impl From<&Comment> for CommentRecord {
    fn from(comment: &Comment) -> Self {
        Self {
            id: Some(comment.id.clone()),
            author_name: Some(comment.author_name.clone()),
            author_image: comment.author_image.clone(),
            content: Some(comment.content.clone()),
            timestamp: comment.timestamp.clone(),
            article_id: Some(comment.article_id.clone()),
            user_id: Some(comment.user_id.clone()),
        }
    }
}

/// Decode every record that can be decoded, newest first. Bad records are
/// logged and skipped.
pub fn decode_comments(records: impl IntoIterator<Item = CommentRecord>) -> Vec<Comment> {
    let mut comments: Vec<Comment> = records
        .into_iter()
        .filter_map(|record| {
            let id = record.id.clone().unwrap_or_default();
            match Comment::try_from(record) {
                Ok(comment) => Some(comment),
                Err(e) => {
                    tracing::warn!("Skipping comment {:?}: {}", id, e);
                    None
                }
            }
        })
        .collect();
    Comment::sort_newest_first(&mut comments);
    comments
}

/// Decode a profile document; missing fields default.
pub fn decode_profile(document: serde_json::Value) -> Result<UserProfile> {
    if !document.is_object() {
        return Err(AppError::Decode("profile document is not an object".to_string()));
    }
    let profile: UserProfile = serde_json::from_value(document)
        .map_err(|e| AppError::Decode(format!("profile: {}", e)))?;
    if profile.uid.trim().is_empty() {
        return Err(AppError::Decode("profile is missing uid".to_string()));
    }
    Ok(profile)
}

pub fn encode_profile(profile: &UserProfile) -> Result<serde_json::Value> {
    Ok(serde_json::to_value(profile)?)
}
