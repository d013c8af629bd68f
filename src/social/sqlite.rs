use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use tokio_rusqlite::Connection;

use crate::error::Result;
use crate::models::{Comment, CurrentUser, UserProfile};

use super::record::{decode_comments, decode_profile, encode_profile, CommentRecord};
use super::{record_key, Session, SocialStore};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS profiles (
    uid TEXT PRIMARY KEY,
    document TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS likes (
    id TEXT NOT NULL,
    article_id TEXT NOT NULL,
    user_id TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    UNIQUE(article_id, user_id)
);
CREATE INDEX IF NOT EXISTS idx_likes_article ON likes(article_id);

CREATE TABLE IF NOT EXISTS bookmarks (
    id TEXT NOT NULL,
    article_id TEXT NOT NULL,
    user_id TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    UNIQUE(article_id, user_id)
);
CREATE INDEX IF NOT EXISTS idx_bookmarks_user ON bookmarks(user_id);

CREATE TABLE IF NOT EXISTS comments (
    id TEXT,
    article_id TEXT,
    user_id TEXT,
    author_name TEXT,
    author_image TEXT,
    content TEXT,
    timestamp TEXT
);
CREATE INDEX IF NOT EXISTS idx_comments_article ON comments(article_id);
"#;

#[derive(Clone, Copy)]
enum Interactions {
    Likes,
    Bookmarks,
}

impl Interactions {
    fn table(self) -> &'static str {
        match self {
            Interactions::Likes => "likes",
            Interactions::Bookmarks => "bookmarks",
        }
    }
}

/// SQLite-backed social store. Each toggle runs its existence check and
/// write in one transaction. Likes and bookmarks are matched on
/// `(article_id, user_id)`; `id` is only the stored record key.
#[derive(Clone)]
pub struct SqliteSocialStore {
    conn: Connection,
    session: Session,
}

impl SqliteSocialStore {
    pub async fn open(path: impl AsRef<Path>, session: Session) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).await?;
        Self::init(conn, session).await
    }

    pub async fn open_in_memory(session: Session) -> Result<Self> {
        let conn = Connection::open_in_memory().await?;
        Self::init(conn, session).await
    }

    async fn init(conn: Connection, session: Session) -> Result<Self> {
        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;
        Ok(Self { conn, session })
    }

    async fn toggle(&self, kind: Interactions, article_id: &str) -> Result<bool> {
        let user = self.session.require()?;
        let article_id = article_id.to_string();
        let now = Utc::now().timestamp_millis();

        let created = self
            .conn
            .call(move |conn| {
                let table = kind.table();
                let key = record_key(&article_id, &user.uid);
                let tx = conn.transaction()?;
                let exists: bool = tx.query_row(
                    &format!(
                        "SELECT EXISTS(SELECT 1 FROM {} WHERE article_id = ?1 AND user_id = ?2)",
                        table
                    ),
                    params![article_id, user.uid],
                    |row| row.get(0),
                )?;
                if exists {
                    tx.execute(
                        &format!("DELETE FROM {} WHERE article_id = ?1 AND user_id = ?2", table),
                        params![article_id, user.uid],
                    )?;
                } else {
                    tx.execute(
                        &format!(
                            "INSERT INTO {} (id, article_id, user_id, created_at) VALUES (?1, ?2, ?3, ?4)",
                            table
                        ),
                        params![key, article_id, user.uid, now],
                    )?;
                }
                tx.commit()?;
                Ok(!exists)
            })
            .await?;

        Ok(created)
    }

    async fn has(&self, kind: Interactions, article_id: &str) -> Result<bool> {
        let Some(user) = self.session.current() else {
            return Ok(false);
        };
        let article_id = article_id.to_string();
        let exists = self
            .conn
            .call(move |conn| {
                let exists: bool = conn.query_row(
                    &format!(
                        "SELECT EXISTS(SELECT 1 FROM {} WHERE article_id = ?1 AND user_id = ?2)",
                        kind.table()
                    ),
                    params![article_id, user.uid],
                    |row| row.get(0),
                )?;
                Ok(exists)
            })
            .await?;
        Ok(exists)
    }

    /// Store a comment row as-is, bypassing validation.
    pub async fn insert_comment_record(&self, record: CommentRecord) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO comments (id, article_id, user_id, author_name, author_image, content, timestamp)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        record.id,
                        record.article_id,
                        record.user_id,
                        record.author_name,
                        record.author_image,
                        record.content,
                        record.timestamp,
                    ],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }
}

#[async_trait]
impl SocialStore for SqliteSocialStore {
    fn current_user(&self) -> Option<CurrentUser> {
        self.session.current()
    }

    async fn get_profile(&self, uid: &str) -> Result<Option<UserProfile>> {
        let uid = uid.to_string();
        let document: Option<String> = self
            .conn
            .call(move |conn| {
                let doc = conn
                    .query_row(
                        "SELECT document FROM profiles WHERE uid = ?1",
                        params![uid],
                        |row| row.get(0),
                    )
                    .optional()?;
                Ok(doc)
            })
            .await?;

        match document {
            Some(raw) => {
                let value: serde_json::Value = serde_json::from_str(&raw)?;
                Ok(Some(decode_profile(value)?))
            }
            None => Ok(None),
        }
    }

    async fn set_profile(&self, profile: &UserProfile) -> Result<()> {
        let uid = profile.uid.clone();
        let document = serde_json::to_string(&encode_profile(profile)?)?;
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO profiles (uid, document) VALUES (?1, ?2)
                     ON CONFLICT(uid) DO UPDATE SET document = excluded.document",
                    params![uid, document],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    async fn toggle_like(&self, article_id: &str) -> Result<bool> {
        self.toggle(Interactions::Likes, article_id).await
    }

    async fn like_count(&self, article_id: &str) -> Result<u32> {
        let article_id = article_id.to_string();
        let count = self
            .conn
            .call(move |conn| {
                let count: u32 = conn.query_row(
                    "SELECT COUNT(*) FROM likes WHERE article_id = ?1",
                    params![article_id],
                    |row| row.get(0),
                )?;
                Ok(count)
            })
            .await?;
        Ok(count)
    }

    async fn is_liked(&self, article_id: &str) -> Result<bool> {
        self.has(Interactions::Likes, article_id).await
    }

    async fn toggle_bookmark(&self, article_id: &str) -> Result<bool> {
        self.toggle(Interactions::Bookmarks, article_id).await
    }

    async fn is_bookmarked(&self, article_id: &str) -> Result<bool> {
        self.has(Interactions::Bookmarks, article_id).await
    }

    async fn user_bookmark_ids(&self) -> Result<Vec<String>> {
        let Some(user) = self.session.current() else {
            return Ok(Vec::new());
        };
        let ids = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT article_id FROM bookmarks WHERE user_id = ?1 ORDER BY created_at",
                )?;
                let ids = stmt
                    .query_map(params![user.uid], |row| row.get::<_, String>(0))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(ids)
            })
            .await?;
        Ok(ids)
    }

    async fn add_comment(&self, article_id: &str, comment: &Comment) -> Result<()> {
        let user = self.session.require()?;
        let mut record = CommentRecord::from(comment);
        record.article_id = Some(article_id.to_string());
        record.user_id = Some(user.uid);
        self.insert_comment_record(record).await
    }

    async fn list_comments(&self, article_id: &str) -> Result<Vec<Comment>> {
        let article_id = article_id.to_string();
        let records = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, article_id, user_id, author_name, author_image, content, timestamp
                     FROM comments WHERE article_id = ?1",
                )?;
                let records = stmt
                    .query_map(params![article_id], |row| {
                        Ok(CommentRecord {
                            id: row.get(0)?,
                            article_id: row.get(1)?,
                            user_id: row.get(2)?,
                            author_name: row.get(3)?,
                            author_image: row.get(4)?,
                            content: row.get(5)?,
                            timestamp: row.get(6)?,
                        })
                    })?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(records)
            })
            .await?;
        Ok(decode_comments(records))
    }

    async fn count_comments(&self, article_id: &str) -> Result<u32> {
        // Counted from the decoded list so count and list agree.
        Ok(self.list_comments(article_id).await?.len() as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use tempfile::TempDir;

    fn comment(id: &str, content: &str, ts: &str) -> Comment {
        Comment {
            id: id.to_string(),
            author_name: "ana".to_string(),
            author_image: None,
            content: content.to_string(),
            timestamp: Some(ts.to_string()),
            article_id: String::new(),
            user_id: String::new(),
        }
    }

    #[tokio::test]
    async fn test_toggle_like_roundtrip() {
        let store = SqliteSocialStore::open_in_memory(Session::signed_in("u1", None))
            .await
            .unwrap();

        assert!(store.toggle_like("a1").await.unwrap());
        assert!(store.is_liked("a1").await.unwrap());
        assert_eq!(store.like_count("a1").await.unwrap(), 1);

        assert!(!store.toggle_like("a1").await.unwrap());
        assert!(!store.is_liked("a1").await.unwrap());
        assert_eq!(store.like_count("a1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_signed_out_writes_fail_and_reads_default() {
        let store = SqliteSocialStore::open_in_memory(Session::new()).await.unwrap();

        assert!(matches!(store.toggle_like("a1").await, Err(AppError::AuthRequired)));
        assert!(matches!(store.toggle_bookmark("a1").await, Err(AppError::AuthRequired)));
        assert!(!store.is_liked("a1").await.unwrap());
        assert!(store.user_bookmark_ids().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_bookmarks_persist_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("social.db");

        {
            let store = SqliteSocialStore::open(&path, Session::signed_in("u1", None))
                .await
                .unwrap();
            store.toggle_bookmark("a1").await.unwrap();
            store.toggle_bookmark("a2").await.unwrap();
        }

        let store = SqliteSocialStore::open(&path, Session::signed_in("u1", None))
            .await
            .unwrap();
        let ids = store.user_bookmark_ids().await.unwrap();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&"a1".to_string()));
        assert!(store.is_bookmarked("a2").await.unwrap());
    }

    #[tokio::test]
    async fn test_comments_list_and_count_agree() {
        let store = SqliteSocialStore::open_in_memory(Session::signed_in("u1", None))
            .await
            .unwrap();

        store.add_comment("a1", &comment("c1", "older", "100")).await.unwrap();
        store.add_comment("a1", &comment("c2", "newer", "200")).await.unwrap();
        store
            .insert_comment_record(CommentRecord {
                id: Some("broken".to_string()),
                article_id: Some("a1".to_string()),
                content: None,
                ..Default::default()
            })
            .await
            .unwrap();

        let comments = store.list_comments("a1").await.unwrap();
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[0].id, "c2");
        assert_eq!(comments[0].user_id, "u1");
        assert_eq!(store.count_comments("a1").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_whitespace_comment_is_neither_listed_nor_counted() {
        let store = SqliteSocialStore::open_in_memory(Session::signed_in("u1", None))
            .await
            .unwrap();
        store.add_comment("a1", &comment("c1", "kept", "100")).await.unwrap();
        store
            .insert_comment_record(CommentRecord {
                id: Some("blank".to_string()),
                article_id: Some("a1".to_string()),
                user_id: Some("u2".to_string()),
                content: Some("\t\n".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        let comments = store.list_comments("a1").await.unwrap();
        assert_eq!(comments.len(), 1);
        assert_eq!(store.count_comments("a1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_toggles_do_not_collide_across_concatenated_keys() {
        let session = Session::signed_in("c", None);
        let store = SqliteSocialStore::open_in_memory(session.clone()).await.unwrap();
        assert!(store.toggle_like("ab").await.unwrap());
        assert!(store.toggle_bookmark("ab").await.unwrap());

        session.sign_in("bc", None);
        assert!(!store.is_liked("a").await.unwrap());
        assert!(store.toggle_like("a").await.unwrap());
        assert!(store.toggle_bookmark("a").await.unwrap());

        assert_eq!(store.like_count("ab").await.unwrap(), 1);
        assert_eq!(store.like_count("a").await.unwrap(), 1);
        assert_eq!(store.user_bookmark_ids().await.unwrap(), vec!["a".to_string()]);

        session.sign_in("c", None);
        assert!(store.is_liked("ab").await.unwrap());
        assert!(store.is_bookmarked("ab").await.unwrap());
    }

    #[tokio::test]
    async fn test_profile_upsert() {
        let store = SqliteSocialStore::open_in_memory(Session::new()).await.unwrap();
        assert!(store.get_profile("u1").await.unwrap().is_none());

        let mut profile = UserProfile {
            uid: "u1".to_string(),
            username: "ana".to_string(),
            ..Default::default()
        };
        store.set_profile(&profile).await.unwrap();
        profile.set_bookmarked("a9", true);
        store.set_profile(&profile).await.unwrap();

        assert_eq!(store.get_profile("u1").await.unwrap(), Some(profile));
    }
}
