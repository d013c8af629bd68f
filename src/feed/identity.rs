//! Stable article identifiers.
//!
//! The headlines API rarely supplies an id, and articles are rebuilt on every
//! fetch, so the id has to be re-derivable from the article itself. Social
//! records are keyed by it, which rules out anything process-dependent.

use sha2::{Digest, Sha256};

use crate::models::Article;

/// Bytes of the digest kept in the id (hex doubles the length).
const ID_BYTES: usize = 16;

/// Derive an id from the canonical URL, or from title + publish time when
/// there is no URL. Two URL-less articles sharing title and timestamp get the
/// same id; upstream offers nothing better to tell them apart.
pub fn derive_article_id(url: Option<&str>, title: &str, published_at: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    match url.map(str::trim).filter(|u| !u.is_empty()) {
        Some(url) => hasher.update(url.as_bytes()),
        None => {
            hasher.update(title.as_bytes());
            hasher.update(published_at.unwrap_or_default().as_bytes());
        }
    }
    let digest = hasher.finalize();
    storage_safe_key(&hex::encode(&digest[..ID_BYTES]))
}

/// Fill in `article.id` if it is blank. Existing ids are left alone.
pub fn ensure_id(article: &mut Article) {
    if article.id.trim().is_empty() {
        article.id = derive_article_id(
            article.url.as_deref(),
            &article.title,
            article.published_at.as_deref(),
        );
    }
}

/// Replace characters the document-key scheme reserves.
pub fn storage_safe_key(raw: &str) -> String {
    raw.chars()
        .map(|c| match c {
            '-' => 'n',
            '+' | '/' | '.' | '#' | '$' | '[' | ']' => '_',
            other => other,
        })
        .collect()
}
