pub mod api;
pub mod identity;
pub mod normalizer;
mod scripted;

pub use api::{ApiArticle, NewsApi, NewsApiClient};
pub use identity::{derive_article_id, ensure_id};
pub use normalizer::{FeedNormalizer, HeadlineFeed};
pub use scripted::ScriptedNewsApi;
