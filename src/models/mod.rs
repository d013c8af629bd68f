mod article;
mod catalog;
mod social;

pub use article::{Article, Source};
pub use catalog::{Author, Topic};
pub use social::{Comment, CurrentUser, UserProfile};
