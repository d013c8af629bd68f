use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub is_saved: bool,
}

impl Topic {
    pub fn new(id: impl Into<String>, name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: Some(description.into()),
            is_saved: false,
        }
    }
}

/// A followable outlet. `followers` is a display string such as "1.2M".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: String,
    pub name: String,
    pub logo: Option<String>,
    pub followers: Option<String>,
    pub is_following: bool,
}

impl Author {
    pub fn new(id: impl Into<String>, name: impl Into<String>, followers: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            logo: None,
            followers: Some(followers.into()),
            is_following: false,
        }
    }
}
