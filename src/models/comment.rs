/// Comment records
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A comment on a video
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub video_id: String,
    pub content: String,
    pub author: String,
    #[serde(default)]
    pub author_avatar: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub likes: u64,
    #[serde(default)]
    pub dislikes: u64,
}

/// Row sent to the comments store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewComment {
    pub video_id: String,
    pub content: String,
    pub author: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_avatar: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}
