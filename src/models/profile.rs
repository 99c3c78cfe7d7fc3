/// Profile records
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Public-facing record of an authenticated user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    #[serde(default)]
    pub email: String,
    pub username: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    /// Build a fresh profile, deriving the avatar from the username
    pub fn new(id: impl Into<String>, email: impl Into<String>, username: impl Into<String>) -> Self {
        let username = username.into();
        let now = Utc::now();
        Self {
            id: id.into(),
            email: email.into(),
            avatar_url: Some(default_avatar(&username)),
            username,
            created_at: now,
            updated_at: now,
        }
    }

    /// Avatar to display, falling back to the generated one
    pub fn avatar(&self) -> String {
        self.avatar_url
            .clone()
            .unwrap_or_else(|| default_avatar(&self.username))
    }

    /// Apply the allowed fields of an update
    pub fn merge(&mut self, update: &ProfileUpdate) {
        if let Some(username) = &update.username {
            self.username = username.clone();
        }
        if let Some(avatar_url) = &update.avatar_url {
            self.avatar_url = Some(avatar_url.clone());
        }
        self.updated_at = Utc::now();
    }
}

/// Fields a user may change on their own profile
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl ProfileUpdate {
    pub fn username(username: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            avatar_url: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.username.is_none() && self.avatar_url.is_none()
    }
}

/// Generated avatar for a seed (username or email)
pub fn default_avatar(seed: &str) -> String {
    format!(
        "https://api.dicebear.com/7.x/avataaars/svg?seed={}",
        urlencoding::encode(seed)
    )
}
