/// Video records and upload payloads
use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Thumbnail used when none can be derived from the video link
pub const PLACEHOLDER_THUMBNAIL: &str = "/placeholder.svg";

/// Categories offered by the upload form
pub const CATEGORIES: [&str; 12] = [
    "Education",
    "Technology",
    "Gaming",
    "Music",
    "Sport",
    "Entertainment",
    "Science",
    "Travel",
    "Cooking",
    "Lifestyle",
    "Business",
    "Other",
];

lazy_static! {
    static ref YOUTUBE_ID_RE: Regex = Regex::new(
        r"^(?:https?://)?(?:www\.|m\.)?(?:youtu\.be/|youtube\.com/(?:watch\?(?:[^#]*&)?v=|embed/|shorts/|v/))([A-Za-z0-9_-]+)"
    )
    .unwrap();
}

/// A published video
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Video {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub category: String,
    pub video_url: String,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub uploaded_by: Option<String>,
    #[serde(default)]
    pub views: u64,
    pub created_at: DateTime<Utc>,
}

impl Video {
    /// Thumbnail to display: stored one, else derived from the link
    pub fn thumbnail(&self) -> String {
        match &self.thumbnail_url {
            Some(url) if !url.trim().is_empty() => url.clone(),
            _ => thumbnail_for(&self.video_url),
        }
    }

    pub fn description_text(&self) -> &str {
        self.description.as_deref().unwrap_or("")
    }

    pub fn author(&self) -> &str {
        self.uploaded_by.as_deref().unwrap_or("Unknown")
    }

    /// Case-insensitive match against title, description and category
    pub fn matches_query(&self, query: &str) -> bool {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        self.title.to_lowercase().contains(&needle)
            || self.description_text().to_lowercase().contains(&needle)
            || self.category.to_lowercase().contains(&needle)
    }
}

/// Upload form payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewVideo {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub category: String,
    pub video_url: String,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
}

/// Row sent to the videos table after sanitizing and validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoDraft {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub category: String,
    pub video_url: String,
    pub thumbnail_url: String,
    pub user_id: String,
    pub uploaded_by: String,
}

/// Equality filters for listing videos
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VideoFilter {
    pub user_id: Option<String>,
    pub category: Option<String>,
}

impl VideoFilter {
    pub fn owner(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            category: None,
        }
    }

    pub fn category(category: impl Into<String>) -> Self {
        Self {
            user_id: None,
            category: Some(category.into()),
        }
    }

    pub fn matches(&self, video: &Video) -> bool {
        if let Some(user_id) = &self.user_id {
            if video.user_id.as_deref() != Some(user_id.as_str()) {
                return false;
            }
        }
        if let Some(category) = &self.category {
            if &video.category != category {
                return false;
            }
        }
        true
    }
}

/// Extract the YouTube video id from a watch, short, embed or youtu.be link
pub fn youtube_id(video_url: &str) -> Option<&str> {
    YOUTUBE_ID_RE
        .captures(video_url.trim())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Thumbnail for a video link, or the placeholder for non-YouTube links
pub fn thumbnail_for(video_url: &str) -> String {
    match youtube_id(video_url) {
        Some(id) => format!("https://img.youtube.com/vi/{}/maxresdefault.jpg", id),
        None => PLACEHOLDER_THUMBNAIL.to_string(),
    }
}

/// The listed spelling of a category, matched case-insensitively
pub fn canonical_category(category: &str) -> Option<&'static str> {
    let category = category.trim();
    CATEGORIES.iter().copied().find(|c| c.eq_ignore_ascii_case(category))
}

pub fn is_known_category(category: &str) -> bool {
    canonical_category(category).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video(title: &str, description: Option<&str>, category: &str) -> Video {
        Video {
            id: "1".to_string(),
            title: title.to_string(),
            description: description.map(str::to_string),
            category: category.to_string(),
            video_url: "https://example.com/v.mp4".to_string(),
            thumbnail_url: None,
            user_id: Some("owner".to_string()),
            uploaded_by: None,
            views: 0,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_thumbnail_from_short_link() {
        assert_eq!(
            thumbnail_for("https://youtu.be/abc123"),
            "https://img.youtube.com/vi/abc123/maxresdefault.jpg"
        );
    }

    #[test]
    fn test_thumbnail_from_watch_and_embed_links() {
        assert_eq!(youtube_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ"), Some("dQw4w9WgXcQ"));
        assert_eq!(youtube_id("https://youtube.com/watch?t=10&v=xyz_-9"), Some("xyz_-9"));
        assert_eq!(youtube_id("https://www.youtube.com/embed/abc123?autoplay=1"), Some("abc123"));
        assert_eq!(youtube_id("https://youtu.be/abc123?t=42"), Some("abc123"));
    }

    #[test]
    fn test_thumbnail_placeholder_for_other_links() {
        assert_eq!(
            thumbnail_for("https://vimeo.com/123456"),
            PLACEHOLDER_THUMBNAIL
        );
        assert_eq!(thumbnail_for(""), PLACEHOLDER_THUMBNAIL);
    }

    #[test]
    fn test_stored_thumbnail_wins() {
        let mut v = video("t", None, "Music");
        v.video_url = "https://youtu.be/abc123".to_string();
        assert!(v.thumbnail().contains("abc123"));
        v.thumbnail_url = Some("https://cdn.example/t.jpg".to_string());
        assert_eq!(v.thumbnail(), "https://cdn.example/t.jpg");
    }

    #[test]
    fn test_matches_query_fields() {
        let v = video("Learning Rust", Some("Ownership explained"), "Education");
        assert!(v.matches_query("rust"));
        assert!(v.matches_query("OWNERSHIP"));
        assert!(v.matches_query("educ"));
        assert!(v.matches_query(""));
        assert!(!v.matches_query("python"));
    }

    #[test]
    fn test_filter_equality() {
        let v = video("t", None, "Music");
        assert!(VideoFilter::default().matches(&v));
        assert!(VideoFilter::owner("owner").matches(&v));
        assert!(!VideoFilter::owner("someone").matches(&v));
        assert!(VideoFilter::category("Music").matches(&v));
        assert!(!VideoFilter::category("music").matches(&v));
    }

    #[test]
    fn test_known_categories() {
        assert!(is_known_category("gaming"));
        assert!(!is_known_category("Knitting"));
        assert_eq!(canonical_category(" sport "), Some("Sport"));
        assert_eq!(canonical_category(""), None);
    }
}
