/// Content repository
///
/// Typed access to videos and comments. Writes are sanitized and validated
/// here before they reach the backend; reads come back newest first.
use crate::{
    backend::ContentBackend,
    error::{TubeError, TubeResult},
    models::{video::{canonical_category, thumbnail_for}, Comment, NewComment, NewVideo, Profile, Video, VideoDraft, VideoFilter},
    validation::{sanitize_input, validate_comment, validate_video_metadata, ValidationError, VideoMetadata},
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

/// Per-channel totals shown on the profile page
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChannelStats {
    pub video_count: usize,
    pub total_views: u64,
}

#[derive(Clone)]
pub struct ContentRepository {
    backend: Arc<dyn ContentBackend>,
}

impl ContentRepository {
    pub fn new(backend: Arc<dyn ContentBackend>) -> Self {
        Self { backend }
    }

    /// All videos matching the filter, newest first
    pub async fn list_videos(&self, filter: &VideoFilter) -> TubeResult<Vec<Video>> {
        let mut videos = self.backend.select_videos(filter).await?;
        videos.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        debug!("Fetched {} videos", videos.len());
        Ok(videos)
    }

    pub async fn get_video(&self, video_id: &str) -> TubeResult<Video> {
        self.backend
            .select_video(video_id)
            .await?
            .ok_or_else(|| TubeError::NotFound(format!("Video {} not found", video_id)))
    }

    /// Sanitize, validate and insert an upload owned by `owner`
    pub async fn create_video(&self, video: NewVideo, owner: &Profile) -> TubeResult<Video> {
        let title = sanitize_input(&video.title);
        let description = video
            .description
            .as_deref()
            .map(sanitize_input)
            .filter(|d| !d.is_empty());
        let mut category = sanitize_input(&video.category);
        let video_url = video.video_url.trim().to_string();

        let mut report = validate_video_metadata(&VideoMetadata {
            title: &title,
            description: description.as_deref(),
            category: &category,
        });
        if !category.is_empty() {
            match canonical_category(&category) {
                Some(known) => category = known.to_string(),
                None => {
                    report.valid = false;
                    report.errors.push(ValidationError {
                        field: "category".to_string(),
                        message: "Unknown category".to_string(),
                    });
                }
            }
        }
        if !(video_url.starts_with("https://") || video_url.starts_with("http://")) {
            report.valid = false;
            report.errors.push(ValidationError {
                field: "video_url".to_string(),
                message: "Video link must be an http(s) URL".to_string(),
            });
        }
        report.into_result()?;

        let thumbnail_url = video
            .thumbnail_url
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| thumbnail_for(&video_url));

        let draft = VideoDraft {
            title,
            description,
            category,
            video_url,
            thumbnail_url,
            user_id: owner.id.clone(),
            uploaded_by: owner.username.clone(),
        };

        let created = self.backend.insert_video(&draft).await?;
        info!("Video {} uploaded by {}", created.id, owner.username);
        Ok(created)
    }

    /// Comments on a video, newest first
    pub async fn list_comments(&self, video_id: &str) -> TubeResult<Vec<Comment>> {
        let mut comments = self.backend.select_comments(video_id).await?;
        comments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(comments)
    }

    /// Post a comment; anonymous viewers comment as "Guest"
    pub async fn create_comment(&self, video_id: &str, content: &str, author: Option<&Profile>) -> TubeResult<Comment> {
        let content = sanitize_input(content);
        validate_comment(&content).into_result()?;

        let comment = NewComment {
            video_id: video_id.to_string(),
            content,
            author: author.map(|p| p.username.clone()).unwrap_or_else(|| "Guest".to_string()),
            author_avatar: author.map(Profile::avatar),
            user_id: author.map(|p| p.id.clone()),
        };

        self.backend.insert_comment(&comment).await
    }

    /// Video count and summed views for a channel
    pub async fn channel_stats(&self, owner_id: &str) -> TubeResult<ChannelStats> {
        let videos = self.backend.select_videos(&VideoFilter::owner(owner_id)).await?;
        Ok(ChannelStats {
            video_count: videos.len(),
            total_views: videos.iter().map(|v| v.views).sum(),
        })
    }
}
