/// Collaborator interfaces
///
/// The session, content and engagement layers talk to the outside world only
/// through these traits. Two implementations exist: a Supabase client over
/// HTTP and an in-process mock that keeps everything in memory.

pub mod ip;
pub mod memory;
pub mod supabase;

pub use ip::HttpIpLookup;
pub use memory::MemoryBackend;
pub use supabase::{SupabaseBackend, SupabaseConfig};

use crate::{
    error::TubeResult,
    models::{Comment, NewComment, Profile, ProfileUpdate, Video, VideoDraft, VideoFilter},
    validation::username_from_seed,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Capacity of auth change channels
pub const AUTH_EVENT_BUFFER: usize = 16;

/// Identity as reported by the auth collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    pub email: String,
    /// Username chosen at sign-up, if the provider kept it
    pub username: Option<String>,
}

impl AuthUser {
    /// Username to fall back on: sign-up metadata, else the email local part,
    /// coerced into the username rules. Uniqueness is the caller's concern
    pub fn display_username(&self) -> String {
        let seed = match self.username.as_deref().filter(|u| !u.is_empty()) {
            Some(username) => username,
            None => self.email.split('@').next().unwrap_or_default(),
        };
        username_from_seed(seed)
    }
}

/// Result of a sign-up request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignUp {
    /// Account is active and signed in
    Confirmed(AuthUser),
    /// Provider requires email confirmation before sign-in
    PendingConfirmation { email: String },
}

/// Asynchronous auth change notifications
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn(AuthUser),
    SignedOut,
    UserUpdated(AuthUser),
}

/// Remote authentication collaborator
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Resolve an existing session, if any
    async fn current_user(&self) -> TubeResult<Option<AuthUser>>;

    /// Check credentials and open a session
    async fn sign_in(&self, email: &str, password: &str) -> TubeResult<AuthUser>;

    /// Create an account
    async fn sign_up(&self, email: &str, password: &str, username: &str) -> TubeResult<SignUp>;

    /// Invalidate the current session; succeeds when there is none
    async fn sign_out(&self) -> TubeResult<()>;

    /// Subscribe to auth change notifications
    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;
}

/// Remote table collaborator (profiles, videos, comments)
#[async_trait]
pub trait ContentBackend: Send + Sync {
    async fn fetch_profile(&self, user_id: &str) -> TubeResult<Option<Profile>>;

    /// Whether any profile already uses this username
    async fn username_taken(&self, username: &str) -> TubeResult<bool>;

    /// Insert or replace a profile row
    async fn upsert_profile(&self, profile: &Profile) -> TubeResult<Profile>;

    /// Merge allowed fields; a taken username is a `Conflict`
    async fn update_profile(&self, user_id: &str, update: &ProfileUpdate) -> TubeResult<Profile>;

    async fn select_videos(&self, filter: &VideoFilter) -> TubeResult<Vec<Video>>;

    async fn select_video(&self, video_id: &str) -> TubeResult<Option<Video>>;

    async fn insert_video(&self, draft: &VideoDraft) -> TubeResult<Video>;

    async fn select_comments(&self, video_id: &str) -> TubeResult<Vec<Comment>>;

    async fn insert_comment(&self, comment: &NewComment) -> TubeResult<Comment>;

    /// Overwrite a comment's reaction counters
    async fn update_comment_counters(&self, comment_id: &str, likes: u64, dislikes: u64) -> TubeResult<()>;
}

/// Remote procedure collaborator for view counting
#[async_trait]
pub trait ViewCounter: Send + Sync {
    /// Read-modify-write on the remote side; de-duplication is the server's job
    async fn increment_video_views_safe(&self, video_id: &str, user_ip: Option<&str>) -> TubeResult<()>;
}

/// Public IP lookup collaborator
#[async_trait]
pub trait IpLookup: Send + Sync {
    async fn public_ip(&self) -> TubeResult<String>;
}
