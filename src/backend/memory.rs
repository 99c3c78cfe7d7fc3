/// In-process mock backend
///
/// Implements every collaborator trait over plain maps so the client works
/// with no hosted service configured. Nothing survives the process except
/// what the session layer persists on its own.
use crate::{
    backend::{AuthBackend, AuthEvent, AuthUser, ContentBackend, SignUp, ViewCounter, AUTH_EVENT_BUFFER},
    error::{TubeError, TubeResult},
    models::{Comment, NewComment, Profile, ProfileUpdate, Video, VideoDraft, VideoFilter},
    validation::username_with_suffix,
};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::{HashMap, HashSet};
use tokio::sync::{broadcast, RwLock};
use tracing::debug;
use uuid::Uuid;

struct Account {
    user: AuthUser,
    password: String,
}

#[derive(Default)]
struct MemoryState {
    /// Accounts keyed by email
    accounts: HashMap<String, Account>,
    current: Option<AuthUser>,
    profiles: HashMap<String, Profile>,
    videos: Vec<Video>,
    comments: Vec<Comment>,
    /// (video_id, ip) pairs already counted
    viewers: HashSet<(String, String)>,
}

/// Mock collaborator holding all rows in memory
pub struct MemoryBackend {
    state: RwLock<MemoryState>,
    events: broadcast::Sender<AuthEvent>,
    require_confirmation: bool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(AUTH_EVENT_BUFFER);
        Self {
            state: RwLock::new(MemoryState::default()),
            events,
            require_confirmation: false,
        }
    }

    /// Mock pre-populated with a small sample catalogue
    pub fn with_sample_videos() -> Self {
        let mut backend = Self::new();
        backend.state = RwLock::new(MemoryState {
            videos: sample_videos(),
            ..Default::default()
        });
        backend
    }

    /// Sign-ups stay pending until confirmed out of band
    pub fn requiring_confirmation(mut self) -> Self {
        self.require_confirmation = true;
        self
    }

    /// Simulate the provider ending the session on its own
    pub async fn expire_session(&self) {
        let mut state = self.state.write().await;
        if state.current.take().is_some() {
            let _ = self.events.send(AuthEvent::SignedOut);
        }
    }

    fn username_in_use(state: &MemoryState, username: &str, except_id: Option<&str>) -> bool {
        state
            .profiles
            .values()
            .any(|p| p.username == username && Some(p.id.as_str()) != except_id)
    }

    /// First free variant of `base`: `base`, `base_2`, `base_3`, ...
    fn free_username(state: &MemoryState, base: &str) -> String {
        if !Self::username_in_use(state, base, None) {
            return base.to_string();
        }
        (2..)
            .map(|n| username_with_suffix(base, n))
            .find(|candidate| !Self::username_in_use(state, candidate, None))
            .unwrap_or_else(|| base.to_string())
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuthBackend for MemoryBackend {
    async fn current_user(&self) -> TubeResult<Option<AuthUser>> {
        Ok(self.state.read().await.current.clone())
    }

    async fn sign_in(&self, email: &str, password: &str) -> TubeResult<AuthUser> {
        let mut state = self.state.write().await;

        let user = match state.accounts.get(email) {
            Some(account) if account.password != password => {
                return Err(TubeError::Authentication(
                    "Invalid login credentials".to_string(),
                ))
            }
            Some(account) => account.user.clone(),
            None => {
                // Unknown emails get an identity on first sign-in
                let user = AuthUser {
                    id: Uuid::new_v4().to_string(),
                    email: email.to_string(),
                    username: None,
                };
                state.accounts.insert(
                    email.to_string(),
                    Account {
                        user: user.clone(),
                        password: password.to_string(),
                    },
                );
                debug!("Created mock identity for {}", email);
                user
            }
        };

        if !state.profiles.contains_key(&user.id) {
            let username = Self::free_username(&state, &user.display_username());
            let profile = Profile::new(&user.id, &user.email, username);
            state.profiles.insert(user.id.clone(), profile);
        }

        state.current = Some(user.clone());
        let _ = self.events.send(AuthEvent::SignedIn(user.clone()));
        Ok(user)
    }

    async fn sign_up(&self, email: &str, password: &str, username: &str) -> TubeResult<SignUp> {
        let mut state = self.state.write().await;

        if state.accounts.contains_key(email) {
            return Err(TubeError::Conflict("Email already registered".to_string()));
        }
        if Self::username_in_use(&state, username, None) {
            return Err(TubeError::Conflict("Username already taken".to_string()));
        }

        let user = AuthUser {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            username: Some(username.to_string()),
        };
        state.accounts.insert(
            email.to_string(),
            Account {
                user: user.clone(),
                password: password.to_string(),
            },
        );
        state
            .profiles
            .insert(user.id.clone(), Profile::new(&user.id, email, username));

        if self.require_confirmation {
            return Ok(SignUp::PendingConfirmation {
                email: email.to_string(),
            });
        }

        state.current = Some(user.clone());
        let _ = self.events.send(AuthEvent::SignedIn(user.clone()));
        Ok(SignUp::Confirmed(user))
    }

    async fn sign_out(&self) -> TubeResult<()> {
        let mut state = self.state.write().await;
        if state.current.take().is_some() {
            let _ = self.events.send(AuthEvent::SignedOut);
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}

#[async_trait]
impl ContentBackend for MemoryBackend {
    async fn fetch_profile(&self, user_id: &str) -> TubeResult<Option<Profile>> {
        Ok(self.state.read().await.profiles.get(user_id).cloned())
    }

    async fn username_taken(&self, username: &str) -> TubeResult<bool> {
        Ok(Self::username_in_use(&*self.state.read().await, username, None))
    }

    async fn upsert_profile(&self, profile: &Profile) -> TubeResult<Profile> {
        let mut state = self.state.write().await;
        state.profiles.insert(profile.id.clone(), profile.clone());
        Ok(profile.clone())
    }

    async fn update_profile(&self, user_id: &str, update: &ProfileUpdate) -> TubeResult<Profile> {
        let mut state = self.state.write().await;

        if let Some(username) = &update.username {
            if Self::username_in_use(&state, username, Some(user_id)) {
                return Err(TubeError::Conflict("Username already taken".to_string()));
            }
        }

        let profile = state
            .profiles
            .get_mut(user_id)
            .ok_or_else(|| TubeError::NotFound("Profile not found".to_string()))?;
        profile.merge(update);
        Ok(profile.clone())
    }

    async fn select_videos(&self, filter: &VideoFilter) -> TubeResult<Vec<Video>> {
        let state = self.state.read().await;
        let mut videos: Vec<Video> = state
            .videos
            .iter()
            .filter(|v| filter.matches(v))
            .cloned()
            .collect();
        videos.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(videos)
    }

    async fn select_video(&self, video_id: &str) -> TubeResult<Option<Video>> {
        let state = self.state.read().await;
        Ok(state.videos.iter().find(|v| v.id == video_id).cloned())
    }

    async fn insert_video(&self, draft: &VideoDraft) -> TubeResult<Video> {
        let video = Video {
            id: Uuid::new_v4().to_string(),
            title: draft.title.clone(),
            description: draft.description.clone(),
            category: draft.category.clone(),
            video_url: draft.video_url.clone(),
            thumbnail_url: Some(draft.thumbnail_url.clone()),
            user_id: Some(draft.user_id.clone()),
            uploaded_by: Some(draft.uploaded_by.clone()),
            views: 0,
            created_at: Utc::now(),
        };
        self.state.write().await.videos.push(video.clone());
        Ok(video)
    }

    async fn select_comments(&self, video_id: &str) -> TubeResult<Vec<Comment>> {
        let state = self.state.read().await;
        let mut comments: Vec<Comment> = state
            .comments
            .iter()
            .filter(|c| c.video_id == video_id)
            .cloned()
            .collect();
        comments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(comments)
    }

    async fn insert_comment(&self, comment: &NewComment) -> TubeResult<Comment> {
        let comment = Comment {
            id: Uuid::new_v4().to_string(),
            video_id: comment.video_id.clone(),
            content: comment.content.clone(),
            author: comment.author.clone(),
            author_avatar: comment.author_avatar.clone(),
            created_at: Utc::now(),
            likes: 0,
            dislikes: 0,
        };
        self.state.write().await.comments.push(comment.clone());
        Ok(comment)
    }

    async fn update_comment_counters(&self, comment_id: &str, likes: u64, dislikes: u64) -> TubeResult<()> {
        let mut state = self.state.write().await;
        let comment = state
            .comments
            .iter_mut()
            .find(|c| c.id == comment_id)
            .ok_or_else(|| TubeError::NotFound("Comment not found".to_string()))?;
        comment.likes = likes;
        comment.dislikes = dislikes;
        Ok(())
    }
}

#[async_trait]
impl ViewCounter for MemoryBackend {
    async fn increment_video_views_safe(&self, video_id: &str, user_ip: Option<&str>) -> TubeResult<()> {
        let mut state = self.state.write().await;

        if let Some(ip) = user_ip {
            if !state.viewers.insert((video_id.to_string(), ip.to_string())) {
                debug!("View of {} from {} already counted", video_id, ip);
                return Ok(());
            }
        }

        let video = state
            .videos
            .iter_mut()
            .find(|v| v.id == video_id)
            .ok_or_else(|| TubeError::NotFound("Video not found".to_string()))?;
        video.views += 1;
        Ok(())
    }
}

fn sample_videos() -> Vec<Video> {
    let now = Utc::now();
    let sample = |id: &str, title: &str, description: &str, category: &str, yt: &str, views: u64, age_hours: i64| Video {
        id: id.to_string(),
        title: title.to_string(),
        description: Some(description.to_string()),
        category: category.to_string(),
        video_url: format!("https://www.youtube.com/watch?v={}", yt),
        thumbnail_url: None,
        user_id: None,
        uploaded_by: Some("Kejmiltube".to_string()),
        views,
        created_at: now - Duration::hours(age_hours),
    };

    vec![
        sample(
            "sample-1",
            "Ownership and borrowing from scratch",
            "A slow walk through moves, borrows and lifetimes.",
            "Education",
            "k1Xw2sPq0aA",
            15_400,
            72,
        ),
        sample(
            "sample-2",
            "Building a mechanical keyboard",
            "Switches, plates and an afternoon of soldering.",
            "Technology",
            "Tq9bLm3vZ8c",
            2_310_000,
            24 * 30,
        ),
        sample(
            "sample-3",
            "Speedrunning a retro platformer",
            "Route notes and the two skips that matter.",
            "Gaming",
            "Gh7pYw1rK2e",
            98_000,
            5,
        ),
        sample(
            "sample-4",
            "Sourdough for impatient people",
            "Same-day bread with a stiff starter.",
            "Cooking",
            "Cb4nUe6tF0s",
            870,
            1,
        ),
        sample(
            "sample-5",
            "Night train across the Alps",
            "Eleven hours, three borders and one very small bunk.",
            "Travel",
            "Nt2aLp5sX9d",
            44_500,
            24 * 7,
        ),
    ]
}
