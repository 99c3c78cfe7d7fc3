/// Form handlers
///
/// Each handler validates its input, calls into the session or content
/// layer and turns every outcome into a [`Notice`] for the user. Nothing
/// here returns an error.
use crate::{
    content::{ChannelStats, ContentRepository},
    error::TubeError,
    models::{Comment, NewVideo, Profile, ProfileUpdate, Video},
    session::{Registration, SessionStore},
    validation::{sanitize_input, validate_email, validate_password, validate_username},
};
use serde::Serialize;
use std::fmt;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NoticeKind {
    Success,
    Error,
}

/// Toast-style message shown after a form submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub title: String,
    pub description: String,
    pub kind: NoticeKind,
}

impl Notice {
    pub fn success(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            kind: NoticeKind::Success,
        }
    }

    pub fn error(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            kind: NoticeKind::Error,
        }
    }

    pub fn is_error(&self) -> bool {
        self.kind == NoticeKind::Error
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.description.is_empty() {
            write!(f, "{}", self.title)
        } else {
            write!(f, "{}: {}", self.title, self.description)
        }
    }
}

/// Notice plus the value produced on success
#[derive(Debug, Clone)]
pub struct Submission<T> {
    pub notice: Notice,
    pub value: Option<T>,
}

impl<T> Submission<T> {
    fn ok(value: T, notice: Notice) -> Self {
        Self {
            notice,
            value: Some(value),
        }
    }

    fn failed(notice: Notice) -> Self {
        Self { notice, value: None }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RegisterForm {
    pub email: String,
    pub username: String,
    pub password: String,
    pub confirm_password: String,
}

#[derive(Debug, Clone, Default)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

/// Signed-in user's channel page
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileOverview {
    pub profile: Profile,
    pub stats: ChannelStats,
}

pub async fn submit_register(session: &SessionStore, form: &RegisterForm) -> Submission<Registration> {
    if form.email.trim().is_empty() || form.username.trim().is_empty() || form.password.is_empty() {
        return Submission::failed(Notice::error("Missing fields", "Fill in all fields"));
    }
    if form.password != form.confirm_password {
        return Submission::failed(Notice::error("Registration failed", "Passwords do not match"));
    }

    let email = form.email.trim().to_lowercase();
    let username = sanitize_input(&form.username);

    if !validate_email(&email) {
        return Submission::failed(Notice::error("Invalid email", "Enter a valid email address"));
    }
    if !validate_username(&username) {
        return Submission::failed(Notice::error(
            "Invalid username",
            "Use 3-30 characters: letters, digits and underscores",
        ));
    }
    let password = validate_password(&form.password);
    if !password.valid {
        return Submission::failed(Notice::error("Weak password", password.errors.join(", ")));
    }

    match session.try_register(&email, &form.password, &username).await {
        Ok(registration @ Registration::SignedIn(_)) => Submission::ok(
            registration,
            Notice::success("Account created", format!("Welcome to Kejmiltube, {}!", username)),
        ),
        Ok(registration @ Registration::PendingConfirmation { .. }) => Submission::ok(
            registration,
            Notice::success("Account created", "Check your email to confirm your account"),
        ),
        Err(e) => {
            warn!("Registration failed: {}", e);
            Submission::failed(Notice::error("Registration failed", e.user_message()))
        }
    }
}

pub async fn submit_login(session: &SessionStore, form: &LoginForm) -> Submission<Profile> {
    if form.email.trim().is_empty() || form.password.is_empty() {
        return Submission::failed(Notice::error("Missing fields", "Fill in all fields"));
    }

    let email = form.email.trim().to_lowercase();
    if !validate_email(&email) {
        return Submission::failed(Notice::error("Invalid email", "Enter a valid email address"));
    }

    match session.try_login(&email, &form.password).await {
        Ok(profile) => {
            let notice = Notice::success("Signed in", format!("Welcome back, {}!", profile.username));
            Submission::ok(profile, notice)
        }
        Err(TubeError::Authentication(_)) => {
            Submission::failed(Notice::error("Sign-in failed", "Invalid email or password"))
        }
        Err(e) => {
            warn!("Login failed: {}", e);
            Submission::failed(Notice::error("Sign-in failed", e.user_message()))
        }
    }
}

pub async fn submit_upload(session: &SessionStore, content: &ContentRepository, video: NewVideo) -> Submission<Video> {
    let Some(owner) = session.current_profile() else {
        return Submission::failed(Notice::error(
            "Sign in required",
            "You must be signed in to upload videos",
        ));
    };

    if video.title.trim().is_empty() || video.video_url.trim().is_empty() || video.category.trim().is_empty() {
        return Submission::failed(Notice::error(
            "Missing fields",
            "Title, video link and category are required",
        ));
    }

    match content.create_video(video, &owner).await {
        Ok(created) => {
            let notice = Notice::success("Video uploaded", format!("\"{}\" is now live", created.title));
            Submission::ok(created, notice)
        }
        Err(TubeError::Validation(messages)) => {
            Submission::failed(Notice::error("Invalid video details", messages.join(", ")))
        }
        Err(e) => {
            warn!("Upload failed: {}", e);
            Submission::failed(Notice::error("Upload failed", e.user_message()))
        }
    }
}

pub async fn submit_profile(session: &SessionStore, username: &str) -> Submission<Profile> {
    let username = username.trim();
    if !validate_username(username) {
        return Submission::failed(Notice::error(
            "Invalid username",
            "Use 3-30 characters: letters, digits and underscores",
        ));
    }

    match session.try_update_profile(&ProfileUpdate::username(username)).await {
        Ok(profile) => Submission::ok(profile, Notice::success("Profile updated", "")),
        Err(TubeError::Conflict(_)) => Submission::failed(Notice::error(
            "Username taken",
            "That username is already in use",
        )),
        Err(e) => {
            warn!("Profile update failed: {}", e);
            Submission::failed(Notice::error("Update failed", e.user_message()))
        }
    }
}

pub async fn submit_comment(
    session: &SessionStore,
    content: &ContentRepository,
    video_id: &str,
    text: &str,
) -> Submission<Comment> {
    let author = session.current_profile();

    match content.create_comment(video_id, text, author.as_ref()).await {
        Ok(comment) => Submission::ok(comment, Notice::success("Comment added", "")),
        Err(TubeError::Validation(messages)) => {
            Submission::failed(Notice::error("Invalid comment", messages.join(", ")))
        }
        Err(e) => {
            warn!("Comment failed: {}", e);
            Submission::failed(Notice::error("Comment failed", e.user_message()))
        }
    }
}

/// Channel page for the signed-in user; stats fall back to zero on failure
pub async fn profile_overview(session: &SessionStore, content: &ContentRepository) -> Option<ProfileOverview> {
    let profile = session.current_profile()?;

    let stats = match content.channel_stats(&profile.id).await {
        Ok(stats) => stats,
        Err(e) => {
            warn!("Failed to load channel stats for {}: {}", profile.id, e);
            ChannelStats::default()
        }
    };

    Some(ProfileOverview { profile, stats })
}
