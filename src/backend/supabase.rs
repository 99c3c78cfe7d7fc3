/// Supabase collaborator over HTTP
///
/// GoTrue for auth (`/auth/v1`), PostgREST for tables and procedures
/// (`/rest/v1`). Every request carries the anon key; table requests also
/// carry the user's access token once signed in so row-level policies apply.
use crate::{
    backend::{AuthBackend, AuthEvent, AuthUser, ContentBackend, SignUp, ViewCounter, AUTH_EVENT_BUFFER},
    error::{TubeError, TubeResult},
    models::{Comment, NewComment, Profile, ProfileUpdate, Video, VideoDraft, VideoFilter},
    session::persist::LocalStore,
};
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, warn};

/// Key the auth tokens are persisted under
pub const AUTH_TOKEN_KEY: &str = "kejmiltube_auth";

/// PostgreSQL unique_violation
const UNIQUE_VIOLATION: &str = "23505";

/// Connection settings for a Supabase project
#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    pub url: String,
    pub anon_key: String,
    pub user_agent: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredSession {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    user: AuthUser,
}

#[derive(Debug, Deserialize)]
struct GoTrueUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    user_metadata: Value,
}

impl From<GoTrueUser> for AuthUser {
    fn from(user: GoTrueUser) -> Self {
        let username = user
            .user_metadata
            .get("username")
            .and_then(Value::as_str)
            .map(str::to_string);
        AuthUser {
            id: user.id,
            email: user.email.unwrap_or_default(),
            username,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GoTrueSession {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    user: GoTrueUser,
}

impl From<GoTrueSession> for StoredSession {
    fn from(session: GoTrueSession) -> Self {
        StoredSession {
            access_token: session.access_token,
            refresh_token: session.refresh_token,
            user: session.user.into(),
        }
    }
}

/// Supabase-backed implementation of the collaborator traits
pub struct SupabaseBackend {
    http_client: reqwest::Client,
    base_url: String,
    anon_key: String,
    session: RwLock<Option<StoredSession>>,
    token_store: Option<LocalStore>,
    events: broadcast::Sender<AuthEvent>,
}

impl SupabaseBackend {
    pub fn new(config: SupabaseConfig) -> TubeResult<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| TubeError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        let (events, _) = broadcast::channel(AUTH_EVENT_BUFFER);

        Ok(Self {
            http_client,
            base_url: config.url.trim_end_matches('/').to_string(),
            anon_key: config.anon_key,
            session: RwLock::new(None),
            token_store: None,
            events,
        })
    }

    /// Persist auth tokens so a session survives restarts
    pub fn with_token_store(mut self, store: LocalStore) -> Self {
        self.token_store = Some(store);
        self
    }

    /// Load persisted tokens, if any, into memory
    pub async fn restore_session(&self) -> TubeResult<bool> {
        let Some(store) = &self.token_store else {
            return Ok(false);
        };

        match store.load::<StoredSession>(AUTH_TOKEN_KEY).await {
            Ok(Some(stored)) => {
                debug!("Restored auth session for {}", stored.user.id);
                *self.session.write().await = Some(stored);
                Ok(true)
            }
            Ok(None) => Ok(false),
            Err(e) => {
                warn!("Discarding unreadable auth session: {}", e);
                store.remove(AUTH_TOKEN_KEY).await?;
                Ok(false)
            }
        }
    }

    async fn set_session(&self, session: Option<StoredSession>) {
        if let Some(store) = &self.token_store {
            let result = match &session {
                Some(stored) => store.save(AUTH_TOKEN_KEY, stored).await,
                None => store.remove(AUTH_TOKEN_KEY).await,
            };
            if let Err(e) = result {
                warn!("Failed to persist auth session: {}", e);
            }
        }
        *self.session.write().await = session;
    }

    async fn bearer(&self) -> String {
        match &*self.session.read().await {
            Some(stored) => stored.access_token.clone(),
            None => self.anon_key.clone(),
        }
    }

    fn auth_request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http_client
            .request(method, format!("{}/auth/v1/{}", self.base_url, path))
            .header("apikey", &self.anon_key)
    }

    async fn rest_request(&self, method: Method, table: &str) -> RequestBuilder {
        self.http_client
            .request(method, format!("{}/rest/v1/{}", self.base_url, table))
            .header("apikey", &self.anon_key)
            .bearer_auth(self.bearer().await)
    }

    /// Insert/update returning the affected rows
    async fn write_returning<T, B>(&self, method: Method, table: &str, query: &[(&str, String)], body: &B) -> TubeResult<Vec<T>>
    where
        T: serde::de::DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let response = self
            .rest_request(method, table)
            .await
            .header("Prefer", "return=representation")
            .query(query)
            .json(body)
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    async fn select<T>(&self, table: &str, query: &[(&str, String)]) -> TubeResult<Vec<T>>
    where
        T: serde::de::DeserializeOwned,
    {
        let response = self
            .rest_request(Method::GET, table)
            .await
            .query(&[("select", "*".to_string())])
            .query(query)
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }
}

#[async_trait]
impl AuthBackend for SupabaseBackend {
    async fn current_user(&self) -> TubeResult<Option<AuthUser>> {
        let token = match &*self.session.read().await {
            Some(stored) => stored.access_token.clone(),
            None => return Ok(None),
        };

        let response = self
            .auth_request(Method::GET, "user")
            .bearer_auth(&token)
            .send()
            .await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            debug!("Stored access token rejected, clearing session");
            self.set_session(None).await;
            return Ok(None);
        }

        let user: AuthUser = check(response).await?.json::<GoTrueUser>().await?.into();

        let current = self.session.read().await.clone();
        if let Some(stored) = current {
            self.set_session(Some(StoredSession {
                user: user.clone(),
                ..stored
            }))
            .await;
        }

        Ok(Some(user))
    }

    async fn sign_in(&self, email: &str, password: &str) -> TubeResult<AuthUser> {
        let response = self
            .auth_request(Method::POST, "token")
            .query(&[("grant_type", "password")])
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;

        if response.status() == StatusCode::BAD_REQUEST {
            let message = error_message(&response.text().await.unwrap_or_default())
                .unwrap_or_else(|| "Invalid login credentials".to_string());
            return Err(TubeError::Authentication(message));
        }

        let stored: StoredSession = check(response).await?.json::<GoTrueSession>().await?.into();
        let user = stored.user.clone();
        self.set_session(Some(stored)).await;

        let _ = self.events.send(AuthEvent::SignedIn(user.clone()));
        Ok(user)
    }

    async fn sign_up(&self, email: &str, password: &str, username: &str) -> TubeResult<SignUp> {
        let response = self
            .auth_request(Method::POST, "signup")
            .json(&json!({
                "email": email,
                "password": password,
                "data": { "username": username },
            }))
            .send()
            .await?;

        if response.status() == StatusCode::UNPROCESSABLE_ENTITY {
            let body = response.text().await.unwrap_or_default();
            let message = error_message(&body).unwrap_or_else(|| body.clone());
            if message.to_lowercase().contains("already") {
                return Err(TubeError::Conflict("Email already registered".to_string()));
            }
            return Err(TubeError::Remote {
                status: 422,
                message,
            });
        }

        let body: Value = check(response).await?.json().await?;

        // Auto-confirmed projects answer with a session, others with the bare user
        if body.get("access_token").is_some() {
            let stored: StoredSession = serde_json::from_value::<GoTrueSession>(body)?.into();
            let user = stored.user.clone();
            self.set_session(Some(stored)).await;
            let _ = self.events.send(AuthEvent::SignedIn(user.clone()));
            Ok(SignUp::Confirmed(user))
        } else {
            Ok(SignUp::PendingConfirmation {
                email: email.to_string(),
            })
        }
    }

    async fn sign_out(&self) -> TubeResult<()> {
        let current = self.session.read().await.clone();
        let Some(stored) = current else {
            return Ok(());
        };

        self.set_session(None).await;
        let _ = self.events.send(AuthEvent::SignedOut);

        let response = self
            .auth_request(Method::POST, "logout")
            .bearer_auth(&stored.access_token)
            .send()
            .await?;

        match response.status() {
            // Token already invalid on the server side
            StatusCode::UNAUTHORIZED | StatusCode::NOT_FOUND => Ok(()),
            _ => check(response).await.map(|_| ()),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}

#[async_trait]
impl ContentBackend for SupabaseBackend {
    async fn fetch_profile(&self, user_id: &str) -> TubeResult<Option<Profile>> {
        let rows: Vec<Profile> = self
            .select("profiles", &[("id", format!("eq.{}", user_id)), ("limit", "1".to_string())])
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn username_taken(&self, username: &str) -> TubeResult<bool> {
        let rows: Vec<serde_json::Value> = self
            .select(
                "profiles",
                &[("username", format!("eq.{}", username)), ("limit", "1".to_string())],
            )
            .await?;
        Ok(!rows.is_empty())
    }

    async fn upsert_profile(&self, profile: &Profile) -> TubeResult<Profile> {
        let response = self
            .rest_request(Method::POST, "profiles")
            .await
            .header("Prefer", "resolution=merge-duplicates,return=representation")
            .json(&json!({
                "id": profile.id,
                "username": profile.username,
                "avatar_url": profile.avatar_url,
            }))
            .send()
            .await?;

        let rows: Vec<Profile> = check(response).await?.json().await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| TubeError::Internal("Profile upsert returned no rows".to_string()))
    }

    async fn update_profile(&self, user_id: &str, update: &ProfileUpdate) -> TubeResult<Profile> {
        let rows: Vec<Profile> = self
            .write_returning(Method::PATCH, "profiles", &[("id", format!("eq.{}", user_id))], update)
            .await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| TubeError::NotFound("Profile not found".to_string()))
    }

    async fn select_videos(&self, filter: &VideoFilter) -> TubeResult<Vec<Video>> {
        let mut query = vec![("order", "created_at.desc".to_string())];
        if let Some(user_id) = &filter.user_id {
            query.push(("user_id", format!("eq.{}", user_id)));
        }
        if let Some(category) = &filter.category {
            query.push(("category", format!("eq.{}", category)));
        }
        self.select("videos", &query).await
    }

    async fn select_video(&self, video_id: &str) -> TubeResult<Option<Video>> {
        let rows: Vec<Video> = self
            .select("videos", &[("id", format!("eq.{}", video_id)), ("limit", "1".to_string())])
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn insert_video(&self, draft: &VideoDraft) -> TubeResult<Video> {
        let rows: Vec<Video> = self
            .write_returning(Method::POST, "videos", &[], std::slice::from_ref(draft))
            .await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| TubeError::Internal("Video insert returned no rows".to_string()))
    }

    async fn select_comments(&self, video_id: &str) -> TubeResult<Vec<Comment>> {
        self.select(
            "comments",
            &[
                ("video_id", format!("eq.{}", video_id)),
                ("order", "created_at.desc".to_string()),
            ],
        )
        .await
    }

    async fn insert_comment(&self, comment: &NewComment) -> TubeResult<Comment> {
        let rows: Vec<Comment> = self
            .write_returning(Method::POST, "comments", &[], std::slice::from_ref(comment))
            .await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| TubeError::Internal("Comment insert returned no rows".to_string()))
    }

    async fn update_comment_counters(&self, comment_id: &str, likes: u64, dislikes: u64) -> TubeResult<()> {
        let response = self
            .rest_request(Method::PATCH, "comments")
            .await
            .header("Prefer", "return=minimal")
            .query(&[("id", format!("eq.{}", comment_id))])
            .json(&json!({ "likes": likes, "dislikes": dislikes }))
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }
}

#[async_trait]
impl ViewCounter for SupabaseBackend {
    async fn increment_video_views_safe(&self, video_id: &str, user_ip: Option<&str>) -> TubeResult<()> {
        let response = self
            .rest_request(Method::POST, "rpc/increment_video_views_safe")
            .await
            .json(&json!({ "video_id": video_id, "user_ip": user_ip }))
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }
}

async fn check(response: Response) -> TubeResult<Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    Err(classify_error(status, &body))
}

/// Map an error response onto the error taxonomy
fn classify_error(status: u16, body: &str) -> TubeError {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let code = parsed
        .as_ref()
        .and_then(|v| v.get("code"))
        .and_then(Value::as_str)
        .map(str::to_string);
    let message = error_message(body).unwrap_or_else(|| {
        StatusCode::from_u16(status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("Unknown error")
            .to_string()
    });

    if status == 409 || code.as_deref() == Some(UNIQUE_VIOLATION) {
        return TubeError::Conflict(message);
    }

    match status {
        401 | 403 => TubeError::Authentication(message),
        404 => TubeError::NotFound(message),
        _ => TubeError::Remote { status, message },
    }
}

/// First human-readable field of a GoTrue or PostgREST error body
fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ["message", "msg", "error_description", "error"]
        .iter()
        .find_map(|field| value.get(*field).and_then(Value::as_str))
        .map(str::to_string)
}
