/// Session store
///
/// Owns the notion of "who is signed in". State is published through a
/// watch channel; consumers subscribe and react to changes instead of
/// asking synchronously. Remote auth changes arrive on the collaborator's
/// broadcast stream and are folded in by a listener task.

pub mod persist;

use crate::{
    backend::{AuthBackend, AuthEvent, AuthUser, ContentBackend, SignUp},
    error::{TubeError, TubeResult},
    models::{Profile, ProfileUpdate},
    validation::{username_with_suffix, validate_username},
};
use persist::LocalStore;
use std::sync::{Arc, Mutex};
use tokio::{
    sync::{broadcast::error::RecvError, watch},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

/// Suffixed variants tried before giving up on a derived username
const USERNAME_ATTEMPTS: usize = 100;

/// Who is signed in, as far as this client knows
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    /// Not yet initialized
    Unknown,
    /// Resolving an existing session
    Loading,
    Authenticated(Profile),
    Anonymous,
}

impl SessionState {
    pub fn profile(&self) -> Option<&Profile> {
        match self {
            SessionState::Authenticated(profile) => Some(profile),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated(_))
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, SessionState::Unknown | SessionState::Loading)
    }
}

/// Outcome of a successful registration
#[derive(Debug, Clone, PartialEq)]
pub enum Registration {
    SignedIn(Profile),
    /// Account created, email confirmation required before sign-in
    PendingConfirmation { email: String },
}

pub struct SessionStore {
    auth: Arc<dyn AuthBackend>,
    content: Arc<dyn ContentBackend>,
    local: Option<LocalStore>,
    storage_key: String,
    state: watch::Sender<SessionState>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl SessionStore {
    pub fn new(auth: Arc<dyn AuthBackend>, content: Arc<dyn ContentBackend>) -> Self {
        let (state, _) = watch::channel(SessionState::Unknown);
        Self {
            auth,
            content,
            local: None,
            storage_key: crate::config::SESSION_STORAGE_KEY.to_string(),
            state,
            listener: Mutex::new(None),
        }
    }

    /// Persist the signed-in profile locally and bootstrap from it on start
    pub fn with_local_store(mut self, local: LocalStore, storage_key: impl Into<String>) -> Self {
        self.local = Some(local);
        self.storage_key = storage_key.into();
        self
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn current(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn current_profile(&self) -> Option<Profile> {
        self.state.borrow().profile().cloned()
    }

    fn publish(&self, state: SessionState) {
        self.state.send_replace(state);
    }

    /// Resolve an existing session and publish the result
    pub async fn initialize(&self) {
        self.publish(SessionState::Loading);

        let resolved = match self.auth.current_user().await {
            Ok(Some(user)) => match self.resolve_profile(&user).await {
                Ok(profile) => Some(profile),
                Err(e) => {
                    warn!("Failed to load profile for {}: {}", user.id, e);
                    None
                }
            },
            Ok(None) => self.restore_local().await,
            Err(e) => {
                warn!("Failed to resolve existing session: {}", e);
                self.restore_local().await
            }
        };

        match resolved {
            Some(profile) => {
                info!("Session restored for {}", profile.username);
                self.publish(SessionState::Authenticated(profile));
            }
            None => self.publish(SessionState::Anonymous),
        }
    }

    async fn restore_local(&self) -> Option<Profile> {
        let local = self.local.as_ref()?;

        let profile: Profile = match local.load(&self.storage_key).await {
            Ok(profile) => profile?,
            Err(e) => {
                warn!("Ignoring unreadable persisted profile: {}", e);
                return None;
            }
        };

        // Make the mock backend aware of the restored identity
        if let Err(e) = self.content.upsert_profile(&profile).await {
            debug!("Could not register restored profile: {}", e);
        }

        Some(profile)
    }

    /// Profile row for an auth identity, created on first sight
    async fn resolve_profile(&self, user: &AuthUser) -> TubeResult<Profile> {
        let mut profile = match self.content.fetch_profile(&user.id).await? {
            Some(profile) => profile,
            None => {
                let username = self.free_username(&user.display_username()).await?;
                let fresh = Profile::new(&user.id, &user.email, username);
                match self.content.upsert_profile(&fresh).await {
                    Ok(stored) => stored,
                    Err(e) => {
                        warn!("Failed to create profile for {}: {}", user.id, e);
                        fresh
                    }
                }
            }
        };

        if profile.email.is_empty() {
            profile.email = user.email.clone();
        }
        Ok(profile)
    }

    /// First unused variant of `base`: `base`, `base_2`, `base_3`, ...
    async fn free_username(&self, base: &str) -> TubeResult<String> {
        for n in 1..=USERNAME_ATTEMPTS {
            let candidate = if n == 1 {
                base.to_string()
            } else {
                username_with_suffix(base, n)
            };
            if !self.content.username_taken(&candidate).await? {
                return Ok(candidate);
            }
        }
        Err(TubeError::Conflict(format!("No free username derived from {}", base)))
    }

    /// Profile for a freshly signed-in user. On failure the remote session
    /// is closed again so auth and local state agree
    async fn resolve_or_sign_out(&self, user: &AuthUser) -> TubeResult<Profile> {
        match self.resolve_profile(user).await {
            Ok(profile) => Ok(profile),
            Err(e) => {
                if let Err(sign_out) = self.auth.sign_out().await {
                    warn!("Failed to close session for {}: {}", user.id, sign_out);
                }
                Err(e)
            }
        }
    }

    async fn sign_in_locally(&self, profile: Profile) {
        if let Some(local) = &self.local {
            if let Err(e) = local.save(&self.storage_key, &profile).await {
                warn!("Failed to persist session: {}", e);
            }
        }
        self.publish(SessionState::Authenticated(profile));
    }

    async fn clear_local(&self) {
        if let Some(local) = &self.local {
            if let Err(e) = local.remove(&self.storage_key).await {
                warn!("Failed to remove persisted session: {}", e);
            }
        }
    }

    pub async fn try_login(&self, email: &str, password: &str) -> TubeResult<Profile> {
        let user = self.auth.sign_in(email, password).await?;
        let profile = self.resolve_or_sign_out(&user).await?;
        info!("User {} signed in", profile.username);
        self.sign_in_locally(profile.clone()).await;
        Ok(profile)
    }

    /// Sign in; failures are logged and reported as `false`
    pub async fn login(&self, email: &str, password: &str) -> bool {
        match self.try_login(email, password).await {
            Ok(_) => true,
            Err(e) => {
                warn!("Login failed: {}", e);
                false
            }
        }
    }

    pub async fn try_register(&self, email: &str, password: &str, username: &str) -> TubeResult<Registration> {
        match self.auth.sign_up(email, password, username).await? {
            SignUp::Confirmed(user) => {
                let profile = self.resolve_or_sign_out(&user).await?;
                info!("Registered and signed in {}", profile.username);
                self.sign_in_locally(profile.clone()).await;
                Ok(Registration::SignedIn(profile))
            }
            SignUp::PendingConfirmation { email } => {
                info!("Registration pending email confirmation for {}", email);
                Ok(Registration::PendingConfirmation { email })
            }
        }
    }

    /// Register; a pending confirmation still counts as success
    pub async fn register(&self, email: &str, password: &str, username: &str) -> bool {
        match self.try_register(email, password, username).await {
            Ok(_) => true,
            Err(e) => {
                warn!("Registration failed: {}", e);
                false
            }
        }
    }

    /// Sign out locally and remotely. Idempotent; remote failures are only logged
    pub async fn logout(&self) {
        if let Some(profile) = self.current_profile() {
            info!("User {} signed out", profile.username);
        }
        self.publish(SessionState::Anonymous);
        self.clear_local().await;

        if let Err(e) = self.auth.sign_out().await {
            warn!("Remote sign-out failed: {}", e);
        }
    }

    /// Update the signed-in profile; a taken username is `TubeError::Conflict`
    pub async fn try_update_profile(&self, update: &ProfileUpdate) -> TubeResult<Profile> {
        let current = self
            .current_profile()
            .ok_or_else(|| TubeError::Authentication("Not signed in".to_string()))?;

        if update.is_empty() {
            return Ok(current);
        }

        if let Some(username) = &update.username {
            if !validate_username(username) {
                return Err(TubeError::Validation(vec![
                    "Username must be 3-30 characters: letters, digits and underscores".to_string(),
                ]));
            }
        }

        let mut updated = self.content.update_profile(&current.id, update).await?;
        if updated.email.is_empty() {
            updated.email = current.email;
        }

        self.sign_in_locally(updated.clone()).await;
        Ok(updated)
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> bool {
        match self.try_update_profile(update).await {
            Ok(_) => true,
            Err(e) => {
                warn!("Profile update failed: {}", e);
                false
            }
        }
    }

    /// Follow remote auth changes until `shutdown`
    pub fn start_listening(self: &Arc<Self>) {
        let Ok(mut listener) = self.listener.lock() else {
            return;
        };
        if listener.is_some() {
            return;
        }

        let mut events = self.auth.subscribe();
        let store = Arc::downgrade(self);

        *listener = Some(tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        let Some(store) = store.upgrade() else {
                            break;
                        };
                        store.handle_event(event).await;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Auth listener lagged, skipped {} events", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            debug!("Auth listener stopped");
        }));
    }

    /// Stop following remote auth changes
    pub fn shutdown(&self) {
        if let Ok(mut listener) = self.listener.lock() {
            if let Some(handle) = listener.take() {
                handle.abort();
            }
        }
    }

    async fn handle_event(&self, event: AuthEvent) {
        match event {
            AuthEvent::SignedIn(user) => {
                if self.current_profile().is_some_and(|p| p.id == user.id) {
                    return;
                }

                // Stale if a logout raced ahead of this event
                match self.auth.current_user().await {
                    Ok(Some(current)) if current.id == user.id => {}
                    _ => return,
                }

                match self.resolve_profile(&user).await {
                    Ok(profile) => self.sign_in_locally(profile).await,
                    Err(e) => warn!("Failed to load profile after sign-in: {}", e),
                }
            }
            AuthEvent::UserUpdated(user) => {
                if !self.current_profile().is_some_and(|p| p.id == user.id) {
                    return;
                }
                match self.resolve_profile(&user).await {
                    Ok(profile) => self.sign_in_locally(profile).await,
                    Err(e) => warn!("Failed to refresh profile: {}", e),
                }
            }
            AuthEvent::SignedOut => {
                if self.current().is_authenticated() {
                    info!("Signed out by the auth provider");
                    self.publish(SessionState::Anonymous);
                    self.clear_local().await;
                }
            }
        }
    }
}

impl Drop for SessionStore {
    fn drop(&mut self) {
        self.shutdown();
    }
}
