/// Application context and dependency injection
use crate::{
    backend::{
        AuthBackend, ContentBackend, HttpIpLookup, IpLookup, MemoryBackend, SupabaseBackend, SupabaseConfig,
        ViewCounter,
    },
    config::{BackendConfig, ClientConfig},
    content::ContentRepository,
    engagement::EngagementReconciler,
    error::{TubeError, TubeResult},
    session::{persist::LocalStore, SessionStore},
};
use std::sync::Arc;
use tracing::info;

/// Shared services for one running client
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ClientConfig>,
    pub session: Arc<SessionStore>,
    pub content: Arc<ContentRepository>,
    pub engagement: Arc<EngagementReconciler>,
}

/// Collaborator set the services are built from
pub struct Backends {
    pub auth: Arc<dyn AuthBackend>,
    pub content: Arc<dyn ContentBackend>,
    pub views: Arc<dyn ViewCounter>,
    pub ip_lookup: Arc<dyn IpLookup>,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: ClientConfig) -> TubeResult<Self> {
        config.validate()?;
        Self::ensure_directories(&config).await?;

        let local = LocalStore::new(&config.storage.data_directory);
        let ip_lookup = Arc::new(HttpIpLookup::new(
            &config.engagement.ip_lookup_url,
            &config.http.user_agent,
            config.http.timeout_secs,
        )?);

        let (backends, profile_store) = match &config.backend {
            BackendConfig::Supabase { url, anon_key } => {
                info!("Using Supabase backend at {}", url);
                let supabase = SupabaseBackend::new(SupabaseConfig {
                    url: url.clone(),
                    anon_key: anon_key.clone(),
                    user_agent: config.http.user_agent.clone(),
                    timeout_secs: config.http.timeout_secs,
                })?
                .with_token_store(local);
                supabase.restore_session().await?;

                let supabase = Arc::new(supabase);
                let backends = Backends {
                    auth: supabase.clone(),
                    content: supabase.clone(),
                    views: supabase,
                    ip_lookup,
                };
                (backends, None)
            }
            BackendConfig::Memory { seed_sample_videos } => {
                info!("Using in-memory backend");
                let memory = Arc::new(if *seed_sample_videos {
                    MemoryBackend::with_sample_videos()
                } else {
                    MemoryBackend::new()
                });
                let backends = Backends {
                    auth: memory.clone(),
                    content: memory.clone(),
                    views: memory,
                    ip_lookup,
                };
                // The mock has no session of its own; bootstrap from the persisted profile
                (backends, Some(local))
            }
        };

        Ok(Self::from_backends(config, backends, profile_store))
    }

    /// Wire services over explicit collaborators
    pub fn from_backends(config: ClientConfig, backends: Backends, profile_store: Option<LocalStore>) -> Self {
        let mut session = SessionStore::new(backends.auth, backends.content.clone());
        if let Some(store) = profile_store {
            session = session.with_local_store(store, config.storage.session_key.clone());
        }

        let engagement = EngagementReconciler::new(
            backends.content.clone(),
            backends.views,
            backends.ip_lookup,
            config.engagement.view_tracking,
        );

        Self {
            config: Arc::new(config),
            session: Arc::new(session),
            content: Arc::new(ContentRepository::new(backends.content)),
            engagement: Arc::new(engagement),
        }
    }

    /// Resolve the current session and start following auth changes
    pub async fn start(&self) {
        self.session.initialize().await;
        self.session.start_listening();
    }

    pub fn shutdown(&self) {
        self.session.shutdown();
    }

    /// Ensure required directories exist
    async fn ensure_directories(config: &ClientConfig) -> TubeResult<()> {
        let dir = &config.storage.data_directory;
        if !dir.exists() {
            tokio::fs::create_dir_all(dir).await.map_err(|e| {
                TubeError::Internal(format!("Failed to create directory {:?}: {}", dir, e))
            })?;
        }
        Ok(())
    }

    /// Share link for a video page
    pub fn video_link(&self, video_id: &str) -> String {
        self.config.video_link(video_id)
    }
}
