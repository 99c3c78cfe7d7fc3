/// View and reaction reconciliation
///
/// Views are fire-and-forget: one RPC per watch, with the caller's public IP
/// as a de-duplication hint. Reactions are applied locally first, then
/// confirmed against the backend or reverted if the write fails.
use crate::{
    backend::{ContentBackend, IpLookup, ViewCounter},
    error::TubeResult,
    models::Comment,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::{sync::RwLock, task::JoinHandle};
use tracing::{debug, warn};

/// Something a viewer can react to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ReactionTarget {
    Video(String),
    Comment(String),
}

/// The viewer's own reaction to a target
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum Reaction {
    #[default]
    None,
    Liked,
    Disliked,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReactionCounts {
    pub likes: u64,
    pub dislikes: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct ReactionEntry {
    counts: ReactionCounts,
    reaction: Reaction,
}

impl ReactionEntry {
    fn like(self) -> Self {
        let ReactionCounts { likes, dislikes } = self.counts;
        match self.reaction {
            Reaction::Liked => Self {
                counts: ReactionCounts { likes: likes.saturating_sub(1), dislikes },
                reaction: Reaction::None,
            },
            Reaction::None => Self {
                counts: ReactionCounts { likes: likes + 1, dislikes },
                reaction: Reaction::Liked,
            },
            Reaction::Disliked => Self {
                counts: ReactionCounts { likes: likes + 1, dislikes: dislikes.saturating_sub(1) },
                reaction: Reaction::Liked,
            },
        }
    }

    fn dislike(self) -> Self {
        let ReactionCounts { likes, dislikes } = self.counts;
        match self.reaction {
            Reaction::Disliked => Self {
                counts: ReactionCounts { likes, dislikes: dislikes.saturating_sub(1) },
                reaction: Reaction::None,
            },
            Reaction::None => Self {
                counts: ReactionCounts { likes, dislikes: dislikes + 1 },
                reaction: Reaction::Disliked,
            },
            Reaction::Liked => Self {
                counts: ReactionCounts { likes: likes.saturating_sub(1), dislikes: dislikes + 1 },
                reaction: Reaction::Disliked,
            },
        }
    }
}

/// Local state of one target. Every local change gets a fresh generation,
/// so a revert can tell whether its change is still the latest
#[derive(Debug, Clone, Copy, Default)]
struct Tracked {
    entry: ReactionEntry,
    generation: u64,
    issued: u64,
}

impl Tracked {
    fn bump(&mut self) -> u64 {
        self.issued += 1;
        self.generation = self.issued;
        self.generation
    }
}

/// A locally applied reaction awaiting confirmation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingReaction {
    pub target: ReactionTarget,
    previous: ReactionEntry,
    applied: ReactionEntry,
    previous_generation: u64,
    generation: u64,
}

impl PendingReaction {
    pub fn counts(&self) -> ReactionCounts {
        self.applied.counts
    }

    pub fn reaction(&self) -> Reaction {
        self.applied.reaction
    }
}

pub struct EngagementReconciler {
    content: Arc<dyn ContentBackend>,
    views: Arc<dyn ViewCounter>,
    ip_lookup: Arc<dyn IpLookup>,
    view_tracking: bool,
    entries: RwLock<HashMap<ReactionTarget, Tracked>>,
}

impl EngagementReconciler {
    pub fn new(
        content: Arc<dyn ContentBackend>,
        views: Arc<dyn ViewCounter>,
        ip_lookup: Arc<dyn IpLookup>,
        view_tracking: bool,
    ) -> Self {
        Self {
            content,
            views,
            ip_lookup,
            view_tracking,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Count a view in the background; the handle is only useful to tests
    pub fn increment_view(self: &Arc<Self>, video_id: &str) -> JoinHandle<()> {
        let reconciler = Arc::clone(self);
        let video_id = video_id.to_string();
        tokio::spawn(async move { reconciler.record_view(&video_id).await })
    }

    /// Count a view and wait for the attempt. Failures are logged, never returned
    pub async fn record_view(&self, video_id: &str) {
        if !self.view_tracking {
            return;
        }

        let user_ip = match self.ip_lookup.public_ip().await {
            Ok(ip) => Some(ip),
            Err(e) => {
                debug!("IP lookup failed, counting view without it: {}", e);
                None
            }
        };

        if let Err(e) = self
            .views
            .increment_video_views_safe(video_id, user_ip.as_deref())
            .await
        {
            warn!("Failed to record view for {}: {}", video_id, e);
        }
    }

    /// Seed baseline counts for a target the viewer has not reacted to yet
    pub async fn track(&self, target: ReactionTarget, counts: ReactionCounts) {
        let mut entries = self.entries.write().await;
        let tracked = entries.entry(target).or_default();
        if tracked.entry.reaction == Reaction::None && tracked.entry.counts != counts {
            tracked.entry.counts = counts;
            tracked.bump();
        }
    }

    pub async fn track_comments(&self, comments: &[Comment]) {
        for comment in comments {
            self.track(
                ReactionTarget::Comment(comment.id.clone()),
                ReactionCounts {
                    likes: comment.likes,
                    dislikes: comment.dislikes,
                },
            )
            .await;
        }
    }

    pub async fn counts(&self, target: &ReactionTarget) -> ReactionCounts {
        self.entries
            .read()
            .await
            .get(target)
            .map(|t| t.entry.counts)
            .unwrap_or_default()
    }

    pub async fn reaction(&self, target: &ReactionTarget) -> Reaction {
        self.entries
            .read()
            .await
            .get(target)
            .map(|t| t.entry.reaction)
            .unwrap_or_default()
    }

    /// First phase: update local state only
    pub async fn apply_like(&self, target: &ReactionTarget) -> PendingReaction {
        self.apply(target, ReactionEntry::like).await
    }

    pub async fn apply_dislike(&self, target: &ReactionTarget) -> PendingReaction {
        self.apply(target, ReactionEntry::dislike).await
    }

    async fn apply(&self, target: &ReactionTarget, step: fn(ReactionEntry) -> ReactionEntry) -> PendingReaction {
        let mut entries = self.entries.write().await;
        let tracked = entries.entry(target.clone()).or_default();
        let previous = tracked.entry;
        let previous_generation = tracked.generation;
        tracked.entry = step(previous);
        let generation = tracked.bump();

        PendingReaction {
            target: target.clone(),
            previous,
            applied: tracked.entry,
            previous_generation,
            generation,
        }
    }

    /// Second phase: persist the applied counters, reverting on failure
    pub async fn confirm(&self, pending: PendingReaction) -> TubeResult<ReactionCounts> {
        let result = match &pending.target {
            ReactionTarget::Comment(comment_id) => {
                self.content
                    .update_comment_counters(comment_id, pending.applied.counts.likes, pending.applied.counts.dislikes)
                    .await
            }
            // Video reactions live only in this session
            ReactionTarget::Video(_) => Ok(()),
        };

        match result {
            Ok(()) => Ok(pending.applied.counts),
            Err(e) => {
                warn!("Failed to persist reaction on {:?}: {}", pending.target, e);
                self.revert(&pending).await;
                Err(e)
            }
        }
    }

    /// Restore the state before `pending`, unless something newer replaced it
    pub async fn revert(&self, pending: &PendingReaction) {
        let mut entries = self.entries.write().await;
        if let Some(tracked) = entries.get_mut(&pending.target) {
            if tracked.generation == pending.generation {
                tracked.entry = pending.previous;
                tracked.generation = pending.previous_generation;
            } else {
                debug!("Skipping revert of {:?}, superseded", pending.target);
            }
        }
    }

    pub async fn toggle_like(&self, target: &ReactionTarget) -> TubeResult<ReactionCounts> {
        let pending = self.apply_like(target).await;
        self.confirm(pending).await
    }

    pub async fn toggle_dislike(&self, target: &ReactionTarget) -> TubeResult<ReactionCounts> {
        let pending = self.apply_dislike(target).await;
        self.confirm(pending).await
    }
}
