use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use scrapewise_core::{Result, ScrapeError, Slot};

use crate::config::ConversationConfig;
use crate::session::{ConversationSession, ConversationTurn};
use crate::summary::SessionSummary;

type SessionHandle = Arc<Mutex<ConversationSession>>;

/// Exclusive access to one session for the duration of a turn.
///
/// While held, the sweeper will not evict the session and other turns for
/// the same session wait in arrival order.
pub struct SessionTurn {
    guard: OwnedMutexGuard<ConversationSession>,
    fresh: bool,
}

impl SessionTurn {
    /// True when this turn started a new (or expired and restarted) session.
    pub fn is_fresh(&self) -> bool {
        self.fresh
    }

    pub fn record(&mut self, turn: ConversationTurn) {
        self.guard.apply_turn(turn, Utc::now());
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary::from_session(&self.guard)
    }
}

impl Deref for SessionTurn {
    type Target = ConversationSession;

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

impl DerefMut for SessionTurn {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.guard
    }
}

/// Session table keyed by session id.
///
/// The map lock is only held to look up or insert handles; all turn work
/// happens under the per-session mutex.
pub struct ConversationManager {
    config: ConversationConfig,
    sessions: RwLock<HashMap<String, SessionHandle>>,
}

impl ConversationManager {
    pub fn new(config: ConversationConfig) -> Self {
        Self {
            config,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &ConversationConfig {
        &self.config
    }

    /// Create the session if it does not exist. Returns true if created.
    pub fn start(&self, session_id: &str) -> bool {
        self.start_at(session_id, Utc::now())
    }

    pub fn start_at(&self, session_id: &str, now: DateTime<Utc>) -> bool {
        let mut sessions = self.sessions.write();
        if sessions.contains_key(session_id) {
            return false;
        }
        sessions.insert(
            session_id.to_string(),
            Arc::new(Mutex::new(ConversationSession::new(
                session_id,
                now,
                self.config.max_turns,
            ))),
        );
        debug!(session_id, "Session started");
        true
    }

    /// Lock the session for a turn, starting it if needed. A session that has
    /// outlived its TTL without being swept yet is reset first.
    pub async fn begin_turn(&self, session_id: &str) -> SessionTurn {
        let created = self.start(session_id);
        let handle = self.handle(session_id).unwrap_or_else(|| {
            // Evicted between start and lookup; start over with a fresh handle.
            let handle = Arc::new(Mutex::new(ConversationSession::new(
                session_id,
                Utc::now(),
                self.config.max_turns,
            )));
            self.sessions
                .write()
                .entry(session_id.to_string())
                .or_insert_with(|| Arc::clone(&handle))
                .clone()
        });

        let mut guard = handle.lock_owned().await;
        let now = Utc::now();
        let mut fresh = created;
        if guard.is_expired(now, self.config.ttl()) {
            info!(session_id, "Session expired before sweep, starting fresh");
            guard.reset(now);
            fresh = true;
        }
        SessionTurn { guard, fresh }
    }

    pub async fn record_turn(&self, session_id: &str, turn: ConversationTurn) -> Result<()> {
        let handle = self
            .handle(session_id)
            .ok_or_else(|| ScrapeError::InvalidRequest(format!("unknown session: {}", session_id)))?;
        handle.lock().await.apply_turn(turn, Utc::now());
        Ok(())
    }

    pub async fn current_unresolved(&self, session_id: &str) -> Vec<Slot> {
        match self.handle(session_id) {
            Some(handle) => handle.lock().await.unresolved().to_vec(),
            None => Vec::new(),
        }
    }

    pub async fn summarize(&self, session_id: &str) -> Option<SessionSummary> {
        let handle = self.handle(session_id)?;
        let session = handle.lock().await;
        Some(SessionSummary::from_session(&session))
    }

    pub fn evict_expired(&self) -> usize {
        self.evict_expired_at(Utc::now())
    }

    /// Remove every session idle for longer than the TTL as of `now`.
    /// Sessions that are mid-turn, or have a turn waiting, are skipped.
    pub fn evict_expired_at(&self, now: DateTime<Utc>) -> usize {
        let ttl = self.config.ttl();
        let mut sessions = self.sessions.write();
        let before = sessions.len();

        sessions.retain(|id, handle| {
            if Arc::strong_count(handle) > 1 {
                return true;
            }
            match handle.try_lock() {
                Ok(session) => {
                    let expired = session.is_expired(now, ttl);
                    if expired {
                        debug!(session_id = %id, turns = session.turn_count(), "Evicting session");
                    }
                    !expired
                }
                Err(_) => true,
            }
        });

        let evicted = before - sessions.len();
        if evicted > 0 {
            info!(evicted, remaining = sessions.len(), "Evicted expired sessions");
        }
        evicted
    }

    /// Run `evict_expired` on the configured interval until the manager is
    /// dropped.
    pub fn spawn_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let manager: Weak<Self> = Arc::downgrade(self);
        let period = self.config.sweep_interval();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await; // Skip first immediate tick

            loop {
                interval.tick().await;
                let Some(manager) = manager.upgrade() else {
                    debug!("Conversation manager dropped, stopping sweeper");
                    break;
                };
                manager.evict_expired();
            }
        })
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions.read().contains_key(session_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    fn handle(&self, session_id: &str) -> Option<SessionHandle> {
        self.sessions.read().get(session_id).cloned()
    }
}

impl Default for ConversationManager {
    fn default() -> Self {
        Self::new(ConversationConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::TurnResolution;
    use chrono::Duration;
    use scrapewise_core::{Intent, IntentSource, OperationType, Query};

    fn ambiguous(text: &str) -> ConversationTurn {
        ConversationTurn::new(
            Query::new("s1", text),
            TurnResolution::Ambiguous {
                unresolved: vec![Slot::TargetField],
                question: "Which field?".into(),
            },
        )
        .with_interpretation(
            text,
            Intent::new(OperationType::Extract, 0.8, IntentSource::Pattern),
            Vec::new(),
        )
    }

    #[tokio::test]
    async fn test_start_and_record() {
        let manager = ConversationManager::default();
        assert!(manager.start("s1"));
        assert!(!manager.start("s1"));

        manager.record_turn("s1", ambiguous("get the prices")).await.unwrap();
        assert_eq!(manager.current_unresolved("s1").await, vec![Slot::TargetField]);

        let summary = manager.summarize("s1").await.unwrap();
        assert_eq!(summary.turn_count, 1);
    }

    #[tokio::test]
    async fn test_record_unknown_session_is_invalid() {
        let manager = ConversationManager::default();
        let err = manager
            .record_turn("nope", ambiguous("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, ScrapeError::InvalidRequest(_)));
        assert!(manager.current_unresolved("nope").await.is_empty());
        assert!(manager.summarize("nope").await.is_none());
    }

    #[tokio::test]
    async fn test_evicts_only_expired() {
        let manager = ConversationManager::default();
        let now = Utc::now();
        manager.start_at("old", now - Duration::minutes(45));
        manager.start_at("new", now);

        assert_eq!(manager.evict_expired_at(now), 1);
        assert!(!manager.contains("old"));
        assert!(manager.contains("new"));
    }

    #[tokio::test]
    async fn test_eviction_skips_session_mid_turn() {
        let manager = ConversationManager::default();
        let turn = manager.begin_turn("s1").await;
        assert!(turn.is_fresh());

        let later = Utc::now() + Duration::hours(2);
        assert_eq!(manager.evict_expired_at(later), 0);
        assert!(manager.contains("s1"));

        drop(turn);
        assert_eq!(manager.evict_expired_at(later), 1);
        assert!(manager.is_empty());
    }

    #[tokio::test]
    async fn test_evicted_session_restarts_empty() {
        let manager = ConversationManager::default();
        {
            let mut turn = manager.begin_turn("s1").await;
            turn.record(ambiguous("get the prices"));
        }
        assert_eq!(manager.evict_expired_at(Utc::now() + Duration::minutes(31)), 1);

        let turn = manager.begin_turn("s1").await;
        assert!(turn.is_fresh());
        assert_eq!(turn.turn_count(), 0);
        assert!(turn.pending().is_none());
    }

    #[tokio::test]
    async fn test_turns_for_one_session_are_serialized() {
        let manager = Arc::new(ConversationManager::default());
        let mut first = manager.begin_turn("s1").await;

        let m = Arc::clone(&manager);
        let waiter = tokio::spawn(async move {
            let turn = m.begin_turn("s1").await;
            turn.turn_count()
        });

        tokio::task::yield_now().await;
        first.record(ambiguous("first"));
        drop(first);

        assert_eq!(waiter.await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_sessions_are_independent() {
        let manager = ConversationManager::default();
        let _a = manager.begin_turn("a").await;
        // Holding "a" must not block "b".
        let b = tokio::time::timeout(std::time::Duration::from_millis(100), manager.begin_turn("b"))
            .await;
        assert!(b.is_ok());
        assert_eq!(manager.len(), 2);
    }

    #[tokio::test]
    async fn test_sweeper_stops_when_manager_dropped() {
        let manager = Arc::new(ConversationManager::new(ConversationConfig {
            sweep_interval_secs: 1,
            ..Default::default()
        }));
        let handle = manager.spawn_sweeper();
        drop(manager);
        tokio::time::timeout(std::time::Duration::from_secs(3), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
