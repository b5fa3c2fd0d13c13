use advisor_core::{
    ActivityLog, ActivityLogger, ActivityStatus, ActivityType, ContextConfig, ContextError, ConversationManager,
    SessionId,
};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use sysinfo::System;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::ConversationConfig;

#[derive(Error, Debug)]
pub enum SessionStoreError {
    #[error("Session limit reached ({0} active sessions)")]
    CapacityReached(usize),

    #[error("Memory usage at {0:.2}%, refusing new session")]
    MemoryPressure(f64),

    #[error(transparent)]
    Context(#[from] ContextError),
}

/// One live conversation plus its idle clock
pub struct SessionEntry {
    manager: ConversationManager,
    last_activity: Instant,
    turn: Arc<tokio::sync::Mutex<()>>,
}

impl SessionEntry {
    /// Held for a whole chat turn, across the model call
    pub fn turn_lock(&self) -> Arc<tokio::sync::Mutex<()>> {
        self.turn.clone()
    }

    pub fn manager(&self) -> &ConversationManager {
        &self.manager
    }

    /// Mutable access counts as activity
    pub fn manager_mut(&mut self) -> &mut ConversationManager {
        self.last_activity = Instant::now();
        &mut self.manager
    }

    fn is_expired(&self, idle_timeout: Duration) -> bool {
        self.last_activity.elapsed() > idle_timeout
    }
}

pub type SharedSession = Arc<Mutex<SessionEntry>>;

/// Thread-safe in-memory session store, one manager per session id.
///
/// Idle sessions expire lazily on `get` and in bulk via `cleanup_expired`.
#[derive(Clone)]
pub struct SessionStore {
    storage: Arc<DashMap<SessionId, SharedSession>>,
    system: Arc<Mutex<System>>,
    context: ContextConfig,
    idle_timeout: Duration,
    max_sessions: usize,
    memory_limit_percent: f64,
    logger: ActivityLogger,
}

impl SessionStore {
    pub fn new(config: &ConversationConfig, logger: ActivityLogger) -> Result<Self, ContextError> {
        let context = config.context_config()?;

        info!(
            "Initializing session store: max_sessions={}, idle_timeout={}m",
            config.max_sessions, config.session_timeout_minutes
        );

        Ok(Self {
            storage: Arc::new(DashMap::new()),
            system: Arc::new(Mutex::new(System::new())),
            context,
            idle_timeout: Duration::from_secs(config.session_timeout_minutes * 60),
            max_sessions: config.max_sessions,
            memory_limit_percent: config.memory_limit_percent,
            logger,
        })
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Live session by id; None if unknown or expired
    pub fn get(&self, session_id: SessionId) -> Option<SharedSession> {
        let session = self.storage.get(&session_id)?.value().clone();

        if session.lock().is_expired(self.idle_timeout) {
            self.expire(session_id);
            return None;
        }

        Some(session)
    }

    /// Existing live session, or a new one under the given id (or a fresh id)
    pub fn get_or_create(&self, session_id: Option<SessionId>) -> Result<(SessionId, SharedSession), SessionStoreError> {
        if let Some(id) = session_id {
            if let Some(session) = self.get(id) {
                return Ok((id, session));
            }
        }

        let id = session_id.unwrap_or_else(Uuid::new_v4);
        let session = self.create(id)?;
        Ok((id, session))
    }

    fn create(&self, session_id: SessionId) -> Result<SharedSession, SessionStoreError> {
        if self.storage.len() >= self.max_sessions {
            self.cleanup_expired();
            if self.storage.len() >= self.max_sessions {
                warn!("Session limit {} reached, rejecting new session", self.max_sessions);
                return Err(SessionStoreError::CapacityReached(self.storage.len()));
            }
        }

        self.check_memory()?;

        let manager = ConversationManager::new(session_id, self.context.clone(), self.logger.clone())?;
        let session = Arc::new(Mutex::new(SessionEntry {
            manager,
            last_activity: Instant::now(),
            turn: Arc::new(tokio::sync::Mutex::new(())),
        }));

        // A concurrent request may have created the same id first
        let session = self.storage.entry(session_id).or_insert(session).value().clone();

        debug!("Created session {}", session_id);
        self.logger.log(
            ActivityLog::builder(session_id, ActivityType::SessionCreated)
                .message_count(self.storage.len())
                .build(),
        );

        Ok(session)
    }

    fn check_memory(&self) -> Result<(), SessionStoreError> {
        if self.memory_limit_percent >= 100.0 {
            return Ok(());
        }

        let usage_percent = self.memory_usage().2;
        if usage_percent >= self.memory_limit_percent {
            warn!("Memory usage at {:.2}%, rejecting new session", usage_percent);
            return Err(SessionStoreError::MemoryPressure(usage_percent));
        }

        Ok(())
    }

    /// (used MB, total MB, percent)
    fn memory_usage(&self) -> (u64, u64, f64) {
        let mut sys = self.system.lock();
        sys.refresh_memory();

        let total = sys.total_memory();
        let used = sys.used_memory();
        let percent = if total == 0 {
            0.0
        } else {
            (used as f64 / total as f64) * 100.0
        };

        (used / 1024 / 1024, total / 1024 / 1024, percent)
    }

    fn expire(&self, session_id: SessionId) {
        if self.storage.remove(&session_id).is_some() {
            debug!("Session {} expired, removed from store", session_id);
            self.log_expired(session_id);
        }
    }

    fn log_expired(&self, session_id: SessionId) {
        self.logger.log(
            ActivityLog::builder(session_id, ActivityType::SessionExpired)
                .status(ActivityStatus::Info)
                .build(),
        );
    }

    pub fn remove(&self, session_id: SessionId) -> Option<SharedSession> {
        self.storage.remove(&session_id).map(|(_, session)| session)
    }

    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    /// Drop every idle session. Returns the number removed.
    pub fn cleanup_expired(&self) -> usize {
        let mut expired = Vec::new();
        self.storage.retain(|id, session| {
            let keep = !session.lock().is_expired(self.idle_timeout);
            if !keep {
                expired.push(*id);
            }
            keep
        });

        for id in &expired {
            self.log_expired(*id);
        }

        if !expired.is_empty() {
            info!("Cleaned up {} expired sessions", expired.len());
        }

        expired.len()
    }

    pub fn stats(&self) -> StoreStats {
        let (memory_usage_mb, memory_total_mb, memory_usage_percent) = self.memory_usage();

        StoreStats {
            active_sessions: self.len(),
            max_sessions: self.max_sessions,
            memory_usage_mb,
            memory_total_mb,
            memory_usage_percent,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub active_sessions: usize,
    pub max_sessions: usize,
    pub memory_usage_mb: u64,
    pub memory_total_mb: u64,
    pub memory_usage_percent: f64,
}
