//! Session tracking
//!
//! Every connected client gets a session entry:
//! - push sessions carry an outbound channel that a long-lived transport
//!   stream drains (responses travel out-of-band from the request)
//! - pipe sessions exist for lifecycle bookkeeping only; their responses
//!   are written inline by the transport
//!
//! Sessions move `Open → Active → Closing → Closed`. A session becomes
//! `Active` once the client has completed `initialize`, and is torn down
//! when its stream disconnects, its channel dies, or the idle reaper
//! decides nobody is coming back.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Lifecycle state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, client has not finished `initialize` yet
    Open,
    /// Handshake complete, requests flowing
    Active,
    /// Teardown started, no further pushes accepted
    Closing,
    /// Fully torn down
    Closed,
}

/// Why an outbound push failed
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PushError {
    /// No session with that id
    #[error("session '{0}' not found")]
    NotFound(String),
    /// Session exists but its outbound channel is gone or was never there
    #[error("session '{0}' has no live outbound channel")]
    ChannelClosed(String),
}

/// One tracked client connection
#[derive(Debug)]
pub struct Session {
    /// Opaque identifier handed to the client
    pub id: String,
    /// Lifecycle state
    pub state: SessionState,
    /// Wall-clock creation time, for logs
    pub created_at: DateTime<Utc>,
    /// Monotonic timestamp of the last request or push on this session
    last_activity: Instant,
    /// Outbound channel; `None` for pipe sessions and after teardown begins
    outbound: Option<mpsc::UnboundedSender<String>>,
}

impl Session {
    fn new(outbound: Option<mpsc::UnboundedSender<String>>) -> Self {
        Self {
            id: Uuid::new_v4().simple().to_string(),
            state: SessionState::Open,
            created_at: Utc::now(),
            last_activity: Instant::now(),
            outbound,
        }
    }

    /// Time since the last request or push
    pub fn idle_for(&self) -> Duration {
        self.last_activity.elapsed()
    }
}

/// Concurrent session index shared by transports and the reaper
#[derive(Default)]
pub struct SessionManager {
    sessions: DashMap<String, Session>,
}

impl SessionManager {
    /// Create an empty manager
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a push session; the caller drains the returned receiver
    pub fn open_push(&self) -> (String, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = Session::new(Some(tx));
        let id = session.id.clone();
        info!("Session {} opened (push)", id);
        self.sessions.insert(id.clone(), session);
        (id, rx)
    }

    /// Open a pipe session with no outbound channel
    pub fn open_pipe(&self) -> String {
        let session = Session::new(None);
        let id = session.id.clone();
        info!("Session {} opened (pipe)", id);
        self.sessions.insert(id.clone(), session);
        id
    }

    /// Mark the handshake complete; returns false for an unknown id
    pub fn activate(&self, id: &str) -> bool {
        match self.sessions.get_mut(id) {
            Some(mut entry) if entry.state == SessionState::Open => {
                entry.state = SessionState::Active;
                entry.last_activity = Instant::now();
                debug!("Session {} active", id);
                true
            }
            Some(mut entry) => {
                entry.last_activity = Instant::now();
                true
            }
            None => false,
        }
    }

    /// Refresh the idle clock; returns false for an unknown id
    pub fn touch(&self, id: &str) -> bool {
        match self.sessions.get_mut(id) {
            Some(mut entry) => {
                entry.last_activity = Instant::now();
                true
            }
            None => false,
        }
    }

    /// Whether a session with this id exists
    pub fn contains(&self, id: &str) -> bool {
        self.sessions.contains_key(id)
    }

    /// Current state of a session, if it exists
    pub fn state(&self, id: &str) -> Option<SessionState> {
        self.sessions.get(id).map(|entry| entry.state)
    }

    /// Send a payload down a push session's outbound channel
    ///
    /// A dead channel removes the session: once the receiving stream is
    /// gone the session can never deliver again, so it is not kept around.
    pub fn push(&self, id: &str, payload: String) -> Result<(), PushError> {
        let mut receiver_gone = false;
        {
            let mut entry = self
                .sessions
                .get_mut(id)
                .ok_or_else(|| PushError::NotFound(id.to_string()))?;

            if matches!(entry.state, SessionState::Closing | SessionState::Closed) {
                return Err(PushError::ChannelClosed(id.to_string()));
            }

            match entry.outbound.as_ref() {
                Some(tx) => {
                    if tx.send(payload).is_ok() {
                        entry.last_activity = Instant::now();
                    } else {
                        entry.state = SessionState::Closed;
                        receiver_gone = true;
                    }
                }
                None => return Err(PushError::ChannelClosed(id.to_string())),
            }
        }

        if receiver_gone {
            self.sessions.remove(id);
            warn!("Session {} receiver dropped, session removed", id);
            return Err(PushError::ChannelClosed(id.to_string()));
        }
        Ok(())
    }

    /// Tear a session down; returns false for an unknown id
    pub fn close(&self, id: &str) -> bool {
        match self.sessions.get_mut(id) {
            Some(mut entry) => {
                entry.state = SessionState::Closing;
                // dropping the sender ends the transport's receiver stream
                entry.outbound = None;
            }
            None => return false,
        }

        if let Some((_, mut session)) = self.sessions.remove(id) {
            session.state = SessionState::Closed;
            info!("Session {} closed", id);
        }
        true
    }

    /// Remove every session idle for at least `idle_timeout`
    pub fn reap_idle(&self, idle_timeout: Duration) -> usize {
        let before = self.sessions.len();
        self.sessions
            .retain(|_, session| session.idle_for() < idle_timeout);
        let reaped = before - self.sessions.len();
        if reaped > 0 {
            info!("Reaped {} idle session(s)", reaped);
        }
        reaped
    }

    /// Number of live sessions
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no sessions are live
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Spawn the periodic idle reaper
    pub fn spawn_reaper(
        manager: Arc<Self>,
        interval: Duration,
        idle_timeout: Duration,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // the first tick fires immediately; nothing can be idle yet
            ticker.tick().await;
            loop {
                ticker.tick().await;
                manager.reap_idle(idle_timeout);
            }
        })
    }
}
