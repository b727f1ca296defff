// SPDX-License-Identifier: MIT

//! Session manager (§4.3): validates config, mints sessions, provisions
//! their backing process, persists through the injected store, publishes
//! lifecycle events.

use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::events::SessionEvent;
use crate::registry::ProcessRegistry;
use crate::session::Session;
use crate::state::SessionState;
use crate::store::{SessionRecord, SessionStore};
use fleet_core::{Clock, SessionId};
use fleet_metrics::MetricsRegistry;
use fleet_process::{ProcessConfig, ProcessSupervisor};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Filter predicate for [`SessionManager::query`].
#[derive(Debug, Clone, Default)]
pub struct SessionFilter {
    pub workspace_id: Option<String>,
    pub user_id: Option<String>,
    pub state: Option<SessionState>,
    pub active: Option<bool>,
}

pub struct SessionManager {
    sessions: RwLock<HashMap<SessionId, Arc<Session>>>,
    store: Arc<dyn SessionStore>,
    processes: Arc<dyn ProcessRegistry>,
    metrics: Arc<MetricsRegistry>,
    clock: Arc<dyn Clock>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionManager {
    pub fn new(
        store: Arc<dyn SessionStore>,
        processes: Arc<dyn ProcessRegistry>,
        metrics: Arc<MetricsRegistry>,
        clock: Arc<dyn Clock>,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Arc::new(Self { sessions: RwLock::new(HashMap::new()), store, processes, metrics, clock, events })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    fn publish(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    fn record_of(&self, session: &Session) -> SessionRecord {
        SessionRecord {
            id: session.id,
            workspace_id: session.workspace_id.clone(),
            user_id: session.user_id.clone(),
            config: session.config(),
            state: session.state(),
            process_id: session.process_id(),
            created_at_ms: session.created_at_ms(),
            last_active_ms: session.last_active_ms(),
            metadata: session.metadata(),
        }
    }

    /// Create a session and provision its backing process (§4.3 `create`).
    ///
    /// On any failure after provisional insertion, rolls back: removes the
    /// session from memory and the store, and terminates the supervisor.
    pub async fn create(
        &self,
        workspace_id: impl Into<String>,
        user_id: impl Into<String>,
        config: SessionConfig,
        process_config: ProcessConfig,
    ) -> Result<Arc<Session>, SessionError> {
        config.validate()?;
        let epoch_ms = self.clock.epoch_ms();
        let session = Arc::new(Session::new(workspace_id, user_id, config, epoch_ms));
        self.sessions.write().insert(session.id, session.clone());
        self.publish(SessionEvent::Created { id: session.id });

        if let Err(err) = self.store.save(self.record_of(&session)).await {
            self.rollback(&session, None).await;
            return Err(err);
        }

        if let Err(err) = self.provision(&session, process_config).await {
            self.rollback(&session, session.process_id()).await;
            return Err(err);
        }

        Ok(session)
    }

    async fn provision(
        &self,
        session: &Arc<Session>,
        process_config: ProcessConfig,
    ) -> Result<(), SessionError> {
        self.transition_and_persist(session, SessionState::Initializing).await?;

        let supervisor = Arc::new(ProcessSupervisor::new(process_config, self.metrics.clone()));
        let process_id = supervisor.id;
        if let Err(err) = supervisor.start().await {
            return Err(SessionError::ProvisionFailed(err.to_string()));
        }
        self.processes.insert(process_id, supervisor);
        session.set_process_id(Some(process_id));

        self.transition_and_persist(session, SessionState::Ready).await
    }

    async fn transition_and_persist(
        &self,
        session: &Arc<Session>,
        to: SessionState,
    ) -> Result<(), SessionError> {
        let from = session.state();
        session.transition(to)?;
        self.store.save(self.record_of(session)).await?;
        self.publish(SessionEvent::Transitioned { id: session.id, from, to });
        Ok(())
    }

    async fn rollback(&self, session: &Arc<Session>, process_id: Option<fleet_core::ProcessId>) {
        warn!(session_id = %session.id, "rolling back session creation");
        self.sessions.write().remove(&session.id);
        let _ = self.store.remove(session.id).await;
        if let Some(process_id) = process_id {
            if let Some(supervisor) = self.processes.remove(process_id) {
                let _ = supervisor.kill().await;
            }
        }
    }

    pub fn get(&self, id: SessionId) -> Option<Arc<Session>> {
        self.sessions.read().get(&id).cloned()
    }

    /// Apply a caller-supplied config transformer; re-validates and persists
    /// the result (§4.3 `update`).
    pub async fn update_config(
        &self,
        id: SessionId,
        transform: impl FnOnce(&mut SessionConfig),
    ) -> Result<(), SessionError> {
        let session = self.get(id).ok_or(SessionError::NotFound(id))?;
        let mut config = session.config();
        transform(&mut config);
        config.validate()?;
        session.set_config(config);
        session.touch(self.clock.epoch_ms());
        self.store.save(self.record_of(&session)).await
    }

    pub async fn set_metadata(
        &self,
        id: SessionId,
        key: impl Into<String>,
        value: Value,
    ) -> Result<(), SessionError> {
        let session = self.get(id).ok_or(SessionError::NotFound(id))?;
        session.set_metadata(key, value);
        self.store.save(self.record_of(&session)).await
    }

    pub async fn transition(&self, id: SessionId, to: SessionState) -> Result<(), SessionError> {
        let session = self.get(id).ok_or(SessionError::NotFound(id))?;
        self.transition_and_persist(&session, to).await
    }

    /// Drive Closing -> Closed, terminate the process, update the store,
    /// emit `closed` (§4.3 `close`). Idempotent on an already-closed
    /// session: the session record stays addressable by id (so a second
    /// `close` is a safe no-op) but is dropped from the durable store and
    /// its process is gone.
    pub async fn close(&self, id: SessionId) -> Result<(), SessionError> {
        let session = self.get(id).ok_or(SessionError::NotFound(id))?;
        if session.state() == SessionState::Closed {
            return Ok(());
        }
        if session.state() != SessionState::Closing {
            self.transition_and_persist(&session, SessionState::Closing).await?;
        }
        if let Some(process_id) = session.process_id() {
            if let Some(supervisor) = self.processes.remove(process_id) {
                let _ = supervisor.stop(std::time::Duration::from_secs(10)).await;
            }
            session.set_process_id(None);
        }
        self.transition_and_persist(&session, SessionState::Closed).await?;
        self.store.remove(id).await?;
        self.publish(SessionEvent::Closed { id });
        info!(session_id = %id, "session closed");
        Ok(())
    }

    /// Drop a closed session from memory entirely (garbage collection point
    /// for callers that no longer need `close`'s idempotent lookup).
    pub fn forget(&self, id: SessionId) {
        self.sessions.write().remove(&id);
    }

    /// Filter-query sessions by (workspace, user, state, active?) (§4.3).
    pub fn query(&self, filter: &SessionFilter) -> Vec<Arc<Session>> {
        self.sessions
            .read()
            .values()
            .filter(|session| {
                filter.workspace_id.as_deref().map_or(true, |w| session.workspace_id == w)
                    && filter.user_id.as_deref().map_or(true, |u| session.user_id == u)
                    && filter.state.map_or(true, |s| session.state() == s)
                    && filter
                        .active
                        .map_or(true, |active| session.is_active_process_state() == active)
            })
            .cloned()
            .collect()
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
