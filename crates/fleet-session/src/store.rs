// SPDX-License-Identifier: MIT

//! `SessionStore`: the persistence collaborator named in the out-of-scope
//! list (§1). This crate ships only an in-memory reference implementation;
//! a real backend is someone else's crate.

use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::state::SessionState;
use async_trait::async_trait;
use fleet_core::{ProcessId, SessionId};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// A durable snapshot of a [`crate::session::Session`].
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub id: SessionId,
    pub workspace_id: String,
    pub user_id: String,
    pub config: SessionConfig,
    pub state: SessionState,
    pub process_id: Option<ProcessId>,
    pub created_at_ms: u64,
    pub last_active_ms: u64,
    pub metadata: Map<String, Value>,
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn save(&self, record: SessionRecord) -> Result<(), SessionError>;
    async fn remove(&self, id: SessionId) -> Result<(), SessionError>;
    async fn load(&self, id: SessionId) -> Result<Option<SessionRecord>, SessionError>;
}

#[derive(Default)]
pub struct InMemorySessionStore {
    records: Mutex<HashMap<SessionId, SessionRecord>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn save(&self, record: SessionRecord) -> Result<(), SessionError> {
        self.records.lock().insert(record.id, record);
        Ok(())
    }

    async fn remove(&self, id: SessionId) -> Result<(), SessionError> {
        self.records.lock().remove(&id);
        Ok(())
    }

    async fn load(&self, id: SessionId) -> Result<Option<SessionRecord>, SessionError> {
        Ok(self.records.lock().get(&id).cloned())
    }
}
