//! Per-(chat, user) authoring sessions.
//!
//! A session only exists while its user is inside the form; Idle is the
//! absence of a session. Each stage carries only what is meaningful there.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::timeout::TimeoutHandle;
use crate::types::{Button, ChatId, ImageRef, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub chat: ChatId,
    pub user: UserId,
}

impl SessionKey {
    pub fn new(chat: ChatId, user: UserId) -> Self {
        Self { chat, user }
    }
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.chat, self.user)
    }
}

#[derive(Debug)]
pub enum Stage {
    AwaitingImage {
        timeout: TimeoutHandle,
    },
    AwaitingButtons {
        image: Option<ImageRef>,
    },
    AwaitingTrigger {
        image: Option<ImageRef>,
        buttons: Vec<Button>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    AwaitingImage,
    AwaitingButtons,
    AwaitingTrigger,
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StageKind::AwaitingImage => write!(f, "awaiting_image"),
            StageKind::AwaitingButtons => write!(f, "awaiting_buttons"),
            StageKind::AwaitingTrigger => write!(f, "awaiting_trigger"),
        }
    }
}

impl Stage {
    pub fn kind(&self) -> StageKind {
        match self {
            Stage::AwaitingImage { .. } => StageKind::AwaitingImage,
            Stage::AwaitingButtons { .. } => StageKind::AwaitingButtons,
            Stage::AwaitingTrigger { .. } => StageKind::AwaitingTrigger,
        }
    }
}

#[derive(Debug)]
pub struct Session {
    pub id: Uuid,
    pub key: SessionKey,
    pub stage: Stage,
    pub started_at: DateTime<Utc>,
}

impl Session {
    pub fn new(id: Uuid, key: SessionKey, timeout: TimeoutHandle) -> Self {
        Self {
            id,
            key,
            stage: Stage::AwaitingImage { timeout },
            started_at: Utc::now(),
        }
    }

    /// Cancel the pending timeout, if any, and hand back the staged image.
    pub fn dismantle(self) -> Option<ImageRef> {
        match self.stage {
            Stage::AwaitingImage { timeout } => {
                timeout.cancel();
                None
            }
            Stage::AwaitingButtons { image } | Stage::AwaitingTrigger { image, .. } => image,
        }
    }
}

/// Timer name for a session. Includes the session id so a later session of
/// the same user never shares a name with a stale one.
pub fn timeout_name(key: &SessionKey, id: Uuid) -> String {
    format!("filter_timeout_{}_{}_{}", key.chat, key.user, id.simple())
}

#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: HashMap<SessionKey, Session>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert unless the key already has a session; returns the rejected one.
    pub fn insert(&mut self, session: Session) -> Result<(), Session> {
        if self.sessions.contains_key(&session.key) {
            return Err(session);
        }
        self.sessions.insert(session.key, session);
        Ok(())
    }

    pub fn get(&self, key: &SessionKey) -> Option<&Session> {
        self.sessions.get(key)
    }

    pub fn get_mut(&mut self, key: &SessionKey) -> Option<&mut Session> {
        self.sessions.get_mut(key)
    }

    pub fn remove(&mut self, key: &SessionKey) -> Option<Session> {
        self.sessions.remove(key)
    }

    /// Remove only if the current session under `key` is session `id`.
    pub fn remove_if(&mut self, key: &SessionKey, id: Uuid) -> Option<Session> {
        match self.sessions.get(key) {
            Some(session) if session.id == id => self.sessions.remove(key),
            _ => None,
        }
    }

    pub fn stage_of(&self, key: &SessionKey) -> Option<StageKind> {
        self.sessions.get(key).map(|s| s.stage.kind())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
