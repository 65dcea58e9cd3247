//! The authoring form: AwaitingImage → AwaitingButtons → AwaitingTrigger.
//!
//! Session state lives behind a std mutex that is never held across an
//! await: every transition is a short synchronous step on `SessionStore`,
//! and I/O (downloads, sends, snapshot writes) happens between steps. After
//! any await the session is looked up again by id, so a session that was
//! stopped or timed out in the meantime is never revived.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::buttons::parse_buttons;
use crate::error::{GatewayError, StoreError};
use crate::gateway::ChatGateway;
use crate::images::ImageStore;
use crate::messages;
use crate::permissions::may_manage_filters;
use crate::rate_limit::RateLimiter;
use crate::session::{timeout_name, Session, SessionKey, SessionStore, Stage, StageKind};
use crate::store::FilterStore;
use crate::timeout::TimeoutScheduler;
use crate::types::{normalize_trigger, Button, ChatId, ChatKind, Filter, ImageRef, IncomingImage, UserId};

/// Result of an authoring command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeginOutcome {
    Started,
    AlreadyActive,
    RateLimited,
    NotPermitted,
}

/// What a session had staged when it reached the trigger step.
struct Staged {
    id: Uuid,
    started_at: DateTime<Utc>,
    image: Option<ImageRef>,
    buttons: Vec<Button>,
}

struct Inner {
    gateway: Arc<dyn ChatGateway>,
    store: Arc<FilterStore>,
    images: Arc<ImageStore>,
    limiter: RateLimiter,
    timers: TimeoutScheduler,
    sessions: Mutex<SessionStore>,
    image_timeout: Duration,
}

#[derive(Clone)]
pub struct Conversations {
    inner: Arc<Inner>,
}

impl Conversations {
    pub fn new(
        gateway: Arc<dyn ChatGateway>,
        store: Arc<FilterStore>,
        images: Arc<ImageStore>,
        limiter: RateLimiter,
        image_timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                gateway,
                store,
                images,
                limiter,
                timers: TimeoutScheduler::new(),
                sessions: Mutex::new(SessionStore::new()),
                image_timeout,
            }),
        }
    }

    pub fn stage(&self, key: &SessionKey) -> Option<StageKind> {
        self.inner.sessions().stage_of(key)
    }

    pub fn has_session(&self, key: &SessionKey) -> bool {
        self.stage(key).is_some()
    }

    pub fn active_sessions(&self) -> usize {
        self.inner.sessions().len()
    }

    /// `/filter`: rate limit, then permission, then open a session in
    /// AwaitingImage with its timeout armed.
    pub async fn begin(&self, chat: ChatId, kind: ChatKind, user: UserId) -> Result<BeginOutcome, GatewayError> {
        let key = SessionKey::new(chat, user);
        if self.has_session(&key) {
            self.send(chat, messages::ALREADY_IN_PROGRESS).await?;
            return Ok(BeginOutcome::AlreadyActive);
        }

        if !self.inner.limiter.allow(user) {
            info!(chat = %chat, user = %user, "filter request rate limited");
            self.send(chat, messages::RATE_LIMITED).await?;
            return Ok(BeginOutcome::RateLimited);
        }

        if !may_manage_filters(self.inner.gateway.as_ref(), chat, kind, user).await {
            info!(chat = %chat, user = %user, "non-admin tried to create a filter");
            self.send(chat, messages::NOT_ADMIN_CREATE).await?;
            return Ok(BeginOutcome::NotPermitted);
        }

        let id = Uuid::new_v4();
        let timeout = {
            let inner = Arc::clone(&self.inner);
            self.inner.timers.schedule(
                self.inner.image_timeout,
                timeout_name(&key, id),
                async move { inner.expire(key, id).await },
            )
        };

        if let Err(rejected) = self.inner.insert_session(Session::new(id, key, timeout)) {
            // Another /filter from the same user won the race during the permission lookup.
            rejected.dismantle();
            self.send(chat, messages::ALREADY_IN_PROGRESS).await?;
            return Ok(BeginOutcome::AlreadyActive);
        }

        info!(session = %key, id = %id, "filter form started");
        self.send(chat, &messages::ask_image(self.inner.image_timeout.as_secs()))
            .await?;
        Ok(BeginOutcome::Started)
    }

    /// An image from the user. Returns false when no session is waiting for one.
    pub async fn receive_image(&self, key: SessionKey, image: &IncomingImage) -> Result<bool, GatewayError> {
        let Some(id) = self.inner.hold_for_image(&key) else {
            return Ok(false);
        };

        let (name, path) = self.inner.images.allocate(key.chat);
        if let Err(e) = self.inner.gateway.download_image(image, &path).await {
            error!(session = %key, "Error downloading image: {}", e);
            self.inner.images.discard(&name).await;
            if let Some(session) = self.inner.take_if(&key, Some(id), StageKind::AwaitingImage) {
                self.inner.release(session).await;
                self.send(key.chat, messages::DOWNLOAD_FAILED).await?;
            }
            return Ok(true);
        }

        if self.inner.stage_image(&key, id, name.clone()) {
            debug!(session = %key, image = %name, "image staged");
            self.send(key.chat, messages::IMAGE_RECEIVED).await?;
        } else {
            debug!(session = %key, "image arrived after the session ended");
            self.inner.images.discard(&name).await;
        }
        Ok(true)
    }

    /// `/skip`. Returns false when the user has no session.
    pub async fn skip(&self, key: SessionKey) -> Result<bool, GatewayError> {
        let Some(reply) = self.inner.advance_skip(&key) else {
            return Ok(false);
        };
        self.send(key.chat, reply).await?;
        Ok(true)
    }

    /// Plain text from a user inside the form. Returns false when the user
    /// has no session, so the text can go to the trigger matcher instead.
    pub async fn receive_text(&self, key: SessionKey, text: &str) -> Result<bool, GatewayError> {
        match self.stage(&key) {
            None => return Ok(false),
            Some(StageKind::AwaitingImage) => self.send(key.chat, messages::IMAGE_EXPECTED).await?,
            Some(StageKind::AwaitingButtons) => self.receive_buttons(key, text).await?,
            Some(StageKind::AwaitingTrigger) => self.receive_trigger(key, text).await?,
        }
        Ok(true)
    }

    async fn receive_buttons(&self, key: SessionKey, text: &str) -> Result<(), GatewayError> {
        let buttons = match parse_buttons(text) {
            Ok(buttons) => buttons,
            Err(e) => {
                debug!(session = %key, "rejected buttons: {}", e);
                return self.send(key.chat, &messages::invalid_buttons(&e)).await;
            }
        };

        if !self.inner.stage_buttons(&key, buttons.clone()) {
            return Ok(());
        }
        self.inner
            .gateway
            .send_text(key.chat, messages::BUTTONS_PREVIEW, &buttons)
            .await?;
        self.send(key.chat, messages::ASK_TRIGGER).await
    }

    async fn receive_trigger(&self, key: SessionKey, text: &str) -> Result<(), GatewayError> {
        let trigger = normalize_trigger(text);
        if trigger.is_empty() {
            return self.send(key.chat, messages::EMPTY_TRIGGER).await;
        }
        if self.inner.store.lookup(key.chat, &trigger).is_some() {
            return self.send(key.chat, &messages::duplicate_trigger(&trigger)).await;
        }

        let Some(staged) = self.inner.take_for_commit(&key) else {
            return Ok(());
        };

        let filter = Filter {
            trigger: trigger.clone(),
            image: staged.image.clone(),
            buttons: staged.buttons.clone(),
            created_by: key.user,
            created_at: Utc::now(),
        };

        match self.inner.store.insert_unique(key.chat, filter.clone()).await {
            Ok(()) => {
                info!(chat = %key.chat, trigger = %trigger, user = %key.user, "filter created");
                self.send(key.chat, &messages::filter_created(&filter)).await
            }
            Err(StoreError::Duplicate { trigger }) => {
                // Lost a race to another author; let this one pick again.
                self.inner.restore(key, staged).await;
                self.send(key.chat, &messages::duplicate_trigger(&trigger)).await
            }
            Err(e) => {
                warn!(chat = %key.chat, trigger = %trigger, "filter live but not persisted: {}", e);
                self.send(key.chat, messages::SAVE_FAILED).await?;
                self.send(key.chat, &messages::filter_created(&filter)).await
            }
        }
    }

    /// `/stop`. Returns false when there was nothing to cancel.
    pub async fn stop(&self, key: SessionKey) -> Result<bool, GatewayError> {
        let Some(session) = self.inner.take(&key) else {
            return Ok(false);
        };
        info!(session = %key, stage = %session.stage.kind(), "filter form cancelled");
        self.inner.release(session).await;
        self.send(key.chat, messages::CANCELLED).await?;
        Ok(true)
    }

    async fn send(&self, chat: ChatId, text: &str) -> Result<(), GatewayError> {
        self.inner.gateway.send_text(chat, text, &[]).await
    }
}

impl Inner {
    fn sessions(&self) -> MutexGuard<'_, SessionStore> {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn insert_session(&self, session: Session) -> Result<(), Session> {
        self.sessions().insert(session)
    }

    fn take(&self, key: &SessionKey) -> Option<Session> {
        self.sessions().remove(key)
    }

    /// Remove the session under `key` if it is in `stage` (and is `id`, when given).
    fn take_if(&self, key: &SessionKey, id: Option<Uuid>, stage: StageKind) -> Option<Session> {
        let mut sessions = self.sessions();
        let current = sessions.get(key)?;
        if current.stage.kind() != stage {
            return None;
        }
        let id = id.unwrap_or(current.id);
        sessions.remove_if(key, id)
    }

    /// Disarm the image timeout while the download runs; the session stays
    /// in AwaitingImage until the file is on disk.
    fn hold_for_image(&self, key: &SessionKey) -> Option<Uuid> {
        let sessions = self.sessions();
        let session = sessions.get(key)?;
        match &session.stage {
            Stage::AwaitingImage { timeout } => {
                timeout.cancel();
                Some(session.id)
            }
            _ => None,
        }
    }

    fn stage_image(&self, key: &SessionKey, id: Uuid, image: ImageRef) -> bool {
        let mut sessions = self.sessions();
        match sessions.get_mut(key) {
            Some(session) if session.id == id && session.stage.kind() == StageKind::AwaitingImage => {
                session.stage = Stage::AwaitingButtons { image: Some(image) };
                true
            }
            _ => false,
        }
    }

    fn advance_skip(&self, key: &SessionKey) -> Option<&'static str> {
        let mut sessions = self.sessions();
        let session = sessions.get_mut(key)?;
        let placeholder = Stage::AwaitingButtons { image: None };
        let (next, reply) = match std::mem::replace(&mut session.stage, placeholder) {
            Stage::AwaitingImage { timeout } => {
                timeout.cancel();
                (Stage::AwaitingButtons { image: None }, messages::IMAGE_SKIPPED)
            }
            Stage::AwaitingButtons { image } => (
                Stage::AwaitingTrigger {
                    image,
                    buttons: Vec::new(),
                },
                messages::BUTTONS_SKIPPED,
            ),
            trigger @ Stage::AwaitingTrigger { .. } => (trigger, messages::ASK_TRIGGER),
        };
        debug!(session = %key, stage = %next.kind(), "skip");
        session.stage = next;
        Some(reply)
    }

    fn stage_buttons(&self, key: &SessionKey, buttons: Vec<Button>) -> bool {
        let mut sessions = self.sessions();
        let Some(session) = sessions.get_mut(key) else {
            return false;
        };
        match std::mem::replace(&mut session.stage, Stage::AwaitingButtons { image: None }) {
            Stage::AwaitingButtons { image } => {
                session.stage = Stage::AwaitingTrigger { image, buttons };
                true
            }
            other => {
                session.stage = other;
                false
            }
        }
    }

    fn take_for_commit(&self, key: &SessionKey) -> Option<Staged> {
        let session = self.take_if(key, None, StageKind::AwaitingTrigger)?;
        let id = session.id;
        let started_at = session.started_at;
        match session.stage {
            Stage::AwaitingTrigger { image, buttons } => Some(Staged {
                id,
                started_at,
                image,
                buttons,
            }),
            _ => None,
        }
    }

    /// Put a session back after a failed commit, unless the user has already
    /// started a new one; then the old staged image is released.
    async fn restore(&self, key: SessionKey, staged: Staged) {
        let session = Session {
            id: staged.id,
            key,
            stage: Stage::AwaitingTrigger {
                image: staged.image,
                buttons: staged.buttons,
            },
            started_at: staged.started_at,
        };
        if let Err(displaced) = self.insert_session(session) {
            self.release(displaced).await;
        }
    }

    /// Timeout callback for session `id`. Does nothing if that session has
    /// already moved on, been cancelled, or been replaced.
    async fn expire(&self, key: SessionKey, id: Uuid) {
        let Some(session) = self.take_if(&key, Some(id), StageKind::AwaitingImage) else {
            debug!(session = %key, "stale timeout ignored");
            return;
        };
        info!(session = %key, "filter form timed out");
        self.release(session).await;
        if let Err(e) = self.gateway.send_text(key.chat, messages::TIMED_OUT, &[]).await {
            warn!(session = %key, "failed to send timeout notice: {}", e);
        }
    }

    /// Cancel any pending timeout and delete the staged image. The caller
    /// owns the session, so this runs at most once per session.
    async fn release(&self, session: Session) {
        if let Some(image) = session.dismantle() {
            self.images.discard(&image).await;
        }
    }
}
