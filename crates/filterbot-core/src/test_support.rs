//! In-memory ChatGateway that records everything sent through it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::GatewayError;
use crate::gateway::ChatGateway;
use crate::types::{Button, ChatId, Filter, IncomingImage, Role, UserId};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Sent {
    Text {
        chat: ChatId,
        text: String,
        buttons: Vec<Button>,
    },
    Filter {
        chat: ChatId,
        trigger: String,
        image: Option<PathBuf>,
    },
}

#[derive(Default)]
pub(crate) struct RecordingGateway {
    roles: Mutex<HashMap<(ChatId, UserId), Role>>,
    fail_roles: AtomicBool,
    fail_downloads: AtomicBool,
    download_delay: Mutex<Option<Duration>>,
    downloads: AtomicUsize,
    sent: Mutex<Vec<Sent>>,
}

impl RecordingGateway {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set_role(&self, chat: ChatId, user: UserId, role: Role) {
        self.roles.lock().unwrap().insert((chat, user), role);
    }

    pub(crate) fn fail_role_lookups(&self) {
        self.fail_roles.store(true, Ordering::SeqCst);
    }

    pub(crate) fn fail_downloads(&self) {
        self.fail_downloads.store(true, Ordering::SeqCst);
    }

    pub(crate) fn set_download_delay(&self, delay: Duration) {
        *self.download_delay.lock().unwrap() = Some(delay);
    }

    pub(crate) fn download_count(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }

    pub(crate) fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub(crate) fn texts(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Text { text, .. } => Some(text),
                Sent::Filter { .. } => None,
            })
            .collect()
    }

    pub(crate) fn last_text(&self) -> Option<String> {
        self.texts().pop()
    }

    pub(crate) fn rendered(&self) -> Vec<(ChatId, String, Option<PathBuf>)> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Filter {
                    chat,
                    trigger,
                    image,
                } => Some((chat, trigger, image)),
                Sent::Text { .. } => None,
            })
            .collect()
    }

    pub(crate) fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }
}

#[async_trait]
impl ChatGateway for RecordingGateway {
    async fn member_role(&self, chat: ChatId, user: UserId) -> Result<Role, GatewayError> {
        if self.fail_roles.load(Ordering::SeqCst) {
            return Err(GatewayError::new("member lookup unavailable"));
        }
        Ok(self
            .roles
            .lock()
            .unwrap()
            .get(&(chat, user))
            .copied()
            .unwrap_or(Role::Member))
    }

    async fn download_image(&self, image: &IncomingImage, dest: &Path) -> Result<(), GatewayError> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        let delay = *self.download_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_downloads.load(Ordering::SeqCst) {
            return Err(GatewayError::new("download failed"));
        }
        std::fs::write(dest, image.file_id.as_bytes())
            .map_err(|e| GatewayError::with_source("write failed", e))
    }

    async fn send_text(&self, chat: ChatId, text: &str, buttons: &[Button]) -> Result<(), GatewayError> {
        self.sent.lock().unwrap().push(Sent::Text {
            chat,
            text: text.to_string(),
            buttons: buttons.to_vec(),
        });
        Ok(())
    }

    async fn send_filter(
        &self,
        chat: ChatId,
        filter: &Filter,
        image: Option<&Path>,
    ) -> Result<(), GatewayError> {
        self.sent.lock().unwrap().push(Sent::Filter {
            chat,
            trigger: filter.trigger.clone(),
            image: image.map(Path::to_path_buf),
        });
        Ok(())
    }
}
