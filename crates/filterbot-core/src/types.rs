//! Core types: ids, buttons, filters, inbound events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Identifiers ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(pub i64);

impl std::fmt::Display for ChatId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ChatId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<i64>().map(ChatId)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Buttons ──

/// An inline link button. Only built through `buttons::parse_buttons`,
/// which guarantees an http(s) url.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    pub text: String,
    pub url: String,
}

// ── Filters ──

/// File name of an image kept under the images directory.
pub type ImageRef = String;

/// A stored keyword response. `trigger` is always normalized.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub trigger: String,
    pub image: Option<ImageRef>,
    pub buttons: Vec<Button>,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
}

impl Filter {
    pub fn has_image(&self) -> bool {
        self.image.is_some()
    }
}

/// Trim and lower-case a trigger or an inbound message before matching.
pub fn normalize_trigger(text: &str) -> String {
    text.trim().to_lowercase()
}

// ── Chat context ──

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatKind {
    Private,
    Group,
    Supergroup,
    Channel,
}

impl ChatKind {
    /// Group-scoped chats gate authoring and deletion behind admin rights.
    pub fn is_group(&self) -> bool {
        matches!(self, ChatKind::Group | ChatKind::Supergroup)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Owner,
    Administrator,
    Member,
    Restricted,
    Left,
    Banned,
}

impl Role {
    pub fn is_privileged(&self) -> bool {
        matches!(self, Role::Owner | Role::Administrator)
    }
}

// ── Inbound events (produced by a frontend) ──

/// Platform handle of an image the user sent; resolved by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingImage {
    pub file_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundContent {
    Text(String),
    Photo(IncomingImage),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    pub chat: ChatId,
    pub chat_kind: ChatKind,
    pub user: UserId,
    pub content: InboundContent,
}

impl Inbound {
    pub fn text(chat: ChatId, chat_kind: ChatKind, user: UserId, text: impl Into<String>) -> Self {
        Self {
            chat,
            chat_kind,
            user,
            content: InboundContent::Text(text.into()),
        }
    }

    pub fn photo(chat: ChatId, chat_kind: ChatKind, user: UserId, file_id: impl Into<String>) -> Self {
        Self {
            chat,
            chat_kind,
            user,
            content: InboundContent::Photo(IncomingImage {
                file_id: file_id.into(),
            }),
        }
    }
}
