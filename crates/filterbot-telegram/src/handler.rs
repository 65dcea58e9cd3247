//! Telegram message → engine input.

use std::sync::Arc;

use teloxide::prelude::*;
use tracing::{debug, error};

use filterbot_core::bot::FilterBot;
use filterbot_core::types::{ChatKind, Inbound};

/// Dispatcher endpoint for every incoming message.
pub async fn on_message(msg: Message, engine: Arc<FilterBot>) -> ResponseResult<()> {
    let Some(inbound) = to_inbound(&msg) else {
        debug!(chat_id = msg.chat.id.0, msg_id = msg.id.0, "ignoring message without sender or content");
        return respond(());
    };

    if let Err(e) = engine.handle(inbound).await {
        error!(chat_id = msg.chat.id.0, "Error handling message: {}", e);
    }
    respond(())
}

pub fn chat_kind(msg: &Message) -> ChatKind {
    if msg.chat.is_supergroup() {
        ChatKind::Supergroup
    } else if msg.chat.is_group() {
        ChatKind::Group
    } else if msg.chat.is_channel() {
        ChatKind::Channel
    } else {
        ChatKind::Private
    }
}

/// Photos (largest size) and text are forwarded; everything else, and
/// messages without a sender, are dropped.
pub fn to_inbound(msg: &Message) -> Option<Inbound> {
    let user = filterbot_core::types::UserId(msg.from.as_ref()?.id.0);
    let chat = filterbot_core::types::ChatId(msg.chat.id.0);
    let kind = chat_kind(msg);

    if let Some(largest) = msg.photo().and_then(|photos| photos.last()) {
        return Some(Inbound::photo(chat, kind, user, largest.file.id.0.clone()));
    }
    msg.text().map(|text| Inbound::text(chat, kind, user, text))
}
