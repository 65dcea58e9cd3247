//! ChatGateway over the Telegram Bot API.

use std::path::Path;

use async_trait::async_trait;
use teloxide::net::Download;
use teloxide::payloads::{SendMessageSetters, SendPhotoSetters};
use teloxide::requests::Requester;
use teloxide::types::{
    ChatId as TgChatId, FileId, InlineKeyboardButton, InlineKeyboardMarkup, InputFile,
    UserId as TgUserId,
};
use teloxide::Bot;
use tracing::{debug, warn};

use filterbot_core::buttons::keyboard_rows;
use filterbot_core::error::GatewayError;
use filterbot_core::gateway::ChatGateway;
use filterbot_core::types::{Button, ChatId, Filter, IncomingImage, Role, UserId};

pub struct TelegramGateway {
    bot: Bot,
}

impl TelegramGateway {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

fn tg_chat(chat: ChatId) -> TgChatId {
    TgChatId(chat.0)
}

/// Inline keyboard for `buttons`, two per row. A url Telegram would reject
/// is dropped from the keyboard rather than failing the whole message.
fn keyboard(buttons: &[Button]) -> Option<InlineKeyboardMarkup> {
    let rows: Vec<Vec<InlineKeyboardButton>> = keyboard_rows(buttons)
        .into_iter()
        .map(|row| {
            row.into_iter()
                .filter_map(|button| match url::Url::parse(&button.url) {
                    Ok(url) => Some(InlineKeyboardButton::url(button.text, url)),
                    Err(e) => {
                        warn!(url = %button.url, "skipping button with unparseable url: {}", e);
                        None
                    }
                })
                .collect::<Vec<_>>()
        })
        .filter(|row| !row.is_empty())
        .collect();

    (!rows.is_empty()).then(|| InlineKeyboardMarkup::new(rows))
}

#[async_trait]
impl ChatGateway for TelegramGateway {
    async fn member_role(&self, chat: ChatId, user: UserId) -> Result<Role, GatewayError> {
        let member = self
            .bot
            .get_chat_member(tg_chat(chat), TgUserId(user.0))
            .await
            .map_err(|e| GatewayError::with_source(format!("failed to get chat member: {e}"), e))?;

        let kind = &member.kind;
        let role = if kind.is_owner() {
            Role::Owner
        } else if kind.is_administrator() {
            Role::Administrator
        } else if kind.is_restricted() {
            Role::Restricted
        } else if kind.is_left() {
            Role::Left
        } else if kind.is_banned() {
            Role::Banned
        } else {
            Role::Member
        };
        Ok(role)
    }

    async fn download_image(&self, image: &IncomingImage, dest: &Path) -> Result<(), GatewayError> {
        let file = self
            .bot
            .get_file(FileId(image.file_id.clone()))
            .await
            .map_err(|e| GatewayError::with_source(format!("failed to get file info: {e}"), e))?;

        let mut out = tokio::fs::File::create(dest)
            .await
            .map_err(|e| GatewayError::with_source(format!("failed to create {}", dest.display()), e))?;
        self.bot
            .download_file(&file.path, &mut out)
            .await
            .map_err(|e| GatewayError::with_source(format!("failed to download file: {e}"), e))?;
        out.sync_all()
            .await
            .map_err(|e| GatewayError::with_source(format!("failed to flush {}", dest.display()), e))?;

        debug!(file_id = %image.file_id, dest = %dest.display(), "downloaded image from Telegram");
        Ok(())
    }

    async fn send_text(&self, chat: ChatId, text: &str, buttons: &[Button]) -> Result<(), GatewayError> {
        let mut request = self.bot.send_message(tg_chat(chat), text);
        if let Some(markup) = keyboard(buttons) {
            request = request.reply_markup(markup);
        }
        request
            .await
            .map_err(|e| GatewayError::with_source(format!("failed to send message: {e}"), e))?;
        Ok(())
    }

    async fn send_filter(
        &self,
        chat: ChatId,
        filter: &Filter,
        image: Option<&Path>,
    ) -> Result<(), GatewayError> {
        let markup = keyboard(&filter.buttons);
        match image {
            Some(path) => {
                let mut request = self
                    .bot
                    .send_photo(tg_chat(chat), InputFile::file(path.to_path_buf()));
                if let Some(markup) = markup {
                    request = request.reply_markup(markup);
                }
                request
                    .await
                    .map_err(|e| GatewayError::with_source(format!("failed to send photo: {e}"), e))?;
            }
            None => {
                let mut request = self.bot.send_message(tg_chat(chat), filter.trigger.clone());
                if let Some(markup) = markup {
                    request = request.reply_markup(markup);
                }
                request
                    .await
                    .map_err(|e| GatewayError::with_source(format!("failed to send message: {e}"), e))?;
            }
        }
        Ok(())
    }
}
