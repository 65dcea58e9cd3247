//! The engine's only view of the chat platform.

use std::path::Path;

use async_trait::async_trait;

use crate::error::GatewayError;
use crate::types::{Button, ChatId, Filter, IncomingImage, Role, UserId};

#[async_trait]
pub trait ChatGateway: Send + Sync {
    /// Role of `user` in `chat`.
    async fn member_role(&self, chat: ChatId, user: UserId) -> Result<Role, GatewayError>;

    /// Fetch an image the user sent and store it at `dest`.
    async fn download_image(&self, image: &IncomingImage, dest: &Path) -> Result<(), GatewayError>;

    /// Send a text message, with an inline keyboard when `buttons` is non-empty.
    async fn send_text(&self, chat: ChatId, text: &str, buttons: &[Button]) -> Result<(), GatewayError>;

    /// Render a matched filter. `image` is the local file when one is stored and present.
    async fn send_filter(
        &self,
        chat: ChatId,
        filter: &Filter,
        image: Option<&Path>,
    ) -> Result<(), GatewayError>;
}
