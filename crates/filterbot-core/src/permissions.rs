//! Admin gate for group-scoped actions.

use tracing::warn;

use crate::gateway::ChatGateway;
use crate::types::{ChatId, ChatKind, UserId};

/// True when `user` may author or delete filters in `chat`. Only groups and
/// supergroups are gated; a failed role lookup counts as not privileged.
pub async fn may_manage_filters(
    gateway: &dyn ChatGateway,
    chat: ChatId,
    kind: ChatKind,
    user: UserId,
) -> bool {
    if !kind.is_group() {
        return true;
    }
    match gateway.member_role(chat, user).await {
        Ok(role) => role.is_privileged(),
        Err(e) => {
            warn!(chat = %chat, user = %user, "member lookup failed: {}", e);
            false
        }
    }
}
