//! Message router. Every inbound message goes through [`FilterBot::handle`].

use std::sync::Arc;

use tracing::{debug, error, info};

use crate::commands::Command;
use crate::config::Config;
use crate::conversation::Conversations;
use crate::error::BotError;
use crate::gateway::ChatGateway;
use crate::images::ImageStore;
use crate::matcher::TriggerMatcher;
use crate::messages;
use crate::permissions::may_manage_filters;
use crate::rate_limit::RateLimiter;
use crate::session::SessionKey;
use crate::store::FilterStore;
use crate::types::{normalize_trigger, ChatId, ChatKind, Inbound, InboundContent, UserId};

pub struct FilterBot {
    gateway: Arc<dyn ChatGateway>,
    store: Arc<FilterStore>,
    images: Arc<ImageStore>,
    conversations: Conversations,
    matcher: TriggerMatcher,
}

impl FilterBot {
    pub fn new(config: &Config, store: Arc<FilterStore>, gateway: Arc<dyn ChatGateway>) -> Self {
        let images = Arc::new(ImageStore::new(config.images_path()));
        let conversations = Conversations::new(
            Arc::clone(&gateway),
            Arc::clone(&store),
            Arc::clone(&images),
            RateLimiter::new(config.rate_limit, config.rate_window()),
            config.image_timeout(),
        );
        let matcher = TriggerMatcher::new(Arc::clone(&store));
        Self {
            gateway,
            store,
            images,
            conversations,
            matcher,
        }
    }

    pub fn conversations(&self) -> &Conversations {
        &self.conversations
    }

    pub fn store(&self) -> &FilterStore {
        &self.store
    }

    pub async fn handle(&self, inbound: Inbound) -> Result<(), BotError> {
        let Inbound {
            chat,
            chat_kind,
            user,
            content,
        } = inbound;
        let key = SessionKey::new(chat, user);

        match content {
            InboundContent::Photo(image) => {
                if !self.conversations.receive_image(key, &image).await? {
                    debug!(session = %key, "photo outside the form ignored");
                }
            }
            InboundContent::Text(text) => match Command::parse(&text) {
                Some(command) => self.dispatch(command, chat, chat_kind, user).await?,
                None => self.on_text(key, &text).await?,
            },
        }
        Ok(())
    }

    async fn dispatch(&self, command: Command, chat: ChatId, kind: ChatKind, user: UserId) -> Result<(), BotError> {
        let key = SessionKey::new(chat, user);
        debug!(session = %key, ?command, "command");
        match command {
            Command::Start => self.send(chat, messages::HELP).await?,
            Command::Filter => {
                self.conversations.begin(chat, kind, user).await?;
            }
            Command::Skip => {
                self.conversations.skip(key).await?;
            }
            Command::Stop => {
                self.conversations.stop(key).await?;
            }
            Command::Filters => {
                let filters = self.store.list(chat);
                self.send(chat, &messages::filter_list(&filters)).await?;
            }
            Command::DeleteFilter(argument) => self.delete_filter(chat, kind, user, argument).await?,
            Command::Unknown(name) => debug!(command = %name, "unknown command ignored"),
        }
        Ok(())
    }

    async fn delete_filter(
        &self,
        chat: ChatId,
        kind: ChatKind,
        user: UserId,
        argument: Option<String>,
    ) -> Result<(), BotError> {
        if !may_manage_filters(self.gateway.as_ref(), chat, kind, user).await {
            self.send(chat, messages::NOT_ADMIN_DELETE).await?;
            return Ok(());
        }

        let trigger = argument.as_deref().map(normalize_trigger).unwrap_or_default();
        if trigger.is_empty() {
            self.send(chat, messages::DELETE_USAGE).await?;
            return Ok(());
        }

        match self.store.delete(chat, &trigger).await {
            Ok(true) => {
                info!(chat = %chat, trigger = %trigger, user = %user, "filter deleted");
                self.send(chat, &messages::filter_deleted(&trigger)).await?;
            }
            Ok(false) => self.send(chat, &messages::filter_not_found(&trigger)).await?,
            Err(e) => {
                error!(chat = %chat, trigger = %trigger, "Error saving filters after delete: {}", e);
                self.send(chat, messages::DELETE_SAVE_FAILED).await?;
            }
        }
        Ok(())
    }

    async fn on_text(&self, key: SessionKey, text: &str) -> Result<(), BotError> {
        if self.conversations.receive_text(key, text).await? {
            return Ok(());
        }

        let Some(filter) = self.matcher.find(key.chat, text) else {
            return Ok(());
        };
        let image = filter
            .image
            .as_deref()
            .map(|name| self.images.path_of(name))
            .filter(|path| path.is_file());
        if filter.has_image() && image.is_none() {
            debug!(chat = %key.chat, trigger = %filter.trigger, "image file missing, sending without it");
        }
        self.gateway
            .send_filter(key.chat, &filter, image.as_deref())
            .await?;
        Ok(())
    }

    async fn send(&self, chat: ChatId, text: &str) -> Result<(), BotError> {
        self.gateway.send_text(chat, text, &[]).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::StageKind;
    use crate::test_support::RecordingGateway;
    use crate::types::{Filter, Role};

    const GROUP: ChatId = ChatId(-500);
    const ADMIN: UserId = UserId(1);
    const MEMBER: UserId = UserId(2);

    struct Harness {
        bot: FilterBot,
        gateway: Arc<RecordingGateway>,
        config: Config,
        _dir: tempfile::TempDir,
    }

    async fn harness() -> Harness {
        build(Config::default()).await
    }

    /// Filters file sits under a regular file, so every save fails.
    async fn unsaveable_harness() -> Harness {
        let harness = build(Config {
            filters_file: "blocker/filters.json".into(),
            ..Config::default()
        })
        .await;
        std::fs::write(harness.config.data_path().join("blocker"), b"file").unwrap();
        harness
    }

    async fn build(config: Config) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            data_dir: dir.path().to_path_buf(),
            ..config
        };
        config.ensure_dirs().unwrap();

        let gateway = Arc::new(RecordingGateway::new());
        gateway.set_role(GROUP, ADMIN, Role::Administrator);
        let store = Arc::new(FilterStore::open(config.filters_path()).await);
        let bot = FilterBot::new(&config, store, gateway.clone());
        Harness {
            bot,
            gateway,
            config,
            _dir: dir,
        }
    }

    impl Harness {
        async fn say(&self, user: UserId, text: &str) {
            self.bot
                .handle(Inbound::text(GROUP, ChatKind::Supergroup, user, text))
                .await
                .unwrap();
        }

        async fn photo(&self, user: UserId) {
            self.bot
                .handle(Inbound::photo(GROUP, ChatKind::Supergroup, user, "file-1"))
                .await
                .unwrap();
        }

        fn last(&self) -> String {
            self.gateway.last_text().unwrap_or_default()
        }

        fn store_has(&self, trigger: &str) -> bool {
            self.bot.store().lookup(GROUP, trigger).is_some()
        }
    }

    #[tokio::test]
    async fn test_help() {
        let h = harness().await;
        h.say(MEMBER, "/start").await;
        assert_eq!(h.last(), messages::HELP);
    }

    #[tokio::test]
    async fn test_create_then_trigger_with_image() {
        let h = harness().await;
        h.say(ADMIN, "/filter").await;
        h.photo(ADMIN).await;
        h.say(ADMIN, "Docs|https://docs.rs").await;
        h.say(ADMIN, "Hello").await;
        assert!(h.store_has("hello"));

        h.gateway.clear();
        h.say(MEMBER, "  HELLO ").await;
        let rendered = h.gateway.rendered();
        assert_eq!(rendered.len(), 1);
        let (chat, trigger, image) = &rendered[0];
        assert_eq!(*chat, GROUP);
        assert_eq!(trigger, "hello");
        assert!(image.as_ref().unwrap().starts_with(h.config.images_path()));
    }

    #[tokio::test]
    async fn test_missing_image_file_renders_without_it() {
        let h = harness().await;
        let filter = Filter {
            trigger: "gone".into(),
            image: Some("missing.jpg".into()),
            buttons: Vec::new(),
            created_by: ADMIN,
            created_at: chrono::Utc::now(),
        };
        h.bot.store().insert_unique(GROUP, filter).await.unwrap();

        h.say(MEMBER, "gone").await;
        assert_eq!(h.gateway.rendered(), vec![(GROUP, "gone".to_string(), None)]);
    }

    #[tokio::test]
    async fn test_non_matching_text_is_silent() {
        let h = harness().await;
        h.say(MEMBER, "just chatting").await;
        h.photo(MEMBER).await;
        assert!(h.gateway.sent().is_empty());
        assert_eq!(h.gateway.download_count(), 0);
    }

    #[tokio::test]
    async fn test_session_text_does_not_trigger_filters() {
        let h = harness().await;
        h.say(ADMIN, "/filter").await;
        h.say(ADMIN, "/skip").await;
        h.say(ADMIN, "/skip").await;
        h.say(ADMIN, "hello").await;

        // The same admin authoring a second filter whose trigger is taken.
        h.say(ADMIN, "/filter").await;
        h.say(ADMIN, "/skip").await;
        h.say(ADMIN, "/skip").await;
        h.gateway.clear();
        h.say(ADMIN, "hello").await;
        assert!(h.gateway.rendered().is_empty());
        assert!(h.last().contains("already exists"));
    }

    #[tokio::test]
    async fn test_member_cannot_author_in_group() {
        let h = harness().await;
        h.say(MEMBER, "/filter").await;
        assert_eq!(h.last(), messages::NOT_ADMIN_CREATE);
        assert!(!h
            .bot
            .conversations()
            .has_session(&SessionKey::new(GROUP, MEMBER)));
    }

    #[tokio::test]
    async fn test_second_filter_command_while_active() {
        let h = harness().await;
        h.say(ADMIN, "/filter").await;
        h.say(ADMIN, "/filter").await;
        assert_eq!(h.last(), messages::ALREADY_IN_PROGRESS);
        assert_eq!(
            h.bot.conversations().stage(&SessionKey::new(GROUP, ADMIN)),
            Some(StageKind::AwaitingImage)
        );
    }

    #[tokio::test]
    async fn test_skip_and_stop_without_session_are_silent() {
        let h = harness().await;
        h.say(ADMIN, "/skip").await;
        h.say(ADMIN, "/stop").await;
        h.say(ADMIN, "/whatever").await;
        assert!(h.gateway.sent().is_empty());
    }

    #[tokio::test]
    async fn test_list_filters() {
        let h = harness().await;
        h.say(MEMBER, "/filters").await;
        assert_eq!(h.last(), messages::NO_FILTERS);

        h.say(ADMIN, "/filter").await;
        h.say(ADMIN, "/skip").await;
        h.say(ADMIN, "A|http://a.com, B|http://b.com").await;
        h.say(ADMIN, "rules").await;

        h.say(MEMBER, "/filters").await;
        assert!(h.last().contains("1. rules (2 buttons)"));
    }

    #[tokio::test]
    async fn test_delete_filter() {
        let h = harness().await;
        h.say(ADMIN, "/filter").await;
        h.say(ADMIN, "/skip").await;
        h.say(ADMIN, "/skip").await;
        h.say(ADMIN, "good morning").await;

        h.say(MEMBER, "/deletefilter good morning").await;
        assert_eq!(h.last(), messages::NOT_ADMIN_DELETE);
        assert!(h.store_has("good morning"));

        h.say(ADMIN, "/deletefilter").await;
        assert_eq!(h.last(), messages::DELETE_USAGE);

        h.say(ADMIN, "/deletefilter Good Morning").await;
        assert_eq!(h.last(), messages::filter_deleted("good morning"));
        assert!(!h.store_has("good morning"));

        h.say(ADMIN, "/deletefilter good morning").await;
        assert_eq!(h.last(), messages::filter_not_found("good morning"));
    }

    #[tokio::test]
    async fn test_private_chat_needs_no_admin() {
        let h = harness().await;
        let chat = ChatId(42);
        h.bot
            .handle(Inbound::text(chat, ChatKind::Private, MEMBER, "/filter"))
            .await
            .unwrap();
        assert!(h
            .bot
            .conversations()
            .has_session(&SessionKey::new(chat, MEMBER)));
    }

    #[tokio::test]
    async fn test_failed_save_warns_but_filter_stays_live() {
        let h = unsaveable_harness().await;
        h.say(ADMIN, "/filter").await;
        h.say(ADMIN, "/skip").await;
        h.say(ADMIN, "/skip").await;
        h.say(ADMIN, "Hi").await;

        let texts = h.gateway.texts();
        assert_eq!(texts[texts.len() - 2], messages::SAVE_FAILED);
        assert!(texts[texts.len() - 1].starts_with("✅ Filter created successfully!"));
        assert!(h.store_has("hi"));
        assert!(!h
            .bot
            .conversations()
            .has_session(&SessionKey::new(GROUP, ADMIN)));

        h.gateway.clear();
        h.say(MEMBER, "hi").await;
        assert_eq!(h.gateway.rendered().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_save_after_delete() {
        let h = unsaveable_harness().await;
        let filter = Filter {
            trigger: "rules".into(),
            image: None,
            buttons: Vec::new(),
            created_by: ADMIN,
            created_at: chrono::Utc::now(),
        };
        assert!(h.bot.store().insert_unique(GROUP, filter).await.is_err());
        assert!(h.store_has("rules"));

        h.say(ADMIN, "/deletefilter rules").await;
        assert_eq!(h.last(), messages::DELETE_SAVE_FAILED);
        assert!(!h.store_has("rules"));
    }
}
