//! Chat command layer.
//!
//! A command is plain data: a name, the lowest [`UserLevel`] allowed to run
//! it, whether it may only be invoked by other bot code, and a handler.
//! [`guarded`] wraps a command's handler with the permission and
//! internal-only checks, and [`CommandRouter`] maps `!name` to the guarded
//! handlers.

mod duel;

pub use duel::{AbortDuelHandler, AcceptHandler, CancelDuelHandler, DuelHandler, WeaponHandler};

use async_trait::async_trait;
use compact_str::CompactString;
use duelbot_sdk::objects::{ChatEvent, UserLevel};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error};

use crate::events::{UserRef, Weapon};
use crate::processors::{DuelEngine, DuelError};

/// Everything a handler knows about one invocation.
#[derive(Debug, Clone)]
pub struct CommandContext {
    /// `None` for whispers.
    pub channel: Option<CompactString>,
    pub user: UserRef,
    pub level: UserLevel,
    pub args: Vec<String>,
    /// Set when the call comes from bot code rather than from chat.
    pub internal: bool,
}

impl CommandContext {
    pub fn is_whisper(&self) -> bool {
        self.channel.is_none()
    }
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("not a command")]
    NotACommand,

    #[error("unknown command: {name}")]
    Unknown { name: String },

    #[error("requires {required} level")]
    PermissionDenied { required: UserLevel },

    #[error("command is internal only")]
    InternalOnly,

    #[error("command only works in a channel")]
    ChannelOnly,

    /// Malformed arguments; the text is sent back to the caller.
    #[error("{0}")]
    Usage(&'static str),

    #[error(transparent)]
    Engine(#[from] DuelError),
}

#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(&self, engine: &DuelEngine, ctx: CommandContext) -> Result<(), CommandError>;
}

/// A named chat command.
#[derive(Clone)]
pub struct Command {
    pub name: &'static str,
    pub required_level: UserLevel,
    pub is_internal: bool,
    pub handler: Arc<dyn CommandHandler>,
}

impl Command {
    /// A command anyone may run from chat.
    pub fn new(name: &'static str, handler: impl CommandHandler + 'static) -> Self {
        Self {
            name,
            required_level: UserLevel::Viewer,
            is_internal: false,
            handler: Arc::new(handler),
        }
    }

    pub fn with_level(mut self, level: UserLevel) -> Self {
        self.required_level = level;
        self
    }

    pub fn internal(mut self) -> Self {
        self.is_internal = true;
        self
    }
}

struct Guarded {
    required_level: UserLevel,
    is_internal: bool,
    inner: Arc<dyn CommandHandler>,
}

#[async_trait]
impl CommandHandler for Guarded {
    async fn handle(&self, engine: &DuelEngine, ctx: CommandContext) -> Result<(), CommandError> {
        if self.is_internal && !ctx.internal {
            return Err(CommandError::InternalOnly);
        }
        if !ctx.internal && ctx.level < self.required_level {
            return Err(CommandError::PermissionDenied {
                required: self.required_level,
            });
        }
        self.inner.handle(engine, ctx).await
    }
}

/// Wrap `command`'s handler with its permission and internal-only checks.
pub fn guarded(command: &Command) -> Arc<dyn CommandHandler> {
    Arc::new(Guarded {
        required_level: command.required_level,
        is_internal: command.is_internal,
        inner: command.handler.clone(),
    })
}

/// Split `!name arg arg` into a lowercased name and its arguments.
pub fn parse(message: &str) -> Option<(String, Vec<String>)> {
    let mut words = message.trim().strip_prefix('!')?.split_whitespace();
    let name = words.next()?.to_lowercase();
    Some((name, words.map(str::to_string).collect()))
}

/// Routes chat lines to guarded command handlers.
pub struct CommandRouter {
    engine: Arc<DuelEngine>,
    commands: HashMap<&'static str, Arc<dyn CommandHandler>>,
}

impl CommandRouter {
    pub fn new(engine: Arc<DuelEngine>) -> Self {
        Self {
            engine,
            commands: HashMap::new(),
        }
    }

    /// Router with the duel commands registered.
    pub fn with_duel_commands(engine: Arc<DuelEngine>) -> Self {
        let mut router = Self::new(engine);
        router.register(Command::new("duel", DuelHandler));
        router.register(Command::new("accept", AcceptHandler));
        for weapon in Weapon::ALL {
            router.register(Command::new(weapon.as_str(), WeaponHandler { weapon }));
        }
        router.register(Command::new("cancelduel", CancelDuelHandler));
        router.register(
            Command::new("abortduel", AbortDuelHandler).with_level(UserLevel::Moderator),
        );
        router
    }

    pub fn register(&mut self, command: Command) {
        self.commands.insert(command.name, guarded(&command));
    }

    pub fn engine(&self) -> &Arc<DuelEngine> {
        &self.engine
    }

    /// Run the command named in a chat line.
    ///
    /// Usage errors are answered in place. Everything else is only logged;
    /// the returned error tells the caller what happened.
    pub async fn dispatch(&self, event: &ChatEvent) -> Result<(), CommandError> {
        let Some((name, args)) = parse(&event.message) else {
            return Err(CommandError::NotACommand);
        };
        let channel = event.channel.clone().filter(|c| !c.is_empty());
        let ctx = CommandContext {
            channel,
            user: UserRef::new(event.user.clone()),
            level: event.level,
            args,
            internal: false,
        };
        let reply_to = (ctx.channel.clone(), ctx.user.clone());

        let result = self.run(&name, ctx).await;
        match &result {
            Ok(()) => {}
            Err(CommandError::Usage(usage)) => match &reply_to {
                (Some(channel), _) => self.engine.say(channel, usage).await,
                (None, user) => self.engine.whisper(user, usage).await,
            },
            Err(CommandError::Engine(DuelError::Settlement(e))) => {
                error!(command = %name, user = %reply_to.1, error = %e, "Ledger unavailable");
            }
            Err(e) => debug!(command = %name, user = %reply_to.1, error = %e, "Command not run"),
        }
        result
    }

    /// Run a command on behalf of bot code, skipping the level check.
    pub async fn invoke_internal(
        &self,
        name: &str,
        mut ctx: CommandContext,
    ) -> Result<(), CommandError> {
        ctx.internal = true;
        self.run(name, ctx).await
    }

    async fn run(&self, name: &str, ctx: CommandContext) -> Result<(), CommandError> {
        let handler = self
            .commands
            .get(name)
            .ok_or_else(|| CommandError::Unknown {
                name: name.to_string(),
            })?;
        handler.handle(&self.engine, ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigStore, DuelConfig};
    use crate::events::{DuelEvent, EventRegistry};
    use crate::gateways::MemoryLedger;
    use crate::test_support::{RecordingChat, Sent};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn router(chat: Arc<RecordingChat>) -> CommandRouter {
        let engine = Arc::new(DuelEngine::new(
            EventRegistry::new(),
            Arc::new(MemoryLedger::new(100)),
            chat,
            ConfigStore::new(DuelConfig::default()),
        ));
        CommandRouter::with_duel_commands(engine)
    }

    fn line(channel: Option<&str>, user: &str, level: UserLevel, message: &str) -> ChatEvent {
        ChatEvent {
            channel: channel.map(Into::into),
            user: user.into(),
            level,
            message: message.to_string(),
        }
    }

    #[derive(Default)]
    struct Counter(AtomicUsize);

    #[async_trait]
    impl CommandHandler for Arc<Counter> {
        async fn handle(&self, _: &DuelEngine, _: CommandContext) -> Result<(), CommandError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_parse() {
        assert_eq!(
            parse("  !Duel @bob 50 "),
            Some(("duel".to_string(), vec!["@bob".to_string(), "50".to_string()]))
        );
        assert_eq!(parse("!accept"), Some(("accept".to_string(), vec![])));
        assert_eq!(parse("hello !duel"), None);
        assert_eq!(parse("!"), None);
    }

    #[tokio::test]
    async fn test_guard_checks_level_and_internal() {
        let chat = Arc::new(RecordingChat::default());
        let mut router = router(chat);
        let counter = Arc::new(Counter::default());
        router.register(Command::new("refresh", counter.clone()).internal());
        router.register(Command::new("shoutout", counter.clone()).with_level(UserLevel::Subscriber));

        let err = router
            .dispatch(&line(Some("c"), "viewer", UserLevel::Viewer, "!refresh"))
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::InternalOnly));

        let err = router
            .dispatch(&line(Some("c"), "viewer", UserLevel::Viewer, "!shoutout"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CommandError::PermissionDenied {
                required: UserLevel::Subscriber
            }
        ));

        router
            .dispatch(&line(Some("c"), "mod", UserLevel::Moderator, "!shoutout"))
            .await
            .unwrap();
        let ctx = CommandContext {
            channel: None,
            user: "bot".into(),
            level: UserLevel::Viewer,
            args: vec![],
            internal: false,
        };
        router.invoke_internal("refresh", ctx).await.unwrap();
        assert_eq!(counter.0.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unknown_and_plain_text() {
        let chat = Arc::new(RecordingChat::default());
        let router = router(chat.clone());

        assert!(matches!(
            router
                .dispatch(&line(Some("c"), "a", UserLevel::Viewer, "hi there"))
                .await,
            Err(CommandError::NotACommand)
        ));
        assert!(matches!(
            router
                .dispatch(&line(Some("c"), "a", UserLevel::Viewer, "!dice"))
                .await,
            Err(CommandError::Unknown { .. })
        ));
        assert!(chat.sent().is_empty());
    }

    #[tokio::test]
    async fn test_full_duel_through_router() {
        let chat = Arc::new(RecordingChat::default());
        let router = router(chat.clone());

        router
            .dispatch(&line(Some("streamer"), "Alice", UserLevel::Viewer, "!duel @Bob 30"))
            .await
            .unwrap();
        router
            .dispatch(&line(Some("streamer"), "bob", UserLevel::Viewer, "!accept"))
            .await
            .unwrap();

        // Public weapon lines are dropped.
        router
            .dispatch(&line(Some("streamer"), "alice", UserLevel::Viewer, "!rock"))
            .await
            .unwrap();
        let duel = &router.engine().registry().get_events::<DuelEvent>().await[0];
        assert!(!duel.get_participant(&"alice".into()).unwrap().has_moved());

        router
            .dispatch(&line(None, "alice", UserLevel::Viewer, "!rock"))
            .await
            .unwrap();
        router
            .dispatch(&line(Some(""), "bob", UserLevel::Viewer, "!paper"))
            .await
            .unwrap();

        assert!(router.engine().registry().is_empty().await);
        assert_eq!(
            chat.last_message().unwrap(),
            "bob's paper beats Alice's rock! bob wins 60 points."
        );
    }

    #[tokio::test]
    async fn test_usage_reply() {
        let chat = Arc::new(RecordingChat::default());
        let router = router(chat.clone());

        let err = router
            .dispatch(&line(Some("streamer"), "alice", UserLevel::Viewer, "!duel lots"))
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::Usage(_)));
        assert!(matches!(
            chat.sent().last(),
            Some(Sent::Message { channel, .. }) if channel == "streamer"
        ));
    }

    #[tokio::test]
    async fn test_abort_requires_moderator() {
        let chat = Arc::new(RecordingChat::default());
        let router = router(chat);

        router
            .dispatch(&line(Some("streamer"), "alice", UserLevel::Viewer, "!duel 10"))
            .await
            .unwrap();
        let err = router
            .dispatch(&line(Some("streamer"), "bob", UserLevel::Subscriber, "!abortduel alice"))
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::PermissionDenied { .. }));
        assert_eq!(router.engine().registry().len().await, 1);

        router
            .dispatch(&line(Some("streamer"), "carol", UserLevel::Moderator, "!abortduel @alice"))
            .await
            .unwrap();
        assert!(router.engine().registry().is_empty().await);
    }
}
