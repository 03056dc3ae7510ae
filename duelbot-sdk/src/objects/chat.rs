//! Chat traffic exchanged with the relay.

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

use crate::signature::Signature;

/// Privilege level of the chatter who sent a line, as reported by the relay.
///
/// Levels are ordered: a command requiring `Subscriber` is also available to
/// moderators and the broadcaster.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum UserLevel {
    #[default]
    Viewer,
    Subscriber,
    Moderator,
    Broadcaster,
}

impl std::fmt::Display for UserLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserLevel::Viewer => write!(f, "viewer"),
            UserLevel::Subscriber => write!(f, "subscriber"),
            UserLevel::Moderator => write!(f, "moderator"),
            UserLevel::Broadcaster => write!(f, "broadcaster"),
        }
    }
}

/// One incoming chat line or whisper.
///
/// `channel` is `None` when the line arrived as a private whisper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEvent {
    #[serde(default)]
    pub channel: Option<CompactString>,
    pub user: CompactString,
    #[serde(default)]
    pub level: UserLevel,
    pub message: String,
}

impl Signature for ChatEvent {}

impl ChatEvent {
    /// Whether the line was delivered privately rather than in a channel.
    pub fn is_whisper(&self) -> bool {
        self.channel.as_deref().is_none_or(str::is_empty)
    }
}

/// A reply the bot asks the relay to deliver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutgoingChat {
    /// Public message in a channel.
    Message { channel: CompactString, text: String },
    /// Private whisper to a single user.
    Whisper { user: CompactString, text: String },
}

impl Signature for OutgoingChat {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_channel_is_whisper() {
        let mut event = ChatEvent {
            channel: None,
            user: "alice".into(),
            level: UserLevel::Viewer,
            message: "!rock".to_string(),
        };
        assert!(event.is_whisper());

        event.channel = Some("".into());
        assert!(event.is_whisper());

        event.channel = Some("streamer".into());
        assert!(!event.is_whisper());
    }

    #[test]
    fn test_level_defaults_to_viewer() {
        let event: ChatEvent =
            serde_json::from_str(r#"{"user":"bob","message":"!accept"}"#).unwrap();
        assert_eq!(event.level, UserLevel::Viewer);
        assert!(event.channel.is_none());
        assert!(UserLevel::Moderator > UserLevel::Subscriber);
    }

    #[test]
    fn test_outgoing_is_tagged() {
        let whisper = OutgoingChat::Whisper {
            user: "bob".into(),
            text: "pick a weapon".to_string(),
        };
        let json = serde_json::to_value(&whisper).unwrap();
        assert_eq!(json["kind"], "whisper");
        assert_eq!(json["user"], "bob");
    }
}
