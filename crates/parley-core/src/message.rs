//! Chat message model.
//!
//! A [`Message`] is immutable once constructed. The rendered wire line is
//! precomputed because it is both the delivery payload and the history
//! record.

use chrono::Utc;

/// Timestamp format used for persisted rows: UTC, second precision.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// The current UTC timestamp in the persisted-row format.
#[must_use]
pub fn utc_timestamp() -> String {
    Utc::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Message kinds, determining the fan-out rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Server-originated announcement (join, leave, timeout). No sender.
    System,
    /// User chat line, delivered to every registered session.
    Broadcast,
    /// Addressed message, delivered to the target and echoed to the sender.
    Private,
}

/// An immutable chat message.
///
/// Invariants are enforced by the constructors: a `Private` message always
/// has a target; a `System` message has neither sender nor target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    kind: MessageKind,
    from: Option<String>,
    target: Option<String>,
    rendered: String,
}

impl Message {
    /// Create a system message: `[SYSTEM] {text}`.
    #[must_use]
    pub fn system(text: impl AsRef<str>) -> Self {
        Self {
            kind: MessageKind::System,
            from: None,
            target: None,
            rendered: format!("[SYSTEM] {}", text.as_ref()),
        }
    }

    /// Create a broadcast message: `[{from}] {text}`.
    #[must_use]
    pub fn broadcast(from: impl Into<String>, text: impl AsRef<str>) -> Self {
        let from = from.into();
        let rendered = format!("[{}] {}", from, text.as_ref());
        Self {
            kind: MessageKind::Broadcast,
            from: Some(from),
            target: None,
            rendered,
        }
    }

    /// Create a private message: `[PRIVATE from {from}] {text}`.
    #[must_use]
    pub fn private(
        from: impl Into<String>,
        target: impl Into<String>,
        text: impl AsRef<str>,
    ) -> Self {
        let from = from.into();
        let rendered = format!("[PRIVATE from {}] {}", from, text.as_ref());
        Self {
            kind: MessageKind::Private,
            from: Some(from),
            target: Some(target.into()),
            rendered,
        }
    }

    /// The message kind.
    #[must_use]
    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    /// Sender username, if any.
    #[must_use]
    pub fn from(&self) -> Option<&str> {
        self.from.as_deref()
    }

    /// Target username for private messages.
    #[must_use]
    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    /// The exact wire line delivered to recipients.
    #[must_use]
    pub fn rendered(&self) -> &str {
        &self.rendered
    }

    /// Whether `username` is in this message's delivery set.
    #[must_use]
    pub fn addressed_to(&self, username: &str) -> bool {
        match self.kind {
            MessageKind::System | MessageKind::Broadcast => true,
            MessageKind::Private => {
                self.target.as_deref() == Some(username) || self.from.as_deref() == Some(username)
            }
        }
    }
}
