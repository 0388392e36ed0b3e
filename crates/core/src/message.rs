//! Message and Conversation domain types.
//!
//! A conversation owns an append-only, timestamp-ordered history of
//! messages. Nothing in the pipeline edits a stored message; compaction
//! produces new in-memory lists instead.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// The language model
    Assistant,
    /// Instructions or injected context (e.g. a compaction summary)
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            "system" => Ok(Role::System),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// A single message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: String,

    /// Who sent this message
    pub role: Role,

    /// The text content
    pub content: String,

    /// Attached images (base64 payloads). Never counted as text tokens.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,

    /// Model that produced this message; set only for assistant turns
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Creation time; the sole ordering authority within a conversation
    pub timestamp: DateTime<Utc>,
}

impl Message {
    fn with_role(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            images: Vec::new(),
            model: None,
            timestamp: Utc::now(),
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, content)
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, content)
    }

    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, content)
    }

    /// Attach images to this message.
    pub fn with_images(mut self, images: Vec<String>) -> Self {
        self.images = images;
        self
    }

    /// Record which model produced this message.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Conversation header. Messages are stored and loaded separately.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    /// Unique conversation ID
    pub id: ConversationId,

    /// Display title
    pub title: String,

    /// When this conversation was created
    pub created_at: DateTime<Utc>,

    /// Last activity; advanced only through `ConversationStore::touch`
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub const DEFAULT_TITLE: &'static str = "New Chat";

    /// Create a new conversation with the default title.
    pub fn new() -> Self {
        Self::titled(Self::DEFAULT_TITLE)
    }

    pub fn titled(title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: ConversationId::new(),
            title: title.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_user_message() {
        let msg = Message::user("Hello there");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "Hello there");
        assert!(msg.images.is_empty());
        assert!(msg.model.is_none());
    }

    #[test]
    fn assistant_message_records_model() {
        let msg = Message::assistant("Hi").with_model("llama3.2:latest");
        assert_eq!(msg.model.as_deref(), Some("llama3.2:latest"));
    }

    #[test]
    fn message_serialization_roundtrip() {
        let msg = Message::user("Test message").with_images(vec!["aGVsbG8=".into()]);
        let json = serde_json::to_string(&msg).unwrap();
        let deserialized: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, msg);
        assert!(json.contains("\"role\":\"user\""));
    }

    #[test]
    fn role_parses_from_storage_form() {
        for role in [Role::User, Role::Assistant, Role::System] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("tool".parse::<Role>().is_err());
    }

    #[test]
    fn new_conversation_has_default_title() {
        let conv = Conversation::new();
        assert_eq!(conv.title, "New Chat");
        assert_eq!(conv.created_at, conv.updated_at);
    }
}
