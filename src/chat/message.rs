//! Conversation message model
//!
//! Field names follow the persisted JSON layout (`imageUrl`, `toolCalls`,
//! `toolResults`) so logs written by earlier builds keep loading.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

impl Role {
    /// Wire name used by the hosted model
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Model => "model",
        }
    }
}

/// A single structured content part
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    Image { mime_type: String, data: String },
}

/// Message body: plain text or structured parts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl Content {
    /// Concatenated text of the content, ignoring non-text parts
    #[must_use]
    pub fn text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::Image { .. } => None,
                })
                .collect::<Vec<_>>()
                .join(""),
        }
    }

    /// Whether the content carries no text
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text().is_empty()
    }
}

impl Default for Content {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

impl From<&str> for Content {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for Content {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

/// A function call issued by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(default = "empty_args")]
    pub args: Value,
}

fn empty_args() -> Value {
    Value::Object(serde_json::Map::new())
}

/// Output of a locally executed tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub name: String,
    pub output: Value,
}

/// A web source returned by search grounding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceCitation {
    pub uri: String,
    pub title: String,
}

/// One entry of the conversation log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub role: Role,
    #[serde(default)]
    pub content: Content,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<SourceCitation>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_results: Option<Vec<ToolResult>>,
}

impl Message {
    fn new(prefix: &str, role: Role, content: Content) -> Self {
        Self {
            id: format!("{prefix}-{}", Uuid::new_v4()),
            role,
            content,
            image_url: None,
            sources: None,
            tool_calls: None,
            tool_results: None,
        }
    }

    /// A message typed by the user
    #[must_use]
    pub fn user(content: impl Into<Content>) -> Self {
        Self::new("user", Role::User, content.into())
    }

    /// A final or informational model message
    #[must_use]
    pub fn model(content: impl Into<Content>) -> Self {
        Self::new("model", Role::Model, content.into())
    }

    /// A model entry recording the function calls it issued
    #[must_use]
    pub fn tool_calls(calls: Vec<ToolCall>) -> Self {
        let mut msg = Self::new("model", Role::Model, Content::default());
        msg.tool_calls = Some(calls);
        msg
    }

    /// A model entry recording a locally produced tool result
    #[must_use]
    pub fn tool_result(result: ToolResult) -> Self {
        let mut msg = Self::new("model", Role::Model, Content::default());
        msg.id.push_str("-result");
        msg.tool_results = Some(vec![result]);
        msg
    }

    /// Attach an image reference (data URL or path)
    #[must_use]
    pub fn with_image(mut self, image_url: impl Into<String>) -> Self {
        self.image_url = Some(image_url.into());
        self
    }

    /// Attach search citations
    #[must_use]
    pub fn with_sources(mut self, sources: Vec<SourceCitation>) -> Self {
        self.sources = Some(sources);
        self
    }

    /// Whether this entry only records tool traffic
    #[must_use]
    pub fn is_tool_entry(&self) -> bool {
        self.tool_calls.as_ref().is_some_and(|c| !c.is_empty())
            || self.tool_results.as_ref().is_some_and(|r| !r.is_empty())
    }
}
