//! Conversation state: message model and the persisted log

mod log;
mod message;

pub use log::{ConversationLog, FileHistoryStore, HISTORY_KEY, HistoryStore, MemoryHistoryStore};
pub use message::{Content, ContentPart, Message, Role, SourceCitation, ToolCall, ToolResult};
