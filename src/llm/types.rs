//! Gemini `generateContent` wire types

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::chat::{SourceCitation, ToolCall};

/// Role-tagged content block used in both requests and responses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl WireContent {
    /// Content authored by the user
    #[must_use]
    pub fn user(parts: Vec<Part>) -> Self {
        Self {
            role: Some("user".to_string()),
            parts,
        }
    }

    /// Content authored by the model
    #[must_use]
    pub fn model(parts: Vec<Part>) -> Self {
        Self {
            role: Some("model".to_string()),
            parts,
        }
    }
}

/// A content part
///
/// Modelled as a struct of optional members rather than an enum: responses
/// may carry extra sibling keys (e.g. thought signatures) next to the part
/// payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_response: Option<FunctionResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought_signature: Option<String>,
}

impl Part {
    /// Text part
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    /// Base64 inline media part
    #[must_use]
    pub fn inline(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            inline_data: Some(InlineData {
                mime_type: mime_type.into(),
                data: data.into(),
            }),
            ..Self::default()
        }
    }

    /// Function call part
    #[must_use]
    pub fn function_call(call: &ToolCall) -> Self {
        Self {
            function_call: Some(FunctionCall {
                name: call.name.clone(),
                args: call.args.clone(),
            }),
            ..Self::default()
        }
    }

    /// Function response part
    ///
    /// The API requires the response to be a JSON object, so scalar and
    /// array outputs are wrapped as `{"result": ...}`.
    #[must_use]
    pub fn function_response(name: impl Into<String>, output: &Value) -> Self {
        let response = if output.is_object() {
            output.clone()
        } else {
            serde_json::json!({ "result": output })
        };
        Self {
            function_response: Some(FunctionResponse {
                name: name.into(),
                response,
            }),
            ..Self::default()
        }
    }
}

/// Base64 inline payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

/// Function call emitted by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default = "empty_object")]
    pub args: Value,
}

impl From<&FunctionCall> for ToolCall {
    fn from(call: &FunctionCall) -> Self {
        Self {
            name: call.name.clone(),
            args: call.args.clone(),
        }
    }
}

/// Function result sent back to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionResponse {
    pub name: String,
    pub response: Value,
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

/// Declaration of a locally callable function
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDeclaration {
    pub name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
}

/// Tool entry of a request
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) enum RequestTool {
    FunctionDeclarations(Vec<FunctionDeclaration>),
    GoogleSearch(serde_json::Map<String, Value>),
}

/// `generateContent` request body
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateContentRequest<'a> {
    pub contents: &'a [WireContent],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<WireContent>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<RequestTool>,
}

/// `generateContent` response body
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default)]
    pub prompt_feedback: Option<PromptFeedback>,
}

/// Candidate completion
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<WireContent>,
    #[serde(default)]
    pub finish_reason: Option<String>,
    #[serde(default)]
    pub grounding_metadata: Option<GroundingMetadata>,
}

/// Why a prompt was refused
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    #[serde(default)]
    pub block_reason: Option<String>,
}

/// Search grounding attached to a candidate
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroundingMetadata {
    #[serde(default)]
    pub grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GroundingChunk {
    #[serde(default)]
    pub web: Option<WebChunk>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebChunk {
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

impl GenerateContentResponse {
    fn first_content(&self) -> Option<&WireContent> {
        self.candidates.first().and_then(|c| c.content.as_ref())
    }

    /// Concatenated text parts of the first candidate
    #[must_use]
    pub fn text(&self) -> String {
        self.first_content()
            .map(|c| {
                c.parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }

    /// Function calls of the first candidate, in emission order
    #[must_use]
    pub fn function_calls(&self) -> Vec<ToolCall> {
        self.first_content()
            .map(|c| {
                c.parts
                    .iter()
                    .filter_map(|p| p.function_call.as_ref())
                    .map(ToolCall::from)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Web sources cited by search grounding; titles default to the uri
    #[must_use]
    pub fn sources(&self) -> Vec<SourceCitation> {
        self.candidates
            .first()
            .and_then(|c| c.grounding_metadata.as_ref())
            .map(|meta| {
                meta.grounding_chunks
                    .iter()
                    .filter_map(|chunk| chunk.web.as_ref())
                    .filter_map(|web| {
                        let uri = web.uri.clone().filter(|u| !u.is_empty())?;
                        let title = web.title.clone().unwrap_or_else(|| uri.clone());
                        Some(SourceCitation { uri, title })
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The model's content, to be echoed back on the next round
    #[must_use]
    pub fn model_content(&self) -> WireContent {
        let parts = self
            .first_content()
            .map(|c| c.parts.clone())
            .unwrap_or_default();
        WireContent::model(parts)
    }
}
