//! Tool Reply Envelope
//!
//! Every tool invocation produces a `ToolReply`: an ordered list of text
//! content blocks, an error flag, and an optional structured payload. This is
//! the `result` object of a successful `tools/call` JSON-RPC response.

use serde::Serialize;
use serde_json::Value;

/// A single content block inside a reply. Only text blocks are produced.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Content {
    Text { text: String },
}

impl Content {
    pub fn text(text: impl Into<String>) -> Self {
        Content::Text { text: text.into() }
    }
}

/// Reply returned by a tool handler.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ToolReply {
    pub content: Vec<Content>,
    #[serde(rename = "isError")]
    pub is_error: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ToolReply {
    /// Successful reply with a single text block.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![Content::text(text)],
            is_error: false,
            data: None,
        }
    }

    /// Failed reply with a single text block and `isError: true`.
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            content: vec![Content::text(text)],
            is_error: true,
            data: None,
        }
    }

    /// Attach a structured payload.
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Concatenated text of all content blocks.
    pub fn text_content(&self) -> String {
        self.content
            .iter()
            .map(|c| match c {
                Content::Text { text } => text.as_str(),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
