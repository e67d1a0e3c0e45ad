//! Request and response bodies for the analysis service.
//!
//! Field names are camelCase on the wire. Optional collections deserialize to
//! empty so a missing or null `choices`, `questions` or `result` is not an
//! error.

use serde::{Deserialize, Deserializer, Serialize};

use crate::types::{MimeCategory, QaPair};

/// Response from the media ingestion endpoint
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Body of a conversational query
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub session_id: String,
    pub query: String,
    pub stream: bool,
}

impl ChatRequest {
    /// Non-streaming query against a session
    pub fn new(session_id: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            query: query.into(),
            stream: false,
        }
    }
}

/// Response from the conversational endpoint
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub choices: Vec<Choice>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Choice {
    #[serde(default, deserialize_with = "null_as_default")]
    pub message: ResponseMessage,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatResponse {
    /// Build a response carrying a single answer
    pub fn with_content(content: impl Into<String>) -> Self {
        Self {
            choices: vec![Choice {
                message: ResponseMessage {
                    content: Some(content.into()),
                },
            }],
        }
    }

    /// Content of the first choice, empty when absent
    pub fn content(&self) -> &str {
        self.choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .unwrap_or("")
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct QuestionsRequest<'a> {
    pub summary: &'a str,
    pub media_type: MimeCategory,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct QuestionsResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub questions: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FormatRequest<'a> {
    pub qa_data: &'a [QaPair],
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct FormatResponse {
    #[serde(default)]
    pub result: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CleanupRequest<'a> {
    pub session_id: &'a str,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
