//! Extraction backed by a text-completion model.
//!
//! The model is asked for a JSON object and its answer is parsed with the
//! same rules as a JSON resume, so normalization is identical to the
//! rule-based path.

use async_trait::async_trait;

use resumegraph_core::{CandidateFacts, Document, ExtractionError};

use crate::extract::{decode, parse_json_resume, FactExtractor};

/// A text-completion backend (hosted LLM, local model, canned fixture).
#[async_trait]
pub trait TextCompletion: Send + Sync {
    async fn complete(&self, prompt: &str) -> anyhow::Result<String>;
}

/// Longest document excerpt sent to the model, in bytes.
const MAX_PROMPT_DOCUMENT: usize = 12_000;

const INSTRUCTIONS: &str = "Extract the candidate from the resume below. \
Reply with a single JSON object and nothing else, using exactly these keys:\n\
{\"name\": string, \"contact\": string, \"skills\": [string]}\n\
Use an empty string for a missing contact and an empty list for missing skills.\n\
\n\
Resume:\n";

pub struct CompletionExtractor<C> {
    completion: C,
}

impl<C: TextCompletion> CompletionExtractor<C> {
    pub fn new(completion: C) -> Self {
        Self { completion }
    }

    fn prompt(document: &str) -> String {
        let mut end = document.len().min(MAX_PROMPT_DOCUMENT);
        while !document.is_char_boundary(end) {
            end -= 1;
        }
        format!("{INSTRUCTIONS}{}", &document[..end])
    }
}

#[async_trait]
impl<C: TextCompletion> FactExtractor for CompletionExtractor<C> {
    fn name(&self) -> &str {
        "completion"
    }

    async fn extract(&self, document: &Document) -> Result<CandidateFacts, ExtractionError> {
        let text = decode(document)?;
        let reply = self
            .completion
            .complete(&Self::prompt(text))
            .await
            .map_err(|source| ExtractionError::Completion { source })?;

        let json = json_object(&reply).ok_or_else(|| ExtractionError::Completion {
            source: anyhow::anyhow!("reply contains no JSON object"),
        })?;
        parse_json_resume(json).map_err(|e| match e {
            ExtractionError::Unreadable(detail) => ExtractionError::Completion {
                source: anyhow::anyhow!(detail),
            },
            other => other,
        })
    }
}

/// The outermost `{...}` span of a reply, dropping code fences and chatter.
fn json_object(reply: &str) -> Option<&str> {
    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    (start < end).then(|| &reply[start..=end])
}
