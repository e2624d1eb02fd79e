use async_trait::async_trait;
use tracing::debug;

use journal_common::openai::{
    ChatCompletionRequest, Message, OpenAiClient, OpenAiClientConfig, OpenAiClientError,
};

use crate::error::ClassifierError;
use crate::model::Category;
use crate::verdict::verdict_schema_json;

/// Opaque text classifier. Returns raw, unvalidated model output.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(
        &self,
        entry_text: &str,
        categories: &[Category],
    ) -> Result<String, ClassifierError>;
}

/// Classifier backed by a chat-completions model. Exactly one upstream request per
/// call: a failed attempt surfaces as `Unavailable` instead of being re-asked.
pub struct OpenAiClassifier {
    openai: OpenAiClient,
    model: String,
}

impl OpenAiClassifier {
    /// Any retry budget in `config` is discarded.
    pub fn new(
        config: OpenAiClientConfig,
        model: impl Into<String>,
    ) -> Result<Self, OpenAiClientError> {
        Ok(Self {
            openai: OpenAiClient::new(config.with_max_retries(0))?,
            model: model.into(),
        })
    }
}

#[async_trait]
impl Classifier for OpenAiClassifier {
    async fn classify(
        &self,
        entry_text: &str,
        categories: &[Category],
    ) -> Result<String, ClassifierError> {
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![Message::user(build_prompt(entry_text, categories))],
            temperature: None,
            max_tokens: None,
        };
        let response = self
            .openai
            .chat_completions(request, None)
            .await
            .map_err(|e| ClassifierError::Unavailable(e.to_string()))?;

        if let Some(usage) = &response.usage {
            debug!(
                model = %self.model,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "classifier usage"
            );
        }
        response.first_text().ok_or(ClassifierError::EmptyResponse)
    }
}

/// The text the classifier sees for one entry.
pub fn entry_text(title: Option<&str>, content: &str) -> String {
    match title.map(str::trim).filter(|t| !t.is_empty()) {
        Some(title) => format!("Title: {title}\n\nContent: {content}"),
        None => content.to_string(),
    }
}

pub fn build_prompt(entry_text: &str, categories: &[Category]) -> String {
    let category_lines = if categories.is_empty() {
        "(none yet)".to_string()
    } else {
        categories
            .iter()
            .map(|c| {
                format!(
                    "- {} (ID: {}) [Color: {}]",
                    c.title,
                    c.id,
                    c.color.as_deref().unwrap_or("none")
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    };
    let schema = verdict_schema_json();

    format!(
        "You are a categorization expert for a personal journal application.

Analyze the following journal entry and determine the most appropriate category:

{entry_text}

EXISTING CATEGORIES:
{category_lines}

INSTRUCTIONS:
1. Review existing categories. MATCH EXISTING if closer than 70%.
2. Create NEW category only if distinct theme.
3. OUTPUT MUST BE VALID JSON ONLY. NO MARKDOWN. NO CODE BLOCKS.
4. JSON STRUCTURE:
{{
  \"categoryAction\": \"existing\" | \"new\",
  \"categoryId\": \"string (ID if existing, empty string if new)\",
  \"newCategoryTitle\": \"string (Title if new, empty string if existing)\",
  \"newCategoryColor\": \"string (Hex color if new, empty string if existing)\",
  \"reasoning\": \"string\"
}}

JSON SCHEMA:
{schema}

When creating new:
- \"Theme & Subtheme\" style (e.g. \"Work & Career\")
- Concise (2-4 words)
- Hex color provided

RESPOND ONLY WITH THE JSON OBJECT."
    )
}
