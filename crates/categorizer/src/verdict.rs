/// Validation of raw classifier output.
///
/// The classifier is untrusted: its text is parsed and shape-checked here before any
/// branching logic sees it. Whether a referenced category actually exists is not checked
/// here; that needs the category snapshot and belongs to the resolver.
use std::sync::LazyLock;

use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

static CODE_FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```[A-Za-z]*[ \t]*\r?\n?|\r?\n?```").expect("valid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum VerdictAction {
    Existing,
    New,
}

/// The classifier's decision. Field names follow the wire format the prompt requests;
/// the short names are accepted as aliases.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, JsonSchema)]
pub struct ClassificationVerdict {
    #[serde(rename = "categoryAction", alias = "action")]
    pub action: VerdictAction,

    /// Id of an existing category (when `categoryAction` is "existing").
    #[serde(rename = "categoryId", default)]
    pub category_id: Option<String>,

    /// Title of the category to create (when `categoryAction` is "new").
    #[serde(rename = "newCategoryTitle", alias = "newTitle", default)]
    pub new_title: Option<String>,

    /// Hex colour of the category to create.
    #[serde(rename = "newCategoryColor", alias = "newColor", default)]
    pub new_color: Option<String>,

    /// Free-text explanation. Logged and returned, never interpreted.
    #[serde(default)]
    pub reasoning: Option<String>,
}

/// Remove Markdown code fences the model may have wrapped around its JSON.
pub fn strip_code_fences(raw: &str) -> String {
    CODE_FENCE_RE.replace_all(raw, "").trim().to_string()
}

/// Parse and shape-check raw classifier output.
///
/// - not JSON at all: `ValidationError::Malformed`
/// - JSON of the wrong shape: `ValidationError::SchemaViolation` carrying the payload
///
/// Optional string fields that are empty or whitespace-only come back as `None`.
pub fn validate(raw: &str) -> Result<ClassificationVerdict, ValidationError> {
    let cleaned = strip_code_fences(raw);

    let value: serde_json::Value =
        serde_json::from_str(&cleaned).map_err(ValidationError::Malformed)?;
    if !value.is_object() {
        return Err(ValidationError::SchemaViolation {
            reason: "expected a JSON object".to_string(),
            raw: cleaned,
        });
    }

    let mut verdict: ClassificationVerdict =
        serde_json::from_value(value).map_err(|e| ValidationError::SchemaViolation {
            reason: e.to_string(),
            raw: cleaned.clone(),
        })?;

    verdict.category_id = non_blank(verdict.category_id);
    verdict.new_title = non_blank(verdict.new_title);
    verdict.new_color = non_blank(verdict.new_color);
    Ok(verdict)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

/// JSON Schema of the verdict, embedded in the classifier prompt.
pub fn verdict_schema_json() -> String {
    let schema = schemars::schema_for!(ClassificationVerdict);
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}
