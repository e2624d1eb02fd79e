use serde::{Deserialize, Serialize};

/// A journal category (e.g. "Work & Career").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Opaque stable identifier assigned by the store
    pub id: String,
    /// Globally unique title; lookups are exact and case-sensitive
    pub title: String,
    /// `#RGB` or `#RRGGBB`, if the category has a colour
    pub color: Option<String>,
}

/// Final assignment for an entry. `category_id` names a category that exists in the
/// store at the moment resolution returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedCategory {
    pub category_id: String,
    pub category_title: String,
}

impl From<&Category> for ResolvedCategory {
    fn from(category: &Category) -> Self {
        Self {
            category_id: category.id.clone(),
            category_title: category.title.clone(),
        }
    }
}

/// Body of `POST /api/categorize`.
///
/// Every field is optional at the wire level so that missing identity or content
/// produce the endpoint's own 401/400 instead of an extractor rejection.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorizeRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorizeResponse {
    #[serde(flatten)]
    pub category: ResolvedCategory,
    pub action: crate::verdict::VerdictAction,
    pub reasoning: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryListResponse {
    pub categories: Vec<Category>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub store: &'static str,
}
