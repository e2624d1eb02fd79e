use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use tracing::{debug, info, warn};

use crate::error::ApiError;
use crate::model::{
    CategorizeRequest, CategorizeResponse, CategoryListResponse, HealthResponse,
};
use crate::oracle::{entry_text, Classifier};
use crate::rate_limit::RateLimiter;
use crate::resolver::{CategoryResolver, ResolverPolicy};
use crate::store::CategoryStore;
use crate::verdict;

#[derive(Clone)]
pub struct AppState {
    store: Arc<dyn CategoryStore>,
    classifier: Arc<dyn Classifier>,
    resolver: Arc<CategoryResolver>,
    limiter: Option<RateLimiter>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn CategoryStore>,
        classifier: Arc<dyn Classifier>,
        policy: ResolverPolicy,
        limiter: Option<RateLimiter>,
    ) -> Self {
        let resolver = Arc::new(CategoryResolver::new(Arc::clone(&store), policy));
        Self {
            store,
            classifier,
            resolver,
            limiter,
        }
    }

    async fn gate(&self, user_id: &str) -> Result<(), ApiError> {
        if let Some(limiter) = &self.limiter {
            limiter.check(user_id).await.map_err(ApiError::RateLimited)?;
        }
        Ok(())
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/categorize", post(categorize))
        .route("/api/categories", get(list_categories))
        .route("/healthz", get(health))
        .with_state(state)
}

/// Identity is established upstream; the request only has to carry it.
fn authenticate(request: &CategorizeRequest) -> Result<&str, ApiError> {
    request
        .user_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or(ApiError::Unauthorized)
}

async fn categorize(
    State(state): State<AppState>,
    Json(request): Json<CategorizeRequest>,
) -> Result<Json<CategorizeResponse>, ApiError> {
    let user_id = authenticate(&request)?;
    state.gate(user_id).await?;

    let content = request
        .content
        .as_deref()
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| ApiError::InvalidInput("Content is required".to_string()))?;

    info!(
        user_id,
        has_title = request.title.is_some(),
        content_len = content.len(),
        "categorizing entry"
    );

    let categories = state.store.list().await?;
    info!(count = categories.len(), "loaded existing categories");

    let text = entry_text(request.title.as_deref(), content);
    let raw = state.classifier.classify(&text, &categories).await?;
    debug!(raw = %raw, "classifier raw response");

    let verdict = verdict::validate(&raw)
        .inspect_err(|e| warn!(error = %e, raw = %raw, "rejected classifier output"))?;
    let resolved = state.resolver.resolve(&verdict, &categories).await?;

    info!(
        action = ?verdict.action,
        category_id = %resolved.category_id,
        category_title = %resolved.category_title,
        "entry categorized"
    );

    Ok(Json(CategorizeResponse {
        category: resolved,
        action: verdict.action,
        reasoning: verdict.reasoning.unwrap_or_default(),
    }))
}

async fn list_categories(
    State(state): State<AppState>,
) -> Result<Json<CategoryListResponse>, ApiError> {
    let categories = state.store.list().await?;
    Ok(Json(CategoryListResponse { categories }))
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        store: state.store.backend(),
    })
}

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::model::Category;
    use crate::store::MemoryCategoryStore;
    use crate::testing::ScriptedClassifier;

    struct Harness {
        store: Arc<MemoryCategoryStore>,
        classifier: Arc<ScriptedClassifier>,
        app: Router,
    }

    fn harness(categories: Vec<Category>, classifier: ScriptedClassifier) -> Harness {
        harness_with_limiter(categories, classifier, None)
    }

    fn harness_with_limiter(
        categories: Vec<Category>,
        classifier: ScriptedClassifier,
        limiter: Option<RateLimiter>,
    ) -> Harness {
        let store = Arc::new(MemoryCategoryStore::with_categories(categories));
        let classifier = Arc::new(classifier);
        let dyn_store: Arc<dyn CategoryStore> = store.clone();
        let dyn_classifier: Arc<dyn Classifier> = classifier.clone();
        let state = AppState::new(dyn_store, dyn_classifier, ResolverPolicy::default(), limiter);
        Harness {
            store,
            classifier,
            app: router(state),
        }
    }

    fn work_category() -> Category {
        Category {
            id: "1".to_string(),
            title: "Work & Career".to_string(),
            color: Some("#A3D8F4".to_string()),
        }
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, String) {
        let response = app.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        (status, String::from_utf8_lossy(&body).to_string())
    }

    async fn post_entry(app: &Router, body: Value) -> (StatusCode, String) {
        let request = Request::builder()
            .uri("/api/categorize")
            .method("POST")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request");
        send(app, request).await
    }

    async fn get_path(app: &Router, uri: &str) -> (StatusCode, String) {
        let request = Request::builder()
            .uri(uri)
            .method("GET")
            .body(Body::empty())
            .expect("request");
        send(app, request).await
    }

    #[tokio::test]
    async fn test_missing_identity_is_unauthorized() {
        let h = harness(vec![], ScriptedClassifier::replying("{}"));

        let (status, _) = post_entry(&h.app, json!({"content": "Long day."})).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = post_entry(&h.app, json!({"content": "Long day.", "userId": " "})).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(h.classifier.calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_content_is_bad_request() {
        let h = harness(vec![], ScriptedClassifier::replying("{}"));

        for body in [
            json!({"userId": "u1"}),
            json!({"userId": "u1", "content": ""}),
            json!({"userId": "u1", "content": "   \n"}),
        ] {
            let (status, text) = post_entry(&h.app, body).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(text, "Content is required");
        }
        assert_eq!(h.classifier.calls(), 0);
    }

    #[tokio::test]
    async fn test_existing_category_is_returned_without_write() {
        let h = harness(
            vec![work_category()],
            ScriptedClassifier::replying(
                r#"{"categoryAction":"existing","categoryId":"1","newCategoryTitle":"","newCategoryColor":"","reasoning":"Office deadline."}"#,
            ),
        );

        let (status, body) = post_entry(
            &h.app,
            json!({"title": "Monday", "content": "Deadline moved up.", "userId": "u1"}),
        )
        .await;

        assert_eq!(status, StatusCode::OK, "{body}");
        let body: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(
            body,
            json!({
                "categoryId": "1",
                "categoryTitle": "Work & Career",
                "action": "existing",
                "reasoning": "Office deadline."
            })
        );
        assert_eq!(h.store.writes(), 0);
        assert_eq!(
            h.classifier.last_entry().as_deref(),
            Some("Title: Monday\n\nContent: Deadline moved up.")
        );
    }

    #[tokio::test]
    async fn test_new_category_is_created_and_returned() {
        let h = harness(
            vec![],
            ScriptedClassifier::replying(
                "```json\n{\"categoryAction\":\"new\",\"categoryId\":\"\",\"newCategoryTitle\":\"Health & Wellness\",\"newCategoryColor\":\"#A3D8F4\",\"reasoning\":\"Gym.\"}\n```",
            ),
        );

        let (status, body) =
            post_entry(&h.app, json!({"content": "Morning run.", "userId": "u1"})).await;
        assert_eq!(status, StatusCode::OK, "{body}");

        let stored = h.store.list().await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].title, "Health & Wellness");
        assert_eq!(stored[0].color.as_deref(), Some("#A3D8F4"));

        let body: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(body["categoryId"], json!(stored[0].id));
        assert_eq!(body["categoryTitle"], "Health & Wellness");
        assert_eq!(body["action"], "new");
        assert_eq!(h.classifier.last_entry().as_deref(), Some("Morning run."));
    }

    #[tokio::test]
    async fn test_hallucinated_id_recovers_with_new_category() {
        let h = harness(
            vec![],
            ScriptedClassifier::replying(r#"{"categoryAction":"existing","categoryId":"bogus-id","reasoning":""}"#),
        );

        let (status, body) =
            post_entry(&h.app, json!({"content": "Went hiking.", "userId": "u1"})).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        let body: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(body["categoryTitle"], "bogus-id");
        assert_eq!(body["action"], "existing");
        assert_eq!(h.store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_classifier_outage_is_server_error() {
        let h = harness(vec![], ScriptedClassifier::unavailable());
        let (status, body) =
            post_entry(&h.app, json!({"content": "Went hiking.", "userId": "u1"})).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.starts_with("Failed to categorize entry:"), "{body}");
        assert_eq!(h.classifier.calls(), 1);
    }

    #[tokio::test]
    async fn test_empty_classifier_reply_is_server_error() {
        let h = harness(vec![], ScriptedClassifier::replying(""));
        let (status, body) =
            post_entry(&h.app, json!({"content": "Went hiking.", "userId": "u1"})).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.contains("no content received"), "{body}");
    }

    #[tokio::test]
    async fn test_malformed_classifier_output_writes_nothing() {
        let h = harness(vec![], ScriptedClassifier::replying("not json"));
        let (status, body) =
            post_entry(&h.app, json!({"content": "Went hiking.", "userId": "u1"})).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.contains("invalid JSON"), "{body}");
        assert_eq!(h.store.writes(), 0);
    }

    #[tokio::test]
    async fn test_missing_category_reference_is_server_error() {
        let h = harness(
            vec![work_category()],
            ScriptedClassifier::replying(r#"{"categoryAction":"existing","newCategoryTitle":"Hobbies"}"#),
        );
        let (status, body) =
            post_entry(&h.app, json!({"content": "Knitting.", "userId": "u1"})).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.contains("category id missing"), "{body}");
        assert_eq!(h.store.writes(), 0);
    }

    #[tokio::test]
    async fn test_rate_limited_requests_get_429() {
        let h = harness_with_limiter(
            vec![work_category()],
            ScriptedClassifier::replying(r#"{"categoryAction":"existing","categoryId":"1"}"#),
            RateLimiter::new(1),
        );
        let entry = json!({"content": "Standup.", "userId": "u1"});

        let (status, _) = post_entry(&h.app, entry.clone()).await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = post_entry(&h.app, entry).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert!(body.contains("rate limit exceeded"), "{body}");
        assert_eq!(h.classifier.calls(), 1);
    }

    #[tokio::test]
    async fn test_rate_limit_is_tracked_per_user() {
        let h = harness_with_limiter(
            vec![work_category()],
            ScriptedClassifier::replying(r#"{"categoryAction":"existing","categoryId":"1"}"#),
            RateLimiter::new(1),
        );

        let (status, _) = post_entry(&h.app, json!({"content": "Standup.", "userId": "u1"})).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = post_entry(&h.app, json!({"content": "Standup.", "userId": "u1"})).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

        let (status, _) = post_entry(&h.app, json!({"content": "Retro.", "userId": "u2"})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(h.classifier.calls(), 2);
    }

    #[tokio::test]
    async fn test_unauthenticated_requests_do_not_spend_tokens() {
        let h = harness_with_limiter(
            vec![work_category()],
            ScriptedClassifier::replying(r#"{"categoryAction":"existing","categoryId":"1"}"#),
            RateLimiter::new(1),
        );

        let (status, _) = post_entry(&h.app, json!({"content": "Standup."})).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) = post_entry(&h.app, json!({"content": "Standup.", "userId": "u1"})).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_categories_are_listed_by_title() {
        let travel = Category {
            id: "2".to_string(),
            title: "Travel".to_string(),
            color: None,
        };
        let h = harness(vec![work_category(), travel], ScriptedClassifier::replying("{}"));

        let (status, body) = get_path(&h.app, "/api/categories").await;
        assert_eq!(status, StatusCode::OK);
        let body: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(
            body,
            json!({"categories": [
                {"id": "2", "title": "Travel", "color": null},
                {"id": "1", "title": "Work & Career", "color": "#A3D8F4"}
            ]})
        );
    }

    #[tokio::test]
    async fn test_health_reports_store_backend() {
        let h = harness(vec![], ScriptedClassifier::replying("{}"));
        let (status, body) = get_path(&h.app, "/healthz").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            serde_json::from_str::<Value>(&body).unwrap(),
            json!({"ok": true, "store": "memory"})
        );
    }
}
