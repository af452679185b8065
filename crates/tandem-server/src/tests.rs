//! Server API tests

use super::*;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use tandem_core::ai::{AIClient, MockBackend};
use tandem_core::models::{DataRow, Dataset, KpiField, SchemaMapping, SourceGroup};
use tandem_core::{PromptLibrary, RouterConfig};
use tower::ServiceExt;

const OWNER: &str = "user-1";

fn sample_dataset(ai_enabled: bool) -> Dataset {
    let mut dataset = Dataset::new("ds-1", OWNER, "Stores 2023 vs 2024");
    dataset.ai_config.enabled = ai_enabled;
    dataset.schema_mapping = Some(SchemaMapping {
        dimension: "store".into(),
        date_field: None,
        kpis: vec![KpiField::simple("revenue")],
        categorical_fields: vec!["store".into()],
    });
    dataset.rows = vec![
        DataRow::new(SourceGroup::GroupA).with("store", "Lyon").with("revenue", 200),
        DataRow::new(SourceGroup::GroupB).with("store", "Lyon").with("revenue", 100),
        DataRow::new(SourceGroup::GroupA).with("store", "Nice").with("revenue", 150),
        DataRow::new(SourceGroup::GroupB).with("store", "Nice").with("revenue", 160),
    ];
    dataset
}

fn test_state(config: ServerConfig, ai: Option<MockBackend>, ai_enabled: bool) -> Arc<AppState> {
    let db = Database::in_memory().unwrap();
    db.upsert_dataset(&sample_dataset(ai_enabled)).unwrap();

    let mut orchestrator =
        InsightOrchestrator::new(Arc::new(db.clone()), InsightSettings::new(ai_enabled));
    if let Some(mock) = ai {
        orchestrator = orchestrator.with_ai(
            AiInsightGenerator::new(AIClient::Mock(mock))
                .with_router(ModelRouter::with_config(RouterConfig::default()))
                .with_prompts(PromptLibrary::embedded_only()),
        );
    }

    Arc::new(AppState::new(db, orchestrator, config))
}

fn open_config() -> ServerConfig {
    ServerConfig {
        require_auth: false,
        ..Default::default()
    }
}

fn setup_test_app() -> Router {
    create_router_with_state(test_state(open_config(), None, false))
}

fn get(uri: &str, user: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(user) = user {
        builder = builder.header(USER_ID_HEADER, user);
    }
    builder.body(Body::empty()).unwrap()
}

async fn get_body_json(response: axum::response::Response) -> serde_json::Value {
    let body = response.into_body();
    let bytes = body.collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

// ========== Health & Auth Tests ==========

#[tokio::test]
async fn test_health_without_credentials() {
    let state = test_state(ServerConfig::default(), None, false);
    let app = create_router_with_state(state);

    let response = app.oneshot(get("/api/health", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("x-content-type-options").unwrap(),
        "nosniff"
    );

    let json = get_body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["aiEnabled"], false);
    assert!(json["aiBackend"].is_null());
}

#[tokio::test]
async fn test_api_key_required_by_default() {
    let config = ServerConfig {
        api_keys: vec!["secret-key".into()],
        ..Default::default()
    };
    let app = create_router_with_state(test_state(config, None, false));

    let response = app
        .clone()
        .oneshot(get("/api/datasets", Some(OWNER)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/datasets")
                .header(USER_ID_HEADER, OWNER)
                .header("authorization", "Bearer wrong-key!")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/datasets")
                .header(USER_ID_HEADER, OWNER)
                .header("authorization", "Bearer secret-key")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_missing_user_header_is_unauthorized() {
    let app = setup_test_app();

    let response = app
        .oneshot(get("/api/datasets/ds-1/insights", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[test]
fn test_validate_api_key() {
    let keys = vec!["abc".to_string(), "longer-key".to_string()];
    assert!(validate_api_key("abc", &keys));
    assert!(validate_api_key("longer-key", &keys));
    assert!(!validate_api_key("abd", &keys));
    assert!(!validate_api_key("", &keys));
    assert!(!validate_api_key("abc", &[]));
}

#[test]
fn test_split_list() {
    assert_eq!(split_list(Some(" a, ,b ")), vec!["a", "b"]);
    assert!(split_list(None).is_empty());
}

// ========== Dataset API Tests ==========

#[tokio::test]
async fn test_list_and_get_datasets() {
    let app = setup_test_app();

    let response = app
        .clone()
        .oneshot(get("/api/datasets", Some(OWNER)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json.as_array().unwrap().len(), 1);
    assert_eq!(json[0]["rowCount"], 4);

    let response = app
        .clone()
        .oneshot(get("/api/datasets/ds-1", Some(OWNER)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["rows"][0]["_sourceGroup"], "groupA");

    let response = app
        .oneshot(get("/api/datasets/ds-1", Some("someone-else")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ========== Insight API Tests ==========

#[tokio::test]
async fn test_insights_then_cached() {
    let app = setup_test_app();

    let response = app
        .clone()
        .oneshot(get("/api/datasets/ds-1/insights", Some(OWNER)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(response).await;
    let insights = json["insights"].as_array().unwrap();
    assert!(!insights.is_empty());
    assert_eq!(json["metadata"]["count"], insights.len());
    assert_eq!(json["metadata"]["fromCache"], false);
    assert_eq!(json["metadata"]["generatedBy"], "rule-engine");
    assert_eq!(insights[0]["generatedBy"], "rule-engine");
    assert!(insights[0]["type"].is_string());

    let response = app
        .oneshot(get("/api/datasets/ds-1/insights", Some(OWNER)))
        .await
        .unwrap();
    let json = get_body_json(response).await;
    assert_eq!(json["metadata"]["fromCache"], true);
}

#[tokio::test]
async fn test_insights_with_filters_and_force_refresh() {
    let app = setup_test_app();
    let filters = "%7B%22categorical%22%3A%7B%22store%22%3A%5B%22Lyon%22%5D%7D%7D";

    let uri = format!("/api/datasets/ds-1/insights?filters={}", filters);
    let response = app.clone().oneshot(get(&uri, Some(OWNER))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    let warning = json["insights"]
        .as_array()
        .unwrap()
        .iter()
        .find(|i| i["type"] == "warning")
        .expect("Lyon revenue halves");
    assert_eq!(warning["severity"], 4);

    let uri = format!("/api/datasets/ds-1/insights?filters={}&forceRefresh=true", filters);
    let response = app.oneshot(get(&uri, Some(OWNER))).await.unwrap();
    let json = get_body_json(response).await;
    assert_eq!(json["metadata"]["fromCache"], false);
}

#[tokio::test]
async fn test_unparseable_filters_mean_no_filters() {
    let app = setup_test_app();

    let response = app
        .clone()
        .oneshot(get("/api/datasets/ds-1/insights?filters=not-json", Some(OWNER)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Same cache entry as the unfiltered request
    let response = app
        .oneshot(get("/api/datasets/ds-1/insights", Some(OWNER)))
        .await
        .unwrap();
    let json = get_body_json(response).await;
    assert_eq!(json["metadata"]["fromCache"], true);
}

#[tokio::test]
async fn test_foreign_and_missing_datasets_look_the_same() {
    let app = setup_test_app();

    let foreign = app
        .clone()
        .oneshot(get("/api/datasets/ds-1/insights", Some("intruder")))
        .await
        .unwrap();
    let missing = app
        .oneshot(get("/api/datasets/ds-2/insights", Some("intruder")))
        .await
        .unwrap();

    assert_eq!(foreign.status(), StatusCode::NOT_FOUND);
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        get_body_json(foreign).await["error"],
        "Dataset ds-1 not found"
    );
    assert_eq!(
        get_body_json(missing).await["error"],
        "Dataset ds-2 not found"
    );
}

#[tokio::test]
async fn test_invalidate_cache() {
    let state = test_state(open_config(), None, false);
    let app = create_router_with_state(state.clone());

    app.clone()
        .oneshot(get("/api/datasets/ds-1/insights", Some(OWNER)))
        .await
        .unwrap();
    assert_eq!(state.orchestrator.cache().len().await, 1);

    let response = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/api/datasets/ds-1/insights/cache")
                .header(USER_ID_HEADER, OWNER)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["removed"], 1);
    assert!(state.orchestrator.cache().is_empty().await);

    let audit = state.db.list_audit_log(10).unwrap();
    assert_eq!(audit[0].action, "invalidate");
}

#[tokio::test]
async fn test_audit_failure_still_returns_insights() {
    let state = test_state(open_config(), None, false);
    state
        .db
        .conn()
        .unwrap()
        .execute_batch("DROP TABLE audit_log")
        .unwrap();
    let app = create_router_with_state(state.clone());

    let response = app
        .clone()
        .oneshot(get("/api/datasets/ds-1/insights", Some(OWNER)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert!(!json["insights"].as_array().unwrap().is_empty());
    assert_eq!(json["metadata"]["generatedBy"], "rule-engine");

    let response = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/api/datasets/ds-1/insights/cache")
                .header(USER_ID_HEADER, OWNER)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(get_body_json(response).await["removed"], 1);
}

#[tokio::test]
async fn test_ai_insights_and_fallback() {
    let app = create_router_with_state(test_state(open_config(), Some(MockBackend::new()), true));
    let response = app
        .oneshot(get("/api/datasets/ds-1/insights", Some(OWNER)))
        .await
        .unwrap();
    let json = get_body_json(response).await;
    assert_eq!(json["metadata"]["generatedBy"], "ai-model");

    let failing = MockBackend::failing("backend down");
    let app = create_router_with_state(test_state(open_config(), Some(failing), true));
    let response = app
        .oneshot(get("/api/datasets/ds-1/insights", Some(OWNER)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["metadata"]["generatedBy"], "rule-engine");
}

// ========== Summary API Tests ==========

#[tokio::test]
async fn test_summary_without_ai_is_unavailable() {
    let app = setup_test_app();

    let response = app
        .oneshot(get("/api/datasets/ds-1/summary", Some(OWNER)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_summary_with_ai() {
    let app = create_router_with_state(test_state(open_config(), Some(MockBackend::new()), true));

    let response = app
        .oneshot(get("/api/datasets/ds-1/summary", Some(OWNER)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["datasetId"], "ds-1");
    assert!(!json["text"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_summary_backend_failure_is_internal_error() {
    let app = create_router_with_state(test_state(
        open_config(),
        Some(MockBackend::failing("backend down")),
        true,
    ));

    let response = app
        .oneshot(get("/api/datasets/ds-1/summary", Some(OWNER)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = get_body_json(response).await;
    assert_eq!(json["error"], "An internal error occurred");
}
