//! Thin axum surface over the toggle service.
//!
//! Handlers validate nothing beyond extraction; policy lives in the
//! service and the coordinator. The check endpoint never fails for
//! plumbing reasons: it always answers with a `CheckResult`.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;
use serde_json::json;
use togglr_core::{CheckResult, ListType};
use togglr_storage::{AuditFilter, AuditRecord, StorageError};

use crate::metrics::render_metrics;
use crate::service::{
    CreateToggleRequest, ScheduleRequest, ServiceError, ToggleService, ToggleView,
    UpdateToggleRequest, UserListPage, UserListRequest,
};

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ToggleService>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics_endpoint))
        .route("/api/v1/toggles", get(list_toggles).post(create_toggle))
        .route(
            "/api/v1/toggles/{name}",
            get(get_toggle).put(update_toggle).delete(delete_toggle),
        )
        .route("/api/v1/toggles/{name}/check", get(check_feature))
        .route(
            "/api/v1/toggles/{name}/allowlist",
            get(get_allow_list).post(add_to_allow_list).delete(remove_from_allow_list),
        )
        .route(
            "/api/v1/toggles/{name}/denylist",
            get(get_deny_list).post(add_to_deny_list).delete(remove_from_deny_list),
        )
        .route(
            "/api/v1/toggles/{name}/schedule",
            axum::routing::post(schedule_toggle).delete(cancel_schedule),
        )
        .route("/api/v1/audit-logs", get(audit_logs))
        .with_state(state)
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = match &self {
            ServiceError::Storage(StorageError::NotFound { .. }) => StatusCode::NOT_FOUND,
            ServiceError::Storage(StorageError::AlreadyExists { .. }) => StatusCode::CONFLICT,
            ServiceError::Storage(StorageError::Database(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ServiceError::Invalid(_) => StatusCode::BAD_REQUEST,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "Request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

fn actor_from(headers: &HeaderMap) -> String {
    headers
        .get("x-actor")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("anonymous")
        .to_string()
}

#[derive(Debug, Deserialize)]
struct CheckQuery {
    #[serde(rename = "userId")]
    user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GroupQuery {
    group: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PageQuery {
    #[serde(default)]
    offset: u64,
    #[serde(default = "default_limit")]
    limit: u64,
}

fn default_limit() -> u64 {
    50
}

#[derive(Debug, Deserialize)]
struct AuditQuery {
    #[serde(rename = "featureName")]
    feature_name: Option<String>,
    actor: Option<String>,
    #[serde(default)]
    offset: u64,
    #[serde(default = "default_limit")]
    limit: u64,
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "localCacheEntries": state.service.coordinator().local_entries(),
    }))
}

async fn metrics_endpoint() -> Response {
    match render_metrics() {
        Some(body) => (StatusCode::OK, body).into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "metrics not initialized").into_response(),
    }
}

async fn check_feature(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<CheckQuery>,
) -> Json<CheckResult> {
    Json(state.service.check(&name, query.user_id.as_deref()).await)
}

async fn list_toggles(
    State(state): State<AppState>,
    Query(query): Query<GroupQuery>,
) -> Result<Json<Vec<ToggleView>>, ServiceError> {
    let toggles = match query.group {
        Some(group) => state.service.get_by_group(&group).await?,
        None => state.service.get_all().await?,
    };
    Ok(Json(toggles))
}

async fn get_toggle(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ToggleView>, ServiceError> {
    Ok(Json(state.service.get(&name).await?))
}

async fn create_toggle(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreateToggleRequest>,
) -> Result<(StatusCode, Json<ToggleView>), ServiceError> {
    let actor = actor_from(&headers);
    let view = state.service.create(request, &actor).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

async fn update_toggle(
    State(state): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
    Json(request): Json<UpdateToggleRequest>,
) -> Result<Json<ToggleView>, ServiceError> {
    let actor = actor_from(&headers);
    Ok(Json(state.service.update(&name, request, &actor).await?))
}

async fn delete_toggle(
    State(state): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
) -> Result<StatusCode, ServiceError> {
    let actor = actor_from(&headers);
    state.service.delete(&name, &actor).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn schedule_toggle(
    State(state): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
    Json(request): Json<ScheduleRequest>,
) -> Result<Json<ToggleView>, ServiceError> {
    let actor = actor_from(&headers);
    Ok(Json(state.service.schedule(&name, request, &actor).await?))
}

async fn cancel_schedule(
    State(state): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
) -> Result<Json<ToggleView>, ServiceError> {
    let actor = actor_from(&headers);
    Ok(Json(state.service.cancel_schedule(&name, &actor).await?))
}

async fn get_allow_list(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(page): Query<PageQuery>,
) -> Result<Json<UserListPage>, ServiceError> {
    list_users(state, name, ListType::Allow, page).await
}

async fn get_deny_list(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(page): Query<PageQuery>,
) -> Result<Json<UserListPage>, ServiceError> {
    list_users(state, name, ListType::Deny, page).await
}

async fn list_users(
    state: AppState,
    name: String,
    list_type: ListType,
    page: PageQuery,
) -> Result<Json<UserListPage>, ServiceError> {
    Ok(Json(
        state
            .service
            .list_users(&name, list_type, page.offset, page.limit)
            .await?,
    ))
}

async fn add_to_allow_list(
    State(state): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
    Json(request): Json<UserListRequest>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let actor = actor_from(&headers);
    let added = state
        .service
        .add_users(&name, request, ListType::Allow, &actor)
        .await?;
    Ok(Json(json!({ "added": added })))
}

async fn add_to_deny_list(
    State(state): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
    Json(request): Json<UserListRequest>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let actor = actor_from(&headers);
    let added = state
        .service
        .add_users(&name, request, ListType::Deny, &actor)
        .await?;
    Ok(Json(json!({ "added": added })))
}

async fn remove_from_allow_list(
    State(state): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
    Json(request): Json<UserListRequest>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let actor = actor_from(&headers);
    let removed = state
        .service
        .remove_users(&name, request, ListType::Allow, &actor)
        .await?;
    Ok(Json(json!({ "removed": removed })))
}

async fn remove_from_deny_list(
    State(state): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
    Json(request): Json<UserListRequest>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let actor = actor_from(&headers);
    let removed = state
        .service
        .remove_users(&name, request, ListType::Deny, &actor)
        .await?;
    Ok(Json(json!({ "removed": removed })))
}

async fn audit_logs(
    State(state): State<AppState>,
    Query(query): Query<AuditQuery>,
) -> Result<Json<Vec<AuditRecord>>, ServiceError> {
    let filter = AuditFilter {
        feature_name: query.feature_name,
        actor: query.actor,
    };
    Ok(Json(
        state
            .service
            .audit_logs(filter, query.offset, query.limit)
            .await?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use std::time::Duration;
    use togglr_cache::RedisSettings;
    use togglr_storage::{AuditStore, MemoryStore, ToggleStore, UserListStore};
    use tower::ServiceExt;

    use crate::cache::CacheCoordinator;

    fn test_router() -> Router {
        let store = Arc::new(MemoryStore::new());
        let toggles: Arc<dyn ToggleStore> = store.clone();
        let lists: Arc<dyn UserListStore> = store.clone();
        let audit: Arc<dyn AuditStore> = store;
        let settings = RedisSettings {
            enabled: false,
            ..RedisSettings::default()
        };
        let coordinator = Arc::new(CacheCoordinator::new(
            &settings,
            Duration::from_secs(30),
            None,
            Arc::clone(&toggles),
            Arc::clone(&lists),
        ));
        let service = Arc::new(ToggleService::new(toggles, lists, audit, coordinator));
        router(AppState { service })
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn create_then_check_over_http() {
        let app = test_router();

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/v1/toggles",
                json!({"featureName": "PAYMENTS", "status": "ENABLED"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/toggles/PAYMENTS/check")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["enabled"], true);
        assert_eq!(body["reason"], "Feature is enabled globally");
    }

    #[tokio::test]
    async fn duplicate_create_conflicts() {
        let app = test_router();
        let request = json!({"featureName": "PAYMENTS", "status": "ENABLED"});

        let first = app
            .clone()
            .oneshot(post_json("/api/v1/toggles", request.clone()))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::CREATED);

        let second = app
            .oneshot(post_json("/api/v1/toggles", request))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn unknown_toggle_is_404_but_check_still_answers() {
        let app = test_router();

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/toggles/GHOST")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/toggles/GHOST/check?userId=alice")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["enabled"], false);
        assert_eq!(body["reason"], "Feature not found");
    }

    #[tokio::test]
    async fn list_mode_check_uses_the_query_user() {
        let app = test_router();

        app.clone()
            .oneshot(post_json(
                "/api/v1/toggles",
                json!({"featureName": "BETA", "status": "LIST_MODE"}),
            ))
            .await
            .unwrap();
        app.clone()
            .oneshot(post_json(
                "/api/v1/toggles/BETA/allowlist",
                json!({"userIds": ["alice"]}),
            ))
            .await
            .unwrap();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/toggles/BETA/check?userId=alice")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["enabled"], true);
        assert_eq!(body["reason"], "User is whitelisted");
    }
}
