//! Run, heap and pointer handlers for one (application, user) identity.
//!
//! Every route is scoped by `/apps/{app}/users/{user}`; the pair is the
//! identity a run's state lives under. The graph itself is the one the
//! server was started with.

use std::time::Instant;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use waypoint_types::application::ApplicationGlobals;
use waypoint_types::heap::PointerState;

use crate::http::error::AppError;
use crate::http::response::ApiResponse;
use crate::state::AppState;
use crate::view::{HeapView, parse_payload};

/// Body of `PUT .../pointer`.
#[derive(Debug, Deserialize)]
pub struct SetPointerRequest {
    pub action_id: String,
}

#[derive(Debug, Serialize)]
pub struct PointerResponse {
    pub pointer: PointerState,
}

/// Build the application sub-router, mounted at `/api/v1`.
pub fn application_routes() -> Router<AppState> {
    Router::new()
        .route("/apps/{app}/users/{user}/run", post(run_application))
        .route("/apps/{app}/users/{user}/heap", get(get_heap))
        .route(
            "/apps/{app}/users/{user}/pointer",
            get(get_pointer).put(set_pointer).delete(reset_pointer),
        )
}

fn base_path(app: &str, user: &str) -> String {
    format!("/api/v1/apps/{app}/users/{user}")
}

/// POST /api/v1/apps/{app}/users/{user}/run - Run (or resume) the graph.
///
/// The optional body is a JSON object merged into the run's globals.
pub async fn run_application(
    State(state): State<AppState>,
    Path((app, user)): Path<(String, String)>,
    body: Bytes,
) -> Result<Json<ApiResponse<HeapView>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let payload = parse_payload(&body).map_err(AppError::Validation)?;
    let snapshot = state
        .app
        .run(ApplicationGlobals::new(&app, &user), payload)
        .await?;

    let elapsed = start.elapsed().as_millis() as u64;
    let base = base_path(&app, &user);
    let resp = ApiResponse::success(HeapView::from(&snapshot), request_id, elapsed)
        .with_link("heap", &format!("{base}/heap"))
        .with_link("pointer", &format!("{base}/pointer"));

    Ok(Json(resp))
}

/// GET /api/v1/apps/{app}/users/{user}/heap - Every action's output and the pointer.
pub async fn get_heap(
    State(state): State<AppState>,
    Path((app, user)): Path<(String, String)>,
) -> Result<Json<ApiResponse<HeapView>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let snapshot = state.app.heap(&ApplicationGlobals::new(&app, &user)).await?;

    let elapsed = start.elapsed().as_millis() as u64;
    let resp = ApiResponse::success(HeapView::from(&snapshot), request_id, elapsed)
        .with_link("self", &format!("{}/heap", base_path(&app, &user)));

    Ok(Json(resp))
}

/// GET /api/v1/apps/{app}/users/{user}/pointer
pub async fn get_pointer(
    State(state): State<AppState>,
    Path((app, user)): Path<(String, String)>,
) -> Result<Json<ApiResponse<PointerResponse>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let pointer = state
        .app
        .pointer(&ApplicationGlobals::new(&app, &user))
        .await?;

    let elapsed = start.elapsed().as_millis() as u64;
    Ok(Json(ApiResponse::success(
        PointerResponse { pointer },
        request_id,
        elapsed,
    )))
}

/// PUT /api/v1/apps/{app}/users/{user}/pointer - Resume the next run at a node.
pub async fn set_pointer(
    State(state): State<AppState>,
    Path((app, user)): Path<(String, String)>,
    Json(body): Json<SetPointerRequest>,
) -> Result<Json<ApiResponse<PointerResponse>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    if body.action_id.is_empty() {
        return Err(AppError::Validation(
            "action_id must not be empty; use DELETE to reset the pointer".to_string(),
        ));
    }
    let identity = ApplicationGlobals::new(&app, &user);
    state.app.set_pointer(&identity, &body.action_id).await?;
    tracing::info!(
        application_id = %app,
        user_id = %user,
        action_id = %body.action_id,
        "pointer moved by request"
    );

    let elapsed = start.elapsed().as_millis() as u64;
    Ok(Json(ApiResponse::success(
        PointerResponse {
            pointer: PointerState::At(body.action_id),
        },
        request_id,
        elapsed,
    )))
}

/// DELETE /api/v1/apps/{app}/users/{user}/pointer - Restart from the root next time.
pub async fn reset_pointer(
    State(state): State<AppState>,
    Path((app, user)): Path<(String, String)>,
) -> Result<Json<ApiResponse<PointerResponse>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    state
        .app
        .reset_pointer(&ApplicationGlobals::new(&app, &user))
        .await?;

    let elapsed = start.elapsed().as_millis() as u64;
    Ok(Json(ApiResponse::success(
        PointerResponse {
            pointer: PointerState::Completed,
        },
        request_id,
        elapsed,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use waypoint_core::application::RunError;
    use waypoint_types::application::{ActionConfiguration, ApplicationConfiguration};

    use crate::state::test_support::memory_state;

    fn identity_path() -> Path<(String, String)> {
        Path(("app".to_string(), "u1".to_string()))
    }

    /// `greet (Echo) -> verify (VerifyPayload, name = GLOBAL:name)`
    fn greeting_config() -> ApplicationConfiguration {
        ApplicationConfiguration::new(
            "Echo",
            ActionConfiguration::new("greet").with_setting("constants", json!({ "text": "Hola" })),
        )
        .on_success(ApplicationConfiguration::new(
            "VerifyPayload",
            ActionConfiguration::new("verify")
                .with_input("name", "GLOBAL:name")
                .with_setting(
                    "schema",
                    json!({
                        "type": "object",
                        "properties": { "name": { "type": "string" } },
                        "required": ["name"]
                    }),
                ),
        ))
    }

    #[tokio::test]
    async fn test_run_returns_heap_view() {
        let state = memory_state(&greeting_config());

        let Json(resp) = run_application(
            State(state),
            identity_path(),
            Bytes::from_static(br#"{"name":"Ada"}"#),
        )
        .await
        .unwrap();

        let data = resp.data.unwrap();
        assert_eq!(data.heap["greet"], Some(json!({ "text": "Hola" })));
        assert_eq!(data.heap["verify"], Some(json!({ "name": "Ada" })));
        assert_eq!(data.pointer, PointerState::Completed);
        assert!(resp.links.contains_key("heap"));
    }

    #[tokio::test]
    async fn test_run_without_required_global_is_bad_request() {
        let state = memory_state(&greeting_config());

        let err = run_application(State(state.clone()), identity_path(), Bytes::new())
            .await
            .err()
            .unwrap();
        match err {
            AppError::Run(ref e @ RunError::Action { ref action_id, .. }) => {
                assert_eq!(action_id, "verify");
                assert_eq!(e.kind().as_str(), "BAD_REQUEST");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        // The failed node is where the next run resumes.
        let Json(resp) = get_pointer(State(state), identity_path()).await.unwrap();
        assert_eq!(
            resp.data.unwrap().pointer,
            PointerState::At("verify".to_string())
        );
    }

    #[tokio::test]
    async fn test_run_rejects_non_object_payload() {
        let state = memory_state(&greeting_config());

        let err = run_application(State(state), identity_path(), Bytes::from_static(b"[1]"))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_pointer_set_and_reset() {
        let state = memory_state(&greeting_config());

        let Json(resp) = get_pointer(State(state.clone()), identity_path()).await.unwrap();
        assert_eq!(resp.data.unwrap().pointer, PointerState::NeverStarted);

        let Json(resp) = set_pointer(
            State(state.clone()),
            identity_path(),
            Json(SetPointerRequest {
                action_id: "verify".to_string(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(
            resp.data.unwrap().pointer,
            PointerState::At("verify".to_string())
        );
        let Json(resp) = get_heap(State(state.clone()), identity_path()).await.unwrap();
        assert_eq!(
            resp.data.unwrap().pointer,
            PointerState::At("verify".to_string())
        );

        let Json(resp) = reset_pointer(State(state.clone()), identity_path()).await.unwrap();
        assert_eq!(resp.data.unwrap().pointer, PointerState::Completed);
        let Json(resp) = get_pointer(State(state), identity_path()).await.unwrap();
        assert_eq!(resp.data.unwrap().pointer, PointerState::Completed);
    }

    #[tokio::test]
    async fn test_set_pointer_to_unknown_action_fails() {
        let state = memory_state(&greeting_config());

        let err = set_pointer(
            State(state),
            identity_path(),
            Json(SetPointerRequest {
                action_id: "ghost".to_string(),
            }),
        )
        .await
        .err()
        .unwrap();
        assert!(matches!(err, AppError::Run(RunError::UnknownPointer(ref id)) if id == "ghost"));
    }
}
