use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, Method},
    middleware,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use cadence_shared::{session, CodeVerifier, Identity, SharedSnapshot};

use crate::config::ServerConfig;
use crate::error::ApiError;
use crate::mailer::Mailer;
use crate::rate_limit::{rate_limit_middleware, RateLimiter};
use crate::snapshot_store::SnapshotBackend;

#[derive(Clone)]
pub struct AppState {
    pub verifier: Arc<CodeVerifier>,
    pub mailer: Arc<Mailer>,
    pub snapshots: Arc<SnapshotBackend>,
    pub config: Arc<ServerConfig>,
    pub rate_limiter: RateLimiter,
    pub send_code_limiter: RateLimiter,
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route(
            "/send-code",
            post(send_code).route_layer(middleware::from_fn_with_state(
                state.send_code_limiter.clone(),
                rate_limit_middleware,
            )),
        )
        .route("/verify-code", post(verify_code))
        .route("/snapshot", get(get_snapshot))
        .route("/snapshot", put(put_snapshot))
        .route("/health", get(health_check))
        .layer(middleware::from_fn_with_state(
            state.rate_limiter.clone(),
            rate_limit_middleware,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Deserialize)]
struct SendCodeRequest {
    email: String,
}

#[derive(Serialize)]
struct SendCodeResponse {
    success: bool,
    token: String,
}

#[derive(Deserialize)]
struct VerifyCodeRequest {
    email: String,
    code: String,
    token: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VerifyCodeResponse {
    success: bool,
    user: Identity,
    session_token: String,
}

#[derive(Serialize)]
struct PutSnapshotResponse {
    success: bool,
    revision: String,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Issue a one-time code for the claimed email and dispatch it
/// out-of-band.  The code itself never appears in the response; the
/// stateless token is everything the client needs for verification.
async fn send_code(
    State(state): State<AppState>,
    Json(req): Json<SendCodeRequest>,
) -> Result<Json<SendCodeResponse>, ApiError> {
    let issued = state.verifier.issue(&req.email)?;

    state
        .mailer
        .send_code(&req.email, &issued.code)
        .await
        .map_err(ApiError::Dispatch)?;

    info!(email = %req.email, "one-time code issued");
    Ok(Json(SendCodeResponse {
        success: true,
        token: issued.token,
    }))
}

/// Verify a submitted code against its token.  On success the resolved
/// identity comes back together with a bearer session token for the
/// snapshot endpoints.
async fn verify_code(
    State(state): State<AppState>,
    Json(req): Json<VerifyCodeRequest>,
) -> Result<Json<VerifyCodeResponse>, ApiError> {
    let user = state.verifier.verify(&req.email, &req.code, &req.token)?;
    let session_token =
        session::issue_default_session(state.config.auth_secret.as_bytes(), &user);

    info!(email = %user.email, "code verified");
    Ok(Json(VerifyCodeResponse {
        success: true,
        user,
        session_token,
    }))
}

fn require_session(headers: &HeaderMap, config: &ServerConfig) -> Result<Identity, ApiError> {
    let auth = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let token = auth.strip_prefix("Bearer ").unwrap_or(auth);

    if token.is_empty() {
        return Err(ApiError::Unauthorized("missing bearer token".to_string()));
    }

    session::verify_session(config.auth_secret.as_bytes(), token)
        .map_err(|e| ApiError::Unauthorized(e.to_string()))
}

/// Current shared snapshot, or 404 if nothing has been published yet.
async fn get_snapshot(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<(HeaderMap, Vec<u8>), ApiError> {
    require_session(&headers, &state.config)?;

    let Some((content, revision)) = state.snapshots.get(&state.config.snapshot_path).await?
    else {
        return Err(ApiError::NotFound("No data found".to_string()));
    };

    let mut response_headers = HeaderMap::new();
    response_headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    if let Ok(value) = HeaderValue::from_str(&revision) {
        response_headers.insert("x-snapshot-revision", value);
    }
    Ok((response_headers, content))
}

/// Replace the shared snapshot wholesale.  The body must parse as a
/// snapshot document; writes are unconditional (last writer wins).
async fn put_snapshot(
    headers: HeaderMap,
    State(state): State<AppState>,
    body: axum::body::Bytes,
) -> Result<Json<PutSnapshotResponse>, ApiError> {
    let user = require_session(&headers, &state.config)?;

    let snapshot: SharedSnapshot = serde_json::from_slice(&body)
        .map_err(|_| ApiError::BadRequest("Invalid snapshot document".to_string()))?;
    let content = serde_json::to_vec_pretty(&snapshot)
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    let revision = state
        .snapshots
        .put(&state.config.snapshot_path, content, None)
        .await?;

    info!(
        by = %user.email,
        last_updated = %snapshot.last_updated,
        revision = %revision,
        "shared snapshot committed"
    );
    Ok(Json(PutSnapshotResponse {
        success: true,
        revision,
    }))
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use cadence_shared::{AuthConfig, CellMap, TeamDirectory};
    use chrono::Utc;
    use tower::ServiceExt;

    use crate::snapshot_store::FileSnapshotStore;

    type CodeSink = Arc<Mutex<Vec<(String, String)>>>;

    async fn test_state(tmp: &tempfile::TempDir) -> (AppState, CodeSink) {
        let sink: CodeSink = Arc::new(Mutex::new(Vec::new()));

        let mut config = ServerConfig::default();
        config.auth_secret = "router-test-secret".to_string();
        config.allowed_email_domain = Some("example.com".to_string());

        let verifier = CodeVerifier::new(
            AuthConfig::new(
                config.auth_secret.clone().into_bytes(),
                config.allowed_email_domain.clone(),
            ),
            TeamDirectory::default(),
        );

        let snapshots =
            SnapshotBackend::File(FileSnapshotStore::new(tmp.path().to_path_buf()).await.unwrap());

        let state = AppState {
            verifier: Arc::new(verifier),
            mailer: Arc::new(Mailer::Capture(sink.clone())),
            snapshots: Arc::new(snapshots),
            config: Arc::new(config),
            rate_limiter: RateLimiter::lenient(),
            send_code_limiter: RateLimiter::lenient(),
        };
        (state, sink)
    }

    fn post(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn health_answers_ok() {
        let tmp = tempfile::tempdir().unwrap();
        let (state, _) = test_state(&tmp).await;
        let app = build_router(state);

        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn full_auth_and_snapshot_flow() {
        let tmp = tempfile::tempdir().unwrap();
        let (state, sink) = test_state(&tmp).await;
        let app = build_router(state);

        // 1. Request a code.  The response carries the token, never the code.
        let response = app
            .clone()
            .oneshot(post("/send-code", serde_json::json!({"email": "alice@example.com"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        let token = body["token"].as_str().unwrap().to_string();
        assert!(body.get("code").is_none());

        let code = sink.lock().unwrap().last().unwrap().1.clone();

        // 2. Verify it.
        let response = app
            .clone()
            .oneshot(post(
                "/verify-code",
                serde_json::json!({"email": "alice@example.com", "code": code, "token": token}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["user"]["email"], "alice@example.com");
        let session_token = body["sessionToken"].as_str().unwrap().to_string();

        // 3. Nothing published yet.
        let response = app
            .clone()
            .oneshot(
                Request::get("/snapshot")
                    .header("authorization", format!("Bearer {session_token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        // 4. Publish a snapshot and read it back.
        let snapshot = SharedSnapshot {
            tasks: vec![],
            cell_data: CellMap::new(),
            change_log: vec![],
            last_updated: Utc::now(),
            committed_by: Identity {
                email: "alice@example.com".to_string(),
                display_name: "alice".to_string(),
                role: None,
                is_admin: true,
            },
        };
        let response = app
            .clone()
            .oneshot(
                Request::put("/snapshot")
                    .header("content-type", "application/json")
                    .header("authorization", format!("Bearer {session_token}"))
                    .body(Body::from(serde_json::to_vec(&snapshot).unwrap()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_json(response).await["revision"].as_str().is_some());

        let response = app
            .clone()
            .oneshot(
                Request::get("/snapshot")
                    .header("authorization", format!("Bearer {session_token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let fetched: SharedSnapshot =
            serde_json::from_value(body_json(response).await).unwrap();
        assert_eq!(fetched, snapshot);
    }

    #[tokio::test]
    async fn wrong_code_answers_generic_message() {
        let tmp = tempfile::tempdir().unwrap();
        let (state, sink) = test_state(&tmp).await;
        let app = build_router(state);

        let response = app
            .clone()
            .oneshot(post("/send-code", serde_json::json!({"email": "alice@example.com"})))
            .await
            .unwrap();
        let token = body_json(response).await["token"].as_str().unwrap().to_string();
        let issued = sink.lock().unwrap().last().unwrap().1.clone();
        let wrong = if issued == "100000" { "100001" } else { "100000" };

        let response = app
            .oneshot(post(
                "/verify-code",
                serde_json::json!({"email": "alice@example.com", "code": wrong, "token": token}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "Invalid code");
    }

    #[tokio::test]
    async fn foreign_domain_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let (state, _) = test_state(&tmp).await;
        let app = build_router(state);

        let response = app
            .oneshot(post("/send-code", serde_json::json!({"email": "m@elsewhere.org"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await["error"],
            "Invalid or unauthorized email"
        );
    }

    #[tokio::test]
    async fn snapshot_requires_a_session() {
        let tmp = tempfile::tempdir().unwrap();
        let (state, _) = test_state(&tmp).await;
        let app = build_router(state);

        let response = app
            .clone()
            .oneshot(Request::get("/snapshot").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .oneshot(
                Request::get("/snapshot")
                    .header("authorization", "Bearer not-a-session")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn send_code_is_rate_limited() {
        let tmp = tempfile::tempdir().unwrap();
        let (mut state, _) = test_state(&tmp).await;
        state.send_code_limiter = RateLimiter::new(0.0, 1.0);
        let app = build_router(state);

        let request = || {
            Request::builder()
                .method("POST")
                .uri("/send-code")
                .header("content-type", "application/json")
                .header("x-forwarded-for", "203.0.113.9")
                .body(Body::from(
                    serde_json::json!({"email": "alice@example.com"}).to_string(),
                ))
                .unwrap()
        };

        let first = app.clone().oneshot(request()).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = app.oneshot(request()).await.unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}
