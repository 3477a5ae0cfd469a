use super::github::{ClosedIssue, CommentRef, DEFAULT_LABELS};
use super::{AppError, AppResult, AppState, SERVICE_NAME};
use axum::{
    extract::{MatchedPath, Path, Query, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::{get, patch, post},
    Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tripwire_core::{CreatedTicket, ExistingTicket, TicketSummary};

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/api/issues", get(list_issues).post(create_issue))
        .route("/api/issues/:number/comments", post(add_comment))
        .route("/api/issues/:number/close", patch(close_issue))
        .route_layer(middleware::from_fn_with_state(state.clone(), track_requests))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn track_requests(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".into());
    let method = req.method().to_string();

    let resp = next.run(req).await;
    state
        .metrics
        .record_request(&method, &route, resp.status().as_u16());
    resp
}

fn parse_number(raw: &str) -> AppResult<u64> {
    raw.trim()
        .parse()
        .map_err(|_| AppError::bad_request("Invalid issue number"))
}

// ── Health / metrics ─────────────────────────────────────────────────────────

#[derive(Serialize)]
struct HealthResponse {
    success: bool,
    service: &'static str,
    status: &'static str,
    uptime: f64,
    timestamp: String,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        success: true,
        service: SERVICE_NAME,
        status: "healthy",
        uptime: state.start_time.elapsed().as_secs_f64(),
        timestamp: Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
    })
}

async fn metrics(State(state): State<AppState>) -> AppResult<Response> {
    let body = state
        .metrics
        .render(state.start_time.elapsed().as_secs())
        .map_err(|e| AppError::upstream("Failed to encode metrics", anyhow::anyhow!(e)))?;
    Ok((
        [(
            header::CONTENT_TYPE,
            "application/openmetrics-text; version=1.0.0; charset=utf-8",
        )],
        body,
    )
        .into_response())
}

// ── Issues ───────────────────────────────────────────────────────────────────

fn default_check_duplicate() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateIssueRequest {
    title: Option<String>,
    body: Option<String>,
    labels: Option<Vec<String>>,
    #[serde(default = "default_check_duplicate")]
    check_duplicate: bool,
}

#[derive(Serialize)]
struct CreatedResponse {
    success: bool,
    issue: CreatedTicket,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DuplicateResponse {
    success: bool,
    duplicate: bool,
    message: &'static str,
    existing_issue: ExistingTicket,
}

async fn create_issue(
    State(state): State<AppState>,
    body: Option<Json<CreateIssueRequest>>,
) -> AppResult<Response> {
    let req = body.map(|Json(req)| req);
    let (title, text, labels, check_duplicate) = match req {
        Some(CreateIssueRequest {
            title: Some(title),
            body: Some(text),
            labels,
            check_duplicate,
        }) if !title.trim().is_empty() && !text.trim().is_empty() => {
            (title, text, labels, check_duplicate)
        }
        _ => {
            warn!("Invalid request: missing title or body");
            return Err(AppError::bad_request("Title and body are required"));
        }
    };
    info!("Received issue creation request '{}'", title);

    if check_duplicate {
        let existing = state.github.find_existing(&title).await.map_err(|e| {
            state.metrics.record_github_error("check_existing");
            AppError::upstream("Failed to create GitHub issue", e)
        })?;

        if let Some(existing) = existing {
            info!("Duplicate of #{}, skipping creation", existing.number);
            state.metrics.duplicates_detected.inc();
            return Ok((
                StatusCode::OK,
                Json(DuplicateResponse {
                    success: true,
                    duplicate: true,
                    message: "Similar issue already exists",
                    existing_issue: existing,
                }),
            )
                .into_response());
        }
    }

    let labels = labels.unwrap_or_else(|| DEFAULT_LABELS.iter().map(|l| l.to_string()).collect());
    let issue = state
        .github
        .create_issue(&title, &text, &labels)
        .await
        .map_err(|e| {
            state.metrics.record_github_error("create_issue");
            AppError::upstream("Failed to create GitHub issue", e)
        })?;
    state.metrics.tickets_created.inc();

    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse {
            success: true,
            issue,
        }),
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
struct CommentRequest {
    comment: Option<String>,
}

#[derive(Serialize)]
struct CommentResponse {
    success: bool,
    comment: CommentRef,
}

async fn add_comment(
    State(state): State<AppState>,
    Path(number): Path<String>,
    body: Option<Json<CommentRequest>>,
) -> AppResult<(StatusCode, Json<CommentResponse>)> {
    let comment = body
        .and_then(|Json(req)| req.comment)
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| AppError::bad_request("Comment is required"))?;
    let number = parse_number(&number)?;

    let comment = state
        .github
        .add_comment(number, &comment)
        .await
        .map_err(|e| {
            state.metrics.record_github_error("add_comment");
            AppError::upstream("Failed to add comment", e)
        })?;
    state.metrics.comments_added.inc();

    Ok((
        StatusCode::CREATED,
        Json(CommentResponse {
            success: true,
            comment,
        }),
    ))
}

#[derive(Serialize)]
struct CloseResponse {
    success: bool,
    issue: ClosedIssue,
}

async fn close_issue(
    State(state): State<AppState>,
    Path(number): Path<String>,
    body: Option<Json<CommentRequest>>,
) -> AppResult<Json<CloseResponse>> {
    let number = parse_number(&number)?;
    let comment = body
        .and_then(|Json(req)| req.comment)
        .filter(|c| !c.trim().is_empty());

    let issue = state
        .github
        .close_issue(number, comment.as_deref())
        .await
        .map_err(|e| {
            state.metrics.record_github_error("close_issue");
            AppError::upstream("Failed to close issue", e)
        })?;
    state.metrics.tickets_closed.inc();

    Ok(Json(CloseResponse {
        success: true,
        issue,
    }))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    state: Option<String>,
    labels: Option<String>,
}

#[derive(Serialize)]
struct ListResponse {
    success: bool,
    issues: Vec<TicketSummary>,
}

async fn list_issues(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<ListResponse>> {
    let issue_state = query.state.as_deref().unwrap_or("open");
    let issues = state
        .github
        .list_issues(issue_state, query.labels.as_deref())
        .await
        .map_err(|e| {
            state.metrics.record_github_error("list_issues");
            AppError::upstream("Failed to list issues", e)
        })?;

    Ok(Json(ListResponse {
        success: true,
        issues,
    }))
}

#[cfg(test)]
mod tests {
    use super::super::{GitHubClient, TrackerMetrics};
    use super::*;
    use axum::body::Body;
    use axum::http::Request as HttpRequest;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Instant;
    use tower::ServiceExt;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn app(github: &MockServer) -> Router {
        let client = GitHubClient::new(github.uri(), "ghp_test", "acme", "shop").unwrap();
        create_router(AppState {
            github: Arc::new(client),
            metrics: Arc::new(TrackerMetrics::new()),
            start_time: Instant::now(),
        })
    }

    fn gh_issue(number: u64, title: &str) -> Value {
        json!({
            "number": number,
            "id": number * 1000,
            "title": title,
            "state": "open",
            "html_url": format!("https://github.com/acme/shop/issues/{}", number),
            "labels": [{ "name": "ai-detected" }],
            "created_at": "2024-05-01T10:00:00Z",
            "updated_at": "2024-05-01T10:05:00Z"
        })
    }

    async fn send(app: Router, req: HttpRequest<Body>) -> (StatusCode, Value) {
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn json_request(method: &str, uri: &str, body: Value) -> HttpRequest<Body> {
        HttpRequest::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn health_reports_service() {
        let github = MockServer::start().await;
        let req = HttpRequest::get("/health").body(Body::empty()).unwrap();
        let (status, body) = send(app(&github), req).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["service"], SERVICE_NAME);
    }

    #[tokio::test]
    async fn create_requires_title_and_body() {
        let github = MockServer::start().await;
        let (status, body) = send(
            app(&github),
            json_request("POST", "/api/issues", json!({ "title": "only a title" })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Title and body are required");
    }

    #[tokio::test]
    async fn create_reports_overlapping_open_issue() {
        let github = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/shop/issues"))
            .and(query_param("per_page", "100"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                gh_issue(9, "[HIGH] Redis eviction storm"),
                gh_issue(4, "[CRITICAL] Database Connection Pool Exhausted"),
            ])))
            .mount(&github)
            .await;
        Mock::given(method("POST"))
            .and(path("/repos/acme/shop/issues"))
            .respond_with(ResponseTemplate::new(201).set_body_json(gh_issue(10, "unused")))
            .expect(0)
            .mount(&github)
            .await;

        let (status, body) = send(
            app(&github),
            json_request(
                "POST",
                "/api/issues",
                json!({
                    "title": "[critical] database connection pool exhausted",
                    "body": "details",
                    "labels": ["ai-detected"]
                }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["duplicate"], true);
        assert_eq!(body["existingIssue"]["number"], 4);
    }

    #[tokio::test]
    async fn create_without_duplicate_check_posts_issue() {
        let github = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/repos/acme/shop/issues"))
            .and(body_partial_json(json!({
                "title": "[HIGH] Payment Gateway Timeout",
                "labels": ["ai-detected", "bug"]
            })))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_json(gh_issue(11, "[HIGH] Payment Gateway Timeout")),
            )
            .expect(1)
            .mount(&github)
            .await;

        let (status, body) = send(
            app(&github),
            json_request(
                "POST",
                "/api/issues",
                json!({
                    "title": "[HIGH] Payment Gateway Timeout",
                    "body": "details",
                    "checkDuplicate": false
                }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["success"], true);
        assert_eq!(body["issue"]["number"], 11);
        assert_eq!(body["issue"]["id"], 11000);
        assert_eq!(body["issue"]["createdAt"], "2024-05-01T10:00:00Z");
    }

    #[tokio::test]
    async fn github_failure_is_500_with_message() {
        let github = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/shop/issues"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({ "message": "Bad credentials" })),
            )
            .mount(&github)
            .await;

        let req = HttpRequest::get("/api/issues?labels=ai-detected")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(app(&github), req).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Failed to list issues");
        assert!(body["message"].as_str().unwrap().contains("Bad credentials"));
    }

    #[tokio::test]
    async fn list_maps_issue_fields() {
        let github = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/shop/issues"))
            .and(query_param("state", "open"))
            .and(query_param("labels", "ai-detected"))
            .and(query_param("per_page", "50"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([gh_issue(4, "[CRITICAL] DB Pool Exhausted")])),
            )
            .mount(&github)
            .await;

        let req = HttpRequest::get("/api/issues?state=open&labels=ai-detected")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(app(&github), req).await;

        assert_eq!(status, StatusCode::OK);
        let issue = &body["issues"][0];
        assert_eq!(issue["number"], 4);
        assert_eq!(issue["url"], "https://github.com/acme/shop/issues/4");
        assert_eq!(issue["labels"][0], "ai-detected");
        assert_eq!(issue["updatedAt"], "2024-05-01T10:05:00Z");
    }

    #[tokio::test]
    async fn comment_validation() {
        let github = MockServer::start().await;

        let (status, body) = send(
            app(&github),
            json_request("POST", "/api/issues/12/comments", json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Comment is required");

        let (status, body) = send(
            app(&github),
            json_request("POST", "/api/issues/abc/comments", json!({ "comment": "hi" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid issue number");
    }

    #[tokio::test]
    async fn close_posts_comment_then_closes() {
        let github = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/repos/acme/shop/issues/12/comments"))
            .and(body_partial_json(json!({ "body": "Fixed in v2" })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": 77,
                "html_url": "https://github.com/acme/shop/issues/12#issuecomment-77"
            })))
            .expect(1)
            .mount(&github)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/repos/acme/shop/issues/12"))
            .and(body_partial_json(json!({ "state": "closed" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "number": 12,
                "id": 12000,
                "title": "t",
                "state": "closed",
                "html_url": "https://github.com/acme/shop/issues/12",
                "created_at": "2024-05-01T10:00:00Z",
                "updated_at": "2024-05-01T11:00:00Z"
            })))
            .expect(1)
            .mount(&github)
            .await;

        let (status, body) = send(
            app(&github),
            json_request("PATCH", "/api/issues/12/close", json!({ "comment": "Fixed in v2" })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["issue"]["state"], "closed");
    }

    #[tokio::test]
    async fn metrics_count_requests() {
        let github = MockServer::start().await;
        let router = app(&github);

        let req = HttpRequest::get("/health").body(Body::empty()).unwrap();
        router.clone().oneshot(req).await.unwrap();

        let req = HttpRequest::get("/metrics").body(Body::empty()).unwrap();
        let resp = router.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("route=\"/health\""));
    }
}
