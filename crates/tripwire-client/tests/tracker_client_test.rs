use serde_json::json;
use tripwire_client::TrackerClient;
use tripwire_core::{CreateOutcome, IssueTracker, NewTicket, TripwireError};
use wiremock::matchers::{body_json, body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn ticket() -> NewTicket {
    NewTicket {
        title: "[CRITICAL] Database Connection Pool Exhausted".into(),
        body: "## Problem Description\npool exhausted".into(),
        labels: vec!["ai-detected".into(), "critical".into(), "p0".into()],
        check_duplicate: true,
    }
}

#[tokio::test]
async fn test_create_ticket_created() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/issues"))
        .and(body_partial_json(json!({
            "title": "[CRITICAL] Database Connection Pool Exhausted",
            "labels": ["ai-detected", "critical", "p0"],
            "checkDuplicate": true
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "success": true,
            "issue": {
                "number": 12,
                "url": "https://github.com/acme/shop/issues/12",
                "id": 9912,
                "title": "[CRITICAL] Database Connection Pool Exhausted",
                "state": "open",
                "createdAt": "2024-05-01T10:00:00Z"
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = TrackerClient::new(server.uri()).unwrap();
    let outcome = client.create_ticket(&ticket()).await.unwrap();

    match outcome {
        CreateOutcome::Created(created) => {
            assert_eq!(created.number, 12);
            assert_eq!(created.url, "https://github.com/acme/shop/issues/12");
        }
        other => panic!("expected a created ticket, got {:?}", other),
    }
}

#[tokio::test]
async fn test_create_ticket_duplicate() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/issues"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "duplicate": true,
            "message": "Similar issue already exists",
            "existingIssue": {
                "number": 4,
                "url": "https://github.com/acme/shop/issues/4",
                "title": "[CRITICAL] Database Connection Pool Exhausted"
            }
        })))
        .mount(&server)
        .await;

    let client = TrackerClient::new(server.uri()).unwrap();
    let outcome = client.create_ticket(&ticket()).await.unwrap();

    assert!(!outcome.is_new());
    match outcome {
        CreateOutcome::Duplicate(existing) => assert_eq!(existing.number, 4),
        other => panic!("expected a duplicate, got {:?}", other),
    }
}

#[tokio::test]
async fn test_server_error_surfaces_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/issues"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "success": false,
            "error": "Failed to create GitHub issue",
            "message": "Bad credentials"
        })))
        .mount(&server)
        .await;

    let client = TrackerClient::new(server.uri()).unwrap();
    let err = client.create_ticket(&ticket()).await.unwrap_err();

    match err {
        TripwireError::Tracker(msg) => {
            assert!(msg.contains("Failed to create GitHub issue"));
            assert!(msg.contains("Bad credentials"));
        }
        other => panic!("expected a tracker error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_list_open_tickets_filters_by_label() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/issues"))
        .and(query_param("state", "open"))
        .and(query_param("labels", "ai-detected"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "issues": [
                {
                    "number": 3,
                    "title": "[HIGH] Redis eviction storm",
                    "state": "open",
                    "url": "https://github.com/acme/shop/issues/3",
                    "labels": ["ai-detected", "high"],
                    "createdAt": "2024-05-01T09:00:00Z",
                    "updatedAt": "2024-05-01T09:30:00Z"
                },
                {
                    "number": 2,
                    "title": "[CRITICAL] DB Pool Exhausted",
                    "state": "open",
                    "url": "https://github.com/acme/shop/issues/2",
                    "labels": ["ai-detected"],
                    "createdAt": "2024-04-30T09:00:00Z",
                    "updatedAt": "2024-04-30T09:00:00Z"
                }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = TrackerClient::new(server.uri()).unwrap();
    let tickets = client.list_open_tickets("ai-detected").await.unwrap();

    assert_eq!(tickets.len(), 2);
    assert_eq!(tickets[0].number, 3);
    assert_eq!(tickets[1].title, "[CRITICAL] DB Pool Exhausted");
    assert_eq!(tickets[0].labels, vec!["ai-detected", "high"]);
}

#[tokio::test]
async fn test_comment_and_close() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/issues/12/comments"))
        .and(body_json(json!({ "comment": "Still happening" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "success": true,
            "comment": { "id": 1, "url": "https://github.com/acme/shop/issues/12#issuecomment-1" }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/api/issues/12/close"))
        .and(body_json(json!({ "comment": "Resolved by deploy 42" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "issue": { "number": 12, "state": "closed" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = TrackerClient::new(server.uri()).unwrap();
    client.add_comment(12, "Still happening").await.unwrap();
    client
        .close_ticket(12, Some("Resolved by deploy 42"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_health_states() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "service": "tripwire-tracker",
            "status": "healthy",
            "uptime": 12.5,
            "timestamp": "2024-05-01T10:00:00Z"
        })))
        .mount(&server)
        .await;

    let client = TrackerClient::new(server.uri()).unwrap();
    assert!(client.health().await.unwrap());

    let failing = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&failing)
        .await;
    let client = TrackerClient::new(failing.uri()).unwrap();
    assert!(!client.health().await.unwrap());
}

#[tokio::test]
async fn test_unreachable_tracker_is_an_error() {
    // Nothing listens on port 1.
    let client = TrackerClient::new("http://127.0.0.1:1").unwrap();
    let err = client.health().await.unwrap_err();
    assert!(matches!(err, TripwireError::Tracker(_)));
}
