use corral_core::CommitStatus;
use corral_remote::{RemoteClaimClient, RemoteError};
use httpmock::Method::{DELETE, GET, POST};
use httpmock::MockServer;
use serde_json::json;
use std::net::TcpListener;
use std::time::Duration;

fn can_bind_localhost() -> bool {
    TcpListener::bind("127.0.0.1:0").is_ok()
}

fn client(server: &MockServer) -> RemoteClaimClient {
    RemoteClaimClient::new(
        reqwest::Client::new(),
        &server.base_url(),
        "secret-token",
        Duration::from_secs(5),
    )
    .unwrap()
}

#[tokio::test]
async fn claim_success() {
    if !can_bind_localhost() {
        eprintln!("Skipping httpmock tests: cannot bind to localhost");
        return;
    }

    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/api/claim")
            .header("authorization", "Bearer secret-token")
            .json_body(json!({ "repo_id": "42", "commit_hash": "abc1234def" }));
        then.status(200).json_body(json!({
            "reservation_id": "rsv-77",
            "expires_at": "2026-09-01T00:00:00Z",
        }));
    });

    let response = client(&server).claim("42", "abc1234def").await.unwrap();
    assert_eq!(response.reservation_id, "rsv-77");
    assert!(response.expires_at.is_some());
    mock.assert();
}

#[tokio::test]
async fn claim_conflict_carries_remote_body() {
    if !can_bind_localhost() {
        return;
    }

    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/api/claim");
        then.status(409).body("commit already claimed");
    });

    let err = client(&server).claim("42", "abc1234def").await.unwrap_err();
    match err {
        RemoteError::Status { status, body } => {
            assert_eq!(status.as_u16(), 409);
            assert_eq!(body, "commit already claimed");
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn release_success() {
    if !can_bind_localhost() {
        return;
    }

    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(DELETE).path("/api/reservations/rsv-77");
        then.status(204);
    });

    client(&server).release("rsv-77").await.unwrap();
    mock.assert();
}

#[tokio::test]
async fn list_unavailable_parses_csv_by_content_type() {
    if !can_bind_localhost() {
        return;
    }

    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/api/repos/42/unavailable-commits");
        then.status(200)
            .header("content-type", "text/csv")
            .body("commit_hash,status,expires_at\nabc1234,paid_out,\ndef5678,reserved,2026-09-01T00:00:00Z\n");
    });

    let feed = client(&server).list_unavailable("42").await.unwrap();
    assert_eq!(feed.len(), 2);
    assert_eq!(feed["abc1234"].status, CommitStatus::PaidOut);
    assert_eq!(feed["def5678"].status, CommitStatus::AlreadyReserved);
    assert!(feed["def5678"].expires_at.is_some());
}

#[tokio::test]
async fn list_unavailable_parses_json_by_default() {
    if !can_bind_localhost() {
        return;
    }

    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/api/repos/42/unavailable-commits");
        then.status(200).json_body(json!([
            { "commit_hash": "abc1234", "status": "in_distribution" },
        ]));
    });

    let feed = client(&server).list_unavailable("42").await.unwrap();
    assert_eq!(feed["abc1234"].status, CommitStatus::InDistribution);
}

#[tokio::test]
async fn list_my_reservations_success() {
    if !can_bind_localhost() {
        return;
    }

    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/api/my-reservations");
        then.status(200).json_body(json!([
            {
                "id": "rsv-77",
                "repo_id": "42",
                "commit_hash": "abc1234",
                "reserved_at": "2026-08-01T00:00:00Z",
                "expires_at": null,
                "released_at": null,
            },
            {
                "id": "rsv-78",
                "repo_id": "42",
                "commit_hash": "def5678",
                "reserved_at": "2026-08-02T00:00:00Z",
                "released_at": "2026-08-03T00:00:00Z",
            },
        ]));
    });

    let reservations = client(&server).list_my_reservations().await.unwrap();
    assert_eq!(reservations.len(), 2);
    assert_eq!(reservations[0].id, "rsv-77");
    assert!(reservations[0].released_at.is_none());
    assert!(reservations[1].released_at.is_some());
}

#[tokio::test]
async fn slow_remote_times_out() {
    if !can_bind_localhost() {
        return;
    }

    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/api/my-reservations");
        then.status(200)
            .delay(Duration::from_millis(500))
            .json_body(json!([]));
    });

    let client = RemoteClaimClient::new(
        reqwest::Client::new(),
        &server.base_url(),
        "secret-token",
        Duration::from_millis(50),
    )
    .unwrap();

    let err = client.list_my_reservations().await.unwrap_err();
    assert!(matches!(err, RemoteError::Timeout));
}
