use prhub::{
    CheckStatus, Config, Credential, CredentialStore, DashboardError, ForgeError, GitHub,
    MemoryCredentialStore, QuerySpec, ReviewStatus, fetch_authored, fetch_reviews, login,
    types::{Forge, Repo},
    verify_credential,
};
use serde_json::json;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{header, method, path, query_param},
};

fn client(server: &MockServer) -> GitHub {
    let config = Config {
        api_base: server.uri(),
        ..Config::default()
    };
    GitHub::new(&config).unwrap()
}

fn credential() -> Credential {
    Credential::new("ghp_secret").unwrap()
}

fn search_item(server: &MockServer, id: u64, number: u64) -> serde_json::Value {
    json!({
        "id": id,
        "number": number,
        "title": format!("PR {number}"),
        "html_url": format!("https://github.com/o/r/pull/{number}"),
        "repository_url": format!("{}/repos/o/r", server.uri()),
        "created_at": "2026-10-01T09:00:00Z",
        "comments": 4,
        "user": { "login": "me", "avatar_url": "https://avatars.example.com/me" },
        "pull_request": { "merged_at": null }
    })
}

#[tokio::test]
async fn test_search_sends_bearer_token_and_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search/issues"))
        .and(header("authorization", "Bearer ghp_secret"))
        .and(header("accept", "application/vnd.github+json"))
        .and(query_param("q", "type:pr author:me is:open"))
        .and(query_param("per_page", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total_count": 1,
            "incomplete_results": false,
            "items": [search_item(&server, 1, 10)]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let items = client(&server)
        .search_issues(&credential(), "type:pr author:me is:open")
        .await
        .unwrap();

    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id, 1);
    assert_eq!(items[0].comments, 4);
    assert_eq!(items[0].author_login(), Some("me"));
    assert_eq!(items[0].merged_at, None);
    assert_eq!(items[0].repo().unwrap(), Repo::new("o", "r").unwrap());
}

#[tokio::test]
async fn test_search_decodes_merged_at() {
    let server = MockServer::start().await;
    let mut merged = search_item(&server, 2, 20);
    merged["pull_request"]["merged_at"] = json!("2026-10-14T08:30:00Z");

    Mock::given(method("GET"))
        .and(path("/search/issues"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total_count": 250,
            "incomplete_results": true,
            "items": [merged]
        })))
        .mount(&server)
        .await;

    let items = client(&server)
        .search_issues(&credential(), "type:pr author:me is:merged")
        .await
        .unwrap();

    let merged_at = items[0].merged_at.unwrap();
    assert_eq!(merged_at.to_rfc3339(), "2026-10-14T08:30:00+00:00");
}

#[tokio::test]
async fn test_non_success_status_maps_to_status_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search/issues"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "message": "Validation Failed",
            "documentation_url": "https://docs.github.com/rest"
        })))
        .mount(&server)
        .await;

    let err = client(&server)
        .search_issues(&credential(), "type:pr author:")
        .await
        .unwrap_err();

    match err {
        ForgeError::Status {
            status, message, ..
        } => {
            assert_eq!(status, 422);
            assert_eq!(message, "Validation Failed");
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_body_maps_to_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/o/r/pulls/10"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;

    let err = client(&server)
        .pull_request(&credential(), &Repo::new("o", "r").unwrap(), 10)
        .await
        .unwrap_err();

    assert!(matches!(err, ForgeError::Decode { .. }));
}

#[tokio::test]
async fn test_current_user_verifies_credential() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "login": "me",
            "id": 42,
            "avatar_url": "https://avatars.example.com/me"
        })))
        .mount(&server)
        .await;

    let github = client(&server);
    let identity = verify_credential(&github, &credential()).await.unwrap();
    assert_eq!(identity.login, "me");

    let store = MemoryCredentialStore::new();
    let session = login(&github, &store, credential()).await.unwrap();
    assert_eq!(session.login(), "me");
    assert_eq!(store.get().await.unwrap(), Some(credential()));
}

#[tokio::test]
async fn test_rejected_credential_is_invalid() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "message": "Bad credentials",
            "documentation_url": "https://docs.github.com/rest"
        })))
        .mount(&server)
        .await;

    let err = verify_credential(&client(&server), &credential())
        .await
        .unwrap_err();

    match err {
        DashboardError::InvalidCredential { source } => {
            assert_eq!(source.status(), Some(401));
        }
        other => panic!("expected invalid credential, got {other:?}"),
    }
}

#[tokio::test]
async fn test_fetch_authored_end_to_end() {
    let server = MockServer::start().await;
    let spec = QuerySpec::new("me").unwrap();
    let queries = spec.queries();

    Mock::given(method("GET"))
        .and(path("/search/issues"))
        .and(query_param("q", queries.authored.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total_count": 1,
            "incomplete_results": false,
            "items": [search_item(&server, 1, 10)]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/o/r/pulls/10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "number": 10,
            "head": { "sha": "abc123", "ref": "feature" },
            "base": { "sha": "def456", "ref": "main" },
            "comments": 4,
            "review_comments": 3
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/o/r/pulls/10/reviews"))
        .and(query_param("per_page", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "state": "CHANGES_REQUESTED", "user": { "login": "alice" } },
            { "state": "APPROVED", "user": { "login": "bob" } },
            { "state": "APPROVED", "user": { "login": "alice" } },
            { "state": "COMMENTED", "user": { "login": "carol" } }
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/o/r/commits/abc123/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "state": "success",
            "total_count": 1,
            "statuses": [{ "state": "success", "context": "ci/build" }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/o/r/commits/abc123/check-runs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total_count": 2,
            "check_runs": [
                { "name": "lint", "status": "completed", "conclusion": "success" },
                { "name": "test", "status": "in_progress", "conclusion": null }
            ]
        })))
        .mount(&server)
        .await;

    let items = fetch_authored(&client(&server), &credential(), &spec)
        .await
        .unwrap();

    assert_eq!(items.len(), 1);
    assert_eq!(items[0].approvals, Some(2));
    assert_eq!(items[0].changes_requested, Some(0));
    assert_eq!(items[0].total_comments, Some(7));
    assert_eq!(items[0].base_ref.as_deref(), Some("main"));
    assert_eq!(items[0].check_status, Some(CheckStatus::Pending));
}

#[tokio::test]
async fn test_fetch_reviews_survives_review_lookup_failure() {
    let server = MockServer::start().await;
    let spec = QuerySpec::new("me").unwrap();
    let queries = spec.queries();

    Mock::given(method("GET"))
        .and(path("/search/issues"))
        .and(query_param("q", queries.review_requested.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total_count": 1,
            "incomplete_results": false,
            "items": [search_item(&server, 5, 50)]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/search/issues"))
        .and(query_param("q", queries.reviewed_by.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total_count": 0,
            "incomplete_results": false,
            "items": []
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/o/r/pulls/50/reviews"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let items = fetch_reviews(&client(&server), &credential(), &spec)
        .await
        .unwrap();

    assert_eq!(items.len(), 1);
    assert_eq!(items[0].my_review_status, Some(ReviewStatus::Pending));
}
