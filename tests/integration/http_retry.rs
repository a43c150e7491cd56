//! HTTP-level retry behaviour against a local mock server

use reqwest::Client;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use vuln_harvester::fetcher::{
    CommitSource, FetcherError, GithubCommitClient, HarvestHttpClient, PageSource, RetryPolicy,
};
use wiremock::matchers::{header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const REFERER: &str = "https://www.mend.io/vulnerability-database/";

fn fast_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::immediate(max_attempts, Duration::from_millis(1))
}

fn page_client(max_attempts: u32) -> HarvestHttpClient {
    HarvestHttpClient::new(Arc::new(Client::new()), REFERER, fast_policy(max_attempts))
}

#[tokio::test]
async fn test_rate_limited_page_exhausts_attempt_budget() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/full-listing/2024/1"))
        .respond_with(ResponseTemplate::new(429))
        .expect(5)
        .mount(&server)
        .await;

    let url = format!("{}/full-listing/2024/1", server.uri());
    let result = page_client(5).fetch_page(&url, None).await;

    match result {
        Err(FetcherError::RetriesExhausted { attempts, last_error }) => {
            assert_eq!(attempts, 5);
            assert!(last_error.contains("429"), "last error: {last_error}");
        }
        other => panic!("expected exhausted retries, got {other:?}"),
    }
}

#[tokio::test]
async fn test_blocked_page_recovers_on_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/vulnerability-database/CVE-2024-0001"))
        .respond_with(ResponseTemplate::new(403))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/vulnerability-database/CVE-2024-0001"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let url = format!("{}/vulnerability-database/CVE-2024-0001", server.uri());
    let body = page_client(5).fetch_page(&url, None).await.unwrap();

    assert_eq!(body, "<html>ok</html>");
}

#[tokio::test]
async fn test_page_requests_carry_browser_identity() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/full-listing/2024/1/2"))
        .and(header("referer", "https://www.mend.io/vulnerability-database/full-listing/2024/1"))
        .and(header_exists("user-agent"))
        .and(header_exists("accept-language"))
        .respond_with(ResponseTemplate::new(200).set_body_string("page 2"))
        .expect(1)
        .mount(&server)
        .await;

    let url = format!("{}/full-listing/2024/1/2", server.uri());
    let body = page_client(1)
        .fetch_page(
            &url,
            Some("https://www.mend.io/vulnerability-database/full-listing/2024/1"),
        )
        .await
        .unwrap();

    assert_eq!(body, "page 2");
}

#[tokio::test]
async fn test_commit_query_sends_api_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/vault/commits/abc1234"))
        .and(header("authorization", "Bearer test-token"))
        .and(header("x-github-api-version", "2022-11-28"))
        .and(header("accept", "application/vnd.github+json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"sha": "abc1234"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = GithubCommitClient::new(
        Arc::new(Client::new()),
        Some("test-token".to_string()),
        fast_policy(3),
    );
    let url = format!("{}/repos/acme/vault/commits/abc1234", server.uri());
    let data = client.fetch_commit(&url).await.unwrap();

    assert_eq!(data["sha"], "abc1234");
}

#[tokio::test]
async fn test_commit_not_found_fails_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/vault/commits/deadbee"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "Not Found"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = GithubCommitClient::new(Arc::new(Client::new()), None, fast_policy(5));
    let url = format!("{}/repos/acme/vault/commits/deadbee", server.uri());

    assert!(matches!(
        client.fetch_commit(&url).await,
        Err(FetcherError::Rejected { attempts: 1, .. })
    ));
}

#[tokio::test]
async fn test_commit_rate_limit_is_still_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/vault/commits/feed123"))
        .respond_with(ResponseTemplate::new(403))
        .expect(3)
        .mount(&server)
        .await;

    let client = GithubCommitClient::new(Arc::new(Client::new()), None, fast_policy(3));
    let url = format!("{}/repos/acme/vault/commits/feed123", server.uri());

    assert!(matches!(
        client.fetch_commit(&url).await,
        Err(FetcherError::RetriesExhausted { attempts: 3, .. })
    ));
}

#[tokio::test]
async fn test_commit_body_that_is_not_json_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/vault/commits/cafe123"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>rate limit page</html>"))
        .expect(3)
        .mount(&server)
        .await;

    let client = GithubCommitClient::new(Arc::new(Client::new()), None, fast_policy(3));
    let url = format!("{}/repos/acme/vault/commits/cafe123", server.uri());

    assert!(client.fetch_commit(&url).await.is_err());
}
