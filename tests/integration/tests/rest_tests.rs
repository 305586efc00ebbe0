//! REST executor tests against the mock REST server
//!
//! Run with: cargo test -p integration-tests --test rest_tests

use std::time::Duration;

use anyhow::Result;
use chat_client::{Client, ClientError, Endpoint, ErrorKind, RestRequest};
use chat_common::{NotFoundKind, PermissionKind};
use integration_tests::*;
use serde_json::json;

const CHANNEL: &str = "41771983423143937";

async fn client_for(rest: &MockRest) -> Result<Client> {
    Ok(Client::builder(test_config("ws://127.0.0.1:9", &rest.base_url())).build()?)
}

fn too_many(retry_after: f64) -> ScriptedResponse {
    ScriptedResponse::json(
        429,
        &json!({"message": "You are being rate limited.", "retry_after": retry_after, "global": false}),
    )
}

#[tokio::test]
async fn test_request_carries_bot_authorization() -> Result<()> {
    let rest = MockRest::start(vec![ScriptedResponse::json(200, &json!({"id": CHANNEL, "type": 0}))]).await?;
    let client = client_for(&rest).await?;

    let response = client
        .submit_rest_request(RestRequest::get(Endpoint::Channel, &[CHANNEL]))
        .await?;
    assert_eq!(response.status, 200);
    assert_eq!(response.json_value()?["id"], CHANNEL);

    let requests = rest.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].path, format!("/api/v10/channels/{CHANNEL}"));
    assert_eq!(requests[0].authorization.as_deref(), Some("Bot test-token"));
    assert_eq!(requests[0].query, None);
    Ok(())
}

#[tokio::test]
async fn test_query_parameters_are_encoded() -> Result<()> {
    let rest = MockRest::start(vec![ScriptedResponse::json(200, &json!([]))]).await?;
    let client = client_for(&rest).await?;

    let request = RestRequest::get(Endpoint::Message, &[CHANNEL])
        .query("limit", 50)
        .query("around", "a b&c");
    client.submit_rest_request(request).await?;

    let requests = rest.requests();
    assert_eq!(requests[0].path, format!("/api/v10/channels/{CHANNEL}/messages"));
    assert_eq!(requests[0].query.as_deref(), Some("limit=50&around=a+b%26c"));
    Ok(())
}

#[tokio::test]
async fn test_429_is_retried_transparently() -> Result<()> {
    let rest = MockRest::start(vec![too_many(0.05), ScriptedResponse::json(200, &json!({"ok": true}))]).await?;
    let client = client_for(&rest).await?;

    let response = client
        .submit_rest_request(RestRequest::post(Endpoint::Message, &[CHANNEL]).json(json!({"content": "hi"})))
        .await?;
    assert_eq!(response.status, 200);

    let requests = rest.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[1].at - requests[0].at >= Duration::from_millis(40));
    Ok(())
}

#[tokio::test]
async fn test_429_exhausts_retries() -> Result<()> {
    // max_retries is 2: one attempt plus two retries
    let rest = MockRest::start(vec![too_many(0.01), too_many(0.01), too_many(0.01), too_many(0.01)]).await?;
    let client = client_for(&rest).await?;

    let err = client
        .submit_rest_request(RestRequest::get(Endpoint::Message, &[CHANNEL]))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RateLimited);
    assert_eq!(rest.requests().len(), 3);
    Ok(())
}

#[tokio::test]
async fn test_cannot_message_user_subtype() -> Result<()> {
    let rest = MockRest::start(vec![ScriptedResponse::json(
        403,
        &error_body(50007, "Cannot send messages to this user"),
    )])
    .await?;
    let client = client_for(&rest).await?;

    let err = client
        .submit_rest_request(RestRequest::post(Endpoint::Message, &[CHANNEL]))
        .await
        .unwrap_err();
    match err {
        ClientError::PermissionDenied { kind, context } => {
            assert_eq!(kind, PermissionKind::CannotMessageUser);
            assert_eq!(context.response.status, 403);
        }
        other => panic!("unexpected error {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn test_unknown_channel_subtype() -> Result<()> {
    let rest = MockRest::start(vec![ScriptedResponse::json(404, &error_body(10003, "Unknown Channel"))]).await?;
    let client = client_for(&rest).await?;

    let err = client
        .submit_rest_request(RestRequest::get(Endpoint::Channel, &[CHANNEL]))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ClientError::NotFound {
            kind: NotFoundKind::UnknownChannel,
            ..
        }
    ));
    Ok(())
}

#[tokio::test]
async fn test_exhausted_bucket_waits_for_reset() -> Result<()> {
    let rest = MockRest::start(vec![
        ScriptedResponse::json(200, &json!([]))
            .header("x-ratelimit-limit", "1")
            .header("x-ratelimit-remaining", "0")
            .header("x-ratelimit-reset-after", "0.3")
            .header("x-ratelimit-bucket", "abcd"),
        ScriptedResponse::json(200, &json!([])),
    ])
    .await?;
    let client = client_for(&rest).await?;

    client
        .submit_rest_request(RestRequest::get(Endpoint::Message, &[CHANNEL]))
        .await?;
    client
        .submit_rest_request(RestRequest::get(Endpoint::Message, &[CHANNEL]))
        .await?;

    let requests = rest.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[1].at - requests[0].at >= Duration::from_millis(250));
    Ok(())
}

#[tokio::test]
async fn test_shutdown_rejects_new_requests() -> Result<()> {
    let rest = MockRest::start(Vec::new()).await?;
    let client = client_for(&rest).await?;
    client.shutdown().await?;

    let err = client
        .submit_rest_request(RestRequest::get(Endpoint::CurrentUser, &[]))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ClientClosed);
    assert!(rest.requests().is_empty());
    Ok(())
}
