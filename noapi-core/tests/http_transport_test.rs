use httpmock::prelude::*;
use noapi_core::{
    client::{NapConnection, RequestError},
    config::NapConfig,
    http::{HttpTransport, Transport, TransportError},
    types::Filter,
};
use serde_json::{Value, json};

#[tokio::test]
async fn test_posts_json_with_permission_order() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/noapi/resources")
                .header("x-nap-permission-order", "admin,user")
                .json_body(json!({
                    "resource": "users",
                    "operation": "list",
                    "filter": ["name", "=", "Ada"]
                }));
            then.status(200).json_body(json!({
                "status": "success",
                "statusCode": 200,
                "data": [{"name": "Ada"}],
                "auth": 1,
                "totalCount": "1"
            }));
        })
        .await;

    let conn = NapConnection::new().unwrap();
    conn.set_host(&server.base_url());
    conn.set_permission_order(vec!["admin".into(), "user".into()]);

    let response = conn
        .list::<Value>("users", Some(Filter::eq("name", "Ada")), None)
        .await
        .unwrap();

    mock.assert_async().await;
    assert!(response.auth);
    assert!(conn.authenticated());
    assert_eq!(response.total_count, Some(1));
    assert_eq!(response.data.unwrap(), vec![json!({"name": "Ada"})]);
}

#[tokio::test]
async fn test_auth_calls_hit_the_auth_endpoint() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/custom/auth")
                .header("x-tenant", "acme")
                .json_body(json!({"operation": "read"}));
            then.status(200)
                .json_body(json!({"status": "error", "statusCode": 401, "auth": false}));
        })
        .await;

    let config = NapConfig {
        host: server.base_url(),
        auth_urn: "custom/auth".into(),
        headers: [("x-tenant".to_string(), "acme".to_string())].into(),
        ..Default::default()
    };
    let conn = NapConnection::from_config(&config).unwrap();

    let response = conn
        .make_auth_request(json!({"operation": "read"}))
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(response["auth"], false);
}

#[tokio::test]
async fn test_non_success_status_is_a_transport_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/noapi/resources");
            then.status(502).body("bad gateway");
        })
        .await;

    let transport = HttpTransport::new().unwrap();
    let url = server.url("/noapi/resources");
    let err = transport
        .post(&url, Default::default(), json!({}))
        .await
        .unwrap_err();

    match err {
        TransportError::Status { status, body, .. } => {
            assert_eq!(status, 502);
            assert_eq!(body, "bad gateway");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_invalid_json_is_a_decode_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/noapi/resources");
            then.status(200).body("<html>maintenance</html>");
        })
        .await;

    let conn = NapConnection::new().unwrap();
    conn.set_host(&server.base_url());

    let err = conn.list::<Value>("users", None, None).await.unwrap_err();

    assert!(matches!(
        err,
        RequestError::Transport(TransportError::Decode { .. })
    ));
}

#[tokio::test]
async fn test_session_cookie_carries_over_to_a_new_transport() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/noapi/auth");
            then.status(200)
                .header("set-cookie", "sid=abc; Path=/; HttpOnly")
                .json_body(json!({"status": "success", "auth": true}));
        })
        .await;
    let resources = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/noapi/resources")
                .header("cookie", "sid=abc");
            then.status(200)
                .json_body(json!({"status": "success", "data": [], "auth": true}));
        })
        .await;

    let login = HttpTransport::new().unwrap();
    login
        .post(&server.url("/noapi/auth"), Default::default(), json!({"operation": "login"}))
        .await
        .unwrap();
    let cookies = login.cookies(&server.url("/noapi/resources")).unwrap();
    assert_eq!(cookies, "sid=abc");

    let later = HttpTransport::new().unwrap();
    later
        .add_cookies(&server.url("/noapi/auth"), &cookies)
        .unwrap();
    later
        .post(&server.url("/noapi/resources"), Default::default(), json!({}))
        .await
        .unwrap();

    resources.assert_async().await;
}
