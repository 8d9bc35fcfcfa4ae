use noapi_core::{
    auth::AuthService,
    client::NapConnection,
    types::{Identity, LoginIdentities, LoginOptions, Permission, ResetPasswordOptions},
};
use noapi_mock_backend::MockBackend;
use serde_json::{Value, json};

const EMAIL: &str = "ada@noapi.dev";

fn backend() -> MockBackend {
    MockBackend::new()
        .with_user(json!({"email": EMAIL, "name": "Ada", "password": "analytical"}))
        .with_resources_allowed(json!({
            "orders": {"read": ["number", {"name": "total", "type": "number"}], "delete": true}
        }))
}

fn identities(password: &str) -> LoginIdentities {
    LoginIdentities::from([
        ("email".to_string(), Identity::from(EMAIL)),
        ("password".to_string(), Identity::from(password)),
    ])
}

#[tokio::test]
async fn test_login_then_read_populates_session() {
    let backend = backend();
    let auth = AuthService::new(NapConnection::with_transport(backend.clone()));
    let mut user_changed = auth.subscribe_user_changed();
    let mut allowed = auth.subscribe_resources_allowed();

    let response = auth
        .login::<Value>(&identities("analytical"), Some(true), None)
        .await
        .unwrap();

    assert!(response.is_success());
    assert!(auth.authenticated());
    assert_eq!(
        backend.last_request().unwrap().body,
        json!({
            "operation": "login",
            "remember": true,
            "email": EMAIL,
            "password": "analytical"
        })
    );

    auth.read().await.unwrap();

    let user = auth.user().unwrap();
    assert_eq!(user["name"], "Ada");
    assert!(user.get("password").is_none());
    assert!(user_changed.try_recv().is_ok());

    assert!(allowed.has_changed().unwrap());
    let permissions = allowed.borrow_and_update().clone();
    assert!(permissions.allows("orders", Permission::Read));
    assert!(permissions.allows("orders", Permission::Delete));
    assert!(!permissions.allows("orders", Permission::Insert));
    assert_eq!(permissions.fields("orders", Permission::Read), vec!["number", "total"]);

    // Reading the same user again is not a change
    auth.read().await.unwrap();
    assert!(user_changed.try_recv().is_err());
    assert!(!allowed.has_changed().unwrap());
}

#[tokio::test]
async fn test_failed_login_reports_the_failure() {
    let auth = AuthService::new(NapConnection::with_transport(backend()));

    let response = auth
        .login::<Value>(&identities("wrong"), None, None)
        .await
        .unwrap();

    assert!(!response.is_success());
    assert!(!auth.authenticated());
    assert_eq!(
        response.into_result().unwrap_err().to_string(),
        "InvalidCredentials: Invalid credentials"
    );
    assert!(auth.user().is_none());
}

#[tokio::test]
async fn test_session_engine_is_added_to_login_options() {
    let backend = backend();
    let auth = AuthService::new(NapConnection::with_transport(backend.clone()));
    auth.set_session_engine(Some("jwt".into()));

    auth.login::<Value>(&identities("analytical"), None, None)
        .await
        .unwrap();
    assert_eq!(
        backend.last_request().unwrap().body["options"],
        json!({"sessionEngine": "jwt"})
    );

    auth.login::<Value>(
        &identities("analytical"),
        None,
        Some(LoginOptions {
            session_engine: Some("cookie".into()),
            avoid_auth: Some(true),
        }),
    )
    .await
    .unwrap();
    assert_eq!(
        backend.last_request().unwrap().body["options"],
        json!({"sessionEngine": "cookie", "avoidAuth": true})
    );
}

#[tokio::test]
async fn test_logout_clears_authentication() {
    let backend = backend();
    let auth = AuthService::new(NapConnection::with_transport(backend.clone()));
    auth.login::<Value>(&identities("analytical"), None, None)
        .await
        .unwrap();
    auth.read().await.unwrap();
    assert!(auth.user().is_some());

    auth.logout(None).await.unwrap();

    assert_eq!(
        backend.last_request().unwrap().body,
        json!({"operation": "logout"})
    );
    assert!(!auth.authenticated());
    assert!(auth.user().is_none());
    assert!(!auth.check_authenticated().await);
}

#[tokio::test]
async fn test_password_recovery_flow() {
    let backend = backend();
    let auth = AuthService::new(NapConnection::with_transport(backend.clone()));
    auth.set_origin_url(Some("https://app.noapi.dev".into()));

    let response = auth
        .recover_password_by_email(
            EMAIL,
            Some(ResetPasswordOptions {
                dest_url: Some("/reset".into()),
            }),
        )
        .await
        .unwrap();
    assert!(response.is_success());
    assert_eq!(
        backend.last_request().unwrap().body,
        json!({
            "operation": "recoverPasswordByEmail",
            "email": EMAIL,
            "originUrl": "https://app.noapi.dev",
            "options": {"destUrl": "/reset"}
        })
    );

    let token = backend.issued_token(EMAIL).unwrap();
    assert!(auth.check_token(&token).await.unwrap().is_success());
    assert!(!auth.check_token("forged").await.unwrap().is_success());

    let response = auth
        .set_password_for_token(&token, "engine", None)
        .await
        .unwrap();
    assert!(response.is_success());
    assert!(auth.authenticated());

    auth.logout(None).await.unwrap();
    let response = auth
        .login::<Value>(&identities("engine"), None, None)
        .await
        .unwrap();
    assert!(response.is_success());

    // Tokens are single use
    assert!(!auth.check_token(&token).await.unwrap().is_success());
}

#[tokio::test]
async fn test_sms_recovery_reports_backend_failure() {
    let backend = backend();
    let auth = AuthService::new(NapConnection::with_transport(backend.clone()));

    let response = auth.recover_password_by_sms("+34600000000").await.unwrap();

    assert_eq!(
        backend.last_request().unwrap().body,
        json!({"operation": "recoverPasswordBySms", "phone": "+34600000000"})
    );
    assert_eq!(response.status_code, 501);
}

#[tokio::test]
async fn test_check_authenticated_is_false_when_offline() {
    let backend = backend();
    let auth = AuthService::new(NapConnection::with_transport(backend.clone()));
    auth.login::<Value>(&identities("analytical"), None, None)
        .await
        .unwrap();
    assert!(auth.check_authenticated().await);

    backend.set_offline(true);
    assert!(!auth.check_authenticated().await);
}

#[tokio::test]
async fn test_set_user_merges_and_notifies() {
    let backend = backend();
    let auth = AuthService::new(NapConnection::with_transport(backend.clone()));
    auth.login::<Value>(&identities("analytical"), None, None)
        .await
        .unwrap();
    auth.read().await.unwrap();

    let mut user_changed = auth.subscribe_user_changed();
    let mut patch = serde_json::Map::new();
    patch.insert("theme".into(), json!("dark"));
    auth.set_user(patch);

    assert!(user_changed.try_recv().is_ok());
    let user = auth.user().unwrap();
    assert_eq!(user["theme"], "dark");
    assert_eq!(user["email"], EMAIL);
}
