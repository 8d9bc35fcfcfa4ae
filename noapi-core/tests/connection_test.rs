use noapi_core::{
    client::NapConnection,
    http::PERMISSION_ORDER_HEADER,
    middleware::{ExecLapse, middleware},
    types::{Aggregation, Filter, ListOptions, ResponseStatus, SortOption, UpdateOptions},
};
use noapi_mock_backend::MockBackend;
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};

fn users() -> MockBackend {
    MockBackend::new().with_resource(
        "users",
        vec![
            json!({"_id": "u1", "name": "Ada", "age": 36, "team": "core"}),
            json!({"_id": "u2", "name": "Grace", "age": 45, "team": "core"}),
            json!({"_id": "u3", "name": "Linus", "age": 28, "team": "kernel"}),
        ],
    )
}

#[tokio::test]
async fn test_list_sends_documented_body() {
    let backend = users();
    let conn = NapConnection::with_transport(backend.clone());

    let response = conn
        .list::<Value>(
            "users",
            Some(Filter::condition("age", ">", 30)),
            Some(ListOptions {
                sort: Some(vec![SortOption::desc("age")]),
                ..Default::default()
            }),
        )
        .await
        .unwrap();

    let request = backend.last_request().unwrap();
    assert_eq!(request.url, "/noapi/resources");
    assert_eq!(
        request.body,
        json!({
            "resource": "users",
            "operation": "list",
            "filter": ["age", ">", 30],
            "options": {"sort": [{"selector": "age", "desc": true}]}
        })
    );

    assert_eq!(response.status, ResponseStatus::Success);
    let names: Vec<_> = response
        .data
        .unwrap()
        .into_iter()
        .map(|u| u["name"].clone())
        .collect();
    assert_eq!(names, vec![json!("Grace"), json!("Ada")]);
}

#[tokio::test]
async fn test_write_operations_shape() {
    let backend = users();
    let conn = NapConnection::with_transport(backend.clone());

    conn.insert::<_, Value>("users", &json!({"name": "Ken"}), None)
        .await
        .unwrap();
    assert_eq!(
        backend.last_request().unwrap().body,
        json!({"resource": "users", "operation": "insert", "data": {"name": "Ken"}})
    );

    conn.update::<_, Value>(
        "users",
        &json!({"team": "infra"}),
        Filter::eq("_id", "u3"),
        Some(UpdateOptions {
            unique: Some(true),
            ..Default::default()
        }),
    )
    .await
    .unwrap();
    assert_eq!(
        backend.last_request().unwrap().body,
        json!({
            "resource": "users",
            "operation": "update",
            "data": {"team": "infra"},
            "filter": ["_id", "=", "u3"],
            "options": {"unique": true}
        })
    );

    conn.delete::<Value>("users", Filter::eq("_id", "u1"), None)
        .await
        .unwrap();
    assert_eq!(
        backend.last_request().unwrap().body,
        json!({"resource": "users", "operation": "delete", "filter": ["_id", "=", "u1"]})
    );

    let teams: Vec<_> = backend
        .records("users")
        .iter()
        .map(|u| u["team"].clone())
        .collect();
    assert_eq!(teams, vec![json!("core"), json!("infra"), Value::Null]);
}

#[tokio::test]
async fn test_aggregate() {
    let backend = users();
    let conn = NapConnection::with_transport(backend.clone());

    let aggregation = Aggregation::default()
        .param(["team"])
        .param(["COUNT", "_id", "members"])
        .field("team")
        .field("_id")
        .group_by("team");

    let response = conn
        .aggregate::<Vec<Value>>("users", aggregation, None, None)
        .await
        .unwrap();

    assert_eq!(
        backend.last_request().unwrap().body,
        json!({
            "resource": "users",
            "operation": "aggregate",
            "aggregation": {
                "params": [["team"], ["COUNT", "_id", "members"]],
                "fields": ["team", "_id"],
                "group": ["team"]
            }
        })
    );
    assert_eq!(
        response.data.unwrap(),
        vec![
            json!({"team": "core", "members": 2}),
            json!({"team": "kernel", "members": 1}),
        ]
    );
}

#[tokio::test]
async fn test_permission_order_header_is_always_sent() {
    let backend = users();
    let conn = NapConnection::with_transport(backend.clone());

    conn.list::<Value>("users", None, None).await.unwrap();
    let request = backend.last_request().unwrap();
    assert_eq!(request.headers.get(PERMISSION_ORDER_HEADER).unwrap(), "");

    conn.set_permission_order(vec!["admin".into(), "user".into()]);
    conn.add_header("x-tenant", "acme");
    conn.list::<Value>("users", None, None).await.unwrap();

    let request = backend.last_request().unwrap();
    assert_eq!(
        request.headers.get(PERMISSION_ORDER_HEADER).unwrap(),
        "admin,user"
    );
    assert_eq!(request.headers.get("x-tenant").unwrap(), "acme");
}

#[tokio::test]
async fn test_authorization_is_sent_as_use_auth() {
    let backend = users();
    let conn = NapConnection::with_transport(backend.clone());

    conn.default_connection()
        .use_auth("owner")
        .list::<Value>("users", None, None)
        .await
        .unwrap();
    assert_eq!(backend.last_request().unwrap().body["useAuth"], "owner");

    conn.set_default_authorization(Some("admin".into()));
    conn.list::<Value>("users", None, None).await.unwrap();
    assert_eq!(backend.last_request().unwrap().body["useAuth"], "admin");
}

#[tokio::test]
async fn test_custom_host_and_paths() {
    let backend = users().with_paths("/api/res", "/api/auth");
    let conn = NapConnection::with_transport(backend.clone());
    conn.set_host("http://backend.local/");
    conn.set_resource_urn("api/res");
    conn.set_auth_urn("/api/auth");

    conn.list::<Value>("users", None, None).await.unwrap();
    assert_eq!(
        backend.last_request().unwrap().url,
        "http://backend.local/api/res"
    );
}

#[tokio::test]
async fn test_unknown_resource_is_a_failure_envelope() {
    let conn = NapConnection::with_transport(users());

    let response = conn.list::<Value>("ghosts", None, None).await.unwrap();

    assert_eq!(response.status, ResponseStatus::Error);
    assert_eq!(response.status_code, 404);
    let failure = response.into_result().unwrap_err();
    assert_eq!(
        failure.to_string(),
        "ResourceNotFound: Unknown resource 'ghosts'"
    );
}

#[tokio::test]
async fn test_middlewares_run_in_registration_order() {
    let backend = users();
    let conn = NapConnection::with_transport(backend.clone());
    let seen = Arc::new(Mutex::new(Vec::new()));

    let tag = |name: &'static str| {
        let seen = Arc::clone(&seen);
        middleware(move |mut ctx| {
            seen.lock().unwrap().push((name, ctx.lapse, ctx.round));
            if ctx.lapse.runs_on_start() && ctx.data.get("resource").is_some() {
                let trail = ctx.data["options"]["payload"]["trail"]
                    .as_str()
                    .unwrap_or_default()
                    .to_string();
                ctx.data["options"]["payload"]["trail"] = json!(format!("{trail}{name}"));
            }
            ctx.data
        })
    };

    conn.with_lapse(vec![tag("a"), tag("b")], ExecLapse::OnStart)
        .with_lapse(tag("c"), ExecLapse::OnEnd)
        .list::<Value>("users", None, None)
        .await
        .unwrap();

    assert_eq!(
        backend.last_request().unwrap().body["options"]["payload"]["trail"],
        "ab"
    );
    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            ("a", ExecLapse::OnStart, 0),
            ("b", ExecLapse::OnStart, 1),
            ("c", ExecLapse::OnEnd, 0),
        ]
    );
}

#[tokio::test]
async fn test_after_middlewares_transform_the_response() {
    let conn = NapConnection::with_transport(users());
    conn.create_after_profile(
        "names-only",
        vec![middleware(|mut ctx| {
            if let Some(records) = ctx.data["data"].as_array_mut() {
                for record in records {
                    *record = record["name"].clone();
                }
            }
            ctx.data
        })],
    );

    let response = conn
        .with("names-only")
        .list::<String>("users", Some(Filter::eq("team", "core")), None)
        .await
        .unwrap();

    assert_eq!(response.data.unwrap(), vec!["Ada", "Grace"]);
}

#[tokio::test]
async fn test_default_profile_applies_to_shortcuts() {
    let backend = users();
    let conn = NapConnection::with_transport(backend.clone());
    conn.create_before_profile(
        "young",
        vec![middleware(|mut ctx| {
            ctx.data["filter"] = json!(["age", "<", 30]);
            ctx.data
        })],
    );
    conn.set_default_profile(Some("young".into()));

    let response = conn.list::<Value>("users", None, None).await.unwrap();
    assert_eq!(response.data.unwrap().len(), 1);

    conn.drop_profile("young");
    let response = conn.list::<Value>("users", None, None).await.unwrap();
    assert_eq!(response.data.unwrap().len(), 3);
}

#[tokio::test]
async fn test_authenticated_flag_follows_responses() {
    let backend = users()
        .with_user(json!({"email": "ada@noapi.dev", "password": "pw"}))
        .requiring_auth();
    let conn = NapConnection::with_transport(backend.clone());
    let mut changes = conn.subscribe_authenticated();

    let response = conn.list::<Value>("users", None, None).await.unwrap();
    assert_eq!(response.status_code, 401);
    assert!(!response.auth);
    assert!(!conn.authenticated());

    conn.make_auth_request(json!({
        "operation": "login",
        "email": "ada@noapi.dev",
        "password": "pw"
    }))
    .await
    .unwrap();

    assert!(conn.authenticated());
    assert!(changes.has_changed().unwrap());
    assert!(*changes.borrow_and_update());

    let response = conn.list::<Value>("users", None, None).await.unwrap();
    assert!(response.is_success());
    assert!(response.auth);
}

#[tokio::test]
async fn test_transport_failures_surface_as_errors() {
    let backend = users();
    backend.set_offline(true);
    let conn = NapConnection::with_transport(backend);

    let err = conn.list::<Value>("users", None, None).await.unwrap_err();
    assert_eq!(err.to_string(), "Transport failure: backend is offline");
}
