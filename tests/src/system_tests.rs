use app_authentication::LoginRateLimiter;
use app_config::AppConfig;
use app_database::{Database, db_connect::initialize_db, service::DbService};
use app_error::AppResult;
use app_models::{ObjectId, User};
use axum::{
    Router,
    body::Body,
    extract::Request,
    http::{Method, StatusCode, header},
};
use micro_user::{routes::create_routes, schema::create_schema, service::AuthService};
use serde::Deserialize;
use serde_json::{Value, json};
use std::{io::Write, sync::Arc};
use tower::ServiceExt;

const PASSWORD: &str = "Sup3r-Secret!";

struct TestApp {
    app: Router,
    db: Arc<Database>,
}

// Build everything from a configuration file the way the binary does
async fn setup_test_app() -> AppResult<TestApp> {
    let mut config = AppConfig::default();
    config.database.namespace = "system".to_string();
    config.database.database = "tests".to_string();
    config.security.password.argon2.memory = 8 * 1024;
    config.security.password.argon2.iterations = 1;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(serde_json::to_string(&config).unwrap().as_bytes())
        .unwrap();

    let config = AppConfig::from_file(file.path())?;
    config.validate()?;

    let db = initialize_db(&config).await?;
    let rate_limiter = Arc::new(LoginRateLimiter::from_settings(
        &config.security.rate_limiting.login,
    ));
    let auth_service = Arc::new(
        AuthService::new(Arc::clone(&db), &config.security)?.with_rate_limiter(rate_limiter),
    );

    let schema = create_schema(Arc::clone(&auth_service));
    let app = create_routes(schema, auth_service, &config);

    Ok(TestApp { app, db })
}

// Helper to make GraphQL requests
async fn graphql_request(app: &Router, token: Option<&str>, query: Value) -> Value {
    let mut request = Request::builder()
        .method(Method::POST)
        .uri("/graphql")
        .header(header::CONTENT_TYPE, "application/json");

    if let Some(token) = token {
        request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }

    let response = app
        .clone()
        .oneshot(request.body(Body::from(query.to_string())).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

async fn register(app: &Router, username: &str) -> Value {
    let response = graphql_request(
        app,
        None,
        json!({
            "query": r#"
                mutation($input: RegisterInput!) {
                    register(input: $input) { token user { id username } }
                }
            "#,
            "variables": { "input": {
                "name": "System Tester",
                "username": username,
                "email": format!("{}@example.com", username),
                "password": PASSWORD
            } }
        }),
    )
    .await;

    assert!(response["errors"].is_null(), "register failed: {}", response);
    response["data"]["register"].clone()
}

async fn login(app: &Router, username: &str, password: &str) -> Value {
    let response = graphql_request(
        app,
        None,
        json!({
            "query": r#"
                mutation($input: LoginInput!) {
                    login(input: $input) { token user { id username } }
                }
            "#,
            "variables": { "input": { "username": username, "password": password } }
        }),
    )
    .await;

    response["data"]["login"].clone()
}

fn sessions_query() -> Value {
    json!({ "query": "query { sessions { id expiresAt user { id username } } }" })
}

#[derive(Debug, Deserialize)]
struct StoredSession {
    user: Value,
}

#[tokio::test]
async fn test_envelope_shapes_across_the_flow() -> AppResult<()> {
    let TestApp { app, .. } = setup_test_app().await?;

    let registered = register(&app, "envelope").await;
    assert!(registered["token"].is_string());
    assert!(registered["user"]["id"].is_string());

    let rejected = login(&app, "envelope", "Wr0ng-Secret!").await;
    assert_eq!(rejected, json!({ "token": null, "user": null }));

    let accepted = login(&app, "envelope", PASSWORD).await;
    assert!(accepted["token"].is_string());
    assert_eq!(accepted["user"], registered["user"]);
    assert_ne!(accepted["token"], registered["token"], "each login opens its own session");

    Ok(())
}

#[tokio::test]
async fn test_sessions_store_owner_as_identifier() -> AppResult<()> {
    let TestApp { app, db } = setup_test_app().await?;

    let registered = register(&app, "stored").await;
    let user_id = registered["user"]["id"].as_str().unwrap().to_string();

    let rows: Vec<StoredSession> = db
        .query("SELECT `user` FROM sessions")
        .r#await()
        .await?
        .take(0)?;

    assert_eq!(rows.len(), 1);
    // on disk the link is the bare hex id, never the embedded user document
    assert_eq!(rows[0].user, json!(user_id));
    assert!(ObjectId::parse_str(&user_id).is_ok());

    Ok(())
}

#[tokio::test]
async fn test_session_owner_resolves_lazily() -> AppResult<()> {
    let TestApp { app, .. } = setup_test_app().await?;

    let registered = register(&app, "lazy").await;
    let token = login(&app, "lazy", PASSWORD).await["token"]
        .as_str()
        .unwrap()
        .to_string();

    let response = graphql_request(&app, Some(&token), sessions_query()).await;
    let sessions = response["data"]["sessions"].as_array().unwrap();

    assert_eq!(sessions.len(), 2);
    for session in sessions {
        assert_eq!(session["user"], registered["user"]);
    }

    // sessions selected without their owner never touch the users table
    let response = graphql_request(
        &app,
        Some(&token),
        json!({ "query": "query { sessions { id } }" }),
    )
    .await;
    assert_eq!(response["data"]["sessions"].as_array().unwrap().len(), 2);

    Ok(())
}

#[tokio::test]
async fn test_deleted_owner_becomes_null() -> AppResult<()> {
    let TestApp { app, db } = setup_test_app().await?;

    let registered = register(&app, "ghost").await;
    let token = registered["token"].as_str().unwrap();
    let user_id = registered["user"]["id"].as_str().unwrap();

    let users = DbService::<User>::for_entity(Arc::clone(&db));
    assert!(users.delete_record(user_id).await?.is_some());

    let response = graphql_request(&app, Some(token), sessions_query()).await;
    assert!(response["errors"].is_null(), "dangling owner is not an error");
    assert!(response["data"]["sessions"][0]["user"].is_null());

    let response = graphql_request(
        &app,
        Some(token),
        json!({ "query": "query { me { id } }" }),
    )
    .await;
    assert!(response["data"]["me"].is_null());

    Ok(())
}

#[tokio::test]
async fn test_logout_revokes_only_that_session() -> AppResult<()> {
    let TestApp { app, .. } = setup_test_app().await?;

    let first = register(&app, "twodevices").await["token"]
        .as_str()
        .unwrap()
        .to_string();
    let second = login(&app, "twodevices", PASSWORD).await["token"]
        .as_str()
        .unwrap()
        .to_string();

    let response = graphql_request(&app, Some(&first), json!({ "query": "mutation { logout }" })).await;
    assert_eq!(response["data"]["logout"], true);

    let response = graphql_request(&app, Some(&second), sessions_query()).await;
    let sessions = response["data"]["sessions"].as_array().unwrap();
    assert_eq!(sessions.len(), 1, "only the second device is still signed in");

    let response = graphql_request(&app, Some(&first), json!({ "query": "query { me { id } }" })).await;
    assert!(response["data"]["me"].is_null());

    Ok(())
}
