use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::test;
use tower::ServiceExt;

use crate::{
    routes::create_routes,
    schema::create_schema,
    service::{AuthService, AuthServiceTrait},
};
use app_authentication::LoginRateLimiter;
use app_config::{AppConfig, Argon2Config, RateLimitSettings};
use app_database::{db_connect::initialize_memory_db, service::DbService};
use app_error::AppError;
use app_models::{LoginInput, ObjectId, Reference, RegisterInput, Session};

const PASSWORD: &str = "Password123!";

fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    // keep hashing cheap in tests
    config.security.password.argon2 = Argon2Config {
        memory: 8 * 1024,
        iterations: 1,
        parallelism: 1,
    };
    config.security.rate_limiting.login = RateLimitSettings {
        max_attempts: 3,
        window_duration: 300,
        block_duration: Some(900),
    };
    config
}

async fn setup_test_environment() -> (Arc<AuthService>, Router) {
    setup_with_config(test_config()).await
}

async fn setup_with_config(config: AppConfig) -> (Arc<AuthService>, Router) {
    let db = initialize_memory_db()
        .await
        .expect("Database initialization failed");

    let rate_limiter = Arc::new(LoginRateLimiter::from_settings(
        &config.security.rate_limiting.login,
    ));
    let auth_service = Arc::new(
        AuthService::new(db, &config.security)
            .expect("auth service")
            .with_rate_limiter(rate_limiter),
    );

    let schema = create_schema(Arc::clone(&auth_service));
    let app = create_routes(schema, Arc::clone(&auth_service), &config);

    (auth_service, app)
}

fn register_input(username: &str) -> RegisterInput {
    RegisterInput {
        name: "Test User".to_string(),
        username: username.to_string(),
        email: format!("{}@example.com", username),
        password: PASSWORD.to_string(),
    }
}

async fn register(auth_service: &AuthService, username: &str) -> String {
    let response = auth_service
        .register(register_input(username))
        .await
        .expect("Failed to register test user");

    response
        .access_token()
        .expect("registration should issue a token")
        .to_string()
}

async fn graphql(app: &Router, token: Option<&str>, body: Value) -> Value {
    let mut request = Request::builder()
        .uri("/graphql")
        .method("POST")
        .header(header::CONTENT_TYPE, "application/json");

    if let Some(token) = token {
        request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }

    let response = app
        .clone()
        .oneshot(request.body(Body::from(body.to_string())).unwrap())
        .await
        .unwrap();

    // GraphQL reports failures in the body, never through the status
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn login_mutation(username: &str, password: &str) -> Value {
    json!({
        "query": r#"
            mutation LoginUser($input: LoginInput!) {
                login(input: $input) {
                    token
                    user { id username }
                }
            }
        "#,
        "variables": { "input": { "username": username, "password": password } }
    })
}

fn me_query() -> Value {
    json!({ "query": "query { me { id username name email } }" })
}

fn error_code(response: &Value) -> &str {
    response["errors"][0]["extensions"]["code"]
        .as_str()
        .unwrap_or_default()
}

#[test]
async fn test_health_check() {
    let (_, app) = setup_test_environment().await;

    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), 1024)
        .await
        .unwrap();
    let health: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["service"], "micro-user");
}

#[test]
async fn test_playground_is_served() {
    let (_, app) = setup_test_environment().await;

    for uri in ["/", "/graphql"] {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK, "GET {}", uri);
    }
}

#[test]
async fn test_graphql_register_user() {
    let (auth_service, app) = setup_test_environment().await;

    let register_mutation = json!({
        "query": r#"
            mutation RegisterUser($input: RegisterInput!) {
                register(input: $input) {
                    token
                    user { id username name email }
                }
            }
        "#,
        "variables": {
            "input": {
                "name": "Test User",
                "username": "testuser",
                "email": "Test@Example.com",
                "password": PASSWORD
            }
        }
    });

    let response = graphql(&app, None, register_mutation).await;
    let data = &response["data"]["register"];

    let token = data["token"].as_str().expect("Response should include a token");
    assert_eq!(data["user"]["username"], "testuser");
    assert_eq!(data["user"]["email"], "test@example.com");

    let claims = auth_service
        .get_jwt_service()
        .validate_token(token)
        .expect("issued token should validate");
    assert_eq!(claims.sub, data["user"]["id"].as_str().unwrap());
    assert_eq!(claims.sub.len(), 24, "user ids are ObjectId hex strings");
}

#[test]
async fn test_duplicate_registration_is_rejected() {
    let (auth_service, app) = setup_test_environment().await;
    register(&auth_service, "taken").await;

    let response = graphql(
        &app,
        None,
        json!({
            "query": "mutation($input: RegisterInput!) { register(input: $input) { token } }",
            "variables": { "input": {
                "name": "Someone Else",
                "username": "taken",
                "email": "other@example.com",
                "password": PASSWORD
            } }
        }),
    )
    .await;

    assert_eq!(error_code(&response), "RESOURCE_EXISTS_ERROR");
}

#[test]
async fn test_weak_password_is_a_validation_error() {
    let (_, app) = setup_test_environment().await;

    let response = graphql(
        &app,
        None,
        json!({
            "query": "mutation($input: RegisterInput!) { register(input: $input) { token } }",
            "variables": { "input": {
                "name": "Weak Password",
                "username": "weakling",
                "email": "weak@example.com",
                "password": "password"
            } }
        }),
    )
    .await;

    assert_eq!(error_code(&response), "VALIDATION_ERROR");
    assert!(response["data"].is_null());
}

#[test]
async fn test_graphql_login_user() {
    let (auth_service, app) = setup_test_environment().await;
    register(&auth_service, "logintest").await;

    let response = graphql(&app, None, login_mutation("logintest", PASSWORD)).await;
    let data = &response["data"]["login"];

    assert!(response["errors"].is_null());
    assert!(data["token"].is_string(), "Response should include a token");
    assert_eq!(data["user"]["username"], "logintest");
}

#[test]
async fn test_rejected_login_returns_empty_response() {
    let (auth_service, app) = setup_test_environment().await;
    register(&auth_service, "ada").await;

    for (username, password) in [("ada", "Wrong123!"), ("nobody", PASSWORD)] {
        let response = graphql(&app, None, login_mutation(username, password)).await;

        assert!(response["errors"].is_null(), "rejection is not an error");
        assert_eq!(
            response["data"]["login"],
            json!({ "token": null, "user": null })
        );
    }
}

#[test]
async fn test_repeated_failures_lock_the_account() {
    let (auth_service, app) = setup_test_environment().await;
    register(&auth_service, "grace").await;

    for _ in 0..3 {
        let response = graphql(&app, None, login_mutation("grace", "Wrong123!")).await;
        assert!(response["errors"].is_null());
    }

    // even the right password is refused while locked
    let response = graphql(&app, None, login_mutation("grace", PASSWORD)).await;
    assert_eq!(error_code(&response), "RATE_LIMIT_ERROR");
}

#[test]
async fn test_graphql_authenticated_me_query() {
    let (auth_service, app) = setup_test_environment().await;
    let token = register(&auth_service, "mequery").await;

    let response = graphql(&app, Some(&token), me_query()).await;
    let data = &response["data"]["me"];

    assert_eq!(data["username"], "mequery");
    assert_eq!(data["name"], "Test User");
    assert_eq!(data["email"], "mequery@example.com");
}

#[test]
async fn test_me_requires_authentication() {
    let (_, app) = setup_test_environment().await;

    for token in [None, Some("invalid.token.here")] {
        let response = graphql(&app, token, me_query()).await;

        assert_eq!(error_code(&response), "AUTHENTICATION_ERROR");
        assert!(
            response["errors"][0]["message"]
                .as_str()
                .unwrap()
                .contains("Not authenticated"),
            "Error should indicate authentication failure"
        );
    }
}

#[test]
async fn test_sessions_resolve_their_owner() {
    let (auth_service, app) = setup_test_environment().await;
    register(&auth_service, "sessions").await;

    let login = graphql(&app, None, login_mutation("sessions", PASSWORD)).await;
    let token = login["data"]["login"]["token"].as_str().unwrap().to_string();

    let response = graphql(
        &app,
        Some(&token),
        json!({ "query": "query { sessions { id createdAt user { username } } }" }),
    )
    .await;

    let sessions = response["data"]["sessions"].as_array().expect("sessions list");
    assert_eq!(sessions.len(), 2, "registration and login each open a session");
    assert!(sessions.iter().all(|s| s["user"]["username"] == "sessions"));
    let created: Vec<_> = sessions
        .iter()
        .map(|s| chrono::DateTime::parse_from_rfc3339(s["createdAt"].as_str().unwrap()).unwrap())
        .collect();
    assert!(created[0] >= created[1], "newest session first");
}

#[test]
async fn test_logout_ends_the_session() {
    let (auth_service, app) = setup_test_environment().await;
    let token = register(&auth_service, "leaving").await;
    let logout = json!({ "query": "mutation { logout }" });

    let response = graphql(&app, Some(&token), logout.clone()).await;
    assert_eq!(response["data"]["logout"], true);

    // the token still verifies but its session is gone
    let response = graphql(&app, Some(&token), me_query()).await;
    assert!(response["errors"].is_null());
    assert!(response["data"]["me"].is_null());

    let response = graphql(&app, Some(&token), logout).await;
    assert_eq!(response["data"]["logout"], false);

    let response = graphql(
        &app,
        Some(&token),
        json!({ "query": "query { sessions { id } }" }),
    )
    .await;
    assert_eq!(error_code(&response), "AUTHENTICATION_ERROR");
}

#[test]
async fn test_oversized_body_gets_error_envelope() {
    let mut config = test_config();
    config.server.body_limit = 64;
    let (_, app) = setup_with_config(config).await;

    let body = json!({ "query": format!("query {{ me {{ id }} }} # {}", "x".repeat(500)) })
        .to_string();
    let request = Request::builder()
        .uri("/graphql")
        .method("POST")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::CONTENT_LENGTH, body.len())
        .body(Body::from(body))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);

    let body = axum::body::to_bytes(response.into_body(), 4096)
        .await
        .unwrap();
    let envelope: Value = serde_json::from_slice(&body).expect("JSON error envelope");
    assert_eq!(envelope["code"], "PAYLOAD_TOO_LARGE");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_registration_keeps_one_user() {
    let (auth_service, _) = setup_test_environment().await;

    let attempts: Vec<_> = (0..2)
        .map(|_| {
            let auth_service = Arc::clone(&auth_service);
            tokio::spawn(async move { auth_service.register(register_input("twin")).await })
        })
        .collect();

    let mut winners = Vec::new();
    for attempt in attempts {
        match attempt.await.expect("registration task") {
            Ok(response) => winners.push(response),
            Err(e) => assert!(
                matches!(e, AppError::ResourceExistsError(_)),
                "losing registration should be a conflict, got {:?}",
                e
            ),
        }
    }
    assert_eq!(winners.len(), 1, "exactly one registration succeeds");

    let login = auth_service
        .login(LoginInput {
            username: "twin".to_string(),
            password: PASSWORD.to_string(),
        })
        .await
        .expect("login");
    assert_eq!(
        login.profile().map(|p| p.id.clone()),
        winners[0].profile().map(|p| p.id.clone())
    );
}

#[test]
async fn test_expired_sessions_are_removed_when_read() {
    let config = test_config();
    let db = initialize_memory_db().await.expect("Database initialization failed");
    let auth_service = AuthService::new(Arc::clone(&db), &config.security).expect("auth service");
    let session_db = DbService::<Session>::for_entity(db);
    let jwt = auth_service.get_jwt_service();

    let token = auth_service
        .register(register_input("stale"))
        .await
        .expect("register")
        .access_token()
        .expect("token")
        .to_string();
    let claims = jwt.validate_token(&token).unwrap();
    let owner = ObjectId::parse_str(&claims.sub).unwrap();

    let stale = Session::open(Reference::unresolved(owner), chrono::Duration::hours(-1));
    session_db.insert(stale.clone()).await.unwrap();

    let sessions = auth_service.sessions(&claims).await.unwrap();
    assert_eq!(sessions.len(), 1);
    assert!(session_db.get_record_by_id(&stale.id.to_hex()).await.unwrap().is_none());

    // a token whose own session has expired
    let expired = Session::open(Reference::unresolved(owner), chrono::Duration::hours(-1));
    session_db.insert(expired.clone()).await.unwrap();
    let expired_token = jwt
        .generate_token(&claims.sub, &claims.username, &expired.id.to_hex())
        .unwrap();
    let expired_claims = jwt.validate_token(&expired_token).unwrap();

    assert!(auth_service.current_user(&expired_claims).await.unwrap().is_none());
    assert!(session_db.get_record_by_id(&expired.id.to_hex()).await.unwrap().is_none());
}
