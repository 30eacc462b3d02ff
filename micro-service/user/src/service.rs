use app_authentication::{Claims, JwtService, LoginRateLimiter, PasswordHasher, validation};
use app_config::{PasswordConfig, SecurityConfig};
use app_database::{Database, service::DbService};
use app_error::{AppError, AppResult};
use app_models::{
    AuthResponse, LoginInput, ObjectId, Reference, RegisterInput, Session, SessionInfo, User,
    UserProfile, UserResolver,
};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Trait defining the authentication service interface
#[async_trait]
pub trait AuthServiceTrait: Send + Sync {
    /// Register a new user and open their first session
    async fn register(&self, input: RegisterInput) -> AppResult<AuthResponse>;

    /// Exchange credentials for a session token.
    ///
    /// Rejected credentials are not an error: the response carries neither a
    /// user nor a token.
    async fn login(&self, input: LoginInput) -> AppResult<AuthResponse>;

    /// End the session the claims were issued for
    async fn logout(&self, claims: &Claims) -> AppResult<bool>;

    /// `None` once the session is gone or the user was removed
    async fn current_user(&self, claims: &Claims) -> AppResult<Option<UserProfile>>;

    /// Live sessions of the caller, newest first
    async fn sessions(&self, claims: &Claims) -> AppResult<Vec<SessionInfo>>;

    fn get_jwt_service(&self) -> Arc<JwtService>;
}

/// Validation container to reduce boilerplate
#[derive(Debug)]
struct ValidationInput {
    name: String,
    username: String,
    email: String,
    password: String,
}

impl ValidationInput {
    fn from_register_input(input: RegisterInput) -> Self {
        Self {
            name: validation::sanitize_string(&input.name),
            username: validation::sanitize_string(&input.username),
            email: validation::sanitize_string(&input.email).to_lowercase(),
            // Don't trim passwords, spaces can be meaningful
            password: input.password,
        }
    }

    fn from_login_input(input: LoginInput) -> Self {
        Self {
            name: String::new(),
            username: validation::sanitize_string(&input.username),
            email: String::new(),
            password: input.password,
        }
    }

    fn validate_registration(&self, rules: &PasswordConfig) -> AppResult<()> {
        validation::validate_name(&self.name)?;
        validation::validate_username(&self.username)?;
        validation::validate_email(&self.email)?;
        validation::validate_password(&self.password, rules)?;
        Ok(())
    }

    fn validate_login(&self) -> AppResult<()> {
        if self.username.is_empty() {
            return Err(AppError::validation("username", "Username cannot be empty"));
        }

        if self.password.is_empty() {
            return Err(AppError::validation("password", "Password cannot be empty"));
        }

        Ok(())
    }
}

/// Implementation of the authentication service
pub struct AuthService {
    jwt_service: Arc<JwtService>,
    hasher: PasswordHasher,
    password_rules: PasswordConfig,
    rate_limiter: Option<Arc<LoginRateLimiter>>,
    user_db: Arc<DbService<User>>,
    session_db: Arc<DbService<Session>>,
}

impl AuthService {
    pub fn new(db: Arc<Database>, security: &SecurityConfig) -> AppResult<Self> {
        Ok(Self {
            jwt_service: Arc::new(JwtService::new(
                security.jwt.secret.as_bytes(),
                security.jwt.expiry_hours,
            )?),
            hasher: PasswordHasher::new(&security.password.argon2)?,
            password_rules: security.password.clone(),
            rate_limiter: None,
            user_db: Arc::new(DbService::for_entity(Arc::clone(&db))),
            session_db: Arc::new(DbService::for_entity(db)),
        })
    }

    /// Add rate limiter to the authentication service
    pub fn with_rate_limiter(mut self, rate_limiter: Arc<LoginRateLimiter>) -> Self {
        self.rate_limiter = Some(rate_limiter);
        self
    }

    /// Resolver for the `user` links held by sessions
    pub fn user_resolver(&self) -> UserResolver {
        Arc::clone(&self.user_db) as UserResolver
    }

    async fn check_user_exists(&self, username: &str, email: &str) -> AppResult<()> {
        let existing_users = self
            .user_db
            .get_records_by_field("username", username.to_string())
            .await?;

        if !existing_users.is_empty() {
            return app_error::resource_exists_error!("User", "username", username);
        }

        let existing_emails = self
            .user_db
            .get_records_by_field("email", email.to_string())
            .await?;

        if !existing_emails.is_empty() {
            return app_error::resource_exists_error!("User", "email", email);
        }

        Ok(())
    }

    async fn find_by_username(&self, username: &str) -> AppResult<Option<User>> {
        let users = self
            .user_db
            .get_records_by_field("username", username.to_string())
            .await?;

        Ok(users.into_iter().next())
    }

    async fn record_failed_attempt(&self, username: &str) {
        if let Some(rate_limiter) = &self.rate_limiter {
            rate_limiter.record_failed_attempt(username).await;
        }
    }

    // Store a new session for `user` and sign a token bound to it
    async fn open_session(&self, user: &User) -> AppResult<AuthResponse> {
        let session = Session::open(
            Reference::resolved(user.clone()),
            self.jwt_service.expiry(),
        );
        self.session_db.insert(session.clone()).await?;

        let token = self.jwt_service.generate_token(
            &user.id.to_hex(),
            &user.username,
            &session.id.to_hex(),
        )?;

        debug!(user = %user.id, session = %session.id, "Opened session");
        Ok(AuthResponse::authenticated(UserProfile::from(user), token))
    }

    /// The session named by `claims`, if it still exists, has not expired
    /// and belongs to the token's subject.
    async fn live_session(&self, claims: &Claims) -> AppResult<Option<Session>> {
        let (Ok(session_id), Ok(user_id)) = (
            ObjectId::parse_str(&claims.sid),
            ObjectId::parse_str(&claims.sub),
        ) else {
            warn!(username = %claims.username, "Token carries malformed identifiers");
            return Ok(None);
        };

        let Some(session) = self.session_db.get_record_by_id(&session_id.to_hex()).await? else {
            return Ok(None);
        };

        if !session.user.points_to(&user_id) {
            warn!(username = %claims.username, session = %session.id, "Token names a session of another user");
            return Ok(None);
        }

        if session.is_expired(Utc::now()) {
            self.remove_expired(vec![session]).await;
            return Ok(None);
        }

        Ok(Some(session))
    }

    // Expired sessions are dropped as they are found
    async fn remove_expired(&self, sessions: Vec<Session>) {
        for session in sessions {
            match self.session_db.delete_record(&session.id.to_hex()).await {
                Ok(_) => debug!(session = %session.id, "Removed expired session"),
                Err(e) => warn!(session = %session.id, "Failed to remove expired session: {}", e),
            }
        }
    }
}

#[async_trait]
impl AuthServiceTrait for AuthService {
    fn get_jwt_service(&self) -> Arc<JwtService> {
        Arc::clone(&self.jwt_service)
    }

    async fn register(&self, input: RegisterInput) -> AppResult<AuthResponse> {
        let input = ValidationInput::from_register_input(input);
        input.validate_registration(&self.password_rules)?;

        self.check_user_exists(&input.username, &input.email).await?;

        let hashed_password = self.hasher.hash(&input.password)?;
        let user = User::new(input.name, input.username, input.email, hashed_password);

        info!("Storing new user in database: {}", user.username);
        let stored_user = match self.user_db.insert(user.clone()).await {
            Ok(stored) => stored.unwrap_or(user),
            Err(e) => {
                // a concurrent registration may have claimed the name first
                warn!(username = %user.username, "Storing user failed: {}", e);
                self.check_user_exists(&user.username, &user.email).await?;
                return Err(e);
            }
        };

        self.open_session(&stored_user).await
    }

    async fn login(&self, input: LoginInput) -> AppResult<AuthResponse> {
        let input = ValidationInput::from_login_input(input);
        input.validate_login()?;

        if let Some(rate_limiter) = &self.rate_limiter {
            rate_limiter.check_rate_limit(&input.username).await?;
        }

        let Some(user) = self.find_by_username(&input.username).await? else {
            info!(username = %input.username, "Login rejected: unknown username");
            self.hasher.verify_decoy(&input.password);
            self.record_failed_attempt(&input.username).await;
            return Ok(AuthResponse::empty());
        };

        if !self.hasher.verify(&input.password, &user.password)? {
            info!(username = %input.username, "Login rejected: wrong password");
            self.record_failed_attempt(&input.username).await;
            return Ok(AuthResponse::empty());
        }

        if let Some(rate_limiter) = &self.rate_limiter {
            rate_limiter.record_successful_attempt(&input.username).await;
        }

        self.open_session(&user).await
    }

    async fn logout(&self, claims: &Claims) -> AppResult<bool> {
        let Some(session) = self.live_session(claims).await? else {
            return Ok(false);
        };

        let deleted = self.session_db.delete_record(&session.id.to_hex()).await?;
        info!(username = %claims.username, session = %session.id, "Session closed");

        Ok(deleted.is_some())
    }

    async fn current_user(&self, claims: &Claims) -> AppResult<Option<UserProfile>> {
        let Some(session) = self.live_session(claims).await? else {
            return Ok(None);
        };

        let user = session.user.try_resolve(self.user_db.as_ref()).await?;
        Ok(user.map(UserProfile::from))
    }

    async fn sessions(&self, claims: &Claims) -> AppResult<Vec<SessionInfo>> {
        let Some(current) = self.live_session(claims).await? else {
            return Err(AppError::authentication_required());
        };

        let now = Utc::now();
        let (expired, mut sessions): (Vec<Session>, Vec<Session>) = self
            .session_db
            .get_records_by_field("user", current.user.id().to_hex())
            .await?
            .into_iter()
            .partition(|session| session.is_expired(now));

        self.remove_expired(expired).await;

        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sessions.into_iter().map(SessionInfo::from).collect())
    }
}
