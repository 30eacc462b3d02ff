use serde::{Deserialize, Serialize};
use std::{fs, path::Path};
use tracing::{debug, info, warn};

use app_error::{AppError, AppErrorExt, AppResult};

/// Environment variable naming a JSON file that replaces the embedded configuration
pub const CONFIG_PATH_ENV: &str = "APP_CONFIG_PATH";

const EMBEDDED_CONFIG: &str = include_str!("../res/app-config.json");

/// Complete application configuration loaded from JSON
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub environment: String,
    pub database: DocumentDbConfig,
    pub server: ServerConfig,
    pub security: SecurityConfig,
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DocumentDbConfig {
    pub endpoint: String,
    pub username: String,
    pub password: String,
    pub namespace: String,
    pub database: String,
    pub pool: DbPoolConfig,
}

impl DocumentDbConfig {
    /// In-process stores need no credentials and no TLS
    pub fn is_embedded(&self) -> bool {
        self.endpoint.starts_with("mem://") || self.endpoint == "memory"
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DbPoolConfig {
    pub size: usize,
    /// Milliseconds
    pub connection_timeout: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Seconds
    pub request_timeout: u64,
    pub body_limit: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SecurityConfig {
    pub jwt: JwtConfig,
    pub cors: CorsConfig,
    pub rate_limiting: RateLimitingConfig,
    pub password: PasswordConfig,
}

/// Tokens and sessions live at most a year.
pub const MAX_JWT_EXPIRY_HOURS: u64 = 24 * 365;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub expiry_hours: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allowed_methods: Vec<String>,
    pub allowed_headers: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RateLimitingConfig {
    pub login: RateLimitSettings,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RateLimitSettings {
    pub max_attempts: usize,
    /// Seconds
    pub window_duration: u64,
    /// Seconds; `None` means the window alone throttles
    pub block_duration: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PasswordConfig {
    pub min_length: usize,
    pub require_uppercase: bool,
    pub require_lowercase: bool,
    pub require_number: bool,
    pub require_special: bool,
    pub argon2: Argon2Config,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Argon2Config {
    /// KiB
    pub memory: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MonitoringConfig {
    pub sentry: SentryConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SentryConfig {
    pub dsn: String,
    pub sample_rate: f32,
    pub traces_sample_rate: f32,
    pub environment: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl AppConfig {
    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).config_err()?;
        let config: AppConfig = serde_json::from_str(&content).config_err()?;
        debug!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load the configuration named by `APP_CONFIG_PATH` (a `.env` file is
    /// honoured), falling back to the embedded `res/app-config.json`.
    pub fn load() -> AppResult<Self> {
        dotenv::dotenv().ok();

        let config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => {
                info!("Loading configuration from {}", path);
                Self::from_file(&path)?
            }
            Err(_) => match serde_json::from_str::<AppConfig>(EMBEDDED_CONFIG) {
                Ok(conf) => {
                    info!("Loaded embedded configuration for: {}", conf.environment);
                    conf
                }
                Err(e) => {
                    warn!(
                        "Failed to parse embedded config: {}. Using default configuration.",
                        e
                    );
                    Self::default()
                }
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Validate the configuration, reporting every problem at once
    pub fn validate(&self) -> AppResult<()> {
        let mut errors = Vec::new();
        let is_production = self.is_production();

        self.validate_database_config(is_production, &mut errors);

        if self.server.host.trim().is_empty() {
            errors.push("Server host cannot be empty".to_string());
        }

        if self.server.port == 0 {
            errors.push("Server port cannot be 0".to_string());
        }

        if self.server.body_limit == 0 {
            errors.push("Server body limit must be greater than 0".to_string());
        }

        if self.security.jwt.expiry_hours == 0 {
            errors.push("JWT expiry must be at least one hour".to_string());
        } else if self.security.jwt.expiry_hours > MAX_JWT_EXPIRY_HOURS {
            errors.push(format!(
                "JWT expiry cannot exceed {} hours",
                MAX_JWT_EXPIRY_HOURS
            ));
        }

        if is_production
            && (self.security.jwt.secret.len() < 32
                || self.security.jwt.secret == Self::default().security.jwt.secret)
        {
            errors.push("JWT secret is not secure for production use".to_string());
        }

        if self.security.rate_limiting.login.max_attempts == 0 {
            errors.push("Login rate limit must allow at least one attempt".to_string());
        }

        let argon2 = &self.security.password.argon2;
        if argon2.iterations == 0 || argon2.parallelism == 0 {
            errors.push("Argon2 iterations and parallelism must be greater than 0".to_string());
        }

        if is_production && self.monitoring.sentry.dsn.trim().is_empty() {
            errors.push("Sentry DSN should be configured in production".to_string());
        }

        if !errors.is_empty() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "Invalid configuration: {}",
                errors.join(", ")
            )));
        }
        Ok(())
    }

    fn validate_database_config(&self, is_production: bool, errors: &mut Vec<String>) {
        let db_config = &self.database;

        if db_config.endpoint.trim().is_empty() {
            errors.push("database endpoint cannot be empty".to_string());
        } else if is_production && !db_config.endpoint.starts_with("wss://") && !db_config.is_embedded() {
            errors.push("database should use a secure 'wss://' connection in production".to_string());
        }

        if db_config.namespace.trim().is_empty() {
            errors.push("database namespace cannot be empty".to_string());
        }

        if db_config.database.trim().is_empty() {
            errors.push("database name cannot be empty".to_string());
        }

        if db_config.pool.size == 0 {
            errors.push("database pool size must be greater than 0".to_string());
        }

        if is_production {
            if db_config.username == "root" {
                errors.push("Using default 'root' database username in production is insecure".to_string());
            }

            if db_config.password == "root" {
                errors.push("Using default 'root' database password in production is insecure".to_string());
            }
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            database: DocumentDbConfig {
                endpoint: "mem://".to_string(),
                username: "root".to_string(),
                password: "root".to_string(),
                namespace: "userDb".to_string(),
                database: "accounts".to_string(),
                pool: DbPoolConfig {
                    size: 5,
                    connection_timeout: 5000,
                },
            },
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
                request_timeout: 30,
                body_limit: 1048576, // 1MB
            },
            security: SecurityConfig {
                jwt: JwtConfig {
                    secret: "default-insecure-jwt-secret-do-not-use-in-production".to_string(),
                    expiry_hours: 24,
                },
                cors: CorsConfig {
                    allowed_origins: vec!["*".to_string()],
                    allowed_methods: vec![
                        "GET".to_string(),
                        "POST".to_string(),
                        "OPTIONS".to_string(),
                    ],
                    allowed_headers: vec!["Content-Type".to_string(), "Authorization".to_string()],
                },
                rate_limiting: RateLimitingConfig {
                    login: RateLimitSettings {
                        max_attempts: 5,
                        window_duration: 300,
                        block_duration: Some(900),
                    },
                },
                password: PasswordConfig {
                    min_length: 8,
                    require_uppercase: true,
                    require_lowercase: true,
                    require_number: true,
                    require_special: true,
                    argon2: Argon2Config {
                        memory: 19456,
                        iterations: 2,
                        parallelism: 1,
                    },
                },
            },
            monitoring: MonitoringConfig {
                sentry: SentryConfig {
                    dsn: "".to_string(),
                    sample_rate: 1.0,
                    traces_sample_rate: 0.2,
                    environment: "development".to_string(),
                },
                logging: LoggingConfig {
                    level: "info".to_string(),
                    format: "pretty".to_string(),
                },
            },
        }
    }
}
