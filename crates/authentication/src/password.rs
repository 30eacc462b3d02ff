use app_config::Argon2Config;
use app_error::{AppError, AppResult};
use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{
        PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString, rand_core::OsRng,
    },
};
use tracing::{debug, error};

/// Argon2id hashing with cost parameters taken from configuration.
#[derive(Clone)]
pub struct PasswordHasher {
    argon2: Argon2<'static>,
    // hash with the configured cost that no caller knows the password for
    decoy_hash: String,
}

impl PasswordHasher {
    pub fn new(config: &Argon2Config) -> AppResult<Self> {
        let params = Params::new(config.memory, config.iterations, config.parallelism, None)
            .map_err(|e| {
                AppError::ConfigError(anyhow::anyhow!("Invalid argon2 parameters: {}", e))
            })?;

        let mut hasher = Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
            decoy_hash: String::new(),
        };
        let decoy = SaltString::generate(&mut OsRng);
        hasher.decoy_hash = hasher.hash(decoy.as_str())?;

        Ok(hasher)
    }

    /// Hash a password, returning the PHC string to store
    pub fn hash(&self, password: &str) -> AppResult<String> {
        let salt = SaltString::generate(&mut OsRng);

        debug!("Hashing password");
        let password_hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| {
                error!("Failed to hash password: {}", e);
                AppError::ServerError(anyhow::anyhow!("Failed to hash password: {}", e))
            })?
            .to_string();

        Ok(password_hash)
    }

    /// Verify a password against a stored hash.
    ///
    /// The cost parameters are read from the hash itself, so hashes made with
    /// older settings keep verifying.
    pub fn verify(&self, password: &str, password_hash: &str) -> AppResult<bool> {
        let parsed_hash = PasswordHash::new(password_hash).map_err(|e| {
            error!("Invalid password hash: {}", e);
            AppError::ServerError(anyhow::anyhow!("Invalid password hash: {}", e))
        })?;

        let is_valid = self
            .argon2
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok();

        debug!("Password verification result: {}", is_valid);
        Ok(is_valid)
    }

    /// Spend the same work as [`verify`](Self::verify) when there is no
    /// stored hash to check, so unknown accounts answer as slowly as known ones.
    pub fn verify_decoy(&self, password: &str) -> bool {
        self.verify(password, &self.decoy_hash).unwrap_or(false)
    }
}
