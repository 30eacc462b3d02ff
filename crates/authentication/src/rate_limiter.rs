use app_config::RateLimitSettings;
use app_error::{AppError, AppResult};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

#[derive(Debug)]
struct LoginAttempt {
    attempts: usize,
    first_attempt: Instant,
    last_attempt: Instant,
}

/// In-memory throttle for failed logins, keyed by username.
#[derive(Debug, Clone)]
pub struct LoginRateLimiter {
    attempts: Arc<RwLock<HashMap<String, LoginAttempt>>>,
    max_attempts: usize,
    window_duration: Duration,
    lockout_duration: Duration,
}

impl LoginRateLimiter {
    pub fn new(max_attempts: usize, window_duration: Duration, lockout_duration: Duration) -> Self {
        Self {
            attempts: Arc::new(RwLock::new(HashMap::new())),
            max_attempts,
            window_duration,
            lockout_duration,
        }
    }

    /// Without a configured block duration a locked identifier waits out one window.
    pub fn from_settings(settings: &RateLimitSettings) -> Self {
        let window = Duration::from_secs(settings.window_duration);
        let lockout = settings
            .block_duration
            .map(Duration::from_secs)
            .unwrap_or(window);

        Self::new(settings.max_attempts, window, lockout)
    }

    /// Check if a user can make a login attempt
    pub async fn check_rate_limit(&self, identifier: &str) -> AppResult<()> {
        let mut attempts = self.attempts.write().await;
        let now = Instant::now();

        self.cleanup(&mut attempts, now);

        if let Some(attempt) = attempts.get(identifier) {
            if attempt.attempts >= self.max_attempts {
                let elapsed_since_last = now.duration_since(attempt.last_attempt);

                if elapsed_since_last < self.lockout_duration {
                    let remaining = self.lockout_duration - elapsed_since_last;
                    tracing::warn!(identifier, attempts = attempt.attempts, "Login locked out");
                    // round up so a locked caller is never told to retry in 0 seconds
                    return Err(AppError::account_locked(remaining.as_secs().max(1)));
                }

                attempts.remove(identifier);
            }
        }

        Ok(())
    }

    pub async fn record_failed_attempt(&self, identifier: &str) {
        let mut attempts = self.attempts.write().await;
        let now = Instant::now();

        let attempt = attempts
            .entry(identifier.to_string())
            .or_insert(LoginAttempt {
                attempts: 0,
                first_attempt: now,
                last_attempt: now,
            });
        attempt.attempts += 1;
        attempt.last_attempt = now;

        tracing::debug!(identifier, attempts = attempt.attempts, "Recorded failed login");
    }

    pub async fn record_successful_attempt(&self, identifier: &str) {
        let mut attempts = self.attempts.write().await;
        attempts.remove(identifier);
    }

    fn cleanup(&self, attempts: &mut HashMap<String, LoginAttempt>, now: Instant) {
        attempts.retain(|_, attempt| {
            // Keep entry if it's within the window or lockout period
            let elapsed = now.duration_since(attempt.first_attempt);
            elapsed < self.window_duration
                || (attempt.attempts >= self.max_attempts
                    && now.duration_since(attempt.last_attempt) < self.lockout_duration)
        });
    }
}

impl Default for LoginRateLimiter {
    // 5 attempts within 5 minutes, 15 minute lockout
    fn default() -> Self {
        Self::new(5, Duration::from_secs(5 * 60), Duration::from_secs(15 * 60))
    }
}
