pub mod jwt;
pub mod password;
pub mod rate_limiter;
pub mod validation;

// Re-export key items for convenience
pub use jwt::{Claims, JwtService, bearer_token};
pub use password::PasswordHasher;
pub use rate_limiter::LoginRateLimiter;
