use app_config::PasswordConfig;
use app_error::{AppError, AppResult};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^([a-z0-9_+]([a-z0-9_+.]*[a-z0-9_+])?)@([a-z0-9]+([\-\.]{1}[a-z0-9]+)*\.[a-z]{2,6})$"
    ).unwrap();

    // Alphanumeric characters, underscores, and hyphens, 3-30 characters
    static ref USERNAME_REGEX: Regex = Regex::new(r"^[a-zA-Z0-9_-]{3,30}$").unwrap();
}

const SPECIAL_CHARACTERS: &str = "@$!%*?&#^-_+=.,:;";

pub fn validate_username(username: &str) -> AppResult<()> {
    if username.trim().is_empty() {
        return Err(AppError::validation("username", "Username cannot be empty"));
    }

    if !USERNAME_REGEX.is_match(username) {
        return Err(AppError::validation(
            "username",
            "Username must be 3-30 characters long and can only contain letters, numbers, underscores, and hyphens",
        ));
    }

    Ok(())
}

/// Emails are matched in lower case; callers store the lowered form.
pub fn validate_email(email: &str) -> AppResult<()> {
    if email.trim().is_empty() {
        return Err(AppError::validation("email", "Email cannot be empty"));
    }

    if !EMAIL_REGEX.is_match(&email.to_lowercase()) {
        return Err(AppError::validation("email", "Invalid email format"));
    }

    Ok(())
}

pub fn validate_name(name: &str) -> AppResult<()> {
    let length = name.trim().chars().count();

    if length == 0 {
        return Err(AppError::validation("name", "Name cannot be empty"));
    }

    if length < 2 {
        return Err(AppError::validation(
            "name",
            "Name must be at least 2 characters long",
        ));
    }

    if length > 100 {
        return Err(AppError::validation(
            "name",
            "Name cannot exceed 100 characters",
        ));
    }

    Ok(())
}

/// Validates password against configured requirements
pub fn validate_password(password: &str, rules: &PasswordConfig) -> AppResult<()> {
    if password.trim().is_empty() {
        return Err(AppError::validation("password", "Password cannot be empty"));
    }

    if password.chars().count() < rules.min_length {
        return Err(AppError::validation(
            "password",
            &format!("Password must be at least {} characters long", rules.min_length),
        ));
    }

    let has_lowercase = password.chars().any(|c| c.is_ascii_lowercase());
    let has_uppercase = password.chars().any(|c| c.is_ascii_uppercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_special = password.chars().any(|c| SPECIAL_CHARACTERS.contains(c));

    let mut missing = Vec::new();

    if rules.require_lowercase && !has_lowercase {
        missing.push("lowercase letter".to_string());
    }

    if rules.require_uppercase && !has_uppercase {
        missing.push("uppercase letter".to_string());
    }

    if rules.require_number && !has_digit {
        missing.push("number".to_string());
    }

    if rules.require_special && !has_special {
        missing.push(format!("special character ({})", SPECIAL_CHARACTERS));
    }

    if !missing.is_empty() {
        return Err(AppError::validation(
            "password",
            &format!("Password must contain at least one {}", missing.join(", one ")),
        ));
    }

    Ok(())
}

/// Sanitizes a string input by trimming whitespace
pub fn sanitize_string(input: &str) -> String {
    input.trim().to_string()
}
