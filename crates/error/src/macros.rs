/// Simplifies creating validation errors
///
/// # Example
/// ```ignore
/// validation_error!("username", "Username must be at least 3 characters long")
/// ```
#[macro_export]
macro_rules! validation_error {
    ($field:expr, $message:expr) => {
        Err($crate::AppError::validation($field, $message))
    };
}

/// Simplifies creating not found errors
///
/// # Example
/// ```ignore
/// not_found_error!("users", user_id)
/// ```
#[macro_export]
macro_rules! not_found_error {
    ($resource_type:expr, $identifier:expr) => {
        Err($crate::AppError::resource_not_found(
            $resource_type,
            &$identifier.to_string(),
        ))
    };
}

/// Simplifies creating resource exists errors
///
/// # Example
/// ```ignore
/// resource_exists_error!("User", "username", username)
/// ```
#[macro_export]
macro_rules! resource_exists_error {
    ($resource_type:expr, $field:expr, $value:expr) => {
        Err($crate::AppError::ResourceExistsError(format!(
            "{} with {} '{}' already exists.",
            $resource_type, $field, $value
        )))
    };
}
