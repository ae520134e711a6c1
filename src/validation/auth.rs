use garde::Validate;

use crate::error::{AppError, Result};

/// Validates a username's characters.
///
/// Length is checked by the `length` rule on the field.
pub fn validate_username(username: &str, _ctx: &()) -> garde::Result {
    if !username.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
        return Err(garde::Error::new(
            "can only contain letters, numbers, underscores, and hyphens",
        ));
    }
    Ok(())
}

/// `validate_username` for optional fields.
pub fn validate_optional_username(username: &Option<String>, ctx: &()) -> garde::Result {
    match username {
        Some(username) => validate_username(username, ctx),
        None => Ok(()),
    }
}

/// Runs the `garde` rules of a request payload.
pub fn validated<T: Validate<Context = ()>>(payload: T) -> Result<T> {
    payload
        .validate()
        .map_err(|report| AppError::InvalidArgument(report.to_string()))?;
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_charset() {
        assert!(validate_username("alice_01-x", &()).is_ok());
        assert!(validate_username("alice smith", &()).is_err());
        assert!(validate_username("alice@home", &()).is_err());
        assert!(validate_username("ålice", &()).is_err());
    }
}
