use crate::error::{AppError, Result};
use crate::models::session::SessionToken;
use rand::RngCore;
use rand::rngs::OsRng;
use base64::{Engine as _, engine::general_purpose};

/// The size of a session token in bytes, before encoding.
const SESSION_TOKEN_SIZE: usize = 32;

/// Generates a new random session token.
///
/// # Returns
///
/// A URL-safe base64-encoded token carrying 256 bits of entropy.
pub fn generate_session_token() -> Result<SessionToken> {
    let mut token = [0u8; SESSION_TOKEN_SIZE];
    OsRng
        .try_fill_bytes(&mut token)
        .map_err(|e| AppError::Internal(format!("Failed to generate session token: {}", e)))?;

    Ok(SessionToken::new(general_purpose::URL_SAFE_NO_PAD.encode(token)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn tokens_are_unique_and_url_safe() {
        let mut seen = HashSet::new();
        for _ in 0..256 {
            let token = generate_session_token().unwrap();
            assert_eq!(token.as_str().len(), 43);
            assert!(token
                .as_str()
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
            assert!(seen.insert(token));
        }
    }
}
