use crate::error::{AppError, Result};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// The size of a password salt in bytes.
pub const SALT_LEN: usize = 32;
/// The size of a password digest in bytes.
pub const DIGEST_LEN: usize = 32;

/// Generates a random salt from the operating system's entropy source.
///
/// # Returns
///
/// A `Result` containing `SALT_LEN` random bytes. Fails only when the OS
/// cannot provide entropy.
pub fn generate_salt() -> Result<Vec<u8>> {
    let mut salt = vec![0u8; SALT_LEN];
    OsRng
        .try_fill_bytes(&mut salt)
        .map_err(|e| AppError::Internal(format!("Failed to generate salt: {}", e)))?;
    Ok(salt)
}

/// Hashes a password with a salt.
///
/// The digest is SHA-256 over the password bytes followed by the salt, so the
/// same `(password, salt)` pair always produces the same digest.
pub fn hash_password(password: &str, salt: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hasher.update(salt);
    hasher.finalize().to_vec()
}

/// Checks a password against a stored digest in constant time.
pub fn verify_password(password: &str, salt: &[u8], expected: &[u8]) -> bool {
    let candidate = hash_password(password, salt);
    candidate.ct_eq(expected).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn salts_have_fixed_length_and_differ() {
        let a = generate_salt().unwrap();
        let b = generate_salt().unwrap();
        assert_eq!(a.len(), SALT_LEN);
        assert_eq!(b.len(), SALT_LEN);
        assert_ne!(a, b);
    }

    #[test]
    fn hashing_is_deterministic() {
        let salt = generate_salt().unwrap();
        let first = hash_password("correct-horse-battery-staple", &salt);
        let second = hash_password("correct-horse-battery-staple", &salt);
        assert_eq!(first, second);
        assert_eq!(first.len(), DIGEST_LEN);
    }

    #[test]
    fn different_passwords_produce_different_digests() {
        let salt = generate_salt().unwrap();
        let passwords = ["password1", "password2", "Password1", "password1 ", ""];
        for (i, p1) in passwords.iter().enumerate() {
            for (j, p2) in passwords.iter().enumerate() {
                let equal = hash_password(p1, &salt) == hash_password(p2, &salt);
                assert_eq!(equal, i == j, "{:?} vs {:?}", p1, p2);
            }
        }
    }

    #[test]
    fn salt_changes_the_digest() {
        let a = hash_password("same-password", &generate_salt().unwrap());
        let b = hash_password("same-password", &generate_salt().unwrap());
        assert_ne!(a, b);
    }

    #[test]
    fn verify_accepts_only_the_right_password() {
        let salt = generate_salt().unwrap();
        let digest = hash_password("s3cret-pass", &salt);
        assert!(verify_password("s3cret-pass", &salt, &digest));
        assert!(!verify_password("s3cret-pasS", &salt, &digest));
        assert!(!verify_password("s3cret-pass", &salt, &digest[..16]));
    }
}
