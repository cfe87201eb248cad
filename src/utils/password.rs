use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use crate::error::ErrorMessage;

/// Upper bound on password length; argon2 cost grows with input size.
const MAX_PASSWORD_LENGTH: usize = 64;

fn check_length(password: &str) -> Result<(), ErrorMessage> {
    if password.is_empty() {
        return Err(ErrorMessage::EmptyPassword);
    }
    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(ErrorMessage::ExceededMaxPasswordLength(MAX_PASSWORD_LENGTH));
    }
    Ok(())
}

/// Hash a password with Argon2id and a fresh random salt.
///
/// The result is a PHC string (`$argon2id$v=19$...`) that embeds the salt
/// and parameters, so it is the only thing stored for the user.
pub fn hash(password: impl Into<String>) -> Result<String, ErrorMessage> {
    let password = password.into();
    check_length(&password)?;

    let salt = SaltString::generate(&mut OsRng);
    let hashed_password = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|_| ErrorMessage::HashingError)?
        .to_string();

    Ok(hashed_password)
}

/// Check `password` against a stored PHC hash.
///
/// `Ok(false)` means a well-formed hash that does not match.
pub fn compare(password: &str, hashed_password: &str) -> Result<bool, ErrorMessage> {
    check_length(password)?;

    let parsed_hash =
        PasswordHash::new(hashed_password).map_err(|_| ErrorMessage::InvalidHashFormat)?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_compare() {
        let hashed = hash("correct horse").unwrap();
        assert!(hashed.starts_with("$argon2id$"));
        assert!(compare("correct horse", &hashed).unwrap());
        assert!(!compare("wrong horse", &hashed).unwrap());
    }

    #[test]
    fn same_password_hashes_differently() {
        assert_ne!(hash("password1").unwrap(), hash("password1").unwrap());
    }

    #[test]
    fn length_limits() {
        assert_eq!(hash(""), Err(ErrorMessage::EmptyPassword));
        assert_eq!(
            hash("x".repeat(MAX_PASSWORD_LENGTH + 1)),
            Err(ErrorMessage::ExceededMaxPasswordLength(MAX_PASSWORD_LENGTH))
        );
        assert_eq!(
            compare("secret", "not-a-phc-string"),
            Err(ErrorMessage::InvalidHashFormat)
        );
    }
}
