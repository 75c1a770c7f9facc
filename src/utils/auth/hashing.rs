use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;

use crate::lobby_errors::LobbyErr;

// String hashing (mostly for passwords), PHC string format
pub fn plain_string_to_hash(plain_password: &str) -> Result<String, LobbyErr> {
    let config = Argon2::default();
    let salt = SaltString::generate(&mut OsRng);
    let hash = config
        .hash_password(plain_password.as_bytes(), &salt)
        .map_err(|err| LobbyErr::Internal(format!("password hashing failed: {}", err)))?;
    Ok(hash.to_string())
}

// A malformed stored hash never verifies
pub fn verify_plain_string_for_hash(password: &str, hashdata: &str) -> bool {
    let Ok(parsed_hash) = PasswordHash::new(hashdata) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_verifies_only_the_original_password() {
        let hash = plain_string_to_hash("pw").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_plain_string_for_hash("pw", &hash));
        assert!(!verify_plain_string_for_hash("pw2", &hash));
        assert!(!verify_plain_string_for_hash("pw", "not-a-hash"));
    }
}
