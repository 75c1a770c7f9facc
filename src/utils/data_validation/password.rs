use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PasswordErr {
    #[error("Password must not be empty")]
    PasswordEmpty,
    #[error("Password must not be longer than 64 characters")]
    PasswordTooLongMoreThanSixtyFourChars,
}

// Check password just for length
pub fn password_validate(password: &str) -> Result<(), PasswordErr> {
    if password.is_empty() {
        return Err(PasswordErr::PasswordEmpty);
    }

    if password.chars().count() > 64 {
        return Err(PasswordErr::PasswordTooLongMoreThanSixtyFourChars);
    }

    Ok(())
}
