use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UsernameErr {
    #[error("Username must be at least 3 characters long")]
    UsernameTooShortLessThanThreeChars,
    #[error("Username must not be longer than 32 characters")]
    UsernameTooLongMoreThanThirtyTwoChars,
    #[error("Username may only contain letters, digits, '.', '-' and '_'")]
    UsernameContainsInvalidChars,
}

pub fn username_validate(username: &str) -> Result<(), UsernameErr> {
    let n_chars = username.chars().count();
    if n_chars < 3 {
        return Err(UsernameErr::UsernameTooShortLessThanThreeChars);
    }

    if n_chars > 32 {
        return Err(UsernameErr::UsernameTooLongMoreThanThirtyTwoChars);
    }

    // Usernames end up in download paths, keep them filesystem friendly
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
    {
        return Err(UsernameErr::UsernameContainsInvalidChars);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_names() {
        assert!(username_validate("alice").is_ok());
        assert!(username_validate("bob").is_ok());
        assert!(username_validate("dev_01.x-y").is_ok());
    }

    #[test]
    fn rejects_short_long_and_odd_names() {
        assert_eq!(
            username_validate("al"),
            Err(UsernameErr::UsernameTooShortLessThanThreeChars)
        );
        assert_eq!(
            username_validate(&"a".repeat(33)),
            Err(UsernameErr::UsernameTooLongMoreThanThirtyTwoChars)
        );
        assert_eq!(
            username_validate("../etc"),
            Err(UsernameErr::UsernameContainsInvalidChars)
        );
    }
}
