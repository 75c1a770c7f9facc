use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameNameErr {
    #[error("Game name must not be empty")]
    GameNameEmpty,
    #[error("Game name must not be longer than 64 characters")]
    GameNameTooLongMoreThanSixtyFourChars,
    #[error("Game name may only contain letters, digits, spaces, '-' and '_'")]
    GameNameContainsInvalidChars,
    #[error("Game name must not start or end with whitespace")]
    GameNameStartsOrEndsWithWhitespace,
}

// Game names double as directory names below the upload root
pub fn game_name_validate(game_name: &str) -> Result<(), GameNameErr> {
    if game_name.is_empty() {
        return Err(GameNameErr::GameNameEmpty);
    }

    if game_name.chars().count() > 64 {
        return Err(GameNameErr::GameNameTooLongMoreThanSixtyFourChars);
    }

    // Allow only alphanumeric characters, '-', '_' and space
    if !game_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == ' ')
    {
        return Err(GameNameErr::GameNameContainsInvalidChars);
    }

    // Check if first or last character is a space
    if game_name.trim() != game_name {
        return Err(GameNameErr::GameNameStartsOrEndsWithWhitespace);
    }

    Ok(())
}
