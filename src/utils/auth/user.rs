use sea_orm::entity::*;
use sea_orm::{DatabaseConnection, SqlErr};
use tracing::debug;

use crate::lobby_errors::LobbyErr;
use crate::orm::model::account;
use crate::store::{Account, Role};

// Hashing
use crate::utils::auth::hashing::{plain_string_to_hash, verify_plain_string_for_hash};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserAuthErr {
    UserNotFound,
    InvalidPassword,
    UnknownRole(String),
}

/// Returns `false` when the username is taken.
pub async fn register_new_user(
    username: &str,
    plain_password: &str,
    role: Role,
    db: &DatabaseConnection,
) -> Result<bool, LobbyErr> {
    if account::Entity::find_by_id(username.to_string())
        .one(db)
        .await?
        .is_some()
    {
        return Ok(false);
    }

    // Hash the password
    let hashed_password = plain_string_to_hash(plain_password)?;

    let db_account = account::ActiveModel {
        username: Set(username.to_string()),
        password_hashed: Set(hashed_password),
        role: Set(role.as_str().to_string()),
        created_at: Set(chrono::Utc::now()),
    };

    match db_account.insert(db).await {
        Ok(_) => Ok(true),
        // Lost a race against a concurrent registration of the same name
        Err(err) if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => Ok(false),
        Err(err) => Err(err.into()),
    }
}

pub async fn validate_credentials(
    username: &str,
    plain_password: &str,
    db: &DatabaseConnection,
) -> Result<Result<Account, UserAuthErr>, LobbyErr> {
    // Check if the user exists
    let Some(db_user) = account::Entity::find_by_id(username.to_string())
        .one(db)
        .await?
    else {
        return Ok(Err(UserAuthErr::UserNotFound));
    };

    // Verify password (hashes)
    if !verify_plain_string_for_hash(plain_password, &db_user.password_hashed) {
        return Ok(Err(UserAuthErr::InvalidPassword));
    }

    let role = match db_user.role.parse::<Role>() {
        Ok(role) => role,
        Err(_) => {
            debug!(target: "auth", "Account {} has unknown role {:?}", username, db_user.role);
            return Ok(Err(UserAuthErr::UnknownRole(db_user.role)));
        }
    };

    Ok(Ok(Account {
        username: db_user.username,
        role,
    }))
}
