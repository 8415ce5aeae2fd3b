use lazy_static::lazy_static;
use regex::Regex;
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{info, warn};

use crate::auth::{password, repo::User};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Registration failures shown back on the form.
#[derive(Debug, Error)]
pub enum RegisterError {
    #[error("Username already exists")]
    UsernameTaken,
    #[error("Email already registered")]
    EmailTaken,
    #[error("Please enter a valid email address")]
    InvalidEmail,
    #[error("Password must be at least 8 characters")]
    PasswordTooShort,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Login failure. One variant covers both unknown username and wrong
/// password; callers must not be able to tell which happened.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid username or password")]
    InvalidCredentials,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Create a new account. Duplicate checks run first so the form can name
/// which field collided; the UNIQUE constraints remain the backstop.
pub async fn register(
    db: &SqlitePool,
    username: &str,
    email: &str,
    password_plain: &str,
) -> Result<User, RegisterError> {
    if !is_valid_email(email) {
        return Err(RegisterError::InvalidEmail);
    }
    if password_plain.len() < 8 {
        return Err(RegisterError::PasswordTooShort);
    }
    if User::find_by_username(db, username).await?.is_some() {
        warn!(username, "registration rejected: username taken");
        return Err(RegisterError::UsernameTaken);
    }
    if User::find_by_email(db, email).await?.is_some() {
        warn!(email, "registration rejected: email taken");
        return Err(RegisterError::EmailTaken);
    }

    let hash = password::hash(password_plain)?;
    let user = User::create(db, username, email, &hash).await?;
    info!(user_id = user.id, username = %user.username, "user registered");
    Ok(user)
}

/// Verify a login attempt. Establishes no session; that is the caller's
/// next step.
pub async fn verify(
    db: &SqlitePool,
    username: &str,
    password_plain: &str,
) -> Result<User, AuthError> {
    let Some(user) = User::find_by_username(db, username).await? else {
        return Err(AuthError::InvalidCredentials);
    };
    if password::check(password_plain, &user.password_hash)? {
        Ok(user)
    } else {
        Err(AuthError::InvalidCredentials)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_db() -> SqlitePool {
        let db = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("open in-memory db");
        sqlx::migrate!("./migrations")
            .run(&db)
            .await
            .expect("migrations");
        db
    }

    #[tokio::test]
    async fn register_then_verify_roundtrip() {
        let db = test_db().await;
        let user = register(&db, "alice", "alice@example.com", "hunter2hunter2")
            .await
            .unwrap();
        let verified = verify(&db, "alice", "hunter2hunter2").await.unwrap();
        assert_eq!(verified.id, user.id);
    }

    #[tokio::test]
    async fn duplicate_username_leaves_state_unchanged() {
        let db = test_db().await;
        register(&db, "alice", "alice@example.com", "pw-one-pw-one")
            .await
            .unwrap();
        let err = register(&db, "alice", "different@example.com", "pw-two-pw-two")
            .await
            .unwrap_err();
        assert!(matches!(err, RegisterError::UsernameTaken));

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&db)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn duplicate_email_is_named_separately() {
        let db = test_db().await;
        register(&db, "alice", "alice@example.com", "pw-one-pw-one")
            .await
            .unwrap();
        let err = register(&db, "bob", "alice@example.com", "pw-two-pw-two")
            .await
            .unwrap_err();
        assert!(matches!(err, RegisterError::EmailTaken));
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_user_are_indistinguishable() {
        let db = test_db().await;
        register(&db, "alice", "alice@example.com", "right-password")
            .await
            .unwrap();

        let wrong_password = verify(&db, "alice", "wrong-password").await.unwrap_err();
        let unknown_user = verify(&db, "mallory", "whatever").await.unwrap_err();

        assert!(matches!(wrong_password, AuthError::InvalidCredentials));
        assert!(matches!(unknown_user, AuthError::InvalidCredentials));
        assert_eq!(wrong_password.to_string(), unknown_user.to_string());
    }

    #[tokio::test]
    async fn short_passwords_are_rejected_before_hashing() {
        let db = test_db().await;
        let err = register(&db, "alice", "alice@example.com", "short")
            .await
            .unwrap_err();
        assert!(matches!(err, RegisterError::PasswordTooShort));
    }

    #[test]
    fn email_shapes() {
        assert!(is_valid_email("a@b.co"));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("a b@c.de"));
    }
}
