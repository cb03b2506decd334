//! User service
//!
//! Registration, login/logout and session lookup. Sessions are opaque UUID
//! tokens stored in the database and carried in the `session` cookie.

use crate::db::repositories::{SessionRepository, UserRepository};
use crate::models::{Session, User};
use crate::services::forms::{FormErrors, LoginForm, SignupForm, NON_FIELD_ERRORS};
use crate::services::password::{hash_password, verify_password};
use anyhow::Context;
use std::sync::Arc;

/// Default session lifetime in days
const DEFAULT_SESSION_DAYS: i64 = 7;

/// Error types for user service operations
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    /// Form input rejected, including taken usernames and bad credentials
    #[error("Validation error: {0}")]
    Validation(FormErrors),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// User service for accounts and sessions
pub struct UserService {
    users: Arc<dyn UserRepository>,
    sessions: Arc<dyn SessionRepository>,
    session_days: i64,
}

impl UserService {
    pub fn new(users: Arc<dyn UserRepository>, sessions: Arc<dyn SessionRepository>) -> Self {
        Self::with_session_days(users, sessions, DEFAULT_SESSION_DAYS)
    }

    /// Create a user service whose sessions last `session_days`
    pub fn with_session_days(
        users: Arc<dyn UserRepository>,
        sessions: Arc<dyn SessionRepository>,
        session_days: i64,
    ) -> Self {
        Self {
            users,
            sessions,
            session_days,
        }
    }

    /// Register a new account.
    ///
    /// # Errors
    /// - `Validation` for malformed input or a username already in use
    pub async fn register(&self, form: &SignupForm) -> Result<User, UserServiceError> {
        let valid = form.validate().map_err(UserServiceError::Validation)?;

        if self
            .users
            .get_by_username(&valid.username)
            .await
            .context("Failed to check username")?
            .is_some()
        {
            return Err(UserServiceError::Validation(FormErrors::single(
                "username",
                "A user with that username already exists.",
            )));
        }

        let password_hash = hash_password(&valid.password).context("Failed to hash password")?;
        let user = self
            .users
            .create(&User::new(valid.username, password_hash))
            .await
            .context("Failed to create user")?;

        tracing::info!("User registered: {}", user.username);
        Ok(user)
    }

    /// Check credentials and open a session.
    ///
    /// Unknown usernames and wrong passwords produce the same message.
    pub async fn login(&self, form: &LoginForm) -> Result<(User, Session), UserServiceError> {
        let (username, password) = form.validate().map_err(UserServiceError::Validation)?;

        let invalid = || {
            UserServiceError::Validation(FormErrors::single(
                NON_FIELD_ERRORS,
                "Please enter a correct username and password.",
            ))
        };

        let user = self
            .users
            .get_by_username(&username)
            .await
            .context("Failed to get user")?
            .ok_or_else(invalid)?;

        let valid = verify_password(&password, &user.password_hash).context("Failed to verify password")?;
        if !valid {
            tracing::debug!("Rejected login for {}", username);
            return Err(invalid());
        }

        let session = self.create_session(user.id).await?;
        tracing::info!("User logged in: {}", user.username);
        Ok((user, session))
    }

    /// Start a session for `user_id`
    pub async fn create_session(&self, user_id: i64) -> Result<Session, UserServiceError> {
        let session = self
            .sessions
            .create(&Session::new(user_id, self.session_days))
            .await
            .context("Failed to create session")?;
        Ok(session)
    }

    /// End a session. Unknown tokens are ignored.
    pub async fn logout(&self, token: &str) -> Result<(), UserServiceError> {
        self.sessions
            .delete(token)
            .await
            .context("Failed to delete session")?;
        Ok(())
    }

    /// User owning a live session, or `None` for unknown and expired tokens
    pub async fn validate_session(&self, token: &str) -> Result<Option<User>, UserServiceError> {
        let session = match self
            .sessions
            .get_by_id(token)
            .await
            .context("Failed to get session")?
        {
            Some(s) => s,
            None => return Ok(None),
        };

        if session.is_expired() {
            self.sessions
                .delete(token)
                .await
                .context("Failed to delete expired session")?;
            return Ok(None);
        }

        let user = self
            .users
            .get_by_id(session.user_id)
            .await
            .context("Failed to get user")?;
        Ok(user)
    }

    /// Delete all expired sessions, returning how many were removed
    pub async fn cleanup_expired_sessions(&self) -> Result<i64, UserServiceError> {
        let count = self
            .sessions
            .delete_expired()
            .await
            .context("Failed to delete expired sessions")?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxSessionRepository, SqlxUserRepository};
    use crate::db::{create_test_pool, migrations};

    async fn setup() -> (UserService, Arc<dyn SessionRepository>) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let sessions = SqlxSessionRepository::boxed(pool.clone());
        (
            UserService::new(SqlxUserRepository::boxed(pool), sessions.clone()),
            sessions,
        )
    }

    fn signup(username: &str, password: &str) -> SignupForm {
        SignupForm {
            username: username.to_string(),
            password1: password.to_string(),
            password2: password.to_string(),
        }
    }

    fn login(username: &str, password: &str) -> LoginForm {
        LoginForm {
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn test_register_and_login() {
        let (service, _) = setup().await;

        let user = service.register(&signup("leo", "password123")).await.unwrap();
        assert!(user.password_hash.starts_with("$argon2id$"));

        let (logged_in, session) = service.login(&login("leo", "password123")).await.unwrap();
        assert_eq!(logged_in.id, user.id);

        let current = service.validate_session(&session.id).await.unwrap().expect("user");
        assert_eq!(current.username, "leo");
    }

    #[tokio::test]
    async fn test_register_duplicate_username() {
        let (service, _) = setup().await;
        service.register(&signup("leo", "password123")).await.unwrap();

        let err = service.register(&signup("leo", "password456")).await.unwrap_err();
        assert!(matches!(err, UserServiceError::Validation(ref e) if !e.get("username").is_empty()));
    }

    #[tokio::test]
    async fn test_register_invalid_form() {
        let (service, _) = setup().await;
        let err = service.register(&signup("leo", "short")).await.unwrap_err();
        assert!(matches!(err, UserServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn test_login_failures_share_message() {
        let (service, _) = setup().await;
        service.register(&signup("leo", "password123")).await.unwrap();

        let wrong_password = service.login(&login("leo", "nope-nope")).await.unwrap_err();
        let unknown_user = service.login(&login("max", "password123")).await.unwrap_err();
        match (wrong_password, unknown_user) {
            (UserServiceError::Validation(a), UserServiceError::Validation(b)) => {
                assert_eq!(a, b);
                assert!(!a.get(NON_FIELD_ERRORS).is_empty());
            }
            other => panic!("unexpected errors: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_logout_ends_session() {
        let (service, _) = setup().await;
        service.register(&signup("leo", "password123")).await.unwrap();
        let (_, session) = service.login(&login("leo", "password123")).await.unwrap();

        service.logout(&session.id).await.unwrap();
        assert!(service.validate_session(&session.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_session_is_rejected_and_removed() {
        let (service, sessions) = setup().await;
        let user = service.register(&signup("leo", "password123")).await.unwrap();
        let expired = sessions.create(&Session::new(user.id, -1)).await.unwrap();

        assert!(service.validate_session(&expired.id).await.unwrap().is_none());
        assert!(sessions.get_by_id(&expired.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unknown_token() {
        let (service, _) = setup().await;
        assert!(service.validate_session("not-a-token").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cleanup_expired_sessions() {
        let (service, sessions) = setup().await;
        let user = service.register(&signup("leo", "password123")).await.unwrap();
        sessions.create(&Session::new(user.id, -1)).await.unwrap();
        service.create_session(user.id).await.unwrap();

        assert_eq!(service.cleanup_expired_sessions().await.unwrap(), 1);
    }
}
