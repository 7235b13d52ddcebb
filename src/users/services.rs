use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::{
    error::{AppError, AppResult},
    users::{model::User, repo::UserRepository},
};

/// Business rules for accounts. One instance per transaction.
pub struct UserService<R> {
    repo: R,
}

impl<R: UserRepository> UserService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Looks the user up by email and checks the password.
    ///
    /// An unknown email propagates as `AppError::NotFound`; a wrong password is
    /// `AppError::AuthorizeFailed`.
    pub async fn authorize(&mut self, email: &str, password: &str) -> AppResult<User> {
        let user = self.repo.find_by_email(email).await?;
        if !user.verify_password(password)? {
            warn!(email = %email, "password mismatch");
            return Err(AppError::AuthorizeFailed);
        }
        Ok(user)
    }

    pub async fn is_duplicate(&mut self, email: &str) -> AppResult<bool> {
        match self.repo.find_by_email(email).await {
            Ok(_) => Ok(true),
            Err(AppError::NotFound) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub async fn regist(&mut self, user: &User, now: OffsetDateTime) -> AppResult<()> {
        if self.is_duplicate(&user.email).await? {
            return Err(AppError::UserAlreadyRegistered);
        }
        self.repo.regist(user, now).await
    }

    pub async fn update(&mut self, user: &User, now: OffsetDateTime) -> AppResult<()> {
        let merged = self.merge_with_stored(user).await?;
        self.repo.update(&merged, now).await.map_err(vanished)
    }

    pub async fn delete(&mut self, user: &User) -> AppResult<()> {
        let merged = self.merge_with_stored(user).await?;
        self.repo.delete(&merged).await.map_err(vanished)
    }

    /// Canonical id, email and salt from storage; name and password from the caller.
    async fn merge_with_stored(&mut self, user: &User) -> AppResult<User> {
        let stored = match self.repo.find_by_email(&user.email).await {
            Ok(stored) => stored,
            Err(AppError::NotFound) => return Err(AppError::UserNotFound),
            Err(e) => return Err(e),
        };

        // A caller authenticated as one id may not act on another user's email.
        if user.id.is_some() && user.id != stored.id {
            debug!(email = %user.email, "caller id does not own email");
            return Err(AppError::UserNotFound);
        }

        Ok(User::new(
            stored.id,
            user.name.clone(),
            stored.email,
            user.password.clone(),
            stored.salt,
        ))
    }
}

/// The row went away between lookup and write.
fn vanished(e: AppError) -> AppError {
    match e {
        AppError::NotFound => AppError::UserNotFound,
        other => other,
    }
}
