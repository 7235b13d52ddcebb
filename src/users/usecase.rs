use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;
use tracing::info;

use crate::{
    auth::TokenIssuer,
    db::{run_in_transaction, Database},
    error::{AppError, AppResult},
    users::{model::User, repo::UserStore, services::UserService},
};

/// Account operations as the transport sees them. Each call is one transaction.
#[async_trait]
pub trait UserUseCase: Send + Sync {
    async fn regist(&self, user: User, now: OffsetDateTime) -> AppResult<()>;
    async fn update(&self, user: User, now: OffsetDateTime) -> AppResult<()>;
    async fn delete(&self, user: User) -> AppResult<()>;
    /// Checks credentials and returns a signed token for the user.
    async fn authorize(&self, email: &str, password: &str) -> AppResult<String>;
}

pub struct UserInteractor<D> {
    db: D,
    tokens: Arc<dyn TokenIssuer>,
}

impl<D> UserInteractor<D> {
    pub fn new(db: D, tokens: Arc<dyn TokenIssuer>) -> Self {
        Self { db, tokens }
    }
}

#[async_trait]
impl<D> UserUseCase for UserInteractor<D>
where
    D: Database + 'static,
    D::Tx: UserStore,
{
    async fn regist(&self, user: User, now: OffsetDateTime) -> AppResult<()> {
        run_in_transaction(&self.db, move |tx| {
            Box::pin(async move { UserService::new(tx.users()).regist(&user, now).await })
        })
        .await
    }

    async fn update(&self, user: User, now: OffsetDateTime) -> AppResult<()> {
        run_in_transaction(&self.db, move |tx| {
            Box::pin(async move { UserService::new(tx.users()).update(&user, now).await })
        })
        .await
    }

    async fn delete(&self, user: User) -> AppResult<()> {
        run_in_transaction(&self.db, move |tx| {
            Box::pin(async move { UserService::new(tx.users()).delete(&user).await })
        })
        .await
    }

    async fn authorize(&self, email: &str, password: &str) -> AppResult<String> {
        let (email, password) = (email.to_owned(), password.to_owned());
        let user = run_in_transaction(&self.db, move |tx| {
            Box::pin(async move {
                UserService::new(tx.users())
                    .authorize(&email, &password)
                    .await
            })
        })
        .await?;

        let id = user.id.ok_or(AppError::NotFound)?;
        let token = self
            .tokens
            .generate(&id.to_string(), OffsetDateTime::now_utc())?;
        info!(user_id = %id, "user logged in");
        Ok(token)
    }
}
