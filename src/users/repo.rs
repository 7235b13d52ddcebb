use async_trait::async_trait;
use sqlx::{Postgres, Transaction};
use time::OffsetDateTime;
use tracing::debug;

use crate::{
    auth::password,
    db::TxHandle,
    error::{AppError, AppResult},
    users::{model::User, repo_types::UserRow},
};

/// Storage operations on users, run against a transaction the caller owns.
#[async_trait]
pub trait UserRepository: Send {
    /// Exactly one row is expected; absence is `AppError::NotFound`.
    async fn find_by_email(&mut self, email: &str) -> AppResult<User>;
    /// Salts and hashes the plaintext password, then inserts. An email that is
    /// already taken is `AppError::UserAlreadyRegistered`.
    async fn regist(&mut self, user: &User, now: OffsetDateTime) -> AppResult<()>;
    /// Locks the row by id, then writes name, password and `updated_at`.
    /// A missing row is `AppError::NotFound`.
    async fn update(&mut self, user: &User, now: OffsetDateTime) -> AppResult<()>;
    /// Deleting a missing row is `AppError::NotFound`.
    async fn delete(&mut self, user: &User) -> AppResult<()>;
}

/// A concurrent insert of the same email loses on the unique index.
fn duplicate_email(e: sqlx::Error) -> AppError {
    match e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            debug!(error = %db, "email unique constraint violated");
            AppError::UserAlreadyRegistered
        }
        other => AppError::Storage(other),
    }
}

/// A transaction that can hand out a user repository bound to itself.
pub trait UserStore: TxHandle {
    type Users<'t>: UserRepository + Send
    where
        Self: 't;

    fn users(&mut self) -> Self::Users<'_>;
}

/// PostgreSQL user gateway.
pub struct UserDao<'t> {
    tx: &'t mut Transaction<'static, Postgres>,
}

impl<'t> UserDao<'t> {
    pub fn new(tx: &'t mut Transaction<'static, Postgres>) -> Self {
        Self { tx }
    }
}

impl UserStore for Transaction<'static, Postgres> {
    type Users<'t> = UserDao<'t>;

    fn users(&mut self) -> Self::Users<'_> {
        UserDao::new(self)
    }
}

#[async_trait]
impl<'t> UserRepository for UserDao<'t> {
    async fn find_by_email(&mut self, email: &str) -> AppResult<User> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, name, email, password, salt
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&mut **self.tx)
        .await?;

        row.map(User::from).ok_or(AppError::NotFound)
    }

    async fn regist(&mut self, user: &User, now: OffsetDateTime) -> AppResult<()> {
        let (hash, salt) = user.encrypt_password()?;
        sqlx::query(
            r#"
            INSERT INTO users (email, name, password, salt, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&user.email)
        .bind(&user.name)
        .bind(hash)
        .bind(salt)
        .bind(now)
        .bind(now)
        .execute(&mut **self.tx)
        .await
        .map_err(duplicate_email)?;

        debug!(email = %user.email, "user row inserted");
        Ok(())
    }

    async fn update(&mut self, user: &User, now: OffsetDateTime) -> AppResult<()> {
        let id = user.id.ok_or(AppError::NotFound)?;
        let hash = password::hash(&user.password, &user.salt)?;

        // Serialises concurrent updates of the same row until this transaction ends.
        sqlx::query("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut **self.tx)
            .await?
            .ok_or(AppError::NotFound)?;

        let done = sqlx::query(
            r#"
            UPDATE users
            SET name = $1, password = $2, updated_at = $3
            WHERE id = $4
            "#,
        )
        .bind(&user.name)
        .bind(hash)
        .bind(now)
        .bind(id)
        .execute(&mut **self.tx)
        .await?;
        if done.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }

        debug!(user_id = %id, "user row updated");
        Ok(())
    }

    async fn delete(&mut self, user: &User) -> AppResult<()> {
        let id = user.id.ok_or(AppError::NotFound)?;
        let done = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut **self.tx)
            .await?;
        if done.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }

        debug!(user_id = %id, "user row deleted");
        Ok(())
    }
}
