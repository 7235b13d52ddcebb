use anyhow::Context;
use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool, Postgres, Transaction};

use crate::config::AppConfig;

#[cfg(test)]
pub(crate) mod memory;
mod transaction;

pub use transaction::{run_in_transaction, BoxFuture};

/// Something that can open a transaction.
#[async_trait]
pub trait Database: Send + Sync {
    type Tx: TxHandle;

    async fn begin(&self) -> Result<Self::Tx, sqlx::Error>;
}

/// An open transaction. Exactly one of `commit`/`rollback` ends it.
#[async_trait]
pub trait TxHandle: Send + Sized {
    async fn commit(self) -> Result<(), sqlx::Error>;
    async fn rollback(self) -> Result<(), sqlx::Error>;
}

pub async fn connect(config: &AppConfig) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await
        .context("connect to database")
}

#[async_trait]
impl Database for PgPool {
    type Tx = Transaction<'static, Postgres>;

    async fn begin(&self) -> Result<Self::Tx, sqlx::Error> {
        sqlx::Pool::begin(self).await
    }
}

#[async_trait]
impl TxHandle for Transaction<'static, Postgres> {
    async fn commit(self) -> Result<(), sqlx::Error> {
        Transaction::commit(self).await
    }

    async fn rollback(self) -> Result<(), sqlx::Error> {
        Transaction::rollback(self).await
    }
}
