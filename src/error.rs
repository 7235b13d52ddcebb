use thiserror::Error;

/// Every failure the account core can report.
///
/// Domain outcomes (`UserNotFound`, `UserAlreadyRegistered`, `AuthorizeFailed`) are
/// mapped to 4xx by the transport; the remaining variants are infrastructure faults.
#[derive(Debug, Error)]
pub enum AppError {
    /// Storage lookup found no row. Each caller decides what absence means.
    #[error("record not found")]
    NotFound,

    #[error("user not found")]
    UserNotFound,

    #[error("user already registered")]
    UserAlreadyRegistered,

    #[error("authorize failed")]
    AuthorizeFailed,

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("password hashing failed: {0}")]
    Hash(String),

    #[error("random source unavailable: {0}")]
    RandomSource(#[from] rand::Error),

    #[error("token signing failed: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("{source} (rollback error: {rollback})")]
    Rollback {
        source: Box<AppError>,
        rollback: sqlx::Error,
    },
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// The error that caused the operation to fail, looking through a failed rollback.
    pub fn root(&self) -> &AppError {
        match self {
            AppError::Rollback { source, .. } => source.root(),
            other => other,
        }
    }

    /// True for outcomes the client caused, as opposed to server faults.
    pub fn is_domain(&self) -> bool {
        matches!(
            self.root(),
            AppError::NotFound
                | AppError::UserNotFound
                | AppError::UserAlreadyRegistered
                | AppError::AuthorizeFailed
        )
    }
}
