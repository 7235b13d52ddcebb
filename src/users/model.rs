use uuid::Uuid;

use crate::auth::password;
use crate::error::AppResult;

/// User account. `password` holds plaintext when built from a request and the
/// stored hash when loaded from storage.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct User {
    pub id: Option<Uuid>, // assigned by storage on insert
    pub name: String,
    pub email: String,
    pub password: String,
    pub salt: String,
}

impl User {
    pub fn new(
        id: Option<Uuid>,
        name: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
        salt: impl Into<String>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            email: email.into(),
            password: password.into(),
            salt: salt.into(),
        }
    }

    /// Re-derives the hash of `candidate` under the stored salt and compares.
    pub fn verify_password(&self, candidate: &str) -> AppResult<bool> {
        Ok(password::hash(candidate, &self.salt)? == self.password)
    }

    /// Fresh salt and the hash of the current plaintext under it, as `(hash, salt)`.
    pub fn encrypt_password(&self) -> AppResult<(String, String)> {
        let salt = password::generate_salt()?;
        let hash = password::hash(&self.password, &salt)?;
        Ok((hash, salt))
    }
}
