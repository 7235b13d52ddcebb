use sqlx::FromRow;
use uuid::Uuid;

use crate::users::model::User;

/// User record in the database.
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password: String, // hash, never plaintext
    pub salt: String,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User::new(Some(row.id), row.name, row.email, row.password, row.salt)
    }
}
