use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::users::model::User;

/// Request body shared by register, update, delete and login.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UserRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl UserRequest {
    /// Builds the domain user; `id` comes from the path, never from the body.
    pub fn into_model(self, id: Option<Uuid>) -> User {
        User::new(id, self.name, normalize_email(&self.email), self.password, "")
    }
}

/// Response body for a successful login.
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}
