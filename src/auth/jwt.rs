use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use tracing::debug;

use crate::error::AppResult;

/// Lifetime of an issued token.
pub const TOKEN_TTL: Duration = Duration::hours(1);

/// Issues and checks the bearer tokens handed out at login.
pub trait TokenIssuer: Send + Sync {
    fn generate(&self, user_id: &str, now: OffsetDateTime) -> AppResult<String>;
    /// True only when signature, algorithm, expiry and subject all check out.
    fn verify(&self, token: &str, user_id: &str) -> bool;
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub id: String, // user ID
    pub exp: i64,   // expires at (unix timestamp)
}

/// HMAC-signed JWT bound to a user id.
#[derive(Clone)]
pub struct JwtToken {
    encoding: EncodingKey,
    decoding: DecodingKey,
    algorithm: Algorithm,
}

impl JwtToken {
    pub fn new(secret: &str) -> Self {
        Self::with_algorithm(secret, Algorithm::HS256)
    }

    pub fn with_algorithm(secret: &str, algorithm: Algorithm) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            algorithm,
        }
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(self.algorithm);
        validation.leeway = 0;
        validation
    }
}

impl TokenIssuer for JwtToken {
    fn generate(&self, user_id: &str, now: OffsetDateTime) -> AppResult<String> {
        let claims = Claims {
            id: user_id.to_string(),
            exp: (now + TOKEN_TTL).unix_timestamp(),
        };
        let token = encode(&Header::new(self.algorithm), &claims, &self.encoding)?;
        debug!(user_id = %user_id, "jwt signed");
        Ok(token)
    }

    fn verify(&self, token: &str, user_id: &str) -> bool {
        match decode::<Claims>(token, &self.decoding, &self.validation()) {
            Ok(data) if data.claims.id == user_id => true,
            Ok(data) => {
                debug!(subject = %data.claims.id, expected = %user_id, "jwt subject mismatch");
                false
            }
            Err(e) => {
                debug!(error = %e, "jwt rejected");
                false
            }
        }
    }
}
