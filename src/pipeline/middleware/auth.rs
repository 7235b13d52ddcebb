use std::sync::Arc;

use axum::http::{header::AUTHORIZATION, StatusCode};
use tracing::{debug, warn};

use crate::{
    auth::TokenIssuer,
    pipeline::helper::{handler_fn, HandlerFunc},
};

const BEARER_PREFIX: &str = "Bearer ";

/// Requires a bearer token issued to the user named by the path parameter.
#[derive(Clone)]
pub struct Auth {
    tokens: Arc<dyn TokenIssuer>,
}

impl Auth {
    pub fn new(tokens: Arc<dyn TokenIssuer>) -> Self {
        Self { tokens }
    }

    pub fn verify_auth(&self, next: HandlerFunc) -> HandlerFunc {
        let tokens = self.tokens.clone();
        handler_fn(move |c| {
            let next = next.clone();
            let authorized = match c
                .request_header()
                .get(AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
            {
                None => {
                    debug!("missing Authorization header");
                    false
                }
                Some(value) => match value.strip_prefix(BEARER_PREFIX) {
                    None => {
                        debug!("Authorization header is not a bearer token");
                        false
                    }
                    Some(token) => tokens.verify(token, c.path_param()),
                },
            };
            Box::pin(async move {
                if !authorized {
                    warn!(user_id = %c.path_param(), "unauthorized request");
                    c.write_status_code(StatusCode::UNAUTHORIZED);
                    return Ok(());
                }
                next(c).await
            })
        })
    }
}
