use anyhow::Context;
use axum::http::{header, HeaderValue};

use crate::{
    config::CorsConfig,
    pipeline::helper::{handler_fn, HandlerFunc},
};

/// Adds the configured CORS headers to every response.
#[derive(Debug, Clone)]
pub struct Cors {
    allow_origin: HeaderValue,
    allow_methods: Vec<HeaderValue>,
    allow_headers: Vec<HeaderValue>,
    max_age: HeaderValue,
}

fn header_value(value: &str) -> anyhow::Result<HeaderValue> {
    HeaderValue::from_str(value).with_context(|| format!("invalid CORS header value {value:?}"))
}

impl Cors {
    pub fn new(
        allow_origin: &str,
        allow_methods: &[String],
        allow_headers: &[String],
        max_age: u32,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            allow_origin: header_value(allow_origin)?,
            allow_methods: allow_methods
                .iter()
                .map(|m| header_value(m))
                .collect::<anyhow::Result<_>>()?,
            allow_headers: allow_headers
                .iter()
                .map(|h| header_value(h))
                .collect::<anyhow::Result<_>>()?,
            max_age: HeaderValue::from(max_age),
        })
    }

    pub fn from_config(config: &CorsConfig) -> anyhow::Result<Self> {
        Self::new(
            &config.allow_origin,
            &config.allow_methods,
            &config.allow_headers,
            config.max_age,
        )
    }

    pub fn add_response_header(&self, next: HandlerFunc) -> HandlerFunc {
        let cors = self.clone();
        handler_fn(move |c| {
            c.add_response_header(
                header::ACCESS_CONTROL_ALLOW_ORIGIN,
                cors.allow_origin.clone(),
            );
            for method in &cors.allow_methods {
                c.add_response_header(header::ACCESS_CONTROL_ALLOW_METHODS, method.clone());
            }
            for allowed in &cors.allow_headers {
                c.add_response_header(header::ACCESS_CONTROL_ALLOW_HEADERS, allowed.clone());
            }
            c.add_response_header(header::ACCESS_CONTROL_MAX_AGE, cors.max_age.clone());
            next(c)
        })
    }
}
