use anyhow::bail;
use axum::http::StatusCode;
use tracing::debug;

use crate::pipeline::helper::{handler_fn, HandlerFunc};

const PARAM_PREFIX: char = ':';

/// Matches the request path against a pattern with at most one `:name` segment
/// and stores the captured segment in the context.
#[derive(Debug, Clone)]
pub struct PathParam {
    segments: Vec<String>,
}

impl PathParam {
    pub fn new(pattern: &str) -> anyhow::Result<Self> {
        let segments: Vec<String> = pattern.split('/').map(str::to_owned).collect();
        let params = segments
            .iter()
            .filter(|s| s.starts_with(PARAM_PREFIX))
            .count();
        if params > 1 {
            bail!("invalid path pattern {pattern:?}: at most one path parameter is allowed");
        }
        Ok(Self { segments })
    }

    /// Extracted segment, or `None` when the path does not fit the pattern.
    fn capture(&self, path: &str) -> Option<String> {
        let parts: Vec<&str> = path.split('/').collect();
        if parts.len() != self.segments.len() {
            return None;
        }

        let mut captured = String::new();
        for (pattern, part) in self.segments.iter().zip(parts) {
            if pattern.starts_with(PARAM_PREFIX) {
                captured = part.to_owned();
            } else if pattern != part {
                return None;
            }
        }
        Some(captured)
    }

    pub fn parse(&self, next: HandlerFunc) -> HandlerFunc {
        let this = self.clone();
        handler_fn(move |c| {
            let next = next.clone();
            let captured = this.capture(c.url().path());
            Box::pin(async move {
                match captured {
                    Some(param) => {
                        c.set_path_param(param);
                        next(c).await
                    }
                    None => {
                        debug!(path = %c.url().path(), "path does not match pattern");
                        c.write_status_code(StatusCode::BAD_REQUEST);
                        Ok(())
                    }
                }
            })
        })
    }
}
