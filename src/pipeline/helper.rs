use std::sync::Arc;

use axum::{
    body::{self, Body},
    extract::Request,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::{debug, error};

use super::context::{ApiContext, ApiContextFactory};
use crate::db::BoxFuture;

const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Handles a request through its context. An `Err` becomes a 500.
pub type HandlerFunc =
    Arc<dyn for<'a> Fn(&'a mut dyn ApiContext) -> BoxFuture<'a, anyhow::Result<()>> + Send + Sync>;

/// Wraps a handler with another handler.
pub type MiddlewareFunc = Arc<dyn Fn(HandlerFunc) -> HandlerFunc + Send + Sync>;

/// Pins down the closure signature so async closures can borrow the context.
pub fn handler_fn<F>(f: F) -> HandlerFunc
where
    F: for<'a> Fn(&'a mut dyn ApiContext) -> BoxFuture<'a, anyhow::Result<()>>
        + Send
        + Sync
        + 'static,
{
    Arc::new(f)
}

/// A fully wrapped handler ready to mount on a route.
#[derive(Clone)]
pub struct Endpoint {
    factory: ApiContextFactory,
    handler: HandlerFunc,
}

/// Wraps `handler` so that the first middleware listed runs outermost.
pub fn apply(
    factory: ApiContextFactory,
    handler: HandlerFunc,
    middlewares: &[MiddlewareFunc],
) -> Endpoint {
    let handler = middlewares
        .iter()
        .rev()
        .fold(handler, |next, middleware| middleware(next));
    Endpoint { factory, handler }
}

impl Endpoint {
    pub async fn handle(&self, req: Request) -> Response {
        let (parts, body) = req.into_parts();
        let body = match body::to_bytes(body, MAX_BODY_BYTES).await {
            Ok(b) => b,
            Err(e) => {
                debug!(error = %e, "request body unreadable");
                return StatusCode::BAD_REQUEST.into_response();
            }
        };

        let mut ctx = (self.factory)(parts, body);
        if let Err(e) = (self.handler)(ctx.as_mut()).await {
            error!(error = %e, "handler chain failed");
            ctx.write_status_code(StatusCode::INTERNAL_SERVER_ERROR);
        }
        ctx.into_response()
    }

    /// Method router that sends every method through this endpoint.
    pub fn into_route<S>(self) -> axum::routing::MethodRouter<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        axum::routing::any(move |req: Request<Body>| async move { self.handle(req).await })
    }
}
