//! Transport-agnostic request handling: a context over the request/response,
//! handlers that act on it, and middlewares that wrap handlers.

pub mod context;
pub mod helper;
pub mod middleware;

pub use context::{ApiContext, HttpContext};
pub use helper::{apply, handler_fn, HandlerFunc, MiddlewareFunc};
