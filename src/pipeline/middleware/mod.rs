mod auth;
mod cors;
mod path_param;

pub use auth::Auth;
pub use cors::Cors;
pub use path_param::PathParam;
