pub mod dto;
pub mod handlers;
pub mod model;
pub mod repo;
pub mod repo_types;
pub mod services;
pub mod usecase;

pub use handlers::router;
