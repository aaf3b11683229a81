//! Domain models: users, posts and request validation.

pub mod post;
pub mod user;
pub mod validate;
