//! Scribe core library: framework-agnostic blog backend logic.
//!
//! `scribe-core` holds everything the HTTP frontend (`scribe-web`) needs
//! that does not depend on a particular web framework: identity tokens,
//! the per-request access control chain, the sliding-window rate limiter,
//! domain models with their validation rules, persistence traits and the
//! user/post services built on top of them.
//!
//! # Modules
//!
//! - [`auth`]: Token issuance/verification ([`TokenService`]), password hashing,
//!   and the access control chain ([`AccessControl`]).
//! - [`ratelimit`]: Sliding-window admission gate ([`RateLimiter`]) with a shared
//!   Redis backend and an in-process fallback.
//! - [`model`]: Users, posts, typed update requests and field validation.
//! - [`store`]: Repository traits plus in-memory and SQLite implementations.
//! - [`service`]: User and post use cases ([`UserService`], [`PostService`]).
//! - [`pagination`]: Page request normalisation and page arithmetic.
//! - [`config`]: Configuration sections consumed by the components above.
//! - [`error`]: Unified error types ([`CoreError`], [`AccessError`]) and result alias.

pub mod auth;
pub mod config;
pub mod error;
pub mod model;
pub mod pagination;
pub mod ratelimit;
pub mod service;
pub mod store;

pub use auth::access::{AccessControl, Caller, Requirement};
pub use auth::token::{IssuedToken, TokenRejection, TokenService};
pub use config::settings::{AuthSettings, DatabaseSettings, RateLimitSettings};
pub use error::{AccessError, CoreError, CoreResult, DenialReason};
pub use model::post::{NewPost, Post, PostId, PostUpdate};
pub use model::user::{NewUser, PasswordChange, User, UserId, UserUpdate};
pub use model::validate::FieldError;
pub use pagination::{Page, PageRequest};
pub use ratelimit::{ClientKey, RateDecision, RateLimitInfo, RateLimiter};
pub use service::posts::PostService;
pub use service::users::{UserService, UserStats};
pub use store::{PostRepository, StoreError, UserRepository};
