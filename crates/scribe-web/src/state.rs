use std::sync::Arc;

use scribe_core::{
    AccessControl, PostRepository, PostService, RateLimiter, TokenService, UserRepository,
    UserService,
};

use crate::config::ServerConfig;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub access: Arc<AccessControl>,
    pub users: Arc<UserService>,
    pub posts: Arc<PostService>,
    pub limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(
        config: ServerConfig,
        users: Arc<dyn UserRepository>,
        posts: Arc<dyn PostRepository>,
        limiter: RateLimiter,
    ) -> Self {
        let tokens = TokenService::new(&config.auth);
        let access = AccessControl::new(tokens, users.clone(), config.auth.lookup_timeout());
        Self {
            access: Arc::new(access),
            users: Arc::new(UserService::new(users, posts.clone())),
            posts: Arc::new(PostService::new(posts)),
            limiter: Arc::new(limiter),
            config: Arc::new(config),
        }
    }
}
