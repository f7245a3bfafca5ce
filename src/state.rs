use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::auth::token::TokenKeys;
use crate::config::Config;
use crate::mail::Mailer;
use crate::reactions::{ReactionRepository, SqliteReactionRepository};

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Config,
    pub tokens: Arc<TokenKeys>,
    pub mailer: Arc<dyn Mailer>,
    pub reactions: Arc<dyn ReactionRepository>,
}

impl AppState {
    /// Expects `config.auth.jwt_secret` to be filled in already.
    pub fn new(db: DbPool, config: Config, mailer: Arc<dyn Mailer>) -> Self {
        let tokens = TokenKeys::new(&config.auth.jwt_secret, config.auth.jwt_expires_hours);
        let reactions = SqliteReactionRepository::new(db.clone());

        Self {
            db,
            config,
            tokens: Arc::new(tokens),
            mailer,
            reactions: Arc::new(reactions),
        }
    }
}
