use sqlx::PgPool;
use std::sync::Arc;

use crate::services::{dispatcher::Dispatcher, ml_client::InferenceClient};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub dispatcher: Arc<Dispatcher>,
    pub ml: Arc<dyn InferenceClient>,
}

impl AppState {
    pub fn new(db: PgPool, dispatcher: Dispatcher, ml: Arc<dyn InferenceClient>) -> Self {
        Self {
            db,
            dispatcher: Arc::new(dispatcher),
            ml,
        }
    }
}
