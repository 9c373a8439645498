use std::sync::Arc;

use axum::extract::FromRef;
use filmdb_dal::{movie::ValidationContext, Pool};

#[derive(Clone)]
pub struct AppState {
    state: Arc<AppStateInner>,
}

impl AppState {
    pub fn new(app_config: AppConfig, pool: Pool) -> Self {
        AppState {
            state: Arc::new(AppStateInner { pool, app_config }),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.state.app_config
    }

    pub fn pool(&self) -> &Pool {
        &self.state.pool
    }
}

struct AppStateInner {
    pool: Pool,
    app_config: AppConfig,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub default_page_size: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            default_page_size: 20,
        }
    }
}

// Validation of submitted movies is always done against the current date
impl FromRef<AppState> for ValidationContext {
    fn from_ref(_state: &AppState) -> Self {
        ValidationContext::now()
    }
}
