use std::sync::Arc;

use config::Config;
use refresh::DashboardService;

pub mod cache;
pub mod config;
pub mod database;
pub mod error;
pub mod middleware;
pub mod models;
pub mod provider;
pub mod refresh;
pub mod result;
pub mod routes;
pub mod store;
pub mod utils;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub dashboard: Arc<DashboardService>,
}
