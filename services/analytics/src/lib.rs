pub mod behavior;
pub mod cache;
pub mod config;
pub mod handlers;
pub mod insights;
pub mod metrics;
pub mod models;
pub mod performance;
pub mod period;
pub mod query;
pub mod reports;
pub mod revenue;
pub mod routes;
pub mod segments;
pub mod trends;

use renthive_common::RedisService;

use crate::config::AnalyticsConfig;
use crate::reports::AnalyticsService;

#[derive(Clone)]
pub struct AppState {
    pub config: AnalyticsConfig,
    pub db_pool: sqlx::PgPool,
    pub redis_service: RedisService,
    pub analytics_service: AnalyticsService,
}
