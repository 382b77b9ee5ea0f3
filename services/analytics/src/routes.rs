use axum::routing::{get, post};
use axum::Router;

use crate::{handlers, AppState};

pub fn create_routes() -> Router<AppState> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Booking analytics report
        .route("/analytics/bookings", post(handlers::get_booking_analytics))
}
