use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Country {
    pub id: Uuid,
    pub name: String,
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub display_name: String,
    pub email: String,
    pub country_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Product {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub category_id: Uuid,
    pub country_id: Option<Uuid>,
    pub city: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub title: String,
    pub daily_price: Decimal,
    pub created_at: DateTime<Utc>,
}

/// A reservation of a product by a renter. Read-only from the analytics
/// engine's perspective; the status column holds `BookingStatus` text.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Booking {
    pub id: Uuid,
    pub product_id: Uuid,
    pub renter_id: Uuid,
    pub owner_id: Uuid,
    pub status: String,
    pub total_amount: Decimal,
    pub platform_fee: Decimal,
    pub service_fee: Decimal,
    pub tax_amount: Decimal,
    pub refund_amount: Decimal,
    pub created_at: DateTime<Utc>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProductView {
    pub id: Uuid,
    pub product_id: Uuid,
    pub viewer_id: Option<Uuid>,
    pub viewed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Payment {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub method: String,
    pub amount: Decimal,
    pub status: String,
    pub created_at: DateTime<Utc>,
}
