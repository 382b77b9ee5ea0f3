use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use renthive_analytics::config::AnalyticsSettings;
use renthive_analytics::models::{
    AnalyticsParams, BookingFilters, Granularity, InsightKind, PeriodToken,
};
use renthive_analytics::reports::AnalyticsService;
use renthive_common::{AppError, DatabaseConfig, RedisConfig, RedisService};
use renthive_database::{create_pool, run_migrations, DbPool};

fn backing_services_configured() -> bool {
    let db = std::env::var("DATABASE_URL").is_ok() || std::env::var("DATABASE_HOST").is_ok();
    let redis = std::env::var("REDIS_URL").is_ok() || std::env::var("REDIS_HOST").is_ok();
    db && redis
}

fn database_config() -> DatabaseConfig {
    DatabaseConfig {
        host: std::env::var("DATABASE_HOST").unwrap_or_else(|_| "localhost".to_string()),
        port: 5432,
        username: std::env::var("DATABASE_USERNAME").unwrap_or_else(|_| "renthive_user".to_string()),
        password: std::env::var("DATABASE_PASSWORD")
            .unwrap_or_else(|_| "renthive_password".to_string()),
        database: "renthive_test".to_string(),
        max_connections: 5,
    }
}

fn redis_config() -> RedisConfig {
    RedisConfig {
        host: std::env::var("REDIS_HOST").unwrap_or_else(|_| "localhost".to_string()),
        port: 6379,
        password: None,
        database: 1,
    }
}

struct Seeded {
    product_id: Uuid,
}

/// Seed the reference scenario: 10 bookings in the current 30-day window on
/// one product, 2 cancelled, 8 at 100.00 each, no product views.
async fn seed_scenario(pool: &DbPool) -> Seeded {
    let country_id = Uuid::new_v4();
    sqlx::query("INSERT INTO countries (id, name, code) VALUES ($1, $2, $3)")
        .bind(country_id)
        .bind("Netherlands")
        .bind(format!("T{}", &Uuid::new_v4().simple().to_string()[..6]))
        .execute(pool)
        .await
        .expect("insert country");

    let category_id = Uuid::new_v4();
    sqlx::query("INSERT INTO categories (id, name) VALUES ($1, $2)")
        .bind(category_id)
        .bind(format!("tools-{}", Uuid::new_v4()))
        .execute(pool)
        .await
        .expect("insert category");

    let owner_id = Uuid::new_v4();
    let renters = [Uuid::new_v4(), Uuid::new_v4()];
    for (id, name) in [(owner_id, "Owner")]
        .into_iter()
        .chain(renters.iter().map(|&id| (id, "Renter")))
    {
        sqlx::query(
            "INSERT INTO users (id, display_name, email, country_id, created_at)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(id)
        .bind(name)
        .bind(format!("{}-{}@example.com", name.to_lowercase(), id))
        .bind(country_id)
        .bind(Utc::now() - Duration::days(400))
        .execute(pool)
        .await
        .expect("insert user");
    }

    let product_id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO products (id, owner_id, category_id, country_id, city, latitude, longitude, title, daily_price, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
    )
    .bind(product_id)
    .bind(owner_id)
    .bind(category_id)
    .bind(country_id)
    .bind("Amsterdam")
    .bind(52.37)
    .bind(4.89)
    .bind("Power drill")
    .bind(Decimal::new(2500, 2))
    .bind(Utc::now() - Duration::days(120))
    .execute(pool)
    .await
    .expect("insert product");

    let amount = Decimal::new(10000, 2); // 100.00
    for i in 0..10u32 {
        let status = if i < 2 { "cancelled" } else if i < 7 { "completed" } else { "confirmed" };
        let created = Utc::now() - Duration::days(20) + Duration::hours(i as i64);
        sqlx::query(
            "INSERT INTO bookings (id, product_id, renter_id, owner_id, status, total_amount, platform_fee, service_fee, tax_amount, refund_amount, created_at, start_date, end_date)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
        )
        .bind(Uuid::new_v4())
        .bind(product_id)
        .bind(renters[(i % 2) as usize])
        .bind(owner_id)
        .bind(status)
        .bind(amount)
        .bind(Decimal::new(1000, 2))
        .bind(Decimal::new(200, 2))
        .bind(Decimal::new(800, 2))
        .bind(if status == "cancelled" { amount } else { Decimal::ZERO })
        .bind(created)
        .bind(created + Duration::days(3))
        .bind(created + Duration::days(5))
        .execute(pool)
        .await
        .expect("insert booking");
    }

    Seeded { product_id }
}

fn scenario_params(product_id: Uuid) -> AnalyticsParams {
    AnalyticsParams {
        period: Some(PeriodToken::ThirtyDays),
        granularity: Some(Granularity::Day),
        filters: Some(BookingFilters {
            product_ids: Some(vec![product_id]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_report_matches_reference_scenario() {
    if !backing_services_configured() {
        println!("Skipping analytics integration test - backing services not configured");
        return;
    }

    let pool = create_pool(&database_config()).await.expect("create pool");
    run_migrations(&pool).await.expect("run migrations");
    let redis = RedisService::new(&redis_config()).await.expect("redis");

    let seeded = seed_scenario(&pool).await;
    let service = AnalyticsService::new(
        pool.clone(),
        redis,
        AnalyticsSettings {
            report_cache_ttl_seconds: 60,
            calculator_timeout_seconds: 30,
        },
    );

    let report = service
        .generate_booking_analytics(&scenario_params(seeded.product_id))
        .await
        .expect("report generation");

    let current = &report.metrics.current;
    assert_eq!(current.total_bookings, 10);
    assert_eq!(current.total_revenue, Decimal::new(80000, 2));
    assert_eq!(current.average_booking_value, Decimal::new(10000, 2));
    assert!((current.cancellation_rate - 20.0).abs() < 1e-9);
    // No product views were seeded, so conversion is exactly zero.
    assert_eq!(current.conversion_rate, 0.0);

    // Previous period is empty: positive revenue reads as 100% growth.
    assert_eq!(report.metrics.growth.total_revenue, 100.0);

    // Status percentages cover the whole current period.
    let percentage_sum: f64 = report
        .status_distribution
        .iter()
        .map(|s| s.percentage)
        .sum();
    assert!((percentage_sum - 100.0).abs() < 1e-6);

    // Growth 100% > 20, cancellation 20% > 15, conversion 0% < 5: all three
    // insight rules fire, in rule order.
    let kinds: Vec<InsightKind> = report.insights.iter().map(|i| i.kind).collect();
    assert_eq!(
        kinds,
        vec![
            InsightKind::Growth,
            InsightKind::Warning,
            InsightKind::Opportunity
        ]
    );

    // Every booking left the renter's hands 2-7 days before the start date.
    let advance: i64 = report
        .user_behavior
        .timing
        .advance_booking
        .iter()
        .map(|b| b.bookings)
        .sum();
    assert_eq!(advance, 10);

    assert_eq!(report.performance.funnel.len(), 4);
    assert_eq!(report.geography.top_cities[0].city, "Amsterdam");
}

#[tokio::test]
async fn test_exhausted_budget_fails_the_whole_report() {
    if !backing_services_configured() {
        println!("Skipping analytics integration test - backing services not configured");
        return;
    }

    let pool = create_pool(&database_config()).await.expect("create pool");
    run_migrations(&pool).await.expect("run migrations");
    let redis = RedisService::new(&redis_config()).await.expect("redis");

    let service = AnalyticsService::new(
        pool,
        redis,
        AnalyticsSettings {
            report_cache_ttl_seconds: 60,
            // Zero budget: every calculator times out immediately and the
            // report must fail as a unit instead of returning partial data.
            calculator_timeout_seconds: 0,
        },
    );

    let result = service
        .generate_booking_analytics(&AnalyticsParams::default())
        .await;

    assert!(matches!(result, Err(AppError::Timeout(_))));
}
