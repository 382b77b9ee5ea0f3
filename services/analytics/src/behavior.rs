use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use renthive_common::AppError;

use crate::metrics::ratio_percent;
use crate::models::{
    AdvanceBucket, CustomerSplit, DateRange, HourWeekdayCount, LifetimeStats, RetentionPoint,
    TimingPatterns, UserBehaviorAnalytics,
};
use crate::query::BookingQuery;

const ADVANCE_BUCKET_ORDER: [&str; 4] = ["0-1", "2-7", "8-30", "31+"];

// Placeholder curve: retention is not derivable from booking rows alone, so
// the report carries illustrative figures, matching the source system.
const RETENTION_CURVE: [(u32, f64); 4] = [(1, 100.0), (2, 62.0), (3, 48.0), (6, 31.0)];

#[derive(Debug, sqlx::FromRow)]
struct RenterBookingsRow {
    renter_id: Uuid,
    bookings: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct FirstBookingRow {
    renter_id: Uuid,
    first_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct LifetimeRow {
    total_bookings: i64,
    renters: i64,
    total_revenue: Decimal,
}

#[derive(Debug, sqlx::FromRow)]
struct HourWeekdayRow {
    weekday: i32,
    hour: i32,
    bookings: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct AdvanceRow {
    bucket: String,
    bookings: i64,
}

pub async fn compute(
    pool: &PgPool,
    query: &BookingQuery,
    range: &DateRange,
) -> Result<UserBehaviorAnalytics, AppError> {
    let (customers, lifetime, timing) = tokio::try_join!(
        customer_split(pool, query, range),
        lifetime_stats(pool, query),
        timing_patterns(pool, query, range),
    )?;

    Ok(UserBehaviorAnalytics {
        customers,
        lifetime,
        timing,
    })
}

async fn customer_split(
    pool: &PgPool,
    query: &BookingQuery,
    range: &DateRange,
) -> Result<CustomerSplit, AppError> {
    let mut per_renter = query.bookings("b.renter_id AS renter_id, COUNT(*) AS bookings", range);
    per_renter.push(" GROUP BY b.renter_id");
    let renter_rows: Vec<RenterBookingsRow> =
        per_renter.build_query_as().fetch_all(pool).await?;

    if renter_rows.is_empty() {
        return Ok(CustomerSplit {
            new_renters: 0,
            returning_renters: 0,
            new_renter_bookings: 0,
            returning_renter_bookings: 0,
            new_share_percentage: 0.0,
        });
    }

    // First-ever booking per renter, deliberately unfiltered: a renter is
    // "new" only if this window contains their very first booking anywhere
    // on the platform.
    let renter_ids: Vec<Uuid> = renter_rows.iter().map(|r| r.renter_id).collect();
    let mut firsts_query = QueryBuilder::<Postgres>::new(
        "SELECT b.renter_id AS renter_id, MIN(b.created_at) AS first_at \
         FROM bookings b WHERE b.renter_id = ANY(",
    );
    firsts_query
        .push_bind(renter_ids)
        .push(") GROUP BY b.renter_id");
    let first_rows: Vec<FirstBookingRow> = firsts_query.build_query_as().fetch_all(pool).await?;

    let firsts: HashMap<Uuid, DateTime<Utc>> = first_rows
        .into_iter()
        .map(|r| (r.renter_id, r.first_at))
        .collect();

    Ok(split_customers(&renter_rows, &firsts, range))
}

fn split_customers(
    renter_rows: &[RenterBookingsRow],
    firsts: &HashMap<Uuid, DateTime<Utc>>,
    range: &DateRange,
) -> CustomerSplit {
    let mut split = CustomerSplit {
        new_renters: 0,
        returning_renters: 0,
        new_renter_bookings: 0,
        returning_renter_bookings: 0,
        new_share_percentage: 0.0,
    };

    for row in renter_rows {
        let is_new = firsts
            .get(&row.renter_id)
            .map(|first| *first >= range.start && *first <= range.end)
            .unwrap_or(false);
        if is_new {
            split.new_renters += 1;
            split.new_renter_bookings += row.bookings;
        } else {
            split.returning_renters += 1;
            split.returning_renter_bookings += row.bookings;
        }
    }

    split.new_share_percentage =
        ratio_percent(split.new_renters, split.new_renters + split.returning_renters);
    split
}

async fn lifetime_stats(pool: &PgPool, query: &BookingQuery) -> Result<LifetimeStats, AppError> {
    let row: LifetimeRow = query
        .bookings_all_time(
            "COUNT(*) AS total_bookings, \
             COUNT(DISTINCT b.renter_id) AS renters, \
             COALESCE(SUM(b.total_amount) FILTER (WHERE b.status <> 'cancelled'), 0) AS total_revenue",
        )
        .build_query_as()
        .fetch_one(pool)
        .await?;

    let (average_lifetime_value, average_bookings_per_renter) = if row.renters == 0 {
        (Decimal::ZERO, 0.0)
    } else {
        (
            row.total_revenue / Decimal::from(row.renters),
            row.total_bookings as f64 / row.renters as f64,
        )
    };

    Ok(LifetimeStats {
        average_lifetime_value,
        average_bookings_per_renter,
        retention_curve: RETENTION_CURVE
            .iter()
            .map(|&(month, retention_rate)| RetentionPoint {
                month,
                retention_rate,
            })
            .collect(),
    })
}

async fn timing_patterns(
    pool: &PgPool,
    query: &BookingQuery,
    range: &DateRange,
) -> Result<TimingPatterns, AppError> {
    let mut hour_query = query.bookings(
        "EXTRACT(DOW FROM b.created_at)::int AS weekday, \
         EXTRACT(HOUR FROM b.created_at)::int AS hour, \
         COUNT(*) AS bookings",
        range,
    );
    hour_query.push(" GROUP BY weekday, hour ORDER BY weekday, hour");

    let mut advance_query = query.bookings(
        "CASE WHEN EXTRACT(EPOCH FROM (b.start_date - b.created_at)) / 86400.0 <= 1 THEN '0-1' \
              WHEN EXTRACT(EPOCH FROM (b.start_date - b.created_at)) / 86400.0 <= 7 THEN '2-7' \
              WHEN EXTRACT(EPOCH FROM (b.start_date - b.created_at)) / 86400.0 <= 30 THEN '8-30' \
              ELSE '31+' END AS bucket, \
         COUNT(*) AS bookings",
        range,
    );
    advance_query.push(" GROUP BY bucket");

    let (hour_rows, advance_rows) = tokio::try_join!(
        async {
            Ok::<_, AppError>(
                hour_query
                    .build_query_as::<HourWeekdayRow>()
                    .fetch_all(pool)
                    .await?,
            )
        },
        async {
            Ok::<_, AppError>(
                advance_query
                    .build_query_as::<AdvanceRow>()
                    .fetch_all(pool)
                    .await?,
            )
        },
    )?;

    Ok(TimingPatterns {
        by_hour_and_weekday: hour_rows
            .into_iter()
            .map(|r| HourWeekdayCount {
                weekday: r.weekday,
                hour: r.hour,
                bookings: r.bookings,
            })
            .collect(),
        advance_booking: order_advance_buckets(advance_rows),
    })
}

/// Histogram buckets come back in arbitrary GROUP BY order; emit the fixed
/// 0-1 / 2-7 / 8-30 / 31+ sequence with zero-filled gaps.
fn order_advance_buckets(rows: Vec<AdvanceRow>) -> Vec<AdvanceBucket> {
    let counts: HashMap<String, i64> = rows.into_iter().map(|r| (r.bucket, r.bookings)).collect();
    ADVANCE_BUCKET_ORDER
        .iter()
        .map(|&label| AdvanceBucket {
            label: label.to_string(),
            bookings: counts.get(label).copied().unwrap_or(0),
        })
        .collect()
}
