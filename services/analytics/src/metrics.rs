use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sqlx::PgPool;

use renthive_common::AppError;

use crate::models::{CoreMetrics, CoreMetricsReport, DateRange, MetricsGrowth, ResolvedPeriods};
use crate::query::BookingQuery;

const CORE_AGGREGATES: &str = "COUNT(*) AS total_bookings, \
     COALESCE(SUM(b.total_amount) FILTER (WHERE b.status <> 'cancelled'), 0) AS total_revenue, \
     COALESCE(AVG(b.total_amount) FILTER (WHERE b.status <> 'cancelled'), 0) AS average_booking_value, \
     COUNT(*) FILTER (WHERE b.status = 'cancelled') AS cancelled_bookings, \
     COUNT(*) FILTER (WHERE b.status = 'completed') AS completed_bookings, \
     COUNT(*) FILTER (WHERE b.status IN ('confirmed', 'in_progress', 'completed')) AS realized_bookings, \
     COALESCE(AVG(EXTRACT(EPOCH FROM (b.start_date - b.created_at)) / 86400.0), 0)::float8 AS average_lead_time_days, \
     COALESCE(AVG(EXTRACT(EPOCH FROM (b.end_date - b.start_date)) / 86400.0), 0)::float8 AS average_duration_days";

#[derive(Debug, sqlx::FromRow)]
struct CoreAggregateRow {
    total_bookings: i64,
    total_revenue: Decimal,
    average_booking_value: Decimal,
    cancelled_bookings: i64,
    completed_bookings: i64,
    realized_bookings: i64,
    average_lead_time_days: f64,
    average_duration_days: f64,
}

pub async fn compute(
    pool: &PgPool,
    query: &BookingQuery,
    periods: &ResolvedPeriods,
) -> Result<CoreMetricsReport, AppError> {
    let (current, previous) = tokio::try_join!(
        metrics_for_range(pool, query, &periods.current),
        metrics_for_range(pool, query, &periods.previous),
    )?;

    let growth = growth_between(&current, &previous);

    Ok(CoreMetricsReport {
        current,
        previous,
        growth,
    })
}

async fn metrics_for_range(
    pool: &PgPool,
    query: &BookingQuery,
    range: &DateRange,
) -> Result<CoreMetrics, AppError> {
    let row: CoreAggregateRow = query
        .bookings(CORE_AGGREGATES, range)
        .build_query_as()
        .fetch_one(pool)
        .await?;

    let views: i64 = query
        .views("COUNT(*)", range)
        .build_query_scalar()
        .fetch_one(pool)
        .await?;

    let mut per_renter = query.bookings("COUNT(*) AS bookings", range);
    per_renter.push(" GROUP BY b.renter_id");
    let renter_counts: Vec<(i64,)> = per_renter.build_query_as().fetch_all(pool).await?;

    Ok(CoreMetrics {
        total_bookings: row.total_bookings,
        total_revenue: row.total_revenue,
        average_booking_value: row.average_booking_value,
        cancellation_rate: ratio_percent(row.cancelled_bookings, row.total_bookings),
        completion_rate: ratio_percent(row.completed_bookings, row.realized_bookings),
        conversion_rate: ratio_percent(row.total_bookings, views),
        repeat_customer_rate: repeat_customer_rate(&renter_counts),
        average_lead_time_days: row.average_lead_time_days,
        average_duration_days: row.average_duration_days,
    })
}

fn growth_between(current: &CoreMetrics, previous: &CoreMetrics) -> MetricsGrowth {
    MetricsGrowth {
        total_bookings: percent_change(
            current.total_bookings as f64,
            previous.total_bookings as f64,
        ),
        total_revenue: percent_change(
            current.total_revenue.to_f64().unwrap_or(0.0),
            previous.total_revenue.to_f64().unwrap_or(0.0),
        ),
        average_booking_value: percent_change(
            current.average_booking_value.to_f64().unwrap_or(0.0),
            previous.average_booking_value.to_f64().unwrap_or(0.0),
        ),
        conversion_rate: percent_change(current.conversion_rate, previous.conversion_rate),
        cancellation_rate: percent_change(current.cancellation_rate, previous.cancellation_rate),
        completion_rate: percent_change(current.completion_rate, previous.completion_rate),
    }
}

/// Period-over-period change in percent. A previous value of zero yields 100
/// when the current value is positive and 0 otherwise, never a division
/// error.
pub(crate) fn percent_change(current: f64, previous: f64) -> f64 {
    if previous == 0.0 {
        if current > 0.0 {
            100.0
        } else {
            0.0
        }
    } else {
        (current - previous) / previous * 100.0
    }
}

pub(crate) fn ratio_percent(part: i64, whole: i64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

fn repeat_customer_rate(renter_counts: &[(i64,)]) -> f64 {
    let total: i64 = renter_counts.iter().map(|(c,)| c).sum();
    if total == 0 {
        return 0.0;
    }
    let repeat: i64 = renter_counts
        .iter()
        .map(|(c,)| c)
        .filter(|&&c| c > 1)
        .sum();
    repeat as f64 / total as f64 * 100.0
}
