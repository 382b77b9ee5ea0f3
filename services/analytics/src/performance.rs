use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use renthive_common::AppError;

use crate::models::{
    DateRange, FunnelStage, LeaderboardEntry, PerformanceMetrics, ResponseTimes, SeasonalIndex,
};
use crate::query::BookingQuery;

const TOP_ENTRIES: i64 = 10;

// Placeholder figures: request latency is not recorded in the booking store,
// so the report carries illustrative values, matching the source system.
const RESPONSE_TIMES: ResponseTimes = ResponseTimes {
    average_ms: 120.0,
    p95_ms: 380.0,
    p99_ms: 900.0,
};

#[derive(Debug, sqlx::FromRow)]
struct FunnelRow {
    bookings: i64,
    confirmations: i64,
    completions: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct MonthRow {
    month: i32,
    bookings: i64,
    revenue: Decimal,
}

#[derive(Debug, sqlx::FromRow)]
struct EntityRow {
    id: Uuid,
    name: String,
    bookings: i64,
    revenue: Decimal,
}

#[derive(Debug, sqlx::FromRow)]
struct LocationRow {
    name: String,
    bookings: i64,
    revenue: Decimal,
}

pub async fn compute(
    pool: &PgPool,
    query: &BookingQuery,
    range: &DateRange,
) -> Result<PerformanceMetrics, AppError> {
    let revenue_sum =
        "COALESCE(SUM(b.total_amount) FILTER (WHERE b.status <> 'cancelled'), 0) AS revenue";

    let funnel_query = query.bookings(
        "COUNT(*) AS bookings, \
         COUNT(*) FILTER (WHERE b.status IN ('confirmed', 'in_progress', 'completed')) AS confirmations, \
         COUNT(*) FILTER (WHERE b.status = 'completed') AS completions",
        range,
    );
    let views_query = query.views("COUNT(*)", range);

    let mut seasonal_query = query.bookings_all_time(&format!(
        "EXTRACT(MONTH FROM b.created_at)::int AS month, COUNT(*) AS bookings, {revenue_sum}"
    ));
    seasonal_query.push(" GROUP BY month ORDER BY month");

    let mut product_query = query.bookings(
        &format!("p.id AS id, p.title AS name, COUNT(*) AS bookings, {revenue_sum}"),
        range,
    );
    product_query
        .push(" GROUP BY p.id, p.title ORDER BY revenue DESC LIMIT ")
        .push_bind(TOP_ENTRIES);

    let mut owner_query = query.bookings(
        &format!("o.id AS id, o.display_name AS name, COUNT(*) AS bookings, {revenue_sum}"),
        range,
    );
    owner_query
        .push(" GROUP BY o.id, o.display_name ORDER BY revenue DESC LIMIT ")
        .push_bind(TOP_ENTRIES);

    let mut location_query = query.bookings(
        &format!("p.city AS name, COUNT(*) AS bookings, {revenue_sum}"),
        range,
    );
    location_query
        .push(" GROUP BY p.city ORDER BY revenue DESC LIMIT ")
        .push_bind(TOP_ENTRIES);

    let (funnel_row, views, month_rows, products, owners, locations) = tokio::try_join!(
        fetch_one_funnel(pool, funnel_query),
        async {
            let mut views_query = views_query;
            Ok::<_, AppError>(views_query.build_query_scalar::<i64>().fetch_one(pool).await?)
        },
        async {
            Ok::<_, AppError>(
                seasonal_query
                    .build_query_as::<MonthRow>()
                    .fetch_all(pool)
                    .await?,
            )
        },
        async {
            Ok::<_, AppError>(
                product_query
                    .build_query_as::<EntityRow>()
                    .fetch_all(pool)
                    .await?,
            )
        },
        async {
            Ok::<_, AppError>(
                owner_query
                    .build_query_as::<EntityRow>()
                    .fetch_all(pool)
                    .await?,
            )
        },
        async {
            Ok::<_, AppError>(
                location_query
                    .build_query_as::<LocationRow>()
                    .fetch_all(pool)
                    .await?,
            )
        },
    )?;

    Ok(PerformanceMetrics {
        response_times: RESPONSE_TIMES,
        funnel: build_funnel(
            views,
            funnel_row.bookings,
            funnel_row.confirmations,
            funnel_row.completions,
        ),
        seasonality: seasonal_indexes(month_rows),
        top_products: products.into_iter().map(entity_entry).collect(),
        top_owners: owners.into_iter().map(entity_entry).collect(),
        top_locations: locations
            .into_iter()
            .map(|r| LeaderboardEntry {
                id: None,
                name: r.name,
                bookings: r.bookings,
                revenue: r.revenue,
            })
            .collect(),
    })
}

async fn fetch_one_funnel(
    pool: &PgPool,
    mut qb: sqlx::QueryBuilder<'static, sqlx::Postgres>,
) -> Result<FunnelRow, AppError> {
    Ok(qb.build_query_as::<FunnelRow>().fetch_one(pool).await?)
}

fn entity_entry(row: EntityRow) -> LeaderboardEntry {
    LeaderboardEntry {
        id: Some(row.id),
        name: row.name,
        bookings: row.bookings,
        revenue: row.revenue,
    }
}

/// Views → bookings → confirmations → completions, with each stage's
/// conversion measured against the stage before it.
fn build_funnel(views: i64, bookings: i64, confirmations: i64, completions: i64) -> Vec<FunnelStage> {
    let stages = [
        ("views", views),
        ("bookings", bookings),
        ("confirmations", confirmations),
        ("completions", completions),
    ];

    let mut funnel = Vec::with_capacity(stages.len());
    let mut previous: Option<i64> = None;
    for (stage, count) in stages {
        let conversion_rate = match previous {
            None => 100.0,
            Some(0) => 0.0,
            Some(prior) => count as f64 / prior as f64 * 100.0,
        };
        funnel.push(FunnelStage {
            stage: stage.to_string(),
            count,
            conversion_rate,
            drop_off_rate: 100.0 - conversion_rate,
        });
        previous = Some(count);
    }
    funnel
}

/// Each month's figures relative to the all-time monthly average; 1.0 means
/// an average month.
fn seasonal_indexes(rows: Vec<MonthRow>) -> Vec<SeasonalIndex> {
    if rows.is_empty() {
        return Vec::new();
    }

    let booking_avg =
        rows.iter().map(|r| r.bookings).sum::<i64>() as f64 / rows.len() as f64;
    let revenue_avg = rows
        .iter()
        .map(|r| r.revenue.to_f64().unwrap_or(0.0))
        .sum::<f64>()
        / rows.len() as f64;

    rows.into_iter()
        .map(|r| SeasonalIndex {
            month: r.month as u32,
            bookings_index: if booking_avg == 0.0 {
                0.0
            } else {
                r.bookings as f64 / booking_avg
            },
            revenue_index: if revenue_avg == 0.0 {
                0.0
            } else {
                r.revenue.to_f64().unwrap_or(0.0) / revenue_avg
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn funnel_stages_convert_against_previous_stage() {
        let funnel = build_funnel(1000, 100, 80, 60);

        assert_eq!(funnel.len(), 4);
        assert_eq!(funnel[0].conversion_rate, 100.0);
        assert_eq!(funnel[1].conversion_rate, 10.0);
        assert_eq!(funnel[1].drop_off_rate, 90.0);
        assert_eq!(funnel[2].conversion_rate, 80.0);
        assert_eq!(funnel[3].conversion_rate, 75.0);
    }

    #[test]
    fn funnel_with_no_views_never_divides_by_zero() {
        let funnel = build_funnel(0, 5, 3, 1);

        assert_eq!(funnel[1].conversion_rate, 0.0);
        assert_eq!(funnel[1].drop_off_rate, 100.0);
    }

    #[test]
    fn seasonal_index_centers_on_average_month() {
        let rows = vec![
            MonthRow {
                month: 6,
                bookings: 20,
                revenue: Decimal::new(2000, 0),
            },
            MonthRow {
                month: 12,
                bookings: 10,
                revenue: Decimal::new(1000, 0),
            },
        ];

        let indexes = seasonal_indexes(rows);

        assert!((indexes[0].bookings_index - 4.0 / 3.0).abs() < 1e-9);
        assert!((indexes[1].bookings_index - 2.0 / 3.0).abs() < 1e-9);
        assert!((indexes[0].revenue_index - 4.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn empty_seasonality_is_safe() {
        assert!(seasonal_indexes(vec![]).is_empty());
    }
}
