use std::collections::HashMap;
use std::str::FromStr;

use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use renthive_common::{AppError, BookingStatus};

use crate::metrics::{percent_change, ratio_percent};
use crate::models::{
    CategoryBreakdown, CityBreakdown, CountryBreakdown, DateRange, GeographicAnalytics,
    HeatmapPoint, ProductSummary, ResolvedPeriods, StatusBreakdown, TrendDirection,
};
use crate::query::BookingQuery;

/// Growth beyond this magnitude (percent) flips a status trend off `stable`.
const TREND_THRESHOLD: f64 = 5.0;

const TOP_CITIES: i64 = 20;
const TOP_PRODUCTS_PER_CATEGORY: usize = 5;

const REVENUE_SUM: &str = "COALESCE(SUM(b.total_amount) FILTER (WHERE b.status <> 'cancelled'), 0)";
const REVENUE_AVG: &str = "COALESCE(AVG(b.total_amount) FILTER (WHERE b.status <> 'cancelled'), 0)";

// Status distribution

#[derive(Debug, sqlx::FromRow)]
struct StatusRow {
    status: String,
    count: i64,
    revenue: Decimal,
    average_value: Decimal,
}

pub async fn status_distribution(
    pool: &PgPool,
    query: &BookingQuery,
    periods: &ResolvedPeriods,
) -> Result<Vec<StatusBreakdown>, AppError> {
    let (current, previous) = tokio::try_join!(
        status_rows(pool, query, &periods.current),
        status_rows(pool, query, &periods.previous),
    )?;

    build_distribution(current, previous)
}

async fn status_rows(
    pool: &PgPool,
    query: &BookingQuery,
    range: &DateRange,
) -> Result<Vec<StatusRow>, AppError> {
    let select = "b.status AS status, COUNT(*) AS count, \
         COALESCE(SUM(b.total_amount), 0) AS revenue, \
         COALESCE(AVG(b.total_amount), 0) AS average_value";
    let mut qb = query.bookings(select, range);
    qb.push(" GROUP BY b.status");
    Ok(qb.build_query_as::<StatusRow>().fetch_all(pool).await?)
}

fn build_distribution(
    current: Vec<StatusRow>,
    previous: Vec<StatusRow>,
) -> Result<Vec<StatusBreakdown>, AppError> {
    let total: i64 = current.iter().map(|r| r.count).sum();
    let previous_counts: HashMap<String, i64> =
        previous.into_iter().map(|r| (r.status, r.count)).collect();

    let mut breakdown = Vec::with_capacity(current.len());
    for row in current {
        let status = BookingStatus::from_str(&row.status).map_err(AppError::Internal)?;
        let prior = previous_counts.get(row.status.as_str()).copied().unwrap_or(0);
        let growth = percent_change(row.count as f64, prior as f64);

        breakdown.push(StatusBreakdown {
            status,
            count: row.count,
            percentage: ratio_percent(row.count, total),
            revenue: row.revenue,
            average_value: row.average_value,
            trend: trend_direction(growth),
        });
    }

    breakdown.sort_by(|a, b| b.count.cmp(&a.count));
    Ok(breakdown)
}

fn trend_direction(growth: f64) -> TrendDirection {
    if growth > TREND_THRESHOLD {
        TrendDirection::Up
    } else if growth < -TREND_THRESHOLD {
        TrendDirection::Down
    } else {
        TrendDirection::Stable
    }
}

// Geography

#[derive(Debug, sqlx::FromRow)]
struct CountryRow {
    country: String,
    bookings: i64,
    revenue: Decimal,
    average_value: Decimal,
}

#[derive(Debug, sqlx::FromRow)]
struct CityRow {
    city: String,
    country: String,
    bookings: i64,
    revenue: Decimal,
}

#[derive(Debug, sqlx::FromRow)]
struct CoordinateRow {
    latitude: f64,
    longitude: f64,
    bookings: i64,
}

pub async fn geographic(
    pool: &PgPool,
    query: &BookingQuery,
    range: &DateRange,
) -> Result<GeographicAnalytics, AppError> {
    let country_select = format!(
        "COALESCE(co.name, 'Unknown') AS country, COUNT(*) AS bookings, \
         {REVENUE_SUM} AS revenue, {REVENUE_AVG} AS average_value"
    );
    let mut country_query = query.bookings(&country_select, range);
    country_query.push(" GROUP BY co.name ORDER BY revenue DESC");

    let city_select = format!(
        "p.city AS city, COALESCE(co.name, 'Unknown') AS country, \
         COUNT(*) AS bookings, {REVENUE_SUM} AS revenue"
    );
    let mut city_query = query.bookings(&city_select, range);
    city_query
        .push(" GROUP BY p.city, co.name ORDER BY revenue DESC LIMIT ")
        .push_bind(TOP_CITIES);

    let mut coordinate_query = query.bookings(
        "p.latitude AS latitude, p.longitude AS longitude, COUNT(*) AS bookings",
        range,
    );
    coordinate_query.push(
        " AND p.latitude IS NOT NULL AND p.longitude IS NOT NULL \
         GROUP BY p.latitude, p.longitude",
    );

    let (countries, cities, coordinates) = tokio::try_join!(
        async {
            Ok::<_, AppError>(
                country_query
                    .build_query_as::<CountryRow>()
                    .fetch_all(pool)
                    .await?,
            )
        },
        async {
            Ok::<_, AppError>(city_query.build_query_as::<CityRow>().fetch_all(pool).await?)
        },
        async {
            Ok::<_, AppError>(
                coordinate_query
                    .build_query_as::<CoordinateRow>()
                    .fetch_all(pool)
                    .await?,
            )
        },
    )?;

    Ok(GeographicAnalytics {
        countries: countries
            .into_iter()
            .map(|r| CountryBreakdown {
                country: r.country,
                bookings: r.bookings,
                revenue: r.revenue,
                average_value: r.average_value,
            })
            .collect(),
        top_cities: cities
            .into_iter()
            .map(|r| CityBreakdown {
                city: r.city,
                country: r.country,
                bookings: r.bookings,
                revenue: r.revenue,
            })
            .collect(),
        heatmap: normalize_heatmap(coordinates),
    })
}

/// Intensity is each point's booking count over the maximum in the set.
fn normalize_heatmap(coordinates: Vec<CoordinateRow>) -> Vec<HeatmapPoint> {
    let max = coordinates.iter().map(|c| c.bookings).max().unwrap_or(0);
    coordinates
        .into_iter()
        .map(|c| HeatmapPoint {
            latitude: c.latitude,
            longitude: c.longitude,
            bookings: c.bookings,
            intensity: if max == 0 {
                0.0
            } else {
                c.bookings as f64 / max as f64
            },
        })
        .collect()
}

// Categories

#[derive(Debug, sqlx::FromRow)]
struct CategoryRow {
    category_id: Uuid,
    category: String,
    bookings: i64,
    revenue: Decimal,
    average_value: Decimal,
}

#[derive(Debug, sqlx::FromRow)]
struct CategoryProductRow {
    category_id: Uuid,
    product_id: Uuid,
    title: String,
    bookings: i64,
    revenue: Decimal,
}

#[derive(Debug, sqlx::FromRow)]
struct CategoryViewsRow {
    category_id: Uuid,
    views: i64,
}

pub async fn categories(
    pool: &PgPool,
    query: &BookingQuery,
    range: &DateRange,
) -> Result<Vec<CategoryBreakdown>, AppError> {
    let category_select = format!(
        "c.id AS category_id, c.name AS category, COUNT(*) AS bookings, \
         {REVENUE_SUM} AS revenue, {REVENUE_AVG} AS average_value"
    );
    let mut category_query = query.bookings(&category_select, range);
    category_query.push(" GROUP BY c.id, c.name ORDER BY revenue DESC");

    let product_select = format!(
        "c.id AS category_id, p.id AS product_id, p.title AS title, \
         COUNT(*) AS bookings, {REVENUE_SUM} AS revenue"
    );
    let mut product_query = query.bookings(&product_select, range);
    product_query.push(" GROUP BY c.id, p.id, p.title ORDER BY c.id, revenue DESC");

    let mut views_query = query.views("c.id AS category_id, COUNT(*) AS views", range);
    views_query.push(" GROUP BY c.id");

    let (category_rows, product_rows, view_rows) = tokio::try_join!(
        async {
            Ok::<_, AppError>(
                category_query
                    .build_query_as::<CategoryRow>()
                    .fetch_all(pool)
                    .await?,
            )
        },
        async {
            Ok::<_, AppError>(
                product_query
                    .build_query_as::<CategoryProductRow>()
                    .fetch_all(pool)
                    .await?,
            )
        },
        async {
            Ok::<_, AppError>(
                views_query
                    .build_query_as::<CategoryViewsRow>()
                    .fetch_all(pool)
                    .await?,
            )
        },
    )?;

    let views: HashMap<Uuid, i64> = view_rows
        .into_iter()
        .map(|r| (r.category_id, r.views))
        .collect();

    let mut top_products: HashMap<Uuid, Vec<ProductSummary>> = HashMap::new();
    for row in product_rows {
        let entry = top_products.entry(row.category_id).or_default();
        if entry.len() < TOP_PRODUCTS_PER_CATEGORY {
            entry.push(ProductSummary {
                product_id: row.product_id,
                title: row.title,
                bookings: row.bookings,
                revenue: row.revenue,
            });
        }
    }

    // category_rows arrive ordered by revenue, so rank is positional.
    Ok(category_rows
        .into_iter()
        .enumerate()
        .map(|(index, row)| {
            let category_views = views.get(&row.category_id).copied().unwrap_or(0);
            CategoryBreakdown {
                conversion_rate: ratio_percent(row.bookings, category_views),
                popularity_rank: index + 1,
                top_products: top_products.remove(&row.category_id).unwrap_or_default(),
                category_id: row.category_id,
                category: row.category,
                bookings: row.bookings,
                revenue: row.revenue,
                average_value: row.average_value,
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_row(status: &str, count: i64, revenue: i64) -> StatusRow {
        StatusRow {
            status: status.to_string(),
            count,
            revenue: Decimal::new(revenue, 0),
            average_value: if count == 0 {
                Decimal::ZERO
            } else {
                Decimal::new(revenue / count, 0)
            },
        }
    }

    #[test]
    fn percentages_sum_to_one_hundred() {
        let current = vec![
            status_row("confirmed", 5, 500),
            status_row("completed", 3, 300),
            status_row("cancelled", 2, 200),
        ];
        let breakdown = build_distribution(current, vec![]).unwrap();

        let sum: f64 = breakdown.iter().map(|s| s.percentage).sum();
        assert!((sum - 100.0).abs() < 1e-9);
    }

    #[test]
    fn trend_direction_uses_five_percent_threshold() {
        assert_eq!(trend_direction(5.1), TrendDirection::Up);
        assert_eq!(trend_direction(-5.1), TrendDirection::Down);
        assert_eq!(trend_direction(4.9), TrendDirection::Stable);
        assert_eq!(trend_direction(-5.0), TrendDirection::Stable);
    }

    #[test]
    fn status_trend_compares_against_previous_period() {
        let current = vec![status_row("confirmed", 12, 1200)];
        let previous = vec![status_row("confirmed", 10, 1000)];
        let breakdown = build_distribution(current, previous).unwrap();

        assert_eq!(breakdown[0].trend, TrendDirection::Up);

        // A status absent from the previous period reads as fresh growth.
        let fresh = build_distribution(vec![status_row("disputed", 1, 100)], vec![]).unwrap();
        assert_eq!(fresh[0].trend, TrendDirection::Up);
    }

    #[test]
    fn unknown_status_fails_distribution() {
        let current = vec![status_row("archived", 1, 100)];
        assert!(build_distribution(current, vec![]).is_err());
    }

    #[test]
    fn heatmap_intensity_normalizes_against_max() {
        let points = normalize_heatmap(vec![
            CoordinateRow {
                latitude: 52.5,
                longitude: 13.4,
                bookings: 8,
            },
            CoordinateRow {
                latitude: 48.1,
                longitude: 11.6,
                bookings: 2,
            },
        ]);

        assert_eq!(points[0].intensity, 1.0);
        assert_eq!(points[1].intensity, 0.25);
    }

    #[test]
    fn empty_heatmap_is_safe() {
        assert!(normalize_heatmap(vec![]).is_empty());
    }
}
