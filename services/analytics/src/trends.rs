use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use renthive_common::AppError;

use crate::metrics::ratio_percent;
use crate::models::{BookingTrends, DateRange, Granularity, TrendPoint};
use crate::query::BookingQuery;

#[derive(Debug, sqlx::FromRow)]
struct BookingBucketRow {
    bucket: DateTime<Utc>,
    bookings: i64,
    revenue: Decimal,
    average_value: Decimal,
    cancelled: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct ViewBucketRow {
    bucket: DateTime<Utc>,
    views: i64,
}

pub async fn compute(
    pool: &PgPool,
    query: &BookingQuery,
    range: &DateRange,
    granularity: Granularity,
) -> Result<BookingTrends, AppError> {
    let booking_select = format!(
        "date_trunc('{unit}', b.created_at) AS bucket, \
         COUNT(*) AS bookings, \
         COALESCE(SUM(b.total_amount) FILTER (WHERE b.status <> 'cancelled'), 0) AS revenue, \
         COALESCE(AVG(b.total_amount) FILTER (WHERE b.status <> 'cancelled'), 0) AS average_value, \
         COUNT(*) FILTER (WHERE b.status = 'cancelled') AS cancelled",
        unit = granularity.trunc_unit()
    );
    let mut booking_query = query.bookings(&booking_select, range);
    booking_query.push(" GROUP BY bucket ORDER BY bucket");

    let view_select = format!(
        "date_trunc('{unit}', pv.viewed_at) AS bucket, COUNT(*) AS views",
        unit = granularity.trunc_unit()
    );
    let mut view_query = query.views(&view_select, range);
    view_query.push(" GROUP BY bucket ORDER BY bucket");

    let (booking_rows, view_rows) = tokio::try_join!(
        async {
            Ok::<_, AppError>(
                booking_query
                    .build_query_as::<BookingBucketRow>()
                    .fetch_all(pool)
                    .await?,
            )
        },
        async {
            Ok::<_, AppError>(
                view_query
                    .build_query_as::<ViewBucketRow>()
                    .fetch_all(pool)
                    .await?,
            )
        },
    )?;

    Ok(BookingTrends {
        granularity,
        points: merge_series(booking_rows, view_rows, granularity),
    })
}

/// Align the booking and view series on their bucket timestamps. Buckets
/// present in only one series are zero-filled on the other side.
fn merge_series(
    booking_rows: Vec<BookingBucketRow>,
    view_rows: Vec<ViewBucketRow>,
    granularity: Granularity,
) -> Vec<TrendPoint> {
    let mut buckets: BTreeMap<DateTime<Utc>, (Option<BookingBucketRow>, i64)> = BTreeMap::new();

    for row in booking_rows {
        let bucket = row.bucket;
        buckets.entry(bucket).or_insert((None, 0)).0 = Some(row);
    }
    for row in view_rows {
        buckets.entry(row.bucket).or_insert((None, 0)).1 = row.views;
    }

    buckets
        .into_iter()
        .map(|(bucket, (booking, views))| {
            let (bookings, revenue, average_value, cancelled) = match booking {
                Some(row) => (row.bookings, row.revenue, row.average_value, row.cancelled),
                None => (0, Decimal::ZERO, Decimal::ZERO, 0),
            };
            TrendPoint {
                date: granularity.bucket_label(bucket),
                bookings,
                revenue,
                average_value,
                conversion_rate: ratio_percent(bookings, views),
                cancellation_rate: ratio_percent(cancelled, bookings),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 7, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn series_align_on_bucket_keys() {
        let bookings = vec![
            BookingBucketRow {
                bucket: day(1),
                bookings: 4,
                revenue: Decimal::new(40000, 2),
                average_value: Decimal::new(10000, 2),
                cancelled: 1,
            },
            BookingBucketRow {
                bucket: day(3),
                bookings: 2,
                revenue: Decimal::new(20000, 2),
                average_value: Decimal::new(10000, 2),
                cancelled: 0,
            },
        ];
        let views = vec![
            ViewBucketRow {
                bucket: day(1),
                views: 16,
            },
            ViewBucketRow {
                bucket: day(2),
                views: 9,
            },
        ];

        let points = merge_series(bookings, views, Granularity::Day);

        assert_eq!(points.len(), 3);
        assert_eq!(points[0].date, "2026-07-01");
        assert_eq!(points[0].conversion_rate, 25.0);
        assert_eq!(points[0].cancellation_rate, 25.0);

        // View-only bucket zero-fills the booking side.
        assert_eq!(points[1].date, "2026-07-02");
        assert_eq!(points[1].bookings, 0);
        assert_eq!(points[1].conversion_rate, 0.0);

        // Booking-only bucket has no views, so conversion stays 0.
        assert_eq!(points[2].date, "2026-07-03");
        assert_eq!(points[2].conversion_rate, 0.0);
    }

    #[test]
    fn bucket_labels_follow_granularity() {
        let ts = Utc.with_ymd_and_hms(2026, 2, 7, 13, 0, 0).unwrap();
        assert_eq!(Granularity::Hour.bucket_label(ts), "2026-02-07 13:00");
        assert_eq!(Granularity::Day.bucket_label(ts), "2026-02-07");
        assert_eq!(Granularity::Month.bucket_label(ts), "2026-02");
    }
}
