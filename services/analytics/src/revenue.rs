use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sqlx::PgPool;

use renthive_common::AppError;

use crate::models::{
    DateRange, FeeSplit, PaymentMethodShare, RevenueAnalytics, RevenueBreakdown, RevenueProjection,
};
use crate::query::BookingQuery;

// Naive projection multipliers carried over from the source system.
const NEXT_MONTH_MULTIPLIER: Decimal = Decimal::from_parts(11, 0, 0, false, 1);
const NEXT_QUARTER_MULTIPLIER: Decimal = Decimal::from_parts(33, 0, 0, false, 1);
const PROJECTION_CONFIDENCE: f64 = 0.7;

#[derive(Debug, sqlx::FromRow)]
struct RevenueRow {
    gross_revenue: Decimal,
    platform_fees: Decimal,
    service_fees: Decimal,
    taxes: Decimal,
    refunds: Decimal,
}

#[derive(Debug, sqlx::FromRow)]
struct MethodRow {
    method: String,
    payments: i64,
    amount: Decimal,
}

pub async fn compute(
    pool: &PgPool,
    query: &BookingQuery,
    range: &DateRange,
) -> Result<RevenueAnalytics, AppError> {
    let mut totals_query = query.bookings(
        "COALESCE(SUM(b.total_amount) FILTER (WHERE b.status <> 'cancelled'), 0) AS gross_revenue, \
         COALESCE(SUM(b.platform_fee) FILTER (WHERE b.status <> 'cancelled'), 0) AS platform_fees, \
         COALESCE(SUM(b.service_fee) FILTER (WHERE b.status <> 'cancelled'), 0) AS service_fees, \
         COALESCE(SUM(b.tax_amount) FILTER (WHERE b.status <> 'cancelled'), 0) AS taxes, \
         COALESCE(SUM(b.refund_amount), 0) AS refunds",
        range,
    );

    let mut method_query = query.payments(
        "pay.method AS method, COUNT(*) AS payments, COALESCE(SUM(pay.amount), 0) AS amount",
        range,
    );
    method_query.push(" AND pay.status = 'completed' GROUP BY pay.method ORDER BY amount DESC");

    let (row, method_rows) = tokio::try_join!(
        async {
            Ok::<_, AppError>(
                totals_query
                    .build_query_as::<RevenueRow>()
                    .fetch_one(pool)
                    .await?,
            )
        },
        async {
            Ok::<_, AppError>(
                method_query
                    .build_query_as::<MethodRow>()
                    .fetch_all(pool)
                    .await?,
            )
        },
    )?;

    let breakdown = build_breakdown(&row);
    let projection = project(breakdown.gross_revenue);

    Ok(RevenueAnalytics {
        payment_methods: build_method_shares(method_rows),
        fees: FeeSplit {
            booking_fees: row.platform_fees,
            service_fees: row.service_fees,
        },
        breakdown,
        projection,
    })
}

fn build_breakdown(row: &RevenueRow) -> RevenueBreakdown {
    RevenueBreakdown {
        gross_revenue: row.gross_revenue,
        platform_fees: row.platform_fees,
        owner_payouts: row.gross_revenue - row.platform_fees - row.service_fees,
        taxes: row.taxes,
        refunds: row.refunds,
        net_revenue: row.gross_revenue - row.refunds - row.taxes,
    }
}

fn build_method_shares(rows: Vec<MethodRow>) -> Vec<PaymentMethodShare> {
    let total: Decimal = rows.iter().map(|r| r.amount).sum();
    rows.into_iter()
        .map(|r| {
            let percentage = if total.is_zero() {
                0.0
            } else {
                (r.amount / total * Decimal::ONE_HUNDRED)
                    .to_f64()
                    .unwrap_or(0.0)
            };
            PaymentMethodShare {
                method: r.method,
                payments: r.payments,
                amount: r.amount,
                percentage,
            }
        })
        .collect()
}

fn project(gross_revenue: Decimal) -> RevenueProjection {
    RevenueProjection {
        next_month: gross_revenue * NEXT_MONTH_MULTIPLIER,
        next_quarter: gross_revenue * NEXT_QUARTER_MULTIPLIER,
        confidence: PROJECTION_CONFIDENCE,
    }
}
