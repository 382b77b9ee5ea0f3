use std::future::Future;
use std::time::{Duration, Instant};

use chrono::Utc;
use sqlx::PgPool;

use renthive_common::{AppError, RedisService};

use crate::config::AnalyticsSettings;
use crate::models::{AnalyticsParams, AnalyticsReport, Granularity};
use crate::period::resolve_periods;
use crate::query::BookingQuery;
use crate::{behavior, cache, insights, metrics, performance, revenue, segments, trends};

#[derive(Clone)]
pub struct AnalyticsService {
    db_pool: PgPool,
    redis_service: RedisService,
    settings: AnalyticsSettings,
}

impl AnalyticsService {
    pub fn new(db_pool: PgPool, redis_service: RedisService, settings: AnalyticsSettings) -> Self {
        Self {
            db_pool,
            redis_service,
            settings,
        }
    }

    /// Assemble a full booking analytics report.
    ///
    /// The calculators run concurrently against the same immutable query
    /// descriptor and fail as a unit: the first error (or per-calculator
    /// timeout) aborts the join and the caller never sees a partial report.
    pub async fn generate_booking_analytics(
        &self,
        params: &AnalyticsParams,
    ) -> Result<AnalyticsReport, AppError> {
        let started = Instant::now();
        let periods = resolve_periods(params);
        let granularity = params.granularity.unwrap_or(Granularity::Day);
        let query = BookingQuery::new(params.filters.clone().unwrap_or_default());
        let budget = Duration::from_secs(self.settings.calculator_timeout_seconds);

        let pool = &self.db_pool;
        let (
            metrics_report,
            trend_report,
            status_distribution,
            geography,
            categories,
            user_behavior,
            revenue_report,
            performance_report,
        ) = tokio::try_join!(
            bounded(budget, "core_metrics", metrics::compute(pool, &query, &periods)),
            bounded(
                budget,
                "trends",
                trends::compute(pool, &query, &periods.current, granularity),
            ),
            bounded(
                budget,
                "status_distribution",
                segments::status_distribution(pool, &query, &periods),
            ),
            bounded(
                budget,
                "geographic",
                segments::geographic(pool, &query, &periods.current),
            ),
            bounded(
                budget,
                "categories",
                segments::categories(pool, &query, &periods.current),
            ),
            bounded(
                budget,
                "user_behavior",
                behavior::compute(pool, &query, &periods.current),
            ),
            bounded(
                budget,
                "revenue",
                revenue::compute(pool, &query, &periods.current),
            ),
            bounded(
                budget,
                "performance",
                performance::compute(pool, &query, &periods.current),
            ),
        )?;

        let insights = insights::generate(&metrics_report);

        let report = AnalyticsReport {
            generated_at: Utc::now(),
            period: periods,
            granularity,
            metrics: metrics_report,
            trends: trend_report,
            status_distribution,
            geography,
            categories,
            user_behavior,
            revenue: revenue_report,
            performance: performance_report,
            insights,
        };

        // Write-after-compute, best-effort: the response never waits on Redis.
        cache::store_report(
            self.redis_service.clone(),
            params,
            &report,
            self.settings.report_cache_ttl_seconds,
        );

        tracing::info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            bookings = report.metrics.current.total_bookings,
            insights = report.insights.len(),
            "booking analytics report generated"
        );

        Ok(report)
    }
}

/// Bound a calculator to the configured budget; a timeout surfaces as a
/// report failure naming the calculator, never as a silently missing
/// sub-report.
async fn bounded<T>(
    budget: Duration,
    name: &'static str,
    fut: impl Future<Output = Result<T, AppError>>,
) -> Result<T, AppError> {
    match tokio::time::timeout(budget, fut).await {
        Ok(result) => result,
        Err(_) => Err(AppError::Timeout(format!(
            "{} calculator exceeded {}s",
            name,
            budget.as_secs()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bounded_passes_results_through() {
        let result = bounded(Duration::from_secs(1), "test", async { Ok(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn bounded_converts_timeout_into_named_failure() {
        let result: Result<(), AppError> = bounded(Duration::from_millis(10), "slow", async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;

        match result {
            Err(AppError::Timeout(message)) => assert!(message.contains("slow")),
            other => panic!("expected timeout, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn bounded_propagates_calculator_errors() {
        let result: Result<(), AppError> = bounded(Duration::from_secs(1), "failing", async {
            Err(AppError::Internal("boom".to_string()))
        })
        .await;

        assert!(matches!(result, Err(AppError::Internal(_))));
    }
}
