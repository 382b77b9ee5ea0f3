use renthive_common::SeverityLevel;
use rust_decimal::prelude::ToPrimitive;

use crate::models::{CoreMetricsReport, Insight, InsightKind};

const REVENUE_GROWTH_THRESHOLD: f64 = 20.0;
const CANCELLATION_WARNING_THRESHOLD: f64 = 15.0;
const LOW_CONVERSION_THRESHOLD: f64 = 5.0;

/// Rule-based observations over the core metrics. The rules are independent
/// and evaluated in a fixed order; any subset can fire.
pub fn generate(metrics: &CoreMetricsReport) -> Vec<Insight> {
    let mut insights = Vec::new();

    if metrics.growth.total_revenue > REVENUE_GROWTH_THRESHOLD {
        insights.push(Insight {
            kind: InsightKind::Growth,
            severity: SeverityLevel::Low,
            metric: "total_revenue".to_string(),
            value: metrics.current.total_revenue.to_f64().unwrap_or(0.0),
            change: Some(metrics.growth.total_revenue),
            message: format!(
                "Revenue grew {:.1}% compared to the previous period",
                metrics.growth.total_revenue
            ),
            recommendation: "Consider scaling inventory in the best-performing categories"
                .to_string(),
        });
    }

    if metrics.current.cancellation_rate > CANCELLATION_WARNING_THRESHOLD {
        insights.push(Insight {
            kind: InsightKind::Warning,
            severity: SeverityLevel::High,
            metric: "cancellation_rate".to_string(),
            value: metrics.current.cancellation_rate,
            change: Some(metrics.growth.cancellation_rate),
            message: format!(
                "Cancellation rate is {:.1}%, above the {:.0}% alert threshold",
                metrics.current.cancellation_rate, CANCELLATION_WARNING_THRESHOLD
            ),
            recommendation: "Review cancellation reasons and tighten owner confirmation times"
                .to_string(),
        });
    }

    if metrics.current.conversion_rate < LOW_CONVERSION_THRESHOLD {
        insights.push(Insight {
            kind: InsightKind::Opportunity,
            severity: SeverityLevel::Medium,
            metric: "conversion_rate".to_string(),
            value: metrics.current.conversion_rate,
            change: Some(metrics.growth.conversion_rate),
            message: format!(
                "Only {:.1}% of product views convert into bookings",
                metrics.current.conversion_rate
            ),
            recommendation: "Improve listing quality and pricing on frequently viewed products"
                .to_string(),
        });
    }

    insights
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CoreMetrics, MetricsGrowth};
    use rust_decimal::Decimal;

    fn metrics(revenue_growth: f64, cancellation_rate: f64, conversion_rate: f64) -> CoreMetricsReport {
        let base = CoreMetrics {
            total_bookings: 50,
            total_revenue: Decimal::new(500_000, 2),
            average_booking_value: Decimal::new(10_000, 2),
            cancellation_rate,
            completion_rate: 80.0,
            conversion_rate,
            repeat_customer_rate: 30.0,
            average_lead_time_days: 4.0,
            average_duration_days: 3.0,
        };
        CoreMetricsReport {
            previous: base.clone(),
            current: base,
            growth: MetricsGrowth {
                total_bookings: 0.0,
                total_revenue: revenue_growth,
                average_booking_value: 0.0,
                conversion_rate: 0.0,
                cancellation_rate: 0.0,
                completion_rate: 0.0,
            },
        }
    }

    #[test]
    fn revenue_growth_over_twenty_percent_fires_growth_insight() {
        let insights = generate(&metrics(25.0, 5.0, 10.0));

        assert_eq!(insights.len(), 1);
        assert_eq!(insights[0].kind, InsightKind::Growth);
        assert_eq!(insights[0].metric, "total_revenue");
        assert_eq!(insights[0].change, Some(25.0));
    }

    #[test]
    fn high_cancellation_adds_warning() {
        let insights = generate(&metrics(25.0, 18.0, 10.0));

        assert_eq!(insights.len(), 2);
        assert_eq!(insights[0].kind, InsightKind::Growth);
        assert_eq!(insights[1].kind, InsightKind::Warning);
        assert_eq!(insights[1].metric, "cancellation_rate");
    }

    #[test]
    fn low_conversion_adds_opportunity() {
        let insights = generate(&metrics(0.0, 5.0, 3.0));

        assert_eq!(insights.len(), 1);
        assert_eq!(insights[0].kind, InsightKind::Opportunity);
        assert_eq!(insights[0].metric, "conversion_rate");
    }

    #[test]
    fn all_rules_can_fire_together() {
        let insights = generate(&metrics(30.0, 20.0, 1.0));

        let kinds: Vec<InsightKind> = insights.iter().map(|i| i.kind).collect();
        assert_eq!(
            kinds,
            vec![
                InsightKind::Growth,
                InsightKind::Warning,
                InsightKind::Opportunity
            ]
        );
    }

    #[test]
    fn quiet_metrics_produce_no_insights() {
        assert!(generate(&metrics(10.0, 5.0, 10.0)).is_empty());
    }
}
