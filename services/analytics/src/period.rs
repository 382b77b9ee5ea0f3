use chrono::{Duration, Utc};

use crate::models::{AnalyticsParams, DateRange, PeriodToken, ResolvedPeriods};

/// Resolve the caller's period selection into a current window and a
/// comparison window.
///
/// The previous window always ends one second before the current window
/// starts. Without an explicit comparison descriptor it mirrors the current
/// window's length; with one it spans that descriptor's day count.
pub fn resolve_periods(params: &AnalyticsParams) -> ResolvedPeriods {
    let token = params.period.unwrap_or_default();

    let current = match (token, params.start_date, params.end_date) {
        (PeriodToken::Custom, Some(start), Some(end)) => DateRange { start, end },
        (PeriodToken::Custom, _, _) => {
            // The source falls back silently when custom bounds are missing;
            // preserved deliberately.
            tracing::debug!("custom period without explicit bounds, using default window");
            default_window(token.days())
        }
        _ => default_window(token.days()),
    };

    let current_length = current.end - current.start;
    let previous_end = current.start - Duration::seconds(1);
    let previous_start = match &params.comparison {
        Some(comparison) => previous_end - Duration::days(comparison.period.days()),
        None => previous_end - current_length,
    };

    ResolvedPeriods {
        current,
        previous: DateRange {
            start: previous_start,
            end: previous_end,
        },
    }
}

fn default_window(days: i64) -> DateRange {
    let end = Utc::now();
    DateRange {
        start: end - Duration::days(days),
        end,
    }
}
