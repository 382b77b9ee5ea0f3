use sha2::{Digest, Sha256};

use renthive_common::{RedisKeys, RedisService};

use crate::models::{AnalyticsParams, AnalyticsReport};

/// Cache key for a parameter set: sha256 over the canonical JSON encoding,
/// so identical queries land on the same entry.
pub fn report_cache_key(params: &AnalyticsParams) -> String {
    let canonical = serde_json::to_vec(params).unwrap_or_default();
    let digest = Sha256::digest(&canonical);
    RedisKeys::booking_report(&hex::encode(digest))
}

/// Best-effort read performed by the calling layer before a report is
/// regenerated.
pub async fn read_report(redis: &RedisService, params: &AnalyticsParams) -> Option<AnalyticsReport> {
    match redis.cache_get(&report_cache_key(params)).await {
        Ok(report) => report,
        Err(e) => {
            tracing::warn!("analytics cache read failed: {}", e);
            None
        }
    }
}

/// Fire-and-forget write after assembly. Never blocks or fails the
/// caller-visible result; failures are logged and swallowed.
pub fn store_report(
    redis: RedisService,
    params: &AnalyticsParams,
    report: &AnalyticsReport,
    ttl_seconds: u64,
) {
    let key = report_cache_key(params);
    let report = report.clone();
    tokio::spawn(async move {
        if let Err(e) = redis.set_with_expiry(&key, &report, ttl_seconds).await {
            tracing::warn!("analytics cache write failed: {}", e);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Granularity, PeriodToken};

    #[test]
    fn cache_key_is_deterministic() {
        let params = AnalyticsParams {
            period: Some(PeriodToken::SevenDays),
            granularity: Some(Granularity::Day),
            ..Default::default()
        };

        assert_eq!(report_cache_key(&params), report_cache_key(&params));
    }

    #[test]
    fn cache_key_depends_on_parameters() {
        let weekly = AnalyticsParams {
            period: Some(PeriodToken::SevenDays),
            ..Default::default()
        };
        let monthly = AnalyticsParams {
            period: Some(PeriodToken::ThirtyDays),
            ..Default::default()
        };

        assert_ne!(report_cache_key(&weekly), report_cache_key(&monthly));
    }

    #[test]
    fn cache_key_carries_the_analytics_prefix() {
        let key = report_cache_key(&AnalyticsParams::default());
        assert!(key.starts_with("analytics:bookings:report:"));
        // sha256 hex digest
        assert_eq!(key.rsplit(':').next().unwrap().len(), 64);
    }
}
