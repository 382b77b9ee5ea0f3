use chrono::{DateTime, Utc};
use renthive_common::{BookingStatus, SeverityLevel};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// Request types

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PeriodToken {
    #[serde(rename = "7d")]
    SevenDays,
    #[serde(rename = "30d")]
    ThirtyDays,
    #[serde(rename = "90d")]
    NinetyDays,
    #[serde(rename = "1y")]
    OneYear,
    #[serde(rename = "custom")]
    Custom,
}

impl PeriodToken {
    /// Window length in days. `custom` carries no length of its own and
    /// falls back to the default window.
    pub fn days(&self) -> i64 {
        match self {
            PeriodToken::SevenDays => 7,
            PeriodToken::ThirtyDays => 30,
            PeriodToken::NinetyDays => 90,
            PeriodToken::OneYear => 365,
            PeriodToken::Custom => 30,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    Hour,
    Day,
    Week,
    Month,
}

impl Granularity {
    /// Unit name passed to Postgres `date_trunc`.
    pub fn trunc_unit(&self) -> &'static str {
        match self {
            Granularity::Hour => "hour",
            Granularity::Day => "day",
            Granularity::Week => "week",
            Granularity::Month => "month",
        }
    }

    /// Date-key format for aligning the booking and view series.
    pub fn bucket_label(&self, bucket: DateTime<Utc>) -> String {
        match self {
            Granularity::Hour => bucket.format("%Y-%m-%d %H:00").to_string(),
            Granularity::Day | Granularity::Week => bucket.format("%Y-%m-%d").to_string(),
            Granularity::Month => bucket.format("%Y-%m").to_string(),
        }
    }
}

/// Caller-supplied booking filters. Absent fields add no predicate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookingFilters {
    pub statuses: Option<Vec<BookingStatus>>,
    pub country_id: Option<Uuid>,
    pub category_id: Option<Uuid>,
    pub owner_id: Option<Uuid>,
    pub renter_id: Option<Uuid>,
    pub min_amount: Option<Decimal>,
    pub max_amount: Option<Decimal>,
    pub product_ids: Option<Vec<Uuid>>,
}

/// Explicit comparison window: the previous period ends the instant before
/// the current one starts and spans this token's day count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonPeriod {
    pub period: PeriodToken,
}

/// Immutable input for one report generation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalyticsParams {
    pub period: Option<PeriodToken>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub granularity: Option<Granularity>,
    pub filters: Option<BookingFilters>,
    pub comparison: Option<ComparisonPeriod>,
}

impl Default for PeriodToken {
    fn default() -> Self {
        PeriodToken::ThirtyDays
    }
}

// Resolved periods

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ResolvedPeriods {
    pub current: DateRange,
    pub previous: DateRange,
}

// Core metrics

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreMetrics {
    pub total_bookings: i64,
    pub total_revenue: Decimal,
    pub average_booking_value: Decimal,
    pub cancellation_rate: f64,
    pub completion_rate: f64,
    pub conversion_rate: f64,
    pub repeat_customer_rate: f64,
    pub average_lead_time_days: f64,
    pub average_duration_days: f64,
}

/// Period-over-period change per headline metric, in percent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsGrowth {
    pub total_bookings: f64,
    pub total_revenue: f64,
    pub average_booking_value: f64,
    pub conversion_rate: f64,
    pub cancellation_rate: f64,
    pub completion_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreMetricsReport {
    pub current: CoreMetrics,
    pub previous: CoreMetrics,
    pub growth: MetricsGrowth,
}

// Trends

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendPoint {
    pub date: String,
    pub bookings: i64,
    pub revenue: Decimal,
    pub average_value: Decimal,
    pub conversion_rate: f64,
    pub cancellation_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingTrends {
    pub granularity: Granularity,
    pub points: Vec<TrendPoint>,
}

// Status distribution

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Up,
    Down,
    Stable,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusBreakdown {
    pub status: BookingStatus,
    pub count: i64,
    pub percentage: f64,
    pub revenue: Decimal,
    pub average_value: Decimal,
    pub trend: TrendDirection,
}

// Geography

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountryBreakdown {
    pub country: String,
    pub bookings: i64,
    pub revenue: Decimal,
    pub average_value: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CityBreakdown {
    pub city: String,
    pub country: String,
    pub bookings: i64,
    pub revenue: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeatmapPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub bookings: i64,
    /// Booking count normalized against the maximum in the set, in (0, 1].
    pub intensity: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeographicAnalytics {
    pub countries: Vec<CountryBreakdown>,
    pub top_cities: Vec<CityBreakdown>,
    pub heatmap: Vec<HeatmapPoint>,
}

// Categories

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductSummary {
    pub product_id: Uuid,
    pub title: String,
    pub bookings: i64,
    pub revenue: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryBreakdown {
    pub category_id: Uuid,
    pub category: String,
    pub bookings: i64,
    pub revenue: Decimal,
    pub average_value: Decimal,
    pub conversion_rate: f64,
    pub popularity_rank: usize,
    pub top_products: Vec<ProductSummary>,
}

// User behavior

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerSplit {
    pub new_renters: i64,
    pub returning_renters: i64,
    pub new_renter_bookings: i64,
    pub returning_renter_bookings: i64,
    pub new_share_percentage: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionPoint {
    pub month: u32,
    pub retention_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifetimeStats {
    pub average_lifetime_value: Decimal,
    pub average_bookings_per_renter: f64,
    pub retention_curve: Vec<RetentionPoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HourWeekdayCount {
    /// 0 = Sunday, matching Postgres EXTRACT(DOW).
    pub weekday: i32,
    pub hour: i32,
    pub bookings: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvanceBucket {
    pub label: String,
    pub bookings: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingPatterns {
    pub by_hour_and_weekday: Vec<HourWeekdayCount>,
    pub advance_booking: Vec<AdvanceBucket>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserBehaviorAnalytics {
    pub customers: CustomerSplit,
    pub lifetime: LifetimeStats,
    pub timing: TimingPatterns,
}

// Revenue

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevenueBreakdown {
    pub gross_revenue: Decimal,
    pub platform_fees: Decimal,
    pub owner_payouts: Decimal,
    pub taxes: Decimal,
    pub refunds: Decimal,
    pub net_revenue: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentMethodShare {
    pub method: String,
    pub payments: i64,
    pub amount: Decimal,
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeSplit {
    pub booking_fees: Decimal,
    pub service_fees: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevenueProjection {
    pub next_month: Decimal,
    pub next_quarter: Decimal,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevenueAnalytics {
    pub breakdown: RevenueBreakdown,
    pub payment_methods: Vec<PaymentMethodShare>,
    pub fees: FeeSplit,
    pub projection: RevenueProjection,
}

// Performance

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseTimes {
    pub average_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunnelStage {
    pub stage: String,
    pub count: i64,
    /// Share of the previous stage that reached this one, in percent.
    pub conversion_rate: f64,
    pub drop_off_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeasonalIndex {
    pub month: u32,
    pub bookings_index: f64,
    pub revenue_index: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub id: Option<Uuid>,
    pub name: String,
    pub bookings: i64,
    pub revenue: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub response_times: ResponseTimes,
    pub funnel: Vec<FunnelStage>,
    pub seasonality: Vec<SeasonalIndex>,
    pub top_products: Vec<LeaderboardEntry>,
    pub top_owners: Vec<LeaderboardEntry>,
    pub top_locations: Vec<LeaderboardEntry>,
}

// Insights

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightKind {
    Growth,
    Warning,
    Opportunity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Insight {
    pub kind: InsightKind,
    pub severity: SeverityLevel,
    pub metric: String,
    pub value: f64,
    pub change: Option<f64>,
    pub message: String,
    pub recommendation: String,
}

// Assembled report

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsReport {
    pub generated_at: DateTime<Utc>,
    pub period: ResolvedPeriods,
    pub granularity: Granularity,
    pub metrics: CoreMetricsReport,
    pub trends: BookingTrends,
    pub status_distribution: Vec<StatusBreakdown>,
    pub geography: GeographicAnalytics,
    pub categories: Vec<CategoryBreakdown>,
    pub user_behavior: UserBehaviorAnalytics,
    pub revenue: RevenueAnalytics,
    pub performance: PerformanceMetrics,
    pub insights: Vec<Insight>,
}
