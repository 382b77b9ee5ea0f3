use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use crate::models::{BookingFilters, DateRange};

const BOOKING_JOINS: &str = "FROM bookings b \
     JOIN products p ON p.id = b.product_id \
     JOIN users r ON r.id = b.renter_id \
     JOIN users o ON o.id = b.owner_id \
     JOIN categories c ON c.id = p.category_id \
     LEFT JOIN countries co ON co.id = p.country_id";

const VIEW_JOINS: &str = "FROM product_views pv \
     JOIN products p ON p.id = pv.product_id \
     JOIN categories c ON c.id = p.category_id \
     LEFT JOIN countries co ON co.id = p.country_id";

const PAYMENT_JOINS: &str = "FROM payments pay \
     JOIN bookings b ON b.id = pay.booking_id \
     JOIN products p ON p.id = b.product_id \
     JOIN users r ON r.id = b.renter_id \
     JOIN users o ON o.id = b.owner_id \
     JOIN categories c ON c.id = p.category_id \
     LEFT JOIN countries co ON co.id = p.country_id";

/// Immutable filter descriptor shared by every calculator. Cloning is cheap;
/// each call renders a fresh `QueryBuilder`, so concurrent calculators never
/// contend over builder state.
#[derive(Debug, Clone)]
pub struct BookingQuery {
    filters: BookingFilters,
}

impl BookingQuery {
    pub fn new(filters: BookingFilters) -> Self {
        Self { filters }
    }

    /// Base query over bookings joined to products, renters, owners,
    /// categories and countries, bounded to `range` by creation time.
    /// Callers append their own GROUP BY / ORDER BY clauses.
    pub fn bookings(&self, select: &str, range: &DateRange) -> QueryBuilder<'static, Postgres> {
        let mut qb = QueryBuilder::new(format!("SELECT {} {} WHERE ", select, BOOKING_JOINS));
        qb.push("b.created_at BETWEEN ")
            .push_bind(range.start)
            .push(" AND ")
            .push_bind(range.end);
        self.push_booking_predicates(&mut qb);
        qb
    }

    /// Same joins and filters without a date bound (seasonal indexes,
    /// first-booking lookups).
    pub fn bookings_all_time(&self, select: &str) -> QueryBuilder<'static, Postgres> {
        let mut qb = QueryBuilder::new(format!("SELECT {} {} WHERE TRUE", select, BOOKING_JOINS));
        self.push_booking_predicates(&mut qb);
        qb
    }

    /// Payments joined back through their bookings, bounded by payment
    /// creation time; the full booking filter set applies.
    pub fn payments(&self, select: &str, range: &DateRange) -> QueryBuilder<'static, Postgres> {
        let mut qb = QueryBuilder::new(format!("SELECT {} {} WHERE ", select, PAYMENT_JOINS));
        qb.push("pay.created_at BETWEEN ")
            .push_bind(range.start)
            .push(" AND ")
            .push_bind(range.end);
        self.push_booking_predicates(&mut qb);
        qb
    }

    /// Product-view query carrying only the product-level subset of the
    /// filters; booking-level predicates (status, renter, amount) do not
    /// constrain view counts.
    pub fn views(&self, select: &str, range: &DateRange) -> QueryBuilder<'static, Postgres> {
        let mut qb = QueryBuilder::new(format!("SELECT {} {} WHERE ", select, VIEW_JOINS));
        qb.push("pv.viewed_at BETWEEN ")
            .push_bind(range.start)
            .push(" AND ")
            .push_bind(range.end);
        self.push_product_predicates(&mut qb);
        qb
    }

    fn push_booking_predicates(&self, qb: &mut QueryBuilder<'static, Postgres>) {
        if let Some(statuses) = &self.filters.statuses {
            let values: Vec<String> = statuses.iter().map(|s| s.as_str().to_string()).collect();
            qb.push(" AND b.status = ANY(").push_bind(values).push(")");
        }
        if let Some(renter_id) = self.filters.renter_id {
            qb.push(" AND b.renter_id = ").push_bind(renter_id);
        }
        if let Some(min_amount) = self.filters.min_amount {
            qb.push(" AND b.total_amount >= ").push_bind(min_amount);
        }
        if let Some(max_amount) = self.filters.max_amount {
            qb.push(" AND b.total_amount <= ").push_bind(max_amount);
        }
        self.push_product_predicates(qb);
    }

    fn push_product_predicates(&self, qb: &mut QueryBuilder<'static, Postgres>) {
        if let Some(country_id) = self.filters.country_id {
            qb.push(" AND p.country_id = ").push_bind(country_id);
        }
        if let Some(category_id) = self.filters.category_id {
            qb.push(" AND p.category_id = ").push_bind(category_id);
        }
        if let Some(owner_id) = self.filters.owner_id {
            qb.push(" AND p.owner_id = ").push_bind(owner_id);
        }
        if let Some(product_ids) = &self.filters.product_ids {
            let ids: Vec<Uuid> = product_ids.clone();
            qb.push(" AND b.product_id = ANY(").push_bind(ids).push(")");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use renthive_common::BookingStatus;
    use rust_decimal::Decimal;

    fn range() -> DateRange {
        let end = Utc::now();
        DateRange {
            start: end - chrono::Duration::days(30),
            end,
        }
    }

    #[test]
    fn empty_filters_add_no_predicates() {
        let query = BookingQuery::new(BookingFilters::default());
        let qb = query.bookings("COUNT(*)", &range());
        let sql = qb.sql();

        assert!(sql.contains("b.created_at BETWEEN"));
        assert!(!sql.contains("b.status = ANY"));
        assert!(!sql.contains("total_amount >="));
        assert!(!sql.contains("p.country_id ="));
    }

    #[test]
    fn present_filters_render_bound_predicates() {
        let filters = BookingFilters {
            statuses: Some(vec![BookingStatus::Confirmed, BookingStatus::Completed]),
            country_id: Some(uuid::Uuid::new_v4()),
            min_amount: Some(Decimal::new(1000, 2)),
            max_amount: Some(Decimal::new(50000, 2)),
            product_ids: Some(vec![uuid::Uuid::new_v4()]),
            ..Default::default()
        };
        let query = BookingQuery::new(filters);
        let qb = query.bookings("COUNT(*)", &range());
        let sql = qb.sql();

        assert!(sql.contains("b.status = ANY"));
        assert!(sql.contains("p.country_id ="));
        assert!(sql.contains("b.total_amount >="));
        assert!(sql.contains("b.total_amount <="));
        assert!(sql.contains("b.product_id = ANY"));
        // Values are always bound, never interpolated.
        assert!(!sql.contains("confirmed"));
    }

    #[test]
    fn view_query_skips_booking_level_filters() {
        let filters = BookingFilters {
            statuses: Some(vec![BookingStatus::Cancelled]),
            renter_id: Some(uuid::Uuid::new_v4()),
            category_id: Some(uuid::Uuid::new_v4()),
            ..Default::default()
        };
        let query = BookingQuery::new(filters);
        let qb = query.views("COUNT(*)", &range());
        let sql = qb.sql();

        assert!(sql.contains("pv.viewed_at BETWEEN"));
        assert!(sql.contains("p.category_id ="));
        assert!(!sql.contains("b.status"));
        assert!(!sql.contains("renter_id"));
    }

    #[test]
    fn descriptor_renders_independent_builders() {
        let query = BookingQuery::new(BookingFilters::default());
        let mut first = query.bookings("COUNT(*)", &range());
        first.push(" GROUP BY b.status");
        let second = query.bookings("SUM(b.total_amount)", &range());

        assert!(first.sql().contains("GROUP BY"));
        assert!(!second.sql().contains("GROUP BY"));
    }
}
