use crate::{
    config::ProcessingConstants,
    db::DbPool,
    entities::box_unit::{self, Entity as BoxEntity},
    entities::order::{self, Entity as OrderEntity},
    entities::pallet::{self, Entity as PalletEntity},
    entities::shelf::{self, Entity as ShelfEntity},
    errors::ServiceError,
    production_day::{self, Period},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{instrument, warn};

/// Rollup of one production period with a comparison to the period before.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeriodSummary {
    pub period: Period,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub kg_processed: Decimal,
    pub pouches_made: i64,
    pub prior_kg_processed: Decimal,
    pub prior_pouches_made: i64,
    pub kg_change_percent: Decimal,
    pub pouch_change_percent: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    OrderRegistered,
    BoxPlaced,
    PalletUpdated,
    ShelfUpdated,
}

/// One line in the bounded recent-activity feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub kind: ActivityKind,
    pub reference: String,
    pub timestamp: DateTime<Utc>,
}

/// Percent change between consecutive periods. Defined as 0% when both
/// values are zero and 100% when only the prior is zero, so dashboards
/// never divide by nothing.
pub fn percent_change(prior: Decimal, current: Decimal) -> Decimal {
    if prior.is_zero() {
        if current.is_zero() {
            Decimal::ZERO
        } else {
            Decimal::ONE_HUNDRED
        }
    } else {
        (current - prior) / prior * Decimal::ONE_HUNDRED
    }
}

/// Read-only rollups for the dashboard. Sub-query failures degrade to
/// zeroed components instead of failing the whole report.
#[derive(Clone)]
pub struct AnalyticsService {
    db_pool: Arc<DbPool>,
    constants: ProcessingConstants,
}

impl AnalyticsService {
    pub fn new(db_pool: Arc<DbPool>, constants: ProcessingConstants) -> Self {
        Self { db_pool, constants }
    }

    /// Kilograms and pouches for the production period containing `now`,
    /// with percent change against the period before it.
    #[instrument(skip(self))]
    pub async fn production_summary(
        &self,
        now: DateTime<Utc>,
        period: Period,
    ) -> Result<PeriodSummary, ServiceError> {
        let cutoff = self.constants.production_day_cutoff_hour;
        let (start, end) = production_day::period_boundaries(now, cutoff, period);
        let (prior_start, prior_end) = production_day::prior_boundaries(start, cutoff, period);

        let ((kg, pouches), (prior_kg, prior_pouches)) = futures::join!(
            self.window_totals(start, end),
            self.window_totals(prior_start, prior_end)
        );

        Ok(PeriodSummary {
            period,
            start,
            end,
            kg_processed: kg,
            pouches_made: pouches,
            prior_kg_processed: prior_kg,
            prior_pouches_made: prior_pouches,
            kg_change_percent: percent_change(prior_kg, kg),
            pouch_change_percent: percent_change(
                Decimal::from(prior_pouches),
                Decimal::from(pouches),
            ),
        })
    }

    /// Sums for one `[start, end)` window. Errors degrade to zero totals.
    async fn window_totals(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> (Decimal, i64) {
        let db = &*self.db_pool;
        let orders = OrderEntity::find()
            .filter(order::Column::IsDeleted.eq(false))
            .filter(order::Column::CreatedAt.gte(start))
            .filter(order::Column::CreatedAt.lt(end))
            .all(db)
            .await;

        match orders {
            Ok(orders) => {
                let kg: Decimal = orders.iter().map(|o| o.weight_kg).sum();
                let pouches: i64 = orders
                    .iter()
                    .map(|o| {
                        if o.actual_pouch_count > 0 {
                            o.actual_pouch_count as i64
                        } else {
                            o.declared_pouch_count as i64
                        }
                    })
                    .sum();
                (kg, pouches)
            }
            Err(e) => {
                warn!(error = %e, "Rollup sub-query failed; reporting zeros");
                (Decimal::ZERO, 0)
            }
        }
    }

    /// Newest activity across orders, boxes, pallets and shelves, merged
    /// by timestamp descending and truncated to `limit` entries. Each
    /// timeline degrades to empty on error.
    #[instrument(skip(self))]
    pub async fn recent_activity(&self, limit: u64) -> Result<Vec<ActivityEntry>, ServiceError> {
        let db = &*self.db_pool;
        let mut entries: Vec<ActivityEntry> = Vec::new();

        match OrderEntity::find()
            .filter(order::Column::IsDeleted.eq(false))
            .order_by_desc(order::Column::CreatedAt)
            .limit(limit)
            .all(db)
            .await
        {
            Ok(orders) => entries.extend(orders.into_iter().map(|o| ActivityEntry {
                kind: ActivityKind::OrderRegistered,
                reference: o.id.to_string(),
                timestamp: o.created_at,
            })),
            Err(e) => warn!(error = %e, "Order timeline unavailable"),
        }

        match BoxEntity::find()
            .order_by_desc(box_unit::Column::UpdatedAt)
            .limit(limit)
            .all(db)
            .await
        {
            Ok(boxes) => entries.extend(boxes.into_iter().map(|b| ActivityEntry {
                kind: ActivityKind::BoxPlaced,
                reference: b.id.clone(),
                timestamp: b.updated_at.unwrap_or(b.created_at),
            })),
            Err(e) => warn!(error = %e, "Box timeline unavailable"),
        }

        match PalletEntity::find()
            .order_by_desc(pallet::Column::UpdatedAt)
            .limit(limit)
            .all(db)
            .await
        {
            Ok(pallets) => entries.extend(pallets.into_iter().map(|p| ActivityEntry {
                kind: ActivityKind::PalletUpdated,
                reference: p.tag.clone(),
                timestamp: p.updated_at.unwrap_or(p.created_at),
            })),
            Err(e) => warn!(error = %e, "Pallet timeline unavailable"),
        }

        match ShelfEntity::find()
            .order_by_desc(shelf::Column::UpdatedAt)
            .limit(limit)
            .all(db)
            .await
        {
            Ok(shelves) => entries.extend(shelves.into_iter().map(|s| ActivityEntry {
                kind: ActivityKind::ShelfUpdated,
                reference: s.tag.clone(),
                timestamp: s.updated_at.unwrap_or(s.created_at),
            })),
            Err(e) => warn!(error = %e, "Shelf timeline unavailable"),
        }

        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        entries.truncate(limit as usize);
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn percent_change_edge_rules() {
        assert_eq!(percent_change(dec!(0), dec!(0)), dec!(0));
        assert_eq!(percent_change(dec!(0), dec!(42)), dec!(100));
        assert_eq!(percent_change(dec!(50), dec!(75)), dec!(50));
        assert_eq!(percent_change(dec!(80), dec!(60)), dec!(-25));
    }
}
