use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::Coupon;
use crate::repositories::{AffiliateRepository, CouponRepository, Repository};

/// Entry of a usage ranking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponRanking {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub used_count: u32,
    pub available_quantity: u32,
}

impl From<&Coupon> for CouponRanking {
    fn from(coupon: &Coupon) -> Self {
        Self {
            id: coupon.id,
            code: coupon.code.to_string(),
            name: coupon.name.clone(),
            used_count: coupon.used_count,
            available_quantity: coupon.available_quantity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponStats {
    pub total_coupons: usize,
    pub active_coupons: usize,
    pub total_usage: u64,
    pub top_coupons: Vec<CouponRanking>,
}

/// Totals plus the `top_n` most used coupons (most used first, ties by code).
pub fn coupon_stats(all_coupons: &[Coupon], top_n: usize) -> CouponStats {
    let mut ranked: Vec<&Coupon> = all_coupons.iter().collect();
    ranked.sort_by(|a, b| {
        b.used_count
            .cmp(&a.used_count)
            .then_with(|| a.code.normalized().cmp(&b.code.normalized()))
    });

    CouponStats {
        total_coupons: all_coupons.len(),
        active_coupons: all_coupons.iter().filter(|c| c.is_active).count(),
        total_usage: all_coupons.iter().map(|c| u64::from(c.used_count)).sum(),
        top_coupons: ranked
            .into_iter()
            .take(top_n)
            .map(CouponRanking::from)
            .collect(),
    }
}

/// Percentage of available coupon uses already consumed, two decimal places,
/// capped at 100. Zero when nothing is available.
pub fn usage_rate(used: u64, available: u64) -> Decimal {
    if available == 0 {
        return Decimal::ZERO;
    }
    let rate = Decimal::from(used) * Decimal::ONE_HUNDRED / Decimal::from(available);
    rate.min(Decimal::ONE_HUNDRED).round_dp(2)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub total_used_coupons: u64,
    pub coupon_usage_rate: Decimal,
    pub total_coupons: usize,
    pub active_coupons: usize,
    pub total_affiliates: usize,
    pub top_coupons: Vec<CouponRanking>,
}

impl DashboardSummary {
    pub fn from_coupons(all_coupons: &[Coupon], total_affiliates: usize, top_n: usize) -> Self {
        let stats = coupon_stats(all_coupons, top_n);
        let available: u64 = all_coupons
            .iter()
            .map(|c| u64::from(c.available_quantity))
            .sum();
        Self {
            total_used_coupons: stats.total_usage,
            coupon_usage_rate: usage_rate(stats.total_usage, available),
            total_coupons: stats.total_coupons,
            active_coupons: stats.active_coupons,
            total_affiliates,
            top_coupons: stats.top_coupons,
        }
    }
}

#[derive(Clone)]
pub struct DashboardService {
    coupons: Arc<dyn CouponRepository>,
    affiliates: Arc<dyn AffiliateRepository>,
    top_coupons_limit: usize,
}

impl DashboardService {
    pub fn new(
        coupons: Arc<dyn CouponRepository>,
        affiliates: Arc<dyn AffiliateRepository>,
        top_coupons_limit: usize,
    ) -> Self {
        Self {
            coupons,
            affiliates,
            top_coupons_limit,
        }
    }

    #[instrument(skip(self))]
    pub async fn summary(&self) -> Result<DashboardSummary, ServiceError> {
        let coupons = self.coupons.list().await?;
        let affiliates = self.affiliates.list().await?.len();
        Ok(DashboardSummary::from_coupons(
            &coupons,
            affiliates,
            self.top_coupons_limit,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    #[rstest]
    #[case(0, 0, dec!(0))]
    #[case(5, 0, dec!(0))]
    #[case(25, 100, dec!(25))]
    #[case(1, 3, dec!(33.33))]
    #[case(2, 3, dec!(66.67))]
    #[case(150, 100, dec!(100))]
    fn usage_rate_cases(#[case] used: u64, #[case] available: u64, #[case] expected: Decimal) {
        assert_eq!(usage_rate(used, available), expected);
    }
}
