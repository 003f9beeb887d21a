use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

use super::normalize::normalize_code;
use crate::models::Coupon;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NotRedeemableReason {
    NotFound,
    Inactive,
    SoldOut,
    OutsideValidity,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Redeemability {
    #[serde(rename_all = "camelCase")]
    Redeemable {
        coupon_id: Uuid,
        #[serde(skip_serializing_if = "Option::is_none")]
        child_id: Option<Uuid>,
    },
    NotRedeemable { reason: NotRedeemableReason },
}

impl Redeemability {
    pub fn is_redeemable(&self) -> bool {
        matches!(self, Self::Redeemable { .. })
    }
}

/// Resolves `code` against base and child codes and checks whether the owning
/// coupon can be used on `today`. Reasons are checked in order: not found,
/// inactive, sold out, outside validity.
pub fn check_redeemable(code: &str, today: NaiveDate, all_coupons: &[Coupon]) -> Redeemability {
    let normalized = normalize_code(code);
    if normalized.is_empty() {
        return Redeemability::NotRedeemable {
            reason: NotRedeemableReason::NotFound,
        };
    }

    let found = all_coupons
        .iter()
        .find(|c| c.code.normalized() == normalized)
        .map(|c| (c, None))
        .or_else(|| {
            all_coupons.iter().find_map(|c| {
                c.child_coupons
                    .iter()
                    .find(|child| child.coupon_code.normalized() == normalized)
                    .map(|child| (c, Some(child.id)))
            })
        });

    let Some((coupon, child_id)) = found else {
        return Redeemability::NotRedeemable {
            reason: NotRedeemableReason::NotFound,
        };
    };

    let reason = if !coupon.is_active {
        Some(NotRedeemableReason::Inactive)
    } else if coupon.is_sold_out() {
        Some(NotRedeemableReason::SoldOut)
    } else if !coupon.is_valid_on(today) {
        Some(NotRedeemableReason::OutsideValidity)
    } else {
        None
    };

    match reason {
        Some(reason) => Redeemability::NotRedeemable { reason },
        None => Redeemability::Redeemable {
            coupon_id: coupon.id,
            child_id,
        },
    }
}
