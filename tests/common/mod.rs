#![allow(dead_code)]

use chrono::{NaiveDate, Utc};
use coupon_admin::{
    config::AppConfig,
    models::{
        Affiliate, AffiliateDraft, ChildCoupon, ChildCouponDraft, CodeBounds, Commission, Coupon,
        CouponCode, CouponDraft, Discount, PayoutMethod, SocialNetworks,
    },
    repositories::Snapshot,
    AppState,
};
use rust_decimal_macros::dec;
use uuid::Uuid;

/// Application state over an empty in-memory store.
pub struct TestApp {
    pub state: AppState,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(AppConfig::default())
    }

    pub fn with_config(config: AppConfig) -> Self {
        Self::with_snapshot(config, Snapshot::default())
    }

    pub fn with_snapshot(config: AppConfig, snapshot: Snapshot) -> Self {
        Self {
            state: AppState::new(config, snapshot),
        }
    }

    /// Registers an affiliate with a unique email/CPF derived from `seq`.
    pub async fn affiliate(&self, seq: u32) -> Affiliate {
        self.state
            .affiliates
            .create(affiliate_draft(seq))
            .await
            .expect("affiliate created")
    }
}

pub fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

pub fn cpf_for(seq: u32) -> String {
    format!("{:011}", 10_000_000_000u64 + u64::from(seq))
}

pub fn affiliate_draft(seq: u32) -> AffiliateDraft {
    AffiliateDraft {
        name: format!("Affiliate {}", seq),
        birth_date: Some(day(1990, 5, 17)),
        cpf: cpf_for(seq),
        email: format!("affiliate{}@example.com", seq),
        phone: Some("+55 11 99999-0000".to_string()),
        address: None,
        partnership_start_date: day(2024, 1, 10),
        commission: Commission::Percentage(dec!(10)),
        notes: None,
        payout: PayoutMethod::Pix {
            key: format!("affiliate{}@pix", seq),
        },
        social_networks: SocialNetworks::default(),
    }
}

pub fn coupon_draft(code: &str) -> CouponDraft {
    CouponDraft {
        code: code.to_string(),
        name: format!("Coupon {}", code),
        description: String::new(),
        discount: Discount::Percentage(dec!(10)),
        subscription_discount: dec!(0),
        available_quantity: 100,
        start_date: day(2024, 1, 1),
        valid_until: day(2024, 12, 31),
        is_active: true,
        created_by: "admin".to_string(),
        availability_rules: None,
        child_coupons: vec![],
    }
}

pub fn child_draft(affiliate_id: Uuid, code: &str) -> ChildCouponDraft {
    ChildCouponDraft {
        id: None,
        affiliate_id,
        coupon_code: code.to_string(),
    }
}

/// Draft that resubmits `coupon` unchanged, child ids included.
pub fn draft_from(coupon: &Coupon) -> CouponDraft {
    CouponDraft {
        code: coupon.code.to_string(),
        name: coupon.name.clone(),
        description: coupon.description.clone(),
        discount: coupon.discount,
        subscription_discount: coupon.subscription_discount,
        available_quantity: coupon.available_quantity,
        start_date: coupon.start_date,
        valid_until: coupon.valid_until,
        is_active: coupon.is_active,
        created_by: coupon.created_by.clone(),
        availability_rules: coupon.availability_rules.clone(),
        child_coupons: coupon
            .child_coupons
            .iter()
            .map(|c| ChildCouponDraft {
                id: Some(c.id),
                affiliate_id: c.affiliate_id,
                coupon_code: c.coupon_code.to_string(),
            })
            .collect(),
    }
}

/// Stored coupon built directly, bypassing the services.
pub fn stored_coupon(code: &str, child_codes: &[&str]) -> Coupon {
    let bounds = CodeBounds { min: 1, max: 64 };
    Coupon {
        id: Uuid::new_v4(),
        code: CouponCode::parse(code, &bounds).expect("valid code"),
        name: code.to_string(),
        description: String::new(),
        discount: Discount::Fixed(dec!(50)),
        subscription_discount: dec!(0),
        available_quantity: 10,
        used_count: 0,
        start_date: day(2024, 1, 1),
        valid_until: day(2024, 12, 31),
        is_active: true,
        created_at: Utc::now(),
        updated_at: Utc::now(),
        created_by: "seed".to_string(),
        availability_rules: None,
        child_coupons: child_codes
            .iter()
            .map(|child| ChildCoupon {
                id: Uuid::new_v4(),
                affiliate_id: Uuid::new_v4(),
                coupon_code: CouponCode::parse(child, &bounds).expect("valid code"),
                created_at: Utc::now(),
                updated_at: Utc::now(),
            })
            .collect(),
    }
}
