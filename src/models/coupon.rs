use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::ModelError;
use crate::validation::normalize_code;

const DEFAULT_CODE_MIN_LENGTH: usize = 3;
const DEFAULT_CODE_MAX_LENGTH: usize = 32;

/// Length bounds applied when a code is entered through a draft.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CodeBounds {
    pub min: usize,
    pub max: usize,
}

impl Default for CodeBounds {
    fn default() -> Self {
        Self {
            min: DEFAULT_CODE_MIN_LENGTH,
            max: DEFAULT_CODE_MAX_LENGTH,
        }
    }
}

/// A coupon code as entered by an operator. Case is preserved for display;
/// comparisons always go through [`normalize_code`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CouponCode(String);

impl CouponCode {
    /// Parses operator input, enforcing the configured length bounds.
    pub fn parse(raw: &str, bounds: &CodeBounds) -> Result<Self, ModelError> {
        let code = Self::parse_unbounded(raw)?;
        let len = code.0.chars().count();
        if len < bounds.min || len > bounds.max {
            return Err(ModelError::CodeLength {
                code: code.0,
                min: bounds.min,
                max: bounds.max,
            });
        }
        Ok(code)
    }

    /// Structural checks only. Used for records that were already accepted once,
    /// so a later change of the length bounds does not make stored data unreadable.
    fn parse_unbounded(raw: &str) -> Result<Self, ModelError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ModelError::EmptyCode);
        }
        if trimmed.chars().any(char::is_whitespace) {
            return Err(ModelError::CodeWhitespace(trimmed.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn normalized(&self) -> String {
        normalize_code(&self.0)
    }
}

impl TryFrom<String> for CouponCode {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse_unbounded(&value)
    }
}

impl From<CouponCode> for String {
    fn from(code: CouponCode) -> Self {
        code.0
    }
}

impl fmt::Display for CouponCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Discount granted by a coupon.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Discount {
    /// Percentage off, 0 to 100 inclusive
    Percentage(Decimal),
    /// Fixed amount off in the program currency
    Fixed(Decimal),
}

impl Discount {
    pub fn percentage(value: Decimal) -> Result<Self, ModelError> {
        let discount = Self::Percentage(value);
        discount.check()?;
        Ok(discount)
    }

    pub fn fixed(value: Decimal) -> Result<Self, ModelError> {
        let discount = Self::Fixed(value);
        discount.check()?;
        Ok(discount)
    }

    pub fn check(&self) -> Result<(), ModelError> {
        match self {
            Self::Percentage(value) if *value < Decimal::ZERO || *value > Decimal::ONE_HUNDRED => {
                Err(ModelError::PercentageOutOfRange(value.to_string()))
            }
            Self::Fixed(value) if value.is_sign_negative() && !value.is_zero() => {
                Err(ModelError::Negative { field: "discount" })
            }
            _ => Ok(()),
        }
    }

    pub fn value(&self) -> Decimal {
        match self {
            Self::Percentage(value) | Self::Fixed(value) => *value,
        }
    }
}

/// Audience and validity filters attached to a coupon. Carried as data; the
/// validation engine places no invariants on it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AvailabilityRules {
    pub discount_type: String,
    pub base_value: Option<Decimal>,
    pub limit_value: Option<Decimal>,
    pub unit_filter: String,
    pub selected_units: Vec<String>,
    pub course_filter: String,
    pub selected_courses: Vec<String>,
    pub ingress_form_filter: String,
    pub selected_ingress_forms: Vec<String>,
    pub user_filter: String,
    pub selected_users: Vec<String>,
    pub semester_filter: Option<String>,
    pub selected_semesters: Vec<String>,
    pub initial_validity: Option<NaiveDate>,
    pub final_validity: Option<NaiveDate>,
}

/// Per-affiliate code derived from a parent coupon. Embedded in its parent,
/// so the owning coupon id is implicit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildCoupon {
    pub id: Uuid,
    pub affiliate_id: Uuid,
    pub coupon_code: CouponCode,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coupon {
    pub id: Uuid,
    pub code: CouponCode,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub discount: Discount,
    #[serde(default)]
    pub subscription_discount: Decimal,
    pub available_quantity: u32,
    #[serde(default)]
    pub used_count: u32,
    pub start_date: NaiveDate,
    pub valid_until: NaiveDate,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub created_by: String,
    #[serde(default)]
    pub availability_rules: Option<AvailabilityRules>,
    #[serde(default)]
    pub child_coupons: Vec<ChildCoupon>,
}

impl Coupon {
    pub fn is_sold_out(&self) -> bool {
        self.used_count >= self.available_quantity
    }

    /// Whether `day` falls inside the inclusive validity window.
    pub fn is_valid_on(&self, day: NaiveDate) -> bool {
        day >= self.start_date && day <= self.valid_until
    }

    pub fn remaining(&self) -> u32 {
        self.available_quantity.saturating_sub(self.used_count)
    }

    pub fn child(&self, child_id: Uuid) -> Option<&ChildCoupon> {
        self.child_coupons.iter().find(|child| child.id == child_id)
    }
}

/// Child coupon as submitted with its parent. `id` is absent for new rows.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildCouponDraft {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub affiliate_id: Uuid,
    pub coupon_code: String,
}

/// Create/update payload for a coupon and its child coupons.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CouponDraft {
    pub code: String,
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    #[serde(default)]
    #[validate(length(max = 2000))]
    pub description: String,
    #[validate(custom = "validate_discount")]
    pub discount: Discount,
    #[serde(default)]
    #[validate(custom = "validate_non_negative")]
    pub subscription_discount: Decimal,
    pub available_quantity: u32,
    pub start_date: NaiveDate,
    pub valid_until: NaiveDate,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub created_by: String,
    #[serde(default)]
    pub availability_rules: Option<AvailabilityRules>,
    #[serde(default)]
    pub child_coupons: Vec<ChildCouponDraft>,
}

impl CouponDraft {
    /// Builds the typed coupon. When `existing` is given, usage and creation
    /// metadata are carried over and child rows keep their creation time.
    pub fn build(
        self,
        id: Uuid,
        bounds: &CodeBounds,
        existing: Option<&Coupon>,
        now: DateTime<Utc>,
    ) -> Result<Coupon, ModelError> {
        self.discount.check()?;
        if self.subscription_discount.is_sign_negative() && !self.subscription_discount.is_zero() {
            return Err(ModelError::Negative {
                field: "subscriptionDiscount",
            });
        }

        let code = CouponCode::parse(&self.code, bounds)?;

        let child_coupons = self
            .child_coupons
            .into_iter()
            .map(|draft| {
                let coupon_code = CouponCode::parse(&draft.coupon_code, bounds)?;
                let child_id = draft.id.unwrap_or_else(Uuid::new_v4);
                let created_at = existing
                    .and_then(|coupon| coupon.child(child_id))
                    .map(|child| child.created_at)
                    .unwrap_or(now);
                Ok(ChildCoupon {
                    id: child_id,
                    affiliate_id: draft.affiliate_id,
                    coupon_code,
                    created_at,
                    updated_at: now,
                })
            })
            .collect::<Result<Vec<_>, ModelError>>()?;

        Ok(Coupon {
            id,
            code,
            name: self.name,
            description: self.description,
            discount: self.discount,
            subscription_discount: self.subscription_discount,
            available_quantity: self.available_quantity,
            used_count: existing.map(|coupon| coupon.used_count).unwrap_or(0),
            start_date: self.start_date,
            valid_until: self.valid_until,
            is_active: self.is_active,
            created_at: existing.map(|coupon| coupon.created_at).unwrap_or(now),
            updated_at: now,
            created_by: existing
                .map(|coupon| coupon.created_by.clone())
                .unwrap_or(self.created_by),
            availability_rules: self.availability_rules,
            child_coupons,
        })
    }
}

fn default_active() -> bool {
    true
}

fn validate_discount(discount: &Discount) -> Result<(), ValidationError> {
    discount.check().map_err(|e| {
        let mut err = ValidationError::new("discount");
        err.message = Some(e.to_string().into());
        err
    })
}

fn validate_non_negative(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() && !value.is_zero() {
        let mut err = ValidationError::new("non_negative");
        err.message = Some("value must not be negative".into());
        return Err(err);
    }
    Ok(())
}
