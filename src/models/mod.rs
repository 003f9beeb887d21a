// Domain models
pub mod affiliate;
pub mod coupon;
pub mod user;

pub use affiliate::{Address, Affiliate, AffiliateDraft, Commission, Cpf, PayoutMethod, SocialNetworks};
pub use coupon::{
    AvailabilityRules, ChildCoupon, ChildCouponDraft, CodeBounds, Coupon, CouponCode, CouponDraft,
    Discount,
};
pub use user::{Role, User, UserDraft};

use thiserror::Error;

/// Errors raised while turning loosely typed input into domain value objects.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("coupon code must not be empty")]
    EmptyCode,

    #[error("coupon code '{code}' must be between {min} and {max} characters")]
    CodeLength { code: String, min: usize, max: usize },

    #[error("coupon code '{0}' must not contain whitespace")]
    CodeWhitespace(String),

    #[error("percentage discount must be between 0 and 100, got {0}")]
    PercentageOutOfRange(String),

    #[error("{field} must not be negative")]
    Negative { field: &'static str },

    #[error("CPF must contain exactly 11 digits")]
    InvalidCpf,

    #[error("payout field '{0}' is required for the selected payout method")]
    MissingPayoutField(&'static str),
}
