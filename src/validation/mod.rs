//! Coupon code validation engine.
//!
//! Everything in this module is pure: callers pass the full coupon population
//! explicitly and get structured results back. Holding that population stable
//! between validation and commit is the caller's job (see `services::coupons`).

pub mod coupon_codes;
pub mod normalize;
pub mod policy;
pub mod redemption;

pub use coupon_codes::{
    validate_affiliate_assignments, validate_base_code, validate_child_code, validate_submission,
    CodeConflict, SubmissionField, SubmissionReport, SubmissionResult, ValidationFailure,
    ValidationResult,
};
pub use normalize::{codes_match, normalize_code};
pub use policy::CouponPolicy;
pub use redemption::{check_redeemable, NotRedeemableReason, Redeemability};
