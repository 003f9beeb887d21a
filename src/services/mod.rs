// Coupon write path and redemption
pub mod coupons;

// Affiliates and admin panel users
pub mod affiliates;
pub mod users;

// Read-only metrics
pub mod dashboard;

pub use affiliates::AffiliateService;
pub use coupons::CouponService;
pub use dashboard::{CouponStats, DashboardService, DashboardSummary};
pub use users::UserService;
