use super::coupon_codes::{CodeConflict, SubmissionField, SubmissionReport, ValidationFailure};
use super::normalize::codes_match;
use crate::models::{CodeBounds, Coupon};

/// Optional write-path rules. Both switches default to off.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CouponPolicy {
    /// Reject coupons whose start date is after their end date
    pub enforce_date_order: bool,
    /// Freeze the base code once a coupon has been redeemed
    pub lock_used_codes: bool,
    pub code_bounds: CodeBounds,
}

impl CouponPolicy {
    /// Applies the enabled rules to `candidate`; `existing` is the stored
    /// version when the submission is an update.
    pub fn check(&self, candidate: &Coupon, existing: Option<&Coupon>) -> SubmissionReport {
        let mut report = SubmissionReport::default();

        if self.enforce_date_order && candidate.start_date > candidate.valid_until {
            report.insert(
                SubmissionField::ValidityWindow,
                ValidationFailure::new(
                    CodeConflict::StartAfterEnd,
                    format!(
                        "start date {} is after end date {}",
                        candidate.start_date, candidate.valid_until
                    ),
                ),
            );
        }

        if self.lock_used_codes {
            if let Some(stored) = existing.filter(|c| c.used_count > 0) {
                if !codes_match(stored.code.as_str(), candidate.code.as_str()) {
                    report.insert(
                        SubmissionField::BaseCode,
                        ValidationFailure::new(
                            CodeConflict::CodeLockedAfterUse,
                            format!(
                                "code '{}' has been redeemed {} time(s) and can no longer change",
                                stored.code, stored.used_count
                            ),
                        )
                        .with_code(candidate.code.as_str())
                        .with_conflict(stored.id),
                    );
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CouponCode, Discount};
    use chrono::{NaiveDate, Utc};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn coupon(code: &str, start: (i32, u32, u32), end: (i32, u32, u32), used: u32) -> Coupon {
        Coupon {
            id: Uuid::new_v4(),
            code: CouponCode::parse(code, &CodeBounds::default()).unwrap(),
            name: code.to_string(),
            description: String::new(),
            discount: Discount::Fixed(dec!(20)),
            subscription_discount: dec!(0),
            available_quantity: 5,
            used_count: used,
            start_date: NaiveDate::from_ymd_opt(start.0, start.1, start.2).unwrap(),
            valid_until: NaiveDate::from_ymd_opt(end.0, end.1, end.2).unwrap(),
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            created_by: String::new(),
            availability_rules: None,
            child_coupons: vec![],
        }
    }

    #[test]
    fn default_policy_allows_inverted_window_and_code_change() {
        let stored = coupon("USED10", (2024, 1, 1), (2024, 2, 1), 3);
        let mut candidate = coupon("RENAMED", (2024, 5, 1), (2024, 2, 1), 3);
        candidate.id = stored.id;
        assert!(CouponPolicy::default().check(&candidate, Some(&stored)).is_empty());
    }

    #[test]
    fn strict_policy_reports_both_rules() {
        let policy = CouponPolicy {
            enforce_date_order: true,
            lock_used_codes: true,
            ..CouponPolicy::default()
        };
        let stored = coupon("USED10", (2024, 1, 1), (2024, 2, 1), 3);
        let mut candidate = coupon("RENAMED", (2024, 5, 1), (2024, 2, 1), 3);
        candidate.id = stored.id;

        let report = policy.check(&candidate, Some(&stored));
        assert_eq!(
            report.get(&SubmissionField::ValidityWindow).map(|f| f.kind),
            Some(CodeConflict::StartAfterEnd)
        );
        assert_eq!(
            report.get(&SubmissionField::BaseCode).map(|f| f.kind),
            Some(CodeConflict::CodeLockedAfterUse)
        );
    }

    #[test]
    fn locked_code_allows_case_only_edits_and_unused_coupons() {
        let policy = CouponPolicy {
            lock_used_codes: true,
            ..CouponPolicy::default()
        };
        let stored = coupon("USED10", (2024, 1, 1), (2024, 2, 1), 3);
        let recased = coupon("used10", (2024, 1, 1), (2024, 2, 1), 3);
        assert!(policy.check(&recased, Some(&stored)).is_empty());

        let fresh = coupon("FRESH", (2024, 1, 1), (2024, 2, 1), 0);
        let renamed = coupon("OTHER", (2024, 1, 1), (2024, 2, 1), 0);
        assert!(policy.check(&renamed, Some(&fresh)).is_empty());
    }
}
