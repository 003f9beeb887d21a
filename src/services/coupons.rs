use chrono::{NaiveDate, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::errors::ServiceError;
use crate::models::{ChildCoupon, Coupon, CouponDraft};
use crate::repositories::{AffiliateRepository, CouponRepository, Mutation, Repository};
use crate::services::dashboard::{coupon_stats, CouponStats};
use crate::validation::{
    check_redeemable, validate_affiliate_assignments, validate_submission, CodeConflict,
    CouponPolicy, Redeemability, SubmissionField, SubmissionReport, SubmissionResult,
    ValidationFailure,
};

/// Coupon write path. Every create/update is validated against the full
/// coupon population inside the repository's commit, so two editors racing
/// for the same code cannot both succeed.
#[derive(Clone)]
pub struct CouponService {
    coupons: Arc<dyn CouponRepository>,
    affiliates: Arc<dyn AffiliateRepository>,
    policy: CouponPolicy,
    top_coupons_limit: usize,
}

impl CouponService {
    pub fn new(
        coupons: Arc<dyn CouponRepository>,
        affiliates: Arc<dyn AffiliateRepository>,
        policy: CouponPolicy,
        top_coupons_limit: usize,
    ) -> Self {
        Self {
            coupons,
            affiliates,
            policy,
            top_coupons_limit,
        }
    }

    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<Coupon>, ServiceError> {
        self.coupons.list().await
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> Result<Coupon, ServiceError> {
        self.coupons
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Coupon", id))
    }

    /// Creates a coupon together with its child coupons.
    #[instrument(skip(self, draft), fields(code = %draft.code))]
    pub async fn create(&self, draft: CouponDraft) -> Result<Coupon, ServiceError> {
        draft.validate()?;
        let candidate = draft.build(Uuid::new_v4(), &self.policy.code_bounds, None, Utc::now())?;
        let known_affiliates = self.affiliate_ids().await?;
        let policy = self.policy;

        let created = self
            .coupons
            .apply(Box::new(move |all: &[Coupon]| -> Result<Mutation<Coupon>, ServiceError> {
                reject_if_invalid(&candidate, None, all, &known_affiliates, &policy)?;
                Ok(Mutation::Insert(candidate))
            }))
            .await
            .map_err(log_rejection)?;

        info!(
            coupon_id = %created.id,
            children = created.child_coupons.len(),
            "Coupon created"
        );
        Ok(created)
    }

    /// Replaces a coupon and its child coupons. Usage counters and creation
    /// metadata of the stored coupon are kept.
    #[instrument(skip(self, draft), fields(code = %draft.code))]
    pub async fn update(&self, id: Uuid, draft: CouponDraft) -> Result<Coupon, ServiceError> {
        draft.validate()?;
        let known_affiliates = self.affiliate_ids().await?;
        let policy = self.policy;
        let now = Utc::now();

        let updated = self
            .coupons
            .apply(Box::new(move |all: &[Coupon]| -> Result<Mutation<Coupon>, ServiceError> {
                let existing = all
                    .iter()
                    .find(|c| c.id == id)
                    .ok_or_else(|| ServiceError::not_found("Coupon", id))?;
                let candidate = draft.build(id, &policy.code_bounds, Some(existing), now)?;
                reject_if_invalid(&candidate, Some(existing), all, &known_affiliates, &policy)?;
                Ok(Mutation::Replace(candidate))
            }))
            .await
            .map_err(log_rejection)?;

        info!(
            coupon_id = %updated.id,
            children = updated.child_coupons.len(),
            "Coupon updated"
        );
        Ok(updated)
    }

    /// Deletes a coupon; its child coupons go with it.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        let removed = self
            .coupons
            .apply(Box::new(move |_: &[Coupon]| -> Result<Mutation<Coupon>, ServiceError> {
                Ok(Mutation::Remove(id))
            }))
            .await?;
        info!(
            coupon_id = %removed.id,
            children = removed.child_coupons.len(),
            "Coupon deleted"
        );
        Ok(())
    }

    /// Records one use of the coupon.
    #[instrument(skip(self))]
    pub async fn redeem(&self, id: Uuid) -> Result<Coupon, ServiceError> {
        let now = Utc::now();
        let redeemed = self
            .coupons
            .apply(Box::new(move |all: &[Coupon]| -> Result<Mutation<Coupon>, ServiceError> {
                let coupon = all
                    .iter()
                    .find(|c| c.id == id)
                    .ok_or_else(|| ServiceError::not_found("Coupon", id))?;
                if coupon.is_sold_out() {
                    return Err(ServiceError::SoldOut(id));
                }
                let mut coupon = coupon.clone();
                coupon.used_count += 1;
                coupon.updated_at = now;
                Ok(Mutation::Replace(coupon))
            }))
            .await
            .map_err(|e| {
                if matches!(e, ServiceError::SoldOut(_)) {
                    warn!(coupon_id = %id, "Redemption refused: coupon sold out");
                }
                e
            })?;

        info!(
            coupon_id = %redeemed.id,
            used = redeemed.used_count,
            available = redeemed.available_quantity,
            "Coupon redeemed"
        );
        Ok(redeemed)
    }

    /// Whether `code` (base or child) can be used today.
    pub async fn check_code(&self, code: &str) -> Result<Redeemability, ServiceError> {
        self.check_code_on(code, Utc::now().date_naive()).await
    }

    #[instrument(skip(self))]
    pub async fn check_code_on(
        &self,
        code: &str,
        today: NaiveDate,
    ) -> Result<Redeemability, ServiceError> {
        let all = self.coupons.list().await?;
        Ok(check_redeemable(code, today, &all))
    }

    /// Runs the full submission checks without committing. `existing_id`
    /// selects update semantics.
    #[instrument(skip(self, draft), fields(code = %draft.code))]
    pub async fn validate_draft(
        &self,
        existing_id: Option<Uuid>,
        draft: CouponDraft,
    ) -> Result<SubmissionResult, ServiceError> {
        draft.validate()?;
        let all = self.coupons.list().await?;
        let known_affiliates = self.affiliate_ids().await?;
        let existing = match existing_id {
            Some(id) => Some(
                all.iter()
                    .find(|c| c.id == id)
                    .ok_or_else(|| ServiceError::not_found("Coupon", id))?,
            ),
            None => None,
        };
        let id = existing_id.unwrap_or_else(Uuid::new_v4);
        let candidate = draft.build(id, &self.policy.code_bounds, existing, Utc::now())?;
        Ok(evaluate_submission(
            &candidate,
            existing,
            &all,
            &known_affiliates,
            &self.policy,
        ))
    }

    #[instrument(skip(self))]
    pub async fn stats(&self) -> Result<CouponStats, ServiceError> {
        let all = self.coupons.list().await?;
        Ok(coupon_stats(&all, self.top_coupons_limit))
    }

    async fn affiliate_ids(&self) -> Result<HashSet<Uuid>, ServiceError> {
        Ok(self
            .affiliates
            .list()
            .await?
            .into_iter()
            .map(|a| a.id)
            .collect())
    }
}

/// Every check a coupon submission goes through, in reporting priority.
pub fn evaluate_submission(
    candidate: &Coupon,
    existing: Option<&Coupon>,
    all_coupons: &[Coupon],
    known_affiliates: &HashSet<Uuid>,
    policy: &CouponPolicy,
) -> SubmissionResult {
    validate_submission(candidate, &candidate.child_coupons, all_coupons)
        .and(validate_affiliate_assignments(&candidate.child_coupons))
        .and(affiliate_references(
            &candidate.child_coupons,
            known_affiliates,
        ))
        .and(policy.check(candidate, existing).into_result())
}

fn affiliate_references(
    child_coupons: &[ChildCoupon],
    known_affiliates: &HashSet<Uuid>,
) -> SubmissionResult {
    let mut report = SubmissionReport::default();
    for child in child_coupons
        .iter()
        .filter(|c| !known_affiliates.contains(&c.affiliate_id))
    {
        report.insert(
            SubmissionField::ChildAffiliate(child.id),
            ValidationFailure::new(
                CodeConflict::UnknownAffiliate,
                format!("affiliate {} does not exist", child.affiliate_id),
            ),
        );
    }
    report.into_result()
}

fn reject_if_invalid(
    candidate: &Coupon,
    existing: Option<&Coupon>,
    all_coupons: &[Coupon],
    known_affiliates: &HashSet<Uuid>,
    policy: &CouponPolicy,
) -> Result<(), ServiceError> {
    match evaluate_submission(candidate, existing, all_coupons, known_affiliates, policy) {
        SubmissionResult::Accepted => Ok(()),
        SubmissionResult::Rejected(report) => Err(ServiceError::SubmissionRejected(report)),
    }
}

fn log_rejection(err: ServiceError) -> ServiceError {
    if let Some(report) = err.submission_report() {
        warn!(failures = report.len(), "Coupon submission rejected: {}", report);
    }
    err
}
