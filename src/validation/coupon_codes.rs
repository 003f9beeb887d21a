use serde::{ser::SerializeMap, Serialize, Serializer};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use uuid::Uuid;

use super::normalize::normalize_code;
use crate::models::{ChildCoupon, Coupon};

/// Why a code or submission field was rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CodeConflict {
    /// Base code already used by another coupon
    DuplicateBaseCode,
    /// Code crosses the base/child boundary in either direction
    DuplicateChildAgainstBase,
    /// Two child coupons in the same submission share a code
    DuplicateChildInSession,
    /// Child code already used under a different parent
    DuplicateChildAcrossParents,
    /// Two child coupons in the same submission share an id
    DuplicateChildId,
    /// Child id already belongs to a child of another coupon
    ChildIdOfAnotherCoupon,
    /// Affiliate holds more than one child coupon under the same parent
    DuplicateAffiliateInCoupon,
    /// Child coupon references an affiliate that does not exist
    UnknownAffiliate,
    /// Start date falls after the end of the validity window
    StartAfterEnd,
    /// Base code changed on a coupon that has already been redeemed
    CodeLockedAfterUse,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationFailure {
    pub kind: CodeConflict,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conflicting_coupon_id: Option<Uuid>,
    pub reason: String,
}

impl ValidationFailure {
    pub fn new(kind: CodeConflict, reason: impl Into<String>) -> Self {
        Self {
            kind,
            code: None,
            conflicting_coupon_id: None,
            reason: reason.into(),
        }
    }

    pub fn with_code(mut self, code: &str) -> Self {
        self.code = Some(code.trim().to_string());
        self
    }

    pub fn with_conflict(mut self, coupon_id: Uuid) -> Self {
        self.conflicting_coupon_id = Some(coupon_id);
        self
    }
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reason)
    }
}

pub type ValidationResult = Result<(), ValidationFailure>;

/// Form field a failure is reported against.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SubmissionField {
    BaseCode,
    ValidityWindow,
    /// Code of the child coupon with this id
    Child(Uuid),
    /// Affiliate of the child coupon with this id
    ChildAffiliate(Uuid),
}

impl fmt::Display for SubmissionField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BaseCode => f.write_str("code"),
            Self::ValidityWindow => f.write_str("validityWindow"),
            Self::Child(id) => write!(f, "childCoupons[{}].couponCode", id),
            Self::ChildAffiliate(id) => write!(f, "childCoupons[{}].affiliateId", id),
        }
    }
}

/// Every rejected field of one submission. The first failure recorded for a
/// field is kept.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SubmissionReport {
    failures: BTreeMap<SubmissionField, ValidationFailure>,
}

impl SubmissionReport {
    pub fn insert(&mut self, field: SubmissionField, failure: ValidationFailure) {
        self.failures.entry(field).or_insert(failure);
    }

    pub fn merge(&mut self, other: SubmissionReport) {
        for (field, failure) in other.failures {
            self.insert(field, failure);
        }
    }

    pub fn get(&self, field: &SubmissionField) -> Option<&ValidationFailure> {
        self.failures.get(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SubmissionField, &ValidationFailure)> {
        self.failures.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn into_result(self) -> SubmissionResult {
        if self.is_empty() {
            SubmissionResult::Accepted
        } else {
            SubmissionResult::Rejected(self)
        }
    }
}

impl Serialize for SubmissionReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.failures.len()))?;
        for (field, failure) in &self.failures {
            map.serialize_entry(&field.to_string(), failure)?;
        }
        map.end()
    }
}

impl fmt::Display for SubmissionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} field(s) rejected", self.failures.len())?;
        for (field, failure) in &self.failures {
            write!(f, "; {}: {}", field, failure.reason)?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "failures", rename_all = "lowercase")]
pub enum SubmissionResult {
    Accepted,
    Rejected(SubmissionReport),
}

impl SubmissionResult {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }

    pub fn report(&self) -> Option<&SubmissionReport> {
        match self {
            Self::Accepted => None,
            Self::Rejected(report) => Some(report),
        }
    }

    pub fn into_report(self) -> SubmissionReport {
        match self {
            Self::Accepted => SubmissionReport::default(),
            Self::Rejected(report) => report,
        }
    }

    /// Combines two results, keeping every failure of both.
    pub fn and(self, other: SubmissionResult) -> SubmissionResult {
        let mut report = self.into_report();
        report.merge(other.into_report());
        report.into_result()
    }
}

struct CodeOwner<'a> {
    coupon_id: Uuid,
    child_id: Option<Uuid>,
    code: &'a str,
}

/// Normalized code -> every base and child coupon using it. Built once per
/// submission so each candidate is checked without rescanning the population.
struct CodeIndex<'a> {
    owners: HashMap<String, Vec<CodeOwner<'a>>>,
    /// Stored child id -> parent coupon id.
    child_parents: HashMap<Uuid, Uuid>,
}

impl<'a> CodeIndex<'a> {
    fn build(coupons: &'a [Coupon]) -> Self {
        let mut owners: HashMap<String, Vec<CodeOwner<'a>>> = HashMap::new();
        let mut child_parents = HashMap::new();
        for coupon in coupons {
            owners
                .entry(coupon.code.normalized())
                .or_default()
                .push(CodeOwner {
                    coupon_id: coupon.id,
                    child_id: None,
                    code: coupon.code.as_str(),
                });
            for child in &coupon.child_coupons {
                child_parents.insert(child.id, coupon.id);
                owners
                    .entry(child.coupon_code.normalized())
                    .or_default()
                    .push(CodeOwner {
                        coupon_id: coupon.id,
                        child_id: Some(child.id),
                        code: child.coupon_code.as_str(),
                    });
            }
        }
        Self {
            owners,
            child_parents,
        }
    }

    fn owners_of(&self, normalized: &str) -> impl Iterator<Item = &CodeOwner<'a>> {
        self.owners.get(normalized).into_iter().flatten()
    }

    fn check_base(&self, candidate: &str, exclude_coupon_id: Option<Uuid>) -> ValidationResult {
        let normalized = normalize_code(candidate);
        if normalized.is_empty() {
            return Ok(());
        }

        if let Some(owner) = self
            .owners_of(&normalized)
            .find(|o| o.child_id.is_none() && Some(o.coupon_id) != exclude_coupon_id)
        {
            return Err(ValidationFailure::new(
                CodeConflict::DuplicateBaseCode,
                format!("code '{}' is already used by another coupon", owner.code),
            )
            .with_code(candidate)
            .with_conflict(owner.coupon_id));
        }

        if let Some(owner) = self.owners_of(&normalized).find(|o| o.child_id.is_some()) {
            return Err(ValidationFailure::new(
                CodeConflict::DuplicateChildAgainstBase,
                format!("code '{}' is already used by an affiliate child coupon", owner.code),
            )
            .with_code(candidate)
            .with_conflict(owner.coupon_id));
        }

        Ok(())
    }

    /// `session` holds the other children of the same submission, the
    /// candidate itself excluded.
    fn check_child<'s, I>(
        &self,
        candidate: &str,
        current_parent_id: Option<Uuid>,
        session: I,
        pending_base: Option<&Coupon>,
    ) -> ValidationResult
    where
        I: IntoIterator<Item = &'s ChildCoupon>,
    {
        let normalized = normalize_code(candidate);
        if normalized.is_empty() {
            return Ok(());
        }

        if let Some(owner) = self.owners_of(&normalized).find(|o| o.child_id.is_none()) {
            return Err(ValidationFailure::new(
                CodeConflict::DuplicateChildAgainstBase,
                format!("code '{}' is already used as a base coupon code", owner.code),
            )
            .with_code(candidate)
            .with_conflict(owner.coupon_id));
        }

        // The parent's own (possibly changed) base code is not in the index yet.
        if let Some(parent) = pending_base.filter(|p| p.code.normalized() == normalized) {
            return Err(ValidationFailure::new(
                CodeConflict::DuplicateChildAgainstBase,
                format!("code '{}' is the base code of this coupon", parent.code),
            )
            .with_code(candidate)
            .with_conflict(parent.id));
        }

        if session
            .into_iter()
            .any(|c| c.coupon_code.normalized() == normalized)
        {
            return Err(ValidationFailure::new(
                CodeConflict::DuplicateChildInSession,
                format!(
                    "code '{}' is repeated among this coupon's child coupons",
                    candidate.trim()
                ),
            )
            .with_code(candidate));
        }

        if let Some(owner) = self
            .owners_of(&normalized)
            .find(|o| o.child_id.is_some() && Some(o.coupon_id) != current_parent_id)
        {
            return Err(ValidationFailure::new(
                CodeConflict::DuplicateChildAcrossParents,
                format!(
                    "code '{}' is already used by a child coupon of another coupon",
                    owner.code
                ),
            )
            .with_code(candidate)
            .with_conflict(owner.coupon_id));
        }

        Ok(())
    }
}

/// Checks a proposed base coupon code against every base and child code in
/// `all_coupons`. Blank candidates are accepted without checking.
pub fn validate_base_code(
    candidate_code: &str,
    exclude_coupon_id: Option<Uuid>,
    all_coupons: &[Coupon],
) -> ValidationResult {
    CodeIndex::build(all_coupons).check_base(candidate_code, exclude_coupon_id)
}

/// Checks a proposed child coupon code. Stages run in order and the first
/// collision wins: base codes anywhere, the other children of the current
/// submission, then children of other parents.
pub fn validate_child_code(
    candidate_code: &str,
    exclude_child_id: Option<Uuid>,
    current_parent_id: Option<Uuid>,
    session_children: &[ChildCoupon],
    all_coupons: &[Coupon],
) -> ValidationResult {
    CodeIndex::build(all_coupons).check_child(
        candidate_code,
        current_parent_id,
        session_children
            .iter()
            .filter(|c| Some(c.id) != exclude_child_id),
        None,
    )
}

/// Validates a coupon and its child coupons as one submission, collecting a
/// failure for every rejected field. Child ids must be unique within the
/// submission and may only reuse ids of this coupon's stored children.
pub fn validate_submission(
    coupon: &Coupon,
    child_coupons: &[ChildCoupon],
    all_coupons: &[Coupon],
) -> SubmissionResult {
    let index = CodeIndex::build(all_coupons);
    let mut report = SubmissionReport::default();

    if let Err(failure) = index.check_base(coupon.code.as_str(), Some(coupon.id)) {
        report.insert(SubmissionField::BaseCode, failure);
    }

    let mut id_counts: HashMap<Uuid, usize> = HashMap::new();
    for child in child_coupons {
        *id_counts.entry(child.id).or_default() += 1;
    }

    for (position, child) in child_coupons.iter().enumerate() {
        let field = SubmissionField::Child(child.id);

        if id_counts.get(&child.id).copied().unwrap_or(0) > 1 {
            report.insert(
                field,
                ValidationFailure::new(
                    CodeConflict::DuplicateChildId,
                    format!("child coupon id {} is repeated in this coupon", child.id),
                )
                .with_code(child.coupon_code.as_str()),
            );
            continue;
        }

        if let Some(&parent_id) = index
            .child_parents
            .get(&child.id)
            .filter(|&&parent_id| parent_id != coupon.id)
        {
            report.insert(
                field,
                ValidationFailure::new(
                    CodeConflict::ChildIdOfAnotherCoupon,
                    format!(
                        "child coupon id {} belongs to another coupon",
                        child.id
                    ),
                )
                .with_code(child.coupon_code.as_str())
                .with_conflict(parent_id),
            );
            continue;
        }

        let session = child_coupons
            .iter()
            .enumerate()
            .filter(|(other, _)| *other != position)
            .map(|(_, c)| c);
        if let Err(failure) =
            index.check_child(child.coupon_code.as_str(), Some(coupon.id), session, Some(coupon))
        {
            report.insert(field, failure);
        }
    }

    report.into_result()
}

/// One child coupon per affiliate within a parent.
pub fn validate_affiliate_assignments(child_coupons: &[ChildCoupon]) -> SubmissionResult {
    let mut counts: HashMap<Uuid, usize> = HashMap::new();
    for child in child_coupons {
        *counts.entry(child.affiliate_id).or_default() += 1;
    }

    let mut report = SubmissionReport::default();
    for child in child_coupons {
        if counts.get(&child.affiliate_id).copied().unwrap_or(0) > 1 {
            report.insert(
                SubmissionField::ChildAffiliate(child.id),
                ValidationFailure::new(
                    CodeConflict::DuplicateAffiliateInCoupon,
                    format!(
                        "affiliate {} has more than one child coupon in this coupon",
                        child.affiliate_id
                    ),
                ),
            );
        }
    }
    report.into_result()
}
