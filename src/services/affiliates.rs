use chrono::Utc;
use rand::Rng;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::errors::ServiceError;
use crate::models::{Affiliate, AffiliateDraft, Cpf};
use crate::repositories::{AffiliateRepository, Mutation, Repository};

const INTERNAL_CODE_DIGITS: u32 = 6;
const MAX_CODE_ATTEMPTS: usize = 1_000;

#[derive(Clone)]
pub struct AffiliateService {
    affiliates: Arc<dyn AffiliateRepository>,
    code_prefix: String,
}

impl AffiliateService {
    pub fn new(affiliates: Arc<dyn AffiliateRepository>, code_prefix: impl Into<String>) -> Self {
        Self {
            affiliates,
            code_prefix: code_prefix.into(),
        }
    }

    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<Affiliate>, ServiceError> {
        self.affiliates.list().await
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> Result<Affiliate, ServiceError> {
        self.affiliates
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Affiliate", id))
    }

    #[instrument(skip(self))]
    pub async fn get_by_internal_code(&self, code: &str) -> Result<Affiliate, ServiceError> {
        let wanted = code.trim();
        self.affiliates
            .list()
            .await?
            .into_iter()
            .find(|a| a.internal_code.eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Affiliate with internal code {} not found", wanted))
            })
    }

    /// Registers an affiliate and assigns it a fresh internal code.
    #[instrument(skip(self, draft))]
    pub async fn create(&self, draft: AffiliateDraft) -> Result<Affiliate, ServiceError> {
        draft.validate()?;
        let prefix = self.code_prefix.clone();
        let now = Utc::now();

        let created = self
            .affiliates
            .apply(Box::new(
                move |all: &[Affiliate]| -> Result<Mutation<Affiliate>, ServiceError> {
                    let cpf = Cpf::parse(&draft.cpf)?;
                    ensure_unique(all, None, &draft.email, &cpf)?;
                    let internal_code = generate_internal_code(&prefix, all)?;
                    let affiliate = draft.build(Uuid::new_v4(), internal_code, None, now)?;
                    Ok(Mutation::Insert(affiliate))
                },
            ))
            .await?;

        info!(
            affiliate_id = %created.id,
            internal_code = %created.internal_code,
            "Affiliate created"
        );
        Ok(created)
    }

    /// Replaces an affiliate's data. The internal code never changes.
    #[instrument(skip(self, draft))]
    pub async fn update(&self, id: Uuid, draft: AffiliateDraft) -> Result<Affiliate, ServiceError> {
        draft.validate()?;
        let now = Utc::now();

        let updated = self
            .affiliates
            .apply(Box::new(
                move |all: &[Affiliate]| -> Result<Mutation<Affiliate>, ServiceError> {
                    let existing = all
                        .iter()
                        .find(|a| a.id == id)
                        .ok_or_else(|| ServiceError::not_found("Affiliate", id))?;
                    let cpf = Cpf::parse(&draft.cpf)?;
                    ensure_unique(all, Some(id), &draft.email, &cpf)?;
                    let affiliate =
                        draft.build(id, existing.internal_code.clone(), Some(existing), now)?;
                    Ok(Mutation::Replace(affiliate))
                },
            ))
            .await?;

        info!(affiliate_id = %updated.id, "Affiliate updated");
        Ok(updated)
    }

    /// Removes an affiliate. Child coupons that reference it are left as they are.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        self.affiliates
            .apply(Box::new(
                move |_: &[Affiliate]| -> Result<Mutation<Affiliate>, ServiceError> {
                    Ok(Mutation::Remove(id))
                },
            ))
            .await?;
        info!(affiliate_id = %id, "Affiliate deleted");
        Ok(())
    }

    /// Case-insensitive search over name, email and internal code, plus
    /// substring match on CPF digits for numeric terms. A blank term returns
    /// everything.
    #[instrument(skip(self, term))]
    pub async fn search(&self, term: &str) -> Result<Vec<Affiliate>, ServiceError> {
        Ok(self
            .affiliates
            .list()
            .await?
            .into_iter()
            .filter(|a| a.matches(term))
            .collect())
    }
}

fn ensure_unique(
    all: &[Affiliate],
    exclude: Option<Uuid>,
    email: &str,
    cpf: &Cpf,
) -> Result<(), ServiceError> {
    let email = email.trim();
    for other in all.iter().filter(|a| Some(a.id) != exclude) {
        if other.email.eq_ignore_ascii_case(email) {
            return Err(ServiceError::Conflict(format!(
                "an affiliate with email {} already exists",
                email
            )));
        }
        if &other.cpf == cpf {
            return Err(ServiceError::Conflict(format!(
                "an affiliate with CPF {} already exists",
                cpf
            )));
        }
    }
    Ok(())
}

fn generate_internal_code(prefix: &str, all: &[Affiliate]) -> Result<String, ServiceError> {
    let mut rng = rand::thread_rng();
    let upper = 10u32.pow(INTERNAL_CODE_DIGITS);
    for _ in 0..MAX_CODE_ATTEMPTS {
        let candidate = format!(
            "{}{:0width$}",
            prefix,
            rng.gen_range(0..upper),
            width = INTERNAL_CODE_DIGITS as usize
        );
        if !all
            .iter()
            .any(|a| a.internal_code.eq_ignore_ascii_case(&candidate))
        {
            return Ok(candidate);
        }
    }
    Err(ServiceError::Conflict(
        "could not allocate a unique affiliate internal code".to_string(),
    ))
}
