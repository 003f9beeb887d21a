use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::ModelError;

/// Brazilian taxpayer number. Stored as its 11 digits; check digits are not verified.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Cpf(String);

impl Cpf {
    /// Accepts formatted (`123.456.789-09`) or bare input.
    pub fn parse(raw: &str) -> Result<Self, ModelError> {
        let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
        let only_separators = raw
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | ' '));
        if digits.len() != 11 || !only_separators {
            return Err(ModelError::InvalidCpf);
        }
        Ok(Self(digits))
    }

    pub fn digits(&self) -> &str {
        &self.0
    }

    /// Substring match for search terms made of digits and CPF separators.
    /// Any other character means the term is not a CPF lookup.
    pub fn contains_term(&self, term: &str) -> bool {
        let term = term.trim();
        if !term
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | ' '))
        {
            return false;
        }
        let digits: String = term.chars().filter(char::is_ascii_digit).collect();
        !digits.is_empty() && self.0.contains(&digits)
    }

    pub fn formatted(&self) -> String {
        format!(
            "{}.{}.{}-{}",
            &self.0[0..3],
            &self.0[3..6],
            &self.0[6..9],
            &self.0[9..11]
        )
    }
}

impl TryFrom<String> for Cpf {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Cpf> for String {
    fn from(cpf: Cpf) -> Self {
        cpf.formatted()
    }
}

impl fmt::Display for Cpf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.formatted())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Commission {
    Percentage(Decimal),
    Fixed(Decimal),
}

impl Commission {
    pub fn check(&self) -> Result<(), ModelError> {
        match self {
            Self::Percentage(v) if *v > Decimal::ONE_HUNDRED => {
                Err(ModelError::PercentageOutOfRange(v.to_string()))
            }
            Self::Percentage(v) | Self::Fixed(v) if v.is_sign_negative() && !v.is_zero() => {
                Err(ModelError::Negative { field: "commission" })
            }
            _ => Ok(()),
        }
    }
}

/// How commissions are paid out to the affiliate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PayoutMethod {
    Pix {
        key: String,
    },
    #[serde(rename_all = "camelCase")]
    BankTransfer {
        bank_code: String,
        branch: String,
        account: String,
    },
}

impl PayoutMethod {
    pub fn check(&self) -> Result<(), ModelError> {
        let required: &[(&'static str, &str)] = match self {
            Self::Pix { key } => &[("key", key.as_str())],
            Self::BankTransfer {
                bank_code,
                branch,
                account,
            } => &[
                ("bankCode", bank_code.as_str()),
                ("branch", branch.as_str()),
                ("account", account.as_str()),
            ],
        };
        match required.iter().find(|(_, value)| value.trim().is_empty()) {
            Some((field, _)) => Err(ModelError::MissingPayoutField(field)),
            None => Ok(()),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Address {
    pub street: Option<String>,
    pub number: Option<String>,
    pub neighborhood: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SocialNetworks {
    pub facebook: Option<String>,
    pub tiktok: Option<String>,
    pub instagram: Option<String>,
    pub youtube: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Affiliate {
    pub id: Uuid,
    pub name: String,
    pub birth_date: Option<NaiveDate>,
    pub cpf: Cpf,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<Address>,
    pub internal_code: String,
    pub partnership_start_date: NaiveDate,
    pub commission: Commission,
    #[serde(default)]
    pub notes: Option<String>,
    pub payout: PayoutMethod,
    #[serde(default)]
    pub social_networks: SocialNetworks,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Affiliate {
    /// Case-insensitive match on name, email and internal code; substring match on CPF digits.
    pub fn matches(&self, term: &str) -> bool {
        let needle = term.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        self.name.to_lowercase().contains(&needle)
            || self.email.to_lowercase().contains(&needle)
            || self.internal_code.to_lowercase().contains(&needle)
            || self.cpf.contains_term(&needle)
    }
}

/// Create/update payload for an affiliate. The internal code is never supplied
/// by the caller.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AffiliateDraft {
    #[validate(length(min = 2, max = 120))]
    pub name: String,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
    pub cpf: String,
    #[validate(email)]
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<Address>,
    pub partnership_start_date: NaiveDate,
    #[validate(custom = "validate_commission")]
    pub commission: Commission,
    #[serde(default)]
    pub notes: Option<String>,
    #[validate(custom = "validate_payout")]
    pub payout: PayoutMethod,
    #[serde(default)]
    pub social_networks: SocialNetworks,
}

impl AffiliateDraft {
    pub fn build(
        self,
        id: Uuid,
        internal_code: String,
        existing: Option<&Affiliate>,
        now: DateTime<Utc>,
    ) -> Result<Affiliate, ModelError> {
        let cpf = Cpf::parse(&self.cpf)?;
        self.commission.check()?;
        self.payout.check()?;
        Ok(Affiliate {
            id,
            name: self.name.trim().to_string(),
            birth_date: self.birth_date,
            cpf,
            email: self.email.trim().to_string(),
            phone: self.phone,
            address: self.address,
            internal_code,
            partnership_start_date: self.partnership_start_date,
            commission: self.commission,
            notes: self.notes,
            payout: self.payout,
            social_networks: self.social_networks,
            created_at: existing.map(|a| a.created_at).unwrap_or(now),
            updated_at: now,
        })
    }
}

fn validate_commission(commission: &Commission) -> Result<(), ValidationError> {
    commission.check().map_err(|e| {
        let mut err = ValidationError::new("commission");
        err.message = Some(e.to_string().into());
        err
    })
}

fn validate_payout(payout: &PayoutMethod) -> Result<(), ValidationError> {
    payout.check().map_err(|e| {
        let mut err = ValidationError::new("payout");
        err.message = Some(e.to_string().into());
        err
    })
}
