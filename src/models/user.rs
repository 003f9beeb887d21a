use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::{Cpf, ModelError};

/// Access role of an admin panel user. Wire names follow the panel's
/// Portuguese labels.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
pub enum Role {
    #[serde(rename = "admin")]
    #[strum(serialize = "admin")]
    Admin,
    #[serde(rename = "afiliado")]
    #[strum(to_string = "afiliado", serialize = "affiliate")]
    Affiliate,
    #[serde(rename = "polo")]
    #[strum(to_string = "polo", serialize = "hub")]
    Hub,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub cpf: Cpf,
    #[serde(default)]
    pub phone: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UserDraft {
    #[validate(length(min = 2, max = 120))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    pub cpf: String,
    #[serde(default)]
    #[validate(length(max = 32))]
    pub phone: String,
    pub role: Role,
}

impl User {
    /// Case-insensitive match on name and email; substring match on CPF digits.
    pub fn matches(&self, term: &str) -> bool {
        let needle = term.trim().to_lowercase();
        needle.is_empty()
            || self.name.to_lowercase().contains(&needle)
            || self.email.to_lowercase().contains(&needle)
            || self.cpf.contains_term(&needle)
    }
}

impl UserDraft {
    pub fn build(
        self,
        id: Uuid,
        existing: Option<&User>,
        now: DateTime<Utc>,
    ) -> Result<User, ModelError> {
        Ok(User {
            id,
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            cpf: Cpf::parse(&self.cpf)?,
            phone: self.phone,
            role: self.role,
            created_at: existing.map(|u| u.created_at).unwrap_or(now),
            updated_at: now,
        })
    }
}
