use chrono::Utc;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::errors::ServiceError;
use crate::models::{User, UserDraft};
use crate::repositories::{Mutation, Repository, UserRepository};

#[derive(Clone)]
pub struct UserService {
    users: Arc<dyn UserRepository>,
    protected_admin_email: Option<String>,
}

impl UserService {
    /// `protected_admin_email` names the account [`UserService::delete`] refuses to remove.
    pub fn new(users: Arc<dyn UserRepository>, protected_admin_email: Option<String>) -> Self {
        Self {
            users,
            protected_admin_email,
        }
    }

    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<User>, ServiceError> {
        self.users.list().await
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> Result<User, ServiceError> {
        self.users
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("User", id))
    }

    #[instrument(skip(self, draft), fields(role = %draft.role))]
    pub async fn create(&self, draft: UserDraft) -> Result<User, ServiceError> {
        draft.validate()?;
        let now = Utc::now();
        let created = self
            .users
            .apply(Box::new(
                move |all: &[User]| -> Result<Mutation<User>, ServiceError> {
                    ensure_email_free(all, None, &draft.email)?;
                    Ok(Mutation::Insert(draft.build(Uuid::new_v4(), None, now)?))
                },
            ))
            .await?;
        info!(user_id = %created.id, "User created");
        Ok(created)
    }

    #[instrument(skip(self, draft), fields(role = %draft.role))]
    pub async fn update(&self, id: Uuid, draft: UserDraft) -> Result<User, ServiceError> {
        draft.validate()?;
        let now = Utc::now();
        let updated = self
            .users
            .apply(Box::new(
                move |all: &[User]| -> Result<Mutation<User>, ServiceError> {
                    let existing = all
                        .iter()
                        .find(|u| u.id == id)
                        .ok_or_else(|| ServiceError::not_found("User", id))?;
                    ensure_email_free(all, Some(id), &draft.email)?;
                    Ok(Mutation::Replace(draft.build(id, Some(existing), now)?))
                },
            ))
            .await?;
        info!(user_id = %updated.id, "User updated");
        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        let protected = self.protected_admin_email.clone();
        self.users
            .apply(Box::new(
                move |all: &[User]| -> Result<Mutation<User>, ServiceError> {
                    let user = all
                        .iter()
                        .find(|u| u.id == id)
                        .ok_or_else(|| ServiceError::not_found("User", id))?;
                    if protected
                        .as_deref()
                        .is_some_and(|email| user.email.eq_ignore_ascii_case(email))
                    {
                        return Err(ServiceError::Conflict(
                            "the principal admin user cannot be deleted".to_string(),
                        ));
                    }
                    Ok(Mutation::Remove(id))
                },
            ))
            .await
            .map_err(|e| {
                if matches!(e, ServiceError::Conflict(_)) {
                    warn!(user_id = %id, "Refused to delete the principal admin");
                }
                e
            })?;
        info!(user_id = %id, "User deleted");
        Ok(())
    }

    /// Case-insensitive search over name and email, plus substring match on
    /// CPF digits for numeric terms. A blank term returns everything.
    #[instrument(skip(self, term))]
    pub async fn search(&self, term: &str) -> Result<Vec<User>, ServiceError> {
        Ok(self
            .users
            .list()
            .await?
            .into_iter()
            .filter(|u| u.matches(term))
            .collect())
    }
}

fn ensure_email_free(all: &[User], exclude: Option<Uuid>, email: &str) -> Result<(), ServiceError> {
    let email = email.trim();
    if all
        .iter()
        .any(|u| Some(u.id) != exclude && u.email.eq_ignore_ascii_case(email))
    {
        return Err(ServiceError::Conflict(format!(
            "a user with email {} already exists",
            email
        )));
    }
    Ok(())
}
