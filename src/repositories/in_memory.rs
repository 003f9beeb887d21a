use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::{Decision, Mutation, Record, Repository, Snapshot};
use crate::errors::ServiceError;
use crate::models::{Affiliate, Coupon, User};

struct Table<T> {
    rows: RwLock<Vec<T>>,
}

impl<T: Record> Table<T> {
    fn new(rows: Vec<T>) -> Self {
        Self {
            rows: RwLock::new(rows),
        }
    }

    async fn list(&self) -> Vec<T> {
        self.rows.read().await.clone()
    }

    async fn find_by_id(&self, id: Uuid) -> Option<T> {
        self.rows.read().await.iter().find(|r| r.id() == id).cloned()
    }

    async fn apply(&self, decide: Decision<T>) -> Result<T, ServiceError> {
        let mut rows = self.rows.write().await;
        match decide(rows.as_slice())? {
            Mutation::Insert(record) => {
                if rows.iter().any(|r| r.id() == record.id()) {
                    return Err(ServiceError::Conflict(format!(
                        "{} with ID {} already exists",
                        T::KIND,
                        record.id()
                    )));
                }
                debug!(kind = T::KIND, id = %record.id(), "insert");
                rows.push(record.clone());
                Ok(record)
            }
            Mutation::Replace(record) => {
                let id = record.id();
                let slot = rows
                    .iter_mut()
                    .find(|r| r.id() == id)
                    .ok_or_else(|| ServiceError::not_found(T::KIND, id))?;
                debug!(kind = T::KIND, %id, "replace");
                *slot = record.clone();
                Ok(record)
            }
            Mutation::Remove(id) => {
                let pos = rows
                    .iter()
                    .position(|r| r.id() == id)
                    .ok_or_else(|| ServiceError::not_found(T::KIND, id))?;
                debug!(kind = T::KIND, %id, "remove");
                Ok(rows.remove(pos))
            }
        }
    }
}

/// Process-local store backing all three repositories. Each collection has
/// its own lock.
pub struct InMemoryStore {
    coupons: Table<Coupon>,
    affiliates: Table<Affiliate>,
    users: Table<User>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::from_snapshot(Snapshot::default())
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        Self {
            coupons: Table::new(snapshot.coupons),
            affiliates: Table::new(snapshot.affiliates),
            users: Table::new(snapshot.users),
        }
    }

    /// Copies the current contents. Collections are read one after another,
    /// not under a single lock.
    pub async fn snapshot(&self) -> Snapshot {
        Snapshot {
            coupons: self.coupons.list().await,
            affiliates: self.affiliates.list().await,
            users: self.users.list().await,
        }
    }
}

macro_rules! impl_repository {
    ($record:ty, $table:ident) => {
        #[async_trait]
        impl Repository<$record> for InMemoryStore {
            async fn list(&self) -> Result<Vec<$record>, ServiceError> {
                Ok(self.$table.list().await)
            }

            async fn find_by_id(&self, id: Uuid) -> Result<Option<$record>, ServiceError> {
                Ok(self.$table.find_by_id(id).await)
            }

            async fn apply(&self, decide: Decision<$record>) -> Result<$record, ServiceError> {
                self.$table.apply(decide).await
            }
        }
    };
}

impl_repository!(Coupon, coupons);
impl_repository!(Affiliate, affiliates);
impl_repository!(User, users);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Cpf, Role};
    use chrono::Utc;

    fn user(name: &str) -> User {
        User {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: format!("{}@example.com", name),
            cpf: Cpf::parse("12345678909").unwrap(),
            phone: String::new(),
            role: Role::Admin,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn always(mutation: Mutation<User>) -> Decision<User> {
        Box::new(move |_: &[User]| -> Result<Mutation<User>, ServiceError> { Ok(mutation) })
    }

    async fn apply(store: &InMemoryStore, decide: Decision<User>) -> Result<User, ServiceError> {
        Repository::<User>::apply(store, decide).await
    }

    #[tokio::test]
    async fn apply_inserts_replaces_and_removes() {
        let store = InMemoryStore::new();
        let ana = user("ana");
        let id = ana.id;

        let inserted = apply(&store, always(Mutation::Insert(ana))).await.unwrap();
        assert_eq!(inserted.id, id);

        let mut renamed = inserted.clone();
        renamed.name = "Ana Maria".to_string();
        apply(&store, always(Mutation::Replace(renamed))).await.unwrap();
        let found = Repository::<User>::find_by_id(&store, id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.name, "Ana Maria");

        apply(&store, always(Mutation::Remove(id))).await.unwrap();
        assert!(Repository::<User>::list(&store).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_records_and_duplicate_ids_are_errors() {
        let store = InMemoryStore::new();
        let err = apply(&store, always(Mutation::Remove(Uuid::nil())))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));

        let bia = user("bia");
        let again = bia.clone();
        apply(&store, always(Mutation::Insert(bia))).await.unwrap();
        let err = apply(&store, always(Mutation::Insert(again)))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn rejected_decisions_leave_rows_untouched() {
        let store = InMemoryStore::from_snapshot(Snapshot {
            users: vec![user("caio")],
            ..Snapshot::default()
        });
        let err = apply(
            &store,
            Box::new(|rows: &[User]| -> Result<Mutation<User>, ServiceError> {
                assert_eq!(rows.len(), 1);
                Err(ServiceError::Conflict("nope".into()))
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
        assert_eq!(store.snapshot().await.users.len(), 1);
    }
}
