use async_trait::async_trait;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::{Affiliate, Coupon, User};

pub mod in_memory;
pub mod snapshot;

pub use in_memory::InMemoryStore;
pub use snapshot::Snapshot;

/// A stored aggregate addressable by id.
pub trait Record: Clone + Send + Sync + 'static {
    const KIND: &'static str;

    fn id(&self) -> Uuid;
}

impl Record for Coupon {
    const KIND: &'static str = "Coupon";

    fn id(&self) -> Uuid {
        self.id
    }
}

impl Record for Affiliate {
    const KIND: &'static str = "Affiliate";

    fn id(&self) -> Uuid {
        self.id
    }
}

impl Record for User {
    const KIND: &'static str = "User";

    fn id(&self) -> Uuid {
        self.id
    }
}

/// Change produced by a [`Decision`].
#[derive(Debug, Clone)]
pub enum Mutation<T> {
    Insert(T),
    Replace(T),
    Remove(Uuid),
}

/// Inspects every stored record and decides what to write. Implementations
/// run it while holding exclusive write access, so nothing changes between
/// the decision and the commit.
pub type Decision<T> = Box<dyn FnOnce(&[T]) -> Result<Mutation<T>, ServiceError> + Send>;

#[async_trait]
pub trait Repository<T: Record>: Send + Sync {
    async fn list(&self) -> Result<Vec<T>, ServiceError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<T>, ServiceError>;

    /// Runs `decide` against a consistent view and commits its mutation.
    /// Returns the inserted/replaced record, or the removed one.
    async fn apply(&self, decide: Decision<T>) -> Result<T, ServiceError>;
}

pub trait CouponRepository: Repository<Coupon> {}
impl<R: Repository<Coupon> + ?Sized> CouponRepository for R {}

pub trait AffiliateRepository: Repository<Affiliate> {}
impl<R: Repository<Affiliate> + ?Sized> AffiliateRepository for R {}

pub trait UserRepository: Repository<User> {}
impl<R: Repository<User> + ?Sized> UserRepository for R {}
