//! Coupon Admin Library
//!
//! Administrative backend for an affiliate coupon program: coupon and child
//! coupon code validation, affiliates, users and usage metrics.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod config;
pub mod errors;
pub mod models;
pub mod repositories;
pub mod services;
pub mod validation;

use std::sync::Arc;
use tracing::info;

use crate::errors::ServiceError;
use crate::repositories::{InMemoryStore, Snapshot};
use crate::services::{AffiliateService, CouponService, DashboardService, UserService};
use crate::validation::CouponPolicy;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub config: config::AppConfig,
    pub store: Arc<InMemoryStore>,
    pub coupons: CouponService,
    pub affiliates: AffiliateService,
    pub users: UserService,
    pub dashboard: DashboardService,
}

impl AppState {
    /// Builds every service on top of one in-memory store seeded with `snapshot`.
    pub fn new(config: config::AppConfig, snapshot: Snapshot) -> Self {
        let store = Arc::new(InMemoryStore::from_snapshot(snapshot));
        let policy = CouponPolicy::from(&config);

        let coupons = CouponService::new(
            store.clone(),
            store.clone(),
            policy,
            config.top_coupons_limit,
        );
        let affiliates = AffiliateService::new(store.clone(), config.affiliate_code_prefix.clone());
        let users = UserService::new(
            store.clone(),
            config.protected_admin_email().map(str::to_string),
        );
        let dashboard = DashboardService::new(store.clone(), store.clone(), config.top_coupons_limit);

        Self {
            config,
            store,
            coupons,
            affiliates,
            users,
            dashboard,
        }
    }

    /// Seeds the store from `config.snapshot_path` when one is configured.
    pub fn from_config(config: config::AppConfig) -> Result<Self, ServiceError> {
        let snapshot = match config.snapshot_path.as_deref() {
            Some(path) => Snapshot::load(path)?,
            None => {
                info!("No snapshot configured; starting with an empty store");
                Snapshot::default()
            }
        };
        Ok(Self::new(config, snapshot))
    }
}

pub mod prelude {
    pub use crate::config::{AppConfig, AppConfigError};
    pub use crate::errors::*;
    pub use crate::models::*;
    pub use crate::repositories::{InMemoryStore, Snapshot};
    pub use crate::services::*;
    pub use crate::validation::*;
    pub use crate::AppState;
}
