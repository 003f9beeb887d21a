use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

use crate::errors::ServiceError;
use crate::models::{Affiliate, Coupon, User};

/// JSON document holding every collection, used to seed and persist the
/// in-memory store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    pub coupons: Vec<Coupon>,
    pub affiliates: Vec<Affiliate>,
    pub users: Vec<User>,
}

impl Snapshot {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ServiceError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| {
            ServiceError::StorageError(format!("failed to read {}: {}", path.display(), e))
        })?;
        let snapshot: Snapshot = serde_json::from_str(&raw)?;
        info!(
            path = %path.display(),
            coupons = snapshot.coupons.len(),
            affiliates = snapshot.affiliates.len(),
            users = snapshot.users.len(),
            "snapshot loaded"
        );
        Ok(snapshot)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ServiceError> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|e| {
            ServiceError::StorageError(format!("failed to write {}: {}", path.display(), e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn missing_collections_default_to_empty() {
        let snapshot: Snapshot = serde_json::from_str("{}").unwrap();
        assert_eq!(snapshot, Snapshot::default());
    }

    #[test]
    fn save_then_load_preserves_contents() {
        let file = NamedTempFile::new().unwrap();
        let snapshot: Snapshot = serde_json::from_value(serde_json::json!({
            "coupons": [{
                "id": "6f1c0d1e-7f5b-4c53-9a57-3a2f4b8f8d10",
                "code": "PROMO10",
                "name": "Promo",
                "discount": {"type": "percentage", "value": 10},
                "availableQuantity": 50,
                "usedCount": 3,
                "startDate": "2024-01-01",
                "validUntil": "2024-12-31",
                "isActive": true,
                "createdAt": "2024-01-01T00:00:00Z",
                "updatedAt": "2024-01-01T00:00:00Z",
                "childCoupons": []
            }]
        }))
        .unwrap();

        snapshot.save(file.path()).unwrap();
        let loaded = Snapshot::load(file.path()).unwrap();
        assert_eq!(loaded, snapshot);
        assert_eq!(loaded.coupons[0].used_count, 3);
    }

    #[test]
    fn unreadable_file_is_a_storage_error() {
        let err = Snapshot::load("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, ServiceError::StorageError(_)));
    }
}
