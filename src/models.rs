//! Domain records and the table entity mapper.
//!
//! A [`TableEntity`] is the generic shape the table service stores: two
//! keys, system properties, and a bag of string properties.  A
//! [`CustomerProfile`] is the fixed shape the pages work with.  The
//! mapping between the two is pure and performs no validation.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Partition key every customer profile lives under.
pub const CUSTOMER_PARTITION: &str = "Customer";

/// Loyalty tier assigned when the form leaves it blank.
pub const DEFAULT_LOYALTY_TIER: &str = "Bronze";

const FULL_NAME: &str = "FullName";
const EMAIL: &str = "Email";
const FAVORITE_PRODUCT: &str = "FavoriteProduct";
const LOYALTY_TIER: &str = "LoyaltyTier";

/// Generic table record addressed by `(partition_key, row_key)`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TableEntity {
    pub partition_key: String,
    pub row_key: String,
    /// Last-modified time assigned by the service.
    pub timestamp: Option<DateTime<Utc>>,
    /// Optimistic concurrency token assigned by the service.
    pub etag: Option<String>,
    /// User properties.  Only string-typed values are modelled.
    pub properties: BTreeMap<String, String>,
}

impl TableEntity {
    pub fn new(partition_key: impl Into<String>, row_key: impl Into<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
            row_key: row_key.into(),
            ..Default::default()
        }
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }

    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        self.properties.insert(name.to_string(), value.into());
    }
}

/// A customer record as shown and edited on the customer pages.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerProfile {
    /// Always [`CUSTOMER_PARTITION`].
    pub partition_key: String,
    /// Unique identifier, generated once.
    pub row_key: String,
    pub full_name: String,
    pub email: String,
    pub favorite_product: String,
    pub loyalty_tier: String,
    /// Read-only, set by the table service.
    pub timestamp: Option<DateTime<Utc>>,
    /// Read-only, set by the table service.
    pub etag: Option<String>,
}

impl Default for CustomerProfile {
    fn default() -> Self {
        Self {
            partition_key: CUSTOMER_PARTITION.to_string(),
            row_key: new_row_key(),
            full_name: String::new(),
            email: String::new(),
            favorite_product: String::new(),
            loyalty_tier: DEFAULT_LOYALTY_TIER.to_string(),
            timestamp: None,
            etag: None,
        }
    }
}

impl CustomerProfile {
    /// Build a new profile with a freshly generated identifier.  A blank
    /// tier becomes [`DEFAULT_LOYALTY_TIER`].
    pub fn new(full_name: &str, email: &str, favorite_product: &str, loyalty_tier: &str) -> Self {
        Self {
            full_name: full_name.to_string(),
            email: email.to_string(),
            favorite_product: favorite_product.to_string(),
            loyalty_tier: normalize_tier(loyalty_tier),
            ..Default::default()
        }
    }

    /// Map a table record to a profile.  Absent fields become `""`.
    pub fn from_entity(entity: &TableEntity) -> Self {
        let field = |name: &str| entity.get_str(name).unwrap_or_default().to_string();
        Self {
            partition_key: entity.partition_key.clone(),
            row_key: entity.row_key.clone(),
            full_name: field(FULL_NAME),
            email: field(EMAIL),
            favorite_product: field(FAVORITE_PRODUCT),
            loyalty_tier: field(LOYALTY_TIER),
            timestamp: entity.timestamp,
            etag: entity.etag.clone(),
        }
    }

    /// Map a profile to a table record.  All four fields are always written.
    pub fn to_entity(&self) -> TableEntity {
        let mut entity = TableEntity::new(self.partition_key.clone(), self.row_key.clone());
        entity.set(FULL_NAME, self.full_name.as_str());
        entity.set(EMAIL, self.email.as_str());
        entity.set(FAVORITE_PRODUCT, self.favorite_product.as_str());
        entity.set(LOYALTY_TIER, self.loyalty_tier.as_str());
        entity
    }
}

/// Generate a new customer identifier.
pub fn new_row_key() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Return `tier`, or [`DEFAULT_LOYALTY_TIER`] when it is blank.
pub fn normalize_tier(tier: &str) -> String {
    if tier.trim().is_empty() {
        DEFAULT_LOYALTY_TIER.to_string()
    } else {
        tier.to_string()
    }
}

/// A queue message as returned by peek or receive.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueMessage {
    /// Identifier assigned by the queue service.
    pub id: String,
    /// Delivery handle.  Only present on received messages; peeks never
    /// carry one.
    pub pop_receipt: Option<String>,
    pub text: String,
    pub inserted_on: Option<DateTime<Utc>>,
}

/// One entry of a file share directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub name: String,
    pub is_directory: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_profile_defaults() {
        let p = CustomerProfile::new("Ada", "ada@example.com", "Tea", "");
        assert_eq!(p.partition_key, CUSTOMER_PARTITION);
        assert!(!p.row_key.is_empty());
        assert_eq!(p.loyalty_tier, "Bronze");
        assert!(p.timestamp.is_none());
    }

    #[test]
    fn test_new_profiles_get_distinct_ids() {
        let a = CustomerProfile::new("A", "", "", "Gold");
        let b = CustomerProfile::new("A", "", "", "Gold");
        assert_ne!(a.row_key, b.row_key);
        assert_eq!(a.loyalty_tier, "Gold");
    }

    #[test]
    fn test_from_entity_fills_absent_fields_with_empty() {
        let mut entity = TableEntity::new("Customer", "r1");
        entity.set("FullName", "Grace");
        let p = CustomerProfile::from_entity(&entity);
        assert_eq!(p.row_key, "r1");
        assert_eq!(p.full_name, "Grace");
        assert_eq!(p.email, "");
        assert_eq!(p.favorite_product, "");
        assert_eq!(p.loyalty_tier, "");
    }

    #[test]
    fn test_to_entity_writes_all_fields() {
        let mut p = CustomerProfile::new("", "", "", "Silver");
        p.row_key = "r2".into();
        let e = p.to_entity();
        assert_eq!(e.partition_key, "Customer");
        assert_eq!(e.row_key, "r2");
        assert_eq!(e.properties.len(), 4);
        assert_eq!(e.get_str("FullName"), Some(""));
        assert_eq!(e.get_str("LoyaltyTier"), Some("Silver"));
    }

    #[test]
    fn test_system_properties_survive_forward_mapping() {
        let mut entity = TableEntity::new("Customer", "r3");
        entity.etag = Some("W/\"x\"".into());
        entity.timestamp = Some(Utc::now());
        let p = CustomerProfile::from_entity(&entity);
        assert_eq!(p.etag.as_deref(), Some("W/\"x\""));
        assert!(p.timestamp.is_some());
    }

    #[test]
    fn test_normalize_tier() {
        assert_eq!(normalize_tier("  "), "Bronze");
        assert_eq!(normalize_tier("Platinum"), "Platinum");
    }
}
