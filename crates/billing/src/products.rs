//! Product mapping
//!
//! Static translation from the payment provider's product/offer identifiers
//! to a tier + credit grant. Built once at startup and passed into the
//! webhook handler; never mutated at runtime. An identifier missing from the
//! map is a configuration gap, not an error the provider should retry.

use std::collections::HashMap;

use bookshelf_shared::SubscriptionTier;
use serde::Deserialize;

/// What a purchased product grants the buyer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ProductGrant {
    pub tier: SubscriptionTier,
    pub credits: i32,
}

/// Immutable product-id → grant table.
#[derive(Debug, Clone)]
pub struct ProductMapping {
    map: HashMap<String, ProductGrant>,
}

impl ProductMapping {
    /// Built-in mapping for the known storefront products.
    pub fn defaults() -> Self {
        let mut map = HashMap::new();
        map.insert(
            "bookshelf-premium-monthly".to_string(),
            ProductGrant {
                tier: SubscriptionTier::Premium,
                credits: 500,
            },
        );
        map.insert(
            "bookshelf-premium-annual".to_string(),
            ProductGrant {
                tier: SubscriptionTier::Premium,
                credits: 500,
            },
        );
        map.insert(
            "bookshelf-enterprise".to_string(),
            ProductGrant {
                tier: SubscriptionTier::Enterprise,
                credits: 1_000_000,
            },
        );
        Self { map }
    }

    /// Load the mapping, honoring a PRODUCT_MAPPING_JSON override of the
    /// form `{"<product_id>": {"tier": "premium", "credits": 500}, ...}`.
    pub fn from_env() -> Self {
        match std::env::var("PRODUCT_MAPPING_JSON") {
            Ok(raw) => match serde_json::from_str::<HashMap<String, ProductGrant>>(&raw) {
                Ok(map) if !map.is_empty() => {
                    tracing::info!(products = map.len(), "Product mapping loaded from env");
                    Self { map }
                }
                Ok(_) => {
                    tracing::warn!("PRODUCT_MAPPING_JSON is empty, using built-in defaults");
                    Self::defaults()
                }
                Err(e) => {
                    tracing::error!(error = %e, "Invalid PRODUCT_MAPPING_JSON, using built-in defaults");
                    Self::defaults()
                }
            },
            Err(_) => Self::defaults(),
        }
    }

    pub fn lookup(&self, product_id: &str) -> Option<ProductGrant> {
        self.map.get(product_id).copied()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_map_premium() {
        let mapping = ProductMapping::defaults();
        let grant = mapping.lookup("bookshelf-premium-monthly").unwrap();
        assert_eq!(grant.tier, SubscriptionTier::Premium);
        assert_eq!(grant.credits, 500);
    }

    #[test]
    fn test_unknown_product_is_none() {
        let mapping = ProductMapping::defaults();
        assert!(mapping.lookup("someone-elses-product").is_none());
    }

    #[test]
    fn test_grant_json_shape() {
        let grant: ProductGrant =
            serde_json::from_str(r#"{"tier": "premium", "credits": 500}"#).unwrap();
        assert_eq!(grant.tier, SubscriptionTier::Premium);
        assert_eq!(grant.credits, 500);
    }
}
