//! Common types used across BookshelfAI

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// ID Wrappers
// =============================================================================

/// Account ID wrapper
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub Uuid);

impl AccountId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AccountId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for AccountId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Enums
// =============================================================================

/// Subscription tier determining the monthly credit allotment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionTier {
    Free,
    Premium,
    Enterprise,
}

impl Default for SubscriptionTier {
    fn default() -> Self {
        Self::Free
    }
}

impl SubscriptionTier {
    /// Monthly credit allotment for this tier.
    /// Paid tiers are configurable via MONTHLY_CREDITS_PREMIUM; Free is fixed.
    pub fn monthly_credits(&self) -> i32 {
        match self {
            Self::Free => 10,
            Self::Premium => std::env::var("MONTHLY_CREDITS_PREMIUM")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(500),
            // Enterprise is unlimited; the stored value is a display ceiling
            // that is never decremented.
            Self::Enterprise => i32::MAX,
        }
    }

    /// Unlimited tiers bypass the credit decrement entirely.
    pub fn is_unlimited(&self) -> bool {
        matches!(self, Self::Enterprise)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Premium => "premium",
            Self::Enterprise => "enterprise",
        }
    }
}

impl std::str::FromStr for SubscriptionTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "free" => Ok(Self::Free),
            "premium" => Ok(Self::Premium),
            "enterprise" => Ok(Self::Enterprise),
            other => Err(format!("unknown tier: {}", other)),
        }
    }
}

impl std::fmt::Display for SubscriptionTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The kind of AI generation a client can request.
///
/// Each action consumes credits; most cost 1, cross-referencing costs 2
/// because it prompts over the whole library rather than a single book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Script,
    Ideas,
    Quotes,
    Questions,
    Chat,
    EditorialLine,
    CrossReference,
}

impl ActionType {
    /// Credits consumed by one successful generation of this type.
    pub fn cost(&self) -> i32 {
        match self {
            Self::CrossReference => 2,
            _ => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Script => "script",
            Self::Ideas => "ideas",
            Self::Quotes => "quotes",
            Self::Questions => "questions",
            Self::Chat => "chat",
            Self::EditorialLine => "editorial_line",
            Self::CrossReference => "cross_reference",
        }
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_free_tier_credits() {
        assert_eq!(SubscriptionTier::Free.monthly_credits(), 10);
    }

    #[test]
    fn test_only_enterprise_is_unlimited() {
        assert!(SubscriptionTier::Enterprise.is_unlimited());
        assert!(!SubscriptionTier::Premium.is_unlimited());
        assert!(!SubscriptionTier::Free.is_unlimited());
    }

    #[test]
    fn test_tier_round_trip() {
        for tier in [
            SubscriptionTier::Free,
            SubscriptionTier::Premium,
            SubscriptionTier::Enterprise,
        ] {
            let parsed: SubscriptionTier = tier.as_str().parse().unwrap();
            assert_eq!(parsed, tier);
        }
        assert!("platinum".parse::<SubscriptionTier>().is_err());
    }

    #[test]
    fn test_action_costs() {
        assert_eq!(ActionType::Script.cost(), 1);
        assert_eq!(ActionType::Chat.cost(), 1);
        assert_eq!(ActionType::EditorialLine.cost(), 1);
        assert_eq!(ActionType::CrossReference.cost(), 2);
    }

    #[test]
    fn test_action_type_serde_names() {
        let json = serde_json::to_string(&ActionType::CrossReference).unwrap();
        assert_eq!(json, "\"cross_reference\"");
        let parsed: ActionType = serde_json::from_str("\"editorial_line\"").unwrap();
        assert_eq!(parsed, ActionType::EditorialLine);
    }
}
