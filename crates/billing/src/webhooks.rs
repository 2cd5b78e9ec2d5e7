//! Payment webhook ingestion
//!
//! Receives purchase callbacks from the payment provider, authenticates them
//! with a shared-secret token, deduplicates by idempotency key, maps the
//! purchased product to a tier + credit grant, and applies the grant to the
//! buyer's ledger entry.
//!
//! The provider retries any delivery that does not get a 2xx, so every
//! business outcome that should NOT be retried (duplicate, irrelevant event,
//! unknown product, unresolvable buyer) is an acknowledged `WebhookOutcome`,
//! not an error. Only real persistence failures surface as errors.

use bookshelf_shared::SubscriptionTier;
use serde_json::Value;
use sqlx::PgPool;
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::error::BillingResult;
use crate::events::{BillingEventBuilder, BillingEventLogger, BillingEventType};
use crate::ledger::LedgerService;
use crate::products::ProductMapping;

/// Event-type substrings that identify a purchase/activation callback.
/// Everything else the provider sends is acknowledged and ignored.
const PURCHASE_EVENT_PATTERNS: &[&str] = &[
    "purchase.approved",
    "purchase_approved",
    "newsale",
    "invoice.payment_succeeded",
    "subscription.activated",
    "subscription.renewed",
];

/// Immutable configuration assembled at startup.
#[derive(Clone)]
pub struct WebhookConfig {
    /// Shared secret expected in the x-provider-token header. When unset the
    /// auth check is skipped, which is a deployment misconfiguration risk.
    pub shared_token: Option<String>,
    pub products: ProductMapping,
}

/// Terminal result of processing one delivery. The HTTP layer maps each
/// variant to a status code; see the route handler.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum WebhookOutcome {
    /// Token missing or wrong → 401, provider will retry with a fixed config.
    Unauthorized,
    /// Idempotency key already recorded → 200, no mutation.
    Duplicate { idempotency_key: String },
    /// Body unparseable or a required field absent → 400.
    Malformed { reason: String },
    /// Event type not in the purchase allow-list → 200, nothing to do.
    IrrelevantEvent { event_type: String },
    /// Product id not in the mapping → 200, logged as a configuration gap.
    UnknownProduct { product_id: String },
    /// No account matches the buyer email → 200 with the intended grant, so
    /// support can upgrade manually. Retries won't make the account appear.
    AccountNotFound {
        email: String,
        tier: SubscriptionTier,
        credits: i32,
    },
    /// Grant applied.
    Applied {
        account_id: Uuid,
        email: String,
        tier: SubscriptionTier,
        credits: i32,
    },
}

pub struct WebhookHandler {
    pool: PgPool,
    config: WebhookConfig,
    ledger: LedgerService,
    event_logger: BillingEventLogger,
}

impl WebhookHandler {
    pub fn new(pool: PgPool, config: WebhookConfig) -> Self {
        if config.shared_token.is_none() {
            tracing::warn!(
                "PAYMENT_WEBHOOK_TOKEN not configured - webhook authentication is DISABLED"
            );
        }
        let ledger = LedgerService::new(pool.clone());
        let event_logger = BillingEventLogger::new(pool.clone());
        Self {
            pool,
            config,
            ledger,
            event_logger,
        }
    }

    /// Process one delivery end to end.
    ///
    /// `token` and `idempotency_key` come from the provider headers; `body`
    /// is the raw request body. Method filtering happens at the router.
    pub async fn handle(
        &self,
        token: Option<&str>,
        idempotency_key: Option<&str>,
        body: &[u8],
    ) -> BillingResult<WebhookOutcome> {
        // Auth
        if let Some(expected) = &self.config.shared_token {
            if !token.is_some_and(|t| token_matches(expected, t)) {
                tracing::warn!("Webhook rejected: bad or missing provider token");
                return Ok(WebhookOutcome::Unauthorized);
            }
        }

        // Dedup. A read is enough here: the permanent record insert below is
        // guarded by the primary key, and the grant itself is an absolute set,
        // so an overlapping pair of deliveries converges to the same state.
        if let Some(key) = idempotency_key {
            if self.is_already_processed(key).await? {
                tracing::info!(idempotency_key = %key, "Duplicate webhook delivery ignored");
                return Ok(WebhookOutcome::Duplicate {
                    idempotency_key: key.to_string(),
                });
            }
        }

        // Parse
        let payload: Value = match serde_json::from_slice(body) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "Webhook body is not valid JSON");
                return Ok(WebhookOutcome::Malformed {
                    reason: "invalid JSON body".to_string(),
                });
            }
        };

        // Event filter
        let event_type = extract_event_type(&payload).unwrap_or_default();
        if !is_purchase_event(&event_type) {
            tracing::info!(event_type = %event_type, "Webhook event not relevant");
            return Ok(WebhookOutcome::IrrelevantEvent { event_type });
        }

        // Buyer email
        let email = match extract_email(&payload) {
            Some(found) => {
                tracing::info!(
                    strategy = found.strategy,
                    "Customer email extracted from webhook payload"
                );
                found.value
            }
            None => {
                return Ok(WebhookOutcome::Malformed {
                    reason: "no customer email found in payload".to_string(),
                });
            }
        };

        // Product id
        let product_id = match extract_product_id(&payload) {
            Some(found) => {
                tracing::info!(
                    strategy = found.strategy,
                    "Product id extracted from webhook payload"
                );
                found.value
            }
            None => {
                return Ok(WebhookOutcome::Malformed {
                    reason: "no product id found in payload".to_string(),
                });
            }
        };

        // Product mapping
        let grant = match self.config.products.lookup(&product_id) {
            Some(grant) => grant,
            None => {
                // Acknowledged so the provider stops retrying; needs a human.
                tracing::error!(
                    product_id = %product_id,
                    customer_email = %email,
                    "Webhook product id has no mapping - manual follow-up required"
                );
                return Ok(WebhookOutcome::UnknownProduct { product_id });
            }
        };

        // Account resolution
        let account_id = match self.find_account_by_email(&email).await? {
            Some(id) => id,
            None => {
                tracing::warn!(
                    customer_email = %email,
                    tier = %grant.tier,
                    credits = grant.credits,
                    "Webhook buyer has no account - manual upgrade needed"
                );
                return Ok(WebhookOutcome::AccountNotFound {
                    email,
                    tier: grant.tier,
                    credits: grant.credits,
                });
            }
        };

        // Ledger update. Failure propagates as a 500; the provider's retry is
        // safe because the grant is idempotent-by-value.
        self.ledger
            .apply_grant(account_id, grant.tier, grant.credits)
            .await?;

        // Record + audit log, both best-effort: the mutation already landed.
        if let Some(key) = idempotency_key {
            self.record_processed(
                key,
                &event_type,
                &email,
                &product_id,
                grant.tier,
                grant.credits,
            )
            .await;
        }

        if let Err(e) = self
            .event_logger
            .log_event(
                BillingEventBuilder::new(Some(account_id), BillingEventType::WebhookApplied)
                    .data(serde_json::json!({
                        "event_type": event_type,
                        "product_id": product_id,
                        "tier": grant.tier,
                        "credits": grant.credits,
                    }))
                    .idempotency_key(idempotency_key),
            )
            .await
        {
            tracing::warn!(error = %e, "Failed to log webhook billing event");
        }

        tracing::info!(
            account_id = %account_id,
            tier = %grant.tier,
            credits = grant.credits,
            "Webhook grant applied"
        );

        Ok(WebhookOutcome::Applied {
            account_id,
            email,
            tier: grant.tier,
            credits: grant.credits,
        })
    }

    async fn is_already_processed(&self, idempotency_key: &str) -> BillingResult<bool> {
        let exists: (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM processed_webhooks WHERE idempotency_key = $1)",
        )
        .bind(idempotency_key)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists.0)
    }

    async fn find_account_by_email(&self, email: &str) -> BillingResult<Option<Uuid>> {
        let row: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM accounts WHERE LOWER(email) = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|(id,)| id))
    }

    /// Insert the dedup record. ON CONFLICT DO NOTHING makes the concurrent
    /// check-and-insert safe; a failure here must not fail the delivery since
    /// the ledger mutation already succeeded.
    async fn record_processed(
        &self,
        idempotency_key: &str,
        event_type: &str,
        email: &str,
        product_id: &str,
        tier: SubscriptionTier,
        credits: i32,
    ) {
        let result = sqlx::query(
            r#"
            INSERT INTO processed_webhooks
                (idempotency_key, event_type, customer_email, product_id, tier_granted, credits_granted)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (idempotency_key) DO NOTHING
            "#,
        )
        .bind(idempotency_key)
        .bind(event_type)
        .bind(email)
        .bind(product_id)
        .bind(tier)
        .bind(credits)
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            tracing::error!(
                idempotency_key = %idempotency_key,
                error = %e,
                "Failed to record processed webhook - future duplicates of this key will reapply"
            );
        }
    }
}

/// Constant-time token comparison. Length is compared first; that leaks the
/// secret's length, not its contents.
fn token_matches(expected: &str, provided: &str) -> bool {
    expected.len() == provided.len() && expected.as_bytes().ct_eq(provided.as_bytes()).into()
}

fn is_purchase_event(event_type: &str) -> bool {
    let normalized = event_type.trim().to_lowercase();
    if normalized.is_empty() {
        return false;
    }
    PURCHASE_EVENT_PATTERNS
        .iter()
        .any(|pattern| normalized.contains(pattern))
}

/// A value located in the payload, tagged with the strategy that found it so
/// schema drift shows up in logs before it breaks extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    pub strategy: &'static str,
    pub value: String,
}

/// Dotted paths probed, in order, to locate the buyer email. The provider's
/// payloads are not versioned; these are the shapes seen in the wild.
const EMAIL_PATHS: &[&str] = &[
    "event.user.email",
    "event.userEmail",
    "event.customer.email",
    "user.email",
    "customer.email",
    "buyer.email",
    "purchaser.email",
    "data.customer.email",
    "email",
];

/// Dotted paths probed, in order, to locate the purchased product id.
const PRODUCT_PATHS: &[&str] = &[
    "event.product.id",
    "event.productId",
    "event.product_id",
    "event.offer.id",
    "product.id",
    "productId",
    "product_id",
    "offer.id",
    "offer_id",
    "data.product.id",
    "item.id",
];

fn extract_event_type(payload: &Value) -> Option<String> {
    for path in ["event_type", "type", "event"] {
        if let Some(Value::String(s)) = probe_path(payload, path) {
            return Some(s.trim().to_string());
        }
    }
    None
}

pub(crate) fn extract_email(payload: &Value) -> Option<Extracted> {
    for path in EMAIL_PATHS {
        if let Some(Value::String(s)) = probe_path(payload, path) {
            let email = s.trim().to_lowercase();
            if email.contains('@') {
                return Some(Extracted {
                    strategy: path,
                    value: email,
                });
            }
        }
    }
    None
}

pub(crate) fn extract_product_id(payload: &Value) -> Option<Extracted> {
    for path in PRODUCT_PATHS {
        match probe_path(payload, path) {
            Some(Value::String(s)) if !s.trim().is_empty() => {
                return Some(Extracted {
                    strategy: path,
                    value: s.trim().to_string(),
                });
            }
            Some(Value::Number(n)) => {
                return Some(Extracted {
                    strategy: path,
                    value: n.to_string(),
                });
            }
            _ => {}
        }
    }
    None
}

/// Walk a dotted path through nested objects, matching keys
/// case-insensitively.
fn probe_path<'a>(payload: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = payload;
    for segment in path.split('.') {
        let obj = current.as_object()?;
        current = obj
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(segment))
            .map(|(_, v)| v)?;
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_token_match_is_exact() {
        assert!(token_matches("s3cret", "s3cret"));
        assert!(!token_matches("s3cret", "S3cret"));
        assert!(!token_matches("s3cret", "s3cret "));
        assert!(!token_matches("s3cret", ""));
    }

    #[test]
    fn test_purchase_event_filter() {
        assert!(is_purchase_event("purchase.approved"));
        assert!(is_purchase_event("NewSale"));
        assert!(is_purchase_event("hubla.subscription.renewed"));
        assert!(!is_purchase_event("customer.updated"));
        assert!(!is_purchase_event("refund.created"));
        assert!(!is_purchase_event(""));
    }

    #[test]
    fn test_email_extracted_from_nested_event_user() {
        let payload = json!({
            "event": { "user": { "email": "  Reader@Example.COM " } }
        });
        let found = extract_email(&payload).unwrap();
        assert_eq!(found.strategy, "event.user.email");
        assert_eq!(found.value, "reader@example.com");
    }

    #[test]
    fn test_email_probing_order_prefers_event_shape() {
        let payload = json!({
            "event": { "userEmail": "first@example.com" },
            "customer": { "email": "second@example.com" }
        });
        let found = extract_email(&payload).unwrap();
        assert_eq!(found.strategy, "event.userEmail");
        assert_eq!(found.value, "first@example.com");
    }

    #[test]
    fn test_email_field_names_are_case_insensitive() {
        let payload = json!({ "Buyer": { "EMAIL": "buyer@example.com" } });
        let found = extract_email(&payload).unwrap();
        assert_eq!(found.strategy, "buyer.email");
        assert_eq!(found.value, "buyer@example.com");
    }

    #[test]
    fn test_non_email_string_is_skipped() {
        // A name in an email slot should not satisfy extraction.
        let payload = json!({
            "customer": { "email": "not-an-address" },
            "purchaser": { "email": "real@example.com" }
        });
        let found = extract_email(&payload).unwrap();
        assert_eq!(found.strategy, "purchaser.email");
    }

    #[test]
    fn test_missing_email_is_none() {
        let payload = json!({ "event": { "id": "evt_1" } });
        assert!(extract_email(&payload).is_none());
    }

    #[test]
    fn test_product_id_from_string_and_number() {
        let payload = json!({ "event": { "product": { "id": "bookshelf-premium-monthly" } } });
        let found = extract_product_id(&payload).unwrap();
        assert_eq!(found.strategy, "event.product.id");
        assert_eq!(found.value, "bookshelf-premium-monthly");

        let payload = json!({ "offer": { "id": 4821 } });
        let found = extract_product_id(&payload).unwrap();
        assert_eq!(found.strategy, "offer.id");
        assert_eq!(found.value, "4821");
    }

    #[test]
    fn test_event_type_probed_from_common_fields() {
        assert_eq!(
            extract_event_type(&json!({ "type": "purchase.approved" })).as_deref(),
            Some("purchase.approved")
        );
        assert_eq!(
            extract_event_type(&json!({ "event_type": "NewSale" })).as_deref(),
            Some("NewSale")
        );
        // "event" as an object is a container, not a type string.
        assert!(extract_event_type(&json!({ "event": { "type": "x" } })).is_none());
    }
}
