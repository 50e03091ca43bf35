//! Card gateway adapter.
//!
//! Fronts the card processor's REST API. Charges are created as hosted
//! checkout sessions the payer is redirected to; settlement arrives through
//! HMAC-signed webhook deliveries which [`CardGateway::parse_webhook`]
//! verifies and maps to a [`GatewayEvent`].
//!
//! # Security
//!
//! - HMAC-SHA256 signature verification with constant-time comparison
//! - Timestamp validation (5-minute window) for replay attack prevention
//! - Secrets handled via `secrecy::SecretString`

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::domain::foundation::{BillingError, ChargeId, Money};
use crate::domain::payment::{GatewayKind, ProviderChargeState};
use crate::domain::webhook::{GatewayEvent, WebhookSignatureVerifier};
use crate::ports::{CreateChargeRequest, CreatedCharge, GatewayError, PaymentGateway};

/// Card processor API configuration.
#[derive(Clone)]
pub struct CardGatewayConfig {
    /// Secret API key.
    api_key: SecretString,

    /// Webhook signing secret.
    webhook_secret: SecretString,

    /// Base URL for the processor API.
    api_base_url: String,

    /// Per-request timeout for calls to the processor.
    timeout: Duration,
}

impl CardGatewayConfig {
    pub fn new(
        api_key: impl Into<String>,
        webhook_secret: impl Into<String>,
        api_base_url: impl Into<String>,
    ) -> Self {
        Self {
            api_key: SecretString::new(api_key.into()),
            webhook_secret: SecretString::new(webhook_secret.into()),
            api_base_url: api_base_url.into(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Charge representation in the processor's responses.
#[derive(Debug, Deserialize)]
struct CardCharge {
    id: String,
    status: String,
    #[serde(default)]
    redirect_url: Option<String>,
    /// Set on charges the processor created from a recurring mandate.
    #[serde(default)]
    parent: Option<String>,
}

/// Webhook delivery envelope.
#[derive(Debug, Deserialize)]
struct CardWebhookEvent {
    id: String,
    data: CardWebhookData,
}

#[derive(Debug, Deserialize)]
struct CardWebhookData {
    object: CardCharge,
}

fn map_state(status: &str) -> Result<ProviderChargeState, GatewayError> {
    match status {
        "created" => Ok(ProviderChargeState::Created),
        "method_chosen" => Ok(ProviderChargeState::MethodChosen),
        "authorized" => Ok(ProviderChargeState::Authorized),
        "paid" => Ok(ProviderChargeState::Paid),
        "canceled" => Ok(ProviderChargeState::Canceled),
        "expired" => Ok(ProviderChargeState::TimedOut),
        "refunded" => Ok(ProviderChargeState::Refunded),
        "partially_refunded" => Ok(ProviderChargeState::PartiallyRefunded),
        other => Err(GatewayError::Rejected(format!(
            "unknown charge status: {}",
            other
        ))),
    }
}

/// Card payment gateway adapter.
pub struct CardGateway {
    config: CardGatewayConfig,
    http_client: reqwest::Client,
    verifier: WebhookSignatureVerifier,
}

impl CardGateway {
    pub fn new(config: CardGatewayConfig) -> Self {
        let verifier = WebhookSignatureVerifier::new(config.webhook_secret.clone());
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("Failed to create HTTP client");
        Self {
            config,
            http_client,
            verifier,
        }
    }

    /// Verifies a signed webhook delivery and maps it to a domain event.
    ///
    /// Rejection here means the delivery must be refused with 4xx; nothing
    /// from an unverified payload may reach the ledger.
    pub fn parse_webhook(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<GatewayEvent, BillingError> {
        self.verifier.verify(payload, signature_header)?;

        let event: CardWebhookEvent = serde_json::from_slice(payload).map_err(|e| {
            tracing::warn!(error = %e, "failed to parse card webhook payload");
            BillingError::SignatureInvalid(format!("invalid webhook JSON: {}", e))
        })?;

        let state = map_state(&event.data.object.status)
            .map_err(|e| BillingError::SignatureInvalid(e.to_string()))?;
        let charge_id = ChargeId::new(event.data.object.id)
            .map_err(|e| BillingError::SignatureInvalid(e.to_string()))?;
        let parent_charge_id = match event.data.object.parent {
            Some(parent) => Some(
                ChargeId::new(parent).map_err(|e| BillingError::SignatureInvalid(e.to_string()))?,
            ),
            None => None,
        };

        Ok(GatewayEvent {
            gateway: GatewayKind::Card,
            event_id: event.id,
            charge_id,
            parent_charge_id,
            state,
        })
    }

    async fn read_error(response: reqwest::Response) -> GatewayError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status == reqwest::StatusCode::NOT_FOUND {
            GatewayError::ResourceMissing(body)
        } else if status.is_server_error() {
            GatewayError::Unavailable(format!("processor returned {}: {}", status, body))
        } else {
            GatewayError::Rejected(format!("processor returned {}: {}", status, body))
        }
    }
}

#[async_trait]
impl PaymentGateway for CardGateway {
    fn kind(&self) -> GatewayKind {
        GatewayKind::Card
    }

    async fn create_charge(&self, req: CreateChargeRequest) -> Result<CreatedCharge, GatewayError> {
        let url = format!("{}/v1/charges", self.config.api_base_url);
        let plan = req.plan.plan();

        let params = [
            ("amount", plan.price.minor.to_string()),
            ("currency", plan.price.currency.as_str().to_lowercase()),
            ("customer_email", req.user_email.clone()),
            ("metadata[user_id]", req.user_id.to_string()),
            ("recurring", plan.recurring.to_string()),
            ("success_url", req.success_url.clone()),
            ("cancel_url", req.cancel_url.clone()),
        ];

        let response = self
            .http_client
            .post(&url)
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .form(&params)
            .send()
            .await
            .map_err(|e| GatewayError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            let err = Self::read_error(response).await;
            tracing::error!(error = %err, "card create_charge failed");
            return Err(err);
        }

        let charge: CardCharge = response
            .json()
            .await
            .map_err(|e| GatewayError::Rejected(format!("unparseable charge response: {}", e)))?;

        let state = map_state(&charge.status)?;
        let redirect_url = charge
            .redirect_url
            .ok_or_else(|| GatewayError::Rejected("charge response without redirect_url".into()))?;
        let charge_id =
            ChargeId::new(charge.id).map_err(|e| GatewayError::Rejected(e.to_string()))?;

        Ok(CreatedCharge {
            charge_id,
            redirect_url,
            state,
        })
    }

    async fn charge_status(
        &self,
        charge_id: &ChargeId,
    ) -> Result<ProviderChargeState, GatewayError> {
        let url = format!("{}/v1/charges/{}", self.config.api_base_url, charge_id);

        let response = self
            .http_client
            .get(&url)
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .send()
            .await
            .map_err(|e| GatewayError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::read_error(response).await);
        }

        let charge: CardCharge = response
            .json()
            .await
            .map_err(|e| GatewayError::Rejected(format!("unparseable charge response: {}", e)))?;

        map_state(&charge.status)
    }

    async fn refund_charge(
        &self,
        charge_id: &ChargeId,
        amount: Option<Money>,
    ) -> Result<(), GatewayError> {
        let url = format!("{}/v1/refunds", self.config.api_base_url);

        let mut params = vec![("charge", charge_id.to_string())];
        if let Some(amount) = amount {
            params.push(("amount", amount.minor.to_string()));
        }

        let response = self
            .http_client
            .post(&url)
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .form(&params)
            .send()
            .await
            .map_err(|e| GatewayError::Unavailable(e.to_string()))?;

        if response.status().is_success() {
            return Ok(());
        }

        let err = Self::read_error(response).await;
        // The processor reports a second refund attempt as a conflict.
        if let GatewayError::Rejected(body) = &err {
            if body.contains("charge_already_refunded") {
                tracing::info!(charge_id = %charge_id, "charge already refunded at processor");
                return Ok(());
            }
        }
        Err(err)
    }

    async fn cancel_recurrence(&self, parent_charge_id: &ChargeId) -> Result<(), GatewayError> {
        let url = format!(
            "{}/v1/recurrences/{}",
            self.config.api_base_url, parent_charge_id
        );

        let response = self
            .http_client
            .delete(&url)
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .send()
            .await
            .map_err(|e| GatewayError::Unavailable(e.to_string()))?;

        // Missing recurrence means it is already inactive.
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            tracing::info!(
                charge_id = %parent_charge_id,
                "recurrence already inactive at processor"
            );
            return Ok(());
        }

        if !response.status().is_success() {
            return Err(Self::read_error(response).await);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::webhook::compute_test_signature;

    fn adapter() -> CardGateway {
        CardGateway::new(CardGatewayConfig::new(
            "sk_test_key",
            "whsec_test_secret",
            "http://localhost:9090",
        ))
    }

    #[test]
    fn parse_webhook_accepts_signed_paid_event() {
        let gateway = adapter();
        let payload = r#"{
            "id": "evt_1",
            "type": "charge.updated",
            "data": {
                "object": {"id": "ch_123", "status": "paid"}
            }
        }"#;
        let timestamp = chrono::Utc::now().timestamp();
        let signature = compute_test_signature("whsec_test_secret", timestamp, payload);
        let header = format!("t={},v1={}", timestamp, signature);

        let event = gateway.parse_webhook(payload.as_bytes(), &header).unwrap();

        assert_eq!(event.gateway, GatewayKind::Card);
        assert_eq!(event.event_id, "evt_1");
        assert_eq!(event.charge_id.as_str(), "ch_123");
        assert_eq!(event.state, ProviderChargeState::Paid);
        assert!(!event.is_recurring_child());
    }

    #[test]
    fn parse_webhook_carries_parent_for_recurring_children() {
        let gateway = adapter();
        let payload = r#"{
            "id": "evt_2",
            "data": {
                "object": {"id": "ch_child", "status": "paid", "parent": "ch_parent"}
            }
        }"#;
        let timestamp = chrono::Utc::now().timestamp();
        let signature = compute_test_signature("whsec_test_secret", timestamp, payload);
        let header = format!("t={},v1={}", timestamp, signature);

        let event = gateway.parse_webhook(payload.as_bytes(), &header).unwrap();

        assert!(event.is_recurring_child());
        assert_eq!(
            event.parent_charge_id.as_ref().map(|c| c.as_str()),
            Some("ch_parent")
        );
    }

    #[test]
    fn parse_webhook_rejects_bad_signature() {
        let gateway = adapter();
        let payload = r#"{"id":"evt_3","data":{"object":{"id":"ch_1","status":"paid"}}}"#;
        let timestamp = chrono::Utc::now().timestamp();
        let signature = compute_test_signature("wrong_secret", timestamp, payload);
        let header = format!("t={},v1={}", timestamp, signature);

        assert!(gateway.parse_webhook(payload.as_bytes(), &header).is_err());
    }

    #[test]
    fn parse_webhook_rejects_stale_timestamp() {
        let gateway = adapter();
        let payload = r#"{"id":"evt_4","data":{"object":{"id":"ch_1","status":"paid"}}}"#;
        let timestamp = chrono::Utc::now().timestamp() - 600;
        let signature = compute_test_signature("whsec_test_secret", timestamp, payload);
        let header = format!("t={},v1={}", timestamp, signature);

        assert!(gateway.parse_webhook(payload.as_bytes(), &header).is_err());
    }

    #[test]
    fn parse_webhook_rejects_unknown_status() {
        let gateway = adapter();
        let payload = r#"{"id":"evt_5","data":{"object":{"id":"ch_1","status":"weird"}}}"#;
        let timestamp = chrono::Utc::now().timestamp();
        let signature = compute_test_signature("whsec_test_secret", timestamp, payload);
        let header = format!("t={},v1={}", timestamp, signature);

        assert!(gateway.parse_webhook(payload.as_bytes(), &header).is_err());
    }

    #[test]
    fn state_mapping_is_total_over_known_statuses() {
        assert_eq!(map_state("created").unwrap(), ProviderChargeState::Created);
        assert_eq!(map_state("expired").unwrap(), ProviderChargeState::TimedOut);
        assert_eq!(
            map_state("partially_refunded").unwrap(),
            ProviderChargeState::PartiallyRefunded
        );
        assert!(map_state("").is_err());
    }
}
