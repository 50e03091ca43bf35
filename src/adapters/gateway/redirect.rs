//! Redirect gateway adapter.
//!
//! Fronts the redirect-flow processor. The API is OAuth2-protected:
//! tokens are obtained by client-credentials grant and cached until close
//! to expiry. Notifications from this processor carry only charge ids, so
//! there is nothing to verify at parse time; authenticity comes from
//! re-fetching the charge state over this authenticated API.
//!
//! Recurring charges: a monthly checkout is created with an on-demand
//! recurrence, and the processor later issues child charges that reference
//! the parent id. `cancel_recurrence` voids the mandate on the parent.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::domain::foundation::{ChargeId, Money};
use crate::domain::payment::{BillingInterval, GatewayKind, ProviderChargeState};
use crate::ports::{CreateChargeRequest, CreatedCharge, GatewayError, PaymentGateway};

/// Refresh tokens a little before the processor expires them.
const TOKEN_EXPIRY_MARGIN_SECS: u64 = 30;

/// Redirect processor API configuration.
#[derive(Clone)]
pub struct RedirectGatewayConfig {
    client_id: String,
    client_secret: SecretString,
    /// Merchant account id charges are routed to.
    merchant_id: String,
    api_base_url: String,
    /// Where the processor sends id-only notifications.
    notification_url: String,
    /// Per-request timeout for calls to the processor.
    timeout: Duration,
}

impl RedirectGatewayConfig {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        merchant_id: impl Into<String>,
        api_base_url: impl Into<String>,
        notification_url: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: SecretString::new(client_secret.into()),
            merchant_id: merchant_id.into(),
            api_base_url: api_base_url.into(),
            notification_url: notification_url.into(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Cached access token with expiry tracking.
struct TokenCache {
    access_token: SecretString,
    fetched_at: Instant,
    lifetime: Duration,
}

impl TokenCache {
    fn is_expired(&self) -> bool {
        let margin = Duration::from_secs(TOKEN_EXPIRY_MARGIN_SECS);
        self.fetched_at.elapsed() + margin > self.lifetime
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Serialize)]
struct CreatePaymentBody {
    payer: PayerBody,
    target: TargetBody,
    amount: i64,
    currency: String,
    order_number: String,
    callback: CallbackBody,
    #[serde(skip_serializing_if = "Option::is_none")]
    recurrence: Option<RecurrenceBody>,
}

#[derive(Debug, Serialize)]
struct PayerBody {
    contact: ContactBody,
}

#[derive(Debug, Serialize)]
struct ContactBody {
    email: String,
}

#[derive(Debug, Serialize)]
struct TargetBody {
    #[serde(rename = "type")]
    target_type: &'static str,
    goid: String,
}

#[derive(Debug, Serialize)]
struct CallbackBody {
    return_url: String,
    notification_url: String,
}

#[derive(Debug, Serialize)]
struct RecurrenceBody {
    recurrence_cycle: &'static str,
    recurrence_date_to: String,
}

#[derive(Debug, Deserialize)]
struct PaymentResponse {
    id: i64,
    state: String,
    #[serde(default)]
    gw_url: Option<String>,
}

fn map_state(state: &str) -> Result<ProviderChargeState, GatewayError> {
    match state {
        "CREATED" => Ok(ProviderChargeState::Created),
        "PAYMENT_METHOD_CHOSEN" => Ok(ProviderChargeState::MethodChosen),
        "AUTHORIZED" => Ok(ProviderChargeState::Authorized),
        "PAID" => Ok(ProviderChargeState::Paid),
        "CANCELED" => Ok(ProviderChargeState::Canceled),
        "TIMEOUTED" => Ok(ProviderChargeState::TimedOut),
        "REFUNDED" => Ok(ProviderChargeState::Refunded),
        "PARTIALLY_REFUNDED" => Ok(ProviderChargeState::PartiallyRefunded),
        other => Err(GatewayError::Rejected(format!(
            "unknown payment state: {}",
            other
        ))),
    }
}

/// Redirect payment gateway adapter.
pub struct RedirectGateway {
    config: RedirectGatewayConfig,
    http_client: reqwest::Client,
    token_cache: RwLock<Option<TokenCache>>,
}

impl RedirectGateway {
    pub fn new(config: RedirectGatewayConfig) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("Failed to create HTTP client");
        Self {
            config,
            http_client,
            token_cache: RwLock::new(None),
        }
    }

    /// Returns a valid access token, fetching a fresh one when the cached
    /// token is missing or near expiry.
    async fn access_token(&self) -> Result<SecretString, GatewayError> {
        {
            let cache = self.token_cache.read().await;
            if let Some(token) = cache.as_ref() {
                if !token.is_expired() {
                    return Ok(token.access_token.clone());
                }
            }
        }

        let url = format!("{}/api/oauth2/token", self.config.api_base_url);
        let response = self
            .http_client
            .post(&url)
            .basic_auth(
                &self.config.client_id,
                Some(self.config.client_secret.expose_secret()),
            )
            .form(&[
                ("grant_type", "client_credentials"),
                ("scope", "payment-all"),
            ])
            .send()
            .await
            .map_err(|e| GatewayError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, "redirect gateway token request failed");
            return Err(if status.is_server_error() {
                GatewayError::Unavailable(format!("token endpoint returned {}", status))
            } else {
                GatewayError::Rejected(format!("token endpoint returned {}: {}", status, body))
            });
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Rejected(format!("unparseable token response: {}", e)))?;

        let access_token = SecretString::new(token.access_token);
        let mut cache = self.token_cache.write().await;
        *cache = Some(TokenCache {
            access_token: access_token.clone(),
            fetched_at: Instant::now(),
            lifetime: Duration::from_secs(token.expires_in),
        });

        Ok(access_token)
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
impl PaymentGateway for RedirectGateway {
    fn kind(&self) -> GatewayKind {
        GatewayKind::Redirect
    }

    async fn create_charge(&self, req: CreateChargeRequest) -> Result<CreatedCharge, GatewayError> {
        let token = self.access_token().await?;
        let plan = req.plan.plan();

        // On-demand recurrence runs until voided; the date bound is the
        // processor's required far-future sentinel.
        let recurrence = if plan.recurring && plan.interval == BillingInterval::Month {
            Some(RecurrenceBody {
                recurrence_cycle: "MONTH",
                recurrence_date_to: "2099-12-31".to_string(),
            })
        } else {
            None
        };

        let body = CreatePaymentBody {
            payer: PayerBody {
                contact: ContactBody {
                    email: req.user_email.clone(),
                },
            },
            target: TargetBody {
                target_type: "ACCOUNT",
                goid: self.config.merchant_id.clone(),
            },
            amount: plan.price.minor,
            currency: plan.price.currency.as_str().to_string(),
            order_number: format!("{}:{}", req.user_id, plan.id),
            callback: CallbackBody {
                return_url: req.success_url.clone(),
                notification_url: self.config.notification_url.clone(),
            },
            recurrence,
        };

        let url = format!("{}/api/payments/payment", self.config.api_base_url);
        let response = self
            .http_client
            .post(&url)
            .bearer_auth(token.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            let err = Self::read_error(response).await;
            tracing::error!(error = %err, "redirect create_charge failed");
            return Err(err);
        }

        let payment: PaymentResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Rejected(format!("unparseable payment response: {}", e)))?;

        let state = map_state(&payment.state)?;
        let redirect_url = payment
            .gw_url
            .ok_or_else(|| GatewayError::Rejected("payment response without gw_url".into()))?;
        let charge_id = ChargeId::new(payment.id.to_string())
            .map_err(|e| GatewayError::Rejected(e.to_string()))?;

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
        let token = self.access_token().await?;
        let url = format!(
            "{}/api/payments/payment/{}",
            self.config.api_base_url, charge_id
        );

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(token.expose_secret())
            .send()
            .await
            .map_err(|e| GatewayError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::read_error(response).await);
        }

        let payment: PaymentResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Rejected(format!("unparseable payment response: {}", e)))?;

        map_state(&payment.state)
    }

    async fn refund_charge(
        &self,
        charge_id: &ChargeId,
        amount: Option<Money>,
    ) -> Result<(), GatewayError> {
        let token = self.access_token().await?;
        let url = format!(
            "{}/api/payments/payment/{}/refund",
            self.config.api_base_url, charge_id
        );

        // Absent an explicit amount the full charge is refunded; the
        // processor requires the amount either way, so fetch it.
        let amount_minor = match amount {
            Some(amount) => amount.minor,
            None => {
                // Full refunds use the charge's own amount.
                #[derive(Debug, Deserialize)]
                struct AmountOnly {
                    amount: i64,
                }
                let status_url = format!(
                    "{}/api/payments/payment/{}",
                    self.config.api_base_url, charge_id
                );
                let response = self
                    .http_client
                    .get(&status_url)
                    .bearer_auth(token.expose_secret())
                    .send()
                    .await
                    .map_err(|e| GatewayError::Unavailable(e.to_string()))?;
                if !response.status().is_success() {
                    return Err(Self::read_error(response).await);
                }
                let payment: AmountOnly = response.json().await.map_err(|e| {
                    GatewayError::Rejected(format!("unparseable payment response: {}", e))
                })?;
                payment.amount
            }
        };

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(token.expose_secret())
            .form(&[("amount", amount_minor.to_string())])
            .send()
            .await
            .map_err(|e| GatewayError::Unavailable(e.to_string()))?;

        if response.status().is_success() {
            return Ok(());
        }

        let err = Self::read_error(response).await;
        if let GatewayError::Rejected(body) = &err {
            if body.contains("ALREADY_REFUNDED") {
                tracing::info!(charge_id = %charge_id, "charge already refunded at processor");
                return Ok(());
            }
        }
        Err(err)
    }

    async fn cancel_recurrence(&self, parent_charge_id: &ChargeId) -> Result<(), GatewayError> {
        let token = self.access_token().await?;
        let url = format!(
            "{}/api/payments/payment/{}/void_recurrence",
            self.config.api_base_url, parent_charge_id
        );

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(token.expose_secret())
            .send()
            .await
            .map_err(|e| GatewayError::Unavailable(e.to_string()))?;

        if response.status().is_success() {
            return Ok(());
        }

        let err = Self::read_error(response).await;
        if let GatewayError::Rejected(body) = &err {
            // Voiding an already-void mandate is a no-op.
            if body.contains("RECURRENCE_STOPPED") || body.contains("INVALID_STATE") {
                tracing::info!(
                    charge_id = %parent_charge_id,
                    "recurrence already inactive at processor"
                );
                return Ok(());
            }
        }
        Err(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_mapping_covers_processor_vocabulary() {
        assert_eq!(map_state("CREATED").unwrap(), ProviderChargeState::Created);
        assert_eq!(map_state("PAID").unwrap(), ProviderChargeState::Paid);
        assert_eq!(map_state("TIMEOUTED").unwrap(), ProviderChargeState::TimedOut);
        assert_eq!(
            map_state("PARTIALLY_REFUNDED").unwrap(),
            ProviderChargeState::PartiallyRefunded
        );
        assert!(map_state("paid").is_err());
    }

    #[test]
    fn token_cache_expires_with_margin() {
        let cache = TokenCache {
            access_token: SecretString::new("tok".into()),
            fetched_at: Instant::now(),
            lifetime: Duration::from_secs(TOKEN_EXPIRY_MARGIN_SECS / 2),
        };
        assert!(cache.is_expired());

        let cache = TokenCache {
            access_token: SecretString::new("tok".into()),
            fetched_at: Instant::now(),
            lifetime: Duration::from_secs(3600),
        };
        assert!(!cache.is_expired());
    }

    #[test]
    fn create_payment_body_omits_recurrence_when_absent() {
        let body = CreatePaymentBody {
            payer: PayerBody {
                contact: ContactBody {
                    email: "bride@example.com".into(),
                },
            },
            target: TargetBody {
                target_type: "ACCOUNT",
                goid: "8123456789".into(),
            },
            amount: 299900,
            currency: "CZK".into(),
            order_number: "user-1:premium_yearly".into(),
            callback: CallbackBody {
                return_url: "https://app.example.com/paid".into(),
                notification_url: "https://app.example.com/webhooks/redirect".into(),
            },
            recurrence: None,
        };

        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("recurrence").is_none());
        assert_eq!(json["target"]["type"], "ACCOUNT");
    }
}
