//! Payment gateway configuration
//!
//! Two processors are configured side by side: a card processor with
//! signed webhooks and a redirect processor with OAuth2 and id-only
//! notifications. `default_provider` selects which one new checkouts
//! go through.

use serde::Deserialize;

use super::error::ValidationError;

/// Gateway configuration (both processors)
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Which gateway new checkouts use: "card" or "redirect"
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Card processor settings
    pub card: CardConfig,

    /// Redirect processor settings
    pub redirect: RedirectConfig,

    /// Per-request timeout in seconds for processor API calls
    #[serde(default = "default_gateway_timeout")]
    pub request_timeout_secs: u64,
}

/// Card processor (signed-webhook) settings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CardConfig {
    /// Secret API key
    pub api_key: String,

    /// Webhook signing secret
    pub webhook_secret: String,

    /// API base URL
    #[serde(default = "default_card_api_base")]
    pub api_base_url: String,
}

/// Redirect processor (OAuth2) settings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RedirectConfig {
    /// OAuth2 client id
    pub client_id: String,

    /// OAuth2 client secret
    pub client_secret: String,

    /// Merchant account id charges are routed to
    pub merchant_id: String,

    /// API base URL
    pub api_base_url: String,

    /// URL the processor sends id-only notifications to
    pub notification_url: String,
}

impl GatewayConfig {
    /// Check if the card processor is in test mode
    pub fn is_card_test_mode(&self) -> bool {
        self.card.api_key.starts_with("sk_test_")
    }

    /// Validate gateway configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self.default_provider.as_str() {
            "card" | "redirect" => {}
            other => return Err(ValidationError::UnknownDefaultGateway(other.to_string())),
        }

        if self.card.api_key.is_empty() {
            return Err(ValidationError::MissingRequired("GATEWAY__CARD__API_KEY"));
        }
        if !self.card.api_key.starts_with("sk_") {
            return Err(ValidationError::InvalidCardApiKey);
        }
        if self.card.webhook_secret.is_empty() {
            return Err(ValidationError::MissingRequired(
                "GATEWAY__CARD__WEBHOOK_SECRET",
            ));
        }
        if !self.card.webhook_secret.starts_with("whsec_") {
            return Err(ValidationError::InvalidCardWebhookSecret);
        }

        if self.redirect.client_id.is_empty() {
            return Err(ValidationError::MissingRequired(
                "GATEWAY__REDIRECT__CLIENT_ID",
            ));
        }
        if self.redirect.client_secret.is_empty() {
            return Err(ValidationError::MissingRequired(
                "GATEWAY__REDIRECT__CLIENT_SECRET",
            ));
        }
        if self.redirect.merchant_id.is_empty() {
            return Err(ValidationError::MissingRequired(
                "GATEWAY__REDIRECT__MERCHANT_ID",
            ));
        }
        if self.redirect.api_base_url.is_empty() {
            return Err(ValidationError::MissingRequired(
                "GATEWAY__REDIRECT__API_BASE_URL",
            ));
        }
        if !self.redirect.notification_url.starts_with("http") {
            return Err(ValidationError::InvalidNotificationUrl);
        }

        if self.request_timeout_secs == 0 {
            return Err(ValidationError::InvalidTimeout);
        }

        Ok(())
    }
}

fn default_provider() -> String {
    "redirect".to_string()
}

fn default_gateway_timeout() -> u64 {
    30
}

fn default_card_api_base() -> String {
    "https://api.cardpay.example".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> GatewayConfig {
        GatewayConfig {
            default_provider: default_provider(),
            card: CardConfig {
                api_key: "sk_test_abc123".to_string(),
                webhook_secret: "whsec_xyz789".to_string(),
                api_base_url: default_card_api_base(),
            },
            redirect: RedirectConfig {
                client_id: "client-1".to_string(),
                client_secret: "secret-1".to_string(),
                merchant_id: "8999999999".to_string(),
                api_base_url: "https://gw.sandbox.example.com".to_string(),
                notification_url: "https://api.vowday.cz/webhooks/redirect".to_string(),
            },
            request_timeout_secs: default_gateway_timeout(),
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_is_card_test_mode() {
        assert!(valid_config().is_card_test_mode());
    }

    #[test]
    fn test_unknown_default_provider_rejected() {
        let mut config = valid_config();
        config.default_provider = "paypal".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_card_key_prefix() {
        let mut config = valid_config();
        config.card.api_key = "pk_test_abc".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_webhook_secret_prefix() {
        let mut config = valid_config();
        config.card.webhook_secret = "secret".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_redirect_merchant_rejected() {
        let mut config = valid_config();
        config.redirect.merchant_id = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_request_timeout_rejected() {
        let mut config = valid_config();
        config.request_timeout_secs = 0;
        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidTimeout)
        ));
    }

    #[test]
    fn test_relative_notification_url_rejected() {
        let mut config = valid_config();
        config.redirect.notification_url = "/webhooks/redirect".to_string();
        assert!(config.validate().is_err());
    }
}
