//! Payment processor boundary.
//!
//! Everything that crosses the wire to the processor lives here: the
//! authorization ("payment intent") object, the string-only metadata
//! contract attached to it, webhook envelopes, signature verification, and
//! the dollars-to-minor-units conversion. Dollars are `Decimal` everywhere
//! inside the crate; integers in minor units exist only at this boundary.

pub mod provider;
pub mod signature;

use crate::errors::ServiceError;
use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Webhook event types that carry business effects. Every other type is
/// acknowledged and ignored so the processor never retries an event we do
/// not understand.
pub const EVENT_PAYMENT_SUCCEEDED: &str = "payment_intent.succeeded";
pub const EVENT_PAYMENT_FAILED: &str = "payment_intent.payment_failed";

/// Current version of the metadata contract carried on intents.
pub const METADATA_VERSION: &str = "1";

/// Request to create a payment authorization on the processor.
#[derive(Debug, Clone, Serialize)]
pub struct CreateIntentRequest {
    /// Charge amount in minor units (cents)
    pub amount: i64,
    pub currency: String,
    /// Opaque string-only metadata; the sole durable channel between intent
    /// creation and webhook delivery
    pub metadata: BTreeMap<String, String>,
    pub automatic_tax: AutomaticTaxParams,
    /// Shipping address for tax jurisdiction resolution
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipping: Option<ShippingParams>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AutomaticTaxParams {
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShippingParams {
    pub name: String,
    /// Raw address JSON as submitted by the storefront
    pub address: serde_json::Value,
}

/// The processor-side authorization object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    /// Absent on authorizations created before tax support existed
    #[serde(default)]
    pub automatic_tax: Option<AutomaticTax>,
    /// Checkout session correlation token, when the processor attaches one
    #[serde(default)]
    pub checkout_session: Option<String>,
}

/// Tax sub-object on an authorization; `amount` is in minor units.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomaticTax {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub status: Option<String>,
}

impl PaymentIntent {
    /// Tax amount in dollars read from the tax sub-object, defaulting to
    /// zero when the sub-object or its amount is absent.
    pub fn tax_amount(&self) -> Decimal {
        self.automatic_tax
            .as_ref()
            .and_then(|t| t.amount)
            .map(from_minor_units)
            .unwrap_or(Decimal::ZERO)
    }

    /// The correlation token the confirmation page polls with; falls back to
    /// the intent id when the processor attaches no session.
    pub fn session_correlation_id(&self) -> String {
        self.checkout_session
            .clone()
            .unwrap_or_else(|| self.id.clone())
    }
}

/// Signed webhook envelope delivered by the processor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: WebhookEventData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEventData {
    pub object: PaymentIntent,
}

/// Processor operations consumed by the checkout path.
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    async fn create_payment_intent(
        &self,
        request: CreateIntentRequest,
    ) -> Result<PaymentIntent, ServiceError>;
}

/// Converts a dollar amount to minor units with half-up rounding on the
/// scaled value: `round(amount * 100)`. This is the only place
/// decimal dollars cross into the processor's integer wire format.
pub fn to_minor_units(amount: Decimal) -> Result<i64, ServiceError> {
    let scaled = (amount * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    scaled.to_i64().ok_or_else(|| {
        ServiceError::InvalidInput(format!("amount {} not representable in minor units", amount))
    })
}

/// Converts minor units back to a dollar amount with two decimal places.
pub fn from_minor_units(minor: i64) -> Decimal {
    Decimal::new(minor, 2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn minor_units_round_half_up_on_the_scaled_value() {
        assert_eq!(to_minor_units(dec!(105.00)).unwrap(), 10500);
        assert_eq!(to_minor_units(dec!(113.50)).unwrap(), 11350);
        // Half-up, not banker's: 10.005 * 100 = 1000.5 -> 1001
        assert_eq!(to_minor_units(dec!(10.005)).unwrap(), 1001);
        assert_eq!(to_minor_units(dec!(10.004)).unwrap(), 1000);
        assert_eq!(to_minor_units(dec!(0)).unwrap(), 0);
    }

    #[test]
    fn minor_units_convert_back_to_dollars() {
        assert_eq!(from_minor_units(863), dec!(8.63));
        assert_eq!(from_minor_units(0), dec!(0.00));
        assert_eq!(from_minor_units(11350), dec!(113.50));
    }

    #[test]
    fn tax_amount_defaults_to_zero_without_tax_sub_object() {
        let intent = PaymentIntent {
            id: "pi_legacy".into(),
            client_secret: None,
            amount: 10500,
            currency: "usd".into(),
            status: None,
            metadata: BTreeMap::new(),
            automatic_tax: None,
            checkout_session: None,
        };
        assert_eq!(intent.tax_amount(), Decimal::ZERO);
    }

    #[test]
    fn tax_amount_reads_minor_units_from_sub_object() {
        let intent = PaymentIntent {
            id: "pi_1".into(),
            client_secret: None,
            amount: 11350,
            currency: "usd".into(),
            status: None,
            metadata: BTreeMap::new(),
            automatic_tax: Some(AutomaticTax {
                enabled: true,
                amount: Some(863),
                status: Some("complete".into()),
            }),
            checkout_session: None,
        };
        assert_eq!(intent.tax_amount(), dec!(8.63));
    }

    #[test]
    fn session_correlation_falls_back_to_intent_id() {
        let mut intent = PaymentIntent {
            id: "pi_1".into(),
            client_secret: None,
            amount: 100,
            currency: "usd".into(),
            status: None,
            metadata: BTreeMap::new(),
            automatic_tax: None,
            checkout_session: None,
        };
        assert_eq!(intent.session_correlation_id(), "pi_1");
        intent.checkout_session = Some("cs_9".into());
        assert_eq!(intent.session_correlation_id(), "cs_9");
    }
}
