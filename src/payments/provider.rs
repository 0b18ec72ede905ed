//! HTTP client for the payment processor's intent API.

use super::{CreateIntentRequest, PaymentIntent, PaymentProcessor};
use crate::config::PaymentConfig;
use crate::errors::ServiceError;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, instrument};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Payment processor client backed by reqwest.
#[derive(Clone)]
pub struct HttpPaymentProvider {
    client: reqwest::Client,
    base_url: String,
    secret_key: String,
}

impl HttpPaymentProvider {
    pub fn new(config: &PaymentConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            secret_key: config.secret_key.clone(),
        }
    }
}

#[async_trait]
impl PaymentProcessor for HttpPaymentProvider {
    #[instrument(skip(self, request), fields(amount = request.amount, currency = %request.currency))]
    async fn create_payment_intent(
        &self,
        request: CreateIntentRequest,
    ) -> Result<PaymentIntent, ServiceError> {
        let url = format!("{}/v1/payment_intents", self.base_url);
        debug!(url = %url, "Creating payment intent");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.secret_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                ServiceError::ExternalServiceError(format!("payment processor unreachable: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            // Surface the processor's error verbatim; the caller's error
            // boundary decides what the storefront sees.
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::ExternalServiceError(format!(
                "payment processor returned {}: {}",
                status, body
            )));
        }

        response.json::<PaymentIntent>().await.map_err(|e| {
            ServiceError::ExternalServiceError(format!(
                "payment processor returned an unreadable intent: {}",
                e
            ))
        })
    }
}
