//! Outbound email for order lifecycle events.
//!
//! Delivery is best-effort by design: reconciliation never waits on or
//! fails because of an email. Disabled installs log the would-be send.

use crate::{config::EmailConfig, entities::order::Model as OrderModel, errors::ServiceError};
use serde::Serialize;
use std::time::Duration;
use tracing::{info, instrument};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Result of attempting to send a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailSendResult {
    /// Accepted by the email API
    Sent,
    /// Email delivery is disabled; logged only
    Disabled,
}

#[derive(Debug, Serialize)]
struct EmailPayload<'a> {
    from: &'a str,
    to: &'a str,
    subject: String,
    text: String,
}

#[derive(Clone)]
pub struct NotificationService {
    client: reqwest::Client,
    config: EmailConfig,
}

impl NotificationService {
    pub fn new(config: EmailConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();

        Self { client, config }
    }

    /// Sends the customer their order confirmation.
    #[instrument(skip(self, order), fields(order_number = %order.order_number))]
    pub async fn send_order_confirmation(
        &self,
        order: &OrderModel,
    ) -> Result<EmailSendResult, ServiceError> {
        let subject = format!("Your order {} is confirmed", order.order_number);
        let text = format!(
            "Thank you for your purchase, {}!\n\n\
             Order number: {}\n\
             Subtotal: ${}\nShipping: ${}\nTax: ${}\nTotal: ${}\n\n\
             We'll email you again when your order ships.",
            order.customer_name,
            order.order_number,
            order.subtotal,
            order.shipping_cost,
            order.tax_amount,
            order.total,
        );
        self.deliver(&order.customer_email, subject, text).await
    }

    /// Notifies the gallery admin of a new order.
    #[instrument(skip(self, order), fields(order_number = %order.order_number))]
    pub async fn send_admin_notification(
        &self,
        order: &OrderModel,
    ) -> Result<EmailSendResult, ServiceError> {
        let subject = format!("New order {}", order.order_number);
        let text = format!(
            "Order {} from {} <{}> for ${}.",
            order.order_number, order.customer_name, order.customer_email, order.total,
        );
        let admin = self.config.admin_address.clone();
        self.deliver(&admin, subject, text).await
    }

    async fn deliver(
        &self,
        to: &str,
        subject: String,
        text: String,
    ) -> Result<EmailSendResult, ServiceError> {
        if !self.config.enabled {
            info!(%to, %subject, "Email delivery disabled; skipping send");
            return Ok(EmailSendResult::Disabled);
        }

        let payload = EmailPayload {
            from: &self.config.from_address,
            to,
            subject,
            text,
        };

        let mut request = self.client.post(&self.config.api_url).json(&payload);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            ServiceError::ExternalServiceError(format!("email API unreachable: {}", e))
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::ExternalServiceError(format!(
                "email API returned {}: {}",
                status, body
            )));
        }

        Ok(EmailSendResult::Sent)
    }
}
