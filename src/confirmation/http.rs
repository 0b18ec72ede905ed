//! HTTP implementation of the order lookup consumed by the poller.

use super::{LookupError, OrderLookup, OrderSummary};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct LookupResponse {
    order: OrderSummary,
}

/// Polls the storefront API's order lookup endpoint.
#[derive(Clone)]
pub struct HttpOrderLookup {
    client: reqwest::Client,
    base_url: String,
}

impl HttpOrderLookup {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl OrderLookup for HttpOrderLookup {
    async fn find_order(&self, session_id: &str) -> Result<Option<OrderSummary>, LookupError> {
        let url = format!("{}/api/v1/orders/lookup", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[("session_id", session_id)])
            .send()
            .await
            .map_err(|e| LookupError::Transport(e.to_string()))?;

        match response.status().as_u16() {
            200 => {
                let body: LookupResponse = response
                    .json()
                    .await
                    .map_err(|e| LookupError::Transport(e.to_string()))?;
                Ok(Some(body.order))
            }
            404 => Ok(None),
            status => Err(LookupError::Status(status)),
        }
    }
}
