use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{QuoteRequest, SwapAggregator, SwapInstructionsRequest, SwapInstructionsResponse};
use crate::shared::config::AggregatorConfig;
use crate::shared::errors::PaymentError;

/// Jupiter v6 swap API client
pub struct JupiterClient {
    http_client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl JupiterClient {
    pub fn new(config: &AggregatorConfig) -> Result<Self, PaymentError> {
        let http_client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| PaymentError::Configuration(format!("HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn with_key(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.header("x-api-key", key),
            None => builder,
        }
    }
}

fn transport_error(context: &str, e: reqwest::Error) -> PaymentError {
    PaymentError::transient(format!("{} request failed: {}", context, e))
}

fn is_transient_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
}

/// Pull the provider's `error` field out of a failed response body, if any
async fn error_message(response: Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| format!("status {}: {}", status, body))
}

#[async_trait]
impl SwapAggregator for JupiterClient {
    async fn quote(&self, request: &QuoteRequest) -> Result<Value, PaymentError> {
        let url = format!("{}/quote", self.base_url);
        let mut query: Vec<(&str, String)> = vec![
            ("inputMint", request.input_mint.clone()),
            ("outputMint", request.output_mint.clone()),
            ("amount", request.amount.to_string()),
            ("slippageBps", request.slippage_bps.to_string()),
            ("swapMode", request.swap_mode.as_str().to_string()),
        ];
        if let Some(max_accounts) = request.max_accounts {
            query.push(("maxAccounts", max_accounts.to_string()));
        }

        debug!("Requesting quote: {:?}", query);
        let response = self
            .with_key(self.http_client.get(&url).query(&query))
            .send()
            .await
            .map_err(|e| transport_error("quote", e))?;

        let status = response.status();
        if is_transient_status(status) {
            warn!("⚠️ Quote API returned {}", status);
            return Err(PaymentError::transient(format!("quote API status {}", status)));
        }
        if !status.is_success() {
            return Err(PaymentError::InvalidQuote(error_message(response).await));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| PaymentError::InvalidQuote(format!("undecodable quote body: {}", e)))
    }

    async fn swap_instructions(
        &self,
        request: &SwapInstructionsRequest,
    ) -> Result<SwapInstructionsResponse, PaymentError> {
        let url = format!("{}/swap-instructions", self.base_url);

        let response = self
            .with_key(self.http_client.post(&url).json(request))
            .send()
            .await
            .map_err(|e| transport_error("swap-instructions", e))?;

        let status = response.status();
        if is_transient_status(status) {
            warn!("⚠️ Swap-instructions API returned {}", status);
            return Err(PaymentError::transient(format!(
                "swap-instructions API status {}",
                status
            )));
        }
        if !status.is_success() {
            return Err(PaymentError::RouteBuildFailed(error_message(response).await));
        }

        let body: SwapInstructionsResponse = response.json().await.map_err(|e| {
            PaymentError::RouteBuildFailed(format!("undecodable swap-instructions body: {}", e))
        })?;

        info!(
            "✅ Received swap instructions: {} setup, {} lookup tables",
            body.setup_instructions.len(),
            body.address_lookup_table_addresses.len()
        );
        Ok(body)
    }
}
