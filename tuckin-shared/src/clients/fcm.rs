use std::collections::HashMap;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::{AppError, AppResult};

/// Firebase Cloud Messaging client for the multicast HTTP endpoint.
#[derive(Clone)]
pub struct FcmClient {
    client: Client,
    endpoint: String,
    server_key: String,
}

#[derive(Debug, Serialize)]
struct FcmRequest<'a> {
    registration_ids: &'a [String],
    notification: FcmNotification<'a>,
    data: HashMap<String, String>,
}

#[derive(Debug, Serialize)]
struct FcmNotification<'a> {
    title: &'a str,
    body: &'a str,
}

#[derive(Debug, Default, Deserialize)]
pub struct FcmReport {
    #[serde(default)]
    pub success: u32,
    #[serde(default)]
    pub failure: u32,
}

impl FcmClient {
    pub fn new(endpoint: &str, server_key: &str) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.to_string(),
            server_key: server_key.to_string(),
        }
    }

    pub async fn send_to_tokens(
        &self,
        tokens: &[String],
        title: &str,
        body: &str,
        data: &serde_json::Value,
    ) -> AppResult<FcmReport> {
        if tokens.is_empty() {
            return Ok(FcmReport::default());
        }

        let request = FcmRequest {
            registration_ids: tokens,
            notification: FcmNotification { title, body },
            data: flatten_data(data),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("key={}", self.server_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::transient(format!("push send failed: {e}")))?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::transient(format!("push API error: {body}")));
        }

        let report = response
            .json::<FcmReport>()
            .await
            .map_err(|e| AppError::internal(format!("push response decode failed: {e}")))?;

        tracing::debug!(
            tokens = tokens.len(),
            success = report.success,
            failure = report.failure,
            "push sent"
        );
        Ok(report)
    }
}

/// FCM data payloads only carry string values.
fn flatten_data(data: &serde_json::Value) -> HashMap<String, String> {
    match data {
        serde_json::Value::Object(map) => map
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| {
                let value = match v {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (k.clone(), value)
            })
            .collect(),
        _ => HashMap::new(),
    }
}
