//! Model collaborator: one blocking HTTP request per generation step.
//!
//! The [`ModelClient`] trait decouples the development cycle from the actual
//! backend (an OpenAI-compatible `/v1/chat/completions` endpoint). Tests use
//! scripted clients that return predetermined replies without any network.
//!
//! Non-success status, transport error, and malformed body all collapse into
//! one error; the controller treats them identically ("generation failed,
//! retry").

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde_json::json;
use tracing::{debug, info, instrument};

use crate::io::config::ModelConfig;

/// Inputs for one generation step.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    /// System instruction establishing the reply contract.
    pub system: String,
    /// Assembled user prompt (task, notes, progress context).
    pub prompt: String,
}

/// Abstraction over code-generating model backends.
pub trait ModelClient {
    /// Produce one free-form text reply for the request.
    fn generate(&self, request: &GenerateRequest) -> Result<String>;
}

/// Client for an OpenAI-compatible chat-completions endpoint.
pub struct HttpModelClient {
    config: ModelConfig,
    client: reqwest::blocking::Client,
}

impl HttpModelClient {
    pub fn new(config: ModelConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("build http client")?;
        Ok(Self { config, client })
    }

    fn endpoint(&self) -> String {
        format!(
            "http://{}:{}/v1/chat/completions",
            self.config.host, self.config.port
        )
    }
}

impl ModelClient for HttpModelClient {
    #[instrument(skip_all, fields(model = %self.config.model))]
    fn generate(&self, request: &GenerateRequest) -> Result<String> {
        debug!(prompt_bytes = request.prompt.len(), "requesting generation");
        let payload = json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": request.system },
                { "role": "user", "content": request.prompt },
            ],
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens,
        });

        let response = self
            .client
            .post(self.endpoint())
            .json(&payload)
            .send()
            .context("send generation request")?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("generation request failed with status {status}"));
        }

        let body: serde_json::Value = response.json().context("parse generation response")?;
        let content = body["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| anyhow!("generation response missing message content"))?;
        info!(reply_bytes = content.len(), "generation succeeded");
        Ok(content.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_is_built_from_host_and_port() {
        let client = HttpModelClient::new(ModelConfig {
            host: "127.0.0.1".to_string(),
            port: 9999,
            ..ModelConfig::default()
        })
        .expect("client");
        assert_eq!(
            client.endpoint(),
            "http://127.0.0.1:9999/v1/chat/completions"
        );
    }
}
