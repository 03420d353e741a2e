//! OpenAI chat-completions client for transaction extraction
//!
//! Uses a long-lived reqwest::Client for connection pooling.

use crate::config::OpenAiConfig;
use crate::error::AuditError;
use crate::extraction::{parse_extraction_response, TransactionExtractor};
use crate::models::ExtractedTransaction;
use crate::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info};

const SYSTEM_PROMPT: &str = r#"You are a bank statement parser. Extract all transactions from the provided bank statement text. Return a JSON array of objects with these fields:
- "date": transaction date in YYYY-MM-DD format
- "amount": transaction amount as a number (positive for credits, negative for debits)
- "counterparty": name of the other party
- "description": payment description/reference
- "ref": invoice or document reference number if mentioned (e.g. invoice number, contract number), otherwise empty string

Return ONLY the JSON array, no other text."#;

/// Reusable extraction client (connection-pooled)
pub struct OpenAiExtractor {
    client: Client,
    api_key: String,
    model: String,
    endpoint: String,
}

impl OpenAiExtractor {
    pub fn new(config: &OpenAiConfig) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(180))
            .build()?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
        })
    }

    fn build_request(&self, statement_text: &str) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: statement_text.to_string(),
                },
            ],
            temperature: 0.0,
        }
    }
}

#[async_trait]
impl TransactionExtractor for OpenAiExtractor {
    async fn extract(&self, statement_text: &str) -> Result<Vec<ExtractedTransaction>> {
        let request = self.build_request(statement_text);

        info!(model = %self.model, chars = statement_text.len(), "Calling extraction model");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("Extraction request failed: {}", e);
                AuditError::Extraction(format!("OpenAI request error: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!("Extraction API error response: {}", error_text);
            return Err(AuditError::Extraction(format!(
                "OpenAI returned {}: {}",
                status, error_text
            )));
        }

        let chat: ChatResponse = response.json().await.map_err(|e| {
            AuditError::MalformedResponse(format!("OpenAI response parse error: {}", e))
        })?;

        let answer = chat
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                AuditError::MalformedResponse("Empty response from OpenAI".to_string())
            })?;

        parse_extraction_response(&answer)
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> OpenAiConfig {
        OpenAiConfig {
            api_key: "sk-test".to_string(),
            model: "gpt-4o-mini".to_string(),
            base_url: "https://api.openai.com/v1/".to_string(),
        }
    }

    #[test]
    fn test_request_serialization() {
        let extractor = OpenAiExtractor::new(&config()).unwrap();
        assert_eq!(extractor.endpoint, "https://api.openai.com/v1/chat/completions");

        let json = serde_json::to_value(extractor.build_request("10.03 Acme -120.50")).unwrap();
        assert_eq!(json["model"], "gpt-4o-mini");
        assert_eq!(json["temperature"], 0.0);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "10.03 Acme -120.50");
    }

    #[test]
    fn test_response_without_content() {
        let chat: ChatResponse =
            serde_json::from_str(r#"{"choices": [{"message": {"role": "assistant"}}]}"#).unwrap();
        assert!(chat.choices[0].message.content.is_none());
    }
}
