//! HTTP client for the medical chat API
//!
//! The server keeps the conversation history and the symptom assessment in
//! a session cookie, so the client enables reqwest's cookie store (unless
//! `api.persist_cookies` is off) and every call reuses the same session.

pub mod types;

pub use types::{
    AnswerOutcome, AssessmentStart, ChatReply, Diagnosis, EmergencyNotice, HealthStatus, Question,
};

use crate::chat::validate_message;
use crate::config::ApiConfig;
use crate::error::{ClientResult, MedibotError};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::time::Duration;
use types::{AnswerRequest, ChatRequest, DiagnosisRequest, ErrorBody, QuestionSet};

/// Chat API client
///
/// # Examples
///
/// ```no_run
/// use medibot::client::MedibotClient;
/// use medibot::config::ApiConfig;
///
/// # async fn example() -> Result<(), medibot::error::MedibotError> {
/// let client = MedibotClient::new(&ApiConfig::default())?;
/// let reply = client.chat("What are common flu symptoms?").await?;
/// println!("{}", reply.answer);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct MedibotClient {
    client: Client,
    base_url: String,
}

impl MedibotClient {
    /// Create a client for `config.base_url`
    ///
    /// # Errors
    ///
    /// Returns `Config` if the URL is empty, or `Http` if the underlying
    /// client cannot be built
    pub fn new(config: &ApiConfig) -> ClientResult<Self> {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(MedibotError::Config("api.base_url is not set".to_string()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .cookie_store(config.persist_cookies)
            .user_agent(concat!("medibot/", env!("CARGO_PKG_VERSION")))
            .build()?;

        tracing::debug!("Initialized chat API client: url={}", base_url);
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Service status from `GET /health`
    pub async fn health(&self) -> ClientResult<HealthStatus> {
        let response = self.client.get(self.url("/health")).send().await?;
        read_json(response).await
    }

    /// Ask the assistant a question
    ///
    /// The message is trimmed and validated locally first, so obviously
    /// invalid input never reaches the server.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for rejected input, `RateLimited` when the
    /// server throttles the session, or `Api` for other server errors
    pub async fn chat(&self, message: &str) -> ClientResult<ChatReply> {
        let message = message.trim();
        validate_message(message)?;

        tracing::debug!("Sending chat message ({} chars)", message.chars().count());
        let response = self
            .client
            .post(self.url("/api/chat"))
            .json(&ChatRequest { message })
            .send()
            .await?;
        read_json(response).await
    }

    /// Forget the server-side conversation history
    pub async fn clear(&self) -> ClientResult<()> {
        let response = self.client.post(self.url("/clear")).send().await?;
        let _: Value = read_json(response).await?;
        Ok(())
    }

    /// All symptom-checker questions, in order
    pub async fn questions(&self) -> ClientResult<Vec<Question>> {
        let response = self.client.get(self.url("/get_questions")).send().await?;
        let set: QuestionSet = read_json(response).await?;
        Ok(set.questions)
    }

    /// Begin a new assessment, discarding any previous answers
    pub async fn start_assessment(&self) -> ClientResult<AssessmentStart> {
        let response = self
            .client
            .post(self.url("/start_assessment"))
            .send()
            .await?;
        read_json(response).await
    }

    /// Answer one assessment question
    pub async fn submit_answer(
        &self,
        question_id: &str,
        answer: &Value,
    ) -> ClientResult<AnswerOutcome> {
        let response = self
            .client
            .post(self.url("/submit_answer"))
            .json(&AnswerRequest {
                question_id,
                answer,
            })
            .send()
            .await?;
        let outcome = read_json(response).await?;
        if let AnswerOutcome::Emergency { emergency } = &outcome {
            tracing::warn!("Server flagged emergency symptom: {}", emergency.keyword);
        }
        Ok(outcome)
    }

    /// Request a differential diagnosis
    ///
    /// With `answers` unset the server uses the answers collected in this
    /// session.
    pub async fn diagnosis(&self, answers: Option<&Map<String, Value>>) -> ClientResult<Diagnosis> {
        let response = self
            .client
            .post(self.url("/get_diagnosis"))
            .json(&DiagnosisRequest { answers })
            .send()
            .await?;
        read_json(response).await
    }
}

/// Decode a success body, or map the failure to an error kind
async fn read_json<T: DeserializeOwned>(response: Response) -> ClientResult<T> {
    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        tracing::warn!("Chat API rate limit exceeded");
        return Err(MedibotError::RateLimited);
    }
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&text)
            .map(|body| body.error)
            .unwrap_or_else(|_| text.trim().to_string());
        tracing::error!("Chat API returned error {}: {}", status, message);
        return Err(MedibotError::Api {
            status: status.as_u16(),
            message,
        });
    }
    Ok(response.json().await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_trims_trailing_slash() {
        let config = ApiConfig {
            base_url: "http://localhost:8080/".to_string(),
            ..ApiConfig::default()
        };
        let client = MedibotClient::new(&config).unwrap();
        assert_eq!(client.base_url(), "http://localhost:8080");
        assert_eq!(client.url("/health"), "http://localhost:8080/health");
    }

    #[test]
    fn test_new_rejects_empty_url() {
        let config = ApiConfig {
            base_url: String::new(),
            ..ApiConfig::default()
        };
        assert!(matches!(
            MedibotClient::new(&config),
            Err(MedibotError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_chat_validates_before_sending() {
        // Nothing listens here; validation must fail first.
        let config = ApiConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            ..ApiConfig::default()
        };
        let client = MedibotClient::new(&config).unwrap();
        assert!(matches!(
            client.chat("   ").await,
            Err(MedibotError::Validation(_))
        ));
    }
}
