//! OpenAI chat-completions link classifier.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::request::{ClassificationRequest, SYSTEM_PROMPT};
use super::response::RelevantLinksResponse;
use super::LinkClassifier;
use crate::error::{AcquisitionError, ClassificationError, ClassificationResult, Result};

/// Link classifier backed by an OpenAI chat model.
///
/// # Example
///
/// ```rust,ignore
/// use acquisition::classifier::OpenAiClassifier;
///
/// let classifier = OpenAiClassifier::new("sk-...").with_model("gpt-4o-mini");
/// ```
#[derive(Clone)]
pub struct OpenAiClassifier {
    client: Client,
    api_key: SecretString,
    model: String,
    base_url: String,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
    json_schema: JsonSchemaFormat,
}

#[derive(Serialize)]
struct JsonSchemaFormat {
    name: String,
    strict: bool,
    schema: serde_json::Value,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

impl OpenAiClassifier {
    /// Create a classifier with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: SecretString::from(api_key.into()),
            model: "gpt-4o-mini".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
        }
    }

    /// Create from `OPENAI_API_KEY`, with an optional `OPENAI_MODEL`.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| AcquisitionError::Config("OPENAI_API_KEY not set".into()))?;

        let mut classifier = Self::new(api_key);
        if let Ok(model) = std::env::var("OPENAI_MODEL") {
            classifier = classifier.with_model(model);
        }
        Ok(classifier)
    }

    /// Set the chat model (default: gpt-4o-mini).
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set a custom base URL (for Azure, proxies, etc.).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn response_schema() -> serde_json::Value {
        serde_json::to_value(schemars::schema_for!(RelevantLinksResponse))
            .unwrap_or_else(|_| serde_json::json!({ "type": "object" }))
    }
}

#[async_trait]
impl LinkClassifier for OpenAiClassifier {
    async fn classify(&self, request: &ClassificationRequest) -> ClassificationResult<String> {
        let body = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: request.user_prompt(),
                },
            ],
            temperature: 0.0,
            response_format: ResponseFormat {
                format_type: "json_schema".to_string(),
                json_schema: JsonSchemaFormat {
                    name: "relevant_links".to_string(),
                    strict: false,
                    schema: Self::response_schema(),
                },
            },
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .json(&body)
            .send()
            .await
            .map_err(|e| ClassificationError::Unavailable(Box::new(e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(ClassificationError::Unavailable(
                format!("OpenAI returned {}: {}", status, error_text).into(),
            ));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| ClassificationError::Malformed(e.to_string()))?;

        chat.choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| ClassificationError::Malformed("no choices in response".to_string()))
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::request::CandidateLink;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> ClassificationRequest {
        ClassificationRequest {
            company_name: "Acme".to_string(),
            base_url: "https://acme.com/".to_string(),
            links: vec![CandidateLink {
                url: "https://acme.com/about".to_string(),
                anchor_text: "About".to_string(),
            }],
            max_links: 12,
        }
    }

    #[tokio::test]
    async fn test_returns_message_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{ "message": { "role": "assistant", "content": "{\"relevant_links\": []}" } }]
            })))
            .mount(&server)
            .await;

        let classifier = OpenAiClassifier::new("sk-test").with_base_url(server.uri());
        let raw = classifier.classify(&request()).await.unwrap();
        assert_eq!(raw, "{\"relevant_links\": []}");
    }

    #[tokio::test]
    async fn test_error_status_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let classifier = OpenAiClassifier::new("sk-test").with_base_url(server.uri());
        let err = classifier.classify(&request()).await.unwrap_err();
        assert!(matches!(err, ClassificationError::Unavailable(_)));
    }

    #[test]
    fn test_schema_names_relevant_links() {
        let schema = OpenAiClassifier::response_schema();
        assert!(schema.to_string().contains("relevant_links"));
    }
}
