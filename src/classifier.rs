use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::amenities::{vocabulary_list, AMENITIES};
use crate::error::ClassifyError;
use crate::http::{send_with_retry, RetryPolicy};
use crate::settings::Settings;

/// Label the model is asked to start its reply with.
pub const REPLY_LABEL: &str = "Matching amenities:";

/// Tags a listing with amenities from the fixed vocabulary.
#[async_trait]
pub trait AmenityClassifier: Send + Sync {
    /// Amenities present in `listing_text`, in vocabulary order.
    async fn classify(&self, listing_text: &str) -> Result<Vec<&'static str>, ClassifyError>;
}

pub fn build_prompt(listing_text: &str) -> String {
    format!(
        "Summarize the following listing, then check which of these amenities it includes: {}. \
         Return only the matching amenities, spelled exactly as above. Do not add any other words. \
         Format the reply as a single line exactly like this: {} amenity 1, amenity 2, etc.\n\n{}",
        vocabulary_list(),
        REPLY_LABEL,
        listing_text
    )
}

/// Every vocabulary entry whose exact text occurs anywhere in `reply`.
/// Tolerates format drift; an entry mentioned in prose also counts.
pub fn match_amenities(reply: &str) -> Vec<&'static str> {
    AMENITIES
        .iter()
        .copied()
        .filter(|amenity| reply.contains(amenity))
        .collect()
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    content: Option<String>,
}

/// Chat-completions backed classifier.
pub struct OpenAiClassifier {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    retry: RetryPolicy,
}

impl OpenAiClassifier {
    pub fn new(settings: &Settings, client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: settings.openai.base_url.trim_end_matches('/').to_string(),
            api_key: settings.openai.api_key.clone(),
            model: settings.openai.model.clone(),
            retry: settings.http.retry_policy(),
        }
    }

    async fn complete(&self, prompt: String) -> Result<String, ClassifyError> {
        let start = Instant::now();
        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: 0.0,
        };

        let response = send_with_retry(
            || {
                self.client
                    .post(&url)
                    .bearer_auth(&self.api_key)
                    .json(&request)
            },
            self.retry,
            "classification service",
        )
        .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, error = %body, "Classification service error");
            return Err(ClassifyError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let chat: ChatResponse = response.json().await?;
        debug!(
            model = %self.model,
            duration_ms = start.elapsed().as_millis(),
            "Chat completion"
        );

        chat.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(ClassifyError::EmptyReply)
    }
}

#[async_trait]
impl AmenityClassifier for OpenAiClassifier {
    async fn classify(&self, listing_text: &str) -> Result<Vec<&'static str>, ClassifyError> {
        let reply = self.complete(build_prompt(listing_text)).await?;
        debug!(reply = %reply, "Amenity reply");
        Ok(match_amenities(&reply))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn vocabulary_restricted_match() {
        let found = match_amenities("Matching amenities: Pool, Garage, Bogus Amenity");
        assert_eq!(found, vec!["Garage", "Pool"]);
    }

    #[test]
    fn tolerates_format_drift() {
        let reply = "Sure! The listing mentions a Dishwasher and Elevator.\nMatching amenities: Dishwasher, Elevator";
        assert_eq!(match_amenities(reply), vec!["Dishwasher", "Elevator"]);
    }

    #[test]
    fn nothing_matches() {
        assert!(match_amenities("Matching amenities:").is_empty());
        assert!(match_amenities("pool, garage").is_empty());
    }

    #[test]
    fn prompt_embeds_vocabulary_and_text() {
        let prompt = build_prompt("Large 2br with balcony");
        assert!(prompt.contains("Wheelchair Access"));
        assert!(prompt.contains(REPLY_LABEL));
        assert!(prompt.ends_with("\n\nLarge 2br with balcony"));
    }

    fn settings_for(server: &MockServer) -> Settings {
        let mut settings = Settings::default();
        settings.openai.base_url = format!("{}/v1/", server.uri());
        settings.openai.api_key = "sk-test".into();
        settings.http.max_retries = 0;
        settings
    }

    fn classifier_for(server: &MockServer) -> OpenAiClassifier {
        let settings = settings_for(server);
        OpenAiClassifier::new(&settings, settings.http.client().unwrap())
    }

    #[tokio::test]
    async fn classify_parses_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(serde_json::json!({ "model": "gpt-3.5-turbo" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{
                    "message": { "role": "assistant", "content": "Matching amenities: Laundry Facilities, Balcony/Patio" }
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let found = classifier_for(&server).classify("listing").await.unwrap();
        assert_eq!(found, vec!["Laundry Facilities", "Balcony/Patio"]);
    }

    #[tokio::test]
    async fn classify_reports_service_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let err = classifier_for(&server).classify("listing").await.unwrap_err();
        match err {
            ClassifyError::Status { status, body } => {
                assert_eq!(status, 401);
                assert_eq!(body, "bad key");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn classify_rejects_empty_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "choices": [] })))
            .mount(&server)
            .await;

        let err = classifier_for(&server).classify("listing").await.unwrap_err();
        assert!(matches!(err, ClassifyError::EmptyReply));
    }

    #[tokio::test]
    async fn classify_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(std::time::Duration::from_secs(5)))
            .expect(1)
            .mount(&server)
            .await;

        let mut settings = settings_for(&server);
        settings.http.timeout_secs = 1;
        let classifier = OpenAiClassifier::new(&settings, settings.http.client().unwrap());

        match classifier.classify("listing").await.unwrap_err() {
            ClassifyError::Request(e) => assert!(e.is_timeout()),
            other => panic!("expected timeout, got {other}"),
        }
    }
}
