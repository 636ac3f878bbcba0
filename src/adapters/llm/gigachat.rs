//! GigaChat adapter. Implements `LlmPort` over the OAuth + chat-completions
//! REST surface.
//!
//! The bearer token is obtained via a client-credentials exchange (Basic auth,
//! scope GIGACHAT_API_PERS) and cached with its expiry. The cache sits behind
//! one async lock so concurrent handlers never race to refresh; a 401 from the
//! completions endpoint invalidates the cache and retries exactly once.

use crate::domain::LlmError;
use crate::ports::LlmPort;
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Refresh the token this many ms before its reported expiry.
const EXPIRY_SKEW_MS: u64 = 60_000;

/// Connection settings for the GigaChat endpoints.
///
/// Endpoints are injectable so tests can point at a local mock server.
#[derive(Debug, Clone)]
pub struct GigaChatSettings {
    pub oauth_url: String,
    pub chat_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub model: String,
    pub request_timeout: Duration,
    /// Skip TLS verification (corporate MITM proxies).
    pub insecure_tls: bool,
}

struct CachedToken {
    access_token: String,
    /// Unix epoch milliseconds, as reported by the OAuth endpoint.
    expires_at: u64,
}

impl CachedToken {
    fn is_fresh(&self, now_ms: u64) -> bool {
        now_ms + EXPIRY_SKEW_MS < self.expires_at
    }
}

/// GigaChat API client. Safe to share via `Arc`.
pub struct GigaChatClient {
    client: reqwest::Client,
    settings: GigaChatSettings,
    token: Mutex<Option<CachedToken>>,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Serialize, Clone)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: MessageContent,
}

#[derive(Deserialize)]
struct MessageContent {
    content: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    /// Unix epoch milliseconds.
    expires_at: u64,
}

impl GigaChatClient {
    pub fn new(settings: GigaChatSettings) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .danger_accept_invalid_certs(settings.insecure_tls)
            .build()
            .map_err(|e| LlmError::Transport(format!("HTTP client init: {e}")))?;
        Ok(Self {
            client,
            settings,
            token: Mutex::new(None),
        })
    }

    fn now_ms() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }

    fn transport_error(e: reqwest::Error) -> LlmError {
        if e.is_timeout() {
            LlmError::Transport(format!("request timed out: {e}"))
        } else {
            LlmError::Transport(e.to_string())
        }
    }

    /// Return a fresh bearer token, exchanging credentials when the cached one
    /// is absent or about to expire. Holding the lock across the exchange makes
    /// the refresh single-flight.
    async fn bearer_token(&self, force_refresh: bool) -> Result<String, LlmError> {
        let mut guard = self.token.lock().await;
        if !force_refresh {
            if let Some(cached) = guard.as_ref() {
                if cached.is_fresh(Self::now_ms()) {
                    return Ok(cached.access_token.clone());
                }
            }
        }

        debug!(url = %self.settings.oauth_url, "requesting OAuth token");
        let response = self
            .client
            .post(&self.settings.oauth_url)
            .basic_auth(&self.settings.client_id, Some(&self.settings.client_secret))
            .header("Accept", "application/json")
            // The API accepts the client id as RqUID.
            .header("RqUID", &self.settings.client_id)
            .form(&[("scope", "GIGACHAT_API_PERS")])
            .send()
            .await
            .map_err(Self::transport_error)?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::RateLimit(truncate(&body)));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %truncate(&body), "OAuth exchange failed");
            return Err(LlmError::Auth(format!(
                "token endpoint returned {status}: {}",
                truncate(&body)
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| LlmError::MalformedResponse(format!("token response: {e}")))?;
        info!("OAuth token acquired");
        let access = token.access_token.clone();
        *guard = Some(CachedToken {
            access_token: token.access_token,
            expires_at: token.expires_at,
        });
        Ok(access)
    }

    async fn send_chat(
        &self,
        bearer: &str,
        messages: &[ChatMessage],
    ) -> Result<reqwest::Response, LlmError> {
        let request = ChatRequest {
            model: self.settings.model.clone(),
            messages: messages.to_vec(),
        };
        self.client
            .post(&self.settings.chat_url)
            .bearer_auth(bearer)
            .json(&request)
            .send()
            .await
            .map_err(Self::transport_error)
    }

    /// One chat-completion round trip. Retries exactly once on 401 with a
    /// forced token refresh.
    async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String, LlmError> {
        let bearer = self.bearer_token(false).await?;
        let mut response = self.send_chat(&bearer, &messages).await?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            warn!("completions returned 401, refreshing token and retrying once");
            let bearer = self.bearer_token(true).await?;
            response = self.send_chat(&bearer, &messages).await?;
        }

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(LlmError::Auth("still unauthorized after refresh".into()));
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::RateLimit(truncate(&body)));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %truncate(&body), "GigaChat API returned error");
            return Err(LlmError::Transport(format!(
                "API error {status}: {}",
                truncate(&body)
            )));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::MalformedResponse(e.to_string()))?;
        let content = chat
            .choices
            .first()
            .map(|c| c.message.content.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| LlmError::MalformedResponse("no choices in response".into()))?;
        Ok(content)
    }
}

impl ChatMessage {
    fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

fn truncate(s: &str) -> String {
    s.chars().take(200).collect()
}

#[async_trait::async_trait]
impl LlmPort for GigaChatClient {
    async fn summarize(&self, text: &str) -> Result<String, LlmError> {
        info!(text_len = text.len(), "requesting summary");
        let messages = vec![
            ChatMessage::system(
                "Ты — ассистент, который делает краткие информативные выжимки текста, \
                 выделяя основные темы и ключевые моменты.",
            ),
            ChatMessage::user(text),
        ];
        let summary = self.complete(messages).await?;
        info!(summary_len = summary.len(), "summary generated");
        Ok(summary)
    }

    async fn ask(&self, question: &str) -> Result<String, LlmError> {
        info!(question_len = question.len(), "forwarding question");
        let messages = vec![
            ChatMessage::system("Ты — полезный ассистент. Отвечай кратко и по делу."),
            ChatMessage::user(question),
        ];
        self.complete(messages).await
    }

    async fn verify(&self) -> Result<(), LlmError> {
        self.bearer_token(false).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings(server: &MockServer, timeout_ms: u64) -> GigaChatSettings {
        GigaChatSettings {
            oauth_url: format!("{}/oauth", server.uri()),
            chat_url: format!("{}/chat/completions", server.uri()),
            client_id: "client-id".into(),
            client_secret: "client-secret".into(),
            model: "GigaChat".into(),
            request_timeout: Duration::from_millis(timeout_ms),
            insecure_tls: false,
        }
    }

    fn token_body(token: &str) -> serde_json::Value {
        json!({
            "access_token": token,
            "expires_at": GigaChatClient::now_ms() + 600_000,
        })
    }

    fn chat_body(content: &str) -> serde_json::Value {
        json!({ "choices": [ { "message": { "role": "assistant", "content": content } } ] })
    }

    async fn mount_oauth(server: &MockServer, token: &str, expected_calls: u64) {
        Mock::given(method("POST"))
            .and(path("/oauth"))
            .and(header("RqUID", "client-id"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body(token)))
            .expect(expected_calls)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn ask_returns_completion_text() {
        let server = MockServer::start().await;
        mount_oauth(&server, "tok", 1).await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_body("42")))
            .mount(&server)
            .await;

        let client = GigaChatClient::new(settings(&server, 2_000)).unwrap();
        assert_eq!(client.ask("meaning of life?").await.unwrap(), "42");
    }

    #[tokio::test]
    async fn token_is_cached_across_calls() {
        let server = MockServer::start().await;
        mount_oauth(&server, "tok", 1).await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_body("ok")))
            .expect(2)
            .mount(&server)
            .await;

        let client = GigaChatClient::new(settings(&server, 2_000)).unwrap();
        client.summarize("first").await.unwrap();
        client.summarize("second").await.unwrap();
    }

    #[tokio::test]
    async fn retries_once_after_401_with_fresh_token() {
        let server = MockServer::start().await;
        // Initial token plus the forced refresh.
        mount_oauth(&server, "tok", 2).await;
        // First completion call is rejected, the retry succeeds.
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(401))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_body("recovered")))
            .mount(&server)
            .await;

        let client = GigaChatClient::new(settings(&server, 2_000)).unwrap();
        assert_eq!(client.ask("q").await.unwrap(), "recovered");
    }

    #[tokio::test]
    async fn persistent_401_surfaces_as_auth_error() {
        let server = MockServer::start().await;
        mount_oauth(&server, "tok", 2).await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client = GigaChatClient::new(settings(&server, 2_000)).unwrap();
        assert!(matches!(client.ask("q").await, Err(LlmError::Auth(_))));
    }

    #[tokio::test]
    async fn rate_limit_maps_to_typed_error() {
        let server = MockServer::start().await;
        mount_oauth(&server, "tok", 1).await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server)
            .await;

        let client = GigaChatClient::new(settings(&server, 2_000)).unwrap();
        assert!(matches!(
            client.summarize("text").await,
            Err(LlmError::RateLimit(_))
        ));
    }

    #[tokio::test]
    async fn garbage_body_maps_to_malformed_response() {
        let server = MockServer::start().await;
        mount_oauth(&server, "tok", 1).await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let client = GigaChatClient::new(settings(&server, 2_000)).unwrap();
        assert!(matches!(
            client.ask("q").await,
            Err(LlmError::MalformedResponse(_))
        ));
    }

    #[tokio::test]
    async fn slow_remote_yields_transport_error_within_timeout() {
        let server = MockServer::start().await;
        mount_oauth(&server, "tok", 1).await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(chat_body("late"))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let client = GigaChatClient::new(settings(&server, 300)).unwrap();
        let started = std::time::Instant::now();
        let result = client.ask("q").await;
        assert!(matches!(result, Err(LlmError::Transport(_))));
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn oauth_rejection_surfaces_as_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad credentials"))
            .mount(&server)
            .await;

        let client = GigaChatClient::new(settings(&server, 2_000)).unwrap();
        assert!(matches!(client.verify().await, Err(LlmError::Auth(_))));
    }

    #[test]
    fn expired_token_is_not_fresh() {
        let now = GigaChatClient::now_ms();
        let fresh = CachedToken {
            access_token: "t".into(),
            expires_at: now + 600_000,
        };
        let stale = CachedToken {
            access_token: "t".into(),
            expires_at: now + 1_000,
        };
        assert!(fresh.is_fresh(now));
        assert!(!stale.is_fresh(now));
    }
}
