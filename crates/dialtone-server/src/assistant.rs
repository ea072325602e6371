//! Conversational AI client.
//!
//! Replies come from an OpenAI-compatible `chat/completions` endpoint. Several
//! credentials may be configured; they are tried in order and the call only
//! fails once every one of them has, or once the overall deadline passes.

use crate::config::AssistantConfig;
use async_trait::async_trait;
use dialtone_types::Turn;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AssistantError {
    /// Every credential tried failed, none are configured, or the deadline
    /// passed first.
    #[error("assistant unavailable after {attempts} attempt(s)")]
    Unavailable { attempts: usize },
}

/// Produces the assistant's next line given the conversation so far.
#[async_trait]
pub trait ChatBackend: Send + Sync + std::fmt::Debug {
    /// `transcript` holds the turns before `text`; `text` is the new user line.
    async fn reply(&self, transcript: &[Turn], text: &str) -> Result<String, AssistantError>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    #[serde(default)]
    content: Option<String>,
}

/// Chat-completions client with ordered credential fallback.
pub struct OpenAiChat {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    system_prompt: String,
    max_tokens: u32,
    api_keys: Vec<String>,
    deadline: Duration,
}

impl std::fmt::Debug for OpenAiChat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiChat")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("credentials", &self.api_keys.len())
            .field("deadline", &self.deadline)
            .finish()
    }
}

impl OpenAiChat {
    pub fn new(config: &AssistantConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            endpoint: format!("{}/chat/completions", config.api_base.trim_end_matches('/')),
            model: config.model.clone(),
            system_prompt: config.system_prompt.clone(),
            max_tokens: config.max_tokens,
            api_keys: config
                .api_keys
                .iter()
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
                .collect(),
            deadline: Duration::from_secs(config.deadline_seconds),
        }
    }

    fn request<'a>(&'a self, transcript: &'a [Turn], text: &'a str) -> ChatRequest<'a> {
        let mut messages = Vec::with_capacity(transcript.len() + 2);
        messages.push(ChatMessage {
            role: "system",
            content: &self.system_prompt,
        });
        messages.extend(transcript.iter().map(|turn| ChatMessage {
            role: turn.role.as_str(),
            content: &turn.text,
        }));
        messages.push(ChatMessage {
            role: "user",
            content: text,
        });
        ChatRequest {
            model: &self.model,
            messages,
            max_tokens: self.max_tokens,
        }
    }

    /// Tries each credential in order, counting attempts in `attempts`.
    async fn try_keys(&self, body: &ChatRequest<'_>, attempts: &mut usize) -> Option<String> {
        for (index, key) in self.api_keys.iter().enumerate() {
            *attempts += 1;
            match self.try_key(key, body).await {
                Ok(reply) => return Some(reply),
                Err(e) => tracing::warn!(credential = index, error = %e, "assistant credential failed"),
            }
        }
        None
    }

    async fn try_key(&self, key: &str, body: &ChatRequest<'_>) -> Result<String, String> {
        let res = self
            .client
            .post(&self.endpoint)
            .bearer_auth(key)
            .json(body)
            .send()
            .await
            .map_err(|e| format!("request failed: {}", e))?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(format!("API error {}: {}", status, truncate(&body, 200)));
        }

        let parsed: ChatResponse = res
            .json()
            .await
            .map_err(|e| format!("response parse failed: {}", e))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| "empty completion".to_string())
    }
}

#[async_trait]
impl ChatBackend for OpenAiChat {
    async fn reply(&self, transcript: &[Turn], text: &str) -> Result<String, AssistantError> {
        let body = self.request(transcript, text);
        let mut attempts = 0;
        match tokio::time::timeout(self.deadline, self.try_keys(&body, &mut attempts)).await {
            Ok(Some(reply)) => Ok(reply),
            Ok(None) => Err(AssistantError::Unavailable { attempts }),
            Err(_) => {
                tracing::warn!(
                    deadline_seconds = self.deadline.as_secs(),
                    attempts,
                    "assistant deadline exceeded"
                );
                Err(AssistantError::Unavailable { attempts })
            }
        }
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(keys: &[&str]) -> AssistantConfig {
        AssistantConfig {
            api_base: "http://127.0.0.1:9/v1/".to_string(),
            api_keys: keys.iter().map(|k| k.to_string()).collect(),
            timeout_seconds: 1,
            ..AssistantConfig::default()
        }
    }

    #[test]
    fn request_carries_system_prompt_transcript_and_new_text() {
        let chat = OpenAiChat::new(&config(&["k"]));
        let transcript = vec![Turn::user("hi"), Turn::assistant("hello")];
        let body = serde_json::to_value(chat.request(&transcript, "how are you")).unwrap();

        let roles: Vec<&str> = body["messages"]
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["role"].as_str().unwrap())
            .collect();
        assert_eq!(roles, vec!["system", "user", "assistant", "user"]);
        assert_eq!(body["messages"][3]["content"], "how are you");
        assert_eq!(chat.endpoint, "http://127.0.0.1:9/v1/chat/completions");
    }

    #[test]
    fn blank_credentials_are_dropped() {
        let chat = OpenAiChat::new(&config(&["  ", "k1", ""]));
        assert_eq!(chat.api_keys, vec!["k1"]);
    }

    #[tokio::test]
    async fn no_credentials_is_immediately_unavailable() {
        let chat = OpenAiChat::new(&config(&[]));
        let err = chat.reply(&[], "hello").await.unwrap_err();
        assert!(matches!(err, AssistantError::Unavailable { attempts: 0 }));
    }

    #[tokio::test]
    async fn unreachable_backend_exhausts_every_credential() {
        let chat = OpenAiChat::new(&config(&["a", "b"]));
        let err = chat.reply(&[], "hello").await.unwrap_err();
        assert!(matches!(err, AssistantError::Unavailable { attempts: 2 }));
    }

    #[tokio::test]
    async fn stalled_backend_is_cut_off_at_the_deadline() {
        // Accepts connections and never answers.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let chat = OpenAiChat::new(&AssistantConfig {
            api_base: format!("http://{}/v1", addr),
            api_keys: vec!["a".to_string(), "b".to_string()],
            timeout_seconds: 30,
            deadline_seconds: 1,
            ..AssistantConfig::default()
        });

        let started = std::time::Instant::now();
        let err = chat.reply(&[], "hello").await.unwrap_err();

        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(matches!(err, AssistantError::Unavailable { attempts: 1 }));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("ab", 10), "ab");
    }
}
