//! Reply suggestions from an external text-generation service.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

pub const MAX_VARIANTS: usize = 3;

const SYSTEM_PROMPT: &str = "You help people keep a friendly chat going in the language \
    they are practising. Keep suggestions short, natural and in the same language as the message.";
const FORMAT_PROMPT: &str =
    "You are a reply suggestion assistant. Return only JSON arrays when possible.";

#[derive(Debug, thiserror::Error)]
pub enum SuggestError {
    #[error("reply suggestions are not configured")]
    Unconfigured,

    #[error("suggestion request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// Something that turns the latest chat line into a free-text reply proposal.
#[async_trait]
pub trait SuggestionSource: Send + Sync {
    async fn suggest(&self, text: &str) -> Result<String, SuggestError>;
}

pub struct Unconfigured;

#[async_trait]
impl SuggestionSource for Unconfigured {
    async fn suggest(&self, _text: &str) -> Result<String, SuggestError> {
        Err(SuggestError::Unconfigured)
    }
}

/// Chat-completions client for any OpenAI compatible endpoint.
pub struct OpenAiSuggester {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 3],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiSuggester {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, SuggestError> {
        let http = reqwest::Client::builder().timeout(Duration::from_secs(25)).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            api_key: api_key.into(),
            model: model.into(),
        })
    }
}

#[async_trait]
impl SuggestionSource for OpenAiSuggester {
    async fn suggest(&self, text: &str) -> Result<String, SuggestError> {
        let prompt = format!(
            "Someone in the chat just wrote:\n\"{text}\"\n\
             Suggest {MAX_VARIANTS} short replies as a JSON array of strings."
        );
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage { role: "system", content: SYSTEM_PROMPT },
                ChatMessage { role: "system", content: FORMAT_PROMPT },
                ChatMessage { role: "user", content: &prompt },
            ],
            temperature: 0.4,
            max_tokens: 400,
        };

        let response: ChatResponse = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let reply = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        debug!(len = reply.len(), "Received suggestion reply");
        Ok(reply)
    }
}

/// Pull up to three reply candidates out of a free-text model answer.
///
/// Prefers a JSON array (optionally inside a fenced code block) and falls
/// back to the first non-empty lines.
pub fn parse_variants(reply: &str) -> Vec<String> {
    let candidate = strip_code_fence(reply);
    let from_json = json_variants(candidate.trim());
    if !from_json.is_empty() {
        return from_json;
    }

    reply
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .take(MAX_VARIANTS)
        .map(str::to_owned)
        .collect()
}

fn strip_code_fence(reply: &str) -> &str {
    let Some(open) = reply.find("```") else {
        return reply;
    };
    let after_open = &reply[open + 3..];
    // skip the optional language tag on the opening line
    let Some(newline) = after_open.find('\n') else {
        return reply;
    };
    let body = &after_open[newline + 1..];
    match body.find("```") {
        Some(close) => &body[..close],
        None => reply,
    }
}

fn json_variants(candidate: &str) -> Vec<String> {
    let (Some(first), Some(last)) = (candidate.find('['), candidate.rfind(']')) else {
        return Vec::new();
    };
    if last <= first {
        return Vec::new();
    }
    let Ok(Value::Array(items)) = serde_json::from_str::<Value>(&candidate[first..=last]) else {
        return Vec::new();
    };

    items
        .into_iter()
        .map(|item| match item {
            Value::Null => String::new(),
            Value::String(s) => s,
            Value::Object(ref fields) => ["text", "reply", "content"]
                .iter()
                .find_map(|key| fields.get(*key))
                .map(|v| match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .unwrap_or_else(|| item.to_string()),
            other => other.to_string(),
        })
        .filter(|s| !s.is_empty())
        .take(MAX_VARIANTS)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_json_array() {
        assert_eq!(
            parse_variants(r#"["Oui !", "Bien sûr", "Pourquoi pas ?", "Non"]"#),
            vec!["Oui !", "Bien sûr", "Pourquoi pas ?"]
        );
    }

    #[test]
    fn fenced_array_with_objects() {
        let reply = "Here you go:\n```json\n\
                     [{\"text\": \"Salut\"}, {\"reply\": \"Coucou\"}, null, 3]\n```";
        assert_eq!(parse_variants(reply), vec!["Salut", "Coucou", "3"]);
    }

    #[test]
    fn objects_without_known_fields_become_json() {
        assert_eq!(parse_variants(r#"[{"x": 1}]"#), vec![r#"{"x":1}"#]);
    }

    #[test]
    fn malformed_json_falls_back_to_lines() {
        let reply = "1. Bonjour\n\n2. Ça va ?\n3. À plus\n4. extra";
        assert_eq!(parse_variants(reply), vec!["1. Bonjour", "2. Ça va ?", "3. À plus"]);
        assert_eq!(parse_variants("[not json"), vec!["[not json"]);
    }

    #[test]
    fn empty_reply_gives_nothing() {
        assert!(parse_variants("").is_empty());
        assert!(parse_variants("   \n  ").is_empty());
    }

    #[tokio::test]
    async fn unconfigured_source_refuses() {
        assert!(matches!(Unconfigured.suggest("hi").await, Err(SuggestError::Unconfigured)));
    }
}
