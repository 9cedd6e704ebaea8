//! OpenAI ContentGenerator 実装
//!
//! - お題: chat completions（JSON `{"prompt": ...}` で返させる）
//! - 画像: image generations（URL で返させる）

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::domain::{ContentError, ContentGenerator};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

const QUESTION_MODEL: &str = "gpt-4-turbo";
const QUESTION_MAX_TOKENS: u32 = 75;
const QUESTION_INSTRUCTION: &str = "Give me one funny, 'Apples to Apples' style prompt. \
     Your response should be valid JSON with the field 'prompt' with no markdown.";
const IMAGE_MODEL: &str = "dall-e-3";
const IMAGE_SIZE: &str = "1024x1024";

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

/// お題生成の応答本文
#[derive(Debug, Deserialize)]
struct QuestionBody {
    prompt: String,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    data: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    url: Option<String>,
}

pub struct OpenAiContentGenerator {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenAiContentGenerator {
    pub fn new(api_key: String, base_url: Option<String>) -> Self {
        let base_url = base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        Self {
            http: reqwest::Client::new(),
            api_key,
            base_url,
        }
    }

    async fn post<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<T, ContentError> {
        let response = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ContentError::Request(e.to_string()))?
            .error_for_status()
            .map_err(|e| ContentError::Request(e.to_string()))?;
        response
            .json()
            .await
            .map_err(|e| ContentError::InvalidResponse(e.to_string()))
    }
}

/// モデルの返した本文からお題を取り出す
fn parse_question(content: &str) -> Result<String, ContentError> {
    let body: QuestionBody = serde_json::from_str(content.trim())
        .map_err(|e| ContentError::InvalidResponse(format!("{}: {}", e, content)))?;
    let prompt = body.prompt.trim();
    if prompt.is_empty() {
        return Err(ContentError::InvalidResponse("empty prompt".to_string()));
    }
    Ok(prompt.to_string())
}

#[async_trait]
impl ContentGenerator for OpenAiContentGenerator {
    async fn generate_question(&self) -> Result<String, ContentError> {
        let body = json!({
            "model": QUESTION_MODEL,
            "max_tokens": QUESTION_MAX_TOKENS,
            "temperature": 1,
            "top_p": 1,
            "n": 1,
            "messages": [ChatMessage {
                role: "user".to_string(),
                content: QUESTION_INSTRUCTION.to_string(),
            }],
        });
        let response: ChatCompletionResponse = self.post("/chat/completions", body).await?;
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ContentError::InvalidResponse("no choices".to_string()))?;
        parse_question(&choice.message.content)
    }

    async fn generate_picture(&self, prompt: &str) -> Result<String, ContentError> {
        let body = json!({
            "model": IMAGE_MODEL,
            "prompt": prompt,
            "n": 1,
            "size": IMAGE_SIZE,
            "quality": "standard",
            "style": "natural",
            "response_format": "url",
        });
        let response: ImageResponse = self.post("/images/generations", body).await?;
        response
            .data
            .into_iter()
            .next()
            .and_then(|image| image.url)
            .ok_or_else(|| ContentError::InvalidResponse("no image url".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_question() {
        // テスト項目: モデルの JSON 応答からお題を取り出せる
        // given (前提条件):
        let content = r#" {"prompt": "The worst thing to find in your soup"} "#;

        // when (操作):
        let result = parse_question(content);

        // then (期待する結果):
        assert_eq!(result.unwrap(), "The worst thing to find in your soup");
    }

    #[test]
    fn test_parse_question_rejects_markdown() {
        // テスト項目: JSON でない応答（マークダウン付きなど）はエラーになる
        // given (前提条件):
        let content = "```json\n{\"prompt\": \"x\"}\n```";

        // when (操作):
        let result = parse_question(content);

        // then (期待する結果):
        assert!(matches!(result, Err(ContentError::InvalidResponse(_))));
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        // テスト項目: ベース URL の末尾スラッシュは取り除かれる
        // given (前提条件):
        let base_url = Some("http://localhost:9000/v1/".to_string());

        // when (操作):
        let generator = OpenAiContentGenerator::new("key".to_string(), base_url);

        // then (期待する結果):
        assert_eq!(generator.base_url, "http://localhost:9000/v1");
    }
}
